//! Re-encode a dynamic-Huffman DEFLATE block so that the escaped form of its
//! bytes, embedded in a host-language string literal, is as short as
//! possible.
//!
//! The block's Huffman tables are kept verbatim; only the choice between
//! literals and back-references is redone, by a shortest-path search over
//! (input position, escape-model state) whose edge weights come from
//! [`crate::escape::merge`].

use crate::bit_stream::BitString;
use crate::escape::{escape, merge, merge_buf, Delim, State};
use crate::huffman::{BlockTables, END_BLOCK_CODE};
use std::collections::BTreeMap;
use std::io::{Error, ErrorKind, Result};

/// Shortest back-reference DEFLATE can express.
const MIN_MATCH: usize = 3;

/// Low three bits of the first byte of a final dynamic-Huffman block:
/// BFINAL = 1, BTYPE = 10.
const FINAL_DYNAMIC_PREFIX: u8 = 0b101;

/// One relaxed path into a DP node: accumulated cost, the node it came
/// from, and the code emitted on the way.
#[derive(Debug, Clone, Copy)]
struct Entry {
    cost: u64,
    prev: Option<(usize, State)>,
    code: BitString,
}

/// For every starting position, the encodable back-references that begin
/// there: `(match length, length-plus-distance code)`.
///
/// Every earlier occurrence of every substring of length three or more is
/// enumerated; candidates the tables cannot express are dropped. Quadratic
/// in the payload size, which stays small by construction.
fn build_refs(data: &[u8], tables: &BlockTables) -> Vec<Vec<(usize, BitString)>> {
    let mut refs = vec![Vec::new(); data.len() + 1];
    for start in 1..data.len() {
        for earlier in 0..start {
            let limit = data.len() - start;
            let common = data[earlier..]
                .iter()
                .zip(&data[start..])
                .take(limit)
                .take_while(|(a, b)| a == b)
                .count();
            for len in MIN_MATCH..=common {
                if let (Some(len_code), Some(dist_code)) =
                    (tables.encode_len(len), tables.encode_dist(start - earlier))
                {
                    refs[start].push((len, len_code + dist_code));
                }
            }
        }
    }
    refs
}

/// Keep the cheapest entry per state; the first writer wins on ties.
fn relax(frontier: &mut BTreeMap<State, Entry>, state: State, entry: Entry) {
    match frontier.get(&state) {
        Some(existing) if existing.cost <= entry.cost => {}
        _ => {
            frontier.insert(state, entry);
        }
    }
}

/// Choose a new literal/back-reference decomposition of `data` under the
/// block's own tables, minimizing the escaped length of the output bytes.
pub fn lz77(data: &[u8], tables: &BlockTables, delim: Delim) -> Vec<u8> {
    let refs = build_refs(data, tables);

    // The header is emitted before any symbol, so the search starts in the
    // state the header bytes leave behind.
    let (start_state, header_cost) = merge_buf(State::new(), &tables.raw, delim);

    let mut dp: Vec<BTreeMap<State, Entry>> = vec![BTreeMap::new(); data.len() + 2];
    dp[0].insert(
        start_state,
        Entry {
            cost: header_cost,
            prev: None,
            code: BitString::empty(),
        },
    );

    for i in 0..=data.len() {
        let frontier: Vec<(State, u64)> = dp[i].iter().map(|(s, e)| (*s, e.cost)).collect();
        for (state, cost) in frontier {
            let sym = if i < data.len() {
                data[i] as usize
            } else {
                END_BLOCK_CODE
            };
            // The original encoding proves the tables cover every byte that
            // occurs, and the end-of-block code is always present.
            let code = tables
                .encode_lit(sym)
                .expect("block tables are missing a required literal code");
            let (next, extra) = merge(state, code, delim);
            relax(
                &mut dp[i + 1],
                next,
                Entry {
                    cost: cost + extra,
                    prev: Some((i, state)),
                    code,
                },
            );

            if i < data.len() {
                for &(len, code) in &refs[i] {
                    let (next, extra) = merge(state, code, delim);
                    relax(
                        &mut dp[i + len],
                        next,
                        Entry {
                            cost: cost + extra,
                            prev: Some((i, state)),
                            code,
                        },
                    );
                }
            }
        }
    }

    // Cheapest end-of-block termination, first key on ties.
    let terminal = &dp[data.len() + 1];
    let mut best = terminal
        .values()
        .next()
        .expect("end of block is always reachable");
    for entry in terminal.values() {
        if entry.cost < best.cost {
            best = entry;
        }
    }

    let mut codes = vec![best.code];
    let mut prev = best.prev;
    while let Some((i, state)) = prev {
        let entry = &dp[i][&state];
        codes.push(entry.code);
        prev = entry.prev;
    }

    let mut out = tables.raw.clone();
    for code in codes.into_iter().rev() {
        out.push(code);
    }
    out.pad_to_byte();
    out.into_bytes()
}

/// Re-encode a DEFLATE stream for embedding in a literal delimited by
/// `delim`.
///
/// Anything that is not a single final dynamic-Huffman block passes through
/// untouched. The result decodes to the same payload, is never longer than
/// the input, and never escapes worse.
pub fn reencode(deflate: &[u8], delim: Delim) -> Result<Vec<u8>> {
    if deflate.is_empty() || deflate[0] & 0b111 != FINAL_DYNAMIC_PREFIX {
        return Ok(deflate.to_vec());
    }

    let data =
        miniz_oxide::inflate::decompress_to_vec(deflate).map_err(|_| corrupt_deflate_stream())?;
    let tables = BlockTables::parse(deflate)?;
    let encoded = lz77(&data, &tables, delim);

    // The search prices the stream before padding, so the padded final byte
    // can tip a borderline result the wrong way. Keep the original unless
    // the rewrite wins on both counts.
    let improved = encoded.len() <= deflate.len()
        && escape(&encoded, delim).len() <= escape(deflate, delim).len();
    if improved {
        Ok(encoded)
    } else {
        Ok(deflate.to_vec())
    }
}

/// The input claims to be a dynamic block but does not decompress.
fn corrupt_deflate_stream() -> Error {
    Error::new(ErrorKind::InvalidData, "Corrupt DEFLATE stream")
}
