//! Escape rules for embedding raw bytes in a host-language string literal,
//! and the incremental cost model the re-encoder optimizes against.
//!
//! Costs are measured in bits of the final escaped literal: eight per
//! emitted byte, plus eight for every byte the escaper has to expand. Two
//! expansions depend on the byte that comes *after* the one being written,
//! so the model carries that lookahead as explicit state.

use crate::bit_stream::{BitBuf, BitString};

/// ASCII digits that extend a preceding `\0` into `\x00`.
const OCTAL_DIGITS: &[u8] = b"01234567";

/// Bytes that force a preceding backslash to be doubled.
const BACKSLASH_FOLLOWERS: &[u8] = b"\0\n\r01234567abfxnrtvuUN'\"\\";

/// The string-literal delimiter of the wrapper source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delim {
    SingleQuote,
    DoubleQuote,
    TripleSingle,
    TripleDouble,
}

impl Delim {
    /// The delimiter as it appears around the literal.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Delim::SingleQuote => b"'",
            Delim::DoubleQuote => b"\"",
            Delim::TripleSingle => b"'''",
            Delim::TripleDouble => b"\"\"\"",
        }
    }

    /// The quote character the delimiter is built from.
    pub fn quote(self) -> u8 {
        self.as_bytes()[0]
    }

    /// Single-character delimiters additionally force newline and quote
    /// escaping inside the literal.
    pub fn is_single(self) -> bool {
        self.as_bytes().len() == 1
    }
}

/// Escape relevance of the most recently emitted byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Carry {
    #[default]
    Plain,
    Nul,
    Backslash,
}

/// A point in the escape-cost model: the carry of the previous byte plus
/// the bits that have not yet formed a whole output byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct State {
    pub carry: Carry,
    pub tail: BitString,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Append `code` to the pending bits of `state` and charge for every whole
/// byte that completes. Returns the successor state and the added cost.
///
/// A completed NUL or carriage return always costs an extra byte; a newline
/// or quote only under a single-character delimiter. The carry penalties are
/// retroactive: a `\0` whose successor turns out to be an octal digit has to
/// be rewritten as `\x00` (two more visible characters), and a pass-through
/// backslash whose successor is escape-significant has to be doubled.
pub fn merge(state: State, code: BitString, delim: Delim) -> (State, u64) {
    let mut carry = state.carry;
    let mut bits = state.tail + code;
    let mut cost = code.size() as u64;

    while let Some(byte) = bits.take_byte() {
        match carry {
            Carry::Nul if OCTAL_DIGITS.contains(&byte) => cost += 16,
            Carry::Backslash if BACKSLASH_FOLLOWERS.contains(&byte) => cost += 8,
            _ => {}
        }

        carry = if byte == 0 {
            cost += 8;
            Carry::Nul
        } else if byte == b'\r' {
            cost += 8;
            Carry::Plain
        } else if byte == b'\n' && delim.is_single() {
            cost += 8;
            Carry::Plain
        } else if byte == delim.quote() && delim.is_single() {
            cost += 8;
            Carry::Plain
        } else if byte == b'\\' {
            Carry::Backslash
        } else {
            Carry::Plain
        };
    }

    (State { carry, tail: bits }, cost)
}

/// Feed a whole buffer of bits through `merge`, byte by byte.
pub fn merge_buf(state: State, buf: &BitBuf, delim: Delim) -> (State, u64) {
    let mut state = state;
    let mut cost = 0;
    for &byte in buf.bytes() {
        let (next, extra) = merge(state, BitString::new(byte as u64, 8), delim);
        state = next;
        cost += extra;
    }
    let (state, extra) = merge(state, buf.tail(), delim);
    (state, cost + extra)
}

/// Escape `data` for inclusion in a literal delimited by `delim`. This is
/// the transformation the cost model prices; the two must stay in step.
pub fn escape(data: &[u8], delim: Delim) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for (i, &byte) in data.iter().enumerate() {
        let next = data.get(i + 1).copied().unwrap_or(0);
        if byte == 0 {
            let form: &[u8] = if OCTAL_DIGITS.contains(&next) {
                b"\\x00"
            } else {
                b"\\0"
            };
            out.extend_from_slice(form);
        } else if byte == b'\r' {
            out.extend_from_slice(b"\\r");
        } else if byte == b'\\' && BACKSLASH_FOLLOWERS.contains(&next) {
            out.extend_from_slice(b"\\\\");
        } else if byte == b'\n' && delim.is_single() {
            out.extend_from_slice(b"\\n");
        } else if byte == delim.quote() && delim.is_single() {
            out.push(b'\\');
            out.push(byte);
        } else {
            out.push(byte);
        }
    }
    out
}
