//! Huffman tables for a dynamic DEFLATE block: header parsing on the way in,
//! canonical symbol-to-code tables on the way out.
//!
//! The parser records the exact bit extent of the header it consumed so the
//! re-encoded block can carry the identical tables.

use crate::bit_stream::{BitBuf, BitReader, BitString};
use std::io::{Error, ErrorKind, Result};

const BFINAL_LEN: usize = 1;
const BFINAL_VALUE: usize = 1;

const BTYPE_LEN: usize = 2;
const BTYPE_DYNAMIC_HUFFMAN: usize = 0b10;

/// End of block symbol in the literal/length alphabet.
pub const END_BLOCK_CODE: usize = 256;

const HLIT_LEN: usize = 5;
const HLIT_BASE: usize = 257;
const HDIST_LEN: usize = 5;
const HDIST_BASE: usize = 1;
const HCLEN_LEN: usize = 4;
const HCLEN_BASE: usize = 4;

const DYN_ALPHABET_CODE_NUM: usize = 19;
const DYN_ALPHABET_CODE_LEN: usize = 3;
const DYN_ALPHABET_TABLE_MAX_BITS: u8 = 7;

/// Dynamic Huffman Tree code lengths alphabet order.
/// Defined in RFC 1951, section 3.2.7.
pub const CODE_LENGTH_ORDER: [usize; DYN_ALPHABET_CODE_NUM] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Length code table for DEFLATE.
/// length_code_table[i] = (length_code, length_base, extra_bits)
const LENGTH_CODE_TABLE: &[(usize, usize, usize)] = &[
    (257, 3, 0),
    (258, 4, 0),
    (259, 5, 0),
    (260, 6, 0),
    (261, 7, 0),
    (262, 8, 0),
    (263, 9, 0),
    (264, 10, 0),
    (265, 11, 1),
    (266, 13, 1),
    (267, 15, 1),
    (268, 17, 1),
    (269, 19, 2),
    (270, 23, 2),
    (271, 27, 2),
    (272, 31, 2),
    (273, 35, 3),
    (274, 43, 3),
    (275, 51, 3),
    (276, 59, 3),
    (277, 67, 4),
    (278, 83, 4),
    (279, 99, 4),
    (280, 115, 4),
    (281, 131, 5),
    (282, 163, 5),
    (283, 195, 5),
    (284, 227, 5),
    (285, 258, 0),
];

/// Distance code table for DEFLATE.
/// distance_code_table[i] = (distance_code, distance_base, extra_bits)
const DISTANCE_CODE_TABLE: &[(usize, usize, usize)] = &[
    (0, 1, 0),
    (1, 2, 0),
    (2, 3, 0),
    (3, 4, 0),
    (4, 5, 1),
    (5, 7, 1),
    (6, 9, 2),
    (7, 13, 2),
    (8, 17, 3),
    (9, 25, 3),
    (10, 33, 4),
    (11, 49, 4),
    (12, 65, 5),
    (13, 97, 5),
    (14, 129, 6),
    (15, 193, 6),
    (16, 257, 7),
    (17, 385, 7),
    (18, 513, 8),
    (19, 769, 8),
    (20, 1025, 9),
    (21, 1537, 9),
    (22, 2049, 10),
    (23, 3073, 10),
    (24, 4097, 11),
    (25, 6145, 11),
    (26, 8193, 12),
    (27, 12289, 12),
    (28, 16385, 13),
    (29, 24577, 13),
];

/// Huffman tree lookup table, used to decode the code-length alphabet of the
/// block header.
///
/// The table size is 2^max_bits. Every index whose low bits equal a code (in
/// wire order) is filled with that code's symbol, so a peek of max_bits bits
/// resolves a symbol in one step.
#[derive(Debug, Clone)]
pub struct HuffmanLookupTable {
    pub table: Vec<(usize, u8)>,
    pub max_bits: u8,
}

impl HuffmanLookupTable {
    /// Build the lookup table from per-symbol code lengths.
    pub fn new(code_len: &[u8], max_bits: u8) -> Self {
        assert!(max_bits <= usize::BITS as u8);
        let mut table = vec![(0, 0); 1 << max_bits];

        // Count the number of codes for each code length. Unused symbols
        // take no code space.
        let mut bl_count = vec![0; max_bits as usize + 1];
        code_len.iter().for_each(|&len| bl_count[len as usize] += 1);
        bl_count[0] = 0;

        // Find the numerical value of the smallest code for each code length.
        let mut next_code = vec![0usize; max_bits as usize + 2];
        let mut code = 0;
        bl_count.iter().enumerate().for_each(|(bits, &count)| {
            code = (code + count) << 1;
            next_code[bits + 1] = code;
        });

        // Fill the lookup table.
        code_len
            .iter()
            .enumerate()
            .filter(|(_, &len)| len != 0)
            .for_each(|(symbol, &len)| {
                let code = next_code[len as usize];
                next_code[len as usize] += 1;

                // code is len bits long, so there are max_bits - len bits left.
                let shift = max_bits - len;
                let start = code << shift;
                let end = start + (1 << shift);

                for i in start..end {
                    // Huffman codes are read LSB first, so the index is the
                    // bit-reverse of the padded code.
                    let rev = i.reverse_bits();
                    let rev_left = rev >> (usize::BITS as u8 - max_bits);
                    table[rev_left] = (symbol, len);
                }
            });

        Self { table, max_bits }
    }

    pub fn get(&self, code: usize) -> Option<(usize, u8)> {
        // Only use the least significant max_bits bits.
        let mask = (1 << self.max_bits) - 1;
        let code = code & mask;
        self.table.get(code).cloned()
    }
}

/// Canonical symbol-to-code table, codes stored bit-reversed so they can be
/// appended to an LSB-first stream directly.
#[derive(Debug, Clone)]
pub struct EncodeTable {
    codes: Vec<Option<BitString>>,
}

impl EncodeTable {
    /// Build codes from per-symbol code lengths by the canonical walk:
    /// symbols ordered by (length, symbol), each code one more than the
    /// previous, left-shifted when the length grows.
    pub fn new(code_len: &[u8]) -> Self {
        let mut syms: Vec<usize> = (0..code_len.len()).collect();
        syms.sort_by_key(|&sym| (code_len[sym], sym));

        let mut codes = vec![None; code_len.len()];
        let mut code: u64 = 0;
        let mut length: u8 = 0;
        for sym in syms {
            let len = code_len[sym];
            if len == 0 {
                continue;
            }
            code <<= len - length;
            length = len;
            let rev = code.reverse_bits() >> (u64::BITS as u8 - len);
            codes[sym] = Some(BitString::new(rev, len as usize));
            code += 1;
        }
        Self { codes }
    }

    pub fn get(&self, sym: usize) -> Option<BitString> {
        self.codes.get(sym).copied().flatten()
    }
}

/// The parsed header of a single dynamic-Huffman block.
#[derive(Debug, Clone)]
pub struct BlockTables {
    /// Codes for the literal/length alphabet (0..=285).
    pub lit: EncodeTable,
    /// Codes for the distance alphabet (0..=29).
    pub dist: EncodeTable,
    /// The header bits exactly as they appeared in the input.
    pub raw: BitBuf,
}

impl BlockTables {
    /// Parse the header of `deflate`, which must start a final
    /// dynamic-Huffman block.
    pub fn parse(deflate: &[u8]) -> Result<Self> {
        let mut reader = BitReader::new(deflate);

        let bfinal = reader.read_bits(BFINAL_LEN);
        let btype = reader.read_bits(BTYPE_LEN);
        if bfinal != BFINAL_VALUE || btype != BTYPE_DYNAMIC_HUFFMAN {
            return Err(invalid_block_type());
        }

        let hlit = reader.read_bits(HLIT_LEN) + HLIT_BASE;
        let hdist = reader.read_bits(HDIST_LEN) + HDIST_BASE;
        let hclen = reader.read_bits(HCLEN_LEN) + HCLEN_BASE;

        let mut alphabet_code_len = vec![0u8; DYN_ALPHABET_CODE_NUM];
        (0..hclen).for_each(|i| {
            alphabet_code_len[CODE_LENGTH_ORDER[i]] =
                reader.read_bits(DYN_ALPHABET_CODE_LEN) as u8;
        });
        let alphabet_table =
            HuffmanLookupTable::new(&alphabet_code_len, DYN_ALPHABET_TABLE_MAX_BITS);

        // Lengths for both alphabets are decoded as one sequence: a run is
        // allowed to cross the literal/distance boundary.
        let lengths = read_code_lengths(&mut reader, &alphabet_table, hlit + hdist)?;

        let used = reader.bit_position();

        Ok(Self {
            lit: EncodeTable::new(&lengths[..hlit]),
            dist: EncodeTable::new(&lengths[hlit..]),
            raw: BitBuf::from_bits(deflate, used),
        })
    }

    /// Code for a literal byte or the end-of-block symbol.
    pub fn encode_lit(&self, sym: usize) -> Option<BitString> {
        self.lit.get(sym)
    }

    /// Code plus extra bits for a match length. The table rows are scanned in
    /// order, so length 258 resolves to symbol 284 with all-ones extra bits
    /// and symbol 285 is never chosen.
    pub fn encode_len(&self, len: usize) -> Option<BitString> {
        if len < 3 {
            return None;
        }
        for &(sym, base, extra_bits) in LENGTH_CODE_TABLE {
            if len < base + (1 << extra_bits) {
                let code = self.lit.get(sym)?;
                return Some(code + BitString::new((len - base) as u64, extra_bits));
            }
        }
        None
    }

    /// Code plus extra bits for a match distance.
    pub fn encode_dist(&self, dist: usize) -> Option<BitString> {
        if dist < 1 {
            return None;
        }
        for &(sym, base, extra_bits) in DISTANCE_CODE_TABLE {
            if dist < base + (1 << extra_bits) {
                let code = self.dist.get(sym)?;
                return Some(code + BitString::new((dist - base) as u64, extra_bits));
            }
        }
        None
    }
}

/// Resolve one symbol from the Huffman table.
fn resolve_symbol(reader: &mut BitReader, table: &HuffmanLookupTable) -> Option<usize> {
    let peek_code = reader.try_peek_bits(table.max_bits as usize)?;
    let (symbol, len) = table.get(peek_code)?;
    if len == 0 {
        return None;
    }
    reader.try_advance(len as usize)?;
    Some(symbol)
}

/// Read `num` code lengths using the code-length alphabet.
/// Defined in RFC 1951, section 3.2.7.
fn read_code_lengths(
    reader: &mut BitReader,
    alphabet_table: &HuffmanLookupTable,
    num: usize,
) -> Result<Vec<u8>> {
    let mut code_lengths = vec![0u8; num];
    let mut i = 0;
    while i < num {
        let symbol = resolve_symbol(reader, alphabet_table).ok_or_else(invalid_huffman_symbol)?;
        match symbol {
            0..=15 => {
                // 0-15: represent code lengths of 0-15
                code_lengths[i] = symbol as u8;
                i += 1;
            }
            16 => {
                // 16: copy the previous code length 3-6 times
                let repeat_len = 3 + reader.read_bits(2);
                let prev_len = *code_lengths
                    .get(i.wrapping_sub(1))
                    .ok_or_else(invalid_huffman_symbol)?;
                if i + repeat_len > num {
                    return Err(invalid_length_run());
                }
                for _ in 0..repeat_len {
                    code_lengths[i] = prev_len;
                    i += 1;
                }
            }
            17 => {
                // 17: repeat code length of 0 for 3-10 times
                let repeat_len = 3 + reader.read_bits(3);
                if i + repeat_len > num {
                    return Err(invalid_length_run());
                }
                i += repeat_len;
            }
            18 => {
                // 18: repeat code length of 0 for 11-138 times
                let repeat_len = 11 + reader.read_bits(7);
                if i + repeat_len > num {
                    return Err(invalid_length_run());
                }
                i += repeat_len;
            }
            _ => Err(invalid_huffman_symbol())?,
        }
    }
    Ok(code_lengths)
}

/// For the sake of simplicity, we use the io::Error type for all errors.
/// Invalid Huffman symbol error.
fn invalid_huffman_symbol() -> Error {
    Error::new(ErrorKind::InvalidData, "Invalid Huffman symbol")
}

/// Invalid block type error.
fn invalid_block_type() -> Error {
    Error::new(ErrorKind::InvalidData, "Invalid block type")
}

/// Code length run overflowing the declared alphabet sizes.
fn invalid_length_run() -> Error {
    Error::new(ErrorKind::InvalidData, "Invalid code length run")
}
