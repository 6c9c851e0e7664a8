//! # litflate
//! Size optimization for source payloads shipped inside a self-extracting
//! string literal. An external deflater produces a dynamic-Huffman DEFLATE
//! block; this library re-runs the block's LZ77 match selection with a cost
//! function that prices each output byte as it will appear after
//! string-literal escaping, so the wrapped program gets shorter even when
//! the raw stream does not. The surrounding driver escapes the bytes, wraps
//! them in a decompression trampoline, and keeps the cheapest of all
//! deflater, delimiter, and window combinations.
pub mod bit_stream;

pub mod huffman;

pub mod escape;

pub mod reencode;

pub mod compress;
