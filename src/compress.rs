//! Catalog search over deflaters, delimiters, and wrapper variants.
//!
//! Every candidate is a fully wrapped self-extracting source file; the
//! cheapest one by total byte count wins. The interesting work happens in
//! [`crate::reencode`]; this module is bookkeeping around it.

use crate::escape::{escape, Delim};
use crate::reencode::reencode;
use serde::Serialize;
use std::io::Result;
use std::num::NonZeroU64;

const ZOPFLI_ITERATIONS: &[u64] = &[15, 128];
const MINIZ_LEVELS: &[u8] = &[9, 10];
/// Window sizes offered to the decompressing side, as zlib wbits.
const WINDOWS: &[i32] = &[-10, -9];
const DELIMS: &[Delim] = &[Delim::SingleQuote, Delim::DoubleQuote];

/// How the winning candidate was produced.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub method: String,
    pub window: i32,
    pub delimiter: String,
    pub reencoded: bool,
    pub source_len: usize,
    pub output_len: usize,
}

/// Wrap a payload source in a self-extracting decompression trampoline,
/// choosing the cheapest combination of deflater, delimiter, window, and
/// re-encoding.
pub fn compress(src: &[u8]) -> Result<(Vec<u8>, Report)> {
    let (hoisted, payload) = hoist_import(src);

    let mut best: Option<(Vec<u8>, Report)> = None;
    for (data, method, window) in deflater_runs(payload)? {
        for &delim in DELIMS {
            for use_reencode in [true, false] {
                let body = if use_reencode {
                    reencode(&data, delim)?
                } else {
                    data.clone()
                };

                let mut literal = delim.as_bytes().to_vec();
                literal.extend_from_slice(&escape(&body, delim));
                literal.extend_from_slice(delim.as_bytes());

                let code = wrap(hoisted, &literal, window);
                if best
                    .as_ref()
                    .map_or(true, |(winner, _)| code.len() < winner.len())
                {
                    let report = Report {
                        method: method.clone(),
                        window,
                        delimiter: String::from_utf8_lossy(delim.as_bytes()).into_owned(),
                        reencoded: use_reencode,
                        source_len: src.len(),
                        output_len: code.len(),
                    };
                    best = Some((code, report));
                }
            }
        }
    }

    Ok(best.expect("the candidate catalog is never empty"))
}

/// If the source starts with an import, pull the first module name up into
/// the wrapper's own import statement and drop that line from the payload.
fn hoist_import(src: &[u8]) -> (Option<&[u8]>, &[u8]) {
    let Some(rest) = src.strip_prefix(b"import ") else {
        return (None, src);
    };
    let Some(end) = rest.iter().position(|b| b.is_ascii_whitespace()) else {
        return (None, src);
    };
    let module = &rest[..end];
    if module.is_empty() || rest[end] != b'\n' {
        return (None, src);
    }
    (Some(module), &rest[end + 1..])
}

/// Run every configured deflater and pair each output with the windows the
/// wrapper may announce for it.
fn deflater_runs(src: &[u8]) -> Result<Vec<(Vec<u8>, String, i32)>> {
    let mut runs = Vec::new();

    for &iterations in ZOPFLI_ITERATIONS {
        let options = zopfli::Options {
            iteration_count: NonZeroU64::new(iterations)
                .expect("iteration counts are nonzero"),
            // A single block keeps the stream in re-encodable shape.
            maximum_block_splits: 1,
            ..Default::default()
        };
        let mut out = Vec::new();
        zopfli::compress(options, zopfli::Format::Deflate, src, &mut out)?;
        for &window in WINDOWS {
            runs.push((out.clone(), format!("zopfli(iters={})", iterations), window));
        }
    }

    for &level in MINIZ_LEVELS {
        let out = miniz_oxide::deflate::compress_to_vec(src, level);
        for &window in WINDOWS {
            runs.push((out.clone(), format!("miniz(level={})", level), window));
        }
    }

    Ok(runs)
}

/// Emit the decompression trampoline around an already-delimited literal.
fn wrap(hoisted: Option<&[u8]>, literal: &[u8], window: i32) -> Vec<u8> {
    let mut code = Vec::with_capacity(literal.len() + 64);
    code.extend_from_slice(b"#coding:L1\nimport zlib");
    if let Some(module) = hoisted {
        code.push(b',');
        code.extend_from_slice(module);
    }
    code.extend_from_slice(b"\nexec(zlib.decompress(bytes(");
    code.extend_from_slice(literal);
    code.extend_from_slice(b",\"L1\")");
    match window {
        // ~9 is one byte shorter than -10 and evaluates to the same value.
        -10 => code.extend_from_slice(b",~9"),
        15 => {}
        other => {
            code.push(b',');
            code.extend_from_slice(other.to_string().as_bytes());
        }
    }
    code.extend_from_slice(b"))");
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hoist_import_simple_module() {
        let (hoisted, rest) = hoist_import(b"import re\nprint(re)");
        assert_eq!(hoisted, Some(&b"re"[..]));
        assert_eq!(rest, b"print(re)");
    }

    #[test]
    fn test_hoist_import_not_an_import() {
        let (hoisted, rest) = hoist_import(b"print(1)");
        assert_eq!(hoisted, None);
        assert_eq!(rest, b"print(1)");
    }

    #[test]
    fn test_hoist_import_requires_newline_after_module() {
        let (hoisted, rest) = hoist_import(b"import re, os\nx");
        assert_eq!(hoisted, None);
        assert_eq!(rest, b"import re, os\nx");
    }

    #[test]
    fn test_wrap_window_suffixes() {
        let code = wrap(None, b"'x'", -10);
        assert!(code.ends_with(b",\"L1\"),~9))"));
        let code = wrap(None, b"'x'", -9);
        assert!(code.ends_with(b",\"L1\"),-9))"));
        let code = wrap(None, b"'x'", 15);
        assert!(code.ends_with(b",\"L1\")))"));
    }

    #[test]
    fn test_wrap_hoisted_import() {
        let code = wrap(Some(b"re"), b"'x'", -10);
        assert!(code.starts_with(b"#coding:L1\nimport zlib,re\nexec("));
    }
}
