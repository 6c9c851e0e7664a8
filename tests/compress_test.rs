use litflate::compress::compress;

/// Inverse of the literal escaper, for checking what the wrapper embeds.
/// A lone backslash only ever precedes a byte outside the escape set, so
/// the decoding below is unambiguous.
fn unescape(escaped: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < escaped.len() {
        let byte = escaped[i];
        if byte != b'\\' {
            out.push(byte);
            i += 1;
            continue;
        }
        match escaped.get(i + 1) {
            Some(b'x') => {
                out.push(0);
                i += 4;
            }
            Some(b'0') => {
                out.push(0);
                i += 2;
            }
            Some(b'r') => {
                out.push(b'\r');
                i += 2;
            }
            Some(b'n') => {
                out.push(b'\n');
                i += 2;
            }
            Some(b'\\') => {
                out.push(b'\\');
                i += 2;
            }
            Some(&quote) if quote == b'\'' || quote == b'"' => {
                out.push(quote);
                i += 2;
            }
            _ => {
                out.push(b'\\');
                i += 1;
            }
        }
    }
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Pull the escaped literal body back out of a wrapped program and undo the
/// delimiters and escaping.
fn embedded_body(code: &[u8], delimiter: &str) -> Vec<u8> {
    let start = find(code, b"bytes(").unwrap() + "bytes(".len();
    let end = rfind(code, b",\"L1\")").unwrap();
    let literal = &code[start..end];

    let delim = delimiter.as_bytes();
    assert!(literal.starts_with(delim) && literal.ends_with(delim));
    unescape(&literal[delim.len()..literal.len() - delim.len()])
}

#[test]
fn test_unescape_inverts_known_forms() {
    assert_eq!(unescape(b"\\0z"), b"\x00z");
    assert_eq!(unescape(b"\\x007"), b"\x007");
    assert_eq!(unescape(b"\\r\\n"), b"\r\n");
    assert_eq!(unescape(b"\\\\a"), b"\\a");
    assert_eq!(unescape(b"\\z"), b"\\z");
    assert_eq!(unescape(b"it\\'s"), b"it's");
}

#[test]
fn test_compress_emits_trampoline() {
    let (code, report) = compress(b"print(1)").unwrap();

    assert!(code.starts_with(b"#coding:L1\nimport zlib\nexec(zlib.decompress(bytes("));
    assert!(code.ends_with(b"))"));
    assert_eq!(report.output_len, code.len());
    assert_eq!(report.source_len, b"print(1)".len());
    assert!(matches!(report.window, -10 | -9));
    assert!(report.delimiter == "'" || report.delimiter == "\"");
}

#[test]
fn test_compress_round_trips_payload() {
    let src = b"for i in range(10):print(i*i)";
    let (code, report) = compress(src).unwrap();

    let body = embedded_body(&code, &report.delimiter);
    let payload = miniz_oxide::inflate::decompress_to_vec(&body).unwrap();
    assert_eq!(payload, src);
}

#[test]
fn test_compress_hoists_leading_import() {
    let src = b"import re\nprint(re.escape('a.b'))";
    let (code, report) = compress(src).unwrap();

    assert!(code.starts_with(b"#coding:L1\nimport zlib,re\nexec("));
    let body = embedded_body(&code, &report.delimiter);
    let payload = miniz_oxide::inflate::decompress_to_vec(&body).unwrap();
    assert_eq!(payload, b"print(re.escape('a.b'))");
}

#[test]
fn test_compress_is_deterministic() {
    let src = b"print(sum(range(100)))";
    let (first, _) = compress(src).unwrap();
    let (second, _) = compress(src).unwrap();
    assert_eq!(first, second);
}
