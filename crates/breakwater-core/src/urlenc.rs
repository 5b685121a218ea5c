//! Percent-encoding and -decoding for paths and query values.
//!
//! Decoding is total: malformed `%` sequences are passed through literally
//! rather than rejected, so hostile input can never make decoding fail.
//! Decoding is deliberately not idempotent — a percent sign produced by one
//! decode pass is not decoded again.

/// Decode a percent-encoded byte sequence.
///
/// `%HH` with two hex digits becomes the decoded byte, `+` becomes a space
/// (query-string convention), everything else passes through. A `%` that is
/// not followed by two hex digits is emitted literally and scanning resumes
/// at the next byte.
#[must_use]
pub fn decode(input: &[u8]) -> Vec<u8> {
    decode_inner(input, true)
}

/// Decode a percent-encoded path segment.
///
/// Identical to [`decode`] except `+` is kept literal: paths do not use the
/// form-encoding space convention.
#[must_use]
pub fn decode_path_component(input: &[u8]) -> Vec<u8> {
    decode_inner(input, false)
}

fn decode_inner(input: &[u8], plus_as_space: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        match input[i] {
            b'%' if i + 2 < input.len() => {
                if let (Some(hi), Some(lo)) = (hex_digit(input[i + 1]), hex_digit(input[i + 2])) {
                    out.push(hi << 4 | lo);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            b'+' if plus_as_space => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

/// Split a path on `/`, drop empty segments, and decode each one.
///
/// Leading, trailing, and doubled slashes all produce empty segments, which
/// are discarded, so `/a//b/` and `a/b` split identically. Decoded bytes are
/// converted to strings lossily.
#[must_use]
pub fn split_and_decode_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            String::from_utf8_lossy(&decode_path_component(segment.as_bytes())).into_owned()
        })
        .collect()
}

/// Percent-encode arbitrary bytes.
///
/// The unreserved set `A-Z a-z 0-9 - . _ ~` passes through; every other
/// byte is emitted as `%HH` with uppercase hex.
#[must_use]
pub fn encode(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input {
        if matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX_UPPER[(b >> 4) as usize] as char);
            out.push(HEX_UPPER[(b & 0x0f) as usize] as char);
        }
    }
    out
}

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
