//! Compact delta codec.
//!
//! A delta encodes a diff against a known source text as tab-separated
//! tokens: `=N` keeps N code units, `-N` deletes N code units, `+text`
//! inserts percent-encoded text. The insert encoding matches the JS
//! `encodeURI` character set except that `%20` is emitted as a literal
//! space, which keeps common prose deltas readable on the wire.

use crate::error::{TextDiffError, TextDiffResult};
use crate::ops::{Diff, DiffList, DiffOp};
use crate::units::{text_of, units_of, utf16_len};

/// Encodes a diff as a delta string relative to its source text.
pub fn to_delta(diffs: &[Diff]) -> String {
    let mut tokens: Vec<String> = Vec::with_capacity(diffs.len());
    for diff in diffs {
        match diff.op {
            DiffOp::Insert => tokens.push(format!("+{}", encode_uri(&diff.text))),
            DiffOp::Delete => tokens.push(format!("-{}", utf16_len(&diff.text))),
            DiffOp::Equal => tokens.push(format!("={}", utf16_len(&diff.text))),
        }
    }
    tokens.join("\t")
}

/// Decodes a delta string against its source text, reproducing the diff.
///
/// # Errors
///
/// Fails on unknown tokens, malformed escapes, counts that overrun the
/// source text, or a delta that does not cover the source text exactly.
pub fn from_delta(text1: &str, delta: &str) -> TextDiffResult<DiffList> {
    let units = units_of(text1);
    let mut diffs: DiffList = Vec::new();
    let mut pointer = 0usize;

    for token in delta.split('\t') {
        if token.is_empty() {
            // Blank tokens are ok (from a trailing \t).
            continue;
        }
        let kind = token.chars().next().unwrap_or('?');
        let param = &token[kind.len_utf8()..];
        match kind {
            '+' => {
                let text = decode_uri(param)?;
                if !text.is_empty() {
                    diffs.push(Diff::insert(text));
                }
            }
            '-' | '=' => {
                let n: usize = param.parse().map_err(|_| {
                    TextDiffError::invalid_delta(format!("bad count in token {token:?}"))
                })?;
                let end = pointer.checked_add(n).filter(|&e| e <= units.len()).ok_or_else(
                    || {
                        TextDiffError::invalid_delta(format!(
                            "token {token:?} overruns source text ({} units)",
                            units.len()
                        ))
                    },
                )?;
                let text = text_of(&units[pointer..end]);
                pointer = end;
                if kind == '=' {
                    diffs.push(Diff::equal(text));
                } else {
                    diffs.push(Diff::delete(text));
                }
            }
            _ => {
                return Err(TextDiffError::invalid_delta(format!(
                    "unknown token kind {kind:?}"
                )))
            }
        }
    }

    if pointer != units.len() {
        return Err(TextDiffError::invalid_delta(format!(
            "delta covered {pointer} of {} source units",
            units.len()
        )));
    }
    Ok(diffs)
}

/// Characters left bare by the insert encoding, mirroring JS `encodeURI`
/// plus the literal space.
fn is_uri_safe(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            ' ' | ';' | ',' | '/' | '?' | ':' | '@' | '&' | '=' | '+' | '$' | '-' | '_' | '.'
                | '!' | '~' | '*' | '\'' | '(' | ')' | '#'
        )
}

pub(crate) fn encode_uri(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_uri_safe(c) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

pub(crate) fn decode_uri(text: &str) -> TextDiffResult<String> {
    let mut bytes: Vec<u8> = Vec::with_capacity(text.len());
    let mut chars = text.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '%' {
            let hex = text.get(i + 1..i + 3).ok_or_else(|| {
                TextDiffError::BadEscape(text.to_string())
            })?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| TextDiffError::BadEscape(text.to_string()))?;
            bytes.push(byte);
            // Skip the two hex digits.
            chars.next();
            chars.next();
        } else {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }
    String::from_utf8(bytes).map_err(|_| TextDiffError::BadEscape(text.to_string()))
}
