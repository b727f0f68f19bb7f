//! TXT character-string handling (RFC 1035 §3.3 and §5.1)

use crate::error::{ValidationError, ValidationErrorKind};

/// Longest single character-string
pub const MAX_SEGMENT_LENGTH: usize = 255;

/// Largest RDATA a record can carry
pub const MAX_RDATA_LENGTH: usize = 65535;

/// Parse TXT presentation data into its character-strings.
///
/// Quoted input may hold several strings with `\"`, `\\` and `\DDD` escapes.
/// Unquoted input is taken as raw text and cut into 255-byte strings when
/// `auto_quote` is set.
pub fn parse_character_strings(
    input: &str,
    auto_quote: bool,
) -> Result<Vec<Vec<u8>>, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ValidationError::value(
            ValidationErrorKind::MissingField,
            "text content is empty",
        ));
    }

    let segments = if input.starts_with('"') {
        parse_quoted(input.as_bytes())?
    } else if auto_quote {
        chunk_text(input)
    } else {
        return Err(ValidationError::value(
            ValidationErrorKind::InvalidText,
            "text content must be enclosed in double quotes",
        ));
    };

    let rdata_len: usize = segments.iter().map(|s| s.len() + 1).sum();
    if rdata_len > MAX_RDATA_LENGTH {
        return Err(ValidationError::value(
            ValidationErrorKind::TextTooLong,
            format!("{} bytes of text exceeds {}", rdata_len, MAX_RDATA_LENGTH),
        ));
    }
    Ok(segments)
}

/// Cut text into character-strings without splitting a UTF-8 sequence
fn chunk_text(text: &str) -> Vec<Vec<u8>> {
    let mut segments = Vec::new();
    let mut current = Vec::with_capacity(MAX_SEGMENT_LENGTH);
    for c in text.chars() {
        let mut buf = [0; 4];
        let encoded = c.encode_utf8(&mut buf).as_bytes();
        if current.len() + encoded.len() > MAX_SEGMENT_LENGTH {
            segments.push(std::mem::take(&mut current));
        }
        current.extend_from_slice(encoded);
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

fn parse_quoted(input: &[u8]) -> Result<Vec<Vec<u8>>, ValidationError> {
    let mut segments = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        if input[pos].is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        if input[pos] != b'"' {
            return Err(invalid_text("text outside of double quotes"));
        }
        pos += 1;

        let mut segment = Vec::new();
        loop {
            let Some(&byte) = input.get(pos) else {
                return Err(invalid_text("unterminated quoted string"));
            };
            pos += 1;
            match byte {
                b'"' => break,
                b'\\' => {
                    let (unescaped, used) = unescape(&input[pos..])?;
                    segment.push(unescaped);
                    pos += used;
                }
                _ => segment.push(byte),
            }
        }

        if segment.len() > MAX_SEGMENT_LENGTH {
            return Err(ValidationError::value(
                ValidationErrorKind::SegmentTooLong,
                format!(
                    "character string of {} bytes exceeds {}",
                    segment.len(),
                    MAX_SEGMENT_LENGTH
                ),
            ));
        }
        if input.get(pos).is_some_and(|b| !b.is_ascii_whitespace()) {
            return Err(invalid_text("quoted strings must be separated by spaces"));
        }
        segments.push(segment);
    }

    Ok(segments)
}

/// Decode the escape following a backslash; returns the byte and the number
/// of input bytes consumed
fn unescape(rest: &[u8]) -> Result<(u8, usize), ValidationError> {
    match rest {
        [a, b, c, ..] if a.is_ascii_digit() && b.is_ascii_digit() && c.is_ascii_digit() => {
            let value =
                u32::from(a - b'0') * 100 + u32::from(b - b'0') * 10 + u32::from(c - b'0');
            let byte = u8::try_from(value)
                .map_err(|_| invalid_text(format!("escape \\{} is out of range", value)))?;
            Ok((byte, 3))
        }
        [first, ..] if first.is_ascii_digit() => {
            Err(invalid_text("numeric escapes need exactly three digits"))
        }
        [other, ..] => Ok((*other, 1)),
        [] => Err(invalid_text("dangling backslash")),
    }
}

fn invalid_text(reason: impl Into<String>) -> ValidationError {
    ValidationError::value(ValidationErrorKind::InvalidText, reason)
}

/// Format character-strings as quoted, escaped presentation data
pub fn format_character_strings(segments: &[Vec<u8>]) -> String {
    segments
        .iter()
        .map(|segment| format_segment(segment))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn format_segment(segment: &[u8]) -> String {
    let mut out = String::with_capacity(segment.len() + 2);
    out.push('"');
    match std::str::from_utf8(segment) {
        Ok(text) => {
            for c in text.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    c if c.is_ascii_control() => out.push_str(&format!("\\{:03}", c as u32)),
                    c => out.push(c),
                }
            }
        }
        Err(_) => {
            for &byte in segment {
                match byte {
                    b'"' => out.push_str("\\\""),
                    b'\\' => out.push_str("\\\\"),
                    0x20..=0x7e => out.push(char::from(byte)),
                    _ => out.push_str(&format!("\\{:03}", byte)),
                }
            }
        }
    }
    out.push('"');
    out
}
