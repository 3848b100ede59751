/*
 * rfc2047.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tagliacarte, a cross-platform email client.
 *
 * Tagliacarte is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tagliacarte is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tagliacarte.  If not, see <http://www.gnu.org/licenses/>.
 */

//! RFC 2047 encoded-word decoding (e.g. =?charset?q?text?=) and charset conversion
//! for decoded text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::mime::quoted_printable;

/// Expand RFC 2047 encoded-words in the string. Whitespace between two adjacent
/// encoded-words is dropped. Malformed encoded-words are kept literally.
pub fn decode_encoded_words(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    let mut after_word = false;
    while let Some(start) = rest.find("=?") {
        let (literal, candidate) = rest.split_at(start);
        match decode_one_encoded_word(candidate) {
            Some((decoded, consumed)) => {
                if !(after_word && literal.trim().is_empty()) {
                    out.push_str(literal);
                }
                out.push_str(&decoded);
                rest = &candidate[consumed..];
                after_word = true;
            }
            None => {
                out.push_str(literal);
                out.push_str("=?");
                rest = &candidate[2..];
                after_word = false;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decode the encoded-word at the start of `s`. Returns the text and the number of
/// bytes consumed.
fn decode_one_encoded_word(s: &str) -> Option<(String, usize)> {
    let body = s.strip_prefix("=?")?;
    let mut fields = body.splitn(3, '?');
    let charset = fields.next()?;
    let encoding = fields.next()?;
    let remainder = fields.next()?;
    let payload_len = remainder.find("?=")?;
    let payload = &remainder[..payload_len];
    if charset.is_empty() || payload.contains(' ') {
        return None;
    }
    // RFC 2231 language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);
    let bytes = match encoding {
        "B" | "b" => STANDARD.decode(payload).ok()?,
        "Q" | "q" => quoted_printable::decode_q(payload.as_bytes()),
        _ => return None,
    };
    let consumed = 2 + charset_len(body) + 1 + encoding.len() + 1 + payload_len + 2;
    Some((decode_charset(&bytes, charset), consumed))
}

fn charset_len(body: &str) -> usize {
    body.find('?').unwrap_or(0)
}

/// Convert text in `charset` to a String. UTF-8, US-ASCII and ISO-8859-1 are converted
/// exactly; anything else is read as UTF-8 with replacement characters.
pub fn decode_charset(bytes: &[u8], charset: &str) -> String {
    match charset.trim().to_ascii_lowercase().as_str() {
        "iso-8859-1" | "iso_8859-1" | "latin1" | "l1" => bytes.iter().map(|&b| b as char).collect(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}
