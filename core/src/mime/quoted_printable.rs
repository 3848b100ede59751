/*
 * quoted_printable.rs
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

//! Quoted-Printable decoder for Content-Transfer-Encoding (RFC 2045) and the
//! RFC 2047 "Q" encoding.

const HEX_DECODE: [i8; 256] = {
    let mut t = [-1i8; 256];
    let mut i = 0u8;
    while i < 10 {
        t[(b'0' + i) as usize] = i as i8;
        i += 1;
    }
    let mut i = 0u8;
    while i < 6 {
        t[(b'A' + i) as usize] = (10 + i) as i8;
        t[(b'a' + i) as usize] = (10 + i) as i8;
        i += 1;
    }
    t
};

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let h = HEX_DECODE[hi as usize];
    let l = HEX_DECODE[lo as usize];
    if h < 0 || l < 0 {
        None
    } else {
        Some(((h as u8) << 4) | l as u8)
    }
}

/// Decode a complete quoted-printable body. Handles =XX escapes and soft line breaks
/// (=CRLF, =LF, and = followed by trailing whitespace). Malformed escapes are kept
/// literally.
pub fn decode(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut pos = 0;
    while pos < src.len() {
        let b = src[pos];
        if b != b'=' {
            out.push(b);
            pos += 1;
            continue;
        }
        if let (Some(&hi), Some(&lo)) = (src.get(pos + 1), src.get(pos + 2)) {
            if let Some(v) = hex_pair(hi, lo) {
                out.push(v);
                pos += 3;
                continue;
            }
        }
        // soft line break, possibly with transport padding before the newline
        let mut end = pos + 1;
        while end < src.len() && (src[end] == b' ' || src[end] == b'\t') {
            end += 1;
        }
        match (src.get(end), src.get(end + 1)) {
            (Some(b'\r'), Some(b'\n')) => pos = end + 2,
            (Some(b'\n'), _) => pos = end + 1,
            (None, _) => pos = end,
            _ => {
                out.push(b);
                pos += 1;
            }
        }
    }
    out
}

/// RFC 2047 "Q" encoding: underscore is space, otherwise quoted-printable.
pub fn decode_q(src: &[u8]) -> Vec<u8> {
    let replaced: Vec<u8> = src.iter().map(|&b| if b == b'_' { b' ' } else { b }).collect();
    decode(&replaced)
}
