/*
 * parameter.rs
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

//! MIME header parameters (RFC 2045 name=value, RFC 2231 extended values).

use percent_encoding::percent_decode_str;

use super::rfc2047::decode_charset;
use super::utils::is_token;

/// One `name=value` parameter of a structured header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_value(&self) -> &str {
        &self.value
    }
}

/// Parse a semicolon-separated parameter list (`name=value; name="value"`).
///
/// Quoted values may contain any octets and backslash escapes. Parameters whose name is
/// not a token are skipped. A `name*=charset''percent-encoded` value is decoded and
/// stored under `name`.
pub fn parse_parameter_list(params_part: &str) -> Vec<Parameter> {
    let bytes = params_part.as_bytes();
    let len = bytes.len();
    let mut parameters = Vec::new();
    let mut pos = 0;

    while pos < len {
        while pos < len && (bytes[pos] == b';' || bytes[pos].is_ascii_whitespace()) {
            pos += 1;
        }
        if pos >= len {
            break;
        }
        let Some(eq) = bytes[pos..].iter().position(|&b| b == b'=' || b == b';') else {
            break;
        };
        let eq = pos + eq;
        if bytes[eq] == b';' {
            pos = eq + 1;
            continue;
        }
        let name = String::from_utf8_lossy(&bytes[pos..eq]).trim().to_string();
        pos = eq + 1;
        while pos < len && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
            pos += 1;
        }
        let value = if pos < len && bytes[pos] == b'"' {
            pos += 1;
            let mut v = Vec::new();
            while pos < len {
                match bytes[pos] {
                    b'\\' if pos + 1 < len => {
                        v.push(bytes[pos + 1]);
                        pos += 2;
                    }
                    b'"' => {
                        pos += 1;
                        break;
                    }
                    c => {
                        v.push(c);
                        pos += 1;
                    }
                }
            }
            String::from_utf8_lossy(&v).into_owned()
        } else {
            let end = bytes[pos..]
                .iter()
                .position(|&b| b == b';')
                .map_or(len, |i| pos + i);
            let v = String::from_utf8_lossy(&bytes[pos..end]).trim().to_string();
            pos = end;
            v
        };
        match name.strip_suffix('*') {
            Some(base) if is_token(base) => {
                let decoded = decode_extended_value(&value).unwrap_or(value);
                parameters.retain(|p: &Parameter| !p.name.eq_ignore_ascii_case(base));
                parameters.push(Parameter::new(base, decoded));
            }
            _ if is_token(&name) => parameters.push(Parameter::new(name, value)),
            _ => {}
        }
    }
    parameters
}

/// RFC 2231 `charset'language'percent-encoded`. Malformed escapes are kept literally.
fn decode_extended_value(value: &str) -> Option<String> {
    let mut fields = value.splitn(3, '\'');
    let charset = fields.next()?;
    let _language = fields.next()?;
    let raw: Vec<u8> = percent_decode_str(fields.next()?).collect();
    Some(decode_charset(&raw, charset))
}
