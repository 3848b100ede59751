/*
 * content_disposition.rs
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

//! Content-Disposition header (RFC 2183).

use std::collections::HashMap;

use super::parameter::parse_parameter_list;
use super::rfc2047::decode_encoded_words;
use super::utils::is_token;

#[derive(Debug, Clone)]
pub struct ContentDisposition {
    disposition_type: String,
    parameter_map: HashMap<String, String>,
}

impl ContentDisposition {
    pub fn get_disposition_type(&self) -> &str {
        &self.disposition_type
    }

    pub fn is_disposition_type(&self, t: &str) -> bool {
        self.disposition_type.eq_ignore_ascii_case(t)
    }

    pub fn is_attachment(&self) -> bool {
        self.is_disposition_type("attachment")
    }

    pub fn get_parameter(&self, name: &str) -> Option<&str> {
        self.parameter_map.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// The `filename` parameter with RFC 2047 encoded-words expanded.
    pub fn filename(&self) -> Option<String> {
        self.get_parameter("filename").map(decode_encoded_words)
    }
}

pub fn parse_content_disposition(value: &str) -> Option<ContentDisposition> {
    let value = value.trim();
    let (disp_part, params_part) = value.split_once(';').unwrap_or((value, ""));
    let disp_part = disp_part.trim();
    if !is_token(disp_part) {
        return None;
    }
    let parameter_map = parse_parameter_list(params_part)
        .into_iter()
        .map(|p| (p.get_name().to_ascii_lowercase(), p.get_value().to_string()))
        .collect();
    Some(ContentDisposition {
        disposition_type: disp_part.to_string(),
        parameter_map,
    })
}
