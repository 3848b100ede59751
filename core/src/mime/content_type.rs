/*
 * content_type.rs
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

//! Content-Type header (RFC 2045).

use std::collections::HashMap;

use super::parameter::{parse_parameter_list, Parameter};
use super::utils::is_token;

#[derive(Debug, Clone)]
pub struct ContentType {
    primary_type: String,
    sub_type: String,
    parameter_map: HashMap<String, String>,
}

impl ContentType {
    pub fn new(
        primary_type: impl Into<String>,
        sub_type: impl Into<String>,
        parameters: Vec<Parameter>,
    ) -> Self {
        let parameter_map = parameters
            .into_iter()
            .map(|param| (param.get_name().to_ascii_lowercase(), param.get_value().to_string()))
            .collect();
        Self {
            primary_type: primary_type.into(),
            sub_type: sub_type.into(),
            parameter_map,
        }
    }

    /// `text/plain; charset=us-ascii`, the RFC 2045 default.
    pub fn default_text() -> Self {
        Self::new("text", "plain", vec![Parameter::new("charset", "us-ascii")])
    }

    pub fn get_primary_type(&self) -> &str {
        &self.primary_type
    }

    pub fn get_sub_type(&self) -> &str {
        &self.sub_type
    }

    pub fn is_primary_type(&self, t: &str) -> bool {
        self.primary_type.eq_ignore_ascii_case(t)
    }

    pub fn is_sub_type(&self, t: &str) -> bool {
        self.sub_type.eq_ignore_ascii_case(t)
    }

    pub fn is_mime_type(&self, primary: &str, sub: &str) -> bool {
        self.is_primary_type(primary) && self.is_sub_type(sub)
    }

    pub fn get_parameter(&self, name: &str) -> Option<&str> {
        self.parameter_map.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Lowercased `type/subtype`.
    pub fn mime_type(&self) -> String {
        format!(
            "{}/{}",
            self.primary_type.to_ascii_lowercase(),
            self.sub_type.to_ascii_lowercase()
        )
    }
}

/// Parse a Content-Type header value. Returns None when the type is not `token/token`.
pub fn parse_content_type(value: &str) -> Option<ContentType> {
    let value = value.trim();
    let (type_part, params_part) = value.split_once(';').unwrap_or((value, ""));
    let (primary, sub) = type_part.split_once('/')?;
    let (primary, sub) = (primary.trim(), sub.trim());
    if !is_token(primary) || !is_token(sub) {
        return None;
    }
    Some(ContentType::new(primary, sub, parse_parameter_list(params_part)))
}
