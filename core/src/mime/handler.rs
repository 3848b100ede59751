/*
 * handler.rs
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

//! MIME handler trait: receives parsing events (entity, headers, body).

/// Handler for MIME parsing events (push model). Parser calls these as it reads.
///
/// Every `start_entity` is matched by one `end_entity` unless parsing fails.
pub trait MimeHandler {
    fn set_locator(&mut self, _locator: MimeLocator) {}

    /// A new entity begins. `boundary` is the enclosing multipart boundary (None at top level).
    fn start_entity(&mut self, _boundary: Option<&str>) -> Result<(), MimeParseError> {
        Ok(())
    }

    /// Every header field of the current entity, unfolded, in order.
    fn header(&mut self, _name: &str, _value: &str) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn content_type(&mut self, _content_type: &str) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn content_disposition(&mut self, _value: &str) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn content_transfer_encoding(&mut self, _encoding: &str) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn end_headers(&mut self) -> Result<(), MimeParseError> {
        Ok(())
    }

    /// Transfer-decoded body of a leaf entity.
    fn body_content(&mut self, _data: &[u8]) -> Result<(), MimeParseError> {
        Ok(())
    }

    /// Raw bytes (headers and body, undecoded) of the first part of a multipart/signed
    /// entity with CRLF line endings: the data a detached signature covers.
    fn signed_content(&mut self, _raw: &[u8]) -> Result<(), MimeParseError> {
        Ok(())
    }

    /// Preamble lines of a multipart entity.
    fn unexpected_content(&mut self, _data: &[u8]) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn end_entity(&mut self, _boundary: Option<&str>) -> Result<(), MimeParseError> {
        Ok(())
    }
}

/// Position within the MIME entity for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeLocator {
    pub offset: u64,
    pub line: u64,
    pub column: u64,
}

#[derive(Debug, Clone)]
pub struct MimeParseError {
    pub message: String,
    pub locator: Option<MimeLocator>,
}

impl MimeParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locator: None,
        }
    }

    pub fn at(message: impl Into<String>, locator: &MimeLocator) -> Self {
        Self {
            message: message.into(),
            locator: Some(locator.clone()),
        }
    }
}

impl std::fmt::Display for MimeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.locator {
            Some(l) => write!(f, "{} (line {})", self.message, l.line),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for MimeParseError {}
