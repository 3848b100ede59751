/*
 * mod.rs
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

//! Event-driven MIME parsing (push/handler model, non-blocking buffer contract) and
//! the collector that turns a decrypted plaintext into reportable parts.

mod content_disposition;
mod content_type;
mod handler;
mod header;
mod parameter;
mod parser;
mod quoted_printable;
mod rfc2047;
mod structure;
mod utils;

pub use content_disposition::{parse_content_disposition, ContentDisposition};
pub use content_type::{parse_content_type, ContentType};
pub use handler::{MimeHandler, MimeLocator, MimeParseError};
pub use header::{HeaderBlock, HeaderField};
pub use parameter::{parse_parameter_list, Parameter};
pub use parser::{MimeParser, DEFAULT_MAX_DEPTH};
pub use rfc2047::decode_encoded_words;
pub use structure::{attachment_filename, parse_mime, MimePart, MimeSignature, ParsedMime, PartialMime};
pub use utils::{is_token, is_valid_boundary};
