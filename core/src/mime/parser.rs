/*
 * parser.rs
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

//! MIME parser: receive(buffer) contract, consume complete lines only, leave remainder
//! for next call.
//!
//! The parser is strict about structure: a multipart entity must carry a valid
//! boundary and be closed by its closing delimiter, part headers must be well formed,
//! and nesting is limited. Leaf bodies are transfer-decoded before they reach the
//! handler.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;

use crate::mime::content_type::parse_content_type;
use crate::mime::handler::{MimeHandler, MimeLocator, MimeParseError};
use crate::mime::quoted_printable;
use crate::mime::utils::{canonical_crlf, header_name, is_valid_boundary, split_header, trim_crlf};

pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Padding optional, trailing bits tolerated: mail clients are sloppy about both.
const TRANSFER_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Event-driven MIME parser. Feed data via receive(); handler gets callbacks.
pub struct MimeParser<H> {
    handler: H,
    state: ParserState,
    /// Incomplete line carried over from previous receive()
    line_buffer: Vec<u8>,
    /// Header line waiting for continuation lines
    pending_header: Option<Vec<u8>>,
    entity: EntityHeaders,
    /// Open multipart entities, innermost last
    frames: Vec<Frame>,
    /// Raw body of the current leaf
    body: Vec<u8>,
    /// Terminator of the last body line; it belongs to the next delimiter if one follows
    pending_eol: Vec<u8>,
    /// Raw first part of a multipart/signed entity
    capture: Option<Capture>,
    max_depth: usize,
    locator: MimeLocator,
}

#[derive(Default)]
struct EntityHeaders {
    content_type: Option<String>,
    transfer_encoding: Option<String>,
}

struct Frame {
    boundary: String,
    signed: bool,
    parts: usize,
}

struct Capture {
    frame: usize,
    data: Vec<u8>,
    eol_len: usize,
}

impl Capture {
    fn push(&mut self, raw: &[u8]) {
        self.data.extend_from_slice(raw);
        self.eol_len = raw.len() - trim_crlf(raw).len();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Init,
    Header,
    Body,
    /// Between the headers of a multipart entity and its first delimiter
    Preamble,
    /// After a closing delimiter
    Epilogue,
}

impl<H: MimeHandler> MimeParser<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            state: ParserState::Init,
            line_buffer: Vec::new(),
            pending_header: None,
            entity: EntityHeaders::default(),
            frames: Vec::new(),
            body: Vec::new(),
            pending_eol: Vec::new(),
            capture: None,
            max_depth: DEFAULT_MAX_DEPTH,
            locator: MimeLocator {
                offset: 0,
                line: 1,
                column: 0,
            },
        }
    }

    /// Maximum number of nested multipart entities.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn into_inner(self) -> H {
        self.handler
    }

    /// Process complete lines from `buf`. The trailing incomplete line is kept until
    /// the next call or close(). Returns the number of bytes accepted.
    pub fn receive(&mut self, buf: &[u8]) -> Result<usize, MimeParseError> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.line_buffer.extend_from_slice(buf);
        let Some(last_newline) = self.line_buffer.iter().rposition(|&b| b == b'\n') else {
            return Ok(buf.len());
        };
        let pending = std::mem::take(&mut self.line_buffer);
        let (complete, rest) = pending.split_at(last_newline + 1);
        self.line_buffer.extend_from_slice(rest);
        for line in complete.split_inclusive(|&b| b == b'\n') {
            self.process_line(line)?;
            self.locator.offset += line.len() as u64;
            self.locator.line += 1;
        }
        Ok(buf.len())
    }

    /// End of input: flush the last line and check that every entity was closed.
    pub fn close(&mut self) -> Result<(), MimeParseError> {
        if !self.line_buffer.is_empty() {
            let line = std::mem::take(&mut self.line_buffer);
            self.process_line(&line)?;
            self.locator.offset += line.len() as u64;
        }
        self.handler.set_locator(self.locator.clone());
        match self.state {
            ParserState::Init => {
                self.handler.start_entity(None)?;
                self.end_headers()?;
            }
            ParserState::Header => self.end_headers()?,
            _ => {}
        }
        if let Some(frame) = self.frames.last() {
            return Err(self.error(format!("missing closing boundary \"{}\"", frame.boundary)));
        }
        if self.state == ParserState::Body {
            self.finish_leaf(true)?;
        }
        self.state = ParserState::Epilogue;
        Ok(())
    }

    fn error(&self, message: impl Into<String>) -> MimeParseError {
        MimeParseError::at(message, &self.locator)
    }

    fn process_line(&mut self, raw: &[u8]) -> Result<(), MimeParseError> {
        let line = trim_crlf(raw);
        let delimiter = if self.state == ParserState::Init {
            None
        } else {
            self.match_delimiter(line)
        };
        if let Some(capture) = self.capture.as_mut() {
            if delimiter.map_or(true, |(index, _)| index > capture.frame) {
                capture.push(raw);
            }
        }
        if let Some((index, closing)) = delimiter {
            return self.delimiter(index, closing);
        }
        match self.state {
            ParserState::Init => {
                self.handler.set_locator(self.locator.clone());
                self.handler.start_entity(None)?;
                if line.is_empty() {
                    return self.end_headers();
                }
                if header_name(line).is_none() {
                    // no header block at all: the whole input is a text/plain body
                    self.end_headers()?;
                    self.body_line(raw);
                    return Ok(());
                }
                self.pending_header = Some(line.to_vec());
                self.state = ParserState::Header;
                Ok(())
            }
            ParserState::Header => self.header_line(line),
            ParserState::Body => {
                self.body_line(raw);
                Ok(())
            }
            ParserState::Preamble => self.handler.unexpected_content(line),
            ParserState::Epilogue => Ok(()),
        }
    }

    /// Innermost open multipart whose delimiter `line` is, and whether it is the
    /// closing delimiter.
    fn match_delimiter(&self, line: &[u8]) -> Option<(usize, bool)> {
        if !line.starts_with(b"--") {
            return None;
        }
        self.frames
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, frame)| delimiter_kind(line, &frame.boundary).map(|closing| (i, closing)))
    }

    fn delimiter(&mut self, index: usize, closing: bool) -> Result<(), MimeParseError> {
        let innermost = self.frames.len() - 1;
        if index != innermost {
            let open = &self.frames[innermost].boundary;
            return Err(self.error(format!("missing closing boundary \"{}\"", open)));
        }
        match self.state {
            ParserState::Header => return Err(self.error("part headers truncated by boundary")),
            ParserState::Body => self.finish_leaf(false)?,
            _ => {}
        }
        if self.capture.as_ref().is_some_and(|c| c.frame == index) {
            self.finish_capture()?;
        }
        self.handler.set_locator(self.locator.clone());
        if closing {
            self.frames.pop();
            let parent = self.frames.last().map(|f| f.boundary.clone());
            self.handler.end_entity(parent.as_deref())?;
            self.state = ParserState::Epilogue;
            return Ok(());
        }
        let frame = &mut self.frames[index];
        frame.parts += 1;
        if frame.signed && frame.parts == 1 {
            self.capture = Some(Capture {
                frame: index,
                data: Vec::new(),
                eol_len: 0,
            });
        }
        let boundary = frame.boundary.clone();
        self.entity = EntityHeaders::default();
        self.handler.start_entity(Some(&boundary))?;
        self.state = ParserState::Header;
        Ok(())
    }

    fn header_line(&mut self, line: &[u8]) -> Result<(), MimeParseError> {
        if line.is_empty() {
            return self.end_headers();
        }
        if line[0] == b' ' || line[0] == b'\t' {
            return match self.pending_header.as_mut() {
                Some(pending) => {
                    pending.extend_from_slice(line);
                    Ok(())
                }
                None => Err(self.error("continuation line without a header field")),
            };
        }
        self.flush_header()?;
        if header_name(line).is_none() {
            return Err(self.error("malformed header line"));
        }
        self.pending_header = Some(line.to_vec());
        Ok(())
    }

    fn flush_header(&mut self) -> Result<(), MimeParseError> {
        let Some(line) = self.pending_header.take() else {
            return Ok(());
        };
        let Some((name, value)) = split_header(&line) else {
            return Ok(());
        };
        let name = String::from_utf8_lossy(name).into_owned();
        let value = String::from_utf8_lossy(value).trim().to_string();
        self.handler.header(&name, &value)?;
        match name.to_ascii_lowercase().as_str() {
            "content-type" => {
                self.handler.content_type(&value)?;
                self.entity.content_type = Some(value);
            }
            "content-disposition" => self.handler.content_disposition(&value)?,
            "content-transfer-encoding" => {
                self.handler.content_transfer_encoding(&value)?;
                self.entity.transfer_encoding = Some(value.to_ascii_lowercase());
            }
            _ => {}
        }
        Ok(())
    }

    fn end_headers(&mut self) -> Result<(), MimeParseError> {
        self.flush_header()?;
        self.handler.end_headers()?;
        let multipart = self
            .entity
            .content_type
            .as_deref()
            .and_then(parse_content_type)
            .filter(|ct| ct.is_primary_type("multipart"));
        let Some(ct) = multipart else {
            self.body.clear();
            self.pending_eol.clear();
            self.state = ParserState::Body;
            return Ok(());
        };
        let boundary = match ct.get_parameter("boundary") {
            Some(b) if is_valid_boundary(b) => b.to_string(),
            _ => return Err(self.error("multipart entity without a valid boundary")),
        };
        if self.frames.len() >= self.max_depth {
            return Err(self.error(format!("MIME nesting deeper than {} levels", self.max_depth)));
        }
        self.frames.push(Frame {
            boundary,
            signed: ct.is_sub_type("signed"),
            parts: 0,
        });
        self.state = ParserState::Preamble;
        Ok(())
    }

    fn body_line(&mut self, raw: &[u8]) {
        let line = trim_crlf(raw);
        self.body.extend_from_slice(&self.pending_eol);
        self.body.extend_from_slice(line);
        self.pending_eol.clear();
        self.pending_eol.extend_from_slice(&raw[line.len()..]);
    }

    /// Deliver the decoded leaf body and end the entity. The final line terminator is
    /// part of the content only when no delimiter follows.
    fn finish_leaf(&mut self, keep_final_eol: bool) -> Result<(), MimeParseError> {
        if keep_final_eol {
            self.body.extend_from_slice(&self.pending_eol);
        }
        self.pending_eol.clear();
        let raw = std::mem::take(&mut self.body);
        let decoded = self.decode_body(raw)?;
        self.handler.body_content(&decoded)?;
        let parent = self.frames.last().map(|f| f.boundary.clone());
        self.handler.end_entity(parent.as_deref())
    }

    fn decode_body(&self, raw: Vec<u8>) -> Result<Vec<u8>, MimeParseError> {
        match self.entity.transfer_encoding.as_deref() {
            Some("base64") => {
                let compact: Vec<u8> = raw.into_iter().filter(|b| !b.is_ascii_whitespace()).collect();
                TRANSFER_BASE64
                    .decode(&compact)
                    .map_err(|e| self.error(format!("invalid base64 content: {}", e)))
            }
            Some("quoted-printable") => Ok(quoted_printable::decode(&raw)),
            _ => Ok(raw),
        }
    }

    fn finish_capture(&mut self) -> Result<(), MimeParseError> {
        if let Some(mut capture) = self.capture.take() {
            let len = capture.data.len() - capture.eol_len;
            capture.data.truncate(len);
            self.handler.signed_content(&canonical_crlf(&capture.data))?;
        }
        Ok(())
    }
}

/// Some(false) for `--boundary`, Some(true) for `--boundary--`, allowing trailing
/// whitespace.
fn delimiter_kind(line: &[u8], boundary: &str) -> Option<bool> {
    let rest = line.strip_prefix(b"--")?.strip_prefix(boundary.as_bytes())?;
    let (closing, rest) = match rest.strip_prefix(b"--") {
        Some(r) => (true, r),
        None => (false, rest),
    };
    rest.iter().all(|&b| b == b' ' || b == b'\t').then_some(closing)
}
