/*
 * structure.rs
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

//! Collects parser events into the parts of a decrypted message: body, attachments,
//! encrypted headers and an embedded detached signature.

use tracing::debug;

use super::content_disposition::{parse_content_disposition, ContentDisposition};
use super::content_type::{parse_content_type, ContentType};
use super::handler::{MimeHandler, MimeParseError};
use super::header::{HeaderBlock, HeaderField};
use super::parser::MimeParser;
use super::rfc2047::{decode_charset, decode_encoded_words};
use crate::config::Config;

/// One unit of output, in report order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimePart {
    /// Human-readable content, charset-decoded. `content_type` is lowercase
    /// `type/subtype`.
    Body { content: String, content_type: String },
    /// `headers` are the part's header fields as `Name: value\r\n` lines; `data` is
    /// transfer-decoded.
    Attachment { headers: String, data: Vec<u8> },
    /// Header fields found inside the encryption envelope.
    EncryptedHeaders { headers: String },
}

/// First part of a multipart/signed entity with its detached signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeSignature {
    /// Raw signed part, exactly as covered by the signature.
    pub content: Vec<u8>,
    /// ASCII-armored signature.
    pub armored: String,
}

/// Successfully parsed plaintext.
#[derive(Debug, Clone)]
pub struct ParsedMime {
    /// Attachments in document order, then encrypted headers (if any), then the body.
    pub parts: Vec<MimePart>,
    pub signature: Option<MimeSignature>,
}

impl ParsedMime {
    pub fn body(&self) -> Option<(&str, &str)> {
        self.parts.iter().find_map(|p| match p {
            MimePart::Body {
                content,
                content_type,
            } => Some((content.as_str(), content_type.as_str())),
            _ => None,
        })
    }

    pub fn attachments(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.parts.iter().filter_map(|p| match p {
            MimePart::Attachment { headers, data } => Some((headers.as_str(), data.as_slice())),
            _ => None,
        })
    }

    pub fn encrypted_headers(&self) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            MimePart::EncryptedHeaders { headers } => Some(headers.as_str()),
            _ => None,
        })
    }
}

/// Parts completed before a structural error, in report order, and the error.
#[derive(Debug, Clone)]
pub struct PartialMime {
    pub parts: Vec<MimePart>,
    pub error: MimeParseError,
}

/// Parse decrypted plaintext. `outer_headers` are the unencrypted transport headers;
/// encrypted header fields that repeat one of them verbatim are dropped when
/// `config.omit_outer_headers` is set.
pub fn parse_mime(
    plaintext: &[u8],
    outer_headers: Option<&HeaderBlock>,
    config: &Config,
) -> Result<ParsedMime, PartialMime> {
    let mut parser = MimeParser::new(Collector::default()).with_max_depth(config.max_nesting_depth);
    let outcome = parser.receive(plaintext).and_then(|_| parser.close());
    let collector = parser.into_inner();
    let outer = outer_headers.filter(|_| config.omit_outer_headers);
    match outcome {
        Ok(()) => Ok(collector.finish(outer)),
        Err(error) => {
            debug!(%error, "plaintext is not well-formed MIME");
            Err(PartialMime {
                parts: collector.completed_parts(outer),
                error,
            })
        }
    }
}

/// File name of an attachment from its rendered headers: the Content-Disposition
/// `filename` parameter, else the Content-Type `name` parameter, with RFC 2047
/// encoded-words expanded.
pub fn attachment_filename(headers: &str) -> Option<String> {
    let block = HeaderBlock::parse(headers);
    block
        .get("content-disposition")
        .and_then(parse_content_disposition)
        .and_then(|cd| cd.filename())
        .or_else(|| {
            block
                .get("content-type")
                .and_then(parse_content_type)
                .and_then(|ct| ct.get_parameter("name").map(decode_encoded_words))
        })
}

#[derive(Default)]
struct Entity {
    headers: HeaderBlock,
    content_type: Option<ContentType>,
    disposition: Option<ContentDisposition>,
    /// Position among the parent's children
    index: usize,
    children: usize,
}

impl Entity {
    fn is_multipart(&self, sub_type: &str) -> bool {
        self.content_type
            .as_ref()
            .is_some_and(|ct| ct.is_mime_type("multipart", sub_type))
    }

    fn is_attachment(&self, ct: &ContentType) -> bool {
        self.disposition
            .as_ref()
            .is_some_and(|cd| cd.is_attachment() || cd.get_parameter("filename").is_some())
            || !ct.is_primary_type("text")
    }
}

#[derive(Default)]
struct Collector {
    stack: Vec<Entity>,
    top_headers: Option<HeaderBlock>,
    body: Option<MimePart>,
    attachments: Vec<MimePart>,
    /// Fields of a text/rfc822-headers display part
    display_headers: Option<HeaderBlock>,
    signed_content: Option<Vec<u8>>,
    detached_signature: Option<String>,
}

impl Collector {
    fn leaf(&mut self, data: &[u8]) {
        let depth = self.stack.len();
        let Some(leaf) = self.stack.last() else {
            return;
        };
        let parent = depth.checked_sub(2).and_then(|i| self.stack.get(i));
        let in_alternative = self.stack[..depth - 1].iter().any(|e| e.is_multipart("alternative"));
        let ct = leaf.content_type.clone().unwrap_or_else(ContentType::default_text);

        let Some(parent) = parent else {
            self.body = Some(body_part(&ct, data));
            return;
        };
        if parent.is_multipart("signed")
            && leaf.index == 1
            && ct.is_mime_type("application", "pgp-signature")
        {
            self.detached_signature = Some(String::from_utf8_lossy(data).into_owned());
            return;
        }
        let attachment = leaf.is_attachment(&ct);
        if !attachment && ct.is_sub_type("rfc822-headers") && self.display_headers.is_none() {
            self.display_headers = Some(HeaderBlock::parse(&String::from_utf8_lossy(data)));
            return;
        }
        let readable = ct.is_mime_type("text", "plain") || ct.is_mime_type("text", "html");
        if !attachment && readable && self.body.is_none() {
            self.body = Some(body_part(&ct, data));
        } else if !attachment && in_alternative {
            debug!(content_type = %ct.mime_type(), "dropping alternative rendering");
        } else {
            self.attachments.push(MimePart::Attachment {
                headers: leaf.headers.to_string(),
                data: data.to_vec(),
            });
        }
    }

    fn encrypted_headers(&self, outer: Option<&HeaderBlock>) -> Option<HeaderBlock> {
        let top = self.top_headers.as_ref()?.filter(|f| !is_content_field(f));
        let chosen = match (&self.display_headers, top.is_empty()) {
            (Some(display), true) => display.clone(),
            _ => top,
        };
        Some(match outer {
            Some(outer) => chosen.filter(|f| !outer.contains(f)),
            None => chosen,
        })
    }

    fn completed_parts(mut self, outer: Option<&HeaderBlock>) -> Vec<MimePart> {
        let mut parts = std::mem::take(&mut self.attachments);
        if let Some(headers) = self.encrypted_headers(outer).filter(|h| !h.is_empty()) {
            parts.push(MimePart::EncryptedHeaders {
                headers: headers.to_string(),
            });
        }
        parts.extend(self.body.take());
        parts
    }

    fn finish(mut self, outer: Option<&HeaderBlock>) -> ParsedMime {
        let signature = match (self.signed_content.take(), self.detached_signature.take()) {
            (Some(content), Some(armored)) => Some(MimeSignature { content, armored }),
            _ => None,
        };
        if self.body.is_none() {
            self.body = Some(MimePart::Body {
                content: String::new(),
                content_type: "text/plain".to_string(),
            });
        }
        ParsedMime {
            parts: self.completed_parts(outer),
            signature,
        }
    }
}

fn body_part(ct: &ContentType, data: &[u8]) -> MimePart {
    MimePart::Body {
        content: decode_charset(data, ct.get_parameter("charset").unwrap_or("us-ascii")),
        content_type: ct.mime_type(),
    }
}

fn is_content_field(field: &HeaderField) -> bool {
    let name = field.name.to_ascii_lowercase();
    name.starts_with("content-") || name == "mime-version"
}

impl MimeHandler for Collector {
    fn start_entity(&mut self, _boundary: Option<&str>) -> Result<(), MimeParseError> {
        let index = match self.stack.last_mut() {
            Some(parent) => {
                parent.children += 1;
                parent.children - 1
            }
            None => 0,
        };
        self.stack.push(Entity {
            index,
            ..Entity::default()
        });
        Ok(())
    }

    fn header(&mut self, name: &str, value: &str) -> Result<(), MimeParseError> {
        if let Some(entity) = self.stack.last_mut() {
            entity.headers.push(name, value);
        }
        Ok(())
    }

    fn content_type(&mut self, content_type: &str) -> Result<(), MimeParseError> {
        if let Some(entity) = self.stack.last_mut() {
            entity.content_type = parse_content_type(content_type);
        }
        Ok(())
    }

    fn content_disposition(&mut self, value: &str) -> Result<(), MimeParseError> {
        if let Some(entity) = self.stack.last_mut() {
            entity.disposition = parse_content_disposition(value);
        }
        Ok(())
    }

    fn end_headers(&mut self) -> Result<(), MimeParseError> {
        if let [top] = self.stack.as_slice() {
            self.top_headers = Some(top.headers.clone());
        }
        Ok(())
    }

    fn body_content(&mut self, data: &[u8]) -> Result<(), MimeParseError> {
        self.leaf(data);
        Ok(())
    }

    fn signed_content(&mut self, raw: &[u8]) -> Result<(), MimeParseError> {
        if self.signed_content.is_none() {
            self.signed_content = Some(raw.to_vec());
        }
        Ok(())
    }

    fn end_entity(&mut self, _boundary: Option<&str>) -> Result<(), MimeParseError> {
        self.stack.pop();
        Ok(())
    }
}
