/*
 * callbacks.rs
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

//! Delivery of decrypted parts to the caller.

use std::sync::mpsc::Sender;

use crate::error::Error;
use crate::verify::VerificationOutcome;

/// A failing callback is logged and delivery continues with the next one.
pub type CallbackResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Receiver of the results of one decrypt/verify call.
///
/// Order: each attachment, then the encrypted headers (if any), then the body, then
/// the verification outcome. When the call fails, the parts completed before the
/// failure are delivered followed by a single `on_error`; `on_verified` is not called.
pub trait MimeCallbacks {
    fn on_body(&mut self, content: String, content_type: String) -> CallbackResult;

    fn on_attachment(&mut self, headers: String, data: Vec<u8>) -> CallbackResult;

    fn on_encrypted_headers(&mut self, headers: String) -> CallbackResult;

    fn on_verified(&mut self, outcome: VerificationOutcome) -> CallbackResult;

    fn on_error(&mut self, error: Error);
}

/// One callback invocation as a value.
#[derive(Debug)]
pub enum MimeEvent {
    Body { content: String, content_type: String },
    Attachment { headers: String, data: Vec<u8> },
    EncryptedHeaders(String),
    Verified(VerificationOutcome),
    Error(Error),
}

/// Collects events in delivery order.
impl MimeCallbacks for Vec<MimeEvent> {
    fn on_body(&mut self, content: String, content_type: String) -> CallbackResult {
        self.push(MimeEvent::Body {
            content,
            content_type,
        });
        Ok(())
    }

    fn on_attachment(&mut self, headers: String, data: Vec<u8>) -> CallbackResult {
        self.push(MimeEvent::Attachment { headers, data });
        Ok(())
    }

    fn on_encrypted_headers(&mut self, headers: String) -> CallbackResult {
        self.push(MimeEvent::EncryptedHeaders(headers));
        Ok(())
    }

    fn on_verified(&mut self, outcome: VerificationOutcome) -> CallbackResult {
        self.push(MimeEvent::Verified(outcome));
        Ok(())
    }

    fn on_error(&mut self, error: Error) {
        self.push(MimeEvent::Error(error));
    }
}

/// Forwards events to another thread. A disconnected receiver makes each callback fail.
impl MimeCallbacks for Sender<MimeEvent> {
    fn on_body(&mut self, content: String, content_type: String) -> CallbackResult {
        self.send(MimeEvent::Body {
            content,
            content_type,
        })?;
        Ok(())
    }

    fn on_attachment(&mut self, headers: String, data: Vec<u8>) -> CallbackResult {
        self.send(MimeEvent::Attachment { headers, data })?;
        Ok(())
    }

    fn on_encrypted_headers(&mut self, headers: String) -> CallbackResult {
        self.send(MimeEvent::EncryptedHeaders(headers))?;
        Ok(())
    }

    fn on_verified(&mut self, outcome: VerificationOutcome) -> CallbackResult {
        self.send(MimeEvent::Verified(outcome))?;
        Ok(())
    }

    fn on_error(&mut self, error: Error) {
        let _ = self.send(MimeEvent::Error(error));
    }
}
