/*
 * decrypt.rs
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

//! The decrypt/verify pipeline for PGP/MIME messages.
//!
//! A call moves through `Start -> Decrypting -> Parsing -> Verifying -> Reporting ->
//! Done`, or ends in `Failed`. Parts completed before a failure are still reported.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::callbacks::MimeCallbacks;
use crate::clock::{ClockSkew, VerifyTime};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::keyring::{Capability, KeyRing};
use crate::mime::{parse_mime, HeaderBlock, MimePart, MimeSignature};
use crate::openpgp::{self, DecryptedMessage, SignedData};
use crate::verify::{verify_signature, VerificationOutcome, VerificationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Start,
    Decrypting,
    Parsing,
    Verifying,
    Reporting,
    Done,
    Failed,
}

/// Outcome of one pipeline run: the parts in report order, then either the
/// verification outcome or the error that stopped the run.
#[derive(Debug)]
pub struct MimeResult {
    pub parts: Vec<MimePart>,
    pub verification: Option<VerificationOutcome>,
    pub error: Option<Error>,
}

impl MimeResult {
    fn failed(parts: Vec<MimePart>, error: Error) -> Self {
        warn!(stage = ?Stage::Failed, %error, salvaged = parts.len(), "decryption pipeline failed");
        Self {
            parts,
            verification: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Replay the result through `callbacks`.
    pub fn deliver<C: MimeCallbacks + ?Sized>(self, callbacks: &mut C) {
        debug!(stage = ?Stage::Reporting, parts = self.parts.len());
        for part in self.parts {
            let (kind, result) = match part {
                MimePart::Attachment { headers, data } => {
                    ("attachment", callbacks.on_attachment(headers, data))
                }
                MimePart::EncryptedHeaders { headers } => {
                    ("encrypted headers", callbacks.on_encrypted_headers(headers))
                }
                MimePart::Body {
                    content,
                    content_type,
                } => ("body", callbacks.on_body(content, content_type)),
            };
            if let Err(e) = result {
                warn!(callback = kind, error = %e, "callback failed");
            }
        }
        match self.error {
            Some(error) => callbacks.on_error(error),
            None => {
                let outcome = self.verification.unwrap_or_else(VerificationOutcome::not_signed);
                if let Err(e) = callbacks.on_verified(outcome) {
                    warn!(callback = "verified", error = %e, "callback failed");
                }
                debug!(stage = ?Stage::Done);
            }
        }
    }
}

/// Decrypts PGP/MIME messages and verifies their signatures.
///
/// Holds no per-message state; one decryptor can serve any number of calls.
#[derive(Debug, Clone)]
pub struct MimeDecryptor {
    clock: Arc<ClockSkew>,
    config: Config,
    outer_headers: Option<HeaderBlock>,
}

impl MimeDecryptor {
    pub fn new(clock: Arc<ClockSkew>) -> Self {
        Self {
            clock,
            config: Config::default(),
            outer_headers: None,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Unencrypted transport headers of the message being decrypted.
    pub fn with_outer_headers(mut self, headers: HeaderBlock) -> Self {
        self.outer_headers = Some(headers);
        self
    }

    pub fn clock(&self) -> &Arc<ClockSkew> {
        &self.clock
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Decrypt `message`, parse the plaintext as MIME, verify its signature and report
    /// everything through `callbacks`. Errors are reported through
    /// [`MimeCallbacks::on_error`], never returned.
    pub fn decrypt_mime_message<C: MimeCallbacks + ?Sized>(
        &self,
        message: &[u8],
        decryption_keys: &KeyRing,
        verification_keys: Option<&KeyRing>,
        callbacks: &mut C,
        verify_time: VerifyTime,
    ) {
        self.process(message, decryption_keys, verification_keys, verify_time)
            .deliver(callbacks);
    }

    /// The pipeline without delivery.
    #[instrument(skip_all, fields(len = message.len()))]
    pub fn process(
        &self,
        message: &[u8],
        decryption_keys: &KeyRing,
        verification_keys: Option<&KeyRing>,
        verify_time: VerifyTime,
    ) -> MimeResult {
        debug!(stage = ?Stage::Start);
        if message.iter().all(u8::is_ascii_whitespace) {
            return MimeResult::failed(Vec::new(), Error::InvalidInput("empty message".into()));
        }
        if decryption_keys.is_empty() {
            return MimeResult::failed(
                Vec::new(),
                Error::InvalidInput("empty decryption key ring".into()),
            );
        }

        debug!(stage = ?Stage::Decrypting);
        let decrypted = match decrypt(message, decryption_keys) {
            Ok(d) => d,
            Err(e) => return MimeResult::failed(Vec::new(), e),
        };

        debug!(stage = ?Stage::Parsing, plaintext = decrypted.plaintext.len());
        let parsed = match parse_mime(
            &decrypted.plaintext,
            self.outer_headers.as_ref(),
            &self.config,
        ) {
            Ok(p) => p,
            Err(partial) => return MimeResult::failed(partial.parts, Error::MimeParse(partial.error)),
        };

        debug!(stage = ?Stage::Verifying);
        let verification = self.verify(
            decrypted.signature.as_ref(),
            parsed.signature.as_ref(),
            verification_keys,
            verify_time,
        );
        MimeResult {
            parts: parsed.parts,
            verification: Some(verification),
            error: None,
        }
    }

    /// The inline signature wins over a detached multipart/signed one.
    fn verify(
        &self,
        inline: Option<&SignedData>,
        detached: Option<&MimeSignature>,
        keys: Option<&KeyRing>,
        verify_time: VerifyTime,
    ) -> VerificationOutcome {
        let Some(keys) = keys else {
            return VerificationOutcome::not_signed();
        };
        let now = verify_time.resolve(&self.clock);
        let tolerance = self.config.clock_tolerance_secs;
        if let Some(signed) = inline {
            return verify_signature(signed, keys, now, tolerance);
        }
        let Some(detached) = detached.filter(|_| self.config.verify_mime_signatures) else {
            return VerificationOutcome::not_signed();
        };
        match SignedData::detached(&detached.armored, detached.content.clone()) {
            Ok(signed) => verify_signature(&signed, keys, now, tolerance),
            Err(e) => {
                warn!(error = %e, "unreadable detached signature");
                VerificationOutcome {
                    status: VerificationStatus::Invalid,
                    signer: None,
                }
            }
        }
    }
}

fn decrypt(message: &[u8], keys: &KeyRing) -> Result<DecryptedMessage> {
    let parsed = openpgp::read_armored_message(message)?;
    keys.require(Capability::Decrypt)
        .map_err(|e| Error::Decryption(e.to_string()))?;
    let recipients = openpgp::recipients(&parsed)?;
    debug!(recipients = recipients.len(), "read recipients");
    let candidates = keys
        .resolve_decryption_keys(&recipients)
        .map_err(|e| Error::Decryption(e.to_string()))?;
    let plain = openpgp::decrypt_with_keys(&parsed, &candidates)?;
    openpgp::open_plaintext(plain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_is_invalid_input() {
        let decryptor = MimeDecryptor::new(Arc::new(ClockSkew::new()));
        let keys = KeyRing::default();
        let result = decryptor.process(b"  \r\n", &keys, None, VerifyTime::Now);
        assert!(matches!(result.error, Some(Error::InvalidInput(_))));
        assert!(result.parts.is_empty());
    }

    #[test]
    fn empty_ring_is_invalid_input() {
        let decryptor = MimeDecryptor::new(Arc::new(ClockSkew::new()));
        let result = decryptor.process(
            b"-----BEGIN PGP MESSAGE-----\n",
            &KeyRing::default(),
            None,
            VerifyTime::Unchecked,
        );
        assert!(matches!(result.error, Some(Error::InvalidInput(_))));
    }

    #[test]
    fn failure_delivers_error_once_and_no_outcome() {
        let result = MimeResult {
            parts: vec![MimePart::Attachment {
                headers: String::new(),
                data: b"x".to_vec(),
            }],
            verification: None,
            error: Some(Error::InvalidInput("x".into())),
        };
        let mut events: Vec<crate::MimeEvent> = Vec::new();
        result.deliver(&mut events);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], crate::MimeEvent::Error(_)));
    }
}
