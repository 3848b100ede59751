/*
 * error.rs
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

//! Errors from key handling, decryption and MIME parsing.

use thiserror::Error;

use crate::keyring::{Capability, KeyIdentifier};
use crate::mime::MimeParseError;

/// Errors surfaced by the decrypt/verify pipeline and its collaborators.
///
/// A verification result is never an error; see [`crate::VerificationOutcome`].
#[derive(Debug, Error)]
pub enum Error {
    /// Empty message, empty key ring or other unusable caller input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The message is not valid ASCII armor or its packets cannot be read.
    #[error("malformed armored message: {0}")]
    ArmorFormat(String),

    /// Decryption failed: wrong keys, corrupted ciphertext, unsupported algorithm.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// No unlocked key in the ring matches any recipient of the message.
    #[error("no unlocked decryption key for recipients {}", format_ids(.recipients))]
    NoDecryptionKey { recipients: Vec<KeyIdentifier> },

    /// The passphrase does not unlock any locked key.
    #[error("passphrase does not unlock any locked key")]
    Unlock,

    /// The key ring has no key with the required capability.
    #[error("key ring has no key that can {0}")]
    KeyRing(Capability),

    /// Serialized key material could not be read.
    #[error("cannot load key: {0}")]
    KeyLoad(String),

    /// The decrypted plaintext is not well-formed MIME.
    #[error("MIME parse error: {0}")]
    MimeParse(#[from] MimeParseError),

    /// Configuration could not be read.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Stable numeric code for each kind, used across the C boundary.
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidInput(_) => 1,
            Error::ArmorFormat(_) => 2,
            Error::Decryption(_) => 3,
            Error::NoDecryptionKey { .. } => 4,
            Error::Unlock => 5,
            Error::KeyRing(_) => 6,
            Error::KeyLoad(_) => 7,
            Error::MimeParse(_) => 8,
            Error::Config(_) => 9,
        }
    }
}

fn format_ids(ids: &[KeyIdentifier]) -> String {
    if ids.is_empty() {
        return "(none)".to_string();
    }
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;
