/*
 * lib.rs
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

//! PGP/MIME decryption and signature verification for tagliacarte.
//!
//! [`MimeDecryptor`] decrypts an armored OpenPGP message with a [`KeyRing`], parses the
//! plaintext as MIME and reports the body, attachments, encrypted headers and the
//! signature verification outcome through [`MimeCallbacks`].

pub mod callbacks;
pub mod clock;
pub mod config;
pub mod decrypt;
pub mod error;
pub mod keyring;
pub mod mime;
pub mod openpgp;
pub mod verify;

pub use callbacks::{CallbackResult, MimeCallbacks, MimeEvent};
pub use clock::{ClockSkew, VerifyTime};
pub use config::Config;
pub use decrypt::{MimeDecryptor, MimeResult};
pub use error::{Error, Result};
pub use keyring::{Capabilities, Capability, Key, KeyIdentifier, KeyLookup, KeyRing};
pub use mime::{attachment_filename, HeaderBlock, MimePart};
pub use openpgp::{decrypt_message, DecryptedMessage, SignedData};
pub use verify::{VerificationOutcome, VerificationStatus};
