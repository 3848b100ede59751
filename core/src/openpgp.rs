/*
 * openpgp.rs
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

//! OpenPGP packet handling: armor, recipients, decryption, signatures.
//!
//! All use of the `pgp` crate outside key loading lives here.

use pgp::composed::{Deserializable, Esk, Message, StandaloneSignature};
use pgp::packet::Signature;
use pgp::types::{PublicKeyTrait, SecretKeyTrait};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::keyring::key::Material;
use crate::keyring::{Key, KeyIdentifier, KeyRing};

const ARMOR_BEGIN: &str = "-----BEGIN PGP MESSAGE-----";
const MAX_COMPRESSION_LAYERS: usize = 4;

/// Parse an ASCII-armored OpenPGP message into its packet sequence.
pub(crate) fn read_armored_message(armored: &[u8]) -> Result<Message> {
    let text = std::str::from_utf8(armored)
        .map_err(|_| Error::ArmorFormat("message is not ASCII armor".into()))?;
    if !text.contains(ARMOR_BEGIN) {
        return Err(Error::ArmorFormat("no PGP MESSAGE armor header".into()));
    }
    let (message, _headers) = Message::from_armor_single(text.as_bytes())
        .map_err(|e| Error::ArmorFormat(e.to_string()))?;
    Ok(message)
}

/// Key IDs the message is encrypted to. Anonymous recipients (and recipients named only
/// by fingerprint) are reported as the wildcard ID.
pub(crate) fn recipients(message: &Message) -> Result<Vec<KeyIdentifier>> {
    match message {
        Message::Encrypted { esk, .. } => Ok(esk
            .iter()
            .filter_map(|e| match e {
                Esk::PublicKeyEncryptedSessionKey(pkesk) => Some(
                    pkesk
                        .id()
                        .map(KeyIdentifier::from)
                        .unwrap_or(KeyIdentifier::WILDCARD),
                ),
                _ => None,
            })
            .collect()),
        _ => Err(Error::Decryption("message is not encrypted".into())),
    }
}

/// Try each key in order; the first that decrypts wins.
pub(crate) fn decrypt_with_keys(message: &Message, keys: &[&Key]) -> Result<Message> {
    let mut last_error: Option<String> = None;
    for key in keys {
        let Material::Secret(ssk) = key.material() else {
            continue;
        };
        match message.decrypt(key.passphrase_fn(), &[ssk]) {
            Ok((decrypted, _)) => {
                debug!(key = %key.id(), "decrypted session key");
                return Ok(decrypted);
            }
            Err(e) => {
                warn!(key = %key.id(), error = %e, "decryption attempt failed");
                last_error = Some(e.to_string());
            }
        }
    }
    Err(Error::Decryption(
        last_error.unwrap_or_else(|| "no secret key to try".into()),
    ))
}

/// Decompress and extract the literal data, keeping an inline signature if present.
pub(crate) fn open_plaintext(message: Message) -> Result<DecryptedMessage> {
    let mut message = message;
    for _ in 0..MAX_COMPRESSION_LAYERS {
        if !matches!(message, Message::Compressed(_)) {
            break;
        }
        message = message
            .decompress()
            .map_err(|e| Error::Decryption(format!("decompression failed: {}", e)))?;
    }
    let plaintext = message
        .get_content()
        .map_err(|e| Error::Decryption(e.to_string()))?
        .ok_or_else(|| Error::Decryption("decrypted message carries no literal data".into()))?;
    let signature = match message {
        Message::Signed { .. } => Some(SignedData::Inline(message)),
        _ => None,
    };
    Ok(DecryptedMessage {
        plaintext,
        signature,
    })
}

/// Decrypt an armored message with the first matching unlocked key of `keys`.
///
/// This is the plain (non-MIME) operation; the returned plaintext is not interpreted.
#[instrument(skip_all, fields(len = armored.len()))]
pub fn decrypt_message(armored: &[u8], keys: &KeyRing) -> Result<DecryptedMessage> {
    let message = read_armored_message(armored)?;
    let recipients = recipients(&message)?;
    let candidates = keys.resolve_decryption_keys(&recipients)?;
    let decrypted = decrypt_with_keys(&message, &candidates)?;
    open_plaintext(decrypted)
}

/// Decrypted literal data plus the signature that covered it, if any.
#[derive(Debug)]
pub struct DecryptedMessage {
    pub plaintext: Vec<u8>,
    pub signature: Option<SignedData>,
}

/// Signed content awaiting verification.
#[derive(Debug, Clone)]
pub enum SignedData {
    /// A signed OpenPGP message (one-pass or prefixed signature over literal data).
    Inline(Message),
    /// A detached signature over raw bytes (multipart/signed).
    Detached {
        signature: StandaloneSignature,
        content: Vec<u8>,
    },
}

impl SignedData {
    /// Parse an armored detached signature over `content`.
    pub fn detached(armored_signature: &str, content: Vec<u8>) -> Result<Self> {
        let (signature, _headers) = StandaloneSignature::from_armor_single(armored_signature.as_bytes())
            .map_err(|e| Error::ArmorFormat(format!("detached signature: {}", e)))?;
        Ok(SignedData::Detached { signature, content })
    }

    fn packet(&self) -> Option<&Signature> {
        match self {
            SignedData::Inline(Message::Signed { signature, .. }) => Some(signature),
            SignedData::Inline(_) => None,
            SignedData::Detached { signature, .. } => Some(&signature.signature),
        }
    }

    /// Issuer key IDs named by the signature.
    pub fn issuers(&self) -> Vec<KeyIdentifier> {
        self.packet()
            .map(|s| s.issuer().into_iter().map(KeyIdentifier::from).collect())
            .unwrap_or_default()
    }

    /// Creation time in epoch seconds.
    pub fn created(&self) -> Option<i64> {
        self.packet().and_then(|s| s.created().map(|t| t.timestamp()))
    }

    /// Validity period in seconds after creation. Zero means "never expires" and is
    /// reported as `None`.
    pub fn expires_after(&self) -> Option<i64> {
        self.packet()
            .and_then(|s| s.signature_expiration_time().map(|d| d.num_seconds()))
            .filter(|secs| *secs > 0)
    }

    fn check<K: PublicKeyTrait>(&self, key: &K) -> bool {
        match self {
            SignedData::Inline(message) => message.verify(key).is_ok(),
            SignedData::Detached { signature, content } => signature.verify(key, content).is_ok(),
        }
    }

    /// Verify against the components of `key`. With `component` set only that primary
    /// key or subkey is tried. Returns the ID of the component that verified.
    pub(crate) fn verify_with(&self, key: &Key, component: Option<&KeyIdentifier>) -> Option<KeyIdentifier> {
        let wanted = |id: &KeyIdentifier| component.map_or(true, |c| c == id);
        match key.material() {
            Material::Public(k) => {
                let id = KeyIdentifier::from(k.primary_key.key_id());
                if wanted(&id) && self.check(&k.primary_key) {
                    return Some(id);
                }
                for sub in &k.public_subkeys {
                    let id = KeyIdentifier::from(sub.key.key_id());
                    if wanted(&id) && self.check(&sub.key) {
                        return Some(id);
                    }
                }
            }
            Material::Secret(k) => {
                let id = KeyIdentifier::from(k.primary_key.key_id());
                if wanted(&id) && self.check(&k.primary_key.public_key()) {
                    return Some(id);
                }
                for sub in &k.secret_subkeys {
                    let id = KeyIdentifier::from(sub.key.key_id());
                    if wanted(&id) && self.check(&sub.key.public_key()) {
                        return Some(id);
                    }
                }
                for sub in &k.public_subkeys {
                    let id = KeyIdentifier::from(sub.key.key_id());
                    if wanted(&id) && self.check(&sub.key) {
                        return Some(id);
                    }
                }
            }
        }
        None
    }
}
