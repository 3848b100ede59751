/*
 * key.rs
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

//! A single OpenPGP key (public or secret) with its capabilities and lock state.

use std::fmt;

use pgp::composed::{Deserializable, SignedPublicKey, SignedSecretKey};
use pgp::types::{PublicKeyTrait, S2kParams, SecretKeyTrait, SecretParams, StringToKey};
use tracing::debug;
use zeroize::Zeroizing;

use super::key_id::KeyIdentifier;
use crate::error::{Error, Result};

/// Operations a key can take part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Encrypt,
    Sign,
    Decrypt,
    Verify,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Encrypt => "encrypt",
            Capability::Sign => "sign",
            Capability::Decrypt => "decrypt",
            Capability::Verify => "verify",
        };
        f.write_str(s)
    }
}

/// Set of [`Capability`] values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub encrypt: bool,
    pub sign: bool,
    pub decrypt: bool,
    pub verify: bool,
}

impl Capabilities {
    pub fn contains(&self, capability: Capability) -> bool {
        match capability {
            Capability::Encrypt => self.encrypt,
            Capability::Sign => self.sign,
            Capability::Decrypt => self.decrypt,
            Capability::Verify => self.verify,
        }
    }
}

#[derive(Clone)]
pub(crate) enum Material {
    Public(SignedPublicKey),
    Secret(SignedSecretKey),
}

/// One key: material, known passphrase (if unlocked) and derived capabilities.
///
/// Public keys are always usable. Secret keys are locked until a passphrase that opens
/// them is known; unprotected secret keys are unlocked from the start.
#[derive(Clone)]
pub struct Key {
    material: Material,
    passphrase: Option<Zeroizing<String>>,
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("id", &self.id())
            .field("secret", &self.is_secret())
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl Key {
    pub fn from_public(key: SignedPublicKey) -> Self {
        Self {
            material: Material::Public(key),
            passphrase: None,
        }
    }

    /// Wrap a secret key. Keys without passphrase protection start unlocked. A
    /// subkeys-only export (stub primary key) is unlocked through its subkeys.
    pub fn from_secret(key: SignedSecretKey) -> Self {
        let passphrase = if secret_opens(&key, "") {
            Some(Zeroizing::new(String::new()))
        } else {
            None
        };
        Self {
            material: Material::Secret(key),
            passphrase,
        }
    }

    /// Load an ASCII-armored public or secret key. Secret material is tried first. When
    /// a passphrase is given it must unlock the key.
    pub fn from_armored(armored: &str, passphrase: Option<&str>) -> Result<Self> {
        let text = armored.trim();
        if text.is_empty() {
            return Err(Error::KeyLoad("empty key material".into()));
        }
        let key = match SignedSecretKey::from_armor_single(text.as_bytes()) {
            Ok((ssk, _headers)) => Key::from_secret(ssk),
            Err(secret_err) => match SignedPublicKey::from_armor_single(text.as_bytes()) {
                Ok((spk, _headers)) => Key::from_public(spk),
                Err(public_err) => {
                    debug!(%secret_err, "not a secret key");
                    return Err(Error::KeyLoad(public_err.to_string()));
                }
            },
        };
        key.with_passphrase(passphrase)
    }

    /// Load a key from binary (or ASCII-armored) OpenPGP packets.
    pub fn from_bytes(bytes: &[u8], passphrase: Option<&str>) -> Result<Self> {
        if bytes.trim_ascii_start().starts_with(b"-----BEGIN") {
            let text = std::str::from_utf8(bytes).map_err(|e| Error::KeyLoad(e.to_string()))?;
            return Self::from_armored(text, passphrase);
        }
        if bytes.is_empty() {
            return Err(Error::KeyLoad("empty key material".into()));
        }
        let key = match SignedSecretKey::from_bytes(bytes) {
            Ok(ssk) => Key::from_secret(ssk),
            Err(_) => SignedPublicKey::from_bytes(bytes)
                .map(Key::from_public)
                .map_err(|e| Error::KeyLoad(e.to_string()))?,
        };
        key.with_passphrase(passphrase)
    }

    fn with_passphrase(self, passphrase: Option<&str>) -> Result<Self> {
        debug!(id = %self.id(), secret = self.is_secret(), "loaded key");
        match passphrase {
            Some(p) if self.is_locked() => self.unlock(p).ok_or(Error::Unlock),
            _ => Ok(self),
        }
    }

    /// Primary key ID.
    pub fn id(&self) -> KeyIdentifier {
        match &self.material {
            Material::Public(k) => KeyIdentifier::from(k.primary_key.key_id()),
            Material::Secret(k) => KeyIdentifier::from(k.primary_key.key_id()),
        }
    }

    /// IDs of the primary key followed by every subkey.
    pub fn component_ids(&self) -> Vec<KeyIdentifier> {
        let mut ids = vec![self.id()];
        match &self.material {
            Material::Public(k) => {
                ids.extend(k.public_subkeys.iter().map(|s| KeyIdentifier::from(s.key.key_id())));
            }
            Material::Secret(k) => {
                ids.extend(k.secret_subkeys.iter().map(|s| KeyIdentifier::from(s.key.key_id())));
                ids.extend(k.public_subkeys.iter().map(|s| KeyIdentifier::from(s.key.key_id())));
            }
        }
        ids
    }

    /// True if the primary key or one of the subkeys has the given ID (or either is the
    /// wildcard).
    pub fn has_component(&self, id: &KeyIdentifier) -> bool {
        self.component_ids().iter().any(|c| c.matches(id))
    }

    pub fn is_secret(&self) -> bool {
        matches!(self.material, Material::Secret(_))
    }

    /// A secret key whose passphrase is not known yet. Public keys are never locked.
    pub fn is_locked(&self) -> bool {
        self.is_secret() && self.passphrase.is_none()
    }

    /// Signing needs secret material, so a stub primary key only counts for verifying.
    pub fn capabilities(&self) -> Capabilities {
        let (can_encrypt, can_verify, has_signing_secret) = match &self.material {
            Material::Public(k) => {
                let verify = k.primary_key.is_signing_key()
                    || k.public_subkeys.iter().any(|s| s.key.is_signing_key());
                (
                    k.primary_key.is_encryption_key()
                        || k.public_subkeys.iter().any(|s| s.key.is_encryption_key()),
                    verify,
                    false,
                )
            }
            Material::Secret(k) => {
                let primary = k.primary_key.public_key();
                let primary_signs = primary.is_signing_key();
                let subkey_signs = k.secret_subkeys.iter().any(|s| s.key.public_key().is_signing_key());
                (
                    primary.is_encryption_key()
                        || k.secret_subkeys.iter().any(|s| s.key.public_key().is_encryption_key()),
                    primary_signs || subkey_signs,
                    (primary_signs && !is_stub(k.primary_key.secret_params())) || subkey_signs,
                )
            }
        };
        let unlocked = !self.is_locked();
        Capabilities {
            encrypt: can_encrypt,
            verify: can_verify,
            decrypt: can_encrypt && self.is_secret() && unlocked,
            sign: has_signing_secret && unlocked,
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities().contains(capability)
    }

    /// A copy of this key unlocked with `passphrase`, or `None` if the key is not locked
    /// or the passphrase does not open it.
    pub fn unlock(&self, passphrase: &str) -> Option<Key> {
        match &self.material {
            Material::Secret(k) if self.passphrase.is_none() && secret_opens(k, passphrase) => {
                Some(Key {
                    material: self.material.clone(),
                    passphrase: Some(Zeroizing::new(passphrase.to_string())),
                })
            }
            _ => None,
        }
    }

    pub(crate) fn material(&self) -> &Material {
        &self.material
    }

    /// Passphrase source for the decryption collaborator; empty for unprotected keys.
    pub(crate) fn passphrase_fn(&self) -> impl FnOnce() -> String + Clone + '_ {
        move || {
            self.passphrase
                .as_ref()
                .map(|p| p.as_str().to_string())
                .unwrap_or_default()
        }
    }
}

/// True if `passphrase` opens the primary key or any secret subkey. Stub components
/// (GNU dummy S2K) hold no secret material and are skipped.
fn secret_opens(key: &SignedSecretKey, passphrase: &str) -> bool {
    let primary = !is_stub(key.primary_key.secret_params()) && component_opens(&key.primary_key, passphrase);
    primary
        || key
            .secret_subkeys
            .iter()
            .filter(|s| !is_stub(s.key.secret_params()))
            .any(|s| component_opens(&s.key, passphrase))
}

fn component_opens<K: SecretKeyTrait>(key: &K, passphrase: &str) -> bool {
    key.unlock(|| passphrase.to_string(), |_| Ok(())).is_ok()
}

/// GNU extension 101: the secret key material is not present.
fn is_stub(params: &SecretParams) -> bool {
    let SecretParams::Encrypted(encrypted) = params else {
        return false;
    };
    match encrypted.string_to_key_params() {
        S2kParams::Cfb { s2k, .. } | S2kParams::MalleableCfb { s2k, .. } | S2kParams::Aead { s2k, .. } => {
            matches!(s2k, StringToKey::Private { typ: 101, .. })
        }
        _ => false,
    }
}
