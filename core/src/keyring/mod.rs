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

//! Key rings: ordered, immutable collections of keys.
//!
//! Construction never fails; whether a ring can decrypt or verify is checked when it is
//! used. Every change (adding a key, unlocking) produces a new ring and leaves the
//! original untouched, so a ring can be shared freely between threads.

pub(crate) mod key;
mod key_id;

pub use key::{Capabilities, Capability, Key};
pub use key_id::{KeyIdentifier, ParseKeyIdError};

use tracing::debug;

use crate::error::{Error, Result};

/// Result of looking up a verification key by signer ID.
#[derive(Debug, Clone, Copy)]
pub enum KeyLookup<'a> {
    Found(&'a Key),
    /// No verify-capable key carries the signer ID. Not an error.
    NotFound,
}

/// Ordered collection of keys.
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    keys: Vec<Key>,
}

impl KeyRing {
    pub fn new(keys: impl IntoIterator<Item = Key>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// A new ring with `key` appended.
    pub fn with_key(mut self, key: Key) -> Self {
        self.keys.push(key);
        self
    }

    /// Load several armored keys, each with an optional passphrase.
    pub fn from_armored_keys<'a, I>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        keys.into_iter()
            .map(|(armored, passphrase)| Key::from_armored(armored, passphrase))
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter()
    }

    /// Primary key IDs in ring order.
    pub fn key_ids(&self) -> Vec<KeyIdentifier> {
        self.keys.iter().map(Key::id).collect()
    }

    /// A new ring where every locked key that `passphrase` opens is unlocked.
    ///
    /// Fails with [`Error::Unlock`] if no locked key opens; `self` is unchanged either way.
    pub fn unlock(&self, passphrase: &str) -> Result<KeyRing> {
        let mut opened = 0usize;
        let keys = self
            .keys
            .iter()
            .map(|k| match k.unlock(passphrase) {
                Some(unlocked) => {
                    opened += 1;
                    unlocked
                }
                None => k.clone(),
            })
            .collect();
        if opened == 0 {
            return Err(Error::Unlock);
        }
        debug!(opened, "unlocked keys");
        Ok(KeyRing { keys })
    }

    /// Fails with [`Error::KeyRing`] when no key has `capability`.
    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.keys.iter().any(|k| k.can(capability)) {
            Ok(())
        } else {
            Err(Error::KeyRing(capability))
        }
    }

    /// Unlocked, decrypt-capable keys matching any recipient, in ring order.
    pub fn resolve_decryption_keys(&self, recipients: &[KeyIdentifier]) -> Result<Vec<&Key>> {
        let keys: Vec<&Key> = self
            .keys
            .iter()
            .filter(|k| k.can(Capability::Decrypt))
            .filter(|k| recipients.iter().any(|r| k.has_component(r)))
            .collect();
        if keys.is_empty() {
            return Err(Error::NoDecryptionKey {
                recipients: recipients.to_vec(),
            });
        }
        debug!(candidates = keys.len(), "resolved decryption keys");
        Ok(keys)
    }

    /// First verify-capable key whose primary key or a subkey has the signer ID.
    pub fn resolve_verification_key(&self, signer: &KeyIdentifier) -> KeyLookup<'_> {
        self.keys
            .iter()
            .filter(|k| k.can(Capability::Verify))
            .find(|k| k.component_ids().contains(signer))
            .map_or(KeyLookup::NotFound, KeyLookup::Found)
    }

    /// All verify-capable keys, for signatures that name no issuer.
    pub(crate) fn verification_keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter().filter(|k| k.can(Capability::Verify))
    }
}

impl FromIterator<Key> for KeyRing {
    fn from_iter<T: IntoIterator<Item = Key>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a KeyRing {
    type Item = &'a Key;
    type IntoIter = std::slice::Iter<'a, Key>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}
