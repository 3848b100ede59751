/*
 * key_id.rs
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

//! OpenPGP key ID (the low 64 bits of a v4 fingerprint).

use std::fmt;
use std::str::FromStr;

use pgp::types::KeyId;

/// 8-byte key ID. Shown as 16 upper-case hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyIdentifier([u8; 8]);

impl KeyIdentifier {
    /// The all-zero ID used for anonymous recipients.
    pub const WILDCARD: KeyIdentifier = KeyIdentifier([0; 8]);

    pub fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == [0; 8]
    }

    /// True if either side is the wildcard or both are equal.
    pub fn matches(&self, other: &KeyIdentifier) -> bool {
        self.is_wildcard() || other.is_wildcard() || self == other
    }
}

impl From<&KeyId> for KeyIdentifier {
    fn from(id: &KeyId) -> Self {
        let mut bytes = [0u8; 8];
        let raw: &[u8] = id.as_ref();
        let n = raw.len().min(8);
        bytes[..n].copy_from_slice(&raw[..n]);
        Self(bytes)
    }
}

impl From<KeyId> for KeyIdentifier {
    fn from(id: KeyId) -> Self {
        Self::from(&id)
    }
}

impl fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

/// Error parsing a key ID from hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKeyIdError(String);

impl fmt::Display for ParseKeyIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid key ID: {}", self.0)
    }
}

impl std::error::Error for ParseKeyIdError {}

impl FromStr for KeyIdentifier {
    type Err = ParseKeyIdError;

    /// Accepts 16 hex digits, optionally prefixed with `0x`. Longer input (a v4
    /// fingerprint) is reduced to its last 16 digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let compact: String = hex_part.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.len() < 16 || compact.len() % 2 != 0 {
            return Err(ParseKeyIdError(s.to_string()));
        }
        let tail = &compact[compact.len() - 16..];
        let decoded = hex::decode(tail).map_err(|_| ParseKeyIdError(s.to_string()))?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let id: KeyIdentifier = "7fee3dc2e3f9ae4c".parse().unwrap();
        assert_eq!(id.to_string(), "7FEE3DC2E3F9AE4C");
        let prefixed: KeyIdentifier = "0x7FEE3DC2E3F9AE4C".parse().unwrap();
        assert_eq!(id, prefixed);
    }

    #[test]
    fn fingerprint_reduces_to_key_id() {
        let id: KeyIdentifier = "B524 647A 9ACE 8617 F630 1119 7FEE 3DC2 E3F9 AE4C".parse().unwrap();
        assert_eq!(id.to_string(), "7FEE3DC2E3F9AE4C");
    }

    #[test]
    fn rejects_short_or_non_hex() {
        assert!("1234".parse::<KeyIdentifier>().is_err());
        assert!("zzzzzzzzzzzzzzzz".parse::<KeyIdentifier>().is_err());
    }

    #[test]
    fn wildcard_matches_anything() {
        let id: KeyIdentifier = "DA8DDE1FC420A3CD".parse().unwrap();
        assert!(KeyIdentifier::WILDCARD.matches(&id));
        assert!(id.matches(&KeyIdentifier::WILDCARD));
        assert!(id.matches(&id));
        let other: KeyIdentifier = "AC1F962D06EA1968".parse().unwrap();
        assert!(!id.matches(&other));
    }
}
