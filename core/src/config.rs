/*
 * config.rs
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

//! Decryption pipeline settings. Loaded from JSON; every field has a default so a
//! partial document (or `{}`) is valid.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Settings for [`crate::MimeDecryptor`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deepest multipart nesting accepted before the plaintext is rejected.
    pub max_nesting_depth: usize,
    /// Seconds a signature creation time may lie ahead of the verify time.
    pub clock_tolerance_secs: i64,
    /// Drop encrypted header fields that the outer (transport) headers repeat verbatim.
    pub omit_outer_headers: bool,
    /// Verify multipart/signed parts found inside the encrypted payload.
    pub verify_mime_signatures: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_nesting_depth: 16,
            clock_tolerance_secs: 0,
            omit_outer_headers: true,
            verify_mime_signatures: true,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<()> {
        if self.max_nesting_depth == 0 {
            return Err(Error::Config("max_nesting_depth must be at least 1".into()));
        }
        if self.clock_tolerance_secs < 0 {
            return Err(Error::Config("clock_tolerance_secs must not be negative".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn partial_document_overrides_fields() {
        let c = Config::from_json(r#"{"clock_tolerance_secs": 300, "omit_outer_headers": false}"#)
            .unwrap();
        assert_eq!(c.clock_tolerance_secs, 300);
        assert!(!c.omit_outer_headers);
        assert_eq!(c.max_nesting_depth, 16);
    }

    #[test]
    fn rejects_zero_depth() {
        let err = Config::from_json(r#"{"max_nesting_depth": 0}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(Config::from_json("{"), Err(Error::Config(_))));
    }
}
