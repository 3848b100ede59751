/*
 * verify.rs
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

//! Signature verification against a key ring at a reference time.

use std::fmt;

use tracing::debug;

use crate::keyring::{Key, KeyIdentifier, KeyLookup, KeyRing};
use crate::openpgp::SignedData;

/// Result of checking a message signature. Integer codes are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum VerificationStatus {
    Valid = 0,
    NotSigned = 1,
    KeyNotFound = 2,
    Invalid = 3,
}

impl VerificationStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerificationStatus::Valid => "valid",
            VerificationStatus::NotSigned => "not signed",
            VerificationStatus::KeyNotFound => "key not found",
            VerificationStatus::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

/// Verification status plus the signer's key ID when known. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub status: VerificationStatus,
    pub signer: Option<KeyIdentifier>,
}

impl VerificationOutcome {
    pub fn not_signed() -> Self {
        Self {
            status: VerificationStatus::NotSigned,
            signer: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == VerificationStatus::Valid
    }
}

/// Verify `signed` with the keys of `ring`.
///
/// The signer is looked up by the issuer IDs the signature names; a signature naming
/// no issuer is tried against every verify-capable key. With `now` set, the signature
/// must not be created later than `now + tolerance_secs` and must not have expired.
pub(crate) fn verify_signature(
    signed: &SignedData,
    ring: &KeyRing,
    now: Option<i64>,
    tolerance_secs: i64,
) -> VerificationOutcome {
    let issuers = signed.issuers();
    let candidates: Vec<(&Key, Option<KeyIdentifier>)> = if issuers.is_empty() {
        ring.verification_keys().map(|k| (k, None)).collect()
    } else {
        issuers
            .iter()
            .filter_map(|id| match ring.resolve_verification_key(id) {
                KeyLookup::Found(key) => Some((key, Some(*id))),
                KeyLookup::NotFound => None,
            })
            .collect()
    };
    let named = issuers.first().copied();
    if candidates.is_empty() {
        debug!(signer = ?named, "no verification key for signer");
        return VerificationOutcome {
            status: VerificationStatus::KeyNotFound,
            signer: named,
        };
    }
    let verified = candidates
        .iter()
        .find_map(|(key, component)| signed.verify_with(key, component.as_ref()));
    let Some(signer) = verified else {
        debug!(signer = ?named, "signature does not verify");
        return VerificationOutcome {
            status: VerificationStatus::Invalid,
            signer: named,
        };
    };
    let status = match now {
        Some(now) if !within_validity(signed, now, tolerance_secs) => VerificationStatus::Invalid,
        _ => VerificationStatus::Valid,
    };
    debug!(%signer, %status, "signature checked");
    VerificationOutcome {
        status,
        signer: Some(signer),
    }
}

/// Creation time not in the future (beyond the tolerance) and not expired at `now`.
fn within_validity(signed: &SignedData, now: i64, tolerance_secs: i64) -> bool {
    let Some(created) = signed.created() else {
        return false;
    };
    if created > now.saturating_add(tolerance_secs) {
        debug!(created, now, "signature created in the future");
        return false;
    }
    match signed.expires_after() {
        Some(validity) if created.saturating_add(validity) <= now => {
            debug!(created, validity, now, "signature expired");
            false
        }
        _ => true,
    }
}
