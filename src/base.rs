// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Core identifier types for accounts, transfers and receipts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an account.
///
/// Chosen by the user at registration; it doubles as the login username and
/// as the key of the account record under `users/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store path of the account record.
    pub(crate) fn path(&self) -> String {
        format!("users/{}", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Key of a transfer journal record under `transfers/`.
///
/// Both legs of a transfer carry the same key, which is how reconciliation
/// finds out which side of a pending transfer has already been written.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TransferId(pub String);

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-presentable reference number printed on receipts.
///
/// Three groups of four digits separated by single spaces, e.g. `4821 1093 7710`.
/// Not a unique key: two operations may share a reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ReferenceNumber(pub String);

impl ReferenceNumber {
    pub const GROUPS: usize = 3;

    /// Returns `true` if `value` is three space-separated groups of four digits.
    pub fn is_well_formed(value: &str) -> bool {
        let groups: Vec<&str> = value.split(' ').collect();
        groups.len() == Self::GROUPS
            && groups
                .iter()
                .all(|group| group.len() == 4 && group.bytes().all(|b| b.is_ascii_digit()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_path_is_under_users() {
        assert_eq!(AccountId::from("alice").path(), "users/alice");
    }

    #[test]
    fn reference_format_check() {
        assert!(ReferenceNumber::is_well_formed("1234 5678 9012"));
        assert!(!ReferenceNumber::is_well_formed("1234 5678"));
        assert!(!ReferenceNumber::is_well_formed("1234-5678-9012"));
        assert!(!ReferenceNumber::is_well_formed("12a4 5678 9012"));
        assert!(!ReferenceNumber::is_well_formed("12345 678 9012"));
    }
}
