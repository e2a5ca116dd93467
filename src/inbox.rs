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

//! Inbox and history feed.
//!
//! The feed is derived from the account's own ledger plus any entries for
//! the account found in the global `transactions/` pool, newest first.
//! Projection never writes; read marks live in a separate sub-record.

use crate::account::Account;
use crate::entry::{EntryType, LedgerEntry};
use crate::receipt::format_peso;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Inbox tabs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InboxFilter {
    #[default]
    All,
    /// Deposits and outgoing transfers.
    Transactions,
    /// Donations, investments and bill payments.
    Others,
}

impl InboxFilter {
    pub fn matches(&self, entry_type: EntryType) -> bool {
        match self {
            Self::All => true,
            Self::Transactions => matches!(entry_type, EntryType::Deposit | EntryType::Transfer),
            Self::Others => matches!(
                entry_type,
                EntryType::Donation | EntryType::Investment | EntryType::Bill
            ),
        }
    }
}

impl FromStr for InboxFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "transactions" => Ok(Self::Transactions),
            "others" => Ok(Self::Others),
            other => Err(format!("unknown inbox filter: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxItem {
    pub entry: LedgerEntry,
    pub read: bool,
}

impl InboxItem {
    pub fn title(&self) -> String {
        format!("{} Notification", self.entry.entry_type().label())
    }

    pub fn message(&self) -> String {
        let verb = if self.entry.entry_type().is_credit() {
            "received"
        } else {
            "sent"
        };
        format!("You have {verb} {}", format_peso(self.entry.amount))
    }
}

/// Builds the feed for `account`, newest first.
///
/// Entries with equal timestamps keep reverse insertion order: account
/// entries before pooled ones, later appends first.
pub fn project(account: &Account, pooled: Vec<LedgerEntry>, filter: InboxFilter) -> Vec<InboxItem> {
    let mut entries: Vec<LedgerEntry> = account
        .transactions()
        .iter()
        .cloned()
        .chain(pooled)
        .filter(|entry| filter.matches(entry.entry_type()))
        .collect();
    entries.reverse();
    // Stable sort keeps the reversed insertion order among equal timestamps.
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    entries
        .into_iter()
        .map(|entry| InboxItem {
            read: account.is_read(&entry.id),
            entry,
        })
        .collect()
}

/// Count of unread items, for the badge.
pub fn unread_count(items: &[InboxItem]) -> usize {
    items.iter().filter(|item| !item.read).count()
}

/// Age of an entry in the "5 min ago" style of the inbox list.
pub struct RelativeTime {
    minutes: i64,
}

pub fn relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> RelativeTime {
    RelativeTime {
        minutes: (now - timestamp).num_minutes().max(0),
    }
}

impl fmt::Display for RelativeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn plural(n: i64) -> &'static str {
            if n == 1 { "" } else { "s" }
        }

        if self.minutes < 60 {
            return write!(f, "{} min ago", self.minutes);
        }
        let hours = self.minutes / 60;
        if hours < 24 {
            return write!(f, "{hours} hour{} ago", plural(hours));
        }
        let days = hours / 24;
        write!(f, "{days} day{} ago", plural(days))
    }
}
