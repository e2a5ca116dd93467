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

//! Operation requests.
//!
//! Every operation moves through the same stages:
//!
//! ```text
//! Validating ─► Checking ─► Applying ─► Recording ─► Completed
//!     │             │           │            │
//!     └─► Rejected ◄┘           └─► Failed ◄─┘
//! ```
//!
//! Validation and policy errors exit through `Rejected` with no state change;
//! store errors exit through `Failed` and may leave partial writes.

use crate::base::AccountId;
use crate::TransactionError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Request as submitted by the screen layer.
///
/// Amounts are the raw text typed by the user; they are parsed during
/// validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Deposit {
        account: AccountId,
        amount: String,
    },
    Transfer {
        account: AccountId,
        to: AccountId,
        amount: String,
    },
    BillPayment {
        account: AccountId,
        biller: String,
        amount: String,
    },
    Donation {
        account: AccountId,
        cause: String,
        amount: String,
    },
    Investment {
        account: AccountId,
        instrument: String,
        amount: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Deposit,
    Transfer,
    BillPayment,
    Donation,
    Investment,
}

impl OperationKind {
    /// Operations that debit the initiating account.
    pub fn is_outgoing(&self) -> bool {
        !matches!(self, Self::Deposit)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Deposit => "deposit",
            Self::Transfer => "transfer",
            Self::BillPayment => "bill payment",
            Self::Donation => "donation",
            Self::Investment => "investment",
        };
        write!(f, "{name}")
    }
}

/// Store-touching stage of the operation state machine, carried by store
/// failures. Validation never reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Checking,
    Applying,
    Recording,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Checking => "checking",
            Self::Applying => "applying",
            Self::Recording => "recording",
        };
        write!(f, "{name}")
    }
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Deposit { .. } => OperationKind::Deposit,
            Self::Transfer { .. } => OperationKind::Transfer,
            Self::BillPayment { .. } => OperationKind::BillPayment,
            Self::Donation { .. } => OperationKind::Donation,
            Self::Investment { .. } => OperationKind::Investment,
        }
    }

    /// Initiating account.
    pub fn account(&self) -> &AccountId {
        match self {
            Self::Deposit { account, .. }
            | Self::Transfer { account, .. }
            | Self::BillPayment { account, .. }
            | Self::Donation { account, .. }
            | Self::Investment { account, .. } => account,
        }
    }

    pub fn raw_amount(&self) -> &str {
        match self {
            Self::Deposit { amount, .. }
            | Self::Transfer { amount, .. }
            | Self::BillPayment { amount, .. }
            | Self::Donation { amount, .. }
            | Self::Investment { amount, .. } => amount,
        }
    }

    pub fn amount(&self) -> Result<Decimal, TransactionError> {
        parse_amount(self.raw_amount())
    }
}

/// Parses a user-entered amount; it must be a positive number.
pub fn parse_amount(input: &str) -> Result<Decimal, TransactionError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TransactionError::MissingAmount);
    }
    let amount = Decimal::from_str(input).map_err(|_| TransactionError::InvalidAmount)?;
    if amount <= Decimal::ZERO {
        return Err(TransactionError::InvalidAmount);
    }
    Ok(amount.normalize())
}
