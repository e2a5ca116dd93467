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

//! Error types for transaction processing.
//!
//! Every [`TransactionError`] falls into one of three classes (see [`ErrorKind`]):
//! validation errors and policy rejections never change state, store failures
//! may leave a partially written operation behind.

use crate::base::AccountId;
use crate::limits::LimitReason;
use crate::transaction::Stage;
use rust_decimal::Decimal;
use thiserror::Error;

/// Document store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or refused the request
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A document at `path` did not have the expected shape
    #[error("malformed document at {path}: {message}")]
    Decode { path: String, message: String },

    /// A path addressed something that is not an object
    #[error("invalid path {0}")]
    InvalidPath(String),
}

impl StoreError {
    pub(crate) fn decode(path: &str, err: serde_json::Error) -> Self {
        Self::Decode {
            path: path.to_string(),
            message: err.to_string(),
        }
    }

    /// Attaches the engine stage the failure happened in.
    pub fn at(self, stage: Stage) -> TransactionError {
        TransactionError::Store {
            stage,
            source: self,
        }
    }
}

/// Broad class of a [`TransactionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; rejected before any read.
    Validation,
    /// Well-formed request refused by balance, limit, lock or lookup checks.
    PolicyRejection,
    /// Store I/O failure; may leave partial state.
    StoreFailure,
}

/// Transaction processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// Amount field is empty
    #[error("missing amount")]
    MissingAmount,

    /// Amount is not a number, or is zero or negative
    #[error("invalid amount (must be a positive number)")]
    InvalidAmount,

    /// A required counterparty field is empty
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Account identifier is empty or contains a path separator
    #[error("invalid account identifier")]
    InvalidAccountId,

    /// Inbox entry identifier is empty, malformed or not in the feed
    #[error("invalid inbox entry: {0:?}")]
    InvalidEntryId(String),

    /// Sender and recipient are the same account
    #[error("cannot transfer to the same account")]
    SelfTransfer,

    /// Biller id is not in the catalog
    #[error("unknown biller: {0}")]
    UnknownBiller(String),

    /// Donation cause is not in the catalog
    #[error("unknown donation cause: {0}")]
    UnknownCause(String),

    /// Investment instrument is not in the catalog
    #[error("unknown investment instrument: {0}")]
    UnknownInstrument(String),

    /// Investment amount is below the instrument minimum
    #[error("amount below the {minimum} minimum for this instrument")]
    BelowMinimum { minimum: Decimal },

    /// Operating account does not exist
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// Transfer recipient does not exist
    #[error("recipient not found: {0}")]
    RecipientNotFound(AccountId),

    /// Registration with an identifier that is already taken
    #[error("account already exists: {0}")]
    AccountExists(AccountId),

    /// Debit would exceed the current balance
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Account is locked; outgoing operations are refused
    #[error("account is locked")]
    AccountLocked,

    /// A daily or monthly ceiling would be exceeded
    #[error("{0} exceeded")]
    LimitExceeded(LimitReason),

    /// The account record changed between read and write
    #[error("account {0} was modified concurrently")]
    ConcurrentModification(AccountId),

    /// The document store failed
    #[error("store failure while {stage}: {source}")]
    Store { stage: Stage, source: StoreError },
}

impl TransactionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingAmount
            | Self::InvalidAmount
            | Self::MissingField(_)
            | Self::InvalidAccountId
            | Self::InvalidEntryId(_)
            | Self::SelfTransfer
            | Self::UnknownBiller(_)
            | Self::UnknownCause(_)
            | Self::UnknownInstrument(_)
            | Self::BelowMinimum { .. } => ErrorKind::Validation,
            Self::AccountNotFound(_)
            | Self::RecipientNotFound(_)
            | Self::AccountExists(_)
            | Self::InsufficientFunds
            | Self::AccountLocked
            | Self::LimitExceeded(_) => ErrorKind::PolicyRejection,
            Self::ConcurrentModification(_) | Self::Store { .. } => ErrorKind::StoreFailure,
        }
    }

    /// Text shown to the user for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingAmount | Self::InvalidAmount => "Please enter a valid amount".to_string(),
            Self::MissingField(field) => format!("Please enter a valid {field}"),
            Self::InvalidAccountId => "Please enter a valid username".to_string(),
            Self::InvalidEntryId(_) => "Please select a notification".to_string(),
            Self::SelfTransfer => "You cannot transfer money to your own account".to_string(),
            Self::UnknownBiller(_) => "Please select a biller".to_string(),
            Self::UnknownCause(_) => "Please select a cause".to_string(),
            Self::UnknownInstrument(_) => "Please select an investment".to_string(),
            Self::BelowMinimum { minimum } => {
                format!("Minimum investment is {}", crate::receipt::format_peso(*minimum))
            }
            Self::AccountNotFound(_) => "User not found".to_string(),
            Self::RecipientNotFound(_) => "Recipient not found".to_string(),
            Self::AccountExists(_) => "Username already taken".to_string(),
            Self::InsufficientFunds => "Insufficient funds".to_string(),
            Self::AccountLocked => {
                "Your account is locked. Outgoing transactions are not allowed.".to_string()
            }
            Self::LimitExceeded(reason) => format!("This transaction exceeds your {reason}"),
            Self::ConcurrentModification(_) | Self::Store { .. } => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(TransactionError::MissingAmount.to_string(), "missing amount");
        assert_eq!(
            TransactionError::InvalidAmount.to_string(),
            "invalid amount (must be a positive number)"
        );
        assert_eq!(
            TransactionError::SelfTransfer.to_string(),
            "cannot transfer to the same account"
        );
        assert_eq!(
            TransactionError::RecipientNotFound(AccountId::from("bob")).to_string(),
            "recipient not found: bob"
        );
        assert_eq!(TransactionError::InsufficientFunds.to_string(), "insufficient funds");
        assert_eq!(TransactionError::AccountLocked.to_string(), "account is locked");
        assert_eq!(
            TransactionError::LimitExceeded(LimitReason::DailyOutgoing).to_string(),
            "daily outgoing limit exceeded"
        );
        assert_eq!(
            StoreError::Unavailable("offline".into())
                .at(Stage::Recording)
                .to_string(),
            "store failure while recording: store unavailable: offline"
        );
    }

    #[test]
    fn errors_are_classified() {
        assert_eq!(TransactionError::InvalidAmount.kind(), ErrorKind::Validation);
        assert_eq!(TransactionError::SelfTransfer.kind(), ErrorKind::Validation);
        assert_eq!(
            TransactionError::InvalidEntryId("e1/x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            TransactionError::InsufficientFunds.kind(),
            ErrorKind::PolicyRejection
        );
        assert_eq!(TransactionError::AccountLocked.kind(), ErrorKind::PolicyRejection);
        assert_eq!(
            TransactionError::LimitExceeded(LimitReason::MonthlyIncoming).kind(),
            ErrorKind::PolicyRejection
        );
        assert_eq!(
            StoreError::Unavailable("down".into()).at(Stage::Applying).kind(),
            ErrorKind::StoreFailure
        );
    }

    #[test]
    fn store_failures_share_a_generic_message() {
        let err = StoreError::Unavailable("timeout".into()).at(Stage::Checking);
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");
        assert_eq!(
            TransactionError::ConcurrentModification(AccountId::from("a")).user_message(),
            "Something went wrong. Please try again."
        );
    }

    #[test]
    fn errors_are_cloneable() {
        let error = TransactionError::InsufficientFunds;
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
