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

//! Receipts for completed operations.

use crate::base::{AccountId, ReferenceNumber};
use crate::catalog::BillCategory;
use crate::entry::{EntryKind, EntryType, LedgerEntry};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::HashMap;

/// Flat convenience fee charged on every bill payment.
pub const BILL_FEE: Decimal = dec!(7.00);

/// Fees reported on receipts.
///
/// Only bill payments carry a fee. The fee is informational: the account is
/// debited the gross amount and the receipt shows how much of it reached the
/// biller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    pub bill_fee: Decimal,
    pub category_fees: HashMap<BillCategory, Decimal>,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            bill_fee: BILL_FEE,
            category_fees: HashMap::new(),
        }
    }
}

impl FeeSchedule {
    pub fn with_category_fee(mut self, category: BillCategory, fee: Decimal) -> Self {
        self.category_fees.insert(category, fee);
        self
    }

    pub fn fee_for(&self, kind: &EntryKind) -> Decimal {
        match kind {
            EntryKind::Bill { category, .. } => self
                .category_fees
                .get(category)
                .copied()
                .unwrap_or(self.bill_fee),
            _ => Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub reference: ReferenceNumber,
    #[serde(skip)]
    pub entry_type: EntryType,
    pub account: AccountId,
    pub counterparty: Option<String>,
    pub gross_amount: Decimal,
    pub fee: Decimal,
    pub net_amount: Decimal,
    pub balance_after: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Formats the receipt of a recorded entry.
pub fn build_receipt(
    account: &AccountId,
    entry: &LedgerEntry,
    fees: &FeeSchedule,
    balance_after: Decimal,
) -> Receipt {
    let fee = fees.fee_for(&entry.kind);
    Receipt {
        reference: entry.reference.clone(),
        entry_type: entry.entry_type(),
        account: account.clone(),
        counterparty: entry.kind.counterparty(),
        gross_amount: entry.amount,
        fee,
        net_amount: (entry.amount - fee).max(Decimal::ZERO),
        balance_after,
        timestamp: entry.timestamp,
    }
}

impl Receipt {
    /// Headline shown on the confirmation modal.
    pub fn summary(&self) -> String {
        let amount = format_peso(self.gross_amount);
        let counterparty = self.counterparty.as_deref().unwrap_or_default();
        match self.entry_type {
            EntryType::Deposit => format!("Successfully deposited {amount}"),
            EntryType::Transfer => format!("Transferred {amount} to {counterparty}"),
            EntryType::Received => format!("Received {amount} from {counterparty}"),
            EntryType::Bill => format!("Successfully paid {counterparty} bill of {amount}"),
            EntryType::Donation => format!("Your donation of {amount} was successful!"),
            EntryType::Investment => format!("Invested {amount} in {counterparty}"),
        }
    }

    /// Label/value rows for the receipt view.
    pub fn lines(&self) -> Vec<(&'static str, String)> {
        let mut lines = vec![("Reference No.", self.reference.to_string())];
        if let Some(counterparty) = &self.counterparty {
            lines.push(("To", counterparty.clone()));
        }
        lines.push(("Amount", format_peso(self.gross_amount)));
        if !self.fee.is_zero() {
            lines.push(("Fee", format_peso(self.fee)));
            lines.push(("Net Amount", format_peso(self.net_amount)));
        }
        lines.push(("Paid At", self.timestamp.format("%b %d, %Y %I:%M %p").to_string()));
        lines
    }
}

/// `₱1,234.50` style formatting, rounded to two places.
pub fn format_peso(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{sign}₱{grouped}.{fraction}")
}
