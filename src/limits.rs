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

//! Limit policy.
//!
//! Three ceilings apply to an account:
//!
//! - **Daily outgoing**: total debits in the current calendar day (UTC).
//! - **Monthly incoming**: total credits in the current calendar month (UTC).
//! - **Wallet**: the balance itself. Reported only, never enforced.
//!
//! Usage counters are bucketed by period: a counter whose period is not the
//! current one counts as zero, so the daily and monthly totals reset on the
//! calendar boundary without a background job.
//!
//! Every check is a pure function of an account snapshot, an amount and the
//! evaluation time.

use crate::account::Account;
use crate::TransactionError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const WALLET_LIMIT: Decimal = dec!(500000);
pub const DAILY_OUTGOING_LIMIT: Decimal = dec!(100000);
pub const MONTHLY_INCOMING_LIMIT: Decimal = dec!(500000);

/// Bucket key of the daily counter, e.g. `2025-03-01`.
pub fn day_period(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// Bucket key of the monthly counter, e.g. `2025-03`.
pub fn month_period(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// Running total for one period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub amount: Decimal,
}

impl UsageCounter {
    /// Usage in `period`; zero if the counter belongs to another period.
    pub fn used_in(&self, period: &str) -> Decimal {
        if self.period == period {
            self.amount
        } else {
            Decimal::ZERO
        }
    }

    /// Adds `amount` to the `period` bucket, starting over on a new period.
    pub fn add(&mut self, period: String, amount: Decimal) {
        if self.period != period {
            self.period = period;
            self.amount = Decimal::ZERO;
        }
        self.amount = self.amount.saturating_add(amount);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitReason {
    DailyOutgoing,
    MonthlyIncoming,
    Wallet,
}

impl fmt::Display for LimitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DailyOutgoing => write!(f, "daily outgoing limit"),
            Self::MonthlyIncoming => write!(f, "monthly incoming limit"),
            Self::Wallet => write!(f, "wallet limit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitDecision {
    Allowed,
    Rejected(LimitReason),
}

impl LimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn into_result(self) -> Result<(), TransactionError> {
        match self {
            Self::Allowed => Ok(()),
            Self::Rejected(reason) => Err(TransactionError::LimitExceeded(reason)),
        }
    }
}

/// Usage of one ceiling, as shown on the profile limits view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitUsage {
    pub used: Decimal,
    pub limit: Decimal,
    pub remaining: Decimal,
}

impl LimitUsage {
    fn new(used: Decimal, limit: Decimal) -> Self {
        Self {
            used,
            limit,
            remaining: (limit - used).max(Decimal::ZERO),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitsReport {
    pub wallet: LimitUsage,
    pub daily_outgoing: LimitUsage,
    pub monthly_incoming: LimitUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitPolicy {
    pub wallet: Decimal,
    pub daily_outgoing: Decimal,
    pub monthly_incoming: Decimal,
}

impl Default for LimitPolicy {
    fn default() -> Self {
        Self {
            wallet: WALLET_LIMIT,
            daily_outgoing: DAILY_OUTGOING_LIMIT,
            monthly_incoming: MONTHLY_INCOMING_LIMIT,
        }
    }
}

impl LimitPolicy {
    /// Rejects a debit that would push today's outgoing total over the ceiling.
    pub fn check_outgoing(
        &self,
        account: &Account,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> LimitDecision {
        let used = account.daily_outgoing().used_in(&day_period(at));
        if used.checked_add(amount).is_none_or(|total| total > self.daily_outgoing) {
            LimitDecision::Rejected(LimitReason::DailyOutgoing)
        } else {
            LimitDecision::Allowed
        }
    }

    /// Rejects a credit that would push this month's incoming total over the ceiling.
    pub fn check_incoming(
        &self,
        account: &Account,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> LimitDecision {
        let used = account.monthly_incoming().used_in(&month_period(at));
        if used.checked_add(amount).is_none_or(|total| total > self.monthly_incoming) {
            LimitDecision::Rejected(LimitReason::MonthlyIncoming)
        } else {
            LimitDecision::Allowed
        }
    }

    /// Whether a credit would leave the balance over the wallet ceiling.
    ///
    /// Advisory only: the engine logs a rejection and still applies the credit.
    pub fn check_wallet(&self, account: &Account, amount: Decimal) -> LimitDecision {
        if account.balance().checked_add(amount).is_none_or(|total| total > self.wallet) {
            LimitDecision::Rejected(LimitReason::Wallet)
        } else {
            LimitDecision::Allowed
        }
    }

    pub fn report(&self, account: &Account, at: DateTime<Utc>) -> LimitsReport {
        LimitsReport {
            wallet: LimitUsage::new(account.balance(), self.wallet),
            daily_outgoing: LimitUsage::new(
                account.daily_outgoing().used_in(&day_period(at)),
                self.daily_outgoing,
            ),
            monthly_incoming: LimitUsage::new(
                account.monthly_incoming().used_in(&month_period(at)),
                self.monthly_incoming,
            ),
        }
    }
}
