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

//! Runtime settings.
//!
//! Read from an optional `ledger.toml` and `LEDGER_*` environment variables
//! (nested keys use `__`, e.g. `LEDGER_LIMITS__DAILY_OUTGOING=50000`).
//!
//! ```toml
//! log_level = "debug"
//!
//! [limits]
//! daily_outgoing = "50000"
//!
//! [fees]
//! bill_fee = "10.00"
//! categories = { government = "0" }
//! ```

use crate::catalog::BillCategory;
use crate::limits::{DAILY_OUTGOING_LIMIT, LimitPolicy, MONTHLY_INCOMING_LIMIT, WALLET_LIMIT};
use crate::receipt::{BILL_FEE, FeeSchedule};
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use config::builder::DefaultState;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LimitSettings {
    pub wallet: Decimal,
    pub daily_outgoing: Decimal,
    pub monthly_incoming: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeeSettings {
    pub bill_fee: Decimal,
    /// Per-category overrides keyed by category id (`utilities`, `telecom`, ...).
    #[serde(default)]
    pub categories: HashMap<String, Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub log_level: String,
    pub limits: LimitSettings,
    pub fees: FeeSettings,
}

fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("log_level", "info")?
        .set_default("limits.wallet", WALLET_LIMIT.to_string())?
        .set_default("limits.daily_outgoing", DAILY_OUTGOING_LIMIT.to_string())?
        .set_default("limits.monthly_incoming", MONTHLY_INCOMING_LIMIT.to_string())?
        .set_default("fees.bill_fee", BILL_FEE.to_string())
}

impl Settings {
    /// Loads settings from `path` (or `ledger.toml` in the working directory
    /// when present) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("ledger").required(false),
        };
        with_defaults()?
            .add_source(file)
            .add_source(
                Environment::with_prefix("LEDGER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    /// Parses settings from TOML text alone, ignoring the environment.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        with_defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn limit_policy(&self) -> LimitPolicy {
        LimitPolicy {
            wallet: self.limits.wallet,
            daily_outgoing: self.limits.daily_outgoing,
            monthly_incoming: self.limits.monthly_incoming,
        }
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        let mut fees = FeeSchedule {
            bill_fee: self.fees.bill_fee,
            ..FeeSchedule::default()
        };
        for (key, fee) in &self.fees.categories {
            match BillCategory::from_str(key) {
                Ok(category) => fees = fees.with_category_fee(category, *fee),
                Err(()) => tracing::warn!(category = %key, "ignoring fee for unknown bill category"),
            }
        }
        fees
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            limits: LimitSettings {
                wallet: WALLET_LIMIT,
                daily_outgoing: DAILY_OUTGOING_LIMIT,
                monthly_incoming: MONTHLY_INCOMING_LIMIT,
            },
            fees: FeeSettings {
                bill_fee: BILL_FEE,
                categories: HashMap::new(),
            },
        }
    }
}
