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

//! Fixed catalogs: billers, donation causes and investment instruments.

use crate::TransactionError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillCategory {
    Utilities,
    Telecom,
    Government,
    Education,
}

impl BillCategory {
    pub const ALL: [BillCategory; 4] = [
        Self::Utilities,
        Self::Telecom,
        Self::Government,
        Self::Education,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Utilities => "utilities",
            Self::Telecom => "telecom",
            Self::Government => "government",
            Self::Education => "education",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Utilities => "Utilities",
            Self::Telecom => "Telecommunications",
            Self::Government => "Government",
            Self::Education => "Education",
        }
    }

    pub fn billers(&self) -> impl Iterator<Item = &'static Biller> {
        let category = *self;
        BILLERS.iter().filter(move |b| b.category == category)
    }
}

impl FromStr for BillCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.id().eq_ignore_ascii_case(s) || c.name().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Biller {
    pub id: &'static str,
    pub name: &'static str,
    pub category: BillCategory,
}

pub const BILLERS: &[Biller] = &[
    Biller { id: "meralco", name: "Meralco", category: BillCategory::Utilities },
    Biller { id: "maynilad", name: "Maynilad", category: BillCategory::Utilities },
    Biller { id: "manila_water", name: "Manila Water", category: BillCategory::Utilities },
    Biller { id: "smart", name: "Smart", category: BillCategory::Telecom },
    Biller { id: "globe", name: "Globe", category: BillCategory::Telecom },
    Biller { id: "sun", name: "Sun", category: BillCategory::Telecom },
    Biller { id: "bir", name: "BIR", category: BillCategory::Government },
    Biller { id: "sss", name: "SSS", category: BillCategory::Government },
    Biller { id: "pagibig", name: "Pag-IBIG", category: BillCategory::Government },
    Biller { id: "deped", name: "DepEd", category: BillCategory::Education },
    Biller { id: "ched", name: "CHED", category: BillCategory::Education },
    Biller { id: "tesda", name: "TESDA", category: BillCategory::Education },
];

/// Looks a biller up by id or display name, ignoring case.
pub fn find_biller(key: &str) -> Result<&'static Biller, TransactionError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(TransactionError::MissingField("biller"));
    }
    BILLERS
        .iter()
        .find(|b| b.id.eq_ignore_ascii_case(key) || b.name.eq_ignore_ascii_case(key))
        .ok_or_else(|| TransactionError::UnknownBiller(key.to_string()))
}

/// Causes accepted by the donation pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Cause {
    Food,
    Education,
    Humanity,
}

impl Cause {
    pub const ALL: [Cause; 3] = [Self::Food, Self::Education, Self::Humanity];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Food => "Help disaster victims meet their food needs",
            Self::Education => "Support children to get quality education",
            Self::Humanity => "Aid refugees with basic necessities",
        }
    }

    pub fn parse(key: &str) -> Result<Self, TransactionError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(TransactionError::MissingField("cause"));
        }
        Self::ALL
            .into_iter()
            .find(|c| c.to_string().eq_ignore_ascii_case(key))
            .ok_or_else(|| TransactionError::UnknownCause(key.to_string()))
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Food => "FOOD",
            Self::Education => "EDUCATION",
            Self::Humanity => "HUMANITY",
        };
        write!(f, "{label}")
    }
}

/// Investment products and their minimum ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instrument {
    MoneyMarket,
    GovernmentBonds,
    IndexFund,
    Equities,
}

impl Instrument {
    pub const ALL: [Instrument; 4] = [
        Self::MoneyMarket,
        Self::GovernmentBonds,
        Self::IndexFund,
        Self::Equities,
    ];

    pub fn minimum(&self) -> Decimal {
        match self {
            Self::MoneyMarket => dec!(500),
            Self::GovernmentBonds => dec!(1000),
            Self::IndexFund => dec!(1000),
            Self::Equities => dec!(5000),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::MoneyMarket => "Money Market Fund",
            Self::GovernmentBonds => "Government Bonds",
            Self::IndexFund => "Index Fund",
            Self::Equities => "Equities",
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::MoneyMarket => "money_market",
            Self::GovernmentBonds => "government_bonds",
            Self::IndexFund => "index_fund",
            Self::Equities => "equities",
        }
    }

    pub fn parse(key: &str) -> Result<Self, TransactionError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(TransactionError::MissingField("instrument"));
        }
        Self::ALL
            .into_iter()
            .find(|i| i.id().eq_ignore_ascii_case(key) || i.name().eq_ignore_ascii_case(key))
            .ok_or_else(|| TransactionError::UnknownInstrument(key.to_string()))
    }

    /// Rejects amounts below the instrument minimum.
    pub fn check_minimum(&self, amount: Decimal) -> Result<(), TransactionError> {
        if amount < self.minimum() {
            return Err(TransactionError::BelowMinimum {
                minimum: self.minimum(),
            });
        }
        Ok(())
    }
}
