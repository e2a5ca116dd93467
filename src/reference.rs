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

//! Reference and card number generation.
//!
//! Reference numbers are three independent random groups of four digits.
//! There is no checksum and no uniqueness guarantee.

use crate::base::ReferenceNumber;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Expiration written on every issued card.
pub const CARD_EXPIRATION: &str = "01/30";

pub trait ReferenceGenerator: Send + Sync {
    fn generate(&self) -> ReferenceNumber;
}

fn digit_groups<R: Rng>(rng: &mut R, groups: usize) -> String {
    (0..groups)
        .map(|_| rng.gen_range(1000..=9999).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Draws a fresh reference number from the thread RNG.
pub fn generate_reference() -> ReferenceNumber {
    ReferenceNumber(digit_groups(&mut rand::thread_rng(), ReferenceNumber::GROUPS))
}

/// Four space-separated groups of four digits.
pub fn generate_card_number() -> String {
    digit_groups(&mut rand::thread_rng(), 4)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomReferences;

impl ReferenceGenerator for RandomReferences {
    fn generate(&self) -> ReferenceNumber {
        generate_reference()
    }
}

/// Deterministic references (`0000 0000 0001`, `0000 0000 0002`, ...).
///
/// Handy when receipts need to be compared verbatim.
#[derive(Debug, Default)]
pub struct SequentialReferences {
    next: AtomicU64,
}

impl ReferenceGenerator for SequentialReferences {
    fn generate(&self) -> ReferenceNumber {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        let digits = format!("{:012}", n % 1_000_000_000_000);
        ReferenceNumber(format!("{} {} {}", &digits[0..4], &digits[4..8], &digits[8..12]))
    }
}
