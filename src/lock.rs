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

//! Lock gate.
//!
//! While `lock.status` is set, every operation the account initiates is
//! refused (deposit, transfer, bill payment, donation, investment). The
//! account can still be read and can still be credited by a transfer from
//! someone else: only the initiating side is gated.

use crate::account::Account;
use crate::TransactionError;

pub fn is_locked(account: &Account) -> bool {
    account.locked()
}

/// Refuses an initiated operation when the account is locked.
///
/// The refusal is logged once, by the engine, with the operation kind.
pub fn gate(account: &Account) -> Result<(), TransactionError> {
    if is_locked(account) {
        return Err(TransactionError::AccountLocked);
    }
    Ok(())
}
