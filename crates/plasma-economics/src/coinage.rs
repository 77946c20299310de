// crates/plasma-economics/src/coinage.rs
//
// Factor-based compounding balances.
//
// Every holder's balance is stored as a raw amount and read through a shared
// factor: `balance = raw * factor`. Growing the factor grows every balance at
// once, so distributing seigniorage to all depositors of a root chain is a
// single write. The same ledger type backs both the per-root-chain coinages
// (keyed by depositor) and `tot` (keyed by root chain).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use plasma_core::{Address, PlasmaError, Ray};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coinage {
    factor: Ray,
    raw_balances: BTreeMap<Address, Ray>,
    raw_total: Ray,
}

impl Coinage {
    /// An empty ledger with factor 1.
    pub fn new() -> Self {
        Self {
            factor: Ray::ONE,
            raw_balances: BTreeMap::new(),
            raw_total: Ray::ZERO,
        }
    }

    pub fn factor(&self) -> Ray {
        self.factor
    }

    /// Replace the factor. Returns the previous one.
    ///
    /// # Errors
    /// Returns `PlasmaError::Arithmetic` for a zero factor.
    pub fn set_factor(&mut self, factor: Ray) -> Result<Ray, PlasmaError> {
        if factor.is_zero() {
            return Err(PlasmaError::Arithmetic("coinage factor must be positive".to_string()));
        }
        Ok(std::mem::replace(&mut self.factor, factor))
    }

    pub fn balance_of(&self, account: &Address) -> Result<Ray, PlasmaError> {
        self.raw_balance_of(account).rmul(self.factor)
    }

    pub fn total_supply(&self) -> Result<Ray, PlasmaError> {
        self.raw_total.rmul(self.factor)
    }

    pub fn is_empty(&self) -> bool {
        self.raw_total.is_zero()
    }

    fn raw_balance_of(&self, account: &Address) -> Ray {
        self.raw_balances.get(account).copied().unwrap_or_default()
    }

    /// Scale every balance so the total supply becomes `target`, rounding
    /// the new factor down so the supply never exceeds it.
    ///
    /// # Errors
    /// Returns `PlasmaError::InvalidState` if nothing has been minted.
    pub fn set_total_supply(&mut self, target: Ray) -> Result<(), PlasmaError> {
        if self.raw_total.is_zero() {
            return Err(PlasmaError::InvalidState(
                "cannot scale an empty coinage".to_string(),
            ));
        }
        let factor = target.rdiv(self.raw_total)?;
        self.set_factor(factor)?;
        Ok(())
    }

    /// Credit `amount` (in current, factored units) to `account`. The credited
    /// balance may fall short of `amount` by rounding.
    pub fn mint(&mut self, account: Address, amount: Ray) -> Result<(), PlasmaError> {
        let raw = amount.rdiv(self.factor)?;
        self.credit_raw(account, raw)
    }

    /// Like `mint`, but rounds the raw amount up so the credited balance is
    /// at least `amount`.
    pub fn mint_up(&mut self, account: Address, amount: Ray) -> Result<(), PlasmaError> {
        let raw = amount.rdiv_up(self.factor)?;
        self.credit_raw(account, raw)
    }

    fn credit_raw(&mut self, account: Address, raw: Ray) -> Result<(), PlasmaError> {
        let total = self.raw_total.checked_add(raw)?;
        let balance = self.raw_balance_of(&account).checked_add(raw)?;
        self.raw_balances.insert(account, balance);
        self.raw_total = total;
        Ok(())
    }

    /// Debit `amount` (in current, factored units) from `account`.
    ///
    /// Burning the whole balance clears the raw balance exactly; a partial
    /// burn rounds the raw amount up so the holder never keeps dust it did
    /// not own.
    ///
    /// # Errors
    /// Returns `PlasmaError::InsufficientBalance` if `amount` exceeds the balance.
    pub fn burn_from(&mut self, account: Address, amount: Ray) -> Result<(), PlasmaError> {
        self.burn(account, amount, true)
    }

    /// Like `burn_from`, but a partial burn rounds the raw amount down so the
    /// balance drops by at most `amount`.
    pub fn burn_down(&mut self, account: Address, amount: Ray) -> Result<(), PlasmaError> {
        self.burn(account, amount, false)
    }

    fn burn(&mut self, account: Address, amount: Ray, round_up: bool) -> Result<(), PlasmaError> {
        let available = self.balance_of(&account)?;
        if amount > available {
            return Err(PlasmaError::InsufficientBalance {
                account,
                requested: amount,
                available,
            });
        }
        let raw_balance = self.raw_balance_of(&account);
        let raw = if amount == available {
            raw_balance
        } else if round_up {
            amount.rdiv_up(self.factor)?.min(raw_balance)
        } else {
            amount.rdiv(self.factor)?
        };
        let remaining = raw_balance.saturating_sub(raw);
        if remaining.is_zero() {
            self.raw_balances.remove(&account);
        } else {
            self.raw_balances.insert(account, remaining);
        }
        self.raw_total = self.raw_total.saturating_sub(raw);
        Ok(())
    }
}

impl Default for Coinage {
    fn default() -> Self {
        Self::new()
    }
}
