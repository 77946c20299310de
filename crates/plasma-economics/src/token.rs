// crates/plasma-economics/src/token.rs
//
// TON / WTON balance bookkeeping.
//
// TON is the 18-decimal (wad) staking token. WTON is its 27-decimal (ray)
// wrapper: swapping TON in locks it at the wrapper's address and mints the
// same amount of WTON. Seigniorage is minted as WTON, so swapping back may
// need more TON than is locked; the wrapper holds the TON minter role and
// mints the shortfall.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use plasma_core::{Address, PlasmaError, Ray, U256};

/// Decimals of TON.
pub const TON_DECIMALS: u32 = 18;

/// Decimals of WTON.
pub const WTON_DECIMALS: u32 = 27;

/// Balances of both tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLedger {
    wton_address: Address,
    ton: BTreeMap<Address, U256>,
    wton: BTreeMap<Address, Ray>,
    ton_total: U256,
    wton_total: Ray,
}

impl TokenLedger {
    /// Create an empty ledger; `wton_address` is where swapped TON is locked.
    pub fn new(wton_address: Address) -> Self {
        Self {
            wton_address,
            ton: BTreeMap::new(),
            wton: BTreeMap::new(),
            ton_total: U256::zero(),
            wton_total: Ray::ZERO,
        }
    }

    pub fn wton_address(&self) -> Address {
        self.wton_address
    }

    pub fn ton_balance_of(&self, account: &Address) -> U256 {
        self.ton.get(account).copied().unwrap_or_default()
    }

    pub fn wton_balance_of(&self, account: &Address) -> Ray {
        self.wton.get(account).copied().unwrap_or_default()
    }

    pub fn ton_total_supply(&self) -> U256 {
        self.ton_total
    }

    pub fn wton_total_supply(&self) -> Ray {
        self.wton_total
    }

    /// Total token supply in ray: circulating TON (excluding TON locked in
    /// the wrapper) plus all WTON.
    pub fn total_supply_ray(&self) -> Result<Ray, PlasmaError> {
        let locked = self.ton_balance_of(&self.wton_address);
        let circulating = self.ton_total.saturating_sub(locked);
        Ray::from_wad(circulating)?.checked_add(self.wton_total)
    }

    /// Mint `amount` wad of TON to `to`.
    pub fn mint_ton(&mut self, to: Address, amount: U256) -> Result<(), PlasmaError> {
        self.ton_total = self
            .ton_total
            .checked_add(amount)
            .ok_or_else(|| PlasmaError::Arithmetic("TON supply overflows".to_string()))?;
        let balance = self.ton.entry(to).or_default();
        *balance += amount;
        Ok(())
    }

    /// Mint `amount` of WTON to `to`.
    pub fn mint_wton(&mut self, to: Address, amount: Ray) -> Result<(), PlasmaError> {
        if amount.is_zero() {
            return Ok(());
        }
        self.wton_total = self.wton_total.checked_add(amount)?;
        let balance = self.wton.entry(to).or_default();
        *balance = balance.checked_add(amount)?;
        Ok(())
    }

    /// Move `amount` of WTON from `from` to `to`.
    ///
    /// # Errors
    /// Returns `PlasmaError::InsufficientBalance` if `from` holds less than `amount`.
    pub fn transfer_wton(
        &mut self,
        from: Address,
        to: Address,
        amount: Ray,
    ) -> Result<(), PlasmaError> {
        let available = self.wton_balance_of(&from);
        if amount > available {
            return Err(PlasmaError::InsufficientBalance {
                account: from,
                requested: amount,
                available,
            });
        }
        self.wton.insert(from, available.saturating_sub(amount));
        let balance = self.wton.entry(to).or_default();
        *balance = balance.checked_add(amount)?;
        Ok(())
    }

    /// Lock `amount` wad of TON from `account` in the wrapper and mint the
    /// equivalent WTON. Returns the WTON minted.
    pub fn swap_from_ton(&mut self, account: Address, amount: U256) -> Result<Ray, PlasmaError> {
        let available = self.ton_balance_of(&account);
        if amount > available {
            return Err(PlasmaError::InsufficientBalance {
                account,
                requested: Ray::from_wad(amount)?,
                available: Ray::from_wad(available)?,
            });
        }
        let wrapped = Ray::from_wad(amount)?;
        self.ton.insert(account, available - amount);
        *self.ton.entry(self.wton_address).or_default() += amount;
        self.mint_wton(account, wrapped)?;
        Ok(wrapped)
    }

    /// Burn `amount` of WTON from `account` and pay out TON, truncated to wad.
    /// Returns the TON paid.
    pub fn swap_to_ton(&mut self, account: Address, amount: Ray) -> Result<U256, PlasmaError> {
        let available = self.wton_balance_of(&account);
        if amount > available {
            return Err(PlasmaError::InsufficientBalance {
                account,
                requested: amount,
                available,
            });
        }
        let payout = amount.to_wad();
        let locked = self.ton_balance_of(&self.wton_address);
        let shortfall = payout.saturating_sub(locked);

        self.wton.insert(account, available.saturating_sub(amount));
        self.wton_total = self.wton_total.saturating_sub(amount);
        if !shortfall.is_zero() {
            self.mint_ton(self.wton_address, shortfall)?;
        }
        *self.ton.entry(self.wton_address).or_default() -= payout;
        *self.ton.entry(account).or_default() += payout;
        Ok(payout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ton(units: u64) -> U256 {
        U256::from(units) * U256::exp10(TON_DECIMALS as usize)
    }

    fn ledger() -> TokenLedger {
        TokenLedger::new(Address::derive("WTON"))
    }

    #[test]
    fn test_swap_from_ton_locks_ton() {
        let mut tokens = ledger();
        let alice = Address::derive("alice");
        tokens.mint_ton(alice, ton(100)).unwrap();

        let wrapped = tokens.swap_from_ton(alice, ton(40)).unwrap();
        assert_eq!(wrapped, Ray::from_units(40));
        assert_eq!(tokens.ton_balance_of(&alice), ton(60));
        assert_eq!(tokens.wton_balance_of(&alice), Ray::from_units(40));
        assert_eq!(tokens.ton_balance_of(&tokens.wton_address()), ton(40));
        // Locked TON is not double counted.
        assert_eq!(tokens.total_supply_ray().unwrap(), Ray::from_units(100));
    }

    #[test]
    fn test_swap_from_ton_insufficient() {
        let mut tokens = ledger();
        let alice = Address::derive("alice");
        tokens.mint_ton(alice, ton(1)).unwrap();
        let err = tokens.swap_from_ton(alice, ton(2)).unwrap_err();
        assert!(matches!(err, PlasmaError::InsufficientBalance { .. }));
        assert_eq!(tokens.ton_balance_of(&alice), ton(1));
    }

    #[test]
    fn test_swap_to_ton_truncates() {
        let mut tokens = ledger();
        let alice = Address::derive("alice");
        tokens.mint_ton(alice, ton(1)).unwrap();
        tokens.swap_from_ton(alice, ton(1)).unwrap();

        // 0.5 WTON plus one ray unit of dust.
        let amount = Ray::from_raw(Ray::from_units(1).raw() / 2 + 1);
        let paid = tokens.swap_to_ton(alice, amount).unwrap();
        assert_eq!(paid, ton(1) / 2);
        assert_eq!(tokens.ton_balance_of(&alice), ton(1) / 2);
    }

    #[test]
    fn test_swap_to_ton_mints_shortfall() {
        let mut tokens = ledger();
        let alice = Address::derive("alice");
        tokens.mint_wton(alice, Ray::from_units(5)).unwrap();

        let paid = tokens.swap_to_ton(alice, Ray::from_units(5)).unwrap();
        assert_eq!(paid, ton(5));
        assert_eq!(tokens.ton_total_supply(), ton(5));
        assert!(tokens.ton_balance_of(&tokens.wton_address()).is_zero());
        assert!(tokens.wton_total_supply().is_zero());
    }

    #[test]
    fn test_transfer_wton() {
        let mut tokens = ledger();
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        tokens.mint_wton(alice, Ray::from_units(10)).unwrap();
        tokens.transfer_wton(alice, bob, Ray::from_units(4)).unwrap();
        assert_eq!(tokens.wton_balance_of(&alice), Ray::from_units(6));
        assert_eq!(tokens.wton_balance_of(&bob), Ray::from_units(4));

        let err = tokens
            .transfer_wton(alice, bob, Ray::from_units(7))
            .unwrap_err();
        assert_eq!(
            err,
            PlasmaError::InsufficientBalance {
                account: alice,
                requested: Ray::from_units(7),
                available: Ray::from_units(6),
            }
        );
    }
}
