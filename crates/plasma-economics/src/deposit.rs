// crates/plasma-economics/src/deposit.rs
//
// Deposit manager: custody of staked WTON and the withdrawal queue.
//
// Stake leaves a root chain in two steps. `enqueue_withdrawal` records a
// request that matures `withdrawal_delay` blocks later; once matured,
// `complete_next` releases the oldest pending request of that depositor.
// Requests are processed strictly in the order they were made.
//
// The manager only tracks amounts. Moving WTON in and out of its address is
// done by the staking facade, which holds the token ledger.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use plasma_core::{Address, PlasmaError, Ray};

/// A single withdrawal waiting for its delay to elapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub amount: Ray,
    /// First block at which the request may be processed.
    pub withdrawable_block: u64,
    pub processed: bool,
}

/// Per (root chain, depositor) bookkeeping. Keyed by tuples, so the manager
/// itself is not serialized.
#[derive(Debug, Clone)]
pub struct DepositManager {
    address: Address,
    withdrawal_delay: u64,
    accumulated_staked: BTreeMap<(Address, Address), Ray>,
    pending_unstaked: BTreeMap<(Address, Address), Ray>,
    accumulated_unstaked: BTreeMap<(Address, Address), Ray>,
    requests: BTreeMap<(Address, Address), Vec<WithdrawalRequest>>,
    /// Index of the next unprocessed request in `requests`.
    request_index: BTreeMap<(Address, Address), usize>,
}

impl DepositManager {
    pub fn new(address: Address, withdrawal_delay: u64) -> Self {
        Self {
            address,
            withdrawal_delay,
            accumulated_staked: BTreeMap::new(),
            pending_unstaked: BTreeMap::new(),
            accumulated_unstaked: BTreeMap::new(),
            requests: BTreeMap::new(),
            request_index: BTreeMap::new(),
        }
    }

    /// Address holding the staked WTON.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn withdrawal_delay(&self) -> u64 {
        self.withdrawal_delay
    }

    pub fn record_deposit(
        &mut self,
        root_chain: Address,
        depositor: Address,
        amount: Ray,
    ) -> Result<(), PlasmaError> {
        add_to(&mut self.accumulated_staked, (root_chain, depositor), amount)
    }

    /// Queue a withdrawal requested at `block`. Returns the block at which it
    /// matures.
    pub fn enqueue_withdrawal(
        &mut self,
        root_chain: Address,
        depositor: Address,
        amount: Ray,
        block: u64,
    ) -> Result<u64, PlasmaError> {
        let withdrawable_block = block
            .checked_add(self.withdrawal_delay)
            .ok_or_else(|| PlasmaError::Arithmetic("withdrawable block overflows".to_string()))?;
        let key = (root_chain, depositor);
        add_to(&mut self.pending_unstaked, key, amount)?;
        self.requests.entry(key).or_default().push(WithdrawalRequest {
            amount,
            withdrawable_block,
            processed: false,
        });
        tracing::debug!(%root_chain, %depositor, %amount, withdrawable_block, "withdrawal queued");
        Ok(withdrawable_block)
    }

    /// Amount of the oldest pending request, if it has matured by `block`.
    ///
    /// # Errors
    /// Returns `PlasmaError::NotFound` when nothing is pending and
    /// `PlasmaError::WithdrawalNotMatured` when the oldest request is still
    /// inside its delay.
    pub fn next_matured(
        &self,
        root_chain: &Address,
        depositor: &Address,
        block: u64,
    ) -> Result<Ray, PlasmaError> {
        let request = self.next_pending(&(*root_chain, *depositor))?;
        if block < request.withdrawable_block {
            return Err(PlasmaError::WithdrawalNotMatured {
                withdrawable_at: request.withdrawable_block,
                current: block,
            });
        }
        Ok(request.amount)
    }

    /// Mark the oldest matured request processed and move its amount from
    /// pending to unstaked. Returns the amount released.
    pub fn complete_next(
        &mut self,
        root_chain: Address,
        depositor: Address,
        block: u64,
    ) -> Result<Ray, PlasmaError> {
        let amount = self.next_matured(&root_chain, &depositor, block)?;
        let key = (root_chain, depositor);
        let index = self.request_index.get(&key).copied().unwrap_or(0);
        if let Some(request) = self.requests.get_mut(&key).and_then(|r| r.get_mut(index)) {
            request.processed = true;
        }
        self.request_index.insert(key, index + 1);

        let pending = self.pending_unstaked(&root_chain, &depositor);
        self.pending_unstaked.insert(key, pending.saturating_sub(amount));
        add_to(&mut self.accumulated_unstaked, key, amount)?;
        Ok(amount)
    }

    fn next_pending(&self, key: &(Address, Address)) -> Result<&WithdrawalRequest, PlasmaError> {
        let index = self.request_index.get(key).copied().unwrap_or(0);
        self.requests
            .get(key)
            .and_then(|requests| requests.get(index))
            .ok_or_else(|| {
                PlasmaError::NotFound(format!(
                    "no pending withdrawal of {} on root chain {}",
                    key.1, key.0
                ))
            })
    }

    pub fn requests(&self, root_chain: &Address, depositor: &Address) -> &[WithdrawalRequest] {
        self.requests
            .get(&(*root_chain, *depositor))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn num_requests(&self, root_chain: &Address, depositor: &Address) -> usize {
        self.requests(root_chain, depositor).len()
    }

    pub fn num_pending_requests(&self, root_chain: &Address, depositor: &Address) -> usize {
        let index = self
            .request_index
            .get(&(*root_chain, *depositor))
            .copied()
            .unwrap_or(0);
        self.num_requests(root_chain, depositor).saturating_sub(index)
    }

    pub fn pending_unstaked(&self, root_chain: &Address, depositor: &Address) -> Ray {
        lookup(&self.pending_unstaked, root_chain, depositor)
    }

    pub fn accumulated_unstaked(&self, root_chain: &Address, depositor: &Address) -> Ray {
        lookup(&self.accumulated_unstaked, root_chain, depositor)
    }

    pub fn accumulated_staked(&self, root_chain: &Address, depositor: &Address) -> Ray {
        lookup(&self.accumulated_staked, root_chain, depositor)
    }
}

fn lookup(map: &BTreeMap<(Address, Address), Ray>, root_chain: &Address, depositor: &Address) -> Ray {
    map.get(&(*root_chain, *depositor)).copied().unwrap_or_default()
}

fn add_to(
    map: &mut BTreeMap<(Address, Address), Ray>,
    key: (Address, Address),
    amount: Ray,
) -> Result<(), PlasmaError> {
    let entry = map.entry(key).or_default();
    *entry = entry.checked_add(amount)?;
    Ok(())
}
