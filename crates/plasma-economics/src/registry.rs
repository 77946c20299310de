// crates/plasma-economics/src/registry.rs
//
// Root chains accepted for staking, with their operators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use plasma_core::{Address, PlasmaError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootChainRegistry {
    operators: BTreeMap<Address, Address>,
}

impl RootChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns `PlasmaError::InvalidState` if `root_chain` is already registered.
    pub fn register(&mut self, root_chain: Address, operator: Address) -> Result<(), PlasmaError> {
        if self.operators.contains_key(&root_chain) {
            return Err(PlasmaError::InvalidState(format!(
                "root chain {} already registered",
                root_chain
            )));
        }
        self.operators.insert(root_chain, operator);
        Ok(())
    }

    pub fn operator_of(&self, root_chain: &Address) -> Result<Address, PlasmaError> {
        self.operators
            .get(root_chain)
            .copied()
            .ok_or_else(|| PlasmaError::NotFound(format!("root chain {}", root_chain)))
    }

    pub fn contains(&self, root_chain: &Address) -> bool {
        self.operators.contains_key(root_chain)
    }

    /// Registered root chains with their operators, by address.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Address)> {
        self.operators.iter()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}
