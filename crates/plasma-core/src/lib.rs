// crates/plasma-core/src/lib.rs
//
// plasma-core: Core types, fixed-point math, and collaborator traits for the
// Plasma root chain and its seigniorage staking engine.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines the error taxonomy, the 27-decimal `Ray` type, addresses and
// block positions, the append-only event log, and the trait interfaces for
// challenge verification, token mapping, reward pools, and exit release.

pub mod error;
pub mod events;
pub mod ray;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use plasma_core::Ray;`

pub use error::PlasmaError;
pub use events::EventLog;
pub use ray::{Ray, RAY, RAY_DECIMALS, WAD, WAD_DECIMALS};
pub use traits::{ChallengeVerifier, ExitHandler, ExitRelease, RewardPool, TokenMapping};
pub use types::{trie_key, word_from_u256, Address, BlockPosition, BlockRoots, Word, ZERO_WORD};

// Downstream crates do their 256-bit math with the same integer type.
pub use primitive_types::U256;
