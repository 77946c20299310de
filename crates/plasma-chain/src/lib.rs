// crates/plasma-chain/src/lib.rs
//
// plasma-chain: Epoch, block, fork, and request ledgers for the Plasma root
// chain.
//
// The operator submits blocks into alternating non-request and request
// epochs; users queue enter/exit requests that are sealed into request blocks
// and applied two request epochs later. Blocks finalize after the withholding
// challenge period, and an invalid block forks the chain from its first
// unfinalized block.

pub mod block;
pub mod epoch;
pub mod events;
pub mod fork;
pub mod params;
pub mod request;
pub mod root_chain;

// Re-export key types for ergonomic access from downstream crates.
pub use block::{BlockKind, PlasmaBlock};
pub use epoch::{Epoch, EpochStatus};
pub use events::ChainEvent;
pub use fork::{Fork, ForkManager};
pub use params::{ChainParams, ETHER, REBASE_EPOCHS};
pub use request::{Request, RequestBlock, RequestRegistry};
pub use root_chain::{RootChain, Submission};
