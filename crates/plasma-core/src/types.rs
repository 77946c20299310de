// crates/plasma-core/src/types.rs
//
// Identifiers and small value types shared across the workspace:
// 20-byte account addresses, 32-byte roots/words, the three block roots,
// and the packed (fork, block) position encoding used by block submission.

use std::fmt;
use std::str::FromStr;

use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::PlasmaError;

/// A 32-byte word (merkle root, trie key, trie value).
pub type Word = [u8; 32];

/// The all-zero word.
pub const ZERO_WORD: Word = [0u8; 32];

/// A 20-byte account or contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    /// An address whose low 8 bytes hold `n` (big-endian).
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Address(bytes)
    }

    /// Deterministically derive an address from a label (last 20 bytes of SHA-256).
    pub fn derive(label: &str) -> Self {
        let digest = Sha256::digest(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Address(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = PlasmaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)
            .map_err(|e| PlasmaError::Serialization(format!("invalid address {:?}: {}", s, e)))?;
        let arr: [u8; 20] = bytes.try_into().map_err(|_| {
            PlasmaError::Serialization(format!("address {:?} is not 20 bytes", s))
        })?;
        Ok(Address(arr))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The three roots committed by every plasma block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockRoots {
    pub states_root: Word,
    pub transactions_root: Word,
    pub receipts_root: Word,
}

impl BlockRoots {
    pub fn new(states_root: Word, transactions_root: Word, receipts_root: Word) -> Self {
        Self {
            states_root,
            transactions_root,
            receipts_root,
        }
    }
}

/// A (fork, block) pair packed as `fork * 2^128 + block` for submission.
///
/// The same packing carries `(fork, epoch)` and `(startBlock, endBlock)` pairs
/// when a whole non-request epoch is submitted at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPosition {
    pub fork: u64,
    pub block: u64,
}

impl BlockPosition {
    pub fn new(fork: u64, block: u64) -> Self {
        Self { fork, block }
    }

    /// Pack into a 256-bit word.
    pub fn encode(&self) -> U256 {
        (U256::from(self.fork) << 128) | U256::from(self.block)
    }

    /// Unpack a 256-bit word.
    ///
    /// # Errors
    /// Returns `PlasmaError::InvalidState` if either half does not fit in 64 bits.
    pub fn decode(encoded: U256) -> Result<Self, PlasmaError> {
        let low_mask = (U256::one() << 128) - U256::one();
        let high = encoded >> 128;
        let low = encoded & low_mask;
        if high > U256::from(u64::MAX) || low > U256::from(u64::MAX) {
            return Err(PlasmaError::InvalidState(format!(
                "position {} does not fit (u64, u64)",
                encoded
            )));
        }
        Ok(Self {
            fork: high.low_u64(),
            block: low.low_u64(),
        })
    }
}

/// Trie key of an account's slot in a requestable contract's storage trie.
pub fn trie_key(account: &Address, slot: u64) -> Word {
    let mut hasher = Sha256::new();
    let mut padded = [0u8; 32];
    padded[12..].copy_from_slice(&account.0);
    hasher.update(padded);
    hasher.update(word_from_u256(U256::from(slot)));
    hasher.finalize().into()
}

/// A 32-byte big-endian word holding `value`.
pub fn word_from_u256(value: U256) -> Word {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}
