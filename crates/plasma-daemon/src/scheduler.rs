// crates/plasma-daemon/src/scheduler.rs
//
// Block scheduler for the Plasma daemon.
//
// Advances the simulated network one root block per interval until a block
// limit is reached or a shutdown signal arrives. The network is shared
// behind a `RwLock` so other tasks can read it between blocks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::network::Network;

pub struct BlockScheduler {
    network: Arc<RwLock<Network>>,
    interval: Duration,
    /// Stop after this many blocks; run until shutdown when `None`.
    max_blocks: Option<u64>,
}

impl BlockScheduler {
    pub fn new(network: Arc<RwLock<Network>>, interval: Duration, max_blocks: Option<u64>) -> Self {
        Self {
            network,
            interval,
            max_blocks,
        }
    }

    /// Run the scheduler loop. Returns the number of blocks produced.
    pub async fn run(&mut self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(
            "Block scheduler started (interval={}ms, max_blocks={:?})",
            self.interval.as_millis(),
            self.max_blocks
        );

        let mut produced = 0u64;
        loop {
            if self.max_blocks.is_some_and(|max| produced >= max) {
                tracing::info!("Block limit reached after {} blocks", produced);
                break;
            }
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Block scheduler received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.advance_block().await?;
                    produced += 1;
                }
            }
        }

        Ok(produced)
    }

    /// Produce one root block.
    pub async fn advance_block(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut network = self.network.write().await;
        let report = network.step().map_err(|e| {
            tracing::error!("Block {} failed: {}", network.block_number(), e);
            e
        })?;
        if report.finalized_blocks > 0 {
            tracing::info!(
                block = report.block_number,
                finalized = report.finalized_blocks,
                "child blocks finalized"
            );
        }
        tracing::debug!(
            block = report.block_number,
            time = network.timestamp(),
            submitted = ?report.submitted_block,
            seigs = %report.seigs,
            "root block produced"
        );
        Ok(())
    }
}
