// SPDX-License-Identifier: Apache-2.0

//! Fan-out driver for multi-record commands (spec §4.6, §5, §9).

use std::sync::{Arc, atomic::AtomicBool};

use tokio::sync::{Semaphore, mpsc};

use super::{
    multi::{MultiCommand, MultiOp},
    record_set::RecordSet,
};
use crate::cluster::StaticCluster;

/// Fans a [`MultiOp`] out across a cluster's nodes, one child
/// [`MultiCommand`] per node.
pub struct MultiExecutor;

impl MultiExecutor {
    /// Resolves `op`'s `(node, child-op)` targets (spec §4.6 "one child
    /// command per `(node, namespace)` pair" — see [`MultiOp::plan`]) and
    /// starts one child command per target, bounded by
    /// `op.policy().max_concurrent_threads` (`0` = all targets
    /// concurrently, `1` = sequential, `n>1` = bounded — spec §9).
    /// Returns a [`RecordSet`] the caller pulls from while children are
    /// still running; the set closes once every child has finished —
    /// tokio's mpsc channel closing when every `Sender` (including the
    /// one this function holds and drops immediately after spawning) has
    /// dropped is the exactly-once completion signal, with no manual
    /// remaining-count tracking needed (spec §9 "completion race").
    pub fn execute<O: MultiOp>(cluster: &Arc<StaticCluster>, op: O) -> RecordSet<O::Item> {
        let max_concurrent = op.policy().max_concurrent_threads;
        let permits = if max_concurrent == 0 { cluster.node_count().max(1) } else { max_concurrent };
        let semaphore = Arc::new(Semaphore::new(permits));
        let (tx, rx) = mpsc::channel(permits.saturating_mul(4).max(16));
        let cancelled = Arc::new(AtomicBool::new(false));

        let targets = match op.plan(cluster) {
            Ok(targets) => targets,
            Err(err) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(Err(err)).await;
                });
                drop(tx);
                return RecordSet::new(rx, cancelled);
            }
        };

        for (node, child_op) in targets {
            let child_tx = tx.clone();
            let semaphore = Arc::clone(&semaphore);
            let child_cancelled = Arc::clone(&cancelled);
            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let cmd = MultiCommand::new(node, child_op);
                if let Err(err) = cmd.run(child_tx.clone(), child_cancelled).await {
                    let _ = child_tx.send(Err(err)).await;
                }
            });
        }
        drop(tx);

        RecordSet::new(rx, cancelled)
    }
}
