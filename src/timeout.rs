// SPDX-License-Identifier: Apache-2.0

//! Single dedicated deadline-enforcement task (spec §4.4).
//!
//! The supervisor never invokes a command's listener directly — it only
//! forces the owning socket closed, which unblocks whatever `recv_async`
//! the command is parked in and lets the command's own error path drive
//! the terminal state transition (spec §4.5's CAS exactly-once contract
//! still applies: the supervisor races the command's normal completion,
//! and only one of them wins the CAS to a terminal state).

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tokio::{task::JoinHandle, time::interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::net::AsyncConnection;

/// A single in-flight deadline tracked by the supervisor.
struct Deadline {
    deadline: Instant,
    conn: Arc<AsyncConnection>,
}

/// Periodically sweeps registered deadlines and force-closes any
/// connection whose command has overrun its timeout.
pub struct TimeoutSupervisor {
    deadlines: Arc<DashMap<u64, Deadline>>,
    next_id: AtomicU64,
}

impl TimeoutSupervisor {
    pub fn new() -> Arc<Self> {
        Arc::new(TimeoutSupervisor { deadlines: Arc::new(DashMap::new()), next_id: AtomicU64::new(0) })
    }

    /// Registers a deadline for an in-flight command. Returns a token the
    /// command must pass to [`Self::cancel`] on its own completion path,
    /// win or lose the race against the sweep.
    pub fn register(&self, timeout: Duration, conn: Arc<AsyncConnection>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.deadlines.insert(id, Deadline { deadline: Instant::now() + timeout, conn });
        id
    }

    /// Cancels a registered deadline. Returns `true` if this call removed
    /// the entry, `false` if the supervisor already swept and removed it
    /// first — the exactly-once race-winner signal a command's own
    /// completion path checks before trusting its own apparently
    /// successful I/O result (spec §4.5/§9: the supervisor may have
    /// force-closed the socket concurrently with the command reading its
    /// last byte).
    pub fn cancel(&self, token: u64) -> bool {
        self.deadlines.remove(&token).is_some()
    }

    /// Spawns the sweep loop, stopping it once `shutdown` is cancelled
    /// rather than leaving it detached for the process lifetime. `tick`
    /// should be small relative to the shortest policy timeout in use —
    /// the source design ties it to the smallest configured command
    /// timeout.
    pub fn spawn(self: &Arc<Self>, tick: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(tick);
            loop {
                tokio::select! {
                    _ = ticker.tick() => this.sweep().await,
                    _ = shutdown.cancelled() => return,
                }
            }
        })
    }

    async fn sweep(&self) {
        let now = Instant::now();
        let mut expired = Vec::new();
        for entry in self.deadlines.iter() {
            if entry.value().deadline <= now {
                expired.push(*entry.key());
            }
        }
        for id in expired {
            if let Some((_, deadline)) = self.deadlines.remove(&id) {
                debug!(conn = %deadline.conn.peer(), "timeout supervisor forcing connection close");
                deadline.conn.close().await;
            }
        }
    }
}
