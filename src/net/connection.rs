// SPDX-License-Identifier: Apache-2.0

//! A single server TCP connection (spec §4.2).
//!
//! `AsyncConnection` is unaware of commands: it only accepts pre-sized
//! byte ranges that the caller (the command's I/O steps, §4.5) has
//! already filled. It never buffers or interprets the contents.

use std::time::Duration;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::Mutex,
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{Error, Result};

/// Wraps a single non-blocking socket to a node's endpoint.
///
/// The stream is split into its read and write halves (the teacher's
/// `ClientConnection` shape in `client/client.rs`) so a send in progress
/// never blocks a concurrent close, and each half is held behind its own
/// `tokio::sync::Mutex` purely to make the type `Send + Sync` for storage
/// in a pool — spec §3's ownership invariant ("exclusively owned by the
/// in-flight command between acquire and return") means there is never
/// actual contention on either lock in practice. The real mechanism that
/// lets [`Self::close`] interrupt a read parked in [`Self::recv_async`]
/// is `cancel`, not the locks: both I/O loops race `cancel.cancelled()`
/// via `select!`, the teacher's `io_with_timeout` pattern in
/// `client/common.rs`.
#[derive(Debug)]
pub struct AsyncConnection {
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    cancel: CancellationToken,
    peer: String,
    last_used: Mutex<Instant>,
}

impl AsyncConnection {
    /// Establishes a new TCP connection to `addr`.
    ///
    /// Returns `true` in the completion flag position callers expect from
    /// `connect_async` in the source design (spec §4.2); atop tokio there
    /// is no true split between synchronous and asynchronous completion
    /// of `connect()`, so this always resolves once fully connected — the
    /// distinction collapses to "the future completed" (spec §9 open
    /// question, documented in DESIGN.md).
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::connection(format!("connect to {addr}: {e}")))?;
        stream.set_nodelay(true).map_err(Error::from)?;
        debug!(%addr, "connected");
        let (reader, writer) = stream.into_split();
        Ok(AsyncConnection {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            cancel: CancellationToken::new(),
            peer: addr.to_string(),
            last_used: Mutex::new(Instant::now()),
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Sends exactly `data.len()` bytes, advancing by `BytesTransferred`
    /// on every partial write (spec §4.5 step 7). Races `cancel` so a
    /// concurrent [`Self::close`] can interrupt a write stuck on a
    /// congested or unresponsive peer.
    pub async fn send_async(&self, data: &[u8]) -> Result<()> {
        let mut stream = self.writer.lock().await;
        let mut offset = 0;
        while offset < data.len() {
            let n = tokio::select! {
                res = stream.write(&data[offset..]) => res.map_err(|e| Error::connection(format!("send: {e}")))?,
                () = self.cancel.cancelled() => return Err(Error::connection("connection closed while sending")),
            };
            if n == 0 {
                return Err(Error::connection("peer closed during send"));
            }
            offset += n;
        }
        Ok(())
    }

    /// Receives exactly `buf.len()` bytes. `BytesTransferred == 0` means
    /// the peer closed the connection (spec §4.2 contract). Races
    /// `cancel` so the timeout supervisor's forced close (spec §4.4) can
    /// unblock a read parked on a peer that never replies, rather than
    /// the deadline being bounded by the peer's eventual latency.
    pub async fn recv_async(&self, buf: &mut [u8]) -> Result<()> {
        let mut stream = self.reader.lock().await;
        let mut offset = 0;
        while offset < buf.len() {
            let n = tokio::select! {
                res = stream.read(&mut buf[offset..]) => res.map_err(|e| Error::connection(format!("recv: {e}")))?,
                () = self.cancel.cancelled() => return Err(Error::connection("connection closed while receiving")),
            };
            if n == 0 {
                return Err(Error::connection("connection closed by peer"));
            }
            offset += n;
        }
        Ok(())
    }

    pub async fn update_last_used(&self) {
        *self.last_used.lock().await = Instant::now();
    }

    pub async fn idle_for(&self) -> Duration {
        self.last_used.lock().await.elapsed()
    }

    /// Forces any in-flight read or write on this connection to observe
    /// an error (used by the timeout supervisor, spec §4.4, and by the
    /// idle tender). Cancelling unblocks a parked `recv_async`/`send_async`
    /// immediately, without waiting on `reader`/`writer` — those locks may
    /// be held for the whole duration of a stuck I/O call, so `close`
    /// never attempts to acquire them and only opportunistically shuts
    /// down the write half when it can do so without blocking.
    pub async fn close(&self) {
        self.cancel.cancel();
        if let Ok(mut writer) = self.writer.try_lock() {
            let _ = writer.shutdown().await;
        }
    }
}
