// SPDX-License-Identifier: Apache-2.0

//! Per-node multi-record command engine (spec §4.6).
//!
//! Two wire shapes, grounded on two different reference parsers:
//! - `Framing::Streamed`: one discrete wire message per record, the
//!   server marking the final one with `INFO3_LAST` — grounded on
//!   windpike's `StreamCommand::parse_record`/`parse_stream`
//!   (`other_examples/83f7b9a5_...-stream_command.rs.rs`), used by scan
//!   and query.
//! - `Framing::SingleEnvelope`: one request/response exchange whose body
//!   packs a fixed number of per-key sub-records back to back, each with
//!   its own 22-byte record header — grounded on windpike's
//!   `BatchReadCommand::parse_record`/`parse_group`
//!   (`other_examples/4a453e56_...-batch_read_command.rs.rs`), used by
//!   batch-get.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::mpsc;

use crate::{
    cluster::{Node, StaticCluster},
    errors::{Error, Result},
    policy::MultiPolicy,
    wire::{Header, ResultCode},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Streamed,
    SingleEnvelope,
}

/// A multi-record operation executed against one node's connection,
/// producing a stream of `Item`s rather than a single value.
pub trait MultiOp: Clone + Send + 'static {
    type Item: Send;

    fn policy(&self) -> &MultiPolicy;
    fn framing(&self) -> Framing;
    fn encode(&self) -> Result<Vec<u8>>;

    /// Only consulted for [`Framing::SingleEnvelope`]: how many per-key
    /// sub-records the one response body packs.
    fn expected_records(&self) -> usize {
        0
    }

    /// Resolves the `(node, child-op)` pairs this op fans out to (spec
    /// §4.6 "one child command per `(node, namespace)` pair").
    ///
    /// The default targets every node in `cluster` with an identical
    /// clone of `self` — correct for whole-cluster operations with no
    /// per-key routing (scan, query). Key-addressed ops such as batch-get
    /// override this to partition their key set by
    /// [`StaticCluster::node_for_key`] first, so each node only receives
    /// the keys it actually serves.
    fn plan(&self, cluster: &Arc<StaticCluster>) -> Result<Vec<(Arc<Node>, Self)>>
    where
        Self: Sized,
    {
        Ok(cluster.nodes().iter().map(|node| (Arc::clone(node), self.clone())).collect())
    }

    /// Consumes exactly as many bytes from `cursor` as `header`'s
    /// `field_count`/`op_count` describe (fields and ops are
    /// self-length-prefixed, so no separate body length is needed per
    /// record) and returns the parsed item, or `None` to skip this record
    /// entirely (used by scans tolerating a benign non-data marker
    /// record).
    fn parse_record(&self, index: usize, header: &Header, cursor: &mut &[u8]) -> Result<Option<Self::Item>>;
}

/// Drives one [`MultiOp`] against a single node's connection, pushing
/// parsed items into `tx` as they arrive.
pub struct MultiCommand<O: MultiOp> {
    node: Arc<Node>,
    op: O,
}

impl<O: MultiOp> MultiCommand<O> {
    pub fn new(node: Arc<Node>, op: O) -> Self {
        MultiCommand { node, op }
    }

    /// Runs the command to completion, forwarding every parsed item to
    /// `tx`. Returns the terminal `Result<()>` for this node's share of
    /// the fan-out; individual items already went to `tx` regardless of
    /// how the command as a whole ends. `cancelled` is checked at every
    /// record boundary so a [`super::RecordSet`] consumer that stops
    /// reading can unwind every child command promptly (spec §4.6
    /// "cancellation").
    pub async fn run(self, tx: mpsc::Sender<Result<O::Item>>, cancelled: Arc<AtomicBool>) -> Result<()> {
        let conn = self.node.get_connection().await?;
        let result = self.run_io(&conn, &tx, &cancelled).await;
        let keep = match &result {
            Ok(()) => true,
            Err(err) => err.keep_connection(),
        };
        self.node.put_connection(conn, keep).await;
        result
    }

    async fn run_io(
        &self,
        conn: &Arc<crate::net::AsyncConnection>,
        tx: &mpsc::Sender<Result<O::Item>>,
        cancelled: &Arc<AtomicBool>,
    ) -> Result<()> {
        let request = self.op.encode()?;
        conn.send_async(&request).await?;

        match self.op.framing() {
            Framing::Streamed => self.run_streamed(conn, tx, cancelled).await,
            Framing::SingleEnvelope => self.run_single_envelope(conn, tx, cancelled).await,
        }
    }

    async fn run_streamed(
        &self,
        conn: &Arc<crate::net::AsyncConnection>,
        tx: &mpsc::Sender<Result<O::Item>>,
        cancelled: &Arc<AtomicBool>,
    ) -> Result<()> {
        let mut index = 0usize;
        loop {
            if cancelled.load(Ordering::Acquire) {
                return Err(Error::ScanTerminated("cancelled by caller".to_string()));
            }

            let header = super::read_frame_header(conn).await?;

            let body_len = (header.body_length as usize).saturating_sub(22);
            let mut body = vec![0u8; body_len];
            if body_len > 0 {
                conn.recv_async(&mut body).await?;
            }

            if header.is_last() {
                return Ok(());
            }

            let rc = ResultCode::from(header.result_code);
            if !matches!(rc, ResultCode::Ok | ResultCode::KeyNotFound) {
                return Err(Error::ScanTerminated(format!("node {} returned {rc:?}", self.node.addr())));
            }

            let mut cursor = &body[..];
            if let Some(item) = self.op.parse_record(index, &header, &mut cursor)?
                && tx.send(Ok(item)).await.is_err()
            {
                return Err(Error::ScanTerminated("consumer dropped the record set".to_string()));
            }
            index += 1;
        }
    }

    async fn run_single_envelope(
        &self,
        conn: &Arc<crate::net::AsyncConnection>,
        tx: &mpsc::Sender<Result<O::Item>>,
        cancelled: &Arc<AtomicBool>,
    ) -> Result<()> {
        let header = super::read_frame_header(conn).await?;

        let body_len = (header.body_length as usize).saturating_sub(22);
        let mut body = vec![0u8; body_len];
        if body_len > 0 {
            conn.recv_async(&mut body).await?;
        }

        let rc = ResultCode::from(header.result_code);
        if !matches!(rc, ResultCode::Ok) {
            return Err(Error::ServerError { code: rc, keep_connection: rc.keep_connection() });
        }

        let mut cursor = &body[..];
        for index in 0..self.op.expected_records() {
            if cancelled.load(Ordering::Acquire) {
                return Err(Error::ScanTerminated("cancelled by caller".to_string()));
            }
            let rec_header = Header::decode_record(cursor)?;
            cursor = &cursor[crate::wire::RECORD_HEADER_LEN..];
            if let Some(item) = self.op.parse_record(index, &rec_header, &mut cursor)?
                && tx.send(Ok(item)).await.is_err()
            {
                return Err(Error::ScanTerminated("consumer dropped the record set".to_string()));
            }
        }
        Ok(())
    }
}
