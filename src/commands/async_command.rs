// SPDX-License-Identifier: Apache-2.0

//! Per-command state machine and retry-as-clone execution loop (spec §3,
//! §4.5).
//!
//! Modeled on the teacher's `StateMachine`/`Transition` family
//! (`state_machine/common.rs`), generalized from a fixed per-PDU enum to a
//! single command loop whose steps are `Connect -> Authenticate -> Write
//! -> RecvHeader -> RecvBody -> Parse -> Complete`, and on
//! windpike's `SingleCommand::execute` retry loop
//! (`other_examples/96b3cad3_...-single_command.rs.rs`), adapted to an
//! explicit clone on retry rather than a bare `continue` so every attempt
//! gets its own [`CommandState`] while inheriting the deadline and retry
//! counter from the attempt before it (spec §3 "clone on retry").

use std::sync::Arc;

use tokio::time::Instant;
use tracing::warn;

use super::state::{
    CommandState, STATE_AUTHENTICATING, STATE_CONNECTING, STATE_CREATED, STATE_FAILED, STATE_IN_FLIGHT, STATE_PARSING,
    STATE_RETRYING, STATE_SUCCEEDED,
};
use crate::{
    cluster::{Node, StaticCluster},
    errors::{Error, Result},
    events::EventContext,
    net::AsyncConnection,
    policy::Policy,
    value::Key,
    wire::{Header, ResultCode},
};

/// A single request/response operation against one key: encodes its own
/// wire request and parses its own response body. Implemented by the
/// concrete ops in [`crate::commands::single`] (spec §4.5 "Command op").
pub trait CommandOp: Clone + Send + 'static {
    type Output: Send;

    fn key(&self) -> &Key;
    fn policy(&self) -> &Policy;

    /// Encodes the full wire request (header, fields, ops).
    fn encode(&self) -> Result<Vec<u8>>;

    /// Parses the response body (the bytes following the 30-byte header)
    /// into this op's result type. `header.result_code` has already been
    /// checked against the benign set (`Ok`/`KeyNotFound`) by the engine.
    fn parse_response(&self, header: &Header, body: &[u8]) -> Result<Self::Output>;
}

/// Every non-terminal state an attempt can be CAS'd out of on its way to
/// `SUCCEEDED`/`FAILED`/`RETRYING` (spec §4.5's exactly-once terminal
/// transition, `CommandState::try_finish`).
const NON_TERMINAL_STATES: &[u8] = &[STATE_CREATED, STATE_CONNECTING, STATE_AUTHENTICATING, STATE_IN_FLIGHT, STATE_PARSING];

/// Drives a single [`CommandOp`] to completion against a [`StaticCluster`],
/// retrying per its [`Policy`] (spec §4.5).
pub struct AsyncCommand<C: CommandOp> {
    cluster: Arc<StaticCluster>,
    op: C,
    state: CommandState,
    iteration: u32,
    deadline: Option<Instant>,
    last_node: Option<String>,
}

impl<C: CommandOp> AsyncCommand<C> {
    pub fn new(cluster: Arc<StaticCluster>, op: C) -> Self {
        let timeout = op.policy().timeout;
        let deadline = if timeout.is_zero() { None } else { Some(Instant::now() + timeout) };
        AsyncCommand { cluster, op, state: CommandState::new(), iteration: 0, deadline, last_node: None }
    }

    /// Executes the command until it succeeds, exhausts its retry budget,
    /// or its deadline passes. Resolves exactly once, which is the
    /// `async`-native equivalent of the spec's single-fire listener
    /// contract (see [`super::listener`]).
    pub async fn run(mut self) -> Result<C::Output> {
        loop {
            if self.iteration > 0 {
                let sleep = self.op.policy().sleep_between_retries;
                if sleep.is_zero() {
                    // Yield so the runtime can make progress on other
                    // futures between immediate retries, instead of
                    // spinning the executor thread (windpike's
                    // `SingleCommand::execute`).
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(sleep).await;
                }
            }
            self.iteration += 1;

            if let Some(deadline) = self.deadline
                && Instant::now() > deadline
            {
                return Err(Error::Timeout {
                    node: self.last_node.clone().unwrap_or_else(|| "<unresolved>".to_string()),
                    timeout_ms: self.op.policy().timeout_ms(),
                    iterations: self.iteration,
                });
            }

            match self.attempt().await {
                Ok(output) => {
                    self.state.try_finish(NON_TERMINAL_STATES, STATE_SUCCEEDED);
                    return Ok(output);
                }
                Err(err) => {
                    let retryable = err.is_retry_class() || (err.is_timeout() && self.op.policy().retry_on_timeout);
                    if !retryable || self.iteration > self.op.policy().max_retries {
                        self.state.try_finish(NON_TERMINAL_STATES, STATE_FAILED);
                        return Err(err);
                    }
                    self.state.try_finish(NON_TERMINAL_STATES, STATE_RETRYING);
                    warn!(iteration = self.iteration, key = %self.op.key(), %err, "command attempt failed, retrying");
                    self = self.retry_clone();
                }
            }
        }
    }

    /// Clones the command for a fresh attempt, inheriting the deadline
    /// and retry counter but starting a brand-new [`CommandState`] (spec
    /// §3 "clone command inheriting the context, buffer, watch, and retry
    /// counter").
    fn retry_clone(&self) -> Self {
        AsyncCommand {
            cluster: Arc::clone(&self.cluster),
            op: self.op.clone(),
            state: CommandState::new(),
            iteration: self.iteration,
            deadline: self.deadline,
            last_node: self.last_node.clone(),
        }
    }

    async fn attempt(&mut self) -> Result<C::Output> {
        self.state.advance(STATE_CONNECTING);
        let node = self.cluster.node_for_key(self.op.key())?;
        self.last_node = Some(node.addr().to_string());
        let conn = node.get_connection().await?;

        self.state.advance(STATE_AUTHENTICATING);
        // No credential exchange happens over this connection: the demo
        // cluster requires none. The state transition stays in the loop
        // so a future that does (Opcode::Auth) has a concrete step to
        // hang off of instead of an imagined one.

        self.state.advance(STATE_IN_FLIGHT);
        let mut ctx = self.cluster.event_queue.acquire().await?;
        let result = self.run_io(&node, &conn, &mut ctx).await;
        ctx.restore_original_segment();
        self.cluster.event_queue.release(ctx).await;

        match &result {
            Ok(_) => node.put_connection(conn, true).await,
            Err(err) => node.put_connection(conn, err.keep_connection()).await,
        }
        result
    }

    async fn run_io(&mut self, node: &Arc<Node>, conn: &Arc<AsyncConnection>, ctx: &mut EventContext) -> Result<C::Output> {
        let request = self.op.encode()?;
        ctx.ensure_capacity(&self.cluster.buffer_pool, request.len());
        ctx.segment.as_mut_slice()[..request.len()].copy_from_slice(&request);

        let token = self
            .deadline
            .map(|_| self.cluster.timeout_supervisor.register(self.op.policy().timeout, Arc::clone(conn)));

        let io_result = self.send_and_receive(conn, ctx, request.len()).await;

        if let Some(token) = token {
            let cancelled_by_us = self.cluster.timeout_supervisor.cancel(token);
            if !cancelled_by_us && io_result.is_ok() {
                // The supervisor won the race and force-closed the
                // socket concurrently with (or just before) our own
                // completion; trust the supervisor's verdict over an
                // apparently-successful read (spec §9 "object disposed").
                return Err(Error::Timeout {
                    node: node.addr().to_string(),
                    timeout_ms: self.op.policy().timeout_ms(),
                    iterations: self.iteration,
                });
            }
        }

        io_result
    }

    async fn send_and_receive(&self, conn: &Arc<AsyncConnection>, ctx: &mut EventContext, request_len: usize) -> Result<C::Output> {
        conn.send_async(&ctx.segment.as_slice()[..request_len]).await?;

        let header = super::read_frame_header(conn).await?;

        let body_len = (header.body_length as usize).saturating_sub(22);
        ctx.ensure_capacity(&self.cluster.buffer_pool, body_len);
        if body_len > 0 {
            conn.recv_async(&mut ctx.segment.as_mut_slice()[..body_len]).await?;
        }

        let rc = ResultCode::from(header.result_code);
        if !matches!(rc, ResultCode::Ok | ResultCode::KeyNotFound) {
            return Err(Error::ServerError { code: rc, keep_connection: rc.keep_connection() });
        }

        self.op.parse_response(&header, &ctx.segment.as_slice()[..body_len])
    }
}
