// SPDX-License-Identifier: Apache-2.0

//! Pooled I/O scheduling handles and the admission queue in front of
//! them (spec §3, §4.5, §4.7).

mod context;
mod pool;
mod queue;

pub use context::EventContext;
pub use pool::EventPool;
pub use queue::{AdmissionMode, AsyncCommandQueue};
