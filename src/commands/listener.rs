// SPDX-License-Identifier: Apache-2.0

//! Result-callback surface (spec §3 "Listener").
//!
//! Per spec §9, implementers may replace the listener/callback surface
//! with a task-returning API as long as the internal state CAS and
//! resource-release invariants still hold across await points. This
//! crate takes that option: `AsyncCommand::run` resolves to a `Result<T>`
//! directly rather than invoking a boxed listener, so there is no
//! separate `Listener` trait object in the public API. The single-fire
//! contract spec §3 describes for a listener-based surface ("on_success
//! and on_failure are mutually exclusive and each fires at most once")
//! is instead enforced by `CommandState::try_finish`'s CAS and by
//! `AsyncCommand::run` being a single `Future` that can only resolve
//! once, which is the `async`-native equivalent of the same guarantee.
