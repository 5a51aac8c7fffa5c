// SPDX-License-Identifier: Apache-2.0

//! Exactly-once terminal state tracking for an in-flight command (spec
//! §3, §4.5).
//!
//! A command can be driven to completion by at most one of several
//! racing paths: the normal parse-and-complete path, a retry decision,
//! an explicit cancellation, or the [`crate::timeout::TimeoutSupervisor`]
//! forcing the socket closed. All of them attempt the same
//! compare-and-swap out of `IN_FLIGHT`; exactly one succeeds, and that
//! winner is the only one allowed to invoke the command's listener.

use std::sync::atomic::{AtomicU8, Ordering};

pub const STATE_CREATED: u8 = 0;
pub const STATE_CONNECTING: u8 = 1;
pub const STATE_AUTHENTICATING: u8 = 2;
pub const STATE_IN_FLIGHT: u8 = 3;
pub const STATE_PARSING: u8 = 4;
pub const STATE_SUCCEEDED: u8 = 5;
pub const STATE_FAILED: u8 = 6;
pub const STATE_RETRYING: u8 = 7;

/// An `AtomicU8` wrapper exposing only the transitions spec §4.5 allows.
#[derive(Debug)]
pub struct CommandState(AtomicU8);

impl CommandState {
    pub fn new() -> Self {
        CommandState(AtomicU8::new(STATE_CREATED))
    }

    pub fn load(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }

    /// Unconditionally advances to a non-terminal state (`CREATED`
    /// through `PARSING`). Only one task ever drives a command's
    /// non-terminal progression, so no CAS is needed here.
    pub fn advance(&self, to: u8) {
        debug_assert!(matches!(
            to,
            STATE_CREATED | STATE_CONNECTING | STATE_AUTHENTICATING | STATE_IN_FLIGHT | STATE_PARSING
        ));
        self.0.store(to, Ordering::Release);
    }

    /// Attempts the exactly-once transition into a terminal state
    /// (`SUCCEEDED`, `FAILED`, or `RETRYING`). Returns `true` if this
    /// caller won the race and must now invoke the listener; `false`
    /// means another path already completed the command first.
    pub fn try_finish(&self, from_any_non_terminal: &[u8], to_terminal: u8) -> bool {
        debug_assert!(matches!(to_terminal, STATE_SUCCEEDED | STATE_FAILED | STATE_RETRYING));
        for &from in from_any_non_terminal {
            if self.0.compare_exchange(from, to_terminal, Ordering::AcqRel, Ordering::Acquire).is_ok() {
                return true;
            }
        }
        false
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.load(), STATE_SUCCEEDED | STATE_FAILED | STATE_RETRYING)
    }
}

impl Default for CommandState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_racer_wins_try_finish() {
        let state = CommandState::new();
        state.advance(STATE_IN_FLIGHT);
        let all_states = [
            STATE_CREATED,
            STATE_CONNECTING,
            STATE_AUTHENTICATING,
            STATE_IN_FLIGHT,
            STATE_PARSING,
        ];
        assert!(state.try_finish(&all_states, STATE_SUCCEEDED));
        assert!(!state.try_finish(&all_states, STATE_FAILED));
        assert_eq!(state.load(), STATE_SUCCEEDED);
    }
}
