// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection lifecycle as an explicit state machine.
//!
//! `Disconnected -> Connecting -> Connected`, with a counter of consecutive
//! failed attempts. The machine decides whether and when to retry; the
//! client loop only performs I/O and sleeps.

use std::time::Duration;

use palace_core::protocol::{
    CLOSE_AUTH_FAILED, CLOSE_NORMAL, CLOSE_SHUTDOWN, CLOSE_SUPERSEDED,
};

use crate::backoff::ReconnectPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// `attempt` is 1 for the first connection after a success or start.
    Connecting { attempt: u32 },
    Connected,
}

/// Why a session ended, or never started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The server closed on purpose: normal closure, shutdown, or a newer
    /// connection of the same client took over.
    ClosedByServer { code: u16 },
    ClosedByClient,
    /// The token was refused. Retrying cannot help.
    AuthRejected,
    /// Refused connection, dropped socket, idle reap, missing handshake reply.
    Lost(String),
}

impl DisconnectReason {
    /// Classify a close frame's code.
    pub fn from_close_code(code: Option<u16>) -> Self {
        match code {
            Some(CLOSE_AUTH_FAILED) => DisconnectReason::AuthRejected,
            Some(code @ (CLOSE_NORMAL | CLOSE_SHUTDOWN | CLOSE_SUPERSEDED)) => {
                DisconnectReason::ClosedByServer { code }
            }
            Some(code) => DisconnectReason::Lost(format!("closed with code {code}")),
            None => DisconnectReason::Lost("closed without a status code".into()),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, DisconnectReason::Lost(_))
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::ClosedByServer { code } => write!(f, "closed by server ({code})"),
            DisconnectReason::ClosedByClient => write!(f, "closed by client"),
            DisconnectReason::AuthRejected => write!(f, "authentication rejected"),
            DisconnectReason::Lost(detail) => write!(f, "connection lost: {detail}"),
        }
    }
}

/// What the client loop does after a disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Retry { attempt: u32, delay: Duration },
    /// Stop for good. `exhausted` is set when the attempt budget ran out.
    Stop { exhausted: bool },
}

#[derive(Debug)]
pub struct ConnectionMachine {
    policy: ReconnectPolicy,
    state: ConnectionState,
    failures: u32,
}

impl ConnectionMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            failures: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failed attempts since the last successful session.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Begin a connection attempt.
    pub fn connecting(&mut self) -> ConnectionState {
        self.state = ConnectionState::Connecting {
            attempt: self.failures + 1,
        };
        self.state
    }

    /// The handshake was acknowledged. Resets the attempt counter.
    pub fn connected(&mut self) -> ConnectionState {
        self.state = ConnectionState::Connected;
        self.failures = 0;
        self.state
    }

    /// A session ended or an attempt failed.
    pub fn disconnected(&mut self, reason: &DisconnectReason) -> Next {
        self.state = ConnectionState::Disconnected;
        if !reason.is_recoverable() {
            return Next::Stop { exhausted: false };
        }
        self.failures += 1;
        if self.failures > self.policy.max_attempts {
            return Next::Stop { exhausted: true };
        }
        Next::Retry {
            attempt: self.failures,
            delay: self.policy.delay(self.failures),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            max_attempts,
        }
    }

    fn lost() -> DisconnectReason {
        DisconnectReason::Lost("reset".into())
    }

    #[test]
    fn starts_disconnected() {
        let machine = ConnectionMachine::new(policy(3));
        assert_eq!(machine.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn unexpected_disconnects_back_off_then_give_up() {
        let mut machine = ConnectionMachine::new(policy(3));
        machine.connecting();
        machine.connected();

        let mut delays = Vec::new();
        loop {
            match machine.disconnected(&lost()) {
                Next::Retry { attempt, delay } => {
                    delays.push(delay.as_millis());
                    assert_eq!(machine.connecting(), ConnectionState::Connecting { attempt: attempt + 1 });
                }
                Next::Stop { exhausted } => {
                    assert!(exhausted);
                    break;
                }
            }
        }
        assert_eq!(delays, vec![100, 200, 400]);
        assert_eq!(machine.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn success_resets_the_counter() {
        let mut machine = ConnectionMachine::new(policy(2));
        machine.connecting();
        machine.disconnected(&lost());
        machine.connecting();
        machine.disconnected(&lost());
        assert_eq!(machine.failures(), 2);

        machine.connecting();
        machine.connected();
        assert_eq!(machine.failures(), 0);
        assert_eq!(
            machine.disconnected(&lost()),
            Next::Retry {
                attempt: 1,
                delay: Duration::from_millis(100)
            }
        );
    }

    #[test]
    fn clean_close_does_not_reconnect() {
        let mut machine = ConnectionMachine::new(policy(5));
        machine.connecting();
        machine.connected();
        let reason = DisconnectReason::from_close_code(Some(CLOSE_SHUTDOWN));
        assert_eq!(reason, DisconnectReason::ClosedByServer { code: 1001 });
        assert_eq!(machine.disconnected(&reason), Next::Stop { exhausted: false });
    }

    #[test]
    fn auth_rejection_is_final() {
        let mut machine = ConnectionMachine::new(policy(5));
        machine.connecting();
        let reason = DisconnectReason::from_close_code(Some(CLOSE_AUTH_FAILED));
        assert_eq!(reason, DisconnectReason::AuthRejected);
        assert_eq!(machine.disconnected(&reason), Next::Stop { exhausted: false });
        assert_eq!(machine.failures(), 0);
    }

    #[test]
    fn close_code_classification() {
        assert_eq!(
            DisconnectReason::from_close_code(Some(CLOSE_SUPERSEDED)),
            DisconnectReason::ClosedByServer { code: 4409 }
        );
        assert!(DisconnectReason::from_close_code(Some(4408)).is_recoverable());
        assert!(
            DisconnectReason::from_close_code(Some(palace_core::protocol::CLOSE_STALLED))
                .is_recoverable(),
            "a stalled session reconnects to collect its queue"
        );
        assert!(DisconnectReason::from_close_code(None).is_recoverable());
        assert!(!DisconnectReason::ClosedByClient.is_recoverable());
    }
}
