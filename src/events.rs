//! Outbound events and violation counters.
//!
//! The coordinator never reaches for a global logger: it is handed an
//! [`EventSink`] at construction and pushes [`SecurityEvent`]s into it.
//! Sinks must not block — `emit` is an enqueue, not a write.

use std::cell::Cell;
use std::fmt;
use std::sync::mpsc::Sender;

use tracing::{debug, info, warn};

use crate::window::WindowAspect;

/// Violation categories tracked by [`ViolationCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    UnauthorizedUrl,
    DangerousKey,
    WindowDrift,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::UnauthorizedUrl => write!(f, "unauthorized-url"),
            ViolationKind::DangerousKey => write!(f, "dangerous-key"),
            ViolationKind::WindowDrift => write!(f, "window-drift"),
        }
    }
}

/// Events emitted towards the host shell and the log collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityEvent {
    /// A counted policy violation (blocked URL, blocked dangerous chord).
    ViolationLogged { kind: ViolationKind, details: String },
    /// A user navigation matched an exit pattern.
    ExitRequested { url: String, pattern: String },
    /// The exit hotkey was pressed; the host should open the password prompt.
    ExitHotkeyPressed,
    /// The enforcer restored one window invariant.
    WindowCorrected { aspect: WindowAspect },
}

/// Fire-and-forget destination for [`SecurityEvent`]s.
pub trait EventSink {
    fn emit(&self, event: SecurityEvent);
}

/// Writes every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SecurityEvent) {
        match event {
            SecurityEvent::ViolationLogged { kind, details } => {
                warn!(%kind, %details, "Violation");
            }
            SecurityEvent::ExitRequested { url, pattern } => {
                info!(%url, %pattern, "Exit requested");
            }
            SecurityEvent::ExitHotkeyPressed => info!("Exit hotkey pressed"),
            SecurityEvent::WindowCorrected { aspect } => {
                info!(?aspect, "Window corrected");
            }
        }
    }
}

/// Forwards events over an mpsc channel.
///
/// A disconnected receiver is not an error for the sender: the event is
/// dropped and the decision path carries on.
#[derive(Debug, Clone)]
pub struct ChannelSink(Sender<SecurityEvent>);

impl ChannelSink {
    pub fn new(sender: Sender<SecurityEvent>) -> Self {
        Self(sender)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: SecurityEvent) {
        if let Err(e) = self.0.send(event) {
            debug!(event = ?e.0, "Event receiver gone, event dropped");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ViolationCounters
// ─────────────────────────────────────────────────────────────────────────────

/// Monotonic per-category counters. Statistics only: no decision reads them.
#[derive(Debug, Default)]
pub struct ViolationCounters {
    unauthorized_url: Cell<u64>,
    dangerous_key: Cell<u64>,
    window_drift: Cell<u64>,
}

/// Point-in-time copy of [`ViolationCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViolationSnapshot {
    pub unauthorized_url: u64,
    pub dangerous_key: u64,
    pub window_drift: u64,
}

impl ViolationCounters {
    fn cell(&self, kind: ViolationKind) -> &Cell<u64> {
        match kind {
            ViolationKind::UnauthorizedUrl => &self.unauthorized_url,
            ViolationKind::DangerousKey => &self.dangerous_key,
            ViolationKind::WindowDrift => &self.window_drift,
        }
    }

    /// Increments `kind` and returns the new value.
    pub fn record(&self, kind: ViolationKind) -> u64 {
        let cell = self.cell(kind);
        let next = cell.get().saturating_add(1);
        cell.set(next);
        next
    }

    pub fn get(&self, kind: ViolationKind) -> u64 {
        self.cell(kind).get()
    }

    pub fn snapshot(&self) -> ViolationSnapshot {
        ViolationSnapshot {
            unauthorized_url: self.unauthorized_url.get(),
            dangerous_key: self.dangerous_key.get(),
            window_drift: self.window_drift.get(),
        }
    }

    /// Operator reset.
    pub fn reset(&self) {
        self.unauthorized_url.set(0);
        self.dangerous_key.set(0);
        self.window_drift.set(0);
    }
}
