//! Kiosk window reconciliation.
//!
//! The enforcer keeps three invariants on the host window — full-screen,
//! focused, always-on-top — by correcting drift rather than re-asserting
//! continuously:
//!
//! ```text
//!            tick / focus lost
//!   ┌──────────┐  drift found   ┌────────────┐
//!   │Compliant │ ─────────────▶ │ Correcting │
//!   └──────────┘ ◀───────────── └────────────┘
//!                nothing to fix
//! ```
//!
//! All platform access goes through the [`WindowControl`] capability so the
//! state machine can run against a fake window in tests. Platform failures
//! are transient: they are logged and retried on the next tick.

use std::time::{Duration, Instant};

use euclid::default::Rect;
use tracing::{debug, info, warn};

use crate::error::WindowError;

/// Default reconciliation period.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_millis(1500);

/// Observed state of the host window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub is_fullscreen: bool,
    pub is_focused: bool,
    pub is_always_on_top: bool,
    pub geometry: Rect<i32>,
}

impl WindowState {
    pub fn is_locked(&self) -> bool {
        self.is_fullscreen && self.is_focused && self.is_always_on_top
    }
}

/// One invariant the enforcer can restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowAspect {
    Fullscreen,
    Focus,
    AlwaysOnTop,
    Geometry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcerPhase {
    Compliant,
    Correcting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    Veto,
    Allow,
}

/// Platform operations the enforcer needs from the host window.
///
/// Every corrective call must be idempotent: asserting full-screen on a
/// window that already is full-screen is harmless.
pub trait WindowControl {
    fn current_state(&self) -> Result<WindowState, WindowError>;

    /// Bounds of the primary display, in physical pixels.
    fn primary_display(&self) -> Result<Rect<i32>, WindowError>;

    fn assert_fullscreen(&self, target: Option<Rect<i32>>) -> Result<(), WindowError>;

    fn request_focus(&self) -> Result<(), WindowError>;

    fn assert_always_on_top(&self) -> Result<(), WindowError>;

    fn apply_geometry(&self, geometry: Rect<i32>) -> Result<(), WindowError>;
}

/// Drift-correcting state machine over a [`WindowControl`].
#[derive(Debug)]
pub struct WindowStateEnforcer {
    interval: Duration,
    next_due: Option<Instant>,
    phase: EnforcerPhase,
    last_state: Option<WindowState>,
    target_geometry: Option<Rect<i32>>,
    prompt_open: bool,
    exit_authorized: bool,
}

impl Default for WindowStateEnforcer {
    fn default() -> Self {
        Self::new(DEFAULT_RECONCILE_INTERVAL)
    }
}

impl WindowStateEnforcer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
            phase: EnforcerPhase::Compliant,
            last_state: None,
            target_geometry: None,
            prompt_open: false,
            exit_authorized: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn phase(&self) -> EnforcerPhase {
        self.phase
    }

    /// State recorded by the last reconciliation pass, with corrections applied.
    pub fn last_state(&self) -> Option<WindowState> {
        self.last_state
    }

    pub fn target_geometry(&self) -> Option<Rect<i32>> {
        self.target_geometry
    }

    /// When the next scheduled tick is due. `None` until the first poll.
    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Runs the scheduled tick if it is due at `now`.
    pub fn poll(&mut self, now: Instant, window: &dyn WindowControl) -> Vec<WindowAspect> {
        if self.next_due.is_some_and(|due| now < due) {
            return Vec::new();
        }
        self.next_due = Some(now + self.interval);
        self.tick(window)
    }

    /// One reconciliation pass.
    pub fn tick(&mut self, window: &dyn WindowControl) -> Vec<WindowAspect> {
        self.reconcile(window)
    }

    /// Out-of-band pass after the host reports focus loss. Same idempotence
    /// as a tick: if focus is already back, nothing is done or reported.
    pub fn on_focus_lost(&mut self, window: &dyn WindowControl) -> Vec<WindowAspect> {
        self.reconcile(window)
    }

    /// Recomputes the target geometry from the primary display and applies it.
    ///
    /// A window that also left full-screen is reported as a `Fullscreen`
    /// correction, on top of `Geometry`.
    pub fn on_display_changed(&mut self, window: &dyn WindowControl) -> Vec<WindowAspect> {
        let target = match window.primary_display() {
            Ok(target) => target,
            Err(e) => {
                warn!(error = %e, "Primary display unavailable, retrying on next tick");
                return Vec::new();
            }
        };
        self.target_geometry = Some(target);

        if let Err(e) = window.apply_geometry(target) {
            warn!(error = %e, "Cannot apply display geometry, retrying on next tick");
            return Vec::new();
        }

        let drifted = self.reconcile(window);
        if !drifted.contains(&WindowAspect::Fullscreen)
            && let Err(e) = window.assert_fullscreen(Some(target))
        {
            warn!(error = %e, "Cannot re-assert fullscreen after display change");
        }
        if let Some(state) = &mut self.last_state {
            state.geometry = target;
        }
        info!(
            x = target.origin.x,
            y = target.origin.y,
            width = target.size.width,
            height = target.size.height,
            "Display changed, geometry re-applied"
        );
        let mut corrected = vec![WindowAspect::Geometry];
        corrected.extend(drifted);
        corrected
    }

    /// Close requests are vetoed until the controlled exit path authorizes one.
    pub fn on_close_requested(&self) -> CloseDecision {
        if self.exit_authorized {
            CloseDecision::Allow
        } else {
            debug!("Close request vetoed");
            CloseDecision::Veto
        }
    }

    /// While the exit prompt is open, focus restoration is suspended so the
    /// prompt is not fought for focus. Full-screen and topmost still apply.
    pub fn set_prompt_open(&mut self, open: bool) {
        self.prompt_open = open;
    }

    pub fn is_prompt_open(&self) -> bool {
        self.prompt_open
    }

    pub fn authorize_exit(&mut self) {
        self.exit_authorized = true;
    }

    fn reconcile(&mut self, window: &dyn WindowControl) -> Vec<WindowAspect> {
        let mut state = match window.current_state() {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Window not readable, retrying on next tick");
                return Vec::new();
            }
        };

        let mut corrected = Vec::new();

        if !state.is_fullscreen {
            match window.assert_fullscreen(self.target_geometry) {
                Ok(()) => {
                    state.is_fullscreen = true;
                    corrected.push(WindowAspect::Fullscreen);
                }
                Err(e) => warn!(error = %e, "Fullscreen correction failed"),
            }
        }

        if !state.is_always_on_top {
            match window.assert_always_on_top() {
                Ok(()) => {
                    state.is_always_on_top = true;
                    corrected.push(WindowAspect::AlwaysOnTop);
                }
                Err(e) => warn!(error = %e, "Always-on-top correction failed"),
            }
        }

        if !state.is_focused && !self.prompt_open {
            match window.request_focus() {
                Ok(()) => {
                    state.is_focused = true;
                    corrected.push(WindowAspect::Focus);
                }
                Err(e) => warn!(error = %e, "Focus correction failed"),
            }
        }

        self.phase = if corrected.is_empty() {
            EnforcerPhase::Compliant
        } else {
            EnforcerPhase::Correcting
        };
        self.last_state = Some(state);
        corrected
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FakeWindow : double de test pour WindowControl
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::{Cell, RefCell};

    use euclid::default::{Point2D, Size2D};

    use super::*;

    /// In-memory window. Corrective calls update the state immediately and
    /// are recorded in `calls`.
    #[derive(Debug)]
    pub struct FakeWindow {
        pub state: Cell<WindowState>,
        pub display: Cell<Rect<i32>>,
        pub calls: RefCell<Vec<WindowAspect>>,
        pub unavailable: Cell<bool>,
        pub focus_fails: Cell<bool>,
    }

    pub fn rect(x: i32, y: i32, w: i32, h: i32) -> Rect<i32> {
        Rect::new(Point2D::new(x, y), Size2D::new(w, h))
    }

    impl FakeWindow {
        pub fn locked() -> Self {
            let display = rect(0, 0, 1920, 1080);
            Self {
                state: Cell::new(WindowState {
                    is_fullscreen: true,
                    is_focused: true,
                    is_always_on_top: true,
                    geometry: display,
                }),
                display: Cell::new(display),
                calls: RefCell::new(Vec::new()),
                unavailable: Cell::new(false),
                focus_fails: Cell::new(false),
            }
        }

        pub fn drift(&self, change: impl FnOnce(&mut WindowState)) {
            let mut state = self.state.get();
            change(&mut state);
            self.state.set(state);
        }

        pub fn calls(&self) -> Vec<WindowAspect> {
            self.calls.borrow().clone()
        }

        fn check(&self) -> Result<(), WindowError> {
            if self.unavailable.get() {
                Err(WindowError::HandleUnavailable)
            } else {
                Ok(())
            }
        }
    }

    impl WindowControl for FakeWindow {
        fn current_state(&self) -> Result<WindowState, WindowError> {
            self.check()?;
            Ok(self.state.get())
        }

        fn primary_display(&self) -> Result<Rect<i32>, WindowError> {
            self.check()?;
            Ok(self.display.get())
        }

        fn assert_fullscreen(&self, target: Option<Rect<i32>>) -> Result<(), WindowError> {
            self.check()?;
            self.calls.borrow_mut().push(WindowAspect::Fullscreen);
            self.drift(|s| {
                s.is_fullscreen = true;
                if let Some(target) = target {
                    s.geometry = target;
                }
            });
            Ok(())
        }

        fn request_focus(&self) -> Result<(), WindowError> {
            self.check()?;
            if self.focus_fails.get() {
                return Err(WindowError::Platform {
                    call: "focus_window",
                    reason: "denied".to_string(),
                });
            }
            self.calls.borrow_mut().push(WindowAspect::Focus);
            self.drift(|s| s.is_focused = true);
            Ok(())
        }

        fn assert_always_on_top(&self) -> Result<(), WindowError> {
            self.check()?;
            self.calls.borrow_mut().push(WindowAspect::AlwaysOnTop);
            self.drift(|s| s.is_always_on_top = true);
            Ok(())
        }

        fn apply_geometry(&self, geometry: Rect<i32>) -> Result<(), WindowError> {
            self.check()?;
            self.calls.borrow_mut().push(WindowAspect::Geometry);
            self.drift(|s| s.geometry = geometry);
            Ok(())
        }
    }
}
