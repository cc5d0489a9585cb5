//! Composition root of the enforcement core.
//!
//! [`SecurityCoordinator`] owns the three deciders, reads the rule set from
//! an injected [`RuleStore`], counts violations and pushes events into an
//! injected [`EventSink`]. The host shell talks to it only through the
//! [`HostHooks`] contract, from the UI thread, one call at a time.
//!
//! ```text
//! host shell / browser delegates
//!         │  HostHooks
//!         ▼
//!  SecurityCoordinator ── snapshot ──▶ RuleStore
//!    ├─ UrlAccessController
//!    ├─ KeyboardEventClassifier
//!    ├─ WindowStateEnforcer ──▶ WindowControl
//!    └─ EventSink (fire-and-forget)
//! ```

use std::cell::RefCell;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use winit::keyboard::KeyCode;

use crate::events::{EventSink, SecurityEvent, ViolationCounters, ViolationKind};
use crate::keyboard::{
    DEFAULT_EXIT_HOTKEY, KeyCategory, KeyChord, KeyDecision, KeyVerdict, KeyboardEventClassifier,
};
use crate::rules::{RuleSet, RuleStore};
use crate::url_access::{BlockReason, NavigationRequest, UrlAccessController, UrlDecision};
use crate::window::{
    CloseDecision, DEFAULT_RECONCILE_INTERVAL, WindowAspect, WindowControl, WindowStateEnforcer,
};

/// Hook contract consumed by the host shell and the browser collaborator.
///
/// Every method runs synchronously on the UI thread and returns promptly.
pub trait HostHooks {
    fn on_before_navigate(&self, request: &NavigationRequest) -> UrlDecision;

    fn on_before_resource_load(&self, url: &str, is_main_resource: bool) -> UrlDecision;

    fn on_key_event(&self, chord: &KeyChord) -> KeyDecision;

    fn on_focus_lost(&self, window: &dyn WindowControl);

    fn on_display_changed(&self, window: &dyn WindowControl);

    fn on_close_requested(&self) -> CloseDecision;
}

/// Settings that come from configuration but live outside the rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorOptions {
    pub base_domain: Option<String>,
    pub exit_hotkey: KeyCode,
    pub reconcile_interval: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            base_domain: None,
            exit_hotkey: DEFAULT_EXIT_HOTKEY,
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
        }
    }
}

pub struct SecurityCoordinator {
    rules: RuleStore,
    url_access: UrlAccessController,
    keyboard: KeyboardEventClassifier,
    window: RefCell<WindowStateEnforcer>,
    counters: ViolationCounters,
    sink: Box<dyn EventSink>,
}

impl SecurityCoordinator {
    pub fn new(rules: RuleStore, sink: Box<dyn EventSink>, options: CoordinatorOptions) -> Self {
        let url_access = UrlAccessController::new(options.base_domain.as_deref());
        info!(
            base_domain = url_access.base_domain().unwrap_or("<none>"),
            exit_hotkey = ?options.exit_hotkey,
            interval_ms = options.reconcile_interval.as_millis() as u64,
            "Security coordinator ready"
        );
        Self {
            rules,
            url_access,
            keyboard: KeyboardEventClassifier::new(options.exit_hotkey),
            window: RefCell::new(WindowStateEnforcer::new(options.reconcile_interval)),
            counters: ViolationCounters::default(),
            sink,
        }
    }

    // ── Rule set ──────────────────────────────────────────────────────

    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    /// Publishes a whole new rule set (configuration reload).
    pub fn replace_rules(&self, rules: RuleSet) {
        self.rules.replace(rules);
        info!("Rule set replaced");
    }

    pub fn set_strict_mode(&self, enabled: bool) {
        self.rules.update(|r| r.strict_mode = enabled);
        info!(enabled, "Strict mode toggled");
    }

    pub fn set_developer_mode(&self, enabled: bool) {
        self.rules.update(|r| r.developer_mode_enabled = enabled);
        info!(enabled, "Developer mode toggled");
    }

    pub fn set_keyboard_filter(&self, enabled: bool) {
        self.rules.update(|r| r.keyboard_filter_enabled = enabled);
        info!(enabled, "Keyboard filter toggled");
    }

    pub fn set_exit_detection(&self, enabled: bool) {
        self.rules.update(|r| r.exit_detection_enabled = enabled);
        info!(enabled, "Exit detection toggled");
    }

    // ── Statistics ────────────────────────────────────────────────────

    pub fn counters(&self) -> &ViolationCounters {
        &self.counters
    }

    pub fn reset_counters(&self) {
        self.counters.reset();
        info!("Violation counters reset");
    }

    // ── Window scheduling and exit path ───────────────────────────────

    /// Runs the periodic reconciliation if it is due.
    pub fn on_tick(&self, now: Instant, window: &dyn WindowControl) {
        let corrected = self.window.borrow_mut().poll(now, window);
        self.report_corrections(corrected);
    }

    /// Deadline for the host's timer. `None` before the first tick: run one now.
    pub fn next_tick_due(&self) -> Option<Instant> {
        self.window.borrow().next_due()
    }

    pub fn set_exit_prompt_open(&self, open: bool) {
        self.window.borrow_mut().set_prompt_open(open);
        debug!(open, "Exit prompt state changed");
    }

    /// Called once the exit password has been validated, or an exit URL was
    /// reached. From then on close requests are honoured.
    pub fn authorize_exit(&self) {
        self.window.borrow_mut().authorize_exit();
        info!("Controlled exit authorized");
    }

    /// Target geometry recorded at the last display change.
    pub fn target_geometry(&self) -> Option<euclid::default::Rect<i32>> {
        self.window.borrow().target_geometry()
    }

    // ── Internals ─────────────────────────────────────────────────────

    fn record_url_block(&self, url: &str, reason: BlockReason, context: &'static str) {
        if !reason.is_violation() {
            info!(url, %reason, context, "URL blocked");
            return;
        }
        let total = self.counters.record(ViolationKind::UnauthorizedUrl);
        info!(url, %reason, context, total, "Unauthorized URL blocked");
        self.sink.emit(SecurityEvent::ViolationLogged {
            kind: ViolationKind::UnauthorizedUrl,
            details: format!("{reason}: {url}"),
        });
    }

    fn report_corrections(&self, corrected: Vec<WindowAspect>) {
        for aspect in corrected {
            if aspect != WindowAspect::Geometry {
                let total = self.counters.record(ViolationKind::WindowDrift);
                info!(?aspect, total, "Window drift corrected");
            }
            self.sink.emit(SecurityEvent::WindowCorrected { aspect });
        }
    }

    /// Policy decision for the page the browser loads at startup. Not a
    /// navigation: nothing is counted and exit patterns are not checked.
    pub fn check_start_page(&self, url: &str) -> UrlDecision {
        self.url_access.decide_url(url, &self.rules.snapshot())
    }

    /// Category and decision, without counting or emitting anything.
    pub fn evaluate_key(&self, chord: &KeyChord) -> KeyVerdict {
        self.keyboard.evaluate(chord, &self.rules.snapshot())
    }
}

impl HostHooks for SecurityCoordinator {
    fn on_before_navigate(&self, request: &NavigationRequest) -> UrlDecision {
        let rules = self.rules.snapshot();

        let decision = self.url_access.decide(request, &rules);
        match decision {
            UrlDecision::Allow => debug!(url = %request.url, "Navigation allowed"),
            UrlDecision::Block(reason) => self.record_url_block(&request.url, reason, "navigation"),
        }

        if let Some(pattern) = self.url_access.check_exit(request, &rules) {
            info!(url = %request.url, %pattern, "Exit URL reached");
            self.sink.emit(SecurityEvent::ExitRequested {
                url: request.url.clone(),
                pattern: pattern.as_str().to_string(),
            });
        }

        decision
    }

    fn on_before_resource_load(&self, url: &str, is_main_resource: bool) -> UrlDecision {
        let rules = self.rules.snapshot();
        let decision = self.url_access.decide_url(url, &rules);
        match decision {
            UrlDecision::Allow => debug!(url, is_main_resource, "Resource allowed"),
            UrlDecision::Block(reason) => self.record_url_block(url, reason, "resource"),
        }
        decision
    }

    fn on_key_event(&self, chord: &KeyChord) -> KeyDecision {
        let KeyVerdict { category, decision } = self.evaluate_key(chord);

        match (category, decision) {
            (KeyCategory::ExitHotkey, _) => {
                info!(%chord, "Exit hotkey");
                self.sink.emit(SecurityEvent::ExitHotkeyPressed);
            }
            (KeyCategory::Dangerous, KeyDecision::Block) => {
                let total = self.counters.record(ViolationKind::DangerousKey);
                info!(%chord, total, "Dangerous key blocked");
                self.sink.emit(SecurityEvent::ViolationLogged {
                    kind: ViolationKind::DangerousKey,
                    details: chord.to_string(),
                });
            }
            (_, KeyDecision::Block) => debug!(%chord, ?category, "Key blocked"),
            (_, KeyDecision::Pass) => {}
        }
        decision
    }

    fn on_focus_lost(&self, window: &dyn WindowControl) {
        let corrected = self.window.borrow_mut().on_focus_lost(window);
        self.report_corrections(corrected);
    }

    fn on_display_changed(&self, window: &dyn WindowControl) {
        let corrected = self.window.borrow_mut().on_display_changed(window);
        self.report_corrections(corrected);
    }

    fn on_close_requested(&self) -> CloseDecision {
        self.window.borrow().on_close_requested()
    }
}
