//! Boucle d'événements Winit du kiosque.
//!
//! ## Pattern "Two-Phase App"
//!
//! Winit 0.30 impose que les fenêtres soient créées à l'intérieur du callback
//! `resumed()`. Le coordinateur a besoin de la fenêtre pour la réconcilier,
//! d'où l'enum à deux états :
//!
//! ```text
//! App::Initial { sink, config, rules }  →  [resumed()]  →  App::Running(AppState)
//! ```
//!
//! ## Flux des événements
//!
//! ```text
//! Winit WindowEvent ──▶ HostHooks (SecurityCoordinator)
//!                             │ emit()
//!                             ▼
//!                       ProxySink ── EventLoopProxy::send_event(SecurityEvent)
//!                             │
//!                             ▼
//!                       user_event() → invite de sortie / sortie contrôlée
//! ```
//!
//! Le tick de réconciliation tourne sur le même thread, via
//! `ControlFlow::WaitUntil` dans `about_to_wait()`.
//!
//! Les combinaisons interceptées par le système avant d'atteindre la fenêtre
//! (Ctrl+Alt+Suppr, Alt+Tab sous Windows) ne passent jamais par ici.

use std::cell::Cell;
use std::time::Instant;

use euclid::default::{Point2D, Rect, Size2D};
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::keyboard::ModifiersState;
use winit::window::{Fullscreen, Window, WindowId, WindowLevel};

use crate::config::Config;
use crate::coordinator::{HostHooks, SecurityCoordinator};
use crate::error::WindowError;
use crate::events::{EventSink, SecurityEvent, TracingSink};
use crate::exit::{ExitPrompt, PromptOutcome};
use crate::keyboard::{KeyChord, KeyDecision};
use crate::keyutils::{PromptInput, chord_from_winit, prompt_input_from_winit};
use crate::rules::RuleStore;
use crate::url_access::UrlDecision;
use crate::window::{CloseDecision, WindowControl, WindowState};

// ─────────────────────────────────────────────────────────────────────────────
// ProxySink : pont coordinateur → boucle Winit
// ─────────────────────────────────────────────────────────────────────────────

/// Forwards every [`SecurityEvent`] to the Winit loop, which receives it in
/// `user_event()`. `send_event` only enqueues.
#[derive(Clone)]
pub struct ProxySink(EventLoopProxy<SecurityEvent>);

impl ProxySink {
    pub fn new(event_loop: &EventLoop<SecurityEvent>) -> Self {
        Self(event_loop.create_proxy())
    }
}

impl EventSink for ProxySink {
    fn emit(&self, event: SecurityEvent) {
        if let Err(error) = self.0.send_event(event) {
            warn!(?error, "Event loop closed, security event dropped");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// KioskWindow : WindowControl sur une fenêtre Winit
// ─────────────────────────────────────────────────────────────────────────────

pub struct KioskWindow {
    window: Window,
    /// Last level applied through Winit. Only used where the platform
    /// cannot be queried.
    topmost_applied: Cell<bool>,
}

impl KioskWindow {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            topmost_applied: Cell::new(true),
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    #[cfg(windows)]
    fn is_topmost(&self) -> Result<bool, WindowError> {
        use windows_sys::Win32::Foundation::HWND;
        use windows_sys::Win32::UI::WindowsAndMessaging::{
            GWL_EXSTYLE, GetWindowLongW, WS_EX_TOPMOST,
        };
        use winit::raw_window_handle::{HasWindowHandle, RawWindowHandle};

        let handle = self
            .window
            .window_handle()
            .map_err(|_| WindowError::HandleUnavailable)?;
        let RawWindowHandle::Win32(handle) = handle.as_raw() else {
            return Err(WindowError::HandleUnavailable);
        };
        // SAFETY: the HWND belongs to a window that `self` keeps alive.
        let style = unsafe { GetWindowLongW(handle.hwnd.get() as HWND, GWL_EXSTYLE) };
        Ok(style as u32 & WS_EX_TOPMOST != 0)
    }

    #[cfg(not(windows))]
    fn is_topmost(&self) -> Result<bool, WindowError> {
        Ok(self.topmost_applied.get())
    }
}

impl WindowControl for KioskWindow {
    fn current_state(&self) -> Result<WindowState, WindowError> {
        // Wayland hides global positions: assume the window sits at the
        // origin of its monitor, which holds while it is fullscreen.
        let position = window_origin(
            self.window.outer_position().ok(),
            self.window.current_monitor().map(|m| m.position()),
        );
        Ok(WindowState {
            is_fullscreen: self.window.fullscreen().is_some(),
            is_focused: self.window.has_focus(),
            is_always_on_top: self.is_topmost()?,
            geometry: rect_from_physical(position, self.window.outer_size()),
        })
    }

    fn primary_display(&self) -> Result<Rect<i32>, WindowError> {
        // No primary monitor on Wayland.
        let monitor = self
            .window
            .primary_monitor()
            .or_else(|| self.window.current_monitor())
            .or_else(|| self.window.available_monitors().next())
            .map(|m| (m.position(), m.size()));
        Ok(display_rect(monitor, self.window.outer_size()))
    }

    fn assert_fullscreen(&self, _target: Option<Rect<i32>>) -> Result<(), WindowError> {
        // Borderless on the primary monitor covers the target geometry.
        let monitor = self.window.primary_monitor();
        self.window.set_fullscreen(Some(Fullscreen::Borderless(monitor)));
        Ok(())
    }

    fn request_focus(&self) -> Result<(), WindowError> {
        self.window.focus_window();
        Ok(())
    }

    fn assert_always_on_top(&self) -> Result<(), WindowError> {
        self.window.set_window_level(WindowLevel::AlwaysOnTop);
        self.topmost_applied.set(true);
        Ok(())
    }

    fn apply_geometry(&self, geometry: Rect<i32>) -> Result<(), WindowError> {
        self.window
            .set_outer_position(PhysicalPosition::new(geometry.origin.x, geometry.origin.y));
        // Ignored while fullscreen, honoured if fullscreen is lost later.
        let _ = self.window.request_inner_size(size_to_physical(geometry.size));
        Ok(())
    }
}

fn rect_from_physical(position: PhysicalPosition<i32>, size: PhysicalSize<u32>) -> Rect<i32> {
    Rect::new(
        Point2D::new(position.x, position.y),
        Size2D::new(
            i32::try_from(size.width).unwrap_or(i32::MAX),
            i32::try_from(size.height).unwrap_or(i32::MAX),
        ),
    )
}

fn window_origin(
    position: Option<PhysicalPosition<i32>>,
    monitor_origin: Option<PhysicalPosition<i32>>,
) -> PhysicalPosition<i32> {
    position.or(monitor_origin).unwrap_or_default()
}

/// Without any monitor handle the window itself stands in for the display.
fn display_rect(
    monitor: Option<(PhysicalPosition<i32>, PhysicalSize<u32>)>,
    window_size: PhysicalSize<u32>,
) -> Rect<i32> {
    match monitor {
        Some((position, size)) => rect_from_physical(position, size),
        None => rect_from_physical(PhysicalPosition::default(), window_size),
    }
}

fn size_to_physical(size: Size2D<i32>) -> PhysicalSize<u32> {
    PhysicalSize::new(size.width.max(0) as u32, size.height.max(0) as u32)
}

// ─────────────────────────────────────────────────────────────────────────────
// Décisions du shell
// ─────────────────────────────────────────────────────────────────────────────

/// The engine loads `app_url` itself; the shell only checks it is allowed.
/// Checked as a start page, so an exit URL does not end the session at launch.
fn vet_start_page(coordinator: &SecurityCoordinator, url: &str) -> UrlDecision {
    let decision = coordinator.check_start_page(url);
    if let UrlDecision::Block(reason) = decision {
        warn!(url, %reason, "Start page is blocked by the access policy");
    }
    decision
}

/// There is no page in this shell to forward a passed key to, so the
/// decision only ends up in the log.
fn handle_key(coordinator: &SecurityCoordinator, chord: &KeyChord) -> KeyDecision {
    let decision = coordinator.on_key_event(chord);
    debug!(%chord, ?decision, "Key decided");
    decision
}

// ─────────────────────────────────────────────────────────────────────────────
// AppState
// ─────────────────────────────────────────────────────────────────────────────

/// État de l'application, créé lors de `resumed()`.
pub struct AppState {
    pub window: KioskWindow,
    pub coordinator: SecurityCoordinator,
    pub prompt: ExitPrompt,
    pub modifiers: ModifiersState,
    window_title: String,
}

impl AppState {
    fn open_prompt(&mut self) {
        if self.prompt.is_open() {
            return;
        }
        self.prompt.open();
        self.coordinator.set_exit_prompt_open(true);
        self.refresh_title();
    }

    fn close_prompt(&mut self) {
        self.prompt.cancel();
        self.coordinator.set_exit_prompt_open(false);
        self.refresh_title();
    }

    /// Returns `true` once the prompt accepted the password.
    fn feed_prompt(&mut self, input: PromptInput) -> bool {
        match input {
            PromptInput::Char(c) => self.prompt.push_char(c),
            PromptInput::Backspace => self.prompt.backspace(),
            PromptInput::Cancel => self.close_prompt(),
            PromptInput::Submit => match self.prompt.submit() {
                PromptOutcome::Accepted => return true,
                PromptOutcome::Rejected | PromptOutcome::Cancelled => {}
            },
        }
        self.refresh_title();
        false
    }

    /// The prompt has no widget of its own: its state goes in the title.
    fn refresh_title(&self) {
        let title = if self.prompt.is_open() {
            format!(
                "{} · mot de passe : {}",
                self.window_title,
                "●".repeat(self.prompt.input_len())
            )
        } else {
            self.window_title.clone()
        };
        self.window.window().set_title(&title);
    }

    fn controlled_exit(&self, event_loop: &ActiveEventLoop) {
        self.coordinator.authorize_exit();
        info!(
            stats = ?self.coordinator.counters().snapshot(),
            "Controlled exit"
        );
        event_loop.exit();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// App : enum deux phases
// ─────────────────────────────────────────────────────────────────────────────

pub enum App {
    /// Phase pré-initialisation : on attend que Winit appelle `resumed()`.
    Initial {
        sink: ProxySink,
        config: Config,
        rules: RuleStore,
    },

    /// Phase opérationnelle : la fenêtre est verrouillée.
    Running(Box<AppState>),
}

impl App {
    pub fn new(event_loop: &EventLoop<SecurityEvent>, config: Config, rules: RuleStore) -> Self {
        Self::Initial {
            sink: ProxySink::new(event_loop),
            config,
            rules,
        }
    }
}

impl ApplicationHandler<SecurityEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let (sink, config, rules) = match self {
            Self::Initial {
                sink,
                config,
                rules,
            } => (sink.clone(), config.clone(), rules.clone()),
            Self::Running(_) => return,
        };

        // ── 1. Fenêtre plein écran, sans bordure, au premier plan ──────
        let attributes = Window::default_attributes()
            .with_title(config.general.window_title.clone())
            .with_decorations(false)
            .with_fullscreen(Some(Fullscreen::Borderless(None)))
            .with_window_level(WindowLevel::AlwaysOnTop);

        let window = match event_loop.create_window(attributes) {
            Ok(window) => window,
            Err(e) => {
                error!(error = %e, "Cannot create the kiosk window");
                event_loop.exit();
                return;
            }
        };

        // ── 2. Coordinateur ─────────────────────────────────────────────
        let coordinator =
            SecurityCoordinator::new(rules, Box::new(sink), config.coordinator_options());

        // ── 3. Page de départ ───────────────────────────────────────────
        vet_start_page(&coordinator, &config.general.app_url);

        let mut state = AppState {
            window: KioskWindow::new(window),
            coordinator,
            prompt: ExitPrompt::new(config.exit.password.clone()),
            modifiers: ModifiersState::default(),
            window_title: config.general.window_title.clone(),
        };
        state.coordinator.on_display_changed(&state.window);
        state.window.window().focus_window();
        state.refresh_title();

        info!(url = %config.general.app_url, "Kiosk window locked");

        // ── 4. Transition Initial → Running ─────────────────────────────
        *self = Self::Running(Box::new(state));
    }

    /// Événements émis par le coordinateur via `ProxySink`.
    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: SecurityEvent) {
        let Self::Running(state) = self else {
            return;
        };
        match event {
            SecurityEvent::ExitHotkeyPressed => state.open_prompt(),
            SecurityEvent::ExitRequested { .. } => {
                TracingSink.emit(event);
                state.controlled_exit(event_loop);
            }
            other => TracingSink.emit(other),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Self::Running(state) = self else {
            return;
        };

        match event {
            // ── Fermeture : refusée hors sortie contrôlée ─────────────
            WindowEvent::CloseRequested => {
                if state.coordinator.on_close_requested() == CloseDecision::Allow {
                    event_loop.exit();
                }
            }

            // ── Perte de focus ─────────────────────────────────────────
            WindowEvent::Focused(false) => state.coordinator.on_focus_lost(&state.window),

            // ── Changement d'écran ─────────────────────────────────────
            WindowEvent::ScaleFactorChanged { .. } => {
                state.coordinator.on_display_changed(&state.window);
            }
            WindowEvent::Resized(size) => {
                let expected = state.coordinator.target_geometry().map(|t| t.size);
                if expected != Some(rect_from_physical(PhysicalPosition::default(), size).size) {
                    state.coordinator.on_display_changed(&state.window);
                }
            }

            // ── Modificateurs clavier (Ctrl, Shift, Alt, Meta) ────────
            WindowEvent::ModifiersChanged(new_modifiers) => {
                state.modifiers = new_modifiers.state();
            }

            // ── Saisie clavier ────────────────────────────────────────
            WindowEvent::KeyboardInput { event, .. } => {
                // Repeats were decided on the initial press.
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }

                if state.prompt.is_open() {
                    for input in prompt_input_from_winit(&event) {
                        if state.feed_prompt(input) {
                            state.controlled_exit(event_loop);
                            return;
                        }
                    }
                    return;
                }

                if let Some(chord) = chord_from_winit(&event, state.modifiers) {
                    handle_key(&state.coordinator, &chord);
                }
            }

            _ => (),
        }
    }

    /// Tick périodique de réconciliation.
    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Self::Running(state) = self else {
            return;
        };
        state.coordinator.on_tick(Instant::now(), &state.window);
        if let Some(due) = state.coordinator.next_tick_due() {
            event_loop.set_control_flow(ControlFlow::WaitUntil(due));
        }
    }
}
