//! Keyboard chord classification.
//!
//! Every chord falls into exactly one [`KeyCategory`]; the category alone
//! (plus the keyboard-filter and developer-mode flags) decides whether the
//! key reaches the page. Tables are checked in this order:
//!
//! | Category          | Chords                                                        | Decision |
//! |-------------------|---------------------------------------------------------------|----------|
//! | `ExitHotkey`      | configured key, no modifiers                                  | Pass     |
//! | `Dangerous`       | any Super/Meta chord, Alt+Tab/F4/Esc/Space, Ctrl+Esc, Ctrl+Shift+Esc, Ctrl+Alt+Del/Backspace/Fn | Block |
//! | `DebugTool`       | F12, Ctrl+Shift+I/J/C                                          | Block (Pass in developer mode) |
//! | `SystemReserved`  | F1, F11, Shift+F10, Ctrl+F11, Ctrl+F12                        | Block    |
//! | `AllowedFunction` | everything else (navigation, editing, Ctrl+R, text)           | Pass     |

use std::fmt;

use winit::keyboard::{KeyCode, ModifiersState};

use crate::rules::RuleSet;

/// A physical key plus the modifiers held when it was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub key: KeyCode,
    pub modifiers: ModifiersState,
}

impl KeyChord {
    pub fn new(key: KeyCode, modifiers: ModifiersState) -> Self {
        Self { key, modifiers }
    }

    /// The key pressed with no modifier held.
    pub fn plain(key: KeyCode) -> Self {
        Self::new(key, ModifiersState::empty())
    }

    pub fn ctrl(key: KeyCode) -> Self {
        Self::new(key, ModifiersState::CONTROL)
    }

    pub fn alt(key: KeyCode) -> Self {
        Self::new(key, ModifiersState::ALT)
    }

    pub fn ctrl_shift(key: KeyCode) -> Self {
        Self::new(key, ModifiersState::CONTROL | ModifiersState::SHIFT)
    }

    pub fn ctrl_alt(key: KeyCode) -> Self {
        Self::new(key, ModifiersState::CONTROL | ModifiersState::ALT)
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.modifiers;
        for (held, name) in [
            (m.control_key(), "Ctrl+"),
            (m.alt_key(), "Alt+"),
            (m.shift_key(), "Shift+"),
            (m.super_key(), "Meta+"),
        ] {
            if held {
                f.write_str(name)?;
            }
        }
        write!(f, "{:?}", self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCategory {
    ExitHotkey,
    AllowedFunction,
    Dangerous,
    SystemReserved,
    DebugTool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDecision {
    Pass,
    Block,
}

/// Category and decision for one chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyVerdict {
    pub category: KeyCategory,
    pub decision: KeyDecision,
}

/// Fixed-table chord classifier. Only the exit hotkey is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardEventClassifier {
    exit_hotkey: KeyCode,
}

/// Exit hotkey used when the configuration does not name one.
pub const DEFAULT_EXIT_HOTKEY: KeyCode = KeyCode::F10;

impl Default for KeyboardEventClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_EXIT_HOTKEY)
    }
}

impl KeyboardEventClassifier {
    pub fn new(exit_hotkey: KeyCode) -> Self {
        Self { exit_hotkey }
    }

    pub fn exit_hotkey(&self) -> KeyCode {
        self.exit_hotkey
    }

    pub fn classify(&self, chord: &KeyChord) -> KeyCategory {
        if chord.modifiers.is_empty() && chord.key == self.exit_hotkey {
            KeyCategory::ExitHotkey
        } else if is_dangerous(chord) {
            KeyCategory::Dangerous
        } else if is_debug_tool(chord) {
            KeyCategory::DebugTool
        } else if is_system_reserved(chord) {
            KeyCategory::SystemReserved
        } else {
            KeyCategory::AllowedFunction
        }
    }

    pub fn decide(&self, category: KeyCategory, rules: &RuleSet) -> KeyDecision {
        if !rules.keyboard_filter_enabled {
            return KeyDecision::Pass;
        }
        match category {
            KeyCategory::ExitHotkey | KeyCategory::AllowedFunction => KeyDecision::Pass,
            KeyCategory::Dangerous | KeyCategory::SystemReserved => KeyDecision::Block,
            KeyCategory::DebugTool if rules.developer_mode_enabled => KeyDecision::Pass,
            KeyCategory::DebugTool => KeyDecision::Block,
        }
    }

    pub fn evaluate(&self, chord: &KeyChord, rules: &RuleSet) -> KeyVerdict {
        let category = self.classify(chord);
        KeyVerdict {
            category,
            decision: self.decide(category, rules),
        }
    }
}

fn is_function_key(key: KeyCode) -> bool {
    matches!(
        key,
        KeyCode::F1
            | KeyCode::F2
            | KeyCode::F3
            | KeyCode::F4
            | KeyCode::F5
            | KeyCode::F6
            | KeyCode::F7
            | KeyCode::F8
            | KeyCode::F9
            | KeyCode::F10
            | KeyCode::F11
            | KeyCode::F12
    )
}

/// Task switching, window closing, session and VT switching.
fn is_dangerous(chord: &KeyChord) -> bool {
    let m = chord.modifiers;
    if m.super_key() || matches!(chord.key, KeyCode::SuperLeft | KeyCode::SuperRight) {
        return true;
    }
    let (ctrl, alt) = (m.control_key(), m.alt_key());
    match chord.key {
        KeyCode::Tab | KeyCode::F4 | KeyCode::Space => alt,
        KeyCode::Escape => alt || ctrl,
        KeyCode::Delete | KeyCode::Backspace => ctrl && alt,
        key if is_function_key(key) => ctrl && alt,
        _ => false,
    }
}

fn is_debug_tool(chord: &KeyChord) -> bool {
    let m = chord.modifiers;
    match chord.key {
        KeyCode::F12 => m.is_empty(),
        KeyCode::KeyI | KeyCode::KeyJ | KeyCode::KeyC => {
            m == ModifiersState::CONTROL | ModifiersState::SHIFT
        }
        _ => false,
    }
}

fn is_system_reserved(chord: &KeyChord) -> bool {
    let m = chord.modifiers;
    match chord.key {
        KeyCode::F1 | KeyCode::F11 => true,
        KeyCode::F10 => m == ModifiersState::SHIFT,
        KeyCode::F12 => m == ModifiersState::CONTROL,
        _ => false,
    }
}
