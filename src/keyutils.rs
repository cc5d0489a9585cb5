//! Conversion des événements clavier Winit vers les types du noyau.
//!
//! Winit décrit une touche par sa position physique (`PhysicalKey`) et sa
//! valeur logique (`Key`). Le filtre clavier travaille sur la position
//! physique, indépendante de la disposition ; l'invite de sortie travaille
//! sur la valeur logique, pour saisir le mot de passe tel que tapé.

use winit::event::KeyEvent;
use winit::keyboard::{Key, KeyCode, ModifiersState, NamedKey, PhysicalKey};

use crate::keyboard::KeyChord;

/// Convertit un `KeyEvent` Winit + état des modificateurs en [`KeyChord`].
///
/// `None` pour les touches que Winit n'a pas su identifier.
pub fn chord_from_winit(key_event: &KeyEvent, state: ModifiersState) -> Option<KeyChord> {
    chord_from_parts(&key_event.physical_key, state)
}

pub fn chord_from_parts(physical_key: &PhysicalKey, state: ModifiersState) -> Option<KeyChord> {
    match physical_key {
        PhysicalKey::Code(code) => Some(KeyChord::new(*code, modifiers_from_winit(state))),
        PhysicalKey::Unidentified(_) => None,
    }
}

/// Ne garde que les quatre modificateurs significatifs.
fn modifiers_from_winit(mods: ModifiersState) -> ModifiersState {
    mods & (ModifiersState::SHIFT
        | ModifiersState::CONTROL
        | ModifiersState::ALT
        | ModifiersState::SUPER)
}

/// Ce qu'une frappe signifie pour l'invite de sortie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptInput {
    Char(char),
    Backspace,
    Submit,
    Cancel,
}

pub fn prompt_input_from_winit(key_event: &KeyEvent) -> Vec<PromptInput> {
    prompt_input_from_key(&key_event.logical_key)
}

fn prompt_input_from_key(logical_key: &Key) -> Vec<PromptInput> {
    match logical_key {
        Key::Named(NamedKey::Enter) => vec![PromptInput::Submit],
        Key::Named(NamedKey::Escape) => vec![PromptInput::Cancel],
        Key::Named(NamedKey::Backspace) => vec![PromptInput::Backspace],
        Key::Named(NamedKey::Space) => vec![PromptInput::Char(' ')],
        Key::Character(text) => text.chars().map(PromptInput::Char).collect(),
        _ => Vec::new(),
    }
}

/// Résout un nom de touche de configuration (`"F10"`, `"Pause"`…).
///
/// Insensible à la casse. Seules les touches qui ne produisent pas de texte
/// sont acceptées, pour qu'un raccourci de sortie ne se déclenche pas en
/// tapant dans un formulaire.
pub fn key_code_from_name(name: &str) -> Option<KeyCode> {
    let name = name.trim().to_ascii_uppercase();
    let code = match name.as_str() {
        "F1" => KeyCode::F1,
        "F2" => KeyCode::F2,
        "F3" => KeyCode::F3,
        "F4" => KeyCode::F4,
        "F5" => KeyCode::F5,
        "F6" => KeyCode::F6,
        "F7" => KeyCode::F7,
        "F8" => KeyCode::F8,
        "F9" => KeyCode::F9,
        "F10" => KeyCode::F10,
        "F11" => KeyCode::F11,
        "F12" => KeyCode::F12,
        "F13" => KeyCode::F13,
        "F14" => KeyCode::F14,
        "F15" => KeyCode::F15,
        "F16" => KeyCode::F16,
        "F17" => KeyCode::F17,
        "F18" => KeyCode::F18,
        "F19" => KeyCode::F19,
        "F20" => KeyCode::F20,
        "F21" => KeyCode::F21,
        "F22" => KeyCode::F22,
        "F23" => KeyCode::F23,
        "F24" => KeyCode::F24,
        "ESCAPE" | "ESC" => KeyCode::Escape,
        "PAUSE" => KeyCode::Pause,
        "SCROLLLOCK" => KeyCode::ScrollLock,
        "PRINTSCREEN" => KeyCode::PrintScreen,
        "INSERT" => KeyCode::Insert,
        "HOME" => KeyCode::Home,
        "END" => KeyCode::End,
        "PAGEUP" => KeyCode::PageUp,
        "PAGEDOWN" => KeyCode::PageDown,
        _ => return None,
    };
    Some(code)
}
