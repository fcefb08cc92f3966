use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use super::render::{Hit, Modal, ViewState};
use crate::dispatch::{Intent, Key, KeyCombo, PaneId, PointerButton, ResizeHandle, Sibling};

/// The handle between the message list and the message pane; dragging it sizes the list.
pub const LIST_HANDLE: ResizeHandle = ResizeHandle {
    previous: PaneId::MessageList,
    next: PaneId::MessageBody,
    sibling: Sibling::Previous,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEdit {
    Insert(char),
    Backspace,
}

/// What a terminal event means to the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    Intent(Intent),
    FocusSearch,
    BlurSearch,
    EditSearch(SearchEdit),
    /// Leave the viewer.
    Exit,
    Ignore,
}

pub fn map_event(event: &Event, state: &ViewState) -> UiAction {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => map_key(key, state),
        Event::Mouse(mouse) => map_mouse(mouse, state),
        _ => UiAction::Ignore,
    }
}

fn map_key(key: &KeyEvent, state: &ViewState) -> UiAction {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl {
        match key.code {
            KeyCode::Char('c') => return UiAction::Exit,
            KeyCode::Char('q') => return UiAction::Intent(Intent::Terminate),
            KeyCode::Char('l') => return UiAction::Intent(Intent::ClearAll),
            KeyCode::Char('n') => return UiAction::Intent(Intent::ToggleNotifications),
            KeyCode::Char('d') => return UiAction::Intent(Intent::DeleteSelected),
            _ => {}
        }
    }

    if state.search_focused {
        return match key.code {
            KeyCode::Esc | KeyCode::Enter => UiAction::BlurSearch,
            KeyCode::Backspace => UiAction::EditSearch(SearchEdit::Backspace),
            KeyCode::Char(c) if !ctrl && !c.is_control() => UiAction::EditSearch(SearchEdit::Insert(c)),
            _ => UiAction::Ignore,
        };
    }

    match key.code {
        KeyCode::Esc => UiAction::Exit,
        KeyCode::Tab if key.modifiers.is_empty() => match state.next_format() {
            Some(format) => UiAction::Intent(Intent::SelectFormat(format)),
            None => UiAction::Ignore,
        },
        _ => match key_combo(key) {
            Some(combo) => UiAction::Intent(Intent::Key(combo)),
            None => UiAction::Ignore,
        },
    }
}

/// Converts a crossterm key event into the hotkey notation.
pub fn key_combo(key: &KeyEvent) -> Option<KeyCombo> {
    let mut shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let key_code = match key.code {
        KeyCode::Char(c) => {
            // Shifted symbols already arrive as the symbol itself.
            shift &= c.is_ascii_alphabetic();
            Key::Char(c.to_ascii_lowercase())
        }
        KeyCode::Delete => Key::Delete,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Esc,
        KeyCode::Tab => Key::Tab,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::F(n) if (1..=12).contains(&n) => Key::F(n),
        _ => return None,
    };
    Some(KeyCombo {
        ctrl: key.modifiers.contains(KeyModifiers::CONTROL),
        alt: key.modifiers.contains(KeyModifiers::ALT),
        shift,
        key: key_code,
    })
}

fn map_mouse(mouse: &MouseEvent, state: &ViewState) -> UiAction {
    match mouse.kind {
        MouseEventKind::Down(button) => {
            let hit = state.hit(mouse.column, mouse.row);
            if hit == Some(Hit::ResizeHandle) {
                return UiAction::Intent(Intent::PointerDown {
                    handle: LIST_HANDLE,
                    button: pointer_button(button),
                });
            }
            if button != MouseButton::Left {
                return UiAction::Ignore;
            }
            match hit {
                Some(Hit::Quit) => UiAction::Intent(Intent::Terminate),
                Some(Hit::Clear) => UiAction::Intent(Intent::ClearAll),
                Some(Hit::ToggleNotifications) => UiAction::Intent(Intent::ToggleNotifications),
                Some(Hit::Search) => UiAction::FocusSearch,
                Some(Hit::Row(id)) => UiAction::Intent(Intent::RowClick {
                    id,
                    ctrl: mouse.modifiers.contains(KeyModifiers::CONTROL),
                }),
                Some(Hit::FormatTab(format)) => UiAction::Intent(Intent::SelectFormat(format)),
                Some(Hit::Delete) => UiAction::Intent(Intent::DeleteSelected),
                Some(Hit::ResizeHandle) | None => {
                    if state.search_focused {
                        UiAction::BlurSearch
                    } else {
                        UiAction::Ignore
                    }
                }
            }
        }
        MouseEventKind::Drag(_) => UiAction::Intent(Intent::PointerMove { y: mouse.row }),
        MouseEventKind::Up(_) => UiAction::Intent(Intent::PointerUp),
        _ => UiAction::Ignore,
    }
}

fn pointer_button(button: MouseButton) -> PointerButton {
    match button {
        MouseButton::Left => PointerButton::Primary,
        MouseButton::Right => PointerButton::Secondary,
        MouseButton::Middle => PointerButton::Middle,
    }
}

/// Answer to an open modal, if the event closes it.
pub fn modal_answer(event: &Event, modal: &Modal) -> Option<bool> {
    let Event::Key(key) = event else {
        return None;
    };
    if key.kind == KeyEventKind::Release {
        return None;
    }
    let ctrl_c = key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c');
    match modal {
        Modal::Confirm(_) => match key.code {
            _ if ctrl_c => Some(false),
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Some(true),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(false),
            _ => None,
        },
        Modal::Alert(_) => match key.code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ') => Some(true),
            _ if ctrl_c => Some(true),
            _ => None,
        },
    }
}
