use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("empty key spec")]
    Empty,
    #[error("unknown key '{0}'")]
    UnknownKey(String),
    #[error("unknown modifier '{0}'")]
    UnknownModifier(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Delete,
    Backspace,
    Enter,
    Esc,
    Tab,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    F(u8),
}

impl Key {
    fn parse(name: &str) -> Result<Self, KeyParseError> {
        let key = match name {
            "del" | "delete" => Key::Delete,
            "backspace" => Key::Backspace,
            "return" | "enter" => Key::Enter,
            "esc" => Key::Esc,
            "tab" => Key::Tab,
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            "home" => Key::Home,
            "end" => Key::End,
            "pageup" => Key::PageUp,
            "pagedown" => Key::PageDown,
            "space" => Key::Char(' '),
            _ => {
                if let Some(n) = name.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                    if (1..=12).contains(&n) {
                        return Ok(Key::F(n));
                    }
                }
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c.to_ascii_lowercase()),
                    _ => return Err(KeyParseError::UnknownKey(name.to_string())),
                }
            }
        };
        Ok(key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(' ') => f.write_str("space"),
            Key::Char(c) => write!(f, "{c}"),
            Key::Delete => f.write_str("del"),
            Key::Backspace => f.write_str("backspace"),
            Key::Enter => f.write_str("return"),
            Key::Esc => f.write_str("esc"),
            Key::Tab => f.write_str("tab"),
            Key::Up => f.write_str("up"),
            Key::Down => f.write_str("down"),
            Key::Left => f.write_str("left"),
            Key::Right => f.write_str("right"),
            Key::Home => f.write_str("home"),
            Key::End => f.write_str("end"),
            Key::PageUp => f.write_str("pageup"),
            Key::PageDown => f.write_str("pagedown"),
            Key::F(n) => write!(f, "f{n}"),
        }
    }
}

/// A key plus modifiers, written `ctrl+alt+shift+key` like jquery.hotkeys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub key: Key,
}

impl KeyCombo {
    pub fn plain(key: Key) -> Self {
        Self {
            ctrl: false,
            alt: false,
            shift: false,
            key,
        }
    }

    pub fn ctrl(key: Key) -> Self {
        Self {
            ctrl: true,
            ..Self::plain(key)
        }
    }
}

impl FromStr for KeyCombo {
    type Err = KeyParseError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let spec = spec.trim().to_ascii_lowercase();
        if spec.is_empty() {
            return Err(KeyParseError::Empty);
        }
        // A trailing '+' is the plus key itself.
        let (modifiers, key) = match spec.strip_suffix("++") {
            Some(rest) => (rest, "+"),
            None => match spec.rsplit_once('+') {
                Some((modifiers, key)) if !key.is_empty() => (modifiers, key),
                Some(_) => ("", "+"),
                None => ("", spec.as_str()),
            },
        };

        let mut combo = KeyCombo::plain(Key::parse(key)?);
        for modifier in modifiers.split('+').filter(|m| !m.is_empty()) {
            match modifier {
                "ctrl" | "control" => combo.ctrl = true,
                "alt" => combo.alt = true,
                "shift" => combo.shift = true,
                other => return Err(KeyParseError::UnknownModifier(other.to_string())),
            }
        }
        Ok(combo)
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("ctrl+")?;
        }
        if self.alt {
            f.write_str("alt+")?;
        }
        if self.shift {
            f.write_str("shift+")?;
        }
        write!(f, "{}", self.key)
    }
}

/// Key bindings behind a single guard. While the guard answers false no
/// binding resolves, local or not.
pub struct HotkeyMap<A> {
    bindings: HashMap<KeyCombo, A>,
    guard: Box<dyn Fn() -> bool + Send + Sync>,
}

impl<A> HotkeyMap<A> {
    pub fn new<G>(guard: G) -> Self
    where
        G: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            bindings: HashMap::new(),
            guard: Box::new(guard),
        }
    }

    pub fn bind(mut self, spec: &str, action: A) -> Result<Self, KeyParseError> {
        self.bindings.insert(spec.parse()?, action);
        Ok(self)
    }

    pub fn resolve(&self, combo: &KeyCombo) -> Option<&A> {
        if !(self.guard)() {
            return None;
        }
        self.bindings.get(combo)
    }

    pub fn is_bound(&self, combo: &KeyCombo) -> bool {
        self.bindings.contains_key(combo)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
