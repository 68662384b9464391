//! Input types shared by raw and block-level events

// ============================================================================
// Mouse
// ============================================================================

/// Mouse buttons
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left mouse button
    Left,
    /// Right mouse button
    Right,
    /// Middle mouse button (scroll wheel click)
    Middle,
    /// Other button with index
    Other(u16),
}

// ============================================================================
// Keyboard
// ============================================================================

/// Keyboard event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyboardEvent {
    /// The key that was pressed or released
    pub key: Key,
    /// Modifier keys held during this event
    pub modifiers: Modifiers,
}

impl KeyboardEvent {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::default(),
        }
    }
}

/// Modifier key state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    /// Shift key is held
    pub shift: bool,
    /// Control key is held
    pub ctrl: bool,
    /// Alt key is held (Option on macOS)
    pub alt: bool,
    /// Meta key is held (Command on macOS, Windows key on Windows)
    pub meta: bool,
}

impl Modifiers {
    /// Check if no modifiers are held
    pub fn is_empty(&self) -> bool {
        !self.shift && !self.ctrl && !self.alt && !self.meta
    }
}

/// Key codes
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    // Navigation
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,

    // Editing
    Enter,
    Escape,
    Backspace,
    Delete,
    Tab,
    Space,

    // Modifier keys (for tracking state)
    Shift,
    Ctrl,
    Alt,
    Meta,

    // Character input
    Char(char),

    // Unknown key
    Unknown,
}

impl Key {
    /// Whether typing this key produces a visible glyph.
    ///
    /// Navigation, editing, and modifier keys do not.
    pub fn is_glyph(&self) -> bool {
        matches!(self, Key::Char(_) | Key::Space)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyph_keys() {
        assert!(Key::Char('x').is_glyph());
        assert!(Key::Space.is_glyph());
        assert!(!Key::Backspace.is_glyph());
        assert!(!Key::Shift.is_glyph());
        assert!(!Key::Left.is_glyph());
    }

    #[test]
    fn test_modifiers_empty() {
        assert!(Modifiers::default().is_empty());
        let shift = Modifiers {
            shift: true,
            ..Default::default()
        };
        assert!(!shift.is_empty());
    }
}
