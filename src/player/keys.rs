//! Keyboard shortcuts

/// A key press, identified the way browsers report `KeyboardEvent.code`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Space,
    Other(String),
}

impl Key {
    pub fn from_code(code: &str) -> Self {
        match code {
            "Space" | " " => Key::Space,
            other => Key::Other(other.to_string()),
        }
    }
}

/// What the page should do with the key after the player has seen it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Consumed; suppress the default action (page scroll for Space)
    PreventDefault,
    PassThrough,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code() {
        assert_eq!(Key::from_code("Space"), Key::Space);
        assert_eq!(Key::from_code(" "), Key::Space);
        assert_eq!(Key::from_code("KeyK"), Key::Other("KeyK".to_string()));
    }
}
