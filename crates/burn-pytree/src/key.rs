use alloc::string::String;
use core::fmt;

use serde::{Deserialize, Serialize};

/// Key of a dict child.
///
/// Two keys are equal when both their tag and their payload are equal, so `Key::Int(1)`
/// and `Key::Str("1".into())` are different keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// No key. Only found in dicts assembled by hand, never encodable.
    #[default]
    Absent,
    /// Integer key, written as bare decimal digits.
    Int(i32),
    /// String key, written between single quotes.
    Str(String),
}

impl Key {
    /// Returns the integer payload, if this is an integer key.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Key::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a string key.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Returns true if the key is [`Key::Absent`].
    pub fn is_absent(&self) -> bool {
        matches!(self, Key::Absent)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.into())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Absent => f.write_str("<absent>"),
            Key::Int(value) => write!(f, "{value}"),
            Key::Str(value) => write!(f, "'{value}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn equality_compares_tag_then_payload() {
        assert_eq!(Key::from(1), Key::Int(1));
        assert_eq!(Key::from("a"), Key::Str("a".to_string()));
        assert_ne!(Key::from(1), Key::from("1"));
        assert_ne!(Key::from(1), Key::from(2));
        assert_ne!(Key::Absent, Key::from(0));
        assert_eq!(Key::default(), Key::Absent);
    }

    #[test]
    fn accessors_match_variant() {
        assert_eq!(Key::from(7).as_int(), Some(7));
        assert_eq!(Key::from(7).as_str(), None);
        assert_eq!(Key::from("x").as_str(), Some("x"));
        assert_eq!(Key::from("x").as_int(), None);
        assert!(Key::Absent.is_absent());
    }

    #[test]
    fn display_uses_grammar_notation() {
        assert_eq!(Key::from(42).to_string(), "42");
        assert_eq!(Key::from("weight").to_string(), "'weight'");
        assert_eq!(Key::Absent.to_string(), "<absent>");
    }
}
