use core::fmt;
use serde::{Deserialize, Serialize};

use crate::dims::NOT_APPLICABLE;

/// One value of a categorical dimension.
///
/// Years, vintages and lifetime years are integers; everything else
/// (geographies, sectors, category labels) is text. Integers sort before
/// text so mixed domains still have a total order.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Text(String),
}

impl Key {
    pub fn text(value: impl Into<String>) -> Self {
        Key::Text(value.into())
    }

    /// The sentinel injected into dimensions a dataset does not carry.
    pub fn not_applicable() -> Self {
        Key::Text(NOT_APPLICABLE.to_string())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Key::Int(v) => Some(*v),
            Key::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Key::Int(_) => None,
            Key::Text(s) => Some(s),
        }
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Key::Int(v as i64)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Text(v.to_string())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::Text(v)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{v}"),
            Key::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{v}"),
            Key::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Build a key tuple from heterogeneous literals: `key!["geoA", 2020]`.
#[macro_export]
macro_rules! key {
    ($($v:expr),* $(,)?) => {
        vec![$($crate::Key::from($v)),*]
    };
}
