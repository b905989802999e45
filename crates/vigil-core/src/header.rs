//! HTTP header representation shared by specs and results.

use serde::{Deserialize, Serialize};

/// One named header with its values.
///
/// Kept as a list rather than a map so repeated headers survive a
/// round trip through the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

impl Header {
    /// Create a header with a single value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: vec![value.into()],
        }
    }

    /// True if this header's name matches, ignoring ASCII case.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// First value, if any.
    pub fn first(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}
