//! Operation descriptors reported by `list_operations`.

use serde::{Deserialize, Serialize};

/// One verb the iTop REST API reports supporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation verb, e.g. `core/get`.
    pub verb: String,

    /// Extension that provides the operation.
    #[serde(default)]
    pub extension: Option<String>,

    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
}

impl Operation {
    /// Returns the description if present, otherwise the verb.
    pub fn display_description(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.verb)
    }
}
