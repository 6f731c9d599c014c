//! Top-level resource namespaces.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two resource classes the gateway serves.
///
/// This is a closed enumeration: every namespace is backed by its own
/// storage backend and coordinator pool, configured at start-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Attachments,
    Backups,
}

impl Namespace {
    /// All namespaces, in a stable order.
    pub const ALL: [Namespace; 2] = [Namespace::Attachments, Namespace::Backups];

    /// Look up a namespace by its URL prefix. Unknown prefixes yield `None`.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "attachments" => Some(Self::Attachments),
            "backups" => Some(Self::Backups),
            _ => None,
        }
    }

    /// The URL prefix and namespace name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attachments => "attachments",
            Self::Backups => "backups",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
