//! Capability usernames.
//!
//! A username has the grammar `[<permission> "$"] <subject>`, where the
//! subject is usually `<namespace>/<entity>`. The validator signs the whole
//! string, so the permission scope cannot be forged once the credential
//! checks out.

use std::fmt;

/// Separator between the permission scope and the subject.
pub const SCOPE_SEPARATOR: char = '$';

/// Permission scopes a route can demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Read access to a backup subdirectory.
    Read,
    /// Write access to backup uploads.
    Write,
}

impl Permission {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A capability username parsed once at the authentication boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capability {
    raw: String,
    scope: Option<String>,
    subject: String,
}

impl Capability {
    /// Split a username at the first `$`.
    ///
    /// Everything after the first separator is the subject, including any
    /// further `$` characters.
    pub fn parse(username: &str) -> Self {
        match username.split_once(SCOPE_SEPARATOR) {
            Some((scope, subject)) => Self {
                raw: username.to_string(),
                scope: Some(scope.to_string()),
                subject: subject.to_string(),
            },
            None => Self {
                raw: username.to_string(),
                scope: None,
                subject: username.to_string(),
            },
        }
    }

    /// The username exactly as presented.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The claimed permission segment, if any.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Whether the claimed scope names `permission`.
    pub fn grants(&self, permission: Permission) -> bool {
        self.scope() == Some(permission.as_str())
    }

    /// The username with the permission segment removed.
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
