use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Authorization scope carried by a token.
///
/// Scopes are intentionally opaque strings at this layer; the permission
/// layer decides what a given combination of scopes may do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(Cow<'static, str>);

impl Scope {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Staff scope: any back-office or internal operator account.
    pub fn staff() -> Self {
        Self(Cow::Borrowed("Staff"))
    }

    /// Backoffice scope: staff accounts managed through the back-office app.
    pub fn backoffice() -> Self {
        Self(Cow::Borrowed("Backoffice"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
