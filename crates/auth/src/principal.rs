use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Claims, Scope};

/// Identity of an authenticated principal (staff member, end user, service).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// A fully resolved, authenticated principal for permission decisions.
///
/// Construction is decoupled from transport: the API middleware derives one
/// from verified token claims; tests construct them directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: PrincipalId,
    pub name: String,
    pub scopes: Vec<Scope>,
    pub is_active: bool,
}

impl Principal {
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name.clone(),
            scopes: claims.scopes.clone(),
            is_active: claims.is_active,
        }
    }

    pub fn has_scope(&self, scope: &Scope) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Staff accounts carry the `Staff` scope; end-user accounts never do.
    pub fn is_staff(&self) -> bool {
        self.has_scope(&Scope::staff())
    }
}
