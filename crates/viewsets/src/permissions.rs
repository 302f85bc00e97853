//! Permission gate: ordered capability checks evaluated before any handler
//! body runs.
//!
//! Each check first enforces its authentication requirement, then a boolean
//! predicate over the request context. Checks run strictly in declared
//! order; the first failure short-circuits the rest.

use std::sync::Arc;

use opsdesk_auth::Scope;

use crate::context::{RequestContext, is_safe_method};
use crate::errors::ApiError;

pub trait PermissionCheck: Send + Sync {
    fn requires_authentication(&self) -> bool {
        false
    }

    fn has_permission(&self, ctx: &RequestContext) -> bool;
}

/// Evaluate checks in order; first failure wins.
///
/// An authentication failure raises the deferred transport error when one is
/// attached to the context (e.g. an expired token), otherwise the generic
/// 401.
pub fn enforce(checks: &[Arc<dyn PermissionCheck>], ctx: &RequestContext) -> Result<(), ApiError> {
    for check in checks {
        if check.requires_authentication() && ctx.principal.is_none() {
            if let Some(deferred) = &ctx.auth_error {
                return Err(deferred.clone());
            }
            return Err(ApiError::authentication());
        }
        if !check.has_permission(ctx) {
            return Err(ApiError::authorization());
        }
    }
    Ok(())
}

/// Always passes.
pub struct AllowAny;

impl PermissionCheck for AllowAny {
    fn has_permission(&self, _ctx: &RequestContext) -> bool {
        true
    }
}

/// Passes only for safe/idempotent methods.
pub struct ReadOnly;

impl PermissionCheck for ReadOnly {
    fn has_permission(&self, ctx: &RequestContext) -> bool {
        is_safe_method(&ctx.method)
    }
}

/// Requires an authenticated principal.
pub struct IsAuthenticated;

impl PermissionCheck for IsAuthenticated {
    fn requires_authentication(&self) -> bool {
        true
    }

    fn has_permission(&self, _ctx: &RequestContext) -> bool {
        true
    }
}

/// Authenticated, active, and carrying the `Staff` scope.
pub struct IsStaffUser;

impl PermissionCheck for IsStaffUser {
    fn requires_authentication(&self) -> bool {
        true
    }

    fn has_permission(&self, ctx: &RequestContext) -> bool {
        ctx.principal
            .as_ref()
            .is_some_and(|p| p.is_active && p.is_staff())
    }
}

/// Staff scope intersected with the `Backoffice` scope.
pub struct IsBackofficeUser;

impl PermissionCheck for IsBackofficeUser {
    fn requires_authentication(&self) -> bool {
        true
    }

    fn has_permission(&self, ctx: &RequestContext) -> bool {
        ctx.principal.as_ref().is_some_and(|p| {
            p.is_active && p.is_staff() && p.has_scope(&Scope::backoffice())
        })
    }
}

/// Authenticated end user: holds no `Staff` scope.
pub struct IsUser;

impl PermissionCheck for IsUser {
    fn requires_authentication(&self) -> bool {
        true
    }

    fn has_permission(&self, ctx: &RequestContext) -> bool {
        ctx.principal.as_ref().is_some_and(|p| !p.is_staff())
    }
}

/// Safe methods for anyone; everything else requires authentication.
pub struct IsAuthenticatedOrReadOnly;

impl PermissionCheck for IsAuthenticatedOrReadOnly {
    fn has_permission(&self, ctx: &RequestContext) -> bool {
        is_safe_method(&ctx.method) || ctx.principal.is_some()
    }
}

/// Safe methods for anyone; writes only for authenticated end users.
pub struct IsUserOrReadOnly;

impl PermissionCheck for IsUserOrReadOnly {
    fn has_permission(&self, ctx: &RequestContext) -> bool {
        is_safe_method(&ctx.method)
            || ctx.principal.as_ref().is_some_and(|p| !p.is_staff())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use axum::http::Method;
    use opsdesk_auth::{Principal, PrincipalId};

    use crate::context::DeferredAuthError;

    use super::*;

    fn staff(scopes: Vec<Scope>) -> Principal {
        Principal {
            id: PrincipalId::new(),
            name: "Op".to_string(),
            scopes,
            is_active: true,
        }
    }

    fn ctx(method: Method, principal: Option<Principal>) -> RequestContext {
        RequestContext::new("list", method).with_principal(principal)
    }

    /// Records whether its predicate was ever evaluated.
    struct Tracer(Arc<AtomicBool>);

    impl PermissionCheck for Tracer {
        fn has_permission(&self, _ctx: &RequestContext) -> bool {
            self.0.store(true, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn first_failing_check_short_circuits_the_rest() {
        let touched = Arc::new(AtomicBool::new(false));
        let checks: Vec<Arc<dyn PermissionCheck>> = vec![
            Arc::new(IsStaffUser),
            Arc::new(Tracer(Arc::clone(&touched))),
        ];
        let result = enforce(&checks, &ctx(Method::GET, None));
        assert_eq!(result, Err(ApiError::authentication()));
        assert!(!touched.load(Ordering::SeqCst));
    }

    #[test]
    fn deferred_transport_error_outranks_generic_401() {
        let checks: Vec<Arc<dyn PermissionCheck>> = vec![Arc::new(IsAuthenticated)];
        let deferred = ApiError::Authentication("token has expired".to_string());
        let ctx = ctx(Method::GET, None)
            .with_auth_error(Some(DeferredAuthError(deferred.clone())));
        assert_eq!(enforce(&checks, &ctx), Err(deferred));
    }

    #[test]
    fn backoffice_check_is_a_scope_intersection() {
        let checks: Vec<Arc<dyn PermissionCheck>> = vec![Arc::new(IsBackofficeUser)];

        let only_staff = ctx(Method::GET, Some(staff(vec![Scope::staff()])));
        assert_eq!(enforce(&checks, &only_staff), Err(ApiError::authorization()));

        let backoffice = ctx(
            Method::GET,
            Some(staff(vec![Scope::staff(), Scope::backoffice()])),
        );
        assert_eq!(enforce(&checks, &backoffice), Ok(()));
    }

    #[test]
    fn read_only_allows_safe_methods_only() {
        let checks: Vec<Arc<dyn PermissionCheck>> = vec![Arc::new(ReadOnly)];
        assert_eq!(enforce(&checks, &ctx(Method::GET, None)), Ok(()));
        assert_eq!(
            enforce(&checks, &ctx(Method::DELETE, None)),
            Err(ApiError::authorization())
        );
    }

    #[test]
    fn is_user_rejects_staff_accounts() {
        let checks: Vec<Arc<dyn PermissionCheck>> = vec![Arc::new(IsUser)];
        let end_user = ctx(Method::GET, Some(staff(vec![])));
        assert_eq!(enforce(&checks, &end_user), Ok(()));
        let staff_user = ctx(Method::GET, Some(staff(vec![Scope::staff()])));
        assert_eq!(enforce(&checks, &staff_user), Err(ApiError::authorization()));
    }
}
