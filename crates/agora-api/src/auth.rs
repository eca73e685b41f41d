//! # Authentication & Authorization Middleware
//!
//! Bearer token middleware with role-based access control.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {role}:{tenant_id}:{caller_id}:{secret}
//! ```
//!
//! The secret is compared in constant time against the configured
//! `AUTH_TOKEN`. Role, tenant and caller are taken from the token as the
//! identity provider's assertion.
//!
//! ## CallerIdentity
//!
//! Every authenticated request gets a [`CallerIdentity`] injected into the
//! request extensions. Handlers extract it via the `FromRequestParts` impl.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use agora_core::{TenantId, UserId};
use agora_ledger::Actor;

use crate::error::{AppError, ErrorBody, ErrorDetail};

/// Tenant assigned to every request when authentication is disabled.
pub const DEFAULT_TENANT: &str = "default";

/// Caller assigned to every request when authentication is disabled.
pub const LOCAL_ADMIN: &str = "local-admin";

// ── Role ────────────────────────────────────────────────────────────────────

/// Roles within a tenant, ordered by privilege level.
///
/// `Citizen < Official < TenantAdmin`, so access checks are a single `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Votes, submits ideas, reads results.
    Citizen,
    /// Creates polls and consultations and drives their lifecycle.
    Official,
    /// Full access within the tenant.
    TenantAdmin,
}

impl Role {
    /// Return the string representation of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Official => "official",
            Self::TenantAdmin => "tenant_admin",
        }
    }

    fn parse(s: &str) -> Result<Self, String> {
        match s {
            "citizen" => Ok(Self::Citizen),
            "official" => Ok(Self::Official),
            "tenant_admin" => Ok(Self::TenantAdmin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// The authenticated caller context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// The caller's user id.
    pub caller_id: UserId,
    /// The caller's role in `tenant_id`.
    pub role: Role,
    /// The tenant every lookup is scoped to.
    pub tenant_id: TenantId,
}

impl CallerIdentity {
    /// Check if the caller has at least the given minimum role.
    pub fn has_role(&self, minimum: Role) -> bool {
        self.role >= minimum
    }

    /// The ledger's view of this caller.
    pub fn actor(&self) -> Actor {
        Actor::new(self.tenant_id.clone(), self.caller_id.clone())
    }

    /// The identity injected when authentication is disabled.
    fn local_admin() -> Result<Self, String> {
        Ok(Self {
            caller_id: UserId::new(LOCAL_ADMIN).map_err(|e| e.to_string())?,
            role: Role::TenantAdmin,
            tenant_id: TenantId::new(DEFAULT_TENANT).map_err(|e| e.to_string())?,
        })
    }
}

/// Extracts the identity that the auth middleware injected into extensions.
/// Returns 401 if no identity is present.
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Check that the caller has at least the required role.
/// Returns 403 Forbidden if the caller's role is insufficient.
pub fn require_role(caller: &CallerIdentity, minimum: Role) -> Result<(), AppError> {
    if caller.has_role(minimum) {
        Ok(())
    } else {
        tracing::debug!(
            caller_id = %caller.caller_id,
            required = minimum.as_str(),
            actual = caller.role.as_str(),
            "role check failed"
        );
        Err(AppError::Forbidden(format!(
            "role '{}' required, caller has '{}'",
            minimum.as_str(),
            caller.role.as_str()
        )))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token value.
#[derive(Clone)]
pub struct AuthConfig {
    /// Shared bearer secret; `None` disables authentication.
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer secrets. A length mismatch still
/// performs a comparison so timing does not reveal the expected length.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse a `{role}:{tenant_id}:{caller_id}:{secret}` token.
///
/// The secret is the last field and may itself contain `:`.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(4, ':').collect();
    let [role, tenant, caller, secret] = parts.as_slice() else {
        return Err("invalid token format, expected {role}:{tenant_id}:{caller_id}:{secret}".into());
    };

    if !constant_time_token_eq(secret, expected_secret) {
        return Err("invalid bearer token".into());
    }

    Ok(CallerIdentity {
        role: Role::parse(role)?,
        tenant_id: TenantId::new(*tenant).map_err(|e| format!("invalid tenant_id: {e}"))?,
        caller_id: UserId::new(*caller).map_err(|e| format!("invalid caller_id: {e}"))?,
    })
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the Bearer token and inject the [`CallerIdentity`].
///
/// When `AuthConfig.token` is `None`, every request runs as a
/// `tenant_admin` of the `default` tenant.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected_token = request.extensions().get::<AuthConfig>().cloned();

    match expected_token {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header.map(|h| h.strip_prefix("Bearer ")) {
                Some(Some(provided)) => match parse_bearer_token(provided, expected) {
                    Ok(identity) => {
                        request.extensions_mut().insert(identity);
                        next.run(request).await
                    }
                    Err(msg) => {
                        tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                        unauthorized_response(&msg)
                    }
                },
                Some(None) => {
                    tracing::warn!("authentication failed: non-Bearer authorization scheme");
                    unauthorized_response("authorization header must use Bearer scheme")
                }
                None => {
                    tracing::warn!("authentication failed: missing authorization header");
                    unauthorized_response("missing authorization header")
                }
            }
        }
        _ => match CallerIdentity::local_admin() {
            Ok(identity) => {
                request.extensions_mut().insert(identity);
                next.run(request).await
            }
            Err(msg) => AppError::Internal(msg).into_response(),
        },
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
