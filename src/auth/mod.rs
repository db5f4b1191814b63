/*!
 * # Authentication and Authorization Module
 *
 * Bearer-token authentication for the marketplace API.
 *
 * - JWT (HS256) access tokens carrying the account id, role and admin level
 * - Employee sessions carry the owner's id plus the employee's capability set
 * - Argon2 password hashing
 *
 * Tokens are verified per request and never stored server-side.
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::entities::{employee, user, user::Role};

mod password;
mod rbac;

pub use password::{hash_password, verify_password};
pub use rbac::*;

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,      // Subject (account id; the owner's id for employees)
    pub user_id: i32,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_level: Option<i32>,
    pub iat: i64,         // Issued at time
    pub exp: i64,         // Expiration time
    #[serde(default)]
    pub is_employee: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<i32>,
    #[serde(default)]
    pub can_manage_inventory: bool,
    #[serde(default)]
    pub can_manage_orders: bool,
    #[serde(default)]
    pub can_chat: bool,
    #[serde(default)]
    pub can_change_status: bool,
    #[serde(default)]
    pub can_rate: bool,
}

/// Employee part of an authenticated session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmployeeScope {
    pub employee_id: i32,
    pub capabilities: Capabilities,
}

/// Authenticated caller extracted from the JWT token.
/// For employee sessions `user_id` is the owning account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i32,
    pub email: String,
    pub role: Role,
    pub admin_level: Option<i32>,
    pub employee: Option<EmployeeScope>,
}

impl AuthUser {
    pub fn is_employee(&self) -> bool {
        self.employee.is_some()
    }

    pub fn employee_id(&self) -> Option<i32> {
        self.employee.as_ref().map(|e| e.employee_id)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        let employee = match (claims.is_employee, claims.employee_id) {
            (true, Some(employee_id)) => Some(EmployeeScope {
                employee_id,
                capabilities: Capabilities {
                    can_manage_inventory: claims.can_manage_inventory,
                    can_manage_orders: claims.can_manage_orders,
                    can_chat: claims.can_chat,
                    can_change_status: claims.can_change_status,
                    can_rate: claims.can_rate,
                },
            }),
            _ => None,
        };
        AuthUser {
            user_id: claims.user_id,
            email: claims.email,
            role: claims.role,
            admin_level: claims.admin_level,
            employee,
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, token_expiration: Duration) -> Self {
        Self {
            jwt_secret,
            token_expiration,
        }
    }
}

/// Issues and validates access tokens.
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    fn base_claims(&self, account: &user::Model) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub: account.id.to_string(),
            user_id: account.id,
            email: account.email.clone(),
            role: account.role,
            admin_level: account.admin_level,
            iat: now,
            exp: now + self.config.token_expiration.as_secs() as i64,
            is_employee: false,
            employee_id: None,
            can_manage_inventory: false,
            can_manage_orders: false,
            can_chat: false,
            can_change_status: false,
            can_rate: false,
        }
    }

    /// Token for a supplier, store or admin account.
    pub fn generate_token(&self, account: &user::Model) -> Result<String, AuthError> {
        self.encode_claims(&self.base_claims(account))
    }

    /// Token for an employee acting on behalf of `owner`.
    pub fn generate_employee_token(
        &self,
        staff: &employee::Model,
        owner: &user::Model,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            is_employee: true,
            employee_id: Some(staff.id),
            can_manage_inventory: staff.can_manage_inventory,
            can_manage_orders: staff.can_manage_orders,
            can_chat: staff.can_chat,
            can_change_status: staff.can_change_status,
            can_rate: staff.can_rate,
            ..self.base_claims(owner)
        };
        self.encode_claims(&claims)
    }

    pub fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header required")]
    MissingAuth,

    #[error("invalid authorization header format")]
    InvalidHeader,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::TokenCreation(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "authentication failure");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(serde_json::json!({
            "error": message,
            "request_id": crate::tracing::current_request_id().map(|r| r.0),
        }));

        (status, body).into_response()
    }
}

impl From<AuthError> for crate::errors::ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenCreation(msg) => crate::errors::ServiceError::JwtError(msg),
            AuthError::InternalError(msg) => crate::errors::ServiceError::InternalError(msg),
            other => crate::errors::ServiceError::Unauthorized(other.to_string()),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Authentication middleware that extracts and validates bearer tokens.
///
/// Expects an `Arc<AuthService>` in the request extensions. The resolved
/// `AuthUser` is attached to both the request and the response so outer
/// layers (audit logging) can see who made the call.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return AuthError::InternalError("authentication service not available".into())
                .into_response();
        }
    };

    match extract_auth_from_headers(request.headers(), &auth_service) {
        Ok(user) => {
            debug!(user_id = user.user_id, role = %user.role, "authenticated request");
            request.extensions_mut().insert(user.clone());
            let mut response = next.run(request).await;
            response.extensions_mut().insert(user);
            response
        }
        Err(e) => e.into_response(),
    }
}

/// Extract authentication info from request headers
fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuth)?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidHeader)?;

    auth_service.validate_token(token).map(AuthUser::from)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn service() -> AuthService {
        AuthService::new(AuthConfig::new(
            "unit_test_secret_that_is_long_enough_1234".into(),
            Duration::from_secs(3600),
        ))
    }

    fn account(role: Role) -> user::Model {
        let now = Utc::now();
        user::Model {
            id: 42,
            email: "owner@example.com".into(),
            password_hash: String::new(),
            name: "Owner".into(),
            phone: "0917".into(),
            role,
            admin_level: None,
            address: None,
            latitude: None,
            longitude: None,
            logo_url: None,
            banner_url: None,
            facebook: None,
            instagram: None,
            twitter: None,
            linkedin: None,
            youtube: None,
            tiktok: None,
            website: None,
            opening_time: None,
            closing_time: None,
            closed_days_of_week: None,
            is_open: true,
            last_login: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn user_token_round_trip() {
        let svc = service();
        let token = svc.generate_token(&account(Role::Supplier)).unwrap();
        let user = AuthUser::from(svc.validate_token(&token).unwrap());
        assert_eq!(user.user_id, 42);
        assert_eq!(user.role, Role::Supplier);
        assert!(!user.is_employee());
    }

    #[test]
    fn employee_token_carries_owner_and_capabilities() {
        let svc = service();
        let now = Utc::now();
        let staff = employee::Model {
            id: 5,
            owner_user_id: 42,
            username: "clerk".into(),
            password_hash: String::new(),
            name: "Clerk".into(),
            phone: None,
            role: None,
            can_manage_inventory: false,
            can_manage_orders: true,
            can_chat: true,
            can_change_status: false,
            can_rate: false,
            status_active: true,
            profile_pic_url: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let token = svc
            .generate_employee_token(&staff, &account(Role::Store))
            .unwrap();
        let user = AuthUser::from(svc.validate_token(&token).unwrap());
        assert_eq!(user.user_id, 42);
        assert_eq!(user.employee_id(), Some(5));
        assert!(user.has_capability(Capability::ManageOrders));
        assert!(!user.has_capability(Capability::ManageInventory));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let svc = service();
        let mut claims = svc.base_claims(&account(Role::Store));
        claims.iat -= 10_000;
        claims.exp = Utc::now().timestamp() - 3_600;
        let token = svc.encode_claims(&claims).unwrap();
        assert!(matches!(
            svc.validate_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let other = AuthService::new(AuthConfig::new(
            "a_completely_different_secret_value_987".into(),
            Duration::from_secs(3600),
        ));
        let token = other.generate_token(&account(Role::Store)).unwrap();
        assert!(matches!(
            service().validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn header_parsing_errors() {
        let svc = service();
        let mut headers = HeaderMap::new();
        assert!(matches!(
            extract_auth_from_headers(&headers, &svc),
            Err(AuthError::MissingAuth)
        ));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        let err = extract_auth_from_headers(&headers, &svc).unwrap_err();
        assert_eq!(err.to_string(), "invalid authorization header format");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        let err = extract_auth_from_headers(&headers, &svc).unwrap_err();
        assert_eq!(err.to_string(), "invalid token");
    }
}
