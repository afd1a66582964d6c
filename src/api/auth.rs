//! Registration, login and per-request authentication.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::crypto::{hash_password, verify_password, SessionKeys};
use crate::db::{
    actions, resource_types, ApprovalStatus, LoginRequest, LoginResponse, NewUser,
    RegisterRequest, RegisterResponse, Role, User, UserResponse,
};
use crate::AppState;

use super::access::authorize;
use super::audit::{audit_log, ClientIp};
use super::error::{ApiError, ErrorCode, ValidationErrorBuilder};
use super::extract::AppJson;
use super::metrics;
use super::validation::{validate_email, validate_name, validate_password};

/// Identity of the caller, rebuilt from the user store on every request
#[derive(Debug, Clone)]
pub struct UserContext {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl From<&User> for UserContext {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// Create a pending account
pub async fn register_user(db: &SqlitePool, req: &RegisterRequest) -> Result<User, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("email", validate_email(&req.email))
        .check("password", validate_password(&req.password))
        .check("name", validate_name(&req.name));
    errors.finish()?;

    if User::find_by_email(db, &req.email).await?.is_some() {
        return Err(ApiError::new(
            ErrorCode::DuplicateEmail,
            "Email is already registered",
        ));
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to hash password")
    })?;

    // The unique index still catches a concurrent registration of the same email
    let user = User::create(
        db,
        NewUser {
            email: req.email.trim(),
            password_hash: &password_hash,
            name: req.name.trim(),
            role: Role::User,
            approval_status: ApprovalStatus::Pending,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "User registered, awaiting approval");
    Ok(user)
}

/// Check credentials and issue a session token.
///
/// The approval status is checked before the password, so an account that is
/// not approved is always refused with its status.
pub async fn login_user(
    db: &SqlitePool,
    keys: &SessionKeys,
    req: &LoginRequest,
) -> Result<(User, String), ApiError> {
    let user = User::find_by_email(db, &req.email)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    if user.approval_status != ApprovalStatus::Approved {
        return Err(ApiError::account_not_approved(user.approval_status));
    }
    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::invalid_credentials());
    }

    User::touch_last_login(db, &user.id).await?;
    let user = User::find_by_id(db, &user.id)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;
    let token = keys.issue(&user.id, &user.email, user.role)?;
    Ok((user, token))
}

/// Verify a session token and load the current state of its user.
///
/// The role comes from the user record, not from the token, so demotions and
/// revocations apply on the next request.
pub async fn authenticate(
    db: &SqlitePool,
    keys: &SessionKeys,
    token: &str,
) -> Result<UserContext, ApiError> {
    let claims = keys.verify(token)?;

    let user = User::find_by_id(db, &claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;
    if user.approval_status != ApprovalStatus::Approved {
        return Err(ApiError::unauthorized("Account is not approved"));
    }

    Ok(UserContext::from(&user))
}

/// Extract the bearer token from request headers
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get("Authorization")?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Any approved user
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserContext);

/// An approved administrator
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserContext);

async fn gate(parts: &Parts, state: &AppState, required: Role) -> Result<UserContext, ApiError> {
    let token = bearer_token(&parts.headers)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
    let user = authenticate(&state.db, &state.sessions, token).await?;
    authorize(&user, required)?;
    Ok(user)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        gate(parts, state, Role::User).await.map(AuthUser)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        gate(parts, state, Role::Admin).await.map(AdminUser)
    }
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    ip: ClientIp,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let user = register_user(&state.db, &req).await?;

    audit_log(
        &state,
        actions::AUTH_REGISTER,
        resource_types::USER,
        Some(&user.id),
        Some(&user.email),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful. Your account is pending approval by an administrator."
                .to_string(),
            user: UserResponse::from(user),
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ip: ClientIp,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    match login_user(&state.db, &state.sessions, &req).await {
        Ok((user, token)) => {
            metrics::record_login("success");
            audit_log(
                &state,
                actions::AUTH_LOGIN,
                resource_types::USER,
                Some(&user.id),
                Some(&user.email),
                Some(&user.id),
                ip.as_deref(),
                None,
            )
            .await;
            Ok(Json(LoginResponse {
                token,
                user: UserResponse::from(user),
            }))
        }
        Err(err) => {
            metrics::record_login(err.code().as_str());
            audit_log(
                &state,
                actions::AUTH_LOGIN_FAILED,
                resource_types::USER,
                None,
                Some(req.email.trim()),
                None,
                ip.as_deref(),
                Some(serde_json::json!({ "reason": err.code().as_str() })),
            )
            .await;
            Err(err)
        }
    }
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = User::find_by_id(&state.db, &user.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;
    Ok(Json(UserResponse::from(user)))
}

/// Create the configured bootstrap administrator if its email is unknown
pub async fn ensure_admin_user(db: &SqlitePool, config: &AuthConfig) -> anyhow::Result<()> {
    let (email, password) = match (&config.admin_email, &config.admin_password) {
        (Some(email), Some(password)) => (email, password),
        _ => {
            if User::count_active_admins(db).await? == 0 {
                tracing::warn!(
                    "No administrator exists; set auth.admin_email and auth.admin_password to create one"
                );
            }
            return Ok(());
        }
    };

    if let Some(existing) = User::find_by_email(db, email).await? {
        if existing.role != Role::Admin || existing.approval_status != ApprovalStatus::Approved {
            tracing::warn!(
                email = %existing.email,
                "Configured admin email belongs to an account that is not an approved admin"
            );
        }
        return Ok(());
    }

    validate_email(email).map_err(|e| anyhow::anyhow!("auth.admin_email: {}", e))?;
    validate_password(password).map_err(|e| anyhow::anyhow!("auth.admin_password: {}", e))?;

    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?;
    let user = User::create(
        db,
        NewUser {
            email: email.trim(),
            password_hash: &password_hash,
            name: config.admin_name.trim(),
            role: Role::Admin,
            approval_status: ApprovalStatus::Approved,
        },
    )
    .await?;

    tracing::info!(email = %user.email, "Created bootstrap administrator");
    Ok(())
}
