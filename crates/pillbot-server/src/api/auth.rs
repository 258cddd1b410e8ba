//! Account API endpoints and the bearer-token extractor.
//!
//! Registration and login both issue an opaque bearer token. Every
//! authenticated handler takes [`CurrentUser`], which resolves the
//! `Authorization: Bearer` header against the session store; handlers
//! never parse headers themselves.

use axum::extract::{FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use pillbot_core::{NewAccount, ProfilePatch, UserProfile};

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the auth router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/complete-setup", post(complete_setup))
}

// ============================================================================
// Bearer-token extractor
// ============================================================================

/// The authenticated caller, resolved from the bearer token.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    /// Id of the authenticated user.
    pub id: Uuid,
}

impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(missing_token)?;
        let token = header.strip_prefix("Bearer ").ok_or_else(missing_token)?;

        let guard = state.read().await;
        let user = guard.accounts.authenticate(token)?;
        Ok(Self { id: user.id })
    }
}

fn missing_token() -> ApiError {
    ApiError::Unauthorized {
        error_code: "missing_token".to_string(),
        message: "Authorization header with a bearer token is required".to_string(),
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Login request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "username": "amina42",
    "password": "correct horse"
}))]
pub struct LoginRequest {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

/// Profile plus the bearer token issued for this login.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthData {
    /// The account.
    pub user: UserProfile,
    /// Opaque bearer token for subsequent requests.
    pub token: String,
}

/// Response for register and login.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// What happened.
    #[schema(example = "Login successful")]
    pub message: String,
    /// The account and its token.
    pub data: AuthData,
}

/// Response carrying a profile.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProfileResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// The profile.
    pub data: UserProfile,
}

/// Request body for completing setup.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({ "connected_bot_id": "MD-BOT-07" }))]
pub struct CompleteSetupRequest {
    /// The dispenser the mobile app paired with; generated when absent.
    #[serde(default)]
    pub connected_bot_id: Option<String>,
}

/// Setup state after completing setup.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SetupData {
    /// Whether setup is complete.
    pub setup_complete: bool,
    /// Whether the app reported a pairing.
    pub bluetooth_connected: bool,
    /// The bound dispenser id.
    pub connected_bot_id: Option<String>,
}

/// Response for complete-setup.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SetupResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// What happened.
    #[schema(example = "Setup completed successfully")]
    pub message: String,
    /// Resulting setup state.
    pub data: SetupData,
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a new patient account.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    operation_id = "register",
    summary = "Register a new account",
    request_body = NewAccount,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Validation failed or username taken")
    )
)]
pub async fn register(
    State(state): State<SharedState>,
    Json(request): Json<NewAccount>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let mut guard = state.write().await;
    let (user, session) = guard.accounts.register(request)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            message: "User registered successfully".to_string(),
            data: AuthData {
                user,
                token: session.token,
            },
        }),
    ))
}

/// Log in with username and password.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    operation_id = "login",
    summary = "Log in",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid username or password")
    )
)]
pub async fn login(
    State(state): State<SharedState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let mut guard = state.write().await;
    let (user, session) = guard.accounts.login(&request.username, &request.password)?;

    Ok(Json(AuthResponse {
        success: true,
        message: "Login successful".to_string(),
        data: AuthData {
            user,
            token: session.token,
        },
    }))
}

/// Get the caller's profile.
#[utoipa::path(
    get,
    path = "/api/auth/profile",
    tag = "auth",
    operation_id = "getProfile",
    summary = "Get own profile",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Profile retrieved", body = ProfileResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_profile(
    user: CurrentUser,
    State(state): State<SharedState>,
) -> ApiResult<Json<ProfileResponse>> {
    let guard = state.read().await;
    let account = guard.accounts.account(user.id)?;

    Ok(Json(ProfileResponse {
        success: true,
        data: UserProfile::from(account),
    }))
}

/// Update the caller's profile.
#[utoipa::path(
    put,
    path = "/api/auth/profile",
    tag = "auth",
    operation_id = "updateProfile",
    summary = "Update own profile",
    security(("bearer" = [])),
    request_body = ProfilePatch,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn update_profile(
    user: CurrentUser,
    State(state): State<SharedState>,
    Json(patch): Json<ProfilePatch>,
) -> ApiResult<Json<ProfileResponse>> {
    let mut guard = state.write().await;
    let profile = guard.accounts.update_profile(user.id, patch)?;

    Ok(Json(ProfileResponse {
        success: true,
        data: profile,
    }))
}

/// Mark setup complete after the mobile app paired with a dispenser.
#[utoipa::path(
    post,
    path = "/api/auth/complete-setup",
    tag = "auth",
    operation_id = "completeSetup",
    summary = "Complete initial setup",
    security(("bearer" = [])),
    request_body = CompleteSetupRequest,
    responses(
        (status = 200, description = "Setup completed", body = SetupResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn complete_setup(
    user: CurrentUser,
    State(state): State<SharedState>,
    Json(request): Json<CompleteSetupRequest>,
) -> ApiResult<Json<SetupResponse>> {
    let mut guard = state.write().await;
    let profile = guard
        .accounts
        .complete_setup(user.id, request.connected_bot_id)?;

    Ok(Json(SetupResponse {
        success: true,
        message: "Setup completed successfully".to_string(),
        data: SetupData {
            setup_complete: profile.setup_complete,
            bluetooth_connected: profile.bluetooth_connected,
            connected_bot_id: profile.connected_bot_id,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_deserialization() {
        let json = r#"{"username": "amina42", "password": "hunter22"}"#;
        let request: LoginRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.username, "amina42");
    }

    #[test]
    fn test_setup_request_bot_id_is_optional() {
        let request: CompleteSetupRequest = serde_json::from_str("{}").unwrap();
        assert!(request.connected_bot_id.is_none());
    }
}
