use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};
use uuid::Uuid;

use quill_db::models::NewUser;
use quill_types::api::{
    Claims, LoginRequest, LoginResponse, MeResponse, RegisterRequest, RegisterResponse,
};

use crate::error::{ApiError, ApiJson, ApiResult};
use crate::middleware::Session;
use crate::state::{AppState, AuthSettings, run_db};
use crate::views;

const MAX_NAME_CHARS: usize = 64;
const MAX_EMAIL_LEN: usize = 254;
pub const MIN_PASSWORD_LEN: usize = 6;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn validate_registration(name: &str, email: &str, password: &str) -> ApiResult<()> {
    let name_len = name.chars().count();
    if name_len == 0 || name_len > MAX_NAME_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Name must be between 1 and {} characters",
            MAX_NAME_CHARS
        )));
    }
    if !email.contains('@') || email.len() > MAX_EMAIL_LEN {
        return Err(ApiError::BadRequest("A valid email is required".into()));
    }
    validate_password(password)
}

pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal("Failed to hash password", anyhow::anyhow!("{}", e)))
}

/// `Ok(false)` on mismatch; `Err` only if the stored hash is unreadable.
pub fn verify_password(password: &str, stored_hash: &str) -> ApiResult<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ApiError::internal("Corrupt password hash", anyhow::anyhow!("{}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn create_token(settings: &AuthSettings, user_id: Uuid) -> ApiResult<String> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: (now + settings.token_ttl).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::internal("Failed to issue token", e))
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.trim().to_string();
    let email = normalize_email(&req.email);
    validate_registration(&name, &email, &req.password)?;

    let lookup = email.clone();
    if run_db(&state, move |db| db.get_user_by_email(&lookup))
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4().to_string();

    let new_user = NewUser {
        id: user_id.clone(),
        name,
        email,
        password_hash,
    };
    let created = run_db(&state, move |db| {
        match db.create_user(&new_user) {
            // lost a race with a concurrent registration
            Err(e) if quill_db::is_unique_violation(&e) => return Ok(None),
            other => other?,
        }
        db.get_user_by_id(&new_user.id)
    })
    .await?
    .ok_or_else(|| ApiError::Conflict("User already exists".into()))?;

    info!("Registered user {}", user_id);
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".into(),
            user: views::user(&created),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let email = normalize_email(&req.email);
    let user = run_db(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".into()))?;

    if !verify_password(&req.password, &user.password)? {
        return Err(ApiError::Unauthorized("Invalid email or password".into()));
    }

    if user.blocked {
        warn!("Blocked user {} attempted to log in", user.id);
        return Err(ApiError::Forbidden("Your account has been blocked".into()));
    }

    let session = Session::from_row(&user)?;
    let token = create_token(&state.auth, session.user_id)?;

    Ok(Json(LoginResponse {
        token,
        user: views::user(&user),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<MeResponse>> {
    let id = session.user_id.to_string();
    let user = run_db(&state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(MeResponse {
        user: views::user(&user),
    }))
}
