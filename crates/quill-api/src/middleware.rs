use axum::{
    Extension,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{debug, warn};
use uuid::Uuid;

use quill_db::models::UserRow;
use quill_types::api::Claims;
use quill_types::models::Role;

use crate::error::ApiError;
use crate::policy;
use crate::state::{AppState, run_db};

/// The acting identity for one request, resolved from the bearer token.
/// Handlers receive it as `Extension<Session>`.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl Session {
    pub fn from_row(row: &UserRow) -> Result<Self, ApiError> {
        let user_id = row
            .id
            .parse()
            .map_err(|e| ApiError::internal("Corrupt user record", e))?;
        let role = row
            .role
            .parse()
            .map_err(|e| ApiError::internal("Corrupt user record", e))?;
        Ok(Self {
            user_id,
            name: row.name.clone(),
            email: row.email.clone(),
            role,
        })
    }
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        ApiError::Unauthorized("Not authorized, token failed".into())
    })
}

/// Validate the bearer token, load the user it names and reject blocked
/// accounts before any handler runs.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| ApiError::Unauthorized("Not authorized, no token".into()))?;

    let claims = decode_token(&state.auth.jwt_secret, bearer.token())?;

    let user_id = claims.sub.to_string();
    let user = run_db(&state, move |db| db.get_user_by_id(&user_id))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Not authorized, user not found".into()))?;

    if user.blocked {
        warn!("Blocked user {} presented a valid token", user.id);
        return Err(ApiError::Forbidden("Your account has been blocked".into()));
    }

    req.extensions_mut().insert(Session::from_row(&user)?);
    Ok(next.run(req).await)
}

/// Layered inside `require_auth` on the admin router.
pub async fn require_admin(
    Extension(session): Extension<Session>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    policy::ensure_admin(&session)?;
    Ok(next.run(req).await)
}
