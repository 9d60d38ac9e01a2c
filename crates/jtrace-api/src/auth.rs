use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, extract::State};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::info;

use jtrace_db::models::{ProfileChanges, Registration};
use jtrace_types::api::{
    ChangePasswordRequest, Claims, LoginForm, RegisterRequest, UpdateProfileRequest,
};
use jtrace_types::models::{TokenResponse, UserProfile};

use crate::envelope::ok;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiForm, ApiJson};
use crate::middleware::CurrentUser;
use crate::render;
use crate::state::{AppState, run_db};

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn create_token(
    secret: &str,
    user_id: i64,
    username: &str,
    expires_minutes: i64,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::minutes(expires_minutes)).timestamp()
            as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Claims of a well-formed, unexpired token signed with `secret`.
pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<UserProfile> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();

    let password_hash = hash_password(&req.password)?;

    let registration =
        run_db(&state, move |db| db.register_user(&username, &email, &password_hash)).await?;
    let user = match registration {
        Registration::Created(user) => user,
        Registration::UsernameTaken => {
            return Err(ApiError::Rejected("Username already exists".into()));
        }
        Registration::EmailTaken => {
            return Err(ApiError::Rejected("Email already registered".into()));
        }
    };

    info!("Registered user {} ({})", user.username, user.id);
    Ok(ok(render::user_profile(&user), "Registered"))
}

/// POST /api/auth/login: form-encoded `username` / `password`.
pub async fn login(
    State(state): State<AppState>,
    ApiForm(form): ApiForm<LoginForm>,
) -> ApiResult<TokenResponse> {
    let username = form.username.clone();
    let user = run_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .filter(|user| verify_password(&form.password, &user.password_hash))
        .ok_or_else(|| ApiError::Unauthorized("Incorrect username or password".into()))?;

    if !user.is_active() {
        return Err(ApiError::Unauthorized("Account disabled".into()));
    }

    let token = create_token(
        &state.config.jwt.secret,
        user.id,
        &user.username,
        state.config.jwt.access_token_expires_minutes,
    )?;
    state.tokens.store(&user.username, &token);

    let user_id = user.id;
    run_db(&state, move |db| db.record_login(user_id)).await?;

    info!("User {} logged in", user.username);
    Ok(ok(
        TokenResponse {
            access_token: token,
            token_type: "bearer".into(),
        },
        "Logged in",
    ))
}

/// GET /api/auth/me
pub async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> ApiResult<UserProfile> {
    Ok(ok(render::user_profile(&user), ""))
}

/// PUT /api/auth/me
pub async fn update_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<UserProfile> {
    let changes = ProfileChanges {
        nickname: req.nickname,
        bio: req.bio,
        gender: req.gender,
        avatar: req.avatar,
    };

    let user_id = user.id;
    let updated = run_db(&state, move |db| {
        db.update_profile(user_id, &changes)?;
        db.get_user_by_id(user_id)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(ok(render::user_profile(&updated), "Profile updated"))
}

/// POST /api/auth/password: also revokes the current token.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<()> {
    if !verify_password(&req.old_password, &user.password_hash) {
        return Err(ApiError::Rejected("Old password is incorrect".into()));
    }

    let password_hash = hash_password(&req.new_password)?;
    let user_id = user.id;
    run_db(&state, move |db| db.update_password(user_id, &password_hash)).await?;
    state.tokens.revoke(&user.username);

    info!("User {} changed password", user.username);
    Ok(ok((), "Password changed, please log in again"))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<()> {
    state.tokens.revoke(&user.username);
    Ok(ok((), "Logged out"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn token_carries_user() {
        let token = create_token("jwt-secret", 7, "alice", 5).unwrap();
        let claims = decode_token("jwt-secret", &token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "alice");
        assert!(decode_token("other-secret", &token).is_none());

        let expired = create_token("jwt-secret", 7, "alice", -10).unwrap();
        assert!(decode_token("jwt-secret", &expired).is_none());
    }
}
