use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, SignupRequest},
        middleware::{CurrentUser, REMEMBER_COOKIE},
        token,
    },
    error::{ModelError, INVALID_CREDENTIALS},
    models::user::User,
    state::AppState,
};

type Rejection = (StatusCode, String);

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/signup", post(signup))
        .route("/api/login", post(login))
        .route("/api/auth", get(current_user))
}

/// Routes that need an identity; the caller layers the require gate.
pub fn session_routes() -> Router<AppState> {
    Router::new().route("/api/logout", post(logout))
}

/// `Set-Cookie` value for the remember token. `Secure` is only added in
/// prod so plain-http development keeps working.
fn remember_cookie(value: &str, secure: bool) -> Result<HeaderValue, Rejection> {
    set_cookie(format!("{REMEMBER_COOKIE}={value}"), secure)
}

fn cleared_cookie(secure: bool) -> Result<HeaderValue, Rejection> {
    set_cookie(format!("{REMEMBER_COOKIE}=; Max-Age=0"), secure)
}

fn set_cookie(mut cookie: String, secure: bool) -> Result<HeaderValue, Rejection> {
    cookie.push_str("; HttpOnly; SameSite=Lax; Path=/");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| {
        error!(error = %e, "remember cookie not representable");
        (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong".into())
    })
}

/// Makes sure the user holds a remember token, then issues the cookie and
/// a signed token.
async fn sign_in(state: &AppState, user: &mut User) -> Result<(HeaderMap, Json<AuthResponse>), Rejection> {
    if user.remember.is_empty() {
        user.remember = token::remember_token().map_err(|e| ModelError::from(e).into_rejection())?;
        state.users.update(user).await.map_err(ModelError::into_rejection)?;
    }

    let token = state
        .keys
        .sign(user.id)
        .map_err(|e| ModelError::from(e).into_rejection())?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, remember_cookie(&user.remember, state.config.is_prod())?);

    Ok((
        headers,
        Json(AuthResponse {
            token,
            user: PublicUser::from(&*user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), Rejection> {
    let mut user = User {
        name: payload.name,
        email: payload.email,
        password: payload.password,
        ..User::default()
    };

    if let Err(e) = state.users.create(&mut user).await {
        warn!(error = %e, "signup rejected");
        return Err(e.into_rejection());
    }

    info!(user_id = user.id, "user signed up");
    sign_in(&state, &mut user).await
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), Rejection> {
    let mut user = match state.users.authenticate(&payload.email, &payload.password).await {
        Ok(u) => u,
        Err(ModelError::NotFound) => {
            warn!("login unknown email");
            return Err((StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS.into()));
        }
        Err(ModelError::PasswordIncorrect) => {
            warn!("login invalid password");
            return Err((StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS.into()));
        }
        Err(e) => return Err(e.into_rejection()),
    };

    let response = sign_in(&state, &mut user).await?;
    info!(user_id = user.id, "user logged in");
    Ok(response)
}

/// Rotates the remember token so every outstanding cookie stops resolving,
/// and tells the client to drop its copy.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(mut user): CurrentUser,
) -> Result<(StatusCode, HeaderMap), Rejection> {
    user.remember = token::remember_token().map_err(|e| ModelError::from(e).into_rejection())?;
    state.users.update(&mut user).await.map_err(ModelError::into_rejection)?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, cleared_cookie(state.config.is_prod())?);
    info!(user_id = user.id, "user logged out");
    Ok((StatusCode::NO_CONTENT, headers))
}

#[instrument(skip_all)]
pub async fn current_user(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(PublicUser::from(&user))
}
