use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse},
};
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    auth::{AuthUser, authenticate, expired_cookie, session_cookie},
    error::AppError,
    models::{Login, UserView, VerifyLogin},
    notify::render,
    state::AppState,
    utils::mask_email,
    verification::CODE_LENGTH,
};

/// First step: check the password and mail a sign-in code.
pub async fn request_code_handler(
    State(state): State<Arc<AppState>>,
    Json(login): Json<Login>,
) -> Result<impl IntoResponse, AppError> {
    let user = authenticate(&*state.repository, &login.username, &login.password).await?;

    if user.email.trim().is_empty() {
        return Err(AppError::MalformedPayload(
            "no email address on file for this account".to_string(),
        ));
    }

    let mailer = state
        .mailer
        .as_ref()
        .ok_or_else(|| AppError::internal("email transport is not configured"))?;

    let code = state.verification.issue_code(&user.email)?;
    let (subject, html) = render::verification_email(&user.username, &code);

    mailer
        .send_html(&user.email, &subject, html)
        .await
        .map_err(|e| {
            error!(username = %user.username, "Failed to send sign-in code: {e}");
            AppError::internal("failed to send verification code")
        })?;

    let masked = mask_email(&user.email);
    info!(username = %user.username, email = %masked, "Sign-in code sent");

    Ok(Json(json!({
        "message": "Verification code sent",
        "email": masked,
    })))
}

/// Second step: password again plus the mailed code, answered with a session.
pub async fn verify_login_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyLogin>,
) -> Result<impl IntoResponse, AppError> {
    let user = authenticate(&*state.repository, &payload.username, &payload.password).await?;

    let code = payload.code.trim();
    let well_formed = code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit());

    if !well_formed || !state.verification.redeem_code(&user.email, code) {
        warn!(username = %user.username, "Rejected sign-in code");
        return Err(AppError::InvalidCode);
    }

    let token = state.keys.issue(&user)?;
    info!(username = %user.username, "Signed in");

    Ok((
        AppendHeaders([(SET_COOKIE, session_cookie(&token))]),
        Json(json!({
            "user": UserView::from(&user),
            "token": token,
        })),
    ))
}

pub async fn logout_handler() -> impl IntoResponse {
    (
        AppendHeaders([(SET_COOKIE, expired_cookie())]),
        Json(json!({ "message": "Signed out" })),
    )
}

pub async fn me_handler(AuthUser(claims): AuthUser) -> impl IntoResponse {
    Json(claims)
}
