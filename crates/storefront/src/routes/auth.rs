//! Account route handlers: sign-up, sign-in and password reset.

use axum::{
    Form,
    extract::{FromRequest, Request, State},
    http::{StatusCode, header::CONTENT_TYPE},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use emporium_core::Role;

use crate::error::{AppError, Result};
use crate::extract::Json;
use crate::routes::Message;
use crate::services::auth::Signup;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

/// Sign-in credentials, from either a JSON body or an OAuth2 password form.
#[derive(Debug)]
pub struct SigninCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
struct JsonSignin {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct FormSignin {
    username: String,
    password: String,
}

impl<S: Send + Sync> FromRequest<S> for SigninCredentials {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(form) = Form::<FormSignin>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(Self {
                email: form.username,
                password: form.password,
            })
        } else {
            let Json(body) = Json::<JsonSignin>::from_request(req, state).await?;
            Ok(Self {
                email: body.email,
                password: body.password,
            })
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SigninResponse {
    pub message: &'static str,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub user: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordResponse {
    pub message: &'static str,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// `POST /auth/signup`
#[instrument(skip(state, body), fields(email = %body.email, role = %body.role))]
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    state
        .auth()
        .signup(Signup {
            name: &body.name,
            email: &body.email,
            password: &body.password,
            role: body.role,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(Message::new("User created successfully.")),
    ))
}

/// `POST /auth/signin`
#[instrument(skip(state, credentials), fields(email = %credentials.email))]
pub async fn signin(
    State(state): State<AppState>,
    credentials: SigninCredentials,
) -> Result<Json<SigninResponse>> {
    let (user, tokens) = state
        .auth()
        .signin(&credentials.email, &credentials.password)
        .await?;

    Ok(Json(SigninResponse {
        message: "Login Successful",
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: "bearer",
        user: user.email.into_inner(),
    }))
}

/// `POST /auth/forgot-password`
#[instrument(skip(state, body))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<(StatusCode, Json<ForgotPasswordResponse>)> {
    let token = state.auth().forgot_password(&body.email).await?;

    Ok((
        StatusCode::CREATED,
        Json(ForgotPasswordResponse {
            message: "Reset link has been sent to your email.",
            token,
        }),
    ))
}

/// `POST /auth/reset-password`
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<Message>> {
    state
        .auth()
        .reset_password(&body.token, &body.new_password)
        .await?;

    Ok(Json(Message::new("Password successfully reset")))
}
