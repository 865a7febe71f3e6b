use axum::{
    Router, debug_handler,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::{
    App,
    error::AppError,
    json::{Envelope, Json},
};

pub const HOOK_SECRET_HEADER: &str = "x-auth-hook-secret";

pub fn route() -> Router<App> {
    Router::<App>::new().route("/userDeleted", post(handle_user_deleted))
}

#[derive(Deserialize, Default)]
struct UserDeletedEvent {
    #[serde(default)]
    uid: String,
}

#[derive(Serialize)]
struct Acknowledged {
    success: bool,
}

fn check_hook_secret(headers: &HeaderMap, expected: Option<&str>) -> Result<(), AppError> {
    let Some(expected) = expected else {
        tracing::warn!("Auth hook called but no hook secret is configured");
        return Err(("The auth webhook is not enabled", StatusCode::FORBIDDEN).into());
    };

    let given = headers
        .get(HOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    match given {
        Some(given) if bool::from(given.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
        Some(_) => Err(("Invalid hook secret", StatusCode::FORBIDDEN).into()),
        None => Err(("Missing hook secret", StatusCode::UNAUTHORIZED).into()),
    }
}

#[debug_handler]
async fn handle_user_deleted(
    State(ctx): State<App>,
    headers: HeaderMap,
    Json(Envelope { data }): Json<Envelope<UserDeletedEvent>>,
) -> Result<Json<Envelope<Acknowledged>>, AppError> {
    check_hook_secret(&headers, ctx.config.auth_hook_secret.as_deref())?;

    ctx.moderation
        .on_user_deleted(&data.uid)
        .await
        .map_err(|e| e.into_app_error("Error removing deleted user"))?;

    Ok(Json(Envelope::new(Acknowledged { success: true })))
}
