use crate::api_error::ApiError;
use crate::routes::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use headers::authorization::Bearer;
use headers::Authorization;

/// Bearer-token guard for the pipeline routes. Does nothing unless
/// `API_TOKEN` is configured.
pub async fn require_bearer(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    match auth {
        Some(TypedHeader(auth)) if auth.token() == expected => Ok(next.run(request).await),
        Some(_) => {
            log::warn!("Rejected request to {} with an invalid token", request.uri().path());
            Err(ApiError::unauthorized("Invalid bearer token"))
        }
        None => Err(ApiError::unauthorized("Authorization Bearer token is required")),
    }
}
