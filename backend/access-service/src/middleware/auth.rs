use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Role;

/// Identity extracted from a verified bearer JWT, available to handlers as
/// a request extension.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Require a valid bearer JWT. Missing or invalid tokens are 401; a
/// secret-store outage surfaces as 500, never as an auth failure.
pub async fn require_auth(mut request: Request, next: Next) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or(AppError::Unauthorized)?
        .to_string();

    let claims = token_core::verify(&token).await.map_err(AppError::from)?;

    let current_user = CurrentUser {
        id: claims.user_id().map_err(|_| AppError::Unauthorized)?,
        role: Role::parse(&claims.role).ok_or(AppError::Unauthorized)?,
        email: claims.email,
    };

    request.extensions_mut().insert(current_user);

    Ok(next.run(request).await)
}

/// Require the admin role on an already-authenticated request. Wrong role
/// is 403, never conflated with 401.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let current_user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AppError::Unauthorized)?;

    if !current_user.role.is_admin() {
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn test_non_bearer_schemes_are_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(bearer_token(&headers), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
