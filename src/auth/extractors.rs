use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRef, FromRequest, FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    Json,
};
use tracing::warn;
use uuid::Uuid;

use super::{error::AuthError, jwt::TokenService};

/// Returns the bearer token, or `MissingToken` when the header is absent or
/// uses another scheme. Does not look inside the token.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)
}

/// Verified caller identity. Does not consult the user directory, so a
/// deleted account's token keeps working until it expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).map_err(|e| {
            warn!("missing bearer token");
            e
        })?;

        let tokens = TokenService::from_ref(state);
        let claims = tokens.verify(token).map_err(|e| {
            warn!(reason = %e, "rejected bearer token");
            AuthError::InvalidToken
        })?;

        Ok(AuthUser(claims.sub))
    }
}

/// `Json<T>` whose rejections come back as a 400 `{message}` instead of
/// axum's plain-text body.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: Send,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                warn!(status = %rejection.status(), reason = %rejection.body_text(), "rejected request body");
                Err(AuthError::Validation("Invalid request body".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn extracts_bearer_value() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn absent_header_is_missing_token() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn other_schemes_are_missing_token() {
        for value in ["Basic dXNlcjpwYXNz", "bearer abc", "Bearerabc", "abc.def.ghi"] {
            assert!(
                matches!(bearer_token(&headers(value)), Err(AuthError::MissingToken)),
                "{value:?}"
            );
        }
    }
}
