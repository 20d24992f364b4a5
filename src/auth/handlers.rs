use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, CheckResponse, LoginRequest, PublicUser, RegisterRequest,
            UpdateProfileRequest,
        },
        error::AuthError,
        extractors::{AuthUser, JsonBody},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/check", get(check))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me).patch(update_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    let out = state.auth.register(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".into(),
            token: out.token,
            user: out.user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let out = state.auth.login(payload).await?;
    Ok(Json(AuthResponse {
        message: "Login successful".into(),
        token: out.token,
        user: out.user.into(),
    }))
}

/// Guard-only endpoint: never touches the directory.
#[instrument]
pub async fn check(AuthUser(user_id): AuthUser) -> Json<CheckResponse> {
    Json(CheckResponse {
        message: "Token is valid".into(),
        user_id,
    })
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    let user = state.auth.profile(user_id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(payload): JsonBody<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, AuthError> {
    let user = state.auth.rename(user_id, payload.name).await?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app::build_app, auth::jwt::TokenService, config::JwtConfig};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, Response},
        Router,
    };
    use serde_json::{json, Value};
    use time::{Duration, OffsetDateTime};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app() -> Router {
        build_app(AppState::fake())
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res: Response<Body> = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with_token(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut b = Request::builder().method("GET").uri(uri);
        if let Some(t) = token {
            b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        b.body(Body::empty()).unwrap()
    }

    fn ann() -> Value {
        json!({"name": "Ann", "email": "ann@x.com", "password": "secret1"})
    }

    #[tokio::test]
    async fn register_then_check() {
        let app = app();
        let (status, body) = send(&app, post_json("/api/auth/register", ann())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "User registered successfully");
        assert_eq!(body["user"]["name"], "Ann");
        assert_eq!(body["user"]["email"], "ann@x.com");
        assert!(body["user"].get("password_hash").is_none());
        assert!(body["user"].get("passwordHash").is_none());
        let token = body["token"].as_str().unwrap().to_string();
        let id = body["user"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, get_with_token("/api/auth/check", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Token is valid");
        assert_eq!(body["userId"], id);
    }

    #[tokio::test]
    async fn duplicate_registration_is_400_and_keeps_first_account() {
        let app = app();
        let (status, first) = send(&app, post_json("/api/auth/register", ann())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &app,
            post_json(
                "/api/auth/register",
                json!({"name": "Imposter", "email": "ann@x.com", "password": "other-pass"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User already exists");
        assert!(body.get("token").is_none());

        let (status, body) = send(
            &app,
            post_json("/api/auth/login", json!({"email": "ann@x.com", "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], first["user"]["id"]);
        assert_eq!(body["user"]["name"], "Ann");
    }

    #[tokio::test]
    async fn login_succeeds_with_right_password() {
        let app = app();
        send(&app, post_json("/api/auth/register", ann())).await;
        let (status, body) = send(
            &app,
            post_json("/api/auth/login", json!({"email": "ann@x.com", "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Login successful");
        assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn bad_logins_are_indistinguishable() {
        let app = app();
        send(&app, post_json("/api/auth/register", ann())).await;

        let wrong = send(
            &app,
            post_json("/api/auth/login", json!({"email": "ann@x.com", "password": "wrong"})),
        )
        .await;
        let unknown = send(
            &app,
            post_json("/api/auth/login", json!({"email": "bob@x.com", "password": "wrong"})),
        )
        .await;

        assert_eq!(wrong.0, StatusCode::BAD_REQUEST);
        assert_eq!(wrong, unknown);
        assert_eq!(wrong.1, json!({"message": "Invalid credentials"}));
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let app = app();
        let (status, body) = send(
            &app,
            post_json("/api/auth/register", json!({"email": "ann@x.com", "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Name is required");
    }

    #[tokio::test]
    async fn wrongly_typed_body_is_400_with_message() {
        let (status, body) = send(
            &app(),
            post_json(
                "/api/auth/register",
                json!({"name": 5, "email": "ann@x.com", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"message": "Invalid request body"}));
    }

    #[tokio::test]
    async fn body_without_content_type_is_400_with_message() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .body(Body::from(
                json!({"email": "ann@x.com", "password": "secret1"}).to_string(),
            ))
            .unwrap();
        let (status, body) = send(&app(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"message": "Invalid request body"}));
    }

    #[tokio::test]
    async fn truncated_json_is_400_with_message() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"email": "ann@x.com", "password":"#))
            .unwrap();
        let (status, body) = send(&app(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid request body");
    }

    #[tokio::test]
    async fn check_without_header_is_401() {
        let (status, body) = send(&app(), get_with_token("/api/auth/check", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Access denied. No token provided.");
    }

    #[tokio::test]
    async fn check_with_wrong_scheme_is_401() {
        let req = Request::builder()
            .uri("/api/auth/check")
            .header(header::AUTHORIZATION, "Token abc")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app(), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn check_with_foreign_or_expired_token_is_403() {
        let state = AppState::fake();
        let app = build_app(state.clone());

        let foreign = TokenService::new(&JwtConfig {
            secret: "someone-elses-secret".into(),
            fallback: false,
        })
        .issue(Uuid::new_v4())
        .unwrap();
        let (status, body) = send(&app, get_with_token("/api/auth/check", Some(&foreign))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Invalid or expired token.");

        let expired = state
            .auth
            .tokens()
            .issue_at(Uuid::new_v4(), OffsetDateTime::now_utc() - Duration::hours(2))
            .unwrap();
        let (status, _) = send(&app, get_with_token("/api/auth/check", Some(&expired))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, get_with_token("/api/auth/check", Some("garbage"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn check_accepts_token_for_unknown_user() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        let ghost = Uuid::new_v4();
        let token = state.auth.tokens().issue(ghost).unwrap();

        let (status, body) = send(&app, get_with_token("/api/auth/check", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["userId"], ghost.to_string());

        let (status, _) = send(&app, get_with_token("/api/auth/me", Some(&token))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn me_reads_and_renames_profile() {
        let app = app();
        let (_, body) = send(&app, post_json("/api/auth/register", ann())).await;
        let token = body["token"].as_str().unwrap().to_string();

        let (status, me) = send(&app, get_with_token("/api/auth/me", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["name"], "Ann");

        let req = Request::builder()
            .method("PATCH")
            .uri("/api/auth/me")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"name": "Annie"}).to_string()))
            .unwrap();
        let (status, me) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["name"], "Annie");
        assert_eq!(me["email"], "ann@x.com");
    }

    #[tokio::test]
    async fn health_is_open() {
        let res = app()
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
