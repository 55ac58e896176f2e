//! HTTP layer: application state, router assembly, and route handlers.

pub mod auth_routes;
pub mod content;
pub mod document_routes;
pub mod email;
pub mod guard;
pub mod response;
pub mod share_routes;

pub use content::{ContentStore, ContentStoreError, StoredContent};
pub use email::{EmailConfig, EmailError, EmailSender};
pub use guard::CurrentUser;
pub use response::{ApiError, ApiResponse};

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::{middleware, Json, Router};
use serde::Serialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::{OtpManager, TokenService};
use crate::db::{DocumentRepository, UserRepository};

/// Maximum accepted upload size.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: UserRepository,
    pub documents: DocumentRepository,
    pub otp: OtpManager,
    pub tokens: TokenService,
    pub email: EmailSender,
    pub content: ContentStore,
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint (no auth required)
async fn health() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

/// Builds the application router.
///
/// Stored objects are served read-only under `/files/`; everything under
/// `/documents` and the account routes sit behind the bearer-token guard.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth_routes::register))
        .route("/auth/verify-otp", post(auth_routes::verify_otp))
        .route("/auth/resend-otp", post(auth_routes::resend_otp))
        .route("/auth/login", post(auth_routes::login));

    let protected_routes = Router::new()
        .route(
            "/auth/me",
            get(auth_routes::me).put(auth_routes::update_profile),
        )
        .route("/auth/password", put(auth_routes::change_password))
        .route(
            "/documents",
            post(document_routes::create_document).get(document_routes::list_documents),
        )
        .route(
            "/documents/shared",
            get(document_routes::list_shared_documents),
        )
        .route(
            "/documents/{id}",
            get(document_routes::get_document)
                .put(document_routes::update_document)
                .delete(document_routes::delete_document),
        )
        .route("/documents/{id}/share", post(share_routes::grant_share))
        .route("/documents/{id}/shared", get(share_routes::list_shares))
        .route(
            "/documents/{id}/share/{user_id}",
            put(share_routes::modify_share).delete(share_routes::revoke_share),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/files", ServeDir::new(state.content.root()))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;
    use crate::db::init_db;
    use crate::models::User;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestContext {
        app: Router,
        state: AppState,
        _temp_dir: TempDir, // Keep alive for duration of test
    }

    async fn setup() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(temp_dir.path().join("test.db")).await.unwrap();

        let users = UserRepository::new(pool.clone());
        let state = AppState {
            users: users.clone(),
            documents: DocumentRepository::new(pool),
            otp: OtpManager::new(users, 10),
            tokens: TokenService::new("test-secret", 24),
            email: EmailSender::new(EmailConfig::default()),
            content: ContentStore::new(temp_dir.path().join("content"), "http://localhost:8080"),
        };

        TestContext {
            app: router(state.clone()),
            state,
            _temp_dir: temp_dir,
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let ctx = setup().await;

        let response = ctx
            .app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["status"], "ok");
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let ctx = setup().await;

        let response = ctx
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/auth/me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "MISSING_TOKEN");
    }

    #[tokio::test]
    async fn test_protected_route_rejects_garbage_token() {
        let ctx = setup().await;

        let response = ctx
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/documents")
                    .header(header::AUTHORIZATION, "Bearer not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn test_verify_otp_then_me() {
        let ctx = setup().await;

        let user = ctx
            .state
            .users
            .create(&User::new("Alice", "alice@example.com", "hash"))
            .await
            .unwrap();
        let code = ctx.state.otp.generate(&user).await.unwrap();

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/verify-otp",
                serde_json::json!({"email": "alice@example.com", "otp": code}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        let token = json["data"]["token"].as_str().unwrap().to_string();

        let response = ctx
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/auth/me")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["email"], "alice@example.com");
    }

    #[tokio::test]
    async fn test_login_before_verification_is_401() {
        let ctx = setup().await;

        let hash = hash_password("hunter2hunter2").unwrap();
        ctx.state
            .users
            .create(&User::new("Alice", "alice@example.com", hash))
            .await
            .unwrap();

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/login",
                serde_json::json!({"email": "alice@example.com", "password": "hunter2hunter2"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "ACCOUNT_NOT_VERIFIED");
    }

    #[tokio::test]
    async fn test_login_with_wrong_password_is_401() {
        let ctx = setup().await;

        let hash = hash_password("hunter2hunter2").unwrap();
        let user = ctx
            .state
            .users
            .create(&User::new("Alice", "alice@example.com", hash))
            .await
            .unwrap();
        let code = ctx.state.otp.generate(&user).await.unwrap();
        ctx.state.otp.verify("alice@example.com", &code).await.unwrap();

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/login",
                serde_json::json!({"email": "alice@example.com", "password": "wrong-password"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn test_login_after_verification_returns_token() {
        let ctx = setup().await;

        let hash = hash_password("hunter2hunter2").unwrap();
        let user = ctx
            .state
            .users
            .create(&User::new("Alice", "alice@example.com", hash))
            .await
            .unwrap();
        let code = ctx.state.otp.generate(&user).await.unwrap();
        ctx.state.otp.verify("alice@example.com", &code).await.unwrap();

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/login",
                serde_json::json!({"email": "alice@example.com", "password": "hunter2hunter2"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["data"]["token"].as_str().is_some());
        assert_eq!(json["data"]["user"]["email"], "alice@example.com");
    }
}
