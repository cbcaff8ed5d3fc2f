use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    middleware,
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use super::middleware::{
    error_translation_middleware, handle_panic, logging_middleware, route_not_found,
    security_headers_middleware, MAX_BODY_SIZE,
};
use super::state::AppState;
use super::v1;

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    let routes = Router::new()
        .nest("/api/v1", v1::create_v1_router())
        .fallback(route_not_found);

    with_middleware(routes, state)
}

/// Wrap `routes` in the shared middleware stack.
///
/// Layers run outermost first: security headers, CORS, panic capture,
/// compression, body limit, request id and tracing, request logging
/// (outside production), error translation, then routing. Panic capture
/// sits inside the header layers so a 500 from a panic carries them too.
fn with_middleware(routes: Router<AppState>, state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let mut router = routes.layer(middleware::from_fn_with_state(
        state.clone(),
        error_translation_middleware,
    ));

    if !state.environment.is_production() {
        router = router.layer(middleware::from_fn(logging_middleware));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(CompressionLayer::new())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .layer(middleware::from_fn(security_headers_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
        routing::get,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Environment;
    use crate::infrastructure::cache::InMemoryCache;
    use crate::infrastructure::user::{InMemoryUserRepository, UserService};

    struct TestApp {
        router: Router,
        repo: Arc<InMemoryUserRepository>,
        cache: Arc<InMemoryCache>,
    }

    fn create_app(environment: Environment) -> TestApp {
        let repo = Arc::new(InMemoryUserRepository::new());
        let cache = Arc::new(InMemoryCache::new());
        let state = AppState::new(
            environment,
            Arc::new(UserService::new(repo.clone())),
            Arc::new(InMemoryCache::new()),
            cache.clone(),
        );

        TestApp {
            router: create_router(state),
            repo,
            cache,
        }
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_user(router: &Router, username: &str, email: &str) -> Value {
        let response = send(
            router,
            "POST",
            "/api/v1/users",
            Some(json!({"username": username, "email": email})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await
    }

    #[tokio::test]
    async fn test_ping() {
        let app = create_app(Environment::Test);

        let response = send(&app.router, "GET", "/api/v1/ping", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"success": true, "message": "Pong"})
        );
    }

    #[tokio::test]
    async fn test_health_reports_store_status() {
        let app = create_app(Environment::Test);

        let body = json_body(send(&app.router, "GET", "/api/v1/health", None).await).await;
        assert_eq!(body["message"], "App is healthy");
        assert_eq!(body["environment"], "test");
        assert_eq!(body["database"], "connected");
        assert_eq!(body["redis"], "connected");
        assert!(body["uptime"].as_str().unwrap().ends_with('s'));

        app.cache.set_online(false);
        let body = json_body(send(&app.router, "GET", "/api/v1/health", None).await).await;
        assert_eq!(body["redis"], "disconnected");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = create_app(Environment::Test);

        let response = send(&app.router, "GET", "/api/v1/nope", None).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Route /api/v1/nope not found");
    }

    #[tokio::test]
    async fn test_security_headers_and_request_id() {
        let app = create_app(Environment::Test);

        let response = send(&app.router, "GET", "/api/v1/ping", None).await;

        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_create_user_envelope() {
        let app = create_app(Environment::Test);

        let body = create_user(&app.router, "alice", "alice@example.com").await;

        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "User created successfully");
        assert_eq!(body["data"]["id"], 1);
        assert_eq!(body["data"]["email"], "alice@example.com");
        assert!(body["data"].get("is_deleted").is_none());
        assert!(body.get("meta").is_none());
    }

    #[tokio::test]
    async fn test_create_strips_unknown_fields_and_trims() {
        let app = create_app(Environment::Test);

        let response = send(
            &app.router,
            "POST",
            "/api/v1/users",
            Some(json!({"username": "  bob  ", "email": "bob@example.com", "role": "admin"})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["data"]["username"], "bob");
        assert!(body["data"].get("role").is_none());
    }

    #[tokio::test]
    async fn test_create_missing_email() {
        let app = create_app(Environment::Test);

        let response = send(
            &app.router,
            "POST",
            "/api/v1/users",
            Some(json!({"username": "alice"})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Validation failed: Email is required");
        assert_eq!(body["errors"], json!(["Email is required"]));
    }

    #[tokio::test]
    async fn test_create_duplicate_email() {
        let app = create_app(Environment::Test);
        create_user(&app.router, "alice", "alice@example.com").await;

        let response = send(
            &app.router,
            "POST",
            "/api/v1/users",
            Some(json!({"username": "alice2", "email": "alice@example.com"})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Email already in use");

        let list = json_body(send(&app.router, "GET", "/api/v1/users", None).await).await;
        assert_eq!(list["meta"]["total"], 1);
    }

    #[tokio::test]
    async fn test_create_email_taken_after_lookup() {
        let app = create_app(Environment::Test);
        create_user(&app.router, "alice", "alice@example.com").await;
        app.repo.set_stale_email_lookups(true);

        let response = send(
            &app.router,
            "POST",
            "/api/v1/users",
            Some(json!({"username": "alice2", "email": "alice@example.com"})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "email already exists");
        assert_eq!(app.repo.row_count().await, 1);
    }

    #[tokio::test]
    async fn test_body_and_params_errors_reported_together() {
        let app = create_app(Environment::Test);

        let response = send(
            &app.router,
            "PUT",
            "/api/v1/users/0",
            Some(json!({"email": "not-an-email"})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(
            body["message"],
            "Validation failed: Email must be a valid email address, Id must be a positive integer"
        );
    }

    #[tokio::test]
    async fn test_get_user_and_not_found() {
        let app = create_app(Environment::Test);
        create_user(&app.router, "alice", "alice@example.com").await;

        let response = send(&app.router, "GET", "/api/v1/users/1", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["data"]["username"], "alice");

        let response = send(&app.router, "GET", "/api/v1/users/42", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["message"], "User not found");
    }

    #[tokio::test]
    async fn test_update_user() {
        let app = create_app(Environment::Test);
        create_user(&app.router, "alice", "alice@example.com").await;

        let response = send(
            &app.router,
            "PUT",
            "/api/v1/users/1",
            Some(json!({"username": "alicia"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "User updated successfully");
        assert_eq!(body["data"]["username"], "alicia");

        let response = send(
            &app.router,
            "PUT",
            "/api/v1/users/9",
            Some(json!({"username": "ghost"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await["message"],
            "User not found or not updated"
        );
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let app = create_app(Environment::Test);
        create_user(&app.router, "alice", "alice@example.com").await;

        let response = send(&app.router, "DELETE", "/api/v1/users/1", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "User deleted successfully");
        assert_eq!(body["data"], json!({}));

        let response = send(&app.router, "DELETE", "/api/v1/users/1", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["message"], "User not found");
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let app = create_app(Environment::Test);
        for i in 0..25 {
            create_user(&app.router, &format!("user{:02}", i), &format!("u{}@example.com", i)).await;
        }

        let response = send(&app.router, "GET", "/api/v1/users?page=2&limit=10", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["message"], "Users fetched successfully");
        assert_eq!(body["data"].as_array().unwrap().len(), 10);
        assert_eq!(
            body["meta"],
            json!({"total": 25, "page": 2, "limit": 10, "total_pages": 3})
        );
    }

    #[tokio::test]
    async fn test_list_far_past_the_end() {
        let app = create_app(Environment::Test);
        create_user(&app.router, "alice", "alice@example.com").await;

        let response = send(
            &app.router,
            "GET",
            "/api/v1/users?page=4294967295&limit=4294967295",
            None,
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["data"], json!([]));
        assert_eq!(body["meta"]["total"], 1);
    }

    #[tokio::test]
    async fn test_list_query_validation() {
        let app = create_app(Environment::Test);

        let response = send(&app.router, "GET", "/api/v1/users?page=0", None).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["message"],
            "Validation failed: Page must be at least 1"
        );
    }

    #[tokio::test]
    async fn test_stack_only_outside_production() {
        let dev = create_app(Environment::Development);
        let body = json_body(send(&dev.router, "GET", "/api/v1/users/42", None).await).await;
        assert_eq!(body["stack"], json!(["User not found"]));

        let prod = create_app(Environment::Production);
        let body = json_body(send(&prod.router, "GET", "/api/v1/users/42", None).await).await;
        assert!(body.get("stack").is_none());
    }

    #[tokio::test]
    async fn test_wrong_method_on_known_path() {
        let app = create_app(Environment::Test);

        let response = send(&app.router, "PATCH", "/api/v1/users/1", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Route /api/v1/users/1 not found");

        let response = send(&app.router, "POST", "/api/v1/health", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await["message"],
            "Route /api/v1/health not found"
        );
    }

    async fn explode() -> &'static str {
        panic!("kaboom")
    }

    #[tokio::test]
    async fn test_panic_becomes_500_with_headers() {
        let state = AppState::new(
            Environment::Test,
            Arc::new(UserService::new(Arc::new(InMemoryUserRepository::new()))),
            Arc::new(InMemoryCache::new()),
            Arc::new(InMemoryCache::new()),
        );
        let router = with_middleware(Router::new().route("/boom", get(explode)), state);

        let request = Request::builder()
            .uri("/boom")
            .header(header::ORIGIN, "http://example.com")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal Server Error");
    }
}
