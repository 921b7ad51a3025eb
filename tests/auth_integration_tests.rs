use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, Method, Request, StatusCode, Uri, header, request::Parts},
};
use children_notes::{
    AppError, AppState, InMemoryRepository,
    auth::{AuthUser, Claims, issue_token},
    config::AppConfig,
    models::{Role, User},
    repository::Repository,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{sync::Arc, time::SystemTime};

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

fn now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn create_token(username: &str, exp: u64, secret: &str) -> String {
    let claims = Claims {
        sub: username.to_string(),
        iat: now() as usize,
        exp: exp as usize,
    };
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn child(username: &str, parent: &str) -> User {
    User {
        username: username.to_string(),
        // The extractor never looks at the hash.
        password_hash: "unused".to_string(),
        role: Role::Child,
        parent_username: Some(parent.to_string()),
    }
}

async fn create_app_state(users: Vec<User>) -> AppState {
    let repo = InMemoryRepository::new();
    for user in users {
        repo.create_user(user).await.unwrap();
    }

    let mut config = AppConfig::default();
    config.jwt_secret = TEST_JWT_SECRET.to_string();

    AppState {
        repo: Arc::new(repo),
        config,
    }
}

fn get_request_parts(authorization: Option<&str>) -> Parts {
    let mut builder = Request::builder()
        .method(Method::GET)
        .uri("/notes".parse::<Uri>().unwrap());
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    }
    let (parts, _) = builder.body(axum::body::Body::empty()).unwrap().into_parts();
    parts
}

async fn extract(state: &AppState, authorization: Option<&str>) -> Result<AuthUser, AppError> {
    let mut parts = get_request_parts(authorization);
    AuthUser::from_request_parts(&mut parts, state).await
}

fn assert_unauthorized(result: Result<AuthUser, AppError>) {
    match result {
        Err(err) => assert_eq!(err.status(), StatusCode::UNAUTHORIZED),
        Ok(user) => panic!("expected rejection, got {:?}", user),
    }
}

// --- Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let state = create_app_state(vec![child("kid", "mom")]).await;
    let token = create_token("kid", now() + 3600, TEST_JWT_SECRET);

    let user = extract(&state, Some(&format!("Bearer {}", token)))
        .await
        .unwrap();

    assert_eq!(user.username, "kid");
    assert_eq!(user.role, Role::Child);
    assert_eq!(user.parent_username.as_deref(), Some("mom"));
}

#[tokio::test]
async fn test_issued_token_is_accepted() {
    let state = create_app_state(vec![child("kid", "mom")]).await;
    let token = issue_token("kid", &state.config).unwrap();

    let user = extract(&state, Some(&format!("Bearer {}", token))).await.unwrap();
    assert_eq!(user.username, "kid");
}

#[tokio::test]
async fn test_auth_scheme_is_case_insensitive() {
    let state = create_app_state(vec![child("kid", "mom")]).await;
    let token = create_token("kid", now() + 3600, TEST_JWT_SECRET);

    for scheme in ["bearer", "BEARER", "BeArEr"] {
        let user = extract(&state, Some(&format!("{} {}", scheme, token)))
            .await
            .unwrap();
        assert_eq!(user.username, "kid");
    }
    // The scheme must still be a separate word.
    assert_unauthorized(extract(&state, Some(&format!("Bearer{}", token))).await);
}

#[tokio::test]
async fn test_auth_fails_without_header() {
    let state = create_app_state(vec![child("kid", "mom")]).await;
    let result = extract(&state, None).await;
    assert!(matches!(result, Err(AppError::Unauthorized("Not authenticated"))));
}

#[tokio::test]
async fn test_auth_fails_with_wrong_scheme() {
    let state = create_app_state(vec![child("kid", "mom")]).await;
    let token = create_token("kid", now() + 3600, TEST_JWT_SECRET);

    assert_unauthorized(extract(&state, Some(&format!("Basic {}", token))).await);
    assert_unauthorized(extract(&state, Some("Bearer ")).await);
}

#[tokio::test]
async fn test_auth_fails_with_expired_token() {
    let state = create_app_state(vec![child("kid", "mom")]).await;
    // Well past the default validation leeway.
    let token = create_token("kid", now() - 3600, TEST_JWT_SECRET);

    let result = extract(&state, Some(&format!("Bearer {}", token))).await;
    assert!(matches!(result, Err(AppError::Unauthorized("Invalid token"))));
}

#[tokio::test]
async fn test_auth_fails_with_foreign_signature() {
    let state = create_app_state(vec![child("kid", "mom")]).await;
    let token = create_token("kid", now() + 3600, "some-other-secret");

    assert_unauthorized(extract(&state, Some(&format!("Bearer {}", token))).await);
}

#[tokio::test]
async fn test_auth_fails_for_unknown_user() {
    // A correctly signed token whose account does not exist (any more).
    let state = create_app_state(vec![]).await;
    let token = create_token("ghost", now() + 3600, TEST_JWT_SECRET);

    let result = extract(&state, Some(&format!("Bearer {}", token))).await;
    assert!(matches!(result, Err(AppError::Unauthorized("User not found"))));
}
