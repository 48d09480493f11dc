//! gRPC boundary integration tests.
//!
//! Covers the verifying layer with signed tokens, the edge to internal
//! identity hop, and stream authentication.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use auth_test_utils::*;
use axum::http::{self, Request, Response};
use futures::stream;
use quiz_auth::grpc::{GrpcAuthLayer, GrpcServerStream, ServerStream, StreamInterceptor};
use quiz_auth::propagation::{self, IdentityPropagator};
use quiz_auth::{AuthConfig, AuthContext, IdentityExt, MethodPolicy, TokenValidator};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tonic::body::BoxBody;
use tonic::service::Interceptor;
use tonic::{Code, Status};
use tower::{Layer, Service, ServiceExt};

const GET_QUIZ: &str = "/quiz.v1.QuizService/GetQuiz";
const LIST_HISTORY: &str = "/history.v1.HistoryService/ListHistory";
const STREAM_QUESTIONS: &str = "/quiz.v1.QuizService/StreamQuestions";

/// Inner service recording the identity each call arrived with.
#[derive(Clone, Default)]
struct RecordingService {
    seen: Arc<Mutex<Vec<Option<AuthContext>>>>,
}

impl RecordingService {
    fn calls(&self) -> Vec<Option<AuthContext>> {
        self.seen.lock().unwrap().clone()
    }
}

impl<B: Send + 'static> Service<Request<B>> for RecordingService {
    type Response = Response<BoxBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        self.seen.lock().unwrap().push(req.auth_context().cloned());
        Box::pin(async move { Ok(Response::new(BoxBody::default())) })
    }
}

struct TestRealm {
    idp: MockJwksServer,
    key: TestKeypair,
    validator: Arc<TokenValidator>,
}

impl TestRealm {
    async fn start() -> Self {
        let key = TestKeypair::primary(TEST_KEY_ID_1);
        let idp = MockJwksServer::start(TEST_REALM, &[&key]).await;
        let validator = Arc::new(TokenValidator::from_config(&AuthConfig::new(
            &idp.base_url(),
            TEST_REALM,
        )));
        Self {
            idp,
            key,
            validator,
        }
    }

    fn alice_token(&self) -> String {
        TestTokenBuilder::new()
            .for_user(TEST_USER_ALICE)
            .with_username(TEST_USERNAME_ALICE)
            .with_email(TEST_EMAIL_ALICE, true)
            .issued_by(&self.idp.issuer())
            .sign(&self.key)
            .unwrap()
    }

    fn edge_layer(&self) -> GrpcAuthLayer {
        GrpcAuthLayer::verifying(
            self.validator.clone(),
            Arc::new(MethodPolicy::quiz_platform()),
        )
    }
}

fn grpc_request(method: &str) -> http::request::Builder {
    Request::builder()
        .method("POST")
        .uri(method)
        .header("content-type", "application/grpc")
}

fn status_of(response: &Response<BoxBody>) -> Option<Status> {
    Status::from_header_map(response.headers())
}

// =============================================================================
// Verifying (edge) layer
// =============================================================================

#[tokio::test]
async fn test_missing_authorization_is_invalid_argument() {
    let realm = TestRealm::start().await;
    let inner = RecordingService::default();
    let service = realm.edge_layer().layer(inner.clone());

    let response = service
        .oneshot(grpc_request(GET_QUIZ).body(()).unwrap())
        .await
        .unwrap();

    let status = status_of(&response).unwrap();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(status.message(), "authentication failed");
    assert!(inner.calls().is_empty());
}

#[tokio::test]
async fn test_valid_token_attaches_identity() {
    let realm = TestRealm::start().await;
    let inner = RecordingService::default();
    let service = realm.edge_layer().layer(inner.clone());

    let response = service
        .oneshot(
            grpc_request(GET_QUIZ)
                .header("authorization", format!("Bearer {}", realm.alice_token()))
                .body(())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(status_of(&response).is_none());
    let calls = inner.calls();
    let ctx = calls.first().unwrap().as_ref().unwrap();
    assert_eq!(ctx.user_id(), TEST_USER_ALICE);
    assert_eq!(ctx.username(), TEST_USERNAME_ALICE);
    assert!(ctx.is_verified());
    assert_eq!(ctx.claims().unwrap().email, TEST_EMAIL_ALICE);
}

#[tokio::test]
async fn test_invalid_tokens_are_unauthenticated() {
    let realm = TestRealm::start().await;
    let inner = RecordingService::default();
    let issuer = realm.idp.issuer();

    let bad_values = [
        "Basic dXNlcjpwYXNz".to_string(),
        "Bearer ".to_string(),
        "Bearer not-a-jwt".to_string(),
        format!(
            "Bearer {}",
            TestTokenBuilder::new()
                .issued_by(&issuer)
                .expires_in(-1)
                .sign(&realm.key)
                .unwrap()
        ),
        format!(
            "Bearer {}",
            TestTokenBuilder::new()
                .issued_by(&issuer)
                .sign(&TestKeypair::secondary(TEST_KEY_ID_2))
                .unwrap()
        ),
    ];

    for value in bad_values {
        let service = realm.edge_layer().layer(inner.clone());
        let response = service
            .oneshot(
                grpc_request(GET_QUIZ)
                    .header("authorization", value.as_str())
                    .body(())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = status_of(&response).unwrap();
        assert_eq!(status.code(), Code::Unauthenticated, "value {value:?}");
        assert_eq!(status.message(), "authentication failed");
    }
    assert!(inner.calls().is_empty());
}

#[tokio::test]
async fn test_exempt_method_needs_no_token() {
    let realm = TestRealm::start().await;
    let inner = RecordingService::default();
    let service = realm.edge_layer().layer(inner.clone());

    let response = service
        .oneshot(
            grpc_request("/user.v1.UserService/Register")
                .body(())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(status_of(&response).is_none());
    assert_eq!(inner.calls().len(), 1);
    assert!(inner.calls().first().unwrap().is_none());
    assert_eq!(realm.idp.fetch_count().await, 0);
}

#[tokio::test]
async fn test_unmapped_method_with_valid_token_is_allowed() {
    let realm = TestRealm::start().await;
    let inner = RecordingService::default();
    let service = realm.edge_layer().layer(inner.clone());

    let response = service
        .oneshot(
            grpc_request("/quiz.v1.QuizService/PublishQuiz")
                .header("authorization", format!("Bearer {}", realm.alice_token()))
                .body(())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(status_of(&response).is_none());
    assert!(inner.calls().first().unwrap().is_some());
}

#[tokio::test]
async fn test_spoofed_identity_metadata_is_not_trusted_at_edge() {
    let realm = TestRealm::start().await;
    let inner = RecordingService::default();
    let service = realm.edge_layer().layer(inner.clone());

    let response = service
        .oneshot(
            grpc_request(GET_QUIZ)
                .header(propagation::USER_ID_KEY, TEST_USER_BOB)
                .body(())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(status_of(&response).unwrap().code(), Code::InvalidArgument);
    assert!(inner.calls().is_empty());
}

// =============================================================================
// Edge to internal hop
// =============================================================================

#[tokio::test]
async fn test_identity_verified_at_edge_is_trusted_internally() {
    let realm = TestRealm::start().await;

    // Edge verifies the token
    let edge_inner = RecordingService::default();
    let mut edge = realm.edge_layer().layer(edge_inner.clone());
    edge.call(
        grpc_request(GET_QUIZ)
            .header("authorization", format!("Bearer {}", realm.alice_token()))
            .body(())
            .unwrap(),
    )
    .await
    .unwrap();
    let verified = edge_inner.calls().first().cloned().flatten().unwrap();

    // Edge calls the history service with the propagated identity
    let mut propagator = IdentityPropagator::new(verified);
    let mut outgoing = tonic::Request::new(());
    outgoing
        .metadata_mut()
        .insert("authorization", "Bearer leaked".parse().unwrap());
    let outgoing = propagator.call(outgoing).unwrap();

    let mut internal_request = grpc_request(LIST_HISTORY).body(()).unwrap();
    *internal_request.headers_mut() = outgoing.metadata().clone().into_headers();
    assert!(internal_request.headers().get("authorization").is_none());

    // Internal service trusts it
    let internal_inner = RecordingService::default();
    let internal = GrpcAuthLayer::trusting(Arc::new(MethodPolicy::quiz_platform()))
        .layer(internal_inner.clone());
    let response = internal.oneshot(internal_request).await.unwrap();

    assert!(status_of(&response).is_none());
    let ctx = internal_inner.calls().first().cloned().flatten().unwrap();
    assert_eq!(ctx.user_id(), TEST_USER_ALICE);
    assert_eq!(ctx.username(), TEST_USERNAME_ALICE);
    assert_eq!(ctx.email(), TEST_EMAIL_ALICE);
    assert!(!ctx.is_verified());
}

#[tokio::test]
async fn test_internal_service_rejects_call_without_identity() {
    let inner = RecordingService::default();
    let internal =
        GrpcAuthLayer::trusting(Arc::new(MethodPolicy::quiz_platform())).layer(inner.clone());

    // A raw token is not enough in trusting mode
    let response = internal
        .oneshot(
            grpc_request(LIST_HISTORY)
                .header("authorization", "Bearer some.jwt.token")
                .body(())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(status_of(&response).unwrap().code(), Code::InvalidArgument);
    assert!(inner.calls().is_empty());
}

// =============================================================================
// Streams
// =============================================================================

type AnswerStream = GrpcServerStream<
    String,
    String,
    stream::Iter<std::vec::IntoIter<Result<String, Status>>>,
>;

fn open_stream(authorization: Option<&str>) -> AnswerStream {
    let messages = vec![Ok("answer-1".to_string()), Ok("answer-2".to_string())];
    let mut request = tonic::Request::new(stream::iter(messages));
    if let Some(value) = authorization {
        request
            .metadata_mut()
            .insert("authorization", value.parse().unwrap());
    }
    let (stream, _outbound) = GrpcServerStream::new(request, 8);
    stream
}

#[tokio::test]
async fn test_stream_context_is_authenticated_identity() {
    let realm = TestRealm::start().await;
    let interceptor = StreamInterceptor::verifying(
        realm.validator.clone(),
        Arc::new(MethodPolicy::quiz_platform()),
    );

    let token = format!("Bearer {}", realm.alice_token());
    let mut stream = interceptor
        .intercept(STREAM_QUESTIONS, open_stream(Some(&token)))
        .await
        .unwrap();

    let ctx = stream.context().unwrap();
    assert_eq!(ctx.user_id(), TEST_USER_ALICE);
    assert!(ctx.is_verified());

    // Messages flow through unchanged
    assert_eq!(stream.recv().await.unwrap().as_deref(), Some("answer-1"));
    assert_eq!(stream.recv().await.unwrap().as_deref(), Some("answer-2"));
    assert!(stream.recv().await.unwrap().is_none());
}

#[tokio::test]
async fn test_stream_with_invalid_token_is_rejected() {
    let realm = TestRealm::start().await;
    let interceptor = StreamInterceptor::verifying(
        realm.validator.clone(),
        Arc::new(MethodPolicy::quiz_platform()),
    );

    let status = interceptor
        .intercept(STREAM_QUESTIONS, open_stream(Some("Bearer forged.token.value")))
        .await
        .err()
        .unwrap();
    assert_eq!(status.code(), Code::Unauthenticated);

    let status = interceptor
        .intercept(STREAM_QUESTIONS, open_stream(None))
        .await
        .err()
        .unwrap();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_stream_validation_reuses_cached_keys() {
    let realm = TestRealm::start().await;
    let interceptor = StreamInterceptor::verifying(
        realm.validator.clone(),
        Arc::new(MethodPolicy::quiz_platform()),
    );
    let token = format!("Bearer {}", realm.alice_token());

    for _ in 0..3 {
        interceptor
            .intercept(STREAM_QUESTIONS, open_stream(Some(&token)))
            .await
            .unwrap();
    }

    assert_eq!(realm.idp.fetch_count().await, 1);
}
