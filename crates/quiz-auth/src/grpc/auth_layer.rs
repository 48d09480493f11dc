//! Tower layer enforcing authentication on gRPC calls.
//!
//! The fully-qualified method name is the request path, so one layer covers
//! unary and streaming RPCs alike. Rejected calls never reach the inner
//! service; they are answered with a trailers-only gRPC status.

use super::authenticator::{
    authorize_call, Authenticator, TrustingAuthenticator, VerifyingAuthenticator,
};
use crate::identity::AuthContext;
use crate::jwt::TokenValidator;
use crate::observability::metrics;
use crate::policy::MethodPolicy;
use axum::http;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::body::BoxBody;
use tonic::metadata::MetadataMap;
use tower::{Layer, Service};
use tracing::instrument;

/// Tower layer for async gRPC authentication.
#[derive(Clone)]
pub struct GrpcAuthLayer {
    authenticator: Arc<dyn Authenticator>,
}

impl GrpcAuthLayer {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }

    /// Layer for edge services: validates bearer tokens.
    pub fn verifying(validator: Arc<TokenValidator>, policy: Arc<MethodPolicy>) -> Self {
        Self::new(Arc::new(VerifyingAuthenticator::new(validator, policy)))
    }

    /// Layer for internal services: trusts propagated identity.
    pub fn trusting(policy: Arc<MethodPolicy>) -> Self {
        Self::new(Arc::new(TrustingAuthenticator::new(policy)))
    }
}

impl<S> Layer<S> for GrpcAuthLayer {
    type Service = GrpcAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GrpcAuthService {
            inner,
            authenticator: self.authenticator.clone(),
        }
    }
}

/// Tower service produced by [`GrpcAuthLayer`].
#[derive(Clone)]
pub struct GrpcAuthService<S> {
    inner: S,
    authenticator: Arc<dyn Authenticator>,
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for GrpcAuthService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<BoxBody>>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        // Take the service that was driven to readiness, leave a fresh clone
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let authenticator = self.authenticator.clone();

        // Read everything needed up front; the body is not Sync
        let method = req.uri().path().to_string();
        let metadata = MetadataMap::from_headers(req.headers().clone());

        Box::pin(async move {
            match authorize(authenticator.as_ref(), &method, &metadata).await {
                Ok(Some(ctx)) => {
                    let (mut parts, body) = req.into_parts();
                    parts.extensions.insert(ctx);
                    inner.call(http::Request::from_parts(parts, body)).await
                }
                Ok(None) => inner.call(req).await,
                Err(status) => Ok(status.into_http()),
            }
        })
    }
}

#[instrument(skip_all, name = "auth.grpc.authorize", fields(method = %method))]
async fn authorize(
    authenticator: &dyn Authenticator,
    method: &str,
    metadata: &MetadataMap,
) -> Result<Option<AuthContext>, tonic::Status> {
    authorize_call(authenticator, method, metadata, metrics::BOUNDARY_GRPC).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    // Verifying-mode flows with signed tokens live in tests/grpc_auth_tests.rs.

    use super::*;
    use crate::identity::IdentityExt;
    use crate::propagation;
    use http::{Request, Response};
    use std::convert::Infallible;

    /// Inner service that echoes the authenticated user, if any.
    #[derive(Clone)]
    struct MockInnerService;

    const INNER_SERVICE_REACHED: &str = "x-inner-service-reached";
    const INNER_USER_ID: &str = "x-inner-user-id";

    impl<ReqBody> Service<Request<ReqBody>> for MockInnerService
    where
        ReqBody: Send + 'static,
    {
        type Response = Response<BoxBody>;
        type Error = Infallible;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
            let user_id = req.auth_context().map(|ctx| ctx.user_id().to_string());
            Box::pin(async move {
                let mut builder = Response::builder()
                    .status(200)
                    .header(INNER_SERVICE_REACHED, "true");
                if let Some(user_id) = user_id {
                    builder = builder.header(INNER_USER_ID, user_id);
                }
                Ok(builder
                    .body(BoxBody::default())
                    .expect("Failed to build response"))
            })
        }
    }

    fn trusting_service() -> GrpcAuthService<MockInnerService> {
        GrpcAuthLayer::trusting(Arc::new(MethodPolicy::quiz_platform())).layer(MockInnerService)
    }

    fn grpc_request(method: &str) -> http::request::Builder {
        Request::builder()
            .method("POST")
            .uri(method)
            .header("content-type", "application/grpc")
    }

    fn inner_service_reached(response: &Response<BoxBody>) -> bool {
        response.headers().get(INNER_SERVICE_REACHED).is_some()
    }

    fn grpc_code(response: &Response<BoxBody>) -> tonic::Code {
        tonic::Status::from_header_map(response.headers())
            .map(|status| status.code())
            .unwrap_or(tonic::Code::Ok)
    }

    #[tokio::test]
    async fn test_public_method_reaches_inner_without_identity() {
        let mut service = trusting_service();

        let response = service
            .call(grpc_request("/user.v1.UserService/Login").body(()).unwrap())
            .await
            .unwrap();

        assert!(inner_service_reached(&response));
        assert!(response.headers().get(INNER_USER_ID).is_none());
    }

    #[tokio::test]
    async fn test_trusting_injects_identity_into_extensions() {
        let mut service = trusting_service();

        let request = grpc_request("/quiz.v1.QuizService/GetQuiz")
            .header(propagation::USER_ID_KEY, "user-1")
            .header(propagation::USERNAME_KEY, "alice")
            .body(())
            .unwrap();
        let response = service.call(request).await.unwrap();

        assert!(inner_service_reached(&response));
        assert_eq!(response.headers().get(INNER_USER_ID).unwrap(), "user-1");
    }

    #[tokio::test]
    async fn test_missing_identity_rejected_before_inner() {
        let mut service = trusting_service();

        let response = service
            .call(grpc_request("/quiz.v1.QuizService/GetQuiz").body(()).unwrap())
            .await
            .unwrap();

        assert!(!inner_service_reached(&response));
        assert_eq!(grpc_code(&response), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_unmapped_method_fails_closed() {
        let mut service = trusting_service();

        let response = service
            .call(grpc_request("/admin.v1.AdminService/Purge").body(()).unwrap())
            .await
            .unwrap();

        assert!(!inner_service_reached(&response));
        assert_eq!(grpc_code(&response), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_rejection_message_is_opaque() {
        let mut service = trusting_service();

        let request = grpc_request("/quiz.v1.QuizService/GetQuiz")
            .header(propagation::USER_ID_KEY, " ")
            .body(())
            .unwrap();
        let response = service.call(request).await.unwrap();

        let status = tonic::Status::from_header_map(response.headers()).unwrap();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
        assert_eq!(status.message(), "authentication failed");
    }

    #[tokio::test]
    async fn test_poll_ready_delegates_to_inner() {
        let mut service = trusting_service();

        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        let result = Service::<Request<()>>::poll_ready(&mut service, &mut cx);
        assert!(matches!(result, Poll::Ready(Ok(()))));
    }

    #[test]
    fn test_streaming_rejection_labelled_by_transport() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let mut service = trusting_service();

        let response = ::metrics::with_local_recorder(&recorder, || {
            futures::executor::block_on(
                service.call(
                    grpc_request("/quiz.v1.QuizService/StreamQuestions")
                        .body(())
                        .unwrap(),
                ),
            )
        })
        .unwrap();
        assert!(!inner_service_reached(&response));

        let rendered = handle.render();
        let rejections: Vec<&str> = rendered
            .lines()
            .filter(|line| line.starts_with("auth_rejections_total{"))
            .collect();
        assert_eq!(rejections.len(), 1, "{rendered}");
        assert!(rejections[0].contains(r#"boundary="grpc""#), "{rendered}");
    }
}
