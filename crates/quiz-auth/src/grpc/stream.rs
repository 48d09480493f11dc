//! Authentication for streaming RPC handlers.
//!
//! Handlers that drive a stream through [`ServerStream`] pass it to
//! [`StreamInterceptor::intercept`] before the first message. The result is
//! an [`IdentityStream`]: the same stream, with `context()` answering the
//! authenticated identity.
//!
//! ```rust,ignore
//! async fn stream_questions(
//!     &self,
//!     request: Request<Streaming<Answer>>,
//! ) -> Result<Response<Self::StreamQuestionsStream>, Status> {
//!     let (stream, outbound) = GrpcServerStream::new(request, 16);
//!     let mut stream = self
//!         .interceptor
//!         .intercept("/quiz.v1.QuizService/StreamQuestions", stream)
//!         .await?;
//!     tokio::spawn(async move { run_session(&mut stream).await });
//!     Ok(Response::new(outbound))
//! }
//! ```

use super::authenticator::{
    authorize_call, Authenticator, TrustingAuthenticator, VerifyingAuthenticator,
};
use crate::identity::AuthContext;
use crate::jwt::TokenValidator;
use crate::observability::metrics;
use crate::policy::MethodPolicy;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::MetadataMap;
use tonic::{Request, Status, Streaming};

/// A bidirectional server-side stream.
#[async_trait]
pub trait ServerStream: Send {
    type Inbound: Send;
    type Outbound: Send;

    /// Metadata sent by the client when the stream was opened.
    fn metadata(&self) -> &MetadataMap;

    /// Identity of the caller, if one was established.
    fn context(&self) -> Option<&AuthContext>;

    /// Next inbound message, or `None` once the client half-closes.
    async fn recv(&mut self) -> Result<Option<Self::Inbound>, Status>;

    /// Send one outbound message.
    async fn send(&mut self, message: Self::Outbound) -> Result<(), Status>;

    /// End the response stream with `status`.
    ///
    /// The status code, message and metadata travel to the client as the
    /// call's trailers. Nothing may be sent afterwards.
    async fn close(&mut self, status: Status) -> Result<(), Status>;
}

// =============================================================================
// tonic adapter
// =============================================================================

/// [`ServerStream`] over a tonic streaming request and an outbound channel.
///
/// The receiving half returned by [`GrpcServerStream::new`] is the
/// response stream the handler hands back to tonic.
pub struct GrpcServerStream<In, Out, S = Streaming<In>> {
    metadata: MetadataMap,
    context: Option<AuthContext>,
    inbound: S,
    outbound: mpsc::Sender<Result<Out, Status>>,
    _inbound: PhantomData<fn() -> In>,
}

impl<In, Out, S> GrpcServerStream<In, Out, S>
where
    S: Stream<Item = Result<In, Status>> + Unpin + Send,
{
    /// Adapt `request`, buffering up to `buffer` outbound messages.
    ///
    /// Any identity already in the request extensions (for example from
    /// [`GrpcAuthLayer`](super::GrpcAuthLayer)) becomes the initial context.
    pub fn new(request: Request<S>, buffer: usize) -> (Self, ReceiverStream<Result<Out, Status>>) {
        let (metadata, extensions, inbound) = request.into_parts();
        let (tx, rx) = mpsc::channel(buffer.max(1));

        let stream = Self {
            metadata,
            context: extensions.get::<AuthContext>().cloned(),
            inbound,
            outbound: tx,
            _inbound: PhantomData,
        };
        (stream, ReceiverStream::new(rx))
    }
}

#[async_trait]
impl<In, Out, S> ServerStream for GrpcServerStream<In, Out, S>
where
    In: Send,
    Out: Send,
    S: Stream<Item = Result<In, Status>> + Unpin + Send,
{
    type Inbound = In;
    type Outbound = Out;

    fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    fn context(&self) -> Option<&AuthContext> {
        self.context.as_ref()
    }

    async fn recv(&mut self) -> Result<Option<In>, Status> {
        self.inbound.next().await.transpose()
    }

    async fn send(&mut self, message: Out) -> Result<(), Status> {
        self.outbound
            .send(Ok(message))
            .await
            .map_err(|_| Status::cancelled("client disconnected"))
    }

    async fn close(&mut self, status: Status) -> Result<(), Status> {
        self.outbound
            .send(Err(status))
            .await
            .map_err(|_| Status::cancelled("client disconnected"))?;

        // Later sends must not follow the trailers
        let (closed, _) = mpsc::channel(1);
        self.outbound = closed;
        Ok(())
    }
}

// =============================================================================
// Identity decorator
// =============================================================================

/// A stream whose `context()` is the identity established at interception.
///
/// Everything else is delegated to the wrapped stream unchanged.
pub struct IdentityStream<St> {
    inner: St,
    context: Option<AuthContext>,
}

impl<St: ServerStream> IdentityStream<St> {
    pub fn new(inner: St, context: Option<AuthContext>) -> Self {
        Self { inner, context }
    }

    pub fn into_inner(self) -> St {
        self.inner
    }
}

#[async_trait]
impl<St: ServerStream> ServerStream for IdentityStream<St> {
    type Inbound = St::Inbound;
    type Outbound = St::Outbound;

    fn metadata(&self) -> &MetadataMap {
        self.inner.metadata()
    }

    fn context(&self) -> Option<&AuthContext> {
        self.context.as_ref()
    }

    async fn recv(&mut self) -> Result<Option<St::Inbound>, Status> {
        self.inner.recv().await
    }

    async fn send(&mut self, message: St::Outbound) -> Result<(), Status> {
        self.inner.send(message).await
    }

    async fn close(&mut self, status: Status) -> Result<(), Status> {
        self.inner.close(status).await
    }
}

// =============================================================================
// Interceptor
// =============================================================================

/// Authenticates a stream once, before any message is exchanged.
#[derive(Clone)]
pub struct StreamInterceptor {
    authenticator: Arc<dyn Authenticator>,
}

impl StreamInterceptor {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }

    pub fn verifying(validator: Arc<TokenValidator>, policy: Arc<MethodPolicy>) -> Self {
        Self::new(Arc::new(VerifyingAuthenticator::new(validator, policy)))
    }

    pub fn trusting(policy: Arc<MethodPolicy>) -> Self {
        Self::new(Arc::new(TrustingAuthenticator::new(policy)))
    }

    /// Authorize `stream` for `method`.
    ///
    /// Exempt methods yield a stream with no identity. Rejected streams are
    /// dropped, which ends the call with the returned status.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` or `Unauthenticated`, with an opaque message.
    pub async fn intercept<St: ServerStream>(
        &self,
        method: &str,
        stream: St,
    ) -> Result<IdentityStream<St>, Status> {
        let context = authorize_call(
            self.authenticator.as_ref(),
            method,
            stream.metadata(),
            metrics::BOUNDARY_GRPC_STREAM,
        )
        .await?;
        Ok(IdentityStream::new(stream, context))
    }
}
