use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tower::Layer;
use tower::Service;
use tracing;

use crate::authorization::{OperationDescriptor, PermissionsAuthorizationHandler, Requirement};
use crate::axum_integration::extract_bearer_token;
use crate::engine::AuthEngine;
use crate::identity::Identity;
use super::error::AuthorizationError;

/// Middleware layer that validates the bearer token and attaches the
/// enriched [`Identity`] to the request.
///
/// Requests without a token continue without an identity; an invalid token
/// is rejected with 401.
#[derive(Clone)]
pub struct Authenticate {
    engine: AuthEngine,
}

impl Authenticate {
    pub fn new(engine: AuthEngine) -> Self {
        Self { engine }
    }
}

impl<S> Layer<S> for Authenticate {
    type Service = AuthenticateMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthenticateMiddleware {
            inner,
            engine: self.engine.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthenticateMiddleware<S> {
    inner: S,
    engine: AuthEngine,
}

impl<S> Service<Request> for AuthenticateMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let mut inner = self.inner.clone();
        let engine = self.engine.clone();

        Box::pin(async move {
            if let Some(token) = extract_bearer_token(request.headers()) {
                match engine.authenticate(&token).await {
                    Ok(identity) => {
                        request.extensions_mut().insert(identity);
                    }
                    Err(e) => {
                        tracing::debug!("Rejecting request with invalid token: {}", e);
                        return Ok(AuthorizationError::from(e).into_response());
                    }
                }
            }

            inner.call(request).await
        })
    }
}

/// Middleware layer that requires every configured requirement to succeed
/// for the operation being invoked.
///
/// The operation is the one given with [`RequirePermissions::for_operation`],
/// or else an [`OperationDescriptor`] the host placed in request extensions.
#[derive(Clone)]
pub struct RequirePermissions {
    requirements: Arc<Vec<Requirement>>,
    operation: Option<Arc<OperationDescriptor>>,
    handler: PermissionsAuthorizationHandler,
}

impl RequirePermissions {
    pub fn new(requirements: Vec<Requirement>) -> Self {
        Self {
            requirements: Arc::new(requirements),
            operation: None,
            handler: PermissionsAuthorizationHandler::default(),
        }
    }

    /// Explicit permissions of `operation`, falling back to its name
    pub fn attribute_based(operation: OperationDescriptor) -> Self {
        Self::new(vec![Requirement::AttributeBased]).for_operation(operation)
    }

    /// Permission derived from the operation's controller and action names
    pub fn convention_based(operation: OperationDescriptor) -> Self {
        Self::new(vec![Requirement::ConventionBased]).for_operation(operation)
    }

    pub fn for_operation(mut self, operation: OperationDescriptor) -> Self {
        self.operation = Some(Arc::new(operation));
        self
    }
}

impl<S> Layer<S> for RequirePermissions {
    type Service = RequirePermissionsMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePermissionsMiddleware {
            inner,
            requirements: self.requirements.clone(),
            operation: self.operation.clone(),
            handler: self.handler,
        }
    }
}

#[derive(Clone)]
pub struct RequirePermissionsMiddleware<S> {
    inner: S,
    requirements: Arc<Vec<Requirement>>,
    operation: Option<Arc<OperationDescriptor>>,
    handler: PermissionsAuthorizationHandler,
}

impl<S> Service<Request> for RequirePermissionsMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let mut inner = self.inner.clone();
        let requirements = self.requirements.clone();
        let operation = self.operation.clone();
        let handler = self.handler;

        Box::pin(async move {
            let Some(identity) = request.extensions().get::<Identity>().filter(|i| i.is_authenticated()) else {
                return Ok(AuthorizationError::MissingToken.into_response());
            };

            let operation = operation
                .or_else(|| request.extensions().get::<OperationDescriptor>().cloned().map(Arc::new))
                .unwrap_or_default();

            let mut missing = Vec::new();
            for requirement in requirements.iter() {
                let context = handler.context(*requirement, &operation, identity);
                if !handler.handle_context(&context).has_succeeded() {
                    missing.extend(context.missing_permissions());
                }
            }

            if !missing.is_empty() {
                missing.sort();
                missing.dedup();
                return Ok(AuthorizationError::InsufficientPermissions(missing).into_response());
            }

            inner.call(request).await
        })
    }
}
