use std::sync::Arc;

use tracing::{debug, error};
use uuid::Uuid;

use crate::app::error::AppError;
use crate::app::models::Message;

pub mod android;
pub mod properties;

pub use android::AndroidEndpoint;
pub use properties::PropertiesEndpoint;

/// Serves every request whose subject falls under one registered prefix.
pub trait Endpoint: Send + Sync {
    /// Handler failures come back as error messages inside `Ok`. `Err` is reserved for
    /// subjects the endpoint has no handler for.
    fn handle(&self, request: &Message, trace_id: &str) -> Result<Message, AppError>;
}

/// Resolves a subject against the subject-prefix table of one endpoint. The first entry whose
/// prefix matches wins.
pub(crate) fn dispatch<E>(
    endpoint: &E,
    routes: &[(&str, fn(&E, &Message, &str) -> Result<Message, AppError>)],
    request: &Message,
    trace_id: &str,
) -> Result<Message, AppError> {
    let Some((_, handler)) = routes
        .iter()
        .find(|(prefix, _)| request.subject.starts_with(*prefix))
    else {
        return Err(AppError::routing(&request.subject, trace_id));
    };
    Ok(handler(endpoint, request, trace_id).unwrap_or_else(|err| {
        debug!(trace_id, subject = %request.subject, code = %err.code, error = %err.error, "request failed");
        Message::from(err)
    }))
}

/// Top-level subject-prefix routing table, built once at startup.
#[derive(Default)]
pub struct Router {
    routes: Vec<(String, Arc<dyn Endpoint>)>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, prefix: impl Into<String>, endpoint: Arc<dyn Endpoint>) -> Self {
        self.routes.push((prefix.into(), endpoint));
        self
    }

    pub fn handle(&self, request: &Message) -> Result<Message, AppError> {
        let trace_id = Uuid::new_v4().to_string();
        self.handle_with_trace(request, &trace_id)
    }

    pub fn handle_with_trace(&self, request: &Message, trace_id: &str) -> Result<Message, AppError> {
        debug!(trace_id, subject = %request.subject, "dispatching request");
        let endpoint = self
            .routes
            .iter()
            .find(|(prefix, _)| !request.subject.is_empty() && request.subject.starts_with(prefix.as_str()))
            .map(|(_, endpoint)| endpoint);
        let result = match endpoint {
            Some(endpoint) => endpoint.handle(request, trace_id),
            None => Err(AppError::routing(&request.subject, trace_id)),
        };
        if let Err(err) = &result {
            error!(trace_id, subject = %request.subject, error = %err.error, "unroutable request");
        }
        result
    }
}
