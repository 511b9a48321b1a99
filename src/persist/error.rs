use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The request a data service was executing when it failed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        RequestContext {
            method: method.into(),
            url: url.into(),
            options: None,
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }
}

/// Structured failure from a data service.
///
/// Every error path funnels through this shape before it becomes an error
/// outcome: a transport failure keeps its originating request context, a
/// locally thrown error is wrapped with none. It is never thrown across
/// the async boundary; it rides inside the error outcome action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataServiceError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestContext>,
}

impl DataServiceError {
    pub fn new(message: impl Into<String>, request: RequestContext) -> Self {
        DataServiceError {
            message: message.into(),
            request: Some(request),
        }
    }

    /// A locally raised error with no originating request.
    pub fn local(message: impl Into<String>) -> Self {
        DataServiceError {
            message: message.into(),
            request: None,
        }
    }

    /// Normalize any error into the structured form, attaching the request
    /// context when the source did not already carry one.
    pub fn normalize(source: impl fmt::Display, request: Option<RequestContext>) -> Self {
        DataServiceError {
            message: source.to_string(),
            request,
        }
    }
}

impl fmt::Display for DataServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.request {
            Some(request) => {
                write!(f, "{} ({} {})", self.message, request.method, request.url)
            }
            None => write!(f, "{}", self.message),
        }
    }
}

impl Error for DataServiceError {}
