//! The error classifier.
//!
//! Every failure that reaches the HTTP boundary is an [`ApiError`]. Its
//! [`classify`](ApiError::classify) method maps it to exactly one status and
//! public message; [`envelope`] then writes the normalized body
//! `{error, details?, timestamp, path}` and logs the failure once.

use std::error::Error as _;

use axum::{
  body::Body,
  extract::{
    Request,
    rejection::{JsonRejection, PathRejection, QueryRejection},
  },
  http::{HeaderValue, Method, StatusCode, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use rally_core::{StoreError, Violation};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error returned by an API handler, extractor or middleware.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("validation failed: {details}")]
  Validation { details: Value },

  #[error("malformed bearer token")]
  TokenMalformed,

  #[error("expired bearer token")]
  TokenExpired,

  #[error("unique constraint violated")]
  Unique(#[source] BoxError),

  #[error("foreign key constraint violated")]
  ForeignKey(#[source] BoxError),

  #[error("rate limit exceeded")]
  RateLimited { retry_after_secs: u64 },

  /// Anything else. `status` defaults to 500 and `message` to
  /// "Internal Server Error".
  #[error("{}", .message.as_deref().unwrap_or("unclassified failure"))]
  Unclassified {
    status:  Option<StatusCode>,
    message: Option<String>,
    #[source]
    source:  Option<BoxError>,
  },
}

/// The public half of an [`ApiError`]: what the client is allowed to see.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
  pub status:  StatusCode,
  pub error:   String,
  pub details: Option<Value>,
}

impl ApiError {
  /// Map this failure to its status and public message.
  pub fn classify(&self) -> Classification {
    let (status, error, details) = match self {
      Self::Validation { details } => {
        (StatusCode::BAD_REQUEST, "Validation failed", Some(details.clone()))
      }
      Self::TokenMalformed => (StatusCode::UNAUTHORIZED, "Invalid token", None),
      Self::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired", None),
      Self::Unique(_) => (StatusCode::CONFLICT, "Resource already exists", None),
      Self::ForeignKey(_) => (StatusCode::BAD_REQUEST, "Invalid reference", None),
      Self::RateLimited { .. } => {
        (StatusCode::TOO_MANY_REQUESTS, "Too many requests", None)
      }
      Self::Unclassified { status, message, .. } => {
        return Classification {
          status:  status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
          error:   message
            .clone()
            .unwrap_or_else(|| "Internal Server Error".to_owned()),
          details: None,
        };
      }
    };

    Classification { status, error: error.to_owned(), details }
  }

  /// Classify a storage failure by the constraint it carries, if any.
  pub fn store<E: StoreError>(e: E) -> Self {
    let Some(violation) = e.violation().cloned() else {
      return Self::internal(e);
    };
    tracing::debug!(sqlstate = violation.sqlstate(), error = %e, "constraint violation");

    match violation {
      Violation::Unique { .. } => Self::Unique(Box::new(e)),
      Violation::ForeignKey => Self::ForeignKey(Box::new(e)),
      Violation::Check(constraint) => Self::Validation {
        details: json!({ "constraint": constraint }),
      },
    }
  }

  pub fn invalid_field(field: &str, message: &str) -> Self {
    Self::Validation { details: json!({ "field": field, "message": message }) }
  }

  pub fn not_found(what: &str) -> Self {
    Self::with_status(StatusCode::NOT_FOUND, format!("{what} not found"))
  }

  pub fn forbidden() -> Self {
    Self::with_status(StatusCode::FORBIDDEN, "Forbidden".to_owned())
  }

  /// No credentials were presented on a route that requires them.
  pub fn unauthenticated() -> Self {
    Self::with_status(StatusCode::UNAUTHORIZED, "Authentication required".to_owned())
  }

  /// A 500 whose cause is logged but never shown to the client.
  pub fn internal(e: impl Into<BoxError>) -> Self {
    Self::Unclassified { status: None, message: None, source: Some(e.into()) }
  }

  fn with_status(status: StatusCode, message: String) -> Self {
    Self::Unclassified { status: Some(status), message: Some(message), source: None }
  }

  /// The full internal cause chain, for logs only.
  fn cause_chain(&self) -> String {
    let mut chain = self.to_string();
    let mut source = self.source();
    while let Some(e) = source {
      chain.push_str(": ");
      chain.push_str(&e.to_string());
      source = e.source();
    }
    chain
  }
}

// ─── Rejections ──────────────────────────────────────────────────────────────

impl From<JsonRejection> for ApiError {
  fn from(r: JsonRejection) -> Self {
    Self::Validation { details: json!({ "body": r.body_text() }) }
  }
}

impl From<QueryRejection> for ApiError {
  fn from(r: QueryRejection) -> Self {
    Self::Validation { details: json!({ "query": r.body_text() }) }
  }
}

impl From<PathRejection> for ApiError {
  fn from(r: PathRejection) -> Self {
    Self::Validation { details: json!({ "path": r.body_text() }) }
  }
}

// ─── Response ────────────────────────────────────────────────────────────────

/// The normalized error body. The only shape a failed request ever returns.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
  pub error:     String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub details:   Option<Value>,
  pub timestamp: DateTime<Utc>,
  pub path:      String,
}

/// Attached to a response by [`ApiError::into_response`] and consumed by
/// [`envelope`], which knows the request path.
#[derive(Debug, Clone)]
struct ErrorReport {
  error:     String,
  details:   Option<Value>,
  timestamp: DateTime<Utc>,
  cause:     Option<String>,
}

impl ErrorReport {
  /// For error responses produced outside [`ApiError`], e.g. 405.
  fn bare(status: StatusCode) -> Self {
    Self {
      error:     status
        .canonical_reason()
        .unwrap_or("Internal Server Error")
        .to_owned(),
      details:   None,
      timestamp: Utc::now(),
      cause:     None,
    }
  }

  fn log(&self, method: &Method, path: &str, status: StatusCode) {
    let cause = self.cause.as_deref().unwrap_or("-");
    if status.is_server_error() {
      tracing::error!(%method, path, status = status.as_u16(), cause, "{}", self.error);
    } else {
      tracing::warn!(%method, path, status = status.as_u16(), cause, "{}", self.error);
    }
  }

  fn into_body(self, path: String) -> ErrorBody {
    ErrorBody {
      error: self.error,
      details: self.details,
      timestamp: self.timestamp,
      path,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let Classification { status, error, details } = self.classify();
    let report = ErrorReport {
      error,
      details,
      timestamp: Utc::now(),
      cause: Some(self.cause_chain()),
    };

    let mut res = (status, json_body(&report.clone().into_body(String::new())))
      .into_response();

    let headers = res.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if status == StatusCode::UNAUTHORIZED {
      headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    if let Self::RateLimited { retry_after_secs } = self {
      headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
    }

    res.extensions_mut().insert(report);
    res
  }
}

fn json_body(body: &ErrorBody) -> Body {
  match serde_json::to_vec(body) {
    Ok(bytes) => Body::from(bytes),
    Err(_) => Body::from(r#"{"error":"Internal Server Error"}"#),
  }
}

/// Middleware: rewrite every 4xx/5xx response into an [`ErrorBody`] carrying
/// the request path, and log it.
pub async fn envelope(req: Request, next: Next) -> Response {
  let method = req.method().clone();
  let path = req.uri().path().to_owned();

  let res = next.run(req).await;
  let status = res.status();
  if !status.is_client_error() && !status.is_server_error() {
    return res;
  }

  let (mut parts, _) = res.into_parts();
  let report = parts
    .extensions
    .remove::<ErrorReport>()
    .unwrap_or_else(|| ErrorReport::bare(status));
  report.log(&method, &path, status);

  parts.headers.remove(header::CONTENT_LENGTH);
  parts
    .headers
    .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
  Response::from_parts(parts, json_body(&report.into_body(path)))
}
