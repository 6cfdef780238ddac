use crate::domain::{action::UnsupportedAction, provider::ProviderError};
use crate::transfer::TransferError;
use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;

/// Non-standard "client closed request" status used for aborted transfers
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Error, Debug)]
pub enum ServerError {
  #[error("Bad request")]
  BadRequest,

  #[error("Unknown provider: {0}")]
  UnknownProvider(String),

  #[error(transparent)]
  UnsupportedAction(#[from] UnsupportedAction),

  #[error("Internal server error")]
  InternalError,

  #[error("Transfer error: {0}")]
  Transfer(#[from] TransferError),
}

impl IntoResponse for ServerError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      // Map domain errors to HTTP responses
      ServerError::Transfer(TransferError::ProviderFailure(ProviderError::NotFound)) => {
        (StatusCode::NOT_FOUND, "The resource was not found")
      },
      ServerError::UnsupportedAction(ref e)
      | ServerError::Transfer(TransferError::UnsupportedAction(ref e)) => {
        tracing::debug!("{}", e);
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
      },
      ServerError::Transfer(TransferError::ConnectionAborted) => {
        // nobody is listening any more; the status only shows up in traces
        tracing::warn!("Client disconnected before the transfer completed");
        let status =
          StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST);
        (status, "Connection aborted")
      },

      // HTTP-specific errors
      ServerError::BadRequest => (StatusCode::BAD_REQUEST, "Bad request"),
      ServerError::UnknownProvider(ref name) => {
        tracing::debug!("Request for unknown provider '{}'", name);
        (StatusCode::NOT_FOUND, "Unknown provider")
      },

      // Generic fallback - log details but return safe message
      _ => {
        tracing::error!("Server error: {}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
      },
    };

    (status, [("Content-Type", "text/plain")], message).into_response()
  }
}
