use axum::http::Method;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unsupported action for method {0}")]
pub struct UnsupportedAction(pub Method);

/// What a request asks the provider to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Download,
  Upload,
  Delete,
}

impl Action {
  /// Whether the action carries a request body that must be streamed.
  pub fn streams_body(self) -> bool {
    match self {
      Action::Upload => true,
      Action::Download | Action::Delete => false,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Action::Download => "download",
      Action::Upload => "upload",
      Action::Delete => "delete",
    }
  }
}

impl TryFrom<&Method> for Action {
  type Error = UnsupportedAction;

  fn try_from(method: &Method) -> Result<Self, Self::Error> {
    match *method {
      Method::GET => Ok(Action::Download),
      Method::PUT => Ok(Action::Upload),
      Method::DELETE => Ok(Action::Delete),
      _ => Err(UnsupportedAction(method.clone())),
    }
  }
}

impl std::fmt::Display for Action {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}
