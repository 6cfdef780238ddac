use crate::server::error::ServerError;

const MAX_PATH_LEN: usize = 1024;

/// Validate a captured resource path and return it with a leading `/`.
pub fn normalize_path(raw: &str) -> Result<String, ServerError> {
  let trimmed = raw.trim_start_matches('/');

  if trimmed.is_empty() {
    return Err(ServerError::BadRequest);
  }

  if trimmed.len() > MAX_PATH_LEN {
    return Err(ServerError::BadRequest);
  }

  if trimmed.contains('\0') {
    return Err(ServerError::BadRequest);
  }

  if trimmed.split('/').any(|segment| segment == "..") {
    return Err(ServerError::BadRequest);
  }

  Ok(format!("/{}", trimmed))
}
