use crate::domain::{provider::ProviderError, yaml_config::YamlConfigError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
  #[error("Provider error: {0}")]
  Provider(#[from] ProviderError),

  #[error("Configuration error: {0}")]
  Config(#[from] YamlConfigError),

  #[error("Server error: {0}")]
  Server(#[from] std::io::Error),
}
