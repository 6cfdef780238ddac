use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::transfer::DEFAULT_CHUNK_SIZE;

#[derive(Debug, thiserror::Error)]
pub enum YamlConfigError {
  #[error("Failed to read config file: {0}")]
  FileRead(#[from] std::io::Error),
  #[error("Failed to parse YAML: {0}")]
  YamlParse(#[from] serde_yml::Error),
  #[error("Configuration validation error: {0}")]
  Validation(String),
  #[error("Environment variable not found: {0}")]
  EnvVarNotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
  Memory,
  Filesystem,
  S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
  /// Unique name, used as the first path segment of resource URLs
  pub name: String,

  /// Backend implementation
  pub kind: ProviderKind,

  /// Root directory (filesystem only)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub root: Option<PathBuf>,

  /// S3 bucket name (s3 only)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub bucket_name: Option<String>,

  /// Key prefix inside the bucket (s3 only)
  #[serde(default)]
  pub prefix: String,

  /// AWS Access Key ID (optional - auto-discovered if not provided)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub access_key_id: Option<String>,

  /// Environment variable name holding the AWS Access Key ID
  #[serde(skip_serializing_if = "Option::is_none")]
  pub access_key_id_env: Option<String>,

  /// AWS Secret Access Key (optional - auto-discovered if not provided)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub secret_access_key: Option<String>,

  /// Environment variable name holding the AWS Secret Access Key
  #[serde(skip_serializing_if = "Option::is_none")]
  pub secret_access_key_env: Option<String>,

  /// AWS Session Token (optional)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub session_token: Option<String>,

  /// Environment variable name holding the AWS Session Token
  #[serde(skip_serializing_if = "Option::is_none")]
  pub session_token_env: Option<String>,

  /// AWS Region (optional - auto-discovered if not provided)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub region: Option<String>,

  /// Custom S3 endpoint URL (for MinIO, etc.)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub endpoint_url: Option<String>,

  /// Force path-style addressing (required for MinIO and some S3-compatible services)
  #[serde(default)]
  pub force_path_style: bool,

  /// S3 operation timeout in seconds
  #[serde(default = "default_timeout")]
  pub timeout: u64,
}

fn default_timeout() -> u64 {
  30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YamlConfig {
  /// Configured storage providers
  pub providers: Vec<ProviderConfig>,

  /// HTTP server port (optional, defaults to 3000)
  #[serde(default = "default_port")]
  pub port: u16,

  /// Download chunk size in bytes
  #[serde(default = "default_chunk_size")]
  pub chunk_size: usize,

  /// Enable debug logging
  #[serde(default)]
  pub debug: bool,
}

fn default_port() -> u16 {
  3000
}

fn default_chunk_size() -> usize {
  DEFAULT_CHUNK_SIZE
}

impl YamlConfig {
  /// Load configuration from a YAML file
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, YamlConfigError> {
    let content = fs::read_to_string(path)?;
    Self::from_yaml(&content)
  }

  /// Parse and validate configuration from a YAML document
  pub fn from_yaml(content: &str) -> Result<Self, YamlConfigError> {
    let config: YamlConfig = serde_yml::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  /// Validate the configuration
  pub fn validate(&self) -> Result<(), YamlConfigError> {
    if self.providers.is_empty() {
      return Err(YamlConfigError::Validation(
        "At least one provider must be configured".to_string(),
      ));
    }

    let mut names = std::collections::HashSet::new();
    for provider in &self.providers {
      if provider.name.is_empty() {
        return Err(YamlConfigError::Validation(
          "Provider name cannot be empty".to_string(),
        ));
      }
      if provider.name.contains('/') {
        return Err(YamlConfigError::Validation(format!(
          "Provider name '{}' cannot contain '/'",
          provider.name
        )));
      }
      if !names.insert(&provider.name) {
        return Err(YamlConfigError::Validation(format!(
          "Duplicate provider name: {}",
          provider.name
        )));
      }

      match provider.kind {
        ProviderKind::Memory => {},
        ProviderKind::Filesystem => {
          if provider.root.as_ref().map_or(true, |root| root.as_os_str().is_empty()) {
            return Err(YamlConfigError::Validation(format!(
              "Filesystem provider '{}' must have a root",
              provider.name
            )));
          }
        },
        ProviderKind::S3 => {
          if provider.bucket_name.as_deref().map_or(true, str::is_empty) {
            return Err(YamlConfigError::Validation(format!(
              "S3 provider '{}' must have a bucketName",
              provider.name
            )));
          }
        },
      }
    }

    if self.port == 0 {
      return Err(YamlConfigError::Validation(
        "Port must be greater than 0".to_string(),
      ));
    }

    if self.chunk_size == 0 {
      return Err(YamlConfigError::Validation(
        "Chunk size must be greater than 0".to_string(),
      ));
    }

    Ok(())
  }

  /// Resolve all environment variables and return a resolved configuration
  pub fn resolve_env_vars(&self) -> Result<ResolvedConfig, YamlConfigError> {
    let mut providers = Vec::new();

    for provider in &self.providers {
      let backend = match provider.kind {
        ProviderKind::Memory => ResolvedBackend::Memory,
        ProviderKind::Filesystem => ResolvedBackend::Filesystem {
          root: provider.root.clone().unwrap_or_default(),
        },
        ProviderKind::S3 => ResolvedBackend::S3(Self::resolve_bucket(provider)?),
      };

      providers.push(ResolvedProviderConfig {
        name: provider.name.clone(),
        backend,
      });
    }

    Ok(ResolvedConfig {
      providers,
      port: self.port,
      chunk_size: self.chunk_size,
      debug: self.debug,
    })
  }

  fn resolve_bucket(provider: &ProviderConfig) -> Result<ResolvedBucketConfig, YamlConfigError> {
    let access_key_id =
      Self::resolve_optional_env(&provider.access_key_id, &provider.access_key_id_env)?;

    let secret_access_key =
      Self::resolve_optional_env(&provider.secret_access_key, &provider.secret_access_key_env)?;

    let session_token =
      Self::resolve_optional_env(&provider.session_token, &provider.session_token_env)?;

    // Validate credential pairs
    match (&access_key_id, &secret_access_key) {
      (Some(_), None) => {
        return Err(YamlConfigError::Validation(format!(
          "Provider '{}': if accessKeyId is provided, secretAccessKey must also be provided",
          provider.name
        )));
      },
      (None, Some(_)) => {
        return Err(YamlConfigError::Validation(format!(
          "Provider '{}': if secretAccessKey is provided, accessKeyId must also be provided",
          provider.name
        )));
      },
      _ => {},
    }

    Ok(ResolvedBucketConfig {
      bucket_name: provider.bucket_name.clone().unwrap_or_default(),
      prefix: Self::normalize_prefix(&provider.prefix),
      access_key_id,
      secret_access_key,
      session_token,
      region: provider.region.clone(),
      endpoint_url: provider.endpoint_url.clone(),
      force_path_style: provider.force_path_style,
      timeout: provider.timeout,
    })
  }

  /// Resolve an optional field that can be a value or env var reference
  fn resolve_optional_env(
    value: &Option<String>,
    env_var: &Option<String>,
  ) -> Result<Option<String>, YamlConfigError> {
    match (value, env_var) {
      (Some(v), _) => Ok(Some(v.clone())),
      (None, Some(env_name)) => match std::env::var(env_name) {
        Ok(v) => Ok(Some(v)),
        Err(_) => Ok(None), // Environment variable not set is OK for optional fields
      },
      (None, None) => Ok(None),
    }
  }

  /// Normalize an S3 key prefix: no leading or trailing slashes
  fn normalize_prefix(prefix: &str) -> String {
    prefix.trim().trim_matches('/').to_string()
  }
}

/// Fully resolved configuration with all environment variables loaded
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
  pub providers: Vec<ResolvedProviderConfig>,
  pub port: u16,
  pub chunk_size: usize,
  pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedProviderConfig {
  pub name: String,
  pub backend: ResolvedBackend,
}

#[derive(Debug, Clone)]
pub enum ResolvedBackend {
  Memory,
  Filesystem { root: PathBuf },
  S3(ResolvedBucketConfig),
}

impl ResolvedBackend {
  pub fn kind(&self) -> ProviderKind {
    match self {
      ResolvedBackend::Memory => ProviderKind::Memory,
      ResolvedBackend::Filesystem { .. } => ProviderKind::Filesystem,
      ResolvedBackend::S3(_) => ProviderKind::S3,
    }
  }
}

#[derive(Debug, Clone)]
pub struct ResolvedBucketConfig {
  pub bucket_name: String,
  pub prefix: String,
  pub access_key_id: Option<String>,
  pub secret_access_key: Option<String>,
  pub session_token: Option<String>,
  pub region: Option<String>,
  pub endpoint_url: Option<String>,
  pub force_path_style: bool,
  pub timeout: u64,
}

impl ResolvedConfig {
  /// Get provider configuration by name
  pub fn get_provider(&self, name: &str) -> Option<&ResolvedProviderConfig> {
    self.providers.iter().find(|p| p.name == name)
  }
}
