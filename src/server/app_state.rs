use crate::infra::registry::ProviderRegistry;

#[derive(Clone)]
pub struct AppState {
  pub providers: ProviderRegistry,
  /// Download chunk size in bytes
  pub chunk_size: usize,
}
