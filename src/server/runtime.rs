use crate::domain::yaml_config::ResolvedConfig;
use crate::infra::registry::ProviderRegistry;
use crate::server::app_state::AppState;
use crate::server::router::create_router;

pub async fn run_server(
  providers: ProviderRegistry,
  config: &ResolvedConfig,
) -> Result<(), std::io::Error> {
  tracing::info!(
    "Server starting with {} configured provider(s)",
    providers.len()
  );
  for name in providers.names() {
    tracing::info!("  - Provider configured: {}", name);
  }

  let app_state = AppState {
    providers,
    chunk_size: config.chunk_size,
  };

  let app = create_router().with_state(app_state);
  let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

  tracing::info!("Server running on port {}", config.port);
  axum::serve(listener, app).await?;

  Ok(())
}
