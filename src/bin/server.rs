use clap::Parser;
use file_gateway::domain::yaml_config::{ResolvedBackend, ResolvedConfig, YamlConfig};
use file_gateway::error::AppError;
use file_gateway::infra::registry::ProviderRegistry;
use file_gateway::server::run_server;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "file-gateway")]
#[command(about = "Streaming file gateway - download, upload and delete against pluggable storage providers")]
struct Cli {
    #[arg(
        short = 'c',
        long = "config",
        env = "CONFIG_FILE",
        help = "Path to YAML configuration file"
    )]
    config_file: PathBuf,

    #[arg(long, env = "DEBUG", help = "Enable debug logging")]
    debug: bool,
}

fn load_config(cli: &Cli) -> Result<ResolvedConfig, AppError> {
    // Load, validate and resolve environment variables
    Ok(YamlConfig::from_file(&cli.config_file)?.resolve_env_vars()?)
}

async fn run(resolved_config: ResolvedConfig) -> Result<(), AppError> {
    tracing::info!("Configuration loaded successfully");
    tracing::info!("  Chunk size: {} bytes", resolved_config.chunk_size);
    tracing::info!("  Providers: {}", resolved_config.providers.len());
    for provider in &resolved_config.providers {
        match &provider.backend {
            ResolvedBackend::Memory => tracing::info!("    - {} (memory)", provider.name),
            ResolvedBackend::Filesystem { root } => {
                tracing::info!("    - {} (filesystem: {})", provider.name, root.display())
            }
            ResolvedBackend::S3(bucket) => {
                tracing::info!("    - {} (s3: {})", provider.name, bucket.bucket_name)
            }
        }
    }

    let providers = ProviderRegistry::from_config(&resolved_config).await?;
    tracing::info!("Providers initialized successfully");

    providers.test_all_buckets().await?;

    run_server(providers, &resolved_config).await?;
    Ok(())
}

fn report(e: &AppError) -> ! {
    eprintln!();
    eprintln!("{}", e);
    eprintln!();
    if matches!(e, AppError::Provider(_)) {
        eprintln!("Please verify:");
        eprintln!("  - Filesystem roots are writable");
        eprintln!("  - AWS credentials are valid");
        eprintln!("  - Bucket names and regions are correct");
        eprintln!("  - Network connectivity to S3/endpoint");
    }
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let resolved_config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => report(&e),
    };

    // Initialize logging
    if cli.debug || resolved_config.debug {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }

    tracing::info!("Loaded configuration from: {}", cli.config_file.display());

    if let Err(e) = run(resolved_config).await {
        report(&e);
    }
}
