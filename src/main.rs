//! ML Platform - Main Entry Point

use clap::Parser;
use ml_platform::cli::{cmd_generate, cmd_info, cmd_serve, cmd_serve_endpoint, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ml_platform=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.platform_config();

    match cli.command {
        Commands::Train { data, task, inputs, outputs, name, seed } => {
            let config = match seed {
                Some(seed) => config.with_random_state(seed),
                None => config,
            };
            // Training is CPU bound and blocks for its whole duration
            tokio::task::spawn_blocking(move || {
                cmd_train(&config, &data, &task, &inputs, &outputs, name.as_deref())
            })
            .await??;
        }
        Commands::Generate { model_id, name, description } => {
            cmd_generate(&config, model_id, &name, description.as_deref())?;
        }
        Commands::Serve { port, host } => {
            cmd_serve(config, &host, port).await?;
        }
        Commands::ServeEndpoint { manifest, port, host } => {
            cmd_serve_endpoint(&manifest, &host, port).await?;
        }
        Commands::Info { data } => {
            cmd_info(&config, data.as_deref())?;
        }
    }

    Ok(())
}
