use clap::Parser;
use relay_node::cmd;
use relay_node::config::Cli;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = cmd::run(cli).await {
        tracing::error!(error = %e, "fatal");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
