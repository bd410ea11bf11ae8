use clap::Parser;
use session_gate::run_server;
use session_gate::settings::Settings;

/// Session-based authentication server.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Cli {
    /// Configuration file replacing `config/default`.
    #[clap(short, long)]
    config: Option<String>,
    /// Port to listen on, overriding `server.port`.
    #[clap(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::new(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    run_server(settings).await
}
