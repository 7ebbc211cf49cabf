use std::sync::Arc;

use clap::Parser;

use chat_client::{
    app::App,
    cli::Cli,
    config::AppConfig,
    logging::init_tracing,
    session::FileSessionStore,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!("chat failed: {err:?}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = AppConfig::from_env()?;
    init_tracing(&cfg.logging.rust_log);

    let sessions = Arc::new(FileSessionStore::new(cfg.session.resolved_path()?));
    tracing::debug!(path = %sessions.path().display(), "using session file");

    let app = App::new(cfg, sessions, cli.json)?;
    app.run(cli.command).await
}
