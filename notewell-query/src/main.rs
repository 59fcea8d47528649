use anyhow::Result;
use notewell_common::Settings;
use notewell_query::runtime::block_on_detached;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    block_on_detached(run())?
}

async fn run() -> Result<()> {
    let settings = Settings::from_env().inspect_err(|e| {
        tracing::error!("Invalid configuration: {e}");
    })?;

    let mut session = notewell_query::bootstrap(&settings).await.inspect_err(|e| {
        tracing::error!("{e}");
    })?;

    let input = BufReader::new(tokio::io::stdin());
    let mut output = std::io::stdout();
    session
        .run_until(input, &mut output, tokio::signal::ctrl_c())
        .await?;
    Ok(())
}
