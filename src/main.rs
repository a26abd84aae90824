use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use f1_stage::client::ErgastClient;
use f1_stage::config::Config;
use f1_stage::{load, store};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let client = ErgastClient::new(&config.client).context("unable to build http client")?;
    let mut store = store::open_store(&config.store).context("unable to open staging store")?;

    let summary = load::run_season(&client, store.as_mut(), &config.schema, config.year)
        .with_context(|| format!("season {} load failed", config.year))?;

    println!("{summary}");
    println!("Process Completed");
    Ok(())
}
