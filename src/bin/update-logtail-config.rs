//! Creates or updates the Logtail configuration of an environment and applies it to its machine
//! group.

use certman::{sync_logtail_config, Credentials, LogClient, LogtailNames};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "update-logtail-config",
    version,
    about = "Create or update the Logtail configuration of an environment"
)]
struct Cli {
    access_key_id: String,

    access_key_secret: String,

    region_id: String,

    /// Environment name, e.g. `dev` or `prod`.
    environment: String,

    /// Prefix of the log project, store, config and machine group names.
    #[arg(long, default_value = "sample-app")]
    app_name: String,

    /// Log Service base URL, instead of `https://<project>.<region>.log.aliyuncs.com`.
    #[arg(long, env = "LOG_ENDPOINT")]
    endpoint: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::info!(
        "Update the Logtail configuration on the log project (environment = {}, region = {})",
        cli.environment,
        cli.region_id
    );

    let names = LogtailNames::for_environment(&cli.app_name, &cli.environment);
    let credentials = Credentials::new(cli.access_key_id, cli.access_key_secret);

    let mut client = LogClient::new(credentials, &cli.region_id, &names.project)?;
    if let Some(endpoint) = cli.endpoint {
        client = client.with_endpoint(endpoint);
    }

    let outcome = sync_logtail_config(&client, &names).await?;
    log::info!("Logtail configuration {} ({outcome:?})", names.config);

    Ok(())
}
