//! Renews the Let's Encrypt certificate when needed and publishes it to the SLB HTTPS listener.

use std::path::PathBuf;

use certman::{
    config::DEFAULT_CONFIG_PATH, CertificateUpdater, Certbot, Outcome, SlbClient, UpdaterConfig,
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "certificate-updater",
    version,
    about = "Renew the Let's Encrypt certificate and bind it to the SLB HTTPS listener"
)]
struct Cli {
    /// INI configuration file.
    #[arg(long, short, env = "CERTMAN_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = UpdaterConfig::load(&cli.config)?;

    let certbot = Certbot::new(&config.paths.certbot, &config.paths.web_root);
    let slb = SlbClient::new(config.credentials().clone(), &config.cloud.region_id)?
        .with_endpoint(&config.cloud.slb_endpoint);

    match CertificateUpdater::new(&config, certbot, slb).run().await? {
        Outcome::UpToDate => {}
        Outcome::Updated {
            certificate_id,
            certificate_name,
        } => log::info!("Listener now serves {certificate_name} ({certificate_id})"),
    }

    Ok(())
}
