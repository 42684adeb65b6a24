//! Keeps the SLB HTTPS listener on the latest Let's Encrypt certificate.
//!
//! A run goes through these steps, stopping at the first error:
//!
//! 1. Check the cached certificate; run the ACME client and refresh the cache when it's missing or
//!    about to expire.
//! 2. Look up the load balancer, the certificate bound to its HTTPS listener and that
//!    certificate's fingerprint.
//! 3. Stop if the fingerprint is the cached certificate's. Otherwise upload the cached
//!    certificate and bind it to the listener.
//!
//! Nothing is retried or rolled back: a failed rebind leaves the uploaded certificate unbound.

use eyre::{eyre, WrapErr as _};
use time::{macros::format_description, OffsetDateTime};

use crate::{
    cert::{CertStatus, CertificateFiles, LocalCertificate},
    certbot::{AcmeClient, CertCache, CertRequest},
    config::UpdaterConfig,
    slb::SlbClient,
};

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The listener already serves the cached certificate.
    UpToDate,

    /// The cached certificate was uploaded and bound to the listener.
    Updated {
        certificate_id: String,
        certificate_name: String,
    },
}

/// The certificate currently bound to the load balancer's HTTPS listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerBinding {
    pub load_balancer_id: String,
    pub certificate_id: String,
    pub fingerprint: String,
}

pub struct CertificateUpdater<'a, A> {
    config: &'a UpdaterConfig,
    acme: A,
    slb: SlbClient,
}

impl<'a, A: AcmeClient> CertificateUpdater<'a, A> {
    pub fn new(config: &'a UpdaterConfig, acme: A, slb: SlbClient) -> Self {
        Self { config, acme, slb }
    }

    pub async fn run(&self) -> eyre::Result<Outcome> {
        self.run_at(OffsetDateTime::now_utc()).await
    }

    /// Run the procedure as if the current time were `now`.
    pub async fn run_at(&self, now: OffsetDateTime) -> eyre::Result<Outcome> {
        let env = &self.config.environment;
        log::info!(
            "Certificate Updater started (environment: {}, domain: {}, sub-domain: {}, email address: {})",
            env.environment,
            env.domain,
            env.sub_domain,
            env.email_address
        );

        let files = CertificateFiles::in_dir(&self.config.certificate_cache_dir());
        self.renew_if_needed(&files, now).await?;

        let binding = self.find_listener_binding().await?;

        log::info!("Computing the Let's Encrypt certificate fingerprint...");
        let local = LocalCertificate::load(&files)?;
        let fingerprint = local.fingerprint()?;
        let update_listener_cert = !local.matches_fingerprint(&binding.fingerprint)?;

        log::info!("Certificates information:");
        log::info!("    slbCertFingerprint = {}", binding.fingerprint);
        log::info!("    certFingerprint    = {fingerprint}");
        log::info!("    updateListenerCert = {update_listener_cert}");

        if !update_listener_cert {
            log::info!("SLB listener certificate is up to date.");
            return Ok(Outcome::UpToDate);
        }

        self.upload_and_bind(&binding, &local, now).await
    }

    /// Runs the ACME client and refreshes the cache when the cached certificate needs renewal.
    async fn renew_if_needed(
        &self,
        files: &CertificateFiles,
        now: OffsetDateTime,
    ) -> eyre::Result<CertStatus> {
        let status = CertStatus::inspect(files, now)?;

        log::info!("Let's Encrypt certificate status:");
        log::info!("    publicKeyPath    = {}", files.public_key.display());
        log::info!("    privateKeyPath   = {}", files.private_key.display());
        log::info!("    publicKeyExists  = {}", status.public_key_exists);
        log::info!("    privateKeyExists = {}", status.private_key_exists);
        log::info!("    certExpireSoon   = {}", status.expires_soon);
        log::info!(
            "    certbotCronConfigured = {}",
            self.config.paths.certbot_cron.exists()
        );
        log::info!("    runCertBot       = {}", status.needs_renewal());

        if !status.needs_renewal() {
            return Ok(status);
        }

        let request = CertRequest {
            domain: self.config.fqdn(),
            email: self.config.environment.email_address.clone(),
        };
        self.acme
            .obtain(&request)
            .await
            .wrap_err("Unable to obtain a certificate, quitting")?;

        CertCache::new(self.config.certificate_cache_dir())
            .replace_from(&self.config.certbot_output_dir())?;

        Ok(status)
    }

    /// Load balancer ID, bound certificate ID and its fingerprint, in that order.
    ///
    /// Anything other than exactly one load balancer, or a missing listener certificate, is an
    /// error carrying the raw response.
    pub async fn find_listener_binding(&self) -> eyre::Result<ListenerBinding> {
        let lb_name = self.config.load_balancer_name();
        log::info!("Getting information about the SLB {lb_name}...");

        let reply = self.slb.describe_load_balancers(&lb_name).await?;
        let load_balancer_id = match reply.body.single() {
            Some(lb) => lb.load_balancer_id.clone(),
            None => return Err(eyre!("Unable to find the SLB. Response: {}", reply.raw)),
        };

        log::info!("SLB found: {load_balancer_id}. Loading HTTPS listener information...");
        let reply = self
            .slb
            .describe_https_listener(&load_balancer_id, self.config.slb.listener_port)
            .await?;
        let certificate_id = match reply.body.server_certificate_id {
            Some(id) if !id.is_empty() => id,
            _ => {
                return Err(eyre!(
                    "Unable to find the SLB HTTPS certificate. Response: {}",
                    reply.raw
                ))
            }
        };

        log::info!(
            "SLB HTTPS listener information found. Loading information about the certificate {certificate_id}..."
        );
        let reply = self.slb.describe_server_certificate(&certificate_id).await?;
        let fingerprint = reply
            .body
            .first()
            .and_then(|cert| cert.fingerprint.clone())
            .ok_or_else(|| {
                eyre!(
                    "Unable to find the certificate {certificate_id}. Response: {}",
                    reply.raw
                )
            })?;

        Ok(ListenerBinding {
            load_balancer_id,
            certificate_id,
            fingerprint,
        })
    }

    async fn upload_and_bind(
        &self,
        binding: &ListenerBinding,
        local: &LocalCertificate,
        now: OffsetDateTime,
    ) -> eyre::Result<Outcome> {
        let timestamp = now.format(format_description!(
            "[year][month][day][hour][minute][second]"
        ))?;
        let certificate_name = self.config.server_certificate_name(&timestamp);

        log::info!("Upload the Let's Encrypt certificate {certificate_name}...");
        let private_key = local.rsa_private_key_pem()?;
        let reply = self
            .slb
            .upload_server_certificate(&certificate_name, local.certificate(), &private_key)
            .await?;
        let certificate_id = reply
            .body
            .certificate_id()
            .map(str::to_owned)
            .ok_or_else(|| {
                eyre!(
                    "Unable to upload the certificate {certificate_name}. Response: {}",
                    reply.raw
                )
            })?;

        log::info!(
            "Certificate {certificate_name} (id: {certificate_id}) uploaded with success. Updating the HTTPS listener..."
        );
        let reply = self
            .slb
            .set_https_listener_certificate(
                &binding.load_balancer_id,
                self.config.slb.listener_port,
                &certificate_id,
            )
            .await?;
        if reply.body.code.is_some() {
            return Err(eyre!(
                "Unable to update the SLB HTTPS certificate. Response: {}",
                reply.raw
            ));
        }

        log::info!("SLB listener certificate updated with success.");

        Ok(Outcome::Updated {
            certificate_id,
            certificate_name,
        })
    }
}
