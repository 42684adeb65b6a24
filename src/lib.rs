//! Deployment helpers for a web application hosted behind an Alibaba Cloud
//! [Server Load Balancer](https://www.alibabacloud.com/product/server-load-balancer) (SLB).
//!
//! Two independent procedures are provided, each meant to run once from a cron job or a
//! deployment pipeline:
//!
//! - [`CertificateUpdater`] keeps the SLB HTTPS listener on the latest
//!   [Let's Encrypt](https://letsencrypt.org/) certificate. Issuance itself is delegated to
//!   `certbot`; this crate decides when to run it, caches its output on shared storage and
//!   publishes the certificate to the load balancer when the bound one differs.
//! - [`sync_logtail_config`] creates or updates the Logtail (log shipping agent) configuration of
//!   an environment and applies it to the environment's machine group.
//!
//! # Certificate Renewal
//!
//! The cached certificate is renewed when its `cert.pem` or `privkey.pem` is missing or when it
//! expires within a week. Whether the load balancer needs the new certificate is decided by
//! comparing SHA-1 fingerprints, so a run that finds everything up to date makes no changes.
//!
//! ## Running Concurrently
//!
//! Nothing coordinates two runs against the same cache directory or load balancer. Schedule a
//! single runner.
//!
//! # Binaries
//!
//! - `certificate-updater [--config /etc/certificate-updater/config.ini]`
//! - `update-logtail-config <access-key-id> <access-key-secret> <region-id> <environment>`
//!
//! Both exit with status `1` on any failure.
//!
//! [`CertificateUpdater`]: crate::updater::CertificateUpdater
//! [`sync_logtail_config`]: crate::logtail::sync_logtail_config

#![deny(rust_2018_idioms, nonstandard_style, future_incompatible)]

mod req;
mod util;

pub mod api;
pub mod cert;
pub mod certbot;
pub mod config;
pub mod logtail;
pub mod slb;
pub mod sls;
pub mod updater;


pub use crate::{
    cert::{CertStatus, CertificateFiles, LocalCertificate},
    certbot::{AcmeClient, CertCache, CertRequest, Certbot},
    config::{Credentials, UpdaterConfig},
    logtail::{sync_logtail_config, LogtailNames, SyncOutcome},
    slb::SlbClient,
    sls::LogClient,
    updater::{CertificateUpdater, Outcome},
};
