use std::{
    fs,
    future::Future,
    path::{Path, PathBuf},
};

use eyre::{eyre, WrapErr as _};
use tokio::process::Command;

use crate::cert::CertificateFiles;

/// What to ask the ACME client for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertRequest {
    /// The `subdomain.domain` the certificate is for.
    pub domain: String,

    /// Contact address registered with the certificate authority.
    pub email: String,
}

/// An external tool that obtains or renews a certificate.
pub trait AcmeClient {
    /// Obtain a certificate for `request`.
    ///
    /// Resolves once the tool is done; any failure means no usable certificate was issued.
    fn obtain(&self, request: &CertRequest) -> impl Future<Output = eyre::Result<()>>;
}

/// Runs `certbot certonly` with the webroot plugin.
#[derive(Debug, Clone)]
pub struct Certbot {
    program: PathBuf,
    web_root: PathBuf,
}

impl Certbot {
    pub fn new(program: impl Into<PathBuf>, web_root: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            web_root: web_root.into(),
        }
    }

    /// Arguments passed to certbot, one per element; no shell is involved.
    pub fn args(&self, request: &CertRequest) -> Vec<std::ffi::OsString> {
        vec![
            "certonly".into(),
            "--webroot".into(),
            "-w".into(),
            self.web_root.clone().into_os_string(),
            "-d".into(),
            request.domain.clone().into(),
            "--non-interactive".into(),
            "--agree-tos".into(),
            "--email".into(),
            request.email.clone().into(),
        ]
    }
}

impl AcmeClient for Certbot {
    async fn obtain(&self, request: &CertRequest) -> eyre::Result<()> {
        log::info!("Executing certbot...");

        let status = Command::new(&self.program)
            .args(self.args(request))
            .status()
            .await
            .wrap_err_with(|| format!("Unable to start {}", self.program.display()))?;

        if !status.success() {
            return Err(eyre!("Unable to run certbot ({status})"));
        }

        Ok(())
    }
}

/// The shared directory holding the current certificate files.
#[derive(Debug, Clone)]
pub struct CertCache {
    dir: PathBuf,
}

impl CertCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Replace the cached files with the ones in `source`.
    ///
    /// Existing files are removed first. Symlinks in `source` (certbot's `live` dir is made of
    /// them) are followed, so the cache receives the actual file contents.
    ///
    /// Nothing is removed unless `source` holds both `cert.pem` and `privkey.pem`.
    pub fn replace_from(&self, source: &Path) -> eyre::Result<()> {
        log::info!(
            "Replace the certificate in {} with {}",
            self.dir.display(),
            source.display()
        );

        let issued = CertificateFiles::in_dir(source);
        for path in [&issued.public_key, &issued.private_key] {
            if !path.is_file() {
                return Err(eyre!(
                    "certbot output is missing {}, keeping the cached certificate",
                    path.display()
                ));
            }
        }

        fs::create_dir_all(&self.dir)
            .wrap_err_with(|| format!("Unable to create {}", self.dir.display()))?;

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() {
                fs::remove_file(&path)
                    .wrap_err_with(|| format!("Unable to remove {}", path.display()))?;
            }
        }

        let entries = fs::read_dir(source)
            .wrap_err_with(|| format!("Unable to read {}", source.display()))?;

        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            let Some(name) = path.file_name() else {
                continue;
            };

            let target = self.dir.join(name);
            log::debug!("copy {} -> {}", path.display(), target.display());
            fs::copy(&path, &target)
                .wrap_err_with(|| format!("Unable to copy {}", path.display()))?;
        }

        Ok(())
    }
}
