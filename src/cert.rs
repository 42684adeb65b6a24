use std::{
    fs,
    io::{BufReader, Cursor},
    path::{Path, PathBuf},
};

use der::Decode as _;
use eyre::{eyre, WrapErr as _};
use sha1::{Digest as _, Sha1};
use time::{Duration, OffsetDateTime};
use zeroize::Zeroizing;

/// File name of the public certificate in a certificate directory.
pub const CERT_FILE: &str = "cert.pem";

/// File name of the private key in a certificate directory.
pub const PRIVATE_KEY_FILE: &str = "privkey.pem";

/// How close to its expiry a certificate gets renewed.
pub const RENEWAL_WINDOW: Duration = Duration::weeks(1);

const PKCS8_LABEL: &str = "PRIVATE KEY";
const RSA_LABEL: &str = "RSA PRIVATE KEY";

/// Location of a `cert.pem` / `privkey.pem` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateFiles {
    pub public_key: PathBuf,
    pub private_key: PathBuf,
}

impl CertificateFiles {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            public_key: dir.join(CERT_FILE),
            private_key: dir.join(PRIVATE_KEY_FILE),
        }
    }
}

/// Freshness of the locally cached certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertStatus {
    pub public_key_exists: bool,
    pub private_key_exists: bool,
    pub expires_soon: bool,
}

impl CertStatus {
    /// Inspect the certificate files relative to `now`.
    ///
    /// Expiry is only looked at when the public key exists. A public key that exists but doesn't
    /// parse is an error rather than a reason to renew.
    pub fn inspect(files: &CertificateFiles, now: OffsetDateTime) -> eyre::Result<Self> {
        let public_key_exists = files.public_key.exists();
        let private_key_exists = files.private_key.exists();

        let expires_soon = if public_key_exists {
            let not_after = LocalCertificate::read_public(&files.public_key)?.not_after()?;
            now + RENEWAL_WINDOW > not_after
        } else {
            false
        };

        Ok(Self {
            public_key_exists,
            private_key_exists,
            expires_soon,
        })
    }

    pub fn needs_renewal(&self) -> bool {
        !self.public_key_exists || !self.private_key_exists || self.expires_soon
    }
}

/// The certificate and private key cached on the shared storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCertificate {
    certificate: String,
    private_key_pem: Option<Zeroizing<String>>,
}

impl LocalCertificate {
    /// Read both the certificate and its private key.
    pub fn load(files: &CertificateFiles) -> eyre::Result<Self> {
        let mut cert = Self::read_public(&files.public_key)?;

        let private_key_pem = fs::read_to_string(&files.private_key).wrap_err_with(|| {
            format!("Unable to read private key {}", files.private_key.display())
        })?;
        cert.private_key_pem = Some(Zeroizing::new(private_key_pem));

        Ok(cert)
    }

    fn read_public(path: &Path) -> eyre::Result<Self> {
        let certificate = fs::read_to_string(path)
            .wrap_err_with(|| format!("Unable to read certificate {}", path.display()))?;
        Self::parse(certificate, None)
    }

    /// Validates `certificate` holds at least one X.509 certificate.
    pub fn parse(
        certificate: String,
        private_key_pem: Option<Zeroizing<String>>,
    ) -> eyre::Result<Self> {
        let cert = LocalCertificate {
            certificate,
            private_key_pem,
        };
        x509_cert::Certificate::from_der(&cert.end_entity_der()?)
            .wrap_err("Invalid X.509 certificate")?;
        Ok(cert)
    }

    /// The certificate file in PEM format.
    pub fn certificate(&self) -> &str {
        &self.certificate
    }

    /// DER of the first certificate in the file.
    fn end_entity_der(&self) -> eyre::Result<Vec<u8>> {
        let mut rdr = BufReader::new(Cursor::new(self.certificate.as_bytes()));

        let first = rustls_pemfile::certs(&mut rdr)
            .next()
            .ok_or_else(|| eyre!("no certificates in PEM"))?
            .wrap_err("Malformed PEM certificate")?;

        Ok(first.to_vec())
    }

    /// Expiry of the certificate.
    pub fn not_after(&self) -> eyre::Result<OffsetDateTime> {
        let cert = x509_cert::Certificate::from_der(&self.end_entity_der()?)?;
        let not_after = cert.tbs_certificate.validity.not_after.to_unix_duration();

        let secs = i64::try_from(not_after.as_secs())?;
        Ok(OffsetDateTime::from_unix_timestamp(secs)?)
    }

    /// SHA-1 fingerprint of the certificate, as colon separated upper-case hex (`AB:CD:...`).
    pub fn fingerprint(&self) -> eyre::Result<String> {
        let digest = Sha1::digest(self.end_entity_der()?);

        Ok(digest
            .iter()
            .map(|byte| format!("{byte:02X}"))
            .collect::<Vec<_>>()
            .join(":"))
    }

    /// Whether `remote` is the fingerprint of this certificate, ignoring letter case.
    pub fn matches_fingerprint(&self, remote: &str) -> eyre::Result<bool> {
        Ok(self.fingerprint()?.eq_ignore_ascii_case(remote.trim()))
    }

    /// The private key in PEM format, as found on disk.
    pub fn private_key(&self) -> eyre::Result<&str> {
        self.private_key_pem
            .as_deref()
            .map(String::as_str)
            .ok_or_else(|| eyre!("private key not loaded"))
    }

    /// The private key with `RSA PRIVATE KEY` PEM boundaries, which is the form the SLB accepts.
    pub fn rsa_private_key_pem(&self) -> eyre::Result<Zeroizing<String>> {
        relabel_rsa_private_key(self.private_key()?)
    }
}

/// Rewrites `BEGIN/END PRIVATE KEY` boundaries to `BEGIN/END RSA PRIVATE KEY`.
///
/// Only the boundaries change; the encoded key is kept as is.
pub fn relabel_rsa_private_key(pem: &str) -> eyre::Result<Zeroizing<String>> {
    let (label, der) = pem::decode_vec(pem.trim().as_bytes())
        .map_err(|err| eyre!("Malformed private key PEM: {err}"))?;
    let der = Zeroizing::new(der);

    match label {
        RSA_LABEL => Ok(Zeroizing::new(pem.to_owned())),
        PKCS8_LABEL => pem::encode_string(RSA_LABEL, pem::LineEnding::LF, &der)
            .map(Zeroizing::new)
            .map_err(|err| eyre!("Unable to encode private key PEM: {err}")),
        other => Err(eyre!("Unexpected private key PEM label: {other}")),
    }
}
