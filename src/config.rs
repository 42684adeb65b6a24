use std::{
    fmt,
    path::{Path, PathBuf},
};

use eyre::WrapErr as _;
use serde::Deserialize;

/// Where the certificate updater looks for its configuration by default.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/certificate-updater/config.ini";

const DEFAULT_SLB_ENDPOINT: &str = "https://slb.aliyuncs.com";
const DEFAULT_APP_NAME: &str = "sample-app";
const DEFAULT_CERTIFICATE_ROOT: &str = "/mnt/oss_bucket/certificate";
const DEFAULT_LETSENCRYPT_LIVE: &str = "/etc/letsencrypt/live";
const DEFAULT_WEB_ROOT: &str = "/var/www/html/certman/.well-known/";
const DEFAULT_CERTBOT: &str = "certbot";
const DEFAULT_CERTBOT_CRON: &str = "/etc/cron.d/certbot";
const DEFAULT_LISTENER_PORT: u16 = 443;

/// Access key pair used to sign requests against the cloud APIs.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(rename = "AccessKeyId", alias = "accesskeyid")]
    pub access_key_id: String,

    #[serde(rename = "AccessKeySecret", alias = "accesskeysecret")]
    pub access_key_secret: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudSection {
    #[serde(flatten)]
    pub credentials: Credentials,

    #[serde(rename = "RegionId", alias = "regionid")]
    pub region_id: String,

    #[serde(rename = "SlbEndpoint", alias = "slbendpoint", default = "default_slb_endpoint")]
    pub slb_endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentSection {
    #[serde(rename = "Environment", alias = "environment")]
    pub environment: String,

    #[serde(rename = "Domain", alias = "domain")]
    pub domain: String,

    #[serde(rename = "SubDomain", alias = "subdomain")]
    pub sub_domain: String,

    #[serde(rename = "EmailAddress", alias = "emailaddress")]
    pub email_address: String,

    #[serde(rename = "AppName", alias = "appname", default = "default_app_name")]
    pub app_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    /// Root of the shared certificate storage; one sub-directory per environment.
    #[serde(
        rename = "CertificateRoot",
        alias = "certificateroot",
        default = "default_certificate_root"
    )]
    pub certificate_root: PathBuf,

    /// Directory where certbot publishes issued certificates.
    #[serde(
        rename = "LetsEncryptLive",
        alias = "letsencryptlive",
        default = "default_letsencrypt_live"
    )]
    pub letsencrypt_live: PathBuf,

    /// Webroot handed to certbot's `--webroot` plugin.
    #[serde(rename = "WebRoot", alias = "webroot", default = "default_web_root")]
    pub web_root: PathBuf,

    #[serde(rename = "Certbot", alias = "certbot", default = "default_certbot")]
    pub certbot: PathBuf,

    /// Cron entry of the distribution's certbot package. Only reported, never required.
    #[serde(
        rename = "CertbotCron",
        alias = "certbotcron",
        default = "default_certbot_cron"
    )]
    pub certbot_cron: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            certificate_root: default_certificate_root(),
            letsencrypt_live: default_letsencrypt_live(),
            web_root: default_web_root(),
            certbot: default_certbot(),
            certbot_cron: default_certbot_cron(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlbSection {
    #[serde(
        rename = "ListenerPort",
        alias = "listenerport",
        default = "default_listener_port"
    )]
    pub listener_port: u16,
}

impl Default for SlbSection {
    fn default() -> Self {
        Self {
            listener_port: default_listener_port(),
        }
    }
}

/// Configuration of the certificate updater.
///
/// Loaded once at start and passed by reference to each step of the procedure.
///
/// # Example INI
///
/// ```ini
/// [AlibabaCloud]
/// AccessKeyId = LTAI...
/// AccessKeySecret = ...
/// RegionId = ap-southeast-1
///
/// [Environment]
/// Environment = dev
/// Domain = my-sample-domain.xyz
/// SubDomain = dev
/// EmailAddress = admin@my-sample-domain.xyz
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct UpdaterConfig {
    #[serde(rename = "AlibabaCloud", alias = "alibabacloud")]
    pub cloud: CloudSection,

    #[serde(rename = "Environment", alias = "environment")]
    pub environment: EnvironmentSection,

    #[serde(rename = "Paths", alias = "paths", default)]
    pub paths: PathsSection,

    #[serde(rename = "Slb", alias = "slb", default)]
    pub slb: SlbSection,
}

impl UpdaterConfig {
    /// Reads the INI file at `path`, with `CERTMAN_<SECTION>__<KEY>` environment variables taking
    /// precedence over the file.
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let source = config::Config::builder()
            .add_source(config::File::new(
                &path.to_string_lossy(),
                config::FileFormat::Ini,
            ))
            .add_source(
                config::Environment::with_prefix("CERTMAN")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .wrap_err_with(|| format!("Failed to read configuration file: {}", path.display()))?;

        source
            .try_deserialize()
            .wrap_err_with(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Parses configuration from INI text, without consulting the environment.
    pub fn from_ini_str(ini: &str) -> eyre::Result<Self> {
        config::Config::builder()
            .add_source(config::File::from_str(ini, config::FileFormat::Ini))
            .build()?
            .try_deserialize()
            .wrap_err("Invalid configuration")
    }

    pub fn credentials(&self) -> &Credentials {
        &self.cloud.credentials
    }

    /// The `subdomain.domain` name the certificate is issued for.
    pub fn fqdn(&self) -> String {
        format!(
            "{}.{}",
            self.environment.sub_domain, self.environment.domain
        )
    }

    /// Shared location holding the current `cert.pem` and `privkey.pem`.
    pub fn certificate_cache_dir(&self) -> PathBuf {
        self.paths
            .certificate_root
            .join(&self.environment.environment)
            .join("letsencrypt")
    }

    /// Directory certbot writes the issued certificate into.
    pub fn certbot_output_dir(&self) -> PathBuf {
        self.paths.letsencrypt_live.join(self.fqdn())
    }

    pub fn load_balancer_name(&self) -> String {
        format!(
            "{}-slb-{}",
            self.environment.app_name, self.environment.environment
        )
    }

    /// Name of an uploaded certificate; `timestamp` is formatted `YYYYmmddHHMMSS`.
    pub fn server_certificate_name(&self, timestamp: &str) -> String {
        format!(
            "{}-slb-certificate-{}-{timestamp}",
            self.environment.app_name, self.environment.environment
        )
    }
}

fn default_slb_endpoint() -> String {
    DEFAULT_SLB_ENDPOINT.to_owned()
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_owned()
}

fn default_certificate_root() -> PathBuf {
    PathBuf::from(DEFAULT_CERTIFICATE_ROOT)
}

fn default_letsencrypt_live() -> PathBuf {
    PathBuf::from(DEFAULT_LETSENCRYPT_LIVE)
}

fn default_web_root() -> PathBuf {
    PathBuf::from(DEFAULT_WEB_ROOT)
}

fn default_certbot() -> PathBuf {
    PathBuf::from(DEFAULT_CERTBOT)
}

fn default_certbot_cron() -> PathBuf {
    PathBuf::from(DEFAULT_CERTBOT_CRON)
}

fn default_listener_port() -> u16 {
    DEFAULT_LISTENER_PORT
}
