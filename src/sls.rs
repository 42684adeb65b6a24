//! Client for the Log Service (SLS) REST API, limited to Logtail configurations.

use std::{collections::BTreeMap, time::SystemTime};

use eyre::WrapErr as _;
use md5::{Digest as _, Md5};
use reqwest::{header, Method};

use crate::{
    api::LogtailConfig,
    config::Credentials,
    req::{http_client, req_handle_error, req_transport_error, RawReply, ReqResult},
    util::{hmac_sha1_base64, percent_encode},
};

const API_VERSION: &str = "0.6.0";
const SIGNATURE_METHOD: &str = "hmac-sha1";
const JSON: &str = "application/json";

/// Signed access to one log project.
#[derive(Debug, Clone)]
pub struct LogClient {
    http: reqwest::Client,
    credentials: Credentials,
    project: String,
    base_url: String,
}

impl LogClient {
    /// Client for `project` in `region_id`, using the public `<region>.log.aliyuncs.com` endpoint.
    pub fn new(
        credentials: Credentials,
        region_id: &str,
        project: impl Into<String>,
    ) -> eyre::Result<Self> {
        let project = project.into();
        let base_url = format!("https://{project}.{region_id}.log.aliyuncs.com");

        Ok(Self {
            http: http_client()?,
            credentials,
            project,
            base_url,
        })
    }

    /// Send requests to `base_url` instead of the project's public endpoint.
    pub fn with_endpoint(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the Logtail configuration `config_name`.
    ///
    /// Returns `None` only when the service says the configuration doesn't exist; every other
    /// failure is an error.
    pub async fn get_logtail_config(
        &self,
        config_name: &str,
    ) -> eyre::Result<Option<LogtailConfig>> {
        let resource = format!("/configs/{}", percent_encode(config_name));

        match self.send(Method::GET, &resource, None).await {
            Ok(reply) => {
                let config = serde_json::from_str(&reply.body).wrap_err_with(|| {
                    format!("Unexpected Logtail configuration: {}", reply.body)
                })?;
                Ok(Some(config))
            }
            Err(problem) if problem.is_not_found() => {
                log::debug!("{problem}");
                Ok(None)
            }
            Err(problem) => Err(problem)
                .wrap_err_with(|| format!("Unable to load Logtail configuration {config_name}")),
        }
    }

    pub async fn create_logtail_config(&self, config: &LogtailConfig) -> eyre::Result<()> {
        let body = serde_json::to_vec(config)?;

        self.send(Method::POST, "/configs", Some(body))
            .await
            .wrap_err_with(|| {
                format!("Unable to create Logtail configuration {}", config.config_name)
            })?;

        Ok(())
    }

    pub async fn update_logtail_config(&self, config: &LogtailConfig) -> eyre::Result<()> {
        let resource = format!("/configs/{}", percent_encode(&config.config_name));
        let body = serde_json::to_vec(config)?;

        self.send(Method::PUT, &resource, Some(body))
            .await
            .wrap_err_with(|| {
                format!("Unable to update Logtail configuration {}", config.config_name)
            })?;

        Ok(())
    }

    pub async fn apply_config_to_machine_group(
        &self,
        config_name: &str,
        group_name: &str,
    ) -> eyre::Result<()> {
        let resource = format!(
            "/machinegroups/{}/configs/{}",
            percent_encode(group_name),
            percent_encode(config_name)
        );

        self.send(Method::PUT, &resource, None)
            .await
            .wrap_err_with(|| {
                format!("Unable to apply Logtail configuration {config_name} to {group_name}")
            })?;

        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        resource: &str,
        body: Option<Vec<u8>>,
    ) -> ReqResult<RawReply> {
        let date = httpdate::fmt_http_date(SystemTime::now());
        let body = body.unwrap_or_default();

        let mut log_headers = BTreeMap::new();
        log_headers.insert("x-log-apiversion", API_VERSION.to_owned());
        log_headers.insert("x-log-bodyrawsize", body.len().to_string());
        log_headers.insert("x-log-signaturemethod", SIGNATURE_METHOD.to_owned());

        let (content_md5, content_type) = if body.is_empty() {
            (String::new(), "")
        } else {
            (content_md5(&body), JSON)
        };

        let to_sign = string_to_sign(
            method.as_str(),
            &content_md5,
            content_type,
            &date,
            &log_headers,
            resource,
        );
        log::trace!("string to sign: {to_sign:?}");

        let authorization = format!(
            "LOG {}:{}",
            self.credentials.access_key_id,
            hmac_sha1_base64(
                self.credentials.access_key_secret.as_bytes(),
                to_sign.as_bytes()
            )
        );

        log::debug!("Call log service: {method} {resource}");

        let mut req = self
            .http
            .request(method, format!("{}{resource}", self.base_url))
            .header(header::DATE, date)
            .header(header::AUTHORIZATION, authorization);

        for (name, value) in log_headers {
            req = req.header(name, value);
        }

        if !body.is_empty() {
            req = req
                .header(header::CONTENT_TYPE, content_type)
                .header("Content-MD5", content_md5);
        }

        let res = req.body(body).send().await.map_err(req_transport_error)?;

        req_handle_error(res).await
    }
}

/// Upper-case hex MD5 of the request body.
fn content_md5(body: &[u8]) -> String {
    Md5::digest(body)
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect()
}

/// The log service's canonical request: verb, body digest and type, date, `x-log-`/`x-acs-`
/// headers sorted by name, and the resource path.
fn string_to_sign(
    method: &str,
    content_md5: &str,
    content_type: &str,
    date: &str,
    headers: &BTreeMap<&str, String>,
    resource: &str,
) -> String {
    let canonical_headers = headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .filter(|(name, _)| name.starts_with("x-log-") || name.starts_with("x-acs-"))
        .map(|(name, value)| format!("{name}:{value}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{method}\n{content_md5}\n{content_type}\n{date}\n{canonical_headers}\n{resource}")
}

/// Checks the `Authorization` header of a received request. `headers` are keyed by lower-case
/// name.
#[cfg(test)]
pub(crate) fn verify_authorization(
    method: &str,
    resource: &str,
    headers: &BTreeMap<String, String>,
    credentials: &Credentials,
) -> eyre::Result<()> {
    let header = |name: &str| headers.get(name).map(String::as_str).unwrap_or_default();

    let log_headers = headers
        .iter()
        .filter(|(name, _)| name.starts_with("x-log-") || name.starts_with("x-acs-"))
        .map(|(name, value)| (name.as_str(), value.clone()))
        .collect::<BTreeMap<_, _>>();

    let to_sign = string_to_sign(
        method,
        header("content-md5"),
        header("content-type"),
        header("date"),
        &log_headers,
        resource,
    );
    let expected = format!(
        "LOG {}:{}",
        credentials.access_key_id,
        hmac_sha1_base64(
            credentials.access_key_secret.as_bytes(),
            to_sign.as_bytes()
        )
    );

    if header("authorization") != expected {
        return Err(eyre::eyre!("signature mismatch"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{test_credentials, with_log_server, LogBehavior, TEST_KEY_ID, TEST_REGION};

    #[test]
    fn test_content_md5() {
        assert_eq!(content_md5(b""), "D41D8CD98F00B204E9800998ECF8427E");
        assert_eq!(
            content_md5(b"The quick brown fox jumps over the lazy dog"),
            "9E107D9D372BB6826BD81D3542A419D6"
        );
    }

    #[test]
    fn test_string_to_sign() {
        let mut headers = BTreeMap::new();
        headers.insert("x-log-signaturemethod", "hmac-sha1".to_owned());
        headers.insert("x-log-apiversion", "0.6.0".to_owned());
        headers.insert("x-log-bodyrawsize", "0".to_owned());

        assert_eq!(
            string_to_sign(
                "GET",
                "",
                "",
                "Mon, 09 Nov 2015 06:11:16 GMT",
                &headers,
                "/configs/sample-app-logtail-config-dev",
            ),
            "GET\n\n\nMon, 09 Nov 2015 06:11:16 GMT\n\
             x-log-apiversion:0.6.0\nx-log-bodyrawsize:0\nx-log-signaturemethod:hmac-sha1\n\
             /configs/sample-app-logtail-config-dev"
        );
    }

    #[tokio::test]
    async fn test_missing_config_is_none() {
        let server = with_log_server(LogBehavior::Missing);
        let client = server.client();

        let config = client
            .get_logtail_config("sample-app-logtail-config-dev")
            .await
            .unwrap();
        assert!(config.is_none());
    }

    #[tokio::test]
    async fn test_existing_config_is_loaded() {
        let server = with_log_server(LogBehavior::Existing);
        let client = server.client();

        let config = client
            .get_logtail_config("sample-app-logtail-config-dev")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(config.config_name, "sample-app-logtail-config-dev");
        assert_eq!(config.output_detail.logstore_name, "sample-app-log-store-dev");

        let calls = server.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "GET");
        assert_eq!(calls[0].path, "/configs/sample-app-logtail-config-dev");
        assert!(calls[0].authorization.starts_with("LOG LTAItest:"));
    }

    #[tokio::test]
    async fn test_other_failures_are_errors() {
        let server = with_log_server(LogBehavior::Unauthorized);
        let client = server.client();

        let err = client
            .get_logtail_config("sample-app-logtail-config-dev")
            .await
            .unwrap_err();

        let problem = err.downcast_ref::<crate::api::Problem>().unwrap();
        assert_eq!(problem.code, "Unauthorized");
        assert_eq!(problem.status, 401);
    }

    #[tokio::test]
    async fn test_create_sends_signed_json() {
        let server = with_log_server(LogBehavior::Missing);
        let client = server.client();

        let config = LogtailConfig::syslog(
            "sample-app-logtail-config-dev",
            "sample-app-log-store-dev",
            "sys_tag",
        );
        client.create_logtail_config(&config).await.unwrap();

        let calls = server.calls();
        assert_eq!(calls[0].method, "POST");
        assert_eq!(calls[0].path, "/configs");
        assert_eq!(calls[0].content_md5.as_deref(), Some(content_md5(&calls[0].body).as_str()));

        let sent: LogtailConfig = serde_json::from_slice(&calls[0].body).unwrap();
        assert_eq!(sent, config);
    }

    #[test]
    fn test_verify_authorization() {
        let mut headers = BTreeMap::new();
        headers.insert("date".to_owned(), "Mon, 09 Nov 2015 06:11:16 GMT".to_owned());
        headers.insert("x-log-apiversion".to_owned(), API_VERSION.to_owned());
        headers.insert("x-log-bodyrawsize".to_owned(), "0".to_owned());
        headers.insert("x-log-signaturemethod".to_owned(), SIGNATURE_METHOD.to_owned());

        let log_headers = headers
            .iter()
            .filter(|(name, _)| name.starts_with("x-log-"))
            .map(|(name, value)| (name.as_str(), value.clone()))
            .collect::<BTreeMap<_, _>>();
        let to_sign = string_to_sign(
            "GET",
            "",
            "",
            "Mon, 09 Nov 2015 06:11:16 GMT",
            &log_headers,
            "/configs/c",
        );
        let authorization = format!(
            "LOG {TEST_KEY_ID}:{}",
            hmac_sha1_base64(b"s3cr3t", to_sign.as_bytes())
        );
        headers.insert("authorization".to_owned(), authorization);

        let creds = test_credentials();
        verify_authorization("GET", "/configs/c", &headers, &creds).unwrap();
        assert!(verify_authorization("PUT", "/configs/c", &headers, &creds).is_err());
        assert!(verify_authorization("GET", "/configs/d", &headers, &creds).is_err());
        assert!(
            verify_authorization("GET", "/configs/c", &headers, &Credentials::new(TEST_KEY_ID, "x"))
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_wrong_secret_is_rejected() {
        let server = with_log_server(LogBehavior::Existing);
        let client = LogClient::new(
            Credentials::new(TEST_KEY_ID, "not-the-secret"),
            TEST_REGION,
            "sample-app-log-project-dev",
        )
        .unwrap()
        .with_endpoint(&server.url);

        let err = client
            .get_logtail_config("sample-app-logtail-config-dev")
            .await
            .unwrap_err();

        let problem = err.downcast_ref::<crate::api::Problem>().unwrap();
        assert_eq!(problem.code, "SignatureNotMatch");
        assert_eq!(problem.status, 401);

        let config = LogtailConfig::syslog("c", "s", "sys_tag");
        let err = client.create_logtail_config(&config).await.unwrap_err();
        let problem = err.downcast_ref::<crate::api::Problem>().unwrap();
        assert_eq!(problem.code, "SignatureNotMatch");
    }
}
