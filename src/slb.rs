//! Client for the Server Load Balancer (SLB) RPC API.

use std::collections::BTreeMap;

use eyre::WrapErr as _;
use serde::de::DeserializeOwned;
use time::{macros::format_description, OffsetDateTime};

use crate::{
    api,
    config::Credentials,
    req::{http_client, req_handle_error, req_transport_error},
    util::{hmac_sha1_base64, percent_encode},
};

const API_VERSION: &str = "2014-05-15";
const DEFAULT_ENDPOINT: &str = "https://slb.aliyuncs.com";

/// A decoded reply together with the body it was decoded from.
#[derive(Debug, Clone)]
pub struct Reply<T> {
    pub body: T,
    pub raw: String,
}

/// Signed access to the SLB API of one region.
#[derive(Debug, Clone)]
pub struct SlbClient {
    http: reqwest::Client,
    credentials: Credentials,
    region_id: String,
    endpoint: String,
}

impl SlbClient {
    pub fn new(credentials: Credentials, region_id: impl Into<String>) -> eyre::Result<Self> {
        Ok(Self {
            http: http_client()?,
            credentials,
            region_id: region_id.into(),
            endpoint: DEFAULT_ENDPOINT.to_owned(),
        })
    }

    /// Send requests to `endpoint` (scheme and host, no path) instead of the public endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    pub async fn describe_load_balancers(
        &self,
        name: &str,
    ) -> eyre::Result<Reply<api::DescribeLoadBalancers>> {
        self.call("DescribeLoadBalancers", &[("LoadBalancerName", name)])
            .await
    }

    pub async fn describe_https_listener(
        &self,
        load_balancer_id: &str,
        listener_port: u16,
    ) -> eyre::Result<Reply<api::HttpsListenerAttribute>> {
        let port = listener_port.to_string();
        self.call(
            "DescribeLoadBalancerHTTPSListenerAttribute",
            &[
                ("ListenerPort", port.as_str()),
                ("LoadBalancerId", load_balancer_id),
            ],
        )
        .await
    }

    pub async fn describe_server_certificate(
        &self,
        certificate_id: &str,
    ) -> eyre::Result<Reply<api::DescribeServerCertificates>> {
        self.call(
            "DescribeServerCertificates",
            &[("ServerCertificateId", certificate_id)],
        )
        .await
    }

    pub async fn upload_server_certificate(
        &self,
        name: &str,
        certificate_pem: &str,
        private_key_pem: &str,
    ) -> eyre::Result<Reply<api::UploadServerCertificate>> {
        self.call(
            "UploadServerCertificate",
            &[
                ("ServerCertificate", certificate_pem),
                ("PrivateKey", private_key_pem),
                ("ServerCertificateName", name),
            ],
        )
        .await
    }

    pub async fn set_https_listener_certificate(
        &self,
        load_balancer_id: &str,
        listener_port: u16,
        certificate_id: &str,
    ) -> eyre::Result<Reply<api::SetListenerReply>> {
        let port = listener_port.to_string();
        self.call(
            "SetLoadBalancerHTTPSListenerAttribute",
            &[
                ("ListenerPort", port.as_str()),
                ("LoadBalancerId", load_balancer_id),
                ("ServerCertificateId", certificate_id),
            ],
        )
        .await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> eyre::Result<Reply<T>> {
        let mut all = self.common_params(action);
        for (key, value) in params {
            all.insert((*key).to_owned(), (*value).to_owned());
        }

        let body = signed_body(&all, &self.credentials.access_key_secret);

        log::debug!("Call SLB action: {action}");

        let res = self
            .http
            .post(format!("{}/", self.endpoint))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await
            .map_err(req_transport_error)?;

        let reply = req_handle_error(res)
            .await
            .wrap_err_with(|| format!("SLB action {action} failed"))?;

        let body = serde_json::from_str(&reply.body)
            .wrap_err_with(|| format!("Unexpected {action} response: {}", reply.body))?;

        Ok(Reply {
            body,
            raw: reply.body,
        })
    }

    fn common_params(&self, action: &str) -> BTreeMap<String, String> {
        let timestamp = OffsetDateTime::now_utc()
            .format(format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
            ))
            .unwrap_or_default();

        [
            ("AccessKeyId", self.credentials.access_key_id.clone()),
            ("Action", action.to_owned()),
            ("Format", "JSON".to_owned()),
            ("RegionId", self.region_id.clone()),
            ("SignatureMethod", "HMAC-SHA1".to_owned()),
            ("SignatureNonce", format!("{:032x}", rand::random::<u128>())),
            ("SignatureVersion", "1.0".to_owned()),
            ("Timestamp", timestamp),
            ("Version", API_VERSION.to_owned()),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect()
    }
}

/// Sorted, percent-encoded `key=value` pairs joined with `&`.
fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", percent_encode(key), percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn string_to_sign(method: &str, canonical_query: &str) -> String {
    format!(
        "{method}&{}&{}",
        percent_encode("/"),
        percent_encode(canonical_query)
    )
}

fn signature(method: &str, canonical_query: &str, access_key_secret: &str) -> String {
    let to_sign = string_to_sign(method, canonical_query);
    hmac_sha1_base64(format!("{access_key_secret}&").as_bytes(), to_sign.as_bytes())
}

/// Form body carrying `params` and their signature.
fn signed_body(params: &BTreeMap<String, String>, access_key_secret: &str) -> String {
    let query = canonical_query(params);
    let signature = signature("POST", &query, access_key_secret);
    format!("{query}&Signature={}", percent_encode(&signature))
}

/// Checks a form body produced by [`signed_body`]; used by the mock server in tests.
#[cfg(test)]
pub(crate) fn verify_signed_body(body: &str, access_key_secret: &str) -> eyre::Result<()> {
    let (query, signature) = body
        .rsplit_once("&Signature=")
        .ok_or_else(|| eyre::eyre!("no signature"))?;

    if percent_encode(&self::signature("POST", query, access_key_secret)) != signature {
        return Err(eyre::eyre!("signature mismatch"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{with_slb_server, SlbBehavior};

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_string_to_sign() {
        let params = params(&[
            ("Version", "2014-05-26"),
            ("Timestamp", "2016-02-23T12:46:24Z"),
            ("SignatureVersion", "1.0"),
            ("SignatureNonce", "3ee8c1b8-83d3-44af-a94f-4e0ad82fd6cf"),
            ("SignatureMethod", "HMAC-SHA1"),
            ("Format", "XML"),
            ("Action", "DescribeRegions"),
            ("AccessKeyId", "testid"),
        ]);

        assert_eq!(
            string_to_sign("GET", &canonical_query(&params)),
            "GET&%2F&AccessKeyId%3Dtestid%26Action%3DDescribeRegions%26Format%3DXML\
             %26SignatureMethod%3DHMAC-SHA1%26SignatureNonce%3D3ee8c1b8-83d3-44af-a94f-4e0ad82fd6cf\
             %26SignatureVersion%3D1.0%26Timestamp%3D2016-02-23T12%253A46%253A24Z%26Version%3D2014-05-26"
        );
    }

    #[test]
    fn test_signature_uses_secret_with_ampersand() {
        let query = canonical_query(&params(&[("Action", "DescribeRegions")]));
        let to_sign = string_to_sign("POST", &query);

        assert_eq!(
            signature("POST", &query, "testsecret"),
            hmac_sha1_base64(b"testsecret&", to_sign.as_bytes())
        );
    }

    #[test]
    fn test_signed_body_verifies() {
        let body = signed_body(
            &params(&[("Action", "UploadServerCertificate"), ("PrivateKey", "a+b/c=\n")]),
            "s3cr3t",
        );

        assert!(body.contains("PrivateKey=a%2Bb%2Fc%3D%0A"));
        verify_signed_body(&body, "s3cr3t").unwrap();
        assert!(verify_signed_body(&body, "other").is_err());
    }

    #[tokio::test]
    async fn test_describe_load_balancers() {
        let server = with_slb_server(SlbBehavior::default());
        let client = server.client();

        let reply = client
            .describe_load_balancers("sample-app-slb-dev")
            .await
            .unwrap();
        assert_eq!(reply.body.single().unwrap().load_balancer_id, "lb-test");
        assert!(reply.raw.contains("lb-test"));

        let calls = server.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].action, "DescribeLoadBalancers");
        assert_eq!(calls[0].param("LoadBalancerName"), Some("sample-app-slb-dev"));
        assert_eq!(calls[0].param("RegionId"), Some("ap-southeast-1"));
        assert_eq!(calls[0].param("Format"), Some("JSON"));
    }

    #[tokio::test]
    async fn test_error_reply_is_a_problem() {
        let server = with_slb_server(SlbBehavior::default());
        let client = SlbClient::new(
            Credentials::new("LTAItest", "wrong-secret"),
            "ap-southeast-1",
        )
        .unwrap()
        .with_endpoint(&server.url);

        let err = client
            .describe_load_balancers("sample-app-slb-dev")
            .await
            .unwrap_err();

        let problem = err.downcast_ref::<api::Problem>().unwrap();
        assert_eq!(problem.code, "SignatureDoesNotMatch");
        assert_eq!(problem.status, 400);
    }
}
