use std::time::Duration;

use crate::api::Problem;

pub(crate) type ReqResult<T> = std::result::Result<T, Problem>;

/// Connection timeout for the cloud APIs. Requests themselves are not bounded.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn http_client() -> eyre::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?)
}

/// A successful reply, with the body kept verbatim for diagnostics.
#[derive(Debug, Clone)]
pub(crate) struct RawReply {
    pub body: String,
}

/// Read the reply body, turning non-2xx statuses into a [`Problem`].
pub(crate) async fn req_handle_error(res: reqwest::Response) -> ReqResult<RawReply> {
    let status = res.status();
    let request_id = res
        .headers()
        .get("x-log-requestid")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = req_safe_read_body(res).await;
    log::debug!("HTTP {status}: {body}");

    // ok responses pass through
    if status.is_success() {
        return Ok(RawReply { body });
    }

    let mut problem = serde_json::from_str::<Problem>(&body).unwrap_or_else(|_| Problem {
        code: "httpReqError".to_owned(),
        message: Some(format!("{status} body: {body}")),
        ..Default::default()
    });
    problem.status = status.as_u16();

    if problem.request_id.is_none() {
        problem.request_id = request_id;
    }

    Err(problem)
}

/// A transport failure, before any HTTP status was received.
pub(crate) fn req_transport_error(err: reqwest::Error) -> Problem {
    Problem {
        code: "transportError".to_owned(),
        message: Some(err.to_string()),
        ..Default::default()
    }
}

pub(crate) async fn req_safe_read_body(res: reqwest::Response) -> String {
    // a reset after the body was sent shouldn't hide the body
    res.text().await.unwrap_or_default()
}
