//! JSON API payloads of the SLB and Log Service APIs.
//!
//! Only the fields this crate reads or writes are modelled. Replies are deserialized leniently:
//! a field the procedure depends on being absent is reported by the caller, together with the raw
//! response.

use std::fmt;

use serde::{Deserialize, Serialize};

mod logtail;
mod slb;

pub use self::{
    logtail::{LogtailConfig, LogtailInputDetail, LogtailOutputDetail},
    slb::{
        DescribeLoadBalancers, DescribeServerCertificates, HttpsListenerAttribute, LoadBalancer,
        LoadBalancers, ServerCertificate, ServerCertificates, SetListenerReply,
        UploadServerCertificate,
    },
};

/// Error code the Log Service replies with when a Logtail configuration doesn't exist.
pub const CONFIG_NOT_EXIST: &str = "ConfigNotExist";

/// An error reply from one of the cloud APIs.
///
/// The SLB API spells the fields `Code` / `Message` / `RequestId`; the Log Service uses
/// `errorCode` / `errorMessage` and returns the request ID in a header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(skip)]
    pub status: u16,

    #[serde(rename = "Code", alias = "errorCode")]
    pub code: String,

    #[serde(rename = "Message", alias = "errorMessage", default)]
    pub message: Option<String>,

    #[serde(rename = "RequestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl Problem {
    /// Returns true if the problem says the requested Logtail configuration doesn't exist.
    ///
    /// Authentication, network and server failures are not "not found".
    pub fn is_not_found(&self) -> bool {
        self.code == CONFIG_NOT_EXIST
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (HTTP {})", self.code, self.status)?;

        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }

        if let Some(request_id) = &self.request_id {
            write!(f, " [request id: {request_id}]")?;
        }

        Ok(())
    }
}

impl std::error::Error for Problem {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slb_problem() {
        let problem: Problem = serde_json::from_str(
            r#"{
                "RequestId": "D5D5BB2A-1BE4-4D1B-A5C1-6D1D8A1C4E4B",
                "HostId": "slb.aliyuncs.com",
                "Code": "InvalidAccessKeyId.NotFound",
                "Message": "Specified access key is not found."
            }"#,
        )
        .unwrap();

        assert_eq!(problem.code, "InvalidAccessKeyId.NotFound");
        assert!(!problem.is_not_found());
        assert_eq!(
            problem.request_id.as_deref(),
            Some("D5D5BB2A-1BE4-4D1B-A5C1-6D1D8A1C4E4B")
        );
    }

    #[test]
    fn test_log_problem() {
        let mut problem: Problem = serde_json::from_str(
            r#"{"errorCode": "ConfigNotExist", "errorMessage": "config sample-app-logtail-config-dev does not exist"}"#,
        )
        .unwrap();
        problem.status = 404;

        assert!(problem.is_not_found());
        assert_eq!(
            problem.to_string(),
            "ConfigNotExist (HTTP 404): config sample-app-logtail-config-dev does not exist"
        );
    }

    #[test]
    fn test_unauthorized_is_not_not_found() {
        let problem: Problem = serde_json::from_str(
            r#"{"errorCode": "Unauthorized", "errorMessage": "denied by sts or ram"}"#,
        )
        .unwrap();

        assert!(!problem.is_not_found());
    }
}
