use serde::{Deserialize, Serialize};

/// Reply to `DescribeLoadBalancers`.
///
/// # Example JSON
///
/// ```json
/// {
///   "RequestId": "1D8B8A2E-3E1D-4F4B-8E9A-1C2F0E7B9C11",
///   "TotalCount": 1,
///   "PageNumber": 1,
///   "PageSize": 10,
///   "LoadBalancers": {
///     "LoadBalancer": [
///       {
///         "LoadBalancerId": "lb-gs5ky1wmqcgocb8ahemo3",
///         "LoadBalancerName": "sample-app-slb-dev",
///         "Address": "47.74.215.3"
///       }
///     ]
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeLoadBalancers {
    pub total_count: Option<u64>,
    pub load_balancers: Option<LoadBalancers>,
}

impl DescribeLoadBalancers {
    /// The load balancer, if the reply holds exactly one.
    pub fn single(&self) -> Option<&LoadBalancer> {
        if self.total_count != Some(1) {
            return None;
        }

        match self.load_balancers.as_ref()?.load_balancer.as_slice() {
            [lb] => Some(lb),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoadBalancers {
    pub load_balancer: Vec<LoadBalancer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoadBalancer {
    pub load_balancer_id: String,
    pub load_balancer_name: Option<String>,
    pub address: Option<String>,
}

/// Reply to `DescribeLoadBalancerHTTPSListenerAttribute`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HttpsListenerAttribute {
    pub listener_port: Option<u16>,
    pub server_certificate_id: Option<String>,
    pub status: Option<String>,
}

/// Reply to `DescribeServerCertificates`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeServerCertificates {
    pub server_certificates: Option<ServerCertificates>,
}

impl DescribeServerCertificates {
    pub fn first(&self) -> Option<&ServerCertificate> {
        self.server_certificates
            .as_ref()?
            .server_certificate
            .first()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServerCertificates {
    pub server_certificate: Vec<ServerCertificate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServerCertificate {
    pub server_certificate_id: String,
    pub server_certificate_name: Option<String>,

    /// SHA-1 fingerprint, colon separated hex. Letter case is not guaranteed.
    pub fingerprint: Option<String>,

    pub expire_time: Option<String>,
}

/// Reply to `UploadServerCertificate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UploadServerCertificate {
    pub server_certificate_id: Option<String>,
    pub server_certificate_name: Option<String>,
    pub fingerprint: Option<String>,
}

impl UploadServerCertificate {
    /// The new certificate ID, treating an empty string as absent.
    pub fn certificate_id(&self) -> Option<&str> {
        self.server_certificate_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}

/// Reply to `SetLoadBalancerHTTPSListenerAttribute`; success carries only a `RequestId`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SetListenerReply {
    pub request_id: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
}
