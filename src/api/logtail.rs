use serde::{Deserialize, Serialize};

/// A Logtail configuration of a log project.
///
/// Every field has a default when read, so an existing configuration of any shape loads.
///
/// # Example JSON
///
/// ```json
/// {
///   "configName": "sample-app-logtail-config-dev",
///   "inputType": "syslog",
///   "inputDetail": {
///     "tag": "sys_tag",
///     "localStorage": true
///   },
///   "outputType": "LogService",
///   "outputDetail": {
///     "logstoreName": "sample-app-log-store-dev"
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogtailConfig {
    pub config_name: String,
    pub input_type: String,
    pub input_detail: LogtailInputDetail,
    pub output_type: String,
    pub output_detail: LogtailOutputDetail,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_sample: Option<String>,

    #[serde(default, skip_serializing)]
    pub create_time: Option<u64>,

    #[serde(default, skip_serializing)]
    pub last_modify_time: Option<u64>,
}

impl LogtailConfig {
    /// Syslog collection into `logstore_name`, tagged with `tag`.
    pub fn syslog(config_name: &str, logstore_name: &str, tag: &str) -> Self {
        Self {
            config_name: config_name.to_owned(),
            input_type: "syslog".to_owned(),
            input_detail: LogtailInputDetail {
                tag: Some(tag.to_owned()),
                local_storage: Some(true),
                ..Default::default()
            },
            output_type: "LogService".to_owned(),
            output_detail: LogtailOutputDetail {
                logstore_name: logstore_name.to_owned(),
            },
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogtailInputDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_storage: Option<bool>,

    /// Input settings of other config types, kept so they survive a round trip.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogtailOutputDetail {
    pub logstore_name: String,
}
