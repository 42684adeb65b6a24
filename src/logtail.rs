//! Creates or updates the Logtail configuration of an environment and attaches it to the
//! environment's machine group.

use crate::{api::LogtailConfig, sls::LogClient};

/// Tag set on the collected syslog entries.
pub const SYSLOG_TAG: &str = "sys_tag";

/// Names of the Log Service resources of one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogtailNames {
    pub project: String,
    pub logstore: String,
    pub config: String,
    pub machine_group: String,
}

impl LogtailNames {
    pub fn for_environment(app_name: &str, environment: &str) -> Self {
        Self {
            project: format!("{app_name}-log-project-{environment}"),
            logstore: format!("{app_name}-log-store-{environment}"),
            config: format!("{app_name}-logtail-config-{environment}"),
            machine_group: format!("{app_name}-log-machine-group-{environment}"),
        }
    }
}

/// Which branch the sync took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated,
}

/// Create the Logtail configuration if it doesn't exist yet, update it otherwise, then apply it to
/// the machine group.
///
/// Only a "config doesn't exist" reply leads to creation. Any other failure while loading the
/// existing configuration stops the sync.
pub async fn sync_logtail_config(
    client: &LogClient,
    names: &LogtailNames,
) -> eyre::Result<SyncOutcome> {
    log::info!(
        "Loading existing Logtail configuration (endpoint = {}, logProjectName = {}, logtailConfigName = {})...",
        client.base_url(),
        names.project,
        names.config
    );

    let existing = client.get_logtail_config(&names.config).await?;
    match &existing {
        Some(config) => log::info!(
            "Existing logtail configuration found: {}",
            serde_json::to_string(config)?
        ),
        None => log::info!("No existing logtail configuration found."),
    }

    let desired = LogtailConfig::syslog(&names.config, &names.logstore, SYSLOG_TAG);
    let desired_json = serde_json::to_string(&desired)?;

    let outcome = if existing.is_none() {
        log::info!("Create the logtail configuration: {desired_json}");
        client.create_logtail_config(&desired).await?;
        SyncOutcome::Created
    } else {
        log::info!("Update the logtail configuration: {desired_json}");
        client.update_logtail_config(&desired).await?;
        SyncOutcome::Updated
    };

    log::info!(
        "Apply the logtail configuration to the machine group {}",
        names.machine_group
    );
    client
        .apply_config_to_machine_group(&names.config, &names.machine_group)
        .await?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{with_log_server, LogBehavior};

    fn names() -> LogtailNames {
        LogtailNames::for_environment("sample-app", "dev")
    }

    #[test]
    fn test_names() {
        assert_eq!(
            names(),
            LogtailNames {
                project: "sample-app-log-project-dev".to_owned(),
                logstore: "sample-app-log-store-dev".to_owned(),
                config: "sample-app-logtail-config-dev".to_owned(),
                machine_group: "sample-app-log-machine-group-dev".to_owned(),
            }
        );
    }

    #[tokio::test]
    async fn test_missing_config_is_created() {
        let server = with_log_server(LogBehavior::Missing);

        let outcome = sync_logtail_config(&server.client(), &names())
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Created);

        let calls = server
            .calls()
            .into_iter()
            .map(|call| format!("{} {}", call.method, call.path))
            .collect::<Vec<_>>();
        assert_eq!(
            calls,
            [
                "GET /configs/sample-app-logtail-config-dev",
                "POST /configs",
                "PUT /machinegroups/sample-app-log-machine-group-dev/configs/sample-app-logtail-config-dev",
            ]
        );
    }

    #[tokio::test]
    async fn test_existing_config_is_updated() {
        let server = with_log_server(LogBehavior::Existing);

        let outcome = sync_logtail_config(&server.client(), &names())
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Updated);

        let calls = server.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].method, "PUT");
        assert_eq!(calls[1].path, "/configs/sample-app-logtail-config-dev");

        let sent: LogtailConfig = serde_json::from_slice(&calls[1].body).unwrap();
        assert_eq!(sent.input_type, "syslog");
        assert_eq!(sent.input_detail.tag.as_deref(), Some(SYSLOG_TAG));
        assert_eq!(sent.output_detail.logstore_name, "sample-app-log-store-dev");

        assert_eq!(
            calls[2].path,
            "/machinegroups/sample-app-log-machine-group-dev/configs/sample-app-logtail-config-dev"
        );
    }

    #[tokio::test]
    async fn test_load_failure_does_not_create() {
        let server = with_log_server(LogBehavior::Unauthorized);

        let err = sync_logtail_config(&server.client(), &names())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("Unauthorized"));

        let calls = server.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "GET");
    }
}
