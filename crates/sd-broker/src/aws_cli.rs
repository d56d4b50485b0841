//! Broker client shelling out to the `aws` CLI
//!
//! Profiles come straight from the local credentials file, instance
//! data from `aws ec2 describe-instances` cross-checked against the
//! broker's managed-instance list, both as JSON over stdout. The CLI
//! is invoked fresh per call; nothing here caches provider state.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use sd_core::error::BrokerError;
use sd_core::types::{InstanceId, InstanceSummary};

use crate::broker::{BrokerConnection, SessionBroker};

/// Regions offered for selection, most commonly used first
const REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-central-1",
    "eu-north-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-south-1",
    "ca-central-1",
    "sa-east-1",
];

/// `SessionBroker` backed by the `aws` command-line tool
pub struct AwsCliBroker {
    program: String,
    credentials_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

impl AwsCliBroker {
    /// Create a broker client using the `aws` binary on PATH
    pub fn new() -> Self {
        let aws_dir = dirs::home_dir().map(|h| h.join(".aws"));
        Self {
            program: "aws".to_string(),
            credentials_path: aws_dir.as_ref().map(|d| d.join("credentials")),
            config_path: aws_dir.map(|d| d.join("config")),
        }
    }

    /// Override the CLI program name (used by tests)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Override the credentials file location (used by tests)
    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    /// Override the config file location (used by tests)
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Run one CLI subcommand and return its stdout on success
    async fn run_json(&self, args: &[&str]) -> Result<String, BrokerError> {
        let output = Command::new(&self.program)
            .args(args)
            .arg("--output")
            .arg("json")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                BrokerError::ConnectionBroken(format!("failed to run {}: {e}", self.program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_cli_failure(stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for AwsCliBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionBroker for AwsCliBroker {
    fn list_profiles(&self) -> Result<Vec<String>, BrokerError> {
        let mut profiles = Vec::new();
        if let Some(contents) = read_optional(self.credentials_path.as_deref())? {
            profiles.extend(parse_profile_names(&contents));
        }
        // SSO and role profiles often live only in the config file
        if let Some(contents) = read_optional(self.config_path.as_deref())? {
            for name in parse_config_profile_names(&contents) {
                if !profiles.contains(&name) {
                    profiles.push(name);
                }
            }
        }
        Ok(profiles)
    }

    fn list_regions(&self) -> Vec<String> {
        REGIONS.iter().map(|r| r.to_string()).collect()
    }

    async fn connect(
        &self,
        profile: &str,
        region: &str,
    ) -> Result<BrokerConnection, BrokerError> {
        if !self.list_profiles()?.iter().any(|p| p == profile) {
            return Err(BrokerError::ProfileNotFound(profile.to_string()));
        }

        // A cheap identity call proves the credentials actually work
        self.run_json(&[
            "sts",
            "get-caller-identity",
            "--profile",
            profile,
            "--region",
            region,
        ])
        .await?;

        tracing::info!("Connected with profile {} in {}", profile, region);
        Ok(BrokerConnection {
            profile: profile.to_string(),
            region: region.to_string(),
        })
    }

    async fn list_managed_instances(
        &self,
        conn: &BrokerConnection,
    ) -> Option<Vec<InstanceSummary>> {
        let managed = self
            .run_json(&[
                "ssm",
                "describe-instance-information",
                "--profile",
                &conn.profile,
                "--region",
                &conn.region,
            ])
            .await;
        let described = self
            .run_json(&[
                "ec2",
                "describe-instances",
                "--profile",
                &conn.profile,
                "--region",
                &conn.region,
            ])
            .await;

        let (managed, described) = match (managed, described) {
            (Ok(m), Ok(d)) => (m, d),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Instance listing failed: {}", e);
                return None;
            }
        };

        match parse_instances(&described, &managed) {
            Ok(instances) => Some(instances),
            Err(e) => {
                tracing::warn!("Could not parse instance listing: {}", e);
                None
            }
        }
    }
}

/// Map a failed CLI invocation's stderr to a broker error
fn classify_cli_failure(stderr: &str) -> BrokerError {
    let lowered = stderr.to_lowercase();
    if lowered.contains("could not be found")
        || (lowered.contains("profile") && lowered.contains("not"))
    {
        BrokerError::ProfileNotFound(stderr.to_string())
    } else if lowered.contains("expiredtoken")
        || lowered.contains("token has expired")
        || lowered.contains("connection")
    {
        BrokerError::ConnectionBroken(stderr.to_string())
    } else if lowered.contains("credential")
        || lowered.contains("accessdenied")
        || lowered.contains("authfailure")
        || lowered.contains("invalidclienttokenid")
    {
        BrokerError::AuthenticationFailed(stderr.to_string())
    } else {
        BrokerError::UnexpectedOutput(stderr.to_string())
    }
}

/// Read a profile file, treating a missing one as simply no profiles
fn read_optional(path: Option<&std::path::Path>) -> Result<Option<String>, BrokerError> {
    let Some(path) = path else {
        return Ok(None);
    };
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BrokerError::AuthenticationFailed(format!(
            "cannot read profile file {}: {e}",
            path.display()
        ))),
    }
}

/// Section names from the INI-style credentials file
fn parse_profile_names(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('[') && line.ends_with(']'))
        .map(|line| line[1..line.len() - 1].trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Profile names from the config file, where sections are `[default]`
/// or `[profile X]`; other section kinds (e.g. `[sso-session X]`) are
/// not profiles.
fn parse_config_profile_names(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('[') && line.ends_with(']'))
        .filter_map(|line| {
            let section = line[1..line.len() - 1].trim();
            if section == "default" {
                Some(section.to_string())
            } else {
                section
                    .strip_prefix("profile ")
                    .map(|name| name.trim().to_string())
            }
        })
        .filter(|name| !name.is_empty())
        .collect()
}

#[derive(Deserialize)]
struct DescribeInstances {
    #[serde(rename = "Reservations", default)]
    reservations: Vec<Reservation>,
}

#[derive(Deserialize)]
struct Reservation {
    #[serde(rename = "Instances", default)]
    instances: Vec<Ec2Instance>,
}

#[derive(Deserialize)]
struct Ec2Instance {
    #[serde(rename = "InstanceId")]
    instance_id: String,
    #[serde(rename = "InstanceType", default)]
    instance_type: Option<String>,
    #[serde(rename = "PlatformDetails", default)]
    platform_details: Option<String>,
    #[serde(rename = "State", default)]
    state: Option<Ec2State>,
    #[serde(rename = "Tags", default)]
    tags: Vec<Ec2Tag>,
}

#[derive(Deserialize)]
struct Ec2State {
    #[serde(rename = "Name", default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct Ec2Tag {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Deserialize)]
struct InstanceInformation {
    #[serde(rename = "InstanceInformationList", default)]
    list: Vec<ManagedInstance>,
}

#[derive(Deserialize)]
struct ManagedInstance {
    #[serde(rename = "InstanceId")]
    instance_id: String,
}

/// Merge the EC2 instance description with the broker's managed set
fn parse_instances(
    described_json: &str,
    managed_json: &str,
) -> Result<Vec<InstanceSummary>, serde_json::Error> {
    let described: DescribeInstances = serde_json::from_str(described_json)?;
    let managed: InstanceInformation = serde_json::from_str(managed_json)?;
    let managed_ids: std::collections::HashSet<&str> = managed
        .list
        .iter()
        .map(|m| m.instance_id.as_str())
        .collect();

    let mut instances: Vec<InstanceSummary> = described
        .reservations
        .into_iter()
        .flat_map(|r| r.instances)
        .map(|i| {
            let name = i
                .tags
                .iter()
                .find(|t| t.key == "Name")
                .map(|t| t.value.clone())
                .unwrap_or_else(|| "N/A".to_string());
            InstanceSummary {
                session_capable: managed_ids.contains(i.instance_id.as_str()),
                id: InstanceId::new(i.instance_id),
                name,
                instance_type: i.instance_type.unwrap_or_else(|| "N/A".to_string()),
                os: i.platform_details.unwrap_or_else(|| "N/A".to_string()),
                state: i
                    .state
                    .and_then(|s| s.name)
                    .unwrap_or_else(|| "unknown".to_string()),
            }
        })
        .collect();
    instances.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_profile_names_from_credentials_file() {
        let contents = "\
[default]
aws_access_key_id = AKIA
aws_secret_access_key = secret

; comment line
[dev]
aws_access_key_id = AKIB

  [staging]
";
        assert_eq!(parse_profile_names(contents), vec!["default", "dev", "staging"]);
    }

    #[test]
    fn test_no_profiles_in_empty_file() {
        assert!(parse_profile_names("").is_empty());
    }

    #[test]
    fn test_config_profile_sections() {
        let contents = "\
[default]
region = us-east-1

[profile staging]
sso_session = corp

[sso-session corp]
sso_start_url = https://corp.awsapps.com/start
";
        assert_eq!(parse_config_profile_names(contents), vec!["default", "staging"]);
    }

    #[test]
    fn test_list_profiles_with_missing_files_is_empty() {
        let broker = AwsCliBroker::new()
            .with_credentials_path("/nonexistent/sessiondock-test/credentials")
            .with_config_path("/nonexistent/sessiondock-test/config");
        assert!(broker.list_profiles().unwrap().is_empty());
    }

    #[test]
    fn test_list_profiles_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[default]\n[prod]").unwrap();
        let broker = AwsCliBroker::new()
            .with_credentials_path(file.path())
            .with_config_path("/nonexistent/sessiondock-test/config");
        assert_eq!(broker.list_profiles().unwrap(), vec!["default", "prod"]);
    }

    #[test]
    fn test_list_profiles_merges_config_only_profiles() {
        let mut credentials = tempfile::NamedTempFile::new().unwrap();
        writeln!(credentials, "[default]").unwrap();
        let mut config = tempfile::NamedTempFile::new().unwrap();
        writeln!(config, "[default]\n[profile sso-dev]").unwrap();

        let broker = AwsCliBroker::new()
            .with_credentials_path(credentials.path())
            .with_config_path(config.path());
        assert_eq!(broker.list_profiles().unwrap(), vec!["default", "sso-dev"]);
    }

    #[test]
    fn test_instances_merge_managed_flag_and_name_tag() {
        let described = r#"{
            "Reservations": [{
                "Instances": [
                    {
                        "InstanceId": "i-managed",
                        "InstanceType": "t3.micro",
                        "PlatformDetails": "Linux/UNIX",
                        "State": {"Name": "running"},
                        "Tags": [{"Key": "Name", "Value": "web-1"}]
                    },
                    {
                        "InstanceId": "i-untagged",
                        "State": {"Name": "stopped"}
                    }
                ]
            }]
        }"#;
        let managed = r#"{"InstanceInformationList": [{"InstanceId": "i-managed"}]}"#;

        let instances = parse_instances(described, managed).unwrap();
        assert_eq!(instances.len(), 2);

        let managed = instances.iter().find(|i| i.id.as_str() == "i-managed").unwrap();
        assert_eq!(managed.name, "web-1");
        assert_eq!(managed.instance_type, "t3.micro");
        assert_eq!(managed.os, "Linux/UNIX");
        assert_eq!(managed.state, "running");
        assert!(managed.session_capable);

        let untagged = instances.iter().find(|i| i.id.as_str() == "i-untagged").unwrap();
        assert_eq!(untagged.name, "N/A");
        assert_eq!(untagged.instance_type, "N/A");
        assert!(!untagged.session_capable);
    }

    #[test]
    fn test_garbage_listing_is_a_parse_error() {
        assert!(parse_instances("not json", "{}").is_err());
    }

    #[test]
    fn test_cli_failure_classification() {
        assert!(matches!(
            classify_cli_failure("The config profile (dev) could not be found"),
            BrokerError::ProfileNotFound(_)
        ));
        assert!(matches!(
            classify_cli_failure("An error occurred (ExpiredToken): The security token included in the request is expired"),
            BrokerError::ConnectionBroken(_)
        ));
        assert!(matches!(
            classify_cli_failure("Unable to locate credentials"),
            BrokerError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            classify_cli_failure("segmentation fault"),
            BrokerError::UnexpectedOutput(_)
        ));
    }

    #[test]
    fn test_region_table_is_populated() {
        let broker = AwsCliBroker::new();
        let regions = broker.list_regions();
        assert!(regions.contains(&"us-east-1".to_string()));
        assert!(regions.len() >= 10);
    }
}
