//! Broker interface boundary

use async_trait::async_trait;

use sd_core::error::BrokerError;
use sd_core::types::InstanceSummary;

/// A verified profile/region pair.
///
/// Only [`SessionBroker::connect`] produces one, so holding a
/// connection means the credentials worked at least once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConnection {
    /// Credential profile name
    pub profile: String,
    /// Provider region
    pub region: String,
}

/// Client for the cloud side of the session broker
#[async_trait]
pub trait SessionBroker: Send + Sync {
    /// Credential profiles available on this machine
    fn list_profiles(&self) -> Result<Vec<String>, BrokerError>;

    /// Regions the panel offers for selection
    fn list_regions(&self) -> Vec<String>;

    /// Verify the profile/region pair against the provider
    async fn connect(&self, profile: &str, region: &str)
        -> Result<BrokerConnection, BrokerError>;

    /// List the instances visible through the connection.
    ///
    /// `None` means the connection no longer works (expired credentials,
    /// network gone); callers must treat the connection as broken rather
    /// than show an empty list.
    async fn list_managed_instances(
        &self,
        conn: &BrokerConnection,
    ) -> Option<Vec<InstanceSummary>>;
}
