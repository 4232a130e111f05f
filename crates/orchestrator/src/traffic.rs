use common::config::DeployConfig;
use common::platform::TrafficTargetSpec;
use tracing::info;

use crate::platform::{DynPlatformClient, PlatformError, ServiceRef};

/// Revision listing and rollback for a deployed service.
pub struct TrafficController {
    platform: DynPlatformClient,
}

impl TrafficController {
    pub fn new(platform: DynPlatformClient) -> Self {
        Self { platform }
    }

    pub async fn list_revisions(&self, config: &DeployConfig) -> Result<Vec<String>, PlatformError> {
        self.platform
            .list_revisions(&ServiceRef::from_config(config))
            .await
    }

    /// Route all traffic to `revision`. The revision template is left as is.
    pub async fn rollback(&self, config: &DeployConfig, revision: &str) -> Result<(), PlatformError> {
        let target = ServiceRef::from_config(config);
        info!(service = %target, revision, "routing all traffic to revision");
        self.platform
            .update_traffic(&target, &[TrafficTargetSpec::revision(revision, 100)])
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::{FakePlatform, PlatformCall, sample_config};

    #[tokio::test]
    async fn rollback_pins_single_revision() {
        let platform = FakePlatform::default();
        let controller = TrafficController::new(Arc::new(platform.clone()));

        controller
            .rollback(&sample_config(), "my-svc-00001-abc")
            .await
            .expect("rollback");

        assert_eq!(
            platform.calls(),
            vec![PlatformCall::UpdateTraffic(
                "my-svc".into(),
                vec![TrafficTargetSpec::revision("my-svc-00001-abc", 100)]
            )]
        );
    }

    #[tokio::test]
    async fn list_revisions_passes_through_platform_order() {
        let platform = FakePlatform::default();
        platform.set_revisions(&["my-svc-00003-c", "my-svc-00002-b"]);
        let controller = TrafficController::new(Arc::new(platform.clone()));

        let revisions = controller
            .list_revisions(&sample_config())
            .await
            .expect("list");
        assert_eq!(revisions, vec!["my-svc-00003-c", "my-svc-00002-b"]);
    }
}
