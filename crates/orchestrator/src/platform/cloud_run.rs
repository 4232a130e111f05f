use async_trait::async_trait;
use common::platform::{
    IamPolicy, RevisionList, Service, SetIamPolicyRequest, TrafficTargetSpec, TrafficUpdate,
};
use reqwest::Client;
use tracing::debug;

use super::{PlatformClient, PlatformError, RestClient, ServiceRef};

pub const DEFAULT_PLATFORM_ENDPOINT: &str = "https://run.googleapis.com/v2";

/// REST client for the serverless platform's v2 admin API.
#[derive(Clone)]
pub struct CloudRunApi {
    rest: RestClient,
}

impl CloudRunApi {
    pub fn new(client: Client, base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            rest: RestClient::new(client, base, token),
        }
    }
}

#[async_trait]
impl PlatformClient for CloudRunApi {
    async fn create_service(
        &self,
        target: &ServiceRef,
        service: &Service,
    ) -> Result<(), PlatformError> {
        debug!(service = %target, "creating service");
        let path = format!("{}/services", target.parent());
        self.rest
            .post_json(&path, &[("serviceId", &target.name)], service, "create service")
            .await
    }

    async fn replace_service(
        &self,
        target: &ServiceRef,
        service: &Service,
    ) -> Result<(), PlatformError> {
        debug!(service = %target, "replacing service");
        let no_query: [(&str, &str); 0] = [];
        self.rest
            .patch_json(&target.resource_name(), &no_query, service, "replace service")
            .await
    }

    async fn get_service(&self, target: &ServiceRef) -> Result<Service, PlatformError> {
        self.rest
            .get(&target.resource_name(), "get service")
            .await
    }

    async fn update_traffic(
        &self,
        target: &ServiceRef,
        traffic: &[TrafficTargetSpec],
    ) -> Result<(), PlatformError> {
        // Only the traffic field is sent; the mask keeps the rest of the live
        // definition untouched.
        let body = TrafficUpdate {
            traffic: traffic.to_vec(),
        };
        self.rest
            .patch_json(
                &target.resource_name(),
                &[("updateMask", "traffic")],
                &body,
                "update traffic",
            )
            .await
    }

    async fn set_iam_policy(
        &self,
        target: &ServiceRef,
        policy: &IamPolicy,
    ) -> Result<(), PlatformError> {
        let path = format!("{}:setIamPolicy", target.resource_name());
        let body = SetIamPolicyRequest {
            policy: policy.clone(),
        };
        let no_query: [(&str, &str); 0] = [];
        self.rest
            .post_json(&path, &no_query, &body, "set iam policy")
            .await
    }

    async fn list_revisions(&self, target: &ServiceRef) -> Result<Vec<String>, PlatformError> {
        let path = format!("{}/revisions", target.resource_name());
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let query: Vec<(&str, &str)> = page_token
                .as_deref()
                .map(|token| vec![("pageToken", token)])
                .unwrap_or_default();
            let page: RevisionList = self
                .rest
                .get_with_query(&path, &query, "list revisions")
                .await?;
            names.extend(page.revisions.iter().map(|rev| rev.short_name().to_string()));
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(names)
    }

    async fn delete_service(&self, target: &ServiceRef) -> Result<(), PlatformError> {
        debug!(service = %target, "deleting service");
        self.rest
            .delete_no_body(&target.resource_name(), "delete service")
            .await
    }
}
