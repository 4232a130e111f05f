use common::config::{DeployConfig, LoadBalancerConfig};
use thiserror::Error;
use tracing::{info, warn};

use crate::command::{CommandError, DynCommandExecutor};
use crate::gcloud::{
    ForwardingRuleRow, GcloudResponse, GcloudStep, LoadBalancerNames, last_segment,
};
use crate::{ProgressSink, log_progress};

/// Substrings used to pick a forwarding rule when none is configured.
const RULE_NAME_HINTS: [&str; 2] = ["test-lb", "http-proxy"];

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("load balancer step '{step}' failed for {resource}: {source}")]
    Step {
        step: &'static str,
        resource: String,
        #[source]
        source: CommandError,
    },
    #[error("'{step}' returned no value for {resource}")]
    EmptyOutput {
        step: &'static str,
        resource: String,
    },
    #[error("forwarding rule '{name}' was not found")]
    ForwardingRuleNotFound { name: String },
    #[error("no forwarding rule name contains any of {hints:?}; set load_balancer.forwarding_rule")]
    NoMatchingForwardingRule { hints: Vec<&'static str> },
    #[error("forwarding rule '{rule}' has no target proxy")]
    TargetProxyNotFound { rule: String },
    #[error("target proxy '{proxy}' has no URL map")]
    UrlMapNotFound { proxy: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// A new chain was created and serves on `address`.
    Created { address: String, names: LoadBalancerNames },
    /// The backend was attached behind an existing forwarding rule.
    Attached {
        forwarding_rule: String,
        url_map: String,
        names: LoadBalancerNames,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownWarning {
    pub step: &'static str,
    pub resource: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub removed: Vec<String>,
    pub warnings: Vec<TeardownWarning>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Creates, attaches and removes the HTTP load balancer chain in front of a
/// service by driving `gcloud` through a [`crate::CommandExecutor`].
pub struct LoadBalancerProvisioner {
    executor: DynCommandExecutor,
    gcloud: String,
    progress: ProgressSink,
}

impl LoadBalancerProvisioner {
    pub fn new(executor: DynCommandExecutor, gcloud: impl Into<String>) -> Self {
        Self {
            executor,
            gcloud: gcloud.into(),
            progress: log_progress(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    async fn run(
        &self,
        step: GcloudStep,
        names: &LoadBalancerNames,
    ) -> Result<GcloudResponse, ProvisionError> {
        (self.progress)(format!("{} {}", step.label(), step.resource(names)));
        let command = step.command(&self.gcloud, names);
        let output = self
            .executor
            .run(&command)
            .await
            .map_err(|source| ProvisionError::Step {
                step: step.label(),
                resource: step.resource(names).to_string(),
                source,
            })?;
        Ok(step.parse(&output))
    }

    async fn read_value(
        &self,
        step: GcloudStep,
        names: &LoadBalancerNames,
    ) -> Result<Option<String>, ProvisionError> {
        match self.run(step, names).await? {
            GcloudResponse::Value(value) => Ok(value),
            _ => Ok(None),
        }
    }

    /// Steps run strictly in order; the first failure aborts and nothing
    /// already created is rolled back.
    pub async fn provision(
        &self,
        config: &DeployConfig,
        lb: &LoadBalancerConfig,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let names = LoadBalancerNames::for_config(config, lb);
        info!(
            service = %names.service,
            backend = %names.backend,
            existing = lb.backend_service.existing,
            "provisioning load balancer"
        );

        self.run(GcloudStep::CreateNeg, &names).await?;
        self.run(GcloudStep::CreateBackendService, &names).await?;
        self.run(GcloudStep::AddNegBackend, &names).await?;

        if lb.backend_service.existing {
            self.attach(lb, names).await
        } else {
            self.create_frontend(names).await
        }
    }

    async fn create_frontend(
        &self,
        names: LoadBalancerNames,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        self.run(GcloudStep::ReserveAddress, &names).await?;
        let address = self
            .read_value(GcloudStep::DescribeAddress, &names)
            .await?
            .ok_or_else(|| ProvisionError::EmptyOutput {
                step: GcloudStep::DescribeAddress.label(),
                resource: names.address.clone(),
            })?;
        self.run(GcloudStep::CreateUrlMap, &names).await?;
        self.run(GcloudStep::CreateHttpProxy, &names).await?;
        self.run(GcloudStep::CreateForwardingRule, &names).await?;

        (self.progress)(format!("load balancer for {} serves on http://{address}", names.service));
        Ok(ProvisionOutcome::Created { address, names })
    }

    async fn attach(
        &self,
        lb: &LoadBalancerConfig,
        names: LoadBalancerNames,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let rows = match self.run(GcloudStep::ListForwardingRules, &names).await? {
            GcloudResponse::Rows(rows) => rows,
            _ => Vec::new(),
        };
        let rule = select_forwarding_rule(&rows, lb.forwarding_rule.as_deref())?;
        if rule.target.is_empty() {
            return Err(ProvisionError::TargetProxyNotFound {
                rule: rule.name.clone(),
            });
        }

        let url_map_ref = self
            .read_value(
                GcloudStep::DescribeHttpProxy {
                    proxy: rule.target.clone(),
                },
                &names,
            )
            .await?
            .ok_or_else(|| ProvisionError::UrlMapNotFound {
                proxy: rule.target.clone(),
            })?;
        let url_map = last_segment(&url_map_ref).to_string();
        if url_map.is_empty() {
            return Err(ProvisionError::UrlMapNotFound {
                proxy: rule.target.clone(),
            });
        }

        self.run(
            GcloudStep::SetUrlMapDefaultService {
                url_map: url_map.clone(),
            },
            &names,
        )
        .await?;

        (self.progress)(format!(
            "URL map {url_map} now routes to {}",
            names.backend
        ));
        Ok(ProvisionOutcome::Attached {
            forwarding_rule: rule.name.clone(),
            url_map,
            names,
        })
    }

    /// Best-effort removal in reverse creation order. A chain that was
    /// attached to keeps its shared frontend and backend service; only the
    /// service's own NEG is removed.
    pub async fn teardown(&self, config: &DeployConfig, lb: &LoadBalancerConfig) -> TeardownReport {
        let names = LoadBalancerNames::for_config(config, lb);
        let existing = lb.backend_service.existing;

        let mut steps = Vec::new();
        if !existing {
            steps.extend([
                GcloudStep::DeleteForwardingRule,
                GcloudStep::DeleteHttpProxy,
                GcloudStep::DeleteUrlMap,
                GcloudStep::DeleteAddress,
            ]);
        }
        steps.extend([GcloudStep::RemoveNegBackend, GcloudStep::DeleteNeg]);
        if !existing {
            steps.push(GcloudStep::DeleteBackendService);
        }

        let mut report = TeardownReport::default();
        for step in steps {
            let resource = step.resource(&names).to_string();
            match self.run(step.clone(), &names).await {
                Ok(_) => report.removed.push(resource),
                Err(err) => {
                    warn!(step = step.label(), resource = %resource, error = %err, "teardown step failed; continuing");
                    report.warnings.push(TeardownWarning {
                        step: step.label(),
                        resource,
                        error: err.to_string(),
                    });
                }
            }
        }
        report
    }
}

fn select_forwarding_rule<'a>(
    rows: &'a [ForwardingRuleRow],
    configured: Option<&str>,
) -> Result<&'a ForwardingRuleRow, ProvisionError> {
    if let Some(name) = configured {
        return rows
            .iter()
            .find(|row| row.name == name)
            .ok_or_else(|| ProvisionError::ForwardingRuleNotFound {
                name: name.to_string(),
            });
    }
    let rule = rows
        .iter()
        .find(|row| RULE_NAME_HINTS.iter().any(|hint| row.name.contains(hint)))
        .ok_or_else(|| ProvisionError::NoMatchingForwardingRule {
            hints: RULE_NAME_HINTS.to_vec(),
        })?;
    warn!(
        rule = %rule.name,
        "forwarding rule picked by name heuristic; set load_balancer.forwarding_rule to pin it"
    );
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::{FakeExecutor, sample_config};

    fn lb(existing: bool) -> LoadBalancerConfig {
        let mut lb = LoadBalancerConfig::default();
        lb.backend_service.existing = existing;
        lb
    }

    fn provisioner(executor: &FakeExecutor) -> LoadBalancerProvisioner {
        LoadBalancerProvisioner::new(Arc::new(executor.clone()), "gcloud")
    }

    /// `gcloud compute <group> <verb>` of every recorded command.
    fn verbs(executor: &FakeExecutor) -> Vec<String> {
        executor
            .commands()
            .iter()
            .map(|cmd| format!("{} {}", cmd.args[1], cmd.args[2]))
            .collect()
    }

    #[tokio::test]
    async fn creates_full_chain_in_order() {
        let executor = FakeExecutor::default();
        executor.respond("addresses describe", "34.120.1.2\n");

        let outcome = provisioner(&executor)
            .provision(&sample_config(), &lb(false))
            .await
            .expect("provision");

        assert!(matches!(outcome, ProvisionOutcome::Created { ref address, .. } if address == "34.120.1.2"));
        assert_eq!(
            verbs(&executor),
            vec![
                "network-endpoint-groups create",
                "backend-services create",
                "backend-services add-backend",
                "addresses create",
                "addresses describe",
                "url-maps create",
                "target-http-proxies create",
                "forwarding-rules create",
            ]
        );
    }

    #[tokio::test]
    async fn failing_step_aborts_without_compensation() {
        let executor = FakeExecutor::default();
        executor.fail("url-maps create", "quota exceeded");

        let err = provisioner(&executor)
            .provision(&sample_config(), &lb(false))
            .await
            .unwrap_err();

        match err {
            ProvisionError::Step { step, ref resource, .. } => {
                assert_eq!(step, "create URL map");
                assert_eq!(resource, "my-svc-lb-url-map");
            }
            other => panic!("unexpected error: {other}"),
        }
        let verbs = verbs(&executor);
        assert_eq!(verbs.last().map(String::as_str), Some("url-maps create"));
        assert!(!verbs.iter().any(|verb| verb.contains("delete")));
    }

    #[tokio::test]
    async fn attaches_behind_heuristic_rule() {
        let executor = FakeExecutor::default();
        executor.respond(
            "forwarding-rules list",
            "other-rule\thttps://x/targetHttpProxies/other\nshop-http-proxy-rule\thttps://x/global/targetHttpProxies/shop-proxy\n",
        );
        executor.respond(
            "target-http-proxies describe",
            "https://x/global/urlMaps/shop-map\n",
        );

        let outcome = provisioner(&executor)
            .provision(&sample_config(), &lb(true))
            .await
            .expect("attach");

        assert_eq!(
            outcome,
            ProvisionOutcome::Attached {
                forwarding_rule: "shop-http-proxy-rule".into(),
                url_map: "shop-map".into(),
                names: LoadBalancerNames::for_config(&sample_config(), &lb(true)),
            }
        );
        let commands = executor.commands();
        let describe = &commands[4];
        assert_eq!(describe.args[3], "shop-proxy");
        let repoint = commands.last().expect("repoint");
        assert_eq!(repoint.args[1..4], ["url-maps", "set-default-service", "shop-map"]);
        assert!(repoint.args.contains(&"--default-service=my-svc-backend".to_string()));
    }

    #[tokio::test]
    async fn configured_rule_must_exist() {
        let executor = FakeExecutor::default();
        executor.respond("forwarding-rules list", "a-test-lb-rule\thttps://x/targetHttpProxies/p\n");
        let mut config = lb(true);
        config.forwarding_rule = Some("prod-rule".into());

        let err = provisioner(&executor)
            .provision(&sample_config(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::ForwardingRuleNotFound { ref name } if name == "prod-rule"));
    }

    #[tokio::test]
    async fn attach_lookup_failures_are_distinct() {
        let executor = FakeExecutor::default();
        executor.respond("forwarding-rules list", "unrelated\thttps://x/targetHttpProxies/p\n");
        let err = provisioner(&executor)
            .provision(&sample_config(), &lb(true))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::NoMatchingForwardingRule { .. }));

        let executor = FakeExecutor::default();
        executor.respond("forwarding-rules list", "edge-test-lb\t\n");
        let err = provisioner(&executor)
            .provision(&sample_config(), &lb(true))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::TargetProxyNotFound { ref rule } if rule == "edge-test-lb"));

        let executor = FakeExecutor::default();
        executor.respond("forwarding-rules list", "edge-test-lb\thttps://x/targetHttpProxies/p\n");
        executor.respond("target-http-proxies describe", "\n");
        let err = provisioner(&executor)
            .provision(&sample_config(), &lb(true))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::UrlMapNotFound { ref proxy } if proxy == "p"));
    }

    #[tokio::test]
    async fn teardown_continues_past_failures() {
        let executor = FakeExecutor::default();
        executor.fail("network-endpoint-groups delete", "resource in use");

        let report = provisioner(&executor)
            .teardown(&sample_config(), &lb(false))
            .await;

        assert_eq!(
            verbs(&executor),
            vec![
                "forwarding-rules delete",
                "target-http-proxies delete",
                "url-maps delete",
                "addresses delete",
                "backend-services remove-backend",
                "network-endpoint-groups delete",
                "backend-services delete",
            ]
        );
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].resource, "my-svc-neg");
        assert_eq!(report.removed.len(), 6);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn teardown_of_attached_service_keeps_shared_resources() {
        let executor = FakeExecutor::default();

        let report = provisioner(&executor)
            .teardown(&sample_config(), &lb(true))
            .await;

        assert_eq!(
            verbs(&executor),
            vec![
                "backend-services remove-backend",
                "network-endpoint-groups delete",
            ]
        );
        assert!(report.is_clean());
    }
}
