//! Typed `gcloud compute` invocations used to build and remove the load
//! balancer chain. Each step knows its command line and how to read its
//! output.

use common::config::{DeployConfig, LoadBalancerConfig};

use crate::command::{CommandOutput, CommandSpec};

pub const DEFAULT_GCLOUD_BIN: &str = "gcloud";

/// Deterministic resource names of one service's load balancer chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerNames {
    pub project_id: String,
    pub region: String,
    pub service: String,
    pub neg: String,
    pub backend: String,
    pub address: String,
    pub url_map: String,
    pub proxy: String,
    pub forwarding_rule: String,
}

impl LoadBalancerNames {
    pub fn for_config(config: &DeployConfig, lb: &LoadBalancerConfig) -> Self {
        let service = config.name.clone();
        let base = lb
            .name
            .clone()
            .unwrap_or_else(|| format!("{service}-lb"));
        let backend = lb
            .backend_service
            .name
            .clone()
            .unwrap_or_else(|| format!("{service}-backend"));
        Self {
            project_id: config.project_id.clone(),
            region: config.region.clone(),
            neg: format!("{service}-neg"),
            backend,
            address: format!("{base}-ip"),
            url_map: format!("{base}-url-map"),
            proxy: format!("{base}-http-proxy"),
            forwarding_rule: format!("{base}-forwarding-rule"),
            service,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GcloudStep {
    CreateNeg,
    CreateBackendService,
    AddNegBackend,
    ReserveAddress,
    DescribeAddress,
    CreateUrlMap,
    CreateHttpProxy,
    CreateForwardingRule,
    ListForwardingRules,
    DescribeHttpProxy { proxy: String },
    SetUrlMapDefaultService { url_map: String },
    DeleteForwardingRule,
    DeleteHttpProxy,
    DeleteUrlMap,
    DeleteAddress,
    RemoveNegBackend,
    DeleteNeg,
    DeleteBackendService,
}

/// How a step's stdout is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    Ignored,
    /// One value printed by `--format=get(...)`.
    SingleValue,
    /// Rows of `name<TAB>target` printed by `--format=value(name,target)`.
    NameTargetRows,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingRuleRow {
    pub name: String,
    /// Short name of the target proxy; empty when the rule has none.
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GcloudResponse {
    Done,
    Value(Option<String>),
    Rows(Vec<ForwardingRuleRow>),
}

impl GcloudStep {
    pub fn label(&self) -> &'static str {
        match self {
            GcloudStep::CreateNeg => "create serverless NEG",
            GcloudStep::CreateBackendService => "create backend service",
            GcloudStep::AddNegBackend => "add NEG to backend service",
            GcloudStep::ReserveAddress => "reserve global address",
            GcloudStep::DescribeAddress => "read reserved address",
            GcloudStep::CreateUrlMap => "create URL map",
            GcloudStep::CreateHttpProxy => "create HTTP target proxy",
            GcloudStep::CreateForwardingRule => "create forwarding rule",
            GcloudStep::ListForwardingRules => "list forwarding rules",
            GcloudStep::DescribeHttpProxy { .. } => "describe target proxy",
            GcloudStep::SetUrlMapDefaultService { .. } => "repoint URL map default service",
            GcloudStep::DeleteForwardingRule => "delete forwarding rule",
            GcloudStep::DeleteHttpProxy => "delete HTTP target proxy",
            GcloudStep::DeleteUrlMap => "delete URL map",
            GcloudStep::DeleteAddress => "release global address",
            GcloudStep::RemoveNegBackend => "detach NEG from backend service",
            GcloudStep::DeleteNeg => "delete serverless NEG",
            GcloudStep::DeleteBackendService => "delete backend service",
        }
    }

    pub fn output_shape(&self) -> OutputShape {
        match self {
            GcloudStep::DescribeAddress | GcloudStep::DescribeHttpProxy { .. } => {
                OutputShape::SingleValue
            }
            GcloudStep::ListForwardingRules => OutputShape::NameTargetRows,
            _ => OutputShape::Ignored,
        }
    }

    /// The resource a step acts on, for logs and teardown warnings.
    pub fn resource<'a>(&'a self, names: &'a LoadBalancerNames) -> &'a str {
        match self {
            GcloudStep::CreateNeg | GcloudStep::DeleteNeg => &names.neg,
            GcloudStep::CreateBackendService
            | GcloudStep::AddNegBackend
            | GcloudStep::RemoveNegBackend
            | GcloudStep::DeleteBackendService => &names.backend,
            GcloudStep::ReserveAddress | GcloudStep::DescribeAddress | GcloudStep::DeleteAddress => {
                &names.address
            }
            GcloudStep::CreateUrlMap | GcloudStep::DeleteUrlMap => &names.url_map,
            GcloudStep::CreateHttpProxy | GcloudStep::DeleteHttpProxy => &names.proxy,
            GcloudStep::CreateForwardingRule | GcloudStep::DeleteForwardingRule => {
                &names.forwarding_rule
            }
            GcloudStep::ListForwardingRules => "forwarding-rules",
            GcloudStep::DescribeHttpProxy { proxy } => proxy,
            GcloudStep::SetUrlMapDefaultService { url_map } => url_map,
        }
    }

    pub fn command(&self, gcloud: &str, names: &LoadBalancerNames) -> CommandSpec {
        let base = CommandSpec::new(gcloud).arg("compute");
        let region = format!("--region={}", names.region);
        let neg_region = format!("--network-endpoint-group-region={}", names.region);
        let cmd = match self {
            GcloudStep::CreateNeg => base.args([
                "network-endpoint-groups",
                "create",
                names.neg.as_str(),
                region.as_str(),
                "--network-endpoint-type=serverless",
                format!("--cloud-run-service={}", names.service).as_str(),
            ]),
            GcloudStep::CreateBackendService => base.args([
                "backend-services",
                "create",
                names.backend.as_str(),
                "--global",
                "--load-balancing-scheme=EXTERNAL_MANAGED",
                "--protocol=HTTP",
            ]),
            GcloudStep::AddNegBackend => base.args([
                "backend-services",
                "add-backend",
                names.backend.as_str(),
                "--global",
                format!("--network-endpoint-group={}", names.neg).as_str(),
                neg_region.as_str(),
            ]),
            GcloudStep::ReserveAddress => base.args([
                "addresses",
                "create",
                names.address.as_str(),
                "--global",
                "--ip-version=IPV4",
            ]),
            GcloudStep::DescribeAddress => base.args([
                "addresses",
                "describe",
                names.address.as_str(),
                "--global",
                "--format=get(address)",
            ]),
            GcloudStep::CreateUrlMap => base.args([
                "url-maps",
                "create",
                names.url_map.as_str(),
                format!("--default-service={}", names.backend).as_str(),
                "--global",
            ]),
            GcloudStep::CreateHttpProxy => base.args([
                "target-http-proxies",
                "create",
                names.proxy.as_str(),
                format!("--url-map={}", names.url_map).as_str(),
                "--global",
            ]),
            GcloudStep::CreateForwardingRule => base.args([
                "forwarding-rules",
                "create",
                names.forwarding_rule.as_str(),
                "--global",
                "--load-balancing-scheme=EXTERNAL_MANAGED",
                format!("--address={}", names.address).as_str(),
                format!("--target-http-proxy={}", names.proxy).as_str(),
                "--ports=80",
            ]),
            GcloudStep::ListForwardingRules => base.args([
                "forwarding-rules",
                "list",
                "--global",
                "--format=value(name,target)",
            ]),
            GcloudStep::DescribeHttpProxy { proxy } => base.args([
                "target-http-proxies",
                "describe",
                proxy.as_str(),
                "--global",
                "--format=get(urlMap)",
            ]),
            GcloudStep::SetUrlMapDefaultService { url_map } => base.args([
                "url-maps",
                "set-default-service",
                url_map.as_str(),
                format!("--default-service={}", names.backend).as_str(),
                "--global",
            ]),
            GcloudStep::DeleteForwardingRule => {
                base.args(["forwarding-rules", "delete", names.forwarding_rule.as_str(), "--global", "--quiet"])
            }
            GcloudStep::DeleteHttpProxy => {
                base.args(["target-http-proxies", "delete", names.proxy.as_str(), "--global", "--quiet"])
            }
            GcloudStep::DeleteUrlMap => {
                base.args(["url-maps", "delete", names.url_map.as_str(), "--global", "--quiet"])
            }
            GcloudStep::DeleteAddress => {
                base.args(["addresses", "delete", names.address.as_str(), "--global", "--quiet"])
            }
            GcloudStep::RemoveNegBackend => base.args([
                "backend-services",
                "remove-backend",
                names.backend.as_str(),
                "--global",
                format!("--network-endpoint-group={}", names.neg).as_str(),
                neg_region.as_str(),
                "--quiet",
            ]),
            GcloudStep::DeleteNeg => base.args([
                "network-endpoint-groups",
                "delete",
                names.neg.as_str(),
                region.as_str(),
                "--quiet",
            ]),
            GcloudStep::DeleteBackendService => {
                base.args(["backend-services", "delete", names.backend.as_str(), "--global", "--quiet"])
            }
        };
        cmd.arg(format!("--project={}", names.project_id))
    }

    pub fn parse(&self, output: &CommandOutput) -> GcloudResponse {
        match self.output_shape() {
            OutputShape::Ignored => GcloudResponse::Done,
            OutputShape::SingleValue => GcloudResponse::Value(parse_single_value(&output.stdout)),
            OutputShape::NameTargetRows => GcloudResponse::Rows(parse_rule_rows(&output.stdout)),
        }
    }
}

/// First non-empty line, trimmed.
pub fn parse_single_value(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

pub fn parse_rule_rows(stdout: &str) -> Vec<ForwardingRuleRow> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t').map(str::trim);
            let name = fields.next().filter(|name| !name.is_empty())?;
            let target = fields.next().map(last_segment).unwrap_or_default();
            Some(ForwardingRuleRow {
                name: name.to_string(),
                target: target.to_string(),
            })
        })
        .collect()
}

/// Resource references come back as full URLs; only the last segment names
/// the resource.
pub fn last_segment(reference: &str) -> &str {
    reference
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}
