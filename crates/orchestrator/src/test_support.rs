use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::anyhow;
use async_trait::async_trait;
use common::config::{ContainerConfig, DeployConfig, ResourceLimits};
use common::platform::{Condition, IamPolicy, Service, TrafficTargetSpec};

use crate::command::{CommandError, CommandExecutor, CommandOutput, CommandSpec};
use crate::platform::{PlatformClient, PlatformError, ServiceRef};
use crate::secrets::{SecretError, SecretResolver};

pub(crate) static ENV_LOCK: StdMutex<()> = StdMutex::new(());

pub(crate) fn sample_config() -> DeployConfig {
    DeployConfig {
        name: "my-svc".into(),
        project_id: "demo-project".into(),
        region: "us-central1".into(),
        allow_unauthenticated: false,
        service_account: None,
        container: ContainerConfig {
            image: "img:latest".into(),
            port: 8080,
            resources: Some(ResourceLimits {
                cpu: "1".into(),
                memory: "512Mi".into(),
            }),
            env: Vec::new(),
            scaling: None,
        },
        secrets: Vec::new(),
        volumes: Vec::new(),
        traffic: Vec::new(),
        load_balancer: None,
        environments: Default::default(),
        build: None,
    }
}

/// Service status carrying a single terminal condition.
pub(crate) fn status(state: &str, message: Option<&str>, uri: Option<&str>) -> Service {
    Service {
        uri: uri.map(str::to_string),
        terminal_condition: Some(Condition {
            kind: Some("Ready".into()),
            state: Some(state.to_string()),
            message: message.map(str::to_string),
            ..Condition::default()
        }),
        ..Service::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlatformCall {
    Create(String),
    Replace(String),
    Get(String),
    UpdateTraffic(String, Vec<TrafficTargetSpec>),
    SetIamPolicy(String, IamPolicy),
    ListRevisions(String),
    Delete(String),
}

#[derive(Default)]
struct FakePlatformState {
    calls: Vec<PlatformCall>,
    projects: Vec<String>,
    submitted: Option<Service>,
    statuses: VecDeque<Result<Service, PlatformError>>,
    fallback_status: Option<Service>,
    create_error: Option<(i32, String)>,
    iam_error: Option<(i32, String)>,
    delete_errors: HashMap<String, (i32, String)>,
    revisions: Vec<String>,
}

#[derive(Clone, Default)]
pub(crate) struct FakePlatform {
    state: Arc<StdMutex<FakePlatformState>>,
}

impl FakePlatform {
    pub(crate) fn transport_error() -> PlatformError {
        PlatformError::Transport {
            context: "get service",
            source: anyhow!("connection reset by peer"),
        }
    }

    pub(crate) fn push_status(&self, status: Result<Service, PlatformError>) {
        self.state.lock().unwrap().statuses.push_back(status);
    }

    /// Returned once the scripted statuses run out.
    pub(crate) fn set_fallback_status(&self, status: Service) {
        self.state.lock().unwrap().fallback_status = Some(status);
    }

    pub(crate) fn fail_create_with(&self, code: i32, details: &str) {
        self.state.lock().unwrap().create_error = Some((code, details.to_string()));
    }

    pub(crate) fn fail_iam_with(&self, code: i32, details: &str) {
        self.state.lock().unwrap().iam_error = Some((code, details.to_string()));
    }

    pub(crate) fn fail_delete_for(&self, service: &str, code: i32, details: &str) {
        self.state
            .lock()
            .unwrap()
            .delete_errors
            .insert(service.to_string(), (code, details.to_string()));
    }

    pub(crate) fn set_revisions(&self, revisions: &[&str]) {
        self.state.lock().unwrap().revisions = revisions.iter().map(|r| r.to_string()).collect();
    }

    pub(crate) fn calls(&self) -> Vec<PlatformCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Distinct projects touched, in first-seen order.
    pub(crate) fn projects(&self) -> Vec<String> {
        self.state.lock().unwrap().projects.clone()
    }

    pub(crate) fn last_submitted(&self) -> Option<Service> {
        self.state.lock().unwrap().submitted.clone()
    }

    fn record(&self, target: &ServiceRef, call: PlatformCall) {
        let mut state = self.state.lock().unwrap();
        if !state.projects.contains(&target.project_id) {
            state.projects.push(target.project_id.clone());
        }
        state.calls.push(call);
    }
}

#[async_trait]
impl PlatformClient for FakePlatform {
    async fn create_service(
        &self,
        target: &ServiceRef,
        service: &Service,
    ) -> Result<(), PlatformError> {
        self.record(target, PlatformCall::Create(target.name.clone()));
        let mut state = self.state.lock().unwrap();
        state.submitted = Some(service.clone());
        match &state.create_error {
            Some((code, details)) => Err(PlatformError::api(*code, details.clone())),
            None => Ok(()),
        }
    }

    async fn replace_service(
        &self,
        target: &ServiceRef,
        service: &Service,
    ) -> Result<(), PlatformError> {
        self.record(target, PlatformCall::Replace(target.name.clone()));
        self.state.lock().unwrap().submitted = Some(service.clone());
        Ok(())
    }

    async fn get_service(&self, target: &ServiceRef) -> Result<Service, PlatformError> {
        self.record(target, PlatformCall::Get(target.name.clone()));
        let mut state = self.state.lock().unwrap();
        if let Some(next) = state.statuses.pop_front() {
            return next;
        }
        state
            .fallback_status
            .clone()
            .ok_or_else(|| PlatformError::api(404, "no scripted status"))
    }

    async fn update_traffic(
        &self,
        target: &ServiceRef,
        traffic: &[TrafficTargetSpec],
    ) -> Result<(), PlatformError> {
        self.record(
            target,
            PlatformCall::UpdateTraffic(target.name.clone(), traffic.to_vec()),
        );
        Ok(())
    }

    async fn set_iam_policy(
        &self,
        target: &ServiceRef,
        policy: &IamPolicy,
    ) -> Result<(), PlatformError> {
        self.record(
            target,
            PlatformCall::SetIamPolicy(target.name.clone(), policy.clone()),
        );
        match &self.state.lock().unwrap().iam_error {
            Some((code, details)) => Err(PlatformError::api(*code, details.clone())),
            None => Ok(()),
        }
    }

    async fn list_revisions(&self, target: &ServiceRef) -> Result<Vec<String>, PlatformError> {
        self.record(target, PlatformCall::ListRevisions(target.name.clone()));
        Ok(self.state.lock().unwrap().revisions.clone())
    }

    async fn delete_service(&self, target: &ServiceRef) -> Result<(), PlatformError> {
        self.record(target, PlatformCall::Delete(target.name.clone()));
        match self.state.lock().unwrap().delete_errors.get(&target.name) {
            Some((code, details)) => Err(PlatformError::api(*code, details.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct FakeSecrets {
    values: HashMap<String, String>,
    accessed: Arc<StdMutex<Vec<String>>>,
}

impl FakeSecrets {
    pub(crate) fn with(entries: &[(&str, &str)]) -> Self {
        Self {
            values: entries
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            accessed: Arc::default(),
        }
    }

    pub(crate) fn accessed(&self) -> Vec<String> {
        self.accessed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecretResolver for FakeSecrets {
    async fn access(&self, _project_id: &str, name: &str) -> Result<String, SecretError> {
        self.accessed.lock().unwrap().push(name.to_string());
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::NotFound {
                name: name.to_string(),
            })
    }
}

enum Scripted {
    Stdout(String),
    Fail(String),
}

/// Records every command; responses are matched by substring of the joined
/// argument list, commands without a match succeed with empty output.
#[derive(Clone, Default)]
pub(crate) struct FakeExecutor {
    commands: Arc<StdMutex<Vec<CommandSpec>>>,
    scripts: Arc<StdMutex<Vec<(String, Scripted)>>>,
}

impl FakeExecutor {
    pub(crate) fn respond(&self, pattern: &str, stdout: &str) {
        self.scripts
            .lock()
            .unwrap()
            .push((pattern.to_string(), Scripted::Stdout(stdout.to_string())));
    }

    pub(crate) fn fail(&self, pattern: &str, stderr: &str) {
        self.scripts
            .lock()
            .unwrap()
            .push((pattern.to_string(), Scripted::Fail(stderr.to_string())));
    }

    pub(crate) fn commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandExecutor for FakeExecutor {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.commands.lock().unwrap().push(command.clone());
        let joined = command.args.join(" ");
        let scripts = self.scripts.lock().unwrap();
        match scripts.iter().find(|(pattern, _)| joined.contains(pattern.as_str())) {
            Some((_, Scripted::Stdout(stdout))) => Ok(CommandOutput::stdout(stdout.clone())),
            Some((_, Scripted::Fail(stderr))) => Err(CommandError::Failed {
                command: command.to_string(),
                code: Some(1),
                stderr: stderr.clone(),
            }),
            None => Ok(CommandOutput::stdout("")),
        }
    }
}
