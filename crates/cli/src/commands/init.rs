use std::fs;
use std::path::Path;

use anyhow::{Context, bail};
use common::config::{ContainerConfig, DeployConfig, ResourceLimits, ScalingPolicy};
use orchestrator::validation::validate_service_name;

use crate::args::InitArgs;
use crate::commands::CommandContext;

const FALLBACK_SERVICE_NAME: &str = "my-service";

const TEMPLATE_FOOTER: &str = "\
# Optional sections:
#
# secrets:
#   - name: db-password
#     version: latest
#     mount_path: /secrets/db-password
# volumes:
#   - name: assets
#     path: /data
#     kind: read-only
#     bucket: my-bucket
# load_balancer:
#   name: my-service-lb
# environments:
#   staging:
#     project_id: my-staging-project
# build:
#   dockerfile: Dockerfile
#   context: .
";

pub fn handle_init(ctx: &CommandContext, args: InitArgs) -> anyhow::Result<()> {
    let path = &ctx.config_path;
    if path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }

    let name = match args.name {
        Some(name) => {
            validate_service_name(&name)?;
            name
        }
        None => default_service_name(&std::env::current_dir()?),
    };
    let document = render_starter(starter_config(name, args.project_id, args.region))?;
    fs::write(path, document).with_context(|| format!("failed to write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

fn default_service_name(dir: &Path) -> String {
    let candidate = dir
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase().replace(['_', ' ', '.'], "-"))
        .unwrap_or_default();
    if validate_service_name(&candidate).is_ok() {
        candidate
    } else {
        FALLBACK_SERVICE_NAME.to_string()
    }
}

fn starter_config(name: String, project_id: String, region: String) -> DeployConfig {
    DeployConfig {
        container: ContainerConfig {
            image: format!("{region}-docker.pkg.dev/{project_id}/containers/{name}:latest"),
            port: 8080,
            resources: Some(ResourceLimits {
                cpu: "1".into(),
                memory: "512Mi".into(),
            }),
            env: Vec::new(),
            scaling: Some(ScalingPolicy {
                min_instances: 0,
                max_instances: 10,
                concurrency: 80,
            }),
        },
        name,
        project_id,
        region,
        allow_unauthenticated: false,
        service_account: None,
        secrets: Vec::new(),
        volumes: Vec::new(),
        traffic: Vec::new(),
        load_balancer: None,
        environments: Default::default(),
        build: None,
    }
}

fn render_starter(config: DeployConfig) -> anyhow::Result<String> {
    let mut document = config.to_yaml_string()?;
    document.push('\n');
    document.push_str(TEMPLATE_FOOTER);
    Ok(document)
}
