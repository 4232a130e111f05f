use std::fs;

use anyhow::Context;

use crate::args::SecretCommands;
use crate::commands::CommandContext;

pub async fn handle_secret(ctx: &CommandContext, command: SecretCommands) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let project_id = config.project_id.as_str();

    match command {
        SecretCommands::Create {
            name,
            value,
            from_file,
        } => {
            let value = match (value, from_file) {
                (Some(value), _) => value,
                (None, Some(path)) => fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => anyhow::bail!("pass --value or --from-file"),
            };
            let secrets = ctx.clients().await?.secrets;
            secrets
                .create(project_id, &name, &value)
                .await
                .with_context(|| format!("failed to store secret {name}"))?;
            println!("stored secret {name} in {project_id}");
        }
        SecretCommands::Delete { name } => {
            let secrets = ctx.clients().await?.secrets;
            secrets
                .delete(project_id, &name)
                .await
                .with_context(|| format!("failed to delete secret {name}"))?;
            println!("deleted secret {name} from {project_id}");
        }
        SecretCommands::List => {
            let secrets = ctx.clients().await?.secrets;
            for name in secrets
                .list(project_id)
                .await
                .context("failed to list secrets")?
            {
                println!("{name}");
            }
        }
    }
    Ok(())
}
