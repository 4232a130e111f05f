use std::path::PathBuf;

use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum SecretCommands {
    /// Create a secret, or add a new version when it already exists.
    Create {
        /// Secret name.
        name: String,
        /// Secret value.
        #[arg(long, conflicts_with = "from_file", required_unless_present = "from_file")]
        value: Option<String>,
        /// Read the secret value from a file.
        #[arg(long, value_name = "PATH")]
        from_file: Option<PathBuf>,
    },
    /// Delete a secret and all of its versions.
    Delete {
        /// Secret name.
        name: String,
    },
    /// List secrets in the document's project.
    List,
}
