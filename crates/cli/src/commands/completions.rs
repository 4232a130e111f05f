use std::io;

use clap::CommandFactory;
use clap_complete::generate;
use clap_complete::shells::{Bash, Fish, Zsh};

use crate::args::{Cli, CompletionShell};

pub fn generate_completions(shell: CompletionShell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    let mut out = io::stdout();
    match shell {
        CompletionShell::Bash => generate(Bash, &mut cmd, name, &mut out),
        CompletionShell::Zsh => generate(Zsh, &mut cmd, name, &mut out),
        CompletionShell::Fish => generate(Fish, &mut cmd, name, &mut out),
    }
}
