//! # Shell Completion Module
//!
//! Generates completion scripts for the shells clap_complete supports.
//!
//! ```bash
//! # Generate bash completions
//! encore completion bash > ~/.local/share/bash-completion/completions/encore
//!
//! # Generate zsh completions
//! encore completion zsh > ~/.config/zsh/completions/_encore
//! ```

use crate::cli;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io;

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

/// Map our CLI shell enum to clap_complete's
pub fn shell_to_completion_shell(shell: &cli::Shell) -> CompletionShell {
    match shell {
        cli::Shell::Bash => CompletionShell::Bash,
        cli::Shell::Zsh => CompletionShell::Zsh,
        cli::Shell::Fish => CompletionShell::Fish,
        cli::Shell::PowerShell => CompletionShell::PowerShell,
        cli::Shell::Elvish => CompletionShell::Elvish,
    }
}
