use std::io::Write;

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::Shell;

use crate::Cli;

pub(crate) fn write_completions(shell: Shell, out: &mut dyn Write) -> Result<()> {
    let mut buffer = Vec::new();
    clap_complete::generate(shell, &mut Cli::command(), "upkeep", &mut buffer);
    out.write_all(&buffer)
        .context("failed writing completion script")?;
    Ok(())
}
