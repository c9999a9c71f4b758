use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use upkeep_core::{DriftPolicy, TomlConfigStore};
use upkeep_installer::{
    default_install_root, filter_manifest, install_bundle, next_backup_path,
    update_and_install_config, DistributionBundle, InstallLayout, StationPrompter,
    UpgradeContext, UpgradeSettings, SETTINGS_FILE_NAME,
};

mod completion;
mod prompt;
mod render;

use completion::write_completions;
use prompt::TerminalPrompter;
use render::{
    current_output_style, format_config_outcome_lines, format_content_plan_lines,
    format_install_report_lines,
};

const LOG_ENV: &str = "UPKEEP_LOG";

#[derive(Parser, Debug)]
#[command(name = "upkeep")]
#[command(about = "Upgrade a station install without losing local changes", long_about = None)]
struct Cli {
    /// Install root; defaults to $UPKEEP_ROOT or a per-user directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Print results as JSON instead of status lines.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge the staged template with the installed configuration.
    UpgradeConfig {
        /// Template to merge from; defaults to `<config>.template` at the root.
        #[arg(long)]
        template: Option<PathBuf>,
        #[command(flatten)]
        upgrade: UpgradeArgs,
    },
    /// Install an unpacked distribution over the root.
    Install {
        #[arg(long)]
        dist: PathBuf,
        #[command(flatten)]
        upgrade: UpgradeArgs,
    },
    /// Show which content groups an install would copy or keep.
    PlanContent {
        #[arg(long)]
        dist: PathBuf,
    },
    /// Print the name a backup of PATH would get right now.
    BackupPath { path: PathBuf },
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
struct UpgradeArgs {
    #[arg(long)]
    config_name: Option<String>,
    /// Use the default station profile instead of asking.
    #[arg(long)]
    no_prompt: bool,
    #[arg(long)]
    dry_run: bool,
    /// Directory for the temporary merged configuration.
    #[arg(long)]
    scratch_dir: Option<PathBuf>,
    /// What to do with keys the new template no longer has.
    #[arg(long, value_parser = parse_drift_policy)]
    drift_policy: Option<DriftPolicy>,
}

impl UpgradeArgs {
    fn apply_to(&self, settings: &mut UpgradeSettings) {
        if let Some(config_name) = &self.config_name {
            settings.config_name = config_name.clone();
        }
        if let Some(policy) = self.drift_policy {
            settings.drift_policy = policy;
        }
    }
}

#[derive(Serialize)]
struct BackupPathReport<'a> {
    path: &'a Path,
    backup: PathBuf,
}

fn parse_drift_policy(value: &str) -> Result<DriftPolicy, String> {
    DriftPolicy::parse(value).map_err(|err| err.to_string())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_cli(cli)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_cli(cli: Cli) -> Result<()> {
    let style = current_output_style();

    match cli.command {
        Commands::UpgradeConfig { template, upgrade } => {
            let root = resolve_root(cli.root)?;
            let settings = load_settings(&root, &upgrade)?;
            let layout = InstallLayout::with_settings(&root, &settings);
            let store = TomlConfigStore;
            let mut prompter = terminal_prompter(&settings);

            let mut ctx = upgrade_context(layout, &settings, &upgrade, &store, &mut prompter);
            if let Some(template) = template {
                ctx.template_path = template;
            }
            let outcome = update_and_install_config(&mut ctx)?;
            if cli.json {
                print_json(&outcome)?;
            } else {
                for line in format_config_outcome_lines(&outcome, style) {
                    println!("{line}");
                }
            }
        }
        Commands::Install { dist, upgrade } => {
            let root = resolve_root(cli.root)?;
            let settings = load_settings(&root, &upgrade)?;
            let layout = InstallLayout::with_settings(&root, &settings);
            let store = TomlConfigStore;
            let mut prompter = terminal_prompter(&settings);
            let bundle = DistributionBundle::new(dist);

            let mut ctx = upgrade_context(layout, &settings, &upgrade, &store, &mut prompter);
            let report = install_bundle(&mut ctx, &settings, &bundle)?;
            if cli.json {
                print_json(&report)?;
            } else {
                for line in format_install_report_lines(&report, style) {
                    println!("{line}");
                }
            }
        }
        Commands::PlanContent { dist } => {
            let root = resolve_root(cli.root)?;
            let settings = load_settings(&root, &UpgradeArgs::default())?;
            let layout = InstallLayout::with_settings(&root, &settings);
            let manifest = DistributionBundle::new(dist).content_manifest(&settings)?;
            let plan = filter_manifest(&manifest, layout.root(), layout.content_category());
            if cli.json {
                print_json(&plan)?;
            } else {
                for line in format_content_plan_lines(&plan, style) {
                    println!("{line}");
                }
            }
        }
        Commands::BackupPath { path } => {
            let backup = next_backup_path(&path);
            if cli.json {
                print_json(&BackupPathReport {
                    path: &path,
                    backup,
                })?;
            } else {
                println!("{}", backup.display());
            }
        }
        Commands::Completions { shell } => {
            let mut stdout = std::io::stdout();
            write_completions(shell, &mut stdout)?;
        }
    }

    Ok(())
}

fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(root) => Ok(root),
        None => default_install_root(),
    }
}

fn load_settings(root: &Path, upgrade: &UpgradeArgs) -> Result<UpgradeSettings> {
    let mut settings = UpgradeSettings::load(&root.join(SETTINGS_FILE_NAME))?;
    upgrade.apply_to(&mut settings);
    Ok(settings)
}

type StdinPrompter = TerminalPrompter<std::io::StdinLock<'static>, std::io::Stdout>;

fn terminal_prompter(settings: &UpgradeSettings) -> StdinPrompter {
    TerminalPrompter::new(
        std::io::stdin().lock(),
        std::io::stdout(),
        settings.default_profile.clone(),
    )
}

fn upgrade_context<'a>(
    layout: InstallLayout,
    settings: &UpgradeSettings,
    upgrade: &UpgradeArgs,
    store: &'a TomlConfigStore,
    prompter: &'a mut StdinPrompter,
) -> UpgradeContext<'a> {
    let mut ctx = UpgradeContext::from_settings(layout, settings, store);
    ctx.no_prompt = upgrade.no_prompt;
    ctx.dry_run = upgrade.dry_run;
    ctx.scratch_dir = upgrade.scratch_dir.clone();
    if !upgrade.no_prompt {
        ctx.prompter = Some(prompter as &mut dyn StationPrompter);
    }
    ctx
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests;
