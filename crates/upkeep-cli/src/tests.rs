use super::*;
use clap::error::ErrorKind;
use render::{render_status_line, resolve_output_style, OutputStyle};
use std::ffi::OsString;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use upkeep_core::parse_toml_tree;
use upkeep_installer::{
    ConfigInstallMode, ConfigInstallOutcome, FilterOutcome, VersionDrift, DEFAULT_CONFIG_NAME,
};

const TEMPLATE: &str = r#"version = "4.2.0"
ROOT = "/replace/me"

[Station]
location = "somewhere"

[Simulator]
driver = "upkeep.drivers.simulator"
loop_on_init = 1
"#;

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_root() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_nanos();
    let seq = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "upkeep-cli-test-{}-{nanos}-{seq}",
        std::process::id()
    ))
}

fn outcome(mode: ConfigInstallMode, installed: bool) -> ConfigInstallOutcome {
    ConfigInstallOutcome {
        destination: PathBuf::from("/srv/station/station.toml"),
        mode,
        dry_run: !installed,
        installed,
        backup: None,
        template_removed: installed,
        unknown_keys: Vec::new(),
        restructured: Vec::new(),
        version_drift: None,
    }
}

#[test]
fn cli_parses_upgrade_config_overrides() {
    let cli = Cli::try_parse_from([
        "upkeep",
        "--root",
        "/srv/station",
        "upgrade-config",
        "--no-prompt",
        "--dry-run",
        "--drift-policy",
        "drop",
        "--config-name",
        "weather.toml",
        "--scratch-dir",
        "/tmp/scratch",
    ])
    .expect("command must parse");

    assert_eq!(cli.root, Some(PathBuf::from("/srv/station")));
    let Commands::UpgradeConfig { template, upgrade } = cli.command else {
        panic!("expected upgrade-config");
    };
    assert_eq!(template, None);
    assert_eq!(
        upgrade,
        UpgradeArgs {
            config_name: Some("weather.toml".to_string()),
            no_prompt: true,
            dry_run: true,
            scratch_dir: Some(PathBuf::from("/tmp/scratch")),
            drift_policy: Some(DriftPolicy::Drop),
        }
    );
}

#[test]
fn cli_rejects_unknown_drift_policy() {
    let err = Cli::try_parse_from(["upkeep", "upgrade-config", "--drift-policy", "merge"])
        .expect_err("unknown policy must be rejected");
    assert_eq!(err.kind(), ErrorKind::ValueValidation);
}

#[test]
fn cli_install_requires_dist() {
    let err = Cli::try_parse_from(["upkeep", "install"]).expect_err("dist is required");
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
}

#[test]
fn cli_accepts_global_json_after_subcommand() {
    let cli = Cli::try_parse_from(["upkeep", "backup-path", "station.toml", "--json"])
        .expect("command must parse");
    assert!(cli.json);
    assert!(matches!(cli.command, Commands::BackupPath { .. }));
}

#[test]
fn upgrade_args_override_settings() {
    let mut settings = UpgradeSettings::default();
    let upgrade = UpgradeArgs {
        config_name: Some("weather.toml".to_string()),
        drift_policy: Some(DriftPolicy::Drop),
        ..UpgradeArgs::default()
    };
    upgrade.apply_to(&mut settings);
    assert_eq!(settings.config_name, "weather.toml");
    assert_eq!(settings.drift_policy, DriftPolicy::Drop);

    let mut untouched = UpgradeSettings::default();
    UpgradeArgs::default().apply_to(&mut untouched);
    assert_eq!(untouched, UpgradeSettings::default());
}

#[test]
fn resolve_output_style_follows_stdout() {
    assert_eq!(resolve_output_style(true), OutputStyle::Rich);
    assert_eq!(resolve_output_style(false), OutputStyle::Plain);
}

#[test]
fn render_status_line_plain_is_bare_message() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "installed configuration"),
        "installed configuration"
    );
    let rich = render_status_line(OutputStyle::Rich, "warn", "key not in new template: X");
    assert!(rich.contains("[WARN]"));
    assert!(rich.ends_with(" key not in new template: X"));
}

#[test]
fn config_outcome_lines_report_backup_drift_and_keys() {
    let mut merged = outcome(ConfigInstallMode::Merged, true);
    merged.backup = Some(PathBuf::from("/srv/station/station.toml.20240305060708"));
    merged.unknown_keys = vec!["Station.custom".to_string()];
    merged.restructured = vec!["A".to_string()];
    merged.version_drift = Some(VersionDrift {
        from: "4.1.0".to_string(),
        to: "4.2.0".to_string(),
        downgrade: false,
    });

    let lines = format_config_outcome_lines(&merged, OutputStyle::Plain);
    assert_eq!(
        lines,
        vec![
            "saved old configuration file as /srv/station/station.toml.20240305060708".to_string(),
            "configuration version 4.1.0 -> 4.2.0".to_string(),
            "key not in new template: Station.custom".to_string(),
            "key restructured by new template, user value not kept: A".to_string(),
            "installed merged configuration /srv/station/station.toml".to_string(),
        ]
    );
}

#[test]
fn config_outcome_lines_mark_dry_run() {
    let lines = format_config_outcome_lines(
        &outcome(ConfigInstallMode::Fresh, false),
        OutputStyle::Plain,
    );
    assert_eq!(
        lines,
        vec!["would install fresh configuration /srv/station/station.toml".to_string()]
    );
}

#[test]
fn content_plan_lines_list_installed_then_kept() {
    let plan = FilterOutcome {
        manifest: upkeep_core::ContentManifest::default(),
        skipped_groups: vec!["Seasons".to_string()],
        installed_groups: vec!["Mobile".to_string()],
    };
    assert_eq!(
        format_content_plan_lines(&plan, OutputStyle::Plain),
        vec!["install Mobile".to_string(), "keep existing Seasons".to_string()]
    );
}

#[test]
fn terminal_prompter_takes_defaults_on_empty_answers() {
    let mut output = Vec::new();
    let profile = {
        let mut prompter = TerminalPrompter::new(
            Cursor::new("Backyard\n\n\n\nVantage\n"),
            &mut output,
            upkeep_core::StationProfile::default_profile(),
        );
        prompter.prompt_for_info().expect("must read info")
    };

    assert_eq!(profile.station_type, "Vantage");
    assert_eq!(
        profile.settings.get("location").map(String::as_str),
        Some("Backyard")
    );
    assert!(!profile.settings.contains_key("latitude"));
    let transcript = String::from_utf8(output).expect("prompts are utf-8");
    assert!(transcript.contains("station type [Simulator]: "));
}

#[test]
fn terminal_prompter_reads_driver_and_its_settings() {
    let template = parse_toml_tree(TEMPLATE).expect("template must parse");
    let mut output = Vec::new();
    let mut prompter = TerminalPrompter::new(
        Cursor::new("\n5\n"),
        &mut output,
        upkeep_core::StationProfile::default_profile(),
    );

    let driver = prompter
        .prompt_for_driver("upkeep.drivers.simulator")
        .expect("must read driver");
    assert_eq!(driver, "upkeep.drivers.simulator");

    let settings = prompter
        .prompt_for_driver_settings(&driver, &template)
        .expect("must read driver settings");
    assert_eq!(settings.get("loop_on_init").map(String::as_str), Some("5"));
    assert!(!settings.contains_key("driver"));
}

#[test]
fn terminal_prompter_skips_settings_for_unknown_driver() {
    let template = parse_toml_tree(TEMPLATE).expect("template must parse");
    let mut prompter = TerminalPrompter::new(
        Cursor::new(""),
        Vec::new(),
        upkeep_core::StationProfile::default_profile(),
    );
    let settings = prompter
        .prompt_for_driver_settings("vendor.drivers.unknown", &template)
        .expect("unknown driver has no settings");
    assert!(settings.is_empty());
}

#[test]
fn completions_name_the_binary() {
    let mut buffer = Vec::new();
    write_completions(Shell::Bash, &mut buffer).expect("must generate completions");
    let script = String::from_utf8(buffer).expect("completion script is utf-8");
    assert!(script.contains("upkeep"));
    assert!(script.contains("upgrade-config"));
}

#[test]
fn run_cli_installs_fresh_config_without_prompting() {
    let root = test_root();
    std::fs::create_dir_all(&root).expect("must create root");
    let template = root.join(format!("{DEFAULT_CONFIG_NAME}.template"));
    std::fs::write(&template, TEMPLATE).expect("must write template");

    let cli = Cli::try_parse_from([
        OsString::from("upkeep"),
        OsString::from("--root"),
        root.clone().into_os_string(),
        OsString::from("upgrade-config"),
        OsString::from("--no-prompt"),
    ])
    .expect("command must parse");
    run_cli(cli).expect("upgrade must succeed");

    let installed =
        std::fs::read_to_string(root.join(DEFAULT_CONFIG_NAME)).expect("config installed");
    let tree = parse_toml_tree(&installed).expect("installed config parses");
    assert_eq!(
        tree.value("ROOT").and_then(|value| value.as_str()),
        Some(root.to_string_lossy().as_ref())
    );
    assert!(!template.exists(), "template is removed after install");

    let _ = std::fs::remove_dir_all(&root);
}
