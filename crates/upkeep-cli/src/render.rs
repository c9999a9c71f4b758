use std::io::IsTerminal;

use anstyle::{AnsiColor, Effects, Style};
use upkeep_installer::{ConfigInstallOutcome, FilterOutcome, InstallReport};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn current_output_style() -> OutputStyle {
    resolve_output_style(std::io::stdout().is_terminal())
}

/// Status lines are the only styled output and they go to stdout.
pub(crate) fn resolve_output_style(stdout_is_tty: bool) -> OutputStyle {
    if stdout_is_tty {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => {
            let badge = format!("[{}]", status.to_ascii_uppercase());
            format!("{} {message}", colorize(status_style(status), &badge))
        }
    }
}

pub(crate) fn format_config_outcome_lines(
    outcome: &ConfigInstallOutcome,
    style: OutputStyle,
) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(backup) = &outcome.backup {
        lines.push(render_status_line(
            style,
            "ok",
            &format!("saved old configuration file as {}", backup.display()),
        ));
    }
    if let Some(drift) = &outcome.version_drift {
        let status = if drift.downgrade { "warn" } else { "ok" };
        lines.push(render_status_line(
            style,
            status,
            &format!("configuration version {} -> {}", drift.from, drift.to),
        ));
    }
    for key in &outcome.unknown_keys {
        lines.push(render_status_line(
            style,
            "warn",
            &format!("key not in new template: {key}"),
        ));
    }
    for key in &outcome.restructured {
        lines.push(render_status_line(
            style,
            "warn",
            &format!("key restructured by new template, user value not kept: {key}"),
        ));
    }

    let verb = if outcome.installed {
        "installed"
    } else {
        "would install"
    };
    lines.push(render_status_line(
        style,
        "ok",
        &format!(
            "{verb} {} configuration {}",
            outcome.mode.as_str(),
            outcome.destination.display()
        ),
    ));
    lines
}

pub(crate) fn format_content_plan_lines(plan: &FilterOutcome, style: OutputStyle) -> Vec<String> {
    let mut lines = Vec::new();
    for group in &plan.installed_groups {
        lines.push(render_status_line(style, "ok", &format!("install {group}")));
    }
    for group in &plan.skipped_groups {
        lines.push(render_status_line(
            style,
            "skip",
            &format!("keep existing {group}"),
        ));
    }
    lines
}

pub(crate) fn format_install_report_lines(report: &InstallReport, style: OutputStyle) -> Vec<String> {
    let mut lines = Vec::new();
    for group in &report.installed_groups {
        lines.push(render_status_line(style, "ok", &format!("content group {group}")));
    }
    for group in &report.skipped_groups {
        lines.push(render_status_line(
            style,
            "skip",
            &format!("content group {group} already present"),
        ));
    }
    if let Some(restored) = &report.restored_assets {
        if let Some(snapshot) = &restored.snapshot {
            lines.push(render_status_line(
                style,
                "ok",
                &format!(
                    "restored {} user files (backup kept at {})",
                    restored.copied_files.len(),
                    snapshot.display()
                ),
            ));
        }
        for renamed in &restored.renamed {
            lines.push(render_status_line(
                style,
                "warn",
                &format!("retired legacy file {}", renamed.display()),
            ));
        }
    }
    lines.extend(format_config_outcome_lines(&report.config, style));
    lines
}

fn status_style(status: &str) -> Style {
    let color = match status {
        "ok" => AnsiColor::BrightGreen,
        "warn" => AnsiColor::BrightYellow,
        "err" => AnsiColor::BrightRed,
        _ => AnsiColor::BrightBlue,
    };
    Style::new()
        .fg_color(Some(color.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
