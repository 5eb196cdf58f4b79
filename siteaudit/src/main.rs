use anyhow::{Context, bail};
use clap::ArgMatches;
use commands::command_argument_builder;
use siteaudit_core::print_banner;
use siteaudit_core::{AuditOptions, execute_audit};
use std::path::Path;
use url::Url;

mod commands;
mod ddev;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    match chosen_command.subcommand() {
        Some(("audit", primary_command)) => {
            if let Err(e) = handle_audit(primary_command, quiet).await {
                eprintln!("[!] Audit failed: {e:#}");
                std::process::exit(1);
            }
        }
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

async fn handle_audit(sub_matches: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let base_url = match sub_matches.get_one::<Url>("url") {
        Some(url) => url.to_string(),
        None => {
            let cwd = std::env::current_dir().context("cannot read current directory")?;
            match ddev::detect_ddev_url(&cwd) {
                Some(url) => {
                    if !quiet {
                        println!("Detected DDEV project, auditing {url}");
                    }
                    url
                }
                None => bail!("no --url given and no DDEV project found in the current directory"),
            }
        }
    };

    let compare_base = sub_matches.get_one::<Url>("compare").map(Url::to_string);
    let drush_cmd = sub_matches.get_one::<String>("drush").cloned();
    let show_progress = !quiet && !sub_matches.get_flag("no-progress");

    let output = sub_matches.get_one::<String>("output").unwrap();
    let expanded_output = shellexpand::tilde(output);
    let output_dir = Path::new(expanded_output.as_ref()).to_path_buf();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("cannot create output directory {}", output_dir.display()))?;

    let options = AuditOptions {
        base_url,
        compare_base,
        drush_cmd,
        screenshot_dir: output_dir.join("screenshots"),
        show_progress,
    };

    let records = execute_audit(options).await?;
    export_reports(&records, &output_dir, quiet)
}

fn export_reports(
    records: &[siteaudit_auditor::AuditRecord],
    output_dir: &Path,
    quiet: bool,
) -> anyhow::Result<()> {
    let json_path = output_dir.join("audit_results.json");
    let json = siteaudit_core::render_json(records)?;
    siteaudit_core::save_report(&json, &json_path)
        .with_context(|| format!("cannot write {}", json_path.display()))?;

    let rows = siteaudit_core::flatten_records(records);
    let csv_path = output_dir.join("audit_results.csv");
    siteaudit_core::write_csv(&rows, &csv_path)
        .with_context(|| format!("cannot write {}", csv_path.display()))?;

    if !quiet {
        print!(
            "{}",
            siteaudit_core::render_summary(&siteaudit_core::category_summary(&rows))
        );
        println!("\nReports written:");
        println!("  JSON: {}", json_path.display());
        println!("  CSV:  {}", csv_path.display());
    }
    Ok(())
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
