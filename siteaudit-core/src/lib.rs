//! Shared audit orchestration: drush seeding, browser audit runs and
//! report export for the `siteaudit` binary.

use colored::Colorize;

pub mod crawl;
pub mod report;
pub mod seed;

pub use crawl::{AuditOptions, execute_audit};
pub use report::{
    CategorySummary, CsvRow, category_summary, flatten_records, render_json, render_summary,
    save_report, write_csv,
};
pub use seed::seed_urls_from_drush;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn print_banner() {
    println!(
        "{} {}",
        "siteaudit".bold().cyan(),
        format!("v{VERSION}").dimmed()
    );
    println!("{}", "site-wide audit crawler".dimmed());
    println!();
}
