//! Report export: the nested JSON report, the flat CSV report, and the
//! printed per-category summary.

use colored::Colorize;
use siteaudit_auditor::AuditRecord;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const CSV_COLUMNS: [&str; 19] = [
    "category",
    "url",
    "status_code",
    "load_time_ms",
    "ttfb_ms",
    "request_count",
    "total_bytes",
    "seo_title",
    "seo_meta_description",
    "seo_canonical",
    "seo_h1",
    "seo_robots",
    "images_total",
    "images_missing_alt",
    "images_broken",
    "error_count",
    "responsive_issue_count",
    "a11y_violation_count",
    "cls",
];

/// One flattened row of the tabular report.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    pub category: String,
    pub url: String,
    pub status_code: Option<u16>,
    pub load_time_ms: Option<u64>,
    pub ttfb_ms: Option<i64>,
    pub request_count: usize,
    pub total_bytes: u64,
    pub seo_title: Option<String>,
    pub seo_meta_description: Option<String>,
    pub seo_canonical: Option<String>,
    pub seo_h1: String,
    pub seo_robots: Option<String>,
    pub images_total: usize,
    pub images_missing_alt: usize,
    pub images_broken: usize,
    pub error_count: usize,
    pub responsive_issue_count: usize,
    pub a11y_violation_count: usize,
    pub cls: Option<f64>,
}

/// The nested report, serialized verbatim so it re-parses into an equal
/// record collection.
pub fn render_json(records: &[AuditRecord]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(records)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Flatten every record into a fixed-column row, sorted by category then
/// path for easy scanning.
pub fn flatten_records(records: &[AuditRecord]) -> Vec<CsvRow> {
    let mut rows: Vec<CsvRow> = records
        .iter()
        .map(|record| CsvRow {
            category: record.category.clone(),
            url: record.url.clone(),
            status_code: record.status_code,
            load_time_ms: record.load_time_ms,
            ttfb_ms: record.ttfb_ms,
            request_count: record.request_count,
            total_bytes: record.total_bytes,
            seo_title: record.seo.title.clone(),
            seo_meta_description: record.seo.meta_description.clone(),
            seo_canonical: record.seo.canonical.clone(),
            seo_h1: record.seo.h1.join("; "),
            seo_robots: record.seo.robots.clone(),
            images_total: record.images.total,
            images_missing_alt: record.images.missing_alt,
            images_broken: record.images.broken,
            error_count: record.errors.len(),
            responsive_issue_count: record.responsive_issues.len(),
            a11y_violation_count: record.a11y_violation_count(),
            cls: record.performance_vitals.cls,
        })
        .collect();

    rows.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| a.url.cmp(&b.url))
    });
    rows
}

pub fn write_csv(rows: &[CsvRow], path: &Path) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(CSV_COLUMNS)?;

    for row in rows {
        writer.write_record([
            row.category.clone(),
            row.url.clone(),
            opt_display(row.status_code),
            opt_display(row.load_time_ms),
            opt_display(row.ttfb_ms),
            row.request_count.to_string(),
            row.total_bytes.to_string(),
            row.seo_title.clone().unwrap_or_default(),
            row.seo_meta_description.clone().unwrap_or_default(),
            row.seo_canonical.clone().unwrap_or_default(),
            row.seo_h1.clone(),
            row.seo_robots.clone().unwrap_or_default(),
            row.images_total.to_string(),
            row.images_missing_alt.to_string(),
            row.images_broken.to_string(),
            row.error_count.to_string(),
            row.responsive_issue_count.to_string(),
            row.a11y_violation_count.to_string(),
            opt_display(row.cls),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn opt_display<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Per-category aggregates for the printed summary.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub category: String,
    pub pages: usize,
    pub ok: usize,
    pub errors: usize,
    pub avg_load_ms: Option<f64>,
    pub missing_meta: usize,
    pub broken_images: usize,
}

/// Group rows by category. A missing status code counts as an error;
/// the mean load time is taken over pages with a measurement.
pub fn category_summary(rows: &[CsvRow]) -> Vec<CategorySummary> {
    let mut grouped: BTreeMap<&str, Vec<&CsvRow>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.category.as_str()).or_default().push(row);
    }

    grouped
        .into_iter()
        .map(|(category, rows)| {
            let ok = rows
                .iter()
                .filter(|r| r.status_code == Some(200))
                .count();
            let load_times: Vec<u64> = rows.iter().filter_map(|r| r.load_time_ms).collect();
            let avg_load_ms = if load_times.is_empty() {
                None
            } else {
                Some(load_times.iter().sum::<u64>() as f64 / load_times.len() as f64)
            };
            CategorySummary {
                category: category.to_string(),
                pages: rows.len(),
                ok,
                errors: rows.len() - ok,
                avg_load_ms,
                missing_meta: rows
                    .iter()
                    .filter(|r| r.seo_meta_description.is_none())
                    .count(),
                broken_images: rows.iter().map(|r| r.images_broken).sum(),
            }
        })
        .collect()
}

/// Render the summary table for the terminal. Printed, never persisted.
pub fn render_summary(summaries: &[CategorySummary]) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n--- {} ---\n", "Summary by category".bold()));
    out.push_str(&format!(
        "{}\n",
        chrono::Local::now()
            .format("Generated %Y-%m-%d %H:%M")
            .to_string()
            .dimmed()
    ));
    out.push_str(&format!(
        "{:<20} {:>6} {:>5} {:>7} {:>12} {:>13} {:>14}\n",
        "category", "pages", "ok", "errors", "avg_load_ms", "missing_meta", "broken_images"
    ));

    for summary in summaries {
        let errors = if summary.errors > 0 {
            summary.errors.to_string().red().to_string()
        } else {
            summary.errors.to_string()
        };
        let avg = summary
            .avg_load_ms
            .map(|ms| format!("{ms:.0}"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<20} {:>6} {:>5} {:>7} {:>12} {:>13} {:>14}\n",
            summary.category,
            summary.pages,
            summary.ok.to_string().green(),
            errors,
            avg,
            summary.missing_meta,
            summary.broken_images,
        ));
    }
    out
}
