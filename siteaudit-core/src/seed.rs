//! Seed-URL collaborator: queries the Drupal database through a
//! shell-invoked drush command so every published page gets audited, not
//! just those reachable by following links.
//!
//! Seeding failure is never fatal; each query degrades to a warning and
//! an empty contribution.

use tokio::process::Command;
use tracing::warn;

const ALIAS_SQL: &str =
    "SELECT alias FROM path_alias WHERE langcode != 'und' AND status = 1";
const NODE_SQL: &str = "SELECT nid FROM node_field_data WHERE status = 1";

/// Absolute URLs for all published path aliases and bare node paths.
pub async fn seed_urls_from_drush(drush_cmd: &str, base_url: &str) -> Vec<String> {
    let base = base_url.trim_end_matches('/');
    let mut urls = Vec::new();

    match run_query(drush_cmd, ALIAS_SQL).await {
        Ok(output) => urls.extend(parse_alias_lines(&output, base)),
        Err(e) => warn!("could not query path_alias table via drush: {e}"),
    }

    match run_query(drush_cmd, NODE_SQL).await {
        Ok(output) => urls.extend(parse_nid_lines(&output, base)),
        Err(e) => warn!("could not query node table via drush: {e}"),
    }

    urls
}

async fn run_query(drush_cmd: &str, sql: &str) -> std::io::Result<String> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(format!("{drush_cmd} sql:query \"{sql}\""))
        .output()
        .await?;

    if !output.status.success() {
        return Err(std::io::Error::other(format!(
            "drush exited with {}",
            output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Alias rows become `<base><alias>`; a leading header line is skipped.
pub fn parse_alias_lines(output: &str, base: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("alias"))
        .map(|line| {
            if line.starts_with('/') {
                format!("{base}{line}")
            } else {
                format!("{base}/{line}")
            }
        })
        .collect()
}

/// Node id rows become `<base>/node/<nid>`; non-numeric lines (headers,
/// warnings) are ignored.
pub fn parse_nid_lines(output: &str, base: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.chars().all(|c| c.is_ascii_digit()))
        .map(|line| format!("{base}/node/{line}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_lines_skip_header_and_blanks() {
        let output = "alias\n/about\n\n/contact\nnews/launch\n";
        let urls = parse_alias_lines(output, "https://example.test");
        assert_eq!(
            urls,
            vec![
                "https://example.test/about",
                "https://example.test/contact",
                "https://example.test/news/launch",
            ]
        );
    }

    #[test]
    fn nid_lines_keep_numeric_rows_only() {
        let output = "nid\n12\n345\nnot-a-node\n";
        let urls = parse_nid_lines(output, "https://example.test");
        assert_eq!(
            urls,
            vec![
                "https://example.test/node/12",
                "https://example.test/node/345",
            ]
        );
    }

    #[test]
    fn empty_output_seeds_nothing() {
        assert!(parse_alias_lines("", "https://example.test").is_empty());
        assert!(parse_nid_lines("", "https://example.test").is_empty());
    }

    #[tokio::test]
    async fn unreachable_collaborator_degrades_to_empty() {
        let urls =
            seed_urls_from_drush("/definitely/not/a/real/drush", "https://example.test").await;
        assert!(urls.is_empty());
    }
}
