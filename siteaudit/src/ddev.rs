use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Levels of parent directories searched for a `.ddev/config.yaml`.
const MAX_ASCENT: usize = 6;

#[derive(Debug, Deserialize)]
struct DdevConfig {
    name: String,
}

/// Derive the local site URL from a DDEV project checkout.
///
/// Walks upward from `start` looking for `.ddev/config.yaml` and maps the
/// project name to `https://<name>.ddev.site`.
pub fn detect_ddev_url(start: &Path) -> Option<String> {
    let mut dir = start;
    for _ in 0..MAX_ASCENT {
        let config_path = dir.join(".ddev").join("config.yaml");
        if config_path.is_file() {
            // An unreadable or nameless config does not end the search; a
            // usable one may still exist further up.
            match std::fs::read_to_string(&config_path)
                .ok()
                .and_then(|raw| serde_yaml::from_str::<DdevConfig>(&raw).ok())
            {
                Some(config) => return Some(format!("https://{}.ddev.site", config.name)),
                None => debug!("unusable ddev config at {}", config_path.display()),
            }
        }
        dir = dir.parent()?;
    }
    None
}
