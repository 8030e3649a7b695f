use super::types::RelayConfig;
use crate::error::{RelayError, RelayResult};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Load the relay configuration from a TOML file.
///
/// The path is tried as given, then relative to the parent directory, so the binary can be
/// started from either the workspace root or a member directory. Provider description files
/// are resolved relative to the configuration file, and `api_key_env` is looked up once here.
pub fn load_config(config_path: impl AsRef<Path>) -> RelayResult<RelayConfig> {
    let config_path = config_path.as_ref();
    let actual_path = resolve_path(config_path)?;

    let content = std::fs::read_to_string(&actual_path).map_err(|e| {
        RelayError::Config(format!(
            "Failed to read config file '{}': {}",
            actual_path.display(),
            e
        ))
    })?;

    let mut config = parse_config(&content)?;
    let base_dir = actual_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    resolve_descriptions(&mut config, &base_dir);
    resolve_api_key(&mut config);

    info!(
        path = %actual_path.display(),
        providers = config.providers.len(),
        "loaded relay configuration"
    );
    Ok(config)
}

/// Parse configuration text without touching the filesystem or environment.
pub fn parse_config(content: &str) -> RelayResult<RelayConfig> {
    toml::from_str(content)
        .map_err(|e| RelayError::Config(format!("Failed to parse relay config: {}", e)))
}

fn resolve_path(config_path: &Path) -> RelayResult<PathBuf> {
    if config_path.exists() {
        return Ok(config_path.to_path_buf());
    }
    let parent_path = Path::new("..").join(config_path);
    if parent_path.exists() {
        return Ok(parent_path);
    }
    Err(RelayError::Config(format!(
        "Config file not found: '{}' (also tried '{}')",
        config_path.display(),
        parent_path.display()
    )))
}

fn resolve_descriptions(config: &mut RelayConfig, base_dir: &Path) {
    for (name, provider) in config.providers.iter_mut() {
        if provider.description.is_some() {
            continue;
        }
        let Some(file) = provider.description_file.as_ref() else {
            continue;
        };
        let path = if file.is_absolute() {
            file.clone()
        } else {
            base_dir.join(file)
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => provider.description = Some(text),
            Err(e) => {
                warn!(
                    provider = %name,
                    path = %path.display(),
                    "failed to read provider description: {}",
                    e
                );
            }
        }
    }
}

fn resolve_api_key(config: &mut RelayConfig) {
    if config.llm.api_key.is_some() {
        return;
    }
    if let Some(var) = config.llm.api_key_env.as_deref() {
        match std::env::var(var) {
            Ok(key) if !key.is_empty() => config.llm.api_key = Some(key),
            _ => warn!(env = %var, "LLM api key environment variable is not set"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[llm]
model = "deepseek-chat"
base_url = "https://api.deepseek.com/v1"

[persistence]
base_url = "http://localhost:3000"

[engine]
tool_call_timeout_secs = 15

[providers.weather]
path = "servers/weather.py"
description_file = "weather.md"

[providers.github]
path = "servers/github.js"
description = "You provide the GitHub integration."
"#;

    #[test]
    fn parses_defaults_and_provider_order() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.persistence.message_limit, 100);
        assert_eq!(config.engine.tool_call_timeout_secs, 15);
        assert_eq!(config.engine.plan_timeout_secs, 180);
        assert_eq!(config.engine.admin_provider, "onlysaid_admin");
        let names: Vec<&String> = config.providers.keys().collect();
        assert_eq!(names, vec!["weather", "github"]);
    }

    #[test]
    fn resolves_description_files_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut md = std::fs::File::create(dir.path().join("weather.md")).unwrap();
        writeln!(md, "You provide the weather forecasts.").unwrap();
        let config_path = dir.path().join("relay.toml");
        std::fs::write(&config_path, SAMPLE).unwrap();

        let config = load_config(&config_path).unwrap();
        assert_eq!(
            config.providers["weather"].description.as_deref(),
            Some("You provide the weather forecasts.\n")
        );
        assert_eq!(
            config.providers["github"].description.as_deref(),
            Some("You provide the GitHub integration.")
        );
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_config("definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }
}
