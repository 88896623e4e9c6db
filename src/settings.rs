use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const BASE_URL_ENV: &str = "OCR_GALLERY_BASE_URL";

#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub concurrency: usize,
    pub top_words: usize,
    pub color: bool,
    pub server_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: 30,
            concurrency: 4,
            top_words: 20,
            color: true,
            server_addr: "127.0.0.1:8787".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    backend: Option<BackendSettings>,
    display: Option<DisplaySettings>,
    server: Option<ServerSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct BackendSettings {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct DisplaySettings {
    top_words: Option<usize>,
    color: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
}

/// Loads `settings.toml` layers from the working directory, the home
/// settings directory and `extra_path`, later layers winning. The
/// `OCR_GALLERY_BASE_URL` environment variable overrides the backend URL.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    let mut settings = load_from_paths(&ordered_paths)?;
    if let Ok(url) = std::env::var(BASE_URL_ENV) {
        settings.set_base_url(&url);
    }
    Ok(settings)
}

pub(crate) fn load_from_paths(paths: &[PathBuf]) -> Result<Settings> {
    let mut settings = Settings::default();
    for path in paths {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }
    Ok(settings)
}

impl Settings {
    pub fn set_base_url(&mut self, url: &str) {
        let url = url.trim().trim_end_matches('/');
        if !url.is_empty() {
            self.base_url = url.to_string();
        }
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(backend) = incoming.backend {
            if let Some(url) = backend.base_url {
                self.set_base_url(&url);
            }
            if let Some(timeout) = backend.timeout_secs {
                if timeout > 0 {
                    self.timeout_secs = timeout;
                }
            }
            if let Some(concurrency) = backend.concurrency {
                if concurrency > 0 {
                    self.concurrency = concurrency;
                }
            }
        }
        if let Some(display) = incoming.display {
            if let Some(limit) = display.top_words {
                if limit > 0 {
                    self.top_words = limit;
                }
            }
            if let Some(color) = display.color {
                self.color = color;
            }
        }
        if let Some(server) = incoming.server {
            if let Some(addr) = server.addr {
                if !addr.trim().is_empty() {
                    self.server_addr = addr.trim().to_string();
                }
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".ocr-gallery-rust"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn embedded_defaults_match_struct_defaults() {
        let parsed: SettingsFile = toml::from_str(DEFAULT_SETTINGS_TOML).expect("parse default");
        let mut settings = Settings::default();
        settings.merge(parsed);
        let defaults = Settings::default();
        assert_eq!(settings.base_url, defaults.base_url);
        assert_eq!(settings.top_words, defaults.top_words);
        assert_eq!(settings.server_addr, defaults.server_addr);
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        let dir = tempdir().expect("tempdir");
        let first = dir.path().join("settings.toml");
        let second = dir.path().join("settings.local.toml");
        fs::write(
            &first,
            "[backend]\nbase_url = \"http://first:1/\"\nconcurrency = 2\n[display]\ntop_words = 5\n",
        )
        .expect("write first");
        fs::write(&second, "[backend]\nbase_url = \"http://second:2//\"\n[display]\ncolor = false\n")
            .expect("write second");

        let settings = load_from_paths(&[first, second, dir.path().join("missing.toml")])
            .expect("load settings");
        assert_eq!(settings.base_url, "http://second:2");
        assert_eq!(settings.concurrency, 2);
        assert_eq!(settings.top_words, 5);
        assert!(!settings.color);
    }

    #[test]
    fn invalid_values_are_ignored() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.toml");
        fs::write(
            &path,
            "[backend]\nbase_url = \"  \"\nconcurrency = 0\ntimeout_secs = 0\n[server]\naddr = \"\"\n",
        )
        .expect("write settings");
        let settings = load_from_paths(&[path]).expect("load settings");
        let defaults = Settings::default();
        assert_eq!(settings.base_url, defaults.base_url);
        assert_eq!(settings.concurrency, defaults.concurrency);
        assert_eq!(settings.timeout_secs, defaults.timeout_secs);
        assert_eq!(settings.server_addr, defaults.server_addr);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[backend\nbase_url = 1").expect("write settings");
        let err = load_from_paths(&[path]).expect_err("should fail");
        assert!(err.to_string().contains("failed to parse settings"));
    }
}
