use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";
pub const DEFAULT_ARTIFACTS_DIR: &str = "./build/contracts";
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct Config {
    pub node: Option<NodeConfig>,
    pub signer: Option<SignerConfig>,
    pub artifacts: Option<ArtifactsConfig>,
    #[serde(skip)]
    pub path: PathBuf,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct NodeConfig {
    pub url: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct SignerConfig {
    pub private_key_env: Option<String>,
    /// Degrade to encode-only mode instead of failing when no key is found.
    pub offline_fallback: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ArtifactsConfig {
    pub dir: Option<PathBuf>,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_path(),
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self {
                path,
                ..Self::default()
            });
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.path = path;
        Ok(config)
    }

    pub fn node_url(&self, flag: Option<&str>) -> Option<String> {
        flag.map(str::to_string)
            .or_else(|| self.node.as_ref()?.url.clone())
    }

    pub fn timeout(&self, flag_ms: Option<u64>) -> Duration {
        let ms = flag_ms
            .or_else(|| self.node.as_ref()?.timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        Duration::from_millis(ms)
    }

    pub fn signer_env(&self) -> String {
        self.signer
            .as_ref()
            .and_then(|cfg| cfg.private_key_env.clone())
            .unwrap_or_else(|| DEFAULT_PRIVATE_KEY_ENV.to_string())
    }

    pub fn offline_fallback(&self) -> bool {
        self.signer
            .as_ref()
            .and_then(|cfg| cfg.offline_fallback)
            .unwrap_or(false)
    }

    pub fn artifacts_dir(&self, flag: Option<&Path>) -> PathBuf {
        if let Some(dir) = flag {
            return dir.to_path_buf();
        }
        if let Some(artifacts) = &self.artifacts {
            if let Some(dir) = &artifacts.dir {
                return dir.clone();
            }
        }
        PathBuf::from(DEFAULT_ARTIFACTS_DIR)
    }
}

fn default_config_path() -> PathBuf {
    if let Some(dir) = dirs::config_dir() {
        return dir.join("openvasp").join("config.toml");
    }
    PathBuf::from("./config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.path, path);
        assert_eq!(config.node_url(None), None);
        assert_eq!(config.timeout(None), Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert_eq!(config.signer_env(), DEFAULT_PRIVATE_KEY_ENV);
        assert!(!config.offline_fallback());
        assert_eq!(config.artifacts_dir(None), PathBuf::from(DEFAULT_ARTIFACTS_DIR));
    }

    #[test]
    fn file_values_apply_and_flags_override_them() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[node]
url = "http://localhost:8545"
timeout_ms = 5000

[signer]
private_key_env = "VASP_KEY"
offline_fallback = true

[artifacts]
dir = "/opt/openvasp/contracts"
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.node_url(None).as_deref(), Some("http://localhost:8545"));
        assert_eq!(
            config.node_url(Some("http://node:8545")).as_deref(),
            Some("http://node:8545")
        );
        assert_eq!(config.timeout(None), Duration::from_secs(5));
        assert_eq!(config.timeout(Some(10)), Duration::from_millis(10));
        assert_eq!(config.signer_env(), "VASP_KEY");
        assert!(config.offline_fallback());
        assert_eq!(
            config.artifacts_dir(None),
            PathBuf::from("/opt/openvasp/contracts")
        );
        assert_eq!(
            config.artifacts_dir(Some(Path::new("./out"))),
            PathBuf::from("./out")
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[node\nurl = ").unwrap();
        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse config"));
    }
}
