use std::path::PathBuf;

use kitchen::dictation::CommandDictation;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    pub preferences: PreferencesConfig,
    /// Speech-to-text for the recipe editor. Without it, dictation does nothing.
    #[serde(default)]
    pub dictation: Option<DictationConfig>,
}

impl Config {
    /// Load the configuration from a YAML file.
    pub fn load(yml_path: &str) -> anyhow::Result<Self> {
        let yml = std::fs::read_to_string(yml_path)?;
        let config = serde_yaml::from_str(&yml)?;
        Ok(config)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    pub tls: Option<TLSConfig>,
    /// Where the rolling access log goes. Defaults to the working directory.
    #[serde(default)]
    pub log_dir: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TLSConfig {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AuthConfig {
    pub session_storage_path: String,
    #[serde(default = "default_password_iterations")]
    pub password_iterations: u32,
}

fn default_password_iterations() -> u32 {
    100_000
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ImagesConfig {
    pub unsplash_access_key: Option<String>,
    pub pinterest_access_token: Option<String>,
}

impl ImagesConfig {
    /// The Unsplash key, from the config file or else `UNSPLASH_ACCESS_KEY`.
    pub fn unsplash_key(&self) -> Option<String> {
        credential(&self.unsplash_access_key, "UNSPLASH_ACCESS_KEY")
    }

    /// The Pinterest token, from the config file or else `PINTEREST_ACCESS_TOKEN`.
    pub fn pinterest_token(&self) -> Option<String> {
        credential(&self.pinterest_access_token, "PINTEREST_ACCESS_TOKEN")
    }
}

fn credential(configured: &Option<String>, env_var: &str) -> Option<String> {
    configured
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .filter(|v| !v.trim().is_empty())
}

#[derive(Clone, Debug, Deserialize)]
pub struct PreferencesConfig {
    pub path: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DictationConfig {
    #[serde(default = "default_recorder")]
    pub recorder: String,
    #[serde(default = "default_whisper")]
    pub whisper: String,
    pub model: PathBuf,
}

fn default_recorder() -> String {
    "rec".into()
}

fn default_whisper() -> String {
    "whisper".into()
}

impl DictationConfig {
    pub fn command(&self) -> CommandDictation {
        CommandDictation {
            recorder: self.recorder.clone(),
            whisper: self.whisper.clone(),
            model: self.model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_file() {
        let config: Config = serde_yaml::from_str(
            "
server:
  address: 127.0.0.1:3000
database:
  path: data/kitchen.db
auth:
  session_storage_path: data/sessions.json
images:
  unsplash_access_key: abc
preferences:
  path: data/preferences.json
",
        )
        .unwrap();
        assert!(config.server.tls.is_none());
        assert_eq!(config.auth.password_iterations, 100_000);
        assert_eq!(config.images.unsplash_key().as_deref(), Some("abc"));
        assert!(config.dictation.is_none());
    }

    #[test]
    fn dictation_tools_default_to_rec_and_whisper() {
        let dictation: DictationConfig =
            serde_yaml::from_str("model: models/ggml-small.bin").unwrap();
        let command = dictation.command();
        assert_eq!(command.recorder, "rec");
        assert_eq!(command.whisper, "whisper");
        assert_eq!(command.model, PathBuf::from("models/ggml-small.bin"));
    }
}
