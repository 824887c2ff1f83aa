/// `load_config` module: reads the YAML config file and injects provider API
/// keys from the environment.
///
/// This is the only place where user-supplied YAML is parsed. Everything
/// below the vault root maps one-to-one onto
/// [`devops_companion_core::config::CompanionConfig`]; missing sections take
/// their defaults.
///
/// # Secrets
/// Keys may live in the file under `enrichment.credentials`, but the usual
/// setup keeps them out of it. A key missing (or blank) in the file is read
/// from the provider's environment variable, see [`CREDENTIAL_ENV_VARS`].
///
/// # Errors
/// All errors use `anyhow::Error` with the config path in the message and
/// surface at the CLI boundary.
use anyhow::{Context, Result};
use devops_companion_core::config::{CompanionConfig, ProviderKind};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Environment variable consulted for each provider's API key.
pub const CREDENTIAL_ENV_VARS: [(ProviderKind, &str); 4] = [
    (ProviderKind::OpenAi, "OPENAI_API_KEY"),
    (ProviderKind::Google, "GOOGLE_AI_KEY"),
    (ProviderKind::Claude, "ANTHROPIC_API_KEY"),
    (ProviderKind::Mistral, "MISTRAL_API_KEY"),
];

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    /// Directory every storage path is relative to.
    #[serde(default = "default_vault_root")]
    pub vault_root: PathBuf,
    #[serde(flatten)]
    pub companion: CompanionConfig,
}

fn default_vault_root() -> PathBuf {
    PathBuf::from(".")
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: CliConfig = serde_yaml::from_str(&config_content)
        .with_context(|| format!("Failed to parse config YAML {path_ref:?}"))?;

    inject_env_credentials(&mut config.companion);
    info!(vault_root = ?config.vault_root, "Parsed config YAML successfully");
    config.companion.trace_loaded();
    Ok(config)
}

/// Fill every credential the file left empty from its environment variable.
pub fn inject_env_credentials(config: &mut CompanionConfig) {
    let credentials = &mut config.enrichment.credentials;
    for (provider, var) in CREDENTIAL_ENV_VARS {
        if credentials.for_provider(provider).is_some() {
            continue;
        }
        match env::var(var) {
            Ok(key) if !key.trim().is_empty() => {
                debug!(%provider, env_var = var, "Using API key from environment");
                credentials.set(provider, key);
            }
            _ => {}
        }
    }
}
