use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Everything the pipeline and the watcher read from configuration.
///
/// Every section is optional in the source file; missing keys fall back to
/// [`Default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// Folder (storage path) whose DevOps files are watched and scanned.
    pub scan_path: String,
    /// Seconds between two watcher ticks.
    pub watch_interval_secs: u64,
    pub watcher: WatcherSection,
    pub dialects: DialectToggles,
    pub output: OutputFolders,
    pub enrichment: EnrichmentSection,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            scan_path: "DevOpsImports".to_string(),
            watch_interval_secs: 5,
            watcher: WatcherSection::default(),
            dialects: DialectToggles::default(),
            output: OutputFolders::default(),
            enrichment: EnrichmentSection::default(),
        }
    }
}

impl CompanionConfig {
    pub fn trace_loaded(&self) {
        info!(
            scan_path = %self.scan_path,
            watcher_enabled = self.watcher.enabled,
            watcher_uses_ai = self.watcher.use_ai,
            enrichment_enabled = self.enrichment.enabled,
            provider = ?self.enrichment.provider,
            style = %self.enrichment.style,
            "Loaded CompanionConfig"
        );
        debug!(?self, "CompanionConfig loaded (full debug)");
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherSection {
    pub enabled: bool,
    /// Run the full pipeline (with enrichment) for watcher-detected changes
    /// instead of the lite one.
    pub use_ai: bool,
}

/// Per-dialect parsing switches. A disabled dialect is ignored by the watcher
/// and rendered as raw content by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialectToggles {
    pub compose: bool,
    pub terraform: bool,
    pub kubernetes: bool,
    pub ansible: bool,
}

impl Default for DialectToggles {
    fn default() -> Self {
        Self {
            compose: true,
            terraform: true,
            kubernetes: true,
            ansible: true,
        }
    }
}

/// Optional output folder overrides. `None` or blank means the built-in
/// default folder for that dialect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFolders {
    pub compose: Option<String>,
    pub terraform: Option<String>,
    pub kubernetes: Option<String>,
    pub ansible: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentSection {
    pub enabled: bool,
    pub provider: Option<ProviderKind>,
    pub style: DocStyle,
    pub credentials: Credentials,
}

impl Default for EnrichmentSection {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: Some(ProviderKind::OpenAi),
            style: DocStyle::Technical,
            credentials: Credentials::default(),
        }
    }
}

/// The closed set of text-generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "google")]
    Google,
    #[serde(rename = "claude", alias = "anthropic")]
    Claude,
    #[serde(rename = "mistral")]
    Mistral,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Google => "google",
            ProviderKind::Claude => "claude",
            ProviderKind::Mistral => "mistral",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Tone requested from the provider when rewriting a summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStyle {
    #[default]
    Technical,
    Educational,
    Executive,
}

impl std::fmt::Display for DocStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DocStyle::Technical => "technical",
            DocStyle::Educational => "educational",
            DocStyle::Executive => "executive",
        })
    }
}

/// API keys, one per provider.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub openai: Option<String>,
    pub google: Option<String>,
    pub claude: Option<String>,
    pub mistral: Option<String>,
}

impl Credentials {
    /// The key for `provider`, treating blank strings as absent.
    pub fn for_provider(&self, provider: ProviderKind) -> Option<&str> {
        let key = match provider {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Google => &self.google,
            ProviderKind::Claude => &self.claude,
            ProviderKind::Mistral => &self.mistral,
        };
        key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn set(&mut self, provider: ProviderKind, key: String) {
        let slot = match provider {
            ProviderKind::OpenAi => &mut self.openai,
            ProviderKind::Google => &mut self.google,
            ProviderKind::Claude => &mut self.claude,
            ProviderKind::Mistral => &mut self.mistral,
        };
        *slot = Some(key);
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |k: &Option<String>| k.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Credentials")
            .field("openai", &redact(&self.openai))
            .field("google", &redact(&self.google))
            .field("claude", &redact(&self.claude))
            .field("mistral", &redact(&self.mistral))
            .finish()
    }
}
