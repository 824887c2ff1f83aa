//! Processing pipeline: one source file in, one markdown document out.
//!
//! [`ProcessingCoordinator::process`] runs the stages for a single file in a
//! fixed order:
//!   - admission control (a path already in flight is skipped, not queued)
//!   - classification into a [`Dialect`]
//!   - parsing (a parser error becomes the document body)
//!   - optional enrichment (full mode only; failures keep the parsed text)
//!   - routing to a destination path derived from name and configuration
//!   - create-or-update through the [`OutputReconciler`]
//!
//! # Error Handling
//! `process` is total. Storage failures abort only the current file and come
//! back as [`ProcessOutcome::Failed`]; nothing here returns `Err`.
//!
//! # Callable From
//! - the watcher (lite or full mode, per configuration)
//! - the `scan`, `process` and `import` commands (full mode)

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info, warn};

use crate::config::{CompanionConfig, OutputFolders};
use crate::contract::{Entry, Notifier, SourceFile, Storage, Transport};
use crate::enrich::{EnrichError, EnrichmentGateway};
use crate::parser::{self, Dialect};
use crate::reconcile::{OutputReconciler, WriteAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    /// Parse, enrich when configured, route with file-name rules.
    Full,
    /// Parse and route by dialect only. No network.
    Lite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Another invocation already holds this path.
    Skipped,
    Written {
        output_path: String,
        action: WriteAction,
    },
    Failed {
        reason: String,
    },
}

/// Totals for one batch scan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub written: usize,
    pub skipped: usize,
    /// `(source path, reason)` for every file that could not be written.
    pub failed: Vec<(String, String)>,
}

impl ScanReport {
    pub fn total(&self) -> usize {
        self.written + self.skipped + self.failed.len()
    }

    fn record(&mut self, path: &str, outcome: ProcessOutcome) {
        match outcome {
            ProcessOutcome::Written { .. } => self.written += 1,
            ProcessOutcome::Skipped => self.skipped += 1,
            ProcessOutcome::Failed { reason } => self.failed.push((path.to_string(), reason)),
        }
    }
}

pub struct ProcessingCoordinator<S, N, T> {
    storage: Arc<S>,
    notifier: Arc<N>,
    gateway: EnrichmentGateway<T>,
    reconciler: OutputReconciler<S>,
    config: CompanionConfig,
    in_flight: Mutex<HashSet<String>>,
}

/// Holds a path in the in-flight set; dropping it releases the path on every
/// exit path of `process`.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    path: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.path);
    }
}

impl<S, N, T> ProcessingCoordinator<S, N, T>
where
    S: Storage,
    N: Notifier,
    T: Transport,
{
    pub fn new(storage: Arc<S>, notifier: Arc<N>, transport: T, config: CompanionConfig) -> Self {
        Self {
            gateway: EnrichmentGateway::new(transport, &config.enrichment),
            reconciler: OutputReconciler::new(storage.clone()),
            storage,
            notifier,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &CompanionConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn notifier(&self) -> &Arc<N> {
        &self.notifier
    }

    pub fn gateway(&self) -> &EnrichmentGateway<T> {
        &self.gateway
    }

    pub fn reconciler(&self) -> &OutputReconciler<S> {
        &self.reconciler
    }

    fn admit(&self, path: &str) -> Option<InFlightGuard<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(path.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            set: &self.in_flight,
            path: path.to_string(),
        })
    }

    /// Run the pipeline for `file`. Never fails; see [`ProcessOutcome`].
    pub async fn process(&self, file: &SourceFile, mode: PipelineMode) -> ProcessOutcome {
        let Some(_guard) = self.admit(&file.path) else {
            debug!(path = %file.path, "[PIPELINE] Already in flight, skipping");
            return ProcessOutcome::Skipped;
        };
        info!(path = %file.path, ?mode, "[PIPELINE] Processing file");
        self.run(file, mode).await
    }

    async fn run(&self, file: &SourceFile, mode: PipelineMode) -> ProcessOutcome {
        let dialect = Dialect::classify(file, &self.config.dialects);

        let content = match self.storage.read(&file.path).await {
            Ok(content) => content,
            Err(e) => {
                error!(path = %file.path, error = %e, "[PIPELINE][ERROR] Could not read source");
                return ProcessOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let mut markdown = match parser::parse(dialect, file, &content) {
            Ok(md) => md,
            Err(e) => {
                warn!(path = %file.path, ?dialect, error = %e, "[PIPELINE] Parser rejected content");
                parser::error_document(file, dialect, &e)
            }
        };

        if mode == PipelineMode::Full && self.config.enrichment.enabled {
            markdown = self.enrich(file, markdown).await;
        }

        let output_path = route(file, dialect, mode, &self.config.output);
        match self.reconciler.write(&output_path, &markdown).await {
            Ok(action) => {
                info!(source = %file.path, output = %output_path, ?action, "[PIPELINE] Done");
                ProcessOutcome::Written { output_path, action }
            }
            Err(e) => {
                error!(source = %file.path, output = %output_path, error = %e, "[PIPELINE][ERROR] Write failed");
                ProcessOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn enrich(&self, file: &SourceFile, markdown: String) -> String {
        match self
            .gateway
            .try_enhance(&markdown, self.config.enrichment.style)
            .await
        {
            Ok(enhanced) => enhanced,
            Err(EnrichError::NoProvider) => markdown,
            Err(EnrichError::MissingCredential(provider)) => {
                debug!(path = %file.path, %provider, "[ENRICH] No API key, skipping enrichment");
                markdown
            }
            Err(e) => {
                warn!(path = %file.path, error = %e, "[ENRICH] Enhancement failed, keeping parsed summary");
                self.notifier
                    .notify(&format!("AI enhancement failed for {}: {e}", file.name));
                markdown
            }
        }
    }

    /// Every file under the scan folder, sub-folders included, in listing
    /// order. A sub-folder that cannot be listed is logged and skipped.
    pub async fn collect_files(&self) -> Vec<SourceFile> {
        let mut files = Vec::new();
        let mut pending = VecDeque::from([self.config.scan_path.clone()]);
        while let Some(folder) = pending.pop_front() {
            match self.storage.list(&folder).await {
                Ok(entries) => {
                    for entry in entries {
                        match entry {
                            Entry::File(file) => files.push(file),
                            Entry::Folder(path) => pending.push_back(path),
                        }
                    }
                }
                Err(e) => warn!(folder = %folder, error = %e, "[PIPELINE] Could not list folder"),
            }
        }
        files
    }

    /// Manual scan: full pipeline over every file under the scan folder, one
    /// at a time, then a single completion notice.
    pub async fn scan_all(&self) -> ScanReport {
        info!(scan_path = %self.config.scan_path, "[PIPELINE] Starting manual scan");
        let mut report = ScanReport::default();
        for file in self.collect_files().await {
            let outcome = self.process(&file, PipelineMode::Full).await;
            report.record(&file.path, outcome);
        }
        info!(
            written = report.written,
            skipped = report.skipped,
            failed = report.failed.len(),
            "[PIPELINE] Manual scan completed"
        );
        self.notifier.notify(&format!(
            "Manual scan completed: {} written, {} skipped, {} failed.",
            report.written,
            report.skipped,
            report.failed.len()
        ));
        report
    }
}

fn override_folder(dialect: Dialect, output: &OutputFolders) -> Option<&str> {
    let folder = match dialect {
        Dialect::Compose => &output.compose,
        Dialect::Terraform => &output.terraform,
        Dialect::Kubernetes => &output.kubernetes,
        Dialect::Ansible => &output.ansible,
        Dialect::Generic => return None,
    };
    folder
        .as_deref()
        .map(|f| f.trim().trim_end_matches('/'))
        .filter(|f| !f.is_empty())
}

fn filename_rule(file: &SourceFile) -> Option<&'static str> {
    let lower_name = file.name.to_ascii_lowercase();
    if lower_name.contains("gitlab-ci") || lower_name.contains("github") {
        return Some("Parsed/CI-CD");
    }
    match file.extension.as_str() {
        "json" | "ini" => Some("Parsed/Configs"),
        "env" => Some("Parsed/Environment"),
        "sh" => Some("Parsed/Docker"),
        _ if lower_name.contains("dockerfile") => Some("Parsed/Docker"),
        _ => None,
    }
}

fn default_folder(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Compose => "Parsed/Docker",
        Dialect::Terraform => "Parsed/Terraform",
        Dialect::Kubernetes => "Parsed/Kubernetes",
        Dialect::Ansible => "Parsed/Ansible",
        Dialect::Generic => "Parsed/General",
    }
}

/// Destination path of the document for `file`. Depends on name, dialect,
/// mode and configuration only, never on content.
pub fn route(file: &SourceFile, dialect: Dialect, mode: PipelineMode, output: &OutputFolders) -> String {
    let folder = override_folder(dialect, output)
        .or_else(|| match mode {
            PipelineMode::Full => filename_rule(file),
            PipelineMode::Lite => None,
        })
        .unwrap_or_else(|| default_folder(dialect));
    format!("{}/{}.md", folder, file.basename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::contract::{HttpReply, MockNotifier, MockStorage, MockTransport, StorageError};

    fn file(path: &str) -> SourceFile {
        SourceFile::from_path(path, 1)
    }

    #[test]
    fn routes_by_dialect_default() {
        let out = OutputFolders::default();
        assert_eq!(
            route(&file("in/app.yml"), Dialect::Compose, PipelineMode::Full, &out),
            "Parsed/Docker/app.md"
        );
        assert_eq!(
            route(&file("in/main.tf"), Dialect::Terraform, PipelineMode::Lite, &out),
            "Parsed/Terraform/main.md"
        );
        assert_eq!(
            route(&file("in/notes.txt"), Dialect::Generic, PipelineMode::Full, &out),
            "Parsed/General/notes.md"
        );
    }

    #[test]
    fn override_wins_and_is_joined_with_a_slash() {
        let out = OutputFolders {
            terraform: Some("Infra/TF/".into()),
            compose: Some("   ".into()),
            ..OutputFolders::default()
        };
        assert_eq!(
            route(&file("in/main.tf"), Dialect::Terraform, PipelineMode::Full, &out),
            "Infra/TF/main.md"
        );
        // Blank override falls through to the filename rule and the default.
        assert_eq!(
            route(&file("in/.gitlab-ci.yml"), Dialect::Compose, PipelineMode::Full, &out),
            "Parsed/CI-CD/.gitlab-ci.md"
        );
        assert_eq!(
            route(&file("in/app.yml"), Dialect::Compose, PipelineMode::Full, &out),
            "Parsed/Docker/app.md"
        );
    }

    #[test]
    fn filename_rules_apply_in_full_mode_only() {
        let out = OutputFolders::default();
        let cases = [
            ("in/settings.json", "Parsed/Configs/settings.md"),
            ("in/php.ini", "Parsed/Configs/php.md"),
            ("in/.env", "Parsed/Environment/env.md"),
            ("in/deploy.sh", "Parsed/Docker/deploy.md"),
            ("in/Dockerfile", "Parsed/Docker/Dockerfile.md"),
            ("in/github-actions.txt", "Parsed/CI-CD/github-actions.md"),
        ];
        for (path, expected) in cases {
            let f = file(path);
            assert_eq!(route(&f, Dialect::Generic, PipelineMode::Full, &out), expected);
            assert_eq!(
                route(&f, Dialect::Generic, PipelineMode::Lite, &out),
                format!("Parsed/General/{}.md", f.basename)
            );
        }
    }

    #[test]
    fn admission_is_exclusive_and_released_on_drop() {
        let coordinator = ProcessingCoordinator::new(
            Arc::new(MockStorage::new()),
            Arc::new(MockNotifier::new()),
            MockTransport::new(),
            CompanionConfig::default(),
        );
        let guard = coordinator.admit("in/app.yml");
        assert!(guard.is_some());
        assert!(coordinator.admit("in/app.yml").is_none());
        assert!(coordinator.admit("in/other.yml").is_some());
        drop(guard);
        assert!(coordinator.admit("in/app.yml").is_some());
    }

    #[tokio::test]
    async fn in_flight_path_is_skipped_without_touching_storage() {
        let mut storage = MockStorage::new();
        storage.expect_read().never();
        let coordinator = ProcessingCoordinator::new(
            Arc::new(storage),
            Arc::new(MockNotifier::new()),
            MockTransport::new(),
            CompanionConfig::default(),
        );
        let _held = coordinator.admit("in/app.yml");
        let outcome = coordinator.process(&file("in/app.yml"), PipelineMode::Full).await;
        assert_eq!(outcome, ProcessOutcome::Skipped);
    }

    #[tokio::test]
    async fn parse_error_is_written_as_document() {
        let mut storage = MockStorage::new();
        storage
            .expect_read()
            .returning(|_| Ok("services: [unclosed".to_string()));
        storage.expect_exists().returning(|_| Ok(false));
        storage.expect_create_folder().returning(|_| Ok(()));
        storage
            .expect_create()
            .withf(|p, c| p == "Parsed/Docker/app.md" && c.contains("Error while parsing Docker Compose"))
            .times(1)
            .returning(|_, _| Ok(()));
        let coordinator = ProcessingCoordinator::new(
            Arc::new(storage),
            Arc::new(MockNotifier::new()),
            MockTransport::new(),
            CompanionConfig::default(),
        );
        let outcome = coordinator.process(&file("in/app.yml"), PipelineMode::Lite).await;
        assert!(matches!(outcome, ProcessOutcome::Written { action: WriteAction::Created, .. }));
    }

    #[tokio::test]
    async fn read_failure_is_reported_and_releases_the_path() {
        let mut storage = MockStorage::new();
        storage
            .expect_read()
            .times(2)
            .returning(|p| Err(StorageError::NotFound(p.to_string())));
        let coordinator = ProcessingCoordinator::new(
            Arc::new(storage),
            Arc::new(MockNotifier::new()),
            MockTransport::new(),
            CompanionConfig::default(),
        );
        for _ in 0..2 {
            let outcome = coordinator.process(&file("in/gone.tf"), PipelineMode::Full).await;
            assert!(matches!(outcome, ProcessOutcome::Failed { .. }));
        }
    }

    fn enrichment_config() -> CompanionConfig {
        let mut config = CompanionConfig::default();
        config.enrichment.enabled = true;
        config.enrichment.provider = Some(ProviderKind::OpenAi);
        config.enrichment.credentials.set(ProviderKind::OpenAi, "sk-test".into());
        config
    }

    fn writing_storage(expected: &'static str) -> MockStorage {
        let mut storage = MockStorage::new();
        storage
            .expect_read()
            .returning(|_| Ok("services:\n  web:\n    image: nginx\n".to_string()));
        storage.expect_exists().returning(|_| Ok(true));
        storage
            .expect_modify()
            .withf(move |_, c| c.contains(expected))
            .times(1)
            .returning(|_, _| Ok(()));
        storage
    }

    #[tokio::test]
    async fn enrichment_failure_keeps_parsed_text_and_notifies() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(1).returning(|_| {
            Ok(HttpReply {
                status: 500,
                body: "oops".into(),
            })
        });
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|m| m.starts_with("AI enhancement failed for app.yml"))
            .times(1)
            .return_const(());
        let coordinator = ProcessingCoordinator::new(
            Arc::new(writing_storage("## Service: `web`")),
            Arc::new(notifier),
            transport,
            enrichment_config(),
        );
        let outcome = coordinator.process(&file("in/app.yml"), PipelineMode::Full).await;
        assert!(matches!(outcome, ProcessOutcome::Written { action: WriteAction::Updated, .. }));
    }

    #[tokio::test]
    async fn enrichment_success_replaces_the_body() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(1).returning(|_| {
            Ok(HttpReply {
                status: 200,
                body: r##"{"choices":[{"message":{"content":"# Polished web stack"}}]}"##.into(),
            })
        });
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().never();
        let coordinator = ProcessingCoordinator::new(
            Arc::new(writing_storage("# Polished web stack")),
            Arc::new(notifier),
            transport,
            enrichment_config(),
        );
        coordinator.process(&file("in/app.yml"), PipelineMode::Full).await;
    }

    #[tokio::test]
    async fn lite_mode_never_enriches() {
        let mut transport = MockTransport::new();
        transport.expect_send().never();
        let coordinator = ProcessingCoordinator::new(
            Arc::new(writing_storage("## Service: `web`")),
            Arc::new(MockNotifier::new()),
            transport,
            enrichment_config(),
        );
        coordinator.process(&file("in/app.yml"), PipelineMode::Lite).await;
    }
}
