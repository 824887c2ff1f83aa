//! Dialect classification and the parser set.
//!
//! Each parser is a pure function from file content to a markdown summary.
//! Nothing here touches storage: the pipeline reads the file and hands the
//! text in.

pub mod ansible;
pub mod compose;
pub mod kubernetes;
pub mod terraform;

use thiserror::Error;

use crate::config::DialectToggles;
use crate::contract::SourceFile;

/// A recognized source file category. Decides the parser and the default
/// output folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Compose,
    Terraform,
    Kubernetes,
    Ansible,
    /// Anything else, including files of a disabled dialect.
    Generic,
}

const ANSIBLE_MARKERS: &[&str] = &["playbook", "ansible"];
const KUBERNETES_MARKERS: &[&str] = &["k8s", "kube", "manifest", "deployment"];

impl Dialect {
    /// Classify by extension, refining YAML by file-name markers.
    ///
    /// Content is never inspected, so the result (and therefore the output
    /// path) only changes when the name or the toggles change.
    pub fn classify(file: &SourceFile, toggles: &DialectToggles) -> Dialect {
        let lower_name = file.name.to_ascii_lowercase();
        let dialect = match file.extension.as_str() {
            "tf" => Dialect::Terraform,
            "yml" | "yaml" => {
                if ANSIBLE_MARKERS.iter().any(|m| lower_name.contains(m)) {
                    Dialect::Ansible
                } else if KUBERNETES_MARKERS.iter().any(|m| lower_name.contains(m)) {
                    Dialect::Kubernetes
                } else {
                    Dialect::Compose
                }
            }
            _ => Dialect::Generic,
        };
        if dialect.is_enabled(toggles) {
            dialect
        } else {
            Dialect::Generic
        }
    }

    fn is_enabled(&self, toggles: &DialectToggles) -> bool {
        match self {
            Dialect::Compose => toggles.compose,
            Dialect::Terraform => toggles.terraform,
            Dialect::Kubernetes => toggles.kubernetes,
            Dialect::Ansible => toggles.ansible,
            Dialect::Generic => true,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Dialect::Compose => "Docker Compose",
            Dialect::Terraform => "Terraform",
            Dialect::Kubernetes => "Kubernetes",
            Dialect::Ansible => "Ansible",
            Dialect::Generic => "File",
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("{0}")]
    Structure(String),
}

/// Run the parser for `dialect` over `content`.
pub fn parse(dialect: Dialect, file: &SourceFile, content: &str) -> Result<String, ParseError> {
    match dialect {
        Dialect::Compose => compose::parse(file, content),
        Dialect::Terraform => terraform::parse(file, content),
        Dialect::Kubernetes => Ok(kubernetes::parse(file, content)),
        Dialect::Ansible => ansible::parse(file, content),
        Dialect::Generic => Ok(raw_document(file, content)),
    }
}

/// Fallback transform: the raw content in a fenced code block.
pub fn raw_document(file: &SourceFile, content: &str) -> String {
    let fence = fence_for(content);
    let mut md = format!("# {}\n\n", file.name);
    md.push_str(&fence);
    md.push('\n');
    md.push_str(content.trim_end_matches('\n'));
    md.push('\n');
    md.push_str(&fence);
    md.push('\n');
    md
}

/// Body written instead of a summary when the parser rejected the content.
pub fn error_document(file: &SourceFile, dialect: Dialect, error: &ParseError) -> String {
    format!(
        "# {} Summary\n\n**File:** `{}`\n\n> Error while parsing {}: {}\n",
        dialect.title(),
        file.path,
        dialect.title(),
        error
    )
}

/// A backtick fence longer than any backtick run inside `content`.
pub(crate) fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat(longest.max(2) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> SourceFile {
        SourceFile::from_path(path, 0)
    }

    #[test]
    fn classifies_by_extension_and_name() {
        let toggles = DialectToggles::default();
        assert_eq!(Dialect::classify(&file("x/app.yml"), &toggles), Dialect::Compose);
        assert_eq!(Dialect::classify(&file("x/app.yaml"), &toggles), Dialect::Compose);
        assert_eq!(Dialect::classify(&file("x/main.tf"), &toggles), Dialect::Terraform);
        assert_eq!(Dialect::classify(&file("x/site-playbook.yml"), &toggles), Dialect::Ansible);
        assert_eq!(Dialect::classify(&file("x/k8s-web.yaml"), &toggles), Dialect::Kubernetes);
        assert_eq!(Dialect::classify(&file("x/settings.json"), &toggles), Dialect::Generic);
        assert_eq!(Dialect::classify(&file("x/Dockerfile"), &toggles), Dialect::Generic);
    }

    #[test]
    fn disabled_dialect_falls_back_to_generic() {
        let toggles = DialectToggles {
            terraform: false,
            ..DialectToggles::default()
        };
        assert_eq!(Dialect::classify(&file("main.tf"), &toggles), Dialect::Generic);
        assert_eq!(Dialect::classify(&file("app.yml"), &toggles), Dialect::Compose);
    }

    #[test]
    fn raw_document_fences_content() {
        let md = raw_document(&file("in/run.sh"), "echo hi\n");
        assert_eq!(md, "# run.sh\n\n```\necho hi\n```\n");
    }

    #[test]
    fn raw_document_outgrows_inner_fences() {
        let md = raw_document(&file("README.txt"), "```\ncode\n```");
        assert!(md.contains("````\n```\ncode\n```\n````\n"));
    }

    #[test]
    fn error_document_names_the_failure() {
        let err = ParseError::Structure("unterminated block".into());
        let md = error_document(&file("in/main.tf"), Dialect::Terraform, &err);
        assert!(md.starts_with("# Terraform Summary"));
        assert!(md.contains("`in/main.tf`"));
        assert!(md.contains("unterminated block"));
    }
}
