use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;
use tracing::debug;

use super::compose::scalar_text;
use super::fence_for;
use crate::contract::SourceFile;

static DOCUMENT_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^---[ \t]*(?:#.*)?$").expect("valid regex literal"));

/// Summarise a multi-document manifest. A malformed document becomes an
/// inline note and the remaining documents are still rendered, so this never
/// fails as a whole.
pub fn parse(file: &SourceFile, content: &str) -> String {
    let mut md = format!("# Kubernetes File Summary\n\n**File:** `{}`\n\n", file.path);
    let mut rendered = 0;

    for doc in DOCUMENT_SEPARATOR
        .split(content)
        .map(str::trim)
        .filter(|d| !d.is_empty())
    {
        let obj: Value = match serde_yaml::from_str(doc) {
            Ok(obj) => obj,
            Err(e) => {
                debug!(error = %e, path = %file.path, "[PIPELINE] Skipping malformed manifest document");
                md.push_str(&format!("> Error parsing a section of the YAML: {e}\n\n"));
                continue;
            }
        };
        if !obj.is_mapping() {
            continue;
        }
        rendered += 1;

        let kind = obj.get("kind").map(scalar_text).unwrap_or_else(|| "Unknown".into());
        let metadata = obj.get("metadata");
        let name = metadata
            .and_then(|m| m.get("name"))
            .map(scalar_text)
            .unwrap_or_else(|| "Unnamed".into());
        let namespace = metadata
            .and_then(|m| m.get("namespace"))
            .map(scalar_text)
            .unwrap_or_else(|| "default".into());

        md.push_str(&format!("## {kind}: `{name}`\n"));
        md.push_str(&format!("- **Namespace:** `{namespace}`\n"));

        let spec = obj.get("spec");
        match kind.as_str() {
            "Deployment" | "StatefulSet" | "DaemonSet" => {
                let replicas = spec
                    .and_then(|s| s.get("replicas"))
                    .map(scalar_text)
                    .unwrap_or_else(|| "1".into());
                let containers: Vec<String> = spec
                    .and_then(|s| s.get("template"))
                    .and_then(|t| t.get("spec"))
                    .and_then(|s| s.get("containers"))
                    .and_then(Value::as_sequence)
                    .map(|cs| {
                        cs.iter()
                            .map(|c| {
                                format!(
                                    "`{}` (image: `{}`)",
                                    c.get("name").map(scalar_text).unwrap_or_default(),
                                    c.get("image").map(scalar_text).unwrap_or_default()
                                )
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                md.push_str(&format!("- **Replicas:** `{replicas}`\n"));
                md.push_str(&format!("- **Containers:** {}\n", containers.join(", ")));
            }
            "Service" => {
                let service_type = spec
                    .and_then(|s| s.get("type"))
                    .map(scalar_text)
                    .unwrap_or_else(|| "ClusterIP".into());
                let ports = spec
                    .and_then(|s| s.get("ports"))
                    .and_then(Value::as_sequence)
                    .map(|ps| {
                        ps.iter()
                            .map(|p| {
                                let port = p.get("port").map(scalar_text).unwrap_or_default();
                                let target =
                                    p.get("targetPort").map(scalar_text).unwrap_or_else(|| port.clone());
                                format!("`{port}:{target}`")
                            })
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| "N/A".into());
                md.push_str(&format!("- **Type:** `{service_type}`\n"));
                md.push_str(&format!("- **Ports:** {ports}\n"));
            }
            "Ingress" => {
                let hosts = spec
                    .and_then(|s| s.get("rules"))
                    .and_then(Value::as_sequence)
                    .map(|rules| {
                        rules
                            .iter()
                            .filter_map(|r| r.get("host").map(scalar_text))
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .filter(|h| !h.is_empty())
                    .unwrap_or_else(|| "N/A".into());
                md.push_str(&format!("- **Hosts:** {hosts}\n"));
            }
            _ => {}
        }

        let fence = fence_for(doc);
        md.push_str(&format!("\n{fence}yaml\n{doc}\n{fence}\n\n"));
    }

    if rendered == 0 {
        md.push_str("> No Kubernetes objects found.\n");
    }
    md
}
