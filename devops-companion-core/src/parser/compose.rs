use serde_yaml::Value;

use super::ParseError;
use crate::contract::SourceFile;

pub fn parse(file: &SourceFile, content: &str) -> Result<String, ParseError> {
    let doc: Value = serde_yaml::from_str(content)?;
    let mut md = format!("# Docker Compose Summary\n\n**File:** `{}`\n\n", file.path);

    let Some(services) = doc.get("services").and_then(Value::as_mapping) else {
        md.push_str("> No services found in this Docker Compose file.\n");
        return Ok(md);
    };

    for (name, service) in services {
        md.push_str(&format!("## Service: `{}`\n", scalar_text(name)));

        let image = service
            .get("image")
            .map(scalar_text)
            .unwrap_or_else(|| "Not specified".to_string());
        md.push_str(&format!("- **Image**: `{image}`\n"));

        if let Some(build) = service.get("build") {
            let context = build.get("context").unwrap_or(build);
            md.push_str(&format!("- **Build**: `{}`\n", scalar_text(context)));
        }
        if let Some(ports) = service.get("ports").and_then(Value::as_sequence) {
            md.push_str(&format!("- **Ports**: {}\n", code_list(ports.iter().map(port_text))));
        }
        if let Some(volumes) = service.get("volumes").and_then(Value::as_sequence) {
            md.push_str(&format!("- **Volumes**: {}\n", code_list(volumes.iter().map(volume_text))));
        }
        if let Some(depends) = service.get("depends_on") {
            let names: Vec<String> = match depends {
                Value::Sequence(seq) => seq.iter().map(scalar_text).collect(),
                Value::Mapping(map) => map.keys().map(scalar_text).collect(),
                other => vec![scalar_text(other)],
            };
            md.push_str(&format!("- **Depends on**: {}\n", code_list(names.into_iter())));
        }
        match service.get("environment") {
            Some(Value::Mapping(env)) => {
                md.push_str("- **Environment Variables**:\n");
                for (key, val) in env {
                    md.push_str(&format!("  - `{}`: {}\n", scalar_text(key), scalar_text(val)));
                }
            }
            Some(Value::Sequence(env)) => {
                md.push_str("- **Environment Variables**:\n");
                for entry in env {
                    let entry = scalar_text(entry);
                    match entry.split_once('=') {
                        Some((key, val)) => md.push_str(&format!("  - `{key}`: {val}\n")),
                        None => md.push_str(&format!("  - `{entry}`\n")),
                    }
                }
            }
            _ => {}
        }
        md.push('\n');
    }

    Ok(md)
}

pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().replace('\n', " "))
            .unwrap_or_default(),
    }
}

fn code_list(items: impl Iterator<Item = String>) -> String {
    items.map(|i| format!("`{i}`")).collect::<Vec<_>>().join(", ")
}

/// Short (`"8080:80"`) or long (`{published: 8080, target: 80}`) port syntax.
fn port_text(port: &Value) -> String {
    match port.get("target") {
        Some(target) => match port.get("published") {
            Some(published) => format!("{}:{}", scalar_text(published), scalar_text(target)),
            None => scalar_text(target),
        },
        None => scalar_text(port),
    }
}

fn volume_text(volume: &Value) -> String {
    match volume.get("target") {
        Some(target) => match volume.get("source") {
            Some(source) => format!("{}:{}", scalar_text(source), scalar_text(target)),
            None => scalar_text(target),
        },
        None => scalar_text(volume),
    }
}
