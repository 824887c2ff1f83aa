use serde_yaml::Value;

use super::compose::scalar_text;
use super::ParseError;
use crate::contract::SourceFile;

/// Task keys that are directives rather than the module being invoked.
const TASK_DIRECTIVES: &[&str] = &[
    "name", "tags", "when", "become", "become_user", "vars", "register", "notify", "loop",
    "with_items", "ignore_errors", "changed_when", "failed_when", "delegate_to",
];

pub fn parse(file: &SourceFile, content: &str) -> Result<String, ParseError> {
    let doc: Value = serde_yaml::from_str(content)?;
    let mut md = format!("# Ansible Playbook Summary\n\n**File:** `{}`\n\n", file.path);

    let Some(plays) = doc.as_sequence() else {
        md.push_str("> No valid Ansible playbook found.\n");
        return Ok(md);
    };

    for play in plays {
        let name = play.get("name").map(scalar_text).unwrap_or_else(|| "Unnamed".into());
        let hosts = play
            .get("hosts")
            .map(scalar_text)
            .unwrap_or_else(|| "unspecified".into());
        md.push_str(&format!("## Play: `{name}`\n"));
        md.push_str(&format!("- **Hosts:** `{hosts}`\n"));

        if let Some(roles) = play.get("roles").and_then(Value::as_sequence) {
            let roles: Vec<String> = roles
                .iter()
                .map(|r| format!("`{}`", r.get("role").map(scalar_text).unwrap_or_else(|| scalar_text(r))))
                .collect();
            md.push_str(&format!("- **Roles:** {}\n", roles.join(", ")));
        }

        match play.get("tasks").and_then(Value::as_sequence) {
            Some(tasks) => {
                md.push_str("- **Tasks:**\n");
                for task in tasks {
                    let task_name = task
                        .get("name")
                        .map(scalar_text)
                        .unwrap_or_else(|| "Unnamed Task".into());
                    let module = task_module(task).unwrap_or_else(|| "unknown".into());
                    md.push_str(&format!("  - `{task_name}` ({module})\n"));
                    if let Some(summary) = explain_module(&module) {
                        md.push_str(&format!("    > {summary}\n"));
                    }
                }
            }
            None => md.push_str("- No tasks found.\n"),
        }
        md.push('\n');
    }

    Ok(md)
}

fn task_module(task: &Value) -> Option<String> {
    task.as_mapping()?
        .keys()
        .map(scalar_text)
        .find(|k| !TASK_DIRECTIVES.contains(&k.as_str()))
}

/// One-line explanation for well-known modules, fully-qualified or not.
fn explain_module(module: &str) -> Option<&'static str> {
    let short = module.rsplit('.').next().unwrap_or(module);
    let text = match short {
        "copy" => "Copies a file from source to destination on the remote machine.",
        "apt" => "Manages packages on Debian/Ubuntu systems using APT.",
        "yum" | "dnf" => "Manages packages on RHEL-family systems.",
        "template" => "Renders a Jinja2 template file to a destination path on the target host.",
        "service" | "systemd" => "Manages system services (start, stop, restart, enable).",
        "command" | "shell" => "Executes a command on the remote node.",
        "file" => "Sets attributes of files, directories or symlinks.",
        "git" => "Checks out a git repository on the remote node.",
        "user" => "Manages user accounts.",
        "pip" => "Manages Python packages.",
        _ => return None,
    };
    Some(text)
}
