//! Backs the "tool status" HTTP endpoint: is the CLI installed, what
//! version, is Node/npm available — all read-only probes built on the
//! Process Launcher's resolution.

use serde::Serialize;

use crate::domain::ToolKind;
use crate::launcher;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStatus {
    pub installed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable_path: Option<String>,
    pub config_path: String,
    pub config_exists: bool,
    pub node_installed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_version: Option<String>,
    pub npm_installed: bool,
    pub platform: &'static str,
}

fn binary_name(tool: ToolKind) -> &'static str {
    match tool {
        ToolKind::Codex => "codex",
        ToolKind::ClaudeCode => "claude",
    }
}

fn config_path(tool: ToolKind) -> String {
    let home = dirs::home_dir().unwrap_or_else(|| ".".into());
    match tool {
        ToolKind::Codex => home.join(".codex").join("config.toml"),
        ToolKind::ClaudeCode => home.join(".claude").join("settings.json"),
    }
    .display()
    .to_string()
}

async fn resolved_version(executable: &std::path::Path) -> Option<String> {
    let output = tokio::process::Command::new(executable)
        .arg("--version")
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub async fn tool_status(tool: ToolKind) -> ToolStatus {
    let name = binary_name(tool);
    let resolved = launcher::resolve(name, None).await.ok();
    let version = match &resolved {
        Some(path) => resolved_version(path).await,
        None => None,
    };

    let node_path = launcher::resolve("node", None).await.ok();
    let node_version = match &node_path {
        Some(path) => resolved_version(path).await,
        None => None,
    };
    let npm_installed = launcher::resolve("npm", None).await.is_ok();

    let path = config_path(tool);
    let config_exists = std::path::Path::new(&path).exists();

    ToolStatus {
        installed: resolved.is_some(),
        version,
        executable_path: resolved.map(|p| p.display().to_string()),
        config_path: path,
        config_exists,
        node_installed: node_path.is_some(),
        node_version,
        npm_installed,
        platform: std::env::consts::OS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_not_installed_for_a_tool_with_no_real_binary() {
        let status = tool_status(ToolKind::Codex).await;
        assert_eq!(status.platform, std::env::consts::OS);
        let _ = status.installed;
    }
}
