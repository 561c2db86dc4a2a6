use std::path::PathBuf;

use crate::domain::ToolKind;

/// Resolves `HOME` on Unix, `LOCALAPPDATA`/`APPDATA` on Windows, falling
/// back to `dirs::home_dir()` — the platform lookup spec.md's Environment
/// section calls for.
fn platform_home() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        std::env::var_os("LOCALAPPDATA")
            .or_else(|| std::env::var_os("APPDATA"))
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
    } else {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
    }
}

/// Each tool's archive root, per-tool layout owned by the external CLI.
pub fn archive_root(tool: ToolKind) -> Option<PathBuf> {
    let home = platform_home()?;
    Some(match tool {
        ToolKind::Codex => home.join(".codex").join("sessions"),
        ToolKind::ClaudeCode => home.join(".claude").join("projects"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_roots_differ_per_tool() {
        let codex = archive_root(ToolKind::Codex);
        let claude = archive_root(ToolKind::ClaudeCode);
        assert_ne!(codex, claude);
    }
}
