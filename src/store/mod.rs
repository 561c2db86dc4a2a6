//! Two-JSON-file persistence for Projects and Providers: single-writer,
//! many-reader, atomic write-to-temp-then-rename on every mutation, the
//! teacher's `load_sessions`/`save_sessions` shape generalized to two files.

pub mod model;

pub use model::{Project, Provider, RequestShape};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::ToolKind;
use crate::error::AppError;

struct StoreData {
    projects: Vec<Project>,
    providers: Vec<Provider>,
}

pub struct Store {
    data_dir: PathBuf,
    data: RwLock<StoreData>,
}

fn projects_path(data_dir: &Path) -> PathBuf {
    data_dir.join("projects.json")
}

fn providers_path(data_dir: &Path) -> PathBuf {
    data_dir.join("providers.json")
}

fn read_json_array<T: serde::de::DeserializeOwned>(path: &Path) -> Vec<T> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "failed to read store file");
            }
            Vec::new()
        }
    }
}

fn write_json_array_atomic<T: serde::Serialize>(path: &Path, items: &[T]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(items)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

impl Store {
    pub fn load(data_dir: PathBuf) -> anyhow::Result<Arc<Self>> {
        std::fs::create_dir_all(&data_dir)?;
        let projects = read_json_array(&projects_path(&data_dir));
        let providers = read_json_array(&providers_path(&data_dir));
        tracing::info!(
            projects = projects.len(),
            providers = providers.len(),
            "loaded persisted store"
        );
        Ok(Arc::new(Self {
            data_dir,
            data: RwLock::new(StoreData { projects, providers }),
        }))
    }

    fn persist(&self, data: &StoreData) -> anyhow::Result<()> {
        write_json_array_atomic(&projects_path(&self.data_dir), &data.projects)?;
        write_json_array_atomic(&providers_path(&self.data_dir), &data.providers)?;
        Ok(())
    }

    pub async fn list_projects(&self, tool_filter: Option<ToolKind>) -> Vec<Project> {
        let data = self.data.read().await;
        data.projects
            .iter()
            .filter(|p| tool_filter.map(|t| p.tool_kind == t).unwrap_or(true))
            .cloned()
            .collect()
    }

    pub async fn get_project(&self, id: Uuid) -> Option<Project> {
        self.data.read().await.projects.iter().find(|p| p.id == id).cloned()
    }

    pub async fn create_project(&self, project: Project) -> Result<Project, AppError> {
        let mut data = self.data.write().await;
        if data
            .projects
            .iter()
            .any(|p| p.tool_kind == project.tool_kind && p.name == project.name)
        {
            return Err(AppError::Conflict(format!(
                "a project named '{}' already exists for this tool",
                project.name
            )));
        }
        data.projects.push(project.clone());
        self.persist(&data).map_err(AppError::Internal)?;
        Ok(project)
    }

    pub async fn update_project(&self, updated: Project) -> Result<Project, AppError> {
        let mut data = self.data.write().await;
        if data.projects.iter().any(|p| {
            p.id != updated.id && p.tool_kind == updated.tool_kind && p.name == updated.name
        }) {
            return Err(AppError::Conflict(format!(
                "a project named '{}' already exists for this tool",
                updated.name
            )));
        }
        let slot = data
            .projects
            .iter_mut()
            .find(|p| p.id == updated.id)
            .ok_or_else(|| AppError::NotFound("project not found".into()))?;
        *slot = updated.clone();
        self.persist(&data).map_err(AppError::Internal)?;
        Ok(updated)
    }

    pub async fn delete_project(&self, id: Uuid) -> Result<(), AppError> {
        let mut data = self.data.write().await;
        let before = data.projects.len();
        data.projects.retain(|p| p.id != id);
        if data.projects.len() == before {
            return Err(AppError::NotFound("project not found".into()));
        }
        self.persist(&data).map_err(AppError::Internal)?;
        Ok(())
    }

    pub async fn list_providers(&self) -> Vec<Provider> {
        self.data.read().await.providers.clone()
    }

    pub async fn get_provider(&self, id: Uuid) -> Option<Provider> {
        self.data.read().await.providers.iter().find(|p| p.id == id).cloned()
    }

    pub async fn create_provider(&self, provider: Provider) -> Result<Provider, AppError> {
        let mut data = self.data.write().await;
        data.providers.push(provider.clone());
        self.persist(&data).map_err(AppError::Internal)?;
        Ok(provider)
    }

    pub async fn update_provider(&self, updated: Provider) -> Result<Provider, AppError> {
        let mut data = self.data.write().await;
        let slot = data
            .providers
            .iter_mut()
            .find(|p| p.id == updated.id)
            .ok_or_else(|| AppError::NotFound("provider not found".into()))?;
        *slot = updated.clone();
        self.persist(&data).map_err(AppError::Internal)?;
        Ok(updated)
    }

    /// Deleting a Provider nulls `providerId` on every Project that
    /// referenced it — the weak-reference invariant in §3.
    pub async fn delete_provider(&self, id: Uuid) -> Result<(), AppError> {
        let mut data = self.data.write().await;
        let before = data.providers.len();
        data.providers.retain(|p| p.id != id);
        if data.providers.len() == before {
            return Err(AppError::NotFound("provider not found".into()));
        }
        for project in data.projects.iter_mut() {
            if project.provider_id == Some(id) {
                project.provider_id = None;
            }
        }
        self.persist(&data).map_err(AppError::Internal)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn sample_project(tool: ToolKind, name: &str) -> Project {
        let now = Utc::now();
        Project {
            id: Uuid::new_v4(),
            tool_kind: tool,
            name: name.to_string(),
            workspace_path: "/tmp/ws".to_string(),
            provider_id: None,
            model: None,
            created_at: now,
            updated_at: now,
            last_started_at: None,
        }
    }

    #[tokio::test]
    async fn create_then_read_returns_exact_record() {
        let dir = tempdir().unwrap();
        let store = Store::load(dir.path().to_path_buf()).unwrap();
        let project = sample_project(ToolKind::Codex, "demo");
        let created = store.create_project(project.clone()).await.unwrap();
        let fetched = store.get_project(created.id).await.unwrap();
        assert_eq!(fetched.name, "demo");
    }

    #[tokio::test]
    async fn duplicate_tool_kind_and_name_is_a_conflict() {
        let dir = tempdir().unwrap();
        let store = Store::load(dir.path().to_path_buf()).unwrap();
        store
            .create_project(sample_project(ToolKind::Codex, "demo"))
            .await
            .unwrap();
        let result = store
            .create_project(sample_project(ToolKind::Codex, "demo"))
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_nulls_referencing_projects() {
        let dir = tempdir().unwrap();
        let store = Store::load(dir.path().to_path_buf()).unwrap();

        let provider = Provider {
            id: Uuid::new_v4(),
            name: "p".into(),
            base_address: "http://localhost".into(),
            api_key: "key".into(),
            request_shape: RequestShape::OpenAiCompat,
            azure_api_version: None,
            models: vec!["gpt".into()],
            refreshed_at: Utc::now(),
        };
        let provider = store.create_provider(provider).await.unwrap();

        let mut project = sample_project(ToolKind::Codex, "demo");
        project.provider_id = Some(provider.id);
        let project = store.create_project(project).await.unwrap();

        store.delete_provider(provider.id).await.unwrap();

        let reloaded = store.get_project(project.id).await.unwrap();
        assert_eq!(reloaded.provider_id, None);
    }

    #[tokio::test]
    async fn delete_missing_project_is_not_found() {
        let dir = tempdir().unwrap();
        let store = Store::load(dir.path().to_path_buf()).unwrap();
        let result = store.delete_project(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn store_reload_rereads_persisted_files() {
        let dir = tempdir().unwrap();
        {
            let store = Store::load(dir.path().to_path_buf()).unwrap();
            store
                .create_project(sample_project(ToolKind::ClaudeCode, "reloaded"))
                .await
                .unwrap();
        }
        let store = Store::load(dir.path().to_path_buf()).unwrap();
        let projects = store.list_projects(None).await;
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "reloaded");
    }
}
