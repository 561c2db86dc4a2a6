//! Opaque job descriptors for the long-running "install tool" / "install
//! Node" HTTP operations: a job runs in the background, appends log lines,
//! and settles into `Succeeded`/`Failed`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::process::Command;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub log_lines: Vec<String>,
}

#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<Uuid, Job>>,
}

impl JobRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.lock().await.get(&id).cloned()
    }

    async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.jobs.lock().await.insert(
            id,
            Job {
                id,
                status: JobStatus::Running,
                log_lines: Vec::new(),
            },
        );
        id
    }

    async fn append_log(&self, id: Uuid, line: String) {
        if let Some(job) = self.jobs.lock().await.get_mut(&id) {
            job.log_lines.push(line);
        }
    }

    async fn finish(&self, id: Uuid, succeeded: bool) {
        if let Some(job) = self.jobs.lock().await.get_mut(&id) {
            job.status = if succeeded { JobStatus::Succeeded } else { JobStatus::Failed };
        }
    }

    /// Spawn `program args...` in the background, tracked as a job whose log
    /// is the merged stdout/stderr of the command.
    pub async fn spawn_install(self: &Arc<Self>, program: String, args: Vec<String>) -> Uuid {
        let id = self.create().await;
        let registry = self.clone();

        tokio::spawn(async move {
            let output = Command::new(&program).args(&args).output().await;
            match output {
                Ok(out) => {
                    for line in String::from_utf8_lossy(&out.stdout).lines() {
                        registry.append_log(id, line.to_string()).await;
                    }
                    for line in String::from_utf8_lossy(&out.stderr).lines() {
                        registry.append_log(id, line.to_string()).await;
                    }
                    registry.finish(id, out.status.success()).await;
                }
                Err(e) => {
                    registry.append_log(id, format!("failed to spawn {program}: {e}")).await;
                    registry.finish(id, false).await;
                }
            }
        });

        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn job_transitions_to_succeeded_on_a_trivial_command() {
        let registry = JobRegistry::new();
        let id = registry
            .spawn_install("true".to_string(), vec![])
            .await;

        for _ in 0..50 {
            if let Some(job) = registry.get(id).await {
                if job.status != JobStatus::Running {
                    assert_eq!(job.status, JobStatus::Succeeded);
                    return;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("job never settled");
    }
}
