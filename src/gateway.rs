//! Persistence of named projects.
//!
//! The editor never talks to a store directly. It hands out [`SaveRequest`]
//! snapshots, the host runs [`flush_save`] on whatever executor it owns, and
//! the resulting [`SaveOutcome`] is fed back to the editor.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::model::{Project, ProjectContent, ProjectSummary};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("project not found: {0}")]
    NotFound(String),

    #[error("invalid project name: {0:?}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed project JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[async_trait]
pub trait ProjectGateway: Send + Sync {
    /// Most recently updated first.
    async fn list_projects(&self) -> GatewayResult<Vec<ProjectSummary>>;
    async fn load_project(&self, id: &str) -> GatewayResult<Project>;
    /// Replaces the stored graph and bumps `updatedAt`.
    async fn save_project(&self, id: &str, content: &ProjectContent) -> GatewayResult<DateTime<Utc>>;
    async fn create_project(&self, name: &str) -> GatewayResult<Project>;
    async fn delete_project(&self, id: &str) -> GatewayResult<()>;
    async fn rename_project(&self, id: &str, name: &str) -> GatewayResult<()>;
}

fn checked_name(name: &str) -> GatewayResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}

fn newest_first(summaries: &mut [ProjectSummary]) {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    projects: RwLock<HashMap<String, Project>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projects(projects: impl IntoIterator<Item = Project>) -> Self {
        let map = projects.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            projects: RwLock::new(map),
        }
    }
}

#[async_trait]
impl ProjectGateway for MemoryGateway {
    async fn list_projects(&self) -> GatewayResult<Vec<ProjectSummary>> {
        let projects = self.projects.read().unwrap_or_else(PoisonError::into_inner);
        let mut summaries: Vec<_> = projects.values().map(Project::summary).collect();
        newest_first(&mut summaries);
        Ok(summaries)
    }

    async fn load_project(&self, id: &str) -> GatewayResult<Project> {
        let projects = self.projects.read().unwrap_or_else(PoisonError::into_inner);
        projects
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    async fn save_project(&self, id: &str, content: &ProjectContent) -> GatewayResult<DateTime<Utc>> {
        let mut projects = self.projects.write().unwrap_or_else(PoisonError::into_inner);
        let project = projects
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        project.nodes = content.nodes.clone();
        project.edges = content.edges.clone();
        project.groups = content.groups.clone();
        project.updated_at = Utc::now();
        Ok(project.updated_at)
    }

    async fn create_project(&self, name: &str) -> GatewayResult<Project> {
        let project = Project::new(checked_name(name)?);
        let mut projects = self.projects.write().unwrap_or_else(PoisonError::into_inner);
        projects.insert(project.id.clone(), project.clone());
        Ok(project)
    }

    async fn delete_project(&self, id: &str) -> GatewayResult<()> {
        let mut projects = self.projects.write().unwrap_or_else(PoisonError::into_inner);
        projects
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    async fn rename_project(&self, id: &str, name: &str) -> GatewayResult<()> {
        let name = checked_name(name)?;
        let mut projects = self.projects.write().unwrap_or_else(PoisonError::into_inner);
        let project = projects
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        project.name = name.to_string();
        project.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(feature = "fs")]
pub use file::FileGateway;

#[cfg(feature = "fs")]
mod file {
    use std::io::ErrorKind;
    use std::path::{Path, PathBuf};

    use super::*;

    /// One `<id>.json` document per project inside a directory.
    #[derive(Debug, Clone)]
    pub struct FileGateway {
        root: PathBuf,
    }

    impl FileGateway {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }

        pub fn root(&self) -> &Path {
            &self.root
        }

        fn path_for(&self, id: &str) -> GatewayResult<PathBuf> {
            let safe = !id.is_empty()
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !safe {
                return Err(GatewayError::NotFound(id.to_string()));
            }
            Ok(self.root.join(format!("{id}.json")))
        }

        async fn read(&self, id: &str) -> GatewayResult<Project> {
            let path = self.path_for(id)?;
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    return Err(GatewayError::NotFound(id.to_string()));
                }
                Err(err) => return Err(err.into()),
            };
            let mut project: Project = serde_json::from_slice(&bytes)?;
            // the file name is authoritative
            project.id = id.to_string();
            Ok(project)
        }

        async fn write(&self, project: &Project) -> GatewayResult<()> {
            let path = self.path_for(&project.id)?;
            tokio::fs::create_dir_all(&self.root).await?;
            let staging = path.with_extension("json.tmp");
            tokio::fs::write(&staging, serde_json::to_vec_pretty(project)?).await?;
            tokio::fs::rename(&staging, &path).await?;
            debug!(path = %path.display(), "wrote project");
            Ok(())
        }
    }

    #[async_trait]
    impl ProjectGateway for FileGateway {
        async fn list_projects(&self) -> GatewayResult<Vec<ProjectSummary>> {
            let mut entries = match tokio::fs::read_dir(&self.root).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                Err(err) => return Err(err.into()),
            };
            let mut summaries = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                match self.read(id).await {
                    Ok(project) => summaries.push(project.summary()),
                    Err(err) => warn!(path = %path.display(), %err, "skipping unreadable project"),
                }
            }
            newest_first(&mut summaries);
            Ok(summaries)
        }

        async fn load_project(&self, id: &str) -> GatewayResult<Project> {
            self.read(id).await
        }

        async fn save_project(&self, id: &str, content: &ProjectContent) -> GatewayResult<DateTime<Utc>> {
            let mut project = self.read(id).await?;
            project.nodes = content.nodes.clone();
            project.edges = content.edges.clone();
            project.groups = content.groups.clone();
            project.updated_at = Utc::now();
            self.write(&project).await?;
            Ok(project.updated_at)
        }

        async fn create_project(&self, name: &str) -> GatewayResult<Project> {
            let project = Project::new(checked_name(name)?);
            self.write(&project).await?;
            Ok(project)
        }

        async fn delete_project(&self, id: &str) -> GatewayResult<()> {
            let path = self.path_for(id)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    Err(GatewayError::NotFound(id.to_string()))
                }
                Err(err) => Err(err.into()),
            }
        }

        async fn rename_project(&self, id: &str, name: &str) -> GatewayResult<()> {
            let name = checked_name(name)?;
            let mut project = self.read(id).await?;
            project.name = name.to_string();
            project.updated_at = Utc::now();
            self.write(&project).await
        }
    }
}

/// Snapshot handed to the host for an asynchronous save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub project_id: String,
    /// Editor revision the snapshot was taken at.
    pub revision: u64,
    pub content: ProjectContent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub project_id: String,
    pub revision: u64,
    pub result: Result<DateTime<Utc>, String>,
}

/// Runs one save against `gateway`. Failures become part of the outcome so
/// the editor can surface them without losing local state.
pub async fn flush_save(gateway: &dyn ProjectGateway, request: SaveRequest) -> SaveOutcome {
    let result = gateway
        .save_project(&request.project_id, &request.content)
        .await
        .map_err(|err| {
            warn!(project = %request.project_id, %err, "save failed");
            err.to_string()
        });
    SaveOutcome {
        project_id: request.project_id,
        revision: request.revision,
        result,
    }
}
