//! Project list and current-project state with write-through persistence

use crate::error::{Error, Result};
use crate::models::{now_millis, Project, Theme};
use crate::storage::{StorageBackend, PROJECTS_KEY, THEME_KEY};
use log::{info, warn};
use std::collections::HashSet;

/// Holds the open project and every saved project.
///
/// The project list is read once from the backend at construction and
/// written back in full after every change to it.
pub struct ProjectStore {
    backend: Box<dyn StorageBackend>,
    projects: Vec<Project>,
    current: Option<Project>,
    app_theme: Theme,
}

impl ProjectStore {
    pub fn load(backend: Box<dyn StorageBackend>) -> Result<Self> {
        let projects = match backend.get(PROJECTS_KEY)? {
            Some(raw) => match serde_json::from_str::<Vec<Project>>(&raw) {
                Ok(projects) => projects,
                Err(e) => {
                    warn!("[Store] stored project list is unreadable, starting empty: {}", e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let app_theme = backend
            .get(THEME_KEY)?
            .and_then(|raw| raw.parse::<Theme>().ok())
            .unwrap_or_default();

        info!("[Store] loaded {} projects", projects.len());
        Ok(Self {
            backend,
            projects,
            current: None,
            app_theme,
        })
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn current(&self) -> Option<&Project> {
        self.current.as_ref()
    }

    pub fn find(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn app_theme(&self) -> Theme {
        self.app_theme
    }

    /// Replaces the current project. Does not touch the project list.
    pub fn set_current(&mut self, project: Option<Project>) {
        self.current = project;
    }

    /// Saves `project` with a fresh timestamp and returns the stored copy
    pub fn save(&mut self, mut project: Project) -> Result<Project> {
        project.timestamp = now_millis().max(project.timestamp + 1);
        self.sync(&project)?;
        Ok(project)
    }

    /// Writes `project` into the list as-is: replaced in place when its id
    /// is known, prepended otherwise. The in-memory list only changes once
    /// the backend accepted the write.
    pub fn sync(&mut self, project: &Project) -> Result<()> {
        if !project.data.has_unique_screen_ids() {
            return Err(Error::InvalidInput(format!(
                "project {} has duplicate screen ids",
                project.id
            )));
        }
        let mut projects = self.projects.clone();
        match projects.iter_mut().find(|p| p.id == project.id) {
            Some(existing) => *existing = project.clone(),
            None => projects.insert(0, project.clone()),
        }
        self.persist(&projects)?;
        self.projects = projects;
        Ok(())
    }

    pub fn set_app_theme(&mut self, theme: Theme) -> Result<()> {
        self.backend.set(THEME_KEY, theme.as_str())?;
        self.app_theme = theme;
        Ok(())
    }

    /// Pretty-printed JSON of the whole project list
    pub fn export_history(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.projects)?)
    }

    /// Merges a history bundle, skipping ids already present.
    ///
    /// Returns the number of projects added. A bundle that fails to parse
    /// leaves the store untouched.
    pub fn import_history(&mut self, raw: &str) -> Result<usize> {
        let incoming: Vec<Project> = serde_json::from_str(raw)
            .map_err(|e| Error::Import(format!("Invalid history file: {}", e)))?;

        if let Some(broken) = incoming.iter().find(|p| !p.data.has_unique_screen_ids()) {
            return Err(Error::Import(format!(
                "project {} has duplicate screen ids",
                broken.id
            )));
        }

        let mut known: HashSet<String> = self.projects.iter().map(|p| p.id.clone()).collect();
        let fresh: Vec<Project> = incoming
            .into_iter()
            .filter(|p| known.insert(p.id.clone()))
            .collect();

        let added = fresh.len();
        if added > 0 {
            let mut projects = self.projects.clone();
            projects.extend(fresh);
            self.persist(&projects)?;
            self.projects = projects;
        }
        info!("[Store] imported {} projects", added);
        Ok(added)
    }

    fn persist(&self, projects: &[Project]) -> Result<()> {
        let encoded = serde_json::to_string(projects)?;
        self.backend.set(PROJECTS_KEY, &encoded)
    }
}
