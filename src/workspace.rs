//! The open design session: current project, chat transcript, history and
//! the generation calls that mutate them.
//!
//! Undoable mutations record a snapshot before they touch the project.
//! Drag repositioning, auto-layout and clearing the "just created"
//! highlight never enter history.

use crate::canvas::{self, grid_position, CanvasFrame, CanvasSync, ViewState};
use crate::error::{Error, Result};
use crate::gateway::{
    GeneratedProject, GenerationGateway, ModifyRequest, ProjectRequest, ReferenceImage,
    ScreenRequest,
};
use crate::history::History;
use crate::lock::GenerationLock;
use crate::models::{new_id, ChatMessage, Position, Project, ProjectData, Screen, Theme};
use crate::store::ProjectStore;
use log::{error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};

/// Outcome of a generation attempt that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The gateway answered and the project was updated
    Completed { summary: String },
    /// Another generation was already in flight; nothing happened
    Rejected,
}

struct WorkspaceState {
    store: ProjectStore,
    history: History,
    chat: Vec<ChatMessage>,
    canvas: CanvasSync,
    product_theme: Theme,
}

impl WorkspaceState {
    fn current(&self) -> Result<Project> {
        self.store
            .current()
            .cloned()
            .ok_or_else(|| Error::NotFound("no project is open".to_string()))
    }

    /// Fails when the open project changed while a generation was in flight
    fn current_matching(&self, project_id: &str) -> Result<Project> {
        let current = self.current()?;
        if current.id != project_id {
            warn!("[Workspace] project changed during generation, dropping result");
            return Err(Error::NotFound(format!("project {} is no longer open", project_id)));
        }
        Ok(current)
    }

    /// Applies `change` to the current project and saves it. History is
    /// recorded only once the save went through.
    fn commit<F>(&mut self, change: F) -> Result<Project>
    where
        F: FnOnce(&mut Project) -> Result<()>,
    {
        let before = self.current()?;
        let mut project = before.clone();
        change(&mut project)?;
        let saved = self.finish(project)?;
        self.history.record_before_change(Some(&before));
        Ok(saved)
    }

    /// Saves `project` as current without touching history
    fn finish(&mut self, project: Project) -> Result<Project> {
        let saved = self.store.save(project)?;
        self.store.set_current(Some(saved.clone()));
        Ok(saved)
    }
}

fn require_prompt(prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(Error::InvalidInput("prompt is empty".to_string()));
    }
    Ok(())
}

fn project_data(generated: GeneratedProject) -> ProjectData {
    ProjectData {
        overview: generated.overview,
        design_system: generated.design_system,
        screens: generated
            .screens
            .into_iter()
            .map(|s| Screen {
                id: s.id,
                name: s.name,
                purpose: s.purpose,
                markup: s.markup,
                position: None,
                locked: None,
                just_created: None,
            })
            .collect(),
        connections: generated.connections,
    }
}

pub struct Workspace {
    state: Mutex<WorkspaceState>,
    gateway: Arc<dyn GenerationGateway>,
    lock: GenerationLock,
}

impl Workspace {
    pub fn new(store: ProjectStore, gateway: Arc<dyn GenerationGateway>) -> Self {
        let product_theme = store.app_theme();
        Self {
            state: Mutex::new(WorkspaceState {
                store,
                history: History::new(),
                chat: Vec::new(),
                canvas: CanvasSync::new(),
                product_theme,
            }),
            gateway,
            lock: GenerationLock::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, WorkspaceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn current(&self) -> Option<Project> {
        self.state().store.current().cloned()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.state().store.projects().to_vec()
    }

    /// Active chat transcript
    pub fn chat(&self) -> Vec<ChatMessage> {
        self.state().chat.clone()
    }

    pub fn is_generating(&self) -> bool {
        self.lock.is_busy()
    }

    pub fn can_undo(&self) -> bool {
        self.state().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.state().history.can_redo()
    }

    /// Depth of the undo and redo stacks
    pub fn history_depth(&self) -> (usize, usize) {
        let state = self.state();
        (state.history.past_len(), state.history.future_len())
    }

    /// Routes a prompt the way the chat box does: new project, modification
    /// of the selected screen, or a new screen.
    pub async fn submit_prompt(
        &self,
        prompt: &str,
        selected_screen: Option<&str>,
        images: Vec<ReferenceImage>,
    ) -> Result<Submission> {
        let has_project = self.state().store.current().is_some();
        match (has_project, selected_screen) {
            (false, _) => self.generate_project(prompt, images).await,
            (true, Some(screen_id)) => self.modify_screen(screen_id, prompt, images).await,
            (true, None) => self.add_screen(prompt, images).await,
        }
    }

    /// Synthesizes a whole project. With a project already open, its
    /// document is regenerated in place.
    pub async fn generate_project(
        &self,
        prompt: &str,
        images: Vec<ReferenceImage>,
    ) -> Result<Submission> {
        require_prompt(prompt)?;
        let Some(_guard) = self.lock.try_acquire() else {
            info!("[Workspace] generation already running, ignoring prompt");
            return Ok(Submission::Rejected);
        };

        let (request, open_id) = {
            let mut state = self.state();
            let current = state.store.current().cloned();
            let theme = current
                .as_ref()
                .map(|p| p.theme_preference)
                .unwrap_or(state.product_theme);
            let request = ProjectRequest {
                instruction: prompt.to_string(),
                theme,
                chat_history: state.chat.clone(),
                images,
            };
            state.chat.push(ChatMessage::user(prompt));
            (request, current.map(|p| p.id))
        };

        let generated = self.gateway.generate_project(&request).await.map_err(|e| {
            error!("[Workspace] project generation failed: {}", e);
            e
        })?;
        let summary = generated.assistant_message.clone();
        let name = generated.overview.name.clone();

        let mut state = self.state();
        let chat = {
            let mut chat = state.chat.clone();
            chat.push(ChatMessage::assistant(&summary));
            chat
        };

        let saved = match open_id {
            Some(id) => {
                state.current_matching(&id)?;
                let data = project_data(generated);
                let saved = state.commit(|project| {
                    project.name = name;
                    project.data = data;
                    project.chat_history = chat.clone();
                    Ok(())
                })?;
                state.canvas.reset();
                saved
            }
            None => {
                if state.store.current().is_some() {
                    warn!("[Workspace] a project was opened during generation, dropping result");
                    return Err(Error::InvalidInput(
                        "a project was opened while generating".to_string(),
                    ));
                }
                let project = Project::new(name, project_data(generated), chat.clone(), request.theme);
                state.finish(project)?
            }
        };
        state.chat = chat;
        info!(
            "[Workspace] generated project {} with {} screens",
            saved.id,
            saved.data.screens.len()
        );
        Ok(Submission::Completed { summary })
    }

    /// Synthesizes one more screen for the open project
    pub async fn add_screen(&self, prompt: &str, images: Vec<ReferenceImage>) -> Result<Submission> {
        require_prompt(prompt)?;
        let Some(_guard) = self.lock.try_acquire() else {
            info!("[Workspace] generation already running, ignoring prompt");
            return Ok(Submission::Rejected);
        };

        let (request, project_id) = {
            let mut state = self.state();
            let current = state.current()?;
            let request = ScreenRequest {
                instruction: prompt.to_string(),
                theme: current.theme_preference,
                chat_history: state.chat.clone(),
                images,
                overview: current.data.overview.clone(),
                design_system: current.data.design_system.clone(),
                existing_screens: current.data.screens.clone(),
            };
            state.chat.push(ChatMessage::user(prompt));
            (request, current.id)
        };

        let draft = self.gateway.generate_screen(&request).await.map_err(|e| {
            error!("[Workspace] screen generation failed: {}", e);
            e
        })?;

        let mut state = self.state();
        state.current_matching(&project_id)?;
        let breakpoint = state.canvas.breakpoint();
        let mut chat = state.chat.clone();
        chat.push(ChatMessage::assistant(&draft.summary));

        let saved = state.commit(|project| {
            let index = project.data.screens.len();
            project.data.screens.push(Screen {
                id: new_id(),
                name: draft.name,
                purpose: request.instruction.trim().to_string(),
                markup: draft.markup,
                position: Some(grid_position(index, breakpoint)),
                locked: None,
                just_created: Some(true),
            });
            project.chat_history = chat.clone();
            Ok(())
        })?;
        state.chat = chat;
        info!(
            "[Workspace] added screen to {} ({} screens)",
            saved.id,
            saved.data.screens.len()
        );
        Ok(Submission::Completed {
            summary: draft.summary,
        })
    }

    /// Rewrites one screen of the open project from an instruction
    pub async fn modify_screen(
        &self,
        screen_id: &str,
        prompt: &str,
        images: Vec<ReferenceImage>,
    ) -> Result<Submission> {
        require_prompt(prompt)?;
        let Some(_guard) = self.lock.try_acquire() else {
            info!("[Workspace] generation already running, ignoring prompt");
            return Ok(Submission::Rejected);
        };

        let (request, project_id) = {
            let mut state = self.state();
            let current = state.current()?;
            let screen = current
                .data
                .screen(screen_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("screen {}", screen_id)))?;
            let request = ModifyRequest {
                instruction: prompt.to_string(),
                theme: current.theme_preference,
                chat_history: state.chat.clone(),
                images,
                design_system: current.data.design_system.clone(),
                screen,
            };
            state.chat.push(ChatMessage::user(prompt));
            (request, current.id)
        };

        let draft = self.gateway.modify_screen(&request).await.map_err(|e| {
            error!("[Workspace] screen modification failed: {}", e);
            e
        })?;

        let mut state = self.state();
        state.current_matching(&project_id)?;
        let mut chat = state.chat.clone();
        chat.push(ChatMessage::assistant(&draft.summary));

        state.commit(|project| {
            let screen = project
                .data
                .screen_mut(screen_id)
                .ok_or_else(|| Error::NotFound(format!("screen {}", screen_id)))?;
            screen.name = draft.name;
            screen.markup = draft.markup;
            project.chat_history = chat.clone();
            Ok(())
        })?;
        state.chat = chat;
        info!("[Workspace] modified screen {}", screen_id);
        Ok(Submission::Completed {
            summary: draft.summary,
        })
    }

    pub fn delete_screen(&self, screen_id: &str) -> Result<()> {
        let mut state = self.state();
        state.commit(|project| {
            let before = project.data.screens.len();
            project.data.screens.retain(|s| s.id != screen_id);
            if project.data.screens.len() == before {
                return Err(Error::NotFound(format!("screen {}", screen_id)));
            }
            if let Some(connections) = project.data.connections.as_mut() {
                connections.retain(|c| c.from != screen_id && c.to != screen_id);
            }
            Ok(())
        })?;
        info!("[Workspace] deleted screen {}", screen_id);
        Ok(())
    }

    /// Flips the drag lock of a screen, returning the new state
    pub fn toggle_lock(&self, screen_id: &str) -> Result<bool> {
        let mut state = self.state();
        let mut locked = false;
        state.commit(|project| {
            let screen = project
                .data
                .screen_mut(screen_id)
                .ok_or_else(|| Error::NotFound(format!("screen {}", screen_id)))?;
            locked = !screen.is_locked();
            screen.locked = Some(locked);
            Ok(())
        })?;
        Ok(locked)
    }

    pub fn rename_project(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("project name is empty".to_string()));
        }
        let mut state = self.state();
        state.commit(|project| {
            project.name = name.trim().to_string();
            Ok(())
        })?;
        Ok(())
    }

    /// Drag end from the renderer. Persisted immediately, not undoable.
    pub fn move_screen(&self, screen_id: &str, position: Position) -> Result<()> {
        let mut state = self.state();
        let current = state.current()?;
        let moved = canvas::on_drag_stop(&current, screen_id, position)
            .ok_or_else(|| Error::NotFound(format!("screen {}", screen_id)))?;
        state.finish(moved)?;
        Ok(())
    }

    /// Ends the highlight of a freshly created screen
    pub fn clear_just_created(&self, screen_id: &str) -> Result<()> {
        let mut state = self.state();
        let current = state.current()?;
        if let Some(cleared) = canvas::clear_just_created(&current, screen_id) {
            state.store.sync(&cleared)?;
            state.store.set_current(Some(cleared));
        }
        Ok(())
    }

    /// Product theme used for new projects and for the open one
    pub fn set_product_theme(&self, theme: Theme) -> Result<()> {
        let mut state = self.state();
        state.product_theme = theme;
        if let Some(mut current) = state.store.current().cloned() {
            current.theme_preference = theme;
            state.store.sync(&current)?;
            state.store.set_current(Some(current));
        }
        Ok(())
    }

    pub fn set_app_theme(&self, theme: Theme) -> Result<()> {
        self.state().store.set_app_theme(theme)
    }

    /// Renderable nodes for the open project. Applies auto-layout when due.
    pub fn canvas_frame(&self, view: &ViewState) -> Result<CanvasFrame> {
        let mut state = self.state();
        let Some(mut project) = state.store.current().cloned() else {
            state.canvas.reset();
            return Ok(CanvasFrame::default());
        };
        let frame = state.canvas.sync(&mut project, view);
        if frame.relaid_out {
            state.store.sync(&project)?;
            state.store.set_current(Some(project));
        }
        Ok(frame)
    }

    /// Returns `false` when there was nothing to undo
    pub fn undo(&self) -> Result<bool> {
        let mut guard = self.state();
        let state = &mut *guard;
        let Some(previous) = state.history.undo(state.store.current()) else {
            return Ok(false);
        };
        if let Err(e) = state.store.sync(&previous) {
            state.history.redo(Some(&previous));
            return Err(e);
        }
        state.chat = previous.chat_history.clone();
        state.store.set_current(Some(previous));
        info!("[History] undo");
        Ok(true)
    }

    /// Returns `false` when there was nothing to redo
    pub fn redo(&self) -> Result<bool> {
        let mut guard = self.state();
        let state = &mut *guard;
        let Some(next) = state.history.redo(state.store.current()) else {
            return Ok(false);
        };
        if let Err(e) = state.store.sync(&next) {
            state.history.undo(Some(&next));
            return Err(e);
        }
        state.chat = next.chat_history.clone();
        state.store.set_current(Some(next));
        info!("[History] redo");
        Ok(true)
    }

    /// Closes the open project and starts with an empty canvas and chat
    pub fn new_workspace(&self) {
        let mut state = self.state();
        state.store.set_current(None);
        state.chat.clear();
        state.history.clear();
        state.canvas.reset();
    }

    /// Opens a saved project, restoring its chat transcript
    pub fn load_project(&self, project_id: &str) -> Result<Project> {
        let mut state = self.state();
        let project = state
            .store
            .find(project_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("project {}", project_id)))?;
        state.chat = project.chat_history.clone();
        state.history.clear();
        state.canvas.reset();
        state.store.set_current(Some(project.clone()));
        info!("[Workspace] opened project {}", project.id);
        Ok(project)
    }

    /// Explicit save of the open project with the active transcript
    pub fn save_current(&self) -> Result<Option<Project>> {
        let mut state = self.state();
        let Some(mut project) = state.store.current().cloned() else {
            return Ok(None);
        };
        project.chat_history = state.chat.clone();
        state.finish(project).map(Some)
    }

    pub fn export_history(&self) -> Result<String> {
        self.state().store.export_history()
    }

    pub fn import_history(&self, raw: &str) -> Result<usize> {
        self.state().store.import_history(raw)
    }
}
