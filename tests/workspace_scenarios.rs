//! End-to-end workspace behavior against a scripted gateway

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use uix_agent::canvas::{grid_position, Breakpoint, CameraCommand, CanvasEffect, ViewState};
use uix_agent::gateway::{
    GeneratedProject, GeneratedScreen, GenerationGateway, ModifyRequest, ProjectRequest,
    ScreenDraft, ScreenRequest,
};
use uix_agent::models::{ChatRole, DesignSystem, Overview, Palette, Position};
use uix_agent::{
    Error, MemoryStorage, ProjectStore, Result, StorageBackend, Submission, Workspace,
};

/// Gateway returning canned documents. Each call yields once so that
/// concurrent callers interleave.
#[derive(Default)]
struct MockGateway {
    calls: AtomicUsize,
    fail: AtomicBool,
    screens: Vec<(&'static str, &'static str)>,
    last_screen_request: std::sync::Mutex<Option<ScreenRequest>>,
}

impl MockGateway {
    fn with_screens(screens: &[(&'static str, &'static str)]) -> Arc<Self> {
        Arc::new(Self {
            screens: screens.to_vec(),
            ..Self::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Gateway("API error (401): invalid key".to_string()));
        }
        Ok(())
    }
}

fn design_system() -> DesignSystem {
    DesignSystem {
        colors: Palette {
            primary: "#4f46e5".into(),
            secondary: "#db2777".into(),
            background: "#ffffff".into(),
            surface: "#f8fafc".into(),
            text: "#111827".into(),
            accent: "#f59e0b".into(),
            muted: "#6b7280".into(),
            border: "#e5e7eb".into(),
        },
        radius: "12px".into(),
        font: "Inter".into(),
    }
}

#[async_trait]
impl GenerationGateway for MockGateway {
    async fn generate_project(&self, _request: &ProjectRequest) -> Result<GeneratedProject> {
        self.enter().await?;
        Ok(GeneratedProject {
            overview: Overview {
                name: "Habit Tracker".into(),
                description: "Track daily habits".into(),
                target_users: vec!["students".into()],
            },
            design_system: design_system(),
            screens: self
                .screens
                .iter()
                .map(|(id, name)| GeneratedScreen {
                    id: id.to_string(),
                    name: name.to_string(),
                    purpose: format!("{} screen", name),
                    markup: format!("<main>{}</main>", name),
                })
                .collect(),
            connections: None,
            assistant_message: "Designed a habit tracker.".into(),
        })
    }

    async fn generate_screen(&self, request: &ScreenRequest) -> Result<ScreenDraft> {
        self.enter().await?;
        *self.last_screen_request.lock().unwrap() = Some(request.clone());
        Ok(ScreenDraft {
            name: "Settings".into(),
            markup: "<main>Settings</main>".into(),
            summary: "Added a settings screen.".into(),
        })
    }

    async fn modify_screen(&self, request: &ModifyRequest) -> Result<ScreenDraft> {
        self.enter().await?;
        Ok(ScreenDraft {
            name: request.screen.name.clone(),
            markup: format!("<main class=\"dark\">{}</main>", request.screen.name),
            summary: format!("Updated {}.", request.screen.name),
        })
    }
}

fn workspace_with(gateway: Arc<MockGateway>) -> Workspace {
    let store = ProjectStore::load(Box::new(MemoryStorage::new())).unwrap();
    Workspace::new(store, gateway)
}

#[tokio::test]
async fn generate_delete_undo_scenario() {
    let gateway = MockGateway::with_screens(&[("s1", "Home")]);
    let workspace = workspace_with(gateway.clone());

    let outcome = workspace
        .generate_project("A habit tracker", vec![])
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Submission::Completed {
            summary: "Designed a habit tracker.".into()
        }
    );
    assert_eq!(workspace.current().unwrap().data.screens.len(), 1);
    assert_eq!(workspace.projects().len(), 1);
    assert_eq!(workspace.history_depth(), (0, 0));

    workspace.delete_screen("s1").unwrap();
    assert_eq!(workspace.current().unwrap().data.screens.len(), 0);
    assert_eq!(workspace.history_depth(), (1, 0));

    assert!(workspace.undo().unwrap());
    let restored = workspace.current().unwrap();
    assert_eq!(restored.data.screens.len(), 1);
    assert_eq!(restored.data.screens[0].id, "s1");
    assert_eq!(workspace.projects()[0].data.screens.len(), 1);
}

#[tokio::test]
async fn second_concurrent_generation_is_rejected() {
    let gateway = MockGateway::with_screens(&[("s1", "Home")]);
    let workspace = workspace_with(gateway.clone());

    let (first, second) = tokio::join!(
        workspace.generate_project("first", vec![]),
        workspace.generate_project("second", vec![])
    );

    assert!(matches!(first.unwrap(), Submission::Completed { .. }));
    assert_eq!(second.unwrap(), Submission::Rejected);
    assert_eq!(gateway.calls(), 1);
    assert!(!workspace.is_generating());

    // The rejected prompt never reached the transcript.
    let chat = workspace.chat();
    assert_eq!(chat.len(), 2);
    assert_eq!(chat[0].content, "first");
}

#[tokio::test]
async fn failed_generation_keeps_user_message_and_state() {
    let gateway = MockGateway::with_screens(&[("s1", "Home")]);
    gateway.fail.store(true, Ordering::SeqCst);
    let workspace = workspace_with(gateway.clone());

    let err = workspace
        .generate_project("A habit tracker", vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Gateway(_)));
    assert!(workspace.current().is_none());
    assert!(workspace.projects().is_empty());
    assert!(!workspace.is_generating());

    let chat = workspace.chat();
    assert_eq!(chat.len(), 1);
    assert_eq!(chat[0].role, ChatRole::User);

    // The lock was released, so a retry goes through.
    gateway.fail.store(false, Ordering::SeqCst);
    workspace
        .generate_project("A habit tracker", vec![])
        .await
        .unwrap();
    assert_eq!(gateway.calls(), 2);
    assert!(workspace.current().is_some());
}

#[tokio::test]
async fn empty_prompt_is_refused_before_the_gateway() {
    let gateway = MockGateway::with_screens(&[("s1", "Home")]);
    let workspace = workspace_with(gateway.clone());
    let err = workspace.submit_prompt("   ", None, vec![]).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(gateway.calls(), 0);
    assert!(workspace.chat().is_empty());
}

#[tokio::test]
async fn submit_prompt_routes_by_workspace_state() {
    let gateway = MockGateway::with_screens(&[("s1", "Home"), ("s2", "Stats")]);
    let workspace = workspace_with(gateway.clone());

    workspace.submit_prompt("habit app", None, vec![]).await.unwrap();
    assert_eq!(workspace.current().unwrap().data.screens.len(), 2);

    workspace.submit_prompt("add settings", None, vec![]).await.unwrap();
    let project = workspace.current().unwrap();
    assert_eq!(project.data.screens.len(), 3);
    let request = gateway.last_screen_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.existing_screens.len(), 2);
    assert_eq!(request.chat_history.len(), 2);

    workspace
        .submit_prompt("make it dark", Some("s2"), vec![])
        .await
        .unwrap();
    let project = workspace.current().unwrap();
    assert_eq!(
        project.data.screen("s2").unwrap().markup,
        "<main class=\"dark\">Stats</main>"
    );
    assert_eq!(project.data.screens.len(), 3);
    assert_eq!(workspace.projects().len(), 1);
    assert_eq!(workspace.chat().len(), 6);
    assert_eq!(project.chat_history, workspace.chat());
}

#[tokio::test]
async fn new_screen_is_highlighted_then_cleared_without_history() {
    let gateway = MockGateway::with_screens(&[("s1", "Home")]);
    let workspace = workspace_with(gateway);
    workspace.generate_project("habit app", vec![]).await.unwrap();

    let view = ViewState::default();
    let frame = workspace.canvas_frame(&view).unwrap();
    assert!(frame.relaid_out);
    assert!(frame
        .effects
        .contains(&CanvasEffect::Camera(CameraCommand::fit_view())));

    workspace.add_screen("settings page", vec![]).await.unwrap();
    let project = workspace.current().unwrap();
    let fresh = project.data.screens.last().unwrap().clone();
    assert!(fresh.is_just_created());
    assert!(fresh.position.is_some());
    assert_ne!(fresh.id, "s1");

    let frame = workspace.canvas_frame(&view).unwrap();
    assert!(!frame.relaid_out);
    assert!(frame
        .effects
        .contains(&CanvasEffect::Camera(CameraCommand::focus(fresh.id.clone()))));

    let depth = workspace.history_depth();
    workspace.clear_just_created(&fresh.id).unwrap();
    assert_eq!(workspace.history_depth(), depth);
    let project = workspace.current().unwrap();
    assert!(!project.data.screen(&fresh.id).unwrap().is_just_created());
    assert_eq!(project.data.screen(&fresh.id).unwrap().position, fresh.position);
}

#[tokio::test]
async fn modify_then_undo_restores_markup_and_chat() {
    let gateway = MockGateway::with_screens(&[("s1", "Home")]);
    let workspace = workspace_with(gateway);
    workspace.generate_project("habit app", vec![]).await.unwrap();
    let before = workspace.current().unwrap();
    let chat_before = workspace.chat();

    workspace.modify_screen("s1", "darker", vec![]).await.unwrap();
    assert_ne!(workspace.current().unwrap(), before);
    assert_eq!(workspace.chat().len(), chat_before.len() + 2);

    workspace.undo().unwrap();
    assert_eq!(workspace.current().unwrap(), before);
    assert_eq!(workspace.chat(), chat_before);

    let undone = workspace.current().unwrap();
    workspace.redo().unwrap();
    workspace.undo().unwrap();
    assert_eq!(workspace.current().unwrap(), undone);
}

#[tokio::test]
async fn modify_unknown_screen_fails_without_calling_gateway() {
    let gateway = MockGateway::with_screens(&[("s1", "Home")]);
    let workspace = workspace_with(gateway.clone());
    workspace.generate_project("habit app", vec![]).await.unwrap();

    let err = workspace
        .modify_screen("missing", "darker", vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(gateway.calls(), 1);
    assert!(!workspace.is_generating());
}

#[tokio::test]
async fn edits_after_undo_discard_redo() {
    let gateway = MockGateway::with_screens(&[("s1", "Home"), ("s2", "Stats"), ("s3", "Profile")]);
    let workspace = workspace_with(gateway);
    workspace.generate_project("habit app", vec![]).await.unwrap();

    workspace.delete_screen("s1").unwrap();
    workspace.delete_screen("s2").unwrap();
    workspace.undo().unwrap();
    assert!(workspace.can_redo());

    workspace.toggle_lock("s3").unwrap();
    assert!(!workspace.can_redo());
    assert!(!workspace.redo().unwrap());
    assert_eq!(workspace.history_depth(), (2, 0));
}

#[tokio::test]
async fn drag_is_persisted_but_not_undoable() {
    let gateway = MockGateway::with_screens(&[("s1", "Home"), ("s2", "Stats")]);
    let workspace = workspace_with(gateway);
    workspace.generate_project("habit app", vec![]).await.unwrap();
    workspace.canvas_frame(&ViewState::default()).unwrap();

    workspace.move_screen("s2", Position::new(42.0, -7.0)).unwrap();
    assert_eq!(workspace.history_depth(), (0, 0));
    assert_eq!(
        workspace.projects()[0].data.screen("s2").unwrap().position,
        Some(Position::new(42.0, -7.0))
    );
    assert_eq!(
        workspace.current().unwrap().data.screen("s1").unwrap().position,
        Some(Position::new(0.0, 0.0))
    );

    let err = workspace.move_screen("nope", Position::default()).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn lock_toggle_controls_draggable_nodes() {
    let gateway = MockGateway::with_screens(&[("s1", "Home")]);
    let workspace = workspace_with(gateway);
    workspace.generate_project("habit app", vec![]).await.unwrap();

    assert!(workspace.toggle_lock("s1").unwrap());
    let frame = workspace.canvas_frame(&ViewState::default()).unwrap();
    assert!(!frame.nodes[0].draggable);

    assert!(!workspace.toggle_lock("s1").unwrap());
    let frame = workspace.canvas_frame(&ViewState::default()).unwrap();
    assert!(frame.nodes[0].draggable);
}

#[tokio::test]
async fn new_workspace_then_load_restores_project_and_chat() {
    let gateway = MockGateway::with_screens(&[("s1", "Home")]);
    let workspace = workspace_with(gateway);
    workspace.generate_project("habit app", vec![]).await.unwrap();
    workspace.delete_screen("s1").unwrap();
    let saved = workspace.current().unwrap();

    workspace.new_workspace();
    assert!(workspace.current().is_none());
    assert!(workspace.chat().is_empty());
    assert!(!workspace.can_undo());
    assert!(!workspace.undo().unwrap());

    let loaded = workspace.load_project(&saved.id).unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(workspace.chat(), saved.chat_history);
    assert!(!workspace.can_undo());

    // A second generation with no project open creates a second project.
    workspace.new_workspace();
    workspace.generate_project("another app", vec![]).await.unwrap();
    assert_eq!(workspace.projects().len(), 2);
}

#[tokio::test]
async fn history_bundle_round_trips_between_workspaces() {
    let gateway = MockGateway::with_screens(&[("s1", "Home"), ("s2", "Stats")]);
    let source = workspace_with(gateway.clone());
    source.generate_project("habit app", vec![]).await.unwrap();
    let bundle = source.export_history().unwrap();

    let backend = Arc::new(MemoryStorage::new());
    let target = Workspace::new(
        ProjectStore::load(Box::new(backend.clone())).unwrap(),
        gateway,
    );
    assert_eq!(target.import_history(&bundle).unwrap(), 1);
    assert_eq!(target.import_history(&bundle).unwrap(), 0);
    assert_eq!(target.projects().len(), 1);
    assert!(backend.get(uix_agent::storage::PROJECTS_KEY).unwrap().is_some());

    let archive = uix_agent::export::project_zip(&target.projects()[0]).unwrap();
    let zip = zip::ZipArchive::new(std::io::Cursor::new(archive)).unwrap();
    let mut names: Vec<_> = zip.file_names().collect();
    names.sort();
    assert_eq!(names, ["Home.html", "Stats.html"]);
}

#[tokio::test]
async fn rename_is_undoable_and_rejects_blank_names() {
    let gateway = MockGateway::with_screens(&[("s1", "Home")]);
    let workspace = workspace_with(gateway);
    workspace.generate_project("habit app", vec![]).await.unwrap();

    assert!(workspace.rename_project("  ").is_err());
    workspace.rename_project("Habits v2").unwrap();
    assert_eq!(workspace.projects()[0].name, "Habits v2");
    workspace.undo().unwrap();
    assert_eq!(workspace.current().unwrap().name, "Habit Tracker");
}

#[tokio::test]
async fn save_current_writes_active_transcript() {
    let gateway = MockGateway::with_screens(&[("s1", "Home")]);
    let workspace = workspace_with(gateway);
    assert!(workspace.save_current().unwrap().is_none());

    workspace.generate_project("habit app", vec![]).await.unwrap();
    let before = workspace.current().unwrap();
    let saved = workspace.save_current().unwrap().unwrap();
    assert_eq!(saved.id, before.id);
    assert!(saved.timestamp > before.timestamp);
    assert_eq!(saved.chat_history, workspace.chat());
    assert_eq!(workspace.projects()[0], saved);
}

/// Memory storage that refuses writes while `failing` is set
#[derive(Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    failing: AtomicBool,
}

impl StorageBackend for FlakyStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Storage("database is locked".into()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key)
    }
}

#[tokio::test]
async fn failed_save_leaves_project_list_and_history_alone() {
    let gateway = MockGateway::with_screens(&[("s1", "Home"), ("s2", "Stats")]);
    let backend = Arc::new(FlakyStorage::default());
    let workspace = Workspace::new(
        ProjectStore::load(Box::new(backend.clone())).unwrap(),
        gateway,
    );
    workspace.generate_project("habit app", vec![]).await.unwrap();
    let before = workspace.current().unwrap();

    backend.failing.store(true, Ordering::SeqCst);
    let err = workspace.delete_screen("s1").unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(workspace.history_depth(), (0, 0));
    assert_eq!(workspace.current().unwrap(), before);
    assert_eq!(workspace.projects(), vec![before.clone()]);

    assert!(workspace.toggle_lock("s2").is_err());
    assert!(workspace.modify_screen("s2", "darker", vec![]).await.is_err());
    assert_eq!(workspace.current().unwrap(), before);
    assert!(!workspace.can_undo());

    backend.failing.store(false, Ordering::SeqCst);
    workspace.delete_screen("s1").unwrap();
    assert_eq!(workspace.history_depth(), (1, 0));
    assert_eq!(workspace.projects()[0].data.screens.len(), 1);

    backend.failing.store(true, Ordering::SeqCst);
    assert!(workspace.undo().is_err());
    assert_eq!(workspace.history_depth(), (1, 0));
    assert_eq!(workspace.current().unwrap().data.screens.len(), 1);

    backend.failing.store(false, Ordering::SeqCst);
    assert!(workspace.undo().unwrap());
    assert_eq!(workspace.current().unwrap(), before);
}

#[tokio::test]
async fn new_screen_uses_the_synced_breakpoint_grid() {
    let gateway = MockGateway::with_screens(&[("s1", "Home")]);
    let workspace = workspace_with(gateway);
    workspace.generate_project("habit app", vec![]).await.unwrap();

    let desktop = ViewState {
        breakpoint: Breakpoint::Desktop,
        ..ViewState::default()
    };
    workspace.canvas_frame(&desktop).unwrap();
    workspace.add_screen("settings page", vec![]).await.unwrap();

    let project = workspace.current().unwrap();
    let fresh = project.data.screens.last().unwrap();
    assert_eq!(fresh.position, Some(grid_position(1, Breakpoint::Desktop)));
    assert_eq!(fresh.position, Some(Position::new(1440.0 + 150.0, 0.0)));
}

#[tokio::test]
async fn reopened_project_keeps_saved_positions() {
    let gateway = MockGateway::with_screens(&[("s1", "Home"), ("s2", "Stats")]);
    let workspace = workspace_with(gateway);
    workspace.generate_project("habit app", vec![]).await.unwrap();
    let view = ViewState::default();
    assert!(workspace.canvas_frame(&view).unwrap().relaid_out);
    workspace.move_screen("s1", Position::new(9999.0, 9999.0)).unwrap();
    let id = workspace.current().unwrap().id;

    workspace.new_workspace();
    workspace.load_project(&id).unwrap();
    let frame = workspace.canvas_frame(&view).unwrap();

    assert!(!frame.relaid_out);
    assert!(frame
        .effects
        .contains(&CanvasEffect::Camera(CameraCommand::fit_view())));
    assert_eq!(frame.nodes[0].position, Position::new(9999.0, 9999.0));

    // A breakpoint switch is what re-runs the layout.
    let frame = workspace
        .canvas_frame(&ViewState {
            breakpoint: Breakpoint::Tablet,
            ..ViewState::default()
        })
        .unwrap();
    assert!(frame.relaid_out);
    assert_eq!(frame.nodes[0].position, Position::new(0.0, 0.0));
}
