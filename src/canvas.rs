//! Derives renderable canvas nodes from the current project
//!
//! The renderer owns drag-and-drop, camera animation and selection; this
//! module decides what it should show, where screens go, and which camera
//! moves it should play.

use crate::models::{DesignSystem, Position, Project, Screen};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Gap between grid cells, both axes
pub const LAYOUT_GAP: f64 = 150.0;
/// Camera padding ratio when framing every node
pub const FIT_VIEW_PADDING: f64 = 0.2;
/// Camera padding ratio when framing a freshly created screen
pub const FOCUS_PADDING: f64 = 0.4;
/// Duration of camera animations
pub const CAMERA_DURATION: Duration = Duration::from_millis(800);
/// How long a new screen stays highlighted
pub const JUST_CREATED_HIGHLIGHT: Duration = Duration::from_millis(900);

/// Viewport preset used to size screen previews
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Breakpoint {
    #[default]
    Mobile,
    Tablet,
    Desktop,
}

impl Breakpoint {
    /// Node width and height on the canvas
    pub fn node_size(&self) -> (f64, f64) {
        match self {
            Breakpoint::Mobile => (390.0, 844.0),
            Breakpoint::Tablet => (768.0, 1024.0),
            Breakpoint::Desktop => (1440.0, 900.0),
        }
    }

    /// Grid columns used by auto-layout
    pub fn columns(&self) -> usize {
        match self {
            Breakpoint::Desktop => 2,
            _ => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Breakpoint::Mobile => "mobile",
            Breakpoint::Tablet => "tablet",
            Breakpoint::Desktop => "desktop",
        }
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Breakpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "mobile" => Ok(Breakpoint::Mobile),
            "tablet" => Ok(Breakpoint::Tablet),
            "desktop" => Ok(Breakpoint::Desktop),
            other => Err(format!("Unknown breakpoint: {}", other)),
        }
    }
}

/// Transient UI state that never lands in the project document
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub breakpoint: Breakpoint,
    /// Screens rendered interactively instead of as static previews
    pub live_previews: HashSet<String>,
    /// In-progress modification prompts, keyed by screen id
    pub edit_text: HashMap<String, String>,
    /// A modify request is in flight
    pub modifying: bool,
    /// Selection as last reported by the renderer
    pub selected: HashSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub screen: Screen,
    pub design_system: DesignSystem,
    pub breakpoint: Breakpoint,
    pub live: bool,
    pub selected: bool,
    pub edit_text: Option<String>,
    pub modifying: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasNode {
    pub id: String,
    pub position: Position,
    pub draggable: bool,
    pub selected: bool,
    pub data: NodeData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanvasEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CameraCommand {
    FitView { padding: f64, duration_ms: u64 },
    FocusNode { id: String, padding: f64, duration_ms: u64 },
}

impl CameraCommand {
    pub fn fit_view() -> Self {
        CameraCommand::FitView {
            padding: FIT_VIEW_PADDING,
            duration_ms: CAMERA_DURATION.as_millis() as u64,
        }
    }

    pub fn focus(id: impl Into<String>) -> Self {
        CameraCommand::FocusNode {
            id: id.into(),
            padding: FOCUS_PADDING,
            duration_ms: CAMERA_DURATION.as_millis() as u64,
        }
    }
}

/// Side effects the host should schedule after rendering a frame
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEffect {
    Camera(CameraCommand),
    /// Call [`clear_just_created`] for `id` once `after` has elapsed
    ClearJustCreated { id: String, after: Duration },
}

#[derive(Debug, Clone, Default)]
pub struct CanvasFrame {
    pub nodes: Vec<CanvasNode>,
    pub edges: Vec<CanvasEdge>,
    pub effects: Vec<CanvasEffect>,
    /// Auto-layout rewrote screen positions during this sync
    pub relaid_out: bool,
}

/// Grid position of the `index`-th screen
pub fn grid_position(index: usize, breakpoint: Breakpoint) -> Position {
    let (width, height) = breakpoint.node_size();
    let columns = breakpoint.columns();
    let row = index / columns;
    let col = index % columns;
    Position::new(
        col as f64 * (width + LAYOUT_GAP),
        row as f64 * (height + LAYOUT_GAP),
    )
}

/// Recomputes every screen position from scratch on a fixed grid
pub fn auto_layout(screens: &mut [Screen], breakpoint: Breakpoint) {
    for (index, screen) in screens.iter_mut().enumerate() {
        screen.position = Some(grid_position(index, breakpoint));
    }
}

/// One node per screen, in screen order
pub fn build_nodes(project: &Project, view: &ViewState) -> Vec<CanvasNode> {
    let design_system = &project.data.design_system;
    project
        .data
        .screens
        .iter()
        .enumerate()
        .map(|(index, screen)| {
            let selected = view.selected.contains(&screen.id);
            CanvasNode {
                id: screen.id.clone(),
                position: screen
                    .position
                    .unwrap_or_else(|| grid_position(index, view.breakpoint)),
                draggable: !screen.is_locked(),
                selected,
                data: NodeData {
                    screen: screen.clone(),
                    design_system: design_system.clone(),
                    breakpoint: view.breakpoint,
                    live: view.live_previews.contains(&screen.id),
                    selected,
                    edit_text: view.edit_text.get(&screen.id).cloned(),
                    modifying: view.modifying,
                },
            }
        })
        .collect()
}

/// Flow edges between screens that both still exist
pub fn build_edges(project: &Project) -> Vec<CanvasEdge> {
    let Some(connections) = &project.data.connections else {
        return Vec::new();
    };
    connections
        .iter()
        .filter(|c| project.data.screen(&c.from).is_some() && project.data.screen(&c.to).is_some())
        .map(|c| CanvasEdge {
            id: format!("e-{}-{}", c.from, c.to),
            source: c.from.clone(),
            target: c.to.clone(),
            label: c.label.clone(),
        })
        .collect()
}

/// Copy of `project` with one screen moved; `None` if the screen is unknown
pub fn on_drag_stop(project: &Project, screen_id: &str, position: Position) -> Option<Project> {
    let mut updated = project.clone();
    updated.data.screen_mut(screen_id)?.position = Some(position);
    Some(updated)
}

/// Copy of `project` with the highlight flag of one screen switched off
pub fn clear_just_created(project: &Project, screen_id: &str) -> Option<Project> {
    let screen = project.data.screen(screen_id)?;
    if !screen.is_just_created() {
        return None;
    }
    let mut updated = project.clone();
    if let Some(screen) = updated.data.screen_mut(screen_id) {
        screen.just_created = None;
    }
    Some(updated)
}

/// Tracks what has already been laid out and highlighted so that repeated
/// rebuilds only re-trigger layout and camera moves when something changed.
#[derive(Debug, Default)]
pub struct CanvasSync {
    breakpoint: Option<Breakpoint>,
    laid_out_project: Option<String>,
    highlighted: HashSet<String>,
}

impl CanvasSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the current project, e.g. on a new workspace
    pub fn reset(&mut self) {
        self.laid_out_project = None;
        self.highlighted.clear();
    }

    /// Breakpoint seen by the last sync
    pub fn breakpoint(&self) -> Breakpoint {
        self.breakpoint.unwrap_or_default()
    }

    /// Rebuilds the frame for `project`, laying it out first when the
    /// breakpoint changed or some screen has never been placed.
    pub fn sync(&mut self, project: &mut Project, view: &ViewState) -> CanvasFrame {
        let mut frame = CanvasFrame::default();
        let has_screens = !project.data.screens.is_empty();

        let breakpoint_changed = self.breakpoint.is_some_and(|bp| bp != view.breakpoint);
        self.breakpoint = Some(view.breakpoint);

        let first_sync = self.laid_out_project.as_deref() != Some(project.id.as_str());
        let unplaced = project.data.screens.iter().any(|s| s.position.is_none());

        if has_screens && (breakpoint_changed || unplaced) {
            auto_layout(&mut project.data.screens, view.breakpoint);
            frame.relaid_out = true;
            debug!(
                "[Canvas] laid out {} screens for {}",
                project.data.screens.len(),
                view.breakpoint
            );
        }
        if has_screens && (frame.relaid_out || first_sync) {
            self.laid_out_project = Some(project.id.clone());
            frame.effects.push(CanvasEffect::Camera(CameraCommand::fit_view()));
        }

        self.highlighted
            .retain(|id| project.data.screen(id).is_some_and(Screen::is_just_created));
        let fresh = project
            .data
            .screens
            .iter()
            .find(|s| s.is_just_created() && !self.highlighted.contains(&s.id));
        if let Some(screen) = fresh {
            self.highlighted.insert(screen.id.clone());
            frame
                .effects
                .push(CanvasEffect::Camera(CameraCommand::focus(&screen.id)));
            frame.effects.push(CanvasEffect::ClearJustCreated {
                id: screen.id.clone(),
                after: JUST_CREATED_HIGHLIGHT,
            });
        }

        frame.nodes = build_nodes(project, view);
        frame.edges = build_edges(project);
        frame
    }
}
