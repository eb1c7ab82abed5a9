use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use uix_agent::canvas::{CanvasEffect, ViewState};
use uix_agent::gateway::{self, GenerationGateway, ReferenceImage, UnconfiguredGateway};
use uix_agent::models::Position;
use uix_agent::{
    export, paths, Breakpoint, ProjectStore, Provider, Settings, SqliteStorage, Submission,
    Theme, Workspace,
};

#[derive(Parser)]
#[command(name = "uix-agent", about = "Prompt-driven screen designer", version)]
struct Cli {
    /// Database file (defaults to the app data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show or change provider, model, API key and theme
    Config {
        #[arg(long)]
        provider: Option<Provider>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        theme: Option<Theme>,
    },
    #[command(flatten)]
    Project(ProjectCommand),
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// List saved projects, newest first
    List,
    /// Show the screens of a project
    Show { project: String },
    /// Send a prompt: new project, new screen, or a change to one screen
    Generate {
        prompt: String,
        /// Open this saved project first
        #[arg(long)]
        project: Option<String>,
        /// Modify this screen of `--project` instead of adding one
        #[arg(long, requires = "project")]
        screen: Option<String>,
        /// Reference image(s) to attach
        #[arg(long = "image")]
        images: Vec<PathBuf>,
        #[arg(long, default_value = "mobile")]
        breakpoint: Breakpoint,
    },
    /// Delete a screen from a project
    DeleteScreen { project: String, screen: String },
    /// Lock or unlock a screen against dragging
    ToggleLock { project: String, screen: String },
    /// Move a screen on the canvas
    Move {
        project: String,
        screen: String,
        x: f64,
        y: f64,
    },
    /// Re-run auto-layout for a breakpoint
    Layout {
        project: String,
        #[arg(long, default_value = "mobile")]
        breakpoint: Breakpoint,
    },
    /// Write one screen as a standalone HTML file
    ExportScreen {
        project: String,
        screen: String,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Write every screen of a project into project_screens.zip
    ExportProject {
        project: String,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Write the whole project list as JSON
    ExportHistory {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Merge a history bundle, keeping local copies of known projects
    ImportHistory { file: PathBuf },
}

fn out_dir(out: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match out {
        Some(dir) => Ok(dir),
        None => Ok(paths::get_exports_dir()?),
    }
}

/// Plays the canvas effects a renderer would: just-created highlights are
/// cleared once their delay has passed.
async fn apply_effects(workspace: &Workspace, effects: Vec<CanvasEffect>) -> anyhow::Result<()> {
    for effect in effects {
        match effect {
            CanvasEffect::Camera(command) => info!("[Canvas] camera: {:?}", command),
            CanvasEffect::ClearJustCreated { id, after } => {
                tokio::time::sleep(after).await;
                workspace.clear_just_created(&id)?;
            }
        }
    }
    Ok(())
}

fn print_project(workspace: &Workspace) {
    let Some(project) = workspace.current() else {
        println!("No project open");
        return;
    };
    println!("{} [{}] ({} theme)", project.name, project.id, project.theme_preference);
    for screen in &project.data.screens {
        let position = screen.position.unwrap_or_default();
        println!(
            "  {:<38} {:<24} ({:>7.0}, {:>7.0}){}",
            screen.id,
            screen.name,
            position.x,
            position.y,
            if screen.is_locked() { " locked" } else { "" }
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let db_path = match cli.db {
        Some(path) => path,
        None => paths::get_db_path()?,
    };
    let storage = Arc::new(
        SqliteStorage::open(&db_path)
            .with_context(|| format!("Failed to open {}", db_path.display()))?,
    );
    let mut settings = Settings::load(storage.as_ref())?;

    let command = match cli.command {
        Command::Project(command) => command,
        Command::Config {
            provider,
            model,
            api_key,
            theme,
        } => {
            if let Some(provider) = provider {
                settings.set_provider(provider);
            }
            if let Some(model) = model {
                settings.model = model;
            }
            if let Some(key) = api_key {
                settings.api_key = Some(key).filter(|k| !k.trim().is_empty());
            }
            if let Some(theme) = theme {
                settings.theme = theme;
            }
            settings.save(storage.as_ref())?;
            println!("provider: {}", settings.provider);
            println!("model:    {}", settings.model);
            println!(
                "api key:  {}",
                if settings.api_key.is_some() { "custom" } else { "from environment" }
            );
            println!("theme:    {}", settings.theme);
            return Ok(());
        }
    };

    let gateway: Arc<dyn GenerationGateway> = match gateway::from_settings(&settings) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            warn!("Generation disabled: {}", e);
            Arc::new(UnconfiguredGateway::new(e.to_string()))
        }
    };
    let store = ProjectStore::load(Box::new(storage.clone()))?;
    let workspace = Workspace::new(store, gateway);

    match command {
        ProjectCommand::List => {
            for project in workspace.projects() {
                let saved = chrono::DateTime::from_timestamp_millis(project.timestamp)
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "{}  {}  {} ({} screens)",
                    project.id,
                    saved,
                    project.name,
                    project.data.screens.len()
                );
            }
        }
        ProjectCommand::Show { project } => {
            workspace.load_project(&project)?;
            print_project(&workspace);
        }
        ProjectCommand::Generate {
            prompt,
            project,
            screen,
            images,
            breakpoint,
        } => {
            if let Some(id) = &project {
                workspace.load_project(id)?;
            }
            let view = ViewState {
                breakpoint,
                ..ViewState::default()
            };
            // New screens take their grid cell from the last synced breakpoint.
            workspace.canvas_frame(&view)?;

            let images = images
                .iter()
                .map(|path| ReferenceImage::from_path(path))
                .collect::<uix_agent::Result<Vec<_>>>()?;

            match workspace.submit_prompt(&prompt, screen.as_deref(), images).await? {
                Submission::Completed { summary } => println!("{}", summary),
                Submission::Rejected => return Err(anyhow!("another generation is running")),
            }

            let frame = workspace.canvas_frame(&view)?;
            apply_effects(&workspace, frame.effects).await?;
            print_project(&workspace);
        }
        ProjectCommand::DeleteScreen { project, screen } => {
            workspace.load_project(&project)?;
            workspace.delete_screen(&screen)?;
            print_project(&workspace);
        }
        ProjectCommand::ToggleLock { project, screen } => {
            workspace.load_project(&project)?;
            let locked = workspace.toggle_lock(&screen)?;
            println!("{} {}", screen, if locked { "locked" } else { "unlocked" });
        }
        ProjectCommand::Move {
            project,
            screen,
            x,
            y,
        } => {
            workspace.load_project(&project)?;
            workspace.move_screen(&screen, Position::new(x, y))?;
            print_project(&workspace);
        }
        ProjectCommand::Layout {
            project,
            breakpoint,
        } => {
            workspace.load_project(&project)?;
            // Sync once at the other breakpoint so the real one counts as a change.
            let other = if breakpoint == Breakpoint::Desktop {
                Breakpoint::Mobile
            } else {
                Breakpoint::Desktop
            };
            workspace.canvas_frame(&ViewState {
                breakpoint: other,
                ..ViewState::default()
            })?;
            workspace.canvas_frame(&ViewState {
                breakpoint,
                ..ViewState::default()
            })?;
            print_project(&workspace);
        }
        ProjectCommand::ExportScreen {
            project,
            screen,
            out,
        } => {
            let project = workspace.load_project(&project)?;
            let target = project
                .data
                .screen(&screen)
                .ok_or_else(|| anyhow!("screen {} not found", screen))?;
            let path = export::write_screen(
                &out_dir(out)?,
                target,
                &project.data.design_system,
            )?;
            println!("{}", path.display());
        }
        ProjectCommand::ExportProject { project, out } => {
            let project = workspace.load_project(&project)?;
            let path = export::write_project_zip(&out_dir(out)?, &project)?;
            println!("{}", path.display());
        }
        ProjectCommand::ExportHistory { out } => {
            let dir = out_dir(out)?;
            std::fs::create_dir_all(&dir)?;
            let path = dir.join(paths::history_export_file_name(
                chrono::Local::now().date_naive(),
            ));
            std::fs::write(&path, workspace.export_history()?)?;
            println!("{}", path.display());
        }
        ProjectCommand::ImportHistory { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let added = workspace.import_history(&raw)?;
            println!("Imported {} projects", added);
        }
    }

    Ok(())
}
