//! Standalone HTML, ZIP and history-bundle exports

use crate::error::{Error, Result};
use crate::models::{DesignSystem, Project, Screen};
use crate::paths::{screen_archive_entry_name, screen_export_file_name};
use log::info;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn font_link(font: &str) -> String {
    format!(
        "https://fonts.googleapis.com/css2?family={}:wght@400;500;600;700&display=swap",
        font.trim().replace(' ', "+")
    )
}

/// Standalone HTML document for one screen, palette exposed as CSS variables
pub fn screen_html(screen: &Screen, design_system: &DesignSystem) -> String {
    let variables = design_system
        .colors
        .entries()
        .iter()
        .map(|(name, value)| format!("      --color-{}: {};", name, value))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title}</title>
  <script src="https://cdn.tailwindcss.com"></script>
  <link rel="preconnect" href="https://fonts.googleapis.com">
  <link href="{font_href}" rel="stylesheet">
  <style>
    :root {{
{variables}
      --radius: {radius};
      --font: '{font}', sans-serif;
    }}
    body {{
      margin: 0;
      font-family: var(--font);
      background: var(--color-background);
      color: var(--color-text);
    }}
  </style>
</head>
<body>
{markup}
</body>
</html>
"#,
        title = escape_html(&screen.name),
        font_href = font_link(&design_system.font),
        variables = variables,
        radius = design_system.radius,
        font = design_system.font,
        markup = screen.markup,
    )
}

/// ZIP archive with one HTML document per screen
pub fn project_zip(project: &Project) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut used = HashSet::new();

    for screen in &project.data.screens {
        let base = screen_archive_entry_name(&screen.name);
        let mut name = base.clone();
        let mut n = 2;
        while !used.insert(name.clone()) {
            name = format!("{}_{}.html", base.trim_end_matches(".html"), n);
            n += 1;
        }

        writer
            .start_file(name.as_str(), options)
            .map_err(|e| Error::Export(format!("Failed to add {}: {}", name, e)))?;
        writer
            .write_all(screen_html(screen, &project.data.design_system).as_bytes())
            .map_err(|e| Error::Export(format!("Failed to write {}: {}", name, e)))?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

/// Writes one screen as `<dir>/<sanitized name>.html`
pub fn write_screen(dir: &Path, screen: &Screen, design_system: &DesignSystem) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(screen_export_file_name(&screen.name));
    std::fs::write(&path, screen_html(screen, design_system))?;
    info!("[Export] wrote {}", path.display());
    Ok(path)
}

/// Writes the project archive into `dir`
pub fn write_project_zip(dir: &Path, project: &Project) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(crate::paths::PROJECT_ARCHIVE_NAME);
    std::fs::write(&path, project_zip(project)?)?;
    info!(
        "[Export] wrote {} ({} screens)",
        path.display(),
        project.data.screens.len()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Overview, Palette, ProjectData, Theme};
    use std::io::Read;

    fn design_system() -> DesignSystem {
        DesignSystem {
            colors: Palette {
                primary: "#2563eb".into(),
                secondary: "#9333ea".into(),
                background: "#ffffff".into(),
                surface: "#f1f5f9".into(),
                text: "#0f172a".into(),
                accent: "#f97316".into(),
                muted: "#94a3b8".into(),
                border: "#e2e8f0".into(),
            },
            radius: "16px".into(),
            font: "Plus Jakarta Sans".into(),
        }
    }

    fn screen(id: &str, name: &str) -> Screen {
        Screen {
            id: id.into(),
            name: name.into(),
            purpose: String::new(),
            markup: format!("<main id=\"{}\">{}</main>", id, name),
            position: None,
            locked: None,
            just_created: None,
        }
    }

    fn project(screens: Vec<Screen>) -> Project {
        Project::new(
            "Export me",
            ProjectData {
                overview: Overview {
                    name: "Export me".into(),
                    description: String::new(),
                    target_users: vec![],
                },
                design_system: design_system(),
                screens,
                connections: None,
            },
            vec![],
            Theme::Light,
        )
    }

    fn entry_names(bytes: Vec<u8>) -> Vec<String> {
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[test]
    fn screen_html_embeds_markup_tokens_and_font() {
        let html = screen_html(&screen("s1", "Home <Beta>"), &design_system());
        assert!(html.contains("<main id=\"s1\">"));
        assert!(html.contains("--color-primary: #2563eb;"));
        assert!(html.contains("--color-border: #e2e8f0;"));
        assert!(html.contains("--radius: 16px;"));
        assert!(html.contains("family=Plus+Jakarta+Sans"));
        assert!(html.contains("<title>Home &lt;Beta&gt;</title>"));
    }

    #[test]
    fn zip_has_one_entry_per_screen() {
        let bytes = project_zip(&project(vec![
            screen("a", "Sign In"),
            screen("b", "Dashboard"),
        ]))
        .unwrap();
        assert_eq!(entry_names(bytes), ["Dashboard.html", "Sign_In.html"]);
    }

    #[test]
    fn duplicate_screen_names_do_not_collide() {
        let bytes = project_zip(&project(vec![screen("a", "Home"), screen("b", "Home")])).unwrap();
        assert_eq!(entry_names(bytes), ["Home.html", "Home_2.html"]);
    }

    #[test]
    fn zip_entries_hold_the_screen_documents() {
        let bytes = project_zip(&project(vec![screen("a", "Sign In")])).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut content = String::new();
        archive
            .by_name("Sign_In.html")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert!(content.starts_with("<!DOCTYPE html>"));
        assert!(content.contains("<main id=\"a\">Sign In</main>"));
    }

    #[test]
    fn screen_file_is_written_with_lowercase_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_screen(dir.path(), &screen("a", "Sign In"), &design_system()).unwrap();
        assert_eq!(path.file_name().unwrap(), "sign_in.html");
        assert!(path.exists());
    }

    #[test]
    fn hostile_screen_names_stay_inside_the_target() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("exports");
        let path =
            write_screen(&out, &screen("a", "../escaped"), &design_system()).unwrap();
        assert_eq!(path.parent().unwrap(), out.as_path());
        assert!(!root.path().join("escaped.html").exists());

        let bytes = project_zip(&project(vec![
            screen("a", "../x"),
            screen("b", "/abs/path"),
        ]))
        .unwrap();
        for name in entry_names(bytes) {
            assert!(!name.contains('/') && !name.contains('\\'), "{}", name);
            assert!(!name.starts_with('.'), "{}", name);
        }
    }
}
