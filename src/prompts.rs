//! Prompt templates for the three generation calls

use crate::models::{DesignSystem, Overview, Screen, Theme};

/// System prompt for synthesizing a whole project from a brief
pub const PROJECT_SYSTEM_PROMPT: &str = r##"You are a senior product designer who writes production-quality UI markup.

Given a product brief, design the app: an overview, a design system and its key screens.

Return ONLY valid JSON in this exact shape:
{
  "overview": { "name": "...", "description": "...", "targetUsers": ["..."] },
  "designSystem": {
    "colors": { "primary": "#hex", "secondary": "#hex", "background": "#hex", "surface": "#hex",
                "text": "#hex", "accent": "#hex", "muted": "#hex", "border": "#hex" },
    "radius": "12px",
    "font": "Google Font family name"
  },
  "screens": [
    { "id": "short-kebab-id", "name": "Screen name", "purpose": "one sentence", "markup": "<div>...</div>" }
  ],
  "assistantMessage": "two sentences telling the user what you designed"
}

Rules:
- Markup is a self-contained HTML fragment styled with Tailwind utility classes.
- Use the design system colors through CSS variables: var(--color-primary), var(--color-surface), etc.
- Screen ids must be unique.
- Do not include markdown fences or any text outside the JSON object."##;

/// System prompt for adding one screen to an existing project
pub const SCREEN_SYSTEM_PROMPT: &str = r##"You are a senior product designer extending an existing app with one new screen.

Stay consistent with the given design system and the existing screens.

Return ONLY valid JSON in this exact shape:
{ "name": "Screen name", "markup": "<div>...</div>", "summary": "one sentence for the user" }

Rules:
- Markup is a self-contained HTML fragment styled with Tailwind utility classes.
- Use the design system colors through CSS variables: var(--color-primary), var(--color-surface), etc.
- Do not include markdown fences or any text outside the JSON object."##;

/// System prompt for revising one existing screen
pub const MODIFY_SYSTEM_PROMPT: &str = r##"You are a senior product designer revising a single screen.

Apply the requested change and keep everything else intact.

Return ONLY valid JSON in this exact shape:
{ "name": "Screen name", "markup": "<div>...</div>", "summary": "one sentence describing the change" }

Rules:
- Return the complete markup, not a diff.
- Keep using the design system CSS variables.
- Do not include markdown fences or any text outside the JSON object."##;

fn theme_line(theme: Theme) -> String {
    format!("Product theme: {} mode.", theme)
}

fn design_system_block(design_system: &DesignSystem) -> String {
    let colors = design_system
        .colors
        .entries()
        .iter()
        .map(|(name, value)| format!("  {}: {}", name, value))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Design system:\n{}\n  radius: {}\n  font: {}",
        colors, design_system.radius, design_system.font
    )
}

pub fn project_prompt(instruction: &str, theme: Theme) -> String {
    format!("{}\n\nBrief:\n{}", theme_line(theme), instruction.trim())
}

pub fn screen_prompt(
    instruction: &str,
    theme: Theme,
    overview: &Overview,
    design_system: &DesignSystem,
    existing: &[Screen],
) -> String {
    let screens = existing
        .iter()
        .map(|s| format!("- {}: {}", s.name, s.purpose))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "App: {} ({})\n{}\n\n{}\n\nExisting screens:\n{}\n\nNew screen request:\n{}",
        overview.name,
        overview.description,
        theme_line(theme),
        design_system_block(design_system),
        screens,
        instruction.trim()
    )
}

pub fn modify_prompt(
    instruction: &str,
    theme: Theme,
    design_system: &DesignSystem,
    screen: &Screen,
) -> String {
    format!(
        "{}\n\n{}\n\nScreen \"{}\" ({}):\n{}\n\nRequested change:\n{}",
        theme_line(theme),
        design_system_block(design_system),
        screen.name,
        screen.purpose,
        screen.markup,
        instruction.trim()
    )
}
