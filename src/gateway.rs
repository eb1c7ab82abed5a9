//! Remote generation boundary: prompts go out, validated documents come back

use crate::error::{Error, Result};
use crate::models::{ChatMessage, ChatRole, Connection, DesignSystem, Overview, Screen, Theme};
use crate::prompts::{
    modify_prompt, project_prompt, screen_prompt, MODIFY_SYSTEM_PROMPT, PROJECT_SYSTEM_PROMPT,
    SCREEN_SYSTEM_PROMPT,
};
use crate::settings::{Provider, Settings};
use async_trait::async_trait;
use base64::Engine as _;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::Path;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENROUTER_REFERER: &str = "https://uix-agent.app";
const OPENROUTER_TITLE: &str = "UIX Agent";

/// Image attached to a prompt as visual reference
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceImage {
    pub mime_type: String,
    /// Base64 payload without the data-URL prefix
    pub data: String,
}

impl ReferenceImage {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read image {}: {}", path.display(), e),
            ))
        })?;
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        if mime.type_() != mime_guess::mime::IMAGE {
            return Err(Error::Config(format!(
                "{} is not an image ({})",
                path.display(),
                mime
            )));
        }
        Ok(Self::from_bytes(&bytes, mime.essence_str()))
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Full-project synthesis input
#[derive(Debug, Clone)]
pub struct ProjectRequest {
    pub instruction: String,
    pub theme: Theme,
    pub chat_history: Vec<ChatMessage>,
    pub images: Vec<ReferenceImage>,
}

/// New-screen synthesis input
#[derive(Debug, Clone)]
pub struct ScreenRequest {
    pub instruction: String,
    pub theme: Theme,
    pub chat_history: Vec<ChatMessage>,
    pub images: Vec<ReferenceImage>,
    pub overview: Overview,
    pub design_system: DesignSystem,
    pub existing_screens: Vec<Screen>,
}

/// Single-screen modification input
#[derive(Debug, Clone)]
pub struct ModifyRequest {
    pub instruction: String,
    pub theme: Theme,
    pub chat_history: Vec<ChatMessage>,
    pub images: Vec<ReferenceImage>,
    pub design_system: DesignSystem,
    pub screen: Screen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedScreen {
    pub id: String,
    pub name: String,
    pub purpose: String,
    pub markup: String,
}

/// Full-generation response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedProject {
    pub overview: Overview,
    pub design_system: DesignSystem,
    pub screens: Vec<GeneratedScreen>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<Vec<Connection>>,
    pub assistant_message: String,
}

/// New-screen and modify-screen response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenDraft {
    pub name: String,
    pub markup: String,
    pub summary: String,
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidResponse(format!("{} is empty", field)));
    }
    Ok(())
}

impl GeneratedProject {
    pub fn validate(&self) -> Result<()> {
        require(&self.overview.name, "overview.name")?;
        require(&self.assistant_message, "assistantMessage")?;
        if self.screens.is_empty() {
            return Err(Error::InvalidResponse("no screens returned".to_string()));
        }
        let mut ids = HashSet::new();
        for screen in &self.screens {
            require(&screen.id, "screens[].id")?;
            require(&screen.name, "screens[].name")?;
            require(&screen.markup, "screens[].markup")?;
            if !ids.insert(screen.id.as_str()) {
                return Err(Error::InvalidResponse(format!(
                    "duplicate screen id {}",
                    screen.id
                )));
            }
        }
        for (name, value) in self.design_system.colors.entries() {
            require(value, &format!("designSystem.colors.{}", name))?;
        }
        Ok(())
    }
}

impl ScreenDraft {
    pub fn validate(&self) -> Result<()> {
        require(&self.name, "name")?;
        require(&self.markup, "markup")?;
        require(&self.summary, "summary")
    }
}

/// The external LLM service, seen through the three calls the tool makes
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn generate_project(&self, request: &ProjectRequest) -> Result<GeneratedProject>;
    async fn generate_screen(&self, request: &ScreenRequest) -> Result<ScreenDraft>;
    async fn modify_screen(&self, request: &ModifyRequest) -> Result<ScreenDraft>;
}

/// Outermost `{...}` span of a model reply that wrapped its JSON in prose
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if start >= end {
        return None;
    }
    Some(&raw[start..=end])
}

/// Parses model output into `T`, tolerating fences or chatter around the JSON
pub fn parse_model_json<T: DeserializeOwned>(content: &str) -> Result<T> {
    serde_json::from_str::<T>(content).or_else(|_| {
        let maybe_json = extract_json_object(content).ok_or_else(|| {
            Error::InvalidResponse("response did not contain a JSON object".to_string())
        })?;
        serde_json::from_str::<T>(maybe_json)
            .map_err(|e| Error::InvalidResponse(format!("Failed to parse JSON: {}", e)))
    })
}

fn string_schema() -> Value {
    json!({ "type": "STRING" })
}

fn screen_draft_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": string_schema(),
            "markup": string_schema(),
            "summary": string_schema()
        },
        "required": ["name", "markup", "summary"]
    })
}

fn project_schema() -> Value {
    let colors = ["primary", "secondary", "background", "surface", "text", "accent", "muted", "border"];
    let color_props: serde_json::Map<String, Value> = colors
        .iter()
        .map(|c| (c.to_string(), string_schema()))
        .collect();
    json!({
        "type": "OBJECT",
        "properties": {
            "overview": {
                "type": "OBJECT",
                "properties": {
                    "name": string_schema(),
                    "description": string_schema(),
                    "targetUsers": { "type": "ARRAY", "items": string_schema() }
                },
                "required": ["name", "description", "targetUsers"]
            },
            "designSystem": {
                "type": "OBJECT",
                "properties": {
                    "colors": { "type": "OBJECT", "properties": color_props, "required": colors },
                    "radius": string_schema(),
                    "font": string_schema()
                },
                "required": ["colors", "radius", "font"]
            },
            "screens": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": string_schema(),
                        "name": string_schema(),
                        "purpose": string_schema(),
                        "markup": string_schema()
                    },
                    "required": ["id", "name", "purpose", "markup"]
                }
            },
            "assistantMessage": string_schema()
        },
        "required": ["overview", "designSystem", "screens", "assistantMessage"]
    })
}

/// One JSON-mode completion
struct CompletionCall<'a> {
    system: &'static str,
    prompt: String,
    history: &'a [ChatMessage],
    images: &'a [ReferenceImage],
    schema: Value,
}

/// Gateway speaking to Gemini or OpenRouter over HTTPS
pub struct HttpGateway {
    client: reqwest::Client,
    provider: Provider,
    model: String,
    api_key: String,
    base_url: String,
}

impl HttpGateway {
    pub fn new(provider: Provider, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = match provider {
            Provider::Gemini => GEMINI_BASE_URL,
            Provider::OpenRouter => OPENROUTER_BASE_URL,
        };
        Self {
            client: reqwest::Client::new(),
            provider,
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.to_string(),
        }
    }

    /// Points the gateway at a different host, e.g. a proxy or a local stub
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    async fn complete(&self, call: CompletionCall<'_>) -> Result<String> {
        info!(
            "[Gateway] {} request to {} ({} history turns, {} images)",
            self.provider,
            self.model,
            call.history.len(),
            call.images.len()
        );
        match self.provider {
            Provider::OpenRouter => self.complete_openrouter(call).await,
            Provider::Gemini => self.complete_gemini(call).await,
        }
    }

    async fn complete_openrouter(&self, call: CompletionCall<'_>) -> Result<String> {
        let mut messages = vec![json!({ "role": "system", "content": call.system })];
        for turn in call.history {
            let role = match turn.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            messages.push(json!({ "role": role, "content": turn.content }));
        }

        let mut content = vec![json!({ "type": "text", "text": call.prompt })];
        for image in call.images {
            content.push(json!({
                "type": "image_url",
                "image_url": { "url": image.data_url() }
            }));
        }
        messages.push(json!({ "role": "user", "content": content }));

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", OPENROUTER_REFERER)
            .header("X-Title", OPENROUTER_TITLE)
            .header("Content-Type", "application/json")
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "response_format": { "type": "json_object" }
            }))
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("API request failed: {}", e)))?;

        let response_json = Self::read_json(response).await?;
        response_json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidResponse("API returned empty content".to_string()))
    }

    async fn complete_gemini(&self, call: CompletionCall<'_>) -> Result<String> {
        let mut contents: Vec<Value> = call
            .history
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "model",
                };
                json!({ "role": role, "parts": [{ "text": turn.content }] })
            })
            .collect();

        let mut parts = vec![json!({ "text": call.prompt })];
        for image in call.images {
            parts.push(json!({
                "inlineData": { "mimeType": image.mime_type, "data": image.data }
            }));
        }
        contents.push(json!({ "role": "user", "parts": parts }));

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&json!({
                "systemInstruction": { "parts": [{ "text": call.system }] },
                "contents": contents,
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseSchema": call.schema
                }
            }))
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("API request failed: {}", e)))?;

        let response_json = Self::read_json(response).await?;
        response_json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidResponse("API returned empty content".to_string()))
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("[Gateway] provider returned {}", status);
            return Err(Error::Gateway(format!("API error ({}): {}", status, error_text)));
        }
        response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(format!("Failed to parse API response: {}", e)))
    }
}

#[async_trait]
impl GenerationGateway for HttpGateway {
    async fn generate_project(&self, request: &ProjectRequest) -> Result<GeneratedProject> {
        let content = self
            .complete(CompletionCall {
                system: PROJECT_SYSTEM_PROMPT,
                prompt: project_prompt(&request.instruction, request.theme),
                history: &request.chat_history,
                images: &request.images,
                schema: project_schema(),
            })
            .await?;
        let project: GeneratedProject = parse_model_json(&content)?;
        project.validate()?;
        Ok(project)
    }

    async fn generate_screen(&self, request: &ScreenRequest) -> Result<ScreenDraft> {
        let content = self
            .complete(CompletionCall {
                system: SCREEN_SYSTEM_PROMPT,
                prompt: screen_prompt(
                    &request.instruction,
                    request.theme,
                    &request.overview,
                    &request.design_system,
                    &request.existing_screens,
                ),
                history: &request.chat_history,
                images: &request.images,
                schema: screen_draft_schema(),
            })
            .await?;
        let draft: ScreenDraft = parse_model_json(&content)?;
        draft.validate()?;
        Ok(draft)
    }

    async fn modify_screen(&self, request: &ModifyRequest) -> Result<ScreenDraft> {
        let content = self
            .complete(CompletionCall {
                system: MODIFY_SYSTEM_PROMPT,
                prompt: modify_prompt(
                    &request.instruction,
                    request.theme,
                    &request.design_system,
                    &request.screen,
                ),
                history: &request.chat_history,
                images: &request.images,
                schema: screen_draft_schema(),
            })
            .await?;
        let draft: ScreenDraft = parse_model_json(&content)?;
        draft.validate()?;
        Ok(draft)
    }
}

/// Stand-in used when no API key is configured. Every call fails with the
/// configuration problem, so browsing and exporting keep working.
pub struct UnconfiguredGateway {
    reason: String,
}

impl UnconfiguredGateway {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> Result<T> {
        Err(Error::Config(self.reason.clone()))
    }
}

#[async_trait]
impl GenerationGateway for UnconfiguredGateway {
    async fn generate_project(&self, _request: &ProjectRequest) -> Result<GeneratedProject> {
        self.fail()
    }

    async fn generate_screen(&self, _request: &ScreenRequest) -> Result<ScreenDraft> {
        self.fail()
    }

    async fn modify_screen(&self, _request: &ModifyRequest) -> Result<ScreenDraft> {
        self.fail()
    }
}

/// Builds the gateway selected in `settings`
pub fn from_settings(settings: &Settings) -> Result<HttpGateway> {
    let api_key = settings.resolve_api_key()?;
    Ok(HttpGateway::new(settings.provider, settings.model.clone(), api_key))
}
