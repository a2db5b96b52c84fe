//! AI generation: one request type dispatched by `type`, tracked as an AI task.
//! All provider calls go through `Generator`; `LlmClient` is the production one.

pub mod handlers;
pub mod prompts;

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::db::Store;
use crate::errors::AppError;
use crate::llm_client::{LlmClient, LlmError};
use crate::models::ai_task::AiTask;
use crate::models::status::AiTaskType;
use crate::repository::{ai_tasks, templates};

const DEFAULT_TITLE_COUNT: usize = 5;
const DEFAULT_KEYWORD_COUNT: usize = 8;
const MAX_COUNT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerateKind {
    Title,
    Summary,
    Content,
    Keywords,
    Cover,
}

impl GenerateKind {
    /// Keyword extraction is recorded as a summary task.
    pub fn task_type(self) -> AiTaskType {
        match self {
            GenerateKind::Title => AiTaskType::Title,
            GenerateKind::Summary | GenerateKind::Keywords => AiTaskType::Summary,
            GenerateKind::Content => AiTaskType::Content,
            GenerateKind::Cover => AiTaskType::Cover,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GenerateKind::Title => "title",
            GenerateKind::Summary => "summary",
            GenerateKind::Content => "content",
            GenerateKind::Keywords => "keywords",
            GenerateKind::Cover => "cover",
        }
    }
}

impl FromStr for GenerateKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(GenerateKind::Title),
            "summary" => Ok(GenerateKind::Summary),
            "content" => Ok(GenerateKind::Content),
            "keywords" => Ok(GenerateKind::Keywords),
            "cover" => Ok(GenerateKind::Cover),
            other => Err(AppError::Validation(format!(
                "unknown generation type '{other}', expected one of title, summary, content, keywords, cover"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    #[serde(rename = "type")]
    pub kind: GenerateKind,
    pub result: Value,
    pub task: AiTask,
}

/// Text and image generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    fn supports(&self, kind: GenerateKind) -> bool;
    async fn text(&self, prompt: &str, system: &str) -> Result<String, LlmError>;
    async fn image(&self, prompt: &str) -> Result<String, LlmError>;
}

#[async_trait]
impl Generator for LlmClient {
    fn supports(&self, kind: GenerateKind) -> bool {
        match kind {
            GenerateKind::Cover => self.can_generate_images(),
            _ => self.provider().is_some(),
        }
    }

    async fn text(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        self.call(prompt, system).await
    }

    async fn image(&self, prompt: &str) -> Result<String, LlmError> {
        self.generate_image(prompt).await
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// What the prompt is about: template output first, then topic, keyword, title.
fn subject(request: &GenerateRequest, rendered: Option<&str>) -> Option<String> {
    rendered
        .map(str::to_string)
        .or_else(|| non_blank(&request.topic).map(str::to_string))
        .or_else(|| non_blank(&request.keyword).map(str::to_string))
        .or_else(|| non_blank(&request.title).map(str::to_string))
}

fn require<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str, AppError> {
    value.ok_or_else(|| AppError::Validation(message.to_string()))
}

fn parse_list(text: &str) -> Result<Vec<String>, LlmError> {
    let items: Vec<String> =
        serde_json::from_str(crate::llm_client::strip_json_fences(text))?;
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Runs one generation request end to end.
///
/// Input is validated and the template rendered before anything is written.
/// The task then moves pending → processing → completed, or → failed with the
/// provider error recorded, in which case the error is also returned.
pub async fn generate(
    store: &dyn Store,
    generator: &dyn Generator,
    request: GenerateRequest,
) -> Result<GenerateResponse, AppError> {
    let kind: GenerateKind = request.kind.parse()?;
    if !generator.supports(kind) {
        return Err(LlmError::NotConfigured.into());
    }

    let template = match non_blank(&request.template_id) {
        Some(raw) => Some(templates::get(store, raw).await?),
        None => None,
    };
    if let Some(template) = &template {
        let missing: Vec<String> = template
            .variables()
            .into_iter()
            .filter(|v| !request.variables.contains_key(v))
            .collect();
        if !missing.is_empty() {
            debug!(template_id = %template.id, ?missing, "Template variables left unfilled");
        }
    }
    let rendered = template.as_ref().map(|t| t.render(&request.variables));
    let subject = subject(&request, rendered.as_deref());
    let count = request.count.unwrap_or(match kind {
        GenerateKind::Keywords => DEFAULT_KEYWORD_COUNT,
        _ => DEFAULT_TITLE_COUNT,
    });
    if count == 0 || count > MAX_COUNT {
        return Err(AppError::Validation(format!(
            "count must be between 1 and {MAX_COUNT}"
        )));
    }

    let prompt = match kind {
        GenerateKind::Title => prompts::titles(
            require(subject.as_deref(), "topic, keyword or template_id is required")?,
            count,
        ),
        GenerateKind::Summary => prompts::summary(
            non_blank(&request.title),
            require(non_blank(&request.content), "content is required")?,
        ),
        GenerateKind::Content => prompts::article(
            require(subject.as_deref(), "topic, keyword, title or template_id is required")?,
            &request.keywords,
        ),
        GenerateKind::Keywords => prompts::keywords(
            require(non_blank(&request.content), "content is required")?,
            count,
        ),
        GenerateKind::Cover => prompts::cover(require(
            subject.as_deref(),
            "title, topic or keyword is required",
        )?),
    };

    let name = match &subject {
        Some(s) => format!("{} generation: {}", kind.as_str(), truncate(s, 60)),
        None => format!("{} generation", kind.as_str()),
    };
    let input_data = serde_json::to_value(&request).map_err(anyhow::Error::from)?;
    let task = ai_tasks::create(store, &name, kind.task_type(), input_data).await?;
    let task = ai_tasks::start(store, task.id).await?;

    let outcome = match kind {
        GenerateKind::Title => generator
            .text(&prompt, prompts::JSON_ONLY_SYSTEM)
            .await
            .and_then(|text| parse_list(&text))
            .map(|titles| json!({ "titles": titles })),
        GenerateKind::Keywords => generator
            .text(&prompt, prompts::JSON_ONLY_SYSTEM)
            .await
            .and_then(|text| parse_list(&text))
            .map(|keywords| json!({ "keywords": keywords })),
        GenerateKind::Summary => generator
            .text(&prompt, prompts::NEWSROOM_SYSTEM)
            .await
            .map(|text| json!({ "summary": text.trim() })),
        GenerateKind::Content => generator
            .text(&prompt, prompts::NEWSROOM_SYSTEM)
            .await
            .map(|text| json!({ "content": text.trim() })),
        GenerateKind::Cover => generator
            .image(&prompt)
            .await
            .map(|url| json!({ "cover_image": url })),
    };

    match outcome {
        Ok(result) => {
            let task = ai_tasks::complete(store, task.id, result.clone()).await?;
            if let Some(template) = &template {
                // The template may have been deleted mid-generation; the result still stands.
                if let Err(e) = templates::increment_usage(store, &template.id.to_string()).await {
                    warn!(template_id = %template.id, "Template usage not recorded: {e}");
                }
            }
            Ok(GenerateResponse { kind, result, task })
        }
        Err(e) => {
            ai_tasks::fail(store, task.id, &e.to_string()).await?;
            Err(e.into())
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::status::AiTaskStatus;
    use crate::models::template::CreateTemplate;
    use crate::repository::RepoError;
    use std::sync::Mutex;

    /// Replays a canned reply and records prompts.
    struct ScriptedGenerator {
        reply: Result<String, u16>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                reply: Err(status),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn respond(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(|status| LlmError::Api {
                status,
                message: "upstream exploded".into(),
            })
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        fn supports(&self, _kind: GenerateKind) -> bool {
            true
        }

        async fn text(&self, prompt: &str, _system: &str) -> Result<String, LlmError> {
            self.respond(prompt)
        }

        async fn image(&self, prompt: &str) -> Result<String, LlmError> {
            self.respond(prompt)
        }
    }

    fn request(kind: &str) -> GenerateRequest {
        GenerateRequest {
            kind: kind.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_titles_complete_task() {
        let store = MemoryStore::new();
        let generator = ScriptedGenerator::ok("```json\n[\"BTC breaks 70k\", \" \"]\n```");
        let response = generate(
            &store,
            &generator,
            GenerateRequest {
                topic: Some("Bitcoin rally".into()),
                ..request("title")
            },
        )
        .await
        .unwrap();

        assert_eq!(response.result, json!({ "titles": ["BTC breaks 70k"] }));
        assert_eq!(response.task.status, AiTaskStatus::Completed);
        assert_eq!(response.task.task_type, AiTaskType::Title);
        assert_eq!(response.task.input_data["topic"], "Bitcoin rally");
    }

    #[tokio::test]
    async fn test_provider_failure_marks_task_failed() {
        let store = MemoryStore::new();
        let generator = ScriptedGenerator::failing(500);
        let err = generate(
            &store,
            &generator,
            GenerateRequest {
                content: Some("<p>body</p>".into()),
                ..request("summary")
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Llm(LlmError::Api { status: 500, .. })));

        let (tasks, _) = store
            .list_ai_tasks(&Default::default())
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, AiTaskStatus::Failed);
        assert!(tasks[0].result_data.as_ref().unwrap()["error"]
            .as_str()
            .unwrap()
            .contains("upstream exploded"));
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_write() {
        let store = MemoryStore::new();
        let generator = ScriptedGenerator::ok("unused");

        let err = generate(&store, &generator, request("summary")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = generate(&store, &generator, request("video")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let (tasks, total) = store.list_ai_tasks(&Default::default()).await.unwrap();
        assert!(tasks.is_empty());
        assert_eq!(total, 0);
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_template_is_rendered_and_counted() {
        let store = MemoryStore::new();
        let template = templates::create(
            &store,
            CreateTemplate {
                name: "Market brief".into(),
                content: "Daily brief on {coin} at {price}".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let generator = ScriptedGenerator::ok("<p>Generated</p>");

        let response = generate(
            &store,
            &generator,
            GenerateRequest {
                template_id: Some(template.id.to_string()),
                variables: HashMap::from([("coin".to_string(), "ETH".to_string())]),
                ..request("content")
            },
        )
        .await
        .unwrap();

        assert_eq!(response.result["content"], "<p>Generated</p>");
        let prompt = generator.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("Daily brief on ETH at {price}"));
        let template = templates::get(&store, &template.id.to_string()).await.unwrap();
        assert_eq!(template.usage_count, 1);
    }

    #[tokio::test]
    async fn test_failed_generation_does_not_count_template_use() {
        let store = MemoryStore::new();
        let template = templates::create(
            &store,
            CreateTemplate {
                name: "Market brief".into(),
                content: "Daily brief on {coin}".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let generator = ScriptedGenerator::failing(503);

        let err = generate(
            &store,
            &generator,
            GenerateRequest {
                template_id: Some(template.id.to_string()),
                variables: HashMap::from([("coin".to_string(), "SOL".to_string())]),
                ..request("content")
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Llm(LlmError::Api { status: 503, .. })));

        let template = templates::get(&store, &template.id.to_string()).await.unwrap();
        assert_eq!(template.usage_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_template_is_not_found() {
        let store = MemoryStore::new();
        let generator = ScriptedGenerator::ok("x");
        let err = generate(
            &store,
            &generator,
            GenerateRequest {
                template_id: Some(uuid::Uuid::new_v4().to_string()),
                ..request("content")
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Repo(RepoError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_cover_returns_image_url() {
        let store = MemoryStore::new();
        let generator = ScriptedGenerator::ok("https://images.example/cover.png");
        let response = generate(
            &store,
            &generator,
            GenerateRequest {
                title: Some("ETF approved".into()),
                ..request("cover")
            },
        )
        .await
        .unwrap();
        assert_eq!(response.result["cover_image"], "https://images.example/cover.png");
        assert_eq!(response.task.task_type, AiTaskType::Cover);
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate("比特币突破新高", 3), "比特币…");
        assert_eq!(truncate("short", 10), "short");
    }
}
