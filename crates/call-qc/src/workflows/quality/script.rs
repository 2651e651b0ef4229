use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Transcripts below this length carry no signal worth a model call.
pub(crate) const MIN_TRANSCRIPT_CHARS: usize = 50;

/// System instruction describing the 14-item sales-script checklist. The
/// model judges an item satisfied if it occurs in any call of the provided
/// history, not only the latest one.
const CHECKLIST_INSTRUCTION: &str = "\
Ты — контролёр качества отдела продаж. Тебе передана история звонков по \
одной сделке (несколько разговоров, в хронологическом порядке). Оцени \
работу менеджера по чек-листу. Пункт считается выполненным, если он \
выполнен хотя бы в одном из звонков истории.

Верни строго один JSON-объект без пояснений, со следующими полями \
(true/false или null, если оценить невозможно): greeting, \
stated_call_purpose, company_info_discovery, deadline_discovery, \
spec_confirmation, objection_handling_price, objection_handling_terms, \
advantage_quality, advantage_logistics, advantage_service, cross_sell, \
next_step_agreement, dialogue_control, speech_quality; числовое поле \
script_score_pct (0-100) и короткий текстовый комментарий \
evaluator_comment.";

const CHECKLIST_FIELDS: [&str; 14] = [
    "greeting",
    "stated_call_purpose",
    "company_info_discovery",
    "deadline_discovery",
    "spec_confirmation",
    "objection_handling_price",
    "objection_handling_terms",
    "advantage_quality",
    "advantage_logistics",
    "advantage_service",
    "cross_sell",
    "next_step_agreement",
    "dialogue_control",
    "speech_quality",
];

/// AI-derived checklist verdict. Every field is nullable: an absent or
/// malformed answer is "not evaluated", never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptBundle {
    pub greeting: Option<bool>,
    pub stated_call_purpose: Option<bool>,
    pub company_info_discovery: Option<bool>,
    pub deadline_discovery: Option<bool>,
    pub spec_confirmation: Option<bool>,
    pub objection_handling_price: Option<bool>,
    pub objection_handling_terms: Option<bool>,
    pub advantage_quality: Option<bool>,
    pub advantage_logistics: Option<bool>,
    pub advantage_service: Option<bool>,
    pub cross_sell: Option<bool>,
    pub next_step_agreement: Option<bool>,
    pub dialogue_control: Option<bool>,
    pub speech_quality: Option<bool>,
    pub script_score_pct: Option<u32>,
    pub evaluator_comment: Option<String>,
}

impl ScriptBundle {
    /// The bundle returned for short transcripts and failed model calls.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Errors surfaced by the external language-model collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ScriptModelError {
    #[error("model endpoint not configured")]
    Disabled,
    #[error("model request failed: {0}")]
    Transport(String),
    #[error("model response malformed: {0}")]
    Malformed(String),
}

/// Seam for the LLM collaborator: one completion given a system
/// instruction and the user payload.
#[async_trait]
pub trait ScriptModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ScriptModelError>;
}

/// Evaluates concatenated call transcripts against the checklist. Model
/// failures degrade to the all-null bundle so scoring always completes.
pub struct ScriptEvaluator {
    model: Box<dyn ScriptModel>,
}

impl ScriptEvaluator {
    pub fn new(model: Box<dyn ScriptModel>) -> Self {
        Self { model }
    }

    pub async fn evaluate(&self, transcript: &str) -> ScriptBundle {
        if transcript.trim().chars().count() < MIN_TRANSCRIPT_CHARS {
            return ScriptBundle::empty();
        }

        match self.model.complete(CHECKLIST_INSTRUCTION, transcript).await {
            Ok(raw) => parse_verdict(&raw),
            Err(error) => {
                warn!(%error, "script evaluation degraded to empty verdict");
                ScriptBundle::empty()
            }
        }
    }
}

/// Defensive parse of the model's JSON verdict: any absent or mistyped
/// field collapses to `None`, the percentage is clamped into [0, 100].
pub(crate) fn parse_verdict(raw: &str) -> ScriptBundle {
    let stripped = strip_code_fence(raw);
    let value: Value = match serde_json::from_str(stripped) {
        Ok(value) => value,
        Err(error) => {
            warn!(%error, "unparseable script verdict");
            return ScriptBundle::empty();
        }
    };

    let mut bundle = ScriptBundle::empty();
    let flags: Vec<Option<bool>> = CHECKLIST_FIELDS
        .iter()
        .map(|field| value.get(field).and_then(Value::as_bool))
        .collect();
    [
        &mut bundle.greeting,
        &mut bundle.stated_call_purpose,
        &mut bundle.company_info_discovery,
        &mut bundle.deadline_discovery,
        &mut bundle.spec_confirmation,
        &mut bundle.objection_handling_price,
        &mut bundle.objection_handling_terms,
        &mut bundle.advantage_quality,
        &mut bundle.advantage_logistics,
        &mut bundle.advantage_service,
        &mut bundle.cross_sell,
        &mut bundle.next_step_agreement,
        &mut bundle.dialogue_control,
        &mut bundle.speech_quality,
    ]
    .into_iter()
    .zip(flags)
    .for_each(|(slot, flag)| *slot = flag);

    bundle.script_score_pct = value
        .get("script_score_pct")
        .and_then(Value::as_f64)
        .map(|pct| pct.clamp(0.0, 100.0).round() as u32);
    bundle.evaluator_comment = value
        .get("evaluator_comment")
        .and_then(Value::as_str)
        .map(|comment| comment.trim().to_string())
        .filter(|comment| !comment.is_empty());

    bundle
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|body| body.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// OpenAI-style chat-completions client backing the production evaluator.
pub struct HttpScriptModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl HttpScriptModel {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ScriptModel for HttpScriptModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ScriptModelError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": 0,
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|error| ScriptModelError::Transport(error.to_string()))?
            .error_for_status()
            .map_err(|error| ScriptModelError::Transport(error.to_string()))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|error| ScriptModelError::Malformed(error.to_string()))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ScriptModelError::Malformed("missing completion content".to_string()))
    }
}

/// Stand-in used when no model endpoint is configured; every call degrades
/// to the empty bundle through the evaluator's error path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledScriptModel;

#[async_trait]
impl ScriptModel for DisabledScriptModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ScriptModelError> {
        Err(ScriptModelError::Disabled)
    }
}
