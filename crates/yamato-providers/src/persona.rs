//! The persona layer: prompt building, best-effort structured extraction of
//! the model's answer, sticker choice and fallback replies.

use rand::seq::SliceRandom;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use yamato_core::{
    config::{PersonaConfig, ProviderConfig},
    context::Context,
    error::YamatoError,
    retry::{retry_or_else, RetryPolicy},
    traits::Provider,
};

/// What the router asks the persona.
#[derive(Debug, Clone, Copy)]
pub struct PersonaRequest<'a> {
    pub text: &'a str,
    /// Name the sender introduced themselves with, if remembered.
    pub speaker_name: Option<&'a str>,
    /// Stickers present in the local cache.
    pub available_stickers: &'a [String],
    /// Sticker sent last; never chosen again if an alternative exists.
    pub exclude_sticker: Option<&'a str>,
}

/// An in-character reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaReply {
    pub reply: String,
    pub sticker: Option<String>,
    /// Whether this came from the local fallback list.
    pub fallback: bool,
}

/// Shape the model is asked to answer with.
#[derive(Debug, Deserialize)]
struct RawReply {
    #[serde(default)]
    reply: Option<String>,
    #[serde(default)]
    sticker: Option<String>,
}

/// The persona in front of an AI provider.
pub struct Persona {
    config: PersonaConfig,
    /// `None` when no API key is configured.
    provider: Option<Arc<dyn Provider>>,
    retry: RetryPolicy,
}

impl Persona {
    pub fn new(
        config: PersonaConfig,
        provider: Option<Arc<dyn Provider>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            config,
            provider,
            retry,
        }
    }

    /// Linear backoff per the provider settings (1s, 2s, ...).
    pub fn retry_policy(cfg: &ProviderConfig) -> RetryPolicy {
        RetryPolicy::linear(cfg.max_attempts, Duration::from_millis(cfg.retry_delay_ms))
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &PersonaConfig {
        &self.config
    }

    /// Whether replies come from the provider (as opposed to the fallback list).
    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Build the single user prompt sent to the provider.
    pub fn build_prompt(&self, req: &PersonaRequest<'_>) -> String {
        let name_line = req
            .speaker_name
            .map(|n| format!(" The user's name is {n}."))
            .unwrap_or_default();
        let stickers = if req.available_stickers.is_empty() {
            "none".to_string()
        } else {
            req.available_stickers.join(", ")
        };
        format!(
            "{persona}{name_line}\n\n\
             IMPORTANT: You must ALWAYS respond with valid JSON in this exact format:\n\
             {{\"reply\":\"your response text\",\"sticker\":\"sticker_name\"}}\n\n\
             Available stickers: {stickers}\n\
             Choose a sticker that's different from the last one used: {last}\n\n\
             User message: {text}",
            persona = self.config.prompt.trim(),
            last = req.exclude_sticker.unwrap_or("none"),
            text = req.text,
        )
    }

    /// Ask for a reply. Never fails: any provider or format problem resolves
    /// to a fallback reply.
    pub async fn ask(&self, req: &PersonaRequest<'_>) -> PersonaReply {
        let Some(provider) = &self.provider else {
            debug!("no AI provider configured, using fallback reply");
            return self.fallback(req);
        };

        let context = Context::new(&self.build_prompt(req));
        retry_or_else(
            &self.retry,
            "persona completion",
            |attempt| {
                let context = &context;
                async move {
                    let completion = provider.complete(context).await?;
                    debug!("ai raw response (attempt {attempt}): {}", completion.text);
                    extract_reply(&completion.text)
                }
            },
            |e: YamatoError| {
                warn!("ai error, using fallback reply: {e}");
                self.fallback(req)
            },
        )
        .await
        .with_sticker_repaired(req)
    }

    /// A random line from the fallback list plus a random sticker.
    pub fn fallback(&self, req: &PersonaRequest<'_>) -> PersonaReply {
        let mut rng = rand::thread_rng();
        let reply = self
            .config
            .fallback_replies
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| "Huh?".to_string());
        PersonaReply {
            reply,
            sticker: random_sticker(req.available_stickers, req.exclude_sticker),
            fallback: true,
        }
    }
}

impl PersonaReply {
    /// Force the sticker onto an available one that differs from the last.
    fn with_sticker_repaired(mut self, req: &PersonaRequest<'_>) -> Self {
        self.sticker = choose_sticker(
            self.sticker.as_deref(),
            req.available_stickers,
            req.exclude_sticker,
        );
        self
    }
}

/// Keep `candidate` if it is available and not the last one sent; otherwise
/// pick another. `None` only when no stickers exist.
pub fn choose_sticker(
    candidate: Option<&str>,
    available: &[String],
    last: Option<&str>,
) -> Option<String> {
    match candidate {
        Some(c) if Some(c) != last && available.iter().any(|s| s == c) => Some(c.to_string()),
        _ => random_sticker(available, last),
    }
}

fn random_sticker(available: &[String], last: Option<&str>) -> Option<String> {
    let fresh: Vec<&String> = available
        .iter()
        .filter(|s| Some(s.as_str()) != last)
        .collect();
    let mut rng = rand::thread_rng();
    fresh
        .choose(&mut rng)
        .map(|s| s.to_string())
        .or_else(|| available.first().cloned())
}

/// Best-effort extraction of `{"reply": ..., "sticker": ...}` from model output.
///
/// Strips code fences, takes the first balanced JSON object (preferring one
/// that mentions `"reply"`), and retries parsing after a lenient cleanup.
pub fn extract_reply(raw: &str) -> Result<PersonaReply, YamatoError> {
    let stripped = raw.replace("```json", "").replace("```", "");
    let objects = balanced_objects(stripped.trim());
    let candidate = objects
        .iter()
        .find(|o| o.contains("\"reply\""))
        .or_else(|| objects.first())
        .ok_or_else(|| YamatoError::Provider("no JSON object in AI response".into()))?;

    let parsed: RawReply = match serde_json::from_str(candidate) {
        Ok(p) => p,
        Err(_) => {
            let cleaned = lenient_cleanup(candidate);
            debug!("cleaned json: {cleaned}");
            serde_json::from_str(&cleaned)
                .map_err(|e| YamatoError::Provider(format!("malformed AI JSON: {e}")))?
        }
    };

    let reply = parsed
        .reply
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .ok_or_else(|| YamatoError::Provider("invalid or empty reply in AI JSON".into()))?;

    Ok(PersonaReply {
        reply,
        sticker: parsed.sticker.filter(|s| !s.trim().is_empty()),
        fallback: false,
    })
}

/// Top-level `{...}` spans, honoring string literals and escapes.
fn balanced_objects(text: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        objects.push(&text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    objects
}

/// Drop control characters, collapse whitespace and trailing commas.
fn lenient_cleanup(json: &str) -> String {
    let flattened: String = json
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let collapsed = flattened.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.replace(", }", "}").replace(",}", "}")
}
