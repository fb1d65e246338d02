//! Language-model tiers: place-name extraction from raw post text and
//! coordinate estimation for a named place, over an OpenAI-compatible
//! chat API with deterministic decoding.
//!
//! Replies are parsed defensively. Some providers answer in `reasoning`
//! instead of `content`, some wrap the answer in prose; regex salvage
//! handles quoted names, `Answer:`/`Location:` suffixes, `in <Name>`
//! phrasing, and a bare `latitude,longitude` pair embedded anywhere.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use ai_client::{ChatClient, ChatRequest, ResponseMessage, WireMessage};
use signalpost_common::GeoPoint;

use crate::resolve::LocationModel;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const EXTRACT_MAX_TOKENS: u32 = 30;
const GEOCODE_MAX_TOKENS: u32 = 50;
/// A plausible place name never approaches this; longer replies are prose.
const MAX_PLACE_LEN: usize = 100;

const EXTRACT_SYSTEM: &str =
    "You are a location extraction assistant. Reply with the location name only, no explanation.";

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("valid regex"));
static ANSWER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:answer|location):\s*(.+)").expect("valid regex"));
static IN_PLACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bin\s+(?:the\s+)?([A-Z][A-Za-z'\- ]+?)(?:,|\.|$)").expect("valid regex")
});
static COORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(-?\d+\.?\d*)\s*,\s*(-?\d+\.?\d*)").expect("valid regex"));

/// Phrases that mark a reply as explanation rather than a bare answer.
const EXPLANATION_MARKERS: &[&str] = &["i need", "let me", "analyze", "extract", "the text"];

fn extract_prompt(text: &str) -> String {
    format!(
        "Extract the location from this news text.\n\n\
         Examples:\n\
         Text: \"In Berlin, protesters marched for Gaza\"\n\
         Answer: Gaza\n\n\
         Text: \"Israeli settlers attack village of Deir Sharaf near Nablus\"\n\
         Answer: Deir Sharaf\n\n\
         Text: \"Violence in the occupied West Bank continues\"\n\
         Answer: West Bank\n\n\
         Text: {text}\n\
         Answer:"
    )
}

fn geocode_prompt(place: &str) -> String {
    format!(
        "What are the precise latitude and longitude coordinates for this location?\n\
         If it is a neighborhood or area within a city, give coordinates for that\n\
         specific neighborhood.\n\
         Return ONLY in this exact format: latitude,longitude\n\
         For example: 31.5167,34.4667\n\n\
         Location: {place}\n\
         Coordinates:"
    )
}

/// Prefer `content`; fall back to `reasoning` when content is empty.
fn salvage_text(message: &ResponseMessage) -> Option<String> {
    message
        .content
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            message
                .reasoning
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .map(str::to_string)
}

/// Clean a place-name reply down to a single usable name, or nothing.
fn clean_place_reply(raw: &str) -> Option<String> {
    let mut reply = raw.trim().to_string();

    let lower = reply.to_lowercase();
    if EXPLANATION_MARKERS.iter().any(|m| lower.contains(m)) {
        if let Some(caps) = IN_PLACE_RE.captures(&reply) {
            reply = caps[1].trim().to_string();
        } else if let Some(caps) = QUOTED_RE.captures(&reply) {
            reply = caps[1].trim().to_string();
        } else if let Some(caps) = ANSWER_RE.captures(&reply) {
            reply = caps[1].trim().to_string();
        }
    }

    let reply = reply
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(['"', '\''])
        .trim();

    if reply.is_empty() || reply.eq_ignore_ascii_case("none") || reply.len() >= MAX_PLACE_LEN {
        return None;
    }
    Some(reply.to_string())
}

/// Parse a `latitude,longitude` reply; scan `reasoning` when `content`
/// carries nothing usable.
fn parse_coord_reply(message: &ResponseMessage) -> Option<GeoPoint> {
    let sources = [message.content.as_deref(), message.reasoning.as_deref()];
    for source in sources.into_iter().flatten() {
        if let Some(caps) = COORD_RE.captures(source) {
            let lat: f64 = caps[1].parse().ok()?;
            let lon: f64 = caps[2].parse().ok()?;
            return Some(GeoPoint::new(lat, lon));
        }
    }
    None
}

pub struct LlmLocator {
    client: ChatClient,
    model: String,
}

impl LlmLocator {
    pub fn new(api_key: &str, base_url: &str, model: impl Into<String>) -> Self {
        Self {
            client: ChatClient::with_timeout(api_key, base_url, REQUEST_TIMEOUT),
            model: model.into(),
        }
    }

    /// Send a request, retrying once on timeout. Any other failure is
    /// terminal for this call (the cascade treats it as tier failure).
    async fn chat_with_retry(&self, request: &ChatRequest) -> Result<ResponseMessage> {
        let mut retried = false;
        loop {
            match self.client.chat(request).await {
                Ok(response) => {
                    return response
                        .message()
                        .cloned()
                        .ok_or_else(|| anyhow::anyhow!("no message in response"));
                }
                Err(e) if e.is_timeout() && !retried => {
                    warn!(model = %self.model, "Model request timed out, retrying once");
                    retried = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl LocationModel for LlmLocator {
    async fn extract_place(&self, text: &str) -> Result<Option<String>> {
        let request = ChatRequest::new(&self.model)
            .message(WireMessage::system(EXTRACT_SYSTEM))
            .message(WireMessage::user(extract_prompt(text)))
            .temperature(0.0)
            .max_tokens(EXTRACT_MAX_TOKENS);

        let message = self.chat_with_retry(&request).await?;
        let place = salvage_text(&message).and_then(|raw| clean_place_reply(&raw));
        debug!(place = ?place, "Model place extraction");
        Ok(place)
    }

    async fn estimate_coords(&self, place: &str) -> Result<Option<GeoPoint>> {
        let request = ChatRequest::new(&self.model)
            .message(WireMessage::user(geocode_prompt(place)))
            .temperature(0.0)
            .max_tokens(GEOCODE_MAX_TOKENS);

        let message = self.chat_with_retry(&request).await?;
        let point = parse_coord_reply(&message);
        debug!(place, point = ?point, "Model coordinate estimate");
        Ok(point)
    }
}
