//! Structured safety analysis for a perimeter assessment.
//!
//! The model receives the numeric assessment as context and must answer
//! with one JSON object:
//!
//! ```json
//! {
//!   "summary": "...",
//!   "riskFactors": ["..."],
//!   "safetyTips": ["..."],
//!   "emergencyContacts": [{"name": "...", "number": "..."}]
//! }
//! ```
//!
//! Anything else is rejected with [`AiError::InvalidResponse`] rather
//! than shown to the user.

use std::fmt::Write as _;
use std::time::Duration;

use crime_risk_cache::ResponseCache;
use crime_risk_risk_models::{IncidentFilter, RiskAssessment};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::AiError;
use crate::providers::{LlmProvider, Message};

/// Breakdown entries that feed the cache key.
const FINGERPRINT_TOP_N: usize = 3;

const SYSTEM_PROMPT: &str = "You are a public safety assistant for residents of a Philippine \
municipality. You explain local crime risk plainly and give practical, non-alarming advice. \
Only use the statistics you are given; do not invent incidents, places, or numbers. \
Answer with a single JSON object and nothing else.";

/// A local emergency hotline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    /// Who answers.
    pub name: String,
    /// How to reach them.
    pub number: String,
}

/// Validated model answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyAnalysis {
    /// Two to four sentence overview.
    pub summary: String,
    /// What drives the risk here.
    #[serde(default)]
    pub risk_factors: Vec<String>,
    /// Actionable advice.
    pub safety_tips: Vec<String>,
    /// Hotlines worth keeping at hand.
    #[serde(default)]
    pub emergency_contacts: Vec<EmergencyContact>,
}

/// Request-level inputs beyond the assessment itself.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    /// Filter the assessment was computed with.
    pub filter: &'a IncidentFilter,
    /// Human-readable place name, if the caller knows one.
    pub location_name: Option<&'a str>,
    /// How long a fresh answer stays cached.
    pub cache_ttl: Duration,
}

/// Returns a safety analysis for `assessment`, from `cache` when possible.
///
/// # Errors
///
/// * [`AiError::InvalidResponse`] if the model's answer is not the
///   requested JSON shape
/// * any provider error from the completion call
pub async fn generate_safety_analysis(
    provider: &dyn LlmProvider,
    cache: &dyn ResponseCache,
    assessment: &RiskAssessment,
    context: &AnalysisContext<'_>,
) -> Result<SafetyAnalysis, AiError> {
    let key = cache_key(assessment, context.filter);

    if let Some(cached) = cache.get(&key) {
        match serde_json::from_value::<SafetyAnalysis>(cached) {
            Ok(analysis) => {
                log::debug!("Safety analysis cache hit for {key}");
                return Ok(analysis);
            }
            Err(e) => log::warn!("Ignoring unreadable cached analysis for {key}: {e}"),
        }
    }

    log::debug!("Safety analysis cache miss for {key}; asking {}", provider.name());

    let prompt = build_prompt(assessment, context);
    let reply = provider
        .chat(SYSTEM_PROMPT, &[Message::user(prompt)], true)
        .await?;

    let analysis = parse_analysis(&reply)?;
    cache.set(key, serde_json::to_value(&analysis)?, context.cache_ttl);

    Ok(analysis)
}

/// Cache key for an assessment: coordinates at 3 decimals, the filter
/// signature, and the top of the crime type breakdown, hashed with SHA-256.
#[must_use]
pub fn cache_key(assessment: &RiskAssessment, filter: &IncidentFilter) -> String {
    let mut material = format!(
        "safety-analysis|{:.3},{:.3}|{}|{}|{}",
        assessment.center.lat,
        assessment.center.lng,
        filter.signature(),
        assessment.risk_level,
        assessment.crime_count,
    );
    for entry in assessment.crime_type_breakdown.iter().take(FINGERPRINT_TOP_N) {
        let _ = write!(material, "|{}:{}", entry.crime_type_id, entry.count);
    }

    hex::encode(Sha256::digest(material.as_bytes()))
}

/// Renders the user prompt for `assessment`.
#[must_use]
pub fn build_prompt(assessment: &RiskAssessment, context: &AnalysisContext<'_>) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "Location: {}",
        context.location_name.map_or_else(
            || format!("{:.5}, {:.5}", assessment.center.lat, assessment.center.lng),
            |name| format!(
                "{name} ({:.5}, {:.5})",
                assessment.center.lat, assessment.center.lng
            ),
        )
    );
    let _ = writeln!(prompt, "Radius: {:.0} meters", assessment.radius_meters);
    let _ = writeln!(prompt, "Risk level: {}", assessment.risk_level);
    let _ = writeln!(prompt, "Recorded incidents: {}", assessment.crime_count);

    if assessment.crime_type_breakdown.is_empty() {
        let _ = writeln!(prompt, "Crime types: none recorded");
    } else {
        let _ = writeln!(prompt, "Crime types:");
        for entry in &assessment.crime_type_breakdown {
            let _ = writeln!(
                prompt,
                "- {}: {} ({:.1}%)",
                entry.crime_type, entry.count, entry.percentage
            );
        }
    }

    if !context.filter.is_empty() {
        let _ = writeln!(prompt, "Filters applied: {}", context.filter.signature());
    }

    prompt.push_str(
        "\nRespond with JSON of exactly this shape:\n\
         {\"summary\": string, \"riskFactors\": [string], \"safetyTips\": [string], \
         \"emergencyContacts\": [{\"name\": string, \"number\": string}]}\n\
         Give 3 to 5 safety tips. Emergency contacts should be Philippine national \
         hotlines (such as 911) unless local ones are given above.",
    );

    prompt
}

/// Parses and validates a model reply.
///
/// Tolerates Markdown code fences and text around the object.
///
/// # Errors
///
/// Returns [`AiError::InvalidResponse`] if the reply is not valid JSON of
/// the expected shape or has an empty `summary` or no `safetyTips`.
pub fn parse_analysis(reply: &str) -> Result<SafetyAnalysis, AiError> {
    let json = extract_json_object(reply).ok_or_else(|| AiError::InvalidResponse {
        message: "reply contains no JSON object".to_string(),
    })?;

    let mut analysis: SafetyAnalysis =
        serde_json::from_str(json).map_err(|e| AiError::InvalidResponse {
            message: format!("reply is not the expected JSON: {e}"),
        })?;

    analysis.summary = analysis.summary.trim().to_string();
    clean(&mut analysis.risk_factors);
    clean(&mut analysis.safety_tips);
    analysis
        .emergency_contacts
        .retain(|c| !c.name.trim().is_empty() && !c.number.trim().is_empty());

    if analysis.summary.is_empty() {
        return Err(AiError::InvalidResponse {
            message: "summary is empty".to_string(),
        });
    }
    if analysis.safety_tips.is_empty() {
        return Err(AiError::InvalidResponse {
            message: "no safety tips".to_string(),
        });
    }

    Ok(analysis)
}

fn clean(items: &mut Vec<String>) {
    for item in items.iter_mut() {
        *item = item.trim().to_string();
    }
    items.retain(|item| !item.is_empty());
}

fn extract_json_object(reply: &str) -> Option<&str> {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim_start_matches("json").trim_start_matches("JSON");
        text = text.strip_suffix("```").unwrap_or(text).trim();
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
