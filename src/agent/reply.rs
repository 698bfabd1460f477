//! Reading the model's reply.
//!
//! The model answers in prose, or with a single JSON object (fenced or bare)
//! asking for a chart, an aggregate, or declaring the question unanswerable.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChartSpec {
    pub kind: String,
    pub x: String,
    #[serde(default)]
    pub y: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AggregateSpec {
    pub op: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Text(String),
    Chart(ChartSpec),
    Aggregate(AggregateSpec),
    Unanswerable(String),
}

#[derive(Deserialize)]
struct Envelope {
    chart: Option<ChartSpec>,
    aggregate: Option<AggregateSpec>,
    error: Option<String>,
}

pub fn parse(reply: &str) -> Directive {
    let reply = reply.trim();
    let envelope = json_candidate(reply).and_then(|json| serde_json::from_str::<Envelope>(json).ok());
    match envelope {
        Some(Envelope { chart: Some(chart), .. }) => Directive::Chart(chart),
        Some(Envelope {
            aggregate: Some(aggregate),
            ..
        }) => Directive::Aggregate(aggregate),
        Some(Envelope { error: Some(reason), .. }) => Directive::Unanswerable(reason),
        _ => Directive::Text(reply.to_string()),
    }
}

fn json_candidate(reply: &str) -> Option<&str> {
    if let Some(start) = reply.find("```") {
        let after_fence = &reply[start + 3..];
        let body_start = after_fence.find('\n')?;
        let lang = after_fence[..body_start].trim();
        if lang.is_empty() || lang.eq_ignore_ascii_case("json") {
            let body = &after_fence[body_start + 1..];
            let end = body.find("```")?;
            return Some(body[..end].trim());
        }
        return None;
    }
    (reply.starts_with('{') && reply.ends_with('}')).then_some(reply)
}
