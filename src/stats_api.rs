use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use serde_json::Value;

use crate::config::RunConfig;
use crate::error::{PipelineError, Result};

/// Fetch the per-player season stats collection for the configured
/// tournament and season. Any non-2xx status or malformed body is fatal
/// for the run; there is no retry here (an outer scheduler may re-run the
/// whole stage).
pub fn fetch_player_season_stats(client: &Client, config: &RunConfig) -> Result<Vec<Value>> {
    let resp = client
        .get(&config.api_url)
        .header(USER_AGENT, "footstats-etl/0.1")
        .query(&[
            ("uniqueTournamentID", config.tournament_id),
            ("seasonID", config.season_id),
        ])
        .send()
        .map_err(|err| PipelineError::Transport(format!("stats request failed: {err}")))?;

    let status = resp.status();
    let body = resp
        .text()
        .map_err(|err| PipelineError::Transport(format!("failed reading stats body: {err}")))?;
    if !status.is_success() {
        return Err(PipelineError::Transport(format!("http {status}: {body}")));
    }
    parse_stats_payload(&body)
}

/// Parse the raw response body into the JSON array of nested per-player
/// objects. Split out from the fetch so it can be exercised on fixtures.
pub fn parse_stats_payload(raw: &str) -> Result<Vec<Value>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(PipelineError::Transport("empty stats response".to_string()));
    }
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|err| PipelineError::Transport(format!("invalid stats json: {err}")))?;
    match value {
        Value::Array(rows) => Ok(rows),
        other => Err(PipelineError::Transport(format!(
            "stats payload is not an array (got {})",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::parse_stats_payload;
    use crate::error::PipelineError;

    #[test]
    fn parses_array_payload() {
        let rows = parse_stats_payload(r#"[{"seasonId": 1}, {"seasonId": 2}]"#)
            .expect("array should parse");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn rejects_empty_and_null_bodies() {
        assert!(matches!(
            parse_stats_payload(""),
            Err(PipelineError::Transport(_))
        ));
        assert!(matches!(
            parse_stats_payload("null"),
            Err(PipelineError::Transport(_))
        ));
    }

    #[test]
    fn rejects_non_array_payload() {
        let err = parse_stats_payload(r#"{"error": "nope"}"#).unwrap_err();
        assert!(err.to_string().contains("not an array"));
    }
}
