use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::server::response::ApiError;
use crate::server::validation::parse_timestamp;
use crate::types::{NewBuild, NewBuildStep};

/// Fixed build fields; everything else in the payload rides along as
/// extra-info and round-trips on read at the level it was posted.
const BUILD_FIELDS: &[&str] = &["success", "started", "finished", "client", "results", "tags"];
const CLIENT_FIELDS: &[&str] = &["host", "arch", "user"];
const STEP_FIELDS: &[&str] = &["success", "name", "started", "finished", "output", "errout"];

/// A build report parsed out of a POST body. Validation happens up front so
/// nothing is persisted (builds, steps, or candidate accounts) for a payload
/// that is going to fail.
#[derive(Debug)]
pub struct BuildReport {
    pub success: bool,
    pub started: DateTime<FixedOffset>,
    pub finished: DateTime<FixedOffset>,
    pub host: String,
    pub arch: String,
    pub tags: Vec<String>,
    pub steps: Vec<NewBuildStep>,
    pub extra_info: Map<String, Value>,
    pub client_info: Map<String, Value>,
}

impl BuildReport {
    pub fn from_value(value: &Value) -> Result<Self, ApiError> {
        let report = value
            .as_object()
            .ok_or_else(|| ApiError::bad_request("build report must be a JSON object"))?;

        let success = require_bool(report, "success")?;
        let started = require_timestamp(report, "started")?;
        let finished = require_timestamp(report, "finished")?;

        let client = report
            .get("client")
            .and_then(Value::as_object)
            .ok_or_else(|| ApiError::bad_request("client must be an object"))?;
        let host = require_str(client, "client", "host")?;
        let arch = require_str(client, "client", "arch")?;

        let tags = match report.get("tags") {
            None => Vec::new(),
            Some(value) => value
                .as_array()
                .and_then(|tags| {
                    tags.iter()
                        .map(|t| t.as_str().map(String::from))
                        .collect::<Option<Vec<_>>>()
                })
                .ok_or_else(|| ApiError::bad_request("tags must be an array of strings"))?,
        };

        let steps = match report.get("results") {
            None => Vec::new(),
            Some(value) => value
                .as_array()
                .ok_or_else(|| ApiError::bad_request("results must be an array"))?
                .iter()
                .enumerate()
                .map(|(i, entry)| parse_step(i, entry))
                .collect::<Result<Vec<_>, _>>()?,
        };

        // Unknown keys ride along next to where they were posted: top-level
        // extras in extra_info, client extras in client_info.
        let mut extra_info = Map::new();
        for (key, value) in report {
            if !BUILD_FIELDS.contains(&key.as_str()) {
                extra_info.insert(key.clone(), value.clone());
            }
        }
        let mut client_info = Map::new();
        for (key, value) in client {
            if !CLIENT_FIELDS.contains(&key.as_str()) {
                client_info.insert(key.clone(), value.clone());
            }
        }

        Ok(BuildReport {
            success,
            started,
            finished,
            host,
            arch,
            tags,
            steps,
            extra_info,
            client_info,
        })
    }

    #[must_use]
    pub fn into_new_build(self, project_id: &str, user_id: Option<String>) -> NewBuild {
        NewBuild {
            project_id: project_id.to_string(),
            success: self.success,
            started: self.started,
            finished: self.finished,
            host: self.host,
            arch: self.arch,
            user_id,
            extra_info: self.extra_info,
            client_info: self.client_info,
            steps: self.steps,
            tags: self.tags,
        }
    }
}

fn parse_step(index: usize, entry: &Value) -> Result<NewBuildStep, ApiError> {
    let step = entry
        .as_object()
        .ok_or_else(|| ApiError::bad_request(format!("results[{index}] must be an object")))?;
    let context = format!("results[{index}]");

    let mut extra_info = Map::new();
    for (key, value) in step {
        if !STEP_FIELDS.contains(&key.as_str()) {
            extra_info.insert(key.clone(), value.clone());
        }
    }

    Ok(NewBuildStep {
        success: require_bool_in(step, &context, "success")?,
        started: require_timestamp_in(step, &context, "started")?,
        finished: require_timestamp_in(step, &context, "finished")?,
        name: require_str(step, &context, "name")?,
        output: optional_str(step, "output"),
        errout: optional_str(step, "errout"),
        extra_info,
    })
}

fn require_bool(map: &Map<String, Value>, field: &str) -> Result<bool, ApiError> {
    map.get(field)
        .and_then(Value::as_bool)
        .ok_or_else(|| ApiError::bad_request(format!("{field} is required and must be a boolean")))
}

fn require_bool_in(map: &Map<String, Value>, context: &str, field: &str) -> Result<bool, ApiError> {
    map.get(field).and_then(Value::as_bool).ok_or_else(|| {
        ApiError::bad_request(format!("{context}.{field} is required and must be a boolean"))
    })
}

fn require_str(map: &Map<String, Value>, context: &str, field: &str) -> Result<String, ApiError> {
    map.get(field)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| {
            ApiError::bad_request(format!("{context}.{field} is required and must be a string"))
        })
}

fn optional_str(map: &Map<String, Value>, field: &str) -> String {
    map.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn require_timestamp(
    map: &Map<String, Value>,
    field: &str,
) -> Result<DateTime<FixedOffset>, ApiError> {
    let raw = map
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request(format!("{field} is required and must be a string")))?;
    parse_timestamp(raw)
        .ok_or_else(|| ApiError::bad_request(format!("{field}: unparsable timestamp '{raw}'")))
}

fn require_timestamp_in(
    map: &Map<String, Value>,
    context: &str,
    field: &str,
) -> Result<DateTime<FixedOffset>, ApiError> {
    let raw = map.get(field).and_then(Value::as_str).ok_or_else(|| {
        ApiError::bad_request(format!("{context}.{field} is required and must be a string"))
    })?;
    parse_timestamp(raw).ok_or_else(|| {
        ApiError::bad_request(format!("{context}.{field}: unparsable timestamp '{raw}'"))
    })
}

// Webhook payloads. GitHub and Bitbucket post a form whose `payload` field
// holds the JSON document.

#[derive(Debug, Deserialize)]
pub struct HookForm {
    pub payload: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestBuildPayload {
    pub project: String,
    pub identifier: String,
}

#[derive(Debug, Deserialize)]
pub struct GithubPayload {
    pub repository: GithubRepository,
    pub after: String,
}

#[derive(Debug, Deserialize)]
pub struct GithubRepository {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct BitbucketPayload {
    pub repository: BitbucketRepository,
    #[serde(default)]
    pub commits: Vec<BitbucketCommit>,
}

#[derive(Debug, Deserialize)]
pub struct BitbucketRepository {
    pub name: String,
    pub absolute_url: String,
}

#[derive(Debug, Deserialize)]
pub struct BitbucketCommit {
    pub node: String,
}
