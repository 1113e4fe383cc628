use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single reported build. Timestamps keep the UTC offset the client
/// submitted so they serialize back out unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    pub id: i64,
    pub project_id: String,
    pub success: bool,
    pub started: DateTime<FixedOffset>,
    pub finished: DateTime<FixedOffset>,
    pub host: String,
    pub arch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub extra_info: Map<String, Value>,
    /// Extra keys reported inside the client block, kept apart from the
    /// top-level extras so each reads back where it was posted.
    pub client_info: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildStep {
    pub id: i64,
    pub build_id: i64,
    pub success: bool,
    pub started: DateTime<FixedOffset>,
    pub finished: DateTime<FixedOffset>,
    pub name: String,
    pub output: String,
    pub errout: String,
    pub extra_info: Map<String, Value>,
}

/// A validated build report ready for ingestion: the build row plus every
/// step and tag that must land in the same transaction.
#[derive(Debug, Clone)]
pub struct NewBuild {
    pub project_id: String,
    pub success: bool,
    pub started: DateTime<FixedOffset>,
    pub finished: DateTime<FixedOffset>,
    pub host: String,
    pub arch: String,
    pub user_id: Option<String>,
    pub extra_info: Map<String, Value>,
    pub client_info: Map<String, Value>,
    pub steps: Vec<NewBuildStep>,
    pub tags: Vec<String>,
}

/// Fields of a BuildStep before it has a parent row, as carved out of an
/// incoming build report.
#[derive(Debug, Clone)]
pub struct NewBuildStep {
    pub success: bool,
    pub started: DateTime<FixedOffset>,
    pub finished: DateTime<FixedOffset>,
    pub name: String,
    pub output: String,
    pub errout: String,
    pub extra_info: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsType {
    None,
    Git,
    Svn,
    Hg,
    Bzr,
}

impl VcsType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            VcsType::None => "none",
            VcsType::Git => "git",
            VcsType::Svn => "svn",
            VcsType::Hg => "hg",
            VcsType::Bzr => "bzr",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(VcsType::None),
            "git" => Some(VcsType::Git),
            "svn" => Some(VcsType::Svn),
            "hg" => Some(VcsType::Hg),
            "bzr" => Some(VcsType::Bzr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub project_id: String,
    pub url: String,
    pub vcs_type: VcsType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    pub id: i64,
    pub repository_id: i64,
    pub identifier: String,
    pub requested: DateTime<Utc>,
}
