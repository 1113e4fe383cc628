use std::sync::Arc;

use axum::{Form, Json, extract::State};
use chrono::Utc;
use serde_json::Value;

use crate::server::AppState;
use crate::server::dto::{BitbucketPayload, GithubPayload, HookForm, RequestBuildPayload};
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt};
use crate::store::Store;
use crate::types::{BuildRequest, Repository, VcsType};

/// Body returned by every trigger endpoint once a request row exists.
const BUILD_STARTED: &str = "Build Started";

fn queue_request(store: &dyn Store, repository_id: i64, identifier: &str) -> Result<(), ApiError> {
    let request = BuildRequest {
        id: 0,
        repository_id,
        identifier: identifier.to_string(),
        requested: Utc::now(),
    };
    store
        .create_build_request(&request)
        .api_err("Failed to record build request")?;
    Ok(())
}

fn repository_for(
    store: &dyn Store,
    project_id: &str,
    url: &str,
    vcs_type: VcsType,
) -> Result<Repository, ApiError> {
    match store
        .get_repository_by_url(url)
        .api_err("Failed to look up repository")?
    {
        Some(repo) => Ok(repo),
        None => store
            .create_repository(project_id, url, vcs_type)
            .api_err("Failed to create repository"),
    }
}

/// POST /builds/request: explicit build trigger naming a project slug and
/// a commit identifier. The project must already have a repository.
pub async fn request_build(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<String, ApiError> {
    let payload: RequestBuildPayload = serde_json::from_value(body)
        .map_err(|e| ApiError::bad_request(format!("invalid request payload: {e}")))?;
    let store = state.store.as_ref();

    let project = store
        .get_project_by_slug(&payload.project)
        .api_err("Failed to get project")?
        .or_not_found("Project not found")?;
    let repo = store
        .get_repository_for_project(&project.id)
        .api_err("Failed to look up repository")?
        .or_not_found("Project has no repository")?;

    queue_request(store, repo.id, &payload.identifier)?;
    Ok(BUILD_STARTED.to_string())
}

/// POST /builds/github: GitHub push hook. The project slug is the repository
/// name; the clone URL is derived by swapping the http scheme for git.
pub async fn github_build(
    State(state): State<Arc<AppState>>,
    Form(form): Form<HookForm>,
) -> Result<String, ApiError> {
    let payload: GithubPayload = serde_json::from_str(&form.payload)
        .map_err(|e| ApiError::bad_request(format!("invalid github payload: {e}")))?;
    let store = state.store.as_ref();

    let project = store
        .get_project_by_slug(&payload.repository.name)
        .api_err("Failed to get project")?
        .or_not_found("Project not found")?;

    let git_url = payload.repository.url.replacen("http://", "git://", 1);
    let repo = repository_for(store, &project.id, &git_url, VcsType::Git)?;

    queue_request(store, repo.id, &payload.after)?;
    Ok(BUILD_STARTED.to_string())
}

/// POST /builds/bitbucket: Bitbucket push hook. The payload carries a
/// site-relative path, so the full URL is reassembled here.
pub async fn bitbucket_build(
    State(state): State<Arc<AppState>>,
    Form(form): Form<HookForm>,
) -> Result<String, ApiError> {
    let payload: BitbucketPayload = serde_json::from_str(&form.payload)
        .map_err(|e| ApiError::bad_request(format!("invalid bitbucket payload: {e}")))?;
    let store = state.store.as_ref();

    let project = store
        .get_project_by_slug(&payload.repository.name)
        .api_err("Failed to get project")?
        .or_not_found("Project not found")?;

    let identifier = payload
        .commits
        .first()
        .map(|c| c.node.as_str())
        .ok_or_else(|| ApiError::bad_request("bitbucket payload has no commits"))?;

    let url = format!("http://bitbucket.org{}", payload.repository.absolute_url);
    let repo = repository_for(store, &project.id, &url, VcsType::Hg)?;

    queue_request(store, repo.id, identifier)?;
    Ok(BUILD_STARTED.to_string())
}
