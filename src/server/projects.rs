use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::{Identity, RequireIdentity, persist_candidate};
use crate::error::Error;
use crate::server::AppState;
use crate::server::links::{PROJECT_DETAIL, PROJECT_LIST, link};
use crate::server::negotiate::{Format, emit};
use crate::server::repr::project_repr;
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt};
use crate::server::validation::validate_slug;
use crate::store::Store;
use crate::types::Project;

pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    format: Format,
) -> Result<Response, ApiError> {
    let store = state.store.as_ref();

    let projects = store.list_projects().api_err("Failed to list projects")?;
    let projects: Vec<Value> = projects
        .iter()
        .map(|p| project_repr(store, p))
        .collect::<Result<_, _>>()?;

    let doc = json!({
        "projects": projects,
        "links": [link("self", &PROJECT_LIST, &[], &[])],
    });

    Ok(emit(format, "projects", doc))
}

pub async fn get_project(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let store = state.store.as_ref();

    let project = store
        .get_project_by_slug(&slug)
        .api_err("Failed to get project")?
        .or_not_found("Project not found")?;

    Ok(emit(format, "project", project_repr(store, &project)?))
}

/// PUT is upsert: create the project at this slug (201 with Location), or
/// rename it if the caller owns it. Only the create path may persist a
/// candidate identity.
pub async fn put_project(
    auth: RequireIdentity,
    State(state): State<Arc<AppState>>,
    format: Format,
    Path(slug): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let identity = auth.0;
    let store = state.store.as_ref();

    let name = body
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("name is required and must be a string"))?;

    let Some(project) = store
        .get_project_by_slug(&slug)
        .api_err("Failed to get project")?
    else {
        validate_slug(&slug)?;

        let owner = if identity.is_new {
            persist_candidate(store, &identity).api_err("Failed to create user")?
        } else {
            identity.user.clone()
        };

        let project = Project {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            slug: slug.clone(),
            owner_id: Some(owner.id),
            created_at: Utc::now(),
        };

        return match store.create_project(&project) {
            Ok(()) => Ok((
                StatusCode::CREATED,
                [(LOCATION, PROJECT_DETAIL.href(&[&slug]))],
            )
                .into_response()),
            // Lost a create race; the winner's owner decides.
            Err(Error::AlreadyExists) => {
                let existing = store
                    .get_project_by_slug(&slug)
                    .api_err("Failed to get project")?
                    .or_not_found("Project not found")?;
                update_project(store, format, &existing, &identity, name)
            }
            Err(_) => Err(ApiError::internal("Failed to create project")),
        };
    };

    update_project(store, format, &project, &identity, name)
}

fn update_project(
    store: &dyn Store,
    format: Format,
    project: &Project,
    identity: &Identity,
    name: &str,
) -> Result<Response, ApiError> {
    // A freshly provisioned identity can never match an existing owner.
    if identity.is_new || project.owner_id.as_deref() != Some(identity.user.id.as_str()) {
        return Err(ApiError::forbidden("Only the project owner may modify it"));
    }

    store
        .update_project_name(&project.slug, name)
        .api_err("Failed to update project")?;

    // PUT returns the freshly updated representation.
    let updated = store
        .get_project_by_slug(&project.slug)
        .api_err("Failed to get project")?
        .or_not_found("Project not found")?;

    Ok(emit(format, "project", project_repr(store, &updated)?))
}

pub async fn delete_project(
    auth: RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let identity = auth.0;
    let store = state.store.as_ref();

    let project = store
        .get_project_by_slug(&slug)
        .api_err("Failed to get project")?
        .or_not_found("Project not found")?;

    // Rejections never persist a candidate account.
    if identity.is_new || project.owner_id.as_deref() != Some(identity.user.id.as_str()) {
        return Err(ApiError::forbidden("Only the project owner may delete it"));
    }

    store
        .delete_project(&slug)
        .api_err("Failed to delete project")?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
