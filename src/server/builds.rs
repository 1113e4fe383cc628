use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::auth::{OptionalIdentity, persist_candidate};
use crate::server::AppState;
use crate::server::dto::BuildReport;
use crate::server::links::{
    BUILD_DETAIL, LATEST_BUILD, PROJECT_BUILD_LIST, PROJECT_DETAIL, link,
};
use crate::server::negotiate::{Format, emit};
use crate::server::pagination::{PageQuery, paginate};
use crate::server::repr::{build_repr, project_repr};
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt};

pub async fn list_builds(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let store = state.store.as_ref();

    let project = store
        .get_project_by_slug(&slug)
        .api_err("Failed to get project")?
        .or_not_found("Project not found")?;

    let builds = store
        .list_builds(&project.id)
        .api_err("Failed to list builds")?;

    let mut links = vec![
        link("project", &PROJECT_DETAIL, &[&slug], &[]),
        link("latest-build", &LATEST_BUILD, &[&slug], &[]),
    ];

    let page = paginate(builds, &query, |rel, page, per_page| {
        links.push(link(
            rel,
            &PROJECT_BUILD_LIST,
            &[&slug],
            &[
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
            ],
        ));
    })
    .map_err(|_| ApiError::not_found("No builds"))?;

    let builds: Vec<Value> = page
        .items
        .iter()
        .map(|b| build_repr(store, &slug, b))
        .collect::<Result<_, _>>()?;

    let doc = json!({
        "builds": builds,
        "count": page.count,
        "num_pages": page.num_pages,
        "page": page.page,
        "paginated": page.paginated,
        "per_page": page.per_page,
        "project": project_repr(store, &project)?,
        "links": links,
    });

    Ok(emit(format, "builds", doc))
}

/// Ingests a build report. Validation runs before anything is written so a
/// bad payload leaves no build, no steps, and no freshly provisioned
/// account behind.
pub async fn create_build(
    auth: OptionalIdentity,
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let store = state.store.as_ref();

    let project = store
        .get_project_by_slug(&slug)
        .api_err("Failed to get project")?
        .or_not_found("Project not found")?;

    let report = BuildReport::from_value(&body)?;

    let user_id = match auth.0 {
        Some(identity) if identity.is_new => {
            let user = persist_candidate(store, &identity).api_err("Failed to create user")?;
            Some(user.id)
        }
        Some(identity) => Some(identity.user.id),
        None => None,
    };

    let build_id = store
        .create_build_report(&report.into_new_build(&project.id, user_id))
        .api_err("Failed to create build")?;

    Ok((
        StatusCode::CREATED,
        [(LOCATION, BUILD_DETAIL.href(&[&slug, &build_id.to_string()]))],
    )
        .into_response())
}

pub async fn get_build(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path((slug, build_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let store = state.store.as_ref();

    // Non-numeric ids never match a build.
    let build_id: i64 = build_id
        .parse()
        .map_err(|_| ApiError::not_found("Build not found"))?;

    let project = store
        .get_project_by_slug(&slug)
        .api_err("Failed to get project")?
        .or_not_found("Project not found")?;

    let build = store
        .get_build(&project.id, build_id)
        .api_err("Failed to get build")?
        .or_not_found("Build not found")?;

    Ok(emit(format, "build", build_repr(store, &slug, &build)?))
}

pub async fn latest_build(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let store = state.store.as_ref();

    let project = store
        .get_project_by_slug(&slug)
        .api_err("Failed to get project")?
        .or_not_found("Project not found")?;

    let build = store
        .latest_build(&project.id)
        .api_err("Failed to get latest build")?
        .or_not_found("No builds")?;

    Ok(found(&slug, build.id))
}

/// 302 to a build's canonical URL.
pub fn found(slug: &str, build_id: i64) -> Response {
    (
        StatusCode::FOUND,
        [(LOCATION, BUILD_DETAIL.href(&[slug, &build_id.to_string()]))],
    )
        .into_response()
}
