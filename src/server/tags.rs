use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use serde_json::{Value, json};

use crate::server::AppState;
use crate::server::builds::found;
use crate::server::links::{
    LATEST_TAGGED_BUILD, PROJECT_DETAIL, PROJECT_TAG_LIST, TAG_DETAIL, link,
};
use crate::server::negotiate::{Format, emit};
use crate::server::pagination::{PageQuery, paginate};
use crate::server::repr::build_repr;
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt};

/// Tag paths take a `;`-separated list; a build matches only if it carries
/// every listed tag.
fn split_tags(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

pub async fn tag_list(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let store = state.store.as_ref();

    let project = store
        .get_project_by_slug(&slug)
        .api_err("Failed to get project")?
        .or_not_found("Project not found")?;

    let tags = store
        .list_project_tags(&project.id)
        .api_err("Failed to list tags")?;

    let mut links = vec![
        link("self", &PROJECT_TAG_LIST, &[&slug], &[]),
        link("project", &PROJECT_DETAIL, &[&slug], &[]),
    ];
    for tag in &tags {
        links.push(link("tag", &TAG_DETAIL, &[&slug, tag], &[]));
    }

    let doc = json!({
        "tags": tags,
        "links": links,
    });

    Ok(emit(format, "tags", doc))
}

pub async fn tag_detail(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path((slug, tags)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let store = state.store.as_ref();

    let project = store
        .get_project_by_slug(&slug)
        .api_err("Failed to get project")?
        .or_not_found("Project not found")?;

    let tag_list = split_tags(&tags);
    let builds = store
        .list_builds_with_all_tags(&project.id, &tag_list)
        .api_err("Failed to list builds")?;

    let mut links = vec![
        link("project", &PROJECT_DETAIL, &[&slug], &[]),
        link("latest-build", &LATEST_TAGGED_BUILD, &[&slug, &tags], &[]),
    ];

    let page = paginate(builds, &query, |rel, page, per_page| {
        links.push(link(
            rel,
            &TAG_DETAIL,
            &[&slug, &tags],
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
        "tags": tag_list,
        "links": links,
    });

    Ok(emit(format, "builds", doc))
}

pub async fn latest_tagged_build(
    State(state): State<Arc<AppState>>,
    Path((slug, tags)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let store = state.store.as_ref();

    let project = store
        .get_project_by_slug(&slug)
        .api_err("Failed to get project")?
        .or_not_found("Project not found")?;

    let builds = store
        .list_builds_with_all_tags(&project.id, &split_tags(&tags))
        .api_err("Failed to list builds")?;

    let build = builds.first().or_not_found("No builds")?;

    Ok(found(&slug, build.id))
}
