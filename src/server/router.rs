use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{get, post},
};

use super::{builds, hooks, projects, tags};
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // /builds/* is registered before the project wildcard and "builds" is a
    // reserved slug, so the trigger endpoints never collide with a project.
    Router::new()
        .route("/health", get(health))
        .route("/", get(projects::list_projects))
        .route("/builds/request", post(hooks::request_build))
        .route("/builds/github", post(hooks::github_build))
        .route("/builds/bitbucket", post(hooks::bitbucket_build))
        .route(
            "/{slug}",
            get(projects::get_project)
                .put(projects::put_project)
                .delete(projects::delete_project),
        )
        .route(
            "/{slug}/builds",
            get(builds::list_builds).post(builds::create_build),
        )
        .route("/{slug}/builds/latest", get(builds::latest_build))
        .route("/{slug}/builds/{id}", get(builds::get_build))
        .route("/{slug}/tags", get(tags::tag_list))
        .route("/{slug}/tags/{tags}", get(tags::tag_detail))
        .route(
            "/{slug}/tags/{tags}/latest",
            get(tags::latest_tagged_build),
        )
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
