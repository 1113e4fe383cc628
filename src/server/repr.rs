use serde_json::{Map, Value, json};

use crate::server::links::{
    BUILD_DETAIL, LATEST_BUILD, PROJECT_BUILD_LIST, PROJECT_DETAIL, PROJECT_TAG_LIST, TAG_DETAIL,
    link,
};
use crate::server::response::{ApiError, StoreResultExt};
use crate::server::validation::format_timestamp;
use crate::store::Store;
use crate::types::{Build, Project};

fn username_or_empty(store: &dyn Store, user_id: Option<&str>) -> Result<String, ApiError> {
    let Some(id) = user_id else {
        return Ok(String::new());
    };
    let user = store.get_user(id).api_err("Failed to look up user")?;
    Ok(user.map(|u| u.username).unwrap_or_default())
}

/// The project document: name, owner, and links to everything nested
/// under it.
pub fn project_repr(store: &dyn Store, project: &Project) -> Result<Value, ApiError> {
    let slug = project.slug.as_str();
    let links = vec![
        link("self", &PROJECT_DETAIL, &[slug], &[]),
        link("build-list", &PROJECT_BUILD_LIST, &[slug], &[]),
        link("latest-build", &LATEST_BUILD, &[slug], &[]),
        link("tag-list", &PROJECT_TAG_LIST, &[slug], &[]),
    ];

    Ok(json!({
        "name": project.name,
        "owner": username_or_empty(store, project.owner_id.as_deref())?,
        "links": links,
    }))
}

/// The build document mirrors the report shape a client posts: fixed fields,
/// a client block, per-step results, with extra keys merged back in at the
/// level they were posted (top-level extras top-level, client extras inside
/// the client block).
pub fn build_repr(store: &dyn Store, slug: &str, build: &Build) -> Result<Value, ApiError> {
    let tags = store
        .list_build_tags(build.id)
        .api_err("Failed to list build tags")?;
    let steps = store
        .list_build_steps(build.id)
        .api_err("Failed to list build steps")?;

    let results: Vec<Value> = steps
        .iter()
        .map(|step| {
            let mut doc = Map::new();
            doc.insert("success".into(), json!(step.success));
            doc.insert("started".into(), json!(format_timestamp(&step.started)));
            doc.insert("finished".into(), json!(format_timestamp(&step.finished)));
            doc.insert("name".into(), json!(step.name));
            doc.insert("output".into(), json!(step.output));
            doc.insert("errout".into(), json!(step.errout));
            for (key, value) in &step.extra_info {
                doc.entry(key.clone()).or_insert_with(|| value.clone());
            }
            Value::Object(doc)
        })
        .collect();

    let build_id = build.id.to_string();
    let mut links = vec![
        link("self", &BUILD_DETAIL, &[slug, &build_id], &[]),
        link("project", &PROJECT_DETAIL, &[slug], &[]),
    ];
    for tag in &tags {
        links.push(link("tag", &TAG_DETAIL, &[slug, tag], &[]));
    }

    let mut doc = Map::new();
    doc.insert("success".into(), json!(build.success));
    doc.insert("started".into(), json!(format_timestamp(&build.started)));
    doc.insert("finished".into(), json!(format_timestamp(&build.finished)));
    doc.insert("tags".into(), json!(tags));
    let mut client = Map::new();
    client.insert("host".into(), json!(build.host));
    client.insert(
        "user".into(),
        json!(username_or_empty(store, build.user_id.as_deref())?),
    );
    client.insert("arch".into(), json!(build.arch));
    for (key, value) in &build.client_info {
        client.entry(key.clone()).or_insert_with(|| value.clone());
    }
    doc.insert("client".into(), Value::Object(client));
    doc.insert("results".into(), json!(results));
    doc.insert("links".into(), json!(links));
    // Extras never displace a fixed field of the same name.
    for (key, value) in &build.extra_info {
        doc.entry(key.clone()).or_insert_with(|| value.clone());
    }

    Ok(Value::Object(doc))
}
