use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use corral::server::{AppState, create_router};
use corral::store::{SqliteStore, Store};

fn test_app() -> (Router, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    store.initialize().unwrap();

    let state = Arc::new(AppState {
        store: store.clone(),
    });
    (create_router(state), store)
}

fn basic_auth(username: &str, password: &str) -> String {
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"))
    )
}

fn request(method: &str, uri: &str, auth: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::ACCEPT, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_project(app: &Router, slug: &str, name: &str, auth: &str) {
    let response = app
        .clone()
        .oneshot(request("PUT", &format!("/{slug}"), Some(auth), Some(json!({"name": name}))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

fn build_report() -> Value {
    json!({
        "success": true,
        "started": "Mon, 26 Oct 2009 16:22:00 -0500",
        "finished": "Mon, 26 Oct 2009 16:25:00 -0500",
        "tags": ["pony", "build", "rocks"],
        "client": {"host": "rat.example.com", "user": "", "arch": "linux-i386", "cores": 8},
        "results": [
            {
                "success": true,
                "name": "checkout",
                "started": "Mon, 26 Oct 2009 16:22:00 -0500",
                "finished": "Mon, 26 Oct 2009 16:23:00 -0500",
                "output": "Checked out",
                "errout": ""
            },
            {
                "success": true,
                "name": "test",
                "started": "Mon, 26 Oct 2009 16:23:00 -0500",
                "finished": "Mon, 26 Oct 2009 16:25:00 -0500",
                "output": "OK",
                "errout": "",
                "warnings": 2
            }
        ],
        "extra1": "Lots of extra info",
        "extra2": ["and", "it", "stays"]
    })
}

#[tokio::test]
async fn put_project_then_read_it_back() {
    let (app, _store) = test_app();
    let auth = basic_auth("alice", "s3cret");

    let response = app
        .clone()
        .oneshot(request("PUT", "/pony", Some(&auth), Some(json!({"name": "Pony"}))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()[header::LOCATION], "/pony");

    let response = app
        .oneshot(request("GET", "/pony", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc = body_json(response).await;
    assert_eq!(doc["name"], "Pony");
    assert_eq!(doc["owner"], "alice");

    let rels: Vec<&str> = doc["links"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["rel"].as_str().unwrap())
        .collect();
    assert_eq!(rels, vec!["self", "build-list", "latest-build", "tag-list"]);
    assert_eq!(doc["links"][0]["href"], "/pony");
}

#[tokio::test]
async fn unauthenticated_put_gets_basic_challenge() {
    let (app, _store) = test_app();

    let response = app
        .oneshot(request("PUT", "/pony", None, Some(json!({"name": "Pony"}))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()["WWW-Authenticate"],
        "Basic realm=\"pony\""
    );
}

#[tokio::test]
async fn wrong_password_on_existing_account_is_forbidden() {
    let (app, _store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    let response = app
        .oneshot(request(
            "PUT",
            "/pony",
            Some(&basic_auth("alice", "wrong")),
            Some(json!({"name": "Renamed"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn new_username_cannot_take_existing_project() {
    let (app, store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/pony",
            Some(&basic_auth("mallory", "whatever")),
            Some(json!({"name": "Stolen"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The rejected candidate account was never persisted.
    assert!(store.get_user_by_username("mallory").unwrap().is_none());

    let response = app
        .oneshot(request("GET", "/pony", None, None))
        .await
        .unwrap();
    let doc = body_json(response).await;
    assert_eq!(doc["name"], "Pony");
}

#[tokio::test]
async fn only_the_owner_may_delete() {
    let (app, _store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;
    create_project(&app, "other", "Other", &basic_auth("bob", "hunter2")).await;

    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            "/pony",
            Some(&basic_auth("bob", "hunter2")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(request("GET", "/pony", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            "/pony",
            Some(&basic_auth("alice", "s3cret")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(request("GET", "/pony", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn owner_renames_project_with_put() {
    let (app, _store) = test_app();
    let auth = basic_auth("alice", "s3cret");
    create_project(&app, "pony", "Pony", &auth).await;

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/pony",
            Some(&auth),
            Some(json!({"name": "Pony Deluxe"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc = body_json(response).await;
    assert_eq!(doc["name"], "Pony Deluxe");
}

#[tokio::test]
async fn build_report_round_trips() {
    let (app, _store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/pony/builds",
            Some(&basic_auth("reporter", "pw")),
            Some(build_report()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert_eq!(location, "/pony/builds/1");

    let response = app
        .oneshot(request("GET", &location, None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc = body_json(response).await;
    assert_eq!(doc["success"], true);
    assert_eq!(doc["started"], "Mon, 26 Oct 2009 16:22:00 -0500");
    assert_eq!(doc["finished"], "Mon, 26 Oct 2009 16:25:00 -0500");
    assert_eq!(doc["tags"], json!(["pony", "build", "rocks"]));
    assert_eq!(doc["client"]["host"], "rat.example.com");
    assert_eq!(doc["client"]["arch"], "linux-i386");
    assert_eq!(doc["client"]["user"], "reporter");
    // Extras come back at the level they were posted.
    assert_eq!(doc["client"]["cores"], 8);
    assert!(doc.get("cores").is_none());
    assert_eq!(doc["extra1"], "Lots of extra info");
    assert_eq!(doc["extra2"], json!(["and", "it", "stays"]));

    let results = doc["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["name"], "checkout");
    assert_eq!(results[1]["name"], "test");
    assert_eq!(results[1]["warnings"], 2);
}

#[tokio::test]
async fn anonymous_build_report_is_accepted() {
    let (app, store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    let response = app
        .clone()
        .oneshot(request("POST", "/pony/builds", None, Some(build_report())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // No phantom account shows up for an anonymous report.
    assert!(store.get_user_by_username("").unwrap().is_none());
}

#[tokio::test]
async fn invalid_build_report_names_the_field() {
    let (app, _store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    let mut report = build_report();
    report["results"][0]["started"] = json!("not a timestamp");

    let response = app
        .clone()
        .oneshot(request("POST", "/pony/builds", None, Some(report)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let doc = body_json(response).await;
    assert!(doc["error"].as_str().unwrap().contains("results[0].started"));

    // Nothing was ingested.
    let response = app
        .oneshot(request("GET", "/pony/builds", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn single_build_list_is_unpaginated() {
    let (app, _store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    let response = app
        .clone()
        .oneshot(request("POST", "/pony/builds", None, Some(build_report())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(request("GET", "/pony/builds", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc = body_json(response).await;
    assert_eq!(doc["count"], 1);
    assert_eq!(doc["num_pages"], 1);
    assert_eq!(doc["page"], 1);
    assert_eq!(doc["paginated"], false);
    assert_eq!(doc["per_page"], 25);
    assert_eq!(doc["builds"].as_array().unwrap().len(), 1);
    assert_eq!(doc["project"]["name"], "Pony");

    let rels: Vec<&str> = doc["links"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["rel"].as_str().unwrap())
        .collect();
    assert!(rels.contains(&"self"));
    assert!(!rels.contains(&"next"));
    assert!(!rels.contains(&"previous"));
    assert!(!rels.contains(&"first"));
}

#[tokio::test]
async fn build_list_paginates_with_navigation_links() {
    let (app, _store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(request("POST", "/pony/builds", None, Some(build_report())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(request("GET", "/pony/builds?per_page=1&page=2", None, None))
        .await
        .unwrap();
    let doc = body_json(response).await;

    assert_eq!(doc["count"], 3);
    assert_eq!(doc["num_pages"], 3);
    assert_eq!(doc["page"], 2);
    assert_eq!(doc["paginated"], true);
    assert_eq!(doc["builds"].as_array().unwrap().len(), 1);

    let links: Vec<(&str, &str)> = doc["links"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| (l["rel"].as_str().unwrap(), l["href"].as_str().unwrap()))
        .collect();
    assert!(links.contains(&("self", "/pony/builds?per_page=1&page=2")));
    assert!(links.contains(&("previous", "/pony/builds?per_page=1&page=1")));
    assert!(links.contains(&("next", "/pony/builds?per_page=1&page=3")));
    assert!(links.contains(&("first", "/pony/builds?per_page=1&page=1")));
    assert!(links.contains(&("last", "/pony/builds?per_page=1&page=3")));
}

#[tokio::test]
async fn empty_build_list_is_not_found() {
    let (app, _store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    let response = app
        .oneshot(request("GET", "/pony/builds", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let doc = body_json(response).await;
    assert_eq!(doc["error"], "No builds");
}

#[tokio::test]
async fn non_numeric_build_id_is_not_found() {
    let (app, _store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    let response = app
        .oneshot(request("GET", "/pony/builds/not-a-number", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn latest_build_redirects_to_newest() {
    let (app, _store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    let mut older = build_report();
    older["finished"] = json!("Mon, 26 Oct 2009 16:25:00 -0500");
    let mut newer = build_report();
    newer["finished"] = json!("Tue, 27 Oct 2009 09:00:00 -0500");

    for report in [older, newer] {
        let response = app
            .clone()
            .oneshot(request("POST", "/pony/builds", None, Some(report)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(request("GET", "/pony/builds/latest", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/pony/builds/2");
}

#[tokio::test]
async fn latest_build_without_builds_is_not_found() {
    let (app, _store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    let response = app
        .oneshot(request("GET", "/pony/builds/latest", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tag_list_links_each_tag() {
    let (app, _store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    let response = app
        .clone()
        .oneshot(request("POST", "/pony/builds", None, Some(build_report())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(request("GET", "/pony/tags", None, None))
        .await
        .unwrap();
    let doc = body_json(response).await;

    let mut tags: Vec<&str> = doc["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap())
        .collect();
    tags.sort_unstable();
    assert_eq!(tags, vec!["build", "pony", "rocks"]);

    let hrefs: Vec<&str> = doc["links"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|l| l["rel"] == "tag")
        .map(|l| l["href"].as_str().unwrap())
        .collect();
    assert!(hrefs.contains(&"/pony/tags/rocks"));
}

#[tokio::test]
async fn tag_detail_requires_all_tags() {
    let (app, _store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    let mut tagged = build_report();
    tagged["tags"] = json!(["pony", "special"]);

    for report in [build_report(), tagged] {
        let response = app
            .clone()
            .oneshot(request("POST", "/pony/builds", None, Some(report)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .clone()
        .oneshot(request("GET", "/pony/tags/pony;special", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc = body_json(response).await;
    assert_eq!(doc["count"], 1);
    assert_eq!(doc["tags"], json!(["pony", "special"]));

    let response = app
        .oneshot(request("GET", "/pony/tags/pony", None, None))
        .await
        .unwrap();
    let doc = body_json(response).await;
    assert_eq!(doc["count"], 2);
}

#[tokio::test]
async fn unknown_tag_detail_is_not_found() {
    let (app, _store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    let response = app
        .oneshot(request("GET", "/pony/tags/nope", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let doc = body_json(response).await;
    assert_eq!(doc["error"], "No builds");
}

#[tokio::test]
async fn latest_tagged_build_redirects() {
    let (app, _store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    let response = app
        .clone()
        .oneshot(request("POST", "/pony/builds", None, Some(build_report())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(request("GET", "/pony/tags/rocks/latest", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/pony/builds/1");
}

#[tokio::test]
async fn project_list_defaults_to_html() {
    let (app, _store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );

    let (app, _store) = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/?format=json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("application/json")
    );
}

#[tokio::test]
async fn reserved_slug_cannot_become_a_project() {
    let (app, _store) = test_app();

    let response = app
        .oneshot(request(
            "PUT",
            "/builds",
            Some(&basic_auth("alice", "s3cret")),
            Some(json!({"name": "Sneaky"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn github_hook_queues_a_build_request() {
    let (app, store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    let payload = json!({
        "repository": {"name": "pony", "url": "http://github.com/alice/pony"},
        "after": "deadbeef"
    });
    let form = format!("payload={}", urlencoding::encode(&payload.to_string()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/builds/github")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"Build Started");

    let repo = store
        .get_repository_by_url("git://github.com/alice/pony")
        .unwrap()
        .unwrap();
    assert_eq!(repo.vcs_type, corral::types::VcsType::Git);
}

#[tokio::test]
async fn request_hook_needs_an_existing_repository() {
    let (app, _store) = test_app();
    create_project(&app, "pony", "Pony", &basic_auth("alice", "s3cret")).await;

    let response = app
        .oneshot(request(
            "POST",
            "/builds/request",
            None,
            Some(json!({"project": "pony", "identifier": "abc123"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
