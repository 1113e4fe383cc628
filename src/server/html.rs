use axum::response::Html;
use serde_json::Value;

/// Minimal HTML representation of a resource document. The JSON document is
/// the canonical representation; this keeps browsers and humans served
/// without a templating layer.
pub fn render(title: &str, value: &Value) -> Html<String> {
    let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    let links = value
        .get("links")
        .and_then(Value::as_array)
        .map(|links| {
            let items: String = links
                .iter()
                .filter_map(|l| {
                    let href = l.get("href")?.as_str()?;
                    let rel = l.get("rel")?.as_str()?;
                    Some(format!(
                        "<li><a href=\"{}\">{}</a></li>",
                        escape(href),
                        escape(rel)
                    ))
                })
                .collect();
            format!("<ul>{items}</ul>")
        })
        .unwrap_or_default();

    Html(format!(
        "<!DOCTYPE html>\n<html><head><title>{title}</title></head>\n\
         <body><h1>{title}</h1>{links}<pre>{body}</pre></body></html>\n",
        title = escape(title),
        body = escape(&body),
    ))
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn escapes_markup_in_body() {
        let html = render("builds", &json!({"output": "<script>"}));
        assert!(html.0.contains("&lt;script&gt;"));
        assert!(!html.0.contains("<script>"));
    }

    #[test]
    fn renders_link_list() {
        let html = render(
            "project",
            &json!({"links": [{"rel": "self", "href": "/pony", "allowed_methods": ["GET"]}]}),
        );
        assert!(html.0.contains("<a href=\"/pony\">self</a>"));
    }
}
