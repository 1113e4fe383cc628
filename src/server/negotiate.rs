use axum::{
    extract::FromRequestParts,
    http::{header::ACCEPT, request::Parts},
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;

use super::html;

const SUPPORTED: &[(&str, Format)] = &[
    ("application/json", Format::Json),
    ("text/html", Format::Html),
];

/// The serialization chosen for a response. Negotiation never changes which
/// operation runs, only how its result is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Html,
}

impl Format {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "json" => Some(Format::Json),
            "html" => Some(Format::Html),
            _ => None,
        }
    }
}

/// Picks the emitter format. First match wins: a format baked into the
/// route, an explicit `?format=` parameter, the Accept header, then HTML.
#[must_use]
pub fn determine_format(
    route_format: Option<Format>,
    query: Option<&str>,
    accept: Option<&str>,
) -> Format {
    if let Some(format) = route_format {
        return format;
    }

    if let Some(format) = query
        .and_then(query_param_value)
        .and_then(|v| Format::from_name(&v))
    {
        return format;
    }

    if let Some(format) = accept.and_then(best_match) {
        return format;
    }

    Format::Html
}

fn query_param_value(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == "format" {
            urlencoding::decode(value).ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

/// Best-match MIME negotiation restricted to application/json and text/html.
/// Wildcards and q-values are honored; ties go to the more specific range,
/// then to the order the client listed.
fn best_match(accept: &str) -> Option<Format> {
    let mut best: Option<(Format, f32, u8)> = None;

    for entry in accept.split(',') {
        let mut parts = entry.split(';');
        let range = parts.next()?.trim();

        let mut quality = 1.0_f32;
        for param in parts {
            if let Some((key, value)) = param.split_once('=') {
                if key.trim() == "q" {
                    quality = value.trim().parse().unwrap_or(0.0);
                }
            }
        }
        if quality <= 0.0 {
            continue;
        }

        for (mime, format) in SUPPORTED {
            let specificity = range_specificity(range, mime);
            let Some(specificity) = specificity else {
                continue;
            };
            let better = match best {
                None => true,
                Some((_, best_q, best_s)) => {
                    quality > best_q || (quality == best_q && specificity > best_s)
                }
            };
            if better {
                best = Some((*format, quality, specificity));
            }
        }
    }

    best.map(|(format, _, _)| format)
}

fn range_specificity(range: &str, mime: &str) -> Option<u8> {
    if range == mime {
        return Some(2);
    }
    let (range_type, range_sub) = range.split_once('/')?;
    let (mime_type, _) = mime.split_once('/')?;
    if range_type == mime_type && range_sub == "*" {
        return Some(1);
    }
    if range_type == "*" && (range_sub == "*" || range.is_empty()) {
        return Some(0);
    }
    None
}

impl<S: Send + Sync> FromRequestParts<S> for Format {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let accept = parts.headers.get(ACCEPT).and_then(|h| h.to_str().ok());
        Ok(determine_format(None, parts.uri.query(), accept))
    }
}

/// Serializes a resource document in the negotiated format.
pub fn emit(format: Format, title: &str, value: Value) -> Response {
    match format {
        Format::Json => Json(value).into_response(),
        Format::Html => html::render(title, &value).into_response(),
    }
}
