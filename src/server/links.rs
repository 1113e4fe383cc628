use serde::Serialize;

/// A routable resource: its URL pattern and the HTTP verbs it answers to.
/// Links copy `allowed_methods` verbatim so clients can discover per-link
/// which verbs are valid without a separate capability call.
pub struct Endpoint {
    pub pattern: &'static str,
    pub allowed_methods: &'static [&'static str],
}

pub const PROJECT_LIST: Endpoint = Endpoint {
    pattern: "/",
    allowed_methods: &["GET"],
};

pub const PROJECT_DETAIL: Endpoint = Endpoint {
    pattern: "/{slug}",
    allowed_methods: &["GET", "PUT", "DELETE"],
};

pub const PROJECT_BUILD_LIST: Endpoint = Endpoint {
    pattern: "/{slug}/builds",
    allowed_methods: &["GET", "POST"],
};

pub const BUILD_DETAIL: Endpoint = Endpoint {
    pattern: "/{slug}/builds/{id}",
    allowed_methods: &["GET"],
};

pub const LATEST_BUILD: Endpoint = Endpoint {
    pattern: "/{slug}/builds/latest",
    allowed_methods: &["GET"],
};

pub const PROJECT_TAG_LIST: Endpoint = Endpoint {
    pattern: "/{slug}/tags",
    allowed_methods: &["GET"],
};

pub const TAG_DETAIL: Endpoint = Endpoint {
    pattern: "/{slug}/tags/{tags}",
    allowed_methods: &["GET"],
};

pub const LATEST_TAGGED_BUILD: Endpoint = Endpoint {
    pattern: "/{slug}/tags/{tags}/latest",
    allowed_methods: &["GET"],
};

#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    pub allowed_methods: &'static [&'static str],
}

impl Endpoint {
    /// Substitutes positional arguments into the pattern's placeholders.
    #[must_use]
    pub fn href(&self, args: &[&str]) -> String {
        let mut href = String::with_capacity(self.pattern.len());
        let mut args = args.iter();
        let mut rest = self.pattern;

        while let Some(open) = rest.find('{') {
            href.push_str(&rest[..open]);
            let close = rest[open..]
                .find('}')
                .map(|i| open + i + 1)
                .unwrap_or(rest.len());
            if let Some(arg) = args.next() {
                href.push_str(&urlencoding::encode(arg));
            }
            rest = &rest[close..];
        }
        href.push_str(rest);
        href
    }
}

/// Create a link resource: rel, href, and the target's allowed methods.
/// Query arguments are appended percent-encoded when present.
#[must_use]
pub fn link(rel: &str, endpoint: &Endpoint, args: &[&str], query: &[(&str, String)]) -> Link {
    let mut href = endpoint.href(args);
    if !query.is_empty() {
        let qs = query
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        href = format!("{href}?{qs}");
    }
    Link {
        rel: rel.to_string(),
        href,
        allowed_methods: endpoint.allowed_methods,
    }
}
