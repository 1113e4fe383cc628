use serde::Deserialize;

pub const DEFAULT_PER_PAGE: usize = 25;

/// Raw pagination query parameters. Kept as strings so an unparsable value
/// falls back to the default instead of rejecting the whole request.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub per_page: Option<String>,
}

#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub count: usize,
    pub num_pages: usize,
    pub page: usize,
    pub paginated: bool,
    pub per_page: usize,
}

/// The requested page holds no items. Callers surface this as 404, even on
/// page 1 of an empty collection.
#[derive(Debug, PartialEq, Eq)]
pub struct EmptyPage;

/// Slices an ordered collection into the requested page and emits navigation
/// links through the callback: `self` always, and `first`/`last` plus
/// `previous`/`next` (when they exist) only when there is more than one page.
/// The callback receives (rel, page, per_page); URL construction stays the
/// caller's concern.
pub fn paginate<T>(
    items: Vec<T>,
    query: &PageQuery,
    mut link_cb: impl FnMut(&'static str, usize, usize),
) -> Result<Page<T>, EmptyPage> {
    let per_page = query
        .per_page
        .as_deref()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_PER_PAGE);

    let count = items.len();
    let num_pages = count.div_ceil(per_page).max(1);

    let page = query
        .page
        .as_deref()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| (1..=num_pages).contains(&v))
        .unwrap_or(1);

    let start = (page - 1) * per_page;
    let items: Vec<T> = items
        .into_iter()
        .skip(start)
        .take(per_page)
        .collect();

    if items.is_empty() {
        return Err(EmptyPage);
    }

    link_cb("self", page, per_page);

    if num_pages > 1 {
        link_cb("first", 1, per_page);
        link_cb("last", num_pages, per_page);
        if page > 1 {
            link_cb("previous", page - 1, per_page);
        }
        if page < num_pages {
            link_cb("next", page + 1, per_page);
        }
    }

    Ok(Page {
        items,
        count,
        num_pages,
        page,
        paginated: num_pages > 1,
        per_page,
    })
}
