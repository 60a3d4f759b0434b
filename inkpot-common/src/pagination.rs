//! Offset pagination and the page-link window shown under listings.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: u64 = 10;
pub const MAX_PER_PAGE: u64 = 100;
/// How many page links are shown on each side of the current page.
pub const ON_EACH_SIDE: u64 = 3;

pub const PREVIOUS_LABEL: &str = "« Previous";
pub const NEXT_LABEL: &str = "Next »";
pub const GAP_LABEL: &str = "...";

/// Raw `?page=&per_page=` query parameters.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// A sanitized page request: `page >= 1`, `1 <= per_page <= MAX_PER_PAGE`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct PageRequest {
    page: u64,
    per_page: u64,
}

impl PageRequest {
    #[must_use]
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    #[must_use]
    pub fn page(self) -> u64 {
        self.page
    }

    #[must_use]
    pub fn per_page(self) -> u64 {
        self.per_page
    }

    #[must_use]
    pub fn offset(self) -> u64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PER_PAGE)
    }
}

impl From<PageQuery> for PageRequest {
    fn from(value: PageQuery) -> Self {
        Self::new(
            value.page.unwrap_or(1),
            value.per_page.unwrap_or(DEFAULT_PER_PAGE),
        )
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PageLink {
    pub url: Option<String>,
    pub label: String,
    pub active: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum WindowItem {
    Page(u64),
    Gap,
}

/// The page numbers to link to around `current`, with gaps for elided ranges.
#[must_use]
pub fn page_window(current: u64, last: u64) -> Vec<WindowItem> {
    let window = ON_EACH_SIDE + 4;
    let pages = |from: u64, to: u64| (from..=to).map(WindowItem::Page);

    if last < ON_EACH_SIDE * 2 + 8 {
        return pages(1, last).collect();
    }

    let start = pages(1, 2);
    let finish = pages(last - 1, last);

    if current <= window {
        pages(1, window + ON_EACH_SIDE)
            .chain([WindowItem::Gap])
            .chain(finish)
            .collect()
    } else if current > last - window {
        start
            .chain([WindowItem::Gap])
            .chain(pages(last - (window + ON_EACH_SIDE - 1), last))
            .collect()
    } else {
        start
            .chain([WindowItem::Gap])
            .chain(pages(current - ON_EACH_SIDE, current + ON_EACH_SIDE))
            .chain([WindowItem::Gap])
            .chain(finish)
            .collect()
    }
}

/// One page of a listing together with the counters and links describing the rest.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Page<T> {
    pub current_page: u64,
    pub data: Vec<T>,
    pub first_page_url: String,
    pub from: Option<u64>,
    pub last_page: u64,
    pub last_page_url: String,
    pub links: Vec<PageLink>,
    pub next_page_url: Option<String>,
    pub path: String,
    pub per_page: u64,
    pub prev_page_url: Option<String>,
    pub to: Option<u64>,
    pub total: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(data: Vec<T>, total: u64, request: PageRequest, path: &str) -> Self {
        let current_page = request.page();
        let per_page = request.per_page();
        let last_page = total.div_ceil(per_page).max(1);

        let url = |page: u64| {
            if per_page == DEFAULT_PER_PAGE {
                format!("{path}?page={page}")
            } else {
                format!("{path}?page={page}&per_page={per_page}")
            }
        };

        let prev_page_url = (current_page > 1).then(|| url(current_page - 1));
        let next_page_url = (current_page < last_page).then(|| url(current_page + 1));

        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            let from = request.offset() + 1;
            (Some(from), Some(from + data.len() as u64 - 1))
        };

        let mut links = Vec::new();
        links.push(PageLink {
            url: prev_page_url.clone(),
            label: PREVIOUS_LABEL.to_owned(),
            active: false,
        });
        links.extend(
            page_window(current_page, last_page)
                .into_iter()
                .map(|item| match item {
                    WindowItem::Page(page) => PageLink {
                        url: Some(url(page)),
                        label: page.to_string(),
                        active: page == current_page,
                    },
                    WindowItem::Gap => PageLink {
                        url: None,
                        label: GAP_LABEL.to_owned(),
                        active: false,
                    },
                }),
        );
        links.push(PageLink {
            url: next_page_url.clone(),
            label: NEXT_LABEL.to_owned(),
            active: false,
        });

        Self {
            current_page,
            data,
            first_page_url: url(1),
            from,
            last_page,
            last_page_url: url(last_page),
            links,
            next_page_url,
            path: path.to_owned(),
            per_page,
            prev_page_url,
            to,
            total,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page
    }
}
