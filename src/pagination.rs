//! This modules defines the common functionality for paging data.

use maud::{Markup, html};

/// The config for pagination
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationConfig {
    /// The number of items to display per page.
    pub page_size: u64,
    /// The maximum number of pages to show in the pagination indicator.
    pub max_pages: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            max_pages: 5,
        }
    }
}

/// The number of pages needed to show `item_count` items, at least one.
pub fn page_count(item_count: u64, page_size: u64) -> u64 {
    item_count.div_ceil(page_size.max(1)).max(1)
}

/// Resolve the requested page number against the number of available pages.
///
/// Missing, malformed or zero page numbers fall back to the first page and
/// page numbers past the end clamp to the last page.
pub fn resolve_page(requested: Option<&str>, page_count: u64) -> u64 {
    let page = requested
        .and_then(|page| page.trim().parse::<u64>().ok())
        .filter(|&page| page >= 1)
        .unwrap_or(1);

    page.min(page_count.max(1))
}

#[derive(Debug, PartialEq, Eq)]
pub enum PaginationIndicator {
    Page(u64),
    CurrPage(u64),
    Ellipsis,
    NextButton(u64),
    BackButton(u64),
}

pub fn create_pagination_indicators(
    curr_page: u64,
    page_count: u64,
    max_pages: u64,
) -> Vec<PaginationIndicator> {
    let map_page = |page| {
        if page == curr_page {
            PaginationIndicator::CurrPage(page)
        } else {
            PaginationIndicator::Page(page)
        }
    };

    let half = max_pages / 2;

    let mut indicators: Vec<PaginationIndicator> = if page_count <= max_pages {
        (1..=page_count).map(map_page).collect()
    } else if curr_page <= half {
        (1..=max_pages).map(map_page).collect()
    } else if curr_page > (page_count - half) {
        ((page_count - max_pages + 1)..=page_count)
            .map(map_page)
            .collect()
    } else {
        ((curr_page - half)..=(curr_page + half))
            .map(map_page)
            .collect()
    };

    if page_count > max_pages {
        if curr_page > half + 1 {
            indicators.insert(0, PaginationIndicator::Page(1));
            indicators.insert(1, PaginationIndicator::Ellipsis);
        }

        if curr_page < (page_count - half) {
            indicators.push(PaginationIndicator::Ellipsis);
            indicators.push(PaginationIndicator::Page(page_count));
        }
    }

    if curr_page > 1 {
        indicators.insert(0, PaginationIndicator::BackButton(curr_page - 1));
    }

    if curr_page < page_count {
        indicators.push(PaginationIndicator::NextButton(curr_page + 1));
    }

    indicators
}

/// Render the pagination controls.
///
/// `page_url` maps a page number to the URL that fetches that page. Each link
/// swaps the element matched by `hx_target`.
pub fn pagination_nav(
    indicators: &[PaginationIndicator],
    page_url: impl Fn(u64) -> String,
    hx_target: &str,
) -> Markup {
    const LINK: &str = "block px-3 py-2 leading-tight text-gray-500 bg-white \
        border border-gray-300 hover:bg-gray-100 hover:text-gray-700 \
        dark:bg-gray-800 dark:border-gray-700 dark:text-gray-400 \
        dark:hover:bg-gray-700 dark:hover:text-white";
    const CURRENT: &str = "block px-3 py-2 leading-tight text-blue-600 \
        border border-blue-300 bg-blue-50 dark:border-gray-700 \
        dark:bg-gray-700 dark:text-white";

    html! {
        nav class="flex justify-center my-4" aria-label="Pagination"
        {
            ul class="inline-flex -space-x-px text-sm"
            {
                @for indicator in indicators {
                    li {
                        @match indicator {
                            PaginationIndicator::Page(page) => {
                                a hx-get=(page_url(*page)) hx-target=(hx_target)
                                    href="#" class=(LINK) { (page) }
                            }
                            PaginationIndicator::CurrPage(page) => {
                                span aria-current="page" class=(CURRENT) { (page) }
                            }
                            PaginationIndicator::Ellipsis => {
                                span class=(LINK) { "..." }
                            }
                            PaginationIndicator::BackButton(page) => {
                                a hx-get=(page_url(*page)) hx-target=(hx_target) href="#"
                                    class=(LINK) { "Back" }
                            }
                            PaginationIndicator::NextButton(page) => {
                                a hx-get=(page_url(*page)) hx-target=(hx_target) href="#"
                                    class=(LINK) { "Next" }
                            }
                        }
                    }
                }
            }
        }
    }
}
