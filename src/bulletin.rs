//! Locates and downloads the daily bulletin PDF for a date.
//!
//! Bulletin posts are listed newest first on paginated category pages. Each
//! index page is searched for a post link embedding the date; the post page
//! then links the PDF from its first paragraph or first list item.

use crate::config::{BulletinConfig, join_url};
use crate::error::{ScrapeError, ScrapeResult};
use crate::fetch::{Transport, fetch_ok};
use crate::table::parse_selector;
use chrono::NaiveDate;
use regex::Regex;
use scraper::Html;
use std::time::Duration;
use tracing::{debug, info};

const PDF_LINK_SELECTORS: [&str; 2] = [
    ".entry-content > p:nth-child(1) > a:nth-child(1)",
    ".entry-content > ul:nth-child(1) > li:nth-child(1) > a:nth-child(1)",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchState {
    Searching(usize),
    Found(String),
    NotFound(String),
}

/// Matches `/YYYY/MM/DD/DD-MM-YYYY/`, optionally with `-2` style suffixes.
pub fn post_link_pattern(date: NaiveDate) -> ScrapeResult<Regex> {
    let stamp = date.format("%d-%m-%Y").to_string();
    let pattern = format!(
        "/{}/{}(-2)*/",
        date.format("%Y/%m/%d"),
        regex::escape(&stamp)
    );
    Regex::new(&pattern)
        .map_err(|err| ScrapeError::parse(format!("invalid post link pattern {pattern}: {err}")))
}

pub fn index_page_url(config: &BulletinConfig, page: usize) -> ScrapeResult<String> {
    if page <= 1 {
        return Ok(config.index_url.clone());
    }
    let base = if config.index_url.ends_with('/') {
        config.index_url.clone()
    } else {
        format!("{}/", config.index_url)
    };
    join_url(&base, &format!("page/{page}/")).map_err(|err| ScrapeError::parse(err.to_string()))
}

/// Advances the search by one index page.
pub fn step(
    transport: &dyn Transport,
    config: &BulletinConfig,
    pattern: &Regex,
    state: SearchState,
) -> ScrapeResult<SearchState> {
    let SearchState::Searching(page) = state else {
        return Ok(state);
    };

    if page > config.max_pages {
        return Ok(SearchState::NotFound(format!(
            "searched {} index pages",
            config.max_pages
        )));
    }

    let url = index_page_url(config, page)?;
    let doc = transport.get(&url, &url)?;
    if !doc.is_success() {
        return Ok(SearchState::NotFound(format!(
            "index page {page} returned status {}",
            doc.status
        )));
    }

    if let Some(link) = pattern.find(&doc.text()) {
        return Ok(SearchState::Found(link.as_str().to_string()));
    }

    debug!(page, "bulletin post not on index page");
    Ok(SearchState::Searching(page + 1))
}

/// Absolute URL of the bulletin post for `date`.
pub fn find_bulletin_post(
    transport: &dyn Transport,
    config: &BulletinConfig,
    date: NaiveDate,
) -> ScrapeResult<String> {
    let pattern = post_link_pattern(date)?;
    let mut state = SearchState::Searching(1);

    loop {
        state = match step(transport, config, &pattern, state)? {
            SearchState::Found(link) => {
                return join_url(&config.site_url, &link)
                    .map_err(|err| ScrapeError::parse(err.to_string()));
            }
            SearchState::NotFound(reason) => {
                return Err(ScrapeError::parse(format!(
                    "bulletin not found for date {}: {reason}",
                    date.format("%d-%m-%Y")
                )));
            }
            searching => {
                if config.page_delay_ms > 0 {
                    std::thread::sleep(Duration::from_millis(config.page_delay_ms));
                }
                searching
            }
        };
    }
}

/// First PDF href inside the post's main content.
pub fn find_pdf_link(post_html: &str) -> ScrapeResult<String> {
    let document = Html::parse_document(post_html);
    for selector in PDF_LINK_SELECTORS {
        let selector = parse_selector(selector)?;
        if let Some(href) = document
            .select(&selector)
            .find_map(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
        {
            return Ok(href.to_string());
        }
    }
    Err(ScrapeError::parse("PDF link not found in bulletin post"))
}

pub fn download_bulletin(
    transport: &dyn Transport,
    config: &BulletinConfig,
    date: NaiveDate,
) -> ScrapeResult<Vec<u8>> {
    let post_url = find_bulletin_post(transport, config, date)?;
    info!(url = %post_url, "bulletin post located");

    let post = fetch_ok(transport, &post_url, &post_url)?;
    let href = find_pdf_link(&post.text())?;
    let pdf_url =
        join_url(&post.url, &href).map_err(|err| ScrapeError::parse(err.to_string()))?;

    info!(url = %pdf_url, "downloading bulletin pdf");
    let pdf = fetch_ok(transport, &pdf_url, &post_url)?;
    Ok(pdf.body)
}
