//! GitHub Trending source fetcher
//!
//! Downloads `https://github.com/trending[/{language}][?since=…]` and pulls
//! candidate projects out of each `article.Box-row`. Transport failures are
//! returned to the pipeline; rows that cannot be parsed are skipped.

use crate::models::{RawProject, TimeWindow};
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use trendmine_common::config::GithubConfig;

/// Anything that yields candidate projects for a language filter and window
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Empty `language_filter` means all languages. An empty listing is
    /// `Ok(vec![])`; transport problems are the error, which the pipeline
    /// logs, counts and treats as an empty listing.
    async fn fetch(&self, language_filter: &str, window: TimeWindow)
        -> Result<Vec<RawProject>, FetchError>;
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Trending page returned status {0}")]
    Status(u16),
}

/// Scrapes the public GitHub Trending page
pub struct GithubTrendingFetcher {
    client: Client,
    base_url: String,
    token: Option<String>,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl GithubTrendingFetcher {
    pub fn new(config: &GithubConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("trendmine/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.trim().is_empty()),
            rate_limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }

    /// Listing URL for a language filter and window
    pub fn trending_url(&self, language_filter: &str, window: TimeWindow) -> String {
        let mut url = self.base_url.clone();

        let filter = language_filter.trim().to_lowercase();
        if !filter.is_empty() {
            url.push('/');
            url.push_str(&filter.replace(' ', "-").replace('#', "%23"));
        }

        if let Some(since) = window.since_param() {
            url.push_str("?since=");
            url.push_str(since);
        }

        url
    }

    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        self.rate_limiter.until_ready().await;

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("token {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl SourceFetcher for GithubTrendingFetcher {
    async fn fetch(
        &self,
        language_filter: &str,
        window: TimeWindow,
    ) -> Result<Vec<RawProject>, FetchError> {
        let url = self.trending_url(language_filter, window);
        info!(url = %url, "Fetching GitHub Trending");

        let html = self.fetch_page(&url).await?;
        let projects = parse_trending_html(&html);
        info!(url = %url, count = projects.len(), "Parsed trending projects");
        Ok(projects)
    }
}

static ARTICLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<article\b[^>]*class="[^"]*\bBox-row\b[^"]*"[^>]*>(.*?)</article>"#).expect("hardcoded regex")
});
static REPO_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<h2\b[^>]*>.*?<a\b[^>]*\bhref="/([^"/?#]+)/([^"/?#]+)/?""#).expect("hardcoded regex")
});
static DESCRIPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<p\b[^>]*>(.*?)</p>").expect("hardcoded regex")
});
static LANGUAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<span\b[^>]*itemprop="programmingLanguage"[^>]*>(.*?)</span>"#).expect("hardcoded regex")
});
static STARS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<a\b[^>]*\bhref="/[^"]+/stargazers/?"[^>]*>(.*?)</a>"#).expect("hardcoded regex")
});
static FORKS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<a\b[^>]*\bhref="/[^"]+/(?:forks|network/members)/?"[^>]*>(.*?)</a>"#).expect("hardcoded regex")
});
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("hardcoded regex"));
static NUMERIC_ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&#([xX]?)([0-9a-fA-F]+);").expect("hardcoded regex")
});

/// Extract candidate projects from a trending page
///
/// Rows without a usable `owner/name` link are skipped.
pub fn parse_trending_html(html: &str) -> Vec<RawProject> {
    let mut projects = Vec::new();

    for article in ARTICLE_RE.captures_iter(html) {
        let body = &article[1];

        let Some(link) = REPO_LINK_RE.captures(body) else {
            debug!("Skipping trending row without repository link");
            continue;
        };
        let owner = link[1].trim().to_string();
        let name = link[2].trim().to_string();
        if owner.is_empty() || name.is_empty() {
            continue;
        }

        let description = DESCRIPTION_RE
            .captures(body)
            .map(|c| clean_text(&c[1]))
            .filter(|d| !d.is_empty());
        let language = LANGUAGE_RE
            .captures(body)
            .map(|c| clean_text(&c[1]))
            .filter(|l| !l.is_empty());
        let stars_count = STARS_RE
            .captures(body)
            .map(|c| parse_count(&clean_text(&c[1])))
            .unwrap_or(0);
        let forks_count = FORKS_RE
            .captures(body)
            .map(|c| parse_count(&clean_text(&c[1])))
            .unwrap_or(0);

        projects.push(RawProject {
            name,
            owner,
            description,
            language,
            stars_count,
            forks_count,
        });
    }

    projects
}

/// Parse a display count such as `1,234`, `1.2k` or `3m`; anything else is 0
pub fn parse_count(text: &str) -> i64 {
    let cleaned = text.replace(',', "").trim().to_lowercase();

    let (number, multiplier) = if let Some(n) = cleaned.strip_suffix('k') {
        (n, 1_000.0)
    } else if let Some(n) = cleaned.strip_suffix('m') {
        (n, 1_000_000.0)
    } else {
        return cleaned.parse::<i64>().unwrap_or(0);
    };

    number
        .trim()
        .parse::<f64>()
        .map(|n| (n * multiplier).round() as i64)
        .unwrap_or(0)
}

/// Strip markup, decode entities and collapse whitespace
fn clean_text(fragment: &str) -> String {
    let without_tags = TAG_RE.replace_all(fragment, " ");
    let decoded = decode_entities(&without_tags);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    let numeric = NUMERIC_ENTITY_RE.replace_all(text, |caps: &regex::Captures| {
        let radix = if caps[1].is_empty() { 10 } else { 16 };
        u32::from_str_radix(&caps[2], radix)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });

    numeric
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRENDING_PAGE: &str = r##"
<div class="Box">
  <article class="Box-row">
    <div class="float-right d-flex"></div>
    <h2 class="h3 lh-condensed">
      <a data-hydro-click="{}" href="/acme/widget" data-view-component="true" class="Link">
        <svg aria-hidden="true" class="octicon octicon-repo"></svg>
        <span data-view-component="true" class="text-normal">acme /</span>
        widget
      </a>
    </h2>
    <p class="col-9 color-fg-muted my-1 pr-4">
      Fast widgets &amp; gadgets for &quot;everyone&quot; &#x1F680;
    </p>
    <div class="f6 color-fg-muted mt-2">
      <span class="d-inline-block ml-0 mr-3">
        <span class="repo-language-color" style="background-color: #dea584"></span>
        <span itemprop="programmingLanguage">Rust</span>
      </span>
      <a href="/acme/widget/stargazers" data-view-component="true" class="Link Link--muted d-inline-block mr-3">
        <svg aria-label="star" class="octicon octicon-star"></svg>
        12,345
      </a>
      <a href="/acme/widget/forks" data-view-component="true" class="Link Link--muted d-inline-block mr-3">
        <svg aria-label="fork" class="octicon octicon-repo-forked"></svg>
        1.2k
      </a>
      <span class="d-inline-block float-sm-right">321 stars today</span>
    </div>
  </article>
  <article class="Box-row">
    <h2 class="h3 lh-condensed">
      <a href="/solo/bare" class="Link">solo / bare</a>
    </h2>
  </article>
  <article class="Box-row">
    <h2 class="h3 lh-condensed">No link here</h2>
  </article>
</div>
"##;

    #[test]
    fn test_parse_trending_rows() {
        let projects = parse_trending_html(TRENDING_PAGE);
        assert_eq!(projects.len(), 2);

        let widget = &projects[0];
        assert_eq!(widget.full_name(), "acme/widget");
        assert_eq!(
            widget.description.as_deref(),
            Some("Fast widgets & gadgets for \"everyone\" 🚀")
        );
        assert_eq!(widget.language.as_deref(), Some("Rust"));
        assert_eq!(widget.stars_count, 12_345);
        assert_eq!(widget.forks_count, 1_200);

        let bare = &projects[1];
        assert_eq!(bare.full_name(), "solo/bare");
        assert_eq!(bare.description, None);
        assert_eq!(bare.language, None);
        assert_eq!(bare.stars_count, 0);
    }

    #[test]
    fn test_parse_empty_page() {
        assert!(parse_trending_html("<html><body>nothing trending</body></html>").is_empty());
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("1,234"), 1234);
        assert_eq!(parse_count(" 987 "), 987);
        assert_eq!(parse_count("1.2k"), 1200);
        assert_eq!(parse_count("3M"), 3_000_000);
        assert_eq!(parse_count("n/a"), 0);
        assert_eq!(parse_count(""), 0);
    }

    #[test]
    fn test_trending_url() {
        let fetcher = GithubTrendingFetcher::new(&GithubConfig::default()).unwrap();

        assert_eq!(
            fetcher.trending_url("", TimeWindow::Daily),
            "https://github.com/trending"
        );
        assert_eq!(
            fetcher.trending_url("Rust", TimeWindow::Weekly),
            "https://github.com/trending/rust?since=weekly"
        );
        assert_eq!(
            fetcher.trending_url("c#", TimeWindow::Monthly),
            "https://github.com/trending/c%23?since=monthly"
        );
    }
}
