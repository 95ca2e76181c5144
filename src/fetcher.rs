use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::FeedConfig;

/// One aggregated news entry. Immutable once constructed; `link` is the
/// identity key used for deduplication.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed parse failed: {0}")]
    Parse(#[from] parser::ParseFeedError),
}

/// Per-source outcome of one aggregate fetch. A failed source never aborts
/// the cycle; it is recorded here and skipped.
#[derive(Debug)]
pub struct SourceOutcome {
    pub source: String,
    pub outcome: Result<usize, FetchError>,
}

#[derive(Debug, Default)]
pub struct FetchReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl FetchReport {
    pub fn failed_sources(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.outcome.is_err())
            .map(|o| o.source.as_str())
            .collect()
    }
}

pub struct Fetcher {
    client: Client,
    sources: Vec<FeedConfig>,
}

impl Fetcher {
    pub fn new(sources: Vec<FeedConfig>) -> Self {
        // The per-source timeout bounds how long one unresponsive feed can
        // stall the aggregate fetch.
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("NewsDigest/1.0 (Feed Aggregator)")
            .build()
            .expect("Failed to create HTTP client");

        Self { client, sources }
    }

    /// Fetch every configured source and return the items published within
    /// `lookback`, in configured-source order then source-native entry order.
    pub async fn fetch_all(&self, lookback: chrono::Duration) -> (Vec<NewsItem>, FetchReport) {
        let now = Utc::now();
        let mut items = Vec::new();
        let mut report = FetchReport::default();

        info!("Checking {} feeds", self.sources.len());

        for source in &self.sources {
            match self.fetch_source(source, now, lookback).await {
                Ok(batch) => {
                    info!("Fetched {}: {} items within lookback", source.name, batch.len());
                    report.outcomes.push(SourceOutcome {
                        source: source.name.clone(),
                        outcome: Ok(batch.len()),
                    });
                    items.extend(batch);
                }
                Err(e) => {
                    warn!("Skipping feed '{}': {}", source.name, e);
                    report.outcomes.push(SourceOutcome {
                        source: source.name.clone(),
                        outcome: Err(e),
                    });
                }
            }
        }

        (items, report)
    }

    async fn fetch_source(
        &self,
        source: &FeedConfig,
        now: DateTime<Utc>,
        lookback: chrono::Duration,
    ) -> Result<Vec<NewsItem>, FetchError> {
        let response = self.client.get(&source.url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        parse_feed(&bytes, &source.name, now, lookback)
    }
}

/// Parse one feed document into news items, applying the lookback filter.
///
/// Entries without a publish timestamp are retained (fail-open): absence of
/// time data does not exclude an item.
pub fn parse_feed(
    bytes: &[u8],
    fallback_name: &str,
    now: DateTime<Utc>,
    lookback: chrono::Duration,
) -> Result<Vec<NewsItem>, FetchError> {
    let parsed = parser::parse(bytes)?;

    let source = parsed
        .title
        .as_ref()
        .map(|t| t.content.clone())
        .unwrap_or_else(|| fallback_name.to_string());

    let mut items = Vec::new();
    for entry in parsed.entries {
        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.clone())
            .unwrap_or_else(|| "Untitled".to_string());

        let link = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default();

        if link.is_empty() {
            warn!("Skipping entry with no link: {}", title);
            continue;
        }

        let published_at: Option<DateTime<Utc>> =
            entry.published.or(entry.updated).map(|dt| dt.into());

        if let Some(published) = published_at {
            if now - published > lookback {
                continue;
            }
        }

        let summary = entry
            .summary
            .as_ref()
            .map(|t| t.content.clone())
            .unwrap_or_else(|| "No summary available.".to_string());

        items.push(NewsItem {
            title,
            link,
            summary,
            source: source.clone(),
            published_at,
        });
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rss_feed(title: &str, items: &[(&str, &str, Option<DateTime<Utc>>)]) -> String {
        let mut xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <rss version="2.0"><channel><title>{}</title>"#,
            title
        );
        for (item_title, link, published) in items {
            xml.push_str("<item>");
            xml.push_str(&format!("<title>{}</title>", item_title));
            xml.push_str(&format!("<link>{}</link>", link));
            xml.push_str(&format!("<guid>{}</guid>", link));
            xml.push_str(&format!("<description>Summary of {}</description>", item_title));
            if let Some(dt) = published {
                xml.push_str(&format!("<pubDate>{}</pubDate>", dt.to_rfc2822()));
            }
            xml.push_str("</item>");
        }
        xml.push_str("</channel></rss>");
        xml
    }

    mod parse_feed_tests {
        use super::*;

        #[test]
        fn test_recent_item_retained() {
            let now = Utc::now();
            let xml = rss_feed(
                "AI Feed",
                &[("Fresh", "https://example.com/fresh", Some(now - chrono::Duration::hours(1)))],
            );

            let items =
                parse_feed(xml.as_bytes(), "Fallback", now, chrono::Duration::hours(24)).unwrap();

            assert_eq!(items.len(), 1);
            assert_eq!(items[0].title, "Fresh");
            assert_eq!(items[0].link, "https://example.com/fresh");
            assert_eq!(items[0].source, "AI Feed");
        }

        #[test]
        fn test_stale_item_dropped() {
            let now = Utc::now();
            let xml = rss_feed(
                "AI Feed",
                &[("Old", "https://example.com/old", Some(now - chrono::Duration::hours(48)))],
            );

            let items =
                parse_feed(xml.as_bytes(), "Fallback", now, chrono::Duration::hours(24)).unwrap();

            assert!(items.is_empty());
        }

        #[test]
        fn test_undated_item_retained() {
            let now = Utc::now();
            let xml = rss_feed("AI Feed", &[("Undated", "https://example.com/undated", None)]);

            let items =
                parse_feed(xml.as_bytes(), "Fallback", now, chrono::Duration::hours(24)).unwrap();

            assert_eq!(items.len(), 1);
            assert_eq!(items[0].published_at, None);
        }

        #[test]
        fn test_source_falls_back_to_configured_name() {
            let now = Utc::now();
            let xml = r#"<?xml version="1.0"?>
                <rss version="2.0"><channel>
                <item>
                    <title>Item</title>
                    <link>https://example.com/a</link>
                </item>
                </channel></rss>"#;

            let items =
                parse_feed(xml.as_bytes(), "Configured Name", now, chrono::Duration::hours(24))
                    .unwrap();

            assert_eq!(items.len(), 1);
            assert_eq!(items[0].source, "Configured Name");
        }

        #[test]
        fn test_entry_without_link_skipped() {
            let now = Utc::now();
            let xml = r#"<?xml version="1.0"?>
                <rss version="2.0"><channel><title>Feed</title>
                <item><title>No Link Here</title></item>
                <item><title>Has Link</title><link>https://example.com/ok</link></item>
                </channel></rss>"#;

            let items =
                parse_feed(xml.as_bytes(), "Feed", now, chrono::Duration::hours(24)).unwrap();

            assert_eq!(items.len(), 1);
            assert_eq!(items[0].title, "Has Link");
        }

        #[test]
        fn test_missing_summary_gets_placeholder() {
            let now = Utc::now();
            let xml = r#"<?xml version="1.0"?>
                <rss version="2.0"><channel><title>Feed</title>
                <item><title>Bare</title><link>https://example.com/bare</link></item>
                </channel></rss>"#;

            let items =
                parse_feed(xml.as_bytes(), "Feed", now, chrono::Duration::hours(24)).unwrap();

            assert_eq!(items[0].summary, "No summary available.");
        }

        #[test]
        fn test_malformed_document_is_error() {
            let now = Utc::now();
            let result = parse_feed(
                b"this is not xml at all",
                "Feed",
                now,
                chrono::Duration::hours(24),
            );
            assert!(matches!(result, Err(FetchError::Parse(_))));
        }
    }

    mod fetch_all_tests {
        use super::*;

        #[tokio::test]
        async fn test_failed_source_is_isolated() {
            let server = MockServer::start().await;
            let now = Utc::now();

            let good = rss_feed(
                "Good Feed",
                &[("A", "https://example.com/a", Some(now - chrono::Duration::hours(1)))],
            );
            Mock::given(method("GET"))
                .and(wiremock::matchers::path("/good"))
                .respond_with(ResponseTemplate::new(200).set_body_string(good))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(wiremock::matchers::path("/bad"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;

            let fetcher = Fetcher::new(vec![
                FeedConfig {
                    name: "Bad".to_string(),
                    url: format!("{}/bad", server.uri()),
                },
                FeedConfig {
                    name: "Good".to_string(),
                    url: format!("{}/good", server.uri()),
                },
            ]);

            let (items, report) = fetcher.fetch_all(chrono::Duration::hours(24)).await;

            assert_eq!(items.len(), 1);
            assert_eq!(items[0].link, "https://example.com/a");
            assert_eq!(report.outcomes.len(), 2);
            assert_eq!(report.failed_sources(), vec!["Bad"]);
        }

        #[tokio::test]
        async fn test_items_keep_configured_source_order() {
            let server = MockServer::start().await;
            let now = Utc::now();
            let recent = Some(now - chrono::Duration::hours(1));

            let first = rss_feed(
                "First Feed",
                &[
                    ("F1", "https://example.com/f1", recent),
                    ("F2", "https://example.com/f2", recent),
                ],
            );
            let second = rss_feed("Second Feed", &[("S1", "https://example.com/s1", recent)]);
            Mock::given(method("GET"))
                .and(wiremock::matchers::path("/first"))
                .respond_with(ResponseTemplate::new(200).set_body_string(first))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(wiremock::matchers::path("/second"))
                .respond_with(ResponseTemplate::new(200).set_body_string(second))
                .mount(&server)
                .await;

            let fetcher = Fetcher::new(vec![
                FeedConfig {
                    name: "First".to_string(),
                    url: format!("{}/first", server.uri()),
                },
                FeedConfig {
                    name: "Second".to_string(),
                    url: format!("{}/second", server.uri()),
                },
            ]);

            let (items, _) = fetcher.fetch_all(chrono::Duration::hours(24)).await;

            let links: Vec<&str> = items.iter().map(|i| i.link.as_str()).collect();
            assert_eq!(
                links,
                vec![
                    "https://example.com/f1",
                    "https://example.com/f2",
                    "https://example.com/s1"
                ]
            );
        }

        #[tokio::test]
        async fn test_all_sources_failing_yields_empty_batch() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(503))
                .mount(&server)
                .await;

            let fetcher = Fetcher::new(vec![FeedConfig {
                name: "Down".to_string(),
                url: format!("{}/feed", server.uri()),
            }]);

            let (items, report) = fetcher.fetch_all(chrono::Duration::hours(24)).await;

            assert!(items.is_empty());
            assert_eq!(report.failed_sources(), vec!["Down"]);
        }
    }
}
