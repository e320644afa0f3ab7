//! Common test utilities for kfdl integration tests

#![allow(dead_code)]

use kfdl::Config;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Bytes served for every episode download
pub const EPISODE_BYTES: &[u8] = b"ID3\x04\x00\x00\x00\x00\x00\x00episode audio";

/// One `<item>` of a generated RSS feed
pub struct FeedEntry {
    pub title: String,
    pub pub_date: String,
    pub enclosure: String,
}

impl FeedEntry {
    pub fn new(title: &str, pub_date: &str, enclosure: &str) -> Self {
        Self {
            title: title.to_string(),
            pub_date: pub_date.to_string(),
            enclosure: enclosure.to_string(),
        }
    }
}

/// Render an RSS 2.0 document listing `entries`
pub fn rss_feed(entries: &[FeedEntry]) -> String {
    let items: String = entries
        .iter()
        .map(|entry| {
            format!(
                r#"<item>
      <title>{}</title>
      <pubDate>{}</pubDate>
      <enclosure url="{}" length="1000" type="audio/mpeg"/>
      <category>Politik</category>
    </item>
    "#,
                entry.title, entry.pub_date, entry.enclosure
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Kontrafunk aktuell</title>
    <link>https://kontrafunk.radio</link>
    <description>Test feed</description>
    {items}
  </channel>
</rss>"#
    )
}

/// Configuration pointing every HTTP collaborator at `server`
pub fn test_config(server: &MockServer, working_dir: &Path) -> Config {
    let mut config = Config::for_working_dir(working_dir);
    config.feed.url = format!("{}/feed.xml", server.uri());
    config.resolver.official_base_url = format!("{}/sendungen", server.uri());
    config.resolver.probe_timeout = Duration::from_secs(2);
    config.download.transfer_timeout = Duration::from_secs(10);
    config.ledger.save_interval = Duration::ZERO;
    config.tagging.enabled = false;
    config
}

/// Serve the feed at `/feed.xml`
pub async fn mount_feed(server: &MockServer, entries: &[FeedEntry]) {
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(rss_feed(entries)),
        )
        .mount(server)
        .await;
}

/// Answer existence probes for `url_path` with 200
pub async fn mount_reachable(server: &MockServer, url_path: &str) {
    Mock::given(method("HEAD"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

/// Serve the episode bytes at `url_path`, expecting exactly `times` downloads
pub async fn mount_download(server: &MockServer, url_path: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(EPISODE_BYTES))
        .expect(times)
        .mount(server)
        .await;
}
