//! Candidate URL generation

use chrono::NaiveDate;

use crate::config::ResolverConfig;

/// Whether the official source can carry an item of this date
pub(crate) fn uses_official_source(config: &ResolverConfig, date: NaiveDate) -> bool {
    date >= config.official_since && !config.secondary_only_dates.contains(&date)
}

/// Ordered, de-duplicated official candidates for `date`
///
/// An override for the date replaces generation entirely. Otherwise the scraped
/// link (if any) comes first, followed by one URL per configured stem.
pub(crate) fn official_candidates(
    config: &ResolverConfig,
    date: NaiveDate,
    scraped_link: Option<&str>,
) -> Vec<String> {
    if let Some(name) = config.overrides.get(&date) {
        return vec![override_url(config, date, name)];
    }

    let mut candidates: Vec<String> = Vec::with_capacity(config.filename_stems.len() + 1);
    let scraped = scraped_link.map(str::trim).filter(|link| !link.is_empty());
    let generated = config
        .filename_stems
        .iter()
        .map(|stem| stem_url(config, date, stem));

    for url in scraped.map(String::from).into_iter().chain(generated) {
        if !candidates.contains(&url) {
            candidates.push(url);
        }
    }
    candidates
}

/// The fallback URL, if it is absolute http(s) and its host is not blocked
pub(crate) fn usable_fallback(config: &ResolverConfig, fallback: &str) -> Option<String> {
    let parsed = url::Url::parse(fallback.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?;
    let blocked = config
        .blocked_fallback_hosts
        .iter()
        .any(|blocked| blocked.eq_ignore_ascii_case(host));
    if blocked {
        return None;
    }
    // The parsed form has embedded tabs and newlines stripped
    Some(parsed.to_string())
}

fn stem_url(config: &ResolverConfig, date: NaiveDate, stem: &str) -> String {
    let file_name = format!("{}_{}.mp3", date.format("%Y%m%d"), stem);
    format!("{}/{}", date_dir(config, date), urlencoding::encode(&file_name))
}

fn override_url(config: &ResolverConfig, date: NaiveDate, name: &str) -> String {
    if name.starts_with("http://") || name.starts_with("https://") {
        return name.to_string();
    }
    format!("{}/{}", date_dir(config, date), urlencoding::encode(name))
}

fn date_dir(config: &ResolverConfig, date: NaiveDate) -> String {
    format!(
        "{}/{}",
        config.official_base_url.trim_end_matches('/'),
        date.format("%Y/%m/%-d")
    )
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config() -> ResolverConfig {
        ResolverConfig {
            official_base_url: "https://official.example/audio/".to_string(),
            filename_stems: vec![
                "Kontrafunk_aktuell".to_string(),
                "Kontrafunk aktuell".to_string(),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn path_uses_unpadded_day_and_compact_date_prefix() {
        let candidates = official_candidates(&config(), date(2024, 1, 5), None);

        assert_eq!(
            candidates,
            vec![
                "https://official.example/audio/2024/01/5/20240105_Kontrafunk_aktuell.mp3",
                "https://official.example/audio/2024/01/5/20240105_Kontrafunk%20aktuell.mp3",
            ]
        );
    }

    #[test]
    fn scraped_link_comes_first_and_is_not_repeated() {
        let generated = "https://official.example/audio/2024/01/5/20240105_Kontrafunk_aktuell.mp3";
        let candidates = official_candidates(&config(), date(2024, 1, 5), Some(generated));
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0], generated);

        let scraped = "https://official.example/other/episode.mp3";
        let candidates = official_candidates(&config(), date(2024, 1, 5), Some(scraped));
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0], scraped);
    }

    #[test]
    fn override_replaces_generated_candidates() {
        let mut config = config();
        config
            .overrides
            .insert(date(2023, 11, 6), "20231106_KF aktuell.mp3".to_string());
        config.overrides.insert(
            date(2023, 11, 7),
            "https://elsewhere.example/x.mp3".to_string(),
        );

        assert_eq!(
            official_candidates(&config, date(2023, 11, 6), Some("https://scraped.example/a.mp3")),
            vec!["https://official.example/audio/2023/11/6/20231106_KF%20aktuell.mp3"]
        );
        assert_eq!(
            official_candidates(&config, date(2023, 11, 7), None),
            vec!["https://elsewhere.example/x.mp3"]
        );
    }

    #[test]
    fn official_source_starts_at_cutoff_and_skips_secondary_only_dates() {
        let mut config = config();
        config.official_since = date(2023, 7, 20);
        config.secondary_only_dates.insert(date(2023, 10, 27));

        assert!(!uses_official_source(&config, date(2023, 7, 19)));
        assert!(uses_official_source(&config, date(2023, 7, 20)));
        assert!(!uses_official_source(&config, date(2023, 10, 27)));
    }

    #[test]
    fn fallback_must_be_absolute_http_and_not_blocked() {
        let mut config = config();
        config.blocked_fallback_hosts = vec!["Mirror.Example".to_string()];

        assert_eq!(
            usable_fallback(&config, "https://cdn.example/a.mp3").as_deref(),
            Some("https://cdn.example/a.mp3")
        );
        assert!(usable_fallback(&config, "/episodes/a.mp3").is_none());
        assert!(usable_fallback(&config, "ftp://cdn.example/a.mp3").is_none());
        assert!(usable_fallback(&config, "https://mirror.example/a.mp3").is_none());
        assert!(usable_fallback(&config, "").is_none());
    }

    #[test]
    fn fallback_is_returned_in_parsed_form() {
        let config = ResolverConfig::default();

        let url = usable_fallback(&config, " https://cdn.example/a\tb\n.mp3 ").unwrap();

        assert_eq!(url, "https://cdn.example/ab.mp3");
        assert!(!url.contains(char::is_control));
    }
}
