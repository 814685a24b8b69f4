use base64::Engine as _;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Blob path prefix for short links.
pub const LINK_PREFIX: &str = "links/";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortLink {
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ShortLink {
    pub fn pathname(code: &str) -> String {
        format!("{}{}.json", LINK_PREFIX, code)
    }

    pub fn is_expired(&self, now: OffsetDateTime, ttl_days: i64) -> bool {
        now - self.created_at > time::Duration::days(ttl_days)
    }
}

/// A link carried entirely in the short code: base64 of `timestamp|url`,
/// where the timestamp is unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedLink {
    pub timestamp_ms: i64,
    pub url: String,
}

impl EmbeddedLink {
    pub fn encode(timestamp_ms: i64, url: &str) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(format!("{}|{}", timestamp_ms, url))
    }

    /// Accepts url-safe and standard alphabets, padded or not. Anything that
    /// does not decode to a timestamp and an absolute http(s) URL is `None`.
    pub fn decode(code: &str) -> Option<Self> {
        use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};

        let bytes = [URL_SAFE_NO_PAD, URL_SAFE, STANDARD, STANDARD_NO_PAD]
            .iter()
            .find_map(|engine| engine.decode(code).ok())?;
        let text = String::from_utf8(bytes).ok()?;
        let (ts, url) = text.split_once('|')?;
        let timestamp_ms: i64 = ts.trim().parse().ok()?;
        if timestamp_ms < 0 {
            return None;
        }
        let parsed = url::Url::parse(url.trim()).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        Some(Self { timestamp_ms, url: parsed.to_string() })
    }

    pub fn is_expired(&self, now: OffsetDateTime, ttl_days: i64) -> bool {
        let now_ms = (now.unix_timestamp_nanos() / 1_000_000) as i64;
        let ttl_ms = ttl_days.saturating_mul(86_400_000);
        match now_ms.checked_sub(self.timestamp_ms) {
            Some(age) => age > ttl_ms,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    #[test]
    fn decodes_url_safe_and_standard_codes() {
        let code = EmbeddedLink::encode(1_700_000_000_000, "https://example.com/a?b=c");
        let link = EmbeddedLink::decode(&code).unwrap();
        assert_eq!(link.timestamp_ms, 1_700_000_000_000);
        assert_eq!(link.url, "https://example.com/a?b=c");

        let standard = STANDARD.encode("1700000000000|https://example.com/");
        assert!(EmbeddedLink::decode(&standard).is_some());
    }

    #[test]
    fn rejects_non_links() {
        assert!(EmbeddedLink::decode("deadbeef").is_none());
        assert!(EmbeddedLink::decode(&STANDARD.encode("123|javascript:alert(1)")).is_none());
        assert!(EmbeddedLink::decode(&STANDARD.encode("soon|https://example.com")).is_none());
        assert!(EmbeddedLink::decode(&STANDARD.encode("-1|https://example.com")).is_none());
    }

    #[test]
    fn embedded_links_expire_after_ttl() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let fresh = EmbeddedLink { timestamp_ms: 1_700_000_000_000 - 86_400_000, url: "https://x".into() };
        let stale = EmbeddedLink { timestamp_ms: 1_700_000_000_000 - 31 * 86_400_000, url: "https://x".into() };
        assert!(!fresh.is_expired(now, 30));
        assert!(stale.is_expired(now, 30));
    }

    #[test]
    fn out_of_range_timestamps_count_as_expired() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let min = EmbeddedLink { timestamp_ms: i64::MIN, url: "https://x".into() };
        assert!(min.is_expired(now, 30));

        let min_code = STANDARD.encode(format!("{}|https://evil.example/", i64::MIN));
        assert!(EmbeddedLink::decode(&min_code).is_none());
    }

    #[test]
    fn short_links_expire_after_ttl() {
        let now = OffsetDateTime::now_utc();
        let link = ShortLink { url: "https://x".into(), created_at: now - time::Duration::days(31) };
        assert!(link.is_expired(now, 30));
        assert_eq!(ShortLink::pathname("0a1b2c3d"), "links/0a1b2c3d.json");
    }
}
