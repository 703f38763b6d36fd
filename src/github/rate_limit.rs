use reqwest::header::HeaderMap;
use std::time::Duration;

/// Below this many remaining requests the client waits for the window reset.
pub const LOW_WATERMARK: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimit {
    pub remaining: Option<u64>,
    pub reset: Option<i64>,
}

impl RateLimit {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .map(str::to_string)
        };
        Self {
            remaining: read("x-ratelimit-remaining").and_then(|v| v.parse().ok()),
            reset: read("x-ratelimit-reset").and_then(|v| v.parse().ok()),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// How long to pause before the next request, if at all. Waits until one
    /// second past the reset instant.
    pub fn wait_duration(&self, now_epoch: i64) -> Option<Duration> {
        let remaining = self.remaining?;
        if remaining >= LOW_WATERMARK {
            return None;
        }
        let reset = self.reset.unwrap_or(now_epoch);
        let secs = (reset - now_epoch).max(0) + 1;
        Some(Duration::from_secs(secs as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(remaining: &str, reset: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("x-ratelimit-remaining", HeaderValue::from_str(remaining).unwrap());
        h.insert("x-ratelimit-reset", HeaderValue::from_str(reset).unwrap());
        h
    }

    #[test]
    fn plenty_left_means_no_wait() {
        let rl = RateLimit::from_headers(&headers("4999", "1700000000"));
        assert_eq!(rl.remaining, Some(4999));
        assert_eq!(rl.wait_duration(1_699_999_000), None);
    }

    #[test]
    fn low_remaining_waits_until_reset() {
        let rl = RateLimit::from_headers(&headers("2", "1700000060"));
        assert_eq!(rl.wait_duration(1_700_000_000), Some(Duration::from_secs(61)));
        // reset already passed
        assert_eq!(rl.wait_duration(1_700_000_100), Some(Duration::from_secs(1)));
    }

    #[test]
    fn missing_headers_never_wait() {
        let rl = RateLimit::from_headers(&HeaderMap::new());
        assert_eq!(rl, RateLimit::default());
        assert_eq!(rl.wait_duration(0), None);
        assert!(!rl.is_exhausted());
    }
}
