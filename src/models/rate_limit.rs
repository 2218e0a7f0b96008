use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Outcome of a rate-limit check for one client in the current window.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// End of the current fixed window; the counter resets here.
    pub reset_at: DateTime<Utc>,
}

/// Surfaces the window metadata as response headers. Applied to admitted and
/// rejected responses alike so clients can self-throttle.
pub fn insert_rate_limit_headers(headers: &mut HeaderMap, status: &RateLimitStatus) {
    let pairs = [
        (RATE_LIMIT_LIMIT_HEADER, status.limit.to_string()),
        (RATE_LIMIT_REMAINING_HEADER, status.remaining.to_string()),
        (RATE_LIMIT_RESET_HEADER, status.reset_at.timestamp().to_string()),
    ];

    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn headers_carry_limit_remaining_and_epoch_reset() {
        let status = RateLimitStatus {
            allowed: true,
            limit: 60,
            remaining: 42,
            reset_at: Utc.timestamp_opt(1_700_000_060, 0).unwrap(),
        };

        let mut headers = HeaderMap::new();
        insert_rate_limit_headers(&mut headers, &status);

        assert_eq!(headers.get(RATE_LIMIT_LIMIT_HEADER).unwrap(), "60");
        assert_eq!(headers.get(RATE_LIMIT_REMAINING_HEADER).unwrap(), "42");
        assert_eq!(headers.get(RATE_LIMIT_RESET_HEADER).unwrap(), "1700000060");
    }
}
