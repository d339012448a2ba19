//! REST API module.
//!
//! Contains the item and account routes plus the header helpers they share.

mod aliments;
mod users;

pub use aliments::*;
pub use users::*;

use axum::{
    extract::FromRequest,
    http::{
        header::{ETAG, LAST_MODIFIED},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::models::Aliment;

/// Result type for route handlers.
pub type ApiResult<T = Response> = Result<T, AppError>;

/// JSON body extractor whose rejections render as the issue envelope.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Format a timestamp as an HTTP-date (IMF-fixdate).
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse a client supplied timestamp: HTTP-date first, RFC 3339 as a fallback.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// An item body with its `ETag` and `Last-Modified` headers.
pub fn aliment_response(status: StatusCode, aliment: &Aliment) -> Response {
    (
        status,
        [
            (ETAG, aliment.version.to_string()),
            (LAST_MODIFIED, http_date(aliment.updated)),
        ],
        Json(aliment),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_date_round_trip_at_second_precision() {
        let at = DateTime::from_timestamp_millis(1_700_000_000_789).unwrap();
        let formatted = http_date(at);
        assert_eq!(formatted, "Tue, 14 Nov 2023 22:13:20 GMT");

        let parsed = parse_http_date(&formatted).unwrap();
        assert_eq!(parsed.timestamp(), at.timestamp());
    }

    #[test]
    fn test_parse_rfc3339_fallback() {
        let parsed = parse_http_date("2023-11-14T22:13:20Z").unwrap();
        assert_eq!(parsed.timestamp(), 1_700_000_000);
        assert!(parse_http_date("yesterday").is_none());
    }
}
