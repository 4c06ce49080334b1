//! Lookup response parsing.
//!
//! Success: `{"location": {"lat": .., "lng": ..}, "accuracy": .., "fallback": "lacf"}`.
//! Failure: `{"error": {"code": 403, "message": "..", "errors": [{"reason": "keyInvalid"}]}}`.
//! When a failure body cannot be parsed the HTTP status decides.

use serde::Deserialize;

use super::error::LookupError;
use super::transport::TransportResponse;
use crate::cell::Coordinates;

#[derive(Debug, Deserialize)]
struct GeolocateResponse {
    location: LatLng,
    #[serde(default)]
    accuracy: Option<f64>,
    #[serde(default)]
    fallback: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}

/// A location returned by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFix {
    /// Position with the reported accuracy radius.
    pub coordinates: Coordinates,
    /// Set when the service answered from a fallback (`lacf` or `ipf`).
    pub fallback: Option<String>,
}

/// Interpret a transport response.
pub fn parse_response(response: &TransportResponse) -> Result<ParsedFix, LookupError> {
    if !response.is_success() {
        return Err(classify_failure(response));
    }

    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Err(LookupError::MalformedResponse("empty body".to_string()));
    }

    let parsed: GeolocateResponse = serde_json::from_slice(&response.body)
        .map_err(|e| LookupError::MalformedResponse(e.to_string()))?;

    let mut coordinates = Coordinates::new(parsed.location.lat, parsed.location.lng);
    if !coordinates.is_valid() {
        return Err(LookupError::MalformedResponse(format!(
            "coordinates out of range: {}, {}",
            parsed.location.lat, parsed.location.lng
        )));
    }
    coordinates.accuracy = parsed.accuracy.filter(|a| a.is_finite() && *a >= 0.0);

    Ok(ParsedFix {
        coordinates,
        fallback: parsed.fallback.filter(|f| !f.is_empty()),
    })
}

fn classify_failure(response: &TransportResponse) -> LookupError {
    if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(&response.body) {
        let reason = envelope
            .error
            .errors
            .iter()
            .find_map(|d| d.reason.as_deref());
        tracing::debug!(
            status = response.status,
            code = ?envelope.error.code,
            reason = ?reason,
            message = ?envelope.error.message,
            "Location service error"
        );
        match reason {
            Some("keyInvalid") | Some("keyExpired") => return LookupError::InvalidKey,
            Some("dailyLimitExceeded") | Some("userRateLimitExceeded") => {
                return LookupError::QuotaExceeded
            }
            Some("notFound") => return LookupError::NotFound,
            Some("parseError") | Some("invalid") => return LookupError::MalformedRequest,
            _ => {}
        }
    }

    match response.status {
        400 => LookupError::MalformedRequest,
        401 | 403 => LookupError::InvalidKey,
        404 => LookupError::NotFound,
        429 => LookupError::QuotaExceeded,
        status => LookupError::HttpStatus(status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> TransportResponse {
        TransportResponse::new(status, body)
    }

    #[test]
    fn test_parse_success() {
        let fix = parse_response(&response(
            200,
            r#"{"location": {"lat": 55.7539, "lng": 37.6208}, "accuracy": 1200.5}"#,
        ))
        .unwrap();

        assert!((fix.coordinates.latitude - 55.7539).abs() < 1e-9);
        assert!((fix.coordinates.longitude - 37.6208).abs() < 1e-9);
        assert_eq!(fix.coordinates.accuracy, Some(1200.5));
        assert!(fix.fallback.is_none());
    }

    #[test]
    fn test_parse_fallback_answer() {
        let fix = parse_response(&response(
            200,
            r#"{"location": {"lat": 1.0, "lng": 2.0}, "accuracy": 25000, "fallback": "lacf"}"#,
        ))
        .unwrap();
        assert_eq!(fix.fallback.as_deref(), Some("lacf"));
    }

    #[test]
    fn test_empty_and_garbage_bodies() {
        assert!(matches!(
            parse_response(&response(200, "")),
            Err(LookupError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_response(&response(200, "<html>")),
            Err(LookupError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_response(&response(200, r#"{"location": {"lat": 95.0, "lng": 0.0}}"#)),
            Err(LookupError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_error_reasons() {
        let body = |reason: &str| {
            format!(
                r#"{{"error": {{"code": 400, "message": "x", "errors": [{{"reason": "{}"}}]}}}}"#,
                reason
            )
        };

        assert_eq!(
            parse_response(&response(400, &body("keyInvalid"))),
            Err(LookupError::InvalidKey)
        );
        assert_eq!(
            parse_response(&response(403, &body("dailyLimitExceeded"))),
            Err(LookupError::QuotaExceeded)
        );
        assert_eq!(
            parse_response(&response(404, &body("notFound"))),
            Err(LookupError::NotFound)
        );
        assert_eq!(
            parse_response(&response(400, &body("parseError"))),
            Err(LookupError::MalformedRequest)
        );
    }

    #[test]
    fn test_status_fallback_classification() {
        assert_eq!(
            parse_response(&response(403, "forbidden")),
            Err(LookupError::InvalidKey)
        );
        assert_eq!(parse_response(&response(404, "")), Err(LookupError::NotFound));
        assert_eq!(
            parse_response(&response(503, "")),
            Err(LookupError::HttpStatus(503))
        );
    }
}
