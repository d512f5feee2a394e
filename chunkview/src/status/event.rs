//! Push events emitted by the dataset status channel.

use serde::Deserialize;

use crate::fetch::ProcessingStatus;

/// One notification about a dataset's processing progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// `status_update{status}`.
    StatusUpdate(ProcessingStatus),
    /// `parsing_error{message}`: the server could not parse the upload.
    ParsingError(String),
    /// `error{message}`: processing failed for another reason.
    Error(String),
    /// The channel ended without being closed by the subscriber.
    Closed,
}

/// Reasons a frame could not be turned into a [`PushEvent`].
#[derive(Debug, thiserror::Error)]
pub enum EventDecodeError {
    #[error("invalid event JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event '{event}' has no '{field}' field")]
    MissingField { event: String, field: &'static str },

    #[error("unknown dataset status '{0}'")]
    UnknownStatus(String),
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    event: String,
    status: Option<String>,
    message: Option<String>,
}

impl PushEvent {
    /// Decode a text frame.
    ///
    /// Returns `Ok(None)` for well-formed events this client does not handle,
    /// so new server-side event kinds do not break old clients.
    pub fn decode(text: &str) -> Result<Option<Self>, EventDecodeError> {
        let raw: RawEvent = serde_json::from_str(text)?;

        let event = match raw.event.as_str() {
            "status_update" => {
                let status = raw.status.ok_or_else(|| EventDecodeError::MissingField {
                    event: raw.event.clone(),
                    field: "status",
                })?;
                let status = ProcessingStatus::parse(&status)
                    .ok_or(EventDecodeError::UnknownStatus(status))?;
                PushEvent::StatusUpdate(status)
            }
            "parsing_error" => PushEvent::ParsingError(
                raw.message
                    .unwrap_or_else(|| "dataset could not be parsed".to_string()),
            ),
            "error" => PushEvent::Error(
                raw.message
                    .unwrap_or_else(|| "dataset processing failed".to_string()),
            ),
            _ => return Ok(None),
        };

        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_status_update() {
        let event = PushEvent::decode(r#"{"event": "status_update", "status": "ready"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event, PushEvent::StatusUpdate(ProcessingStatus::Ready));
    }

    #[test]
    fn test_decode_error_events() {
        let event = PushEvent::decode(r#"{"event": "parsing_error", "message": "bad quote"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event, PushEvent::ParsingError("bad quote".to_string()));

        let event = PushEvent::decode(r#"{"event": "error"}"#).unwrap().unwrap();
        assert_eq!(
            event,
            PushEvent::Error("dataset processing failed".to_string())
        );
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        let event = PushEvent::decode(r#"{"event": "progress", "percent": 40}"#).unwrap();
        assert!(event.is_none());
    }

    #[test]
    fn test_decode_failures() {
        assert!(matches!(
            PushEvent::decode("garbage"),
            Err(EventDecodeError::Json(_))
        ));
        assert!(matches!(
            PushEvent::decode(r#"{"event": "status_update"}"#),
            Err(EventDecodeError::MissingField { field: "status", .. })
        ));
        assert!(matches!(
            PushEvent::decode(r#"{"event": "status_update", "status": "halfway"}"#),
            Err(EventDecodeError::UnknownStatus(_))
        ));
    }
}
