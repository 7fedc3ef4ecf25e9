//! The tagged result type returned by every account operation.

use serde::Serialize;

/// Outcome of a single account operation.
///
/// Expected business conditions never surface as `Err`: a duplicate
/// username, a wrong password, or a zero-row update all come back as
/// [`ServiceResponse::Failure`] with a human-readable message. The outer
/// `Result` wrapping this type is reserved for data-access faults.
///
/// Three success shapes exist, mirroring the caller contract: content-free,
/// message-only, and payload-carrying (optionally with a message).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ServiceResponse<T> {
    Success {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<T>,
    },
    Failure {
        message: String,
    },
}

impl<T> ServiceResponse<T> {
    /// Content-free success.
    pub fn ok() -> Self {
        Self::Success {
            message: None,
            payload: None,
        }
    }

    /// Success carrying only a message.
    pub fn ok_message(message: impl Into<String>) -> Self {
        Self::Success {
            message: Some(message.into()),
            payload: None,
        }
    }

    /// Success carrying only a payload.
    pub fn ok_payload(payload: T) -> Self {
        Self::Success {
            message: None,
            payload: Some(payload),
        }
    }

    /// Success carrying both a message and a payload.
    pub fn ok_with(message: impl Into<String>, payload: T) -> Self {
        Self::Success {
            message: Some(message.into()),
            payload: Some(payload),
        }
    }

    /// Content-free failure.
    pub fn err() -> Self {
        Self::Failure {
            message: String::new(),
        }
    }

    /// Failure carrying a message.
    pub fn err_message(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { message, .. } => message.as_deref(),
            Self::Failure { message } => Some(message.as_str()),
        }
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            Self::Success { payload, .. } => payload.as_ref(),
            Self::Failure { .. } => None,
        }
    }

    pub fn into_payload(self) -> Option<T> {
        match self {
            Self::Success { payload, .. } => payload,
            Self::Failure { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_variants_report_success() {
        assert!(ServiceResponse::<()>::ok().is_success());
        assert!(ServiceResponse::<()>::ok_message("done").is_success());
        assert!(ServiceResponse::ok_payload(42).is_success());
        assert!(ServiceResponse::ok_with("done", 42).is_success());
        assert!(!ServiceResponse::<()>::err().is_success());
        assert!(!ServiceResponse::<()>::err_message("nope").is_success());
    }

    #[test]
    fn accessors_expose_message_and_payload() {
        let response = ServiceResponse::ok_with("done", 42);
        assert_eq!(response.message(), Some("done"));
        assert_eq!(response.payload(), Some(&42));
        assert_eq!(response.into_payload(), Some(42));

        let failure = ServiceResponse::<i32>::err_message("nope");
        assert_eq!(failure.message(), Some("nope"));
        assert!(failure.payload().is_none());
        assert!(failure.into_payload().is_none());
    }

    #[test]
    fn serializes_with_status_tag() {
        let success = ServiceResponse::ok_with("done", 42);
        let json = serde_json::to_value(&success).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "done");
        assert_eq!(json["payload"], 42);

        let failure = ServiceResponse::<i32>::err_message("nope");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["message"], "nope");

        // Content-free success omits both optional fields.
        let bare = ServiceResponse::<i32>::ok();
        let json = serde_json::to_value(&bare).unwrap();
        assert!(json.get("message").is_none());
        assert!(json.get("payload").is_none());
    }
}
