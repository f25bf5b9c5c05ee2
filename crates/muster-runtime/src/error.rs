//! Driver errors and registry error classification.

use serde::Deserialize;
use thiserror::Error;

/// Errors crossing the driver boundary.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The registry refused our credentials for this image.
    #[error("not authorized to pull image '{image}'")]
    Unauthorized { image: String },

    /// The registry has no such image.
    #[error("image '{image}' not found")]
    ImageNotFound { image: String },

    /// Any other registry-side failure.
    #[error("failed to pull image '{image}': {message}")]
    Registry { image: String, message: String },

    /// `ImagePull::pull_request` called before `validate`.
    #[error("invalid usage: validate the image before pulling it")]
    PullBeforeValidate,

    /// Sandbox lifecycle failure reported by the daemon.
    #[error("sandbox error: {0}")]
    Sandbox(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Registry error payloads carry a JSON body with a "message" field.
#[derive(Deserialize)]
struct RegistryMessage {
    message: String,
}

/// Extract the human-readable message from a registry error body,
/// falling back to the raw body when it is not the expected JSON.
fn registry_message(body: &[u8]) -> String {
    match serde_json::from_slice::<RegistryMessage>(body) {
        Ok(v) => v.message,
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}

/// Map a registry HTTP failure onto a typed driver error.
///
/// Auth failures and missing images are caller-actionable and get
/// their own variants; everything else is an opaque registry failure.
pub fn classify_registry_error(image: &str, status: u16, body: &[u8]) -> DriverError {
    match status {
        401 | 403 => DriverError::Unauthorized {
            image: image.to_string(),
        },
        404 => DriverError::ImageNotFound {
            image: image.to_string(),
        },
        _ => DriverError::Registry {
            image: image.to_string(),
            message: registry_message(body),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_classify_as_unauthorized() {
        for status in [401, 403] {
            let err = classify_registry_error("repo/img:v1", status, b"{}");
            assert!(matches!(err, DriverError::Unauthorized { ref image } if image == "repo/img:v1"));
        }
    }

    #[test]
    fn missing_image_classifies_as_not_found() {
        let err = classify_registry_error("repo/img:v1", 404, b"");
        assert!(matches!(err, DriverError::ImageNotFound { .. }));
    }

    #[test]
    fn other_statuses_extract_the_json_message() {
        let err = classify_registry_error(
            "repo/img:v1",
            500,
            br#"{"message":"manifest blob unknown"}"#,
        );
        match err {
            DriverError::Registry { message, .. } => {
                assert_eq!(message, "manifest blob unknown");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_json_bodies_fall_back_to_the_raw_body() {
        let err = classify_registry_error("repo/img:v1", 502, b"bad gateway");
        match err {
            DriverError::Registry { message, .. } => assert_eq!(message, "bad gateway"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
