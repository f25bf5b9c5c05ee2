//! The validate-then-pull protocol.
//!
//! Credentials are resolved during validation even when the image is
//! already present, so broken auth surfaces before the hot path needs
//! a pull. Pulling without validating is a programming error and gets
//! a typed error rather than proceeding with no credentials.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{DriverError, DriverResult};
use crate::image::ImageRef;

/// Credentials for one registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
    pub server_address: String,
}

/// Pull request parameters, produced only after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub repository: String,
    pub tag: String,
    pub auth: RegistryAuth,
}

/// Per-call image pull state.
pub struct ImagePull {
    image: ImageRef,
    raw: String,
    auth: Option<RegistryAuth>,
}

impl ImagePull {
    pub fn new(image: &str) -> Self {
        Self {
            image: ImageRef::parse(image),
            raw: image.to_string(),
            auth: None,
        }
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    /// Resolve registry credentials and decide whether a pull is
    /// needed. `present` is whether the image already exists locally.
    pub fn validate(&mut self, auths: &HashMap<String, RegistryAuth>, present: bool) -> bool {
        let auth = auths.get(&self.image.registry).cloned().unwrap_or_default();
        debug!(
            image = %self.raw,
            registry = %self.image.registry,
            username = %auth.username,
            present,
            "validated image"
        );
        self.auth = Some(auth);
        !present
    }

    /// Build the pull request. Fails unless `validate` has run.
    pub fn pull_request(&self) -> DriverResult<PullRequest> {
        let auth = self
            .auth
            .clone()
            .ok_or(DriverError::PullBeforeValidate)?;
        Ok(PullRequest {
            repository: self.image.repo_path(),
            tag: self.image.tag.clone(),
            auth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auths() -> HashMap<String, RegistryAuth> {
        let mut m = HashMap::new();
        m.insert(
            "registry.local:5000".to_string(),
            RegistryAuth {
                username: "svc".to_string(),
                password: "hunter2".to_string(),
                server_address: "registry.local:5000".to_string(),
            },
        );
        m
    }

    #[test]
    fn pull_before_validate_is_a_typed_error() {
        let pull = ImagePull::new("registry.local:5000/team/app:v1");
        assert!(matches!(
            pull.pull_request(),
            Err(DriverError::PullBeforeValidate)
        ));
    }

    #[test]
    fn validate_reports_whether_a_pull_is_needed() {
        let mut pull = ImagePull::new("registry.local:5000/team/app:v1");
        assert!(pull.validate(&auths(), false));
        assert!(!pull.validate(&auths(), true));
    }

    #[test]
    fn validated_pull_carries_registry_credentials() {
        let mut pull = ImagePull::new("registry.local:5000/team/app:v1");
        pull.validate(&auths(), false);

        let req = pull.pull_request().unwrap();
        assert_eq!(req.repository, "registry.local:5000/team/app");
        assert_eq!(req.tag, "v1");
        assert_eq!(req.auth.username, "svc");
    }

    #[test]
    fn unknown_registry_validates_with_anonymous_auth() {
        let mut pull = ImagePull::new("redis");
        pull.validate(&auths(), false);

        let req = pull.pull_request().unwrap();
        assert_eq!(req.auth, RegistryAuth::default());
    }
}
