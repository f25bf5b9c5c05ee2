//! Image reference parsing.

use std::fmt;

/// A parsed container image reference.
///
/// `registry/repository:tag`, with the registry and tag filled in with
/// the conventional defaults when absent. The first path segment is a
/// registry only when it looks like a hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

pub const DEFAULT_REGISTRY: &str = "docker.io";
pub const DEFAULT_TAG: &str = "latest";

impl ImageRef {
    pub fn parse(image: &str) -> Self {
        let (name, tag) = split_tag(image);

        let (registry, repository) = match name.split_once('/') {
            Some((first, rest)) if is_registry(first) => (first.to_string(), rest.to_string()),
            _ => (DEFAULT_REGISTRY.to_string(), name.to_string()),
        };

        Self {
            registry,
            repository,
            tag: tag.unwrap_or(DEFAULT_TAG).to_string(),
        }
    }

    /// Repository qualified by its registry, as used in pull requests.
    pub fn repo_path(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }
}

/// Split a trailing `:tag`, careful not to eat a registry port.
fn split_tag(image: &str) -> (&str, Option<&str>) {
    match image.rsplit_once(':') {
        Some((name, tag)) if !tag.contains('/') => (name, Some(tag)),
        _ => (image, None),
    }
}

/// Hostname heuristic: a dot, a port, or localhost.
fn is_registry(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_gets_default_registry_and_tag() {
        let r = ImageRef::parse("redis");
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "redis");
        assert_eq!(r.tag, "latest");
    }

    #[test]
    fn namespaced_repo_without_registry() {
        let r = ImageRef::parse("acme/hello:0.1.2");
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "acme/hello");
        assert_eq!(r.tag, "0.1.2");
    }

    #[test]
    fn explicit_registry_with_port() {
        let r = ImageRef::parse("registry.local:5000/team/app:v3");
        assert_eq!(r.registry, "registry.local:5000");
        assert_eq!(r.repository, "team/app");
        assert_eq!(r.tag, "v3");
        assert_eq!(r.repo_path(), "registry.local:5000/team/app");
    }

    #[test]
    fn localhost_is_a_registry() {
        let r = ImageRef::parse("localhost/app");
        assert_eq!(r.registry, "localhost");
        assert_eq!(r.repository, "app");
    }

    #[test]
    fn port_without_tag_is_not_a_tag() {
        // The colon belongs to the registry, not a tag.
        let r = ImageRef::parse("registry.local:5000/team/app");
        assert_eq!(r.registry, "registry.local:5000");
        assert_eq!(r.repository, "team/app");
        assert_eq!(r.tag, "latest");
    }

    #[test]
    fn display_round_trips_fully_qualified_refs() {
        let r = ImageRef::parse("quay.io/org/app:1.0");
        assert_eq!(r.to_string(), "quay.io/org/app:1.0");
    }
}
