//! Container image reference checking
//!
//! The workflow validator delegates image checking to a pluggable collaborator
//! so deployments can swap in registry-aware checks. The default checker is
//! purely syntactic.

/// Checks a container image reference, returning all problems found
///
/// An empty result means the reference is acceptable. Problem strings are
/// wrapped by the workflow validator as `invalid image: <problem>`.
#[cfg_attr(test, mockall::automock)]
pub trait ImageReferenceChecker: Send + Sync {
    /// Check one image reference
    fn check_image_reference(&self, image: &str) -> Vec<String>;
}

/// Syntactic checker for `[registry/]repository[:tag][@digest]` references
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerImageChecker;

impl DockerImageChecker {
    /// Create a new syntactic checker
    pub fn new() -> Self {
        Self
    }
}

impl ImageReferenceChecker for DockerImageChecker {
    fn check_image_reference(&self, image: &str) -> Vec<String> {
        let mut problems = Vec::new();

        if image.is_empty() {
            problems.push("image reference is empty".to_string());
            return problems;
        }

        let (name, digest) = match image.split_once('@') {
            Some((name, digest)) => (name, Some(digest)),
            None => (image, None),
        };

        // A colon after the last slash separates the tag; earlier colons
        // belong to a registry port
        let (repository, tag) = match name.rfind(':') {
            Some(pos) if pos > name.rfind('/').unwrap_or(0) => {
                (&name[..pos], Some(&name[pos + 1..]))
            }
            _ => (name, None),
        };

        if repository.is_empty() {
            problems.push("image reference has no repository".to_string());
        } else {
            let mut components = repository.split('/').peekable();
            // Only the first component can be a registry host
            if components.peek().is_some_and(|c| is_registry(c)) {
                components.next();
            }
            for component in components {
                if component.is_empty() {
                    problems.push(format!("invalid repository name '{repository}'"));
                    break;
                }
                if !component
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-".contains(c))
                {
                    problems.push(format!("invalid repository component '{component}'"));
                }
            }
        }

        if let Some(tag) = tag {
            let valid = !tag.is_empty()
                && tag.len() <= 128
                && tag.chars().all(|c| c.is_ascii_alphanumeric() || "._-".contains(c));
            if !valid {
                problems.push(format!("invalid tag '{tag}'"));
            }
        }

        if let Some(digest) = digest {
            let valid = digest
                .strip_prefix("sha256:")
                .map(|hex| hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()))
                .unwrap_or(false);
            if !valid {
                problems.push(format!("invalid digest '{digest}'"));
            }
        }

        problems
    }
}

// A first path component is a registry when it looks like a hostname:port or
// contains a dot, e.g. registry.example.com or localhost:5000
fn is_registry(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}
