use shipyard_model::DeploymentId;

/// Category token for per-line log events.
pub const BUILD_LOG: &str = "build-log";
/// Category token for end-of-stream events.
pub const BUILD_LOG_END: &str = "build-log-end";

/// Subject builder for one tenant namespace.
///
/// Subjects have the form `<prefix>.<category>.<deployment>`; the prefix is omitted when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subjects {
    prefix: String,
}

impl Subjects {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        Self {
            prefix: prefix.trim_matches('.').to_string(),
        }
    }

    pub fn log(&self, deployment: &DeploymentId) -> String {
        self.join(BUILD_LOG, deployment)
    }

    pub fn log_end(&self, deployment: &DeploymentId) -> String {
        self.join(BUILD_LOG_END, deployment)
    }

    /// Wildcard matching every category and deployment in the namespace.
    pub fn wildcard(&self) -> String {
        if self.prefix.is_empty() {
            ">".to_string()
        } else {
            format!("{}.>", self.prefix)
        }
    }

    fn join(&self, category: &str, deployment: &DeploymentId) -> String {
        let token = sanitize(deployment.as_str());
        if self.prefix.is_empty() {
            format!("{category}.{token}")
        } else {
            format!("{}.{category}.{token}", self.prefix)
        }
    }
}

/// Deployment IDs become a single subject token.
fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '.' | '*' | '>' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}
