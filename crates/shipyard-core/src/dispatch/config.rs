use std::{path::PathBuf, time::Duration};

use tracing::warn;

pub const ENV_DEADLINE_SECS: &str = "SHIPYARD_DEADLINE_SECS";
pub const ENV_GRACE_MS: &str = "SHIPYARD_GRACE_MS";
pub const ENV_WORKDIR: &str = "SHIPYARD_WORKDIR";

/// Tuning of one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Time budget measured from parameter acceptance.
    pub deadline: Duration,
    /// Pause before returning so the scheduler's log capture sees the final lines.
    pub grace: Duration,
    /// Scratch space for clones and builds.
    pub workdir: PathBuf,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(15 * 60),
            grace: Duration::from_secs(2),
            workdir: std::env::temp_dir(),
        }
    }
}

impl DispatchConfig {
    /// Defaults overridden by `SHIPYARD_DEADLINE_SECS`, `SHIPYARD_GRACE_MS` and `SHIPYARD_WORKDIR`.
    ///
    /// Unparseable numbers keep the default and are logged.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(secs) = number(&lookup, ENV_DEADLINE_SECS).filter(|s| *s > 0) {
            cfg.deadline = Duration::from_secs(secs);
        }
        if let Some(ms) = number(&lookup, ENV_GRACE_MS) {
            cfg.grace = Duration::from_millis(ms);
        }
        if let Some(dir) = lookup(ENV_WORKDIR).filter(|v| !v.trim().is_empty()) {
            cfg.workdir = PathBuf::from(dir);
        }
        cfg
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }
}

fn number<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!(target: "shipyard.dispatch", key, value = %raw, error = %e, "ignoring invalid setting");
            None
        }
    }
}
