//! Permission decisions for the `guard` command.
//!
//! A requesting process is identified by the owner of its `/proc/<pid>`
//! directory.

use crate::config::{ConfigError, GuardConfig};
use fanotify_codec::Verdict;
use std::collections::HashSet;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

/// Decides allow/deny for permission events.
#[derive(Debug, Clone)]
pub struct Policy {
    allowed_uids: HashSet<u32>,
    default_verdict: Verdict,
    audit: bool,
    proc_root: PathBuf,
}

/// Outcome of a decision, kept for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    /// Owner of the requesting process, if it could still be looked up.
    pub uid: Option<u32>,
}

impl Policy {
    pub fn new(allowed_uids: impl IntoIterator<Item = u32>, default_verdict: Verdict) -> Self {
        Self {
            allowed_uids: allowed_uids.into_iter().collect(),
            default_verdict,
            audit: false,
            proc_root: PathBuf::from("/proc"),
        }
    }

    pub fn from_config(config: &GuardConfig) -> Result<Self, ConfigError> {
        let policy = Self::new(config.allowed_uids.iter().copied(), config.default_verdict()?);
        Ok(policy.with_audit(config.audit))
    }

    pub fn with_audit(mut self, audit: bool) -> Self {
        self.audit = audit;
        self
    }

    #[cfg(test)]
    fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    /// Owner uid of a running process.
    pub fn process_uid(&self, pid: i32) -> Option<u32> {
        std::fs::metadata(self.proc_root.join(pid.to_string()))
            .ok()
            .map(|m| m.uid())
    }

    /// Verdict for a process owned by `uid`, or an unknown owner.
    pub fn decide_uid(&self, uid: Option<u32>) -> Verdict {
        let base = match uid {
            Some(uid) if self.allowed_uids.contains(&uid) => Verdict::FAN_ALLOW,
            _ => self.default_verdict,
        };
        if self.audit {
            base | Verdict::FAN_AUDIT
        } else {
            base
        }
    }

    /// Decide for the process that triggered a permission event.
    ///
    /// A process that has already exited gets the default verdict.
    pub fn decide(&self, pid: i32) -> Decision {
        let uid = self.process_uid(pid);
        Decision {
            verdict: self.decide_uid(uid),
            uid,
        }
    }
}
