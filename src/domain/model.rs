use serde::{Deserialize, Serialize};

/// How a remote command run should be treated.
///
/// `is_safe` marks commands with no side effects, those are only logged at
/// debug level. `capture_errors` accepts any exit code and hands back
/// whatever the command printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunParams {
    pub is_safe: bool,
    pub capture_errors: bool,
    pub last_line_only: bool,
    pub skip_first_line: bool,
}

impl RunParams {
    pub const SAFE: RunParams = RunParams {
        is_safe: true,
        capture_errors: false,
        last_line_only: false,
        skip_first_line: false,
    };

    pub const UNSAFE: RunParams = RunParams {
        is_safe: false,
        capture_errors: false,
        last_line_only: false,
        skip_first_line: false,
    };

    pub fn capturing_errors(mut self) -> Self {
        self.capture_errors = true;
        self
    }

    pub fn last_line_only(mut self) -> Self {
        self.last_line_only = true;
        self
    }

    pub fn skip_first_line(mut self) -> Self {
        self.skip_first_line = true;
        self
    }
}

impl Default for RunParams {
    fn default() -> Self {
        RunParams::UNSAFE
    }
}

pub type SilenceId = String;

/// Alertmanager matcher, e.g. `{"name": "service", "value": "~.*ceph.*", "isRegex": true}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SilenceMatcher {
    pub name: String,
    pub value: String,
    #[serde(rename = "isRegex")]
    pub is_regex: bool,
}

impl SilenceMatcher {
    pub fn exact(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            is_regex: false,
        }
    }

    pub fn regex(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            is_regex: true,
        }
    }
}

/// Options shared by every runbook invocation.
#[derive(Debug, Clone, Default)]
pub struct CommonOpts {
    pub project: String,
    pub task_id: Option<String>,
    pub no_sal_log: bool,
    pub assume_yes: bool,
}
