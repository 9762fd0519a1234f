use std::fmt;

use shipyard_model::EndStatus;

/// Process exit codes; a stable contract with the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    RuntimeError = 1,
    ParseError = 2,
    ValidationError = 3,
    Timeout = 4,
}

impl ExitCode {
    #[inline]
    pub fn code(self) -> i32 {
        self as u8 as i32
    }

    #[inline]
    pub fn is_success(self) -> bool {
        self == ExitCode::Success
    }

    /// Phase name reported with a failure.
    pub fn phase(self) -> &'static str {
        match self {
            ExitCode::Success => "complete",
            ExitCode::ParseError => "parse",
            ExitCode::ValidationError => "validate",
            ExitCode::RuntimeError => "execute",
            ExitCode::Timeout => "timeout",
        }
    }

    /// Terminal status carried by the log-end event.
    pub fn end_status(self) -> EndStatus {
        match self {
            ExitCode::Success => EndStatus::Success,
            ExitCode::Timeout => EndStatus::Timeout,
            _ => EndStatus::Failed,
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.phase(), self.code())
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::RuntimeError.code(), 1);
        assert_eq!(ExitCode::ParseError.code(), 2);
        assert_eq!(ExitCode::ValidationError.code(), 3);
        assert_eq!(ExitCode::Timeout.code(), 4);
    }

    #[test]
    fn end_status_separates_timeout_from_failure() {
        assert_eq!(ExitCode::Success.end_status(), EndStatus::Success);
        assert_eq!(ExitCode::Timeout.end_status(), EndStatus::Timeout);
        assert_eq!(ExitCode::ValidationError.end_status(), EndStatus::Failed);
        assert_eq!(ExitCode::RuntimeError.end_status(), EndStatus::Failed);
    }
}
