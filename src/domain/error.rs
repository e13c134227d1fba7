//! Domain error types.

/// Top-level error type for litterman.
#[derive(Debug, thiserror::Error)]
pub enum LittermanError {
    #[error("input mismatch: {reason}")]
    InputMismatch { reason: String },

    #[error("degenerate data: {reason}")]
    DegenerateData { reason: String },

    #[error("invalid view: {reason}")]
    InvalidView { reason: String },

    #[error("infeasible constraints: {reason}")]
    InfeasibleConstraints { reason: String },

    #[error("optimization failed: {reason}")]
    OptimizationFailure { reason: String },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LittermanError {
    pub(crate) fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        LittermanError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn degenerate(reason: impl Into<String>) -> Self {
        LittermanError::DegenerateData {
            reason: reason.into(),
        }
    }
}

impl From<&LittermanError> for std::process::ExitCode {
    fn from(err: &LittermanError) -> Self {
        let code: u8 = match err {
            LittermanError::Io(_) | LittermanError::Data { .. } | LittermanError::Json(_) => 1,
            LittermanError::ConfigParse { .. }
            | LittermanError::ConfigMissing { .. }
            | LittermanError::ConfigInvalid { .. } => 2,
            LittermanError::InputMismatch { .. } | LittermanError::InvalidParameter { .. } => 3,
            LittermanError::InvalidView { .. } => 4,
            LittermanError::DegenerateData { .. }
            | LittermanError::InfeasibleConstraints { .. }
            | LittermanError::OptimizationFailure { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_reason() {
        let err = LittermanError::InfeasibleConstraints {
            reason: "lower bounds sum to 1.2".into(),
        };
        assert_eq!(
            err.to_string(),
            "infeasible constraints: lower bounds sum to 1.2"
        );
    }

    #[test]
    fn config_errors_name_section_and_key() {
        let err = LittermanError::ConfigMissing {
            section: "model".into(),
            key: "risk_aversion".into(),
        };
        assert_eq!(err.to_string(), "missing config key [model] risk_aversion");
    }

    fn exit_status(err: &LittermanError) -> String {
        format!("{:?}", std::process::ExitCode::from(err))
    }

    fn expected(code: u8) -> String {
        format!("{:?}", std::process::ExitCode::from(code))
    }

    #[test]
    fn exit_codes_follow_error_category() {
        let reason = || "x".to_string();
        let cases = [
            (LittermanError::Data { reason: reason() }, 1),
            (
                LittermanError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                1,
            ),
            (
                LittermanError::Json(serde_json::from_str::<serde_json::Value>("{").unwrap_err()),
                1,
            ),
            (
                LittermanError::ConfigParse {
                    file: "a.ini".into(),
                    reason: reason(),
                },
                2,
            ),
            (
                LittermanError::ConfigMissing {
                    section: "model".into(),
                    key: "tau".into(),
                },
                2,
            ),
            (
                LittermanError::ConfigInvalid {
                    section: "model".into(),
                    key: "tau".into(),
                    reason: reason(),
                },
                2,
            ),
            (LittermanError::InputMismatch { reason: reason() }, 3),
            (LittermanError::invalid_parameter("tau", "negative"), 3),
            (LittermanError::InvalidView { reason: reason() }, 4),
            (LittermanError::degenerate("singular"), 5),
            (LittermanError::InfeasibleConstraints { reason: reason() }, 5),
            (LittermanError::OptimizationFailure { reason: reason() }, 5),
        ];
        for (err, code) in &cases {
            assert_eq!(exit_status(err), expected(*code), "{err}");
        }
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: LittermanError = io.into();
        assert!(matches!(err, LittermanError::Io(_)));
    }
}
