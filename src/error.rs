pub type WxResult<T> = Result<T, WxError>;

#[derive(thiserror::Error, Debug)]
pub enum WxError {
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("mapping error: {0}")]
    Mapping(String),

    #[error("size_px not provided and SVG size not found")]
    MissingSize,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("missing payload for asset '{0}'")]
    MissingPayload(String),

    #[error("format error: {0}")]
    Format(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WxError {
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::Mapping(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            WxError::mapping("x").to_string().contains("mapping error:")
        );
        assert!(
            WxError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(WxError::format("x").to_string().contains("format error:"));
        assert!(
            WxError::MissingPayload("sun".to_string())
                .to_string()
                .contains("'sun'")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = WxError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
