use thiserror::Error;

/// Failures of one analysis pass. `Provider` and `ModelResponseParse` abort the
/// whole batch; `Validation` is absorbed where it is raised.
#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("failed to parse model response: {0}")]
    ModelResponseParse(String),

    #[error("invalid candidate: {0}")]
    Validation(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("render error: {0}")]
    Render(String),
}

impl AnalyzeError {
    pub fn provider(err: anyhow::Error) -> Self {
        Self::Provider(format!("{:#}", err))
    }

    pub fn render(err: anyhow::Error) -> Self {
        Self::Render(format!("{:#}", err))
    }
}

pub type AnalyzeResult<T> = std::result::Result<T, AnalyzeError>;
