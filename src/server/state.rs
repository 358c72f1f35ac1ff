use std::sync::Arc;

use crate::analyzer::AnalysisConfig;
use crate::ocr::OcrProvider;
use crate::services::{Inpainter, ObjectStorage};
use crate::settings::Settings;

#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) settings: Settings,
    pub(crate) config: AnalysisConfig,
    pub(crate) ocr: Arc<dyn OcrProvider>,
    pub(crate) storage: Option<Arc<dyn ObjectStorage>>,
    pub(crate) inpainter: Option<Arc<dyn Inpainter>>,
}
