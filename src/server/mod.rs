mod handlers;
mod models;
mod state;

pub use handlers::run_server;
pub use models::{AnalyzeData, AnalyzeEnvelope, AnalyzeImage, AnalyzeRequest};
