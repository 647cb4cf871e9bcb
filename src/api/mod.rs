pub mod detector;
pub mod models;
pub mod resolve;

pub use detector::{ChyronDetector, DetectorError};
pub use models::detection::{DetectRequest, DetectSummary, DetectorSettings, ResolveResponse, ResolvedMatch};
pub use resolve::resolve_text;
