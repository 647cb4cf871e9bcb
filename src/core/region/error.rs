use thiserror::Error;

/// Load-time failures of the region document. These abort loading the catalog.
#[derive(Debug, Error)]
pub enum RegionConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("region document is not valid JSON5: {0}")]
    Parse(String),
    #[error("region document root must be an object")]
    NotAnObject,
    #[error("{detection_type}: eras '{first}' and '{second}' share min_date {date}")]
    DuplicateEraDate {
        detection_type: String,
        date: String,
        first: String,
        second: String,
    },
}

/// Per-lookup misses. The caller skips the screenshot, never the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionLookupError {
    #[error("no region configured for {key}")]
    ConfigurationMissing { key: String },
    #[error("region {key} is not four non-negative numbers")]
    MalformedRegion { key: String },
}
