pub mod api;
pub mod core;

use std::sync::Once;

static LOGGING: Once = Once::new();

/// Installs `env_logger` once; `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
    LOGGING.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_millis()
            .try_init();
    });
}
