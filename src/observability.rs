//! Tracing bootstrap. Analyzer output never goes through tracing; this is
//! developer-facing diagnostics only, controlled by `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber once; defaults to `warn`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
