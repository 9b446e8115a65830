//! Process-wide log output.
//!
//! The library itself only emits `tracing` events. [`init_logging`] installs a
//! formatting subscriber for binaries and tests that want them printed. It
//! runs at most once per process; later calls are no-ops, whatever level they
//! ask for.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static INIT: OnceLock<()> = OnceLock::new();

/// Installs a `fmt` subscriber filtered at `level` (`"INFO"`, `"debug"`, or
/// any `EnvFilter` directive). `RUST_LOG` takes precedence when set.
pub fn init_logging(level: &str) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.to_lowercase()));

        // Another subscriber may already be installed by the host application.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_logging("debug");
        init_logging("warn");
        tracing::info!("still logging after a second init");
    }
}
