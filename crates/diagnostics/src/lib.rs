//! Lightweight, configurable logging for the tetherfs workspace
//!
//! Usage:
//! - Set TETHERFS_LOG=off (default) - no logs
//! - Set TETHERFS_LOG=info - basic operation logs
//! - Set TETHERFS_LOG=debug - detailed diagnostic logs

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

static INIT: Once = Once::new();

/// Initialize diagnostics based on the TETHERFS_LOG environment variable
///
/// This should be called once at application startup. It's safe to call
/// multiple times - subsequent calls will be ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let log_level = std::env::var("TETHERFS_LOG").unwrap_or_else(|_| "off".to_string());

        let rt = match log_level.as_str() {
            "off" => return, // No setup needed
            "debug" => emit::setup()
                .emit_to(emit_term::stderr())
                .emit_when(emit::level::min_filter(emit::Level::Debug))
                .init(),
            "info" => emit::setup()
                .emit_to(emit_term::stderr())
                .emit_when(emit::level::min_filter(emit::Level::Info))
                .init(),
            "warn" => emit::setup()
                .emit_to(emit_term::stderr())
                .emit_when(emit::level::min_filter(emit::Level::Warn))
                .init(),
            "error" => emit::setup()
                .emit_to(emit_term::stderr())
                .emit_when(emit::level::min_filter(emit::Level::Error))
                .init(),
            _ => {
                let rt = emit::setup()
                    .emit_to(emit_term::stderr())
                    .emit_when(emit::level::min_filter(emit::Level::Info))
                    .init();
                // Bootstrap warning - this will show even with unknown level
                eprintln!(
                    "Warning: Unknown TETHERFS_LOG value '{}', using 'info'",
                    log_level
                );
                rt
            }
        };

        // The emit runtime must live for the whole process
        std::mem::forget(rt);
    });
}

/// Log basic operations (dispatches, opened handles, service lifecycle, etc.)
///
/// Use this for operations that users might want to see in normal usage.
/// Examples: "Worker pool started", "Opened file", "Registered context"
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics (queue depths, per-operation traces, etc.)
///
/// Use this for detailed information useful for debugging.
/// Examples: "Submitting copy operation", "Delivering outcome to context"
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log warning conditions (fallbacks, recoverable errors)
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log critical error conditions (failures that prevent normal operation)
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;
