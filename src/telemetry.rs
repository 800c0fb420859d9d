//! Tracing subscriber setup for binaries and demos.
//!
//! - `GRAMMARFLOW_LOG` sets the filter (e.g. `"debug"` or
//!   `"info,grammarflow::backend=debug"`). Default: `info,grammarflow=debug`.
//! - `GRAMMARFLOW_LOG_FORMAT=json` switches to structured JSON lines.
//!
//! The library itself only emits events; it never installs a subscriber.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,grammarflow=debug";

/// Install a global `fmt` subscriber. Returns `false` if one was already set.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_env("GRAMMARFLOW_LOG")
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true);

    match std::env::var("GRAMMARFLOW_LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().try_init().is_ok(),
        _ => builder.try_init().is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        init_tracing();
        assert!(!init_tracing());
    }
}
