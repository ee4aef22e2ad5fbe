//! Tracing initialisation for the vm-repair binary.
//!
//! stdout is reserved for the JSON outcome a caller may pipe into `jq` or a
//! runbook, so every log line goes to stderr. The HTTP stack used for the
//! script catalog is held at `warn` unless `RUST_LOG` asks otherwise.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn",
        level.as_str().to_ascii_lowercase()
    )
}

/// Initialise the global tracing subscriber.
///
/// `--verbose` maps to `Level::DEBUG`, which also surfaces every rendered
/// az command (secrets masked). Only the first call in a process takes
/// effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(layer.json()).try_init().ok();
    } else {
        registry.with(layer).try_init().ok();
    }
}
