use std::env;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

/// Directives used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_LOG_DIRECTIVES: &str = "info";

static TRACING_INIT: OnceLock<bool> = OnceLock::new();

/// Installs a fmt subscriber honouring `RUST_LOG`, defaulting to `info`.
/// Later calls are no-ops.
pub fn init_tracing() {
    init_tracing_with(DEFAULT_LOG_DIRECTIVES);
}

/// Like [`init_tracing`] with caller-chosen fallback directives, e.g.
/// `"warn,steemblock=debug"`. Returns `true` only for the call that installed
/// the subscriber; `false` if tracing was already set up here or elsewhere.
pub fn init_tracing_with(fallback: &str) -> bool {
    let mut installed_now = false;
    let installed = *TRACING_INIT.get_or_init(|| {
        let filter = resolve_filter(env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(), fallback);
        installed_now = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok();
        installed_now
    });
    installed && installed_now
}

fn resolve_filter(from_env: Option<&str>, fallback: &str) -> EnvFilter {
    from_env
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}
