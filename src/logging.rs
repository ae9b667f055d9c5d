use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber; `RUST_LOG` overrides the default `info` filter
pub fn init_tracing() {
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter_layer)
        .init();
}

/// Identifier shared by every log line of one run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Root span for a run; per-theme spans nest under it
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!("run", run_id = %self.0)
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
