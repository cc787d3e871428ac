use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;

/// Default directive when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "tabscope=info";

/// Builds the filter from `RUST_LOG`, falling back to `default`.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs the global subscriber. Session spans nest, so events are printed
/// as a tree on stderr.
pub fn init_logging(default: &str) {
    let tree = HierarchicalLayer::default()
        .with_writer(std::io::stderr)
        .with_indent_amount(2)
        .with_indent_lines(true)
        .with_targets(true)
        .with_bracketed_fields(true);
    let registry = Registry::default().with(env_filter(default)).with(tree);
    if registry.try_init().is_err() {
        tracing::debug!("global subscriber already installed");
    }
}
