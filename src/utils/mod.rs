pub mod build_info;

use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_LOG_DIRECTIVE: &str = "wizard_core=info";

/// Installs the global tracing subscriber. Guarded by [`crate::init_with`].
///
/// `RUST_LOG` is honoured first, then `directive` is added on top. An
/// unparsable directive falls back to [`DEFAULT_LOG_DIRECTIVE`].
pub(crate) fn init_tracing_with(directive: &str) {
    let mut filter = EnvFilter::from_default_env();
    match directive.parse() {
        Ok(parsed) => filter = filter.add_directive(parsed),
        Err(_) => {
            if let Ok(parsed) = DEFAULT_LOG_DIRECTIVE.parse() {
                filter = filter.add_directive(parsed);
            }
        }
    }
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
