//! Tracing subscriber setup shared by every binary entry point

use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "tutor=info,tower_http=info,warn";
const VERBOSE_FILTER: &str = "tutor=debug,tower_http=debug,info";

/// Filter directives used when `RUST_LOG` is not set
pub fn default_directives(verbose: bool) -> &'static str {
  if verbose {
    VERBOSE_FILTER
  } else {
    DEFAULT_FILTER
  }
}

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init(verbose: bool) {
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

  let _ = tracing_subscriber::registry().with(fmt::layer().with_target(true)).with(filter).try_init();
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_verbose_raises_crate_level() {
    assert!(default_directives(true).contains("tutor=debug"));
    assert!(default_directives(false).contains("tutor=info"));
  }

  #[test]
  fn test_init_twice_does_not_panic() {
    init(false);
    init(true);
  }
}
