//! Log subscriber setup.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Maximum level for the given verbosity.
pub fn level(verbose: bool) -> Level {
    if verbose {
        Level::INFO
    } else {
        Level::WARN
    }
}

/// Install the global subscriber. Call once, at process start.
pub fn init(verbose: bool) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level(verbose))
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_level() {
        assert_eq!(level(true), Level::INFO);
    }

    #[test]
    fn test_quiet_level() {
        assert_eq!(level(false), Level::WARN);
    }
}
