//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Default filter for a `-v` count.
pub fn default_level(verbosity: u8) -> &'static str
{
    match verbosity
    {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber, writing to stderr.
///
/// `VSZZ_LOG` wins over `RUST_LOG`, which wins over the verbosity level.
/// Calling it twice is harmless.
pub fn init(
    verbosity: u8,
    no_color: bool,
)
{
    let filter = EnvFilter::try_from_env("VSZZ_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn verbosity_maps_to_levels()
    {
        assert_eq!(default_level(0), "warn");
        assert_eq!(default_level(1), "info");
        assert_eq!(default_level(2), "debug");
        assert_eq!(default_level(7), "trace");
    }
}
