use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// Without `debug` the level is pinned to `info` and `RUST_LOG` is ignored,
/// so a stray environment variable cannot flood the output. With `debug`,
/// `RUST_LOG` wins when set and `debug` is the fallback.
pub fn init(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    };

    // a second call (tests, embedding hosts) keeps the first subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
