use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn build_filter(verbose: u8) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    EnvFilter::new(level)
}

/// Install the stderr subscriber. stdout carries only command output.
pub fn init(verbose: u8) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_target(verbose > 1);

    let _ = tracing_subscriber::registry()
        .with(build_filter(verbose))
        .with(fmt_layer)
        .try_init();
}
