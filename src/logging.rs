use tracing_subscriber::EnvFilter;

/// Installs the stderr log subscriber. Stdout carries the conversation, so
/// logs never go there.
pub fn setup_logging(verbose_level: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let filter_str = match verbose_level {
            0 => "warn",
            1 => "warn,schat=info",
            _ => "info,schat=debug",
        };
        EnvFilter::new(filter_str)
    };

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init();

    if let Err(e) = result {
        eprintln!("Warning: could not install logger: {}", e);
    }
}
