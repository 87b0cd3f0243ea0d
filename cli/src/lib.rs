pub mod calibration;
pub mod commands;

/// Initialize the logger. The level is decided by the number of `-v`, and `RUST_LOG` overrides it.
pub fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}
