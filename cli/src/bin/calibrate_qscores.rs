use basecall_cli::calibration::{run_calibration, CalibrationConfig};
#[macro_use]
extern crate log;

fn main() {
    let matches = basecall_cli::commands::calibrate_qscores_parser().get_matches();
    basecall_cli::init_logger(matches.get_count("verbose"));
    let config = match CalibrationConfig::from_matches(&matches) {
        Ok(config) => config,
        Err(why) => {
            eprintln!("Failed to load the profile: {}", why);
            std::process::exit(1);
        }
    };
    debug!("CONFIG\t{:?}", config);
    let stdout = std::io::stdout();
    if let Err(why) = run_calibration(&config, stdout.lock()) {
        eprintln!("{}", why);
        std::process::exit(1);
    }
}
