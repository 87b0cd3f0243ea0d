use basecall_utils::convert::json_to_checkpoint;
use std::path::PathBuf;
#[macro_use]
extern crate log;

fn main() {
    let matches = basecall_cli::commands::json_to_checkpoint_parser().get_matches();
    basecall_cli::init_logger(matches.get_count("verbose"));
    let json_model: &PathBuf = matches.get_one("json_model").unwrap();
    let output: &PathBuf = matches.get_one("output").unwrap();
    if !json_model.is_file() {
        eprintln!("{} does not exist", json_model.display());
        std::process::exit(1);
    }
    debug!("START\tConverting {}", json_model.display());
    match json_to_checkpoint(json_model, output) {
        Ok(network) => {
            info!("Network\n{}", network.summary());
            info!("Saved the checkpoint to {}", output.display());
        }
        Err(why) => {
            eprintln!("{}", why);
            std::process::exit(1);
        }
    }
}
