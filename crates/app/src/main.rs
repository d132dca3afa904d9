use std::process;

mod job;
mod logging;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let parsed = match job::parse_args(&args) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("voxmorph: {err}");
            process::exit(1);
        }
    };
    logging::setup_tracing(parsed.log_level);

    tracing::info!("voxmorph starting");
    if let Err(err) = job::run(&parsed) {
        tracing::error!("{err}");
        eprintln!("voxmorph error: {err}");
        process::exit(1);
    }
}
