mod app;
mod logging;

use std::process::ExitCode;

use collector_logging::collector_error;

fn main() -> ExitCode {
    // A missing .env file is fine; the variables may come from the environment.
    let dotenv = dotenvy::dotenv();
    logging::initialize_from_env();
    if let Err(err) = dotenv {
        if !err.not_found() {
            collector_error!("failed to read .env: {err}");
        }
    }

    match app::run() {
        Ok(report) => {
            app::log_report(&report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            collector_error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
