use laundry::settings::Settings;
use std::path::PathBuf;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);

    let settings = match Settings::load(config_path.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("laundry: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = laundry::logging::init_logging(&settings.log_level) {
        eprintln!("laundry: {err}");
        return ExitCode::FAILURE;
    }

    match laundry::router::run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("server stopped: {}", err);
            ExitCode::FAILURE
        }
    }
}
