use std::process::ExitCode;

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    paygate_cli::run()
}
