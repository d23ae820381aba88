use std::process::ExitCode;

fn main() -> ExitCode {
    cleanerio_cli::run()
}
