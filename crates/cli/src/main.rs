use std::process::ExitCode;

fn main() -> ExitCode {
    loa_cli::run()
}
