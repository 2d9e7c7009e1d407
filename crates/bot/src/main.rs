use std::process::ExitCode;

fn main() -> ExitCode {
    dividy_bot::run()
}
