use std::process::ExitCode;

fn main() -> ExitCode {
    let status = lantern_shell::run(std::env::args_os());
    u8::try_from(status).map_or(ExitCode::FAILURE, ExitCode::from)
}
