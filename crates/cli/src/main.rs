fn main() -> std::process::ExitCode {
    onboard_cli::run()
}
