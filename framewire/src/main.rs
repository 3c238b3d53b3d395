use framewire::commands::command_argument_builder;
use framewire::handlers::{handle_init, handle_run, handle_status};
use tracing::Level;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    let level = match chosen_command.get_count("verbose") {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match chosen_command.subcommand() {
        None => {
            let _ = command_argument_builder().print_help();
        }
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("status", primary_command)) => handle_status(primary_command),
        Some(("run", primary_command)) => handle_run(primary_command, quiet).await,
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
