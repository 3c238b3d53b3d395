use clap::{arg, command};
use url::Url;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub const DEFAULT_STATE_DIR: &str = "~/.config/framewire/";

fn state_arg() -> clap::Arg {
    arg!(-s --"state" <PATH>)
        .required(false)
        .help("Directory holding the framewire state database")
        .default_value(DEFAULT_STATE_DIR)
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("framewire")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("framewire")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" ...)
                .help("Increase log verbosity (-v info, -vv debug)")
                .required(false),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the framewire state database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location to store the framewire state")
                        .default_value(DEFAULT_STATE_DIR),
                )
                .arg(
                    arg!(-f - -"force")
                        .help("Overwrite any existing state at the specified location.")
                        .required(false),
                ),
        )
        .subcommand(
            command!("status")
                .about("Shows whether a configuration has been deployed")
                .arg(state_arg()),
        )
        .subcommand(
            command!("run")
                .about(
                    "Runs a page session against simulated frames: routes the frames, fetches \
                graph data when deployed and prints what the results frame ends up showing.",
                )
                .arg(state_arg())
                .arg(
                    arg!(-e --"endpoint" <URL>)
                        .required(false)
                        .help("Graph data endpoint")
                        .value_parser(clap::value_parser!(Url))
                        .default_value("http://127.0.0.1:8080/graph-data")
                        .conflicts_with("fixture"),
                )
                .arg(
                    arg!(--"fixture")
                        .required(false)
                        .help("Serve the built-in sample graph instead of calling the endpoint")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-d --"documents" <URL>)
                        .required(false)
                        .help("Base URL the frame documents are served from")
                        .value_parser(clap::value_parser!(Url))
                        .default_value("http://127.0.0.1:8080/"),
                )
                .arg(
                    arg!(--"deploy")
                        .required(false)
                        .help("Press the deploy button once the configuration frame is ready")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-r --"refresh" <COUNT>)
                        .required(false)
                        .help("Number of refresh requests the results frame sends afterwards")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("0"),
                )
                .arg(
                    arg!(--"settle-ms" <MILLIS>)
                        .required(false)
                        .help("Fallback delay before showing the visualization (0 = wait for the frame handshake)")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("100"),
                )
                .arg(
                    arg!(-a --"allow-origin" <ORIGIN>)
                        .required(false)
                        .help("Accept frame messages only from this origin (repeatable; default: any)")
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                )
                .arg(
                    arg!(-w --"wait" <SECONDS>)
                        .required(false)
                        .help("How long to wait for results before giving up")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("5"),
                ),
        )
}
