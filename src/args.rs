//! Command-line argument parsing and processing.
//!
//! Parses the small CLI surface by hand: a `reload` subcommand plus the
//! standard help, version, debug, and config-path flags. Unknown arguments
//! fall through to help with a nonzero exit.

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the daemon with these settings
    Run {
        debug_enabled: bool,
        config_path: Option<String>,
    },
    /// Signal a running daemon to reload its configuration
    Reload,
    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse arguments from the process environment.
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args().skip(1))
    }

    /// Parse command-line arguments into a structured result.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut config_path: Option<String> = None;
        let mut run_reload = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut unknown_arg_found = false;

        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_ref() {
                "--debug" | "-d" => debug_enabled = true,
                "--help" | "-h" => display_help = true,
                "--version" | "-V" => display_version = true,
                "--config" | "-c" => match iter.next() {
                    Some(path) => config_path = Some(path.as_ref().to_string()),
                    None => unknown_arg_found = true,
                },
                "reload" => run_reload = true,
                _ => unknown_arg_found = true,
            }
        }

        let action = if unknown_arg_found {
            CliAction::ShowHelpDueToError
        } else if display_help {
            CliAction::ShowHelp
        } else if display_version {
            CliAction::ShowVersion
        } else if run_reload {
            CliAction::Reload
        } else {
            CliAction::Run {
                debug_enabled,
                config_path,
            }
        };

        ParsedArgs { action }
    }
}

/// Display help information for the application.
pub fn display_help_info() {
    log_version!();
    log_block_start!("Usage: themesched [OPTIONS] [COMMAND]");
    log_block_start!("Commands:");
    log_indented!("reload            Signal a running instance to reload settings");
    log_block_start!("Options:");
    log_indented!("-c, --config <PATH>  Use a settings file other than the default");
    log_indented!("-d, --debug          Enable debug-level logging");
    log_indented!("-h, --help           Print this help message");
    log_indented!("-V, --version        Print version information");
    log_end!();
}

/// Display version information for the application.
pub fn display_version_info() {
    log_version!();
    log_block_start!("themesched: a time-of-day theme scheduler");
    log_decorated!("Switches themes, messages, and commands on a daily schedule.");
    log_block_start!("Source: https://github.com/themesched/themesched");
    log_end!();
}
