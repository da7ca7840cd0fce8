//! Binary entry point: CLI dispatch only.

use anyhow::Result;

use themesched::args::{self, CliAction, ParsedArgs};
use themesched::{commands, daemon};

fn main() -> Result<()> {
    let parsed_args = ParsedArgs::from_env();

    match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help_info();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            args::display_help_info();
            std::process::exit(1);
        }
        CliAction::Reload => commands::reload::handle_reload_command(),
        CliAction::Run {
            debug_enabled,
            config_path,
        } => daemon::run(debug_enabled, config_path),
    }
}
