//! Color-choice plumbing shared by the CLI's output arguments.

use is_terminal::IsTerminal;
use termcolor::{ColorChoice, StandardStream};

/// Resolve a user-requested [`clap::ColorChoice`] against whether
/// standard output is actually a terminal.
pub fn resolve(requested: clap::ColorChoice) -> ColorChoice {
    let choice = match requested {
        clap::ColorChoice::Auto => ColorChoice::Auto,
        clap::ColorChoice::Always => ColorChoice::Always,
        clap::ColorChoice::Never => ColorChoice::Never,
    };
    if choice == ColorChoice::Auto && !std::io::stdout().is_terminal() {
        ColorChoice::Never
    } else {
        choice
    }
}

/// Build the standard-output stream the CLI writes diagnostics to.
pub fn stdout(requested: clap::ColorChoice) -> StandardStream {
    StandardStream::stdout(resolve(requested))
}
