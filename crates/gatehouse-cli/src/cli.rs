//! Command-line arguments for the `gatehouse` client.

use camino::Utf8PathBuf;
use clap::Parser;

/// Sends one command to the Gatehouse daemon and prints the response.
#[derive(Parser, Debug)]
#[command(name = "gatehouse", version)]
pub(crate) struct Cli {
    /// Session ticket obtained from `Security Login`.
    #[arg(long, value_name = "TICKET")]
    pub(crate) ticket: Option<String>,
    /// File streamed to the daemon as the request payload.
    #[arg(long, value_name = "FILE")]
    pub(crate) payload: Option<Utf8PathBuf>,
    /// Where a payload returned by the daemon is written.
    #[arg(long, value_name = "FILE")]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Target module, for example `Security`.
    #[arg(value_name = "MODULE")]
    pub(crate) module: String,
    /// Command within the module, for example `Login`.
    #[arg(value_name = "COMMAND")]
    pub(crate) command: String,
    /// Parameters as `NAME=VALUE`. Values that parse as JSON are sent as
    /// JSON; anything else is sent as a string.
    #[arg(value_name = "NAME=VALUE", num_args = 0.., trailing_var_arg = true)]
    pub(crate) parameters: Vec<String>,
}
