//! Command dispatch: bridges CLI args -> gateway calls -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod recom;
pub mod send;
pub mod system;
pub mod util;
pub mod watch;

use greennet_core::Gateway;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a gateway-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, gateway: &Gateway, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(gateway, args, global),
        Command::Watch(args) => watch::handle(gateway, args, global).await,
        Command::Send(args) => send::handle(gateway, args, global).await,
        Command::Recom(args) => recom::handle(gateway, args, global).await,
        Command::System(args) => system::handle(gateway, args, global).await,
        // Config and Completions are handled before a session is opened
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
