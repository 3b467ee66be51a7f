//! Gateway system handlers.

use greennet_core::Gateway;

use crate::cli::{GlobalOpts, SystemArgs, SystemCommand};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(gateway: &Gateway, args: SystemArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let outcome = match args.command {
        SystemCommand::Info => gateway.get_system_info().await?,
        SystemCommand::Uptime => gateway.get_system_uptime().await?,
    };

    let data = util::answer_data(outcome, gateway.config().command_timeout)?;
    let out = output::render_answer(&global.output, &data)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
