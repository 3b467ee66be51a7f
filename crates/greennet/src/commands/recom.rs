//! Remote commissioning handlers.

use greennet_core::Gateway;

use crate::cli::{GlobalOpts, RecomArgs, RecomCommand};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(gateway: &Gateway, args: RecomArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let outcome = match args.command {
        RecomCommand::Config { device } => {
            let id = util::resolve_device_id(gateway, &device)?;
            gateway.get_device_configuration(&id).await?
        }
        RecomCommand::Params { device } => {
            let id = util::resolve_device_id(gateway, &device)?;
            gateway.get_device_parameters(&id).await?
        }
        RecomCommand::LinkTables { device } => {
            let id = util::resolve_device_id(gateway, &device)?;
            gateway.get_link_tables(&id).await?
        }
        RecomCommand::SetConfig { device, from_file } => {
            let id = util::resolve_device_id(gateway, &device)?;
            let body = util::read_json_file(&from_file)?;
            gateway.set_device_configuration(&id, body).await?
        }
    };

    let data = util::answer_data(outcome, gateway.config().command_timeout)?;
    let out = output::render_answer(&global.output, &data)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
