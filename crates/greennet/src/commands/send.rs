//! Device command handler.

use greennet_api::Function;
use greennet_core::{Command, CommandOutcome, Gateway};

use crate::cli::{GlobalOpts, ModeKind, SendAction, SendArgs};
use crate::error::CliError;
use crate::output;

use super::util;

/// Typed command for a CLI action.
fn to_command(action: SendAction) -> Command {
    match action {
        SendAction::On { channel } => Command::TurnOn {
            channel,
            brightness: None,
        },
        SendAction::Off { channel } => Command::TurnOff { channel },
        // Sent as-is so non-dimmers reject it instead of switching on.
        SendAction::Dim { level } => Command::Raw(vec![Function::text("dimValue", level)]),
        SendAction::Position { percent } => Command::SetCoverPosition { position: percent },
        SendAction::Tilt { angle } => Command::SetCoverTilt { angle },
        SendAction::Stop => Command::StopCover,
        SendAction::Setpoint { celsius } => Command::SetSetpoint {
            temperature: celsius,
        },
        SendAction::Mode {
            kind: ModeKind::Heater,
            value,
        } => Command::SetHeaterMode { mode: value },
        SendAction::Mode {
            kind: ModeKind::Thermal,
            value,
        } => Command::SetThermalMode { mode: value },
        SendAction::Query => Command::QueryStatus,
        SendAction::Raw { functions } => Command::Raw(
            functions
                .into_iter()
                .map(|(key, value)| Function::text(key, value))
                .collect(),
        ),
    }
}

pub async fn handle(gateway: &Gateway, args: SendArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let id = util::resolve_device_id(gateway, &args.device)?;
    let device = gateway
        .query_device_state(id.as_str())
        .ok_or_else(|| CliError::NotFound {
            resource_type: "device".into(),
            identifier: args.device.clone(),
            list_command: "devices list".into(),
        })?;

    let command = to_command(args.action);
    let timeout = gateway.config().command_timeout;
    let pending = gateway.send_command(&id, &command.functions(device.profile), timeout)?;
    tracing::debug!(device = %id, ?command, "command sent");

    if args.no_wait {
        if !global.quiet {
            eprintln!("Published to {id}");
        }
        return Ok(());
    }

    let outcome = pending.outcome().await;
    match outcome {
        CommandOutcome::Success { .. } | CommandOutcome::AcceptedPendingAck => {
            let out = output::render_single(
                &global.output,
                &outcome,
                |o| match o {
                    CommandOutcome::AcceptedPendingAck => {
                        format!("{id}: accepted, awaiting device confirmation")
                    }
                    _ => format!("{id}: ok"),
                },
                |_| id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
        CommandOutcome::Failed { status, detail } => Err(CliError::CommandFailed { status, detail }),
        CommandOutcome::TimedOut => Err(CliError::Timeout {
            seconds: timeout.as_secs(),
        }),
        CommandOutcome::ConnectionLost => Err(CliError::ConnectionLost),
        other => Err(CliError::Aborted {
            outcome: format!("{other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use greennet_core::ProfileId;

    use super::*;

    #[test]
    fn dim_stays_a_dim_value() {
        let command = to_command(SendAction::Dim { level: 40 });
        let functions = command.functions(ProfileId::Switch1Ch);
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].key, "dimValue");
        assert_eq!(functions[0].value_text(), "40");
    }

    #[test]
    fn raw_pairs_keep_their_order() {
        let command = to_command(SendAction::Raw {
            functions: vec![
                ("position".into(), "50".into()),
                ("angle".into(), "10".into()),
            ],
        });
        let keys: Vec<String> = command
            .functions(ProfileId::Cover)
            .into_iter()
            .map(|f| f.key)
            .collect();
        assert_eq!(keys, ["position", "angle"]);
    }
}
