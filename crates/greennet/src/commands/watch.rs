//! Live event stream.

use chrono::Local;
use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;

use greennet_core::{Event, Gateway};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(gateway: &Gateway, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let device = args
        .device
        .as_deref()
        .map(|d| util::resolve_device_id(gateway, d))
        .transpose()?;
    let color = output::should_color(&global.color);
    let mut events = gateway.events();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    if !global.quiet {
        eprintln!("Watching {} devices, Ctrl-C to stop", gateway.devices_snapshot().len());
    }

    loop {
        tokio::select! {
            biased;
            _ = &mut ctrl_c => break,
            received = events.recv() => match received {
                Ok(event) => {
                    if device.as_ref().is_some_and(|id| event.device() != Some(id)) {
                        continue;
                    }
                    let line = match global.output {
                        OutputFormat::Table | OutputFormat::Plain => describe(&event, color),
                        _ => serde_json::to_string(event.as_ref())?,
                    };
                    output::print_output(&line, global.quiet);
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

/// One human-readable line per event.
fn describe(event: &Event, color: bool) -> String {
    let time = Local::now().format("%H:%M:%S").to_string();
    let device = event.device().map(ToString::to_string).unwrap_or_default();
    let device = if color {
        device.cyan().to_string()
    } else {
        device
    };

    let text = match event {
        Event::DeviceAdded { profile, .. } => format!("{device} added ({profile})"),
        Event::DeviceRemoved { .. } => format!("{device} removed"),
        Event::ProfileReassigned {
            previous, profile, ..
        } => format!("{device} profile {previous} -> {profile}"),
        Event::ProfileUnresolved { .. } => format!("{device} profile unknown, requested"),
        Event::AttributeChanged {
            channel,
            key,
            previous,
            value,
            ..
        } => match previous {
            Some(previous) => format!("{device}[{channel}] {key}: {previous} -> {value}"),
            None => format!("{device}[{channel}] {key}: {value}"),
        },
        Event::ConditionRaised {
            channel,
            key,
            severity,
            ..
        } => {
            let severity = severity.to_string();
            let severity = if color {
                severity.red().to_string()
            } else {
                severity
            };
            format!("{device}[{channel}] {key} raised ({severity})")
        }
        Event::ConditionCleared { channel, key, .. } => {
            format!("{device}[{channel}] {key} cleared")
        }
        Event::UpdateRejected {
            channel,
            key,
            reason,
            ..
        } => {
            let tag = if color {
                "rejected".yellow().to_string()
            } else {
                "rejected".into()
            };
            format!("{device}[{channel}] {key} {tag}: {reason}")
        }
        Event::BootstrapCompleted { devices } => format!("bootstrap completed, {devices} devices"),
        Event::BootstrapFailed { reason } => format!("bootstrap failed: {reason}"),
        other => format!("{other:?}"),
    };
    format!("{time} {text}")
}

#[cfg(test)]
mod tests {
    use greennet_core::{AttributeValue, DeviceId};

    use super::*;

    #[test]
    fn attribute_changes_show_old_and_new_value() {
        let line = describe(
            &Event::AttributeChanged {
                device: DeviceId::new("0528C9BA"),
                channel: 0,
                key: "switch".into(),
                previous: Some(AttributeValue::Choice("off".into())),
                value: AttributeValue::Choice("on".into()),
            },
            false,
        );
        assert!(line.ends_with("0528C9BA[0] switch: off -> on"), "{line}");
    }
}
