//! Device command handlers.

use std::sync::Arc;

use tabled::Tabled;

use greennet_core::{Device, DeviceFilter, Gateway};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Profile")]
    profile: String,
    #[tabled(rename = "EEP")]
    eep: String,
    #[tabled(rename = "Ch")]
    channels: u8,
    #[tabled(rename = "dBm")]
    dbm: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
    #[tabled(rename = "Conditions")]
    conditions: String,
}

impl From<&Arc<Device>> for DeviceRow {
    fn from(d: &Arc<Device>) -> Self {
        let conditions: Vec<String> = d
            .active_conditions()
            .map(|(_, key, c)| format!("{key}:{}", c.severity))
            .collect();
        Self {
            id: d.id.to_string(),
            name: d.friendly_id.clone().unwrap_or_default(),
            profile: if d.profile_resolved {
                d.profile.to_string()
            } else {
                format!("{} (unresolved)", d.profile)
            },
            eep: d.eep.clone().unwrap_or_default(),
            channels: d.channel_count(),
            dbm: d.dbm.map(|v| v.to_string()).unwrap_or_default(),
            last_seen: d
                .last_seen
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            conditions: conditions.join(", "),
        }
    }
}

fn detail(d: &Arc<Device>) -> String {
    let mut lines = vec![
        format!("ID:           {}", d.id),
        format!("Name:         {}", d.friendly_id.as_deref().unwrap_or("-")),
        format!(
            "Profile:      {}{}",
            d.profile,
            if d.profile_resolved { "" } else { " (unresolved)" }
        ),
        format!("EEP:          {}", d.eep.as_deref().unwrap_or("-")),
        format!("Manufacturer: {}", d.manufacturer.as_deref().unwrap_or("-")),
        format!(
            "dBm:          {}",
            d.dbm.map_or_else(|| "-".into(), |v| v.to_string())
        ),
        format!("First Seen:   {}", d.first_seen.format("%Y-%m-%d %H:%M:%S")),
        format!(
            "Last Seen:    {}",
            d.last_seen
                .map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        ),
    ];

    for channel in &d.channels {
        lines.push(String::new());
        lines.push(format!("Channel {}", channel.index));
        if channel.attributes.is_empty() && channel.conditions.is_empty() {
            lines.push("  (no values yet)".into());
        }
        for (key, attr) in &channel.attributes {
            lines.push(format!("  {key:<24} {}", attr.value));
        }
        for (key, condition) in &channel.conditions {
            lines.push(format!(
                "  {key:<24} {} since {}",
                condition.severity,
                condition.since.format("%H:%M:%S")
            ));
        }
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(gateway: &Gateway, args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List {
            profile_filter,
            unresolved,
            conditions,
        } => {
            let filter = match (profile_filter, unresolved) {
                (Some(profile), _) => DeviceFilter::ByProfile(profile),
                (None, true) => DeviceFilter::Unresolved,
                (None, false) => DeviceFilter::All,
            };
            let mut devices = filter.apply(&gateway.devices_snapshot());
            if conditions {
                devices.retain(|d| DeviceFilter::WithConditions.matches(d));
            }
            devices.sort_by(|a, b| a.id.cmp(&b.id));

            let out = output::render_list(
                &global.output,
                &devices,
                |d: &Arc<Device>| DeviceRow::from(d),
                |d| d.id.to_string(),
                "No devices known to the gateway",
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Show { device } => {
            let id = util::resolve_device_id(gateway, &device)?;
            let snapshot = gateway
                .query_device_state(id.as_str())
                .ok_or_else(|| CliError::NotFound {
                    resource_type: "device".into(),
                    identifier: device,
                    list_command: "devices list".into(),
                })?;
            let out = output::render_single(&global.output, &snapshot, detail, |d| d.id.to_string())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
