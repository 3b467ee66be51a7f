// ── Topic codec ──
//
// Translates between gateway topic paths and structured addresses.
// Layout: `<base>/<gateway>/<category>/<resource>[/<device>][/<direction>][/<sub-path>...]`.

use std::fmt;

use strum::{AsRefStr, Display, EnumString};

use crate::error::Error;

/// Default topic base used by EnOcean-over-IP gateways.
pub const DEFAULT_BASE: &str = "EnOcean";

// ── Address components ──────────────────────────────────────────────

/// Top-level message category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum Category {
    #[strum(serialize = "stream")]
    Stream,
    #[strum(serialize = "get")]
    Get,
    #[strum(serialize = "getAnswer")]
    GetAnswer,
    #[strum(serialize = "put")]
    Put,
    #[strum(serialize = "putAnswer")]
    PutAnswer,
}

impl Category {
    /// The category the gateway answers a request on.
    pub fn answer(self) -> Option<Self> {
        match self {
            Self::Get => Some(Self::GetAnswer),
            Self::Put => Some(Self::PutAnswer),
            Self::Stream | Self::GetAnswer | Self::PutAnswer => None,
        }
    }

    pub fn is_answer(self) -> bool {
        matches!(self, Self::GetAnswer | Self::PutAnswer)
    }
}

/// Resource segment following the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum Resource {
    /// Raw radio telegrams (`stream/telegram/<id>/<dir>`).
    #[strum(serialize = "telegram")]
    Telegram,
    /// Per-device state deltas (`stream/device/<id>`).
    #[strum(serialize = "device")]
    Device,
    /// Device descriptors and device-scoped requests.
    #[strum(serialize = "devices")]
    Devices,
    /// Gateway configuration and system info.
    #[strum(serialize = "config")]
    Config,
}

/// Direction of a telegram relative to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum Direction {
    /// Radio-bound: a command going to the device.
    #[strum(serialize = "to")]
    To,
    /// Radio-originated: a report coming from the device.
    #[strum(serialize = "from")]
    From,
}

// ── TopicAddress ────────────────────────────────────────────────────

/// A decoded topic path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicAddress {
    pub gateway_id: String,
    pub category: Category,
    pub resource: Resource,
    pub device_id: Option<String>,
    pub direction: Option<Direction>,
    /// Remaining segments, e.g. `["state"]` or `["functions", "0", "key"]`.
    pub sub_path: Vec<String>,
}

impl TopicAddress {
    /// Sub-path segments joined with `/`, empty for the base topic.
    pub fn sub_path_str(&self) -> String {
        self.sub_path.join("/")
    }

    /// Render this address back into a topic path under `base`.
    pub fn encode(&self, base: &str) -> String {
        let mut out = format!(
            "{base}/{}/{}/{}",
            self.gateway_id, self.category, self.resource
        );
        if let Some(ref id) = self.device_id {
            out.push('/');
            out.push_str(id);
        }
        if let Some(dir) = self.direction {
            out.push('/');
            out.push_str(dir.as_ref());
        }
        for seg in &self.sub_path {
            out.push('/');
            out.push_str(seg);
        }
        out
    }
}

impl fmt::Display for TopicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode(DEFAULT_BASE))
    }
}

/// Decode a topic path under `base`.
///
/// Fails with [`Error::MalformedTopic`] when the path does not follow the
/// expected hierarchy, contains wildcards or empty segments.
pub fn decode_topic(base: &str, path: &str) -> Result<TopicAddress, Error> {
    let segments: Vec<&str> = path.split('/').collect();

    if segments.iter().any(|s| s.is_empty()) {
        return Err(Error::malformed_topic(path, "empty segment"));
    }
    if segments.iter().any(|s| *s == "+" || *s == "#") {
        return Err(Error::malformed_topic(path, "wildcard in concrete topic"));
    }

    let mut it = segments.into_iter();

    match it.next() {
        Some(b) if b == base => {}
        _ => return Err(Error::malformed_topic(path, format!("expected base '{base}'"))),
    }

    let gateway_id = it
        .next()
        .ok_or_else(|| Error::malformed_topic(path, "missing gateway id"))?
        .to_owned();

    let category: Category = it
        .next()
        .ok_or_else(|| Error::malformed_topic(path, "missing category"))?
        .parse()
        .map_err(|_| Error::malformed_topic(path, "unknown category"))?;

    let resource: Resource = it
        .next()
        .ok_or_else(|| Error::malformed_topic(path, "missing resource"))?
        .parse()
        .map_err(|_| Error::malformed_topic(path, "unknown resource"))?;

    let (device_id, direction) = match (category, resource) {
        (Category::Stream, Resource::Telegram) => {
            let id = it
                .next()
                .ok_or_else(|| Error::malformed_topic(path, "missing device id"))?;
            let dir: Direction = it
                .next()
                .ok_or_else(|| Error::malformed_topic(path, "missing direction"))?
                .parse()
                .map_err(|_| Error::malformed_topic(path, "direction must be 'to' or 'from'"))?;
            (Some(id.to_owned()), Some(dir))
        }
        (Category::Stream, Resource::Device | Resource::Devices) => {
            let id = it
                .next()
                .ok_or_else(|| Error::malformed_topic(path, "missing device id"))?;
            (Some(id.to_owned()), None)
        }
        (Category::Stream, Resource::Config) => {
            return Err(Error::malformed_topic(path, "config is not streamed"));
        }
        (_, Resource::Devices) => (it.next().map(str::to_owned), None),
        (_, Resource::Config) => (None, None),
        (_, Resource::Telegram | Resource::Device) => {
            return Err(Error::malformed_topic(
                path,
                format!("'{resource}' is only valid under 'stream'"),
            ));
        }
    };

    Ok(TopicAddress {
        gateway_id,
        category,
        resource,
        device_id,
        direction,
        sub_path: it.map(str::to_owned).collect(),
    })
}

// ── Topics builder ──────────────────────────────────────────────────

/// Device-scoped request resources beyond `state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum DeviceResource {
    #[strum(serialize = "state")]
    State,
    #[strum(serialize = "profile")]
    Profile,
    #[strum(serialize = "configuration")]
    Configuration,
    #[strum(serialize = "parameters")]
    Parameters,
    #[strum(serialize = "linkTables")]
    LinkTables,
}

/// Builds concrete topics and subscription filters for one gateway.
#[derive(Debug, Clone)]
pub struct Topics {
    base: String,
    gateway_id: String,
}

impl Topics {
    pub fn new(base: impl Into<String>, gateway_id: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            gateway_id: gateway_id.into(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn gateway_id(&self) -> &str {
        &self.gateway_id
    }

    fn prefix(&self) -> String {
        format!("{}/{}", self.base, self.gateway_id)
    }

    /// `put/devices/<id>/state`, where commands are published.
    pub fn put_state(&self, device_id: &str) -> String {
        self.put_device(device_id, DeviceResource::State)
    }

    /// `get/devices`, the full-snapshot discovery request.
    pub fn get_devices(&self) -> String {
        format!("{}/get/devices", self.prefix())
    }

    pub fn get_device(&self, device_id: &str, resource: DeviceResource) -> String {
        format!("{}/get/devices/{device_id}/{resource}", self.prefix())
    }

    pub fn put_device(&self, device_id: &str, resource: DeviceResource) -> String {
        format!("{}/put/devices/{device_id}/{resource}", self.prefix())
    }

    /// `get/config/system/<item>`, e.g. `info` or `uptime`.
    pub fn get_system(&self, item: &str) -> String {
        format!("{}/get/config/system/{item}", self.prefix())
    }

    /// Every filter the synchronization engine subscribes to.
    pub fn subscriptions(&self) -> Vec<String> {
        let p = self.prefix();
        vec![
            format!("{p}/stream/telegram/#"),
            format!("{p}/stream/device/#"),
            format!("{p}/stream/devices/#"),
            format!("{p}/getAnswer/#"),
            format!("{p}/putAnswer/#"),
        ]
    }

    /// Decode a topic and check it belongs to this gateway.
    pub fn decode(&self, path: &str) -> Result<TopicAddress, Error> {
        let addr = decode_topic(&self.base, path)?;
        if addr.gateway_id != self.gateway_id {
            return Err(Error::malformed_topic(
                path,
                format!("unexpected gateway '{}'", addr.gateway_id),
            ));
        }
        Ok(addr)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
