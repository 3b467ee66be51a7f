// ── ReCom requests ──
//
// Remote commissioning reads and writes device configuration, parameters
// and link tables, plus gateway system info. Each request is answered on
// the matching `getAnswer`/`putAnswer` path.

use bytes::Bytes;
use serde_json::Value;

use greennet_api::Topics;
use greennet_api::topic::DeviceResource;

use crate::model::DeviceId;

/// A request/answer exchange outside device state.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    GetConfiguration { device: DeviceId },
    SetConfiguration { device: DeviceId, body: Value },
    GetParameters { device: DeviceId },
    GetLinkTables { device: DeviceId },
    SetLinkTables { device: DeviceId, body: Value },
    /// Ask the gateway which EEP a device uses.
    GetProfile { device: DeviceId },
    SystemInfo,
    SystemUptime,
}

impl Request {
    /// Target device, `None` for gateway-level requests.
    pub fn device(&self) -> Option<&DeviceId> {
        match self {
            Self::GetConfiguration { device }
            | Self::SetConfiguration { device, .. }
            | Self::GetParameters { device }
            | Self::GetLinkTables { device }
            | Self::SetLinkTables { device, .. }
            | Self::GetProfile { device } => Some(device),
            Self::SystemInfo | Self::SystemUptime => None,
        }
    }

    pub fn topic(&self, topics: &Topics) -> String {
        match self {
            Self::GetConfiguration { device } => {
                topics.get_device(device.as_str(), DeviceResource::Configuration)
            }
            Self::SetConfiguration { device, .. } => {
                topics.put_device(device.as_str(), DeviceResource::Configuration)
            }
            Self::GetParameters { device } => {
                topics.get_device(device.as_str(), DeviceResource::Parameters)
            }
            Self::GetLinkTables { device } => {
                topics.get_device(device.as_str(), DeviceResource::LinkTables)
            }
            Self::SetLinkTables { device, .. } => {
                topics.put_device(device.as_str(), DeviceResource::LinkTables)
            }
            Self::GetProfile { device } => topics.get_device(device.as_str(), DeviceResource::Profile),
            Self::SystemInfo => topics.get_system("info"),
            Self::SystemUptime => topics.get_system("uptime"),
        }
    }

    /// `get` requests carry an empty object; `put` requests their body.
    pub fn payload(&self) -> Result<Bytes, serde_json::Error> {
        let body = match self {
            Self::SetConfiguration { body, .. } | Self::SetLinkTables { body, .. } => body.clone(),
            _ => Value::Object(serde_json::Map::new()),
        };
        Ok(Bytes::from(serde_json::to_vec(&body)?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn request_topics() {
        let topics = Topics::new("EnOcean", "G1");
        let device = DeviceId::from("0528C9BA");

        assert_eq!(
            Request::GetConfiguration {
                device: device.clone()
            }
            .topic(&topics),
            "EnOcean/G1/get/devices/0528C9BA/configuration"
        );
        assert_eq!(
            Request::SetLinkTables {
                device: device.clone(),
                body: json!({})
            }
            .topic(&topics),
            "EnOcean/G1/put/devices/0528C9BA/linkTables"
        );
        assert_eq!(
            Request::SystemUptime.topic(&topics),
            "EnOcean/G1/get/config/system/uptime"
        );
        assert_eq!(Request::SystemInfo.device(), None);
        assert_eq!(Request::GetProfile { device }.device().unwrap().as_str(), "0528C9BA");
    }

    #[test]
    fn payloads() {
        let get = Request::GetParameters {
            device: "01843197".into(),
        };
        assert_eq!(get.payload().unwrap(), Bytes::from_static(b"{}"));

        let set = Request::SetConfiguration {
            device: "01843197".into(),
            body: json!({"configuration": {"mode": "eco"}}),
        };
        insta::assert_snapshot!(
            String::from_utf8(set.payload().unwrap().to_vec()).unwrap(),
            @r#"{"configuration":{"mode":"eco"}}"#
        );
    }
}
