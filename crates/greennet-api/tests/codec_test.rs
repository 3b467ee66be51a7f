#![allow(clippy::unwrap_used)]
// Integration tests for the topic and payload codecs working together,
// using topic/payload pairs as a gateway emits them.

use pretty_assertions::assert_eq;
use serde_json::json;

use greennet_api::payload::{
    FragmentTree, coerce_scalar, decode_answer, decode_body, decode_device_list,
    decode_telegram_body, encode_command,
};
use greennet_api::topic::{Category, DeviceResource, Direction, Resource, Topics};
use greennet_api::{Error, Function};

// ── Helpers ─────────────────────────────────────────────────────────

fn topics() -> Topics {
    Topics::new("EnOcean", "AABB0011")
}

// ── Flattened telegram fragments ────────────────────────────────────

#[test]
fn flattened_telegram_reassembles_into_functions() {
    let t = topics();
    let fragments = [
        ("EnOcean/AABB0011/stream/telegram/0528C9BA/from/friendlyId", "Kitchen"),
        ("EnOcean/AABB0011/stream/telegram/0528C9BA/from/functions/0/key", "dimValue"),
        ("EnOcean/AABB0011/stream/telegram/0528C9BA/from/functions/0/value", "75"),
        ("EnOcean/AABB0011/stream/telegram/0528C9BA/from/functions/1/key", "channel"),
        ("EnOcean/AABB0011/stream/telegram/0528C9BA/from/functions/1/value", "1"),
        ("EnOcean/AABB0011/stream/telegram/0528C9BA/from/telegramInfo/dbm", "-71"),
    ];

    let mut tree = FragmentTree::new();
    for (topic, payload) in fragments {
        let addr = t.decode(topic).unwrap();
        assert_eq!(addr.resource, Resource::Telegram);
        assert_eq!(addr.direction, Some(Direction::From));
        assert_eq!(addr.device_id.as_deref(), Some("0528C9BA"));
        tree.insert(&addr.sub_path, payload.as_bytes());
    }

    let body = decode_body("t", &json!({ "from": tree.finish() })).unwrap();
    assert_eq!(
        body.functions,
        vec![Function::new("dimValue", 75), Function::new("channel", 1)]
    );
    assert_eq!(body.friendly_id.as_deref(), Some("Kitchen"));
    assert_eq!(body.dbm, Some(-71));
    assert!(!body.is_outbound());
}

#[test]
fn flattened_device_delta_reassembles() {
    let t = topics();
    let mut tree = FragmentTree::new();
    for (sub, payload) in [
        ("state/functions/0/key", "temperatureSetpoint"),
        ("state/functions/0/value", "21.5"),
        ("state/functions/1/key", "windowOpen"),
        ("state/functions/1/value", "False"),
    ] {
        let addr = t
            .decode(&format!("EnOcean/AABB0011/stream/device/01843197/{sub}"))
            .unwrap();
        tree.insert(&addr.sub_path, payload.as_bytes());
    }

    let body = decode_body("t", &tree.finish()).unwrap();
    assert_eq!(
        body.functions,
        vec![
            Function::new("temperatureSetpoint", 21.5),
            Function::new("windowOpen", false),
        ]
    );
}

// ── Commands and answers ────────────────────────────────────────────

#[test]
fn command_body_round_trips_through_put_topic() {
    let t = topics();
    let topic = t.put_state("0528C9BA");
    let addr = t.decode(&topic).unwrap();
    assert_eq!(addr.category, Category::Put);
    assert_eq!(addr.sub_path, vec!["state"]);

    let fs = vec![
        Function::text("position", 40),
        Function::text("angle", 10),
    ];
    let payload = encode_command(&fs).unwrap();
    let decoded = decode_telegram_body(addr.category, &topic, &payload).unwrap();
    assert_eq!(decoded.functions, fs);
}

#[test]
fn answer_topics_decode() {
    let t = topics();
    let addr = t
        .decode("EnOcean/AABB0011/putAnswer/devices/0528C9BA/state")
        .unwrap();
    assert_eq!(addr.category, Category::PutAnswer);
    assert_eq!(addr.device_id.as_deref(), Some("0528C9BA"));

    let answer = decode_answer(
        "t",
        br#"{"header":{"httpStatus":201,"content":"accepted"}}"#,
    )
    .unwrap();
    assert_eq!(answer.status, 201);
    assert_eq!(answer.detail.as_deref(), Some("accepted"));

    let profile = t.get_device("0528C9BA", DeviceResource::Profile);
    assert_eq!(
        profile.replace("/get/", "/getAnswer/"),
        "EnOcean/AABB0011/getAnswer/devices/0528C9BA/profile"
    );
}

#[test]
fn discovery_answer_lists_devices() {
    let body = json!({
        "header": {"httpStatus": 200},
        "devices": {
            "0": {"deviceId": "0528C9BA", "friendlyId": "Kitchen", "eeps": {"0": {"eep": "D2-01-12"}}},
            "1": {"deviceId": "01843197", "eeps": [{"eep": "D1-4B-05"}], "states": {"temperature": "notAvailable"}}
        }
    });
    let devices = decode_device_list("t", &body).unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].eep.as_deref(), Some("D2-01-12"));
    assert_eq!(devices[1].states, vec![Function::new("temperature", "notAvailable")]);
}

// ── Error containment ───────────────────────────────────────────────

#[test]
fn malformed_inputs_report_typed_errors() {
    let t = topics();
    assert!(matches!(
        t.decode("EnOcean/AABB0011/stream/telegram/0528C9BA").unwrap_err(),
        Error::MalformedTopic { .. }
    ));
    assert!(matches!(
        decode_telegram_body(Category::Stream, "t", b"{broken").unwrap_err(),
        Error::MalformedPayload { .. }
    ));
    assert!(matches!(
        decode_telegram_body(Category::PutAnswer, "t", br#"{"functions":7}"#).unwrap_err(),
        Error::MalformedPayload { .. }
    ));
    assert!(coerce_scalar("notAvailable").is_string());
}
