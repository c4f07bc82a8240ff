use serde_json::{json, Value};
use speechlink::audio::PcmFrame;
use speechlink::{StreamError, WireMessage};

fn as_json(message: &WireMessage) -> Value {
    serde_json::from_str(&message.encode().unwrap()).unwrap()
}

#[test]
fn test_audio_envelope_shape() {
    let message = WireMessage::audio(&PcmFrame::new(vec![1, -2]));
    assert_eq!(
        as_json(&message),
        json!({ "type": "audio", "data": "AQD+/w==", "isLast": false })
    );
}

#[test]
fn test_end_of_stream_envelope() {
    assert_eq!(
        as_json(&WireMessage::end_of_stream()),
        json!({ "type": "audio", "data": "", "isLast": true })
    );
    assert_eq!(as_json(&WireMessage::Stop), json!({ "type": "stop" }));
}

#[test]
fn test_config_envelope() {
    let message = WireMessage::Config {
        from: "zh-CHS".into(),
        to: "en".into(),
    };
    assert_eq!(
        as_json(&message),
        json!({ "type": "config", "data": { "from": "zh-CHS", "to": "en" } })
    );
}

#[test]
fn test_decode_results() {
    let message =
        WireMessage::decode(r#"{"type":"results","data":{"recognition":"ni hao","translation":"hello"}}"#)
            .unwrap();
    assert_eq!(
        message,
        WireMessage::Results {
            recognition: "ni hao".into(),
            translation: "hello".into(),
        }
    );
}

#[test]
fn test_decode_results_missing_fields_default_to_empty() {
    let partial = WireMessage::decode(r#"{"type":"results","data":{"recognition":"ni"}}"#).unwrap();
    assert_eq!(
        partial,
        WireMessage::Results {
            recognition: "ni".into(),
            translation: String::new(),
        }
    );

    let bare = WireMessage::decode(r#"{"type":"final_results"}"#).unwrap();
    assert_eq!(
        bare,
        WireMessage::FinalResults {
            recognition: String::new(),
            translation: String::new(),
        }
    );
}

#[test]
fn test_decode_error_and_connection() {
    assert_eq!(
        WireMessage::decode(r#"{"type":"error","message":"quota exceeded"}"#).unwrap(),
        WireMessage::Error {
            message: "quota exceeded".into()
        }
    );
    assert_eq!(
        WireMessage::decode(r#"{"type":"connection","status":"connected","client_id":"c-42"}"#)
            .unwrap(),
        WireMessage::ConnectionStatus {
            status: "connected".into(),
            client_id: Some("c-42".into()),
        }
    );
    assert_eq!(
        WireMessage::decode(r#"{"type":"config_updated","data":{"from":"en","to":"zh-CHS"}}"#)
            .unwrap(),
        WireMessage::ConfigUpdated {
            from: "en".into(),
            to: "zh-CHS".into(),
        }
    );
}

#[test]
fn test_decode_audio_accepts_both_last_flag_spellings() {
    let camel = WireMessage::decode(r#"{"type":"audio","data":"AQA=","isLast":true}"#).unwrap();
    let snake = WireMessage::decode(r#"{"type":"audio","data":"AQA=","is_last":true}"#).unwrap();
    let expected = WireMessage::Audio {
        payload: vec![1, 0],
        is_last: true,
    };
    assert_eq!(camel, expected);
    assert_eq!(snake, expected);
}

#[test]
fn test_decode_rejects_malformed_input() {
    for raw in [
        "not json",
        r#"{"data":{}}"#,
        r#"{"type":"teleport"}"#,
        r#"{"type":"audio","data":"%%%"}"#,
        r#"{"type":"config","data":{"from":"en"}}"#,
    ] {
        let result = WireMessage::decode(raw);
        assert!(
            matches!(result, Err(StreamError::MalformedMessage(_))),
            "{} should be malformed, got {:?}",
            raw,
            result
        );
    }
}

#[test]
fn test_kind_matches_envelope_type() {
    let messages = [
        WireMessage::end_of_stream(),
        WireMessage::Stop,
        WireMessage::Config {
            from: "a".into(),
            to: "b".into(),
        },
        WireMessage::Error {
            message: "x".into(),
        },
        WireMessage::ConnectionStatus {
            status: "ok".into(),
            client_id: None,
        },
    ];
    for message in messages {
        assert_eq!(as_json(&message)["type"], message.kind());
    }
}

#[test]
fn test_decode_null_data_reads_as_empty() {
    assert_eq!(
        WireMessage::decode(r#"{"type":"results","data":null}"#).unwrap(),
        WireMessage::Results {
            recognition: String::new(),
            translation: String::new(),
        }
    );
    assert_eq!(
        WireMessage::decode(r#"{"type":"final_results","data":{"recognition":null,"translation":"hi"}}"#)
            .unwrap(),
        WireMessage::FinalResults {
            recognition: String::new(),
            translation: "hi".into(),
        }
    );
    assert_eq!(
        WireMessage::decode(r#"{"type":"audio","data":null,"isLast":true}"#).unwrap(),
        WireMessage::end_of_stream()
    );
}
