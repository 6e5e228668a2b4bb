//! Framing properties of the panel line protocol

use panel_protocol::{
    decode_line, panel_registry, CommandArg, DeviceCommand, EncodeCommand, FieldKind, FieldValue,
    LineCodec, PANEL_MESSAGES,
};
use proptest::prelude::*;

/// Rebuild an outbound command carrying the same tag and field order as a decoded event
fn command_from_event(line: &str) -> DeviceCommand {
    let registry = panel_registry().unwrap();
    let event = decode_line(&registry, line).expect("registered tag");
    let mut cmd = DeviceCommand::new(event.tag);
    for (_, value) in &event.fields {
        cmd = match value {
            FieldValue::Number(n) => cmd.arg(*n),
            FieldValue::Text(s) => cmd.arg(s.clone()),
            FieldValue::Malformed { .. } => panic!("generated fields are valid"),
        };
    }
    cmd
}

fn numeric_descriptor() -> impl Strategy<Value = usize> {
    let numeric: Vec<usize> = PANEL_MESSAGES
        .iter()
        .enumerate()
        .filter(|(_, d)| d.fields.iter().all(|f| f.kind == FieldKind::Number))
        .map(|(i, _)| i)
        .collect();
    prop::sample::select(numeric)
}

proptest! {
    #[test]
    fn decode_then_encode_preserves_tag_and_fields(
        index in numeric_descriptor(),
        values in prop::collection::vec(-1.0e6f64..1.0e6f64, 3)
    ) {
        let descriptor = &PANEL_MESSAGES[index];
        let mut line = descriptor.tag.to_string();
        for value in values.iter().take(descriptor.fields.len()) {
            line.push('\t');
            line.push_str(&value.to_string());
        }

        let encoded = command_from_event(&line).encode();
        let mut expected = line.clone().into_bytes();
        expected.push(b'\n');
        prop_assert_eq!(encoded, expected);
    }

    #[test]
    fn text_payload_survives_framing(text in "[a-z\t\\\\ ]{0,24}") {
        let line = format!("10\t{}", panel_protocol::event::escape_field(&text));
        let cmd = command_from_event(&line);
        prop_assert_eq!(&cmd.args, &vec![CommandArg::Text(text.clone())]);

        // The encoded line is a single frame with exactly two fields
        let encoded = cmd.encode();
        let mut lines = LineCodec::new();
        lines.push_bytes(&encoded);
        let framed = lines.next_line().unwrap();
        prop_assert_eq!(framed.split('\t').count(), 2);
        prop_assert!(lines.next_line().is_none());
    }
}
