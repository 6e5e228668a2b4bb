//! Typed panel messages for the G43 control panel firmware
//!
//! # Inbound (panel → bridge)
//!
//! | Tag | Message                | Fields                 |
//! |-----|------------------------|------------------------|
//! | 1   | SmallEncoderRotate     | delta, position        |
//! | 2   | SmallEncoderButton     | state                  |
//! | 3   | SmallEncoderShortPress | -                      |
//! | 4   | SmallEncoderLongPress  | -                      |
//! | 5   | BigEncoderRotate       | delta, position        |
//! | 6   | ButtonClick            | button                 |
//! | 7   | ButtonLongClick        | button                 |
//! | 8   | Resistor               | value                  |
//! | 9   | Axis                   | x, y, z                |
//! | 10  | Log                    | text                   |
//!
//! # Outbound (bridge → panel)
//!
//! | Tag | Command                | Arguments              |
//! |-----|------------------------|------------------------|
//! | 1   | Reset                  | -                      |
//! | 2   | SetBigEncoderPosition  | position               |
//! | 3   | SetSmallEncoderPosition| position               |

use crate::command::DeviceCommand;
use crate::descriptor::{FieldDescriptor, MessageDescriptor, MessageRegistry};
use crate::error::{ParseError, ProtocolError};
use crate::event::PanelEvent;

/// Inbound message tags
pub mod tags {
    pub const SMALL_ENCODER_ROTATE: u16 = 1;
    pub const SMALL_ENCODER_BUTTON: u16 = 2;
    pub const SMALL_ENCODER_SHORT_PRESS: u16 = 3;
    pub const SMALL_ENCODER_LONG_PRESS: u16 = 4;
    pub const BIG_ENCODER_ROTATE: u16 = 5;
    pub const BUTTON_CLICK: u16 = 6;
    pub const BUTTON_LONG_CLICK: u16 = 7;
    pub const RESISTOR: u16 = 8;
    pub const AXIS: u16 = 9;
    pub const LOG: u16 = 10;
}

/// Outbound command tags
pub mod commands {
    pub const RESET: u16 = 1;
    pub const SET_BIG_ENCODER_POSITION: u16 = 2;
    pub const SET_SMALL_ENCODER_POSITION: u16 = 3;
}

const ROTATE_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::number("delta"),
    FieldDescriptor::number("position"),
];

/// Descriptor table for every message the panel firmware sends
pub const PANEL_MESSAGES: &[MessageDescriptor] = &[
    MessageDescriptor {
        tag: tags::SMALL_ENCODER_ROTATE,
        name: "SmallEncoderRotate",
        fields: ROTATE_FIELDS,
    },
    MessageDescriptor {
        tag: tags::SMALL_ENCODER_BUTTON,
        name: "SmallEncoderButton",
        fields: &[FieldDescriptor::number("state")],
    },
    MessageDescriptor {
        tag: tags::SMALL_ENCODER_SHORT_PRESS,
        name: "SmallEncoderShortPress",
        fields: &[],
    },
    MessageDescriptor {
        tag: tags::SMALL_ENCODER_LONG_PRESS,
        name: "SmallEncoderLongPress",
        fields: &[],
    },
    MessageDescriptor {
        tag: tags::BIG_ENCODER_ROTATE,
        name: "BigEncoderRotate",
        fields: ROTATE_FIELDS,
    },
    MessageDescriptor {
        tag: tags::BUTTON_CLICK,
        name: "ButtonClick",
        fields: &[FieldDescriptor::number("button")],
    },
    MessageDescriptor {
        tag: tags::BUTTON_LONG_CLICK,
        name: "ButtonLongClick",
        fields: &[FieldDescriptor::number("button")],
    },
    MessageDescriptor {
        tag: tags::RESISTOR,
        name: "Resistor",
        fields: &[FieldDescriptor::number("value")],
    },
    MessageDescriptor {
        tag: tags::AXIS,
        name: "Axis",
        fields: &[
            FieldDescriptor::number("x"),
            FieldDescriptor::number("y"),
            FieldDescriptor::number("z"),
        ],
    },
    MessageDescriptor {
        tag: tags::LOG,
        name: "Log",
        fields: &[FieldDescriptor::text("text")],
    },
];

/// Registry containing [`PANEL_MESSAGES`]
pub fn panel_registry() -> Result<MessageRegistry, ProtocolError> {
    MessageRegistry::from_descriptors(PANEL_MESSAGES)
}

/// Rotary encoder on the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Encoder {
    /// Outer (coarse) knob
    Big,
    /// Inner (fine) knob
    Small,
}

impl Encoder {
    /// Both encoders, big first
    pub const ALL: [Encoder; 2] = [Encoder::Big, Encoder::Small];

    pub fn name(&self) -> &'static str {
        match self {
            Encoder::Big => "big",
            Encoder::Small => "small",
        }
    }
}

/// Short or long press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Press {
    Short,
    Long,
}

/// Physical button position
///
/// Index 0 is the small encoder's push button. The 4x4 key matrix is
/// numbered column-major starting at 1, so `C2R1` is 5 and `C4R4` is 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Button {
    Encoder,
    C1R1,
    C1R2,
    C1R3,
    C1R4,
    C2R1,
    C2R2,
    C2R3,
    C2R4,
    C3R1,
    C3R2,
    C3R3,
    C3R4,
    C4R1,
    C4R2,
    C4R3,
    C4R4,
}

impl Button {
    /// All buttons in index order
    pub const ALL: [Button; 17] = [
        Button::Encoder,
        Button::C1R1,
        Button::C1R2,
        Button::C1R3,
        Button::C1R4,
        Button::C2R1,
        Button::C2R2,
        Button::C2R3,
        Button::C2R4,
        Button::C3R1,
        Button::C3R2,
        Button::C3R3,
        Button::C3R4,
        Button::C4R1,
        Button::C4R2,
        Button::C4R3,
        Button::C4R4,
    ];

    /// Wire index of this button
    pub fn index(&self) -> u8 {
        *self as u8
    }

    /// Button for a wire index
    pub fn from_index(index: i64) -> Result<Self, ParseError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(ParseError::InvalidButton(index))
    }

    /// Matrix column (1-4), or `None` for the encoder button
    pub fn column(&self) -> Option<u8> {
        match self.index() {
            0 => None,
            i => Some((i - 1) / 4 + 1),
        }
    }
}

/// Typed panel input
#[derive(Debug, Clone, PartialEq)]
pub enum PanelMessage {
    /// Encoder turned; `position` is the absolute position kept by the firmware
    EncoderRotate {
        encoder: Encoder,
        delta: f64,
        position: f64,
    },
    /// Button released after a short or long press
    ButtonPress { button: Button, press: Press },
    /// Resistive control reading
    Resistor { value: f64 },
    /// Tilt sensor vector; components the firmware failed to send are `None`
    Axis {
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
    },
    /// Firmware diagnostic text
    Log { text: String },
}

impl TryFrom<&PanelEvent> for PanelMessage {
    type Error = ParseError;

    fn try_from(event: &PanelEvent) -> Result<Self, Self::Error> {
        match event.tag {
            tags::SMALL_ENCODER_ROTATE | tags::BIG_ENCODER_ROTATE => {
                let encoder = if event.tag == tags::BIG_ENCODER_ROTATE {
                    Encoder::Big
                } else {
                    Encoder::Small
                };
                Ok(PanelMessage::EncoderRotate {
                    encoder,
                    // delta is informational; the router works from positions
                    delta: event.number_opt("delta").unwrap_or(0.0),
                    position: event.number("position")?,
                })
            }
            tags::SMALL_ENCODER_SHORT_PRESS => Ok(PanelMessage::ButtonPress {
                button: Button::Encoder,
                press: Press::Short,
            }),
            tags::SMALL_ENCODER_LONG_PRESS => Ok(PanelMessage::ButtonPress {
                button: Button::Encoder,
                press: Press::Long,
            }),
            tags::BUTTON_CLICK | tags::BUTTON_LONG_CLICK => {
                let index = event.number("button")?;
                if index.fract() != 0.0 {
                    return Err(ParseError::MalformedField {
                        name: "button".to_string(),
                        reason: format!("not an integer: {}", index),
                    });
                }
                let press = if event.tag == tags::BUTTON_LONG_CLICK {
                    Press::Long
                } else {
                    Press::Short
                };
                Ok(PanelMessage::ButtonPress {
                    button: Button::from_index(index as i64)?,
                    press,
                })
            }
            tags::RESISTOR => Ok(PanelMessage::Resistor {
                value: event.number("value")?,
            }),
            tags::AXIS => Ok(PanelMessage::Axis {
                x: event.number_opt("x"),
                y: event.number_opt("y"),
                z: event.number_opt("z"),
            }),
            tags::LOG => Ok(PanelMessage::Log {
                text: event.text("text")?.to_string(),
            }),
            other => Err(ParseError::UnknownMessage(other)),
        }
    }
}

/// Reset the panel firmware
pub fn reset() -> DeviceCommand {
    DeviceCommand::new(commands::RESET)
}

/// Overwrite an encoder's absolute position on the panel
pub fn set_encoder_position(encoder: Encoder, position: f64) -> DeviceCommand {
    let tag = match encoder {
        Encoder::Big => commands::SET_BIG_ENCODER_POSITION,
        Encoder::Small => commands::SET_SMALL_ENCODER_POSITION,
    };
    DeviceCommand::new(tag).arg(position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EncodeCommand;

    fn event(line_args: &[&str], tag: u16) -> PanelEvent {
        let registry = panel_registry().unwrap();
        PanelEvent::from_args(registry.get(tag).unwrap(), line_args.iter().copied())
    }

    #[test]
    fn test_registry_has_all_messages() {
        let registry = panel_registry().unwrap();
        assert_eq!(registry.len(), PANEL_MESSAGES.len());
        assert!(registry.contains(tags::AXIS));
    }

    #[test]
    fn test_button_indices() {
        assert_eq!(Button::from_index(0), Ok(Button::Encoder));
        assert_eq!(Button::from_index(1), Ok(Button::C1R1));
        assert_eq!(Button::from_index(5), Ok(Button::C2R1));
        assert_eq!(Button::from_index(16), Ok(Button::C4R4));
        assert_eq!(Button::from_index(17), Err(ParseError::InvalidButton(17)));
        assert_eq!(Button::from_index(-1), Err(ParseError::InvalidButton(-1)));

        assert_eq!(Button::C3R2.column(), Some(3));
        assert_eq!(Button::Encoder.column(), None);
        for button in Button::ALL {
            assert_eq!(Button::from_index(button.index() as i64), Ok(button));
        }
    }

    #[test]
    fn test_rotate_message() {
        let msg = PanelMessage::try_from(&event(&["1", "361"], tags::SMALL_ENCODER_ROTATE));
        assert_eq!(
            msg,
            Ok(PanelMessage::EncoderRotate {
                encoder: Encoder::Small,
                delta: 1.0,
                position: 361.0
            })
        );
    }

    #[test]
    fn test_rotate_without_position_fails() {
        let msg = PanelMessage::try_from(&event(&["1"], tags::BIG_ENCODER_ROTATE));
        assert!(matches!(msg, Err(ParseError::MalformedField { .. })));
    }

    #[test]
    fn test_long_click() {
        let msg = PanelMessage::try_from(&event(&["2"], tags::BUTTON_LONG_CLICK));
        assert_eq!(
            msg,
            Ok(PanelMessage::ButtonPress {
                button: Button::C1R2,
                press: Press::Long
            })
        );
    }

    #[test]
    fn test_axis_keeps_partial_data() {
        let msg = PanelMessage::try_from(&event(&["0.25", "oops"], tags::AXIS));
        assert_eq!(
            msg,
            Ok(PanelMessage::Axis {
                x: Some(0.25),
                y: None,
                z: None
            })
        );
    }

    #[test]
    fn test_encoder_position_command() {
        assert_eq!(
            set_encoder_position(Encoder::Big, 2992.0).encode(),
            b"2\t2992\n"
        );
        assert_eq!(
            set_encoder_position(Encoder::Small, 90.0).encode(),
            b"3\t90\n"
        );
        assert_eq!(reset().encode(), b"1\n");
    }
}
