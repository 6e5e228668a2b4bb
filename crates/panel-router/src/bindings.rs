//! Declarative binding tables
//!
//! Each (layout, sub-layout) page maps buttons to [`Action`]s and both
//! encoders to an [`EncoderBinding`]. Keys are logical catalog names
//! (`Avionics.HeadingBug`); the simulator names behind them live in the
//! [`SimInterface`](sim_bus::SimInterface) catalog.
//!
//! Button lookup checks the layout-wide table first (page selection keys,
//! flip keys), then the page table. Buttons in neither are no-ops.

use std::collections::BTreeSet;

use panel_protocol::{Button, Encoder};

use crate::layout::{Layout, ModeState, SubLayout};

/// Catalog variable driven by the resistive control
pub const THROTTLE: &str = "Engine.Throttle";
/// Catalog variable driven by the axis x component
pub const ROLL: &str = "Control.Roll";
/// Catalog variable driven by the axis y component
pub const PITCH: &str = "Control.Pitch";

/// What a button does on the current page
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Explicitly nothing
    Noop,
    /// Invoke a catalog command
    Command(&'static str),
    /// Write a fixed value to a catalog variable
    SetValue { variable: &'static str, value: f64 },
    /// Switch to another page of the current layout
    SelectSubLayout(SubLayout),
    /// Invoke a command, then re-read the encoder's bound variable
    CommandThenResync {
        command: &'static str,
        encoder: Encoder,
    },
}

/// Encoder forwarding its absolute position to a variable
///
/// Local (encoder) position = remote value × `scale`. Rotation applies
/// `wrap` (modulo, in local units) and `quantize` (round to a whole detent)
/// before dividing back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectBinding {
    pub variable: &'static str,
    pub scale: f64,
    pub wrap: Option<f64>,
    pub quantize: bool,
}

impl DirectBinding {
    pub const fn new(variable: &'static str) -> Self {
        Self {
            variable,
            scale: 1.0,
            wrap: None,
            quantize: false,
        }
    }

    pub const fn scaled(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub const fn wrapping(mut self, modulus: f64) -> Self {
        self.wrap = Some(modulus);
        self
    }

    pub const fn quantized(mut self) -> Self {
        self.quantize = true;
        self
    }

    /// Encoder position for a remote value
    ///
    /// Bus values carry at most single precision, so the scaled value is
    /// rounded to the nearest `f32` before it reaches the hardware.
    pub fn to_local(&self, remote: f64) -> f64 {
        let local = f64::from((remote * self.scale) as f32);
        if self.quantize {
            local.round()
        } else {
            local
        }
    }

    /// Remote value for an encoder position
    pub fn to_remote(&self, position: f64) -> f64 {
        let mut local = position;
        if let Some(modulus) = self.wrap {
            local = local.rem_euclid(modulus);
        }
        if self.quantize {
            local = local.round();
        }
        local / self.scale
    }
}

/// What an encoder drives on the current page
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EncoderBinding {
    /// Rotation is a no-op
    Unbound,
    /// Absolute position written to a variable
    Direct(DirectBinding),
    /// One command per unit step
    Step {
        up: &'static str,
        down: &'static str,
    },
}

/// How an encoder is brought in line with the simulator on (re)bind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resync {
    /// Nothing to read; hardware position is left alone
    Unavailable,
    /// Read the variable and push its local position to the hardware
    FromVariable(DirectBinding),
    /// No absolute value exists; zero both the hardware and the cursor
    Zero,
}

impl EncoderBinding {
    pub fn resync(&self) -> Resync {
        match self {
            EncoderBinding::Unbound => Resync::Unavailable,
            EncoderBinding::Direct(direct) => Resync::FromVariable(*direct),
            EncoderBinding::Step { .. } => Resync::Zero,
        }
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            EncoderBinding::Unbound => "unbound".to_string(),
            EncoderBinding::Direct(direct) => format!("direct {}", direct.variable),
            EncoderBinding::Step { up, down } => format!("step {}/{}", up, down),
        }
    }
}

/// Bindings for one (layout, sub-layout)
#[derive(Debug)]
pub struct Page {
    pub buttons: &'static [(Button, Action)],
    pub big: EncoderBinding,
    pub small: EncoderBinding,
}

impl Page {
    pub fn encoder(&self, encoder: Encoder) -> EncoderBinding {
        match encoder {
            Encoder::Big => self.big,
            Encoder::Small => self.small,
        }
    }
}

fn lookup(table: &[(Button, Action)], button: Button) -> Option<Action> {
    table
        .iter()
        .find(|(b, _)| *b == button)
        .map(|(_, action)| *action)
}

const fn step(up: &'static str, down: &'static str) -> EncoderBinding {
    EncoderBinding::Step { up, down }
}

const fn direct(binding: DirectBinding) -> EncoderBinding {
    EncoderBinding::Direct(binding)
}

const fn flaps(value: f64) -> Action {
    Action::SetValue {
        variable: "Flaps.Ratio",
        value,
    }
}

static PRIMARY: Page = Page {
    buttons: &[
        (Button::C2R1, flaps(0.0)),
        (Button::C2R2, flaps(0.333)),
        (Button::C2R3, flaps(0.666)),
        (Button::C2R4, flaps(1.0)),
        (Button::C3R1, Action::Command("Timer.SelectMode")),
        (Button::C3R2, Action::Command("Light.Landing")),
        (Button::C3R3, Action::Command("Brakes.Regular")),
        (Button::C3R4, Action::Command("Brakes.Max")),
        (Button::C4R1, Action::Command("Timer.ControlStartStop")),
        (Button::C4R2, Action::Command("Light.Taxi")),
        (Button::C4R3, Action::Command("Trim.Down")),
        (Button::C4R4, Action::Command("Trim.Up")),
    ],
    big: direct(DirectBinding::new("Avionics.AltPressure").scaled(100.0)),
    small: direct(DirectBinding::new("Avionics.HeadingBug").wrapping(360.0)),
};

static SYSTEMS_BUTTONS: &[(Button, Action)] = &[
    (Button::C2R1, Action::SelectSubLayout(SubLayout::Engine)),
    (Button::C2R2, Action::SelectSubLayout(SubLayout::Electrical)),
    (Button::C2R3, Action::SelectSubLayout(SubLayout::Lights)),
];

const HORIZON: EncoderBinding = direct(DirectBinding::new("Avionics.HorizonAdjust").scaled(5.0));
const DRIFT: EncoderBinding = direct(DirectBinding::new("Avionics.DriftAdjust"));

static SYSTEMS_ENGINE: Page = Page {
    buttons: &[
        (Button::C3R1, Action::Command("Engine.MagnetosOff")),
        (Button::C3R2, Action::Command("Engine.MagnetosRight")),
        (Button::C3R3, Action::Command("Engine.MagnetosLeft")),
        (Button::C3R4, Action::Command("Engine.MagnetosBoth")),
        (Button::C4R1, Action::Command("Engine.Starter")),
        (Button::C4R2, Action::Command("Engine.FuelPump")),
    ],
    big: HORIZON,
    small: DRIFT,
};

static SYSTEMS_ELECTRICAL: Page = Page {
    buttons: &[
        (Button::C3R1, Action::Command("Electrical.MasterAlternator")),
        (Button::C3R2, Action::Command("Electrical.MasterBattery")),
        (Button::C3R3, Action::Command("Electrical.Bus1")),
        (Button::C3R4, Action::Command("Electrical.Bus2")),
    ],
    big: HORIZON,
    small: DRIFT,
};

static SYSTEMS_LIGHTS: Page = Page {
    buttons: &[
        (Button::C3R1, Action::Command("Light.Navigation")),
        (Button::C3R2, Action::Command("Light.Taxi")),
        (Button::C3R3, Action::Command("Light.Landing")),
        (Button::C4R1, Action::Command("Light.Beacon")),
        (Button::C4R3, Action::Command("Light.Strobe")),
    ],
    big: HORIZON,
    small: DRIFT,
};

static NAVIGATION: Page = Page {
    buttons: &[],
    big: direct(DirectBinding::new("Navigation.Nav1").wrapping(360.0)),
    small: direct(DirectBinding::new("Navigation.Nav2").wrapping(360.0)),
};

static ADF_BUTTONS: &[(Button, Action)] = &[
    (Button::C2R1, Action::SelectSubLayout(SubLayout::AdfCard)),
    (Button::C2R2, Action::SelectSubLayout(SubLayout::AdfFrequency)),
    (Button::C2R3, Action::Command("ADF.FlipFrequency")),
    (Button::C3R1, Action::Command("ADF.On")),
    (Button::C3R2, Action::Command("ADF.Antenna")),
    (Button::C3R3, Action::Command("ADF.Off")),
    (Button::C4R1, Action::Command("ADF.Tone")),
];

static ADF_FREQUENCY: Page = Page {
    buttons: &[],
    big: step("ADF.BigUp", "ADF.BigDown"),
    small: step("ADF.SmallUp", "ADF.SmallDown"),
};

static ADF_CARD: Page = Page {
    buttons: &[],
    big: EncoderBinding::Unbound,
    small: direct(DirectBinding::new("Navigation.ADFHeading").wrapping(360.0)),
};

static GPS_A_BUTTONS: &[(Button, Action)] = &[
    (Button::C2R1, Action::Command("G530.CFlip")),
    (Button::C2R2, Action::Command("G530.VFlip")),
    (Button::C2R3, Action::SelectSubLayout(SubLayout::GpsLeft)),
    (Button::C2R4, Action::SelectSubLayout(SubLayout::GpsRight)),
];

static GPS_A_LEFT: Page = Page {
    buttons: &[
        (Button::Encoder, Action::Command("G530.LeftClick")),
        (Button::C3R1, Action::Command("G530.CDI")),
        (Button::C3R2, Action::Command("G530.MSG")),
        (Button::C3R3, Action::Command("G530.VNAV")),
        (Button::C4R1, Action::Command("G530.OBS")),
        (Button::C4R2, Action::Command("G530.FPL")),
        (Button::C4R3, Action::Command("G530.PROC")),
    ],
    big: step("G530.LeftBigUp", "G530.LeftBigDown"),
    small: step("G530.LeftSmallUp", "G530.LeftSmallDown"),
};

static GPS_A_RIGHT: Page = Page {
    buttons: &[
        (Button::Encoder, Action::Command("G530.RightClick")),
        (Button::C3R1, Action::Command("G530.RangeOut")),
        (Button::C3R2, Action::Command("G530.Direct")),
        (Button::C3R3, Action::Command("G530.CLR")),
        (Button::C4R1, Action::Command("G530.RangeIn")),
        (Button::C4R2, Action::Command("G530.MENU")),
        (Button::C4R3, Action::Command("G530.ENT")),
    ],
    big: step("G530.RightBigUp", "G530.RightBigDown"),
    small: step("G530.RightSmallUp", "G530.RightSmallDown"),
};

static GPS_B_BUTTONS: &[(Button, Action)] = &[
    (Button::C2R1, Action::Command("G430.CFlip")),
    (Button::C2R2, Action::Command("G430.VFlip")),
    (Button::C2R3, Action::SelectSubLayout(SubLayout::GpsLeft)),
    (Button::C2R4, Action::SelectSubLayout(SubLayout::GpsRight)),
];

// No VNAV key on the 430
static GPS_B_LEFT: Page = Page {
    buttons: &[
        (Button::Encoder, Action::Command("G430.LeftClick")),
        (Button::C3R1, Action::Command("G430.CDI")),
        (Button::C3R2, Action::Command("G430.MSG")),
        (Button::C4R1, Action::Command("G430.OBS")),
        (Button::C4R2, Action::Command("G430.FPL")),
        (Button::C4R3, Action::Command("G430.PROC")),
    ],
    big: step("G430.LeftBigUp", "G430.LeftBigDown"),
    small: step("G430.LeftSmallUp", "G430.LeftSmallDown"),
};

static GPS_B_RIGHT: Page = Page {
    buttons: &[
        (Button::Encoder, Action::Command("G430.RightClick")),
        (Button::C3R1, Action::Command("G430.RangeOut")),
        (Button::C3R2, Action::Command("G430.Direct")),
        (Button::C3R3, Action::Command("G430.CLR")),
        (Button::C4R1, Action::Command("G430.RangeIn")),
        (Button::C4R2, Action::Command("G430.MENU")),
        (Button::C4R3, Action::Command("G430.ENT")),
    ],
    big: step("G430.RightBigUp", "G430.RightBigDown"),
    small: step("G430.RightSmallUp", "G430.RightSmallDown"),
};

// One small-encoder detent is 100 ft/min
static AUTOPILOT: Page = Page {
    buttons: &[
        (Button::C2R1, Action::Command("Autopilot.HDG")),
        (Button::C3R1, Action::Command("Autopilot.NAV")),
        (Button::C4R1, Action::Command("Autopilot.APR")),
        (Button::C4R2, Action::Command("Autopilot.REV")),
        (Button::C4R3, Action::Command("Autopilot.ALT")),
        (
            Button::C4R4,
            Action::CommandThenResync {
                command: "Autopilot.VS",
                encoder: Encoder::Small,
            },
        ),
    ],
    big: EncoderBinding::Unbound,
    small: direct(
        DirectBinding::new("Autopilot.VerticalSpeed")
            .scaled(0.01)
            .quantized(),
    ),
};

static TRANSPONDER_BUTTONS: &[(Button, Action)] = &[
    (Button::C2R1, Action::Command("Transponder.IDENT")),
    (Button::C2R3, Action::SelectSubLayout(SubLayout::TransponderMode)),
    (Button::C2R4, Action::SelectSubLayout(SubLayout::TransponderCode)),
];

static TRANSPONDER_MODE: Page = Page {
    buttons: &[
        (Button::C3R4, Action::Command("Transponder.TEST")),
        (Button::C4R1, Action::Command("Transponder.ALT")),
        (Button::C4R2, Action::Command("Transponder.ON")),
        (Button::C4R3, Action::Command("Transponder.STBY")),
        (Button::C4R4, Action::Command("Transponder.OFF")),
    ],
    big: EncoderBinding::Unbound,
    small: EncoderBinding::Unbound,
};

// Digits follow the key matrix: odd digits in column 3, even in column 4
static TRANSPONDER_CODE: Page = Page {
    buttons: &[
        (Button::C3R1, Action::Command("Transponder.Digit1")),
        (Button::C3R2, Action::Command("Transponder.Digit3")),
        (Button::C3R3, Action::Command("Transponder.Digit5")),
        (Button::C3R4, Action::Command("Transponder.Digit7")),
        (Button::C4R1, Action::Command("Transponder.Digit2")),
        (Button::C4R2, Action::Command("Transponder.Digit4")),
        (Button::C4R3, Action::Command("Transponder.Digit6")),
        (Button::C4R4, Action::Command("Transponder.Digit0")),
    ],
    big: EncoderBinding::Unbound,
    small: EncoderBinding::Unbound,
};

/// Buttons shared by every page of a layout
pub fn layout_buttons(layout: Layout) -> &'static [(Button, Action)] {
    match layout {
        Layout::Systems => SYSTEMS_BUTTONS,
        Layout::Adf => ADF_BUTTONS,
        Layout::GpsA => GPS_A_BUTTONS,
        Layout::GpsB => GPS_B_BUTTONS,
        Layout::Transponder => TRANSPONDER_BUTTONS,
        Layout::Primary | Layout::Navigation | Layout::Autopilot => &[],
    }
}

/// Page for a mode; a missing sub-layout falls back to the layout default
pub fn page(state: &ModeState) -> &'static Page {
    use SubLayout::*;

    match (state.layout(), state.sub_layout()) {
        (Layout::Primary, _) => &PRIMARY,
        (Layout::Systems, Some(Electrical)) => &SYSTEMS_ELECTRICAL,
        (Layout::Systems, Some(Lights)) => &SYSTEMS_LIGHTS,
        (Layout::Systems, _) => &SYSTEMS_ENGINE,
        (Layout::Navigation, _) => &NAVIGATION,
        (Layout::Adf, Some(AdfCard)) => &ADF_CARD,
        (Layout::Adf, _) => &ADF_FREQUENCY,
        (Layout::GpsA, Some(GpsRight)) => &GPS_A_RIGHT,
        (Layout::GpsA, _) => &GPS_A_LEFT,
        (Layout::GpsB, Some(GpsRight)) => &GPS_B_RIGHT,
        (Layout::GpsB, _) => &GPS_B_LEFT,
        (Layout::Autopilot, _) => &AUTOPILOT,
        (Layout::Transponder, Some(TransponderCode)) => &TRANSPONDER_CODE,
        (Layout::Transponder, _) => &TRANSPONDER_MODE,
    }
}

/// Action for a non-selector button in the given mode
pub fn button_action(state: &ModeState, button: Button) -> Action {
    lookup(layout_buttons(state.layout()), button)
        .or_else(|| lookup(page(state).buttons, button))
        .unwrap_or(Action::Noop)
}

/// Encoder binding in the given mode
pub fn encoder_binding(state: &ModeState, encoder: Encoder) -> EncoderBinding {
    page(state).encoder(encoder)
}

/// Catalog keys referenced by any table
#[derive(Debug, Default)]
pub struct RequiredKeys {
    pub variables: BTreeSet<&'static str>,
    pub commands: BTreeSet<&'static str>,
}

impl RequiredKeys {
    fn add_action(&mut self, action: &Action) {
        match action {
            Action::Command(command) | Action::CommandThenResync { command, .. } => {
                self.commands.insert(*command);
            }
            Action::SetValue { variable, .. } => {
                self.variables.insert(*variable);
            }
            Action::Noop | Action::SelectSubLayout(_) => {}
        }
    }

    fn add_encoder(&mut self, binding: &EncoderBinding) {
        match binding {
            EncoderBinding::Unbound => {}
            EncoderBinding::Direct(direct) => {
                self.variables.insert(direct.variable);
            }
            EncoderBinding::Step { up, down } => {
                self.commands.insert(*up);
                self.commands.insert(*down);
            }
        }
    }
}

/// Every catalog key the tables and continuous channels use
pub fn required_keys() -> RequiredKeys {
    let mut keys = RequiredKeys::default();
    keys.variables.extend([THROTTLE, ROLL, PITCH]);

    for state in ModeState::all() {
        for (_, action) in layout_buttons(state.layout()) {
            keys.add_action(action);
        }
        let page = page(&state);
        for (_, action) in page.buttons {
            keys.add_action(action);
        }
        keys.add_encoder(&page.big);
        keys.add_encoder(&page.small);
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_wrap() {
        let heading = DirectBinding::new("h").wrapping(360.0);
        assert_eq!(heading.to_remote(361.0), 1.0);
        assert_eq!(heading.to_remote(-1.0), 359.0);
        assert_eq!(heading.to_remote(90.0), 90.0);
    }

    #[test]
    fn test_direct_scale() {
        let altimeter = DirectBinding::new("a").scaled(100.0);
        assert_eq!(altimeter.to_local(29.92), 2992.0);
        assert_eq!(altimeter.to_local(f64::from(29.92f32)), 2992.0);
        assert_eq!(altimeter.to_local(30.01), 3001.0);
        assert!((altimeter.to_remote(2992.0) - 29.92).abs() < 1e-9);
    }

    #[test]
    fn test_vertical_speed_detents() {
        let vs = DirectBinding::new("vs").scaled(0.01).quantized();
        assert_eq!(vs.to_local(500.0), 5.0);
        assert_eq!(vs.to_local(-740.0), -7.0);
        assert_eq!(vs.to_remote(3.4), 300.0);
    }

    #[test]
    fn test_every_state_has_both_bindings() {
        for state in ModeState::all() {
            for encoder in Encoder::ALL {
                // total: lookup never panics, binding is defined
                let _ = encoder_binding(&state, encoder);
            }
            for button in Button::ALL {
                let _ = button_action(&state, button);
            }
        }
    }

    #[test]
    fn test_page_selection_keys() {
        let systems = ModeState::enter(Layout::Systems);
        assert_eq!(
            button_action(&systems, Button::C2R2),
            Action::SelectSubLayout(SubLayout::Electrical)
        );
        assert_eq!(button_action(&systems, Button::C2R4), Action::Noop);

        let adf = ModeState::enter(Layout::Adf);
        assert_eq!(
            button_action(&adf, Button::C2R1),
            Action::SelectSubLayout(SubLayout::AdfCard)
        );
    }

    #[test]
    fn test_page_specific_buttons() {
        let mut state = ModeState::enter(Layout::Systems);
        assert_eq!(
            button_action(&state, Button::C3R1),
            Action::Command("Engine.MagnetosOff")
        );
        state.select_sub_layout(SubLayout::Lights);
        assert_eq!(
            button_action(&state, Button::C3R1),
            Action::Command("Light.Navigation")
        );
        assert_eq!(button_action(&state, Button::C3R4), Action::Noop);
    }

    #[test]
    fn test_encoder_button() {
        let gps = ModeState::enter(Layout::GpsB);
        assert_eq!(
            button_action(&gps, Button::Encoder),
            Action::Command("G430.LeftClick")
        );
        let primary = ModeState::enter(Layout::Primary);
        assert_eq!(button_action(&primary, Button::Encoder), Action::Noop);
    }

    #[test]
    fn test_adf_frequency_is_step_bound() {
        let adf = ModeState::enter(Layout::Adf);
        assert_eq!(
            encoder_binding(&adf, Encoder::Big),
            EncoderBinding::Step {
                up: "ADF.BigUp",
                down: "ADF.BigDown"
            }
        );
        assert_eq!(encoder_binding(&adf, Encoder::Big).resync(), Resync::Zero);
    }

    #[test]
    fn test_required_keys() {
        let keys = required_keys();
        assert!(keys.variables.contains("Avionics.HeadingBug"));
        assert!(keys.variables.contains("Flaps.Ratio"));
        assert!(keys.variables.contains(THROTTLE));
        assert!(keys.commands.contains("Autopilot.VS"));
        assert!(keys.commands.contains("G430.RightSmallDown"));
        assert!(!keys.commands.contains("G430.VNAV"));
    }
}
