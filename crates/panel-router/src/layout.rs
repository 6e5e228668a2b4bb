//! Layouts, sub-layouts and the mode state
//!
//! The four column-1 keys select the layout: a short press picks the first
//! of the pair, a long press the second.
//!
//! | Key    | Short      | Long        |
//! |--------|------------|-------------|
//! | C1R1   | Primary    | Systems     |
//! | C1R2   | Navigation | ADF         |
//! | C1R3   | GpsA       | GpsB        |
//! | C1R4   | Autopilot  | Transponder |

use std::fmt;

use panel_protocol::{Button, Press};
use serde::{Deserialize, Serialize};

/// Top-level panel mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Layout {
    /// Flight instruments, flaps, brakes, trim
    #[default]
    Primary,
    /// Engine, electrical and lights pages
    Systems,
    /// VOR OBS knobs
    Navigation,
    /// ADF radio
    Adf,
    /// GPS/NAV/COM unit 1 (G530)
    GpsA,
    /// GPS/NAV/COM unit 2 (G430)
    GpsB,
    /// Autopilot modes and vertical speed
    Autopilot,
    /// Transponder modes and squawk code
    Transponder,
}

impl Layout {
    pub const ALL: [Layout; 8] = [
        Layout::Primary,
        Layout::Systems,
        Layout::Navigation,
        Layout::Adf,
        Layout::GpsA,
        Layout::GpsB,
        Layout::Autopilot,
        Layout::Transponder,
    ];

    /// Layout chosen by a column-1 key, `None` for any other button
    pub fn for_selector(button: Button, press: Press) -> Option<Layout> {
        let (short, long) = match button {
            Button::C1R1 => (Layout::Primary, Layout::Systems),
            Button::C1R2 => (Layout::Navigation, Layout::Adf),
            Button::C1R3 => (Layout::GpsA, Layout::GpsB),
            Button::C1R4 => (Layout::Autopilot, Layout::Transponder),
            _ => return None,
        };
        Some(match press {
            Press::Short => short,
            Press::Long => long,
        })
    }

    /// Sub-layouts available under this layout (empty if none)
    pub fn sub_layouts(&self) -> &'static [SubLayout] {
        match self {
            Layout::Systems => &[SubLayout::Engine, SubLayout::Electrical, SubLayout::Lights],
            Layout::Adf => &[SubLayout::AdfFrequency, SubLayout::AdfCard],
            Layout::GpsA | Layout::GpsB => &[SubLayout::GpsLeft, SubLayout::GpsRight],
            Layout::Transponder => &[SubLayout::TransponderMode, SubLayout::TransponderCode],
            Layout::Primary | Layout::Navigation | Layout::Autopilot => &[],
        }
    }

    /// Sub-layout selected on entry
    pub fn default_sub_layout(&self) -> Option<SubLayout> {
        self.sub_layouts().first().copied()
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Page within a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubLayout {
    Engine,
    Electrical,
    Lights,
    AdfFrequency,
    AdfCard,
    GpsLeft,
    GpsRight,
    TransponderMode,
    TransponderCode,
}

impl fmt::Display for SubLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Current (layout, sub-layout) selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModeState {
    layout: Layout,
    sub_layout: Option<SubLayout>,
}

impl ModeState {
    /// Enter a layout at its default sub-layout
    pub fn enter(layout: Layout) -> Self {
        Self {
            layout,
            sub_layout: layout.default_sub_layout(),
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn sub_layout(&self) -> Option<SubLayout> {
        self.sub_layout
    }

    /// Switch page; returns false if `sub` does not belong to this layout
    pub fn select_sub_layout(&mut self, sub: SubLayout) -> bool {
        if !self.layout.sub_layouts().contains(&sub) {
            return false;
        }
        self.sub_layout = Some(sub);
        true
    }

    /// Every reachable (layout, sub-layout) combination
    pub fn all() -> impl Iterator<Item = ModeState> {
        Layout::ALL.into_iter().flat_map(|layout| {
            let subs = layout.sub_layouts();
            let pages: Vec<Option<SubLayout>> = if subs.is_empty() {
                vec![None]
            } else {
                subs.iter().copied().map(Some).collect()
            };
            pages.into_iter().map(move |sub_layout| ModeState { layout, sub_layout })
        })
    }
}

impl Default for ModeState {
    fn default() -> Self {
        Self::enter(Layout::default())
    }
}

impl fmt::Display for ModeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sub_layout {
            Some(sub) => write!(f, "{}/{}", self.layout, sub),
            None => write!(f, "{}", self.layout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_pairs() {
        assert_eq!(
            Layout::for_selector(Button::C1R1, Press::Short),
            Some(Layout::Primary)
        );
        assert_eq!(
            Layout::for_selector(Button::C1R2, Press::Long),
            Some(Layout::Adf)
        );
        assert_eq!(
            Layout::for_selector(Button::C1R4, Press::Long),
            Some(Layout::Transponder)
        );
        assert_eq!(Layout::for_selector(Button::C2R1, Press::Short), None);
        assert_eq!(Layout::for_selector(Button::Encoder, Press::Long), None);
    }

    #[test]
    fn test_enter_resets_sub_layout() {
        let mut state = ModeState::enter(Layout::GpsA);
        assert!(state.select_sub_layout(SubLayout::GpsRight));
        assert_eq!(state.sub_layout(), Some(SubLayout::GpsRight));

        let state = ModeState::enter(Layout::GpsB);
        assert_eq!(state.sub_layout(), Some(SubLayout::GpsLeft));
        assert_eq!(
            ModeState::enter(Layout::Adf).sub_layout(),
            Some(SubLayout::AdfFrequency)
        );
        assert_eq!(ModeState::enter(Layout::Autopilot).sub_layout(), None);
    }

    #[test]
    fn test_foreign_sub_layout_rejected() {
        let mut state = ModeState::enter(Layout::Systems);
        assert!(!state.select_sub_layout(SubLayout::GpsLeft));
        assert_eq!(state.sub_layout(), Some(SubLayout::Engine));
    }

    #[test]
    fn test_all_states() {
        let states: Vec<_> = ModeState::all().collect();
        // 3 layouts without pages + 3 + 2 + 2 + 2 + 2
        assert_eq!(states.len(), 14);
        assert!(states.contains(&ModeState::default()));
    }
}
