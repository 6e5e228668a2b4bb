//! Absolute position to unit steps
//!
//! Encoders bound to increment/decrement commands report absolute positions.
//! [`PositionStepper`] turns successive positions into whole steps, rounding
//! toward zero, and carries the fractional remainder into the next update so
//! small movements add up instead of being lost.

/// Converts absolute positions into signed unit steps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionStepper {
    cursor: f64,
}

impl PositionStepper {
    /// Start with the cursor at `initial`
    pub fn new(initial: f64) -> Self {
        Self { cursor: initial }
    }

    /// Move the cursor without emitting steps (on rebind)
    pub fn reset(&mut self, position: f64) {
        self.cursor = position;
    }

    /// Last position fully accounted for in steps
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Feed a new position, returning the whole steps it represents
    ///
    /// `steps = trunc(position - cursor)`, and the cursor advances by exactly
    /// `steps`, keeping the remainder. Non-finite positions are ignored.
    pub fn update(&mut self, position: f64) -> i64 {
        if !position.is_finite() {
            return 0;
        }
        let steps = (position - self.cursor).trunc();
        self.cursor += steps;
        steps as i64
    }

    /// Feed a new position, calling `up` or `down` once per unit step
    pub fn drive(&mut self, position: f64, mut up: impl FnMut(), mut down: impl FnMut()) -> i64 {
        let steps = self.update(position);
        for _ in 0..steps.unsigned_abs() {
            if steps > 0 {
                up();
            } else {
                down();
            }
        }
        steps
    }
}

impl Default for PositionStepper {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_carries_fraction() {
        let mut stepper = PositionStepper::new(0.0);

        assert_eq!(stepper.update(0.0), 0);
        assert_eq!(stepper.update(1.6), 1);
        assert_eq!(stepper.cursor(), 1.0);
        assert_eq!(stepper.update(3.1), 2);
        assert_eq!(stepper.cursor(), 3.0);
    }

    #[test]
    fn test_rounds_toward_zero() {
        let mut stepper = PositionStepper::new(0.0);
        assert_eq!(stepper.update(-0.9), 0);
        assert_eq!(stepper.update(-2.5), -2);
        assert_eq!(stepper.cursor(), -2.0);
    }

    #[test]
    fn test_drive_one_call_per_unit() {
        let mut stepper = PositionStepper::new(10.0);
        let (mut ups, mut downs) = (0, 0);

        stepper.drive(13.0, || ups += 1, || downs += 1);
        assert_eq!((ups, downs), (3, 0));

        stepper.drive(11.5, || ups += 1, || downs += 1);
        assert_eq!((ups, downs), (3, 1));
    }

    #[test]
    fn test_ignores_nan() {
        let mut stepper = PositionStepper::new(2.0);
        assert_eq!(stepper.update(f64::NAN), 0);
        assert_eq!(stepper.cursor(), 2.0);
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_total(chunks in prop::collection::vec(0u32..40, 1..30), units in 1i64..50) {
            // Arbitrary increasing positions ending exactly at `units`
            let total: u32 = chunks.iter().sum::<u32>().max(1);
            let mut stepper = PositionStepper::new(0.0);
            let mut emitted = 0;
            let mut acc = 0u32;
            for chunk in &chunks {
                acc += chunk;
                let position = (units * 4) as f64 * acc as f64 / total as f64 / 4.0;
                emitted += stepper.update(position);
            }
            emitted += stepper.update(units as f64);
            prop_assert_eq!(emitted, units);
        }
    }
}
