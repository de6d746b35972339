//! Once-per-tick motion integration.
//!
//! Runs strictly after the tick's events have been reduced: folds held
//! direction flags and the accumulated pointer delta into the pointer
//! coordinates, recomputes extension analog axes from scratch and derives the
//! gyro-rate approximation.

use serde::{Deserialize, Serialize};

use crate::input::state_reducer::{DeviceState, DirectionFlags};

/// Integration constants, overridable from the configuration file.
///
/// Defaults reproduce the long-standing emulator behavior; change them only
/// for senders with different sensitivity expectations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionTuning {
    /// Pointer travel per tick per held IR direction flag.
    pub pointer_step: f32,

    /// Tolerated pointer overshoot beyond [0,1] on each side.
    pub pointer_margin: f32,

    /// Nunchuk stick center and flag deflection (8-bit axes).
    pub nunchuk_center: u8,
    pub nunchuk_range: u8,

    /// Classic left-stick center and flag deflection (6-bit axes).
    pub classic_center: u8,
    pub classic_range: u8,

    /// Gyro rest value and per-flag swing; the swing doubles when the slow
    /// modifier is not held.
    pub gyro_zero: u16,
    pub gyro_rate: u16,
}

impl Default for MotionTuning {
    fn default() -> Self {
        Self {
            pointer_step: 0.004,
            pointer_margin: 0.5,
            nunchuk_center: 128,
            nunchuk_range: 100,
            classic_center: 32,
            classic_range: 30,
            gyro_zero: 0x1F7F,
            gyro_rate: 800,
        }
    }
}

/// Integrates one tick of motion into the device state.
///
/// The pointer delta accumulator is consumed and zeroed; analog axes and gyro
/// rates are recomputed fresh every tick so releasing a direction snaps them
/// back on the next tick.
pub fn integrate(state: &mut DeviceState, flags: &mut DirectionFlags, tuning: &MotionTuning) {
    let flag_dx = direction(flags.ir_right, flags.ir_left) * tuning.pointer_step;
    let flag_dy = direction(flags.ir_up, flags.ir_down) * tuning.pointer_step;

    let total_dx = flag_dx + flags.pending_dx;
    let total_dy = flag_dy + flags.pending_dy;
    flags.pending_dx = 0.0;
    flags.pending_dy = 0.0;

    let min = -tuning.pointer_margin;
    let max = 1.0 + tuning.pointer_margin;
    state.pointer.x = (state.pointer.x + total_dx).clamp(min, max);
    state.pointer.y = (state.pointer.y + total_dy).clamp(min, max);

    state.nunchuk.x = deflect(
        tuning.nunchuk_center,
        tuning.nunchuk_range,
        flags.nunchuk_right,
        flags.nunchuk_left,
    );
    state.nunchuk.y = deflect(
        tuning.nunchuk_center,
        tuning.nunchuk_range,
        flags.nunchuk_up,
        flags.nunchuk_down,
    );

    state.classic.ls_x = deflect(
        tuning.classic_center,
        tuning.classic_range,
        flags.classic_stick_right,
        flags.classic_stick_left,
    );
    state.classic.ls_y = deflect(
        tuning.classic_center,
        tuning.classic_range,
        flags.classic_stick_up,
        flags.classic_stick_down,
    );

    let swing = i32::from(tuning.gyro_rate) * if flags.motion_plus_slow { 1 } else { 2 };
    let zero = i32::from(tuning.gyro_zero);
    state.motion_plus.pitch =
        (zero + direction_i32(flags.motion_plus_down, flags.motion_plus_up) * swing) as u16;
    state.motion_plus.yaw =
        (zero + direction_i32(flags.motion_plus_left, flags.motion_plus_right) * swing) as u16;
    state.motion_plus.pitch_slow = flags.motion_plus_slow;
    state.motion_plus.yaw_slow = flags.motion_plus_slow;
}

fn direction(positive: bool, negative: bool) -> f32 {
    direction_i32(positive, negative) as f32
}

fn direction_i32(positive: bool, negative: bool) -> i32 {
    positive as i32 - negative as i32
}

fn deflect(center: u8, range: u8, positive: bool, negative: bool) -> u8 {
    let value = i32::from(center) + direction_i32(positive, negative) * i32::from(range);
    value as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::state_reducer::PointerPosition;

    #[test]
    fn held_ir_flag_moves_pointer_one_step() {
        let mut state = DeviceState::default();
        let mut flags = DirectionFlags {
            ir_right: true,
            ..Default::default()
        };

        integrate(&mut state, &mut flags, &MotionTuning::default());

        assert!((state.pointer.x - 0.504).abs() < 1e-6);
        assert_eq!(state.pointer.y, 0.5);
    }

    #[test]
    fn opposed_flags_cancel_out() {
        let mut state = DeviceState::default();
        let mut flags = DirectionFlags {
            ir_left: true,
            ir_right: true,
            ir_up: true,
            ir_down: true,
            ..Default::default()
        };

        integrate(&mut state, &mut flags, &MotionTuning::default());
        assert_eq!(state.pointer, PointerPosition::default());
    }

    #[test]
    fn pointer_never_leaves_the_margin_square() {
        let tuning = MotionTuning::default();
        let mut state = DeviceState::default();
        let mut flags = DirectionFlags {
            ir_right: true,
            ir_down: true,
            ..Default::default()
        };

        // far more ticks than needed to cross the whole range
        for _ in 0..2000 {
            flags.pending_dx = 0.1;
            integrate(&mut state, &mut flags, &tuning);
            assert!(state.pointer.x >= -0.5 && state.pointer.x <= 1.5);
            assert!(state.pointer.y >= -0.5 && state.pointer.y <= 1.5);
        }

        assert_eq!(state.pointer.x, 1.5);
        assert_eq!(state.pointer.y, -0.5);
    }

    #[test]
    fn delta_accumulator_is_drained_each_tick() {
        let mut state = DeviceState::default();
        let mut flags = DirectionFlags {
            pending_dx: 0.25,
            pending_dy: -0.25,
            ..Default::default()
        };
        let tuning = MotionTuning::default();

        integrate(&mut state, &mut flags, &tuning);
        assert!((state.pointer.x - 0.75).abs() < 1e-6);
        assert!((state.pointer.y - 0.25).abs() < 1e-6);

        // second tick without new deltas must not move the pointer again
        integrate(&mut state, &mut flags, &tuning);
        assert!((state.pointer.x - 0.75).abs() < 1e-6);
        assert!((state.pointer.y - 0.25).abs() < 1e-6);
    }

    #[test]
    fn analog_axes_follow_flags_and_snap_back() {
        let mut state = DeviceState::default();
        let mut flags = DirectionFlags {
            nunchuk_right: true,
            nunchuk_down: true,
            classic_stick_left: true,
            classic_stick_up: true,
            ..Default::default()
        };
        let tuning = MotionTuning::default();

        integrate(&mut state, &mut flags, &tuning);
        assert_eq!(state.nunchuk.x, 228);
        assert_eq!(state.nunchuk.y, 28);
        assert_eq!(state.classic.ls_x, 2);
        assert_eq!(state.classic.ls_y, 62);

        // releasing everything recenters on the very next tick
        flags = DirectionFlags::default();
        integrate(&mut state, &mut flags, &tuning);
        assert_eq!(state.nunchuk.x, 128);
        assert_eq!(state.nunchuk.y, 128);
        assert_eq!(state.classic.ls_x, 32);
        assert_eq!(state.classic.ls_y, 32);
    }

    #[test]
    fn gyro_rates_scale_with_the_slow_modifier() {
        let mut state = DeviceState::default();
        let mut flags = DirectionFlags {
            motion_plus_down: true,
            motion_plus_left: true,
            ..Default::default()
        };
        let tuning = MotionTuning::default();

        integrate(&mut state, &mut flags, &tuning);
        assert_eq!(state.motion_plus.pitch, 0x1F7F + 1600);
        assert_eq!(state.motion_plus.yaw, 0x1F7F + 1600);
        assert!(!state.motion_plus.pitch_slow);

        flags.motion_plus_slow = true;
        integrate(&mut state, &mut flags, &tuning);
        assert_eq!(state.motion_plus.pitch, 0x1F7F + 800);
        assert_eq!(state.motion_plus.yaw, 0x1F7F + 800);
        assert!(state.motion_plus.pitch_slow);
        assert!(state.motion_plus.yaw_slow);

        // opposite directions subtract
        flags = DirectionFlags {
            motion_plus_up: true,
            motion_plus_right: true,
            ..Default::default()
        };
        integrate(&mut state, &mut flags, &tuning);
        assert_eq!(state.motion_plus.pitch, 0x1F7F - 1600);
        assert_eq!(state.motion_plus.yaw, 0x1F7F - 1600);
    }
}
