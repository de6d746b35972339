//! Device state and per-event reduction.
//!
//! [`DeviceState`] is the persistent snapshot handed to the downstream report
//! encoder; [`DirectionFlags`] is the tick context's held-direction bookkeeping
//! that the motion integrator turns into coordinates once per tick.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::input::frame_decoder::{ButtonId, Extension, InputEvent, MotionId};

/// 2D aim coordinate, nominal range [0,1] with tolerated overshoot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: f32,
    pub y: f32,
}

impl Default for PointerPosition {
    fn default() -> Self {
        // screen center
        Self { x: 0.5, y: 0.5 }
    }
}

/// Core unit buttons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreButtons {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub a: bool,
    pub b: bool,
    pub one: bool,
    pub two: bool,
    pub plus: bool,
    pub minus: bool,
    pub home: bool,
}

/// Nunchuk extension sub-state: two buttons plus 8-bit stick axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NunchukState {
    pub c: bool,
    pub z: bool,
    /// Stick axes, centered at 128.
    pub x: u8,
    pub y: u8,
}

impl Default for NunchukState {
    fn default() -> Self {
        Self {
            c: false,
            z: false,
            x: 128,
            y: 128,
        }
    }
}

/// Classic controller sub-state: buttons plus 6-bit left-stick axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassicState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,
    pub l: bool,
    pub r: bool,
    pub zl: bool,
    pub zr: bool,
    pub plus: bool,
    pub minus: bool,
    /// Left-stick axes, centered at 32.
    pub ls_x: u8,
    pub ls_y: u8,
}

impl Default for ClassicState {
    fn default() -> Self {
        Self {
            up: false,
            down: false,
            left: false,
            right: false,
            a: false,
            b: false,
            x: false,
            y: false,
            l: false,
            r: false,
            zl: false,
            zr: false,
            plus: false,
            minus: false,
            ls_x: 32,
            ls_y: 32,
        }
    }
}

/// Gyro-rate approximation derived from held motion-plus flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionPlusState {
    pub pitch: u16,
    pub yaw: u16,
    pub pitch_slow: bool,
    pub yaw_slow: bool,
}

impl Default for MotionPlusState {
    fn default() -> Self {
        Self {
            pitch: 0x1F7F,
            yaw: 0x1F7F,
            pitch_slow: false,
            yaw_slow: false,
        }
    }
}

/// Complete device snapshot published once per tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub buttons: CoreButtons,
    pub extension: Extension,
    pub nunchuk: NunchukState,
    pub classic: ClassicState,
    /// Raw accelerometer passthrough, no scaling applied.
    pub accel: (f32, f32, f32),
    pub motion_plus: MotionPlusState,
    pub pointer: PointerPosition,

    // Advisory per-channel markers; no correctness dependency
    pub last_ir_event: Option<DateTime<Local>>,
    pub last_accel_event: Option<DateTime<Local>>,
    pub last_button_event: Option<DateTime<Local>>,
}

/// Held-direction latches plus the per-tick pointer delta accumulator.
///
/// Latches persist across ticks and are overwritten (never toggled) by motion
/// events, so repeated start/stop events are idempotent. The delta accumulator
/// is drained by the integrator every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DirectionFlags {
    pub ir_up: bool,
    pub ir_down: bool,
    pub ir_left: bool,
    pub ir_right: bool,

    pub steer_left: bool,
    pub steer_right: bool,

    pub nunchuk_up: bool,
    pub nunchuk_down: bool,
    pub nunchuk_left: bool,
    pub nunchuk_right: bool,

    pub classic_stick_up: bool,
    pub classic_stick_down: bool,
    pub classic_stick_left: bool,
    pub classic_stick_right: bool,

    pub motion_plus_up: bool,
    pub motion_plus_down: bool,
    pub motion_plus_left: bool,
    pub motion_plus_right: bool,
    pub motion_plus_slow: bool,

    /// Continuous pointer movement accumulated within the current tick.
    pub pending_dx: f32,
    pub pending_dy: f32,
}

impl DirectionFlags {
    /// Clears the IR latches and any unconsumed pointer delta. Runs on every
    /// hotplug so a stale held-direction cannot keep steering the pointer
    /// across an extension change.
    pub fn reset_ir(&mut self) {
        self.ir_up = false;
        self.ir_down = false;
        self.ir_left = false;
        self.ir_right = false;
        self.pending_dx = 0.0;
        self.pending_dy = 0.0;
    }
}

/// Applies one event to the device state.
///
/// Terminal controls never reach this function; the drain loop intercepts
/// them. Everything here is local and self-healing: an unknown id is a warn
/// and a no-op.
pub fn reduce_event(state: &mut DeviceState, flags: &mut DirectionFlags, event: &InputEvent) {
    match event {
        InputEvent::Control { control, .. } => {
            // drain-loop responsibility; getting here means a caller bypassed it
            warn!("control event {:?} reached the reducer, ignoring", control);
        }
        InputEvent::Hotplug {
            extension,
            timestamp: _,
        } => apply_hotplug(state, flags, *extension),
        InputEvent::Button {
            button,
            pressed,
            timestamp,
        } => {
            state.last_button_event = Some(*timestamp);
            apply_button(state, *button, *pressed);
        }
        InputEvent::Motion {
            motion, moving, ..
        } => apply_motion_flag(flags, *motion, *moving),
        InputEvent::PointerDelta { dx, dy, .. } => {
            flags.pending_dx += dx;
            flags.pending_dy += dy;
        }
        InputEvent::PointerAbsolute { x, y, timestamp } => {
            state.last_ir_event = Some(*timestamp);
            state.pointer.x = *x;
            state.pointer.y = *y;
        }
        InputEvent::Accel { x, y, z, timestamp } => {
            state.last_accel_event = Some(*timestamp);
            state.accel = (*x, *y, *z);
        }
    }
}

fn apply_hotplug(state: &mut DeviceState, flags: &mut DirectionFlags, extension: Extension) {
    debug!("hotplug: {:?} -> {:?}", state.extension, extension);

    // IR tracking restarts on every extension change
    flags.reset_ir();

    match extension {
        Extension::Nunchuk => state.nunchuk = NunchukState::default(),
        Extension::Classic => state.classic = ClassicState::default(),
        Extension::BalanceBoard => {}
        Extension::None => state.pointer = PointerPosition::default(),
    }

    state.extension = extension;
}

fn apply_button(state: &mut DeviceState, button: ButtonId, pressed: bool) {
    match button {
        ButtonId::Home => state.buttons.home = pressed,
        ButtonId::Up => state.buttons.up = pressed,
        ButtonId::Down => state.buttons.down = pressed,
        ButtonId::Left => state.buttons.left = pressed,
        ButtonId::Right => state.buttons.right = pressed,
        ButtonId::A => state.buttons.a = pressed,
        ButtonId::B => state.buttons.b = pressed,
        ButtonId::One => state.buttons.one = pressed,
        ButtonId::Two => state.buttons.two = pressed,
        ButtonId::Plus => state.buttons.plus = pressed,
        ButtonId::Minus => state.buttons.minus = pressed,

        ButtonId::NunchukC => state.nunchuk.c = pressed,
        ButtonId::NunchukZ => state.nunchuk.z = pressed,

        ButtonId::ClassicUp => state.classic.up = pressed,
        ButtonId::ClassicDown => state.classic.down = pressed,
        ButtonId::ClassicLeft => state.classic.left = pressed,
        ButtonId::ClassicRight => state.classic.right = pressed,
        ButtonId::ClassicA => state.classic.a = pressed,
        ButtonId::ClassicB => state.classic.b = pressed,
        ButtonId::ClassicX => state.classic.x = pressed,
        ButtonId::ClassicY => state.classic.y = pressed,
        ButtonId::ClassicL => state.classic.l = pressed,
        ButtonId::ClassicR => state.classic.r = pressed,
        ButtonId::ClassicZl => state.classic.zl = pressed,
        ButtonId::ClassicZr => state.classic.zr = pressed,
        ButtonId::ClassicPlus => state.classic.plus = pressed,
        ButtonId::ClassicMinus => state.classic.minus = pressed,
    }
}

fn apply_motion_flag(flags: &mut DirectionFlags, motion: MotionId, moving: bool) {
    match motion {
        MotionId::IrUp => flags.ir_up = moving,
        MotionId::IrDown => flags.ir_down = moving,
        MotionId::IrLeft => flags.ir_left = moving,
        MotionId::IrRight => flags.ir_right = moving,

        MotionId::SteerLeft => flags.steer_left = moving,
        MotionId::SteerRight => flags.steer_right = moving,

        MotionId::NunchukUp => flags.nunchuk_up = moving,
        MotionId::NunchukDown => flags.nunchuk_down = moving,
        MotionId::NunchukLeft => flags.nunchuk_left = moving,
        MotionId::NunchukRight => flags.nunchuk_right = moving,

        MotionId::ClassicStickUp => flags.classic_stick_up = moving,
        MotionId::ClassicStickDown => flags.classic_stick_down = moving,
        MotionId::ClassicStickLeft => flags.classic_stick_left = moving,
        MotionId::ClassicStickRight => flags.classic_stick_right = moving,

        MotionId::MotionPlusUp => flags.motion_plus_up = moving,
        MotionId::MotionPlusDown => flags.motion_plus_down = moving,
        MotionId::MotionPlusLeft => flags.motion_plus_left = moving,
        MotionId::MotionPlusRight => flags.motion_plus_right = moving,
        MotionId::MotionPlusSlow => flags.motion_plus_slow = moving,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn motion(motion: MotionId, moving: bool) -> InputEvent {
        InputEvent::Motion {
            motion,
            moving,
            timestamp: Local::now(),
        }
    }

    fn button(button: ButtonId, pressed: bool) -> InputEvent {
        InputEvent::Button {
            button,
            pressed,
            timestamp: Local::now(),
        }
    }

    fn hotplug(extension: Extension) -> InputEvent {
        InputEvent::Hotplug {
            extension,
            timestamp: Local::now(),
        }
    }

    #[test]
    fn motion_flag_updates_are_idempotent() {
        let mut state = DeviceState::default();
        let mut flags = DirectionFlags::default();

        reduce_event(&mut state, &mut flags, &motion(MotionId::IrRight, true));
        reduce_event(&mut state, &mut flags, &motion(MotionId::IrRight, true));
        assert!(flags.ir_right);

        reduce_event(&mut state, &mut flags, &motion(MotionId::IrRight, false));
        reduce_event(&mut state, &mut flags, &motion(MotionId::IrRight, false));
        assert!(!flags.ir_right);
    }

    #[test]
    fn last_write_wins_within_a_tick() {
        let mut state = DeviceState::default();
        let mut flags = DirectionFlags::default();

        reduce_event(&mut state, &mut flags, &button(ButtonId::A, true));
        reduce_event(&mut state, &mut flags, &button(ButtonId::A, false));
        assert!(!state.buttons.a);
        assert!(state.last_button_event.is_some());
    }

    #[test]
    fn buttons_route_to_their_extension_substate() {
        let mut state = DeviceState::default();
        let mut flags = DirectionFlags::default();

        reduce_event(&mut state, &mut flags, &button(ButtonId::NunchukC, true));
        reduce_event(&mut state, &mut flags, &button(ButtonId::ClassicZr, true));
        reduce_event(&mut state, &mut flags, &button(ButtonId::Home, true));

        assert!(state.nunchuk.c);
        assert!(state.classic.zr);
        assert!(state.buttons.home);
        assert!(!state.buttons.a);
    }

    #[test]
    fn hotplug_none_recenters_pointer() {
        let mut state = DeviceState::default();
        let mut flags = DirectionFlags::default();
        state.pointer = PointerPosition { x: 1.37, y: -0.4 };

        reduce_event(&mut state, &mut flags, &hotplug(Extension::None));

        assert_eq!(state.pointer, PointerPosition { x: 0.5, y: 0.5 });
        assert_eq!(state.extension, Extension::None);
    }

    #[test]
    fn hotplug_resets_ir_latches_but_not_other_latches() {
        let mut state = DeviceState::default();
        let mut flags = DirectionFlags::default();
        flags.ir_left = true;
        flags.nunchuk_up = true;
        flags.motion_plus_slow = true;
        flags.pending_dx = 0.2;

        reduce_event(&mut state, &mut flags, &hotplug(Extension::BalanceBoard));

        assert!(!flags.ir_left);
        assert_eq!(flags.pending_dx, 0.0);
        assert!(flags.nunchuk_up);
        assert!(flags.motion_plus_slow);
        assert_eq!(state.extension, Extension::BalanceBoard);
    }

    #[test]
    fn hotplug_resets_the_entering_substate() {
        let mut state = DeviceState::default();
        let mut flags = DirectionFlags::default();
        state.nunchuk.c = true;
        state.nunchuk.x = 228;
        state.classic.a = true;

        reduce_event(&mut state, &mut flags, &hotplug(Extension::Nunchuk));
        assert_eq!(state.nunchuk, NunchukState::default());
        // classic sub-state untouched by a nunchuk hotplug
        assert!(state.classic.a);

        reduce_event(&mut state, &mut flags, &hotplug(Extension::Classic));
        assert_eq!(state.classic, ClassicState::default());
    }

    #[test]
    fn pointer_deltas_accumulate_until_integration() {
        let mut state = DeviceState::default();
        let mut flags = DirectionFlags::default();

        for _ in 0..3 {
            reduce_event(
                &mut state,
                &mut flags,
                &InputEvent::PointerDelta {
                    dx: 0.01,
                    dy: -0.02,
                    timestamp: Local::now(),
                },
            );
        }

        assert!((flags.pending_dx - 0.03).abs() < 1e-6);
        assert!((flags.pending_dy + 0.06).abs() < 1e-6);
        // not applied to the pointer until the integrator runs
        assert_eq!(state.pointer, PointerPosition::default());
    }

    #[test]
    fn absolute_pointer_and_accel_overwrite_directly() {
        let mut state = DeviceState::default();
        let mut flags = DirectionFlags::default();

        reduce_event(
            &mut state,
            &mut flags,
            &InputEvent::PointerAbsolute {
                x: 0.9,
                y: 0.1,
                timestamp: Local::now(),
            },
        );
        assert_eq!(state.pointer, PointerPosition { x: 0.9, y: 0.1 });
        assert!(state.last_ir_event.is_some());

        reduce_event(
            &mut state,
            &mut flags,
            &InputEvent::Accel {
                x: -1.0,
                y: 0.5,
                z: 9.8,
                timestamp: Local::now(),
            },
        );
        assert_eq!(state.accel, (-1.0, 0.5, 9.8));
        assert!(state.last_accel_event.is_some());
    }
}
