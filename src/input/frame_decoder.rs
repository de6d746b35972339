//! Wire frame classification and event decoding.
//!
//! Sole producer of [`InputEvent`]. A frame is one datagram payload; it is
//! either a binary pointer/IR packet (tag byte 0x01 / 0x02 followed by
//! big-endian IEEE-754 singles) or an ASCII command line of the form
//! `<event_type> <status> <param>`.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Emulator-level control requests carried in-band with input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulatorControl {
    /// Shut the emulator down.
    Quit,
    /// Emulated power button; the host sees a device power-off.
    PowerOff,
    /// Flip diagnostic snapshot logging on/off.
    ToggleReports,
}

/// Pluggable extension peripherals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Extension {
    #[default]
    None,
    Nunchuk,
    Classic,
    BalanceBoard,
}

// Discrete button identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonId {
    Home,
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    One,
    Two,
    Plus,
    Minus,
    NunchukC,
    NunchukZ,
    ClassicUp,
    ClassicDown,
    ClassicLeft,
    ClassicRight,
    ClassicA,
    ClassicB,
    ClassicX,
    ClassicY,
    ClassicL,
    ClassicR,
    ClassicZl,
    ClassicZr,
    ClassicPlus,
    ClassicMinus,
}

// Held-direction motion identifier (boolean latches, not magnitudes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionId {
    IrUp,
    IrDown,
    IrLeft,
    IrRight,
    SteerLeft,
    SteerRight,
    NunchukUp,
    NunchukDown,
    NunchukLeft,
    NunchukRight,
    ClassicStickUp,
    ClassicStickDown,
    ClassicStickLeft,
    ClassicStickRight,
    MotionPlusUp,
    MotionPlusDown,
    MotionPlusLeft,
    MotionPlusRight,
    MotionPlusSlow,
}

/// One normalized input event with a decode-time timestamp.
///
/// Timestamps are advisory; nothing downstream depends on them for
/// correctness.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Control {
        control: EmulatorControl,
        timestamp: DateTime<Local>,
    },
    Hotplug {
        extension: Extension,
        timestamp: DateTime<Local>,
    },
    Button {
        button: ButtonId,
        pressed: bool,
        timestamp: DateTime<Local>,
    },
    /// Held-direction flag update; `moving` overwrites the latch.
    Motion {
        motion: MotionId,
        moving: bool,
        timestamp: DateTime<Local>,
    },
    /// Continuous pointer movement, accumulated until the next tick.
    PointerDelta {
        dx: f32,
        dy: f32,
        timestamp: DateTime<Local>,
    },
    /// Absolute pointer/IR coordinates, nominal range [0,1].
    PointerAbsolute {
        x: f32,
        y: f32,
        timestamp: DateTime<Local>,
    },
    /// Raw accelerometer passthrough. Has no wire encoding at this layer;
    /// constructed in-process only.
    Accel {
        x: f32,
        y: f32,
        z: f32,
        timestamp: DateTime<Local>,
    },
}

/// Interpretation of the 0x01 binary pointer frame.
///
/// Earlier protocol iterations disagreed on whether the two floats are a
/// movement delta or an absolute position. `Delta` is canonical; `Absolute`
/// keeps senders from the other lineage usable without a re-flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerFrameMode {
    #[default]
    Delta,
    Absolute,
}

// Decoder errors
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("received input in invalid format")]
    Malformed,

    #[error("received invalid event type: {0}")]
    UnknownEventType(String),

    #[error("received invalid '{kind}' parameter: {name}")]
    UnknownSymbol { kind: &'static str, name: String },
}

/// Classifies one received frame and decodes exactly one event.
///
/// Classification order: binary delta-pointer (len ≥ 9, tag 0x01), binary
/// absolute-IR (len ≥ 13, tag 0x02), then the text command path. A binary
/// tag on a too-short buffer falls through to the text path instead of
/// reading past the end.
pub fn decode_frame(buf: &[u8], mode: PointerFrameMode) -> Result<InputEvent, DecodeError> {
    let now = Local::now();

    if buf.len() >= 9 && buf[0] == 0x01 {
        let x = be_f32(&buf[1..5]);
        let y = be_f32(&buf[5..9]);

        return Ok(match mode {
            PointerFrameMode::Delta => InputEvent::PointerDelta {
                dx: x,
                dy: y,
                timestamp: now,
            },
            PointerFrameMode::Absolute => InputEvent::PointerAbsolute {
                x,
                y,
                timestamp: now,
            },
        });
    }

    if buf.len() >= 13 && buf[0] == 0x02 {
        let x = be_f32(&buf[1..5]);
        let y = be_f32(&buf[5..9]);
        // z would be intensity/size; the state model has no use for it yet
        let _z = be_f32(&buf[9..13]);

        return Ok(InputEvent::PointerAbsolute {
            x,
            y,
            timestamp: now,
        });
    }

    decode_text(buf, now)
}

fn decode_text(buf: &[u8], now: DateTime<Local>) -> Result<InputEvent, DecodeError> {
    // The sender NUL-terminates; tolerate missing terminators and trailing
    // garbage after the NUL.
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let line = std::str::from_utf8(&buf[..end]).map_err(|_| DecodeError::Malformed)?;

    let mut fields = line.split_whitespace();
    let event_type = fields.next().ok_or(DecodeError::Malformed)?;
    let status: i32 = fields
        .next()
        .ok_or(DecodeError::Malformed)?
        .parse()
        .map_err(|_| DecodeError::Malformed)?;
    let param = fields.next().ok_or(DecodeError::Malformed)?;

    match event_type {
        "emulator_control" => {
            // status carries no information for controls
            let control = match param {
                "quit" => EmulatorControl::Quit,
                "power_off" => EmulatorControl::PowerOff,
                "toggle_reports" => EmulatorControl::ToggleReports,
                other => {
                    return Err(DecodeError::UnknownSymbol {
                        kind: "emulator_control",
                        name: other.to_string(),
                    })
                }
            };
            Ok(InputEvent::Control {
                control,
                timestamp: now,
            })
        }
        "hotplug" => {
            let extension = if status == 0 {
                Extension::None
            } else {
                extension_from_name(param).ok_or_else(|| DecodeError::UnknownSymbol {
                    kind: "hotplug",
                    name: param.to_string(),
                })?
            };
            Ok(InputEvent::Hotplug {
                extension,
                timestamp: now,
            })
        }
        "button" => {
            let button = button_from_name(param).ok_or_else(|| DecodeError::UnknownSymbol {
                kind: "button",
                name: param.to_string(),
            })?;
            Ok(InputEvent::Button {
                button,
                pressed: status != 0,
                timestamp: now,
            })
        }
        "analog_motion" => {
            let motion = motion_from_name(param).ok_or_else(|| DecodeError::UnknownSymbol {
                kind: "analog_motion",
                name: param.to_string(),
            })?;
            Ok(InputEvent::Motion {
                motion,
                moving: status != 0,
                timestamp: now,
            })
        }
        other => Err(DecodeError::UnknownEventType(other.to_string())),
    }
}

// Big-endian single out of exactly four bytes
fn be_f32(bytes: &[u8]) -> f32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    f32::from_be_bytes(raw)
}

fn extension_from_name(name: &str) -> Option<Extension> {
    match name {
        "none" => Some(Extension::None),
        "nunchuk" => Some(Extension::Nunchuk),
        "classic" => Some(Extension::Classic),
        "balance_board" => Some(Extension::BalanceBoard),
        _ => None,
    }
}

fn button_from_name(name: &str) -> Option<ButtonId> {
    let button = match name {
        "HOME" => ButtonId::Home,
        "WIIMOTE_UP" => ButtonId::Up,
        "WIIMOTE_DOWN" => ButtonId::Down,
        "WIIMOTE_LEFT" => ButtonId::Left,
        "WIIMOTE_RIGHT" => ButtonId::Right,
        "WIIMOTE_A" => ButtonId::A,
        "WIIMOTE_B" => ButtonId::B,
        "WIIMOTE_1" => ButtonId::One,
        "WIIMOTE_2" => ButtonId::Two,
        "WIIMOTE_PLUS" => ButtonId::Plus,
        "WIIMOTE_MINUS" => ButtonId::Minus,
        "NUNCHUK_C" => ButtonId::NunchukC,
        "NUNCHUK_Z" => ButtonId::NunchukZ,
        "CLASSIC_UP" => ButtonId::ClassicUp,
        "CLASSIC_DOWN" => ButtonId::ClassicDown,
        "CLASSIC_LEFT" => ButtonId::ClassicLeft,
        "CLASSIC_RIGHT" => ButtonId::ClassicRight,
        "CLASSIC_A" => ButtonId::ClassicA,
        "CLASSIC_B" => ButtonId::ClassicB,
        "CLASSIC_X" => ButtonId::ClassicX,
        "CLASSIC_Y" => ButtonId::ClassicY,
        "CLASSIC_L" => ButtonId::ClassicL,
        "CLASSIC_R" => ButtonId::ClassicR,
        "CLASSIC_ZL" => ButtonId::ClassicZl,
        "CLASSIC_ZR" => ButtonId::ClassicZr,
        "CLASSIC_PLUS" => ButtonId::ClassicPlus,
        "CLASSIC_MINUS" => ButtonId::ClassicMinus,
        _ => return None,
    };
    Some(button)
}

fn motion_from_name(name: &str) -> Option<MotionId> {
    let motion = match name {
        "IR_UP" => MotionId::IrUp,
        "IR_DOWN" => MotionId::IrDown,
        "IR_LEFT" => MotionId::IrLeft,
        "IR_RIGHT" => MotionId::IrRight,
        "STEER_LEFT" => MotionId::SteerLeft,
        "STEER_RIGHT" => MotionId::SteerRight,
        "NUNCHUK_UP" => MotionId::NunchukUp,
        "NUNCHUK_DOWN" => MotionId::NunchukDown,
        "NUNCHUK_LEFT" => MotionId::NunchukLeft,
        "NUNCHUK_RIGHT" => MotionId::NunchukRight,
        "CLASSIC_LEFT_STICK_UP" => MotionId::ClassicStickUp,
        "CLASSIC_LEFT_STICK_DOWN" => MotionId::ClassicStickDown,
        "CLASSIC_LEFT_STICK_LEFT" => MotionId::ClassicStickLeft,
        "CLASSIC_LEFT_STICK_RIGHT" => MotionId::ClassicStickRight,
        "MOTIONPLUS_UP" => MotionId::MotionPlusUp,
        "MOTIONPLUS_DOWN" => MotionId::MotionPlusDown,
        "MOTIONPLUS_LEFT" => MotionId::MotionPlusLeft,
        "MOTIONPLUS_RIGHT" => MotionId::MotionPlusRight,
        "MOTIONPLUS_SLOW" => MotionId::MotionPlusSlow,
        _ => return None,
    };
    Some(motion)
}

impl ButtonId {
    /// Wire name used by the text protocol.
    pub fn wire_name(self) -> &'static str {
        match self {
            ButtonId::Home => "HOME",
            ButtonId::Up => "WIIMOTE_UP",
            ButtonId::Down => "WIIMOTE_DOWN",
            ButtonId::Left => "WIIMOTE_LEFT",
            ButtonId::Right => "WIIMOTE_RIGHT",
            ButtonId::A => "WIIMOTE_A",
            ButtonId::B => "WIIMOTE_B",
            ButtonId::One => "WIIMOTE_1",
            ButtonId::Two => "WIIMOTE_2",
            ButtonId::Plus => "WIIMOTE_PLUS",
            ButtonId::Minus => "WIIMOTE_MINUS",
            ButtonId::NunchukC => "NUNCHUK_C",
            ButtonId::NunchukZ => "NUNCHUK_Z",
            ButtonId::ClassicUp => "CLASSIC_UP",
            ButtonId::ClassicDown => "CLASSIC_DOWN",
            ButtonId::ClassicLeft => "CLASSIC_LEFT",
            ButtonId::ClassicRight => "CLASSIC_RIGHT",
            ButtonId::ClassicA => "CLASSIC_A",
            ButtonId::ClassicB => "CLASSIC_B",
            ButtonId::ClassicX => "CLASSIC_X",
            ButtonId::ClassicY => "CLASSIC_Y",
            ButtonId::ClassicL => "CLASSIC_L",
            ButtonId::ClassicR => "CLASSIC_R",
            ButtonId::ClassicZl => "CLASSIC_ZL",
            ButtonId::ClassicZr => "CLASSIC_ZR",
            ButtonId::ClassicPlus => "CLASSIC_PLUS",
            ButtonId::ClassicMinus => "CLASSIC_MINUS",
        }
    }

    pub const ALL: [ButtonId; 27] = [
        ButtonId::Home,
        ButtonId::Up,
        ButtonId::Down,
        ButtonId::Left,
        ButtonId::Right,
        ButtonId::A,
        ButtonId::B,
        ButtonId::One,
        ButtonId::Two,
        ButtonId::Plus,
        ButtonId::Minus,
        ButtonId::NunchukC,
        ButtonId::NunchukZ,
        ButtonId::ClassicUp,
        ButtonId::ClassicDown,
        ButtonId::ClassicLeft,
        ButtonId::ClassicRight,
        ButtonId::ClassicA,
        ButtonId::ClassicB,
        ButtonId::ClassicX,
        ButtonId::ClassicY,
        ButtonId::ClassicL,
        ButtonId::ClassicR,
        ButtonId::ClassicZl,
        ButtonId::ClassicZr,
        ButtonId::ClassicPlus,
        ButtonId::ClassicMinus,
    ];
}

impl MotionId {
    /// Wire name used by the text protocol.
    pub fn wire_name(self) -> &'static str {
        match self {
            MotionId::IrUp => "IR_UP",
            MotionId::IrDown => "IR_DOWN",
            MotionId::IrLeft => "IR_LEFT",
            MotionId::IrRight => "IR_RIGHT",
            MotionId::SteerLeft => "STEER_LEFT",
            MotionId::SteerRight => "STEER_RIGHT",
            MotionId::NunchukUp => "NUNCHUK_UP",
            MotionId::NunchukDown => "NUNCHUK_DOWN",
            MotionId::NunchukLeft => "NUNCHUK_LEFT",
            MotionId::NunchukRight => "NUNCHUK_RIGHT",
            MotionId::ClassicStickUp => "CLASSIC_LEFT_STICK_UP",
            MotionId::ClassicStickDown => "CLASSIC_LEFT_STICK_DOWN",
            MotionId::ClassicStickLeft => "CLASSIC_LEFT_STICK_LEFT",
            MotionId::ClassicStickRight => "CLASSIC_LEFT_STICK_RIGHT",
            MotionId::MotionPlusUp => "MOTIONPLUS_UP",
            MotionId::MotionPlusDown => "MOTIONPLUS_DOWN",
            MotionId::MotionPlusLeft => "MOTIONPLUS_LEFT",
            MotionId::MotionPlusRight => "MOTIONPLUS_RIGHT",
            MotionId::MotionPlusSlow => "MOTIONPLUS_SLOW",
        }
    }

    pub const ALL: [MotionId; 19] = [
        MotionId::IrUp,
        MotionId::IrDown,
        MotionId::IrLeft,
        MotionId::IrRight,
        MotionId::SteerLeft,
        MotionId::SteerRight,
        MotionId::NunchukUp,
        MotionId::NunchukDown,
        MotionId::NunchukLeft,
        MotionId::NunchukRight,
        MotionId::ClassicStickUp,
        MotionId::ClassicStickDown,
        MotionId::ClassicStickLeft,
        MotionId::ClassicStickRight,
        MotionId::MotionPlusUp,
        MotionId::MotionPlusDown,
        MotionId::MotionPlusLeft,
        MotionId::MotionPlusRight,
        MotionId::MotionPlusSlow,
    ];
}
