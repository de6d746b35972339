//! Input subsystem: datagram frames in, device snapshots out.
//!
//! Implements a three-stage per-tick pipeline:
//!
//! 1. [`frame_decoder`] - Wire classification and event decoding
//! 2. [`state_reducer`] - Per-event device state reduction
//! 3. [`motion_integrator`] - Once-per-tick pointer/axis/gyro integration
//!
//! [`input_handle`] drives the stages and manages the session lifecycle.
//!
//! # Architecture
//!
//! ```text
//! Datagram ──► Decoder ──► Reducer ──► Integrator ──► DeviceState snapshot
//!              (InputEvent)  (state+flags)  (once per tick)
//! ```
//!
//! The whole pipeline is synchronous and single-threaded; only the tick
//! cadence is driven by the async runtime.

pub mod frame_decoder;
pub mod input_handle;
pub mod motion_integrator;
pub mod state_reducer;
