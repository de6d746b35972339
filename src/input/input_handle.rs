//! Input session lifecycle: drain, reduce, integrate, publish.
//!
//! One tick drains every waiting datagram, folds the decoded events into the
//! device state in arrival order, then runs the motion integrator exactly once
//! and broadcasts the resulting snapshot. The session is single-threaded and
//! cooperative; nothing in the tick blocks.

use chrono::Local;
use statum::{machine, state};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

pub use super::frame_decoder::{
    ButtonId, DecodeError, EmulatorControl, Extension, InputEvent, MotionId, PointerFrameMode,
};
pub use super::motion_integrator::MotionTuning;
pub use super::state_reducer::{
    ClassicState, CoreButtons, DeviceState, DirectionFlags, MotionPlusState, NunchukState,
    PointerPosition,
};

use super::frame_decoder::decode_frame;
use super::motion_integrator::integrate;
use super::state_reducer::reduce_event;
use crate::transport::{FrameSource, MAX_FRAME_LEN};

/// Intentional shutdown requests surfaced out of the drain loop.
///
/// These are the only two things that end a session; every decode or reduce
/// failure is local and the loop keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Tear the emulator down.
    Quit,
    /// Emulated power button; the caller decides what a power-off means.
    PowerOff,
}

/// Unified settings for the input session.
#[derive(Debug, Clone)]
pub struct InputSettings {
    /// Tick cadence in milliseconds. One tick = drain all waiting frames,
    /// integrate once, publish once.
    pub tick_interval_ms: u64,

    /// How 0x01 binary pointer frames are interpreted.
    pub pointer_frame_mode: PointerFrameMode,

    /// Motion integration constants.
    pub tuning: MotionTuning,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10, // ~100 snapshots/sec, well under sender rates
            pointer_frame_mode: PointerFrameMode::default(),
            tuning: MotionTuning::default(),
        }
    }
}

// Session errors
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Failed to initialize input session: {0}")]
    InitializationError(String),

    #[error("Failed to publish device snapshot: {0}")]
    SnapshotUpdateError(String),
}

/// Events collected by one drain pass, in arrival order.
#[derive(Debug, Clone)]
pub struct EventBatch {
    pub events: Vec<InputEvent>,
}

// Tick phases as typestates
#[state]
#[derive(Debug, Clone)]
pub enum TickState {
    Idle,
    Reducing(EventBatch),
    Integrating,
}

#[machine]
pub struct InputSession<S: TickState> {
    // Frame supplier; the only collaborator that may have data waiting
    source: Box<dyn FrameSource>,

    // Session settings
    settings: InputSettings,

    // Persistent device snapshot
    device: DeviceState,

    // Held-direction latches and the per-tick delta accumulator
    flags: DirectionFlags,

    // Snapshot broadcast channel
    snapshot_sender: watch::Sender<DeviceState>,

    // Diagnostic snapshot logging, flipped by ToggleReports
    show_reports: bool,
}

/// Result of one drain pass: either a batch to reduce or a terminal signal.
pub enum DrainStep {
    Continue(InputSession<Reducing>),
    Shutdown(ControlSignal),
}

impl<S: TickState> InputSession<S> {
    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.snapshot_sender.subscribe()
    }

    pub fn settings(&self) -> &InputSettings {
        &self.settings
    }
}

impl InputSession<Idle> {
    pub fn create(source: Box<dyn FrameSource>, settings: InputSettings) -> Self {
        info!("Creating input session with settings: {:?}", settings);

        let device = DeviceState::default();
        let (snapshot_sender, _) = watch::channel(device.clone());
        debug!("Created watch channel for device snapshots");

        Self::new(
            source,
            settings,
            device,
            DirectionFlags::default(),
            snapshot_sender,
            false,
        )
    }

    /// Drains and decodes every waiting frame.
    ///
    /// Frames are handled strictly in arrival order. Malformed frames are
    /// dropped with a warning and never affect their successors. A terminal
    /// control stops the drain immediately; whatever is still queued in the
    /// transport stays there.
    pub fn drain(mut self) -> DrainStep {
        let mut events = Vec::new();
        let mut buf = [0u8; MAX_FRAME_LEN];

        loop {
            let len = match self.source.poll_frame(&mut buf) {
                Ok(Some(len)) => len,
                Ok(None) => break,
                Err(e) => {
                    // not would-block; drop the tick's remaining input and carry on
                    warn!("transport receive failed: {}", e);
                    break;
                }
            };

            match decode_frame(&buf[..len], self.settings.pointer_frame_mode) {
                Ok(InputEvent::Control { control, .. }) => match control {
                    EmulatorControl::Quit => {
                        info!("quit requested over the wire");
                        return DrainStep::Shutdown(ControlSignal::Quit);
                    }
                    EmulatorControl::PowerOff => {
                        info!("power-off requested over the wire");
                        return DrainStep::Shutdown(ControlSignal::PowerOff);
                    }
                    EmulatorControl::ToggleReports => {
                        self.show_reports = !self.show_reports;
                        debug!("snapshot report logging now {}", self.show_reports);
                    }
                },
                Ok(event) => {
                    debug!("decoded event: {:?}", event);
                    events.push(event);
                }
                Err(e) => {
                    warn!("dropping frame: {}", e);
                }
            }
        }

        if !events.is_empty() {
            debug!("drained batch of {} events", events.len());
        }

        DrainStep::Continue(self.transition_with(EventBatch { events }))
    }
}

impl InputSession<Reducing> {
    /// Applies the drained batch to the device state, in order.
    pub fn reduce_batch(mut self) -> InputSession<Integrating> {
        let events = match self.get_state_data() {
            Some(batch) => batch.events.clone(),
            None => {
                warn!("no event batch found in state data, this should not happen");
                Vec::new()
            }
        };

        for event in &events {
            reduce_event(&mut self.device, &mut self.flags, event);
        }

        self.transition()
    }
}

impl InputSession<Integrating> {
    /// Runs the motion integrator once and broadcasts the snapshot.
    pub fn integrate_and_publish(mut self) -> Result<InputSession<Idle>, InputError> {
        integrate(&mut self.device, &mut self.flags, &self.settings.tuning);

        if self.show_reports {
            info!("{}", summarize(&self.device));
        }

        self.snapshot_sender
            .send(self.device.clone())
            .map_err(|e| InputError::SnapshotUpdateError(e.to_string()))?;

        Ok(self.transition())
    }
}

fn summarize(device: &DeviceState) -> String {
    format!(
        "pointer:({:.3},{:.3}) ext:{:?} nunchuk:({},{}) classic:({},{}) gyro:({},{}) accel:({:.2},{:.2},{:.2})",
        device.pointer.x,
        device.pointer.y,
        device.extension,
        device.nunchuk.x,
        device.nunchuk.y,
        device.classic.ls_x,
        device.classic.ls_y,
        device.motion_plus.pitch,
        device.motion_plus.yaw,
        device.accel.0,
        device.accel.1,
        device.accel.2,
    )
}

/// Handle for the spawned input session.
///
/// Lightweight: a snapshot receiver plus the shutdown signal channel. The
/// session task itself is fire-and-forget and ends only on a terminal control
/// or a publish failure.
pub struct InputHandle {
    snapshot_receiver: watch::Receiver<DeviceState>,
    shutdown_receiver: mpsc::Receiver<ControlSignal>,
}

impl InputHandle {
    /// Spawns the tick loop as a tokio task.
    pub fn spawn(source: Box<dyn FrameSource>, settings: Option<InputSettings>) -> Self {
        let settings = settings.unwrap_or_default();
        info!("Spawning input session with settings: {:?}", settings);

        let session = InputSession::create(source, settings);
        let snapshot_receiver = session.subscribe();
        let (shutdown_sender, shutdown_receiver) = mpsc::channel(1);

        tokio::spawn(async move {
            match run_session_loop(session).await {
                Ok(signal) => {
                    info!("input session finished with {:?}", signal);
                    if shutdown_sender.send(signal).await.is_err() {
                        warn!("shutdown signal dropped, handle already gone");
                    }
                }
                Err(e) => error!("input session terminated with error: {}", e),
            }
        });

        Self {
            snapshot_receiver,
            shutdown_receiver,
        }
    }

    /// Receiver for per-tick device snapshots.
    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.snapshot_receiver.clone()
    }

    /// Resolves when the session ends through a terminal control. `None`
    /// means the session task died without one (publish failure).
    pub async fn wait_for_shutdown(&mut self) -> Option<ControlSignal> {
        self.shutdown_receiver.recv().await
    }
}

async fn run_session_loop(session: InputSession<Idle>) -> Result<ControlSignal, InputError> {
    let tick_interval_ms = session.settings().tick_interval_ms;
    info!("Starting input tick loop with {}ms interval", tick_interval_ms);

    let mut interval_timer =
        tokio::time::interval(tokio::time::Duration::from_millis(tick_interval_ms));

    // Periodic throughput stats
    let mut ticks: u64 = 0;
    let mut total_events: u64 = 0;
    let mut last_stats_time = Local::now();
    let stats_interval = chrono::Duration::seconds(30);

    let mut session = session;
    loop {
        interval_timer.tick().await;

        let reducing = match session.drain() {
            DrainStep::Shutdown(signal) => return Ok(signal),
            DrainStep::Continue(reducing) => reducing,
        };

        if let Some(batch) = reducing.get_state_data() {
            total_events += batch.events.len() as u64;
        }

        session = reducing.reduce_batch().integrate_and_publish()?;
        ticks += 1;

        let now = Local::now();
        if now - last_stats_time > stats_interval {
            let elapsed = (now - last_stats_time).num_seconds();
            info!(
                "input session stats: {} ticks, {} events in {} seconds",
                ticks, total_events, elapsed
            );
            ticks = 0;
            total_events = 0;
            last_stats_time = now;
        }
    }
}
