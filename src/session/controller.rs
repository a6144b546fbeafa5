use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::{SessionParams, StartParams};
use super::finalize::{finalize, reset_file};
use super::record::CaptureSession;
use crate::audio::{AudioDevice, AudioFormat, AudioSource, CaptureLoop};
use crate::config::SettingsStore;
use crate::error::{CollectorError, Result};

/// Observable controller phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Preparing,
    Recording,
    Stopping,
    /// Output written and logged; the controller returns to Idle right after
    Finalized,
}

/// What ended the Recording phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTrigger {
    Explicit,
    Timer,
    Shutdown,
}

struct ActiveSession {
    session: CaptureSession,
    params: SessionParams,
    capture: CaptureLoop,
    timer: Option<JoinHandle<()>>,
}

enum ControllerState {
    Idle,
    Preparing,
    Recording(ActiveSession),
    Stopping,
}

impl ControllerState {
    fn phase(&self) -> SessionPhase {
        match self {
            ControllerState::Idle => SessionPhase::Idle,
            ControllerState::Preparing => SessionPhase::Preparing,
            ControllerState::Recording(_) => SessionPhase::Recording,
            ControllerState::Stopping => SessionPhase::Stopping,
        }
    }
}

struct Shared {
    state: Mutex<ControllerState>,
    phase_tx: watch::Sender<SessionPhase>,
    device: Arc<dyn AudioDevice>,
    settings: Arc<dyn SettingsStore>,
    format: AudioFormat,
}

/// Opened device plus the parameters it was opened for
struct OpenedSource {
    source: Box<dyn AudioSource>,
    buffer_size: usize,
    params: SessionParams,
}

/// Drives one capture session at a time: start, timed or explicit stop,
/// finalization into a WAV container, and the session log row.
///
/// Cloning yields another handle to the same controller. Once `start` or
/// `stop` has claimed a transition, the transition runs to completion on its
/// own task even if the caller's future is dropped.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn new(device: Arc<dyn AudioDevice>, settings: Arc<dyn SettingsStore>) -> Self {
        let (phase_tx, _) = watch::channel(SessionPhase::Idle);

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ControllerState::Idle),
                phase_tx,
                device,
                settings,
                format: AudioFormat::CAPTURE,
            }),
        }
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        *self.shared.phase_tx.borrow()
    }

    /// Receive every phase change
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.shared.phase_tx.subscribe()
    }

    /// Wait until no session is active.
    pub async fn wait_until_idle(&self) {
        let mut rx = self.subscribe();
        if rx.wait_for(|phase| *phase == SessionPhase::Idle).await.is_err() {
            debug!("Phase channel closed while waiting for idle");
        }
    }

    /// Start a capture session.
    ///
    /// Returns [`CollectorError::MissingParameter`] (nothing touched),
    /// [`CollectorError::Busy`] (existing session unaffected) or
    /// [`CollectorError::DeviceUnavailable`] (no file or log row created).
    pub async fn start(&self, params: StartParams) -> Result<()> {
        let params = params.validate().map_err(|e| {
            warn!("Ignoring start request: {}", e);
            e
        })?;

        let task = {
            let mut state = self.shared.state.lock().await;
            if !matches!(*state, ControllerState::Idle) {
                warn!("Start requested while {:?}; rejecting", state.phase());
                return Err(CollectorError::Busy);
            }
            *state = ControllerState::Preparing;
            self.shared.publish(SessionPhase::Preparing);

            tokio::spawn(Arc::clone(&self.shared).begin_recording(params))
        };

        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!("Start task failed: {}", e);
                self.shared.settle_idle().await;
                Err(CollectorError::DeviceUnavailable {
                    reason: format!("capture setup did not complete: {}", e),
                })
            }
        }
    }

    /// Stop the active session and finalize it.
    ///
    /// Returns the finalized session, or `None` when nothing was recording
    /// (including when the duration timer got there first).
    pub async fn stop(&self) -> Option<CaptureSession> {
        self.shared.stop_session(StopTrigger::Explicit).await
    }

    /// Stop and finalize any active session before the host exits.
    ///
    /// Also waits out a start or stop that is already in flight, so the
    /// controller is Idle with everything on disk when this returns.
    pub async fn shutdown(&self) -> Option<CaptureSession> {
        let mut phases = self.subscribe();
        loop {
            if let Some(session) = self.shared.stop_session(StopTrigger::Shutdown).await {
                return Some(session);
            }

            let phase = *phases.borrow_and_update();
            if phase == SessionPhase::Idle {
                return None;
            }
            debug!("Shutdown waiting for {:?} to settle", phase);
            if phases.changed().await.is_err() {
                return None;
            }
        }
    }
}

/// Open the device and reset the session files. Blocking.
fn open_source(
    device: &dyn AudioDevice,
    format: &AudioFormat,
    params: SessionParams,
) -> Result<OpenedSource> {
    let source = device.open(format)?;
    let buffer_size = device.min_buffer_size(format);

    reset_file(&params.temp_file);
    reset_file(&params.output_file);

    Ok(OpenedSource {
        source,
        buffer_size,
        params,
    })
}

impl Shared {
    fn publish(&self, phase: SessionPhase) {
        self.phase_tx.send_replace(phase);
    }

    async fn settle_idle(&self) {
        let mut state = self.state.lock().await;
        *state = ControllerState::Idle;
        self.publish(SessionPhase::Idle);
    }

    /// Preparing -> Recording, or back to Idle on failure.
    async fn begin_recording(self: Arc<Self>, params: SessionParams) -> Result<()> {
        let duration = params.duration(self.settings.as_ref());

        let device = Arc::clone(&self.device);
        let format = self.format;
        let opened = tokio::task::spawn_blocking(move || open_source(device.as_ref(), &format, params))
            .await
            .unwrap_or_else(|e| {
                Err(CollectorError::DeviceUnavailable {
                    reason: format!("device open task failed: {}", e),
                })
            });

        let mut state = self.state.lock().await;
        let OpenedSource {
            source,
            buffer_size,
            params,
        } = match opened {
            Ok(opened) => opened,
            Err(e) => {
                error!("Failed to start capture session: {}", e);
                *state = ControllerState::Idle;
                self.publish(SessionPhase::Idle);
                return Err(e);
            }
        };

        let session = CaptureSession::new(params.triggered, params.sample, duration, params.file_name());

        info!(
            "Capturing from {} device into {} ({} byte buffers)",
            self.device.name(),
            params.temp_file.display(),
            buffer_size
        );
        let capture = CaptureLoop::spawn(source, params.temp_file.clone(), buffer_size);

        // Armed under the state lock so the timer can only ever see Recording.
        let timer = Some(self.arm_timer(duration));
        info!(
            "Recording {} for {:?} (triggered={}, sample={})",
            params.output_file.display(),
            duration,
            session.triggered,
            session.sample
        );

        *state = ControllerState::Recording(ActiveSession {
            session,
            params,
            capture,
            timer,
        });
        self.publish(SessionPhase::Recording);
        Ok(())
    }

    fn arm_timer(self: &Arc<Self>, duration: Duration) -> JoinHandle<()> {
        let shared: Weak<Shared> = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(shared) = shared.upgrade() {
                info!("Capture duration of {:?} elapsed", duration);
                shared.stop_session(StopTrigger::Timer).await;
            }
        })
    }

    /// Take the active session out of Recording. Only the first caller wins.
    async fn begin_stopping(&self) -> Option<ActiveSession> {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, ControllerState::Stopping) {
            ControllerState::Recording(active) => {
                self.publish(SessionPhase::Stopping);
                Some(active)
            }
            other => {
                *state = other;
                None
            }
        }
    }

    async fn stop_session(self: &Arc<Self>, trigger: StopTrigger) -> Option<CaptureSession> {
        let Some(mut active) = self.begin_stopping().await else {
            debug!("Stop ({:?}) ignored: no session recording", trigger);
            return None;
        };

        active.session.mark_ended();
        info!("Stopping capture session ({:?})", trigger);

        if trigger != StopTrigger::Timer {
            if let Some(timer) = active.timer.take() {
                timer.abort();
            }
        }

        let task = tokio::spawn(Arc::clone(self).finish_stop(active));
        match task.await {
            Ok(session) => Some(session),
            Err(e) => {
                error!("Stop task failed: {}", e);
                self.settle_idle().await;
                None
            }
        }
    }

    /// Stopping -> Finalized -> Idle.
    async fn finish_stop(self: Arc<Self>, active: ActiveSession) -> CaptureSession {
        let ActiveSession {
            session,
            params,
            capture,
            ..
        } = active;

        let report = capture.stop().await;
        info!(
            "Capture stopped: {} bytes ({:?})",
            report.bytes_captured, report.end
        );

        let output = params.output_file.clone();
        let fallback = session.clone();
        let finalized = tokio::task::spawn_blocking(move || {
            let mut session = session;
            let result = finalize(&params, &mut session, &report);
            (session, result)
        })
        .await;

        let session = match finalized {
            Ok((session, Ok(()))) => {
                self.publish(SessionPhase::Finalized);
                session
            }
            Ok((session, Err(e))) => {
                error!("Failed to finalize {}: {}", output.display(), e);
                session
            }
            Err(e) => {
                error!("Finalize task for {} failed: {}", output.display(), e);
                fallback
            }
        };

        if let Some(elapsed) = session.elapsed() {
            info!(
                "Session {} captured for {:.1}s",
                session.file_name,
                elapsed.num_milliseconds() as f64 / 1000.0
            );
        }

        self.settle_idle().await;
        session
    }
}
