//! Capture session lifecycle
//!
//! The device stream is opened and read on a dedicated capture thread
//! (cpal streams are not `Send`). `start` waits for that thread to report
//! whether the stream opened, so open failures are returned to the caller
//! directly instead of surfacing later as a silent state flip.
//!
//! At most one capture thread exists per session. A thread that outlived the
//! bounded wait in `stop` is kept as `lingering` and must have exited before
//! the next `start` opens the device again.

use super::frames::{frame_log, FrameLog, FrameWriter};
use super::{AudioDevice, AudioHost, CaptureFormat, FrameBuffer, InputStream, ReadError};
use crate::error::DeviceError;
use crate::state::SessionState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

/// How long `start` waits for the capture thread to open the device
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `stop` waits for the capture thread to exit, and how long `start`
/// waits for a lingering one
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

const REAP_POLL: Duration = Duration::from_millis(10);

/// Handles to a running capture thread
struct ActiveCapture {
    running: Arc<AtomicBool>,
    log: FrameLog,
    fault: Arc<OnceLock<String>>,
    done_rx: mpsc::Receiver<()>,
    handle: thread::JoinHandle<()>,
}

/// What `ActiveCapture::halt` leaves behind
struct Halted {
    buffer: FrameBuffer,
    fault: Option<String>,
    /// Thread that did not exit in time
    lingering: Option<thread::JoinHandle<()>>,
}

impl ActiveCapture {
    /// Signal the loop, wait for the thread (bounded) and take its frames
    fn halt(self) -> Halted {
        self.running.store(false, Ordering::Release);

        let lingering = match self.done_rx.recv_timeout(JOIN_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    tracing::error!("Capture thread panicked");
                }
                None
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "Capture thread did not exit within {}s, keeping {} captured chunks",
                    JOIN_TIMEOUT.as_secs(),
                    self.log.len()
                );
                Some(self.handle)
            }
        };

        Halted {
            buffer: self.log.take(),
            fault: self.fault.get().cloned(),
            lingering,
        }
    }
}

/// One device stream and the audio it produces
///
/// Reusable: after `stop` the session is idle again and can `start` anew.
pub struct CaptureSession {
    host: Arc<dyn AudioHost>,
    format: CaptureFormat,
    state: SessionState,
    active: Option<ActiveCapture>,
    /// Capture thread that has been told to stop but has not exited yet
    lingering: Option<thread::JoinHandle<()>>,
    /// Chunk count of the last finished recording
    last_chunks: usize,
    /// Fault that ended the last finished recording early
    last_fault: Option<String>,
}

impl CaptureSession {
    /// Create an idle session capturing in `format`
    pub fn new(host: Arc<dyn AudioHost>, format: CaptureFormat) -> Self {
        Self {
            host,
            format,
            state: SessionState::Idle,
            active: None,
            lingering: None,
            last_chunks: 0,
            last_fault: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state.is_recording()
    }

    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    /// Open `device` and start the capture loop.
    ///
    /// Returns once the stream is open. On failure no loop runs and the
    /// session stays idle. Fails with `OpenFailed` while the previous
    /// capture thread still holds its device.
    pub fn start(&mut self, device: &AudioDevice) -> Result<(), DeviceError> {
        if !self.state.is_idle() {
            return Err(DeviceError::AlreadyRecording);
        }
        self.reap_lingering()?;

        let running = Arc::new(AtomicBool::new(true));
        let (writer, log) = frame_log();
        let fault = Arc::new(OnceLock::new());
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), DeviceError>>(1);
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let host = Arc::clone(&self.host);
        let format = self.format;
        let thread_device = device.clone();
        let thread_running = Arc::clone(&running);
        let thread_fault = Arc::clone(&fault);

        let handle = thread::Builder::new()
            .name("sysrec-capture".to_string())
            .spawn(move || {
                let mut stream = match host.open_input(&thread_device, format) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                tracing::debug!("Audio capture thread started");
                capture_loop(stream.as_mut(), &thread_running, &writer, &thread_fault);

                // Release the device before reporting completion
                drop(stream);
                tracing::debug!("Audio capture thread stopped");
                let _ = done_tx.send(());
            })
            .map_err(|e| DeviceError::OpenFailed(format!("Failed to spawn capture thread: {}", e)))?;

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                tracing::warn!("Could not open {}: {}", device, e);
                return Err(e);
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                return Err(DeviceError::OpenFailed(
                    "capture thread exited while opening the device".to_string(),
                ));
            }
            Err(RecvTimeoutError::Timeout) => {
                // The loop exits as soon as the open returns
                running.store(false, Ordering::Release);
                self.lingering = Some(handle);
                return Err(DeviceError::OpenFailed(format!(
                    "device did not open within {}s",
                    OPEN_TIMEOUT.as_secs()
                )));
            }
        }

        tracing::info!("Recording from {}", device);
        self.last_chunks = 0;
        self.last_fault = None;
        self.active = Some(ActiveCapture {
            running,
            log,
            fault,
            done_rx,
            handle,
        });
        self.state = SessionState::Recording;

        Ok(())
    }

    /// Join a capture thread left over from a timed-out stop or open,
    /// waiting at most `JOIN_TIMEOUT` for it to exit
    fn reap_lingering(&mut self) -> Result<(), DeviceError> {
        let handle = match self.lingering.take() {
            Some(handle) => handle,
            None => return Ok(()),
        };

        let deadline = Instant::now() + JOIN_TIMEOUT;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                self.lingering = Some(handle);
                return Err(DeviceError::OpenFailed(
                    "previous capture thread is still releasing the device".to_string(),
                ));
            }
            thread::sleep(REAP_POLL);
        }

        if handle.join().is_err() {
            tracing::error!("Capture thread panicked");
        }
        tracing::debug!("Lingering capture thread joined");
        Ok(())
    }

    /// Stop the capture loop and hand over everything it captured
    pub fn stop(&mut self) -> Result<FrameBuffer, DeviceError> {
        let active = match self.active.take() {
            Some(active) => active,
            None => return Err(DeviceError::NotRecording),
        };

        self.state = SessionState::Stopping;
        let Halted {
            buffer,
            fault,
            lingering,
        } = active.halt();
        self.lingering = lingering;
        self.last_chunks = buffer.len();
        self.last_fault = fault;
        self.state = SessionState::Idle;

        tracing::info!(
            "Capture stopped: {} chunks ({:.2}s)",
            buffer.len(),
            self.format.seconds_for_chunks(buffer.len())
        );

        if buffer.is_empty() {
            return Err(DeviceError::EmptyRecording);
        }

        Ok(buffer)
    }

    /// Chunks captured by the current (or last) recording
    pub fn chunks_captured(&self) -> usize {
        match &self.active {
            Some(active) => active.log.len(),
            None => self.last_chunks,
        }
    }

    /// Seconds of audio captured by the current (or last) recording
    pub fn elapsed_seconds(&self) -> f64 {
        self.format.seconds_for_chunks(self.chunks_captured())
    }

    /// Reason the capture loop ended early, if it did
    pub fn fault(&self) -> Option<String> {
        match &self.active {
            Some(active) => active.fault.get().cloned(),
            None => self.last_fault.clone(),
        }
    }

    /// Whether the capture loop has exited while still recording
    pub fn capture_ended(&self) -> bool {
        self.active
            .as_ref()
            .map(|a| a.handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::debug!("Dropping active capture session, discarding audio");
            let _ = active.halt();
        }
    }
}

/// Read chunks until told to stop or the stream fails
fn capture_loop(
    stream: &mut dyn InputStream,
    running: &AtomicBool,
    writer: &FrameWriter,
    fault: &OnceLock<String>,
) {
    let mut skipped = 0usize;

    while running.load(Ordering::Acquire) {
        match stream.read_chunk() {
            Ok(chunk) => writer.append(chunk),
            Err(ReadError::Transient(reason)) => {
                skipped += 1;
                tracing::debug!("Skipped audio chunk: {}", reason);
            }
            Err(ReadError::Fatal(reason)) => {
                tracing::error!(
                    "Audio stream failed after {} chunks, keeping partial audio: {}",
                    writer.len(),
                    reason
                );
                let _ = fault.set(reason);
                break;
            }
        }
    }

    if skipped > 0 {
        tracing::warn!("{} audio reads were skipped (overrun or stall)", skipped);
    }
}
