//! Camera stream client.
//!
//! A device pushes frames for one camera over a dedicated TCP connection.
//! Each frame is preceded by a `u32` little-endian length and decoded with
//! [`StreamFrame`]. Frames carrying a payload are written under the session
//! folder; the step index of the newest frame is published through
//! [`StreamProgress`] so the orchestrator can tell when the rig reached a
//! target. The all-`0xFF` sentinel ends a stream normally; anything else
//! that ends it is a streaming fault.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rigwatch_core::{CameraKind, StreamFrame, epoch_millis};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info, warn};

use crate::error::{DeviceError, DeviceResult};

/// Frames larger than this are treated as a corrupt stream.
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Side-channel notifications raised while a stream is being consumed.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameNotice {
    /// The first frame with image data arrived.
    FirstImage { camera: CameraKind },
    /// A thermal frame carried a sensor temperature.
    Temperature { celsius: f32, captured_at_ms: i64 },
}

/// Shared progress of one camera stream.
#[derive(Debug)]
pub struct StreamProgress {
    last_step: AtomicI32,
    images: AtomicU64,
    faulted: AtomicBool,
    finished: AtomicBool,
    done: Notify,
}

impl Default for StreamProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamProgress {
    pub fn new() -> Self {
        Self {
            last_step: AtomicI32::new(i32::MIN),
            images: AtomicU64::new(0),
            faulted: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            done: Notify::new(),
        }
    }

    /// Step index of the newest frame, `None` before any frame arrived.
    pub fn step_index(&self) -> Option<i32> {
        match self.last_step.load(Ordering::Acquire) {
            i32::MIN => None,
            step => Some(step),
        }
    }

    pub fn record_step(&self, step: i32) {
        self.last_step.store(step, Ordering::Release);
    }

    /// Count one image written to disk. Returns the new total.
    pub fn record_image(&self) -> u64 {
        self.images.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn image_count(&self) -> u64 {
        self.images.load(Ordering::Acquire)
    }

    pub fn mark_faulted(&self) {
        self.faulted.store(true, Ordering::Release);
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    /// Signal that the stream ended and every frame is on disk.
    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
        self.done.notify_waiters();
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Wait until the stream finished. Returns `false` on timeout.
    pub async fn wait_finished(&self, timeout: Duration) -> bool {
        let notified = self.done.notified();
        if self.is_finished() {
            return true;
        }
        tokio::time::timeout(timeout, notified).await.is_ok() || self.is_finished()
    }
}

/// An open camera stream.
#[derive(Debug, Clone)]
pub struct StreamSession {
    pub camera: CameraKind,
    /// Folder frames are written to.
    pub folder: PathBuf,
    pub progress: Arc<StreamProgress>,
}

#[async_trait]
pub trait CameraStreamer: Send + Sync {
    /// Open the stream of `camera` on the device at `ip` and start consuming
    /// it in the background.
    async fn open(
        &self,
        ip: &str,
        device_id: &str,
        camera: CameraKind,
        notices: mpsc::UnboundedSender<FrameNotice>,
    ) -> DeviceResult<StreamSession>;
}

/// [`CameraStreamer`] over the device's TCP stream port.
#[derive(Debug, Clone)]
pub struct TcpCameraStreamer {
    port: u16,
    picture_root: PathBuf,
    connect_timeout: Duration,
}

impl TcpCameraStreamer {
    pub fn new(port: u16, picture_root: PathBuf, connect_timeout: Duration) -> Self {
        Self {
            port,
            picture_root,
            connect_timeout,
        }
    }
}

#[async_trait]
impl CameraStreamer for TcpCameraStreamer {
    async fn open(
        &self,
        ip: &str,
        device_id: &str,
        camera: CameraKind,
        notices: mpsc::UnboundedSender<FrameNotice>,
    ) -> DeviceResult<StreamSession> {
        let address = format!("{ip}:{}", self.port);
        let mut stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| DeviceError::Timeout {
                address: address.clone(),
                path: String::new(),
            })?
            .map_err(|e| DeviceError::Connect {
                address: address.clone(),
                reason: e.to_string(),
            })?;

        // First byte selects the camera.
        stream.write_u8(camera_selector(camera)).await?;

        let folder = self
            .picture_root
            .join(device_id)
            .join(camera.as_str())
            .join(epoch_millis().to_string());
        tokio::fs::create_dir_all(&folder).await?;
        info!(%address, %camera, folder = %folder.display(), "camera stream opened");

        let progress = Arc::new(StreamProgress::new());
        let session = StreamSession {
            camera,
            folder: folder.clone(),
            progress: progress.clone(),
        };
        tokio::spawn(async move {
            consume(stream, camera, &folder, &progress, &notices).await;
        });
        Ok(session)
    }
}

fn camera_selector(camera: CameraKind) -> u8 {
    match camera {
        CameraKind::Visible => b'v',
        CameraKind::Thermal => b'i',
    }
}

/// Marks a stream finished when dropped, and faulted unless it ended cleanly.
/// Also runs when the pump panics or its task is cancelled.
struct FinishOnDrop<'a> {
    progress: &'a StreamProgress,
    clean: bool,
}

impl Drop for FinishOnDrop<'_> {
    fn drop(&mut self) {
        if !self.clean {
            self.progress.mark_faulted();
        }
        self.progress.mark_finished();
    }
}

/// Run [`pump_frames`] to completion and record the outcome on `progress`.
pub async fn consume<R: AsyncRead + Unpin>(
    reader: R,
    camera: CameraKind,
    folder: &Path,
    progress: &StreamProgress,
    notices: &mpsc::UnboundedSender<FrameNotice>,
) {
    let mut outcome = FinishOnDrop {
        progress,
        clean: false,
    };
    match pump_frames(reader, camera, folder, progress, notices).await {
        Ok(()) => outcome.clean = true,
        Err(e) => warn!(%camera, error = %e, "camera stream failed"),
    }
    debug!(%camera, images = progress.image_count(), "camera stream finished");
}

/// Read length-prefixed frames until the end-of-stream sentinel.
pub async fn pump_frames<R: AsyncRead + Unpin>(
    mut reader: R,
    camera: CameraKind,
    folder: &Path,
    progress: &StreamProgress,
    notices: &mpsc::UnboundedSender<FrameNotice>,
) -> DeviceResult<()> {
    loop {
        let len = match reader.read_u32_le().await {
            Ok(len) => len,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(DeviceError::Stream(
                    "stream closed before end marker".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };
        if len > MAX_FRAME_LEN {
            return Err(DeviceError::Stream(format!("frame of {len} bytes")));
        }
        let mut buf = vec![0u8; len as usize];
        reader.read_exact(&mut buf).await?;

        if StreamFrame::is_sentinel(&buf) {
            return Ok(());
        }

        let frame = StreamFrame::decode(&buf);
        progress.record_step(frame.step_index);

        if camera == CameraKind::Thermal
            && let Some(celsius) = frame.temperature_celsius()
        {
            let _ = notices.send(FrameNotice::Temperature {
                celsius,
                captured_at_ms: frame.capture_unix_ms(),
            });
        }

        if let Some(payload) = frame.payload.as_deref().filter(|p| !p.is_empty()) {
            let path = folder.join(frame.file_name(camera));
            tokio::fs::write(&path, payload).await?;
            if progress.record_image() == 1 {
                let _ = notices.send(FrameNotice::FirstImage { camera });
            }
        }
    }
}
