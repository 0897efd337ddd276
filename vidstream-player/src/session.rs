//! One capture session: the open handle, its loop-control state and the
//! background read loop.

use crate::metadata::{CaptureMetadata, PlaybackPosition};
use crate::error::VideoError;
use crate::speed::normal_interval_ms;
use image::RgbImage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};
use vidstream_capture::{
    CaptureBackend, CaptureHandle, CaptureProperty, CaptureSource, FrameData, SourceKind,
};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Messages from a session thread to the owning thread.
///
/// A session sends exactly one of `Opened` or `OpenFailed` first; frames and
/// `Ended` follow only after `Opened`.
pub(crate) enum SessionEvent {
    Opened {
        session: u64,
        metadata: CaptureMetadata,
        normal_interval_ms: u64,
    },
    OpenFailed {
        session: u64,
        error: VideoError,
    },
    Frame {
        session: u64,
        /// Seek generation the frame was read under.
        generation: u64,
        frame: FrameData,
        position: Option<PlaybackPosition>,
    },
    Ended {
        session: u64,
    },
}

/// Settings a session needs from the controller.
pub(crate) struct SessionSetup {
    pub id: u64,
    pub source: CaptureSource,
    pub camera_frame_width: Option<u32>,
    pub default_interval_ms: u64,
    pub pause_poll: Duration,
}

/// State guarded by the session lock: reads, seeks and pause changes never
/// overlap.
pub(crate) struct Guarded {
    /// `None` until the source has opened, and again once released.
    pub handle: Option<Box<dyn CaptureHandle>>,
    pub paused: bool,
    /// Bumped by every seek so frames read before it can be told apart.
    pub generation: u64,
}

/// Cancellation flag with a condvar so waits can be cut short.
struct Signal {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

impl Signal {
    fn new() -> Self {
        Self {
            cancelled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn cancel(&self) {
        *lock(&self.cancelled) = true;
        self.condvar.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        *lock(&self.cancelled)
    }

    /// Wake any waiter so it re-evaluates its deadline.
    fn wake(&self) {
        let _guard = lock(&self.cancelled);
        self.condvar.notify_all();
    }

    /// Sleep until `remaining` returns `None` or the session is cancelled.
    /// `remaining` is re-evaluated under the lock after every wake-up.
    /// Returns `true` if cancelled.
    fn wait_while(&self, mut remaining: impl FnMut() -> Option<Duration>) -> bool {
        let mut cancelled = lock(&self.cancelled);
        loop {
            if *cancelled {
                return true;
            }
            let Some(timeout) = remaining() else {
                return false;
            };
            cancelled = self
                .condvar
                .wait_timeout(cancelled, timeout)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// State shared between the controller and one session thread.
pub(crate) struct SessionShared {
    guarded: Mutex<Guarded>,
    signal: Signal,
    interval_ms: AtomicU64,
}

impl SessionShared {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            guarded: Mutex::new(Guarded {
                handle: None,
                paused: false,
                generation: 0,
            }),
            signal: Signal::new(),
            interval_ms: AtomicU64::new(interval_ms.max(1)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Guarded> {
        lock(&self.guarded)
    }

    pub fn cancel(&self) {
        self.signal.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    fn install(&self, handle: Box<dyn CaptureHandle>) {
        self.lock().handle = Some(handle);
    }

    pub fn set_paused(&self, paused: bool) {
        self.lock().paused = paused;
        self.signal.wake();
    }

    pub fn set_interval_ms(&self, ms: u64) {
        self.interval_ms.store(ms.max(1), Ordering::SeqCst);
        self.signal.wake();
    }

    fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::SeqCst))
    }

    /// Wait until one frame interval has passed since `delivered`, picking
    /// up interval changes made during the wait. Returns `true` if cancelled.
    fn pace(&self, delivered: Instant) -> bool {
        self.signal
            .wait_while(|| self.interval().checked_sub(delivered.elapsed()).filter(|d| !d.is_zero()))
    }

    /// Release the handle if the session still holds it open.
    pub fn release(&self) {
        let handle = self.lock().handle.take();
        if let Some(mut handle) = handle {
            if handle.is_opened() {
                handle.release();
            }
        }
    }
}

/// Open the source and apply the post-open camera settings.
fn open(
    setup: &SessionSetup,
    backend: &dyn CaptureBackend,
) -> Result<(SourceKind, Box<dyn CaptureHandle>), VideoError> {
    let kind = setup.source.kind().ok_or(VideoError::NoSource)?;
    let mut handle = backend.open(&setup.source)?;
    if !handle.is_opened() {
        return Err(VideoError::SourceUnavailable(setup.source.to_string()));
    }

    if kind == SourceKind::Camera {
        if let Some(width) = setup.camera_frame_width {
            match handle.set(CaptureProperty::FrameWidth, width as f64) {
                Ok(true) => debug!("Camera frame width set to {}", width),
                Ok(false) => debug!("Camera does not accept a frame width request"),
                Err(e) => warn!("Failed to request camera frame width {}: {}", width, e),
            }
        }
    }
    Ok((kind, handle))
}

/// Body of a session thread: open the source, report the outcome on
/// `events`, then run the read loop until the stream ends or the session is
/// cancelled.
pub(crate) fn run(
    setup: SessionSetup,
    backend: Arc<dyn CaptureBackend>,
    shared: Arc<SessionShared>,
    events: Sender<SessionEvent>,
) {
    let id = setup.id;
    let (kind, handle) = match open(&setup, backend.as_ref()) {
        Ok(opened) => opened,
        Err(error) => {
            debug!("Session {} failed to open {}: {}", id, setup.source, error);
            let _ = events.send(SessionEvent::OpenFailed { session: id, error });
            return;
        }
    };

    let metadata = CaptureMetadata::probe(handle.as_ref(), kind);
    let fps = metadata.stream_info().and_then(|info| info.fps);
    let interval_ms = normal_interval_ms(kind, fps, setup.default_interval_ms);
    shared.set_interval_ms(interval_ms);
    shared.install(handle);

    // Stopped while the open was in progress.
    if shared.is_cancelled() {
        shared.release();
        debug!("Session {} cancelled during open", id);
        return;
    }

    let opened = SessionEvent::Opened {
        session: id,
        metadata,
        normal_interval_ms: interval_ms,
    };
    if events.send(opened).is_err() {
        shared.release();
        return;
    }

    info!("Session {} playing {} every {} ms", id, setup.source, interval_ms);
    let delivered = read_loop(id, kind, &shared, &events, setup.pause_poll);

    shared.release();
    info!("Session {} finished after {} frames", id, delivered);
    let _ = events.send(SessionEvent::Ended { session: id });
}

fn read_loop(
    id: u64,
    kind: SourceKind,
    shared: &SessionShared,
    events: &Sender<SessionEvent>,
    pause_poll: Duration,
) -> u64 {
    let started = Instant::now();
    let mut buffer = RgbImage::new(0, 0);
    let mut frame_number = 0;

    loop {
        if shared.signal.is_cancelled() {
            break;
        }

        let mut guarded = shared.lock();
        if guarded.paused {
            drop(guarded);
            let poll_until = Instant::now() + pause_poll;
            let paused = || shared.lock().paused;
            if shared
                .signal
                .wait_while(|| poll_until.checked_duration_since(Instant::now()).filter(|_| paused()))
            {
                break;
            }
            continue;
        }

        let generation = guarded.generation;
        let Some(handle) = guarded.handle.as_mut().filter(|h| h.is_opened()) else {
            break;
        };
        let read = handle.read(&mut buffer);
        let position = (kind == SourceKind::File).then(|| PlaybackPosition::probe(&**handle));
        drop(guarded);

        match read {
            Ok(true) if buffer.width() > 0 && buffer.height() > 0 => {}
            Ok(_) => {
                debug!("Session {} reached end of stream", id);
                break;
            }
            Err(e) => {
                warn!("Session {} read failed, ending stream: {}", id, e);
                break;
            }
        }

        // A frame read after stop was requested is dropped.
        if shared.signal.is_cancelled() {
            break;
        }

        frame_number += 1;
        let timestamp = position
            .and_then(|p| p.msec)
            .map(|ms| ms / 1000.0)
            .unwrap_or_else(|| started.elapsed().as_secs_f64());
        trace!("Session {} frame {} at {:.3}s", id, frame_number, timestamp);

        let event = SessionEvent::Frame {
            session: id,
            generation,
            frame: FrameData::new(buffer.clone(), timestamp, frame_number),
            position,
        };
        if events.send(event).is_err() {
            debug!("Session {} lost its controller", id);
            break;
        }

        if shared.pace(Instant::now()) {
            break;
        }
    }

    frame_number
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_cancel_interrupts_wait() {
        let signal = Arc::new(Signal::new());
        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || signal.wait_while(|| Some(Duration::from_secs(30))))
        };
        thread::sleep(Duration::from_millis(20));
        signal.cancel();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_wait_returns_when_deadline_passes() {
        let signal = Signal::new();
        let deadline = Instant::now() + Duration::from_millis(10);
        let cancelled = signal.wait_while(|| deadline.checked_duration_since(Instant::now()));
        assert!(!cancelled);
        assert!(Instant::now() >= deadline);
    }

    #[test]
    fn test_pace_follows_interval_change() {
        use vidstream_capture::SyntheticBackend;

        let backend = SyntheticBackend::new(2, 2);
        let shared = Arc::new(SessionShared::new(10_000));
        shared.install(backend.open(&CaptureSource::camera(0)).unwrap());

        let start = Instant::now();
        let pacer = {
            let shared = shared.clone();
            thread::spawn(move || shared.pace(Instant::now()))
        };
        thread::sleep(Duration::from_millis(20));
        shared.set_interval_ms(30);
        assert!(!pacer.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(5));

        shared.release();
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_cancel_during_open_releases_handle() {
        use std::sync::mpsc;
        use vidstream_capture::SyntheticBackend;

        let backend = Arc::new(SyntheticBackend::new(2, 2));
        let shared = Arc::new(SessionShared::new(33));
        shared.cancel();
        let setup = SessionSetup {
            id: 7,
            source: CaptureSource::camera(0),
            camera_frame_width: None,
            default_interval_ms: 33,
            pause_poll: Duration::from_millis(5),
        };
        let (events, received) = mpsc::channel();
        run(setup, backend.clone(), shared, events);

        assert!(received.try_recv().is_err());
        assert_eq!(backend.opened_handles(), 1);
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_open_failure_is_reported_as_event() {
        use std::sync::mpsc;
        use vidstream_capture::SyntheticBackend;

        let backend = Arc::new(SyntheticBackend::new(2, 2).with_unavailable_camera(3));
        let setup = SessionSetup {
            id: 2,
            source: CaptureSource::camera(3),
            camera_frame_width: None,
            default_interval_ms: 33,
            pause_poll: Duration::from_millis(5),
        };
        let (events, received) = mpsc::channel();
        run(setup, backend, Arc::new(SessionShared::new(33)), events);

        match received.try_recv() {
            Ok(SessionEvent::OpenFailed { session: 2, error }) => {
                assert!(matches!(error, VideoError::SourceUnavailable(_)))
            }
            _ => panic!("expected an open failure"),
        }
        assert!(received.try_recv().is_err());
    }
}
