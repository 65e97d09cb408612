// ============================================================================
// Healing worker: the engine session on its own thread, driven by messages
// ============================================================================
//
// The caller never touches the session directly: it sends an `Envelope`
// (caller id + request) over a channel and receives exactly one `Reply` with
// the same id. Pixel buffers are moved into requests and moved back out of
// replies, so a buffer handed to the worker cannot be reused by the caller.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use image::RgbaImage;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use uuid::Uuid;

use crate::error::{HealError, HealResult};
use crate::ops::heal::stroke::apply_stroke;
use crate::ops::heal::{Dab, DabPatch, HealParams, apply_dab};
use crate::{log_err, log_info, log_warn};

// ============================================================================
// Transfer buffer
// ============================================================================

/// Owned RGBA bytes with their dimensions, validated on construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> HealResult<Self> {
        if width == 0 || height == 0 {
            return Err(HealError::InvalidDimensions {
                width: width as i64,
                height: height as i64,
            });
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(HealError::InvalidBuffer(format!(
                "expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    pub fn from_image(image: RgbaImage) -> HealResult<Self> {
        let (w, h) = image.dimensions();
        Self::new(w, h, image.into_raw())
    }

    pub fn into_image(self) -> HealResult<RgbaImage> {
        let (w, h) = (self.width, self.height);
        RgbaImage::from_raw(w, h, self.data)
            .ok_or_else(|| HealError::InvalidBuffer(format!("cannot view {}x{} as rgba", w, h)))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }
}

// ============================================================================
// Messages
// ============================================================================

pub enum HealRequest {
    /// Handshake; answered with `Ready`.
    Init,
    /// Replace the session's preview image.
    SetPreviewImage(PixelBuffer),
    /// Heal one dab on the preview image.
    ApplyPreviewDab { dab: Dab, params: HealParams },
    /// Apply a whole stroke to a caller-owned buffer and hand it back.
    ApplyStrokeOnRoi {
        roi: PixelBuffer,
        dabs: Vec<Option<Dab>>,
        params: HealParams,
    },
}

impl HealRequest {
    pub fn name(&self) -> &'static str {
        match self {
            HealRequest::Init => "init",
            HealRequest::SetPreviewImage(_) => "setPreviewImage",
            HealRequest::ApplyPreviewDab { .. } => "applyPreviewDab",
            HealRequest::ApplyStrokeOnRoi { .. } => "applyStrokeOnRoi",
        }
    }
}

#[derive(Debug)]
pub enum HealResponse {
    Ready,
    PreviewImageSet,
    /// `None` when the dab had no effect.
    PreviewDab(Option<DabPatch>),
    Stroke(PixelBuffer),
}

struct Envelope {
    id: u64,
    request: HealRequest,
}

struct Reply {
    id: u64,
    result: HealResult<HealResponse>,
}

// ============================================================================
// Session: single-threaded engine state
// ============================================================================

/// Engine state: the owned preview image and the search RNG.
pub struct HealSession {
    id: Uuid,
    preview: Option<RgbaImage>,
    rng: Pcg32,
}

impl Default for HealSession {
    fn default() -> Self {
        Self::with_seed(rand::random())
    }
}

impl HealSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session whose PatchMatch searches are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            preview: None,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn preview(&self) -> Option<&RgbaImage> {
        self.preview.as_ref()
    }

    /// Run one request to completion.
    pub fn handle(&mut self, request: HealRequest) -> HealResult<HealResponse> {
        match request {
            HealRequest::Init => Ok(HealResponse::Ready),
            HealRequest::SetPreviewImage(buffer) => {
                let image = buffer.into_image()?;
                log_info!(
                    "[heal {}] preview image {}x{}",
                    self.id,
                    image.width(),
                    image.height()
                );
                self.preview = Some(image);
                Ok(HealResponse::PreviewImageSet)
            }
            HealRequest::ApplyPreviewDab { dab, params } => {
                let image = self.preview.as_mut().ok_or(HealError::PreviewNotSet)?;
                let patch = apply_dab(image, dab, &params, &mut self.rng);
                Ok(HealResponse::PreviewDab(patch))
            }
            HealRequest::ApplyStrokeOnRoi { roi, dabs, params } => {
                let mut image = roi.into_image()?;
                let start = Instant::now();
                let applied = apply_stroke(&mut image, &dabs, &params, &mut self.rng);
                log_info!(
                    "[heal {}] stroke: {}/{} dabs applied on {}x{} in {:.0}ms",
                    self.id,
                    applied,
                    dabs.len(),
                    image.width(),
                    image.height(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
                Ok(HealResponse::Stroke(PixelBuffer::from_image(image)?))
            }
        }
    }
}

fn worker_loop(
    mut session: HealSession,
    requests: Receiver<Envelope>,
    replies: Sender<Reply>,
    shutdown: Arc<AtomicBool>,
) {
    log_info!("[heal {}] worker started", session.id());
    while let Ok(Envelope { id, request }) = requests.recv() {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let name = request.name();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            session.handle(request)
        }));
        let result = match result {
            Ok(r) => r,
            Err(panic_info) => {
                let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.to_string()
                } else {
                    "unknown panic payload".to_string()
                };
                log_err!("[heal {}] '{}' panicked: {}", session.id(), name, msg);
                Err(HealError::WorkerPanic(msg))
            }
        };
        if let Err(e) = &result {
            log_warn!("[heal {}] request {} '{}' failed: {}", session.id(), id, name, e);
        }
        if replies.send(Reply { id, result }).is_err() {
            break;
        }
    }
    log_info!("[heal {}] worker stopped", session.id());
}

// ============================================================================
// Client
// ============================================================================

/// Caller-side handle to a worker thread.
pub struct HealingEngine {
    sender: Option<Sender<Envelope>>,
    receiver: Receiver<Reply>,
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    next_id: u64,
    in_flight: HashSet<u64>,
    /// Replies that arrived while waiting on a different id.
    stashed: HashMap<u64, HealResult<HealResponse>>,
    ready: bool,
}

impl HealingEngine {
    pub fn spawn() -> HealResult<Self> {
        Self::spawn_session(HealSession::new())
    }

    pub fn spawn_seeded(seed: u64) -> HealResult<Self> {
        Self::spawn_session(HealSession::with_seed(seed))
    }

    fn spawn_session(session: HealSession) -> HealResult<Self> {
        let (req_tx, req_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        let handle = std::thread::Builder::new()
            .name("heal-worker".to_string())
            .spawn(move || worker_loop(session, req_rx, reply_tx, flag))?;
        Ok(Self {
            sender: Some(req_tx),
            receiver: reply_rx,
            handle: Some(handle),
            shutdown,
            next_id: 1,
            in_flight: HashSet::new(),
            stashed: HashMap::new(),
            ready: false,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_alive(&self) -> bool {
        self.sender.is_some()
    }

    /// Queue a request; the returned id is later passed to [`Self::wait`].
    pub fn submit(&mut self, request: HealRequest) -> HealResult<u64> {
        let sender = self.sender.as_ref().ok_or(HealError::WorkerGone)?;
        let id = self.next_id;
        self.next_id += 1;
        sender
            .send(Envelope { id, request })
            .map_err(|_| HealError::WorkerGone)?;
        self.in_flight.insert(id);
        Ok(id)
    }

    /// Block until the reply for `id` arrives.
    pub fn wait(&mut self, id: u64) -> HealResult<HealResponse> {
        self.wait_until(id, None)
    }

    /// Like [`Self::wait`] but gives up after `timeout`; the request stays
    /// in flight and can be waited on again.
    pub fn wait_timeout(&mut self, id: u64, timeout: Duration) -> HealResult<HealResponse> {
        self.wait_until(id, Some(Instant::now() + timeout))
    }

    fn wait_until(&mut self, id: u64, deadline: Option<Instant>) -> HealResult<HealResponse> {
        if let Some(result) = self.stashed.remove(&id) {
            return result;
        }
        if !self.in_flight.contains(&id) {
            return Err(HealError::UnknownRequest(id));
        }
        loop {
            let reply = match deadline {
                None => self.receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
                Some(d) => self
                    .receiver
                    .recv_timeout(d.saturating_duration_since(Instant::now())),
            };
            match reply {
                Ok(Reply { id: rid, result }) => {
                    if !self.in_flight.remove(&rid) {
                        // Reply to a call already failed by terminate()
                        continue;
                    }
                    if rid == id {
                        return result;
                    }
                    self.stashed.insert(rid, result);
                }
                Err(RecvTimeoutError::Timeout) => return Err(HealError::Timeout(id)),
                Err(RecvTimeoutError::Disconnected) => {
                    log_err!("healing worker disconnected with {} calls pending", self.in_flight.len());
                    self.fail_in_flight();
                    self.sender = None;
                    self.ready = false;
                    return self.stashed.remove(&id).unwrap_or(Err(HealError::WorkerGone));
                }
            }
        }
    }

    pub fn call(&mut self, request: HealRequest) -> HealResult<HealResponse> {
        let id = self.submit(request)?;
        self.wait(id)
    }

    /// Handshake with the worker. Only the first call does anything.
    pub fn init(&mut self) -> HealResult<()> {
        if self.ready {
            return Ok(());
        }
        match self.call(HealRequest::Init)? {
            HealResponse::Ready => {
                self.ready = true;
                Ok(())
            }
            other => Err(unexpected("init", &other)),
        }
    }

    pub fn set_preview_image(&mut self, image: PixelBuffer) -> HealResult<()> {
        self.init()?;
        match self.call(HealRequest::SetPreviewImage(image))? {
            HealResponse::PreviewImageSet => Ok(()),
            other => Err(unexpected("setPreviewImage", &other)),
        }
    }

    pub fn apply_preview_dab(&mut self, dab: Dab, params: HealParams) -> HealResult<Option<DabPatch>> {
        self.init()?;
        match self.call(HealRequest::ApplyPreviewDab { dab, params })? {
            HealResponse::PreviewDab(patch) => Ok(patch),
            other => Err(unexpected("applyPreviewDab", &other)),
        }
    }

    pub fn apply_stroke_on_roi(
        &mut self,
        roi: PixelBuffer,
        dabs: Vec<Option<Dab>>,
        params: HealParams,
    ) -> HealResult<PixelBuffer> {
        self.init()?;
        match self.call(HealRequest::ApplyStrokeOnRoi { roi, dabs, params })? {
            HealResponse::Stroke(buffer) => Ok(buffer),
            other => Err(unexpected("applyStrokeOnRoi", &other)),
        }
    }

    /// Stop the worker. Queued requests are dropped and every in-flight id
    /// resolves to [`HealError::WorkerGone`].
    pub fn terminate(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.sender = None;
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log_err!("healing worker thread panicked during shutdown");
        }
        self.fail_in_flight();
        self.ready = false;
    }

    fn fail_in_flight(&mut self) {
        for id in self.in_flight.drain() {
            self.stashed.insert(id, Err(HealError::WorkerGone));
        }
    }
}

impl Drop for HealingEngine {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn unexpected(call: &str, response: &HealResponse) -> HealError {
    HealError::UnexpectedReply(format!("{} answered with {:?}", call, response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gray(w: u32, h: u32) -> PixelBuffer {
        PixelBuffer::from_image(RgbaImage::from_pixel(w, h, Rgba([90, 90, 90, 255]))).unwrap()
    }

    #[test]
    fn pixel_buffer_validation() {
        assert!(matches!(
            PixelBuffer::new(0, 4, Vec::new()),
            Err(HealError::InvalidDimensions { width: 0, height: 4 })
        ));
        assert!(matches!(
            PixelBuffer::new(2, 2, vec![0; 15]),
            Err(HealError::InvalidBuffer(_))
        ));
        let buf = PixelBuffer::new(2, 2, vec![7; 16]).unwrap();
        assert_eq!(buf.into_image().unwrap().dimensions(), (2, 2));
    }

    #[test]
    fn session_rejects_dab_before_image() {
        let mut session = HealSession::with_seed(1);
        let err = session
            .handle(HealRequest::ApplyPreviewDab {
                dab: Dab::new(5.0, 5.0),
                params: HealParams::default(),
            })
            .unwrap_err();
        assert!(matches!(err, HealError::PreviewNotSet));
        assert!(session.preview().is_none());
    }

    #[test]
    fn session_replaces_preview() {
        let mut session = HealSession::with_seed(1);
        session.handle(HealRequest::SetPreviewImage(gray(10, 10))).unwrap();
        session.handle(HealRequest::SetPreviewImage(gray(30, 20))).unwrap();
        assert_eq!(session.preview().unwrap().dimensions(), (30, 20));
    }

    #[test]
    fn request_names() {
        assert_eq!(HealRequest::Init.name(), "init");
        assert_eq!(HealRequest::SetPreviewImage(gray(1, 1)).name(), "setPreviewImage");
    }
}
