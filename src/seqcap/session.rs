//! Capture session state machine
//!
//! ## Responsibilities
//!
//! - The end-to-end master/slave sequence: peer preparation, quiescence,
//!   storage mount, camera configuration, the capture loop, finalization
//! - Guaranteed restoration on every exit path
//!
//! One state machine serves both roles; the role selects "prepare peer or
//! not" and "self-timed pulse vs. externally-triggered capture". Phases are
//! strictly ordered and teardown fans in: a mount failure skips straight to
//! resume, a configure failure unmounts then resumes, and a mid-loop grab or
//! persist failure keeps the partial sequence and goes through the normal
//! finalize path. `Quiescence::resume` and `SessionGate::end` run
//! unconditionally, in that order, as the final two actions.

use super::config::SequenceCaptureConfig;
use super::persist;
use super::prepare;
use super::quiesce::Quiescence;
use super::trigger::{self, OutputPin};
use crate::error::Result;
use crate::state::CaptureContext;
use crate::storage;
use std::sync::Arc;
use std::time::Duration;

/// Frames grabbed and thrown away before the first synchronized frame, so
/// auto-exposure settles on the new configuration.
const WARMUP_FRAMES: u32 = 5;
const WARMUP_SPACING: Duration = Duration::from_millis(30);
const WARMUP_SETTLE: Duration = Duration::from_secs(1);

/// Short settle between the sync pulse and the storage write.
const WRITE_SETTLE: Duration = Duration::from_millis(5);

/// Role-specific session inputs
#[derive(Debug, Clone)]
pub enum SessionRole {
    Master { peer_host: String },
    Slave,
}

impl SessionRole {
    fn as_str(&self) -> &'static str {
        match self {
            SessionRole::Master { .. } => "master",
            SessionRole::Slave => "slave",
        }
    }
}

/// Run one capture session to completion. The caller has already claimed the
/// session gate; this function releases it on every exit path.
pub async fn run_session(ctx: Arc<CaptureContext>, role: SessionRole, cfg: SequenceCaptureConfig) {
    tracing::info!(
        role = role.as_str(),
        pixformat = cfg.pixel_format.code(),
        framesize = cfg.frame_size.code(),
        sequence = %cfg.sequence_name,
        frames = cfg.frame_count,
        "capture session starting"
    );

    // Peer preparation happens while the radio and HTTP server still run.
    // Best effort: the peer may already be armed, or may simply be late.
    if let SessionRole::Master { peer_host } = &role {
        if !peer_host.is_empty() {
            if let Err(e) = prepare::prepare_peer(&ctx.http, &cfg, peer_host).await {
                tracing::warn!(peer = %peer_host, error = %e, "peer prepare failed (continuing anyway)");
            }
        }
        if cfg.slave_prepare_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(cfg.slave_prepare_delay_ms)).await;
        }
    }

    let quiesce = Quiescence::new(Arc::clone(&ctx.server), Arc::clone(&ctx.radio));
    quiesce.suspend().await;

    match mounted_phase(&ctx, &role, &cfg).await {
        Ok(written) => {
            tracing::info!(
                role = role.as_str(),
                sequence = %cfg.sequence_name,
                frames_written = written,
                "capture session complete"
            );
        }
        Err(e) => {
            tracing::error!(role = role.as_str(), error = %e, "capture session aborted");
        }
    }

    quiesce.resume().await;
    ctx.gate.end();
}

/// STORAGE_READY through STORAGE_FINALIZED. The mount/unmount pair is
/// balanced here no matter how the inner phases end.
async fn mounted_phase(
    ctx: &CaptureContext,
    role: &SessionRole,
    cfg: &SequenceCaptureConfig,
) -> Result<u32> {
    let width = storage::mount(ctx.storage.as_ref()).await?;
    tracing::info!(lanes = width.lanes(), "storage ready");

    let captured = configured_capture(ctx, role, cfg).await;

    if let Err(e) = ctx.storage.unmount().await {
        tracing::warn!(error = %e, "storage unmount failed");
    }

    let written = captured?;

    // Operator-visible "done" signal; the indicator pin conflicts with the
    // storage bus, so this only runs against an unmounted card.
    blink_done(ctx.indicator.as_ref()).await;

    // Remount for subsequent static-file serving.
    if let Err(e) = storage::mount(ctx.storage.as_ref()).await {
        tracing::warn!(error = %e, "storage remount failed");
    }

    Ok(written)
}

/// CONFIGURED + CAPTURING. Returns `Err` only for resource failures
/// (directory creation, camera configuration, interrupt arming); capture-loop
/// failures end the loop early and report the partial count.
async fn configured_capture(
    ctx: &CaptureContext,
    role: &SessionRole,
    cfg: &SequenceCaptureConfig,
) -> Result<u32> {
    persist::ensure_capture_dir(ctx.storage.as_ref(), &cfg.sequence_name).await?;
    cfg.apply_to(ctx.camera.as_ref()).await?;

    match role {
        SessionRole::Master { .. } => Ok(capture_master(ctx, cfg).await),
        SessionRole::Slave => capture_slave(ctx, cfg).await,
    }
}

/// Self-timed master loop: pulse-bracketed grab, settle, persist, dispose.
async fn capture_master(ctx: &CaptureContext, cfg: &SequenceCaptureConfig) -> u32 {
    warmup(ctx).await;

    ctx.sync_pin.set_low();
    let mut written = 0;

    for frame in 0..cfg.frame_count {
        let grabbed = trigger::pulsed_grab(ctx.sync_pin.as_ref(), ctx.camera.as_ref()).await;
        let buf = match grabbed {
            Ok(buf) => buf,
            Err(e) => {
                tracing::error!(frame, error = %e, "frame grab failed");
                break;
            }
        };

        tokio::time::sleep(WRITE_SETTLE).await;

        let rv = persist::persist_frame(ctx.storage.as_ref(), cfg, ctx.uptime_ms(), &buf.data).await;
        // return the buffer no matter what
        ctx.camera.frame_dispose().await;

        match rv {
            Ok(()) => written += 1,
            Err(e) => {
                tracing::error!(frame, error = %e, "frame write failed");
                break;
            }
        }

        if cfg.inter_frame_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(cfg.inter_frame_delay_ms)).await;
        }
    }

    written
}

/// Externally-triggered slave loop: wait for the edge, grab, persist.
///
/// The wait has no timeout: if the master stops early the loop stays blocked
/// until the process is torn down, matching the pulse-counting contract.
async fn capture_slave(ctx: &CaptureContext, cfg: &SequenceCaptureConfig) -> Result<u32> {
    ctx.trigger.drain();
    ctx.trigger_line.arm(Arc::clone(&ctx.trigger))?;

    let mut written = 0;

    for frame in 0..cfg.frame_count {
        ctx.trigger.wait().await;

        let buf = match ctx.camera.frame_grab().await {
            Ok(buf) => buf,
            Err(e) => {
                tracing::error!(frame, error = %e, "frame grab failed");
                break;
            }
        };

        let rv = persist::persist_frame(ctx.storage.as_ref(), cfg, ctx.uptime_ms(), &buf.data).await;
        ctx.camera.frame_dispose().await;

        match rv {
            Ok(()) => written += 1,
            Err(e) => {
                tracing::error!(frame, error = %e, "frame write failed");
                break;
            }
        }
    }

    ctx.trigger_line.disarm();
    Ok(written)
}

/// Grab-and-drop a few frames so exposure adapts to the fresh configuration.
async fn warmup(ctx: &CaptureContext) {
    for _ in 0..WARMUP_FRAMES {
        if ctx.camera.frame_grab().await.is_ok() {
            ctx.camera.frame_dispose().await;
        }
        tokio::time::sleep(WARMUP_SPACING).await;
    }
    tokio::time::sleep(WARMUP_SETTLE).await;
}

/// One long blink, then two short ones.
async fn blink_done(pin: &dyn OutputPin) {
    pin.set_high();
    tokio::time::sleep(Duration::from_millis(600)).await;
    pin.set_low();
    tokio::time::sleep(Duration::from_millis(300)).await;

    for _ in 0..2 {
        pin.set_high();
        tokio::time::sleep(Duration::from_millis(180)).await;
        pin.set_low();
        tokio::time::sleep(Duration::from_millis(180)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, FrameBuf};
    use crate::error::Error;
    use crate::radio::NetworkRadio;
    use crate::seqcap::config::{ControlOverlay, FrameSize, PixelFormat};
    use crate::seqcap::quiesce::ServerControl;
    use crate::seqcap::trigger::{SyncTrigger, TriggerLine};
    use crate::storage::{BusWidth, Storage};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockCamera {
        ctrl_log: Mutex<Vec<(String, i32)>>,
        grabs: AtomicU32,
        disposes: AtomicU32,
        fail_grab_at: Option<u32>,
        fail_ctrl: Option<&'static str>,
    }

    #[async_trait]
    impl Camera for MockCamera {
        async fn frame_grab(&self) -> Result<FrameBuf> {
            let n = self.grabs.fetch_add(1, Ordering::SeqCst);
            if Some(n) == self.fail_grab_at {
                return Err(Error::Camera("sensor timeout".to_string()));
            }
            Ok(FrameBuf {
                data: vec![0xFF, 0xD8, n as u8],
            })
        }

        async fn frame_dispose(&self) {
            self.disposes.fetch_add(1, Ordering::SeqCst);
        }

        async fn ctrl_set(&self, name: &str, value: i32) -> Result<()> {
            if Some(name) == self.fail_ctrl {
                return Err(Error::Camera(format!("ctrl {name} rejected")));
            }
            self.ctrl_log
                .lock()
                .unwrap()
                .push((name.to_string(), value));
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockStorage {
        root: PathBuf,
        mounted: AtomicBool,
        writes: Mutex<Vec<PathBuf>>,
        mounts: AtomicU32,
        fail_mount: bool,
        fail_wide_mount: bool,
        fail_mkdirs: bool,
        fail_write_at: Option<u32>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                root: PathBuf::from("/card"),
                ..Default::default()
            }
        }

        fn write_count(&self) -> u32 {
            self.writes.lock().unwrap().len() as u32
        }
    }

    #[async_trait]
    impl Storage for MockStorage {
        fn mount_root(&self) -> &Path {
            &self.root
        }

        async fn mount_width(&self, width: BusWidth) -> Result<()> {
            if self.fail_mount || (self.fail_wide_mount && width == BusWidth::Four) {
                return Err(Error::Storage("no card".to_string()));
            }
            self.mounts.fetch_add(1, Ordering::SeqCst);
            self.mounted.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn unmount(&self) -> Result<()> {
            self.mounted.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn mkdirs(&self, _path: &Path) -> Result<()> {
            if self.fail_mkdirs {
                return Err(Error::Storage("mkdir failed".to_string()));
            }
            Ok(())
        }

        async fn write_file(&self, path: &Path, _data: &[u8]) -> Result<()> {
            let mut writes = self.writes.lock().unwrap();
            if Some(writes.len() as u32) == self.fail_write_at {
                return Err(Error::Storage("write failed".to_string()));
            }
            writes.push(path.to_path_buf());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockRadio {
        running: AtomicBool,
        connected: AtomicBool,
    }

    #[async_trait]
    impl NetworkRadio for MockRadio {
        async fn stop(&self) -> Result<()> {
            self.running.store(false, Ordering::SeqCst);
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn start(&self) -> Result<()> {
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn connect(&self) -> Result<()> {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockServer {
        running: AtomicBool,
    }

    #[async_trait]
    impl ServerControl for MockServer {
        async fn stop(&self) -> Result<()> {
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn start(&self) -> Result<()> {
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockPin {
        rising_edges: AtomicU32,
    }

    impl OutputPin for MockPin {
        fn set_high(&self) {
            self.rising_edges.fetch_add(1, Ordering::SeqCst);
        }

        fn set_low(&self) {}
    }

    #[derive(Default)]
    struct MockLine {
        armed: AtomicBool,
    }

    impl TriggerLine for MockLine {
        fn arm(&self, _trigger: Arc<SyncTrigger>) -> Result<()> {
            self.armed.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn disarm(&self) {
            self.armed.store(false, Ordering::SeqCst);
        }
    }

    struct Rig {
        camera: Arc<MockCamera>,
        storage: Arc<MockStorage>,
        radio: Arc<MockRadio>,
        server: Arc<MockServer>,
        sync_pin: Arc<MockPin>,
        line: Arc<MockLine>,
        ctx: Arc<CaptureContext>,
    }

    fn rig_with(camera: MockCamera, storage: MockStorage) -> Rig {
        let camera = Arc::new(camera);
        let storage = Arc::new(storage);
        let radio = Arc::new(MockRadio::default());
        let server = Arc::new(MockServer::default());
        let sync_pin = Arc::new(MockPin::default());
        let line = Arc::new(MockLine::default());
        let indicator = Arc::new(MockPin::default());

        // sessions start from a running service
        radio.running.store(true, Ordering::SeqCst);
        radio.connected.store(true, Ordering::SeqCst);
        server.running.store(true, Ordering::SeqCst);

        let ctx = Arc::new(CaptureContext::new(
            Arc::clone(&camera) as Arc<dyn Camera>,
            Arc::clone(&storage) as Arc<dyn Storage>,
            Arc::clone(&radio) as Arc<dyn NetworkRadio>,
            Arc::clone(&server) as Arc<dyn ServerControl>,
            Arc::clone(&sync_pin) as Arc<dyn OutputPin>,
            Arc::clone(&line) as Arc<dyn TriggerLine>,
            indicator as Arc<dyn OutputPin>,
        ));
        assert!(ctx.gate.try_begin());

        Rig {
            camera,
            storage,
            radio,
            server,
            sync_pin,
            line,
            ctx,
        }
    }

    fn cfg(frames: u32) -> SequenceCaptureConfig {
        SequenceCaptureConfig {
            pixel_format: PixelFormat::Jpeg,
            frame_size: FrameSize::Vga,
            sequence_name: "t1".to_string(),
            frame_count: frames,
            slave_prepare_delay_ms: 0,
            inter_frame_delay_ms: 0,
            overlay: ControlOverlay::default(),
        }
    }

    fn assert_restored(rig: &Rig) {
        assert!(rig.radio.running.load(Ordering::SeqCst), "radio restored");
        assert!(
            rig.radio.connected.load(Ordering::SeqCst),
            "radio reconnected"
        );
        assert!(rig.server.running.load(Ordering::SeqCst), "server restored");
        assert!(!rig.ctx.gate.is_active(), "gate cleared");
    }

    #[tokio::test(start_paused = true)]
    async fn test_master_session_writes_all_frames() {
        let rig = rig_with(MockCamera::default(), MockStorage::new());

        run_session(
            Arc::clone(&rig.ctx),
            SessionRole::Master {
                peer_host: String::new(),
            },
            cfg(3),
        )
        .await;

        assert_eq!(rig.storage.write_count(), 3);
        let writes = rig.storage.writes.lock().unwrap();
        for path in writes.iter() {
            assert!(path.starts_with("/card/captures/t1"));
            assert!(path.to_string_lossy().ends_with("-vga.raw"));
        }
        drop(writes);

        // 3 sync pulses, one per frame
        assert_eq!(rig.sync_pin.rising_edges.load(Ordering::SeqCst), 3);
        // every successful grab was disposed (warmup + capture frames)
        assert_eq!(
            rig.camera.grabs.load(Ordering::SeqCst),
            rig.camera.disposes.load(Ordering::SeqCst)
        );
        // storage remounted for static serving after the session
        assert!(rig.storage.mounted.load(Ordering::SeqCst));
        assert_restored(&rig);
    }

    #[tokio::test(start_paused = true)]
    async fn test_master_proceeds_when_peer_unreachable() {
        let rig = rig_with(MockCamera::default(), MockStorage::new());

        run_session(
            Arc::clone(&rig.ctx),
            SessionRole::Master {
                peer_host: "peer.invalid".to_string(),
            },
            cfg(3),
        )
        .await;

        // preparation failure is soft; the local sequence still runs
        assert_eq!(rig.storage.write_count(), 3);
        assert_restored(&rig);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pixformat_and_framesize_applied_before_overlay() {
        let rig = rig_with(MockCamera::default(), MockStorage::new());
        let mut config = cfg(1);
        config.overlay = ControlOverlay::default()
            .with("agc_gain", 9)
            .with("hmirror", 1);

        run_session(
            Arc::clone(&rig.ctx),
            SessionRole::Master {
                peer_host: String::new(),
            },
            config,
        )
        .await;

        let log = rig.camera.ctrl_log.lock().unwrap();
        assert_eq!(log[0], ("pixformat".to_string(), PixelFormat::Jpeg.code()));
        assert_eq!(log[1], ("framesize".to_string(), FrameSize::Vga.code()));
        assert_eq!(log[2], ("agc_gain".to_string(), 9));
        assert_eq!(log[3], ("hmirror".to_string(), 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_failure_restores_and_writes_nothing() {
        let storage = MockStorage {
            fail_mount: true,
            ..MockStorage::new()
        };
        let rig = rig_with(MockCamera::default(), storage);

        run_session(
            Arc::clone(&rig.ctx),
            SessionRole::Master {
                peer_host: String::new(),
            },
            cfg(4),
        )
        .await;

        assert_eq!(rig.storage.write_count(), 0);
        // camera never touched
        assert!(rig.camera.ctrl_log.lock().unwrap().is_empty());
        assert!(!rig.storage.mounted.load(Ordering::SeqCst));
        assert_restored(&rig);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wide_mount_falls_back_to_narrow() {
        let storage = MockStorage {
            fail_wide_mount: true,
            ..MockStorage::new()
        };
        let rig = rig_with(MockCamera::default(), storage);

        run_session(
            Arc::clone(&rig.ctx),
            SessionRole::Master {
                peer_host: String::new(),
            },
            cfg(1),
        )
        .await;

        assert_eq!(rig.storage.write_count(), 1);
        assert_restored(&rig);
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_failure_unmounts_without_finalize() {
        let camera = MockCamera {
            fail_ctrl: Some("framesize"),
            ..Default::default()
        };
        let rig = rig_with(camera, MockStorage::new());

        run_session(
            Arc::clone(&rig.ctx),
            SessionRole::Master {
                peer_host: String::new(),
            },
            cfg(2),
        )
        .await;

        assert_eq!(rig.storage.write_count(), 0);
        // abort path: unmount only, no remount
        assert!(!rig.storage.mounted.load(Ordering::SeqCst));
        assert_eq!(rig.storage.mounts.load(Ordering::SeqCst), 1);
        assert_restored(&rig);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_capture_keeps_earlier_frames() {
        // warmup takes grabs 0..5; first capture grab is 5, second is 6
        let camera = MockCamera {
            fail_grab_at: Some(6),
            ..Default::default()
        };
        let rig = rig_with(camera, MockStorage::new());

        run_session(
            Arc::clone(&rig.ctx),
            SessionRole::Master {
                peer_host: String::new(),
            },
            cfg(5),
        )
        .await;

        // one frame landed before the failure; the partial sequence is kept
        assert_eq!(rig.storage.write_count(), 1);
        // finalize still ran: remounted for static serving
        assert!(rig.storage.mounted.load(Ordering::SeqCst));
        assert_restored(&rig);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_failure_stops_early() {
        let storage = MockStorage {
            fail_write_at: Some(2),
            ..MockStorage::new()
        };
        let rig = rig_with(MockCamera::default(), storage);

        run_session(
            Arc::clone(&rig.ctx),
            SessionRole::Master {
                peer_host: String::new(),
            },
            cfg(5),
        )
        .await;

        assert_eq!(rig.storage.write_count(), 2);
        // dispose still paired with the failed frame's grab
        assert_eq!(
            rig.camera.grabs.load(Ordering::SeqCst),
            rig.camera.disposes.load(Ordering::SeqCst)
        );
        assert_restored(&rig);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slave_session_driven_by_trigger() {
        let rig = rig_with(MockCamera::default(), MockStorage::new());
        let ctx = Arc::clone(&rig.ctx);

        let session = tokio::spawn(run_session(Arc::clone(&ctx), SessionRole::Slave, cfg(2)));

        // wait for the interrupt line to be armed
        while !rig.line.armed.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // nothing happens until the first edge
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rig.storage.write_count(), 0);

        for expected in 1..=2u32 {
            ctx.trigger.signal();
            while rig.storage.write_count() < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }

        session.await.unwrap();
        assert!(!rig.line.armed.load(Ordering::SeqCst), "line disarmed");
        assert_eq!(rig.storage.write_count(), 2);
        assert_restored(&rig);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slave_drains_stale_signal_before_arming() {
        let rig = rig_with(MockCamera::default(), MockStorage::new());
        let ctx = Arc::clone(&rig.ctx);

        // stale pulse from a previous session
        ctx.trigger.signal();

        let session = tokio::spawn(run_session(Arc::clone(&ctx), SessionRole::Slave, cfg(1)));

        while !rig.line.armed.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // the stale signal must not produce a frame
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(rig.storage.write_count(), 0);

        ctx.trigger.signal();
        session.await.unwrap();
        assert_eq!(rig.storage.write_count(), 1);
        assert_restored(&rig);
    }
}
