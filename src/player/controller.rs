use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use super::pacer::TickPacer;
use crate::buffer::PixelBuffer;
use crate::filter::{self, FilterSelector};
use crate::shared::constants;
use crate::shared::error::{PipelineError, PipelineResult};
use crate::source::{FrameRead, FrameSource};
use crate::utils::logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Playing,
    Paused,
    Ended,
}

/// External intents. These queue instantly on the command channel and apply at
/// the next tick boundary; superseded speed/filter updates are last-write-wins.
#[derive(Debug, Clone)]
pub enum Command {
    Pause,
    Resume,
    Seek(f64),
    SetSpeed(f64),
    SetFilter(FilterSelector),
    Stop,
}

/// Snapshot of the mutable playback knobs. The active filter exists from
/// construction (default Identity), never as an optionally-absent attribute.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackState {
    pub running: bool,
    pub speed_multiplier: f64,
    pub active_filter: FilterSelector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// One frame pulled, filtered, and handed to the sink.
    Delivered,
    /// Not in `Playing`; nothing pulled.
    Skipped,
    /// The source reported end-of-stream; the controller is now `Ended`.
    Ended,
}

/// Timed scheduler around one frame source: pulls on a cadence, applies the
/// persisted filter, and forwards the result to the presentation sink.
pub struct PlaybackController<S: FrameSource> {
    source: Option<S>,
    state: PlayerState,
    speed: f64,
    active_filter: FilterSelector,
    base_interval: Duration,
    commands: Receiver<Command>,
    command_tx: Sender<Command>,
    sink: Box<dyn FnMut(PixelBuffer) + Send>,
    frames_delivered: u64,
}

impl<S: FrameSource> PlaybackController<S> {
    pub fn new(sink: impl FnMut(PixelBuffer) + Send + 'static) -> Self {
        let (command_tx, commands) = unbounded();
        Self {
            source: None,
            state: PlayerState::Idle,
            speed: 1.0,
            active_filter: FilterSelector::Identity,
            base_interval: Duration::from_millis(constants::DEFAULT_FRAME_INTERVAL_MS),
            commands,
            command_tx,
            sink: Box::new(sink),
            frames_delivered: 0,
        }
    }

    /// Handle for pushing commands from another thread. Commands never block
    /// the tick in progress.
    pub fn command_sender(&self) -> Sender<Command> {
        self.command_tx.clone()
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    #[allow(dead_code)]
    pub fn snapshot(&self) -> PlaybackState {
        PlaybackState {
            running: self.state == PlayerState::Playing,
            speed_multiplier: self.speed,
            active_filter: self.active_filter,
        }
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    #[allow(dead_code)]
    pub fn position_ms(&self) -> Option<f64> {
        self.source.as_ref().map(|s| s.position_ms())
    }

    #[allow(dead_code)]
    pub fn duration_ms(&self) -> Option<f64> {
        self.source.as_ref().and_then(|s| s.duration_ms())
    }

    /// Base cadence rescaled by the speed multiplier.
    pub fn effective_interval(&self) -> Duration {
        self.base_interval.div_f64(self.speed)
    }

    /// Adopts an opened source and enters `Playing`. Only legal from `Idle` or
    /// `Ended`; acquisition failures happen before this call, so a failed open
    /// leaves the controller `Idle`.
    pub fn start(&mut self, source: S) -> PipelineResult<()> {
        match self.state {
            PlayerState::Idle | PlayerState::Ended => {
                self.base_interval = source.frame_interval();
                self.source = Some(source);
                self.state = PlayerState::Playing;
                self.frames_delivered = 0;
                logger::debug("playback started");
                Ok(())
            }
            _ => Err(PipelineError::InvalidParameter(
                "start() requires Idle or Ended".to_string(),
            )),
        }
    }

    pub fn pause(&mut self) {
        if self.state == PlayerState::Playing {
            self.state = PlayerState::Paused;
            logger::debug("playback paused");
        }
    }

    pub fn resume(&mut self) {
        if self.state == PlayerState::Paused {
            self.state = PlayerState::Playing;
            logger::debug("playback resumed");
        }
    }

    /// Adjusts the source position by `delta_ms`. File sources clamp into
    /// `[0, duration]`; device sources surface `Unsupported`. State is never
    /// changed by a seek, successful or not.
    pub fn seek(&mut self, delta_ms: f64) -> PipelineResult<()> {
        match self.state {
            PlayerState::Playing | PlayerState::Paused => {
                let source = self
                    .source
                    .as_mut()
                    .expect("active states always hold a source");
                source.seek(delta_ms)
            }
            _ => Err(PipelineError::InvalidParameter(
                "seek requires an active source".to_string(),
            )),
        }
    }

    /// Rescales the pull cadence; the multiplier is clamped into
    /// [0.02, 2.0]. Does not change state.
    pub fn set_speed(&mut self, multiplier: f64) {
        self.speed = multiplier.clamp(constants::SPEED_MIN, constants::SPEED_MAX);
    }

    /// Updates the persisted filter; takes effect on the next tick.
    pub fn set_filter(&mut self, selector: FilterSelector) {
        self.active_filter = selector;
    }

    /// Releases the source and returns to `Idle`. Safe to call repeatedly and
    /// from any state; the source is closed exactly once.
    pub fn stop(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        if self.state != PlayerState::Idle {
            logger::debug("playback stopped");
        }
        self.state = PlayerState::Idle;
    }

    /// One pull-transform-deliver cycle. Only `Playing` pulls; end-of-stream
    /// transitions to `Ended` and releases the source. This is the only place
    /// the tick itself mutates the state machine.
    pub fn tick(&mut self) -> PipelineResult<TickOutcome> {
        if self.state != PlayerState::Playing {
            return Ok(TickOutcome::Skipped);
        }
        let source = self
            .source
            .as_mut()
            .expect("Playing always holds a source");

        match source.read_next()? {
            FrameRead::EndOfStream => {
                source.close();
                self.state = PlayerState::Ended;
                logger::debug("end of stream");
                Ok(TickOutcome::Ended)
            }
            FrameRead::Frame(buffer) => {
                let out = filter::apply(&buffer, &self.active_filter)?;
                (self.sink)(out);
                self.frames_delivered += 1;
                Ok(TickOutcome::Delivered)
            }
        }
    }

    /// Applies every queued command without blocking.
    pub fn process_pending(&mut self) {
        while let Ok(cmd) = self.commands.try_recv() {
            self.apply_command(cmd);
        }
    }

    fn apply_command(&mut self, cmd: Command) {
        match cmd {
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::Seek(delta_ms) => {
                // Channel delivery cannot return the error to the sender;
                // surface it in the log and leave state untouched.
                if let Err(e) = self.seek(delta_ms) {
                    logger::error(&format!("seek failed: {}", e));
                }
            }
            Command::SetSpeed(multiplier) => self.set_speed(multiplier),
            Command::SetFilter(selector) => self.set_filter(selector),
            Command::Stop => self.stop(),
        }
    }

    /// Drives the controller until the stream ends or it is stopped. Commands
    /// drain at every tick boundary; while paused the loop parks on the
    /// command channel so controls stay responsive without busy-waiting.
    pub fn run(&mut self, pacer: &mut dyn TickPacer) -> PipelineResult<()> {
        loop {
            self.process_pending();
            match self.state {
                PlayerState::Playing => {
                    if self.tick()? == TickOutcome::Ended {
                        break;
                    }
                    pacer.wait(self.effective_interval());
                }
                PlayerState::Paused => {
                    pacer.reset();
                    match self
                        .commands
                        .recv_timeout(Duration::from_millis(constants::PAUSE_POLL_MS))
                    {
                        Ok(cmd) => self.apply_command(cmd),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                PlayerState::Idle | PlayerState::Ended => break,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted source: frame N is a 2x2 gray buffer whose samples all equal N.
    struct SyntheticSource {
        total_frames: usize,
        cursor: usize,
        position_ms: f64,
        duration_ms: Option<f64>,
        frame_ms: f64,
        seekable: bool,
        open: bool,
        closes: Arc<AtomicU32>,
    }

    impl SyntheticSource {
        fn file_like(total_frames: usize, closes: Arc<AtomicU32>) -> Self {
            Self {
                total_frames,
                cursor: 0,
                position_ms: 0.0,
                duration_ms: Some(total_frames as f64 * 100.0),
                frame_ms: 100.0,
                seekable: true,
                open: true,
                closes,
            }
        }

        fn device_like(total_frames: usize, closes: Arc<AtomicU32>) -> Self {
            Self {
                duration_ms: None,
                seekable: false,
                ..Self::file_like(total_frames, closes)
            }
        }
    }

    impl FrameSource for SyntheticSource {
        fn read_next(&mut self) -> PipelineResult<FrameRead> {
            if self.cursor >= self.total_frames {
                return Ok(FrameRead::EndOfStream);
            }
            let value = self.cursor as u8;
            self.cursor += 1;
            self.position_ms += self.frame_ms;
            Ok(FrameRead::Frame(
                PixelBuffer::filled(2, 2, 1, value).unwrap(),
            ))
        }

        fn seek(&mut self, delta_ms: f64) -> PipelineResult<()> {
            let target = self.position_ms + delta_ms;
            self.seek_to(target)
        }

        fn seek_to(&mut self, position_ms: f64) -> PipelineResult<()> {
            if !self.seekable {
                return Err(PipelineError::Unsupported("seek on a live device"));
            }
            let mut target = position_ms.max(0.0);
            if let Some(duration) = self.duration_ms {
                target = target.min(duration);
            }
            self.position_ms = target;
            self.cursor = (target / self.frame_ms) as usize;
            Ok(())
        }

        fn position_ms(&self) -> f64 {
            self.position_ms
        }

        fn duration_ms(&self) -> Option<f64> {
            self.duration_ms
        }

        fn frame_interval(&self) -> Duration {
            Duration::from_millis(100)
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn close(&mut self) {
            if self.open {
                self.open = false;
                self.closes.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Records requested intervals instead of sleeping.
    struct RecordingPacer {
        intervals: Vec<Duration>,
    }

    impl TickPacer for RecordingPacer {
        fn wait(&mut self, interval: Duration) {
            self.intervals.push(interval);
        }

        fn reset(&mut self) {}
    }

    fn collecting_controller() -> (PlaybackController<SyntheticSource>, Arc<Mutex<Vec<u8>>>) {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink_copy = Arc::clone(&delivered);
        let controller = PlaybackController::new(move |buf: PixelBuffer| {
            sink_copy.lock().unwrap().push(buf.data()[0]);
        });
        (controller, delivered)
    }

    #[test]
    fn test_pause_resume_delivers_every_frame_once() {
        let closes = Arc::new(AtomicU32::new(0));
        let (mut ctl, delivered) = collecting_controller();
        ctl.start(SyntheticSource::device_like(10, closes)).unwrap();

        for _ in 0..4 {
            assert_eq!(ctl.tick().unwrap(), TickOutcome::Delivered);
        }
        ctl.pause();
        assert_eq!(ctl.state(), PlayerState::Paused);
        // Ticks while paused pull nothing.
        assert_eq!(ctl.tick().unwrap(), TickOutcome::Skipped);
        assert_eq!(ctl.tick().unwrap(), TickOutcome::Skipped);
        ctl.resume();

        loop {
            match ctl.tick().unwrap() {
                TickOutcome::Ended => break,
                TickOutcome::Delivered => {}
                TickOutcome::Skipped => panic!("unexpected skip while playing"),
            }
        }

        let got = delivered.lock().unwrap().clone();
        let want: Vec<u8> = (0..10).collect();
        assert_eq!(got, want, "no frame duplicated or skipped across the pause");
        assert_eq!(ctl.state(), PlayerState::Ended);
    }

    #[test]
    fn test_end_of_stream_closes_source_once() {
        let closes = Arc::new(AtomicU32::new(0));
        let (mut ctl, _) = collecting_controller();
        ctl.start(SyntheticSource::file_like(2, Arc::clone(&closes)))
            .unwrap();

        assert_eq!(ctl.tick().unwrap(), TickOutcome::Delivered);
        assert_eq!(ctl.tick().unwrap(), TickOutcome::Delivered);
        assert_eq!(ctl.tick().unwrap(), TickOutcome::Ended);
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        // Terminal until a new start; stop() after ending must not re-release.
        assert_eq!(ctl.tick().unwrap(), TickOutcome::Skipped);
        ctl.stop();
        ctl.stop();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(ctl.state(), PlayerState::Idle);
    }

    #[test]
    fn test_double_close_on_source_is_noop() {
        let closes = Arc::new(AtomicU32::new(0));
        let mut source = SyntheticSource::file_like(1, Arc::clone(&closes));
        source.close();
        source.close();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(!source.is_open());
    }

    #[test]
    fn test_seek_clamps_to_duration() {
        let closes = Arc::new(AtomicU32::new(0));
        let (mut ctl, _) = collecting_controller();
        // 100 frames at 100 ms = 10_000 ms duration.
        ctl.start(SyntheticSource::file_like(100, closes)).unwrap();

        for _ in 0..20 {
            ctl.tick().unwrap();
        }
        assert_eq!(ctl.position_ms(), Some(2000.0));

        ctl.seek(5000.0).unwrap();
        assert_eq!(ctl.position_ms(), Some(7000.0));

        ctl.seek(5000.0).unwrap();
        assert_eq!(ctl.position_ms(), Some(10000.0), "clamped at duration");

        ctl.seek(-20000.0).unwrap();
        assert_eq!(ctl.position_ms(), Some(0.0), "clamped at zero");
    }

    #[test]
    fn test_seek_on_device_is_unsupported_and_state_unchanged() {
        let closes = Arc::new(AtomicU32::new(0));
        let (mut ctl, _) = collecting_controller();
        ctl.start(SyntheticSource::device_like(5, closes)).unwrap();
        ctl.tick().unwrap();

        let err = ctl.seek(5000.0).unwrap_err();
        assert!(matches!(err, PipelineError::Unsupported(_)));
        assert_eq!(ctl.state(), PlayerState::Playing);
    }

    #[test]
    fn test_speed_rescales_interval_over_many_ticks() {
        let run_intervals = |speed: f64| -> Vec<Duration> {
            let closes = Arc::new(AtomicU32::new(0));
            let (mut ctl, _) = collecting_controller();
            ctl.start(SyntheticSource::file_like(25, closes)).unwrap();
            ctl.set_speed(speed);
            let mut pacer = RecordingPacer { intervals: Vec::new() };
            ctl.run(&mut pacer).unwrap();
            pacer.intervals
        };

        let normal = run_intervals(1.0);
        let fast = run_intervals(2.0);
        assert!(normal.len() >= 20 && fast.len() >= 20);

        let avg = |v: &[Duration]| -> f64 {
            v.iter().map(|d| d.as_secs_f64()).sum::<f64>() / v.len() as f64
        };
        let ratio = avg(&normal) / avg(&fast);
        assert!(
            (ratio - 2.0).abs() < 0.05,
            "set_speed(2.0) should halve the effective interval, ratio {}",
            ratio
        );
    }

    #[test]
    fn test_speed_clamped_to_bounds() {
        let (mut ctl, _) = collecting_controller();
        ctl.set_speed(50.0);
        assert_eq!(ctl.snapshot().speed_multiplier, constants::SPEED_MAX);
        ctl.set_speed(0.0);
        assert_eq!(ctl.snapshot().speed_multiplier, constants::SPEED_MIN);
    }

    #[test]
    fn test_filter_takes_effect_on_next_tick() {
        let closes = Arc::new(AtomicU32::new(0));
        let (mut ctl, delivered) = collecting_controller();
        ctl.start(SyntheticSource::file_like(4, closes)).unwrap();

        ctl.tick().unwrap();
        ctl.tick().unwrap();
        ctl.set_filter(FilterSelector::Negative);
        ctl.tick().unwrap();
        ctl.tick().unwrap();

        let got = delivered.lock().unwrap().clone();
        assert_eq!(got, vec![0, 1, 255 - 2, 255 - 3]);
    }

    #[test]
    fn test_default_snapshot() {
        let (ctl, _) = collecting_controller();
        let snap = ctl.snapshot();
        assert!(!snap.running);
        assert_eq!(snap.speed_multiplier, 1.0);
        assert_eq!(snap.active_filter, FilterSelector::Identity);
        assert_eq!(ctl.state(), PlayerState::Idle);
    }

    #[test]
    fn test_start_rejected_while_active() {
        let closes = Arc::new(AtomicU32::new(0));
        let (mut ctl, _) = collecting_controller();
        ctl.start(SyntheticSource::file_like(3, Arc::clone(&closes)))
            .unwrap();
        let err = ctl
            .start(SyntheticSource::file_like(3, Arc::clone(&closes)))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter(_)));
        assert_eq!(ctl.state(), PlayerState::Playing);
    }

    #[test]
    fn test_channel_commands_apply_at_tick_boundary() {
        let closes = Arc::new(AtomicU32::new(0));
        let (mut ctl, _) = collecting_controller();
        ctl.start(SyntheticSource::file_like(5, closes)).unwrap();

        let sender = ctl.command_sender();
        sender.send(Command::SetSpeed(0.5)).unwrap();
        sender.send(Command::SetFilter(FilterSelector::Grayscale)).unwrap();
        sender.send(Command::Pause).unwrap();

        ctl.process_pending();
        let snap = ctl.snapshot();
        assert!(!snap.running);
        assert_eq!(snap.speed_multiplier, 0.5);
        assert_eq!(snap.active_filter, FilterSelector::Grayscale);
        // Last-write-wins on superseded updates.
        sender.send(Command::SetSpeed(2.0)).unwrap();
        sender.send(Command::SetSpeed(1.5)).unwrap();
        ctl.process_pending();
        assert_eq!(ctl.snapshot().speed_multiplier, 1.5);
    }

    #[test]
    fn test_run_exits_on_stop_command() {
        let closes = Arc::new(AtomicU32::new(0));
        let (mut ctl, _) = collecting_controller();
        ctl.start(SyntheticSource::file_like(1000, Arc::clone(&closes)))
            .unwrap();
        ctl.command_sender().send(Command::Stop).unwrap();

        let mut pacer = RecordingPacer { intervals: Vec::new() };
        ctl.run(&mut pacer).unwrap();
        assert_eq!(ctl.state(), PlayerState::Idle);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
