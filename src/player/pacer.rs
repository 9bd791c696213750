use std::time::{Duration, Instant};

/// Scheduling seam for the playback loop. The controller asks the pacer to
/// wait out one tick interval; tests substitute a recording pacer so the state
/// machine runs without a real timer.
pub trait TickPacer {
    fn wait(&mut self, interval: Duration);

    /// Drops any pending deadline so the cadence restarts fresh (called while
    /// paused, so resuming does not replay a backlog of missed ticks).
    fn reset(&mut self);
}

/// Wall-clock pacer keeping an absolute next-deadline so render/decode time is
/// absorbed instead of accumulating drift.
pub struct SleepPacer {
    next_tick: Option<Instant>,
}

impl SleepPacer {
    pub fn new() -> Self {
        Self { next_tick: None }
    }
}

impl Default for SleepPacer {
    fn default() -> Self {
        Self::new()
    }
}

impl TickPacer for SleepPacer {
    fn wait(&mut self, interval: Duration) {
        let now = Instant::now();
        let deadline = self.next_tick.unwrap_or(now + interval);

        // More than three intervals behind: resync instead of chasing a
        // runaway deadline.
        if now > deadline + interval * 3 {
            self.next_tick = Some(now + interval);
            return;
        }

        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        self.next_tick = Some(deadline + interval);
    }

    fn reset(&mut self) {
        self.next_tick = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_returns_immediately() {
        let mut pacer = SleepPacer::new();
        let start = Instant::now();
        pacer.wait(Duration::ZERO);
        pacer.wait(Duration::ZERO);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_reset_clears_deadline() {
        let mut pacer = SleepPacer::new();
        pacer.wait(Duration::from_millis(1));
        assert!(pacer.next_tick.is_some());
        pacer.reset();
        assert!(pacer.next_tick.is_none());
    }
}
