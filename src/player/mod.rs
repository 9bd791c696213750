mod controller;
mod pacer;

pub use controller::{Command, PlaybackController, PlaybackState, PlayerState, TickOutcome};
pub use pacer::{SleepPacer, TickPacer};
