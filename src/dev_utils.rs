// src/dev_utils.rs

use log::Level;
use std::time::{Duration, Instant};

/// Blocks running at least this long are logged at info level.
pub const SLOW_BLOCK: Duration = Duration::from_secs(1);

/// Times a block of work and logs the result when dropped.
///
/// Fast blocks log at debug level, slow ones (see [`SLOW_BLOCK`]) at info
/// level, so `RUST_LOG=info` shows only the lines worth looking at.
#[derive(Debug)]
pub struct BlockTimer {
    label: String,
    start: Instant,
}

impl BlockTimer {
    /// Starts timing now.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

fn level_for(elapsed: Duration) -> Level {
    if elapsed >= SLOW_BLOCK {
        Level::Info
    } else {
        Level::Debug
    }
}

impl Drop for BlockTimer {
    fn drop(&mut self) {
        let elapsed = self.elapsed();
        log::log!(
            level_for(elapsed),
            "{} took {:.3} ms",
            self.label,
            elapsed.as_secs_f64() * 1000.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slow_blocks_log_louder() {
        assert_eq!(level_for(Duration::from_millis(5)), Level::Debug);
        assert_eq!(level_for(SLOW_BLOCK), Level::Info);
    }

    #[test]
    fn test_elapsed_grows() {
        let timer = BlockTimer::new("sleep");
        std::thread::sleep(Duration::from_millis(2));
        assert!(timer.elapsed() >= Duration::from_millis(2));
    }
}
