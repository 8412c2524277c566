use std::fmt;
use std::time::{Duration, Instant};

/// 累计计时器，用于统计构建过程中某一阶段的总耗时。
#[derive(Clone, Debug)]
pub struct PhaseTimer {
    consumed: Duration,
    since: Option<Instant>,
    laps: usize,
}

impl PhaseTimer {
    /// 创建一个尚未开始的计时器。
    #[inline]
    pub fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: None,
            laps: 0,
        }
    }

    /// 开始一段计时。重复调用会丢弃尚未结束的那一段。
    #[inline]
    pub fn start(&mut self) {
        self.since = Some(Instant::now());
    }

    /// 结束当前一段并累计。没有进行中的一段时什么也不做。
    #[inline]
    pub fn stop(&mut self) {
        if let Some(t) = self.since.take() {
            self.consumed += t.elapsed();
            self.laps += 1;
        }
    }

    /// 对`f`计时并返回其结果。
    pub fn measure<T, F: FnOnce() -> T>(&mut self, f: F) -> T {
        self.start();
        let out = f();
        self.stop();
        out
    }

    #[inline]
    pub fn total(&self) -> Duration {
        self.consumed
    }

    #[inline]
    pub fn total_ms(&self) -> u64 {
        self.consumed.as_millis() as u64
    }

    /// 已累计的段数。
    #[inline]
    pub fn laps(&self) -> usize {
        self.laps
    }
}

impl Default for PhaseTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PhaseTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s over {} lap(s)", self.consumed.as_secs_f64(), self.laps)
    }
}
