use embedded_timers::clock::Clock;

/// 基于std::time的标准时钟源
///
/// 驱动内部所有的时间测量（转换等待截止、垂直速度的Δt、读取统计窗口）
/// 都经过注入的Clock完成，不直接调用系统时钟。
/// 生产环境注入本时钟，单元测试注入可控的模拟时钟即可复现时序。
pub struct StdClock {}

impl StdClock {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn elapsed(&self, instant: Self::Instant) -> std::time::Duration {
        instant.elapsed()
    }
}
