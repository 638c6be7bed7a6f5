/// 滤波管线：平滑压力与垂直速度两级串联的单极点IIR低通滤波
///
/// 每个压力就绪事件推进一次：先对补偿后的压力做平滑，再由平滑压力
/// 推导海拔差分得到瞬时垂直速度，最后对垂直速度做平滑。
/// 平滑系数 β ∈ [0,1)：β 越接近 1 平滑越重（记忆越长），β=0 时直通。
pub struct FilterPipeline {
    /// 压力平滑系数 β
    pressure_smoothing_factor: f64,
    /// 垂直速度平滑系数 β
    vertical_speed_smoothing_factor: f64,
    /// 平滑后的压力 (Pa)
    smoothed_pressure: f64,
    /// 上一次的海拔高度 (cm)，垂直速度差分的基准
    last_altitude: f64,
    /// 平滑后的垂直速度 (cm/s)
    vertical_speed: i32,
}

/// 实现滤波管线操作
impl FilterPipeline {
    /// 创建滤波管线，默认平滑系数均为0.9
    pub fn new() -> Self {
        Self {
            pressure_smoothing_factor: 0.9,
            vertical_speed_smoothing_factor: 0.9,
            smoothed_pressure: 0.0,
            last_altitude: 0.0,
            vertical_speed: 0,
        }
    }

    /// 单极点IIR低通滤波: y = x + β·(y_prev - x)
    fn low_pass(input: f64, previous: f64, factor: f64) -> f64 {
        input + factor * (previous - input)
    }

    /// 直接赋值平滑压力初值（初始化预热突发使用，绕过滤波）
    pub fn seed_pressure(&mut self, pressure: f64) {
        self.smoothed_pressure = pressure;
    }

    /// 压力平滑推进一步
    pub fn smooth_pressure(&mut self, pressure: f64) {
        self.smoothed_pressure =
            Self::low_pass(pressure, self.smoothed_pressure, self.pressure_smoothing_factor);
    }

    /// 直接赋值海拔差分基准（首个压力就绪事件使用）
    pub fn seed_altitude(&mut self, altitude: f64) {
        self.last_altitude = altitude;
    }

    /// 垂直速度估计与平滑推进一步
    ///
    /// 瞬时估计 v = (altitude - last_altitude)·(1000/Δt)，海拔单位cm，
    /// Δt 单位 ms，结果单位 cm/s。
    /// 预热阶段把基准强制等于当前值，抑制首个未稳定读数造成的尖峰。
    /// 调用方必须保证 dt_ms > 0。
    pub fn update_vertical_speed(&mut self, altitude: f64, dt_ms: u64, warm_up: bool) {
        if warm_up {
            self.last_altitude = altitude;
        }
        // 瞬时垂直速度估计
        let estimate = (altitude - self.last_altitude) * (1000.0 / dt_ms as f64);
        // IIR平滑后按整数cm/s保存
        self.vertical_speed = Self::low_pass(
            estimate,
            self.vertical_speed as f64,
            self.vertical_speed_smoothing_factor,
        ) as i32;
        self.last_altitude = altitude;
    }

    /// 垂直速度清零（初始化预热突发结束时使用）
    pub fn reset_vertical_speed(&mut self) {
        self.vertical_speed = 0;
    }

    /// 平滑后的压力 (Pa)
    pub fn smoothed_pressure(&self) -> f64 {
        self.smoothed_pressure
    }

    /// 平滑后的垂直速度 (cm/s)
    pub fn vertical_speed(&self) -> i32 {
        self.vertical_speed
    }

    pub fn pressure_smoothing_factor(&self) -> f64 {
        self.pressure_smoothing_factor
    }

    pub fn set_pressure_smoothing_factor(&mut self, factor: f64) {
        self.pressure_smoothing_factor = factor;
    }

    pub fn vertical_speed_smoothing_factor(&self) -> f64 {
        self.vertical_speed_smoothing_factor
    }

    pub fn set_vertical_speed_smoothing_factor(&mut self, factor: f64) {
        self.vertical_speed_smoothing_factor = factor;
    }
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// 标准气压公式计算绝对海拔高度 (m)
///
/// altitude = 44330·(1 - (p/p0)^0.1902949)，p0 为海平面参考气压
pub fn calc_altitude(pressure: f64, sea_level_pressure: f64) -> f64 {
    44_330.0 * (1.0 - (pressure / sea_level_pressure).powf(0.190_294_9))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zero_factor_is_pass_through() {
        let mut filter = FilterPipeline::new();
        filter.set_pressure_smoothing_factor(0.0);
        filter.seed_pressure(100_000.0);
        // β=0时输出完全等于输入
        filter.smooth_pressure(98_765.0);
        assert_eq!(filter.smoothed_pressure(), 98_765.0);
        filter.smooth_pressure(101_234.0);
        assert_eq!(filter.smoothed_pressure(), 101_234.0);
    }

    #[test]
    fn heavy_smoothing_barely_tracks_step_change() {
        let mut filter = FilterPipeline::new();
        filter.set_pressure_smoothing_factor(0.99);
        filter.seed_pressure(100_000.0);
        // β=0.99时一步只向1000Pa的阶跃移动1%
        filter.smooth_pressure(101_000.0);
        assert!((filter.smoothed_pressure() - 100_010.0).abs() < 1e-6);
    }

    #[test]
    fn vertical_speed_estimate_scales_with_delta_time() {
        let mut filter = FilterPipeline::new();
        filter.set_vertical_speed_smoothing_factor(0.0);
        filter.seed_altitude(0.0);
        // 1秒内上升100cm → 100cm/s
        filter.update_vertical_speed(100.0, 1000, false);
        assert_eq!(filter.vertical_speed(), 100);
        // 再过500ms又上升100cm → 200cm/s
        filter.update_vertical_speed(200.0, 500, false);
        assert_eq!(filter.vertical_speed(), 200);
    }

    #[test]
    fn vertical_speed_is_smoothed() {
        let mut filter = FilterPipeline::new();
        filter.set_vertical_speed_smoothing_factor(0.5);
        filter.seed_altitude(0.0);
        // 瞬时估计100cm/s，β=0.5 → 平滑输出只前进一半
        filter.update_vertical_speed(100.0, 1000, false);
        assert_eq!(filter.vertical_speed(), 50);
    }

    #[test]
    fn warm_up_suppresses_spike() {
        let mut filter = FilterPipeline::new();
        filter.set_vertical_speed_smoothing_factor(0.0);
        filter.seed_altitude(0.0);
        // 预热阶段基准被强制等于当前海拔，50m的跳变不产生速度
        filter.update_vertical_speed(5_000.0, 100, true);
        assert_eq!(filter.vertical_speed(), 0);
    }

    #[test]
    fn altitude_formula_matches_standard_atmosphere() {
        // 海平面标准气压 → 0m
        assert!(calc_altitude(101_325.0, 101_325.0).abs() < 1e-9);
        // 约89875Pa对应标准大气约1000m
        let altitude = calc_altitude(89_875.0, 101_325.0);
        assert!((altitude - 1_000.0).abs() < 5.0);
        // 参考气压越高，同一压力对应的海拔越高
        assert!(calc_altitude(98_000.0, 102_000.0) > calc_altitude(98_000.0, 101_325.0));
    }
}
