use std::thread;
use std::time::Duration;

use embedded_hal::i2c::I2c;
use embedded_timers::clock::Clock;

pub mod compensation;
pub mod filter;

use compensation::Calibration;
use filter::FilterPipeline;

/// MS5611默认I2C从设备地址
/// - GY-63模块CSB引脚接地时为0x77，接VCC时为0x76
const MS5611_DEFAULT_ADDRESS: u8 = 0x77;

/// 器件复位命令
const CMD_RESET: u8 = 0x1E;
/// ADC转换结果读取命令
const CMD_ADC_READ: u8 = 0x00;
/// 压力转换(D1)启动命令基址，加上过采样率偏移后发送
const CMD_CONV_D1: u8 = 0x40;
/// 温度转换(D2)启动命令基址，加上过采样率偏移后发送
const CMD_CONV_D2: u8 = 0x50;
/// PROM校准系数读取命令基址，第i个系数为0xA2+2i
const CMD_READ_PROM: u8 = 0xA2;

/// 海平面标准大气压 (Pa)
pub const SEA_LEVEL_PRESSURE: f64 = 101_325.0;

/// 初始化预热突发的阻塞压力读取次数
const WARM_UP_BURST_READS: u32 = 50;
/// 预热阶段的就绪周期数，计满后固定参考高度
const WARM_UP_CYCLES: u32 = 100;

/// MS5611内部过采样率(OSR)
///
/// 过采样率越高测量越精确，但单次转换耗时越长。
/// 每一档对应固定的转换等待时间，状态机以此推算下一次可读时刻。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Oversampling {
    /// 256次采样，转换约1ms
    UltraLowPower,
    /// 512次采样，转换约2ms
    LowPower,
    /// 1024次采样，转换约3ms
    Standard,
    /// 2048次采样，转换约5ms
    HighRes,
    /// 4096次采样，转换约10ms
    UltraHighRes,
}

/// 实现过采样率操作
impl Oversampling {
    /// 转换启动命令的地址偏移量
    fn command_offset(self) -> u8 {
        match self {
            Self::UltraLowPower => 0x00,
            Self::LowPower => 0x02,
            Self::Standard => 0x04,
            Self::HighRes => 0x06,
            Self::UltraHighRes => 0x08,
        }
    }

    /// 该档位所需的转换等待时间 (ms)
    pub fn conversion_time_ms(self) -> u64 {
        match self {
            Self::UltraLowPower => 1,
            Self::LowPower => 2,
            Self::Standard => 3,
            Self::HighRes => 5,
            Self::UltraHighRes => 10,
        }
    }
}

impl Default for Oversampling {
    fn default() -> Self {
        Self::UltraHighRes
    }
}

impl TryFrom<u8> for Oversampling {
    type Error = anyhow::Error;

    /// 从器件命令偏移码解析过采样率，未知代码显式报错
    fn try_from(code: u8) -> anyhow::Result<Self> {
        match code {
            0x00 => Ok(Self::UltraLowPower),
            0x02 => Ok(Self::LowPower),
            0x04 => Ok(Self::Standard),
            0x06 => Ok(Self::HighRes),
            0x08 => Ok(Self::UltraHighRes),
            _ => Err(anyhow::anyhow!("无效的过采样率代码: 0x{:02X}", code)),
        }
    }
}

/// 当前在传感器上挂起的转换类型
///
/// 任意时刻至多只有一个转换在器件内部进行
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingValue {
    /// 无挂起转换
    None,
    /// 压力转换(D1)进行中
    Pressure,
    /// 温度转换(D2)进行中
    Temperature,
}

/// MS5611气压/温度传感器升降仪(Variometer)封装对象
///
/// 以协作式非阻塞方式采集数据：主循环反复调用[`MS5611::step`]，状态机在
/// 器件转换等待期内直接返回，转换完成后交替读取压力与温度并推动补偿
/// 计算与滤波管线。随时可通过get_xxx系列方法无阻塞地取出最近一次
/// 预取的值；read_xxx系列方法则阻塞等待一次新的转换完成。
pub struct MS5611<'a, C: Clock> {
    /// 注入的时钟源，所有时间测量都经过它
    clock: &'a C,
    /// I2C从设备地址
    i2c_addr: u8,
    /// 出厂校准系数，初始化时从PROM读取一次
    calib: Calibration,
    /// 过采样率
    oversampling: Oversampling,
    /// 当前挂起的转换类型
    pending: PendingValue,
    /// 最近一次转换请求发出的时刻，None表示尚未发出过请求
    requested_at: Option<C::Instant>,
    /// 发出请求时按当时过采样率记录的转换等待时间
    conversion_wait: Duration,
    /// 原始压力值D1（24位）
    raw_pressure: u32,
    /// 原始温度值D2（24位）
    raw_temperature: u32,
    /// 补偿后的压力 (Pa)
    pressure: i32,
    /// 补偿后的温度 (0.01°C)
    temperature: i32,
    /// 滤波管线（平滑压力与垂直速度）
    filter: FilterPipeline,
    /// 上一次垂直速度计算的时刻
    vario_at: Option<C::Instant>,
    /// 参考高度 (m)，相对高度计算的基准
    reference_height: f64,
    /// 二阶温度补偿开关
    second_order_compensation: bool,
    /// 预热阶段标志，计满预热周期后清除
    warm_up_phase: bool,
    /// 就绪周期计数
    run_count: u32,
    /// 当前统计窗口内完成的压力读取次数
    reads_count: u32,
    /// 当前统计窗口的起点
    reads_window_at: C::Instant,
    /// 每秒读取次数统计
    reads_per_second: f32,
}

/// 实现MS5611传感器操作
impl<'a, C: Clock> MS5611<'a, C>
where
    C::Instant: Copy,
{
    /// 创建MS5611传感器实例
    ///
    /// 初始化流程：器件复位、读取PROM校准系数，然后做一轮阻塞预热突发
    /// 为平滑压力提供有效初值，并以此固定初始参考高度。
    /// 整个初始化约耗时数百毫秒。
    ///
    /// - `i2c_addr`: 从设备地址，None时使用默认的0x77
    pub fn new<I: I2c>(
        clock: &'a C,
        i2c: &mut I,
        i2c_addr: Option<u8>,
        oversampling: Oversampling,
    ) -> anyhow::Result<Self> {
        // 构建传感器实例
        let mut sensor = Self {
            clock,
            i2c_addr: i2c_addr.unwrap_or(MS5611_DEFAULT_ADDRESS),
            calib: Calibration::default(),
            oversampling,
            pending: PendingValue::None,
            requested_at: None,
            conversion_wait: Duration::from_millis(oversampling.conversion_time_ms()),
            raw_pressure: 0,
            raw_temperature: 0,
            pressure: 0,
            temperature: 0,
            filter: FilterPipeline::new(),
            vario_at: None,
            reference_height: 0.0,
            second_order_compensation: false,
            warm_up_phase: true,
            run_count: 0,
            reads_count: 0,
            reads_window_at: clock.now(),
            reads_per_second: 0.0,
        };

        // 器件复位，复位后必须等待内部PROM重新加载完成
        sensor.reset(i2c)?;
        thread::sleep(Duration::from_millis(100));

        // 读取出厂校准系数
        sensor.read_calibration(i2c)?;

        // 预热突发：连续做50次阻塞压力读取，把最后一次补偿压力
        // 直接赋值为平滑压力的初值（滤波器冷启动）
        for _ in 0..WARM_UP_BURST_READS {
            let pressure = sensor.read_pressure(i2c, true)?;
            sensor.filter.seed_pressure(pressure as f64);
        }

        // 再阻塞取一次原始温度和补偿温度，填满预取缓存
        sensor.read_raw_temperature(i2c)?;
        sensor.read_temperature(i2c, true)?;

        // 以预热后的平滑压力固定初始参考高度
        sensor.reference_height = sensor.calc_altitude(sensor.filter.smoothed_pressure());

        // 周期计数、垂直速度和读取统计从预热突发之后重新开始
        sensor.filter.reset_vertical_speed();
        sensor.run_count = 0;
        sensor.warm_up_phase = true;
        sensor.reads_count = 0;
        sensor.reads_window_at = clock.now();
        sensor.reads_per_second = 0.0;

        // OK
        Ok(sensor)
    }

    /// 协作式非阻塞采集：在主循环中反复调用
    ///
    /// 本方法不休眠不忙等：转换等待时间未到时为空操作立即返回；
    /// 到期后读取完成的转换结果并立即发起下一个转换请求。
    /// 压力与温度按周期计数的奇偶严格交替采样。
    ///
    /// 已知限制：总线始终无响应时状态机会停留在等待状态，
    /// 本驱动不内置超时。
    pub fn step<I: I2c>(&mut self, i2c: &mut I) -> anyhow::Result<()> {
        self.trigger_read_values(i2c, PendingValue::None)?;
        Ok(())
    }

    /// 采集状态机的单步推进
    ///
    /// - `request`: 调用者期待的转换类型，None表示按奇偶交替自动调度
    ///
    /// 返回true表示刚刚完成的转换正是`request`所指定的类型，
    /// 阻塞式read_xxx方法以此为完成信号。
    fn trigger_read_values<I: I2c>(
        &mut self,
        i2c: &mut I,
        request: PendingValue,
    ) -> anyhow::Result<bool> {
        // 转换等待时间未到，本次调用为空操作
        if let Some(requested_at) = self.requested_at {
            if self.clock.elapsed(requested_at) <= self.conversion_wait {
                return Ok(false);
            }
        }

        // 就绪周期计数
        self.run_count = self.run_count.wrapping_add(1);
        if self.run_count == WARM_UP_CYCLES && self.warm_up_phase {
            // 约100个周期后器件自热趋于稳定，此时才固定参考高度，
            // 过早取基准会让所有相对高度永久带偏
            self.warm_up_phase = false;
            self.reference_height = self.calc_altitude(self.filter.smoothed_pressure());
        }

        // 读取统计：窗口超过1秒时重算每秒读取次数
        let window = self.clock.elapsed(self.reads_window_at);
        if window.as_millis() > 1000 {
            self.reads_per_second = self.reads_count as f32 / (window.as_millis() / 1000) as f32;
            self.reads_window_at = self.clock.now();
            self.reads_count = 0;
        }

        // 读取已完成的挂起转换结果
        match self.pending {
            PendingValue::Pressure => {
                self.reads_count += 1;
                self.raw_pressure = self.read_register24(i2c, CMD_ADC_READ)?;
                // 压力周期：补偿计算配对的温度取最近一次缓存的D2
                // （可能比本次D1早数个周期，滤波参数即按此特性整定）
                self.temperature = compensation::compensate_temperature(
                    self.raw_temperature,
                    &self.calib,
                    self.second_order_compensation,
                );
                self.pressure = compensation::compensate_pressure(
                    self.raw_pressure,
                    self.raw_temperature,
                    &self.calib,
                    self.second_order_compensation,
                );
                self.update_filters();
            }
            PendingValue::Temperature => {
                self.raw_temperature = self.read_register24(i2c, CMD_ADC_READ)?;
            }
            PendingValue::None => {}
        }

        // 刚完成的转换正是调用者所等待的类型时返回true
        let satisfied = request == self.pending;

        // 决定下一个转换请求：显式请求优先，否则按周期计数的奇偶交替
        let next = if request != PendingValue::None {
            request
        } else if self.run_count % 2 == 0 {
            PendingValue::Temperature
        } else {
            PendingValue::Pressure
        };
        let command = if next == PendingValue::Temperature {
            CMD_CONV_D2 + self.oversampling.command_offset()
        } else {
            CMD_CONV_D1 + self.oversampling.command_offset()
        };

        // 发出转换启动命令后立即返回，不等待转换完成
        self.write_command(i2c, command)?;
        self.pending = next;
        self.conversion_wait = Duration::from_millis(self.oversampling.conversion_time_ms());
        self.requested_at = Some(self.clock.now());

        // OK
        Ok(satisfied)
    }

    /// 压力就绪事件的滤波管线推进：平滑压力、再平滑垂直速度
    fn update_filters(&mut self) {
        self.filter.smooth_pressure(self.pressure as f64);

        // 由平滑压力推导当前海拔（单位cm）
        let altitude_cm = self.calc_altitude(self.filter.smoothed_pressure()) * 100.0;
        let now = self.clock.now();
        match self.vario_at {
            // 首个事件只记录差分基准，不产生速度
            None => {
                self.filter.seed_altitude(altitude_cm);
                self.vario_at = Some(now);
            }
            Some(last) => {
                let dt_ms = self.clock.elapsed(last).as_millis() as u64;
                // Δt为0时跳过本次垂直速度更新，避免除零
                if dt_ms > 0 {
                    self.filter
                        .update_vertical_speed(altitude_cm, dt_ms, self.warm_up_phase);
                    self.vario_at = Some(now);
                }
            }
        }
    }

    /// 阻塞读取原始压力值D1
    ///
    /// 旋转调用采集状态机直到一次压力转换完成，期间每次让出1ms。
    /// 已知限制：总线始终无响应时本方法不会返回（无内置超时）。
    pub fn read_raw_pressure<I: I2c>(&mut self, i2c: &mut I) -> anyhow::Result<u32> {
        while !self.trigger_read_values(i2c, PendingValue::Pressure)? {
            thread::sleep(Duration::from_millis(1));
        }
        Ok(self.raw_pressure)
    }

    /// 阻塞读取原始温度值D2
    ///
    /// 旋转调用采集状态机直到一次温度转换完成，期间每次让出1ms。
    /// 已知限制：总线始终无响应时本方法不会返回（无内置超时）。
    pub fn read_raw_temperature<I: I2c>(&mut self, i2c: &mut I) -> anyhow::Result<u32> {
        while !self.trigger_read_values(i2c, PendingValue::Temperature)? {
            thread::sleep(Duration::from_millis(1));
        }
        Ok(self.raw_temperature)
    }

    /// 阻塞读取补偿后的压力值 (Pa)
    ///
    /// 依次阻塞读取一次新的D1和D2再做补偿换算
    /// - `compensate`: 为true时施加二阶温度补偿（低于20°C时更准确）
    pub fn read_pressure<I: I2c>(&mut self, i2c: &mut I, compensate: bool) -> anyhow::Result<i32> {
        let raw_pressure = self.read_raw_pressure(i2c)?;
        let raw_temperature = self.read_raw_temperature(i2c)?;
        Ok(compensation::compensate_pressure(
            raw_pressure,
            raw_temperature,
            &self.calib,
            compensate,
        ))
    }

    /// 阻塞读取补偿后的温度值 (°C)
    ///
    /// - `compensate`: 为true时施加二阶温度补偿（低于20°C时更准确）
    pub fn read_temperature<I: I2c>(
        &mut self,
        i2c: &mut I,
        compensate: bool,
    ) -> anyhow::Result<f64> {
        let raw_temperature = self.read_raw_temperature(i2c)?;
        let temperature =
            compensation::compensate_temperature(raw_temperature, &self.calib, compensate);
        Ok(temperature as f64 / 100.0)
    }

    /// 最近一次预取的原始压力值D1（非阻塞）
    pub fn get_raw_pressure(&self) -> u32 {
        self.raw_pressure
    }

    /// 最近一次预取的原始温度值D2（非阻塞）
    pub fn get_raw_temperature(&self) -> u32 {
        self.raw_temperature
    }

    /// 最近一次预取的补偿压力值 (Pa)（非阻塞）
    pub fn get_pressure(&self) -> f64 {
        self.pressure as f64
    }

    /// 最近一次预取的平滑压力值 (Pa)（非阻塞）
    pub fn get_smoothed_pressure(&self) -> f64 {
        self.filter.smoothed_pressure()
    }

    /// 最近一次预取的补偿温度值 (°C)（非阻塞）
    pub fn get_temperature(&self) -> f64 {
        self.temperature as f64 / 100.0
    }

    /// 最近一次预取的垂直速度 (cm/s)（非阻塞）
    pub fn get_vertical_speed(&self) -> i32 {
        self.filter.vertical_speed()
    }

    /// 按海平面标准气压计算给定压力对应的绝对海拔 (m)
    pub fn calc_altitude(&self, pressure: f64) -> f64 {
        filter::calc_altitude(pressure, SEA_LEVEL_PRESSURE)
    }

    /// 按指定的海平面参考气压计算给定压力对应的绝对海拔 (m)
    pub fn calc_altitude_with_sea_level(&self, pressure: f64, sea_level_pressure: f64) -> f64 {
        filter::calc_altitude(pressure, sea_level_pressure)
    }

    /// 计算给定压力相对参考高度的相对海拔 (m)
    pub fn calc_rel_altitude(&self, pressure: f64) -> f64 {
        self.calc_altitude(pressure) - self.reference_height
    }

    /// 参考高度 (m)
    pub fn get_reference_height(&self) -> f64 {
        self.reference_height
    }

    /// 手动设置参考高度 (m)
    pub fn set_reference_height(&mut self, height: f64) {
        self.reference_height = height;
    }

    /// 压力平滑系数 β∈[0,1)，越接近1平滑越重
    pub fn get_pressure_smoothing_factor(&self) -> f64 {
        self.filter.pressure_smoothing_factor()
    }

    /// 设置压力平滑系数 β∈[0,1)
    pub fn set_pressure_smoothing_factor(&mut self, factor: f64) {
        self.filter.set_pressure_smoothing_factor(factor);
    }

    /// 垂直速度平滑系数 β∈[0,1)，越接近1平滑越重
    pub fn get_vertical_speed_smoothing_factor(&self) -> f64 {
        self.filter.vertical_speed_smoothing_factor()
    }

    /// 设置垂直速度平滑系数 β∈[0,1)
    pub fn set_vertical_speed_smoothing_factor(&mut self, factor: f64) {
        self.filter.set_vertical_speed_smoothing_factor(factor);
    }

    /// 当前过采样率
    pub fn get_oversampling(&self) -> Oversampling {
        self.oversampling
    }

    /// 设置过采样率（对已在途的转换不生效，从下一个请求开始）
    pub fn set_oversampling(&mut self, oversampling: Oversampling) {
        self.oversampling = oversampling;
    }

    /// 二阶温度补偿开关状态
    pub fn get_second_order_compensation(&self) -> bool {
        self.second_order_compensation
    }

    /// 设置二阶温度补偿开关（默认关闭）
    pub fn set_second_order_compensation(&mut self, enable: bool) {
        self.second_order_compensation = enable;
    }

    /// 就绪周期计数
    pub fn get_run_count(&self) -> u32 {
        self.run_count
    }

    /// 每秒读取次数统计（依赖过采样率与step的调用频率）
    pub fn get_reads_per_second(&self) -> f32 {
        self.reads_per_second
    }

    /// 发送器件复位命令
    fn reset<I: I2c>(&self, i2c: &mut I) -> anyhow::Result<()> {
        self.write_command(i2c, CMD_RESET)
    }

    /// 读取PROM中的6个出厂校准系数
    fn read_calibration<I: I2c>(&mut self, i2c: &mut I) -> anyhow::Result<()> {
        let mut words = [0u16; 6];
        for (offset, word) in words.iter_mut().enumerate() {
            *word = self.read_register16(i2c, CMD_READ_PROM + offset as u8 * 2)?;
        }
        self.calib = Calibration::from_words(words);
        // OK
        Ok(())
    }

    /// 发送单字节命令
    fn write_command<I: I2c>(&self, i2c: &mut I, command: u8) -> anyhow::Result<()> {
        i2c.write(self.i2c_addr, &[command])
            .map_err(|err| anyhow::anyhow!("发送MS5611命令0x{:02X}失败: {:?}", command, err))
    }

    /// 读取16位寄存器（大端序）
    fn read_register16<I: I2c>(&self, i2c: &mut I, register: u8) -> anyhow::Result<u16> {
        let mut data = [0u8; 2];
        i2c.write_read(self.i2c_addr, &[register], &mut data)
            .map_err(|err| anyhow::anyhow!("读取MS5611寄存器0x{:02X}失败: {:?}", register, err))?;
        Ok(u16::from_be_bytes(data))
    }

    /// 读取24位寄存器（b0<<16 | b1<<8 | b2）
    fn read_register24<I: I2c>(&self, i2c: &mut I, register: u8) -> anyhow::Result<u32> {
        let mut data = [0u8; 3];
        i2c.write_read(self.i2c_addr, &[register], &mut data)
            .map_err(|err| anyhow::anyhow!("读取MS5611寄存器0x{:02X}失败: {:?}", register, err))?;
        Ok((data[0] as u32) << 16 | (data[1] as u32) << 8 | data[2] as u32)
    }
}
