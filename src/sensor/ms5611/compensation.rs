/// MS5611出厂校准系数结构体
///
/// 该结构体存储了从传感器 PROM 中读取的 6 个出厂校准系数，用于把
/// 24 位原始压力/温度数字量换算为物理量。系数在生产过程中逐片标定，
/// 写入后不可更改，驱动只在初始化时读取一次。
///
/// # 存储分布
/// - PROM 地址 0xA2-0xAC，每个系数 16 位（大端序），读取命令为 0xA2 + 2i
#[derive(Debug, Default, Clone, Copy)]
pub struct Calibration {
    /// C1 压力灵敏度 SENS_T1
    ///
    /// - **类型**: 无符号 16 位整数 (u16)
    /// - **地址**: 0xA2
    /// - **作用**: 压力换算的基准灵敏度，参与 SENS = C1·2^15 + C3·dT/2^8
    pub pressure_sensitivity: u16,

    /// C2 压力偏移 OFF_T1
    ///
    /// - **类型**: 无符号 16 位整数 (u16)
    /// - **地址**: 0xA4
    /// - **作用**: 压力换算的基准偏移，参与 OFF = C2·2^16 + C4·dT/2^7
    pub pressure_offset: u16,

    /// C3 压力灵敏度的温度系数 TCS
    ///
    /// - **类型**: 无符号 16 位整数 (u16)
    /// - **地址**: 0xA6
    /// - **作用**: 补偿灵敏度随温度的漂移
    pub temp_coef_sensitivity: u16,

    /// C4 压力偏移的温度系数 TCO
    ///
    /// - **类型**: 无符号 16 位整数 (u16)
    /// - **地址**: 0xA8
    /// - **作用**: 补偿偏移随温度的漂移
    pub temp_coef_offset: u16,

    /// C5 参考温度 T_REF
    ///
    /// - **类型**: 无符号 16 位整数 (u16)
    /// - **地址**: 0xAA
    /// - **作用**: 温度差计算的基准，dT = D2 - C5·2^8
    pub reference_temperature: u16,

    /// C6 温度的温度系数 TEMPSENS
    ///
    /// - **类型**: 无符号 16 位整数 (u16)
    /// - **地址**: 0xAC
    /// - **作用**: 把 dT 换算为摄氏温度，TEMP = 2000 + dT·C6/2^23
    pub temp_coef_temperature: u16,
}

/// 实现校准系数操作
impl Calibration {
    /// 按 PROM 顺序 (C1..C6) 从 6 个字构建校准系数
    pub fn from_words(words: [u16; 6]) -> Self {
        Self {
            pressure_sensitivity: words[0],
            pressure_offset: words[1],
            temp_coef_sensitivity: words[2],
            temp_coef_offset: words[3],
            reference_temperature: words[4],
            temp_coef_temperature: words[5],
        }
    }
}

/// 计算原始温度与参考温度的差值 dT = D2 - C5·256
fn delta_t(raw_temperature: u32, calib: &Calibration) -> i64 {
    raw_temperature as i64 - calib.reference_temperature as i64 * 256
}

/// 温度补偿换算
///
/// 把 24 位原始温度值 D2 换算为 0.01°C 单位的温度值（2007 即 20.07°C）。
/// 所有中间量使用 64 位有符号整数，除法为截断除法，与数据手册定点公式一致。
///
/// - `second_order`: 为 true 时在 TEMP < 20.00°C 区间施加二阶修正
///   T2 = dT²/2³¹（低温精度更高）
pub fn compensate_temperature(raw_temperature: u32, calib: &Calibration, second_order: bool) -> i32 {
    // dT = D2 - C5·2^8
    let dt = delta_t(raw_temperature, calib);
    // TEMP = 2000 + dT·C6/2^23
    let mut temp = 2000 + dt * calib.temp_coef_temperature as i64 / 8_388_608;

    // 二阶温度修正，只在低于20°C时生效
    if second_order && temp < 2000 {
        temp -= dt * dt / 2_147_483_648;
    }

    // OK
    temp as i32
}

/// 压力补偿换算
///
/// 把 24 位原始压力值 D1 结合最近一次的原始温度值 D2 换算为以 Pa 为
/// 单位的压力值。所有中间量使用 64 位有符号整数，除法为截断除法。
///
/// - `second_order`: 为 true 时按数据手册在低温区间修正 OFF/SENS：
///   TEMP < 2000 时 OFF2 = 5·(TEMP-2000)²/2，SENS2 = 5·(TEMP-2000)²/4；
///   TEMP < -1500 时追加 OFF2 += 7·(TEMP+1500)²，SENS2 += 11·(TEMP+1500)²/2。
///   TEMP ≥ 2000 时修正项全为零，结果与一阶公式完全一致。
pub fn compensate_pressure(
    raw_pressure: u32,
    raw_temperature: u32,
    calib: &Calibration,
    second_order: bool,
) -> i32 {
    let dt = delta_t(raw_temperature, calib);
    // OFF = C2·2^16 + C4·dT/2^7
    let mut off = calib.pressure_offset as i64 * 65_536 + calib.temp_coef_offset as i64 * dt / 128;
    // SENS = C1·2^15 + C3·dT/2^8
    let mut sens =
        calib.pressure_sensitivity as i64 * 32_768 + calib.temp_coef_sensitivity as i64 * dt / 256;

    // 二阶温度修正
    if second_order {
        // 修正门限判断使用一阶温度值
        let temp = 2000 + dt * calib.temp_coef_temperature as i64 / 8_388_608;

        let mut off2 = 0i64;
        let mut sens2 = 0i64;

        // 低温区间 (< 20°C)
        if temp < 2000 {
            let diff = temp - 2000;
            off2 = 5 * diff * diff / 2;
            sens2 = 5 * diff * diff / 4;
        }

        // 极低温区间 (< -15°C)
        if temp < -1500 {
            let diff = temp + 1500;
            off2 += 7 * diff * diff;
            sens2 += 11 * diff * diff / 2;
        }

        off -= off2;
        sens -= sens2;
    }

    // P = (D1·SENS/2^21 - OFF)/2^15
    ((raw_pressure as i64 * sens / 2_097_152 - off) / 32_768) as i32
}
