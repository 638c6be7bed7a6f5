use std::{thread, time::Duration};

use raspi_vario::sensor::ms5611::{MS5611, Oversampling};
use raspi_vario::std_clock::StdClock;
use rppal::i2c::I2c;

/// MS5611传感器阻塞读取测试程序
fn main() -> anyhow::Result<()> {
    // 初始化时钟源
    let clock = StdClock::new();
    // 初始化I2C通信总线
    let mut i2c = I2c::new()?;
    // 创建MS5611传感器实例（含预热突发，约数百毫秒）
    let mut sensor = MS5611::new(&clock, &mut i2c, None, Oversampling::UltraHighRes)?;

    // 死循环读取传感器数据
    loop {
        // 阻塞读取原始值
        let raw_pressure = sensor.read_raw_pressure(&mut i2c)?;
        let raw_temperature = sensor.read_raw_temperature(&mut i2c)?;
        // 阻塞读取补偿值（启用二阶温度补偿）
        let pressure = sensor.read_pressure(&mut i2c, true)?;
        let temperature = sensor.read_temperature(&mut i2c, true)?;

        println!(
            "原始压力: {}, 原始温度: {}, 压力: {}Pa, 温度: {:.2}℃, 海拔: {:.2}m",
            raw_pressure,
            raw_temperature,
            pressure,
            temperature,
            sensor.calc_altitude(pressure as f64)
        );

        // 间隔1秒读取一次
        thread::sleep(Duration::from_secs(1));
    }
}
