use std::{
    thread,
    time::{Duration, Instant},
};

use raspi_vario::sensor::ms5611::{MS5611, Oversampling};
use raspi_vario::std_clock::StdClock;
use rppal::i2c::I2c;

/// MS5611气压传感器I2C从设备地址（GY-63模块CSB接地）
const MS5611_ADDR: u8 = 0x77;

fn main() -> anyhow::Result<()> {
    println!("⚡ MS5611 升降仪采集程序");
    // 初始化时钟源
    let clock = StdClock::new();
    // 初始化I2C通信总线
    let mut i2c = I2c::new()?;
    // 创建MS5611传感器实例（含预热突发，约数百毫秒）
    let mut vario = MS5611::new(&clock, &mut i2c, Some(MS5611_ADDR), Oversampling::UltraHighRes)?;

    // 低温环境下启用二阶温度补偿更准确
    vario.set_second_order_compensation(true);
    // 平滑系数越接近1越平稳，响应也越慢
    vario.set_pressure_smoothing_factor(0.93);
    vario.set_vertical_speed_smoothing_factor(0.93);

    // 协作式主循环：step不阻塞，读数随时从预取缓存获取
    let mut last_print = Instant::now();
    loop {
        vario.step(&mut i2c)?;

        // 每500ms打印一次预取的数据
        if last_print.elapsed() >= Duration::from_millis(500) {
            println!(
                "✅ 高度: {:.2}m, 相对高度: {:.2}m, 垂直速度: {}cm/s, 温度: {:.2}℃, 周期: {}",
                vario.calc_altitude(vario.get_smoothed_pressure()),
                vario.calc_rel_altitude(vario.get_smoothed_pressure()),
                vario.get_vertical_speed(),
                vario.get_temperature(),
                vario.get_run_count()
            );
            last_print = Instant::now();
        }

        // 短暂让出CPU，采集节奏由状态机内部的转换等待决定
        thread::sleep(Duration::from_millis(1));
    }
}
