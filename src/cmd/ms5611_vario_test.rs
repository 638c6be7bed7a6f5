use std::{
    thread,
    time::{Duration, Instant},
};

use raspi_vario::sensor::ms5611::{MS5611, Oversampling};
use raspi_vario::std_clock::StdClock;
use rppal::i2c::I2c;

/// MS5611升降仪协作式采集测试程序
fn main() -> anyhow::Result<()> {
    // 初始化时钟源
    let clock = StdClock::new();
    // 初始化I2C通信总线
    let mut i2c = I2c::new()?;
    // 创建MS5611传感器实例（含预热突发，约数百毫秒）
    let mut vario = MS5611::new(&clock, &mut i2c, None, Oversampling::UltraHighRes)?;

    // 协作式主循环：step不阻塞，读数随时从预取缓存获取
    let mut last_print = Instant::now();
    loop {
        vario.step(&mut i2c)?;

        // 每500ms打印一次预取的数据
        if last_print.elapsed() >= Duration::from_millis(500) {
            println!(
                "压力: {:.0}Pa, 平滑压力: {:.1}Pa, 相对高度: {:.2}m, 垂直速度: {}cm/s, 每秒读取: {:.1}",
                vario.get_pressure(),
                vario.get_smoothed_pressure(),
                vario.calc_rel_altitude(vario.get_smoothed_pressure()),
                vario.get_vertical_speed(),
                vario.get_reads_per_second()
            );
            last_print = Instant::now();
        }

        // 短暂让出CPU，采集节奏由状态机内部的转换等待决定
        thread::sleep(Duration::from_millis(1));
    }
}
