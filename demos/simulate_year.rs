use time::macros::datetime;
use time::Duration;

use radar_yearly_acc::{
    DataKind, Grid, GridTemplate, MemoryStore, RunConfig, RunMode, YearlyAccumulation,
};

/// 格子の大きさ
const WIDTH: usize = 64;
const HEIGHT: usize = 48;

/// 時刻によって雨域が東へ移動する1時間降水量を生成する。
fn synthetic_rain(hour: i64) -> Grid<f32> {
    let front = (hour as usize * 3) % WIDTH;
    let data = (0..WIDTH * HEIGHT)
        .map(|i| {
            let x = i % WIDTH;
            let y = i / WIDTH;
            if y < 4 {
                // 観測範囲外
                f32::NAN
            } else if x.abs_diff(front) < 6 {
                2.5 - x.abs_diff(front) as f32 * 0.4
            } else {
                0.0
            }
        })
        .collect();
    Grid::from_vec(WIDTH, HEIGHT, data).expect("格子数が一致しない")
}

fn main() -> anyhow::Result<()> {
    let config = RunConfig::new("/virtual/tiles");
    let resolver = config.resolver();
    let mut store = MemoryStore::new();
    store.insert_template(
        config.template_path(),
        GridTemplate {
            width: WIDTH,
            height: HEIGHT,
            geo_transform: [-9.965, 0.01, 0.0, 53.67, 0.0, -0.01],
            projection: String::from("GEOGCS[\"WGS 84\"]"),
        },
    );

    // 2日分の観測を用意し、12時の観測は欠測とする
    let start = datetime!(2024-01-01 01:00);
    for hour in 0..48 {
        if hour == 11 {
            continue;
        }
        let dt = start + Duration::hours(hour);
        store.insert_observation(
            resolver.resolve(dt, DataKind::HourlyObservation),
            synthetic_rain(hour),
        );
    }

    let first = YearlyAccumulation::new(&mut store, &config)
        .execute(RunMode::Fresh, datetime!(2024-01-01 18:20))?;
    println!("{first:?}");

    let resumed = YearlyAccumulation::new(&mut store, &config)
        .execute(RunMode::Latest, datetime!(2024-01-02 23:59))?;
    println!("{resumed:?}");

    let last = resolver.resolve(datetime!(2024-01-02 23:00), DataKind::YearlyAccumulation);
    if let Some(bands) = store.u32_bands(&last) {
        let wettest = bands[0].as_slice().iter().max().copied().unwrap_or(0);
        println!(
            "最大積算降水量: {:.1}mm 有効観測回数: {}",
            wettest as f64 / 10.0,
            bands[1].get(0, 0).unwrap_or(0)
        );
    }

    Ok(())
}
