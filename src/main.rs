use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use radar_yearly_acc::paths::DEFAULT_TILES_DIR;
use radar_yearly_acc::{
    utc_now, GdalStore, RunConfig, RunMode, YearlyAccumulation, VALID_CELL_THRESHOLD,
};

#[derive(Parser, Debug)]
#[command(name = "radar-yearly-acc")]
#[command(about = "1時間降水量レーダーラスタを年初から積算する")]
struct Args {
    /// `latest`を指定すると、最新のチェックポイントから積算を再開する
    mode: Option<String>,

    /// 入力ファイルとチェックポイントを格納するディレクトリ
    #[arg(long, env = "RADAR_TILES_DIR", default_value = DEFAULT_TILES_DIR)]
    tiles_dir: PathBuf,

    /// 基準ラスタのパス
    #[arg(long, env = "RADAR_TEMPLATE")]
    template: Option<PathBuf>,

    /// 有効な観測とみなすために必要な、欠測でない格子数
    #[arg(long, env = "RADAR_VALID_CELLS", default_value_t = VALID_CELL_THRESHOLD)]
    valid_cells: usize,

    /// ログレベル
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = RunConfig::new(&args.tiles_dir).with_valid_cell_threshold(args.valid_cells);
    if let Some(template) = &args.template {
        config = config.with_template(template);
    }
    let mode = RunMode::from_arg(args.mode.as_deref());

    let mut store = GdalStore::new();
    let summary = YearlyAccumulation::new(&mut store, &config).execute(mode, utc_now())?;
    info!(
        processed = summary.processed,
        accumulated = summary.accumulated,
        skipped = summary.skipped,
        failed_writes = summary.failed_writes,
        "積算を終了しました。"
    );

    Ok(())
}
