use time::{Duration, PrimitiveDateTime};
use tracing::{debug, info};

use crate::accumulation::{AccumulationResult, AccumulationState};
use crate::driver::{truncate_to_hour, YearWindow};
use crate::grid::GridTemplate;
use crate::paths::{DataKind, PathResolver};
use crate::stores::RasterStore;

/// 有効なチェックポイントとみなすファイルの最小バイト数
///
/// 書き込みが中断して空に近いファイルを除外する。
pub const MIN_CHECKPOINT_BYTES: u64 = 10;

/// 再開モードを指定するコマンドライン引数
pub const LATEST_ARG: &str = "latest";

/// 実行モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// 年初から積算をやり直す。
    #[default]
    Fresh,

    /// 最新のチェックポイントから積算を再開する。
    Latest,
}

impl RunMode {
    /// コマンドライン引数から実行モードを決定する。
    ///
    /// `latest`の場合のみ再開モードとし、それ以外は年初からの積算とする。
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            Some(LATEST_ARG) => Self::Latest,
            _ => Self::Fresh,
        }
    }
}

/// 積算を開始する時点
#[derive(Debug, Clone)]
pub struct ResumePoint {
    /// 開始時点の積算状態
    pub state: AccumulationState,

    /// 最初に処理する日時
    pub next: PrimitiveDateTime,

    /// 積算状態を復元したチェックポイントの日時（年初から積算する場合は`None`）
    pub recovered_from: Option<PrimitiveDateTime>,
}

/// 年初から積算する場合の開始時点を返す。
pub fn fresh_start(template: &GridTemplate, window: &YearWindow) -> ResumePoint {
    ResumePoint {
        state: AccumulationState::zeros(template.width, template.height),
        next: window.start,
        recovered_from: None,
    }
}

/// 有効なチェックポイントのうち、最も新しいものの日時を返す。
///
/// `from`から1時間ずつ遡り、ファイルが存在しないか、`MIN_CHECKPOINT_BYTES`未満の
/// チェックポイントを読み飛ばす。`floor`より前には遡らない。
///
/// # 引数
///
/// * `store` - ストア
/// * `resolver` - パスリゾルバー
/// * `from` - 探索を開始する日時（正時）
/// * `floor` - 探索する最も古い日時
///
/// # 戻り値
///
/// チェックポイントの日時。見つからない場合は`None`
pub fn find_latest_checkpoint<S>(
    store: &S,
    resolver: &PathResolver,
    from: PrimitiveDateTime,
    floor: PrimitiveDateTime,
) -> Option<PrimitiveDateTime>
where
    S: RasterStore + ?Sized,
{
    let mut dt = from;
    while floor <= dt {
        let path = resolver.resolve(dt, DataKind::YearlyAccumulation);
        match store.file_size(&path) {
            Some(bytes) if MIN_CHECKPOINT_BYTES <= bytes => return Some(dt),
            Some(bytes) => {
                debug!(path = %path.display(), bytes, "チェックポイントが小さすぎます。")
            }
            None => {}
        }
        dt -= Duration::hours(1);
    }

    None
}

/// 最新のチェックポイントから積算状態を復元して、再開する時点を返す。
///
/// 現在日時を正時に切り捨てた時点から遡って探索する。探索は`window`の開始日時で打ち切る。
/// 当年のチェックポイントが見つからない場合は、年初から積算する。
pub fn find_resume_point<S>(
    store: &S,
    resolver: &PathResolver,
    template: &GridTemplate,
    now: PrimitiveDateTime,
    window: &YearWindow,
) -> AccumulationResult<ResumePoint>
where
    S: RasterStore + ?Sized,
{
    let from = truncate_to_hour(now);
    if from < window.start {
        // 1月1日00時台は当年に処理する時刻がない
        return Ok(fresh_start(template, window));
    }

    info!("最新のチェックポイントを探索しています。");
    let Some(found) = find_latest_checkpoint(store, resolver, from, window.start) else {
        info!(
            since = %window.start,
            until = %from,
            "当年のチェックポイントが見つからないため、年初から積算します。"
        );
        return Ok(fresh_start(template, window));
    };

    let path = resolver.resolve(found, DataKind::YearlyAccumulation);
    info!(path = %path.display(), "チェックポイントから積算状態を復元します。");
    let state = AccumulationState::read_checkpoint(store, &path, template)?;

    Ok(ResumePoint {
        state,
        next: found + Duration::hours(1),
        recovered_from: Some(found),
    })
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::grid::Grid;
    use crate::stores::MemoryStore;

    fn template() -> GridTemplate {
        GridTemplate {
            width: 2,
            height: 2,
            geo_transform: [0.0, 1.0, 0.0, 0.0, 0.0, -1.0],
            projection: String::new(),
        }
    }

    fn write_checkpoint(
        store: &mut MemoryStore,
        resolver: &PathResolver,
        dt: PrimitiveDateTime,
        total: u32,
    ) {
        let state =
            AccumulationState::from_grids(Grid::filled(2, 2, total), Grid::filled(2, 2, 1)).unwrap();
        let path = resolver.resolve(dt, DataKind::YearlyAccumulation);
        state.write_checkpoint(store, &path, &template()).unwrap();
    }

    #[test]
    fn run_mode_from_argument() {
        assert_eq!(RunMode::from_arg(Some("latest")), RunMode::Latest);
        assert_eq!(RunMode::from_arg(Some("LATEST")), RunMode::Fresh);
        assert_eq!(RunMode::from_arg(Some("2024")), RunMode::Fresh);
        assert_eq!(RunMode::from_arg(None), RunMode::Fresh);
    }

    #[test]
    fn fresh_start_is_first_hour_of_year() {
        let window = YearWindow::for_year(2024).unwrap();
        let point = fresh_start(&template(), &window);
        assert_eq!(point.next, datetime!(2024-01-01 01:00));
        assert_eq!(point.state, AccumulationState::zeros(2, 2));
        assert_eq!(point.recovered_from, None);
    }

    #[test]
    fn skips_missing_and_truncated_checkpoints() {
        let resolver = PathResolver::new("/tiles");
        let mut store = MemoryStore::new();
        let now = datetime!(2024-05-10 12:34);
        write_checkpoint(&mut store, &resolver, datetime!(2024-05-10 09:00), 70);
        store.insert_raw(
            resolver.resolve(datetime!(2024-05-10 10:00), DataKind::YearlyAccumulation),
            MIN_CHECKPOINT_BYTES - 1,
        );

        let window = YearWindow::for_year(2024).unwrap();
        let point = find_resume_point(&store, &resolver, &template(), now, &window).unwrap();

        assert_eq!(point.recovered_from, Some(datetime!(2024-05-10 09:00)));
        assert_eq!(point.next, datetime!(2024-05-10 10:00));
        assert_eq!(point.state.total(), &Grid::filled(2, 2, 70));
    }

    #[test]
    fn checkpoint_of_current_hour_is_used() {
        let resolver = PathResolver::new("/tiles");
        let mut store = MemoryStore::new();
        write_checkpoint(&mut store, &resolver, datetime!(2024-05-10 12:00), 3);

        let window = YearWindow::for_year(2024).unwrap();
        let point = find_resume_point(
            &store,
            &resolver,
            &template(),
            datetime!(2024-05-10 12:59),
            &window,
        )
        .unwrap();
        assert_eq!(point.next, datetime!(2024-05-10 13:00));
    }

    #[test]
    fn scan_stops_at_start_of_year() {
        let resolver = PathResolver::new("/tiles");
        let mut store = MemoryStore::new();
        // 前年の最終チェックポイントは再開に使用しない
        write_checkpoint(&mut store, &resolver, datetime!(2024-01-01 00:00), 999);

        let window = YearWindow::for_year(2024).unwrap();
        let point = find_resume_point(
            &store,
            &resolver,
            &template(),
            datetime!(2024-01-03 04:00),
            &window,
        )
        .unwrap();
        assert_eq!(point.next, datetime!(2024-01-01 01:00));
        assert_eq!(point.state, AccumulationState::zeros(2, 2));
        assert_eq!(point.recovered_from, None);
    }

    #[test]
    fn first_hour_of_new_year_starts_fresh() {
        let resolver = PathResolver::new("/tiles");
        let mut store = MemoryStore::new();
        write_checkpoint(&mut store, &resolver, datetime!(2025-01-01 00:00), 999);

        let window = YearWindow::for_year(2025).unwrap();
        for now in [datetime!(2025-01-01 00:30), datetime!(2025-01-01 01:10)] {
            let point = find_resume_point(&store, &resolver, &template(), now, &window).unwrap();
            assert_eq!(point.next, datetime!(2025-01-01 01:00));
            assert_eq!(point.recovered_from, None);
            assert_eq!(point.state, AccumulationState::zeros(2, 2));
        }
    }
}
