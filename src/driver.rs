use std::path::{Path, PathBuf};

use time::macros::time;
use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time};
use tracing::{error, info, warn};

use crate::accumulation::{AccumulationError, AccumulationResult, AccumulationState, FoldOutcome};
use crate::config::RunConfig;
use crate::grid::{Grid, GridTemplate};
use crate::paths::{DataKind, PathResolver};
use crate::recovery::{find_resume_point, fresh_start, RunMode};
use crate::stores::RasterStore;

/// 1年分の積算期間
///
/// 1月1日01時から翌年1月1日00時までの各正時を処理する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearWindow {
    /// 最初に処理する日時（1月1日01時）
    pub start: PrimitiveDateTime,

    /// 最後に処理する日時（翌年1月1日00時）
    pub end: PrimitiveDateTime,
}

impl YearWindow {
    pub fn for_year(year: i32) -> AccumulationResult<Self> {
        let first = new_year_day(year)?;
        let next = new_year_day(year + 1)?;

        Ok(Self {
            start: PrimitiveDateTime::new(first, time!(1:00)),
            end: PrimitiveDateTime::new(next, Time::MIDNIGHT),
        })
    }

    /// 年初から期間の終わりまでの時間数を返す。
    pub fn total_hours(&self) -> i64 {
        (self.end - self.start).whole_hours()
    }

    /// 年初を基準にした進捗率（%）を返す。
    ///
    /// 再開した場合も年初を基準とするため、再開直後の進捗率は0%にならない。
    pub fn progress(&self, dt: PrimitiveDateTime) -> f64 {
        let total = self.total_hours() as f64;
        let remaining = (self.end - dt).whole_hours() as f64;
        (total - remaining) / total * 100.0
    }
}

fn new_year_day(year: i32) -> AccumulationResult<Date> {
    Date::from_calendar_date(year, Month::January, 1)
        .map_err(|e| AccumulationError::InvalidDate(format!("{year}年1月1日 {e}")))
}

/// 日時の分以下を切り捨てる。
pub fn truncate_to_hour(dt: PrimitiveDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(dt.date(), Time::MIDNIGHT) + Duration::hours(dt.hour() as i64)
}

/// 現在のUTC日時を返す。
pub fn utc_now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

/// 実行結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// 積算状態を復元したチェックポイントの日時
    pub resumed_from: Option<PrimitiveDateTime>,

    /// 最後に処理した日時
    pub last: Option<PrimitiveDateTime>,

    /// 処理した時間数
    pub processed: usize,

    /// 1時間降水量を積算した時間数
    pub accumulated: usize,

    /// 1時間降水量が見つからない、または開けなかった時間数
    pub skipped: usize,

    /// チェックポイントの書き込みに失敗した時間数
    pub failed_writes: usize,

    /// 現在日時に到達して処理を終えたかどうか
    pub reached_future: bool,
}

/// 当年の積算を実行する。
pub struct YearlyAccumulation<'a, S>
where
    S: RasterStore + ?Sized,
{
    store: &'a mut S,
    resolver: PathResolver,
    template_path: PathBuf,
    valid_cell_threshold: usize,
}

impl<'a, S> YearlyAccumulation<'a, S>
where
    S: RasterStore + ?Sized,
{
    pub fn new(store: &'a mut S, config: &RunConfig) -> Self {
        Self {
            store,
            resolver: config.resolver(),
            template_path: config.template_path(),
            valid_cell_threshold: config.valid_cell_threshold,
        }
    }

    /// `now`を含む年の積算を実行する。
    ///
    /// 基準ラスタを開けない場合、復元したチェックポイントの大きさが一致しない場合、
    /// 積算値が欠測値に到達した場合はエラーを返す。1時間ごとの入出力の失敗では中断しない。
    ///
    /// # 引数
    ///
    /// * `mode` - 実行モード
    /// * `now` - 現在日時（UTC）
    ///
    /// # 戻り値
    ///
    /// 実行結果
    pub fn execute(
        &mut self,
        mode: RunMode,
        now: PrimitiveDateTime,
    ) -> AccumulationResult<RunSummary> {
        let template = self.store.open_template(&self.template_path)?;
        info!(
            width = template.width,
            height = template.height,
            path = %self.template_path.display(),
            "基準ラスタを読み込みました。"
        );

        let window = YearWindow::for_year(now.year())?;
        let resume = match mode {
            RunMode::Fresh => fresh_start(&template, &window),
            RunMode::Latest => {
                find_resume_point(&*self.store, &self.resolver, &template, now, &window)?
            }
        };
        let mut state = resume.state;
        let mut summary = RunSummary {
            resumed_from: resume.recovered_from,
            ..RunSummary::default()
        };

        let mut dh = resume.next;
        while dh <= window.end && dh <= now {
            self.process_hour(&mut state, &template, &window, dh, &mut summary)?;
            dh += Duration::hours(1);
        }

        if now < dh {
            info!(next = %dh, now = %now, "現在日時に到達しました。");
            summary.reached_future = true;
        }

        Ok(summary)
    }

    /// 1時間分を積算して、チェックポイントを書き出す。
    ///
    /// 1時間降水量がない場合も、直前と同じ積算状態をチェックポイントとして書き出す。
    fn process_hour(
        &mut self,
        state: &mut AccumulationState,
        template: &GridTemplate,
        window: &YearWindow,
        dh: PrimitiveDateTime,
        summary: &mut RunSummary,
    ) -> AccumulationResult<()> {
        let source = self.resolver.resolve(dh, DataKind::HourlyObservation);
        let checkpoint = self.resolver.resolve(dh, DataKind::YearlyAccumulation);
        info!(
            at = %dh,
            "[{:05.2}%] {}",
            window.progress(dh),
            checkpoint.display()
        );

        let observation = self.read_observation(&source, template);
        match state.fold(observation.as_ref(), self.valid_cell_threshold)? {
            FoldOutcome::Skipped => summary.skipped += 1,
            FoldOutcome::Accumulated { .. } => summary.accumulated += 1,
        }

        match state.write_checkpoint(&mut *self.store, &checkpoint, template) {
            Ok(()) => info!(" >> OK"),
            Err(e) => {
                error!(error = %e, "チェックポイントを書き出せませんでした。");
                summary.failed_writes += 1;
            }
        }
        summary.processed += 1;
        summary.last = Some(dh);

        Ok(())
    }

    /// 1時間降水量を読み込む。読み込めなかった場合は`None`
    fn read_observation(&self, source: &Path, template: &GridTemplate) -> Option<Grid<f32>> {
        if !self.store.exists(source) {
            warn!(path = %source.display(), " >> NOT FOUND");
            return None;
        }
        match self.store.read_f32_band(source, 1, template) {
            Ok(grid) => Some(grid),
            Err(e) => {
                warn!(path = %source.display(), error = %e, " >> NOT OPENED");
                None
            }
        }
    }
}
