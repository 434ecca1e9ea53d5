use std::path::Path;

use tracing::debug;

use crate::grid::{Grid, GridTemplate};
use crate::stores::{RasterStore, StoreError, StoreResult};

/// 1時間降水量を有効な観測とみなすために必要な、欠測でない格子数の下限（この値を含まない）
pub const VALID_CELL_THRESHOLD: usize = 1000;

/// 降水量（mm）を積算値（0.1mm単位）に変換する倍率
const PRECIPITATION_SCALE: f32 = 10.0;

/// チェックポイントの各バンドに設定する欠測値
///
/// 積算値と有効観測回数は、この値に到達してはならない。
pub const CHECKPOINT_NO_DATA: u32 = u32::MAX;

/// チェックポイントのバンド数
pub const CHECKPOINT_BANDS: usize = 2;

/// チェックポイントを作成するときのGTiff作成オプション
pub const CHECKPOINT_CREATION_OPTIONS: &[&str] = &["COMPRESS=LZW", "PREDICTOR=2"];

/// 年初からの積算状態
///
/// 積算降水量と有効観測回数の2つの格子で構成され、1時間ごとに1回だけ更新される。
/// チェックポイントとして書き出したラスタから、完全に復元できる。
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulationState {
    /// 年初からの積算降水量（0.1mm単位）
    ///
    /// 欠測と降水なしは、どちらも0として積算される。
    total: Grid<u32>,

    /// 年初からの有効観測回数
    ///
    /// 格子ごとではなく、ラスタ全体の有効性で一律に加算される。
    valid_count: Grid<u32>,
}

/// 1時間分の積算結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    /// 観測がなかったため、積算状態を変更しなかった。
    Skipped,

    /// 観測を積算した。
    Accumulated {
        /// 欠測でない格子の数
        valid_cells: usize,
        /// 有効観測回数を加算したかどうか
        counted: bool,
    },
}

impl AccumulationState {
    /// すべての格子が0の積算状態を構築する。
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            total: Grid::filled(width, height, 0),
            valid_count: Grid::filled(width, height, 0),
        }
    }

    /// 積算降水量と有効観測回数から積算状態を構築する。
    pub fn from_grids(total: Grid<u32>, valid_count: Grid<u32>) -> AccumulationResult<Self> {
        if total.size() != valid_count.size() {
            return Err(AccumulationError::DimensionMismatch {
                expected: total.size(),
                actual: valid_count.size(),
            });
        }

        Ok(Self { total, valid_count })
    }

    /// 積算降水量（0.1mm単位）を返す。
    pub fn total(&self) -> &Grid<u32> {
        &self.total
    }

    /// 有効観測回数を返す。
    pub fn valid_count(&self) -> &Grid<u32> {
        &self.valid_count
    }

    pub fn size(&self) -> (usize, usize) {
        self.total.size()
    }

    /// 1時間降水量を積算する。
    ///
    /// 欠測（NaN）の格子は降水量0として積算する。欠測でない格子の数が`valid_cell_threshold`を
    /// 超えた場合は、ラスタ全体を有効な観測とみなして、すべての格子の有効観測回数に1を加える。
    /// 一部の格子が欠測していても、有効観測回数は格子ごとに区別しない。
    ///
    /// 積算値が欠測値に到達する場合は、積算状態を変更せずにエラーを返す。
    ///
    /// # 引数
    ///
    /// * `observation` - 1時間降水量（mm）。ファイルが存在しない、または開けなかった場合は`None`
    /// * `valid_cell_threshold` - 有効な観測とみなすために必要な欠測でない格子数
    ///
    /// # 戻り値
    ///
    /// 積算結果
    pub fn fold(
        &mut self,
        observation: Option<&Grid<f32>>,
        valid_cell_threshold: usize,
    ) -> AccumulationResult<FoldOutcome> {
        let observation = match observation {
            Some(observation) => observation,
            None => return Ok(FoldOutcome::Skipped),
        };
        if observation.size() != self.size() {
            return Err(AccumulationError::DimensionMismatch {
                expected: self.size(),
                actual: observation.size(),
            });
        }

        let valid_cells = observation
            .as_slice()
            .iter()
            .filter(|v| !v.is_nan())
            .count();
        let counted = valid_cell_threshold < valid_cells;

        let total = self
            .total
            .as_slice()
            .iter()
            .zip(observation.as_slice())
            .map(|(&acc, &value)| checked_accumulate(acc, to_tenths(value)))
            .collect::<Option<Vec<_>>>()
            .ok_or(AccumulationError::Overflow)?;
        let valid_count = if counted {
            let counts = self
                .valid_count
                .as_slice()
                .iter()
                .map(|&n| checked_accumulate(n, 1))
                .collect::<Option<Vec<_>>>()
                .ok_or(AccumulationError::Overflow)?;
            Some(counts)
        } else {
            None
        };

        self.total.replace_data(total);
        if let Some(counts) = valid_count {
            self.valid_count.replace_data(counts);
        }
        debug!(valid_cells, counted, "1時間降水量を積算しました。");

        Ok(FoldOutcome::Accumulated {
            valid_cells,
            counted,
        })
    }

    /// 積算状態をチェックポイントとして書き出す。
    ///
    /// バンド1に積算降水量、バンド2に有効観測回数を記録する。
    pub fn write_checkpoint<S>(
        &self,
        store: &mut S,
        path: &Path,
        template: &GridTemplate,
    ) -> StoreResult<()>
    where
        S: RasterStore + ?Sized,
    {
        store.write_u32_bands(
            path,
            template,
            &[&self.total, &self.valid_count],
            CHECKPOINT_NO_DATA,
            CHECKPOINT_CREATION_OPTIONS,
        )
    }

    /// チェックポイントから積算状態を読み込む。
    ///
    /// チェックポイントの大きさが`template`と一致しない場合はエラーを返す。
    pub fn read_checkpoint<S>(
        store: &S,
        path: &Path,
        template: &GridTemplate,
    ) -> AccumulationResult<Self>
    where
        S: RasterStore + ?Sized,
    {
        let mut bands = store
            .read_u32_bands(path, CHECKPOINT_BANDS, template)
            .map_err(|e| match e {
                StoreError::DimensionMismatch {
                    expected, actual, ..
                } => AccumulationError::DimensionMismatch { expected, actual },
                e => AccumulationError::Store(e),
            })?
            .into_iter();
        let (total, valid_count) = match (bands.next(), bands.next()) {
            (Some(total), Some(valid_count)) => (total, valid_count),
            _ => {
                return Err(AccumulationError::Store(StoreError::BandMissing {
                    path: path.to_owned(),
                    band: CHECKPOINT_BANDS,
                }))
            }
        };
        if !template.matches(&total) {
            return Err(AccumulationError::DimensionMismatch {
                expected: template.size(),
                actual: total.size(),
            });
        }

        Self::from_grids(total, valid_count)
    }
}

/// 降水量（mm）を0.1mm単位の整数に変換する。
///
/// 小数点以下は切り捨てる。NaNと負の値は0になる。
fn to_tenths(value: f32) -> u32 {
    if value.is_nan() {
        return 0;
    }
    (value * PRECIPITATION_SCALE) as u32
}

/// 欠測値に到達しない範囲で加算する。
fn checked_accumulate(acc: u32, value: u32) -> Option<u32> {
    acc.checked_add(value).filter(|&v| v < CHECKPOINT_NO_DATA)
}

/// 積算エラー型
#[derive(Debug, Clone, thiserror::Error)]
pub enum AccumulationError {
    /// ラスタの入出力エラー
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 格子の大きさが一致しない
    #[error("格子の大きさが一致しません。期待値:{expected:?} 実際:{actual:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// 積算値が欠測値に到達した
    #[error("積算値が欠測値({})に到達しました。", CHECKPOINT_NO_DATA)]
    Overflow,

    /// 日時を構築できない
    #[error("日時を構築できませんでした。{0}")]
    InvalidDate(String),
}

/// 積算結果型
pub type AccumulationResult<T> = Result<T, AccumulationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;

    fn observation<R>(rows: &[R]) -> Grid<f32>
    where
        R: AsRef<[f32]>,
    {
        Grid::from_rows(rows).unwrap()
    }

    fn template(width: usize, height: usize) -> GridTemplate {
        GridTemplate {
            width,
            height,
            geo_transform: [0.0, 1.0, 0.0, 0.0, 0.0, -1.0],
            projection: String::new(),
        }
    }

    #[test]
    fn nan_cells_accumulate_as_zero() {
        let mut state = AccumulationState::zeros(2, 2);
        let outcome = state
            .fold(Some(&observation(&[[1.0, f32::NAN], [0.0, 2.0]])), 0)
            .unwrap();

        assert_eq!(
            outcome,
            FoldOutcome::Accumulated {
                valid_cells: 3,
                counted: true
            }
        );
        assert_eq!(state.total(), &Grid::from_rows(&[[10u32, 0], [0, 20]]).unwrap());
        assert_eq!(state.valid_count(), &Grid::filled(2, 2, 1u32));
    }

    #[test]
    fn fractional_tenths_are_truncated() {
        let mut state = AccumulationState::zeros(3, 1);
        state
            .fold(Some(&observation(&[[0.05, 1.29, -3.0]])), 0)
            .unwrap();
        assert_eq!(state.total().as_slice(), &[0, 12, 0]);
    }

    #[test]
    fn all_nan_observation_changes_nothing() {
        let mut state = AccumulationState::zeros(40, 40);
        state.fold(Some(&Grid::filled(40, 40, 1.5)), 0).unwrap();
        let before = state.clone();

        let outcome = state
            .fold(Some(&Grid::filled(40, 40, f32::NAN)), VALID_CELL_THRESHOLD)
            .unwrap();

        assert_eq!(
            outcome,
            FoldOutcome::Accumulated {
                valid_cells: 0,
                counted: false
            }
        );
        assert_eq!(state, before);
    }

    /// 先頭`valid`個の格子だけが欠測でない50x50の観測
    fn partially_valid(valid: usize) -> Grid<f32> {
        let data = (0..2500)
            .map(|i| if i < valid { 0.5 } else { f32::NAN })
            .collect();
        Grid::from_vec(50, 50, data).unwrap()
    }

    #[test]
    fn threshold_cells_are_not_enough() {
        let mut state = AccumulationState::zeros(50, 50);
        state
            .fold(Some(&partially_valid(1000)), VALID_CELL_THRESHOLD)
            .unwrap();
        assert!(state.valid_count().as_slice().iter().all(|&n| n == 0));
        assert_eq!(state.total().get(0, 0), Some(5));
    }

    #[test]
    fn one_cell_over_threshold_counts_everywhere() {
        let mut state = AccumulationState::zeros(50, 50);
        let outcome = state
            .fold(Some(&partially_valid(1001)), VALID_CELL_THRESHOLD)
            .unwrap();
        assert_eq!(
            outcome,
            FoldOutcome::Accumulated {
                valid_cells: 1001,
                counted: true
            }
        );
        // 欠測していた格子も一律に加算される
        assert!(state.valid_count().as_slice().iter().all(|&n| n == 1));
    }

    #[test]
    fn fold_order_does_not_change_total() {
        let first = observation(&[[1.0, f32::NAN, 3.5], [0.2, 8.0, 0.0]]);
        let second = observation(&[[f32::NAN, 2.0, 0.1], [4.4, f32::NAN, 9.9]]);

        let mut forward = AccumulationState::zeros(3, 2);
        forward.fold(Some(&first), 0).unwrap();
        forward.fold(Some(&second), 0).unwrap();
        let mut backward = AccumulationState::zeros(3, 2);
        backward.fold(Some(&second), 0).unwrap();
        backward.fold(Some(&first), 0).unwrap();

        assert_eq!(forward.total(), backward.total());
        assert_eq!(forward.valid_count(), backward.valid_count());
    }

    #[test]
    fn absent_observation_is_skipped() {
        let mut state = AccumulationState::zeros(2, 2);
        state.fold(Some(&Grid::filled(2, 2, 1.0)), 0).unwrap();
        let before = state.clone();
        assert_eq!(state.fold(None, 0).unwrap(), FoldOutcome::Skipped);
        assert_eq!(state, before);
    }

    #[test]
    fn reaching_no_data_is_fatal_and_keeps_state() {
        let total = Grid::from_vec(2, 1, vec![CHECKPOINT_NO_DATA - 5, 0]).unwrap();
        let mut state = AccumulationState::from_grids(total, Grid::filled(2, 1, 3)).unwrap();
        let before = state.clone();

        let result = state.fold(Some(&observation(&[[0.5, 0.5]])), 0);
        assert!(matches!(result, Err(AccumulationError::Overflow)));
        assert_eq!(state, before);
    }

    #[test]
    fn mismatched_observation_is_rejected() {
        let mut state = AccumulationState::zeros(2, 2);
        let result = state.fold(Some(&Grid::filled(3, 2, 1.0)), 0);
        assert!(matches!(
            result,
            Err(AccumulationError::DimensionMismatch {
                expected: (2, 2),
                actual: (3, 2)
            })
        ));
    }

    #[test]
    fn checkpoint_round_trip_is_exact() {
        let mut store = MemoryStore::new();
        let path = Path::new("/tiles/2024/01/01/ac_yearly_radaricval_05_v00.tif");
        let total = Grid::from_rows(&[[0u32, 1, 2], [123_456, 7, 4_000_000]]).unwrap();
        let valid_count = Grid::from_rows(&[[5u32, 5, 5], [5, 5, 4]]).unwrap();
        let state = AccumulationState::from_grids(total, valid_count).unwrap();

        state.write_checkpoint(&mut store, path, &template(3, 2)).unwrap();
        assert_eq!(store.no_data(path), Some(CHECKPOINT_NO_DATA));

        let restored = AccumulationState::read_checkpoint(&store, path, &template(3, 2)).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn checkpoint_of_another_size_is_fatal() {
        let mut store = MemoryStore::new();
        let path = Path::new("/acc.tif");
        AccumulationState::zeros(3, 2)
            .write_checkpoint(&mut store, path, &template(3, 2))
            .unwrap();

        let result = AccumulationState::read_checkpoint(&store, path, &template(2, 2));
        assert!(matches!(
            result,
            Err(AccumulationError::DimensionMismatch { .. })
        ));
    }
}
