//! 1時間降水量レーダーラスタの年間積算
//!
//! 当年の1月1日01時から現在までの各正時について、年初からの積算降水量（0.1mm単位）と
//! 有効観測回数を2バンドのラスタ（チェックポイント）として書き出す。
//! 再開モードでは、最新のチェックポイントから積算状態を復元して続きを処理する。

pub mod accumulation;
pub mod config;
pub mod driver;
pub mod grid;
pub mod paths;
pub mod recovery;
pub mod stores;

pub use accumulation::{
    AccumulationError, AccumulationResult, AccumulationState, FoldOutcome, CHECKPOINT_NO_DATA,
    VALID_CELL_THRESHOLD,
};
pub use config::RunConfig;
pub use driver::{utc_now, RunSummary, YearWindow, YearlyAccumulation};
pub use grid::{Grid, GridTemplate};
pub use paths::{DataKind, PathResolver};
pub use recovery::{RunMode, MIN_CHECKPOINT_BYTES};
pub use stores::{MemoryStore, RasterStore, StoreError};

#[cfg(feature = "gdal")]
pub use stores::GdalStore;
