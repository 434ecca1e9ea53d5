//! ラスタの入出力
//!
//! 積算処理は`RasterStore`トレイトを通してのみラスタを読み書きする。
//! 実際のファイルはGDAL（`gdal`フィーチャー）で扱い、テストではメモリ上のストアを使用する。

#[cfg(feature = "gdal")]
mod gdal;
mod memory;

use std::path::{Path, PathBuf};

use crate::grid::{Grid, GridTemplate};

#[cfg(feature = "gdal")]
pub use self::gdal::GdalStore;
pub use self::memory::MemoryStore;

/// GTiffドライバーに渡す作成オプション
///
/// `KEY=VALUE`の形式で記述する。
pub type CreationOptions<'a> = &'a [&'a str];

/// ラスタの読み書きを提供するストア
pub trait RasterStore {
    /// 基準ラスタを開いて、格子系定義を返す。
    fn open_template(&self, path: &Path) -> StoreResult<GridTemplate>;

    /// 浮動小数点数のバンドを1つ読み込む。
    ///
    /// # 引数
    ///
    /// * `path` - ラスタのパス
    /// * `band` - バンド番号（1始まり）
    /// * `template` - 格子系定義
    ///
    /// # 戻り値
    ///
    /// `template`と同じ大きさの格子
    fn read_f32_band(
        &self,
        path: &Path,
        band: usize,
        template: &GridTemplate,
    ) -> StoreResult<Grid<f32>>;

    /// 符号なし整数のバンドを、1番から`band_count`番まで順に読み込む。
    fn read_u32_bands(
        &self,
        path: &Path,
        band_count: usize,
        template: &GridTemplate,
    ) -> StoreResult<Vec<Grid<u32>>>;

    /// 符号なし整数の複数バンドのラスタを作成する。
    ///
    /// `bands`の先頭がバンド1になる。すべてのバンドに`no_data`を欠測値として設定し、
    /// 地理変換と投影法は`template`から複写する。
    /// 既存のファイルは上書きする。
    fn write_u32_bands(
        &mut self,
        path: &Path,
        template: &GridTemplate,
        bands: &[&Grid<u32>],
        no_data: u32,
        options: CreationOptions<'_>,
    ) -> StoreResult<()>;

    /// ファイルが存在するか確認する。
    fn exists(&self, path: &Path) -> bool;

    /// ファイルのバイト数を返す。存在しない場合は`None`
    fn file_size(&self, path: &Path) -> Option<u64>;
}

/// ストアエラー型
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// ファイルが存在しない
    #[error("ファイルが存在しません。`{0}`")]
    NotFound(PathBuf),

    /// ファイル・オープン・エラー
    #[error("ファイルを開くときにエラーが発生しました。`{path}` {message}")]
    Open { path: PathBuf, message: String },

    /// 読み込みエラー
    #[error("ラスタの読み込みに失敗しました。`{path}` {message}")]
    Read { path: PathBuf, message: String },

    /// 書き込みエラー
    #[error("ラスタの書き込みに失敗しました。`{path}` {message}")]
    Write { path: PathBuf, message: String },

    /// バンドが存在しない
    #[error("バンド{band}が存在しません。`{path}`")]
    BandMissing { path: PathBuf, band: usize },

    /// 格子の大きさが格子系定義と一致しない
    #[error(
        "格子の大きさが格子系定義と一致しません。`{path}` 期待値:{expected:?} 実際:{actual:?}"
    )]
    DimensionMismatch {
        path: PathBuf,
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

/// ストア結果型
pub type StoreResult<T> = Result<T, StoreError>;
