use std::path::{Path, PathBuf};

use time::macros::datetime;
use time::PrimitiveDateTime;

/// タイルを格納するディレクトリの既定値
pub const DEFAULT_TILES_DIR: &str = "/media/datastore/tempsreel.infoclimat.net/tiles";

/// 基準ラスタの観測日時
///
/// 2017-02-05以降のフランス全域のレーダー観測範囲で有効な格子系定義を持つ。
const TEMPLATE_DATE_TIME: PrimitiveDateTime = datetime!(2018-01-01 00:00);

/// ファイルに記録されているデータの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    /// 1時間降水量（外部で作成される入力ファイル）
    HourlyObservation,

    /// 年初からの積算降水量と有効観測回数（チェックポイント）
    YearlyAccumulation,
}

impl DataKind {
    /// ファイル名の先頭に付与するキーを返す。
    pub fn key(&self) -> &'static str {
        match self {
            Self::HourlyObservation => "ac60radaric",
            Self::YearlyAccumulation => "ac_yearly_radaricval",
        }
    }

    /// ファイル名の分フィールドに記録する版番号を返す。
    ///
    /// 分フィールドは観測日時の分ではなく、固定の版番号として扱う。
    pub fn version_tag(&self) -> u8 {
        match self {
            Self::HourlyObservation => 0,
            Self::YearlyAccumulation => 0,
        }
    }
}

/// 日時とデータの種類からファイルのパスを決定する。
///
/// パスは`{tiles_dir}/{年}/{月}/{日}/{キー}_{時}_v{版番号}.tif`の形式である。
/// 入力ファイルとチェックポイントは同じ日ごとのディレクトリに格納され、キーでのみ区別される。
#[derive(Debug, Clone)]
pub struct PathResolver {
    tiles_dir: PathBuf,
}

impl PathResolver {
    pub fn new<P>(tiles_dir: P) -> Self
    where
        P: AsRef<Path>,
    {
        Self {
            tiles_dir: tiles_dir.as_ref().to_owned(),
        }
    }

    /// ファイルのパスを返す。
    ///
    /// ファイルが存在するかどうかは確認しない。
    ///
    /// # 引数
    ///
    /// * `dt` - 観測日時（分以下は無視する）
    /// * `kind` - データの種類
    ///
    /// # 戻り値
    ///
    /// ファイルのパス
    pub fn resolve(&self, dt: PrimitiveDateTime, kind: DataKind) -> PathBuf {
        let file_name = format!(
            "{}_{:02}_v{:02}.tif",
            kind.key(),
            dt.hour(),
            kind.version_tag()
        );
        self.tiles_dir
            .join(format!("{:04}", dt.year()))
            .join(format!("{:02}", dt.month() as u8))
            .join(format!("{:02}", dt.day()))
            .join(file_name)
    }

    /// 基準ラスタのパスを返す。
    pub fn default_template(&self) -> PathBuf {
        self.resolve(TEMPLATE_DATE_TIME, DataKind::HourlyObservation)
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(DEFAULT_TILES_DIR)
    }
}
