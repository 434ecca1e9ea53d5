use std::path::{Path, PathBuf};

use crate::accumulation::VALID_CELL_THRESHOLD;
use crate::paths::{PathResolver, DEFAULT_TILES_DIR};

/// 実行設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// 入力ファイルとチェックポイントを格納するディレクトリ
    pub tiles_dir: PathBuf,

    /// 基準ラスタのパス
    ///
    /// `None`の場合は`tiles_dir`の下の既定の基準ラスタを使用する。
    pub template_path: Option<PathBuf>,

    /// 有効な観測とみなすために必要な、欠測でない格子数
    pub valid_cell_threshold: usize,
}

impl RunConfig {
    pub fn new<P>(tiles_dir: P) -> Self
    where
        P: AsRef<Path>,
    {
        Self {
            tiles_dir: tiles_dir.as_ref().to_owned(),
            template_path: None,
            valid_cell_threshold: VALID_CELL_THRESHOLD,
        }
    }

    pub fn with_template<P>(mut self, path: P) -> Self
    where
        P: AsRef<Path>,
    {
        self.template_path = Some(path.as_ref().to_owned());
        self
    }

    pub fn with_valid_cell_threshold(mut self, cells: usize) -> Self {
        self.valid_cell_threshold = cells;
        self
    }

    pub fn resolver(&self) -> PathResolver {
        PathResolver::new(&self.tiles_dir)
    }

    /// 基準ラスタのパスを返す。
    pub fn template_path(&self) -> PathBuf {
        match &self.template_path {
            Some(path) => path.clone(),
            None => self.resolver().default_template(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TILES_DIR)
    }
}
