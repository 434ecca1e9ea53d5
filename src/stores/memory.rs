use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{CreationOptions, RasterStore, StoreError, StoreResult};
use crate::grid::{Grid, GridTemplate};

/// ラスタのヘッダーとみなすバイト数
const HEADER_BYTES: u64 = 8;

/// メモリ上に格納したラスタ
#[derive(Debug, Clone)]
enum Entry {
    /// 格子系定義のみを持つ基準ラスタ
    Template(GridTemplate),

    /// 浮動小数点数のバンド
    F32Bands(Vec<Grid<f32>>),

    /// 符号なし整数のバンド
    U32Bands {
        template: GridTemplate,
        bands: Vec<Grid<u32>>,
        no_data: u32,
    },

    /// ラスタとして開けないバイト列（書き込み途中で中断したファイルなど）
    Raw(u64),
}

impl Entry {
    fn byte_size(&self) -> u64 {
        match self {
            Self::Template(_) => HEADER_BYTES,
            Self::F32Bands(bands) => {
                HEADER_BYTES + bands.iter().map(|b| b.as_slice().len() as u64 * 4).sum::<u64>()
            }
            Self::U32Bands { bands, .. } => {
                HEADER_BYTES + bands.iter().map(|b| b.as_slice().len() as u64 * 4).sum::<u64>()
            }
            Self::Raw(bytes) => *bytes,
        }
    }
}

/// パスをキーにしてラスタをメモリ上に保持するストア
///
/// ファイル・システムに触れずに積算処理を実行するために使用する。
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<PathBuf, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 基準ラスタを登録する。
    pub fn insert_template<P>(&mut self, path: P, template: GridTemplate)
    where
        P: AsRef<Path>,
    {
        self.entries
            .insert(path.as_ref().to_owned(), Entry::Template(template));
    }

    /// 1バンドの1時間降水量ラスタを登録する。
    pub fn insert_observation<P>(&mut self, path: P, grid: Grid<f32>)
    where
        P: AsRef<Path>,
    {
        self.entries
            .insert(path.as_ref().to_owned(), Entry::F32Bands(vec![grid]));
    }

    /// ラスタとして開けない`bytes`バイトのファイルを登録する。
    pub fn insert_raw<P>(&mut self, path: P, bytes: u64)
    where
        P: AsRef<Path>,
    {
        self.entries
            .insert(path.as_ref().to_owned(), Entry::Raw(bytes));
    }

    /// ファイルを削除する。
    pub fn remove<P>(&mut self, path: P) -> bool
    where
        P: AsRef<Path>,
    {
        self.entries.remove(path.as_ref()).is_some()
    }

    /// 符号なし整数のバンドを返す。
    pub fn u32_bands<P>(&self, path: P) -> Option<&[Grid<u32>]>
    where
        P: AsRef<Path>,
    {
        match self.entries.get(path.as_ref()) {
            Some(Entry::U32Bands { bands, .. }) => Some(bands),
            _ => None,
        }
    }

    /// 符号なし整数のバンドに設定された欠測値を返す。
    pub fn no_data<P>(&self, path: P) -> Option<u32>
    where
        P: AsRef<Path>,
    {
        match self.entries.get(path.as_ref()) {
            Some(Entry::U32Bands { no_data, .. }) => Some(*no_data),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, path: &Path) -> StoreResult<&Entry> {
        self.entries
            .get(path)
            .ok_or_else(|| StoreError::NotFound(path.to_owned()))
    }
}

fn check_size<T>(path: &Path, template: &GridTemplate, grid: &Grid<T>) -> StoreResult<()>
where
    T: Copy,
{
    if !template.matches(grid) {
        return Err(StoreError::DimensionMismatch {
            path: path.to_owned(),
            expected: template.size(),
            actual: grid.size(),
        });
    }
    Ok(())
}

fn not_a_raster(path: &Path) -> StoreError {
    StoreError::Open {
        path: path.to_owned(),
        message: String::from("ラスタとして認識できません。"),
    }
}

impl RasterStore for MemoryStore {
    fn open_template(&self, path: &Path) -> StoreResult<GridTemplate> {
        match self.entry(path)? {
            Entry::Template(template) => Ok(template.clone()),
            Entry::U32Bands { template, .. } => Ok(template.clone()),
            _ => Err(not_a_raster(path)),
        }
    }

    fn read_f32_band(
        &self,
        path: &Path,
        band: usize,
        template: &GridTemplate,
    ) -> StoreResult<Grid<f32>> {
        let bands = match self.entry(path)? {
            Entry::F32Bands(bands) => bands,
            Entry::Raw(_) => return Err(not_a_raster(path)),
            _ => {
                return Err(StoreError::Read {
                    path: path.to_owned(),
                    message: String::from("浮動小数点数のバンドではありません。"),
                })
            }
        };
        let grid = band
            .checked_sub(1)
            .and_then(|i| bands.get(i))
            .ok_or_else(|| StoreError::BandMissing {
                path: path.to_owned(),
                band,
            })?;
        check_size(path, template, grid)?;

        Ok(grid.clone())
    }

    fn read_u32_bands(
        &self,
        path: &Path,
        band_count: usize,
        template: &GridTemplate,
    ) -> StoreResult<Vec<Grid<u32>>> {
        let bands = match self.entry(path)? {
            Entry::U32Bands { bands, .. } => bands,
            Entry::Raw(_) => return Err(not_a_raster(path)),
            _ => {
                return Err(StoreError::Read {
                    path: path.to_owned(),
                    message: String::from("符号なし整数のバンドではありません。"),
                })
            }
        };
        if bands.len() < band_count {
            return Err(StoreError::BandMissing {
                path: path.to_owned(),
                band: bands.len() + 1,
            });
        }
        for grid in &bands[..band_count] {
            check_size(path, template, grid)?;
        }

        Ok(bands[..band_count].to_vec())
    }

    fn write_u32_bands(
        &mut self,
        path: &Path,
        template: &GridTemplate,
        bands: &[&Grid<u32>],
        no_data: u32,
        _options: CreationOptions<'_>,
    ) -> StoreResult<()> {
        for grid in bands {
            check_size(path, template, grid)?;
        }
        let entry = Entry::U32Bands {
            template: template.clone(),
            bands: bands.iter().map(|&b| b.clone()).collect(),
            no_data,
        };
        self.entries.insert(path.to_owned(), entry);

        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    fn file_size(&self, path: &Path) -> Option<u64> {
        self.entries.get(path).map(Entry::byte_size)
    }
}
