/// 2次元格子
///
/// 値は最北西端の格子から経度方向（西から東）に記録され、東端に達したとき、
/// 1つ南の行の西端に移動する（行優先）。
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    /// 経度方向の格子数
    width: usize,
    /// 緯度方向の格子数
    height: usize,
    /// 行優先で格納した格子の値
    data: Vec<T>,
}

impl<T> Grid<T>
where
    T: Copy,
{
    /// すべての格子を同じ値で埋めた格子を構築する。
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// 行優先で並んだ値から格子を構築する。
    ///
    /// # 引数
    ///
    /// * `width` - 経度方向の格子数
    /// * `height` - 緯度方向の格子数
    /// * `data` - 行優先で並んだ格子の値
    ///
    /// # 戻り値
    ///
    /// 値の数が`width * height`と一致しない場合は`None`
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Option<Self> {
        if data.len() != width * height {
            return None;
        }

        Some(Self {
            width,
            height,
            data,
        })
    }

    /// 行の配列から格子を構築する。
    ///
    /// 行の長さが揃っていない場合は`None`を返す。
    pub fn from_rows<R>(rows: &[R]) -> Option<Self>
    where
        R: AsRef<[T]>,
    {
        let height = rows.len();
        let width = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut data = Vec::with_capacity(width * height);
        for row in rows {
            let row = row.as_ref();
            if row.len() != width {
                return None;
            }
            data.extend_from_slice(row);
        }

        Some(Self {
            width,
            height,
            data,
        })
    }

    /// 格子の大きさを`(幅, 高さ)`で返す。
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// 指定した位置の値を返す。範囲外の場合は`None`
    pub fn get(&self, x: usize, y: usize) -> Option<T> {
        if self.width <= x || self.height <= y {
            return None;
        }
        Some(self.data[y * self.width + x])
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// 大きさを変えずに値を置き換える。
    pub(crate) fn replace_data(&mut self, data: Vec<T>) {
        debug_assert_eq!(data.len(), self.data.len());
        self.data = data;
    }
}

/// 基準ラスタから得る格子系定義
///
/// 1回の実行で扱うすべてのラスタは、この定義と同じ大きさ・地理変換・投影法を持つ。
#[derive(Debug, Clone, PartialEq)]
pub struct GridTemplate {
    /// 経度方向の格子数
    pub width: usize,

    /// 緯度方向の格子数
    pub height: usize,

    /// 地理変換係数
    ///
    /// `[原点X, 格子幅, 回転, 原点Y, 回転, 格子高さ]`の順で、GDALの表現と同じ。
    pub geo_transform: [f64; 6],

    /// 投影法（WKT）
    pub projection: String,
}

impl GridTemplate {
    /// 格子の大きさを`(幅, 高さ)`で返す。
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// 格子がこの定義と同じ大きさか確認する。
    pub fn matches<T>(&self, grid: &Grid<T>) -> bool
    where
        T: Copy,
    {
        grid.size() == self.size()
    }
}
