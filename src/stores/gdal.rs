use std::path::Path;

use gdal::raster::{Buffer, RasterCreationOptions};
use gdal::{Dataset, DriverManager};

use super::{CreationOptions, RasterStore, StoreError, StoreResult};
use crate::grid::{Grid, GridTemplate};

/// 出力に使用するGDALドライバー
const DRIVER_NAME: &str = "GTiff";

/// GDALでGeoTIFFを読み書きするストア
#[derive(Debug, Clone, Copy, Default)]
pub struct GdalStore;

impl GdalStore {
    pub fn new() -> Self {
        Self
    }
}

fn open(path: &Path) -> StoreResult<Dataset> {
    if !path.is_file() {
        return Err(StoreError::NotFound(path.to_owned()));
    }
    Dataset::open(path).map_err(|e| StoreError::Open {
        path: path.to_owned(),
        message: format!("{e}"),
    })
}

fn check_size(path: &Path, dataset: &Dataset, template: &GridTemplate) -> StoreResult<()> {
    let actual = dataset.raster_size();
    if actual != template.size() {
        return Err(StoreError::DimensionMismatch {
            path: path.to_owned(),
            expected: template.size(),
            actual,
        });
    }
    Ok(())
}

fn read_error(path: &Path, e: gdal::errors::GdalError) -> StoreError {
    StoreError::Read {
        path: path.to_owned(),
        message: format!("{e}"),
    }
}

fn write_error(path: &Path, e: gdal::errors::GdalError) -> StoreError {
    StoreError::Write {
        path: path.to_owned(),
        message: format!("{e}"),
    }
}

/// バンドから`template`の大きさの窓を読み込む。ラスタの大きさは呼び出し側で確認する。
fn read_band<T>(
    path: &Path,
    dataset: &Dataset,
    band: usize,
    template: &GridTemplate,
) -> StoreResult<Grid<T>>
where
    T: gdal::raster::GdalType + Copy,
{
    if dataset.raster_count() < band {
        return Err(StoreError::BandMissing {
            path: path.to_owned(),
            band,
        });
    }
    let size = template.size();
    let buffer: Buffer<T> = dataset
        .rasterband(band)
        .and_then(|b| b.read_as::<T>((0, 0), size, size, None))
        .map_err(|e| read_error(path, e))?;
    let (_, data) = buffer.into_shape_and_vec();

    Grid::from_vec(size.0, size.1, data).ok_or_else(|| StoreError::Read {
        path: path.to_owned(),
        message: format!("読み込んだ値の数が格子数と一致しません。{size:?}"),
    })
}

impl RasterStore for GdalStore {
    fn open_template(&self, path: &Path) -> StoreResult<GridTemplate> {
        let dataset = open(path)?;
        let (width, height) = dataset.raster_size();
        let geo_transform = dataset
            .geo_transform()
            .map_err(|e| read_error(path, e))?;
        let projection = dataset.projection();

        Ok(GridTemplate {
            width,
            height,
            geo_transform,
            projection,
        })
    }

    fn read_f32_band(
        &self,
        path: &Path,
        band: usize,
        template: &GridTemplate,
    ) -> StoreResult<Grid<f32>> {
        let dataset = open(path)?;
        check_size(path, &dataset, template)?;
        read_band::<f32>(path, &dataset, band, template)
    }

    fn read_u32_bands(
        &self,
        path: &Path,
        band_count: usize,
        template: &GridTemplate,
    ) -> StoreResult<Vec<Grid<u32>>> {
        let dataset = open(path)?;
        check_size(path, &dataset, template)?;
        (1..=band_count)
            .map(|band| read_band::<u32>(path, &dataset, band, template))
            .collect()
    }

    fn write_u32_bands(
        &mut self,
        path: &Path,
        template: &GridTemplate,
        bands: &[&Grid<u32>],
        no_data: u32,
        options: CreationOptions<'_>,
    ) -> StoreResult<()> {
        let driver =
            DriverManager::get_driver_by_name(DRIVER_NAME).map_err(|e| write_error(path, e))?;
        let options = RasterCreationOptions::from_iter(options.iter().copied());
        let mut dataset = driver
            .create_with_band_type_with_options::<u32, _>(
                path,
                template.width,
                template.height,
                bands.len(),
                &options,
            )
            .map_err(|e| write_error(path, e))?;

        for (i, grid) in bands.iter().enumerate() {
            if !template.matches(grid) {
                return Err(StoreError::DimensionMismatch {
                    path: path.to_owned(),
                    expected: template.size(),
                    actual: grid.size(),
                });
            }
            let mut band = dataset.rasterband(i + 1).map_err(|e| write_error(path, e))?;
            let mut buffer = Buffer::new(grid.size(), grid.as_slice().to_vec());
            band.write((0, 0), grid.size(), &mut buffer)
                .map_err(|e| write_error(path, e))?;
            band.set_no_data_value(Some(no_data as f64))
                .map_err(|e| write_error(path, e))?;
        }
        dataset
            .set_geo_transform(&template.geo_transform)
            .map_err(|e| write_error(path, e))?;
        dataset
            .set_projection(&template.projection)
            .map_err(|e| write_error(path, e))?;

        // 閉じるまでディスクへ書き出されない
        dataset.close().map_err(|e| write_error(path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn file_size(&self, path: &Path) -> Option<u64> {
        std::fs::metadata(path)
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len())
    }
}
