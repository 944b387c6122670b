//! GeoTIFF decoding and encoding.
//!
//! Reads the first band of a (possibly multi-band, chunky) TIFF, widening every
//! sample type to `f64`, and recovers georeferencing from the GeoTIFF tags:
//! - 33550 ModelPixelScale + 33922 ModelTiepoint, or 34264 ModelTransformation
//! - 34735 GeoKeyDirectory (ProjectedCSType 3072, GeographicType 2048)
//! - 42113 GDAL_NODATA

use std::io::{Cursor, Read, Seek};

use anyhow::{Context, Result, ensure};
use ndarray::Array2;
use tiff::{
    decoder::{Decoder, DecodingResult, Limits},
    encoder::{colortype::Gray32Float, TiffEncoder},
    tags::Tag,
};

use crate::error::HazardError;
use super::{Crs, GeoTransform, Raster};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

#[inline]
fn tag(code: u16) -> Tag { Tag::from_u16_exhaustive(code) }

/// Decode a GeoTIFF held in memory.
pub fn read_geotiff(bytes: &[u8]) -> Result<Raster> {
    let mut decoder = Decoder::new(Cursor::new(bytes))
        .context("[raster::geotiff] failed to open TIFF")?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions()
        .context("[raster::geotiff] failed to read dimensions")?;
    let (width, height) = (width as usize, height as usize);

    let keys = read_geo_keys(&mut decoder);
    let transform = read_transform(&mut decoder, &keys)?;
    let crs = keys.crs;
    let nodata = read_nodata(&mut decoder);

    let (samples, nodata) = decode_samples(&mut decoder, nodata)?;
    let cells = width * height;
    ensure!(
        cells > 0 && samples.len() % cells == 0,
        HazardError::InvalidRaster(format!("{} samples for a {width}x{height} grid", samples.len()))
    );

    // Chunky layout: keep the first sample of every pixel.
    let stride = samples.len() / cells;
    let band = samples.into_iter().step_by(stride).collect::<Vec<_>>();
    let data = Array2::from_shape_vec((height, width), band)
        .context("[raster::geotiff] failed to shape band")?;

    Ok(Raster::new(data, transform, crs, nodata))
}

/// Widen the decoded image to `f64` samples.
///
/// The no-data value is first cast to the band's sample type, so a sentinel
/// printed with more digits than the type holds still matches its cells.
fn decode_samples<R: Read + Seek>(decoder: &mut Decoder<R>, nodata: Option<f64>) -> Result<(Vec<f64>, Option<f64>)> {
    let image = decoder.read_image()
        .context("[raster::geotiff] failed to decode image data")?;

    let cast = |f: fn(f64) -> f64| nodata.map(f);
    Ok(match image {
        DecodingResult::F64(data) => (data, nodata),
        DecodingResult::F32(data) => (data.into_iter().map(f64::from).collect(), cast(|v| v as f32 as f64)),
        DecodingResult::U8(data) => (data.into_iter().map(f64::from).collect(), cast(|v| v as u8 as f64)),
        DecodingResult::U16(data) => (data.into_iter().map(f64::from).collect(), cast(|v| v as u16 as f64)),
        DecodingResult::U32(data) => (data.into_iter().map(f64::from).collect(), cast(|v| v as u32 as f64)),
        DecodingResult::U64(data) => (data.into_iter().map(|v| v as f64).collect(), cast(|v| v as u64 as f64)),
        DecodingResult::I8(data) => (data.into_iter().map(f64::from).collect(), cast(|v| v as i8 as f64)),
        DecodingResult::I16(data) => (data.into_iter().map(f64::from).collect(), cast(|v| v as i16 as f64)),
        DecodingResult::I32(data) => (data.into_iter().map(f64::from).collect(), cast(|v| v as i32 as f64)),
        DecodingResult::I64(data) => (data.into_iter().map(|v| v as f64).collect(), cast(|v| v as i64 as f64)),
    })
}

/// GeoKeys this reader uses.
#[derive(Debug, Default)]
struct GeoKeys {
    crs: Option<Crs>,
    /// GTRasterTypeGeoKey is 2 (PixelIsPoint): tiepoints address pixel centres.
    pixel_is_point: bool,
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>, keys: &GeoKeys) -> Result<GeoTransform> {
    let transform = read_model_transform(decoder)?;
    if !keys.pixel_is_point {
        return Ok(transform)
    }
    // Move the origin from the first pixel's centre to its corner, as GDAL does.
    let (origin_x, origin_y) = transform.apply(-0.5, -0.5);
    Ok(GeoTransform { origin_x, origin_y, ..transform })
}

fn read_model_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(tag(MODEL_PIXEL_SCALE)).ok();
    let tiepoint = decoder.get_tag_f64_vec(tag(MODEL_TIEPOINT)).ok();

    if let (Some(scale), Some(tp)) = (&scale, &tiepoint) {
        if scale.len() >= 2 && tp.len() >= 6 {
            // Tiepoint is [i, j, k, x, y, z]: raster (i, j) sits at map (x, y).
            return Ok(GeoTransform::new(
                tp[3] - tp[0] * scale[0],
                tp[4] + tp[1] * scale[1],
                scale[0],
                -scale[1],
            ));
        }
    }

    if let Ok(m) = decoder.get_tag_f64_vec(tag(MODEL_TRANSFORMATION)) {
        if m.len() >= 16 {
            return Ok(GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]]));
        }
    }

    Err(HazardError::InvalidRaster("missing ModelPixelScale/ModelTiepoint or ModelTransformation tags".into()).into())
}

fn read_geo_keys<R: Read + Seek>(decoder: &mut Decoder<R>) -> GeoKeys {
    let mut keys = GeoKeys::default();
    let Ok(dir) = decoder.get_tag_u16_vec(tag(GEO_KEY_DIRECTORY)) else { return keys };
    if dir.len() < 4 { return keys }

    // Header [version, revision, minor, count], then [key, location, count, value] entries.
    let mut geographic = None;
    let mut projected = None;
    for entry in dir[4..].chunks_exact(4).take(dir[3] as usize) {
        // location 0 means the value is stored inline.
        if entry[1] != 0 { continue }
        match (entry[0], entry[3]) {
            (GT_RASTER_TYPE_KEY, value) => keys.pixel_is_point = value == 2,
            (_, 0 | 32767) => {}
            (PROJECTED_CS_TYPE_KEY, code) => projected = Some(Crs(code as u32)),
            (GEOGRAPHIC_TYPE_KEY, code) => geographic = Some(Crs(code as u32)),
            _ => {}
        }
    }
    keys.crs = projected.or(geographic);
    keys
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    decoder.get_tag_ascii_string(tag(GDAL_NODATA)).ok()
        .and_then(|s| s.trim_end_matches('\0').trim().parse().ok())
}

/// Encode a raster as a single-band 32-bit float GeoTIFF.
pub fn write_geotiff(raster: &Raster) -> Result<Vec<u8>> {
    let (rows, cols) = raster.shape();
    ensure!(rows > 0 && cols > 0, HazardError::InvalidRaster("cannot encode an empty raster".into()));
    let transform = raster.transform();
    ensure!(
        transform.is_axis_aligned(),
        HazardError::InvalidRaster("rotated grids are not supported by the GeoTIFF writer".into())
    );

    let data = raster.data().iter().map(|&v| v as f32).collect::<Vec<_>>();

    let scale = [transform.pixel_width, -transform.pixel_height, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0];

    let mut out = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut out)
            .context("[raster::geotiff] failed to create encoder")?;
        let mut image = encoder.new_image::<Gray32Float>(cols as u32, rows as u32)
            .context("[raster::geotiff] failed to create image")?;

        image.encoder().write_tag(tag(MODEL_PIXEL_SCALE), &scale[..])?;
        image.encoder().write_tag(tag(MODEL_TIEPOINT), &tiepoint[..])?;
        if let Some(crs) = raster.crs() {
            let keys = geo_key_directory(crs)?;
            image.encoder().write_tag(tag(GEO_KEY_DIRECTORY), &keys[..])?;
        }
        if let Some(nodata) = raster.nodata() {
            image.encoder().write_tag(tag(GDAL_NODATA), nodata.to_string().as_str())?;
        }

        image.write_data(&data)
            .context("[raster::geotiff] failed to write image data")?;
    }

    Ok(out.into_inner())
}

/// Minimal GeoKeyDirectory declaring model type, PixelIsArea, and the EPSG code.
fn geo_key_directory(crs: Crs) -> Result<Vec<u16>> {
    let code = u16::try_from(crs.epsg())
        .with_context(|| format!("[raster::geotiff] EPSG code {} does not fit a GeoKey", crs.epsg()))?;
    let (model_type, crs_key) = if crs.is_geographic() {
        (2, GEOGRAPHIC_TYPE_KEY)
    } else {
        (1, PROJECTED_CS_TYPE_KEY)
    };

    Ok(vec![
        1, 1, 0, 3,
        GT_MODEL_TYPE_KEY, 0, 1, model_type,
        GT_RASTER_TYPE_KEY, 0, 1, 1,
        crs_key, 0, 1, code,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Raster {
        Raster::new(
            ndarray::array![[1.5, 2.0, -1.0], [0.0, 7.25, 3.0]],
            GeoTransform::new(25.0, -10.0, 0.25, -0.25),
            Some(Crs::WGS84),
            Some(-1.0),
        )
    }

    #[test]
    fn write_then_read_keeps_georeferencing() {
        let raster = sample();
        let decoded = read_geotiff(&write_geotiff(&raster).unwrap()).unwrap();

        assert_eq!(decoded.shape(), (2, 3));
        assert!(decoded.transform().approx_eq(raster.transform()));
        assert_eq!(decoded.crs(), Some(Crs::WGS84));
        assert_eq!(decoded.nodata(), Some(-1.0));
        assert_eq!(decoded.get(1, 1), Some(7.25));
        assert_eq!(decoded.get(0, 2), None);
    }

    #[test]
    fn projected_crs_round_trips() {
        let raster = sample().with_crs(Crs(32735));
        let decoded = read_geotiff(&write_geotiff(&raster).unwrap()).unwrap();
        assert_eq!(decoded.crs(), Some(Crs(32735)));
    }

    #[test]
    fn raster_without_crs_decodes_as_undefined() {
        let raster = Raster::new(ndarray::Array2::zeros((1, 1)), GeoTransform::default(), None, None);
        let decoded = read_geotiff(&write_geotiff(&raster).unwrap()).unwrap();
        assert_eq!(decoded.crs(), None);
    }

    #[test]
    fn garbage_bytes_fail() {
        assert!(read_geotiff(b"not a tiff").is_err());
    }

    /// Float32 GeoTIFF written tag by tag, for headers the writer never produces.
    fn encode_f32(data: &[f32], cols: u32, rows: u32, nodata: &str, raster_type: u16) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut out).unwrap();
            let mut image = encoder.new_image::<Gray32Float>(cols, rows).unwrap();
            image.encoder().write_tag(tag(MODEL_PIXEL_SCALE), &[1.0f64, 1.0, 0.0][..]).unwrap();
            image.encoder().write_tag(tag(MODEL_TIEPOINT), &[0.0f64, 0.0, 0.0, 10.0, 20.0, 0.0][..]).unwrap();
            let keys: [u16; 12] = [1, 1, 0, 2, GT_RASTER_TYPE_KEY, 0, 1, raster_type, GEOGRAPHIC_TYPE_KEY, 0, 1, 4326];
            image.encoder().write_tag(tag(GEO_KEY_DIRECTORY), &keys[..]).unwrap();
            image.encoder().write_tag(tag(GDAL_NODATA), nodata).unwrap();
            image.write_data(data).unwrap();
        }
        out.into_inner()
    }

    #[test]
    fn long_float32_sentinel_matches_its_cells() {
        let bytes = encode_f32(&[f32::MIN, 5.0], 2, 1, "-3.40282346638529e+38", 1);
        let raster = read_geotiff(&bytes).unwrap();

        assert_eq!(raster.nodata(), Some(f32::MIN as f64));
        assert_eq!(raster.get(0, 0), None);
        assert_eq!(raster.get(0, 1), Some(5.0));
    }

    #[test]
    fn pixel_is_point_shifts_origin_half_a_cell() {
        let area = read_geotiff(&encode_f32(&[1.0], 1, 1, "-9999", 1)).unwrap();
        assert_eq!((area.transform().origin_x, area.transform().origin_y), (10.0, 20.0));

        let point = read_geotiff(&encode_f32(&[1.0], 1, 1, "-9999", 2)).unwrap();
        assert_eq!((point.transform().origin_x, point.transform().origin_y), (9.5, 20.5));
        assert_eq!(point.crs(), Some(Crs::WGS84));
    }
}
