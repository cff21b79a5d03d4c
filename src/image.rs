//! Raster export of Pixel Data and raster import into a new dataset.
//!
//! Export handles single-sample greyscale images only, first frame, no
//! resampling.

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageBuffer};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::{CodecError, Result};
use crate::model::{DataElement, Dataset, DicomValue, TagId, Vr};
use crate::validator::{
    BITS_ALLOCATED, BITS_STORED, COLUMNS, HIGH_BIT, PIXEL_DATA, PIXEL_REPRESENTATION, ROWS,
};
use crate::writer::{self, SECONDARY_CAPTURE_IMAGE_STORAGE, SOP_CLASS_UID, SOP_INSTANCE_UID};

pub const SAMPLES_PER_PIXEL: TagId = TagId::new(0x0028, 0x0002);
pub const PHOTOMETRIC_INTERPRETATION: TagId = TagId::new(0x0028, 0x0004);
pub const WINDOW_CENTER: TagId = TagId::new(0x0028, 0x1050);
pub const WINDOW_WIDTH: TagId = TagId::new(0x0028, 0x1051);
pub const RESCALE_INTERCEPT: TagId = TagId::new(0x0028, 0x1052);
pub const RESCALE_SLOPE: TagId = TagId::new(0x0028, 0x1053);

const MONOCHROME1: &str = "MONOCHROME1";
const MONOCHROME2: &str = "MONOCHROME2";

struct PixelModule<'a> {
    rows: u32,
    columns: u32,
    bits_allocated: u16,
    bits_stored: u16,
    signed: bool,
    inverted: bool,
    data: &'a [u8],
}

fn required_integer(dataset: &Dataset, tag: TagId, name: &'static str) -> Result<i64> {
    dataset
        .value(tag)
        .and_then(DicomValue::first_integer)
        .ok_or(CodecError::MissingElement { tag, name })
}

impl<'a> PixelModule<'a> {
    fn from_dataset(dataset: &'a Dataset) -> Result<Self> {
        let rows = required_integer(dataset, ROWS, "Rows")?;
        let columns = required_integer(dataset, COLUMNS, "Columns")?;
        let bits_allocated = required_integer(dataset, BITS_ALLOCATED, "BitsAllocated")?;

        let samples = dataset
            .value(SAMPLES_PER_PIXEL)
            .and_then(DicomValue::first_integer)
            .unwrap_or(1);
        if samples != 1 {
            return Err(CodecError::UnsupportedImage(format!(
                "{samples} samples per pixel"
            )));
        }

        let photometric = dataset
            .value(PHOTOMETRIC_INTERPRETATION)
            .and_then(DicomValue::as_text)
            .unwrap_or(MONOCHROME2);
        if photometric != MONOCHROME1 && photometric != MONOCHROME2 {
            return Err(CodecError::UnsupportedImage(format!(
                "photometric interpretation {photometric}"
            )));
        }

        let bits_allocated = match bits_allocated {
            8 => 8u16,
            16 => 16u16,
            other => {
                return Err(CodecError::UnsupportedImage(format!(
                    "{other} bits allocated"
                )))
            }
        };
        let bits_stored = dataset
            .value(BITS_STORED)
            .and_then(DicomValue::first_integer)
            .and_then(|bits| u16::try_from(bits).ok())
            .filter(|&bits| bits > 0 && bits <= bits_allocated)
            .unwrap_or(bits_allocated);
        let signed = dataset
            .value(PIXEL_REPRESENTATION)
            .and_then(DicomValue::first_integer)
            == Some(1);

        let data = dataset
            .value(PIXEL_DATA)
            .and_then(DicomValue::as_bytes)
            .ok_or(CodecError::MissingElement {
                tag: PIXEL_DATA,
                name: "PixelData",
            })?;

        let (Ok(rows), Ok(columns)) = (u32::try_from(rows), u32::try_from(columns)) else {
            return Err(CodecError::UnsupportedImage(format!(
                "{columns}x{rows} image"
            )));
        };

        Ok(Self {
            rows,
            columns,
            bits_allocated,
            bits_stored,
            signed,
            inverted: photometric == MONOCHROME1,
            data,
        })
    }

    /// Stored values of the first frame, masked to the stored bits and sign
    /// extended.
    fn samples(&self) -> Result<Vec<i32>> {
        let width = usize::from(self.bits_allocated / 8);
        let needed = (self.rows as usize)
            .checked_mul(self.columns as usize)
            .and_then(|count| count.checked_mul(width))
            .ok_or_else(|| {
                CodecError::invalid_value(
                    PIXEL_DATA,
                    Vr::OW,
                    format!("{}x{} image is too large", self.columns, self.rows),
                )
            })?;

        if self.data.len() < needed {
            return Err(CodecError::invalid_value(
                PIXEL_DATA,
                Vr::OW,
                format!("{} bytes of pixel data, {needed} expected", self.data.len()),
            ));
        }

        let mask = (1u32 << self.bits_stored) - 1;
        let sign_bit = 1u32 << (self.bits_stored - 1);

        Ok(self.data[..needed]
            .chunks_exact(width)
            .map(|chunk| {
                let raw = match chunk {
                    [lo, hi] => u32::from(u16::from_le_bytes([*lo, *hi])),
                    [byte] => u32::from(*byte),
                    _ => 0,
                } & mask;

                if self.signed && raw & sign_bit != 0 {
                    raw as i32 - (1i32 << self.bits_stored)
                } else {
                    raw as i32
                }
            })
            .collect())
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Rescale, window, normalise to 0..255.
pub fn render(dataset: &Dataset) -> Result<GrayImage> {
    let module = PixelModule::from_dataset(dataset)?;

    let float = |tag| dataset.value(tag).and_then(DicomValue::first_float);
    let slope = float(RESCALE_SLOPE).unwrap_or(1.0);
    let intercept = float(RESCALE_INTERCEPT).unwrap_or(0.0);

    let mut values: Vec<f64> = module
        .samples()?
        .into_iter()
        .map(|v| f64::from(v) * slope + intercept)
        .collect();

    if let (Some(center), Some(width), Some((data_min, data_max))) =
        (float(WINDOW_CENTER), float(WINDOW_WIDTH), min_max(&values))
    {
        if width > 0.0 {
            let range = data_max - data_min;
            for v in values.iter_mut() {
                *v = if *v <= center - width / 2.0 {
                    data_min
                } else if *v > center + width / 2.0 {
                    data_max
                } else {
                    (*v - center + width / 2.0) / width * range + data_min
                };
            }
        }
    }

    let (lo, hi) = min_max(&values).unwrap_or((0.0, 0.0));
    let span = hi - lo;
    let mut pixels: Vec<u8> = values
        .iter()
        .map(|v| {
            if span > 0.0 {
                ((v - lo) / span * 255.0).round() as u8
            } else {
                0
            }
        })
        .collect();

    if module.inverted {
        let max = pixels.iter().copied().max().unwrap_or(0);
        pixels.iter_mut().for_each(|v| *v = max - *v);
    }

    tracing::debug!(
        rows = module.rows,
        columns = module.columns,
        bits_allocated = module.bits_allocated,
        bits_stored = module.bits_stored,
        "rendered pixel data"
    );

    ImageBuffer::from_raw(module.columns, module.rows, pixels)
        .ok_or_else(|| CodecError::UnsupportedImage("pixel buffer does not fit the image".into()))
}

/// Renders and saves; the format follows the file extension.
pub fn export_image(dataset: &Dataset, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let image = render(dataset)?;
    image.save(path)?;

    tracing::info!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "exported image"
    );
    Ok(())
}

pub fn dataset_from_image(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let image = image::open(path)?;
    tracing::info!(path = %path.display(), "importing image");
    dataset_from_dynamic(&image)
}

pub fn dataset_from_dynamic(image: &DynamicImage) -> Result<Dataset> {
    match image {
        DynamicImage::ImageLuma8(gray) => {
            dataset_from_gray(gray.width(), gray.height(), 8, gray.as_raw().clone())
        }
        DynamicImage::ImageLuma16(gray) => {
            let bytes = gray.as_raw().iter().flat_map(|v| v.to_le_bytes()).collect();
            dataset_from_gray(gray.width(), gray.height(), 16, bytes)
        }
        other => Err(CodecError::UnsupportedImage(format!(
            "{:?} input, only greyscale rasters can be imported",
            other.color()
        ))),
    }
}

/// Builds a secondary-capture dataset around little-endian pixel bytes.
pub fn dataset_from_gray(width: u32, height: u32, bits: u16, pixels: Vec<u8>) -> Result<Dataset> {
    let (Ok(columns), Ok(rows)) = (u16::try_from(width), u16::try_from(height)) else {
        return Err(CodecError::UnsupportedImage(format!(
            "{width}x{height} exceeds the largest representable image"
        )));
    };
    let pixel_vr = match bits {
        8 => Vr::OB,
        16 => Vr::OW,
        other => {
            return Err(CodecError::UnsupportedImage(format!("{other}-bit samples")))
        }
    };
    let expected = usize::from(rows) * usize::from(columns) * usize::from(bits / 8);
    if pixels.len() != expected {
        return Err(CodecError::UnsupportedImage(format!(
            "{} pixel bytes for a {width}x{height} image",
            pixels.len()
        )));
    }

    let now = OffsetDateTime::now_utc();
    let content_date = now.format(format_description!("[year][month][day]"))?;
    let content_time =
        now.format(format_description!("[hour][minute][second].[subsecond digits:6]"))?;

    fn text(s: &str) -> DicomValue {
        DicomValue::Text(s.to_string())
    }
    fn decimals(values: &[&str]) -> DicomValue {
        DicomValue::Strings(values.iter().map(|s| s.to_string()).collect())
    }
    fn short(v: u16) -> DicomValue {
        DicomValue::U16(vec![v])
    }

    let dataset: Dataset = [
        DataElement::new(SOP_CLASS_UID, Vr::UI, text(SECONDARY_CAPTURE_IMAGE_STORAGE)),
        DataElement::new(SOP_INSTANCE_UID, Vr::UI, text(&writer::generate_uid())),
        DataElement::new((0x0008, 0x0023), Vr::DA, text(&content_date)),
        DataElement::new((0x0008, 0x0033), Vr::TM, text(&content_time)),
        DataElement::new((0x0008, 0x0060), Vr::CS, text("OT")),
        DataElement::new((0x0010, 0x0010), Vr::PN, text("")),
        DataElement::new((0x0010, 0x0020), Vr::LO, text("")),
        DataElement::new((0x0020, 0x000D), Vr::UI, text(&writer::generate_uid())),
        DataElement::new((0x0020, 0x000E), Vr::UI, text(&writer::generate_uid())),
        DataElement::new((0x0020, 0x0020), Vr::CS, text("")),
        DataElement::new((0x0020, 0x0032), Vr::DS, decimals(&["0.0", "0.0", "0.0"])),
        DataElement::new(
            (0x0020, 0x0037),
            Vr::DS,
            decimals(&["1.0", "0.0", "0.0", "0.0", "1.0", "0.0"]),
        ),
        DataElement::new((0x0020, 0x1040), Vr::LO, text("")),
        DataElement::new(SAMPLES_PER_PIXEL, Vr::US, short(1)),
        DataElement::new(PHOTOMETRIC_INTERPRETATION, Vr::CS, text(MONOCHROME2)),
        DataElement::new(ROWS, Vr::US, short(rows)),
        DataElement::new(COLUMNS, Vr::US, short(columns)),
        DataElement::new(BITS_ALLOCATED, Vr::US, short(bits)),
        DataElement::new(BITS_STORED, Vr::US, short(bits)),
        DataElement::new(HIGH_BIT, Vr::US, short(bits - 1)),
        DataElement::new(PIXEL_REPRESENTATION, Vr::US, short(0)),
        DataElement::new(PIXEL_DATA, pixel_vr, DicomValue::Bytes(pixels)),
    ]
    .into_iter()
    .collect();

    tracing::debug!(rows, columns, bits, "built secondary capture dataset");
    Ok(dataset)
}
