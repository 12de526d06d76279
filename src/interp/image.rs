//! Image XObject decoding.
//!
//! Produces straight-alpha RGBA for the canvas. Supported sample formats
//! are 8-bit DeviceRGB and DeviceGray, arriving raw, Flate-compressed
//! (with optional PNG predictors), or as DCT (JPEG) data. Soft masks and
//! color-key masks become the alpha channel.

use bytes::Bytes;

use crate::gfx::canvas::Image;
use crate::pdf::file::PdfFile;
use crate::pdf::object::{Dict, Object, Stream};

/// Decode an image XObject, or `None` when the format is out of scope.
pub fn decode(file: &PdfFile, stream: &Stream) -> Option<Image> {
    let dict = &stream.dict;
    if int_entry(file, dict, "ImageMask").unwrap_or(0) != 0 {
        return None;
    }
    if has_filter(file, dict, "DCTDecode") || has_filter(file, dict, "DCT") {
        return decode_jpeg(file, stream);
    }

    let width = int_entry(file, dict, "Width")? as usize;
    let height = int_entry(file, dict, "Height")? as usize;
    if width == 0 || height == 0 || int_entry(file, dict, "BitsPerComponent")? != 8 {
        return None;
    }
    let components = match colorspace_name(file, dict)? {
        "DeviceRGB" | "CalRGB" => 3,
        "DeviceGray" | "CalGray" => 1,
        _ => return None,
    };

    let mut samples = file.decode_stream(stream).to_vec();
    if let Some(predictor) = predictor_entry(file, dict)
        && predictor >= 10
    {
        samples = png_unfilter(&samples, width, components)?;
    }
    if samples.len() < width * height * components {
        return None;
    }

    let color_key = color_key_ranges(file, dict, components);
    let mut rgba = Vec::with_capacity(width * height * 4);
    for i in 0..width * height {
        let sample = &samples[i * components..(i + 1) * components];
        let masked = color_key
            .as_ref()
            .is_some_and(|ranges| sample.iter().zip(ranges).all(|(&v, r)| r.0 <= v && v <= r.1));
        let (r, g, b) = match components {
            3 => (sample[0], sample[1], sample[2]),
            _ => (sample[0], sample[0], sample[0]),
        };
        rgba.extend_from_slice(&[r, g, b, if masked { 0 } else { 255 }]);
    }

    if let Some(mask) = soft_mask(file, dict) {
        apply_soft_mask(&mut rgba, width, height, &mask);
    }
    Image::new(width as u32, height as u32, Bytes::from(rgba))
}

fn decode_jpeg(file: &PdfFile, stream: &Stream) -> Option<Image> {
    let decoded =
        image::load_from_memory_with_format(&stream.data, image::ImageFormat::Jpeg).ok()?;
    let rgba = decoded.to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());
    let mut bytes = rgba.into_raw();
    if let Some(mask) = soft_mask(file, &stream.dict) {
        apply_soft_mask(&mut bytes, width as usize, height as usize, &mask);
    }
    Image::new(width, height, Bytes::from(bytes))
}

/// The /SMask stream decoded to one alpha byte per pixel, with its own
/// dimensions.
struct SoftMask {
    width: usize,
    height: usize,
    alpha: Vec<u8>,
}

fn soft_mask(file: &PdfFile, dict: &Dict) -> Option<SoftMask> {
    let obj = file.get(dict, "SMask")?;
    let stream = obj.as_stream()?;
    let mdict = &stream.dict;
    let width = int_entry(file, mdict, "Width")? as usize;
    let height = int_entry(file, mdict, "Height")? as usize;
    if width == 0 || height == 0 || int_entry(file, mdict, "BitsPerComponent")? != 8 {
        return None;
    }
    let mut alpha = file.decode_stream(stream).to_vec();
    if let Some(predictor) = predictor_entry(file, mdict)
        && predictor >= 10
    {
        alpha = png_unfilter(&alpha, width, 1)?;
    }
    if alpha.len() < width * height {
        return None;
    }
    alpha.truncate(width * height);
    Some(SoftMask { width, height, alpha })
}

/// Nearest-neighbor sampling bridges masks whose dimensions differ from
/// the image.
fn apply_soft_mask(rgba: &mut [u8], width: usize, height: usize, mask: &SoftMask) {
    for y in 0..height {
        let my = y * mask.height / height;
        for x in 0..width {
            let mx = x * mask.width / width;
            rgba[(y * width + x) * 4 + 3] = mask.alpha[my * mask.width + mx];
        }
    }
}

/// /Mask as a color-key array: per-component (min, max) ranges.
fn color_key_ranges(file: &PdfFile, dict: &Dict, components: usize) -> Option<Vec<(u8, u8)>> {
    let arr = file.get(dict, "Mask")?.as_array()?;
    if arr.len() != 2 * components {
        return None;
    }
    let mut ranges = Vec::with_capacity(components);
    for pair in arr.chunks(2) {
        let lo = pair[0].as_int()?.clamp(0, 255) as u8;
        let hi = pair[1].as_int()?.clamp(0, 255) as u8;
        ranges.push((lo, hi));
    }
    Some(ranges)
}

fn int_entry(file: &PdfFile, dict: &Dict, key: &str) -> Option<i64> {
    file.get(dict, key)?.as_int()
}

fn colorspace_name<'a>(file: &'a PdfFile, dict: &'a Dict) -> Option<&'a str> {
    match file.get(dict, "ColorSpace")? {
        Object::Name(n) => Some(n.as_str()),
        _ => None,
    }
}

fn has_filter(file: &PdfFile, dict: &Dict, name: &str) -> bool {
    match file.get(dict, "Filter").map(|o| file.resolve(o)) {
        Some(Object::Name(n)) => n.as_str() == name,
        Some(Object::Array(items)) => {
            items.iter().any(|o| file.resolve(o).as_name().is_some_and(|n| n.as_str() == name))
        }
        _ => false,
    }
}

fn predictor_entry(file: &PdfFile, dict: &Dict) -> Option<i64> {
    let parms = file
        .get(dict, "DecodeParms")
        .or_else(|| file.get(dict, "DP"))
        .map(|o| file.resolve(o))?;
    let parms = match parms {
        Object::Array(items) => items.first().map(|o| file.resolve(o))?,
        other => other,
    };
    int_entry(file, parms.as_dict()?, "Predictor")
}

/// Undo per-row PNG filters (types 0 to 4) on 8-bit samples.
fn png_unfilter(data: &[u8], columns: usize, colors: usize) -> Option<Vec<u8>> {
    let stride = columns * colors;
    if stride == 0 {
        return None;
    }
    let rows = data.len() / (stride + 1);
    let mut out = Vec::with_capacity(rows * stride);
    let mut prev = vec![0u8; stride];
    for row in data.chunks_exact(stride + 1) {
        let filter = row[0];
        let mut cur = row[1..].to_vec();
        for i in 0..stride {
            let left = if i >= colors { cur[i - colors] } else { 0 };
            let up = prev[i];
            let up_left = if i >= colors { prev[i - colors] } else { 0 };
            cur[i] = cur[i].wrapping_add(match filter {
                0 => 0,
                1 => left,
                2 => up,
                3 => (((left as u16) + (up as u16)) / 2) as u8,
                4 => paeth(left, up, up_left),
                _ => return None,
            });
        }
        out.extend_from_slice(&cur);
        prev = cur;
    }
    Some(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
