//! Shading dictionaries and the function objects behind them.
//!
//! Axial (type 2) and radial (type 3) shadings are flattened into a
//! sampled color ramp so the canvas backends never see PDF functions.
//! Exponential (type 2) and stitching (type 3) functions are evaluated
//! exactly; sampled and PostScript functions are out of scope and make
//! the whole shading a no-op.

use crate::gfx::canvas::{Shading, ShadingKind};
use crate::gfx::color::Colorspace;
use crate::gfx::geometry::Point;
use crate::pdf::file::PdfFile;
use crate::pdf::object::{Dict, Object, number_array};

/// Ramp resolution. Stitching boundaries not on a sample point shift by
/// at most half a step, invisible at typical zoom.
const SAMPLES: usize = 32;

pub fn build(file: &PdfFile, dict: &Dict) -> Option<Shading> {
    let shading_type = file.get(dict, "ShadingType")?.as_int()?;
    let coords = number_array(file.get(dict, "Coords").map(|o| file.resolve(o))?)?;
    let kind = match shading_type {
        2 if coords.len() >= 4 => ShadingKind::Axial {
            p0: Point::new(coords[0], coords[1]),
            p1: Point::new(coords[2], coords[3]),
        },
        3 if coords.len() >= 6 => ShadingKind::Radial {
            p0: Point::new(coords[0], coords[1]),
            r0: coords[2],
            p1: Point::new(coords[3], coords[4]),
            r1: coords[5],
        },
        _ => return None,
    };

    let space = file
        .get(dict, "ColorSpace")
        .map(|o| file.resolve(o))
        .and_then(|o| o.as_name())
        .and_then(|n| Colorspace::from_name(n.as_str()))
        .unwrap_or(Colorspace::DeviceRgb);

    let domain = file
        .get(dict, "Domain")
        .and_then(number_array)
        .filter(|d| d.len() >= 2)
        .unwrap_or_else(|| vec![0.0, 1.0]);

    let (extend_start, extend_end) = match file.get(dict, "Extend").map(|o| file.resolve(o)) {
        Some(Object::Array(items)) if items.len() >= 2 => (
            items[0].as_bool().unwrap_or(false),
            items[1].as_bool().unwrap_or(false),
        ),
        _ => (false, false),
    };

    let function = function_entry(file, dict)?;
    let mut stops = Vec::with_capacity(SAMPLES + 1);
    for k in 0..=SAMPLES {
        let f = k as f64 / SAMPLES as f64;
        let t = domain[0] + (domain[1] - domain[0]) * f;
        let comps = eval(file, function, t, 0)?;
        stops.push((f, space.color(&comps)));
    }

    Some(Shading { kind, extend_start, extend_end, stops })
}

/// /Function may be a single function or a one-element array.
fn function_entry<'a>(file: &'a PdfFile, dict: &'a Dict) -> Option<&'a Object> {
    let obj = file.get(dict, "Function")?;
    match obj {
        Object::Array(items) => items.first().map(|o| file.resolve(o)),
        other => Some(other),
    }
}

/// Evaluate a function object at `t`. Returns the output components, or
/// `None` for function types outside 2 and 3.
fn eval(file: &PdfFile, func: &Object, t: f64, depth: usize) -> Option<Vec<f64>> {
    if depth > 8 {
        return None;
    }
    let dict = func.as_dict()?;
    let domain = file
        .get(dict, "Domain")
        .and_then(number_array)
        .filter(|d| d.len() >= 2)
        .unwrap_or_else(|| vec![0.0, 1.0]);
    let t = t.clamp(domain[0].min(domain[1]), domain[0].max(domain[1]));

    match file.get(dict, "FunctionType")?.as_int()? {
        2 => {
            let c0 = file.get(dict, "C0").and_then(number_array).unwrap_or_else(|| vec![0.0]);
            let c1 = file.get(dict, "C1").and_then(number_array).unwrap_or_else(|| vec![1.0]);
            let n = file.get(dict, "N").and_then(|o| o.as_real()).unwrap_or(1.0);
            if c0.len() != c1.len() {
                return None;
            }
            let f = t.powf(n);
            Some(c0.iter().zip(&c1).map(|(a, b)| a + f * (b - a)).collect())
        }
        3 => {
            let funcs = file.get(dict, "Functions").map(|o| file.resolve(o))?.as_array()?;
            let bounds = file.get(dict, "Bounds").and_then(number_array).unwrap_or_default();
            let encode = file.get(dict, "Encode").and_then(number_array).unwrap_or_default();
            if funcs.is_empty() || bounds.len() + 1 != funcs.len() {
                return None;
            }
            let mut idx = 0;
            while idx < bounds.len() && t >= bounds[idx] {
                idx += 1;
            }
            let low = if idx == 0 { domain[0] } else { bounds[idx - 1] };
            let high = if idx == bounds.len() { domain[1] } else { bounds[idx] };
            let (e0, e1) = match (encode.get(2 * idx), encode.get(2 * idx + 1)) {
                (Some(&a), Some(&b)) => (a, b),
                _ => (0.0, 1.0),
            };
            let f = if high > low { (t - low) / (high - low) } else { 0.0 };
            eval(file, file.resolve(&funcs[idx]), e0 + f * (e1 - e0), depth + 1)
        }
        _ => None,
    }
}
