//! The raster output buffer: premultiplied ARGB32 pixels.

use super::error::{Error, Result};

/// Hard cap on buffer size. Renders that would exceed this fail before any
/// allocation happens.
pub const MAX_PIXELS: u64 = 20_000_000;

/// A fixed-size pixel buffer, `width * height` premultiplied ARGB32 words
/// (`width * height * 4` bytes). Created fresh per render call and handed
/// to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl Buffer {
    pub fn new(width: u32, height: u32) -> Result<Buffer> {
        if width == 0 || height == 0 {
            return Err(Error::argument(format!(
                "degenerate buffer size {width}x{height}"
            )));
        }
        if u64::from(width) * u64::from(height) > MAX_PIXELS {
            return Err(Error::limit(format!(
                "buffer {width}x{height} exceeds {MAX_PIXELS} pixels"
            )));
        }
        Ok(Buffer {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    pub fn fill(&mut self, argb: u32) {
        self.pixels.fill(argb);
    }

    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, argb: u32) {
        self.pixels[y as usize * self.width as usize + x as usize] = argb;
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u32] {
        let w = self.width as usize;
        let off = y as usize * w;
        &mut self.pixels[off..off + w]
    }

    /// Source-over blend of a premultiplied ARGB word onto one pixel.
    pub fn blend(&mut self, x: u32, y: u32, src: u32) {
        let sa = src >> 24;
        if sa == 255 {
            self.set(x, y, src);
            return;
        }
        if sa == 0 {
            return;
        }
        let dst = self.get(x, y);
        let inv = 255 - sa;
        let blend_ch = |s: u32, d: u32| s + mul_255(d, inv);
        let out = (blend_ch(sa, dst >> 24).min(255) << 24)
            | (blend_ch((src >> 16) & 0xff, (dst >> 16) & 0xff).min(255) << 16)
            | (blend_ch((src >> 8) & 0xff, (dst >> 8) & 0xff).min(255) << 8)
            | blend_ch(src & 0xff, dst & 0xff).min(255);
        self.set(x, y, out);
    }

    /// Convert to straight-alpha RGBA bytes, the layout PNG encoders want.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 4);
        for &px in &self.pixels {
            let a = px >> 24;
            let un = |v: u32| {
                if a == 0 || a == 255 {
                    v as u8
                } else {
                    ((v * 255 + a / 2) / a).min(255) as u8
                }
            };
            out.push(un((px >> 16) & 0xff));
            out.push(un((px >> 8) & 0xff));
            out.push(un(px & 0xff));
            out.push(a as u8);
        }
        out
    }
}

/// `(a * b) / 255` with rounding, the standard 8-bit multiply.
#[inline]
pub fn mul_255(a: u32, b: u32) -> u32 {
    let t = a * b + 128;
    (t + (t >> 8)) >> 8
}
