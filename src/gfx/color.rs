//! Colors and the device color spaces the interpreter understands.

/// An RGB color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };

    pub fn rgb(r: f64, g: f64, b: f64) -> Color {
        Color {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
        }
    }

    pub fn gray(v: f64) -> Color {
        Color::rgb(v, v, v)
    }

    /// CMYK to RGB: ink coverage subtracts from the paper white left after
    /// the key plate.
    pub fn cmyk(c: f64, m: f64, y: f64, k: f64) -> Color {
        let v = 1.0 - k.clamp(0.0, 1.0);
        Color::rgb(v * (1.0 - c), v * (1.0 - m), v * (1.0 - y))
    }

    /// Linear interpolation between two colors, `t` in `[0, 1]`.
    pub fn lerp(&self, other: &Color, t: f64) -> Color {
        Color::rgb(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }

    /// Pack into a premultiplied ARGB32 word.
    pub fn to_argb(&self, alpha: f64) -> u32 {
        let a = (alpha.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
        let pm = |v: f64| (v * alpha.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
        (a << 24) | (pm(self.r) << 16) | (pm(self.g) << 8) | pm(self.b)
    }
}

/// Device color spaces selectable with `CS`/`cs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Colorspace {
    DeviceGray,
    #[default]
    DeviceRgb,
    DeviceCmyk,
}

impl Colorspace {
    pub fn from_name(name: &str) -> Option<Colorspace> {
        match name {
            "DeviceGray" | "G" | "CalGray" => Some(Colorspace::DeviceGray),
            "DeviceRGB" | "RGB" | "CalRGB" => Some(Colorspace::DeviceRgb),
            "DeviceCMYK" | "CMYK" => Some(Colorspace::DeviceCmyk),
            _ => None,
        }
    }

    pub fn components(&self) -> usize {
        match self {
            Colorspace::DeviceGray => 1,
            Colorspace::DeviceRgb => 3,
            Colorspace::DeviceCmyk => 4,
        }
    }

    /// Interpret `comps` (length per [`Self::components`]) as a color.
    /// Short operand lists fall back to black, matching the permissive
    /// operator policy.
    pub fn color(&self, comps: &[f64]) -> Color {
        match (self, comps) {
            (Colorspace::DeviceGray, [v, ..]) => Color::gray(*v),
            (Colorspace::DeviceRgb, [r, g, b, ..]) => Color::rgb(*r, *g, *b),
            (Colorspace::DeviceCmyk, [c, m, y, k, ..]) => Color::cmyk(*c, *m, *y, *k),
            _ => Color::BLACK,
        }
    }
}
