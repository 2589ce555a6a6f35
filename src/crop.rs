//! Crop geometry and the fixed set of aspect ratios.

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::encoder::Surface;
use crate::error::{CompressError, Result};

/// Share of each side covered by the default crop box.
pub const AUTO_CROP_AREA: f64 = 0.8;

lazy_static! {
    static ref GEOMETRY: Regex = Regex::new(r"^(\d+),(\d+),(\d+)x(\d+)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    Free,
    Square,
    FourThree,
    SixteenNine,
}

// Accepts both the display form and the value the upload page sends.
const RATIO_NAMES: &[(&str, AspectRatio)] = &[
    ("free", AspectRatio::Free),
    ("NaN", AspectRatio::Free),
    ("1:1", AspectRatio::Square),
    ("1", AspectRatio::Square),
    ("4:3", AspectRatio::FourThree),
    ("4/3", AspectRatio::FourThree),
    ("16:9", AspectRatio::SixteenNine),
    ("16/9", AspectRatio::SixteenNine),
];

impl AspectRatio {
    /// Width over height, `None` when unconstrained.
    pub fn ratio(&self) -> Option<f64> {
        match self {
            AspectRatio::Free => None,
            AspectRatio::Square => Some(1.0),
            AspectRatio::FourThree => Some(4.0 / 3.0),
            AspectRatio::SixteenNine => Some(16.0 / 9.0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Free => "free",
            AspectRatio::Square => "1:1",
            AspectRatio::FourThree => "4:3",
            AspectRatio::SixteenNine => "16:9",
        }
    }
}

impl FromStr for AspectRatio {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim();
        RATIO_NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, ratio)| *ratio)
            .ok_or_else(|| CompressError::UnknownAspectRatio(key.to_string()))
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel rectangle inside the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

// Largest (w, h) not exceeding the given size that has the requested ratio.
fn fit_ratio(width: u32, height: u32, ratio: Option<f64>) -> (u32, u32) {
    let Some(r) = ratio else {
        return (width, height);
    };
    let (w, h) = (width as f64, height as f64);
    let (fw, fh) = if w / h > r { (h * r, h) } else { (w, w / r) };
    (
        (fw.round() as u32).clamp(1, width.max(1)),
        (fh.round() as u32).clamp(1, height.max(1)),
    )
}

impl CropBox {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Centered box over 80% of each side, trimmed to `aspect`.
    pub fn auto(width: u32, height: u32, aspect: AspectRatio) -> Self {
        let bw = ((width as f64 * AUTO_CROP_AREA).round() as u32).max(1);
        let bh = ((height as f64 * AUTO_CROP_AREA).round() as u32).max(1);
        let (bw, bh) = fit_ratio(bw, bh, aspect.ratio());
        Self {
            x: width.saturating_sub(bw) / 2,
            y: height.saturating_sub(bh) / 2,
            width: bw,
            height: bh,
        }
    }

    /// Refits the box to `aspect` around its centre, staying inside the image.
    pub fn constrain(&self, aspect: AspectRatio, image_width: u32, image_height: u32) -> Self {
        let w = self.width.min(image_width);
        let h = self.height.min(image_height);
        let (bw, bh) = fit_ratio(w, h, aspect.ratio());

        let cx = self.x as f64 + self.width as f64 / 2.0;
        let cy = self.y as f64 + self.height as f64 / 2.0;
        let x = (cx - bw as f64 / 2.0).round().max(0.0) as u32;
        let y = (cy - bh as f64 / 2.0).round().max(0.0) as u32;

        Self {
            x: x.min(image_width.saturating_sub(bw)),
            y: y.min(image_height.saturating_sub(bh)),
            width: bw,
            height: bh,
        }
    }

    pub fn validate(&self, image_width: u32, image_height: u32) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CompressError::InvalidCrop(format!("{} is empty", self)));
        }
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        match (right, bottom) {
            (Some(r), Some(b)) if r <= image_width && b <= image_height => Ok(()),
            _ => Err(CompressError::InvalidCrop(format!(
                "{} leaves the {}x{} image",
                self, image_width, image_height
            ))),
        }
    }
}

impl FromStr for CropBox {
    type Err = CompressError;

    /// Parses `X,Y,WxH`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CompressError::InvalidCrop(format!("expected X,Y,WxH, got {:?}", s));
        let caps = GEOMETRY.captures(s.trim()).ok_or_else(invalid)?;
        let field = |i: usize| -> Result<u32> { caps[i].parse().map_err(|_| invalid()) };
        Ok(Self {
            x: field(1)?,
            y: field(2)?,
            width: field(3)?,
            height: field(4)?,
        })
    }
}

impl fmt::Display for CropBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Copies the boxed pixels out of `surface`.
pub fn crop(surface: &Surface, crop_box: &CropBox) -> Result<Surface> {
    crop_box.validate(surface.width(), surface.height())?;
    Ok(surface.crop_imm(crop_box.x, crop_box.y, crop_box.width, crop_box.height))
}
