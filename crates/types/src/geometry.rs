use serde::Serialize;

/// An axis-aligned rectangle in surface pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn zero() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
        }
    }

    /// Height over width, or `None` for a degenerate size.
    pub fn aspect_ratio(&self) -> Option<f32> {
        if self.width > 0.0 && self.height > 0.0 {
            Some(self.height / self.width)
        } else {
            None
        }
    }

    /// Scales the size down (never up past `max_scale`) so its width fits `max_width`,
    /// keeping the aspect ratio.
    pub fn fit_width(&self, max_width: f32, max_scale: f32) -> Size {
        if self.width <= 0.0 || self.height <= 0.0 || max_width <= 0.0 {
            return Size::zero();
        }
        let scale = (max_width / self.width).min(max_scale);
        Size::new(self.width * scale, self.height * scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_width_downscales() {
        let s = Size::new(400.0, 200.0).fit_width(100.0, 1.0);
        assert_eq!(s, Size::new(100.0, 50.0));
    }

    #[test]
    fn test_fit_width_respects_max_scale() {
        let s = Size::new(50.0, 100.0).fit_width(200.0, 1.0);
        assert_eq!(s, Size::new(50.0, 100.0));

        let s = Size::new(50.0, 100.0).fit_width(200.0, 2.0);
        assert_eq!(s, Size::new(100.0, 200.0));
    }

    #[test]
    fn test_degenerate_sizes() {
        assert!(Size::zero().aspect_ratio().is_none());
        assert_eq!(Size::new(0.0, 10.0).fit_width(100.0, 1.0), Size::zero());
    }
}
