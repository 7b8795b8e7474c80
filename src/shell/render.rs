//! Shell rendering utilities
//!
//! A small software canvas the shell surfaces paint into, plus icon loading.
//! Text is drawn as fixed-advance glyph cells; real font shaping is left to
//! the toolkit.

use image::{Rgba, RgbaImage};
use tessera_ipc::Rectangle;
use tracing::warn;

/// Horizontal advance of one character cell
pub const GLYPH_ADVANCE: i32 = 7;
const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 9;

/// Size of the generated fallback icon
pub const FALLBACK_ICON_SIZE: u32 = 20;

/// Straight-alpha color with components in 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::rgba(r, g, b, 1.0)
    }

    /// Unpack a 0xAARRGGBB value
    pub fn from_argb(color: u32) -> Self {
        Self {
            r: ((color >> 16) & 0xff) as f32 / 255.0,
            g: ((color >> 8) & 0xff) as f32 / 255.0,
            b: (color & 0xff) as f32 / 255.0,
            a: ((color >> 24) & 0xff) as f32 / 255.0,
        }
    }

    fn from_pixel(pixel: &Rgba<u8>) -> Self {
        let [r, g, b, a] = pixel.0;
        Self::rgba(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    pub fn to_pixel(self) -> Rgba<u8> {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgba([q(self.r), q(self.g), q(self.b), q(self.a)])
    }

    fn lerp(self, other: Color, t: f32) -> Color {
        Color {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    /// Porter-Duff OVER of `self` onto `dst`
    fn over(self, dst: Color) -> Color {
        let out_a = self.a + dst.a * (1.0 - self.a);
        if out_a <= 0.0 {
            return Color::rgba(0.0, 0.0, 0.0, 0.0);
        }
        let mix = |s: f32, d: f32| (s * self.a + d * dst.a * (1.0 - self.a)) / out_a;
        Color {
            r: mix(self.r, dst.r),
            g: mix(self.g, dst.g),
            b: mix(self.b, dst.b),
            a: out_a,
        }
    }
}

/// Width of `text` as laid out by [`Canvas::draw_text`]
pub fn text_width(text: &str) -> i32 {
    text.chars().count() as i32 * GLYPH_ADVANCE
}

/// One paint pass worth of pixels
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    /// A fully transparent canvas
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        Color::from_pixel(self.image.get_pixel(x, y))
    }

    /// Replace every pixel (SOURCE operator)
    pub fn fill(&mut self, color: Color) {
        let pixel = color.to_pixel();
        for p in self.image.pixels_mut() {
            *p = pixel;
        }
    }

    fn blend(&mut self, x: i32, y: i32, color: Color) {
        if x < 0 || y < 0 || x >= self.image.width() as i32 || y >= self.image.height() as i32 {
            return;
        }
        let dst = self.image.get_pixel_mut(x as u32, y as u32);
        *dst = color.over(Color::from_pixel(dst)).to_pixel();
    }

    /// Blend a rectangle of `color` over the canvas
    pub fn fill_rect(&mut self, rect: Rectangle, color: Color) {
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                self.blend(x, y, color);
            }
        }
    }

    /// Blend `src` over the canvas with its top-left corner at (x, y)
    pub fn draw_image(&mut self, src: &RgbaImage, x: i32, y: i32) {
        for (sx, sy, pixel) in src.enumerate_pixels() {
            self.blend(x + sx as i32, y + sy as i32, Color::from_pixel(pixel));
        }
    }

    /// Paint white at `alpha` through the alpha channel of `mask`
    pub fn highlight(&mut self, mask: &RgbaImage, x: i32, y: i32, alpha: f32) {
        for (sx, sy, pixel) in mask.enumerate_pixels() {
            let coverage = pixel.0[3] as f32 / 255.0;
            self.blend(
                x + sx as i32,
                y + sy as i32,
                Color::rgba(1.0, 1.0, 1.0, alpha * coverage),
            );
        }
    }

    /// Draw `text` with its baseline at `baseline`, one cell per character
    pub fn draw_text(&mut self, x: i32, baseline: i32, text: &str, color: Color) {
        let mut pen = x;
        for ch in text.chars() {
            if !ch.is_whitespace() {
                self.fill_rect(
                    Rectangle::new(pen, baseline - GLYPH_HEIGHT, GLYPH_WIDTH, GLYPH_HEIGHT),
                    color,
                );
            }
            pen += GLYPH_ADVANCE;
        }
    }

    /// Stretch `src` over the whole canvas
    pub fn fill_scaled(&mut self, src: &RgbaImage) {
        let sx = src.width() as f32 / self.width() as f32;
        let sy = src.height() as f32 / self.height() as f32;
        self.fill_sampled(src, |x, y| (x as f32 * sx, y as f32 * sy));
    }

    /// Scale `src` uniformly by the smaller ratio so it covers the canvas,
    /// centred, cropping the overflow
    pub fn fill_scale_crop(&mut self, src: &RgbaImage) {
        let w = self.width() as f32;
        let h = self.height() as f32;
        let sx = src.width() as f32 / w;
        let sy = src.height() as f32 / h;
        let s = sx.min(sy);
        let tx = (src.width() as f32 - s * w) * 0.5;
        let ty = (src.height() as f32 - s * h) * 0.5;
        self.fill_sampled(src, |x, y| (tx + x as f32 * s, ty + y as f32 * s));
    }

    /// Repeat `src` from the top-left corner
    pub fn fill_tiled(&mut self, src: &RgbaImage) {
        let (w, h) = (src.width(), src.height());
        if w == 0 || h == 0 {
            return;
        }
        for (x, y, pixel) in self.image.enumerate_pixels_mut() {
            *pixel = *src.get_pixel(x % w, y % h);
        }
    }

    fn fill_sampled(&mut self, src: &RgbaImage, map: impl Fn(u32, u32) -> (f32, f32)) {
        if src.width() == 0 || src.height() == 0 {
            return;
        }
        let max_x = src.width() - 1;
        let max_y = src.height() - 1;
        for (x, y, pixel) in self.image.enumerate_pixels_mut() {
            let (u, v) = map(x, y);
            let u = (u.max(0.0) as u32).min(max_x);
            let v = (v.max(0.0) as u32).min(max_y);
            *pixel = *src.get_pixel(u, v);
        }
    }

    /// Fill a disc with a radial gradient running from `inner` to `radius`.
    ///
    /// `stops` are (offset, color) pairs sorted by offset; pixels closer than
    /// `inner` take the first stop.
    pub fn fill_radial_disc(
        &mut self,
        cx: f32,
        cy: f32,
        inner: f32,
        radius: f32,
        stops: &[(f32, Color)],
    ) {
        if stops.is_empty() || radius <= 0.0 {
            return;
        }
        let x0 = (cx - radius).floor().max(0.0) as i32;
        let y0 = (cy - radius).floor().max(0.0) as i32;
        let x1 = (cx + radius).ceil() as i32;
        let y1 = (cy + radius).ceil() as i32;
        let span = (radius - inner).max(f32::EPSILON);

        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                let d = (dx * dx + dy * dy).sqrt();
                if d > radius {
                    continue;
                }
                let t = ((d - inner) / span).clamp(0.0, 1.0);
                self.blend(x, y, gradient_at(stops, t));
            }
        }
    }
}

fn gradient_at(stops: &[(f32, Color)], t: f32) -> Color {
    let mut prev = stops[0];
    if t <= prev.0 {
        return prev.1;
    }
    for &stop in &stops[1..] {
        if t <= stop.0 {
            let local = (t - prev.0) / (stop.0 - prev.0).max(f32::EPSILON);
            return prev.1.lerp(stop.1, local);
        }
        prev = stop;
    }
    prev.1
}

/// Decode an icon, substituting a generated glyph when it cannot be read
pub fn load_icon_or_fallback(path: &str) -> RgbaImage {
    match image::open(path) {
        Ok(icon) => icon.to_rgba8(),
        Err(e) => {
            warn!("ERROR loading icon from file '{}', error: '{}'", path, e);
            fallback_icon()
        }
    }
}

/// Light grey square with a black border and a black X
pub fn fallback_icon() -> RgbaImage {
    let size = FALLBACK_ICON_SIZE;
    let mut icon = RgbaImage::from_pixel(size, size, Color::rgb(0.8, 0.8, 0.8).to_pixel());
    let black = Color::rgb(0.0, 0.0, 0.0).to_pixel();

    for i in 0..size {
        icon.put_pixel(i, 0, black);
        icon.put_pixel(i, size - 1, black);
        icon.put_pixel(0, i, black);
        icon.put_pixel(size - 1, i, black);
    }

    for i in 4..=16 {
        for w in 0..2 {
            let x = (i + w).min(size - 1);
            icon.put_pixel(x, i, black);
            icon.put_pixel(x, size - i, black);
        }
    }

    icon
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argb_unpacking() {
        let c = Color::from_argb(0xaa000000);
        assert_eq!(c.to_pixel(), Rgba([0, 0, 0, 0xaa]));

        let c = Color::from_argb(0xff002244);
        assert_eq!(c.to_pixel(), Rgba([0x00, 0x22, 0x44, 0xff]));
    }

    #[test]
    fn test_fill_replaces_and_fill_rect_blends() {
        let mut canvas = Canvas::new(4, 4);
        canvas.fill(Color::rgb(0.0, 0.0, 1.0));
        canvas.fill_rect(Rectangle::new(1, 1, 2, 2), Color::rgba(1.0, 0.0, 0.0, 0.5));

        assert_eq!(canvas.image().get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
        let mixed = canvas.image().get_pixel(1, 1);
        assert_eq!(mixed.0[3], 255);
        assert!(mixed.0[0] > 120 && mixed.0[0] < 135);
        assert!(mixed.0[2] > 120 && mixed.0[2] < 135);
    }

    #[test]
    fn test_fallback_icon_shape() {
        let icon = fallback_icon();
        assert_eq!(icon.dimensions(), (20, 20));
        assert_eq!(icon.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(icon.get_pixel(2, 10), &Rgba([204, 204, 204, 255]));
        assert_eq!(icon.get_pixel(10, 10), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_unreadable_icon_falls_back() {
        let icon = load_icon_or_fallback("/nonexistent/tessera/icon.png");
        assert_eq!(icon, fallback_icon());
    }

    #[test]
    fn test_tiled_fill_repeats() {
        let mut tile = RgbaImage::new(2, 1);
        tile.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        tile.put_pixel(1, 0, Rgba([0, 255, 0, 255]));

        let mut canvas = Canvas::new(5, 2);
        canvas.fill_tiled(&tile);
        assert_eq!(canvas.image().get_pixel(4, 1), &Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.image().get_pixel(3, 0), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_scale_crop_keeps_aspect() {
        // Left half red, right half green; a tall canvas crops the sides
        let mut src = RgbaImage::new(4, 2);
        for y in 0..2 {
            src.put_pixel(0, y, Rgba([255, 0, 0, 255]));
            src.put_pixel(1, y, Rgba([255, 0, 0, 255]));
            src.put_pixel(2, y, Rgba([0, 255, 0, 255]));
            src.put_pixel(3, y, Rgba([0, 255, 0, 255]));
        }

        let mut canvas = Canvas::new(2, 4);
        canvas.fill_scale_crop(&src);
        assert_eq!(canvas.image().get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.image().get_pixel(1, 3), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_text_metrics() {
        assert_eq!(text_width("<Default>"), 9 * GLYPH_ADVANCE);
        assert_eq!(text_width(""), 0);
    }
}
