//! Desktop background

use crate::config::{BackgroundMode, ShellConfig};
use crate::shell::render::{Canvas, Color};
use crate::shell::{Edges, PaintLatch, SurfaceRole};
use crate::toolkit::{SurfaceId, Toolkit};
use image::RgbaImage;
use tessera_ipc::Rectangle;
use tracing::warn;

/// Fill under everything else
const BASE_COLOR: Color = Color::rgb(0.0, 0.0, 0.2);

pub struct Background {
    surface: SurfaceId,
    color: Color,
    mode: Option<BackgroundMode>,
    image: Option<RgbaImage>,
    painted: PaintLatch,
}

impl Background {
    pub fn create(toolkit: &mut Toolkit, config: &ShellConfig) -> Self {
        let mode = config.background_mode();
        let image = match mode {
            Some(_) => load_image(&config.background_image),
            None => None,
        };
        Self::with_image(toolkit, config, mode, image)
    }

    pub fn with_image(
        toolkit: &mut Toolkit,
        config: &ShellConfig,
        mode: Option<BackgroundMode>,
        image: Option<RgbaImage>,
    ) -> Self {
        Self {
            surface: toolkit.create_surface("background"),
            color: Color::from_argb(config.background_color),
            mode,
            image,
            painted: PaintLatch::default(),
        }
    }

    pub fn destroy(self, toolkit: &mut Toolkit) {
        toolkit.destroy_surface(self.surface);
    }
}

fn load_image(path: &str) -> Option<RgbaImage> {
    match image::open(path) {
        Ok(image) => Some(image.to_rgba8()),
        Err(e) => {
            warn!("could not load background image '{}': {}", path, e);
            None
        }
    }
}

impl SurfaceRole for Background {
    fn surface(&self) -> SurfaceId {
        self.surface
    }

    fn configure(&mut self, toolkit: &mut Toolkit, _edges: Edges, width: i32, height: i32) {
        toolkit.schedule_resize(self.surface, width, height);
    }

    fn paint(&mut self, toolkit: &Toolkit, canvas: &mut Canvas) {
        canvas.fill(BASE_COLOR);

        match (&self.image, self.mode) {
            (Some(image), Some(BackgroundMode::Scale)) => canvas.fill_scaled(image),
            (Some(image), Some(BackgroundMode::ScaleCrop)) => canvas.fill_scale_crop(image),
            (Some(image), Some(BackgroundMode::Tile)) => canvas.fill_tiled(image),
            _ => canvas.fill(self.color),
        }

        let allocation = Rectangle::new(0, 0, canvas.width() as i32, canvas.height() as i32);
        toolkit.set_opaque_region(self.surface, allocation);
    }

    fn paint_latch(&self) -> PaintLatch {
        self.painted
    }

    fn paint_latch_mut(&mut self) -> &mut PaintLatch {
        &mut self.painted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc;
    use image::Rgba;
    use tessera_ipc::ShellRequest;

    #[test]
    fn test_configure_takes_full_size() {
        let (ipc, _rx) = ipc::channel();
        let mut toolkit = Toolkit::new(ipc);
        let mut background = Background::with_image(&mut toolkit, &ShellConfig::default(), None, None);

        background.configure(&mut toolkit, Edges::empty(), 1920, 1080);
        assert_eq!(toolkit.take_pending()[0].resize, Some((1920, 1080)));
    }

    #[test]
    fn test_no_mode_paints_configured_color() {
        let (ipc, mut rx) = ipc::channel();
        let mut toolkit = Toolkit::new(ipc);
        let image = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let mut background =
            Background::with_image(&mut toolkit, &ShellConfig::default(), None, Some(image));
        while rx.try_recv().is_ok() {}

        let mut canvas = Canvas::new(4, 3);
        background.paint(&toolkit, &mut canvas);

        assert_eq!(canvas.image().get_pixel(3, 2), &Rgba([0x00, 0x22, 0x44, 0xff]));
        assert_eq!(
            rx.try_recv().unwrap(),
            ShellRequest::SetOpaqueRegion {
                surface: background.surface().0,
                region: Rectangle::new(0, 0, 4, 3),
            }
        );
    }

    #[test]
    fn test_tiled_image_is_painted() {
        let (ipc, _rx) = ipc::channel();
        let mut toolkit = Toolkit::new(ipc);
        let image = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let mut background = Background::with_image(
            &mut toolkit,
            &ShellConfig::default(),
            Some(BackgroundMode::Tile),
            Some(image),
        );

        let mut canvas = Canvas::new(5, 5);
        background.paint(&toolkit, &mut canvas);
        assert_eq!(canvas.image().get_pixel(4, 4), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_missing_image_falls_back_to_color() {
        let (ipc, _rx) = ipc::channel();
        let mut toolkit = Toolkit::new(ipc);
        let config = ShellConfig {
            background_image: "/nonexistent/tessera/pattern.png".into(),
            background_color: 0xff102030,
            ..ShellConfig::default()
        };
        let mut background = Background::create(&mut toolkit, &config);

        let mut canvas = Canvas::new(2, 2);
        background.paint(&toolkit, &mut canvas);
        assert_eq!(canvas.image().get_pixel(0, 0), &Rgba([0x10, 0x20, 0x30, 0xff]));
    }
}
