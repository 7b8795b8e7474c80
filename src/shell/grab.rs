//! Grab surface
//!
//! A 1x1 transparent surface the compositor routes synthetic pointer
//! enters to while it holds a grab, so the shell can answer with the
//! cursor the grab wants.

use crate::shell::render::Canvas;
use crate::shell::{Edges, PaintLatch, SurfaceRole};
use crate::toolkit::{SurfaceId, Toolkit};
use tessera_ipc::{grab_cursor, CursorShape, PointerEvent, Rectangle, ShellRequest};

/// Map a protocol grab-cursor value to a cursor shape
pub fn cursor_from_protocol(cursor: u32) -> CursorShape {
    match cursor {
        grab_cursor::NONE => CursorShape::Blank,
        grab_cursor::BUSY => CursorShape::Watch,
        grab_cursor::MOVE => CursorShape::Dragging,
        grab_cursor::RESIZE_TOP => CursorShape::Top,
        grab_cursor::RESIZE_BOTTOM => CursorShape::Bottom,
        grab_cursor::RESIZE_LEFT => CursorShape::Left,
        grab_cursor::RESIZE_RIGHT => CursorShape::Right,
        grab_cursor::RESIZE_TOP_LEFT => CursorShape::TopLeft,
        grab_cursor::RESIZE_TOP_RIGHT => CursorShape::TopRight,
        grab_cursor::RESIZE_BOTTOM_LEFT => CursorShape::BottomLeft,
        grab_cursor::RESIZE_BOTTOM_RIGHT => CursorShape::BottomRight,
        _ => CursorShape::LeftPtr,
    }
}

pub struct GrabSurface {
    surface: SurfaceId,
    /// The fake enter lands at 0,0
    widget: Rectangle,
    painted: PaintLatch,
}

impl GrabSurface {
    pub fn create(toolkit: &mut Toolkit) -> Self {
        let surface = toolkit.create_surface("grab");
        toolkit.ipc().send(ShellRequest::SetGrabSurface { surface: surface.0 });
        toolkit.schedule_resize(surface, 1, 1);

        Self {
            surface,
            widget: Rectangle::new(0, 0, 1, 1),
            painted: PaintLatch::default(),
        }
    }

    pub fn destroy(self, toolkit: &mut Toolkit) {
        toolkit.destroy_surface(self.surface);
    }

    pub fn handle_pointer(&self, toolkit: &Toolkit, event: &PointerEvent, cursor: CursorShape) {
        if let PointerEvent::Enter { x, y } = *event {
            if self.widget.contains(x, y) {
                toolkit.set_cursor(self.surface, cursor);
            }
        }
    }
}

impl SurfaceRole for GrabSurface {
    fn surface(&self) -> SurfaceId {
        self.surface
    }

    fn configure(&mut self, _toolkit: &mut Toolkit, _edges: Edges, _width: i32, _height: i32) {}

    // Left fully transparent
    fn paint(&mut self, _toolkit: &Toolkit, _canvas: &mut Canvas) {}

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

    #[test]
    fn test_cursor_mapping() {
        assert_eq!(cursor_from_protocol(grab_cursor::NONE), CursorShape::Blank);
        assert_eq!(cursor_from_protocol(grab_cursor::BUSY), CursorShape::Watch);
        assert_eq!(cursor_from_protocol(grab_cursor::MOVE), CursorShape::Dragging);
        assert_eq!(cursor_from_protocol(grab_cursor::RESIZE_BOTTOM_LEFT), CursorShape::BottomLeft);
        assert_eq!(cursor_from_protocol(grab_cursor::ARROW), CursorShape::LeftPtr);
        assert_eq!(cursor_from_protocol(999), CursorShape::LeftPtr);
    }

    #[test]
    fn test_enter_reports_grab_cursor() {
        let (ipc, mut rx) = ipc::channel();
        let mut toolkit = Toolkit::new(ipc);
        let grab = GrabSurface::create(&mut toolkit);
        while rx.try_recv().is_ok() {}

        grab.handle_pointer(&toolkit, &PointerEvent::Enter { x: 0.0, y: 0.0 }, CursorShape::Top);
        assert_eq!(
            rx.try_recv().unwrap(),
            ShellRequest::SetCursor { surface: grab.surface().0, cursor: CursorShape::Top }
        );

        grab.handle_pointer(&toolkit, &PointerEvent::Motion { x: 0.0, y: 0.0 }, CursorShape::Top);
        assert!(rx.try_recv().is_err());
    }
}
