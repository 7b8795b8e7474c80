//! Unlock dialog implementation

use crate::shell::render::{Canvas, Color};
use crate::shell::{Edges, PaintLatch, SurfaceRole};
use crate::toolkit::{SurfaceId, Toolkit};
use tessera_ipc::{ButtonState, CursorShape, PointerEvent, Rectangle, ShellRequest, TouchEvent, BTN_LEFT};
use tracing::debug;

pub const UNLOCK_TITLE: &str = "Unlock your desktop";

/// Dialog configuration
const DIALOG_WIDTH: i32 = 260;
const DIALOG_HEIGHT: i32 = 230;
const SCRIM: Color = Color::rgba(0.0, 0.0, 0.0, 0.6);

/// Unlock dialog state
pub struct UnlockDialog {
    surface: SurfaceId,
    /// The round unlock control
    button: Rectangle,
    button_focused: bool,
    /// A touch went down on the control
    touch_down: bool,
    /// Unlock submitted, waiting for the deferred finish
    closing: bool,
    painted: PaintLatch,
}

impl UnlockDialog {
    /// Create the dialog and register it as the lock surface
    pub fn create(toolkit: &mut Toolkit) -> Self {
        let surface = toolkit.create_surface(UNLOCK_TITLE);
        toolkit.ipc().send(ShellRequest::SetLockSurface { surface: surface.0 });
        toolkit.schedule_resize(surface, DIALOG_WIDTH, DIALOG_HEIGHT);

        Self {
            surface,
            button: Rectangle::default(),
            button_focused: false,
            touch_down: false,
            closing: false,
            painted: PaintLatch::default(),
        }
    }

    pub fn destroy(self, toolkit: &mut Toolkit) {
        toolkit.destroy_surface(self.surface);
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    pub fn button(&self) -> Rectangle {
        self.button
    }

    /// Mark the dialog closing. Returns false if it already was.
    fn submit(&mut self) -> bool {
        if self.closing {
            return false;
        }
        debug!("Unlock requested");
        self.closing = true;
        true
    }

    fn set_focus(&mut self, toolkit: &mut Toolkit, focused: bool) {
        if focused == self.button_focused {
            return;
        }
        self.button_focused = focused;
        if focused {
            toolkit.set_cursor(self.surface, CursorShape::LeftPtr);
        }
        toolkit.schedule_redraw(self.surface);
    }

    /// Returns true when an unlock was submitted and the finish must be
    /// queued
    pub fn handle_pointer(&mut self, toolkit: &mut Toolkit, event: &PointerEvent) -> bool {
        match *event {
            PointerEvent::Enter { x, y } | PointerEvent::Motion { x, y } => {
                let focused = self.button.contains(x, y);
                self.set_focus(toolkit, focused);
                false
            }
            PointerEvent::Leave => {
                self.set_focus(toolkit, false);
                false
            }
            PointerEvent::Button { button, state } => {
                button == BTN_LEFT
                    && state == ButtonState::Released
                    && self.button_focused
                    && self.submit()
            }
        }
    }

    /// Same contract as [`UnlockDialog::handle_pointer`]
    pub fn handle_touch(&mut self, toolkit: &mut Toolkit, event: &TouchEvent) -> bool {
        match *event {
            TouchEvent::Down { x, y, .. } => {
                if self.button.contains(x, y) {
                    self.touch_down = true;
                    self.button_focused = true;
                    toolkit.schedule_redraw(self.surface);
                }
                false
            }
            TouchEvent::Up { .. } => {
                if !self.touch_down {
                    return false;
                }
                self.touch_down = false;
                self.button_focused = false;
                toolkit.schedule_redraw(self.surface);
                self.submit()
            }
        }
    }
}

fn circle(width: i32, height: i32) -> (f32, f32, f32) {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    (cx, cy, cx.min(cy) * 0.4)
}

impl SurfaceRole for UnlockDialog {
    fn surface(&self) -> SurfaceId {
        self.surface
    }

    fn configure(&mut self, toolkit: &mut Toolkit, _edges: Edges, width: i32, height: i32) {
        toolkit.schedule_resize(self.surface, width, height);
    }

    fn resize(&mut self, width: i32, height: i32) {
        let (cx, cy, r) = circle(width, height);
        self.button = Rectangle::new(
            (cx - r).round() as i32,
            (cy - r).round() as i32,
            (2.0 * r).round() as i32,
            (2.0 * r).round() as i32,
        );
    }

    fn paint(&mut self, _toolkit: &Toolkit, canvas: &mut Canvas) {
        canvas.fill(SCRIM);

        let f = if self.button_focused { 1.0 } else { 0.7 };
        let (cx, cy, r) = circle(canvas.width() as i32, canvas.height() as i32);
        let rim = Color::rgb(0.0, 0.86 * f, 0.0);
        let stops = [
            (0.0, rim),
            (0.85, Color::rgb(0.2 * f, f, 0.2 * f)),
            (1.0, rim),
        ];
        canvas.fill_radial_disc(cx, cy, r * 0.7, r, &stops);
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

    fn dialog() -> (Toolkit, UnlockDialog, tokio::sync::mpsc::UnboundedReceiver<ShellRequest>) {
        let (ipc, rx) = ipc::channel();
        let mut toolkit = Toolkit::new(ipc);
        let mut dialog = UnlockDialog::create(&mut toolkit);
        dialog.resize(DIALOG_WIDTH, DIALOG_HEIGHT);
        (toolkit, dialog, rx)
    }

    fn release() -> PointerEvent {
        PointerEvent::Button { button: BTN_LEFT, state: ButtonState::Released }
    }

    #[test]
    fn test_create_registers_lock_surface() {
        let (mut toolkit, dialog, mut rx) = dialog();

        assert!(matches!(rx.try_recv().unwrap(), ShellRequest::CreateSurface { .. }));
        assert_eq!(
            rx.try_recv().unwrap(),
            ShellRequest::SetLockSurface { surface: dialog.surface().0 }
        );
        assert_eq!(toolkit.take_pending()[0].resize, Some((DIALOG_WIDTH, DIALOG_HEIGHT)));
    }

    #[test]
    fn test_button_is_centered_square() {
        let (_toolkit, dialog, _rx) = dialog();
        // r = min(130, 115) * 0.4 = 46
        assert_eq!(dialog.button(), Rectangle::new(84, 69, 92, 92));
    }

    #[test]
    fn test_second_click_is_ignored() {
        let (mut toolkit, mut dialog, _rx) = dialog();

        dialog.handle_pointer(&mut toolkit, &PointerEvent::Enter { x: 130.0, y: 115.0 });
        assert!(dialog.handle_pointer(&mut toolkit, &release()));
        assert!(dialog.is_closing());
        assert!(!dialog.handle_pointer(&mut toolkit, &release()));
    }

    #[test]
    fn test_click_outside_control_does_nothing() {
        let (mut toolkit, mut dialog, _rx) = dialog();

        dialog.handle_pointer(&mut toolkit, &PointerEvent::Enter { x: 2.0, y: 2.0 });
        assert!(!dialog.handle_pointer(&mut toolkit, &release()));

        dialog.handle_pointer(&mut toolkit, &PointerEvent::Motion { x: 130.0, y: 115.0 });
        let right = PointerEvent::Button { button: 0x111, state: ButtonState::Released };
        assert!(!dialog.handle_pointer(&mut toolkit, &right));
        assert!(!dialog.is_closing());
    }

    #[test]
    fn test_touch_then_click_submits_once() {
        let (mut toolkit, mut dialog, _rx) = dialog();

        dialog.handle_touch(&mut toolkit, &TouchEvent::Down { id: 0, x: 130.0, y: 115.0 });
        assert!(dialog.handle_touch(&mut toolkit, &TouchEvent::Up { id: 0 }));

        dialog.handle_pointer(&mut toolkit, &PointerEvent::Enter { x: 130.0, y: 115.0 });
        assert!(!dialog.handle_pointer(&mut toolkit, &release()));
    }

    #[test]
    fn test_focus_brightens_control() {
        let (mut toolkit, mut dialog, _rx) = dialog();
        let mut dim = Canvas::new(260, 230);
        dialog.paint(&toolkit, &mut dim);

        dialog.handle_pointer(&mut toolkit, &PointerEvent::Enter { x: 130.0, y: 115.0 });
        let mut bright = Canvas::new(260, 230);
        dialog.paint(&toolkit, &mut bright);

        // Sample on the ring near offset 0.85
        let (x, y) = (130 + 43, 115);
        assert!(bright.pixel(x, y).g > dim.pixel(x, y).g);
        assert_eq!(dim.pixel(0, 0).a, bright.pixel(0, 0).a);
    }
}
