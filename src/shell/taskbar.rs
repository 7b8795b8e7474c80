//! Taskbar: one handler per compositor-managed window

use crate::config::{ShellConfig, DATADIR};
use crate::ipc::IpcSender;
use crate::shell::panel::{item_allocations, status_allocation, BAR_HEIGHT};
use crate::shell::render::{self, text_width, Canvas, Color};
use crate::shell::{Edges, PaintLatch, SurfaceRole};
use crate::toolkit::{SurfaceId, Toolkit};
use image::RgbaImage;
use tessera_ipc::{ButtonState, CursorShape, PointerEvent, Rectangle, ShellRequest};
use tracing::debug;

/// Window is shown
pub const RAISED: u32 = 0;
/// Window is minimized; any non-zero state counts as not raised
pub const MINIMIZED: u32 = 1;

/// Title shown until the compositor reports one
pub const DEFAULT_TITLE: &str = "<Default>";

const TITLE_OFFSET_X: i32 = 20;
const TITLE_OFFSET_Y: i32 = 12;
const TITLE_PADDING: i32 = 8;

pub fn window_icon_path() -> String {
    format!("{}/icon_window.png", DATADIR)
}

/// Taskbar entry for one managed window
pub struct TaskbarHandler {
    handle: u32,
    icon: RgbaImage,
    title: String,
    state: u32,
    allocation: Rectangle,
    pub focused: bool,
    pub pressed: bool,
}

impl TaskbarHandler {
    pub fn new(icon: RgbaImage, handle: u32, title: &str) -> Self {
        Self {
            handle,
            icon,
            title: title.to_string(),
            state: RAISED,
            allocation: Rectangle::default(),
            focused: false,
            pressed: false,
        }
    }

    pub fn handle(&self) -> u32 {
        self.handle
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    pub fn allocation(&self) -> Rectangle {
        self.allocation
    }

    /// Width of icon plus title, height of the icon
    fn size(&self) -> (i32, i32) {
        (
            self.icon.width() as i32 + text_width(&self.title) + TITLE_PADDING,
            self.icon.height() as i32,
        )
    }

    /// Flip between raised and minimized and ask the compositor to follow.
    /// The compositor's state notification stays authoritative.
    pub fn activate(&mut self, ipc: &IpcSender) {
        self.state = if self.state == RAISED { MINIMIZED } else { RAISED };
        ipc.send(ShellRequest::SetManagedSurfaceState {
            handle: self.handle,
            state: self.state,
        });
    }

    pub fn paint(&self, canvas: &mut Canvas) {
        let mut x = self.allocation.x;
        let mut y = self.allocation.y;
        if self.pressed {
            x += 1;
            y += 1;
        }

        canvas.draw_image(&self.icon, x, y);
        canvas.draw_text(
            x + TITLE_OFFSET_X,
            y + TITLE_OFFSET_Y,
            &self.title,
            Color::rgb(0.0, 0.0, 0.0),
        );
        if self.focused {
            canvas.highlight(&self.icon, x, y, 0.4);
        }
    }
}

/// Taskbar state
pub struct Taskbar {
    surface: SurfaceId,
    color: Color,
    icon: RgbaImage,
    handlers: Vec<TaskbarHandler>,
    status: Rectangle,
    painted: PaintLatch,
    hover: Option<usize>,
}

impl Taskbar {
    pub fn create(toolkit: &mut Toolkit, config: &ShellConfig) -> Self {
        Self::with_icon(toolkit, config, render::load_icon_or_fallback(&window_icon_path()))
    }

    pub fn with_icon(toolkit: &mut Toolkit, config: &ShellConfig, icon: RgbaImage) -> Self {
        Self {
            surface: toolkit.create_surface("taskbar"),
            color: Color::from_argb(config.taskbar_color),
            icon,
            handlers: Vec::new(),
            status: Rectangle::default(),
            painted: PaintLatch::default(),
            hover: None,
        }
    }

    /// Drop every handler in order, then the surface
    pub fn destroy(mut self, toolkit: &mut Toolkit) {
        for handler in self.handlers.drain(..) {
            debug!("Dropping taskbar handler for window {}", handler.handle);
        }
        toolkit.destroy_surface(self.surface);
    }

    pub fn handlers(&self) -> &[TaskbarHandler] {
        &self.handlers
    }

    pub fn handler(&self, handle: u32) -> Option<&TaskbarHandler> {
        self.handlers.iter().find(|h| h.handle == handle)
    }

    pub fn add_handler(&mut self, toolkit: &mut Toolkit, handle: u32, title: &str, state: u32) {
        let mut handler = TaskbarHandler::new(self.icon.clone(), handle, title);
        handler.state = state;
        self.handlers.push(handler);
        toolkit.relayout(self.surface);
    }

    /// Returns whether a handler for `handle` was removed
    pub fn remove_handler(&mut self, toolkit: &mut Toolkit, handle: u32) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|h| h.handle != handle);
        if self.handlers.len() == before {
            return false;
        }
        self.hover = None;
        toolkit.relayout(self.surface);
        true
    }

    pub fn set_handler_state(&mut self, handle: u32, state: u32) {
        for handler in self.handlers.iter_mut().filter(|h| h.handle == handle) {
            handler.state = state;
        }
    }

    pub fn set_handler_title(&mut self, toolkit: &mut Toolkit, handle: u32, title: &str) {
        let mut changed = false;
        for handler in self.handlers.iter_mut().filter(|h| h.handle == handle) {
            handler.title = title.to_string();
            changed = true;
        }
        if changed {
            toolkit.relayout(self.surface);
        }
    }

    fn handler_at(&self, x: f32, y: f32) -> Option<usize> {
        self.handlers
            .iter()
            .position(|handler| handler.allocation.contains(x, y))
    }

    fn set_hover(&mut self, toolkit: &mut Toolkit, hover: Option<usize>) {
        if hover == self.hover {
            return;
        }
        if let Some(old) = self.hover.and_then(|i| self.handlers.get_mut(i)) {
            old.focused = false;
            old.pressed = false;
        }
        if let Some(new) = hover.and_then(|i| self.handlers.get_mut(i)) {
            new.focused = true;
            toolkit.set_cursor(self.surface, CursorShape::LeftPtr);
        }
        self.hover = hover;
        toolkit.schedule_redraw(self.surface);
    }

    pub fn handle_pointer(&mut self, toolkit: &mut Toolkit, event: &PointerEvent) {
        match *event {
            PointerEvent::Enter { x, y } | PointerEvent::Motion { x, y } => {
                let hover = self.handler_at(x, y);
                self.set_hover(toolkit, hover);
            }
            PointerEvent::Leave => self.set_hover(toolkit, None),
            PointerEvent::Button { state, .. } => {
                let Some(handler) = self.hover.and_then(|i| self.handlers.get_mut(i)) else {
                    return;
                };
                handler.pressed = state == ButtonState::Pressed;
                toolkit.schedule_redraw(self.surface);
                if state == ButtonState::Released {
                    handler.activate(toolkit.ipc());
                }
            }
        }
    }
}

impl SurfaceRole for Taskbar {
    fn surface(&self) -> SurfaceId {
        self.surface
    }

    fn configure(&mut self, toolkit: &mut Toolkit, _edges: Edges, width: i32, _height: i32) {
        toolkit.schedule_resize(self.surface, width, BAR_HEIGHT);
    }

    fn resize(&mut self, width: i32, _height: i32) {
        let allocations = item_allocations(self.handlers.iter().map(TaskbarHandler::size));
        for (handler, allocation) in self.handlers.iter_mut().zip(allocations) {
            handler.allocation = allocation;
        }
        self.status = status_allocation(width);
    }

    fn paint(&mut self, _toolkit: &Toolkit, canvas: &mut Canvas) {
        canvas.fill(self.color);
        for handler in &self.handlers {
            handler.paint(canvas);
        }

        let summary = match self.handlers.len() {
            1 => "1 window".to_string(),
            n => format!("{} windows", n),
        };
        let baseline = self.status.y + 3 * (self.status.height >> 2);
        canvas.draw_text(self.status.x + 4, baseline, &summary, Color::rgb(0.0, 0.0, 0.0));
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

    fn taskbar(toolkit: &mut Toolkit) -> Taskbar {
        Taskbar::with_icon(toolkit, &ShellConfig::default(), RgbaImage::new(16, 16))
    }

    #[test]
    fn test_handler_width_includes_title() {
        let (ipc, _rx) = ipc::channel();
        let mut toolkit = Toolkit::new(ipc);
        let mut bar = taskbar(&mut toolkit);

        bar.add_handler(&mut toolkit, 5, DEFAULT_TITLE, RAISED);
        bar.add_handler(&mut toolkit, 6, "xterm", RAISED);
        bar.resize(1024, BAR_HEIGHT);

        let first = bar.handlers()[0].allocation();
        let width = 16 + text_width(DEFAULT_TITLE) + TITLE_PADDING;
        assert_eq!(first, Rectangle::new(10, 8, width + 1, 17));
        assert_eq!(bar.handlers()[1].allocation().x, 10 + width + 1 + 10);
    }

    #[test]
    fn test_activation_toggles_and_requests() {
        let (ipc, mut rx) = ipc::channel();
        let mut handler = TaskbarHandler::new(RgbaImage::new(1, 1), 9, DEFAULT_TITLE);

        handler.activate(&ipc);
        assert_eq!(handler.state(), MINIMIZED);
        assert_eq!(
            rx.try_recv().unwrap(),
            ShellRequest::SetManagedSurfaceState { handle: 9, state: MINIMIZED }
        );

        handler.activate(&ipc);
        assert_eq!(handler.state(), RAISED);
    }

    #[test]
    fn test_any_nonzero_state_activates_to_raised() {
        let (ipc, _rx) = ipc::channel();
        let mut toolkit = Toolkit::new(ipc.clone());
        let mut bar = taskbar(&mut toolkit);
        bar.add_handler(&mut toolkit, 1, DEFAULT_TITLE, RAISED);

        bar.set_handler_state(1, 7);
        assert_eq!(bar.handler(1).unwrap().state(), 7);

        bar.handlers[0].activate(&ipc);
        assert_eq!(bar.handler(1).unwrap().state(), RAISED);
    }

    #[test]
    fn test_title_change_relayouts() {
        let (ipc, _rx) = ipc::channel();
        let mut toolkit = Toolkit::new(ipc);
        let mut bar = taskbar(&mut toolkit);
        toolkit.schedule_resize(bar.surface(), 800, BAR_HEIGHT);
        toolkit.take_pending();

        bar.add_handler(&mut toolkit, 3, DEFAULT_TITLE, RAISED);
        toolkit.take_pending();
        bar.set_handler_title(&mut toolkit, 3, "Terminal");

        assert_eq!(bar.handler(3).unwrap().title(), "Terminal");
        assert_eq!(toolkit.take_pending()[0].resize, Some((800, BAR_HEIGHT)));
    }

    #[test]
    fn test_click_on_handler_toggles() {
        let (ipc, mut rx) = ipc::channel();
        let mut toolkit = Toolkit::new(ipc);
        let mut bar = taskbar(&mut toolkit);
        bar.add_handler(&mut toolkit, 4, DEFAULT_TITLE, RAISED);
        bar.resize(800, BAR_HEIGHT);
        while rx.try_recv().is_ok() {}

        bar.handle_pointer(&mut toolkit, &PointerEvent::Enter { x: 12.0, y: 12.0 });
        bar.handle_pointer(
            &mut toolkit,
            &PointerEvent::Button { button: tessera_ipc::BTN_LEFT, state: ButtonState::Pressed },
        );
        bar.handle_pointer(
            &mut toolkit,
            &PointerEvent::Button { button: tessera_ipc::BTN_LEFT, state: ButtonState::Released },
        );

        let requests: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(requests.contains(&ShellRequest::SetManagedSurfaceState { handle: 4, state: MINIMIZED }));
    }

    #[test]
    fn test_remove_unknown_handler_is_noop() {
        let (ipc, _rx) = ipc::channel();
        let mut toolkit = Toolkit::new(ipc);
        let mut bar = taskbar(&mut toolkit);
        bar.add_handler(&mut toolkit, 1, DEFAULT_TITLE, RAISED);

        assert!(!bar.remove_handler(&mut toolkit, 2));
        assert!(bar.remove_handler(&mut toolkit, 1));
        assert!(bar.handlers().is_empty());
    }
}
