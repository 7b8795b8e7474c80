//! Panel (launcher strip) implementation

use crate::config::{ShellConfig, ValidLauncher};
use crate::dispatch::TaskSender;
use crate::shell::clock::{ClockTimer, PanelClock};
use crate::shell::launcher::Launcher;
use crate::shell::render::{Canvas, Color};
use crate::shell::{Edges, PaintLatch, SurfaceRole};
use crate::toolkit::{SurfaceId, Toolkit};
use tessera_ipc::{ButtonState, CursorShape, PointerEvent, Rectangle, TouchEvent};
use tracing::{debug, warn};

/// Height of panels and taskbars, whatever the compositor asks for
pub const BAR_HEIGHT: i32 = 32;

/// Panel layout configuration
const ITEM_START_X: i32 = 10;
const ITEM_SPACING: i32 = 10;
const ITEM_CENTER_Y: i32 = 16;
const STATUS_WIDTH: i32 = 170;
const STATUS_HEIGHT: i32 = 20;
const STATUS_MARGIN: i32 = 8;

/// Left-to-right allocations for items of the given sizes, vertically
/// centred on the bar
pub fn item_allocations(sizes: impl IntoIterator<Item = (i32, i32)>) -> Vec<Rectangle> {
    let mut x = ITEM_START_X;
    sizes
        .into_iter()
        .map(|(w, h)| {
            let allocation = Rectangle::new(x, ITEM_CENTER_Y - h / 2, w + 1, h + 1);
            x += w + 1 + ITEM_SPACING;
            allocation
        })
        .collect()
}

/// Right-anchored status cell (the panel clock, the taskbar summary)
pub fn status_allocation(bar_width: i32) -> Rectangle {
    Rectangle::new(
        bar_width - STATUS_WIDTH - STATUS_MARGIN,
        ITEM_CENTER_Y - STATUS_HEIGHT / 2,
        STATUS_WIDTH + 1,
        STATUS_HEIGHT + 1,
    )
}

/// Panel state
pub struct Panel {
    surface: SurfaceId,
    color: Color,
    launchers: Vec<Launcher>,
    clock: Option<PanelClock>,
    painted: PaintLatch,
    /// Launcher under the pointer
    hover: Option<usize>,
    /// Launcher a touch went down on
    touch: Option<usize>,
}

impl Panel {
    pub fn create(
        toolkit: &mut Toolkit,
        config: &ShellConfig,
        launchers: &[ValidLauncher],
        tasks: &TaskSender,
    ) -> Self {
        let launchers = launchers
            .iter()
            .map(|l| Launcher::new(&l.icon, &l.path))
            .collect();
        Self::with_launchers(toolkit, config, launchers, tasks)
    }

    pub fn with_launchers(
        toolkit: &mut Toolkit,
        config: &ShellConfig,
        launchers: Vec<Launcher>,
        tasks: &TaskSender,
    ) -> Self {
        let surface = toolkit.create_surface("panel");

        let clock = match ClockTimer::start(surface, tasks.clone()) {
            Ok(timer) => Some(PanelClock::new(timer)),
            Err(e) => {
                warn!("could not create timerfd: {}", e);
                None
            }
        };

        Self {
            surface,
            color: Color::from_argb(config.panel_color),
            launchers,
            clock,
            painted: PaintLatch::default(),
            hover: None,
            touch: None,
        }
    }

    /// Tear down the clock, then launchers in order, then the surface
    pub fn destroy(mut self, toolkit: &mut Toolkit) {
        self.clock = None;
        for launcher in self.launchers.drain(..) {
            debug!("Removing launcher {:?}", launcher.path());
        }
        toolkit.destroy_surface(self.surface);
    }

    pub fn launchers(&self) -> &[Launcher] {
        &self.launchers
    }

    pub fn clock(&self) -> Option<&PanelClock> {
        self.clock.as_ref()
    }

    fn launcher_at(&self, x: f32, y: f32) -> Option<usize> {
        self.launchers
            .iter()
            .position(|launcher| launcher.allocation().contains(x, y))
    }

    fn set_hover(&mut self, toolkit: &mut Toolkit, hover: Option<usize>) {
        if hover == self.hover {
            return;
        }
        if let Some(old) = self.hover.and_then(|i| self.launchers.get_mut(i)) {
            old.focused = false;
            old.pressed = false;
        }
        match hover.and_then(|i| self.launchers.get_mut(i)) {
            Some(new) => {
                new.focused = true;
                toolkit.set_cursor(self.surface, CursorShape::LeftPtr);
                let anchor = new.allocation();
                toolkit.set_tooltip(self.surface, anchor.x, anchor.y + anchor.height, new.tooltip());
            }
            None => toolkit.clear_tooltip(self.surface),
        }
        self.hover = hover;
        toolkit.schedule_redraw(self.surface);
    }

    pub fn handle_pointer(&mut self, toolkit: &mut Toolkit, event: &PointerEvent) {
        match *event {
            PointerEvent::Enter { x, y } | PointerEvent::Motion { x, y } => {
                let hover = self.launcher_at(x, y);
                self.set_hover(toolkit, hover);
            }
            PointerEvent::Leave => self.set_hover(toolkit, None),
            PointerEvent::Button { state, .. } => {
                let Some(launcher) = self.hover.and_then(|i| self.launchers.get_mut(i)) else {
                    return;
                };
                launcher.pressed = state == ButtonState::Pressed;
                toolkit.schedule_redraw(self.surface);
                if state == ButtonState::Released {
                    launcher.activate();
                }
            }
        }
    }

    pub fn handle_touch(&mut self, toolkit: &mut Toolkit, event: &TouchEvent) {
        match *event {
            TouchEvent::Down { x, y, .. } => {
                self.touch = self.launcher_at(x, y);
                if let Some(launcher) = self.touch.and_then(|i| self.launchers.get_mut(i)) {
                    launcher.focused = true;
                    toolkit.schedule_redraw(self.surface);
                }
            }
            TouchEvent::Up { .. } => {
                if let Some(launcher) = self.touch.take().and_then(|i| self.launchers.get_mut(i)) {
                    launcher.focused = false;
                    toolkit.schedule_redraw(self.surface);
                    launcher.activate();
                }
            }
        }
    }
}

impl SurfaceRole for Panel {
    fn surface(&self) -> SurfaceId {
        self.surface
    }

    fn configure(&mut self, toolkit: &mut Toolkit, _edges: Edges, width: i32, _height: i32) {
        toolkit.schedule_resize(self.surface, width, BAR_HEIGHT);
    }

    fn resize(&mut self, width: i32, _height: i32) {
        let allocations = item_allocations(self.launchers.iter().map(Launcher::icon_size));
        for (launcher, allocation) in self.launchers.iter_mut().zip(allocations) {
            launcher.set_allocation(allocation);
        }
        if let Some(clock) = &mut self.clock {
            clock.set_allocation(status_allocation(width));
        }
    }

    fn paint(&mut self, _toolkit: &Toolkit, canvas: &mut Canvas) {
        canvas.fill(self.color);
        for launcher in &self.launchers {
            launcher.paint(canvas);
        }
        if let Some(clock) = &self.clock {
            clock.paint(canvas);
        }
    }

    fn paint_latch(&self) -> PaintLatch {
        self.painted
    }

    fn paint_latch_mut(&mut self) -> &mut PaintLatch {
        &mut self.painted
    }
}
