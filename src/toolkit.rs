//! Surface toolkit
//!
//! Tracks every surface the shell created on the compositor: its
//! allocation, pending resize/redraw and buffer parameters. The desktop
//! drains pending work once per loop iteration and commits the painted
//! canvases.

use crate::ipc::IpcSender;
use crate::shell::render::Canvas;
use std::collections::BTreeMap;
use std::fmt;
use tessera_ipc::{CursorShape, Rectangle, ShellRequest};
use tracing::{debug, warn};

/// Shell-allocated surface id, announced with `CreateSurface`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

struct SurfaceState {
    title: String,
    allocation: Rectangle,
    pending_size: Option<(i32, i32)>,
    needs_redraw: bool,
    buffer_transform: i32,
    buffer_scale: i32,
}

/// A surface with work queued for the next redraw pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPaint {
    pub surface: SurfaceId,
    /// New size, if a resize was scheduled
    pub resize: Option<(i32, i32)>,
}

pub struct Toolkit {
    ipc: IpcSender,
    next_id: u32,
    surfaces: BTreeMap<SurfaceId, SurfaceState>,
}

impl Toolkit {
    pub fn new(ipc: IpcSender) -> Self {
        Self {
            ipc,
            next_id: 1,
            surfaces: BTreeMap::new(),
        }
    }

    /// The request queue surfaces talk to the compositor through
    pub fn ipc(&self) -> &IpcSender {
        &self.ipc
    }

    /// Create a role-less surface
    pub fn create_surface(&mut self, title: &str) -> SurfaceId {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;

        self.surfaces.insert(
            id,
            SurfaceState {
                title: title.to_string(),
                allocation: Rectangle::default(),
                pending_size: None,
                needs_redraw: false,
                buffer_transform: 0,
                buffer_scale: 1,
            },
        );
        self.ipc.send(ShellRequest::CreateSurface {
            surface: id.0,
            title: title.to_string(),
        });
        debug!("Created {} ({:?})", id, title);
        id
    }

    pub fn destroy_surface(&mut self, id: SurfaceId) {
        match self.surfaces.remove(&id) {
            Some(state) => {
                self.ipc.send(ShellRequest::DestroySurface { surface: id.0 });
                debug!("Destroyed {} ({:?})", id, state.title);
            }
            None => warn!("Destroying unknown {}", id),
        }
    }

    pub fn exists(&self, id: SurfaceId) -> bool {
        self.surfaces.contains_key(&id)
    }

    /// Resize on the next redraw pass; the latest request wins
    pub fn schedule_resize(&mut self, id: SurfaceId, width: i32, height: i32) {
        if let Some(state) = self.surfaces.get_mut(&id) {
            state.pending_size = Some((width, height));
            state.needs_redraw = true;
        }
    }

    pub fn schedule_redraw(&mut self, id: SurfaceId) {
        if let Some(state) = self.surfaces.get_mut(&id) {
            state.needs_redraw = true;
        }
    }

    /// Re-run layout at the current (or already pending) size
    pub fn relayout(&mut self, id: SurfaceId) {
        if let Some(state) = self.surfaces.get_mut(&id) {
            if state.pending_size.is_none() {
                state.pending_size = Some((state.allocation.width, state.allocation.height));
            }
            state.needs_redraw = true;
        }
    }

    pub fn allocation(&self, id: SurfaceId) -> Rectangle {
        self.surfaces
            .get(&id)
            .map(|state| state.allocation)
            .unwrap_or_default()
    }

    pub fn set_buffer_transform(&mut self, id: SurfaceId, transform: i32) {
        if let Some(state) = self.surfaces.get_mut(&id) {
            state.buffer_transform = transform;
            state.needs_redraw = true;
            self.ipc.send(ShellRequest::SetBufferTransform {
                surface: id.0,
                transform,
            });
        }
    }

    pub fn buffer_transform(&self, id: SurfaceId) -> Option<i32> {
        self.surfaces.get(&id).map(|state| state.buffer_transform)
    }

    pub fn set_buffer_scale(&mut self, id: SurfaceId, scale: i32) {
        if let Some(state) = self.surfaces.get_mut(&id) {
            state.buffer_scale = scale;
            state.needs_redraw = true;
            self.ipc.send(ShellRequest::SetBufferScale {
                surface: id.0,
                scale,
            });
        }
    }

    pub fn buffer_scale(&self, id: SurfaceId) -> Option<i32> {
        self.surfaces.get(&id).map(|state| state.buffer_scale)
    }

    pub fn set_opaque_region(&self, id: SurfaceId, region: Rectangle) {
        self.ipc.send(ShellRequest::SetOpaqueRegion {
            surface: id.0,
            region,
        });
    }

    pub fn set_cursor(&self, id: SurfaceId, cursor: CursorShape) {
        self.ipc.send(ShellRequest::SetCursor {
            surface: id.0,
            cursor,
        });
    }

    pub fn set_tooltip(&self, id: SurfaceId, x: i32, y: i32, text: &str) {
        self.ipc.send(ShellRequest::SetTooltip {
            surface: id.0,
            x,
            y,
            text: text.to_string(),
        });
    }

    pub fn clear_tooltip(&self, id: SurfaceId) {
        self.ipc.send(ShellRequest::ClearTooltip { surface: id.0 });
    }

    /// Take every surface with queued work, applying pending resizes to
    /// the allocations
    pub fn take_pending(&mut self) -> Vec<PendingPaint> {
        let mut pending = Vec::new();
        for (id, state) in self.surfaces.iter_mut() {
            if !state.needs_redraw {
                continue;
            }
            state.needs_redraw = false;

            let resize = state.pending_size.take();
            if let Some((width, height)) = resize {
                state.allocation = Rectangle::new(0, 0, width, height);
            }
            pending.push(PendingPaint {
                surface: *id,
                resize,
            });
        }
        pending
    }

    /// Hand a finished canvas to the compositor.
    ///
    /// `Commit` plays the part of attaching and committing a buffer: the
    /// compositor learns the new buffer size, while the pixels stay in the
    /// shell's canvas.
    pub fn commit(&self, id: SurfaceId, canvas: &Canvas) {
        self.ipc.send(ShellRequest::Commit {
            surface: id.0,
            width: canvas.width() as i32,
            height: canvas.height() as i32,
        });
    }
}
