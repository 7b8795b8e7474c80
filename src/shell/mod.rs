//! Shell surfaces
//!
//! The per-output roles (panel, taskbar, background) plus the unlock dialog
//! and the grab surface. Each role owns one toolkit surface and paints
//! itself into a software canvas.

pub mod background;
pub mod clock;
pub mod grab;
pub mod launcher;
pub mod panel;
pub mod render;
pub mod taskbar;
pub mod unlock;

use crate::toolkit::{SurfaceId, Toolkit};
use bitflags::bitflags;
use render::Canvas;

bitflags! {
    /// Edges the compositor anchors a surface to in `Configure`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Edges: u32 {
        const TOP = 1;
        const BOTTOM = 2;
        const LEFT = 4;
        const RIGHT = 8;
    }
}

/// First-paint latch. Only moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PaintLatch {
    #[default]
    Unpainted,
    Painted,
}

impl PaintLatch {
    pub fn is_painted(self) -> bool {
        self == PaintLatch::Painted
    }

    /// Latch; returns true only on the first call
    pub fn latch(&mut self) -> bool {
        match self {
            PaintLatch::Unpainted => {
                *self = PaintLatch::Painted;
                true
            }
            PaintLatch::Painted => false,
        }
    }
}

/// A shell surface the compositor lays out and the desktop paints
pub trait SurfaceRole {
    fn surface(&self) -> SurfaceId;

    /// Layout request from the compositor
    fn configure(&mut self, toolkit: &mut Toolkit, edges: Edges, width: i32, height: i32);

    /// Lay out children for a new allocation
    fn resize(&mut self, _width: i32, _height: i32) {}

    fn paint(&mut self, toolkit: &Toolkit, canvas: &mut Canvas);

    fn paint_latch(&self) -> PaintLatch;

    fn paint_latch_mut(&mut self) -> &mut PaintLatch;

    fn painted(&self) -> bool {
        self.paint_latch().is_painted()
    }

    /// Record a completed paint; true the first time
    fn mark_painted(&mut self) -> bool {
        self.paint_latch_mut().latch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paint_latch_is_sticky() {
        let mut latch = PaintLatch::default();
        assert!(!latch.is_painted());
        assert!(latch.latch());
        assert!(!latch.latch());
        assert!(latch.is_painted());
    }

    #[test]
    fn test_edges_from_wire() {
        let edges = Edges::from_bits_truncate(1 | 4 | 64);
        assert_eq!(edges, Edges::TOP | Edges::LEFT);
    }
}
