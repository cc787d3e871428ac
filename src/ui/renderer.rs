use std::cell::RefCell;

use serde::Serialize;
use tracing::trace;

use crate::sys::geometry::Rect;
use crate::sys::platform::{IconRef, SurfaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotContent {
    /// The compositor paints a live thumbnail behind the decorations.
    LivePreview,
    /// No live preview could be registered; draw the icon large instead.
    StaticIcon,
    /// The window is gone. The last frame stays but the slot is inert.
    Stale,
}

/// Everything needed to paint one slot's decorations.
#[derive(Debug, Clone, Copy)]
pub struct SlotView<'a> {
    pub title: &'a str,
    pub icon: IconRef,
    /// The number shown to the user, starting at 1.
    pub ordinal: usize,
    pub selected: bool,
    /// Surface-relative cell rectangle.
    pub bounds: Rect,
    pub content: SlotContent,
}

/// Paints slot decorations (frame, title, icon and number) onto overlay
/// surfaces.
pub trait Renderer {
    fn draw_slot(&self, surface: SurfaceId, view: &SlotView<'_>);
}

/// Renderer that only logs what it would draw.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRenderer;

impl Renderer for LogRenderer {
    fn draw_slot(&self, surface: SurfaceId, view: &SlotView<'_>) {
        trace!(?surface, ordinal = view.ordinal, selected = view.selected, content = ?view.content, title = view.title, "draw_slot");
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawRecord {
    #[serde(skip)]
    pub surface: SurfaceId,
    pub title: String,
    pub icon: IconRef,
    pub ordinal: usize,
    pub selected: bool,
    pub bounds: Rect,
    pub content: SlotContent,
}

/// Renderer that remembers every draw, in order.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    draws: RefCell<Vec<DrawRecord>>,
}

impl RecordingRenderer {
    pub fn new() -> Self { Self::default() }

    pub fn draws(&self) -> Vec<DrawRecord> { self.draws.borrow().clone() }

    pub fn draw_count(&self) -> usize { self.draws.borrow().len() }

    /// The most recent draw of the slot with the given ordinal.
    pub fn last_for(&self, ordinal: usize) -> Option<DrawRecord> {
        self.draws.borrow().iter().rev().find(|d| d.ordinal == ordinal).cloned()
    }

    pub fn clear(&self) { self.draws.borrow_mut().clear(); }
}

impl Renderer for RecordingRenderer {
    fn draw_slot(&self, surface: SurfaceId, view: &SlotView<'_>) {
        self.draws.borrow_mut().push(DrawRecord {
            surface,
            title: view.title.to_string(),
            icon: view.icon,
            ordinal: view.ordinal,
            selected: view.selected,
            bounds: view.bounds,
            content: view.content,
        });
    }
}
