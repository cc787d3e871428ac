use tracing::{debug, warn};

use crate::model::CandidateWindow;
use crate::sys::geometry::{Point, Rect};
use crate::sys::platform::{IconRef, Platform, PlatformError, PlatformRef, SurfaceId, WindowId};
use crate::ui::overlay::MonitorOverlay;
use crate::ui::renderer::{Renderer, SlotContent, SlotView};
use crate::ui::thumbnail::ThumbnailProxy;

/// One cell of the switcher grid: a candidate window, where it is shown and
/// whether its live preview survived.
pub struct ApplicationSlot {
    index: usize,
    window: CandidateWindow,
    bounds: Rect,
    surface: SurfaceId,
    surface_origin: Point,
    selected: bool,
    stale: bool,
    preview: Option<ThumbnailProxy>,
}

fn register(
    platform: &PlatformRef,
    window: &CandidateWindow,
    overlay: &MonitorOverlay,
    bounds: Rect,
) -> Option<ThumbnailProxy> {
    match ThumbnailProxy::create(
        platform.clone(),
        window,
        overlay.surface(),
        overlay.origin(),
        bounds,
    ) {
        Ok(proxy) => Some(proxy),
        Err(e) => {
            warn!(window = %window.id, "no live preview, showing icon: {e}");
            None
        }
    }
}

impl ApplicationSlot {
    /// Places `window` at `bounds` (screen coordinates) on `overlay`. A
    /// preview that cannot be registered leaves the slot showing the icon.
    pub fn create(
        platform: &PlatformRef,
        index: usize,
        window: CandidateWindow,
        bounds: Rect,
        overlay: &MonitorOverlay,
    ) -> ApplicationSlot {
        let preview = register(platform, &window, overlay, bounds);
        ApplicationSlot {
            index,
            window,
            bounds,
            surface: overlay.surface(),
            surface_origin: overlay.origin(),
            selected: false,
            stale: false,
            preview,
        }
    }

    pub fn index(&self) -> usize { self.index }

    /// The number shown on the slot and typed to pick it.
    pub fn ordinal(&self) -> usize { self.index + 1 }

    pub fn window(&self) -> &CandidateWindow { &self.window }

    pub fn window_id(&self) -> WindowId { self.window.id }

    pub fn bounds(&self) -> Rect { self.bounds }

    pub fn surface(&self) -> SurfaceId { self.surface }

    pub fn contains(&self, point: Point) -> bool { self.bounds.contains(point) }

    pub fn is_selected(&self) -> bool { self.selected }

    pub fn is_stale(&self) -> bool { self.stale }

    pub fn has_preview(&self) -> bool { self.preview.as_ref().is_some_and(|p| !p.is_released()) }

    pub fn content(&self) -> SlotContent {
        if self.stale {
            SlotContent::Stale
        } else if self.has_preview() {
            SlotContent::LivePreview
        } else {
            SlotContent::StaticIcon
        }
    }

    /// Returns whether the highlight changed.
    pub fn set_selected(&mut self, selected: bool) -> bool {
        let selected = selected && !self.stale;
        std::mem::replace(&mut self.selected, selected) != selected
    }

    pub fn set_icon(&mut self, icon: IconRef) -> bool {
        std::mem::replace(&mut self.window.icon, icon) != icon
    }

    /// The window went away. The slot keeps its place but can no longer be
    /// selected, and its preview is released. Returns false if it already was
    /// stale.
    pub fn mark_stale(&mut self) -> bool {
        if self.stale {
            return false;
        }
        debug!(window = %self.window.id, ordinal = self.ordinal(), "slot went stale");
        self.stale = true;
        self.selected = false;
        self.release_preview();
        true
    }

    /// Re-reads the restored geometry after the window was minimized or
    /// restored.
    pub fn refresh_source(&mut self, platform: &dyn Platform) -> Result<(), PlatformError> {
        if self.stale {
            return Ok(());
        }
        self.window.restored_bounds = platform.restored_bounds(self.window.id)?;
        self.window.minimized = platform.is_minimized(self.window.id)?;
        match self.preview.as_mut() {
            Some(proxy) => proxy.refresh_source(self.window.restored_bounds),
            None => Ok(()),
        }
    }

    /// Moves the slot after a relayout, re-registering the preview when the
    /// slot changed overlays.
    pub fn relocate(&mut self, platform: &PlatformRef, bounds: Rect, overlay: &MonitorOverlay) {
        self.bounds = bounds;
        let moved_surface = self.surface != overlay.surface();
        self.surface = overlay.surface();
        self.surface_origin = overlay.origin();
        if self.stale {
            return;
        }
        if moved_surface {
            self.release_preview();
            self.preview = register(platform, &self.window, overlay, bounds);
            return;
        }
        if let Some(proxy) = self.preview.as_mut()
            && let Err(e) = proxy.update_destination(bounds, self.surface_origin)
        {
            warn!(window = %self.window.id, "moving preview failed, showing icon: {e}");
            self.release_preview();
        }
    }

    pub fn release_preview(&mut self) {
        if let Some(mut proxy) = self.preview.take() {
            proxy.release();
        }
    }

    pub fn draw(&self, renderer: &dyn Renderer) {
        let view = SlotView {
            title: &self.window.title,
            icon: self.window.icon,
            ordinal: self.ordinal(),
            selected: self.selected,
            bounds: self.bounds.relative_to(self.surface_origin),
            content: self.content(),
        };
        renderer.draw_slot(self.surface, &view);
    }
}
