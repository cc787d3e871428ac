use tracing::{debug, warn};

use crate::model::CandidateWindow;
use crate::sys::geometry::Rect;
use crate::sys::platform::{PlatformError, PlatformRef, SurfaceId};
use crate::ui::thumbnail::ThumbnailProxy;

/// A surface spanning the whole desktop, beneath the monitor overlays, that
/// keeps tool windows (taskbars, docked toolbars) visible in place while a
/// session is open.
///
/// Those areas are outside every overlay, so they still act as the dismiss
/// zone. Previews and the surface are released separately so the owner can
/// release every preview before any surface goes away.
pub struct Backdrop {
    platform: PlatformRef,
    bounds: Rect,
    surface: SurfaceId,
    previews: Vec<ThumbnailProxy>,
    destroyed: bool,
}

impl Backdrop {
    /// `tool_windows` is front-most first. They are registered back to
    /// front so the front-most ends up on top.
    pub fn create(
        platform: PlatformRef,
        bounds: Rect,
        tool_windows: &[CandidateWindow],
    ) -> Result<Backdrop, PlatformError> {
        let surface = platform.create_overlay_surface(bounds)?;
        let mut backdrop =
            Backdrop { platform, bounds, surface, previews: Vec::new(), destroyed: false };
        for window in tool_windows.iter().rev() {
            match ThumbnailProxy::create(
                backdrop.platform.clone(),
                window,
                surface,
                bounds.origin(),
                window.restored_bounds,
            ) {
                Ok(proxy) => backdrop.previews.push(proxy),
                Err(e) => warn!(window = %window.id, "tool window left out of backdrop: {e}"),
            }
        }
        debug!(?surface, previews = backdrop.previews.len(), "created backdrop");
        Ok(backdrop)
    }

    pub fn surface(&self) -> SurfaceId { self.surface }

    pub fn bounds(&self) -> Rect { self.bounds }

    /// Live tool window previews.
    pub fn preview_count(&self) -> usize {
        self.previews.iter().filter(|p| !p.is_released()).count()
    }

    /// Follows a display change: resizes the surface and re-reads where each
    /// tool window now sits. Tool windows that went away are dropped.
    pub fn relocate(&mut self, bounds: Rect) {
        if self.destroyed {
            return;
        }
        self.bounds = bounds;
        if let Err(e) = self.platform.set_surface_bounds(self.surface, bounds) {
            warn!(surface = ?self.surface, "could not resize backdrop: {e}");
        }
        let platform = self.platform.clone();
        self.previews.retain_mut(|proxy| {
            let moved = platform
                .window_rect(proxy.window())
                .and_then(|rect| proxy.update_destination(rect, bounds.origin()));
            if let Err(e) = moved {
                warn!(window = %proxy.window(), "dropping tool window preview: {e}");
                proxy.release();
                return false;
            }
            true
        });
    }

    pub fn release_previews(&mut self) {
        for proxy in &mut self.previews {
            proxy.release();
        }
    }

    /// Destroys the surface. Repeated calls are no-ops.
    pub fn destroy(&mut self) {
        if std::mem::replace(&mut self.destroyed, true) {
            return;
        }
        self.release_previews();
        match self.platform.destroy_overlay_surface(self.surface) {
            Ok(()) => debug!(surface = ?self.surface, "destroyed backdrop"),
            Err(e) => warn!(surface = ?self.surface, "destroying backdrop failed: {e}"),
        }
    }
}

impl Drop for Backdrop {
    fn drop(&mut self) { self.destroy(); }
}
