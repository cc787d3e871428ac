use tracing::{debug, warn};

use crate::model::CandidateWindow;
use crate::sys::geometry::{Point, Rect};
use crate::sys::platform::{PlatformError, PlatformRef, PreviewHandle, SurfaceId, WindowId};

/// A live compositor preview of one window, painted onto an overlay surface.
///
/// The native preview is released exactly once: by [`ThumbnailProxy::release`]
/// or, failing that, on drop.
pub struct ThumbnailProxy {
    platform: PlatformRef,
    window: WindowId,
    handle: Option<PreviewHandle>,
    surface: SurfaceId,
    surface_origin: Point,
    source: Rect,
    destination: Rect,
}

/// Window-relative source rectangle covering the whole restored window.
fn source_rect(restored_bounds: Rect) -> Rect {
    Rect::from_parts(Point::ZERO, restored_bounds.size())
}

impl ThumbnailProxy {
    /// Registers a preview of `window` on `surface`, showing it at
    /// `destination` (screen coordinates). `surface_origin` is the screen
    /// position of the surface's top-left corner.
    ///
    /// The source is taken from the window's restored bounds, so a minimized
    /// window previews at its normal size instead of its iconic stub.
    pub fn create(
        platform: PlatformRef,
        window: &CandidateWindow,
        surface: SurfaceId,
        surface_origin: Point,
        destination: Rect,
    ) -> Result<ThumbnailProxy, PlatformError> {
        let handle = platform.register_preview(window.id, surface)?;
        let proxy = ThumbnailProxy {
            platform,
            window: window.id,
            handle: Some(handle),
            surface,
            surface_origin,
            source: source_rect(window.restored_bounds),
            destination,
        };
        // On failure the proxy is dropped here, which unregisters the preview.
        proxy.push_rects()?;
        debug!(window = %window.id, ?handle, "registered preview");
        Ok(proxy)
    }

    pub fn window(&self) -> WindowId { self.window }

    pub fn surface(&self) -> SurfaceId { self.surface }

    pub fn handle(&self) -> Option<PreviewHandle> { self.handle }

    pub fn is_released(&self) -> bool { self.handle.is_none() }

    pub fn source_rect(&self) -> Rect { self.source }

    pub fn destination(&self) -> Rect { self.destination }

    /// Moves the preview. `surface_origin` changes when the overlay surface
    /// itself was moved.
    pub fn update_destination(
        &mut self,
        destination: Rect,
        surface_origin: Point,
    ) -> Result<(), PlatformError> {
        self.destination = destination;
        self.surface_origin = surface_origin;
        self.push_rects()
    }

    /// Re-reads the source size after the window was minimized or restored.
    pub fn refresh_source(&mut self, restored_bounds: Rect) -> Result<(), PlatformError> {
        self.source = source_rect(restored_bounds);
        self.push_rects()
    }

    fn push_rects(&self) -> Result<(), PlatformError> {
        let Some(handle) = self.handle else {
            return Ok(());
        };
        self.platform.update_preview_rect(
            handle,
            self.source,
            self.destination.relative_to(self.surface_origin),
        )
    }

    /// Unregisters the native preview. Safe to call any number of times, and
    /// safe after the source window has been destroyed.
    pub fn release(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match self.platform.unregister_preview(handle) {
            Ok(()) => debug!(window = %self.window, ?handle, "released preview"),
            Err(e) => warn!(window = %self.window, ?handle, "releasing preview failed: {e}"),
        }
    }
}

impl Drop for ThumbnailProxy {
    fn drop(&mut self) { self.release(); }
}
