use tracing::{debug, warn};

use crate::sys::geometry::{Point, Rect};
use crate::sys::platform::{Monitor, PlatformError, PlatformRef, SurfaceId};

/// The transparent full-screen surface covering one monitor's work area.
///
/// Anything outside the work area (taskbars, docked toolbars) is not covered
/// by any overlay; clicks there dismiss the session.
pub struct MonitorOverlay {
    platform: PlatformRef,
    monitor: Monitor,
    surface: SurfaceId,
    destroyed: bool,
}

impl MonitorOverlay {
    pub fn create(platform: PlatformRef, monitor: &Monitor) -> Result<Self, PlatformError> {
        let surface = platform.create_overlay_surface(monitor.work_area)?;
        debug!(monitor = ?monitor.id, ?surface, "created overlay");
        Ok(MonitorOverlay { platform, monitor: *monitor, surface, destroyed: false })
    }

    pub fn surface(&self) -> SurfaceId { self.surface }

    pub fn monitor(&self) -> &Monitor { &self.monitor }

    pub fn coverage(&self) -> Rect { self.monitor.work_area }

    /// Screen position of the surface's top-left corner.
    pub fn origin(&self) -> Point { self.coverage().origin() }

    pub fn contains(&self, point: Point) -> bool { self.coverage().contains(point) }

    pub fn contains_rect(&self, rect: &Rect) -> bool { self.coverage().contains_rect(rect) }

    pub fn is_destroyed(&self) -> bool { self.destroyed }

    /// Follows a monitor whose geometry changed.
    pub fn set_monitor(&mut self, monitor: &Monitor) -> Result<(), PlatformError> {
        self.monitor = *monitor;
        if self.destroyed {
            return Ok(());
        }
        self.platform.set_surface_bounds(self.surface, monitor.work_area)
    }

    /// Destroys the surface. Repeated calls are no-ops.
    pub fn destroy(&mut self) {
        if std::mem::replace(&mut self.destroyed, true) {
            return;
        }
        match self.platform.destroy_overlay_surface(self.surface) {
            Ok(()) => debug!(surface = ?self.surface, "destroyed overlay"),
            Err(e) => warn!(surface = ?self.surface, "destroying overlay failed: {e}"),
        }
    }
}

impl Drop for MonitorOverlay {
    fn drop(&mut self) { self.destroy(); }
}
