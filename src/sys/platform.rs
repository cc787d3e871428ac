//! The native window-system surface consumed by the switcher core.
//!
//! Everything the core needs from the operating system goes through
//! [`Platform`]: enumerating top-level windows, compositor previews, overlay
//! surfaces and process-wide input hooks. Backends own the raw handles; the
//! core only ever sees the opaque ids defined here.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

use crate::sys::event::{InputEvent, Propagation};
use crate::sys::geometry::{Point, Rect};
use crate::sys::screen;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct WindowId(u64);

impl WindowId {
    pub const fn new(raw: u64) -> Self { WindowId(raw) }

    pub fn get(&self) -> u64 { self.0 }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorId(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PreviewHandle(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct HookHandle(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum HookKind {
    Keyboard,
    Mouse,
}

impl HookKind {
    pub fn accepts(self, event: &InputEvent) -> bool {
        matches!(
            (self, event),
            (HookKind::Keyboard, InputEvent::Key(_)) | (HookKind::Mouse, InputEvent::Mouse(_))
        )
    }
}

/// Reference to the icon shown next to a window title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IconRef {
    /// The application's own default icon.
    #[default]
    Default,
    Handle(u64),
}

/// One top-level window as reported by the window system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawWindow {
    pub id: WindowId,
    pub title: String,
    #[serde(default)]
    pub icon: IconRef,
    pub visible: bool,
    #[serde(default)]
    pub minimized: bool,
    /// Taskbars, docked toolbars and other tool windows. They are never
    /// switch targets but stay visible behind the overlay.
    #[serde(default)]
    pub tool_window: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: MonitorId,
    pub bounds: Rect,
    /// Bounds minus taskbars and docked toolbars.
    pub work_area: Rect,
    #[serde(default)]
    pub primary: bool,
}

/// The saved show-state of a window, used to recover the geometry of a
/// minimized window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPlacement {
    pub normal_rect: Rect,
    #[serde(default)]
    pub restore_to_maximized: bool,
    #[serde(default)]
    pub max_position: Point,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("window query failed: {0}")]
    Query(String),
    #[error("window {0} no longer exists")]
    WindowGone(WindowId),
    #[error("preview registration for window {0} failed")]
    PreviewRegistration(WindowId),
    #[error("could not install {0} hook")]
    HookInstall(HookKind),
    #[error("could not create overlay surface")]
    SurfaceCreation,
    #[error("invalid or already released handle")]
    InvalidHandle,
}

/// Consumer side of an input hook. Runs synchronously on the thread that
/// installed it and must return quickly.
pub type HookCallback = Rc<dyn Fn(&InputEvent) -> Propagation>;

pub trait Platform {
    /// Top-level windows in z-order, front-most first.
    fn enumerate_windows(&self) -> Result<Vec<RawWindow>, PlatformError>;

    /// The desktop/shell window, which is never a switch target.
    fn shell_window(&self) -> Option<WindowId>;

    fn is_window(&self, id: WindowId) -> bool;

    fn is_minimized(&self, id: WindowId) -> Result<bool, PlatformError>;

    /// Current on-screen geometry. For a minimized window this is the iconic
    /// rectangle, which is useless as a preview source.
    fn window_rect(&self, id: WindowId) -> Result<Rect, PlatformError>;

    fn window_placement(&self, id: WindowId) -> Result<WindowPlacement, PlatformError>;

    fn monitors(&self) -> Result<Vec<Monitor>, PlatformError>;

    /// Restores the window if it is minimized, then raises it.
    fn bring_to_foreground(&self, id: WindowId) -> Result<(), PlatformError>;

    fn create_overlay_surface(&self, bounds: Rect) -> Result<SurfaceId, PlatformError>;

    fn set_surface_bounds(&self, surface: SurfaceId, bounds: Rect) -> Result<(), PlatformError>;

    fn destroy_overlay_surface(&self, surface: SurfaceId) -> Result<(), PlatformError>;

    fn register_preview(
        &self,
        source: WindowId,
        destination: SurfaceId,
    ) -> Result<PreviewHandle, PlatformError>;

    /// `source` is window-relative, `destination` is surface-relative.
    fn update_preview_rect(
        &self,
        preview: PreviewHandle,
        source: Rect,
        destination: Rect,
    ) -> Result<(), PlatformError>;

    /// Not idempotent: releasing the same handle twice is an error or worse.
    fn unregister_preview(&self, preview: PreviewHandle) -> Result<(), PlatformError>;

    /// Installs a process-wide hook. Implementations must keep `callback`
    /// alive for the duration of any dispatch already in flight, even if the
    /// hook is uninstalled from inside that callback.
    fn install_hook(
        &self,
        kind: HookKind,
        callback: HookCallback,
    ) -> Result<HookHandle, PlatformError>;

    fn uninstall_hook(&self, hook: HookHandle) -> Result<(), PlatformError>;

    /// Shows a transient notification to the user (a balloon tip or similar).
    fn notify_user(&self, title: &str, message: &str);

    /// Geometry the window would have if it were not minimized.
    fn restored_bounds(&self, id: WindowId) -> Result<Rect, PlatformError> {
        if !self.is_minimized(id)? {
            return self.window_rect(id);
        }
        let placement = self.window_placement(id)?;
        if placement.restore_to_maximized {
            // Maximized windows usually sit a few pixels off-screen, so fall
            // back to the nearest monitor.
            let monitors = self.monitors()?;
            if let Some(monitor) = screen::monitor_nearest(&monitors, placement.max_position) {
                return Ok(monitor.work_area);
            }
        }
        Ok(placement.normal_rect)
    }
}

pub type PlatformRef = Rc<dyn Platform>;
