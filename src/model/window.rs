use serde::{Deserialize, Serialize};

use crate::sys::geometry::Rect;
use crate::sys::platform::{IconRef, Platform, PlatformError, RawWindow, WindowId};

/// A window that can be switched to, captured once when a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateWindow {
    pub id: WindowId,
    pub title: String,
    pub icon: IconRef,
    /// Screen rectangle the window occupies when not minimized.
    pub restored_bounds: Rect,
    pub minimized: bool,
}

impl CandidateWindow {
    pub fn from_raw(platform: &dyn Platform, raw: RawWindow) -> Result<Self, PlatformError> {
        let restored_bounds = platform.restored_bounds(raw.id)?;
        Ok(CandidateWindow {
            id: raw.id,
            title: raw.title,
            icon: raw.icon,
            restored_bounds,
            minimized: raw.minimized,
        })
    }

    /// Whether the window still exists. Candidates can vanish at any point
    /// during a session.
    pub fn is_alive(&self, platform: &dyn Platform) -> bool { platform.is_window(self.id) }
}
