use tracing::{debug, instrument, warn};

use crate::model::window::CandidateWindow;
use crate::sys::platform::{Platform, RawWindow, WindowId};

pub struct WindowFinder<'a> {
    platform: &'a dyn Platform,
}

/// Everything one enumeration pass found, both lists front-most first.
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Windows the user can switch to.
    pub candidates: Vec<CandidateWindow>,
    /// Visible tool windows (taskbars, docked toolbars), shown behind the
    /// overlay but never numbered.
    pub tool_windows: Vec<CandidateWindow>,
}

impl<'a> WindowFinder<'a> {
    pub fn new(platform: &'a dyn Platform) -> Self { WindowFinder { platform } }

    /// Snapshot of the switchable windows, front-most first, so index 0 is
    /// the window the user touched last.
    ///
    /// A failed platform query yields an empty snapshot rather than an error.
    pub fn snapshot(&self) -> Vec<CandidateWindow> { self.scan().candidates }

    #[instrument(name = "finder::scan", skip(self))]
    pub fn scan(&self) -> Snapshot {
        let windows = match self.platform.enumerate_windows() {
            Ok(windows) => windows,
            Err(e) => {
                warn!("window enumeration failed: {e}");
                return Snapshot::default();
            }
        };
        let shell = self.platform.shell_window();

        let mut snapshot = Snapshot::default();
        for raw in windows {
            let list = if is_candidate(&raw, shell) {
                &mut snapshot.candidates
            } else if is_background(&raw, shell) {
                &mut snapshot.tool_windows
            } else {
                continue;
            };
            let id = raw.id;
            match CandidateWindow::from_raw(self.platform, raw) {
                Ok(window) => list.push(window),
                Err(e) => debug!(%id, "skipping window: {e}"),
            }
        }
        debug!(
            candidates = snapshot.candidates.len(),
            tool_windows = snapshot.tool_windows.len(),
            "snapshot taken"
        );
        snapshot
    }
}

fn is_candidate(window: &RawWindow, shell: Option<WindowId>) -> bool {
    window.visible
        && !window.tool_window
        && !window.title.trim().is_empty()
        && Some(window.id) != shell
}

fn is_background(window: &RawWindow, shell: Option<WindowId>) -> bool {
    window.visible && window.tool_window && !window.minimized && Some(window.id) != shell
}
