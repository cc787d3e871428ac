//! An in-memory window system.
//!
//! `HeadlessPlatform` keeps a scripted set of windows and monitors, hands out
//! real handles for surfaces, previews and hooks, and records every call made
//! against it. The replay tool drives sessions through it, and it is what the
//! session tests assert teardown order and release counts against.

use std::cell::RefCell;

use slotmap::{DefaultKey, Key, KeyData, SlotMap};
use tracing::{debug, trace};

use crate::common::collections::HashSet;
use crate::sys::event::{InputEvent, Propagation};
use crate::sys::geometry::Rect;
use crate::sys::platform::{
    HookCallback, HookHandle, HookKind, IconRef, Monitor, Platform, PlatformError,
    PreviewHandle, RawWindow, SurfaceId, WindowId, WindowPlacement,
};

#[derive(Debug, Clone)]
pub struct HeadlessWindow {
    pub raw: RawWindow,
    pub rect: Rect,
    pub placement: WindowPlacement,
}

impl HeadlessWindow {
    pub fn new(id: u64, title: &str, rect: Rect) -> Self {
        HeadlessWindow {
            raw: RawWindow {
                id: WindowId::new(id),
                title: title.to_string(),
                icon: IconRef::Default,
                visible: true,
                minimized: false,
                tool_window: false,
            },
            rect,
            placement: WindowPlacement {
                normal_rect: rect,
                restore_to_maximized: false,
                max_position: Default::default(),
            },
        }
    }

    /// Minimizes the window; its live rect collapses to an iconic stub while
    /// the placement keeps the restored geometry.
    pub fn minimized(mut self) -> Self {
        self.raw.minimized = true;
        self.rect = Rect::new(-32000, -32000, 160, 28);
        self
    }

    pub fn tool_window(mut self) -> Self {
        self.raw.tool_window = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.raw.visible = false;
        self
    }

    pub fn with_icon(mut self, icon: IconRef) -> Self {
        self.raw.icon = icon;
        self
    }

    pub fn with_placement(mut self, placement: WindowPlacement) -> Self {
        self.placement = placement;
        self
    }
}

/// Calls that change native state, in the order they were made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateSurface(SurfaceId),
    DestroySurface(SurfaceId),
    RegisterPreview { preview: PreviewHandle, source: WindowId, surface: SurfaceId },
    UpdatePreview { preview: PreviewHandle, source: Rect, destination: Rect },
    UnregisterPreview(PreviewHandle),
    InstallHook(HookHandle, HookKind),
    UninstallHook(HookHandle),
    BringToForeground(WindowId),
    Notify(String),
}

/// Failure injection.
#[derive(Debug, Clone, Default)]
pub struct Failures {
    pub enumerate: bool,
    pub previews: HashSet<WindowId>,
    pub hook: Option<HookKind>,
    pub foreground: bool,
    pub unregister_preview: bool,
    pub destroy_surface: bool,
}

#[derive(Debug, Clone)]
struct PreviewRecord {
    source: WindowId,
    surface: SurfaceId,
    rects: Option<(Rect, Rect)>,
}

struct InstalledHook {
    handle: HookHandle,
    kind: HookKind,
    callback: HookCallback,
}

#[derive(Default)]
struct State {
    windows: Vec<HeadlessWindow>,
    shell_window: Option<WindowId>,
    monitors: Vec<Monitor>,
    foreground: Option<WindowId>,
    surfaces: SlotMap<DefaultKey, Rect>,
    previews: SlotMap<DefaultKey, PreviewRecord>,
    hooks: Vec<InstalledHook>,
    next_hook: u64,
    failures: Failures,
    journal: Vec<Call>,
    invalid_releases: usize,
}

#[derive(Default)]
pub struct HeadlessPlatform {
    state: RefCell<State>,
}

fn to_key(raw: u64) -> DefaultKey { KeyData::from_ffi(raw).into() }

impl HeadlessPlatform {
    pub fn new() -> Self { Self::default() }

    pub fn add_monitor(&self, monitor: Monitor) { self.state.borrow_mut().monitors.push(monitor); }

    pub fn set_monitors(&self, monitors: Vec<Monitor>) {
        self.state.borrow_mut().monitors = monitors;
    }

    /// Adds a window behind every existing one.
    pub fn add_window(&self, window: HeadlessWindow) {
        self.state.borrow_mut().windows.push(window);
    }

    pub fn set_shell_window(&self, id: WindowId) { self.state.borrow_mut().shell_window = Some(id); }

    pub fn set_failures(&self, failures: Failures) { self.state.borrow_mut().failures = failures; }

    pub fn failures_mut(&self) -> std::cell::RefMut<'_, Failures> {
        std::cell::RefMut::map(self.state.borrow_mut(), |s| &mut s.failures)
    }

    /// Destroys a window as if its owner closed it.
    pub fn close_window(&self, id: WindowId) {
        self.state.borrow_mut().windows.retain(|w| w.raw.id != id);
    }

    pub fn set_minimized(&self, id: WindowId, minimized: bool) {
        let mut state = self.state.borrow_mut();
        if let Some(window) = state.windows.iter_mut().find(|w| w.raw.id == id) {
            window.raw.minimized = minimized;
            if minimized {
                window.rect = Rect::new(-32000, -32000, 160, 28);
            } else {
                window.rect = window.placement.normal_rect;
            }
        }
    }

    /// Delivers an event through the installed hooks of the matching kind,
    /// most recently installed first, stopping at the first consumer that
    /// handles it.
    pub fn dispatch(&self, event: &InputEvent) -> Propagation {
        let callbacks: Vec<HookCallback> = {
            let state = self.state.borrow();
            state
                .hooks
                .iter()
                .rev()
                .filter(|h| h.kind.accepts(event))
                .map(|h| h.callback.clone())
                .collect()
        };
        trace!(?event, hooks = callbacks.len(), "dispatching");
        for callback in callbacks {
            if callback(event).is_handled() {
                return Propagation::Handled;
            }
        }
        Propagation::Forward
    }

    pub fn journal(&self) -> Vec<Call> { self.state.borrow().journal.clone() }

    pub fn foreground(&self) -> Option<WindowId> { self.state.borrow().foreground }

    pub fn live_surfaces(&self) -> usize { self.state.borrow().surfaces.len() }

    pub fn live_previews(&self) -> usize { self.state.borrow().previews.len() }

    pub fn installed_hooks(&self) -> usize { self.state.borrow().hooks.len() }

    /// Number of release calls made with a handle that was not live.
    pub fn invalid_releases(&self) -> usize { self.state.borrow().invalid_releases }

    pub fn preview_rects(&self, preview: PreviewHandle) -> Option<(Rect, Rect)> {
        self.state.borrow().previews.get(to_key(preview.0)).and_then(|p| p.rects)
    }

    pub fn preview_source(&self, preview: PreviewHandle) -> Option<(WindowId, SurfaceId)> {
        self.state.borrow().previews.get(to_key(preview.0)).map(|p| (p.source, p.surface))
    }

    pub fn surface_bounds(&self, surface: SurfaceId) -> Option<Rect> {
        self.state.borrow().surfaces.get(to_key(surface.0)).copied()
    }

    fn with_window<T>(
        &self,
        id: WindowId,
        f: impl FnOnce(&HeadlessWindow) -> T,
    ) -> Result<T, PlatformError> {
        let state = self.state.borrow();
        state.windows.iter().find(|w| w.raw.id == id).map(f).ok_or(PlatformError::WindowGone(id))
    }

    fn record(&self, call: Call) {
        debug!(?call);
        self.state.borrow_mut().journal.push(call);
    }
}

impl Platform for HeadlessPlatform {
    fn enumerate_windows(&self) -> Result<Vec<RawWindow>, PlatformError> {
        let state = self.state.borrow();
        if state.failures.enumerate {
            return Err(PlatformError::Query("enumeration disabled".into()));
        }
        Ok(state.windows.iter().map(|w| w.raw.clone()).collect())
    }

    fn shell_window(&self) -> Option<WindowId> { self.state.borrow().shell_window }

    fn is_window(&self, id: WindowId) -> bool {
        self.state.borrow().windows.iter().any(|w| w.raw.id == id)
    }

    fn is_minimized(&self, id: WindowId) -> Result<bool, PlatformError> {
        self.with_window(id, |w| w.raw.minimized)
    }

    fn window_rect(&self, id: WindowId) -> Result<Rect, PlatformError> {
        self.with_window(id, |w| w.rect)
    }

    fn window_placement(&self, id: WindowId) -> Result<WindowPlacement, PlatformError> {
        self.with_window(id, |w| w.placement)
    }

    fn monitors(&self) -> Result<Vec<Monitor>, PlatformError> {
        Ok(self.state.borrow().monitors.clone())
    }

    fn bring_to_foreground(&self, id: WindowId) -> Result<(), PlatformError> {
        self.record(Call::BringToForeground(id));
        if self.state.borrow().failures.foreground {
            return Err(PlatformError::Query("foreground change refused".into()));
        }
        let mut state = self.state.borrow_mut();
        let Some(idx) = state.windows.iter().position(|w| w.raw.id == id) else {
            return Err(PlatformError::WindowGone(id));
        };
        let mut window = state.windows.remove(idx);
        if window.raw.minimized {
            window.raw.minimized = false;
            window.rect = window.placement.normal_rect;
        }
        state.windows.insert(0, window);
        state.foreground = Some(id);
        Ok(())
    }

    fn create_overlay_surface(&self, bounds: Rect) -> Result<SurfaceId, PlatformError> {
        let surface = SurfaceId(self.state.borrow_mut().surfaces.insert(bounds).data().as_ffi());
        self.record(Call::CreateSurface(surface));
        Ok(surface)
    }

    fn set_surface_bounds(&self, surface: SurfaceId, bounds: Rect) -> Result<(), PlatformError> {
        let mut state = self.state.borrow_mut();
        let slot = state.surfaces.get_mut(to_key(surface.0)).ok_or(PlatformError::InvalidHandle)?;
        *slot = bounds;
        Ok(())
    }

    fn destroy_overlay_surface(&self, surface: SurfaceId) -> Result<(), PlatformError> {
        self.record(Call::DestroySurface(surface));
        let mut state = self.state.borrow_mut();
        if state.failures.destroy_surface {
            return Err(PlatformError::InvalidHandle);
        }
        if state.surfaces.remove(to_key(surface.0)).is_none() {
            state.invalid_releases += 1;
            return Err(PlatformError::InvalidHandle);
        }
        Ok(())
    }

    fn register_preview(
        &self,
        source: WindowId,
        destination: SurfaceId,
    ) -> Result<PreviewHandle, PlatformError> {
        let preview = {
            let mut state = self.state.borrow_mut();
            if state.failures.previews.contains(&source)
                || !state.windows.iter().any(|w| w.raw.id == source)
            {
                return Err(PlatformError::PreviewRegistration(source));
            }
            if !state.surfaces.contains_key(to_key(destination.0)) {
                return Err(PlatformError::InvalidHandle);
            }
            let key = state.previews.insert(PreviewRecord {
                source,
                surface: destination,
                rects: None,
            });
            PreviewHandle(key.data().as_ffi())
        };
        self.record(Call::RegisterPreview { preview, source, surface: destination });
        Ok(preview)
    }

    fn update_preview_rect(
        &self,
        preview: PreviewHandle,
        source: Rect,
        destination: Rect,
    ) -> Result<(), PlatformError> {
        {
            let mut state = self.state.borrow_mut();
            let record =
                state.previews.get_mut(to_key(preview.0)).ok_or(PlatformError::InvalidHandle)?;
            record.rects = Some((source, destination));
        }
        self.record(Call::UpdatePreview { preview, source, destination });
        Ok(())
    }

    fn unregister_preview(&self, preview: PreviewHandle) -> Result<(), PlatformError> {
        self.record(Call::UnregisterPreview(preview));
        let mut state = self.state.borrow_mut();
        if state.previews.remove(to_key(preview.0)).is_none() {
            state.invalid_releases += 1;
            return Err(PlatformError::InvalidHandle);
        }
        if state.failures.unregister_preview {
            return Err(PlatformError::Query("compositor rejected release".into()));
        }
        Ok(())
    }

    fn install_hook(
        &self,
        kind: HookKind,
        callback: HookCallback,
    ) -> Result<HookHandle, PlatformError> {
        let handle = {
            let mut state = self.state.borrow_mut();
            if state.failures.hook == Some(kind) {
                return Err(PlatformError::HookInstall(kind));
            }
            state.next_hook += 1;
            let handle = HookHandle(state.next_hook);
            state.hooks.push(InstalledHook { handle, kind, callback });
            handle
        };
        self.record(Call::InstallHook(handle, kind));
        Ok(handle)
    }

    fn uninstall_hook(&self, hook: HookHandle) -> Result<(), PlatformError> {
        self.record(Call::UninstallHook(hook));
        // The callback may be the caller; drop it only after the borrow ends.
        let removed = {
            let mut state = self.state.borrow_mut();
            match state.hooks.iter().position(|h| h.handle == hook) {
                Some(idx) => Some(state.hooks.remove(idx)),
                None => {
                    state.invalid_releases += 1;
                    None
                }
            }
        };
        match removed {
            Some(_) => Ok(()),
            None => Err(PlatformError::InvalidHandle),
        }
    }

    fn notify_user(&self, title: &str, message: &str) {
        self.record(Call::Notify(format!("{title}: {message}")));
    }
}
