//! One switcher interaction, from hotkey to commit or cancel.
//!
//! A [`Session`] owns every native resource the interaction needs: one
//! [`MonitorOverlay`] per monitor, one [`ApplicationSlot`] (with its live
//! preview) per candidate window, a [`Backdrop`] keeping tool windows visible,
//! and the [`GlobalInputHooks`] feeding it input. State only moves forward, `Active -> Ending -> Disposed`, and
//! everything is released exactly once on the way to `Disposed`:
//! previews first, then hooks, then overlay surfaces.
//!
//! Input arrives synchronously from the hooks. The hook callbacks only hold a
//! weak reference to the session state and refuse to re-enter it, so an event
//! fired from inside a handler (or after the session is gone) is forwarded
//! untouched.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::Serialize;
use static_assertions::assert_not_impl_any;
use strum::Display;
use thiserror::Error;
use tracing::{debug, info, instrument, trace, warn};

use crate::actor::input_hooks::{GlobalInputHooks, KeyHandler, MouseHandler};
use crate::common::config::Config;
use crate::layout_engine::{GridLayout, LayoutError};
use crate::model::{CandidateWindow, WindowFinder};
use crate::sys::event::{Key, KeyEvent, KeyState, Modifiers, MouseAction, MouseEvent, Propagation};
use crate::sys::geometry::{Point, Rect};
use crate::sys::platform::{IconRef, Monitor, PlatformError, PlatformRef, WindowId};
use crate::sys::screen;
use crate::ui::backdrop::Backdrop;
use crate::ui::overlay::MonitorOverlay;
use crate::ui::renderer::Renderer;
use crate::ui::slot::ApplicationSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Ending,
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Committed { window: WindowId, index: usize },
    Cancelled,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not install input hooks: {0}")]
    HookInstall(#[source] PlatformError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

pub type FinishHandler = Rc<dyn Fn(Outcome)>;

pub struct Session {
    inner: Rc<RefCell<SessionInner>>,
}

assert_not_impl_any!(Session: Send, Sync);

struct SessionInner {
    platform: PlatformRef,
    renderer: Rc<dyn Renderer>,
    layout: GridLayout,
    swallow_clicks: bool,
    state: SessionState,
    outcome: Option<Outcome>,
    slots: Vec<ApplicationSlot>,
    overlays: Vec<MonitorOverlay>,
    backdrop: Option<Backdrop>,
    hooks: Option<GlobalInputHooks>,
    hovered: Option<usize>,
    on_finish: Option<FinishHandler>,
    finish_reported: bool,
}

/// Runs `f` against the session state unless it is already borrowed further
/// up the stack. The finish handler, if due, runs after the borrow ends.
fn dispatch<R>(cell: &RefCell<SessionInner>, f: impl FnOnce(&mut SessionInner) -> R) -> Option<R> {
    let Ok(mut inner) = cell.try_borrow_mut() else {
        trace!("session busy, not re-entering");
        return None;
    };
    let result = f(&mut *inner);
    let report = inner.take_finish_report();
    drop(inner);
    if let Some((handler, outcome)) = report {
        handler(outcome);
    }
    Some(result)
}

fn dispatch_input(
    weak: &Weak<RefCell<SessionInner>>,
    f: impl FnOnce(&mut SessionInner) -> Propagation,
) -> Propagation {
    let Some(cell) = weak.upgrade() else {
        return Propagation::Forward;
    };
    dispatch(&cell, f).unwrap_or(Propagation::Forward)
}

fn overlay_for(overlays: &[MonitorOverlay], rect: Rect) -> Option<&MonitorOverlay> {
    overlays
        .iter()
        .find(|o| o.contains_rect(&rect))
        .or_else(|| overlays.iter().find(|o| o.contains(rect.origin())))
        .or_else(|| overlays.first())
}

impl Session {
    /// Snapshots the candidate windows and opens the overlays.
    ///
    /// With no candidates the returned session is already `Disposed` with a
    /// cancelled outcome and holds no resources. On error nothing is left
    /// behind.
    #[instrument(name = "session::create", skip_all)]
    pub fn create(
        platform: PlatformRef,
        renderer: Rc<dyn Renderer>,
        config: &Config,
    ) -> Result<Session, SessionError> {
        let layout = GridLayout::from(config.settings.layout);
        let snapshot = WindowFinder::new(&*platform).scan();
        let candidates = snapshot.candidates;

        let mut inner = SessionInner {
            platform: platform.clone(),
            renderer,
            layout,
            swallow_clicks: config.settings.input.swallow_clicks,
            state: SessionState::Active,
            outcome: None,
            slots: Vec::new(),
            overlays: Vec::new(),
            backdrop: None,
            hooks: None,
            hovered: None,
            on_finish: None,
            finish_reported: false,
        };

        if candidates.is_empty() {
            info!("no candidate windows, nothing to show");
            inner.finish(Outcome::Cancelled);
            return Ok(Session { inner: Rc::new(RefCell::new(inner)) });
        }

        let monitors = screen::ordered_monitors(&*platform)?;
        let rects = inner.compute_layout(candidates.len(), &monitors)?;
        // Created first so it sits beneath the overlays.
        if !snapshot.tool_windows.is_empty()
            && let Some(bounds) = screen::desktop_bounds(&monitors)
        {
            match Backdrop::create(platform.clone(), bounds, &snapshot.tool_windows) {
                Ok(backdrop) => inner.backdrop = Some(backdrop),
                Err(e) => warn!("tool windows will not be shown: {e}"),
            }
        }
        for monitor in &monitors {
            inner.overlays.push(MonitorOverlay::create(platform.clone(), monitor)?);
        }
        inner.populate(candidates, &rects);

        let inner = Rc::new(RefCell::new(inner));
        let weak = Rc::downgrade(&inner);
        let on_key: KeyHandler = {
            let weak = weak.clone();
            Rc::new(move |event: &KeyEvent| dispatch_input(&weak, |s| s.on_key(event)))
        };
        let on_mouse_move: MouseHandler = {
            let weak = weak.clone();
            Rc::new(move |event: &MouseEvent| {
                dispatch_input(&weak, |s| s.on_mouse_move(event))
            })
        };
        let on_mouse_click: MouseHandler = Rc::new(move |event: &MouseEvent| {
            dispatch_input(&weak, |s| s.on_mouse_click(event))
        });

        let hooks = GlobalInputHooks::install(
            platform,
            config.settings.input.callback_budget(),
            on_key,
            on_mouse_move,
            on_mouse_click,
        );
        let mut state = inner.borrow_mut();
        match hooks {
            Ok(hooks) => state.hooks = Some(hooks),
            Err(e) => {
                warn!("input hooks unavailable: {e}");
                state.teardown();
                return Err(SessionError::HookInstall(e));
            }
        }
        state.redraw_all();
        info!(slots = state.slots.len(), overlays = state.overlays.len(), "session active");
        drop(state);

        Ok(Session { inner })
    }

    pub fn state(&self) -> SessionState { self.inner.borrow().state }

    pub fn is_active(&self) -> bool { self.state() == SessionState::Active }

    pub fn outcome(&self) -> Option<Outcome> { self.inner.borrow().outcome }

    /// The highlighted slot, if any.
    pub fn selected_index(&self) -> Option<usize> { self.inner.borrow().hovered }

    pub fn slot_count(&self) -> usize { self.inner.borrow().slots.len() }

    pub fn slot_windows(&self) -> Vec<WindowId> {
        self.inner.borrow().slots.iter().map(ApplicationSlot::window_id).collect()
    }

    pub fn slot_bounds(&self) -> Vec<Rect> {
        self.inner.borrow().slots.iter().map(ApplicationSlot::bounds).collect()
    }

    pub fn stale_slots(&self) -> Vec<usize> {
        self.inner.borrow().slots.iter().filter(|s| s.is_stale()).map(|s| s.index()).collect()
    }

    pub fn overlay_count(&self) -> usize { self.inner.borrow().overlays.len() }

    /// Live tool window previews on the backdrop.
    pub fn background_count(&self) -> usize {
        self.inner.borrow().backdrop.as_ref().map_or(0, Backdrop::preview_count)
    }

    /// Registers the callback that receives the outcome once the session is
    /// disposed. If that already happened the handler runs right away.
    pub fn set_finish_handler(&self, handler: FinishHandler) {
        dispatch(&self.inner, |s| s.on_finish = Some(handler));
    }

    pub fn cancel(&self) { dispatch(&self.inner, |s| s.cancel()); }

    /// Tears everything down. An active session counts as cancelled.
    pub fn dispose(&self) {
        dispatch(&self.inner, |s| s.finish(Outcome::Cancelled));
    }

    pub fn handle_key(&self, event: &KeyEvent) -> Propagation {
        dispatch(&self.inner, |s| s.on_key(event)).unwrap_or(Propagation::Forward)
    }

    pub fn handle_mouse_move(&self, event: &MouseEvent) -> Propagation {
        dispatch(&self.inner, |s| s.on_mouse_move(event)).unwrap_or(Propagation::Forward)
    }

    pub fn handle_mouse_click(&self, event: &MouseEvent) -> Propagation {
        dispatch(&self.inner, |s| s.on_mouse_click(event)).unwrap_or(Propagation::Forward)
    }

    #[instrument(skip(self))]
    pub fn handle_window_closed(&self, window: WindowId) {
        dispatch(&self.inner, |s| s.on_window_closed(window));
    }

    #[instrument(skip(self))]
    pub fn handle_icon_resolved(&self, window: WindowId, icon: IconRef) {
        dispatch(&self.inner, |s| s.on_icon_resolved(window, icon));
    }

    #[instrument(skip(self))]
    pub fn handle_window_state_changed(&self, window: WindowId) {
        dispatch(&self.inner, |s| s.on_window_state_changed(window));
    }

    #[instrument(skip(self))]
    pub fn handle_display_change(&self) { dispatch(&self.inner, |s| s.on_display_change()); }
}

impl SessionInner {
    fn compute_layout(&self, count: usize, monitors: &[Monitor]) -> Result<Vec<Rect>, LayoutError> {
        let areas: Vec<Rect> = monitors.iter().map(|m| m.work_area).collect();
        self.layout.compute(count, &areas)
    }

    fn populate(&mut self, candidates: Vec<CandidateWindow>, rects: &[Rect]) {
        for (index, (window, &rect)) in candidates.into_iter().zip(rects).enumerate() {
            let Some(overlay) = overlay_for(&self.overlays, rect) else { break };
            let slot = ApplicationSlot::create(&self.platform, index, window, rect, overlay);
            self.slots.push(slot);
        }
    }

    fn is_active(&self) -> bool { self.state == SessionState::Active }

    fn redraw_all(&self) {
        for slot in &self.slots {
            slot.draw(&*self.renderer);
        }
    }

    fn redraw(&self, index: usize) {
        if let Some(slot) = self.slots.get(index) {
            slot.draw(&*self.renderer);
        }
    }

    #[instrument(level = "trace", skip(self))]
    fn on_key(&mut self, event: &KeyEvent) -> Propagation {
        if !self.is_active() || event.injected {
            return Propagation::Forward;
        }
        if event.key == Key::F4 && event.modifiers.contains(Modifiers::ALT) {
            trace!("swallowed Alt+F4");
            return Propagation::Handled;
        }
        match event.key {
            Key::Escape => {
                if event.state == KeyState::Down {
                    self.cancel();
                }
                Propagation::Handled
            }
            key => match key.digit() {
                Some(digit @ 1..=9) => {
                    if event.state == KeyState::Down {
                        self.pick(usize::from(digit) - 1);
                    }
                    Propagation::Handled
                }
                _ => Propagation::Forward,
            },
        }
    }

    #[instrument(level = "trace", skip(self))]
    fn on_mouse_move(&mut self, event: &MouseEvent) -> Propagation {
        if self.is_active() {
            self.hover_at(event.point);
        }
        Propagation::Forward
    }

    #[instrument(level = "trace", skip(self))]
    fn on_mouse_click(&mut self, event: &MouseEvent) -> Propagation {
        if !self.is_active() {
            return Propagation::Forward;
        }
        if let MouseAction::Down(_) = event.action {
            if self.in_dismiss_zone(event.point) {
                debug!(point = ?event.point, "click in dismiss zone");
                self.cancel();
            } else {
                self.hover_at(event.point);
                match self.hovered {
                    Some(index) => self.commit(index),
                    None => self.cancel(),
                }
            }
        }
        if self.swallow_clicks { Propagation::Handled } else { Propagation::Forward }
    }

    /// Anywhere not covered by an overlay or a slot, such as a taskbar.
    fn in_dismiss_zone(&self, point: Point) -> bool {
        !self.overlays.iter().any(|o| o.contains(point))
            && !self.slots.iter().any(|s| s.contains(point))
    }

    fn hover_at(&mut self, point: Point) {
        let mut target = self.slots.iter().position(|s| s.contains(point) && !s.is_stale());
        if let Some(index) = target
            && !self.slots[index].window().is_alive(&*self.platform)
        {
            self.mark_stale(index);
            target = None;
        }
        self.set_hovered(target);
    }

    fn set_hovered(&mut self, target: Option<usize>) {
        if self.hovered == target {
            return;
        }
        if let Some(old) = self.hovered.take()
            && self.slots[old].set_selected(false)
        {
            self.redraw(old);
        }
        if let Some(new) = target
            && self.slots[new].set_selected(true)
        {
            self.hovered = Some(new);
            self.redraw(new);
        }
    }

    fn mark_stale(&mut self, index: usize) {
        if !self.slots[index].mark_stale() {
            return;
        }
        if self.hovered == Some(index) {
            self.hovered = None;
        }
        self.redraw(index);
    }

    /// A digit press. Picking a slot that does not exist or whose window is
    /// gone does nothing.
    fn pick(&mut self, index: usize) {
        let Some(slot) = self.slots.get(index) else {
            debug!(index, "no slot for digit");
            return;
        };
        if slot.is_stale() {
            return;
        }
        if !slot.window().is_alive(&*self.platform) {
            self.mark_stale(index);
            return;
        }
        self.commit(index);
    }

    fn commit(&mut self, index: usize) {
        let slot = &self.slots[index];
        let window = slot.window_id();
        if slot.is_stale() || !slot.window().is_alive(&*self.platform) {
            debug!(index, "hovered window is gone, cancelling");
            self.mark_stale(index);
            self.cancel();
            return;
        }
        self.state = SessionState::Ending;
        self.set_hovered(Some(index));
        info!(%window, index, "committing");
        if let Err(e) = self.platform.bring_to_foreground(window) {
            warn!(%window, "could not raise window: {e}");
        }
        self.finish(Outcome::Committed { window, index });
    }

    fn cancel(&mut self) {
        if !self.is_active() {
            return;
        }
        self.state = SessionState::Ending;
        info!("cancelled");
        self.finish(Outcome::Cancelled);
    }

    /// Records the outcome (the first one wins) and tears down.
    fn finish(&mut self, outcome: Outcome) {
        if self.state == SessionState::Disposed {
            return;
        }
        self.outcome.get_or_insert(outcome);
        self.teardown();
    }

    /// Releases previews (slots and backdrop), then hooks, then surfaces.
    /// Failures are logged by each resource and never stop the remaining
    /// steps.
    fn teardown(&mut self) {
        if self.state == SessionState::Disposed {
            return;
        }
        self.state = SessionState::Disposed;
        for slot in &mut self.slots {
            slot.release_preview();
        }
        if let Some(backdrop) = &mut self.backdrop {
            backdrop.release_previews();
        }
        if let Some(mut hooks) = self.hooks.take() {
            hooks.uninstall();
        }
        for overlay in &mut self.overlays {
            overlay.destroy();
        }
        if let Some(backdrop) = &mut self.backdrop {
            backdrop.destroy();
        }
        debug!("session disposed");
    }

    fn take_finish_report(&mut self) -> Option<(FinishHandler, Outcome)> {
        if self.finish_reported || self.state != SessionState::Disposed {
            return None;
        }
        let outcome = self.outcome?;
        let handler = self.on_finish.clone()?;
        self.finish_reported = true;
        Some((handler, outcome))
    }

    fn slot_for(&self, window: WindowId) -> Option<usize> {
        self.slots.iter().position(|s| s.window_id() == window)
    }

    fn on_window_closed(&mut self, window: WindowId) {
        if !self.is_active() {
            return;
        }
        if let Some(index) = self.slot_for(window) {
            self.mark_stale(index);
        }
    }

    fn on_icon_resolved(&mut self, window: WindowId, icon: IconRef) {
        if !self.is_active() {
            return;
        }
        if let Some(index) = self.slot_for(window)
            && self.slots[index].set_icon(icon)
        {
            self.redraw(index);
        }
    }

    fn on_window_state_changed(&mut self, window: WindowId) {
        if !self.is_active() {
            return;
        }
        let Some(index) = self.slot_for(window) else { return };
        match self.slots[index].refresh_source(&*self.platform) {
            Ok(()) => self.redraw(index),
            Err(PlatformError::WindowGone(_)) => self.mark_stale(index),
            Err(e) => warn!(%window, "could not refresh preview source: {e}"),
        }
    }

    /// Re-lays out over the new monitor geometry. A change in the number of
    /// monitors ends the session instead.
    fn on_display_change(&mut self) {
        if !self.is_active() {
            return;
        }
        let monitors = match screen::ordered_monitors(&*self.platform) {
            Ok(monitors) => monitors,
            Err(e) => {
                warn!("could not read monitors after display change: {e}");
                self.cancel();
                return;
            }
        };
        if monitors.len() != self.overlays.len() {
            info!(before = self.overlays.len(), after = monitors.len(), "monitor count changed");
            self.cancel();
            return;
        }
        let rects = match self.compute_layout(self.slots.len(), &monitors) {
            Ok(rects) => rects,
            Err(e) => {
                warn!("relayout failed: {e}");
                self.cancel();
                return;
            }
        };
        if let Some(backdrop) = &mut self.backdrop
            && let Some(bounds) = screen::desktop_bounds(&monitors)
        {
            backdrop.relocate(bounds);
        }
        for (overlay, monitor) in self.overlays.iter_mut().zip(&monitors) {
            if let Err(e) = overlay.set_monitor(monitor) {
                warn!(monitor = ?monitor.id, "could not move overlay: {e}");
            }
        }
        for (slot, &rect) in self.slots.iter_mut().zip(&rects) {
            if let Some(overlay) = overlay_for(&self.overlays, rect) {
                slot.relocate(&self.platform, rect, overlay);
            }
        }
        self.redraw_all();
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) { self.teardown(); }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::sys::event::{InputEvent, MouseButton};
    use crate::sys::headless::{Call, Failures, HeadlessPlatform, HeadlessWindow};
    use crate::sys::platform::{HookKind, MonitorId, SurfaceId};
    use crate::ui::renderer::{RecordingRenderer, SlotContent, SlotView};

    fn monitor(id: u32, bounds: Rect, primary: bool) -> Monitor {
        Monitor { id: MonitorId(id), bounds, work_area: bounds, primary }
    }

    fn platform_with(windows: usize) -> Rc<HeadlessPlatform> {
        let platform = Rc::new(HeadlessPlatform::new());
        platform.add_monitor(monitor(1, Rect::new(0, 0, 1920, 1080), true));
        for i in 1..=windows {
            platform.add_window(HeadlessWindow::new(
                i as u64,
                &format!("Window {i}"),
                Rect::new(10 * i as i32, 10 * i as i32, 800, 600),
            ));
        }
        platform
    }

    fn start(platform: &Rc<HeadlessPlatform>) -> (Session, Rc<RecordingRenderer>) {
        let renderer = Rc::new(RecordingRenderer::new());
        let session = Session::create(platform.clone(), renderer.clone(), &Config::default())
            .expect("session should start");
        (session, renderer)
    }

    fn key(platform: &HeadlessPlatform, key: Key) -> Propagation {
        platform.dispatch(&InputEvent::Key(KeyEvent::down(key)))
    }

    fn click(platform: &HeadlessPlatform, point: Point) -> Propagation {
        platform.dispatch(&InputEvent::Mouse(MouseEvent::down(point, MouseButton::Left)))
    }

    fn hover(platform: &HeadlessPlatform, point: Point) -> Propagation {
        platform.dispatch(&InputEvent::Mouse(MouseEvent::moved(point)))
    }

    fn assert_released(platform: &HeadlessPlatform) {
        assert_eq!(platform.live_previews(), 0);
        assert_eq!(platform.installed_hooks(), 0);
        assert_eq!(platform.live_surfaces(), 0);
        assert_eq!(platform.invalid_releases(), 0);
    }

    #[test]
    fn digit_two_commits_second_window_and_tears_down_in_order() {
        let platform = platform_with(3);
        let (session, _) = start(&platform);
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.slot_count(), 3);
        assert_eq!(platform.installed_hooks(), 2);
        assert_eq!(platform.live_previews(), 3);

        assert_eq!(key(&platform, Key::Digit(2)), Propagation::Handled);

        assert_eq!(session.state(), SessionState::Disposed);
        assert_eq!(
            session.outcome(),
            Some(Outcome::Committed { window: WindowId::new(2), index: 1 })
        );
        assert_eq!(platform.foreground(), Some(WindowId::new(2)));
        assert_released(&platform);

        let journal = platform.journal();
        let raise = journal.iter().position(|c| matches!(c, Call::BringToForeground(_))).unwrap();
        let last_unregister =
            journal.iter().rposition(|c| matches!(c, Call::UnregisterPreview(_))).unwrap();
        let first_uninstall =
            journal.iter().position(|c| matches!(c, Call::UninstallHook(_))).unwrap();
        let last_uninstall =
            journal.iter().rposition(|c| matches!(c, Call::UninstallHook(_))).unwrap();
        let first_destroy =
            journal.iter().position(|c| matches!(c, Call::DestroySurface(_))).unwrap();
        assert!(raise < last_unregister);
        assert!(last_unregister < first_uninstall);
        assert!(last_uninstall < first_destroy);
        let unregisters = journal.iter().filter(|c| matches!(c, Call::UnregisterPreview(_))).count();
        assert_eq!(unregisters, 3);
    }

    #[test]
    fn digits_beyond_slot_count_keep_session_active() {
        for count in 1..=4 {
            for digit in 1..=9u8 {
                let platform = platform_with(count);
                let (session, _) = start(&platform);
                let result = key(&platform, Key::Digit(digit));
                assert_eq!(result, Propagation::Handled);
                let index = usize::from(digit) - 1;
                if index < count {
                    assert_eq!(session.state(), SessionState::Disposed);
                    assert_eq!(
                        session.outcome(),
                        Some(Outcome::Committed { window: WindowId::new(index as u64 + 1), index })
                    );
                } else {
                    assert_eq!(session.state(), SessionState::Active);
                    assert_eq!(session.outcome(), None);
                    assert_eq!(platform.foreground(), None);
                }
            }
        }
    }

    #[test]
    fn numpad_digits_pick_like_top_row() {
        let platform = platform_with(3);
        let (session, _) = start(&platform);
        key(&platform, Key::Numpad(3));
        assert_eq!(session.outcome(), Some(Outcome::Committed { window: WindowId::new(3), index: 2 }));
    }

    #[test]
    fn escape_cancels_regardless_of_hover() {
        let platform = platform_with(3);
        let (session, _) = start(&platform);
        let first = session.slot_bounds()[0];
        hover(&platform, first.center());
        assert_eq!(session.selected_index(), Some(0));

        assert_eq!(key(&platform, Key::Escape), Propagation::Handled);
        assert_eq!(session.state(), SessionState::Disposed);
        assert_eq!(session.outcome(), Some(Outcome::Cancelled));
        assert_eq!(platform.foreground(), None);
        assert_released(&platform);

        assert_eq!(key(&platform, Key::Escape), Propagation::Forward);
    }

    #[test]
    fn repeated_teardown_is_harmless() {
        let platform = platform_with(2);
        let (session, _) = start(&platform);
        session.cancel();
        session.cancel();
        session.dispose();
        drop(session);
        assert_released(&platform);
    }

    #[test]
    fn dropping_an_active_session_releases_everything() {
        let platform = platform_with(2);
        let (session, _) = start(&platform);
        drop(session);
        assert_released(&platform);
    }

    #[test]
    fn teardown_continues_past_failures() {
        let platform = platform_with(2);
        let (session, _) = start(&platform);
        {
            let mut failures = platform.failures_mut();
            failures.unregister_preview = true;
            failures.destroy_surface = true;
        }
        session.cancel();
        assert_eq!(platform.installed_hooks(), 0);
        assert_eq!(platform.live_previews(), 0);
        let destroys =
            platform.journal().iter().filter(|c| matches!(c, Call::DestroySurface(_))).count();
        assert_eq!(destroys, 1);
    }

    #[test]
    fn hook_failure_leaves_nothing_behind() {
        for kind in [HookKind::Keyboard, HookKind::Mouse] {
            let platform = platform_with(3);
            platform.set_failures(Failures { hook: Some(kind), ..Default::default() });
            let renderer = Rc::new(RecordingRenderer::new());
            let result = Session::create(platform.clone(), renderer, &Config::default());
            assert!(matches!(result, Err(SessionError::HookInstall(_))));
            assert_released(&platform);
        }
    }

    #[test]
    fn preview_failure_degrades_to_icon() {
        let platform = platform_with(3);
        platform.failures_mut().previews.insert(WindowId::new(2));
        let (session, renderer) = start(&platform);
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(platform.live_previews(), 2);
        assert_eq!(renderer.last_for(2).unwrap().content, SlotContent::StaticIcon);
        assert_eq!(renderer.last_for(1).unwrap().content, SlotContent::LivePreview);
    }

    #[test]
    fn zero_candidates_auto_cancel() {
        let platform = platform_with(0);
        let (session, renderer) = start(&platform);
        assert_eq!(session.state(), SessionState::Disposed);
        assert_eq!(session.outcome(), Some(Outcome::Cancelled));
        assert_eq!(session.overlay_count(), 0);
        assert_eq!(platform.installed_hooks(), 0);
        assert_eq!(renderer.draw_count(), 0);
        assert!(platform.journal().is_empty());
    }

    #[test]
    fn candidates_without_monitors_fail() {
        let platform = Rc::new(HeadlessPlatform::new());
        platform.add_window(HeadlessWindow::new(1, "Editor", Rect::new(0, 0, 10, 10)));
        let renderer = Rc::new(RecordingRenderer::new());
        let result = Session::create(platform.clone(), renderer, &Config::default());
        assert!(matches!(result, Err(SessionError::Layout(LayoutError::NoMonitors(1)))));
        assert_released(&platform);
    }

    #[test]
    fn closed_window_goes_stale_but_session_continues() {
        let platform = platform_with(3);
        let (session, renderer) = start(&platform);
        platform.close_window(WindowId::new(1));
        session.handle_window_closed(WindowId::new(1));

        assert_eq!(session.stale_slots(), vec![0]);
        assert_eq!(renderer.last_for(1).unwrap().content, SlotContent::Stale);
        assert_eq!(platform.live_previews(), 2);

        assert_eq!(key(&platform, Key::Digit(1)), Propagation::Handled);
        assert_eq!(session.state(), SessionState::Active);

        hover(&platform, session.slot_bounds()[0].center());
        assert_eq!(session.selected_index(), None);

        key(&platform, Key::Digit(3));
        assert_eq!(session.outcome(), Some(Outcome::Committed { window: WindowId::new(3), index: 2 }));
        assert_released(&platform);
    }

    #[test]
    fn digit_for_silently_closed_window_marks_it_stale() {
        let platform = platform_with(2);
        let (session, _) = start(&platform);
        platform.close_window(WindowId::new(2));
        key(&platform, Key::Digit(2));
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.stale_slots(), vec![1]);
        assert!(!platform.journal().iter().any(|c| matches!(c, Call::BringToForeground(_))));
    }

    #[test]
    fn hover_moves_the_single_highlight() {
        let platform = platform_with(3);
        let (session, renderer) = start(&platform);
        let bounds = session.slot_bounds();
        renderer.clear();

        assert_eq!(hover(&platform, bounds[0].center()), Propagation::Forward);
        assert_eq!(session.selected_index(), Some(0));
        hover(&platform, bounds[0].center());
        assert_eq!(renderer.draw_count(), 1);

        hover(&platform, bounds[2].center());
        assert_eq!(session.selected_index(), Some(2));
        assert!(!renderer.last_for(1).unwrap().selected);
        assert!(renderer.last_for(3).unwrap().selected);
        assert_eq!(renderer.draw_count(), 3);

        // The unused fourth cell.
        hover(&platform, Point::new(1900, 1000));
        assert_eq!(session.selected_index(), None);
    }

    #[test]
    fn click_on_slot_commits_it() {
        let platform = platform_with(3);
        let (session, _) = start(&platform);
        let target = session.slot_bounds()[2].center();
        assert_eq!(click(&platform, target), Propagation::Handled);
        assert_eq!(session.outcome(), Some(Outcome::Committed { window: WindowId::new(3), index: 2 }));
        assert_eq!(platform.foreground(), Some(WindowId::new(3)));
    }

    #[test]
    fn click_on_empty_cell_cancels() {
        let platform = platform_with(3);
        let (session, _) = start(&platform);
        click(&platform, Point::new(1900, 1000));
        assert_eq!(session.outcome(), Some(Outcome::Cancelled));
    }

    #[test]
    fn dismiss_zone_wins_over_hover() {
        let platform = Rc::new(HeadlessPlatform::new());
        platform.add_monitor(Monitor {
            id: MonitorId(1),
            bounds: Rect::new(0, 0, 1920, 1080),
            work_area: Rect::new(0, 0, 1920, 1040),
            primary: true,
        });
        platform.add_window(HeadlessWindow::new(1, "Editor", Rect::new(0, 0, 800, 600)));
        let (session, _) = start(&platform);

        hover(&platform, session.slot_bounds()[0].center());
        assert_eq!(session.selected_index(), Some(0));

        click(&platform, Point::new(960, 1060));
        assert_eq!(session.outcome(), Some(Outcome::Cancelled));
        assert_eq!(platform.foreground(), None);
    }

    #[test]
    fn alt_f4_is_swallowed_without_state_change() {
        let platform = platform_with(2);
        let (session, _) = start(&platform);
        let chord = KeyEvent::down(Key::F4).with_modifiers(Modifiers::ALT);
        assert_eq!(platform.dispatch(&InputEvent::Key(chord)), Propagation::Handled);
        assert_eq!(session.state(), SessionState::Active);

        assert_eq!(key(&platform, Key::F4), Propagation::Forward);
        assert_eq!(key(&platform, Key::Other(0x41)), Propagation::Forward);
    }

    #[test]
    fn injected_keys_are_ignored() {
        let platform = platform_with(2);
        let (session, _) = start(&platform);
        let injected = KeyEvent { injected: true, ..KeyEvent::down(Key::Digit(1)) };
        assert_eq!(platform.dispatch(&InputEvent::Key(injected)), Propagation::Forward);
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn digit_key_up_is_swallowed() {
        let platform = platform_with(1);
        let (session, _) = start(&platform);
        let up = platform.dispatch(&InputEvent::Key(KeyEvent::up(Key::Digit(5))));
        assert_eq!(up, Propagation::Handled);
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn clicks_pass_through_when_configured() {
        let platform = platform_with(1);
        let renderer = Rc::new(RecordingRenderer::new());
        let mut config = Config::default();
        config.settings.input.swallow_clicks = false;
        let session = Session::create(platform.clone(), renderer, &config).unwrap();
        let result = click(&platform, session.slot_bounds()[0].center());
        assert_eq!(result, Propagation::Forward);
        assert_eq!(session.state(), SessionState::Disposed);
    }

    #[test]
    fn finish_handler_runs_once() {
        let platform = platform_with(2);
        let (session, _) = start(&platform);
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        session.set_finish_handler(Rc::new(move |outcome| {
            assert_eq!(outcome, Outcome::Cancelled);
            seen.set(seen.get() + 1);
        }));
        key(&platform, Key::Escape);
        session.cancel();
        session.dispose();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn finish_handler_set_after_disposal_runs_immediately() {
        let platform = platform_with(0);
        let (session, _) = start(&platform);
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        session.set_finish_handler(Rc::new(move |_| seen.set(seen.get() + 1)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn icon_resolution_redraws_slot() {
        let platform = platform_with(2);
        let (session, renderer) = start(&platform);
        renderer.clear();
        session.handle_icon_resolved(WindowId::new(2), IconRef::Handle(0xbeef));
        assert_eq!(renderer.draw_count(), 1);
        assert_eq!(renderer.last_for(2).unwrap().icon, IconRef::Handle(0xbeef));
        session.handle_icon_resolved(WindowId::new(2), IconRef::Handle(0xbeef));
        assert_eq!(renderer.draw_count(), 1);
    }

    #[test]
    fn minimize_updates_preview_source() {
        let platform = Rc::new(HeadlessPlatform::new());
        platform.add_monitor(monitor(1, Rect::new(0, 0, 1920, 1080), true));
        platform.add_window(HeadlessWindow::new(1, "Mail", Rect::new(100, 100, 1024, 768)));
        let (session, _) = start(&platform);

        platform.set_minimized(WindowId::new(1), true);
        session.handle_window_state_changed(WindowId::new(1));

        let last_update = platform
            .journal()
            .into_iter()
            .rev()
            .find_map(|c| match c {
                Call::UpdatePreview { source, .. } => Some(source),
                _ => None,
            })
            .unwrap();
        assert_eq!(last_update, Rect::new(0, 0, 1024, 768));
    }

    #[test]
    fn display_change_relayouts_or_cancels() {
        let platform = platform_with(2);
        let (session, _) = start(&platform);
        platform.set_monitors(vec![monitor(1, Rect::new(0, 0, 2560, 1440), true)]);
        session.handle_display_change();
        assert_eq!(session.state(), SessionState::Active);
        let bounds = session.slot_bounds();
        assert!(bounds.iter().all(|b| Rect::new(0, 0, 2560, 1440).contains_rect(b)));
        assert!(bounds[0].height > 540);

        platform.add_monitor(monitor(2, Rect::new(2560, 0, 1920, 1080), false));
        session.handle_display_change();
        assert_eq!(session.outcome(), Some(Outcome::Cancelled));
        assert_released(&platform);
    }

    #[test]
    fn slots_spread_over_monitors() {
        let platform = Rc::new(HeadlessPlatform::new());
        platform.add_monitor(monitor(2, Rect::new(1920, 0, 1920, 1080), false));
        platform.add_monitor(monitor(1, Rect::new(0, 0, 1920, 1080), true));
        for i in 1..=4 {
            platform.add_window(HeadlessWindow::new(i, "App", Rect::new(0, 0, 640, 480)));
        }
        let (session, _) = start(&platform);
        assert_eq!(session.overlay_count(), 2);
        assert_eq!(platform.live_surfaces(), 2);
        let bounds = session.slot_bounds();
        assert!(bounds[0].x < 1920);
        assert!(bounds[3].x >= 1920);
    }

    /// Renderer that feeds an Escape back through the hooks while drawing.
    struct EchoRenderer {
        platform: Rc<HeadlessPlatform>,
        armed: Cell<bool>,
        nested: Cell<Option<Propagation>>,
    }

    impl Renderer for EchoRenderer {
        fn draw_slot(&self, _: SurfaceId, _: &SlotView<'_>) {
            if self.armed.replace(false) {
                let escape = InputEvent::Key(KeyEvent::down(Key::Escape));
                self.nested.set(Some(self.platform.dispatch(&escape)));
            }
        }
    }

    #[test]
    fn reentrant_events_are_forwarded() {
        let platform = platform_with(2);
        let renderer = Rc::new(EchoRenderer {
            platform: platform.clone(),
            armed: Cell::new(false),
            nested: Cell::new(None),
        });
        let session =
            Session::create(platform.clone(), renderer.clone(), &Config::default()).unwrap();

        renderer.armed.set(true);
        hover(&platform, session.slot_bounds()[1].center());

        assert_eq!(renderer.nested.get(), Some(Propagation::Forward));
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.selected_index(), Some(1));
    }

    #[test]
    fn oversized_margins_still_open_a_session() {
        let platform = platform_with(3);
        let mut config = Config::default();
        config.settings.layout.margin = u32::MAX;
        config.settings.layout.padding = u32::MAX;
        let renderer = Rc::new(RecordingRenderer::new());
        let session = Session::create(platform.clone(), renderer, &config).unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert!(session.slot_bounds().iter().all(Rect::is_empty));

        key(&platform, Key::Digit(1));
        assert_eq!(session.outcome(), Some(Outcome::Committed { window: WindowId::new(1), index: 0 }));
        assert_released(&platform);
    }

    #[test]
    fn tool_windows_stay_visible_behind_the_overlay() {
        let platform = Rc::new(HeadlessPlatform::new());
        platform.add_monitor(Monitor {
            id: MonitorId(1),
            bounds: Rect::new(0, 0, 1920, 1080),
            work_area: Rect::new(0, 0, 1920, 1040),
            primary: true,
        });
        platform.add_window(HeadlessWindow::new(1, "Editor", Rect::new(0, 0, 800, 600)));
        platform.add_window(
            HeadlessWindow::new(2, "", Rect::new(0, 1040, 1920, 40)).tool_window(),
        );
        platform.add_window(HeadlessWindow::new(3, "Mail", Rect::new(50, 50, 800, 600)));
        let (session, _) = start(&platform);

        assert_eq!(session.slot_windows(), vec![WindowId::new(1), WindowId::new(3)]);
        assert_eq!(session.background_count(), 1);
        assert_eq!(platform.live_previews(), 3);
        assert_eq!(platform.live_surfaces(), 2);

        // The taskbar preview sits in the dismiss zone.
        click(&platform, Point::new(960, 1060));
        assert_eq!(session.outcome(), Some(Outcome::Cancelled));
        assert_eq!(session.background_count(), 0);
        assert_released(&platform);

        let journal = platform.journal();
        let backdrop = journal
            .iter()
            .find_map(|c| match c {
                Call::CreateSurface(surface) => Some(*surface),
                _ => None,
            })
            .unwrap();
        let last_unregister =
            journal.iter().rposition(|c| matches!(c, Call::UnregisterPreview(_))).unwrap();
        let first_uninstall =
            journal.iter().position(|c| matches!(c, Call::UninstallHook(_))).unwrap();
        let backdrop_destroyed =
            journal.iter().position(|c| *c == Call::DestroySurface(backdrop)).unwrap();
        let destroys: Vec<usize> = journal
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, Call::DestroySurface(_)))
            .map(|(i, _)| i)
            .collect();
        assert!(last_unregister < first_uninstall);
        assert!(first_uninstall < destroys[0]);
        assert_eq!(destroys.last(), Some(&backdrop_destroyed));
    }

    #[test]
    fn relayout_moves_slots_between_monitor_overlays() {
        let platform = Rc::new(HeadlessPlatform::new());
        platform.add_monitor(monitor(1, Rect::new(0, 0, 1920, 1080), true));
        platform.add_monitor(monitor(2, Rect::new(1920, 0, 1920, 1080), false));
        for i in 1..=4 {
            platform.add_window(HeadlessWindow::new(i, "App", Rect::new(0, 0, 640, 480)));
        }
        let (session, _) = start(&platform);
        let before = platform.journal();
        let surfaces: Vec<SurfaceId> = before
            .iter()
            .filter_map(|c| match c {
                Call::CreateSurface(surface) => Some(*surface),
                _ => None,
            })
            .collect();
        let registered = |journal: &[Call], window: u64| {
            journal.iter().find_map(|c| match c {
                Call::RegisterPreview { preview, source, surface } if source.get() == window => {
                    Some((*preview, *surface))
                }
                _ => None,
            })
        };
        assert_eq!(registered(&before, 3).map(|(_, s)| s), Some(surfaces[1]));
        let (stays, _) = registered(&before, 4).unwrap();

        // The primary monitor grows to four times the area of the other, so
        // it takes over the third slot.
        platform.set_monitors(vec![
            monitor(1, Rect::new(0, 0, 3840, 2160), true),
            monitor(2, Rect::new(3840, 0, 1920, 1080), false),
        ]);
        session.handle_display_change();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(
            session.slot_windows(),
            (1..=4).map(WindowId::new).collect::<Vec<_>>()
        );

        let after = platform.journal().split_off(before.len());
        let unregisters = after.iter().filter(|c| matches!(c, Call::UnregisterPreview(_))).count();
        let registers = after.iter().filter(|c| matches!(c, Call::RegisterPreview { .. })).count();
        assert_eq!(unregisters, 1);
        assert_eq!(registers, 1);
        assert_eq!(platform.invalid_releases(), 0);
        assert_eq!(platform.live_previews(), 4);

        let bounds = session.slot_bounds();
        assert!(Rect::new(0, 0, 3840, 2160).contains_rect(&bounds[2]));
        assert!(Rect::new(3840, 0, 1920, 1080).contains_rect(&bounds[3]));

        let (moved, surface) = registered(&after, 3).unwrap();
        assert_eq!(surface, surfaces[0]);
        assert_eq!(platform.preview_source(moved), Some((WindowId::new(3), surfaces[0])));
        assert_eq!(platform.preview_rects(moved).map(|(_, dest)| dest), Some(bounds[2]));
        assert_eq!(
            platform.preview_rects(stays).map(|(_, dest)| dest),
            Some(bounds[3].relative_to(Point::new(3840, 0)))
        );
        assert!(after.iter().any(|c| matches!(
            c,
            Call::UpdatePreview { preview, destination, .. }
                if *preview == stays && *destination == bounds[3].relative_to(Point::new(3840, 0))
        )));
    }

    #[test]
    fn handlers_can_be_driven_directly() {
        let platform = platform_with(2);
        let (session, _) = start(&platform);
        let second = session.slot_bounds()[1].center();

        assert_eq!(session.handle_key(&KeyEvent::down(Key::Digit(0))), Propagation::Forward);
        assert_eq!(session.handle_mouse_move(&MouseEvent::moved(second)), Propagation::Forward);
        assert_eq!(session.selected_index(), Some(1));
        let click = MouseEvent::down(second, MouseButton::Left);
        assert_eq!(session.handle_mouse_click(&click), Propagation::Handled);
        assert_eq!(session.outcome(), Some(Outcome::Committed { window: WindowId::new(2), index: 1 }));

        assert_eq!(session.handle_key(&KeyEvent::down(Key::Escape)), Propagation::Forward);
        assert_eq!(session.handle_mouse_click(&click), Propagation::Forward);
    }
}
