use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::sys::event::{InputEvent, KeyEvent, MouseEvent, Propagation};
use crate::sys::platform::{HookCallback, HookHandle, HookKind, PlatformError, PlatformRef};

pub type KeyHandler = Rc<dyn Fn(&KeyEvent) -> Propagation>;
pub type MouseHandler = Rc<dyn Fn(&MouseEvent) -> Propagation>;

/// Process-wide keyboard and mouse hooks for the lifetime of one session.
///
/// Either both hooks are installed or neither is. They are removed by
/// [`GlobalInputHooks::uninstall`] or on drop, whichever comes first.
pub struct GlobalInputHooks {
    platform: PlatformRef,
    keyboard: Option<HookHandle>,
    mouse: Option<HookHandle>,
}

fn timed(budget: Duration, kind: HookKind, f: impl FnOnce() -> Propagation) -> Propagation {
    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    if elapsed > budget {
        warn!(%kind, ?elapsed, ?budget, "hook callback overran its budget");
    }
    result
}

impl GlobalInputHooks {
    /// Installs the keyboard hook, then the mouse hook. If the mouse hook
    /// fails the keyboard hook is removed again before the error is returned.
    pub fn install(
        platform: PlatformRef,
        budget: Duration,
        on_key: KeyHandler,
        on_mouse_move: MouseHandler,
        on_mouse_click: MouseHandler,
    ) -> Result<GlobalInputHooks, PlatformError> {
        let mut hooks = GlobalInputHooks { platform, keyboard: None, mouse: None };

        let keyboard: HookCallback = Rc::new(move |event: &InputEvent| match event {
            InputEvent::Key(key) => timed(budget, HookKind::Keyboard, || on_key(key)),
            InputEvent::Mouse(_) => Propagation::Forward,
        });
        hooks.keyboard = Some(hooks.platform.install_hook(HookKind::Keyboard, keyboard)?);

        let mouse: HookCallback = Rc::new(move |event: &InputEvent| match event {
            InputEvent::Mouse(mouse) if mouse.is_click() => {
                timed(budget, HookKind::Mouse, || on_mouse_click(mouse))
            }
            InputEvent::Mouse(mouse) => timed(budget, HookKind::Mouse, || on_mouse_move(mouse)),
            InputEvent::Key(_) => Propagation::Forward,
        });
        // On failure `hooks` drops here and takes the keyboard hook with it.
        hooks.mouse = Some(hooks.platform.install_hook(HookKind::Mouse, mouse)?);

        debug!("input hooks installed");
        Ok(hooks)
    }

    pub fn is_installed(&self) -> bool { self.keyboard.is_some() || self.mouse.is_some() }

    /// Removes both hooks. Repeated calls are no-ops.
    pub fn uninstall(&mut self) {
        let handles =
            [(HookKind::Keyboard, self.keyboard.take()), (HookKind::Mouse, self.mouse.take())];
        for (kind, handle) in handles {
            let Some(handle) = handle else { continue };
            match self.platform.uninstall_hook(handle) {
                Ok(()) => debug!(%kind, "hook removed"),
                Err(e) => warn!(%kind, "removing hook failed: {e}"),
            }
        }
    }
}

impl Drop for GlobalInputHooks {
    fn drop(&mut self) { self.uninstall(); }
}
