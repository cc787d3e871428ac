//! Scripted runs of the switcher against the headless platform.
//!
//! A [`Scenario`] describes monitors, windows and injected failures, plus a
//! list of [`Step`]s (hotkey presses, keys, mouse input, window changes). The
//! steps are fed through a [`SwitcherActor`] exactly as a native backend
//! would, and the result is summarized as a serializable [`ReplayReport`].

use std::path::Path;
use std::rc::Rc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::actor::channel;
use crate::actor::session::{Outcome, SessionState};
use crate::actor::switcher::{self, Event, SwitcherActor};
use crate::common::config::Config;
use crate::sys::event::{InputEvent, Key, KeyEvent, Modifiers, MouseButton, MouseEvent, Propagation};
use crate::sys::geometry::{Point, Rect};
use crate::sys::headless::{Call, Failures, HeadlessPlatform, HeadlessWindow};
use crate::sys::platform::{HookKind, IconRef, Monitor, WindowId, WindowPlacement};
use crate::ui::renderer::RecordingRenderer;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub monitors: Vec<Monitor>,
    /// Front-most first.
    pub windows: Vec<ScenarioWindow>,
    #[serde(default)]
    pub shell_window: Option<u64>,
    #[serde(default)]
    pub failures: ScenarioFailures,
    pub steps: Vec<Step>,
}

fn visible_by_default() -> bool { true }

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioWindow {
    pub id: u64,
    pub title: String,
    pub rect: Rect,
    #[serde(default)]
    pub minimized: bool,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
    #[serde(default)]
    pub icon: IconRef,
    #[serde(default)]
    pub placement: Option<WindowPlacement>,
    #[serde(default)]
    pub tool_window: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ScenarioFailures {
    pub enumerate: bool,
    pub previews: Vec<u64>,
    pub hook: Option<HookKind>,
    pub foreground: bool,
    pub unregister_preview: bool,
    pub destroy_surface: bool,
}

impl From<&ScenarioFailures> for Failures {
    fn from(f: &ScenarioFailures) -> Self {
        Failures {
            enumerate: f.enumerate,
            previews: f.previews.iter().copied().map(WindowId::new).collect(),
            hook: f.hook,
            foreground: f.foreground,
            unregister_preview: f.unregister_preview,
            destroy_surface: f.destroy_surface,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Step {
    Hotkey,
    /// Key press (down only).
    Key(Key),
    /// Key press with Alt held.
    AltKey(Key),
    KeyUp(Key),
    MouseMove(Point),
    /// Left button down at a screen position.
    Click(Point),
    CloseWindow(u64),
    ResolveIcon(u64, u64),
    Minimize(u64),
    Restore(u64),
    /// Replaces the monitor set.
    Displays(Vec<Monitor>),
    Cancel,
    Exit,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: Step,
    /// What the hooks answered, for input steps.
    pub propagation: Option<Propagation>,
    /// The session state after the step, if a session exists.
    pub session: Option<SessionState>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallSummary {
    pub surfaces_created: usize,
    pub surfaces_destroyed: usize,
    pub previews_registered: usize,
    pub previews_unregistered: usize,
    pub hooks_installed: usize,
    pub hooks_uninstalled: usize,
    pub foreground_requests: usize,
    pub notifications: Vec<String>,
}

impl CallSummary {
    fn from_journal(journal: &[Call]) -> Self {
        let mut summary = CallSummary::default();
        for call in journal {
            match call {
                Call::CreateSurface(_) => summary.surfaces_created += 1,
                Call::DestroySurface(_) => summary.surfaces_destroyed += 1,
                Call::RegisterPreview { .. } => summary.previews_registered += 1,
                Call::UpdatePreview { .. } => {}
                Call::UnregisterPreview(_) => summary.previews_unregistered += 1,
                Call::InstallHook(..) => summary.hooks_installed += 1,
                Call::UninstallHook(_) => summary.hooks_uninstalled += 1,
                Call::BringToForeground(_) => summary.foreground_requests += 1,
                Call::Notify(message) => summary.notifications.push(message.clone()),
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub steps: Vec<StepReport>,
    pub outcomes: Vec<Outcome>,
    /// A session was still open when the steps ran out.
    pub left_active: bool,
    pub foreground: Option<WindowId>,
    pub calls: CallSummary,
    pub draws: usize,
    /// Surfaces, previews and hooks still alive after everything was dropped.
    pub leaked: usize,
    pub invalid_releases: usize,
}

impl Scenario {
    pub fn from_ron(source: &str) -> Result<Scenario, ron::error::SpannedError> {
        ron::from_str(source)
    }

    pub fn load(path: &Path) -> anyhow::Result<Scenario> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Scenario::from_ron(&source).with_context(|| format!("parsing scenario {}", path.display()))
    }

    fn platform(&self) -> HeadlessPlatform {
        let platform = HeadlessPlatform::new();
        platform.set_monitors(self.monitors.clone());
        for w in &self.windows {
            let mut window = HeadlessWindow::new(w.id, &w.title, w.rect).with_icon(w.icon);
            if let Some(placement) = w.placement {
                window = window.with_placement(placement);
            }
            if w.minimized {
                window = window.minimized();
            }
            if !w.visible {
                window = window.hidden();
            }
            if w.tool_window {
                window = window.tool_window();
            }
            platform.add_window(window);
        }
        if let Some(shell) = self.shell_window {
            platform.set_shell_window(WindowId::new(shell));
        }
        platform.set_failures(Failures::from(&self.failures));
        platform
    }
}

/// Runs every step in order. Steps after an `Exit` are skipped.
#[instrument(skip_all, fields(steps = scenario.steps.len()))]
pub fn run(scenario: &Scenario, config: &Config) -> ReplayReport {
    let platform = Rc::new(scenario.platform());
    let renderer = Rc::new(RecordingRenderer::new());
    let (tx, rx) = channel();
    let mut actor =
        SwitcherActor::new(platform.clone(), renderer.clone(), config.clone(), tx.clone(), rx);

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for step in &scenario.steps {
        debug!(?step);
        let propagation = apply(&platform, &tx, step);
        let running = actor.process_pending();
        steps.push(StepReport {
            step: step.clone(),
            propagation,
            session: actor.session().map(|s| s.state()),
        });
        if !running {
            break;
        }
    }

    let left_active = actor.has_active_session();
    let outcomes = actor.outcomes().to_vec();
    drop(actor);

    let leaked = platform.live_surfaces() + platform.live_previews() + platform.installed_hooks();
    let report = ReplayReport {
        steps,
        outcomes,
        left_active,
        foreground: platform.foreground(),
        calls: CallSummary::from_journal(&platform.journal()),
        draws: renderer.draw_count(),
        leaked,
        invalid_releases: platform.invalid_releases(),
    };
    info!(outcomes = ?report.outcomes, leaked, "replay finished");
    report
}

fn apply(platform: &HeadlessPlatform, tx: &switcher::Sender, step: &Step) -> Option<Propagation> {
    let send = |event: Event| -> Option<Propagation> {
        _ = tx.send(event);
        None
    };
    let input = |event: InputEvent| Some(platform.dispatch(&event));
    match step {
        Step::Hotkey => send(Event::Activate),
        Step::Key(key) => input(InputEvent::Key(KeyEvent::down(*key))),
        Step::AltKey(key) => {
            input(InputEvent::Key(KeyEvent::down(*key).with_modifiers(Modifiers::ALT)))
        }
        Step::KeyUp(key) => input(InputEvent::Key(KeyEvent::up(*key))),
        Step::MouseMove(point) => input(InputEvent::Mouse(MouseEvent::moved(*point))),
        Step::Click(point) => {
            input(InputEvent::Mouse(MouseEvent::down(*point, MouseButton::Left)))
        }
        Step::CloseWindow(id) => {
            let id = WindowId::new(*id);
            platform.close_window(id);
            send(Event::WindowClosed(id))
        }
        Step::ResolveIcon(id, icon) => {
            send(Event::IconResolved(WindowId::new(*id), IconRef::Handle(*icon)))
        }
        Step::Minimize(id) | Step::Restore(id) => {
            let id = WindowId::new(*id);
            platform.set_minimized(id, matches!(step, Step::Minimize(_)));
            send(Event::WindowStateChanged(id))
        }
        Step::Displays(monitors) => {
            platform.set_monitors(monitors.clone());
            send(Event::DisplayChanged)
        }
        Step::Cancel => send(Event::Cancel),
        Step::Exit => send(Event::Exit),
    }
}
