//! The hotkey dispatcher. Owns the at-most-one [`Session`] and routes window
//! system notifications into it.

use std::rc::Rc;

use tracing::{debug, error, info, instrument};

use crate::actor;
use crate::actor::session::{Outcome, Session, SessionError};
use crate::common::config::Config;
use crate::sys::platform::{IconRef, PlatformRef, WindowId};
use crate::ui::renderer::Renderer;

#[derive(Debug)]
pub enum Event {
    /// The switcher hotkey was pressed.
    Activate,
    Cancel,
    WindowClosed(WindowId),
    IconResolved(WindowId, IconRef),
    /// A window was minimized or restored.
    WindowStateChanged(WindowId),
    DisplayChanged,
    SessionFinished(Outcome),
    /// The tray "Exit" action.
    Exit,
}

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

pub struct SwitcherActor {
    platform: PlatformRef,
    renderer: Rc<dyn Renderer>,
    config: Config,
    rx: Receiver,
    tx: Sender,
    session: Option<Session>,
    outcomes: Vec<Outcome>,
    exited: bool,
}

impl SwitcherActor {
    /// `tx` must feed `rx`; sessions report back through it when they finish.
    pub fn new(
        platform: PlatformRef,
        renderer: Rc<dyn Renderer>,
        config: Config,
        tx: Sender,
        rx: Receiver,
    ) -> Self {
        SwitcherActor {
            platform,
            renderer,
            config,
            rx,
            tx,
            session: None,
            outcomes: Vec::new(),
            exited: false,
        }
    }

    /// Handles events until `Exit`. Hands the actor back for inspection.
    pub async fn run(mut self) -> Self {
        while !self.exited {
            let Some((span, event)) = self.rx.recv().await else { break };
            let _guard = span.enter();
            self.handle_event(event);
        }
        self
    }

    /// Handles every queued event without waiting. Returns false once the
    /// dispatcher has exited.
    pub fn process_pending(&mut self) -> bool {
        while !self.exited {
            let Some((span, event)) = self.rx.try_recv() else { break };
            let _guard = span.enter();
            self.handle_event(event);
        }
        !self.exited
    }

    pub fn session(&self) -> Option<&Session> { self.session.as_ref() }

    pub fn has_active_session(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_active)
    }

    /// Outcomes of every finished session, oldest first.
    pub fn outcomes(&self) -> &[Outcome] { &self.outcomes }

    pub fn is_exited(&self) -> bool { self.exited }

    #[instrument(skip(self))]
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Activate => self.activate(),
            Event::Cancel => {
                if let Some(session) = &self.session {
                    session.cancel();
                }
            }
            Event::WindowClosed(window) => {
                if let Some(session) = &self.session {
                    session.handle_window_closed(window);
                }
            }
            Event::IconResolved(window, icon) => {
                if let Some(session) = &self.session {
                    session.handle_icon_resolved(window, icon);
                }
            }
            Event::WindowStateChanged(window) => {
                if let Some(session) = &self.session {
                    session.handle_window_state_changed(window);
                }
            }
            Event::DisplayChanged => {
                if let Some(session) = &self.session {
                    session.handle_display_change();
                }
            }
            Event::SessionFinished(outcome) => {
                info!(?outcome, "session finished");
                self.outcomes.push(outcome);
                self.reap();
            }
            Event::Exit => {
                info!("exit requested");
                if let Some(session) = self.session.take() {
                    session.cancel();
                }
                self.exited = true;
            }
        }
    }

    fn reap(&mut self) {
        if self.session.as_ref().is_some_and(|s| !s.is_active()) {
            self.session = None;
        }
    }

    fn activate(&mut self) {
        if self.has_active_session() {
            debug!("session already active, ignoring activation");
            return;
        }
        self.reap();

        let session =
            match Session::create(self.platform.clone(), self.renderer.clone(), &self.config) {
                Ok(session) => session,
                Err(SessionError::HookInstall(e)) => {
                    error!("could not start switcher: {e}");
                    self.platform
                        .notify_user("tabscope", &format!("Window switching is unavailable: {e}"));
                    return;
                }
                Err(e) => {
                    error!("could not start switcher: {e}");
                    return;
                }
            };

        if !session.is_active() {
            if let Some(outcome) = session.outcome() {
                self.outcomes.push(outcome);
            }
            return;
        }
        let tx = self.tx.clone();
        session.set_finish_handler(Rc::new(move |outcome| {
            _ = tx.send(Event::SessionFinished(outcome));
        }));
        self.session = Some(session);
    }
}
