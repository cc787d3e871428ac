//! Event-loop plumbing shared by the actors.
//!
//! Every message travels with the span it was sent from, so the receiving
//! side can re-enter it and keep the trace tree connected.

use tokio::sync::mpsc;
use tracing::Span;

pub mod input_hooks;
pub mod session;
pub mod switcher;

#[derive(Debug)]
pub struct Sender<T>(mpsc::UnboundedSender<(Span, T)>);

#[derive(Debug)]
pub struct Receiver<T>(mpsc::UnboundedReceiver<(Span, T)>);

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self { Sender(self.0.clone()) }
}

pub type SendError<T> = mpsc::error::SendError<(Span, T)>;

pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Sender(tx), Receiver(rx))
}

impl<T> Sender<T> {
    pub fn send(&self, event: T) -> Result<(), SendError<T>> {
        self.0.send((Span::current(), event))
    }
}

impl<T> Receiver<T> {
    pub async fn recv(&mut self) -> Option<(Span, T)> { self.0.recv().await }

    pub fn try_recv(&mut self) -> Option<(Span, T)> { self.0.try_recv().ok() }
}
