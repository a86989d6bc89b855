//! Consumer task that owns a [`SynchronizedView`] and publishes its output.
//!
//! The task serializes enable/disable commands with transport events, so the
//! view is never touched from two places at once. Observers read the latest
//! [`SyncOutput`] from a `futures-signals` [`Mutable`].

use futures_signals::signal::{Mutable, Signal};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::reconcile::StreamKind;
use crate::transport::EventTransport;
use crate::view::{SyncOutput, SynchronizedView};

enum Command {
    SetEnabled(bool),
    Shutdown(oneshot::Sender<()>),
}

/// Control surface for a view running on its own task.
pub struct SyncHandle<V> {
    commands: mpsc::UnboundedSender<Command>,
    output: Mutable<SyncOutput<V>>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetEnabled(enabled) => f.debug_tuple("SetEnabled").field(enabled).finish(),
            Self::Shutdown(_) => f.write_str("Shutdown"),
        }
    }
}

impl<V> std::fmt::Debug for SyncHandle<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHandle")
            .field("running", &!self.task.is_finished())
            .finish()
    }
}

/// Move `view` onto a tokio task and return its handle.
///
/// The view starts in whatever enable state it was in; use
/// [`SyncHandle::set_enabled`] to toggle it.
pub fn spawn_synchronized_view<K, T>(mut view: SynchronizedView<K, T>) -> SyncHandle<K::View>
where
    K: StreamKind,
    T: EventTransport + 'static,
{
    let output = Mutable::new(view.output());
    let publish = output.clone();
    let (commands, mut rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                command = rx.recv() => match command {
                    Some(Command::SetEnabled(enabled)) => view.set_enabled(enabled),
                    Some(Command::Shutdown(done)) => {
                        view.set_enabled(false);
                        publish.set_neq(view.output());
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        view.set_enabled(false);
                        break;
                    }
                },
                event = view.next_event() => match event {
                    Some(event) => {
                        if !view.handle(event) {
                            continue;
                        }
                    }
                    None => break,
                },
            }
            publish.set_neq(view.output());
        }
        info!(stream = K::NAME, "Synchronized view stopped");
    });

    SyncHandle {
        commands,
        output,
        task,
    }
}

impl<V> SyncHandle<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Enable or disable the live stream.
    pub fn set_enabled(&self, enabled: bool) {
        if self.commands.send(Command::SetEnabled(enabled)).is_err() {
            debug!(enabled, "View task already stopped");
        }
    }

    /// Latest published output.
    pub fn output(&self) -> SyncOutput<V> {
        self.output.get_cloned()
    }

    /// Signal of published outputs.
    pub fn signal(&self) -> impl Signal<Item = SyncOutput<V>> + Send + Sync + 'static {
        self.output.signal_cloned()
    }

    /// Disable the stream and wait for the task to finish.
    pub async fn shutdown(self) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(Command::Shutdown(done)).is_ok() {
            let _ = wait.await;
        }
        let _ = self.task.await;
    }
}
