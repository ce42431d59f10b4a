use {
    crate::domain::outbox::OutboxLog,
    crate::services::dispatcher::{DispatchConfig, Dispatcher, WakeSignal},
    crate::services::event_parser::EventParser,
    std::{future::Future, sync::Arc},
    tokio::{sync::watch, task::JoinHandle},
};

/// Decorates the primary store: forwards every call, and after each
/// mutating call wakes the outbox dispatcher it owns.
pub struct BrokerProxy<S: OutboxLog> {
    store: Arc<S>,
    wake: WakeSignal,
}

impl<S: OutboxLog> BrokerProxy<S> {
    /// Build the proxy and spawn its dispatcher.
    pub fn start(
        store: Arc<S>,
        parser: EventParser,
        config: DispatchConfig,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let wake = WakeSignal::default();
        let dispatcher = Dispatcher::new(store.clone(), parser, wake.clone(), config);
        let handle = tokio::spawn(dispatcher.run(shutdown));
        (Self { store, wake }, handle)
    }

    /// Wrap `store` around an already running dispatcher listening on `wake`.
    pub fn with_signal(store: Arc<S>, wake: WakeSignal) -> Self {
        Self { store, wake }
    }

    /// Forward a read-only call.
    pub async fn read<'a, F, Fut, T>(&'a self, op: F) -> T
    where
        F: FnOnce(&'a S) -> Fut,
        Fut: Future<Output = T> + 'a,
    {
        op(self.store.as_ref()).await
    }

    /// Forward a mutating call, then wake the dispatcher. The result is
    /// returned untouched, error or not; signalling never blocks.
    pub async fn mutate<'a, F, Fut, T>(&'a self, op: F) -> T
    where
        F: FnOnce(&'a S) -> Fut,
        Fut: Future<Output = T> + 'a,
    {
        let result = op(self.store.as_ref()).await;
        self.wake.notify();
        result
    }

    pub fn signal(&self) -> &WakeSignal {
        &self.wake
    }
}
