use crate::feed::buffer::TimeSeriesBuffer;
use crate::feed::client::fetch_instruments;
use crate::feed::dispatcher::UpdateDispatcher;
use crate::feed::subscription::{ActiveSubscription, SubscriptionManager};
use crate::feed::types::{FeedConfig, Instrument};
use crate::render::{ListenerSet, PairDisplay, RenderListener};
use parking_lot::Mutex;
use reqwest::Client;
use std::sync::Arc;
use tracing::warn;

/// Explicit application context: constructs and wires the buffer, dispatcher,
/// and subscription manager at startup, with render listeners registered up
/// front. No ambient singletons.
pub struct AppContext {
    pub config: FeedConfig,
    pub http_client: Client,
    pub buffer: Arc<TimeSeriesBuffer>,
    pub display: Arc<Mutex<PairDisplay>>,
    pub dispatcher: Arc<UpdateDispatcher>,
    pub manager: Arc<SubscriptionManager>,
}

impl AppContext {
    pub fn new(config: FeedConfig, listeners: Vec<Arc<dyn RenderListener>>) -> Self {
        let listeners = Arc::new(ListenerSet::new(listeners));
        let subscription = ActiveSubscription::default();
        let buffer = Arc::new(TimeSeriesBuffer::new(config.candle_capacity));
        let display = Arc::new(Mutex::new(PairDisplay::default()));
        let dispatcher = Arc::new(UpdateDispatcher::new(
            Arc::clone(&buffer),
            subscription.clone(),
            Arc::clone(&display),
            Arc::clone(&listeners),
        ));
        let manager = Arc::new(SubscriptionManager::new(
            config.clone(),
            subscription,
            Arc::clone(&dispatcher),
            Arc::clone(&display),
            listeners,
        ));

        Self {
            config,
            http_client: Client::new(),
            buffer,
            display,
            dispatcher,
            manager,
        }
    }

    /// One-shot instrument list fetch for the pair selector. Failures degrade
    /// to an empty list; there is no retry.
    pub async fn load_instruments(&self) -> Vec<Instrument> {
        match fetch_instruments(&self.http_client, &self.config).await {
            Ok(instruments) => instruments,
            Err(error) => {
                warn!(error = %error, "instrument list fetch failed, selector left empty");
                Vec::new()
            }
        }
    }
}
