use crate::error::AppError;
use crate::feed::client::{connect_feed_stream, FeedWsStream};
use crate::feed::dispatcher::UpdateDispatcher;
use crate::feed::types::{
    encode_subscribe, normalize_symbol, parse_feed_message, ConnectionState, FeedConfig,
};
use crate::render::{ListenerSet, PairDisplay};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The currently selected instrument. Written by the manager, read by the
/// dispatcher; survives disconnects so a later connect can restore it.
#[derive(Clone, Default)]
pub struct ActiveSubscription {
    inner: Arc<RwLock<Option<String>>>,
}

impl ActiveSubscription {
    pub fn set(&self, symbol: Option<String>) {
        *self.inner.write() = symbol;
    }

    pub fn get(&self) -> Option<String> {
        self.inner.read().clone()
    }

    pub fn matches(&self, symbol: &str) -> bool {
        self.inner.read().as_deref() == Some(symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Subscribe(String),
}

impl OutboundFrame {
    fn into_message(self) -> Result<Message, AppError> {
        match self {
            Self::Subscribe(symbol) => Ok(Message::Text(encode_subscribe(&symbol)?)),
        }
    }
}

#[derive(Debug)]
enum SessionEnd {
    Cancelled,
    RemoteClosed,
    TransportError(AppError),
}

struct ManagerInner {
    state: ConnectionState,
    session: u64,
    cancel: Option<CancellationToken>,
    outbound: Option<mpsc::UnboundedSender<OutboundFrame>>,
}

/// Connection lifecycle and instrument-subscription state machine over the
/// persistent feed channel.
///
/// Every connect bumps a session counter; frames and callbacks carrying a
/// stale session number are discarded, so a closed channel can never mutate
/// state after `disconnect`. Transport failures fall back to Disconnected and
/// are surfaced through the listener set; retry is a user-initiated
/// `connect`, never automatic.
pub struct SubscriptionManager {
    config: FeedConfig,
    inner: Mutex<ManagerInner>,
    subscription: ActiveSubscription,
    dispatcher: Arc<UpdateDispatcher>,
    display: Arc<Mutex<PairDisplay>>,
    listeners: Arc<ListenerSet>,
}

impl SubscriptionManager {
    pub fn new(
        config: FeedConfig,
        subscription: ActiveSubscription,
        dispatcher: Arc<UpdateDispatcher>,
        display: Arc<Mutex<PairDisplay>>,
        listeners: Arc<ListenerSet>,
    ) -> Self {
        Self {
            config,
            inner: Mutex::new(ManagerInner {
                state: ConnectionState::Disconnected,
                session: 0,
                cancel: None,
                outbound: None,
            }),
            subscription,
            dispatcher,
            display,
            listeners,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn subscription(&self) -> Option<String> {
        self.subscription.get()
    }

    /// Open the streaming channel. Fire-and-forget: returns immediately and
    /// reports progress through the listener set. Ignored unless currently
    /// Disconnected.
    pub fn connect(self: Arc<Self>) {
        let Some((session, cancel)) = self.begin_connect() else {
            debug!("connect ignored: channel already open or opening");
            return;
        };

        tokio::spawn(async move {
            self.run_session(session, cancel).await;
        });
    }

    /// Tear down the streaming channel. The active subscription is left
    /// untouched so a later `connect` restores it.
    pub fn disconnect(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.state == ConnectionState::Disconnected {
                return;
            }
            inner.session += 1;
            inner.state = ConnectionState::Disconnected;
            if let Some(cancel) = inner.cancel.take() {
                cancel.cancel();
            }
            inner.outbound = None;
        }

        info!("feed channel disconnected");
        self.listeners
            .notify_connection_state(ConnectionState::Disconnected);
    }

    /// Set or clear the active instrument. When connected with a symbol, a
    /// subscribe frame is emitted immediately; switching symbols is a new
    /// subscribe, never an unsubscribe/subscribe pair.
    pub fn select_instrument(&self, symbol: Option<&str>) -> Result<(), AppError> {
        let normalized = symbol.map(normalize_symbol).transpose()?;
        self.subscription.set(normalized.clone());
        self.display.lock().select_pair(normalized.as_deref());

        if let Some(symbol) = normalized {
            if self.state() == ConnectionState::Connected {
                self.send_subscribe(&symbol);
            }
        }
        Ok(())
    }

    fn begin_connect(&self) -> Option<(u64, CancellationToken)> {
        let (session, cancel) = {
            let mut inner = self.inner.lock();
            if inner.state != ConnectionState::Disconnected {
                return None;
            }
            inner.session += 1;
            inner.state = ConnectionState::Connecting;
            let cancel = CancellationToken::new();
            inner.cancel = Some(cancel.clone());
            (inner.session, cancel)
        };

        self.listeners
            .notify_connection_state(ConnectionState::Connecting);
        Some((session, cancel))
    }

    fn on_channel_established(
        &self,
        session: u64,
        outbound: mpsc::UnboundedSender<OutboundFrame>,
    ) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.session != session {
                return false;
            }
            inner.state = ConnectionState::Connected;
            inner.outbound = Some(outbound);
        }

        info!("feed channel connected");
        self.listeners
            .notify_connection_state(ConnectionState::Connected);

        if let Some(symbol) = self.subscription.get() {
            self.send_subscribe(&symbol);
        }
        true
    }

    fn fail_connect(&self, session: u64, error: &AppError) {
        {
            let mut inner = self.inner.lock();
            if inner.session != session {
                return;
            }
            inner.state = ConnectionState::Disconnected;
            inner.cancel = None;
            inner.outbound = None;
        }

        warn!(error = %error, "feed channel setup failed");
        self.listeners.notify_error(&error.to_string());
        self.listeners
            .notify_connection_state(ConnectionState::Disconnected);
    }

    fn finish_session(&self, session: u64, end: SessionEnd) {
        if matches!(end, SessionEnd::Cancelled) {
            return;
        }

        {
            let mut inner = self.inner.lock();
            if inner.session != session {
                return;
            }
            inner.state = ConnectionState::Disconnected;
            inner.cancel = None;
            inner.outbound = None;
        }

        match &end {
            SessionEnd::TransportError(error) => {
                warn!(error = %error, "feed channel lost");
                self.listeners.notify_error(&error.to_string());
            }
            _ => info!("feed channel closed by remote"),
        }
        self.listeners
            .notify_connection_state(ConnectionState::Disconnected);
    }

    fn send_subscribe(&self, symbol: &str) {
        let outbound = self.inner.lock().outbound.clone();
        match outbound {
            Some(sender) => {
                if sender
                    .send(OutboundFrame::Subscribe(symbol.to_string()))
                    .is_err()
                {
                    debug!(symbol, "subscribe dropped: outbound channel closed");
                }
            }
            None => debug!(symbol, "subscribe skipped: no open channel"),
        }
    }

    fn is_current(&self, session: u64) -> bool {
        self.inner.lock().session == session
    }

    async fn run_session(self: Arc<Self>, session: u64, cancel: CancellationToken) {
        let stream = match connect_feed_stream(&self.config).await {
            Ok(stream) => stream,
            Err(error) => {
                self.fail_connect(session, &error);
                return;
            }
        };

        let (sink, stream) = stream.split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        if !self.on_channel_established(session, outbound_tx) {
            // Torn down while the handshake was in flight.
            return;
        }

        let writer = tokio::spawn(pump_outbound(sink, outbound_rx, cancel.clone()));
        let end = self.read_loop(session, stream, &cancel).await;
        cancel.cancel();
        let _ = writer.await;
        self.finish_session(session, end);
    }

    async fn read_loop(
        &self,
        session: u64,
        mut stream: SplitStream<FeedWsStream>,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => return SessionEnd::Cancelled,
                next_message = stream.next() => next_message,
            };

            let Some(frame_result) = frame else {
                return SessionEnd::RemoteClosed;
            };

            match frame_result {
                Ok(message) => {
                    if !self.is_current(session) {
                        return SessionEnd::Cancelled;
                    }
                    match message {
                        Message::Text(text_payload) => {
                            self.handle_payload(text_payload.into_bytes());
                        }
                        Message::Binary(binary_payload) => self.handle_payload(binary_payload),
                        Message::Close(_) => return SessionEnd::RemoteClosed,
                        _ => {}
                    }
                }
                Err(error) => return SessionEnd::TransportError(error.into()),
            }
        }
    }

    fn handle_payload(&self, mut payload: Vec<u8>) {
        match parse_feed_message(payload.as_mut_slice()) {
            Ok(message) => self.dispatcher.dispatch(message),
            Err(error) => warn!(error = %error, "dropping malformed feed message"),
        }
    }
}

async fn pump_outbound(
    mut sink: SplitSink<FeedWsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = outbound.recv() => frame,
        };

        let Some(frame) = frame else {
            break;
        };

        match frame.into_message() {
            Ok(message) => {
                if let Err(error) = sink.send(message).await {
                    warn!(error = %error, "failed to send outbound frame");
                    break;
                }
            }
            Err(error) => warn!(error = %error, "failed to encode outbound frame"),
        }
    }

    let _ = sink.close().await;
}
