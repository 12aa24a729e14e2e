//! Broker Link
//!
//! Owns the MQTT session. `connect` performs the first handshake in the
//! caller's task so refusal and timeout are reported; after that a background
//! task drives the event loop and reconnects on its own.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::error::{BrokerError, BrokerResult};
use super::message::Message;
use super::Publisher;
use crate::config::BrokerConfig;

/// How long `disconnect` waits for the DISCONNECT packet to be flushed
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// Connection to the MQTT broker
pub struct BrokerLink {
    client: AsyncClient,
    /// Present until the first successful `connect`, then owned by the event loop task
    eventloop: Mutex<Option<EventLoop>>,
    inbound: mpsc::Sender<Message>,
    /// Filters re-issued after every reconnect
    subscriptions: Arc<Mutex<Vec<String>>>,
    /// Broker currently acknowledges our session
    connected: Arc<AtomicBool>,
    /// `connect` succeeded and `disconnect` has not been called
    session_open: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
    qos: QoS,
    addr: String,
    reconnect_interval: Duration,
    connect_timeout: Duration,
}

impl BrokerLink {
    /// Create an unconnected link and the channel inbound messages arrive on
    pub fn new(config: &BrokerConfig) -> (Self, mpsc::Receiver<Message>) {
        let mut options = MqttOptions::new(config.client_id(), config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
        options.set_clean_session(true);

        let capacity = config.channel_capacity.max(1);
        let (client, eventloop) = AsyncClient::new(options, capacity);
        let (inbound, inbound_rx) = mpsc::channel(capacity);

        let link = Self {
            client,
            eventloop: Mutex::new(Some(eventloop)),
            inbound,
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(false)),
            session_open: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
            qos: qos_from_level(config.qos),
            addr: format!("{}:{}", config.host, config.port),
            reconnect_interval: config.reconnect_interval(),
            connect_timeout: config.connect_timeout(),
        };

        (link, inbound_rx)
    }

    /// Establish the broker session and start the reconnecting event loop
    ///
    /// On failure the link stays unconnected and `connect` may be retried.
    pub async fn connect(&self) -> BrokerResult<()> {
        let mut eventloop = self
            .eventloop
            .lock()
            .take()
            .ok_or(BrokerError::AlreadyConnected)?;

        tracing::debug!(broker = %self.addr, "Connecting to MQTT broker");

        let reason = match tokio::time::timeout(self.connect_timeout, wait_for_connack(&mut eventloop)).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!(
                "no CONNACK within {}ms",
                self.connect_timeout.as_millis()
            )),
        };

        if let Some(reason) = reason {
            *self.eventloop.lock() = Some(eventloop);
            return Err(BrokerError::Connect {
                addr: self.addr.clone(),
                reason,
            });
        }

        self.connected.store(true, Ordering::SeqCst);
        self.session_open.store(true, Ordering::SeqCst);

        let task = EventLoopTask {
            eventloop,
            client: self.client.clone(),
            inbound: self.inbound.clone(),
            subscriptions: Arc::clone(&self.subscriptions),
            connected: Arc::clone(&self.connected),
            session_open: Arc::clone(&self.session_open),
            qos: self.qos,
            reconnect_interval: self.reconnect_interval,
            resubscribe: None,
        };
        *self.task.lock() = Some(tokio::spawn(task.run()));

        tracing::info!(broker = %self.addr, "Connected to MQTT broker");
        Ok(())
    }

    /// Connect, retrying at the reconnect interval until the broker accepts,
    /// then subscribe to `filters`
    pub async fn establish(&self, filters: &[String]) {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.connect().await {
                Ok(()) | Err(BrokerError::AlreadyConnected) => break,
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        retry_in_ms = self.reconnect_interval.as_millis() as u64,
                        "{}",
                        e
                    );
                    tokio::time::sleep(self.reconnect_interval).await;
                }
            }
        }

        for filter in filters {
            if let Err(e) = self.subscribe(filter).await {
                tracing::error!("{}", e);
            }
        }
    }

    /// Register interest in a topic filter
    ///
    /// The filter is remembered and re-issued after every reconnect.
    pub async fn subscribe(&self, filter: &str) -> BrokerResult<()> {
        if !self.session_open.load(Ordering::SeqCst) {
            return Err(BrokerError::Subscribe {
                filter: filter.to_string(),
                reason: "not connected".to_string(),
            });
        }
        if filter.is_empty() {
            return Err(BrokerError::Subscribe {
                filter: String::new(),
                reason: "empty topic filter".to_string(),
            });
        }

        if !self.connected.load(Ordering::SeqCst) {
            self.remember(filter);
            tracing::info!(filter = %filter, "Broker unreachable, subscribing on reconnect");
            return Ok(());
        }

        // Only times out if the session drops while queued; the reconnect
        // re-issues remembered filters
        match tokio::time::timeout(self.connect_timeout, self.client.subscribe(filter, self.qos)).await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(BrokerError::Subscribe {
                    filter: filter.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                tracing::warn!(filter = %filter, "MQTT request queue full, subscribing on reconnect")
            }
        }

        self.remember(filter);
        tracing::info!(filter = %filter, "Subscribed to topic filter");
        Ok(())
    }

    fn remember(&self, filter: &str) {
        let mut subscriptions = self.subscriptions.lock();
        if !subscriptions.iter().any(|f| f == filter) {
            subscriptions.push(filter.to_string());
        }
    }

    /// Filters currently re-issued on reconnect
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().clone()
    }

    fn event_loop_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Broker address this link talks to
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Close the session and stop the event loop
    pub async fn disconnect(&self) {
        if !self.session_open.swap(false, Ordering::SeqCst) {
            return;
        }

        // A full queue cannot take the DISCONNECT; the task is aborted below
        if let Err(e) = self.client.try_disconnect() {
            tracing::debug!(error = %e, "Failed to queue MQTT disconnect");
        }

        let task = self.task.lock().take();
        if let Some(mut task) = task {
            if tokio::time::timeout(DISCONNECT_GRACE, &mut task).await.is_err() {
                task.abort();
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        tracing::info!(broker = %self.addr, "Disconnected from MQTT broker");
    }
}

#[async_trait]
impl Publisher for BrokerLink {
    async fn publish(&self, topic: &str, payload: Bytes) -> BrokerResult<()> {
        if !self.session_open.load(Ordering::SeqCst) {
            return Err(BrokerError::Publish {
                topic: topic.to_string(),
                reason: "no broker session".to_string(),
            });
        }

        if !self.connected.load(Ordering::SeqCst) {
            tracing::debug!(topic = %topic, "Broker unreachable, publish queued until reconnect");
        }

        // The request queue is not drained while the broker is unreachable;
        // waiting for room would hang the caller until reconnect
        if let Err(e) = self
            .client
            .try_publish(topic, self.qos, false, payload.to_vec())
        {
            if !self.event_loop_running() {
                return Err(BrokerError::Publish {
                    topic: topic.to_string(),
                    reason: e.to_string(),
                });
            }
            tracing::warn!(topic = %topic, "MQTT request queue full, publish dropped");
            return Ok(());
        }

        tracing::debug!(topic = %topic, bytes = payload.len(), "Published to broker");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for BrokerLink {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

/// State moved into the background event loop task
struct EventLoopTask {
    eventloop: EventLoop,
    client: AsyncClient,
    inbound: mpsc::Sender<Message>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    connected: Arc<AtomicBool>,
    session_open: Arc<AtomicBool>,
    qos: QoS,
    reconnect_interval: Duration,
    resubscribe: Option<JoinHandle<()>>,
}

impl EventLoopTask {
    async fn run(mut self) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    tracing::trace!(topic = %publish.topic, "Received MQTT message");
                    let message = Message::new(publish.topic, publish.payload);
                    if self.inbound.send(message).await.is_err() {
                        tracing::debug!("Inbound channel closed, stopping broker event loop");
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.connected.store(true, Ordering::SeqCst);
                    tracing::info!("Broker session re-established");
                    self.resubscribe();
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    self.connected.store(false, Ordering::SeqCst);
                    if !self.session_open.load(Ordering::SeqCst) {
                        break;
                    }
                    tracing::warn!(
                        error = %e,
                        retry_in_ms = self.reconnect_interval.as_millis() as u64,
                        "MQTT connection lost, retrying"
                    );
                    tokio::time::sleep(self.reconnect_interval).await;
                }
            }
        }

        if let Some(task) = self.resubscribe.take() {
            task.abort();
        }
        tracing::debug!("Broker event loop stopped");
    }

    /// Broker sessions are clean, so every filter has to be issued again
    ///
    /// Requests queued during the outage may still fill the client queue, so
    /// the filters are sent from a separate task that waits for room while
    /// this loop keeps draining.
    fn resubscribe(&mut self) {
        if let Some(previous) = self.resubscribe.take() {
            previous.abort();
        }

        let filters = self.subscriptions.lock().clone();
        if filters.is_empty() {
            return;
        }

        let client = self.client.clone();
        let qos = self.qos;
        self.resubscribe = Some(tokio::spawn(async move {
            for filter in filters {
                match client.subscribe(filter.clone(), qos).await {
                    Ok(()) => tracing::debug!(filter = %filter, "Re-subscribed after reconnect"),
                    Err(e) => {
                        tracing::error!(filter = %filter, error = %e, "Re-subscribe failed")
                    }
                }
            }
        }));
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), ConnectionError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(_)) = eventloop.poll().await? {
            return Ok(());
        }
    }
}

fn qos_from_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}
