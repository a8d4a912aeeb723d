//! Background status polling and the live-metrics socket.

use futures_util::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{Alert, ApiClient, SystemMetrics, SystemStatus};
use crate::error::ApiError;

const EVENT_BUFFER: usize = 64;

/// Events published by the monitor tasks.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// A system status poll succeeded.
    Status(SystemStatus),
    /// A metrics sample arrived on the live socket.
    Metrics {
        system: SystemMetrics,
        alerts: Vec<Alert>,
    },
    /// The live socket connected.
    Connected,
    /// The live socket closed or failed; a reconnect follows.
    Disconnected,
    Error(String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SocketMessage {
    Metrics {
        system: SystemMetrics,
        #[serde(default)]
        alerts: Vec<Alert>,
    },
    #[serde(other)]
    Other,
}

/// Live-metrics socket URL for an API base URL.
pub fn ws_url(api_url: &str, token: &str) -> Result<String, ApiError> {
    let base = api_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(ApiError::Connection(format!(
            "Cannot derive a WebSocket URL from {api_url}"
        )));
    };
    Ok(format!(
        "{base}/ws/monitoring?token={}",
        urlencoding::encode(token)
    ))
}

/// Map one text frame to an event. Unknown message types are `None`.
fn parse_message(text: &str) -> Result<Option<MonitorEvent>, serde_json::Error> {
    Ok(match serde_json::from_str(text)? {
        SocketMessage::Metrics { system, alerts } => Some(MonitorEvent::Metrics { system, alerts }),
        SocketMessage::Other => None,
    })
}

/// Send unless cancelled first. `false` means stop.
async fn publish(
    events: &mpsc::Sender<MonitorEvent>,
    cancel: &CancellationToken,
    event: MonitorEvent,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = events.send(event) => sent.is_ok(),
    }
}

/// Fetch system status immediately and then on every `every` tick until
/// cancelled or the receiver goes away. An authentication failure cancels
/// `cancel` and ends the loop, so tasks sharing the token stop with it.
pub async fn poll_status(
    api: Arc<ApiClient>,
    every: Duration,
    events: mpsc::Sender<MonitorEvent>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = api.system_status() => result,
        };

        let (event, fatal) = match result {
            Ok(status) => (MonitorEvent::Status(status), false),
            Err(e) => {
                warn!(error = %e, "status poll failed");
                let fatal = e.is_auth();
                (MonitorEvent::Error(e.to_string()), fatal)
            }
        };
        if !publish(&events, &cancel, event).await {
            break;
        }
        if fatal {
            cancel.cancel();
            break;
        }
    }
    debug!("status poller stopped");
}

/// Keep a live-metrics socket open, reconnecting after a fixed delay whenever
/// it closes or fails, until cancelled or the receiver goes away.
pub async fn stream_metrics(
    url: String,
    reconnect_delay: Duration,
    events: mpsc::Sender<MonitorEvent>,
    cancel: CancellationToken,
) {
    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = run_connection(&url, &events) => outcome,
        };
        if let Err(e) = outcome {
            warn!(error = %e, "live metrics connection failed");
            if !publish(&events, &cancel, MonitorEvent::Error(e.to_string())).await {
                break;
            }
        }
        if !publish(&events, &cancel, MonitorEvent::Disconnected).await {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
        debug!("reconnecting live metrics");
    }
    debug!("live metrics stopped");
}

async fn run_connection(
    url: &str,
    events: &mpsc::Sender<MonitorEvent>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let (mut socket, _) = connect_async(url).await?;
    info!("live metrics connected");
    if events.send(MonitorEvent::Connected).await.is_err() {
        return Ok(());
    }

    while let Some(message) = socket.next().await {
        match message? {
            Message::Text(text) => match parse_message(&text) {
                Ok(Some(event)) => {
                    if events.send(event).await.is_err() {
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "malformed live metrics message"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}

/// Running monitor tasks. Dropping the receiver or calling
/// [`Monitor::shutdown`] stops them.
pub struct Monitor {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Monitor {
    /// Start the status poller and, with `live`, the metrics socket.
    pub fn start(
        api: Arc<ApiClient>,
        poll_interval: Duration,
        live: Option<Duration>,
    ) -> Result<(Self, mpsc::Receiver<MonitorEvent>), ApiError> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        if let Some(reconnect_delay) = live {
            let token = api.token().ok_or(ApiError::NotAuthenticated)?;
            let url = ws_url(api.base_url(), &token)?;
            tasks.push(tokio::spawn(stream_metrics(
                url,
                reconnect_delay,
                tx.clone(),
                cancel.child_token(),
            )));
        }
        // A rejected token stops the whole monitor, closing the channel.
        tasks.push(tokio::spawn(poll_status(
            api,
            poll_interval,
            tx,
            cancel.clone(),
        )));

        Ok((Self { cancel, tasks }, rx))
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
    }
}
