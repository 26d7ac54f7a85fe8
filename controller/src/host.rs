use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, QoS};
use tokio::{
    net::TcpListener,
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use climate_common::{
    topics::{Topics, PAYLOAD_OFFLINE},
    ClimateController, OutboundMessage, Presenter, Reading, ReadingSource, RuntimeConfig,
    SensorError, SimulatedRoom,
};

use crate::{
    api,
    console::ConsolePresenter,
    store::{load_runtime_config, ConfigStore},
    transport::{mqtt_options, publish_all, try_publish_all, Backoff, MqttRelayOutput},
};

pub type SharedController = Arc<Mutex<ClimateController<MqttRelayOutput>>>;

#[derive(Clone)]
pub struct AppState {
    pub controller: SharedController,
}

const MQTT_REQUEST_CAPACITY: usize = 64;
const SHUTDOWN_FLUSH: Duration = Duration::from_millis(500);

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = ConfigStore::from_env();
    let runtime = load_runtime_config(&store).await;
    info!("runtime config from {}", store.path().display());

    let topics = Topics::new(&runtime.bridge);
    let last_will = OutboundMessage {
        topic: topics.status.clone(),
        payload: PAYLOAD_OFFLINE.to_string(),
        retain: true,
    };

    let options = mqtt_options(&runtime.network, &last_will);
    let (mqtt, eventloop) = AsyncClient::new(options, MQTT_REQUEST_CAPACITY);

    let output = MqttRelayOutput::new(mqtt.clone(), runtime.relays.clone());
    let controller = ClimateController::new(&runtime, output)
        .context("failed to build discovery record")?;
    let app_state = AppState {
        controller: Arc::new(Mutex::new(controller)),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    spawn_mqtt_loop(
        app_state.clone(),
        mqtt.clone(),
        eventloop,
        topics.subscriptions(),
        Backoff::from_config(&runtime.network),
    );
    let control = spawn_control_loop(app_state.clone(), mqtt.clone(), &runtime, shutdown_rx);

    let addr = SocketAddr::from(([0, 0, 0, 0], runtime.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;
    info!("controller listening on http://{addr}");

    let served = axum::serve(listener, api::router(app_state))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for shutdown signal: {err}");
            }
            info!("shutdown requested");
        })
        .await;

    // The control loop owns the fail-safe; let it finish before exiting.
    let _ = shutdown_tx.send(true);
    control.await.context("control loop panicked")?;
    served.context("http server failed")?;

    tokio::time::sleep(SHUTDOWN_FLUSH).await;
    if let Err(err) = mqtt.try_disconnect() {
        debug!("mqtt disconnect: {err}");
    }
    Ok(())
}

fn spawn_mqtt_loop(
    app_state: AppState,
    mqtt: AsyncClient,
    mut eventloop: EventLoop,
    subscriptions: Vec<String>,
    mut backoff: Backoff,
) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    backoff.reset();
                    for topic in &subscriptions {
                        if let Err(err) = mqtt.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                            warn!("mqtt subscribe to {topic} failed: {err}");
                        }
                    }
                    let messages = app_state.controller.lock().await.on_connected(monotonic_ms());
                    try_publish_all(&mqtt, messages);
                }
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    let mut controller = app_state.controller.lock().await;
                    // Rejections are logged by the controller.
                    let _ = controller.handle_message(&message.topic, &message.payload);
                }
                Ok(_) => {}
                Err(err) => {
                    let was_connected = {
                        let mut controller = app_state.controller.lock().await;
                        let was_connected = controller.bridge().is_connected();
                        controller.on_disconnected();
                        was_connected
                    };
                    let delay = backoff.next_delay();
                    if was_connected {
                        info!("mqtt disconnected");
                    }
                    warn!("mqtt poll error: {err}; reconnecting in {}ms", delay.as_millis());
                    tokio::time::sleep(delay).await;
                }
            }
        }
    });
}

fn spawn_control_loop(
    app_state: AppState,
    mqtt: AsyncClient,
    runtime: &RuntimeConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let cycle_interval = Duration::from_millis(runtime.control.cycle_interval_ms);
    let poll_interval_ms = runtime.control.poll_interval_ms;
    let sensor_timeout = Duration::from_millis(runtime.control.sensor_timeout_ms);
    let publish_timeout = Duration::from_millis(runtime.network.publish_timeout_ms);
    let room = Arc::new(std::sync::Mutex::new(SimulatedRoom::new(68.0, 45.0, 55.0)));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cycle_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut presenter = ConsolePresenter::default();
        let mut last_poll_ms: Option<u64> = None;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break,
            }

            let now_ms = monotonic_ms();
            let poll_due = last_poll_ms
                .map(|last| now_ms.saturating_sub(last) >= poll_interval_ms)
                .unwrap_or(true);
            let reading = if poll_due {
                last_poll_ms = Some(now_ms);
                let actual = app_state.controller.lock().await.relay().actual();
                match room.lock() {
                    Ok(mut room) => room.tick(now_ms, actual),
                    Err(_) => warn!("simulated room lock poisoned"),
                }
                Some(read_sensor(room.clone(), sensor_timeout).await)
            } else {
                None
            };

            let outcome = {
                let mut controller = app_state.controller.lock().await;
                controller.run_cycle(reading, now_ms)
            };
            presenter.render(&outcome.frame, now_ms);
            publish_all(&mqtt, outcome.outbound, publish_timeout).await;
        }

        let messages = app_state.controller.lock().await.shutdown(monotonic_ms());
        publish_all(&mqtt, messages, publish_timeout).await;
    })
}

/// Sample `source` on the blocking pool, bounded by `timeout`.
async fn read_sensor<S>(
    source: Arc<std::sync::Mutex<S>>,
    timeout: Duration,
) -> Result<Reading, SensorError>
where
    S: ReadingSource + Send + 'static,
{
    let task = tokio::task::spawn_blocking(move || {
        let mut source = source
            .lock()
            .map_err(|_| SensorError::Unavailable("sensor lock poisoned".to_string()))?;
        source.read()
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => Err(SensorError::Unavailable(err.to_string())),
        Err(_) => Err(SensorError::Timeout),
    }
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use climate_common::{ActuatorSet, Device};

    struct HungSensor;

    impl ReadingSource for HungSensor {
        fn read(&mut self) -> Result<Reading, SensorError> {
            std::thread::sleep(Duration::from_millis(200));
            Ok(Reading::new(70.0, 40.0, 0))
        }
    }

    #[tokio::test]
    async fn sensor_read_returns_sample() {
        let mut room = SimulatedRoom::new(65.0, 40.0, 65.0);
        room.tick(0, ActuatorSet::only(Device::Heat));
        room.tick(600_000, ActuatorSet::OFF);

        let reading = read_sensor(Arc::new(std::sync::Mutex::new(room)), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(reading.valid);
        assert!(reading.temperature_f > 69.9);
        assert_eq!(reading.taken_at_ms, 600_000);
    }

    #[tokio::test]
    async fn slow_sensor_times_out() {
        let result = read_sensor(
            Arc::new(std::sync::Mutex::new(HungSensor)),
            Duration::from_millis(20),
        )
        .await;
        assert_eq!(result, Err(SensorError::Timeout));
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let first = monotonic_ms();
        let second = monotonic_ms();
        assert!(second >= first);
    }
}
