//! Relay between an MQTT broker and the in-process event bus.
//!
//! Ingress topics are forwarded from the broker onto the bus; decisions
//! published on the bus are forwarded to the broker.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use plantcare_events::{BrokerMessage, EventBus, Subscription, topic};

use crate::config::MqttConfig;
use crate::workers::WorkerHandle;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("MQTT host not configured")]
    NotConfigured,
}

#[derive(Debug)]
pub struct MqttBridge;

impl MqttBridge {
    pub fn spawn<B>(config: &MqttConfig, bus: B) -> Result<WorkerHandle, BridgeError>
    where
        B: EventBus<BrokerMessage> + 'static,
    {
        let options = Self::options(config)?;
        let (host, port) = options.broker_address();

        let (client, eventloop) = AsyncClient::new(options, 64);
        let outbound = bus.subscribe();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        info!(%host, port, tls = config.tls, "mqtt bridge starting");
        let join = tokio::spawn(relay(client, eventloop, bus, outbound, shutdown_rx));
        Ok(WorkerHandle::new("mqtt-bridge", shutdown_tx, join))
    }

    fn options(config: &MqttConfig) -> Result<MqttOptions, BridgeError> {
        let host = config.host.as_deref().ok_or(BridgeError::NotConfigured)?;
        let mut options = MqttOptions::new(&config.client_id, host, config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user, pass);
        }
        if config.tls {
            options.set_transport(Transport::tls_with_default_config());
        }
        Ok(options)
    }
}

async fn relay<B>(
    client: AsyncClient,
    mut eventloop: EventLoop,
    bus: B,
    mut outbound: Subscription<BrokerMessage>,
    mut shutdown: oneshot::Receiver<()>,
) where
    B: EventBus<BrokerMessage>,
{
    loop {
        tokio::select! {
            _ = &mut shutdown => break,

            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("mqtt connected");
                    for t in topic::INGRESS {
                        if let Err(e) = client.subscribe(t, QoS::AtLeastOnce).await {
                            error!(topic = t, error = %e, "mqtt subscribe failed");
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match BrokerMessage::from_bytes(publish.topic.as_str(), &publish.payload) {
                        Ok(message) => {
                            if let Err(e) = bus.publish(message) {
                                warn!(error = ?e, "failed to forward mqtt message");
                            }
                        }
                        Err(e) => warn!(
                            topic = %publish.topic,
                            error = %e,
                            "non-JSON mqtt payload dropped"
                        ),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "mqtt connection error; retrying");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            },

            message = outbound.recv() => match message {
                Some(message) if message.topic() == topic::PREDICTION => {
                    if let Err(e) = client
                        .publish(message.topic(), QoS::AtLeastOnce, false, message.payload_bytes())
                        .await
                    {
                        error!(error = %e, "failed to publish decision to mqtt");
                    }
                }
                Some(message) => debug!(topic = message.topic(), "not forwarded to mqtt"),
                None => break,
            },
        }
    }

    if let Err(e) = client.disconnect().await {
        debug!(error = %e, "mqtt disconnect failed");
    }
    info!("mqtt bridge stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: Option<&str>, tls: bool) -> MqttConfig {
        MqttConfig {
            host: host.map(str::to_string),
            port: if tls { 8883 } else { 1883 },
            client_id: "plantcare-test".to_string(),
            username: Some("grower".to_string()),
            password: Some("secret".to_string()),
            tls,
        }
    }

    #[test]
    fn plain_connection_by_default() {
        let options = MqttBridge::options(&config(Some("broker.local"), false)).unwrap();
        assert_eq!(options.broker_address(), ("broker.local".to_string(), 1883));
        assert!(matches!(options.transport(), Transport::Tcp));
    }

    #[test]
    fn tls_flag_selects_a_tls_transport() {
        let options = MqttBridge::options(&config(Some("broker.cloud"), true)).unwrap();
        assert_eq!(options.broker_address(), ("broker.cloud".to_string(), 8883));
        assert!(matches!(options.transport(), Transport::Tls(_)));
    }

    #[test]
    fn missing_host_is_not_configured() {
        assert!(matches!(
            MqttBridge::options(&config(None, true)),
            Err(BridgeError::NotConfigured)
        ));
    }
}
