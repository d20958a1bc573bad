use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::info;

use plantcare_events::{BrokerMessage, Subscription};

use super::WorkerHandle;
use crate::stream_handler::StreamHandler;

/// Drains an ingress subscription into a [`StreamHandler`], one message at a
/// time in arrival order.
#[derive(Debug)]
pub struct TelemetryWorker;

impl TelemetryWorker {
    pub fn spawn(
        handler: Arc<StreamHandler>,
        mut subscription: Subscription<BrokerMessage>,
    ) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let join = tokio::spawn(async move {
            info!(worker = "telemetry", "worker started");
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    message = subscription.recv() => match message {
                        Some(message) => handler.handle(&message),
                        None => break,
                    },
                }
            }
            info!(worker = "telemetry", "worker stopped");
        });

        WorkerHandle::new("telemetry", shutdown_tx, join)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;
    use plantcare_events::{EventBus, InMemoryEventBus, topic};
    use serde_json::json;

    use crate::config::SystemConfig;
    use crate::model_handle::ModelHandle;
    use crate::storage::{TrainingDataFile, WateringStore};
    use crate::stream_handler::BusDecisionSink;
    use crate::telemetry_store::TelemetryStore;

    #[tokio::test]
    async fn drains_bus_until_shutdown() {
        let dir = std::env::temp_dir().join(format!("plantcare-{}", uuid::Uuid::now_v7()));
        let bus = Arc::new(InMemoryEventBus::<BrokerMessage>::new());
        let store = Arc::new(TelemetryStore::new());
        let handler = Arc::new(StreamHandler::new(
            SystemConfig::default(),
            Arc::clone(&store),
            Arc::new(ModelHandle::new()),
            Arc::new(BusDecisionSink::new(Arc::clone(&bus))),
            WateringStore::new(dir.join("last_watering.json")),
            TrainingDataFile::new(dir.join("ai_training_data.csv")),
        ));

        let worker = TelemetryWorker::spawn(handler, bus.subscribe());
        for moisture in [41.0, 40.0, 39.5] {
            bus.publish(BrokerMessage::new(
                topic::SENSOR,
                json!({"moisture": moisture, "temperature": 26.0, "air_humidity": 58.0}),
            ))
            .unwrap();
        }

        let deadline = Utc::now() + chrono::Duration::seconds(2);
        while store.reading_count() < 3 && Utc::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.recent_moisture(3), vec![41.0, 40.0, 39.5]);

        worker.shutdown().await;
    }
}
