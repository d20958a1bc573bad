use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{info, warn};

use plantcare_ai::{
    AdvisoryClient, FileModelLoader, GeminiAdvisoryClient, ModelLoader, RateLimitedAdvisory,
    RateLimiter,
};
use plantcare_events::{BrokerMessage, EventBus, InMemoryEventBus};
use plantcare_infra::retrain::{ScriptTrainer, Trainer, TrainingLedger};
use plantcare_infra::storage::{TrainingDataFile, WateringStore};
use plantcare_infra::{
    AppConfig, BusDecisionSink, ModelHandle, ModelReloader, RetrainOrchestrator, RetrainScheduler,
    StreamHandler, TelemetryStore, TelemetryWorker, WorkerHandle,
};

/// Everything the HTTP handlers reach through `Extension<Arc<AppServices>>`.
pub struct AppServices {
    pub bus: Arc<InMemoryEventBus<BrokerMessage>>,
    pub handler: Arc<StreamHandler>,
    pub retrain: Arc<RetrainOrchestrator>,
    workers: Mutex<Vec<WorkerHandle>>,
    started_at: Instant,
}

impl AppServices {
    pub fn store(&self) -> &Arc<TelemetryStore> {
        self.handler.store()
    }

    pub fn model(&self) -> &Arc<ModelHandle> {
        self.handler.model()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn worker_names(&self) -> Vec<&'static str> {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(WorkerHandle::name)
            .collect()
    }

    /// Stop every background worker and wait for them.
    pub async fn shutdown(&self) {
        let workers =
            std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for worker in workers {
            let name = worker.name();
            worker.shutdown().await;
            info!(worker = name, "worker shut down");
        }
    }
}

/// Wire stores, model, advisory client, retraining and background workers.
///
/// Must run inside a Tokio runtime: workers are spawned here.
pub fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    std::fs::create_dir_all(&config.paths.data_dir)
        .with_context(|| format!("creating data dir {}", config.paths.data_dir.display()))?;

    let bus = Arc::new(InMemoryEventBus::<BrokerMessage>::new());
    let store = Arc::new(TelemetryStore::new());

    let model = Arc::new(ModelHandle::new());
    let loader: Arc<dyn ModelLoader> = Arc::new(FileModelLoader::new(
        &config.paths.model_file,
        &config.paths.scaler_file,
    ));
    match model.reload(loader.as_ref()) {
        Ok(version) => info!(version, model = %config.paths.model_file.display(), "model loaded"),
        Err(e) => warn!(
            error = %e,
            "no model loaded; predictions disabled until a successful retrain"
        ),
    }

    let training_data = TrainingDataFile::new(&config.retrain.training_data_file);
    if let Err(e) = training_data.ensure_header() {
        warn!(error = %e, "training data file not writable");
    }

    let mut handler = StreamHandler::new(
        config.system.clone(),
        Arc::clone(&store),
        Arc::clone(&model),
        Arc::new(BusDecisionSink::new(Arc::clone(&bus))),
        WateringStore::new(&config.paths.last_watering_file),
        training_data,
    );
    match advisory_client(config) {
        Some(client) => handler = handler.with_advisory(client),
        None => warn!("GEMINI_API_KEY not set; advisory disabled"),
    }
    let handler = Arc::new(handler);

    let trainer = Arc::new(ScriptTrainer::new(
        &config.retrain.python_path,
        &config.retrain.script_path,
    ));
    let ledger = TrainingLedger::load_or_empty(&config.retrain.history_file);
    info!(attempts = ledger.len(), "training history loaded");
    let retrain = Arc::new(RetrainOrchestrator::new(
        config.retrain.clone(),
        Arc::clone(&trainer) as Arc<dyn Trainer>,
        ledger,
    ));
    retrain.set_reload_handler(Arc::new(ModelReloader::new(Arc::clone(&model), loader)));

    let mut workers = vec![TelemetryWorker::spawn(Arc::clone(&handler), bus.subscribe())];
    if let Some(worker) = RetrainScheduler::start(Arc::clone(&retrain), trainer.as_ref()) {
        workers.push(worker);
    }
    #[cfg(feature = "mqtt")]
    match plantcare_infra::mqtt_bridge::MqttBridge::spawn(&config.mqtt, Arc::clone(&bus)) {
        Ok(worker) => workers.push(worker),
        Err(e) => warn!(error = %e, "mqtt bridge not started"),
    }

    Ok(AppServices {
        bus,
        handler,
        retrain,
        workers: Mutex::new(workers),
        started_at: Instant::now(),
    })
}

fn advisory_client(config: &AppConfig) -> Option<Arc<dyn AdvisoryClient>> {
    let key = config.advisory.api_key.as_deref()?;
    match GeminiAdvisoryClient::new(key, &config.advisory.model) {
        Ok(client) => {
            info!(model = %config.advisory.model, "advisory client ready");
            let client: Arc<dyn AdvisoryClient> =
                Arc::new(RateLimitedAdvisory::new(client, RateLimiter::advisory_default()));
            Some(client)
        }
        Err(e) => {
            warn!(error = %e, "advisory client could not be built");
            None
        }
    }
}
