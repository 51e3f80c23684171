use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{
    attempt_with_timeout, FailureSignal, ProbeReport, ProbeStage, StageOutcome, SupervisorError,
    TopicSummary,
};
use crate::config::BrokerConfig;
use crate::kafka::{AdminSession, ClientError, ClientRole, Cluster, Session};

type Attempt<T> = Result<T, SupervisorError<ClientError>>;

/// Marker for "stop here, the report already says why"
struct Halted;

/// Receives the admin session when a run unwinds before closing it
#[derive(Clone, Default)]
struct AdminSlot {
    session: Arc<Mutex<Option<Box<dyn AdminSession>>>>,
}

impl AdminSlot {
    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn AdminSession>>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn put(&self, session: Box<dyn AdminSession>) {
        *self.lock() = Some(session);
    }

    /// Close the session left behind, if any
    async fn release(&self, timeout: Duration) -> Option<Attempt<()>> {
        let session = self.lock().take()?;
        Some(attempt_with_timeout(session.disconnect(), timeout).await)
    }
}

/// Owns the admin session for the rest of the run.
///
/// The normal path hands it back through [`AdminGuard::release`]. If the run
/// is unwound or its future dropped before that, the session goes to the
/// leftover slot when the caller provided one, or is closed from a background
/// task otherwise.
struct AdminGuard {
    session: Option<Box<dyn AdminSession>>,
    leftover: Option<AdminSlot>,
}

impl AdminGuard {
    fn new(session: Box<dyn AdminSession>, leftover: Option<&AdminSlot>) -> Self {
        Self {
            session: Some(session),
            leftover: leftover.cloned(),
        }
    }

    fn session(&self) -> Option<&dyn AdminSession> {
        self.session.as_deref()
    }

    async fn release(mut self, timeout: Duration) -> Attempt<()> {
        match self.session.take() {
            Some(session) => attempt_with_timeout(session.disconnect(), timeout).await,
            None => Ok(()),
        }
    }
}

impl Drop for AdminGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        if let Some(slot) = &self.leftover {
            warn!("Probe run ended abnormally, handing the admin session back for closing");
            slot.put(session);
            return;
        }

        warn!("Probe run ended abnormally, closing admin session in the background");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.disconnect().await {
                        warn!("Admin disconnect failed: {}", e);
                    }
                });
            }
            Err(_) => warn!("No runtime available, admin session dropped without disconnect"),
        }
    }
}

/// Run every probe stage in order against `cluster`.
///
/// Stops at the first fatal failure or when `cancel` fires at a stage
/// boundary. A successfully opened admin session is closed exactly once
/// before the report is returned.
pub async fn run_probes(
    cluster: &dyn Cluster,
    config: &BrokerConfig,
    cancel: &CancellationToken,
) -> ProbeReport {
    run_stages(cluster, config, cancel, None).await
}

/// [`run_probes`] on its own task.
///
/// A panic inside a stage ends that task with a [`JoinError`]. An admin
/// session it left open is closed here before the error is returned.
pub async fn run_probes_in_task(
    cluster: Arc<dyn Cluster>,
    config: BrokerConfig,
    cancel: CancellationToken,
) -> Result<ProbeReport, JoinError> {
    let leftover = AdminSlot::default();
    let request_timeout = config.request_timeout();

    let task = tokio::spawn({
        let leftover = leftover.clone();
        async move { run_stages(cluster.as_ref(), &config, &cancel, Some(&leftover)).await }
    });
    let joined = task.await;

    match leftover.release(request_timeout).await {
        Some(Ok(())) => info!("👋 Admin disconnected after aborted run"),
        Some(Err(e)) => warn!("Admin disconnect failed: {}", e),
        None => {}
    }

    joined
}

async fn run_stages(
    cluster: &dyn Cluster,
    config: &BrokerConfig,
    cancel: &CancellationToken,
    leftover: Option<&AdminSlot>,
) -> ProbeReport {
    let mut report = ProbeReport::new(config);
    info!(
        "Starting connectivity probe against {} (run {})",
        config.brokers().join(", "),
        report.run_id
    );

    if check_cancel(&mut report, cancel, ProbeStage::AdminConnect).is_err() {
        return report.finish();
    }

    info!("🔌 Connecting to Kafka...");
    let timer = Instant::now();
    cluster.take_broker_error(ClientRole::Admin);
    let connection_timeout = config.connection_timeout();
    let connected = attempt_with_timeout(
        cluster.connect_admin(connection_timeout),
        connection_timeout,
    )
    .await;

    let admin = match connected {
        Ok(session) => {
            info!("✅ Connected successfully!");
            report.record(ProbeStage::AdminConnect, StageOutcome::success(), elapsed_ms(timer));
            AdminGuard::new(session, leftover)
        }
        Err(e) => {
            record_failure(&mut report, cluster, ProbeStage::AdminConnect, &e, timer);
            return report.finish();
        }
    };

    if let Some(session) = admin.session() {
        // Halted only means the remaining stages were skipped; the report already says why
        let _ = run_session_stages(&mut report, cluster, session, config, cancel).await;
    }

    match admin.release(config.request_timeout()).await {
        Ok(()) => info!("👋 Admin disconnected"),
        Err(e) => {
            warn!("Admin disconnect failed: {}", e);
            report.cleanup_notice = Some(e.to_string());
        }
    }

    let report = report.finish();
    info!("Probe finished with verdict {}", report.verdict());
    report
}

async fn run_session_stages(
    report: &mut ProbeReport,
    cluster: &dyn Cluster,
    admin: &dyn AdminSession,
    config: &BrokerConfig,
    cancel: &CancellationToken,
) -> Result<(), Halted> {
    let request_timeout = config.request_timeout();

    check_cancel(report, cancel, ProbeStage::ListTopics)?;
    info!("📋 Fetching topics...");
    let timer = Instant::now();
    // Errors the admin client reported while connecting are already settled
    cluster.take_broker_error(ClientRole::Admin);
    let listed = attempt_with_timeout(admin.list_topics(request_timeout), request_timeout).await;
    let topics = fatal(report, cluster, ProbeStage::ListTopics, listed, timer)?;

    let summary = TopicSummary::from_names(&topics);
    info!("✅ Connection verified! Found {} topics.", summary.count);
    if summary.count > 0 {
        info!("📝 Topics: {}", summary.preview_line());
    }
    report.record(
        ProbeStage::ListTopics,
        StageOutcome::success_with(format!("{} topics", summary.count)),
        elapsed_ms(timer),
    );
    report.topics = Some(summary);

    check_cancel(report, cancel, ProbeStage::ProducerConnect)?;
    info!("📤 Testing producer connection...");
    let timer = Instant::now();
    cluster.take_broker_error(ClientRole::Producer);
    let connected =
        attempt_with_timeout(cluster.connect_producer(request_timeout), request_timeout).await;
    let producer = fatal(report, cluster, ProbeStage::ProducerConnect, connected, timer)?;
    info!("✅ Producer connected successfully!");
    report.record(ProbeStage::ProducerConnect, StageOutcome::success(), elapsed_ms(timer));

    disconnect(report, ProbeStage::ProducerDisconnect, producer, request_timeout).await;

    check_cancel(report, cancel, ProbeStage::ConsumerConnect)?;
    info!("📥 Testing consumer connection (group {})...", config.probe_group_id());
    let timer = Instant::now();
    cluster.take_broker_error(ClientRole::Consumer);
    let connected =
        attempt_with_timeout(cluster.connect_consumer(request_timeout), request_timeout).await;
    let consumer = fatal(report, cluster, ProbeStage::ConsumerConnect, connected, timer)?;
    info!("✅ Consumer connected successfully!");
    report.record(ProbeStage::ConsumerConnect, StageOutcome::success(), elapsed_ms(timer));

    disconnect(report, ProbeStage::ConsumerDisconnect, consumer, request_timeout).await;

    Ok(())
}

/// Best-effort close; a failure becomes a notice and never fails the run
async fn disconnect(
    report: &mut ProbeReport,
    stage: ProbeStage,
    session: Box<dyn Session>,
    timeout: Duration,
) {
    let timer = Instant::now();
    match attempt_with_timeout(session.disconnect(), timeout).await {
        Ok(()) => {
            info!("✅ {} succeeded", stage);
            report.record(stage, StageOutcome::success(), elapsed_ms(timer));
        }
        Err(e) => {
            warn!("⚠️  {} did not complete cleanly: {}", stage, e);
            report.record(
                stage,
                StageOutcome::Notice {
                    message: e.to_string(),
                },
                elapsed_ms(timer),
            );
        }
    }
}

fn check_cancel(
    report: &mut ProbeReport,
    cancel: &CancellationToken,
    next: ProbeStage,
) -> Result<(), Halted> {
    if cancel.is_cancelled() {
        warn!("Probe cancelled before {}", next);
        report.cancelled = true;
        return Err(Halted);
    }
    Ok(())
}

fn fatal<T>(
    report: &mut ProbeReport,
    cluster: &dyn Cluster,
    stage: ProbeStage,
    result: Attempt<T>,
    timer: Instant,
) -> Result<T, Halted> {
    result.map_err(|e| {
        record_failure(report, cluster, stage, &e, timer);
        Halted
    })
}

/// Client whose callbacks explain a failure in `stage`
fn client_role(stage: ProbeStage) -> ClientRole {
    match stage {
        ProbeStage::AdminConnect | ProbeStage::ListTopics => ClientRole::Admin,
        ProbeStage::ProducerConnect | ProbeStage::ProducerDisconnect => ClientRole::Producer,
        ProbeStage::ConsumerConnect | ProbeStage::ConsumerDisconnect => ClientRole::Consumer,
    }
}

fn record_failure(
    report: &mut ProbeReport,
    cluster: &dyn Cluster,
    stage: ProbeStage,
    err: &SupervisorError<ClientError>,
    timer: Instant,
) {
    let signal = match err {
        SupervisorError::Timeout(_) => FailureSignal::from_message(err.to_string()),
        SupervisorError::Action(e) => e.signal(),
    }
    .with_broker_detail(cluster.take_broker_error(client_role(stage)));

    let outcome = StageOutcome::failure(&signal);
    if let StageOutcome::Failure {
        kind,
        message,
        hint,
    } = &outcome
    {
        error!("❌ {} failed ({}): {}", stage, kind, message);
        error!("💡 Hint: {}", hint);
    }
    report.record(stage, outcome, elapsed_ms(timer));
}

fn elapsed_ms(timer: Instant) -> u64 {
    timer.elapsed().as_millis() as u64
}
