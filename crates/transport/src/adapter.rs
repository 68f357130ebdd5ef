//! SessionAdapter - wraps the companion session
//!
//! Owns the activation state machine, the readiness predicate, best-effort
//! outbound calls and the inbound delegate. Inbound callbacks never touch
//! driver or registry state: they are parsed and queued for the hub's main
//! context, which drains the receiver returned by
//! [`SessionAdapter::take_receiver`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use async_channel::{unbounded, Receiver, Sender, TrySendError};
use contracts::{CollectionRequest, CompanionMessage, ContextPayload, KeyValueMap, SessionConfig};
use tracing::{debug, info, instrument, trace, warn};

use crate::delegate::{DelegateSlot, RoutedMessage};
use crate::error::{ReadinessError, Result};
use crate::session::{ActivationState, SessionTransport};

/// Strictly increasing wall-clock timestamps for context updates
#[derive(Debug, Default)]
struct ContextClock {
    last: f64,
}

impl ContextClock {
    const STEP: f64 = 1e-6;

    fn next(&mut self) -> f64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let ts = if now > self.last {
            now
        } else {
            self.last + Self::STEP
        };
        self.last = ts;
        ts
    }
}

/// Companion session adapter
///
/// A single instance is shared process-wide (`Arc<SessionAdapter>`).
pub struct SessionAdapter {
    transport: Arc<dyn SessionTransport>,
    config: SessionConfig,
    state: Mutex<ActivationState>,
    clock: Mutex<ContextClock>,
    delegate: Arc<DelegateSlot>,
    tx: Sender<RoutedMessage>,
    rx: Mutex<Option<Receiver<RoutedMessage>>>,
}

impl SessionAdapter {
    /// Create adapter over a platform session
    pub fn new(transport: Arc<dyn SessionTransport>, config: SessionConfig) -> Self {
        let (tx, rx) = unbounded();

        Self {
            transport,
            config,
            state: Mutex::new(ActivationState::NotActivated),
            clock: Mutex::new(ContextClock::default()),
            delegate: Arc::new(DelegateSlot::new()),
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Routed inbound stream
    ///
    /// Note: Can only be called once, subsequent calls return None
    pub fn take_receiver(&self) -> Option<Receiver<RoutedMessage>> {
        lock(&self.rx).take()
    }

    /// Delegate owner slot, claimed and released by the device registry
    pub fn delegate(&self) -> Arc<DelegateSlot> {
        Arc::clone(&self.delegate)
    }

    pub fn activation_state(&self) -> ActivationState {
        *lock(&self.state)
    }

    /// Start activation unless already activated or in progress
    ///
    /// The state lock is released while the transport runs, so a transport
    /// may report completion through [`Self::on_activation_changed`] before
    /// returning. A state advanced by such a callback is kept.
    #[instrument(name = "session_activate", skip(self))]
    pub fn activate(&self) -> ActivationState {
        {
            let mut state = lock(&self.state);
            if matches!(
                *state,
                ActivationState::Activating | ActivationState::Activated
            ) {
                return *state;
            }
            *state = ActivationState::Activating;
        }

        let result = self.transport.activate();

        let mut state = lock(&self.state);
        let pending = *state == ActivationState::Activating;
        match result {
            Ok(reached) => {
                if pending {
                    *state = reached;
                }
                info!(state = ?reached, "session activation requested");
            }
            Err(e) => {
                if pending {
                    *state = ActivationState::NotActivated;
                }
                warn!(error = %e, "session activation failed");
            }
        }
        *state
    }

    /// Activation state change reported by the transport (any thread)
    pub fn on_activation_changed(&self, new_state: ActivationState) {
        {
            let mut state = lock(&self.state);
            debug!(from = ?*state, to = ?new_state, "session activation changed");
            *state = new_state;
        }

        if new_state == ActivationState::Deactivated && self.config.auto_reactivate {
            info!("session deactivated by companion, re-activating");
            self.activate();
        }
    }

    /// Readiness predicate: paired, then app installed, then activated
    pub fn check_ready(&self) -> std::result::Result<(), ReadinessError> {
        if !self.transport.is_paired() {
            return Err(ReadinessError::NotPaired);
        }
        if !self.transport.is_companion_app_installed() {
            return Err(ReadinessError::AppNotInstalled);
        }
        if self.activation_state() != ActivationState::Activated {
            return Err(ReadinessError::SessionInactive);
        }
        Ok(())
    }

    /// Fire-and-forget message; failures are logged only
    ///
    /// Application-level API for one-shot notifications to the companion.
    /// Collection control goes through [`Self::push_context`] and
    /// [`Self::wake_companion`] instead.
    pub fn send_message(&self, payload: &KeyValueMap) {
        if let Err(e) = self.transport.send_message(payload) {
            warn!(error = %e, "send_message failed");
        }
    }

    /// Fresh timestamp for a context update
    pub fn next_context_timestamp(&self) -> f64 {
        lock(&self.clock).next()
    }

    /// Best-effort context sync, never retried
    ///
    /// Returns `true` when the transport accepted the update.
    #[instrument(
        name = "session_push_context",
        skip(self, payload),
        fields(command = ?payload.command, timestamp = payload.timestamp)
    )]
    pub fn push_context(&self, payload: &ContextPayload) -> bool {
        match self.transport.update_application_context(&payload.to_map()) {
            Ok(()) => {
                debug!("context pushed");
                true
            }
            Err(e) => {
                warn!(error = %e, "context push failed");
                false
            }
        }
    }

    /// Ask the platform to launch the companion app
    pub fn wake_companion(&self, request: &CollectionRequest) -> Result<()> {
        self.transport.wake_companion(request)
    }

    /// Inbound delegate, invoked by the transport on an arbitrary thread
    pub fn on_inbound(&self, payload: KeyValueMap) {
        let message = match CompanionMessage::from_map(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "dropping undecodable companion message");
                return;
            }
        };

        let Some(slot) = self.delegate.current() else {
            self.default_handler(message);
            return;
        };

        match self.tx.try_send(RoutedMessage { slot, message }) {
            Ok(()) => trace!(slot = %slot, "inbound message queued"),
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                warn!(slot = %slot, "main context gone, inbound message dropped");
            }
        }
    }

    /// Installed whenever no driver owns the companion channel
    fn default_handler(&self, message: CompanionMessage) {
        debug!(kind = message.kind(), "no delegate owner, message discarded");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSession;
    use contracts::{ContextCommand, LocationKind, SensorSample, Slot, Vector3};
    use serde_json::json;
    use std::sync::{mpsc, Weak};
    use std::time::Duration;

    fn adapter_with(session: Arc<MockSession>) -> SessionAdapter {
        SessionAdapter::new(session, SessionConfig::default())
    }

    fn sample(ts: f64) -> SensorSample {
        SensorSample {
            timestamp: ts,
            acc: Vector3::new(0.0, 0.0, 9.81),
            gyro: Vector3::default(),
            mag: None,
        }
    }

    #[test]
    fn test_readiness_order() {
        let session = Arc::new(MockSession::new());
        session.set_paired(false);
        session.set_app_installed(false);
        let adapter = adapter_with(session.clone());

        assert_eq!(adapter.check_ready(), Err(ReadinessError::NotPaired));

        session.set_paired(true);
        assert_eq!(adapter.check_ready(), Err(ReadinessError::AppNotInstalled));

        session.set_app_installed(true);
        assert_eq!(adapter.check_ready(), Err(ReadinessError::SessionInactive));

        adapter.activate();
        assert_eq!(adapter.check_ready(), Ok(()));
    }

    #[test]
    fn test_activation_state_machine() {
        let session = Arc::new(MockSession::new());
        session.set_activation_result(ActivationState::Activating);
        let adapter = adapter_with(session.clone());

        assert_eq!(adapter.activation_state(), ActivationState::NotActivated);
        assert_eq!(adapter.activate(), ActivationState::Activating);
        // in-progress activation is not re-requested
        assert_eq!(adapter.activate(), ActivationState::Activating);
        assert_eq!(session.activate_calls(), 1);

        adapter.on_activation_changed(ActivationState::Activated);
        assert_eq!(adapter.activation_state(), ActivationState::Activated);
    }

    #[test]
    fn test_deactivation_triggers_reactivation() {
        let session = Arc::new(MockSession::new());
        let adapter = adapter_with(session.clone());
        adapter.activate();
        assert_eq!(session.activate_calls(), 1);

        adapter.on_activation_changed(ActivationState::Deactivated);
        assert_eq!(session.activate_calls(), 2);
        assert_eq!(adapter.activation_state(), ActivationState::Activated);
    }

    #[test]
    fn test_deactivation_without_auto_reactivate() {
        let session = Arc::new(MockSession::new());
        let adapter = SessionAdapter::new(
            session.clone(),
            SessionConfig {
                auto_reactivate: false,
            },
        );
        adapter.activate();
        adapter.on_activation_changed(ActivationState::Deactivated);

        assert_eq!(session.activate_calls(), 1);
        assert_eq!(adapter.activation_state(), ActivationState::Deactivated);
    }

    #[test]
    fn test_failed_activation_returns_to_not_activated() {
        let session = Arc::new(MockSession::new());
        session.set_fail_activation(true);
        let adapter = adapter_with(session);

        assert_eq!(adapter.activate(), ActivationState::NotActivated);
    }

    /// Transport that reports completion from inside `activate`
    struct ReentrantSession {
        inner: MockSession,
        adapter: Mutex<Weak<SessionAdapter>>,
    }

    impl SessionTransport for ReentrantSession {
        fn is_paired(&self) -> bool {
            self.inner.is_paired()
        }

        fn is_companion_app_installed(&self) -> bool {
            self.inner.is_companion_app_installed()
        }

        fn activate(&self) -> Result<ActivationState> {
            let adapter = self.adapter.lock().unwrap().upgrade();
            if let Some(adapter) = adapter {
                adapter.on_activation_changed(ActivationState::Activated);
            }
            Ok(ActivationState::Activating)
        }

        fn send_message(&self, payload: &KeyValueMap) -> Result<()> {
            self.inner.send_message(payload)
        }

        fn update_application_context(&self, payload: &KeyValueMap) -> Result<()> {
            self.inner.update_application_context(payload)
        }

        fn wake_companion(&self, request: &CollectionRequest) -> Result<()> {
            self.inner.wake_companion(request)
        }
    }

    #[test]
    fn test_activation_callback_during_activate() {
        let session = Arc::new(ReentrantSession {
            inner: MockSession::new(),
            adapter: Mutex::new(Weak::new()),
        });
        let adapter = Arc::new(SessionAdapter::new(
            session.clone(),
            SessionConfig::default(),
        ));
        *session.adapter.lock().unwrap() = Arc::downgrade(&adapter);

        let (done_tx, done_rx) = mpsc::channel();
        let worker = Arc::clone(&adapter);
        std::thread::spawn(move || {
            let _ = done_tx.send(worker.activate());
        });

        let reached = done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("activate blocked on its own callback");
        // callback result wins over the synchronous Activating
        assert_eq!(reached, ActivationState::Activated);
        assert_eq!(adapter.activation_state(), ActivationState::Activated);
    }

    #[test]
    fn test_send_message_delivered() {
        let session = Arc::new(MockSession::new());
        let adapter = adapter_with(session.clone());

        let mut payload = KeyValueMap::new();
        payload.insert("ping".into(), json!(1));
        adapter.send_message(&payload);

        let sent = session.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].get("ping"), Some(&json!(1)));
    }

    #[test]
    fn test_send_message_failure_is_swallowed() {
        let session = Arc::new(MockSession::new());
        session.set_fail_send(true);
        let adapter = adapter_with(session.clone());

        let mut payload = KeyValueMap::new();
        payload.insert("ping".into(), json!(1));
        adapter.send_message(&payload);

        assert_eq!(session.send_attempts(), 1);
        assert!(session.messages().is_empty());
        // adapter stays usable after the failure
        adapter.activate();
        assert_eq!(adapter.check_ready(), Ok(()));
    }

    #[test]
    fn test_context_timestamps_strictly_increase() {
        let adapter = adapter_with(Arc::new(MockSession::new()));
        let mut last = 0.0;
        for _ in 0..100 {
            let ts = adapter.next_context_timestamp();
            assert!(ts > last);
            last = ts;
        }
    }

    #[test]
    fn test_push_context_failure_is_reported_not_retried() {
        let session = Arc::new(MockSession::new());
        session.set_fail_context(true);
        let adapter = adapter_with(session.clone());

        let payload = ContextPayload {
            command: ContextCommand::StopCollection,
            enable_imu: false,
            activity: "walk".into(),
            location: LocationKind::Indoor.to_string(),
            timestamp: adapter.next_context_timestamp(),
        };
        assert!(!adapter.push_context(&payload));
        assert_eq!(session.context_attempts(), 1);
        assert!(session.contexts().is_empty());
    }

    #[test]
    fn test_inbound_without_owner_is_discarded() {
        let adapter = adapter_with(Arc::new(MockSession::new()));
        let rx = adapter.take_receiver().unwrap();

        adapter.on_inbound(CompanionMessage::imu_batch_payload(&[sample(0.0)]));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_inbound_routed_to_owner_from_other_thread() {
        let adapter = Arc::new(adapter_with(Arc::new(MockSession::new())));
        let rx = adapter.take_receiver().unwrap();
        adapter.delegate().claim(Slot::Chest);

        let remote = Arc::clone(&adapter);
        std::thread::spawn(move || {
            remote.on_inbound(CompanionMessage::imu_batch_payload(&[sample(1.0), sample(2.0)]));
        })
        .join()
        .unwrap();

        let routed = rx.try_recv().unwrap();
        assert_eq!(routed.slot, Slot::Chest);
        match routed.message {
            CompanionMessage::ImuBatch(entries) => assert_eq!(entries.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_inbound_garbage_is_dropped() {
        let adapter = adapter_with(Arc::new(MockSession::new()));
        let rx = adapter.take_receiver().unwrap();
        adapter.delegate().claim(Slot::Chest);

        let mut payload = KeyValueMap::new();
        payload.insert("hello".into(), json!("world"));
        adapter.on_inbound(payload);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_take_receiver_once() {
        let adapter = adapter_with(Arc::new(MockSession::new()));
        assert!(adapter.take_receiver().is_some());
        assert!(adapter.take_receiver().is_none());
    }
}
