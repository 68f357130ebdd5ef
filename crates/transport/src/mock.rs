//! Mock companion session
//!
//! Implements `SessionTransport` with switchable preconditions and failure
//! injection, recording every outbound call. Used for testing and for the
//! simulator without a paired device.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use contracts::{CollectionRequest, KeyValueMap};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::session::{ActivationState, SessionTransport};

/// Mock session
pub struct MockSession {
    paired: AtomicBool,
    app_installed: AtomicBool,
    fail_activation: AtomicBool,
    fail_context: AtomicBool,
    fail_wake: AtomicBool,
    fail_send: AtomicBool,
    activation_result: Mutex<ActivationState>,
    /// Readiness checks answered "not paired" before pairing appears
    pairing_delay_checks: AtomicU32,
    activate_calls: AtomicUsize,
    context_attempts: AtomicUsize,
    wake_calls: AtomicUsize,
    send_attempts: AtomicUsize,
    contexts: Mutex<Vec<KeyValueMap>>,
    messages: Mutex<Vec<KeyValueMap>>,
}

impl MockSession {
    /// Paired, installed, activation completes synchronously
    pub fn new() -> Self {
        Self {
            paired: AtomicBool::new(true),
            app_installed: AtomicBool::new(true),
            fail_activation: AtomicBool::new(false),
            fail_context: AtomicBool::new(false),
            fail_wake: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            activation_result: Mutex::new(ActivationState::Activated),
            pairing_delay_checks: AtomicU32::new(0),
            activate_calls: AtomicUsize::new(0),
            context_attempts: AtomicUsize::new(0),
            wake_calls: AtomicUsize::new(0),
            send_attempts: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn set_paired(&self, paired: bool) {
        self.paired.store(paired, Ordering::SeqCst);
    }

    pub fn set_app_installed(&self, installed: bool) {
        self.app_installed.store(installed, Ordering::SeqCst);
    }

    pub fn set_fail_activation(&self, fail: bool) {
        self.fail_activation.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_context(&self, fail: bool) {
        self.fail_context.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_wake(&self, fail: bool) {
        self.fail_wake.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn set_activation_result(&self, state: ActivationState) {
        if let Ok(mut guard) = self.activation_result.lock() {
            *guard = state;
        }
    }

    /// Report "not paired" for the next `checks` pairing queries
    pub fn delay_pairing(&self, checks: u32) {
        self.pairing_delay_checks.store(checks, Ordering::SeqCst);
    }

    pub fn activate_calls(&self) -> usize {
        self.activate_calls.load(Ordering::SeqCst)
    }

    pub fn context_attempts(&self) -> usize {
        self.context_attempts.load(Ordering::SeqCst)
    }

    pub fn wake_calls(&self) -> usize {
        self.wake_calls.load(Ordering::SeqCst)
    }

    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    /// Accepted context updates, oldest first
    pub fn contexts(&self) -> Vec<KeyValueMap> {
        self.contexts.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Sent one-shot messages, oldest first
    pub fn messages(&self) -> Vec<KeyValueMap> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTransport for MockSession {
    fn is_paired(&self) -> bool {
        let delayed = self
            .pairing_delay_checks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        !delayed && self.paired.load(Ordering::SeqCst)
    }

    fn is_companion_app_installed(&self) -> bool {
        self.app_installed.load(Ordering::SeqCst)
    }

    fn activate(&self) -> Result<ActivationState> {
        self.activate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_activation.load(Ordering::SeqCst) {
            return Err(TransportError::unavailable("mock activation failure"));
        }
        let state = self
            .activation_result
            .lock()
            .map(|s| *s)
            .unwrap_or(ActivationState::Activated);
        debug!(state = ?state, "mock session activate");
        Ok(state)
    }

    fn send_message(&self, payload: &KeyValueMap) -> Result<()> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(TransportError::rejected("send_message", "mock send failure"));
        }
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(payload.clone());
        }
        Ok(())
    }

    fn update_application_context(&self, payload: &KeyValueMap) -> Result<()> {
        self.context_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_context.load(Ordering::SeqCst) {
            return Err(TransportError::rejected(
                "update_application_context",
                "mock context failure",
            ));
        }
        if let Ok(mut contexts) = self.contexts.lock() {
            contexts.push(payload.clone());
        }
        Ok(())
    }

    fn wake_companion(&self, request: &CollectionRequest) -> Result<()> {
        self.wake_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_wake.load(Ordering::SeqCst) {
            return Err(TransportError::rejected(
                "wake_companion",
                format!("mock wake failure for '{}'", request.activity),
            ));
        }
        Ok(())
    }
}
