use std::sync::Arc;

use {
    tokio::sync::{Mutex, RwLock, mpsc},
    tracing::{error, info, warn},
};

use warelay_driver::{DriverError, DriverEvent, PlatformDriver};

use crate::{address::RecipientAddress, message::OutboundMessage};

// ── Session state ────────────────────────────────────────────────────────────

/// Lifecycle state of the platform session.
///
/// Exactly one value holds at a time. Written only by the gateway's event
/// loop; everything else reads cloned snapshots via
/// [`SessionGateway::current_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Fresh session, no pairing code issued yet.
    Unauthenticated,
    /// A pairing code is outstanding; a newer one replaces it.
    AwaitingScan { code: String },
    /// Authenticated and usable for sends.
    Ready,
    /// The platform connection dropped; recoverable by re-pairing.
    Disconnected { reason: String },
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Operator-facing one-line description, served by `/status`.
    pub fn describe(&self) -> String {
        match self {
            Self::Unauthenticated => "WhatsApp client is not ready. Waiting for QR code.".into(),
            Self::AwaitingScan { .. } => {
                "WhatsApp client is not ready. Please scan QR code.".into()
            },
            Self::Ready => "WhatsApp client is ready".into(),
            Self::Disconnected { reason } => {
                format!("WhatsApp client is disconnected: {reason}")
            },
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// The platform driver could not be started.
#[derive(Debug, thiserror::Error)]
#[error("driver initialization failed: {0}")]
pub struct InitError(#[from] DriverError);

/// A send was rejected or failed.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Session is not authenticated and ready; nothing was attempted.
    #[error("session is not ready")]
    NotReady,
    /// The address has no corresponding platform account.
    #[error("recipient is not registered on the platform")]
    UnknownRecipient,
    /// Platform-side failure; safe for the caller to retry.
    #[error("delivery failed: {0}")]
    Transient(DriverError),
}

/// A registration check was rejected or failed.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// Session is not authenticated and ready; nothing was attempted.
    #[error("session is not ready")]
    NotReady,
    #[error("registration check failed: {0}")]
    Driver(DriverError),
}

// ── Failure classification ───────────────────────────────────────────────────

/// Message signatures meaning "no such account", for drivers that report
/// failures as bare text. The structured `code` wins when present.
const UNKNOWN_RECIPIENT_SIGNATURES: &[&str] = &["no lid for user", "not registered"];

fn is_unknown_recipient(err: &DriverError) -> bool {
    if let Some(code) = &err.code {
        return code == "unknown_recipient";
    }
    let message = err.message.to_lowercase();
    UNKNOWN_RECIPIENT_SIGNATURES
        .iter()
        .any(|sig| message.contains(sig))
}

// ── Gateway ──────────────────────────────────────────────────────────────────

/// Owns the one logical platform session: consumes driver lifecycle events,
/// holds the current [`SessionState`], and gates operations on readiness.
pub struct SessionGateway {
    driver: Arc<dyn PlatformDriver>,
    state: Arc<RwLock<SessionState>>,
    /// Taken by the first `initialize()`; the event loop is spawned once.
    events: Mutex<Option<mpsc::UnboundedReceiver<DriverEvent>>>,
}

impl SessionGateway {
    /// `events` must be the receiving end of the channel the driver was
    /// constructed with.
    pub fn new(
        driver: Arc<dyn PlatformDriver>,
        events: mpsc::UnboundedReceiver<DriverEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            driver,
            state: Arc::new(RwLock::new(SessionState::Unauthenticated)),
            events: Mutex::new(Some(events)),
        })
    }

    /// Start the platform driver and the event loop.
    ///
    /// Idempotent: the event loop is spawned exactly once, and the driver's
    /// own `initialize` no-ops while its session is up, so an operator can
    /// call this again after a failed start.
    pub async fn initialize(&self) -> Result<(), InitError> {
        if let Some(events) = self.events.lock().await.take() {
            let state = Arc::clone(&self.state);
            tokio::spawn(run_event_loop(events, state));
        }
        self.driver.initialize().await?;
        Ok(())
    }

    /// Snapshot of the current session state. Never fails.
    pub async fn current_state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Deliver one message. Exactly one driver attempt; retry policy
    /// belongs to the caller.
    pub async fn send_message(&self, message: &OutboundMessage) -> Result<(), SendError> {
        if !self.current_state().await.is_ready() {
            return Err(SendError::NotReady);
        }
        // Snapshot the handle up front: the driver's own result decides the
        // outcome even if a disconnect event lands mid-call.
        let driver = Arc::clone(&self.driver);
        let to = &message.recipient;
        match driver.send_message(to.as_str(), &message.body).await {
            Ok(()) => {
                info!(to = %to, "message delivered");
                Ok(())
            },
            Err(err) if is_unknown_recipient(&err) => Err(SendError::UnknownRecipient),
            Err(err) => {
                warn!(to = %to, error = %err, "transient delivery failure");
                Err(SendError::Transient(err))
            },
        }
    }

    /// Whether the recipient has a registered platform account.
    pub async fn is_registered(&self, to: &RecipientAddress) -> Result<bool, CheckError> {
        if !self.current_state().await.is_ready() {
            return Err(CheckError::NotReady);
        }
        let driver = Arc::clone(&self.driver);
        driver
            .is_registered_user(to.as_str())
            .await
            .map_err(CheckError::Driver)
    }
}

// ── Event loop ───────────────────────────────────────────────────────────────

/// Apply one lifecycle event. The transition table lives here so it can be
/// exercised without spawning the loop.
fn apply_event(state: &mut SessionState, event: DriverEvent) {
    match event {
        DriverEvent::Qr(code) => {
            info!("pairing code received");
            *state = SessionState::AwaitingScan { code };
        },
        DriverEvent::Authenticated => {
            info!("platform session authenticated");
        },
        DriverEvent::Ready => {
            info!("platform session ready");
            *state = SessionState::Ready;
        },
        DriverEvent::AuthFailure(reason) => {
            error!(%reason, "authentication failed; pairing must be restarted");
            *state = SessionState::Unauthenticated;
        },
        DriverEvent::Disconnected(reason) => {
            warn!(%reason, "platform session disconnected");
            *state = SessionState::Disconnected { reason };
        },
    }
}

/// Single consumer of driver lifecycle events; the only state writer.
async fn run_event_loop(
    mut events: mpsc::UnboundedReceiver<DriverEvent>,
    state: Arc<RwLock<SessionState>>,
) {
    while let Some(event) = events.recv().await {
        apply_event(&mut *state.write().await, event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    // ── Mock driver ──────────────────────────────────────────────────────

    #[derive(Default)]
    struct MockDriver {
        send_failure: Option<DriverError>,
        registered: bool,
        send_calls: AtomicUsize,
        init_calls: AtomicUsize,
    }

    impl MockDriver {
        fn failing(err: DriverError) -> Self {
            Self {
                send_failure: Some(err),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl PlatformDriver for MockDriver {
        async fn initialize(&self) -> Result<(), DriverError> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send_message(&self, _address: &str, _body: &str) -> Result<(), DriverError> {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            match &self.send_failure {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }

        async fn is_registered_user(&self, _address: &str) -> Result<bool, DriverError> {
            Ok(self.registered)
        }
    }

    fn gateway_with(driver: MockDriver) -> (Arc<SessionGateway>, Arc<MockDriver>) {
        let driver = Arc::new(driver);
        let handle: Arc<dyn PlatformDriver> = driver.clone();
        let (_tx, rx) = mpsc::unbounded_channel();
        (SessionGateway::new(handle, rx), driver)
    }

    async fn force_state(gateway: &SessionGateway, state: SessionState) {
        *gateway.state.write().await = state;
    }

    fn outbound(phone: &str, body: &str) -> OutboundMessage {
        let recipient = RecipientAddress::normalize(phone, "c.us").unwrap();
        OutboundMessage::new(recipient, body).unwrap()
    }

    fn addr(phone: &str) -> RecipientAddress {
        RecipientAddress::normalize(phone, "c.us").unwrap()
    }

    // ── Transition table ─────────────────────────────────────────────────

    #[test]
    fn qr_event_enters_awaiting_scan() {
        let mut state = SessionState::Unauthenticated;
        apply_event(&mut state, DriverEvent::Qr("2@first".into()));
        assert_eq!(state, SessionState::AwaitingScan { code: "2@first".into() });
    }

    #[test]
    fn second_qr_replaces_pending_code() {
        let mut state = SessionState::AwaitingScan { code: "2@first".into() };
        apply_event(&mut state, DriverEvent::Qr("2@second".into()));
        assert_eq!(state, SessionState::AwaitingScan { code: "2@second".into() });
    }

    #[test]
    fn ready_clears_pending_code() {
        let mut state = SessionState::AwaitingScan { code: "2@first".into() };
        apply_event(&mut state, DriverEvent::Authenticated);
        assert!(matches!(state, SessionState::AwaitingScan { .. }));
        apply_event(&mut state, DriverEvent::Ready);
        assert_eq!(state, SessionState::Ready);
    }

    #[test]
    fn auth_failure_resets_to_unauthenticated() {
        let mut state = SessionState::AwaitingScan { code: "2@first".into() };
        apply_event(&mut state, DriverEvent::AuthFailure("scan rejected".into()));
        assert_eq!(state, SessionState::Unauthenticated);
    }

    #[test]
    fn disconnect_from_ready_carries_reason() {
        let mut state = SessionState::Ready;
        apply_event(&mut state, DriverEvent::Disconnected("NAVIGATION".into()));
        assert_eq!(state, SessionState::Disconnected { reason: "NAVIGATION".into() });
    }

    #[test]
    fn qr_after_disconnect_reenters_pairing() {
        let mut state = SessionState::Disconnected { reason: "NAVIGATION".into() };
        apply_event(&mut state, DriverEvent::Qr("2@again".into()));
        assert_eq!(state, SessionState::AwaitingScan { code: "2@again".into() });
    }

    // ── Event loop wiring ────────────────────────────────────────────────

    #[tokio::test]
    async fn event_loop_drives_state() {
        let driver: Arc<dyn PlatformDriver> = Arc::new(MockDriver::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let gateway = SessionGateway::new(driver, rx);
        gateway.initialize().await.unwrap();

        tx.send(DriverEvent::Qr("2@pairing".into())).unwrap();
        tx.send(DriverEvent::Ready).unwrap();

        for _ in 0..100 {
            if gateway.current_state().await.is_ready() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("event loop never reached Ready");
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let (gateway, driver) = gateway_with(MockDriver::default());
        gateway.initialize().await.unwrap();
        gateway.initialize().await.unwrap();
        // The driver is consulted each time (its own initialize no-ops when
        // up); the event loop must only be spawned once.
        assert_eq!(driver.init_calls.load(Ordering::SeqCst), 2);
        assert!(gateway.events.lock().await.is_none());
    }

    // ── Send gating and classification ───────────────────────────────────

    #[tokio::test]
    async fn send_rejected_in_every_non_ready_state() {
        let (gateway, driver) = gateway_with(MockDriver::default());
        for state in [
            SessionState::Unauthenticated,
            SessionState::AwaitingScan { code: "2@x".into() },
            SessionState::Disconnected { reason: "gone".into() },
        ] {
            force_state(&gateway, state).await;
            let result = gateway.send_message(&outbound("16501234567", "hi")).await;
            assert!(matches!(result, Err(SendError::NotReady)));
        }
        // Gating means the driver was never touched.
        assert_eq!(driver.send_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn send_succeeds_when_ready() {
        let (gateway, driver) = gateway_with(MockDriver::default());
        force_state(&gateway, SessionState::Ready).await;

        gateway.send_message(&outbound("16501234567", "hi")).await.unwrap();
        assert_eq!(driver.send_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn structured_code_classifies_unknown_recipient() {
        let (gateway, _) = gateway_with(MockDriver::failing(DriverError::with_code(
            "unknown_recipient",
            "some opaque text",
        )));
        force_state(&gateway, SessionState::Ready).await;

        let result = gateway.send_message(&outbound("123", "hi")).await;
        assert!(matches!(result, Err(SendError::UnknownRecipient)));
    }

    #[tokio::test]
    async fn message_signature_classifies_unknown_recipient() {
        let (gateway, _) = gateway_with(MockDriver::failing(DriverError::new(
            "Evaluation failed: Error: No LID for user",
        )));
        force_state(&gateway, SessionState::Ready).await;

        let result = gateway.send_message(&outbound("123", "hi")).await;
        assert!(matches!(result, Err(SendError::UnknownRecipient)));
    }

    #[tokio::test]
    async fn other_failures_classify_transient_after_one_attempt() {
        let (gateway, driver) = gateway_with(MockDriver::failing(DriverError::new(
            "session closed unexpectedly",
        )));
        force_state(&gateway, SessionState::Ready).await;

        let result = gateway.send_message(&outbound("16501234567", "hi")).await;
        assert!(matches!(result, Err(SendError::Transient(_))));
        // No internal retry.
        assert_eq!(driver.send_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn structured_code_wins_over_message_text() {
        // A code other than unknown_recipient must not fall back to
        // signature matching even if the text would match.
        let (gateway, _) = gateway_with(MockDriver::failing(DriverError::with_code(
            "rate_limited",
            "user not registered (throttled)",
        )));
        force_state(&gateway, SessionState::Ready).await;

        let result = gateway.send_message(&outbound("123", "hi")).await;
        assert!(matches!(result, Err(SendError::Transient(_))));
    }

    // ── Registration check ───────────────────────────────────────────────

    #[tokio::test]
    async fn is_registered_gated_on_ready() {
        let (gateway, _) = gateway_with(MockDriver {
            registered: true,
            ..MockDriver::default()
        });

        let result = gateway.is_registered(&addr("16501234567")).await;
        assert!(matches!(result, Err(CheckError::NotReady)));

        force_state(&gateway, SessionState::Ready).await;
        assert!(gateway.is_registered(&addr("16501234567")).await.unwrap());
    }

    // ── Status text ──────────────────────────────────────────────────────

    #[test]
    fn describe_reflects_each_state() {
        assert!(SessionState::Ready.describe().contains("ready"));
        assert!(
            SessionState::AwaitingScan { code: "2@x".into() }
                .describe()
                .contains("scan")
        );
        assert!(
            SessionState::Disconnected { reason: "gone".into() }
                .describe()
                .contains("gone")
        );
    }
}
