//! Cross-boundary call surface.
//!
//! The front-end talks to the native layer over a small RPC-style method
//! surface. On the wire a call is just a method name; here it is decoded
//! once, at the boundary, into the closed [`BridgeRequest`] enum — an
//! unrecognized name is a [`BridgeError::UnknownMethod`], which signals a
//! caller/callee version mismatch rather than a missing implementation.
//!
//! The [`LinkGateway`] replaces the old process-wide mutable channel
//! reference with explicit registration: the front-end's sink is attached
//! and detached under a single lock, and a link arriving while no sink is
//! live is stashed in an explicit optional slot that is cleared exactly once
//! when read back through [`BridgeRequest::GetInitialLink`].
//!
//! Outward effects (starting the background service, hiding or terminating
//! the interface, showing the invalid-link alert) are delegated to the
//! [`Host`] trait implemented by the platform glue; the gateway itself only
//! owns routing state.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

/// One decoded front-end request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeRequest {
    /// Fetch the pending initial link; consumed once, then cleared.
    GetInitialLink,
    /// Acknowledge stream setup; subsequent links flow through the attached
    /// sink rather than polling.
    GetLinkStream,
    /// Drop the currently tracked link.
    ClearCurrentLink,
    /// Request background-mode startup from the host.
    StartBackgroundService,
    /// Hide the interface without terminating.
    HideInterface,
    /// Remove the interface but keep the background service alive.
    DetachInterface,
    /// Stop the background service and finish.
    Terminate,
    /// Trigger the invalid-link alert.
    ShowInvalidLinkAlert,
}

impl BridgeRequest {
    /// Decode a wire method name. Every recognized name maps to exactly one
    /// variant; anything else is a version-mismatch error.
    pub fn decode(method: &str) -> Result<Self, BridgeError> {
        match method {
            "getInitialLink" => Ok(Self::GetInitialLink),
            "getLinkStream" => Ok(Self::GetLinkStream),
            "clearLastProcessedLink" => Ok(Self::ClearCurrentLink),
            "startForegroundService" => Ok(Self::StartBackgroundService),
            "moveTaskToBack" => Ok(Self::HideInterface),
            "finishTask" => Ok(Self::DetachInterface),
            "exitApp" => Ok(Self::Terminate),
            "showInvalidDeeplinkAlert" => Ok(Self::ShowInvalidLinkAlert),
            other => Err(BridgeError::UnknownMethod(other.to_string())),
        }
    }

    /// The wire name this variant decodes from.
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::GetInitialLink => "getInitialLink",
            Self::GetLinkStream => "getLinkStream",
            Self::ClearCurrentLink => "clearLastProcessedLink",
            Self::StartBackgroundService => "startForegroundService",
            Self::HideInterface => "moveTaskToBack",
            Self::DetachInterface => "finishTask",
            Self::Terminate => "exitApp",
            Self::ShowInvalidLinkAlert => "showInvalidDeeplinkAlert",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The wire method name is not part of this surface; the caller and
    /// callee disagree on the protocol version.
    #[error("unknown bridge method: {0}")]
    UnknownMethod(String),
}

/// Response to a bridge request: either a value or a bare completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeResponse {
    /// Carries the pending link, if any.
    Link(Option<String>),
    /// The operation completed with no return value.
    Ack,
}

/// The front-end's receiving side for links arriving while it is live.
pub trait LinkSink: Send + Sync {
    fn on_link(&self, link: &str);
    fn on_invalid_link(&self);
}

/// Outward host effects the gateway delegates rather than owns.
pub trait Host: Send + Sync {
    fn start_background_service(&self);
    fn hide_interface(&self);
    fn detach_interface(&self);
    fn terminate(&self);
    fn show_invalid_link_alert(&self);
}

#[derive(Default)]
struct GatewayState {
    sink: Option<Box<dyn LinkSink>>,
    pending: Option<String>,
}

/// Routing state between the native entry points and the front-end.
pub struct LinkGateway {
    state: Mutex<GatewayState>,
    host: Arc<dyn Host>,
}

impl LinkGateway {
    pub fn new(host: Arc<dyn Host>) -> Self {
        LinkGateway { state: Mutex::new(GatewayState::default()), host }
    }

    /// Register the live front-end sink. Replacing an existing sink is
    /// tolerated but indicates the previous one was never detached.
    pub fn attach(&self, sink: Box<dyn LinkSink>) {
        let mut state = self.lock_state();
        if state.sink.is_some() {
            warn!("attaching a sink over an existing one; previous sink dropped");
        }
        state.sink = Some(sink);
    }

    /// Deregister the front-end sink; links delivered from now on are
    /// stashed for the next `GetInitialLink`.
    pub fn detach(&self) {
        self.lock_state().sink = None;
    }

    /// Route an incoming link: forward to the attached sink when one is
    /// live, stash it as the pending initial link otherwise.
    pub fn deliver(&self, link: &str) {
        let mut state = self.lock_state();
        if let Some(sink) = &state.sink {
            debug!(link, "delivering link to attached sink");
            sink.on_link(link);
        } else {
            debug!(link, "no sink attached; stashing as initial link");
            state.pending = Some(link.to_string());
        }
    }

    /// Forward the invalid-link notification to the attached sink, if any.
    pub fn notify_invalid(&self) {
        if let Some(sink) = &self.lock_state().sink {
            sink.on_invalid_link();
        }
    }

    /// Execute one decoded request.
    pub fn handle(&self, request: BridgeRequest) -> BridgeResponse {
        match request {
            BridgeRequest::GetInitialLink => BridgeResponse::Link(self.lock_state().pending.take()),
            BridgeRequest::GetLinkStream => BridgeResponse::Ack,
            BridgeRequest::ClearCurrentLink => {
                self.lock_state().pending = None;
                BridgeResponse::Ack
            }
            BridgeRequest::StartBackgroundService => {
                self.host.start_background_service();
                BridgeResponse::Ack
            }
            BridgeRequest::HideInterface => {
                self.host.hide_interface();
                BridgeResponse::Ack
            }
            BridgeRequest::DetachInterface => {
                self.host.detach_interface();
                BridgeResponse::Ack
            }
            BridgeRequest::Terminate => {
                self.host.terminate();
                BridgeResponse::Ack
            }
            BridgeRequest::ShowInvalidLinkAlert => {
                self.host.show_invalid_link_alert();
                BridgeResponse::Ack
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingHost {
        started: AtomicUsize,
        hidden: AtomicUsize,
        detached: AtomicUsize,
        terminated: AtomicUsize,
        alerted: AtomicUsize,
    }

    impl Host for RecordingHost {
        fn start_background_service(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn hide_interface(&self) {
            self.hidden.fetch_add(1, Ordering::SeqCst);
        }
        fn detach_interface(&self) {
            self.detached.fetch_add(1, Ordering::SeqCst);
        }
        fn terminate(&self) {
            self.terminated.fetch_add(1, Ordering::SeqCst);
        }
        fn show_invalid_link_alert(&self) {
            self.alerted.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        links: Mutex<Vec<String>>,
        invalid: AtomicUsize,
    }

    impl LinkSink for Arc<RecordingSink> {
        fn on_link(&self, link: &str) {
            self.links.lock().unwrap().push(link.to_string());
        }
        fn on_invalid_link(&self) {
            self.invalid.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn gateway() -> (LinkGateway, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::default());
        (LinkGateway::new(host.clone()), host)
    }

    #[test]
    fn every_wire_name_round_trips() {
        for name in [
            "getInitialLink",
            "getLinkStream",
            "clearLastProcessedLink",
            "startForegroundService",
            "moveTaskToBack",
            "finishTask",
            "exitApp",
            "showInvalidDeeplinkAlert",
        ] {
            let request = BridgeRequest::decode(name).unwrap();
            assert_eq!(request.method_name(), name);
        }
    }

    #[test]
    fn unknown_method_is_a_decode_error() {
        let err = BridgeRequest::decode("notARealMethod").unwrap_err();
        assert!(matches!(err, BridgeError::UnknownMethod(ref m) if m == "notARealMethod"));
    }

    #[test]
    fn stashed_link_is_consumed_exactly_once() {
        let (gateway, _) = gateway();
        gateway.deliver("redlink://42");

        assert_eq!(gateway.handle(BridgeRequest::GetInitialLink), BridgeResponse::Link(Some("redlink://42".into())));
        assert_eq!(gateway.handle(BridgeRequest::GetInitialLink), BridgeResponse::Link(None));
    }

    #[test]
    fn attached_sink_receives_links_directly() {
        let (gateway, _) = gateway();
        let sink = Arc::new(RecordingSink::default());
        gateway.attach(Box::new(sink.clone()));

        gateway.deliver("redlink://42");
        assert_eq!(*sink.links.lock().unwrap(), vec!["redlink://42".to_string()]);
        // Nothing stashed while a sink is live.
        assert_eq!(gateway.handle(BridgeRequest::GetInitialLink), BridgeResponse::Link(None));
    }

    #[test]
    fn detach_falls_back_to_stashing() {
        let (gateway, _) = gateway();
        let sink = Arc::new(RecordingSink::default());
        gateway.attach(Box::new(sink.clone()));
        gateway.detach();

        gateway.deliver("redlink://42");
        assert!(sink.links.lock().unwrap().is_empty());
        assert_eq!(gateway.handle(BridgeRequest::GetInitialLink), BridgeResponse::Link(Some("redlink://42".into())));
    }

    #[test]
    fn clear_drops_the_pending_link() {
        let (gateway, _) = gateway();
        gateway.deliver("redlink://42");
        assert_eq!(gateway.handle(BridgeRequest::ClearCurrentLink), BridgeResponse::Ack);
        assert_eq!(gateway.handle(BridgeRequest::GetInitialLink), BridgeResponse::Link(None));
    }

    #[test]
    fn host_operations_are_delegated() {
        let (gateway, host) = gateway();
        gateway.handle(BridgeRequest::StartBackgroundService);
        gateway.handle(BridgeRequest::HideInterface);
        gateway.handle(BridgeRequest::DetachInterface);
        gateway.handle(BridgeRequest::Terminate);
        gateway.handle(BridgeRequest::ShowInvalidLinkAlert);

        assert_eq!(host.started.load(Ordering::SeqCst), 1);
        assert_eq!(host.hidden.load(Ordering::SeqCst), 1);
        assert_eq!(host.detached.load(Ordering::SeqCst), 1);
        assert_eq!(host.terminated.load(Ordering::SeqCst), 1);
        assert_eq!(host.alerted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalid_notification_reaches_the_sink() {
        let (gateway, _) = gateway();
        let sink = Arc::new(RecordingSink::default());
        gateway.attach(Box::new(sink.clone()));
        gateway.notify_invalid();
        assert_eq!(sink.invalid.load(Ordering::SeqCst), 1);
    }
}
