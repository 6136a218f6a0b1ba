//! Connection controller for the key bridge
//! This module owns the adapter, the live session and the key state, and drives the
//! scan -> connect -> acquire -> stream -> teardown lifecycle from a single event loop.

use std::collections::HashSet;

use log::{debug, error, info, warn};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

use crate::config::target_config::TargetSpec;
use crate::core::bluetooth::acquirer::{AcquireOutcome, CharacteristicAcquirer};
use crate::core::bluetooth::adapter::BleAdapter;
use crate::core::bluetooth::events::{AdapterEvent, ControlEvent};
use crate::core::bluetooth::poll::PollTick;
use crate::core::bluetooth::session::{ConnectedPhase, ConnectionSession, LinkState};
use crate::core::bluetooth::types::{
    AdapterState, CharacteristicHandle, PeripheralHandle, ServiceHandle,
};
use crate::core::buttons::{decode, ButtonSet};
use crate::core::key_state::KeyStateTranslator;
use crate::error::AdapterError;
use crate::mapping::InputEmitter;

/// Peripherals seen during one scan, in discovery order.
#[derive(Default)]
struct ScanContext {
    seen: HashSet<String>,
    discovered: Vec<PeripheralHandle>,
}

impl ScanContext {
    /// Records `peripheral`; false if its id was already seen in this scan.
    fn record(&mut self, peripheral: &PeripheralHandle) -> bool {
        if !self.seen.insert(peripheral.id.clone()) {
            return false;
        }
        self.discovered.push(peripheral.clone());
        true
    }
}

pub struct ConnectionController<A: BleAdapter, E: InputEmitter> {
    adapter: A,
    target: TargetSpec,
    rescan_on_disconnect: bool,
    translator: KeyStateTranslator<E>,
    acquirer: CharacteristicAcquirer,
    state: LinkState,
    adapter_ready: bool,
    scan: Option<ScanContext>,
    session: Option<ConnectionSession>,
}

impl<A: BleAdapter, E: InputEmitter> ConnectionController<A, E> {
    /// `events` must feed the receiver later passed to [`run`](Self::run); poll
    /// ticks are sent through it.
    pub fn new(
        adapter: A,
        emitter: E,
        target: TargetSpec,
        events: UnboundedSender<ControlEvent>,
    ) -> Self {
        let acquirer = CharacteristicAcquirer::new(&target, events);
        Self {
            adapter,
            target,
            rescan_on_disconnect: false,
            translator: KeyStateTranslator::new(emitter),
            acquirer,
            state: LinkState::Idle,
            adapter_ready: false,
            scan: None,
            session: None,
        }
    }

    /// Go back to scanning after a disconnect instead of staying disconnected.
    pub fn with_rescan_on_disconnect(mut self, rescan: bool) -> Self {
        self.rescan_on_disconnect = rescan;
        self
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn session(&self) -> Option<&ConnectionSession> {
        self.session.as_ref()
    }

    pub fn pressed(&self) -> ButtonSet {
        self.translator.pressed()
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Peripherals recorded by the scan in progress.
    pub fn discovered(&self) -> &[PeripheralHandle] {
        self.scan.as_ref().map_or(&[], |s| s.discovered.as_slice())
    }

    /// Processes events until `shutdown` is cancelled, then tears everything down.
    pub async fn run(
        &mut self,
        events: &mut UnboundedReceiver<ControlEvent>,
        shutdown: CancellationToken,
    ) -> Result<(), AdapterError> {
        info!("Looking for peripheral with name: {}", self.target.peripheral_name);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Terminated by user.");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        warn!("Control event channel closed.");
                        break;
                    }
                }
            }
        }

        self.shutdown();
        self.adapter.close().await
    }

    pub fn handle_event(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::PollTick(tick) => self.on_poll_tick(tick),
            ControlEvent::Adapter(event) => match event {
                AdapterEvent::StateChanged(state) => self.on_adapter_state(state),
                AdapterEvent::Discovered(peripheral) => self.on_discovered(peripheral),
                AdapterEvent::Connected(peripheral) => self.on_connected(&peripheral),
                AdapterEvent::ConnectFailed { peripheral, error } => {
                    self.on_connect_failed(&peripheral, &error)
                }
                AdapterEvent::Disconnected { peripheral, error } => {
                    self.on_disconnected(&peripheral, error.as_ref())
                }
                AdapterEvent::ServicesDiscovered { peripheral, services } => {
                    self.on_services_discovered(&peripheral, services)
                }
                AdapterEvent::CharacteristicsDiscovered {
                    service,
                    characteristics,
                } => self.on_characteristics_discovered(&service, characteristics),
                AdapterEvent::ValueUpdated {
                    characteristic,
                    value,
                } => self.on_value_updated(&characteristic, value),
            },
        }
    }

    /// Releases all keys, cancels the peripheral link and the poll timer, and
    /// returns to `Idle`.
    pub fn shutdown(&mut self) {
        info!("Shutting down from state {}", self.state);
        self.translator.release_all();

        if let Some(mut session) = self.session.take() {
            if self.state.has_link() {
                if let Err(e) = self.adapter.disconnect(&session.peripheral) {
                    error!("Failed to disconnect from {}: {}", session.peripheral, e);
                }
            }
            session.teardown();
        }
        if self.state == LinkState::Scanning {
            self.stop_scan();
        }
        self.acquirer.reset();
        self.state = LinkState::Idle;
    }

    fn on_adapter_state(&mut self, state: AdapterState) {
        self.adapter_ready = state.is_ready();
        match state {
            AdapterState::PoweredOn => {
                info!("Bluetooth is powered on.");
                if self.state == LinkState::Idle {
                    self.start_scan();
                }
            }
            AdapterState::PoweredOff => warn!("Bluetooth is powered off."),
            other => warn!("Bluetooth adapter state: {:?}", other),
        }

        if !self.adapter_ready && self.state == LinkState::Scanning {
            self.scan = None;
            self.state = LinkState::Idle;
        }
    }

    fn start_scan(&mut self) {
        info!("Scanning for BLE devices...");
        match self.adapter.start_scan() {
            Ok(()) => {
                self.scan = Some(ScanContext::default());
                self.state = LinkState::Scanning;
            }
            Err(e) => error!("Failed to start scan: {}", e),
        }
    }

    fn stop_scan(&mut self) {
        if let Err(e) = self.adapter.stop_scan() {
            error!("Failed to stop scan: {}", e);
        }
        info!("Scanning stopped.");
        if let Some(scan) = self.scan.take() {
            for peripheral in &scan.discovered {
                info!("- {}", peripheral);
            }
        }
    }

    fn on_discovered(&mut self, peripheral: PeripheralHandle) {
        if self.state != LinkState::Scanning {
            debug!("Ignoring discovery of {} in state {}", peripheral, self.state);
            return;
        }
        let Some(scan) = self.scan.as_mut() else {
            return;
        };
        if !scan.record(&peripheral) {
            return;
        }
        info!("Discovered Peripheral: {}", peripheral);

        if peripheral.is_named(&self.target.peripheral_name) && self.session.is_none() {
            info!("Found target peripheral with name: {}", self.target.peripheral_name);
            self.stop_scan();
            self.connect(peripheral);
        }
    }

    fn connect(&mut self, peripheral: PeripheralHandle) {
        info!("Attempting to connect to peripheral: {}", peripheral);
        match self.adapter.connect(&peripheral) {
            Ok(()) => {
                self.session = Some(ConnectionSession::new(peripheral));
                self.state = LinkState::Connecting;
            }
            Err(e) => {
                error!("Failed to connect to peripheral: {}, error: {}", peripheral, e);
                self.state = LinkState::Idle;
            }
        }
    }

    fn on_connected(&mut self, peripheral: &PeripheralHandle) {
        let matches = self.session.as_ref().is_some_and(|s| s.is_for(peripheral));
        if self.state != LinkState::Connecting || !matches {
            warn!("Unexpected connection to {} in state {}", peripheral, self.state);
            return;
        }

        info!("Connected to peripheral: {}", peripheral);
        self.state = LinkState::Connected(ConnectedPhase::Acquiring);
        // Halted leaves the link up without a data path.
        self.acquirer.begin(&mut self.adapter, peripheral);
    }

    fn on_connect_failed(&mut self, peripheral: &PeripheralHandle, error: &AdapterError) {
        let matches = self.session.as_ref().is_some_and(|s| s.is_for(peripheral));
        if self.state != LinkState::Connecting || !matches {
            debug!("Ignoring connect failure for {}", peripheral);
            return;
        }
        error!("Failed to connect to peripheral: {}, error: {}", peripheral, error);
        self.session = None;
        self.state = LinkState::Idle;
    }

    fn on_disconnected(&mut self, peripheral: &PeripheralHandle, error: Option<&AdapterError>) {
        let matches = self.session.as_ref().is_some_and(|s| s.is_for(peripheral));
        if !self.state.has_link() || !matches {
            debug!("Ignoring disconnect of {} in state {}", peripheral, self.state);
            return;
        }
        match error {
            Some(e) => warn!("Disconnected from peripheral: {}, error: {}", peripheral, e),
            None => info!("Disconnected from peripheral: {}", peripheral),
        }

        self.translator.release_all();
        if let Some(mut session) = self.session.take() {
            session.teardown();
        }
        self.acquirer.reset();
        self.state = LinkState::Disconnected;

        if self.rescan_on_disconnect && self.adapter_ready {
            self.start_scan();
        }
    }

    fn on_services_discovered(
        &mut self,
        peripheral: &PeripheralHandle,
        services: Result<Vec<ServiceHandle>, AdapterError>,
    ) {
        let matches = self.session.as_ref().is_some_and(|s| s.is_for(peripheral));
        if self.state != LinkState::Connected(ConnectedPhase::Acquiring) || !matches {
            debug!("Ignoring services of {} in state {}", peripheral, self.state);
            return;
        }
        self.acquirer.on_services_discovered(&mut self.adapter, services);
    }

    fn on_characteristics_discovered(
        &mut self,
        service: &ServiceHandle,
        characteristics: Result<Vec<CharacteristicHandle>, AdapterError>,
    ) {
        if self.state != LinkState::Connected(ConnectedPhase::Acquiring) {
            debug!("Ignoring characteristics of {} in state {}", service.uuid, self.state);
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.peripheral.id != service.peripheral_id {
            return;
        }

        let outcome = self.acquirer.on_characteristics_discovered(
            &mut self.adapter,
            session,
            service,
            characteristics,
        );
        if let AcquireOutcome::Ready(mode) = outcome {
            info!("Control characteristic ready, delivery mode {:?}", mode);
            self.state = LinkState::Connected(ConnectedPhase::Streaming);
        }
    }

    fn on_value_updated(
        &mut self,
        characteristic: &CharacteristicHandle,
        value: Result<Vec<u8>, AdapterError>,
    ) {
        let is_control = self.session.as_ref().is_some_and(|s| s.is_control(characteristic));
        if self.state != LinkState::Connected(ConnectedPhase::Streaming) || !is_control {
            return;
        }

        let bytes = match value {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Error reading characteristic {}: {}", characteristic.uuid, e);
                return;
            }
        };
        if bytes.is_empty() {
            debug!("Received empty control data.");
        } else {
            debug!("Received control data: {:02x?}", bytes);
        }

        let buttons = decode(&bytes);
        debug!("Control byte mapped to buttons: {}", buttons);
        self.translator.apply(buttons);
    }

    fn on_poll_tick(&mut self, tick: PollTick) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if !session.poll.accepts(tick) {
            return;
        }
        match (&session.control_characteristic, self.state) {
            (Some(characteristic), LinkState::Connected(_)) => {
                if let Err(e) = self.adapter.read_value(characteristic) {
                    warn!("Failed to read control characteristic: {}", e);
                }
            }
            _ => warn!("Cannot read control characteristic: Not connected or characteristic not found."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::session::DeliveryMode;
    use crate::core::bluetooth::testing::{
        characteristic, peripheral, service, AdapterCall, RecordingAdapter, RecordingEmitter,
    };
    use crate::core::buttons::Button;
    use crate::core::key_state::KeyAction;
    use std::time::Duration;
    use tokio::sync::mpsc;

    type Controller = ConnectionController<RecordingAdapter, RecordingEmitter>;

    fn setup() -> (
        Controller,
        RecordingAdapter,
        RecordingEmitter,
        UnboundedReceiver<ControlEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let adapter = RecordingAdapter::default();
        let emitter = RecordingEmitter::default();
        let controller = ConnectionController::new(
            adapter.clone(),
            emitter.clone(),
            TargetSpec::default(),
            tx,
        );
        (controller, adapter, emitter, rx)
    }

    fn send(controller: &mut Controller, event: AdapterEvent) {
        controller.handle_event(event.into());
    }

    /// Drives a controller up to `Connected(Acquiring)` with peripheral "p1".
    fn connect(controller: &mut Controller) -> PeripheralHandle {
        let target = peripheral("p1", Some("Controller_E18D"));
        send(controller, AdapterEvent::StateChanged(AdapterState::PoweredOn));
        send(controller, AdapterEvent::Discovered(target.clone()));
        send(controller, AdapterEvent::Connected(target.clone()));
        assert_eq!(controller.state(), LinkState::Connected(ConnectedPhase::Acquiring));
        target
    }

    /// Continues from [`connect`] to streaming via a characteristic of the given kind.
    fn stream(controller: &mut Controller, target: &PeripheralHandle, notify: bool) -> CharacteristicHandle {
        let svc = service(&target.id, "180f");
        send(
            controller,
            AdapterEvent::ServicesDiscovered {
                peripheral: target.clone(),
                services: Ok(vec![service(&target.id, "1800"), svc.clone()]),
            },
        );
        let control = characteristic(&svc, "2a19", notify);
        send(
            controller,
            AdapterEvent::CharacteristicsDiscovered {
                service: svc,
                characteristics: Ok(vec![control.clone()]),
            },
        );
        assert_eq!(controller.state(), LinkState::Connected(ConnectedPhase::Streaming));
        control
    }

    fn value(characteristic: &CharacteristicHandle, bytes: &[u8]) -> AdapterEvent {
        AdapterEvent::ValueUpdated {
            characteristic: characteristic.clone(),
            value: Ok(bytes.to_vec()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_polled_session() {
        let (mut controller, adapter, emitter, mut rx) = setup();
        let target = connect(&mut controller);
        let control = stream(&mut controller, &target, false);

        let session = controller.session().unwrap();
        assert_eq!(session.delivery_mode, DeliveryMode::Poll);
        assert_eq!(session.poll.interval(), Some(Duration::from_millis(100)));

        let tick = rx.recv().await.unwrap();
        assert!(matches!(tick, ControlEvent::PollTick(_)));
        controller.handle_event(tick);
        assert_eq!(adapter.count(&AdapterCall::Read(control.uuid)), 1);

        send(&mut controller, value(&control, &[0x01]));
        assert_eq!(emitter.actions(), vec![KeyAction::Press(Button::ButtonA)]);
        assert_eq!(controller.pressed(), [Button::ButtonA].into_iter().collect::<ButtonSet>());

        send(
            &mut controller,
            AdapterEvent::Disconnected {
                peripheral: target,
                error: None,
            },
        );
        assert_eq!(
            emitter.actions(),
            vec![KeyAction::Press(Button::ButtonA), KeyAction::Release(Button::ButtonA)]
        );
        assert!(controller.pressed().is_empty());
        assert!(controller.session().is_none());
        assert_eq!(controller.state(), LinkState::Disconnected);

        // Ticks still queued from the cancelled timer are dropped.
        let reads = adapter.count(&AdapterCall::Read(control.uuid));
        tokio::time::sleep(Duration::from_millis(500)).await;
        while let Ok(event) = rx.try_recv() {
            controller.handle_event(event);
        }
        assert_eq!(adapter.count(&AdapterCall::Read(control.uuid)), reads);
    }

    #[tokio::test]
    async fn notify_session_translates_updates_in_order() {
        let (mut controller, adapter, emitter, _rx) = setup();
        let target = connect(&mut controller);
        let control = stream(&mut controller, &target, true);
        assert_eq!(adapter.count(&AdapterCall::Subscribe(control.uuid)), 1);
        assert!(!controller.session().unwrap().poll.is_active());

        send(&mut controller, value(&control, &[0x03]));
        send(&mut controller, value(&control, &[0x02]));
        send(&mut controller, value(&control, &[]));
        assert_eq!(
            emitter.actions(),
            vec![
                KeyAction::Press(Button::ButtonA),
                KeyAction::Press(Button::ButtonB),
                KeyAction::Release(Button::ButtonA),
                KeyAction::Release(Button::ButtonB),
            ]
        );
    }

    #[test]
    fn unknown_peripheral_is_ignored() {
        let (mut controller, adapter, _, _rx) = setup();
        send(&mut controller, AdapterEvent::StateChanged(AdapterState::PoweredOn));
        send(&mut controller, AdapterEvent::Discovered(peripheral("p9", Some("Other"))));
        send(&mut controller, AdapterEvent::Discovered(peripheral("p8", None)));

        assert_eq!(controller.state(), LinkState::Scanning);
        assert_eq!(adapter.calls(), vec![AdapterCall::StartScan]);
        assert_eq!(controller.discovered().len(), 2);
    }

    #[test]
    fn repeated_sightings_are_recorded_once() {
        let (mut controller, _, _, _rx) = setup();
        send(&mut controller, AdapterEvent::StateChanged(AdapterState::PoweredOn));
        for _ in 0..3 {
            send(&mut controller, AdapterEvent::Discovered(peripheral("p9", Some("Other"))));
        }
        assert_eq!(controller.discovered().len(), 1);
    }

    #[test]
    fn match_stops_scan_and_connects_once() {
        let (mut controller, adapter, _, _rx) = setup();
        send(&mut controller, AdapterEvent::StateChanged(AdapterState::PoweredOn));
        send(&mut controller, AdapterEvent::Discovered(peripheral("p1", Some("Controller_E18D"))));
        send(&mut controller, AdapterEvent::Discovered(peripheral("p2", Some("Controller_E18D"))));

        assert_eq!(controller.state(), LinkState::Connecting);
        assert_eq!(
            adapter.calls(),
            vec![
                AdapterCall::StartScan,
                AdapterCall::StopScan,
                AdapterCall::Connect("p1".into()),
            ]
        );
        assert!(controller.discovered().is_empty());
    }

    #[test]
    fn powered_off_adapter_stays_idle() {
        let (mut controller, adapter, _, _rx) = setup();
        send(&mut controller, AdapterEvent::StateChanged(AdapterState::PoweredOff));
        assert_eq!(controller.state(), LinkState::Idle);
        assert!(adapter.calls().is_empty());

        send(&mut controller, AdapterEvent::StateChanged(AdapterState::PoweredOn));
        assert_eq!(controller.state(), LinkState::Scanning);
        send(&mut controller, AdapterEvent::StateChanged(AdapterState::Unavailable));
        assert_eq!(controller.state(), LinkState::Idle);
    }

    #[test]
    fn connect_failure_returns_to_idle() {
        let (mut controller, _, _, _rx) = setup();
        send(&mut controller, AdapterEvent::StateChanged(AdapterState::PoweredOn));
        let target = peripheral("p1", Some("Controller_E18D"));
        send(&mut controller, AdapterEvent::Discovered(target.clone()));
        send(
            &mut controller,
            AdapterEvent::ConnectFailed {
                peripheral: target,
                error: AdapterError::Bluetooth("timed out".into()),
            },
        );
        assert_eq!(controller.state(), LinkState::Idle);
        assert!(controller.session().is_none());
    }

    #[test]
    fn connect_request_failure_returns_to_idle() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let adapter = RecordingAdapter {
            fail_connect: true,
            ..Default::default()
        };
        let mut controller =
            ConnectionController::new(adapter, RecordingEmitter::default(), TargetSpec::default(), tx);
        send(&mut controller, AdapterEvent::StateChanged(AdapterState::PoweredOn));
        send(&mut controller, AdapterEvent::Discovered(peripheral("p1", Some("Controller_E18D"))));
        assert_eq!(controller.state(), LinkState::Idle);
        assert!(controller.session().is_none());
    }

    #[test]
    fn discovery_error_leaves_session_connected() {
        let (mut controller, adapter, emitter, _rx) = setup();
        let target = connect(&mut controller);
        send(
            &mut controller,
            AdapterEvent::ServicesDiscovered {
                peripheral: target,
                services: Err(AdapterError::Bluetooth("gatt error".into())),
            },
        );
        assert_eq!(controller.state(), LinkState::Connected(ConnectedPhase::Acquiring));
        assert!(controller.session().is_some());
        assert_eq!(adapter.count(&AdapterCall::Disconnect("p1".into())), 0);
        assert!(emitter.actions().is_empty());
    }

    #[test]
    fn read_errors_do_not_end_the_session() {
        let (mut controller, _, emitter, _rx) = setup();
        let target = connect(&mut controller);
        let control = stream(&mut controller, &target, true);

        send(&mut controller, value(&control, &[0x10]));
        send(
            &mut controller,
            AdapterEvent::ValueUpdated {
                characteristic: control.clone(),
                value: Err(AdapterError::Bluetooth("read failed".into())),
            },
        );
        assert_eq!(controller.state(), LinkState::Connected(ConnectedPhase::Streaming));
        assert_eq!(controller.pressed(), [Button::ButtonUp].into_iter().collect::<ButtonSet>());

        send(&mut controller, value(&control, &[0x00]));
        assert_eq!(
            emitter.actions(),
            vec![KeyAction::Press(Button::ButtonUp), KeyAction::Release(Button::ButtonUp)]
        );
    }

    #[test]
    fn updates_from_other_characteristics_are_ignored() {
        let (mut controller, _, emitter, _rx) = setup();
        let target = connect(&mut controller);
        let control = stream(&mut controller, &target, true);
        let other = characteristic(&control.service, "2a00", true);

        send(&mut controller, value(&other, &[0xFF]));
        assert!(emitter.actions().is_empty());
    }

    #[tokio::test]
    async fn shutdown_releases_keys_and_disconnects() {
        let (mut controller, adapter, emitter, _rx) = setup();
        let target = connect(&mut controller);
        let control = stream(&mut controller, &target, false);
        send(&mut controller, value(&control, &[0x05]));

        controller.shutdown();
        assert_eq!(controller.state(), LinkState::Idle);
        assert!(controller.pressed().is_empty());
        assert!(controller.session().is_none());
        assert_eq!(adapter.count(&AdapterCall::Disconnect("p1".into())), 1);
        let releases = emitter
            .actions()
            .into_iter()
            .filter(|a| matches!(a, KeyAction::Release(_)))
            .count();
        assert_eq!(releases, 2);

        // A second shutdown has nothing left to do.
        controller.shutdown();
        assert_eq!(adapter.count(&AdapterCall::Disconnect("p1".into())), 1);
    }

    #[test]
    fn shutdown_while_scanning_stops_the_scan() {
        let (mut controller, adapter, emitter, _rx) = setup();
        send(&mut controller, AdapterEvent::StateChanged(AdapterState::PoweredOn));
        controller.shutdown();
        assert_eq!(adapter.calls(), vec![AdapterCall::StartScan, AdapterCall::StopScan]);
        assert!(emitter.actions().is_empty());
        assert_eq!(controller.state(), LinkState::Idle);
    }

    #[test]
    fn shutdown_while_connecting_cancels_the_attempt() {
        let (mut controller, adapter, _, _rx) = setup();
        send(&mut controller, AdapterEvent::StateChanged(AdapterState::PoweredOn));
        send(&mut controller, AdapterEvent::Discovered(peripheral("p1", Some("Controller_E18D"))));
        controller.shutdown();
        assert_eq!(adapter.count(&AdapterCall::Disconnect("p1".into())), 1);
    }

    #[test]
    fn rescan_after_disconnect_when_enabled() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let adapter = RecordingAdapter::default();
        let mut controller = ConnectionController::new(
            adapter.clone(),
            RecordingEmitter::default(),
            TargetSpec::default(),
            tx,
        )
        .with_rescan_on_disconnect(true);

        let target = connect(&mut controller);
        send(
            &mut controller,
            AdapterEvent::Disconnected {
                peripheral: target.clone(),
                error: Some(AdapterError::Bluetooth("link lost".into())),
            },
        );
        assert_eq!(controller.state(), LinkState::Scanning);
        assert_eq!(adapter.count(&AdapterCall::StartScan), 2);

        send(&mut controller, AdapterEvent::Discovered(target));
        assert_eq!(controller.state(), LinkState::Connecting);
    }

    #[tokio::test]
    async fn run_exits_on_cancellation() {
        let (mut controller, adapter, _, mut rx) = setup();
        let token = CancellationToken::new();
        token.cancel();
        controller.run(&mut rx, token).await.unwrap();
        assert_eq!(controller.state(), LinkState::Idle);
        assert!(adapter.calls().is_empty());
    }
}
