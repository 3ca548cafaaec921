//! BLE driver tests against a mock bus peer.
//!
//! The mock records every outbound frame and plays staged event frames
//! back through the receive buffer, one per transaction. `peer_ready`
//! acts as the peer pulling the ready line low: it runs the ready-edge
//! ISR and the completion path, i.e. one full transaction.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use tessera_core::ble::aci::{self, evt, mode, op, pipe, status};
use tessera_core::ble::setup::{NB_SETUP_MESSAGES, SETUP_MESSAGES};
use tessera_core::ble::{Nrf8001, TestPhase};
use tessera_core::SYSTEM_VERSION;
use tessera_hal::{AciBus, BtHandler, ACI_FRAME_LEN};

type Frame = [u8; ACI_FRAME_LEN];

#[derive(Default)]
struct BusState {
    request_low: bool,
    ready_low: bool,
    irq_acks: u32,
    irq_pends: u32,
    sent: Vec<Frame>,
    events: VecDeque<Frame>,
}

#[derive(Clone, Default)]
struct MockBus(Rc<RefCell<BusState>>);

impl AciBus for MockBus {
    type Error = Infallible;

    fn request_assert(&mut self) {
        self.0.borrow_mut().request_low = true;
    }

    fn request_release(&mut self) {
        self.0.borrow_mut().request_low = false;
    }

    fn request_is_asserted(&mut self) -> bool {
        self.0.borrow().request_low
    }

    fn ready_is_low(&mut self) -> bool {
        self.0.borrow().ready_low
    }

    fn ack_ready_irq(&mut self) {
        self.0.borrow_mut().irq_acks += 1;
    }

    fn pend_ready_irq(&mut self) {
        self.0.borrow_mut().irq_pends += 1;
    }

    fn transfer(&mut self, tx: &Frame, rx: &mut Frame) -> Result<(), Self::Error> {
        let mut s = self.0.borrow_mut();
        s.sent.push(*tx);
        *rx = s.events.pop_front().unwrap_or([0; ACI_FRAME_LEN]);
        Ok(())
    }
}

#[derive(Default)]
struct MockHandler {
    tx_payloads: VecDeque<Vec<u8>>,
    received: Vec<Vec<u8>>,
    connects: u32,
    disconnects: u32,
    phase_reports: Vec<(u8, u16)>,
}

impl BtHandler for MockHandler {
    fn on_produce_data(&mut self, buf: &mut [u8]) -> usize {
        match self.tx_payloads.pop_front() {
            Some(p) => {
                buf[..p.len()].copy_from_slice(&p);
                p.len()
            }
            None => 0,
        }
    }

    fn on_receive_data(&mut self, data: &[u8]) {
        self.received.push(data.to_vec());
    }

    fn on_connect(&mut self) {
        self.connects += 1;
    }

    fn on_disconnect(&mut self) {
        self.disconnects += 1;
    }

    fn on_phase_complete(&mut self, status: u8, report: u16) {
        self.phase_reports.push((status, report));
    }
}

/// Build an inbound event frame: `[debug, length, event, params…]`.
fn event(event: u8, params: &[u8]) -> Frame {
    let mut f = [0u8; ACI_FRAME_LEN];
    f[aci::RX_LENGTH] = params.len() as u8 + 1;
    f[aci::RX_EVENT] = event;
    f[aci::RX_PARAM..aci::RX_PARAM + params.len()].copy_from_slice(params);
    f
}

struct Harness {
    bus: MockBus,
    drv: Nrf8001<MockBus>,
    h: MockHandler,
}

impl Harness {
    fn new() -> Self {
        let bus = MockBus::default();
        let mut drv = Nrf8001::new(bus.clone());
        drv.init();
        Self {
            bus,
            drv,
            h: MockHandler::default(),
        }
    }

    fn request_asserted(&self) -> bool {
        self.bus.0.borrow().request_low
    }

    fn stage(&self, f: Frame) {
        self.bus.0.borrow_mut().events.push_back(f);
    }

    /// Peer pulls ready low; run one transaction start to finish and
    /// return the frame we sent in it.
    fn peer_ready(&mut self) -> Frame {
        self.bus.0.borrow_mut().ready_low = true;
        let started = self
            .drv
            .on_ready_irq(&mut self.h)
            .expect("mock bus cannot fail");
        assert!(started, "ready edge with the line low must transact");
        self.drv.on_transfer_complete(&mut self.h);
        self.bus.0.borrow_mut().ready_low = false;
        *self.bus.0.borrow().sent.last().unwrap()
    }

    /// Drive the cold-boot sequence to the idle, advertising state.
    /// `credits` is the pool granted by the DeviceStarted event.
    fn boot(&mut self, credits: u8) {
        // init() asked for the first transaction already.
        assert!(self.request_asserted());

        let f = self.peer_ready();
        assert_eq!(f[..2], [1, op::RADIO_RESET], "boot must lead with RadioReset");
        self.stage(event(
            evt::COMMAND_RESPONSE,
            &[op::RADIO_RESET, status::SUCCESS],
        ));
        self.peer_ready(); // response in; chains to setup

        for n in 0..NB_SETUP_MESSAGES {
            let f = self.peer_ready();
            assert_eq!(
                f,
                SETUP_MESSAGES[n as usize],
                "setup frame {n} must go out verbatim"
            );
            self.stage(event(
                evt::COMMAND_RESPONSE,
                &[op::SETUP, status::TRANSACTION_CONTINUE],
            ));
            self.peer_ready();
        }

        // Setup digested; the peer restarts into standby.
        self.stage(event(evt::DEVICE_STARTED, &[mode::STANDBY, 0x00, credits]));
        self.peer_ready();

        let f = self.peer_ready();
        assert_eq!(f[..3], [6, op::SET_LOCAL_DATA, pipe::SYSTEM_VERSION_SET]);
        assert_eq!(f[3..7], SYSTEM_VERSION.to_le_bytes());
        self.stage(event(
            evt::COMMAND_RESPONSE,
            &[op::SET_LOCAL_DATA, status::SUCCESS],
        ));
        self.peer_ready();

        let f = self.peer_ready();
        assert_eq!(f[..2], [5, op::CONNECT]);
        assert_eq!(f[2..4], 0u16.to_le_bytes(), "infinite advertising duration");
        assert_eq!(f[4..6], 32u16.to_le_bytes(), "20 ms advertising interval");
        self.stage(event(evt::COMMAND_RESPONSE, &[op::CONNECT, status::SUCCESS]));
        self.peer_ready();

        assert!(
            !self.request_asserted(),
            "boot must end idle with no transaction pending"
        );
    }

    /// Outbound frames that actually carried a command.
    fn commands_sent(&self) -> Vec<Frame> {
        self.bus
            .0
            .borrow()
            .sent
            .iter()
            .filter(|f| f[aci::TX_LENGTH] > 0)
            .copied()
            .collect()
    }
}

// ============================================================================
// Cold boot
// ============================================================================

mod boot_tests {
    use super::*;

    #[test]
    fn cold_boot_reset_setup_connect() {
        let mut h = Harness::new();
        h.boot(2);

        // The full command trace: RadioReset, the verbatim setup blob,
        // SetLocalData(version), Connect. Nothing else, nothing out of
        // order, one command per transaction.
        let cmds = h.commands_sent();
        assert_eq!(cmds.len(), 1 + NB_SETUP_MESSAGES as usize + 2);
        assert_eq!(cmds[0][1], op::RADIO_RESET);
        for n in 0..NB_SETUP_MESSAGES as usize {
            assert_eq!(cmds[1 + n], SETUP_MESSAGES[n]);
        }
        assert_eq!(cmds[1 + NB_SETUP_MESSAGES as usize][1], op::SET_LOCAL_DATA);
        assert_eq!(cmds[2 + NB_SETUP_MESSAGES as usize][1], op::CONNECT);
    }

    #[test]
    fn init_pends_a_software_interrupt() {
        let h = Harness::new();
        // Covers the race where the peer went ready before the edge
        // IRQ was armed.
        assert_eq!(h.bus.0.borrow().irq_pends, 1);
    }

    #[test]
    fn spurious_ready_edge_is_ignored() {
        let mut h = Harness::new();

        // Edge fires but the line is back high: no transaction.
        let started = h.drv.on_ready_irq(&mut h.h).unwrap();
        assert!(!started);
        assert!(h.bus.0.borrow().sent.is_empty());
        assert_eq!(h.bus.0.borrow().irq_acks, 1, "the IRQ is still acknowledged");
    }

    #[test]
    fn error_status_replays_setup() {
        let mut h = Harness::new();

        let f = h.peer_ready();
        assert_eq!(f[1], op::RADIO_RESET);
        h.stage(event(
            evt::COMMAND_RESPONSE,
            &[op::RADIO_RESET, status::SUCCESS],
        ));
        h.peer_ready();

        // First setup frame goes out, but the peer rejects it.
        let f = h.peer_ready();
        assert_eq!(f, SETUP_MESSAGES[0]);
        h.stage(event(evt::COMMAND_RESPONSE, &[op::SETUP, 0x84]));
        h.peer_ready();

        // Recovery starts over from RadioReset.
        let f = h.peer_ready();
        assert_eq!(f[..2], [1, op::RADIO_RESET]);
    }
}

// ============================================================================
// Transaction chaining
// ============================================================================

mod chaining_tests {
    use super::*;

    #[test]
    fn two_requests_during_transaction_chain_once() {
        let mut h = Harness::new();
        h.boot(0);

        // Open a transaction by hand and pend two requests mid-flight.
        h.bus.0.borrow_mut().ready_low = true;
        assert!(h.drv.on_ready_irq(&mut h.h).unwrap());
        h.drv.request_transaction();
        h.drv.request_transaction();
        h.drv.on_transfer_complete(&mut h.h);
        h.bus.0.borrow_mut().ready_low = false;

        // Exactly one chained transaction...
        assert!(h.request_asserted());
        h.peer_ready();

        // ...and no second one after it.
        assert!(!h.request_asserted());
    }

    #[test]
    fn request_outside_transaction_asserts_immediately() {
        let mut h = Harness::new();
        h.boot(0);

        assert!(!h.request_asserted());
        h.drv.request_transaction();
        assert!(h.request_asserted());
    }
}

// ============================================================================
// Data flow control
// ============================================================================

mod data_tests {
    use super::*;

    #[test]
    fn credit_exhaustion_blocks_until_granted() {
        let mut h = Harness::new();
        h.boot(0); // no credits granted at start

        // Data pipe opens.
        h.stage(event(evt::PIPE_STATUS, &[1 << pipe::DATA_TX, 0, 0, 0, 0, 0, 0, 0]));
        h.peer_ready();

        // The upper layer has something to say, but no credits: the
        // chained transaction goes out empty.
        h.h.tx_payloads.push_back(b"hello".to_vec());
        h.drv.request_transaction();
        let f = h.peer_ready();
        assert_eq!(f[aci::TX_LENGTH], 0, "no data frame without credits");

        // A credit arrives; the next transaction carries the payload.
        h.stage(event(evt::DATA_CREDIT, &[1]));
        h.peer_ready();
        let f = h.peer_ready();
        assert_eq!(f[..3], [7, op::SEND_DATA, pipe::DATA_TX]);
        assert_eq!(&f[3..8], b"hello");

        // The credit is spent; a further payload stays queued.
        h.h.tx_payloads.push_back(b"again".to_vec());
        h.drv.request_transaction();
        let f = h.peer_ready();
        assert_eq!(f[aci::TX_LENGTH], 0, "credits must strictly decrease");
    }

    #[test]
    fn closed_pipe_blocks_data() {
        let mut h = Harness::new();
        h.boot(3); // credits available, pipe never opened

        h.h.tx_payloads.push_back(b"nope".to_vec());
        h.drv.request_transaction();
        let f = h.peer_ready();
        assert_eq!(f[aci::TX_LENGTH], 0, "no data frame on a closed pipe");
    }

    #[test]
    fn inbound_data_reaches_the_handler() {
        let mut h = Harness::new();
        h.boot(0);

        h.stage(event(evt::DATA_RECEIVED, &[pipe::DATA_RX_ACK_AUTO, b'p', b'i', b'n', b'g']));
        h.peer_ready();

        assert_eq!(h.h.received.len(), 1);
        assert!(h.h.received[0].starts_with(b"ping"));
    }

    #[test]
    fn inbound_data_on_other_pipes_is_dropped() {
        let mut h = Harness::new();
        h.boot(0);

        h.stage(event(evt::DATA_RECEIVED, &[0x07, 0xAA, 0xBB]));
        h.peer_ready();

        assert!(h.h.received.is_empty());
    }
}

// ============================================================================
// Connection lifecycle
// ============================================================================

mod connection_tests {
    use super::*;

    #[test]
    fn connect_prompts_timing_renegotiation() {
        let mut h = Harness::new();
        h.boot(2);

        h.stage(event(evt::CONNECTED, &[0x00]));
        h.peer_ready();
        assert_eq!(h.h.connects, 1);

        // The timing request rides the next transaction; a PipeStatus
        // typically follows connection and provides one.
        h.stage(event(evt::PIPE_STATUS, &[1 << pipe::DATA_TX, 0, 0, 0, 0, 0, 0, 0]));
        let f = h.peer_ready();
        assert_eq!(f[..2], [9, op::CHANGE_TIMING_REQUEST]);
        assert_eq!(f[2..4], 8u16.to_le_bytes(), "10 ms minimum interval");
        assert_eq!(f[4..6], 16u16.to_le_bytes(), "20 ms maximum interval");
        assert_eq!(f[6..8], 0u16.to_le_bytes(), "no slave latency");
        assert_eq!(f[8..10], 30u16.to_le_bytes(), "300 ms supervision timeout");
    }

    #[test]
    fn disconnect_restarts_advertising() {
        let mut h = Harness::new();
        h.boot(2);

        // Open the pipe first so we can observe it being forgotten.
        h.stage(event(evt::PIPE_STATUS, &[1 << pipe::DATA_TX, 0, 0, 0, 0, 0, 0, 0]));
        h.peer_ready();
        h.peer_ready(); // consume the chained (empty) transaction

        h.stage(event(evt::DISCONNECTED, &[0x00, 0x13]));
        h.peer_ready();
        assert_eq!(h.h.disconnects, 1);

        // Chained transaction re-issues Connect.
        let f = h.peer_ready();
        assert_eq!(f[..2], [5, op::CONNECT]);

        // And the stale pipe bitmap is gone: credits or not, no data.
        h.stage(event(evt::DATA_CREDIT, &[1]));
        h.h.tx_payloads.push_back(b"stale".to_vec());
        h.peer_ready();
        let f = h.peer_ready();
        assert_eq!(f[aci::TX_LENGTH], 0, "open_pipes must be cleared on disconnect");
    }
}

// ============================================================================
// Factory test phases
// ============================================================================

mod factory_test_tests {
    use super::*;

    #[test]
    fn phase1_reset_echo_and_rx_begin() {
        let mut h = Harness::new();
        h.boot(2);

        h.drv.test(TestPhase::Phase1);

        let f = h.peer_ready();
        assert_eq!(f[..2], [1, op::RADIO_RESET]);
        h.stage(event(
            evt::COMMAND_RESPONSE,
            &[op::RADIO_RESET, status::SUCCESS],
        ));
        h.peer_ready();

        let f = h.peer_ready();
        assert_eq!(f[..3], [2, op::TEST, 0x02], "enter DTM-over-ACI test mode");

        // Test gets no CommandResponse; the peer restarts into test
        // mode and says so.
        h.stage(event(evt::DEVICE_STARTED, &[mode::TEST, 0x00, 0x00]));
        h.peer_ready();

        let f = h.peer_ready();
        assert_eq!(f[..2], [11, op::ECHO]);
        assert_eq!(
            f[2..12],
            [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A]
        );

        // The peer echoes the vector back.
        h.stage(event(
            evt::ECHO,
            &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A],
        ));
        h.peer_ready();
        assert_eq!(h.h.phase_reports, [(status::SUCCESS, 1)]);

        // Receiver test starts, then the driver idles awaiting phase 2.
        let f = h.peer_ready();
        assert_eq!(f[..2], [3, op::DTM_COMMAND]);
        assert_eq!(f[2..4], 0x3040u16.to_le_bytes());
        h.stage(event(
            evt::COMMAND_RESPONSE,
            &[op::DTM_COMMAND, status::SUCCESS, 0x00, 0x00],
        ));
        h.peer_ready();
        assert!(!h.request_asserted(), "driver must idle awaiting phase 2");
    }

    #[test]
    fn phase2_reports_and_restarts_setup() {
        let mut h = Harness::new();
        h.boot(2);
        run_phase1(&mut h);

        h.drv.test(TestPhase::Phase2);

        // Test end goes out; its response carries the packet report.
        let f = h.peer_ready();
        assert_eq!(f[..2], [3, op::DTM_COMMAND]);
        assert_eq!(f[2..4], 0x00C0u16.to_le_bytes());
        h.stage(event(
            evt::COMMAND_RESPONSE,
            &[op::DTM_COMMAND, status::SUCCESS, 0x80, 0x2A],
        ));
        h.peer_ready();
        assert_eq!(
            h.h.phase_reports.last(),
            Some(&(status::SUCCESS, 0x802A)),
            "packet report is big-endian in the payload"
        );

        // Leave test mode, then the setup sequence replays.
        let f = h.peer_ready();
        assert_eq!(f[..3], [2, op::TEST, 0xFF]);
        h.stage(event(evt::DEVICE_STARTED, &[mode::SETUP, 0x00, 0x00]));
        h.peer_ready();

        let f = h.peer_ready();
        assert_eq!(f, SETUP_MESSAGES[0], "phase 2 must end by restarting setup");
    }

    #[test]
    fn echo_mismatch_is_reported_not_fatal() {
        let mut h = Harness::new();
        h.boot(2);

        h.drv.test(TestPhase::Phase1);
        let f = h.peer_ready();
        assert_eq!(f[1], op::RADIO_RESET);
        h.stage(event(
            evt::COMMAND_RESPONSE,
            &[op::RADIO_RESET, status::SUCCESS],
        ));
        h.peer_ready();
        h.peer_ready(); // Test command
        h.stage(event(evt::DEVICE_STARTED, &[mode::TEST, 0x00, 0x00]));
        h.peer_ready();
        h.peer_ready(); // Echo command

        // Corrupted echo comes back.
        h.stage(event(
            evt::ECHO,
            &[0xFF, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A],
        ));
        h.peer_ready();
        assert_eq!(h.h.phase_reports, [(status::SUCCESS, 0)]);

        // The sequence still proceeds to the receiver test.
        let f = h.peer_ready();
        assert_eq!(f[..2], [3, op::DTM_COMMAND]);
    }

    /// Phase 1 up to the idle point, assertions elsewhere.
    fn run_phase1(h: &mut Harness) {
        h.drv.test(TestPhase::Phase1);
        h.peer_ready(); // RadioReset
        h.stage(event(
            evt::COMMAND_RESPONSE,
            &[op::RADIO_RESET, status::SUCCESS],
        ));
        h.peer_ready();
        h.peer_ready(); // Test(0x02)
        h.stage(event(evt::DEVICE_STARTED, &[mode::TEST, 0x00, 0x00]));
        h.peer_ready();
        h.peer_ready(); // Echo
        h.stage(event(
            evt::ECHO,
            &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A],
        ));
        h.peer_ready();
        h.peer_ready(); // DTM receiver test begin
        h.stage(event(
            evt::COMMAND_RESPONSE,
            &[op::DTM_COMMAND, status::SUCCESS, 0x00, 0x00],
        ));
        h.peer_ready();
        assert!(!h.request_asserted());
    }
}
