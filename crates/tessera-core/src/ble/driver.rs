//! Driver for the nRF8001 Bluetooth Low Energy co-processor.
//!
//! Handles the particulars of the ACI transport and exports a simple
//! packet interface over a pair of GATT characteristics used as dumb
//! input and output pipes. The upper protocol layer plugs in through
//! the [`BtHandler`] trait.
//!
//! Transactions are strictly serialized by the request line; system
//! commands are strictly serialized by `sys_command_pending`. Peer
//! data credits and the open-pipes bitmap gate data transmission.

use tessera_hal::{AciBus, BtHandler, ACI_FRAME_LEN, BT_DATA_MAX};

use super::aci::{self, evt, mode, op, pipe, status};
use super::setup::{NB_SETUP_MESSAGES, SETUP_MESSAGES};
use crate::SYSTEM_VERSION;

/// Factory-test phases, requested externally.
///
/// Phase 1 enters test mode, runs an echo check and starts a DTM
/// receiver test. Phase 2 ends the receiver test, reports the packet
/// count and leaves test mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TestPhase {
    Phase1,
    Phase2,
}

/// Position in the setup/operational command sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SysCommandState {
    /// Streaming setup frame `n`.
    Setup(u8),
    Idle,
    BeginConnect,
    RadioReset,
    InitSysVersion,
    ChangeTimingRequest,
    EnterTest,
    ExitTest,
    Echo,
    DtmRx,
    DtmEnd,
}

/// Position in the factory-test sub-sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TestState {
    Idle,
    /// Externally requested phase 1, not yet picked up.
    Phase1,
    /// Externally requested phase 2, not yet picked up.
    Phase2,
    RadioReset,
    EnterTest,
    BeginRx,
    EndRx,
}

/// Echo payload for the factory-test link check.
const ECHO_DATA: [u8; 10] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A];

/// DTM word: receiver test, channel 0x10, length 0x10, PRBS9 packets.
const DTM_RX_BEGIN: u16 = 0x3040;
/// DTM word: test end.
const DTM_TEST_END: u16 = 0x00C0;

// Connect: infinite duration, 20 ms advertising interval.
const CONNECT_TIMEOUT: u16 = 0x0000;
const CONNECT_ADV_INTERVAL: u16 = 32; // 0.625 ms units

// ChangeTimingRequest: 10-20 ms connection interval, no slave latency,
// 300 ms supervision timeout.
const TIMING_INTERVAL_MIN: u16 = 8; // 1.25 ms units
const TIMING_INTERVAL_MAX: u16 = 16;
const TIMING_SLAVE_LATENCY: u16 = 0;
const TIMING_SUPERVISION_TIMEOUT: u16 = 30; // 10 ms units

/// The nRF8001 driver, generic over the bus and handshake lines.
///
/// One process-wide instance, initialized at boot; the platform's
/// interrupt handlers own it through whatever interior-mutability
/// wrapper they use and forward the ready edge to [`on_ready_irq`] and
/// bus completion to [`on_transfer_complete`].
///
/// [`on_ready_irq`]: Nrf8001::on_ready_irq
/// [`on_transfer_complete`]: Nrf8001::on_transfer_complete
pub struct Nrf8001<B: AciBus> {
    bus: B,
    // Frame buffers are owned by interrupt context from transaction
    // start until on_transfer_complete returns.
    tx: [u8; ACI_FRAME_LEN],
    rx: [u8; ACI_FRAME_LEN],
    /// One more transaction must start after the current one completes.
    requests_pending: bool,
    sys_command_state: SysCommandState,
    /// A system command is awaiting its response.
    sys_command_pending: bool,
    test_state: TestState,
    /// Peer-granted number of data packets we may send.
    data_credits: u8,
    /// Low byte of the peer's "pipes open" bitmap.
    open_pipes: u8,
}

impl<B: AciBus> Nrf8001<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            tx: [0; ACI_FRAME_LEN],
            rx: [0; ACI_FRAME_LEN],
            requests_pending: false,
            sys_command_state: SysCommandState::RadioReset,
            sys_command_pending: false,
            test_state: TestState::Idle,
            data_credits: 0,
            open_pipes: 0,
        }
    }

    /// Reset driver state and kick off the setup sequence.
    ///
    /// The platform must have configured the bus and waited out the
    /// peer's post-reset settling time before calling this.
    pub fn init(&mut self) {
        self.tx[aci::TX_LENGTH] = 0;
        self.requests_pending = false;
        self.sys_command_state = SysCommandState::RadioReset;
        self.sys_command_pending = false;
        self.test_state = TestState::Idle;
        self.data_credits = 0;
        self.open_pipes = 0;

        // Ask for the first transaction so setup can start.
        self.request_transaction();

        // The peer may have gone ready before the edge IRQ was armed.
        // Pend the vector by hand; the ISR checks the line level, so
        // the spurious case falls out harmlessly.
        self.bus.pend_ready_irq();
    }

    /// Ask for `produce_command` to be called once.
    ///
    /// Callable from task context at any time, or from interrupt
    /// context during command production or event handling. Idempotent:
    /// any number of calls during one transaction chain exactly one
    /// follow-up transaction.
    pub fn request_transaction(&mut self) {
        // The request line and the pending flag are also touched by the
        // ready-edge and completion interrupts.
        critical_section::with(|_| {
            if self.bus.request_is_asserted() {
                // Already in a transaction; pend another one for later.
                self.requests_pending = true;
            } else {
                self.bus.request_assert();
            }
        });
    }

    /// Ready-line falling edge: run one full-frame transaction.
    ///
    /// Returns `Ok(true)` when a transfer was started; the platform
    /// must invoke [`on_transfer_complete`] once it finishes.
    ///
    /// [`on_transfer_complete`]: Nrf8001::on_transfer_complete
    pub fn on_ready_irq<H: BtHandler>(&mut self, h: &mut H) -> Result<bool, B::Error> {
        self.bus.ack_ready_irq();

        // Check the line is actually low: rejects noise spikes on the
        // ready line and covers the software-pended IRQ from init().
        if !self.bus.ready_is_low() {
            return Ok(false);
        }

        // The peer's virtual chip-select is (request && ready); assert
        // request in case this edge was a spontaneous event. This must
        // happen before produce_command, so a request_transaction from
        // inside it sees a transaction in progress.
        self.bus.request_assert();

        self.produce_command(h);

        self.bus.transfer(&self.tx, &mut self.rx)?;
        Ok(true)
    }

    /// Bus transfer finished: consume the inbound event and chain the
    /// next transaction if one was requested meanwhile.
    pub fn on_transfer_complete<H: BtHandler>(&mut self, h: &mut H) {
        // Done with the transaction; end our request.
        self.bus.request_release();

        // May call request_transaction to keep the cycle going.
        self.handle_event(h);

        if self.requests_pending {
            self.requests_pending = false;
            self.bus.request_assert();
        }
    }

    /// Enter a factory-test phase at the next opportunity.
    pub fn test(&mut self, phase: TestPhase) {
        self.test_state = match phase {
            TestPhase::Phase1 => TestState::Phase1,
            TestPhase::Phase2 => TestState::Phase2,
        };
        self.request_transaction();
    }

    /// Fill the transmit buffer, or mark it empty.
    fn produce_command<H: BtHandler>(&mut self, h: &mut H) {
        // System commands are highest priority, at most one in flight.
        if !self.sys_command_pending && self.produce_system_command() {
            self.sys_command_pending = true;
            return;
        }

        // If flow control allows, see if the upper layer wants to send.
        if self.data_credits > 0 && self.open_pipes & (1 << pipe::DATA_TX) != 0 {
            let window = aci::TX_PARAM + 1;
            let len = h
                .on_produce_data(&mut self.tx[window..window + BT_DATA_MAX])
                .min(BT_DATA_MAX);
            if len > 0 {
                self.tx[aci::TX_LENGTH] = len as u8 + 2;
                self.tx[aci::TX_OPCODE] = op::SEND_DATA;
                self.tx[aci::TX_PARAM] = pipe::DATA_TX;
                self.data_credits -= 1;
                return;
            }
        }

        // Nothing to say; the transfer still runs so the peer's event
        // can come across.
        self.tx[aci::TX_LENGTH] = 0;
    }

    fn set_command(&mut self, opcode: u8, params: &[u8]) {
        self.tx[aci::TX_LENGTH] = params.len() as u8 + 1;
        self.tx[aci::TX_OPCODE] = opcode;
        self.tx[aci::TX_PARAM..aci::TX_PARAM + params.len()].copy_from_slice(params);
    }

    /// Advance the system command sequencer. Returns false when idle.
    fn produce_system_command(&mut self) -> bool {
        // An externally requested test phase overrides the regular
        // sequence at its next pickup point.
        match self.test_state {
            TestState::Phase1 => {
                self.sys_command_state = SysCommandState::RadioReset;
                self.test_state = TestState::RadioReset;
            }
            TestState::Phase2 => {
                self.sys_command_state = SysCommandState::DtmEnd;
                self.test_state = TestState::EndRx;
            }
            _ => {}
        }

        match self.sys_command_state {
            SysCommandState::Idle => false,

            SysCommandState::RadioReset => {
                // Sent just in case after any soft reset, so the peer
                // isn't left in the middle of something. It complains
                // when not yet set up; that error is ignored.
                self.set_command(op::RADIO_RESET, &[]);
                if self.test_state == TestState::RadioReset {
                    self.sys_command_state = SysCommandState::EnterTest;
                    self.test_state = TestState::EnterTest;
                } else {
                    self.sys_command_state = SysCommandState::Setup(0);
                }
                self.data_credits = 0;
                true
            }

            SysCommandState::Setup(n) => {
                // One vendor frame per transaction, verbatim. Once the
                // peer digests the last one it enters standby and sends
                // a DeviceStarted event.
                self.tx = SETUP_MESSAGES[n as usize];
                self.sys_command_state = if n + 1 == NB_SETUP_MESSAGES {
                    SysCommandState::Idle
                } else {
                    SysCommandState::Setup(n + 1)
                };
                true
            }

            SysCommandState::InitSysVersion => {
                // Park our version word in the peer's RAM so it answers
                // firmware-version reads without waking us.
                let mut params = [0u8; 5];
                params[0] = pipe::SYSTEM_VERSION_SET;
                params[1..5].copy_from_slice(&SYSTEM_VERSION.to_le_bytes());
                self.set_command(op::SET_LOCAL_DATA, &params);
                self.sys_command_state = SysCommandState::BeginConnect;
                true
            }

            SysCommandState::BeginConnect => {
                // Begin the potentially long-running search for a peer;
                // this is what enables advertisement broadcasts.
                let mut params = [0u8; 4];
                params[0..2].copy_from_slice(&CONNECT_TIMEOUT.to_le_bytes());
                params[2..4].copy_from_slice(&CONNECT_ADV_INTERVAL.to_le_bytes());
                self.set_command(op::CONNECT, &params);
                self.sys_command_state = SysCommandState::Idle;
                true
            }

            SysCommandState::ChangeTimingRequest => {
                // After connecting, try to pull the connection interval
                // down for throughput. The central may grant less.
                let mut params = [0u8; 8];
                params[0..2].copy_from_slice(&TIMING_INTERVAL_MIN.to_le_bytes());
                params[2..4].copy_from_slice(&TIMING_INTERVAL_MAX.to_le_bytes());
                params[4..6].copy_from_slice(&TIMING_SLAVE_LATENCY.to_le_bytes());
                params[6..8].copy_from_slice(&TIMING_SUPERVISION_TIMEOUT.to_le_bytes());
                self.set_command(op::CHANGE_TIMING_REQUEST, &params);
                self.sys_command_state = SysCommandState::Idle;
                true
            }

            SysCommandState::EnterTest => {
                self.set_command(op::TEST, &[0x02]); // DTM over ACI
                self.sys_command_state = SysCommandState::Echo; // echo first
                true
            }

            SysCommandState::ExitTest => {
                self.set_command(op::TEST, &[0xFF]);
                self.sys_command_state = SysCommandState::Setup(0);
                true
            }

            SysCommandState::Echo => {
                self.set_command(op::ECHO, &ECHO_DATA);
                self.sys_command_state = SysCommandState::DtmRx;
                self.test_state = TestState::BeginRx;
                true
            }

            SysCommandState::DtmRx => {
                self.set_command(op::DTM_COMMAND, &DTM_RX_BEGIN.to_le_bytes());
                self.sys_command_state = SysCommandState::Idle;
                true
            }

            SysCommandState::DtmEnd => {
                self.set_command(op::DTM_COMMAND, &DTM_TEST_END.to_le_bytes());
                self.sys_command_state = SysCommandState::Idle;
                true
            }
        }
    }

    /// Consume the receive buffer.
    fn handle_event<H: BtHandler>(&mut self, h: &mut H) {
        let len = self.rx[aci::RX_LENGTH] as usize;
        if len == 0 {
            // No pending event.
            return;
        }

        match self.rx[aci::RX_EVENT] {
            evt::COMMAND_RESPONSE => {
                // Only one system command may be pending at a time, so
                // this frees us to move to the next one.
                self.sys_command_pending = false;
                let command = self.rx[aci::RX_PARAM];
                let st = self.rx[aci::RX_PARAM + 1];
                self.handle_command_status(command, st, h);
                if self.sys_command_state != SysCommandState::Idle {
                    // More work to do; ask for another transaction.
                    self.request_transaction();
                }
            }

            evt::DEVICE_STARTED => {
                // Operating mode changed. After setup the peer enters
                // standby; that is when local data goes out and Connect
                // starts advertising. The credit pool arrives here too.
                let m = self.rx[aci::RX_PARAM];
                self.data_credits = self.rx[aci::RX_PARAM + 2];

                if m == mode::STANDBY && self.sys_command_state == SysCommandState::Idle {
                    // Standby is reached both on the way into test mode
                    // (via RadioReset, since Disconnect fails when not
                    // connected) and during normal start. Tell them
                    // apart here.
                    if self.test_state == TestState::EnterTest {
                        self.sys_command_state = SysCommandState::EnterTest;
                        self.test_state = TestState::Idle;
                    } else {
                        self.sys_command_state = SysCommandState::InitSysVersion;
                    }
                }

                // Test gets no CommandResponse; this event stands in
                // for it, so clear the pending gate explicitly.
                self.sys_command_pending = false;
                if self.sys_command_state != SysCommandState::Idle {
                    self.request_transaction();
                }
            }

            evt::CONNECTED => {
                // Take the opportunity to ask for a faster interval.
                self.sys_command_state = SysCommandState::ChangeTimingRequest;
                h.on_connect();
            }

            evt::DISCONNECTED => {
                // One connection ended; start hunting for another.
                self.sys_command_state = SysCommandState::BeginConnect;
                self.open_pipes = 0;
                self.request_transaction();
                h.on_disconnect();
            }

            evt::PIPE_STATUS => {
                // Low byte of the "opened" bitmap is all we track; the
                // peer may now be listening, so see about transmitting.
                self.open_pipes = self.rx[aci::RX_PARAM];
                self.request_transaction();
            }

            evt::DATA_RECEIVED => {
                // The inbound pipe auto-acknowledges over the air; we
                // assume the CPU keeps up with the ACI read rate.
                let n = (len - 1).min(ACI_FRAME_LEN - aci::RX_PARAM - 1);
                if n > 0 && self.rx[aci::RX_PARAM] == pipe::DATA_RX_ACK_AUTO {
                    h.on_receive_data(&self.rx[aci::RX_PARAM + 1..aci::RX_PARAM + 1 + n]);
                }
            }

            evt::DATA_CREDIT => {
                // More flow-control credits; we may be able to send now.
                self.data_credits = self.data_credits.saturating_add(self.rx[aci::RX_PARAM]);
                self.request_transaction();
            }

            evt::ECHO => {
                let matched = len - 1 == ECHO_DATA.len()
                    && self.rx[aci::RX_PARAM..aci::RX_PARAM + ECHO_DATA.len()] == ECHO_DATA;
                h.on_phase_complete(status::SUCCESS, matched as u16);
                // Echo gets no CommandResponse either.
                self.sys_command_pending = false;
                self.request_transaction();
            }

            _ => {}
        }
    }

    fn handle_command_status<H: BtHandler>(&mut self, command: u8, st: u8, h: &mut H) {
        if command == op::RADIO_RESET {
            // Complains when the peer wasn't set up yet; we send the
            // reset just in case, so ignore it.
            return;
        }

        if command == op::DTM_COMMAND {
            // DTM words ride most-significant-octet-first inside the
            // otherwise little-endian payload.
            let response =
                u16::from_be_bytes([self.rx[aci::RX_PARAM + 2], self.rx[aci::RX_PARAM + 3]]);
            self.handle_dtm_response(st, response, h);
        }

        if st > status::TRANSACTION_COMPLETE {
            // Something went wrong; replay setup from the top.
            self.sys_command_state = SysCommandState::RadioReset;
        }
    }

    fn handle_dtm_response<H: BtHandler>(&mut self, st: u8, response: u16, h: &mut H) {
        // Bit 15 marks a packet report.
        if response & 0x8000 != 0 {
            h.on_phase_complete(st, response);
        }

        match self.test_state {
            TestState::BeginRx => {
                // End of phase 1; idle until phase 2 is requested.
                self.test_state = TestState::Idle;
            }
            TestState::EndRx => {
                // Last DTM command of phase 2; leave test mode.
                self.sys_command_state = SysCommandState::ExitTest;
                self.test_state = TestState::Idle;
            }
            _ => {}
        }
    }
}
