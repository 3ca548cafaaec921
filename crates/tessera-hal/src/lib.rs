#![no_std]

/// Monotonic tick word, in milliseconds.
///
/// All cross-context timestamps are single 32-bit words so they can be
/// shared with plain atomic load/store. Comparisons must go through
/// [`ticks_since`], which stays correct across counter wrap as long as
/// the interval measured is below 2^31 ms.
pub type Ticks = u32;

/// Ticks in a whole number of milliseconds.
pub const fn ms_ticks(ms: u32) -> Ticks {
    ms
}

/// Ticks in a whole number of seconds.
pub const fn s_ticks(s: u32) -> Ticks {
    s * 1000
}

/// The period of a rate given in Hz, rounded down to whole ticks.
pub const fn hz_ticks(hz: u32) -> Ticks {
    1000 / hz
}

/// Elapsed ticks from `since` to `now`, tolerant of counter wrap.
pub fn ticks_since(now: Ticks, since: Ticks) -> Ticks {
    now.wrapping_sub(since)
}

/// Source of the monotonic millisecond counter.
pub trait TimeSource {
    /// Current counter value.
    fn ticks(&self) -> Ticks;
}

/// Suspension hooks for the paint wait loops.
///
/// The paint pipeline never blocks on an OS primitive; while waiting it
/// runs the cooperative task queue and then halts the radio subsystem
/// until the next interrupt.
pub trait WaitHooks {
    /// Run pending cooperative tasks.
    fn work(&mut self);

    /// Halt the radio subsystem until the next wake-up source fires.
    fn halt_radio(&mut self);
}

/// Full-frame length of one ACI transaction, each direction.
pub const ACI_FRAME_LEN: usize = 32;

/// Largest data payload the upper layer may produce per frame.
pub const BT_DATA_MAX: usize = 28;

/// Bus and handshake lines of the BLE co-processor.
///
/// A transaction is requested by driving the request line low; the peer
/// answers by driving ready low (or drives ready low spontaneously when
/// it has an event to deliver). The effective chip-select is the
/// conjunction of the two lines. [`AciBus::transfer`] initiates the
/// 32-byte full-duplex exchange; the platform signals completion by
/// invoking the driver's completion entry point.
pub trait AciBus {
    type Error: core::fmt::Debug;

    /// Drive the request line low.
    fn request_assert(&mut self);

    /// Release the request line high.
    fn request_release(&mut self);

    /// True while the request line is driven low.
    fn request_is_asserted(&mut self) -> bool;

    /// True while the peer holds the ready line low.
    fn ready_is_low(&mut self) -> bool;

    /// Acknowledge the ready-line edge at the interrupt controller.
    fn ack_ready_irq(&mut self);

    /// Software-pend the ready-line interrupt vector.
    fn pend_ready_irq(&mut self);

    /// Exchange one full frame in each direction.
    fn transfer(
        &mut self,
        tx: &[u8; ACI_FRAME_LEN],
        rx: &mut [u8; ACI_FRAME_LEN],
    ) -> Result<(), Self::Error>;
}

/// Upper-layer hooks of the BLE driver.
///
/// All methods run in interrupt context; implementations must be short
/// and must not block.
pub trait BtHandler {
    /// Fill `buf` (at most [`BT_DATA_MAX`] bytes) with the next outbound
    /// payload and return its length. Return 0 to decline.
    fn on_produce_data(&mut self, buf: &mut [u8]) -> usize;

    /// Inbound payload from the peer's auto-acknowledged data pipe.
    fn on_receive_data(&mut self, data: &[u8]);

    /// A central connected to us.
    fn on_connect(&mut self);

    /// The connection ended.
    fn on_disconnect(&mut self);

    /// Factory-test progress: an echo verdict or a DTM packet report.
    fn on_phase_complete(&mut self, status: u8, report: u16);
}
