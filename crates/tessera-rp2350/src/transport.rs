//! RP2350 ACI transport: REQN/RDYN handshake lines plus a SPI1
//! exchange with the BLE co-processor.

use embedded_hal::digital::{InputPin, OutputPin, StatefulOutputPin};
use embedded_hal::spi::SpiBus as _;
use rp235x_hal as hal;
use tessera_hal::{AciBus, ACI_FRAME_LEN};

/// ACI transport error for the RP2350 platform.
#[derive(Debug, defmt::Format)]
pub enum TransportError {
    /// SPI bus error during the frame exchange.
    SpiBusError,
}

/// Pin type aliases for the co-processor interface.
type SpiPins = (
    hal::gpio::Pin<hal::gpio::bank0::Gpio11, hal::gpio::FunctionSpi, hal::gpio::PullDown>,
    hal::gpio::Pin<hal::gpio::bank0::Gpio12, hal::gpio::FunctionSpi, hal::gpio::PullDown>,
    hal::gpio::Pin<hal::gpio::bank0::Gpio10, hal::gpio::FunctionSpi, hal::gpio::PullDown>,
);

pub type SpiBus = hal::spi::Spi<hal::spi::Enabled, hal::pac::SPI1, SpiPins, 8>;
pub type ReqnPin =
    hal::gpio::Pin<hal::gpio::bank0::Gpio13, hal::gpio::FunctionSioOutput, hal::gpio::PullDown>;
pub type RdynPin =
    hal::gpio::Pin<hal::gpio::bank0::Gpio14, hal::gpio::FunctionSioInput, hal::gpio::PullNone>;

/// RP2350 hardware transport for the ACI handshake protocol.
///
/// The exchange runs as a blocking transfer inside the ready-edge ISR;
/// the IRQ wrapper invokes the driver's completion path right after. A
/// DMA port would start the transfer here and complete from the DMA
/// interrupt instead.
pub struct Rp2350AciBus {
    spi: SpiBus,
    reqn: ReqnPin,
    rdyn: RdynPin,
}

impl Rp2350AciBus {
    /// Create a new transport from hardware peripherals.
    ///
    /// `reqn` must already be configured high (released); `rdyn` must
    /// have its falling-edge interrupt enabled.
    pub fn new(spi: SpiBus, reqn: ReqnPin, rdyn: RdynPin) -> Self {
        Self { spi, reqn, rdyn }
    }
}

impl AciBus for Rp2350AciBus {
    type Error = TransportError;

    fn request_assert(&mut self) {
        self.reqn.set_low().unwrap();
    }

    fn request_release(&mut self) {
        self.reqn.set_high().unwrap();
    }

    fn request_is_asserted(&mut self) -> bool {
        self.reqn.is_set_low().unwrap_or(false)
    }

    fn ready_is_low(&mut self) -> bool {
        self.rdyn.is_low().unwrap_or(false)
    }

    fn ack_ready_irq(&mut self) {
        self.rdyn.clear_interrupt(hal::gpio::Interrupt::EdgeLow);
    }

    fn pend_ready_irq(&mut self) {
        cortex_m::peripheral::NVIC::pend(hal::pac::Interrupt::IO_IRQ_BANK0);
    }

    fn transfer(
        &mut self,
        tx: &[u8; ACI_FRAME_LEN],
        rx: &mut [u8; ACI_FRAME_LEN],
    ) -> Result<(), Self::Error> {
        // The PL022 only shifts MSB-first; the co-processor talks
        // LSB-first, so every byte is reversed on the way through.
        let mut wire_tx = [0u8; ACI_FRAME_LEN];
        for (wire, byte) in wire_tx.iter_mut().zip(tx.iter()) {
            *wire = byte.reverse_bits();
        }

        let mut wire_rx = [0u8; ACI_FRAME_LEN];
        self.spi
            .transfer(&mut wire_rx, &wire_tx)
            .map_err(|_| TransportError::SpiBusError)?;

        for (byte, wire) in rx.iter_mut().zip(wire_rx.iter()) {
            *byte = wire.reverse_bits();
        }
        Ok(())
    }
}
