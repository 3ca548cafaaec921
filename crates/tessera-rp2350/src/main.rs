//! Tessera master firmware for the RP2350 main board.
//!
//! Task context: cooperative main loop driving the paint pipeline and
//! draining the BLE receive queue. Interrupt context: the RDYN edge
//! handler running ACI transactions against the BLE co-processor.

#![no_std]
#![no_main]

mod bt;
mod queue;
mod transport;

use defmt_rtt as _;
use panic_probe as _;
use rp235x_hal as hal;

use core::cell::RefCell;
use core::sync::atomic::Ordering;

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::MODE_0;
use hal::clocks::Clock;
use hal::fugit::RateExtU32;
use hal::pac::interrupt;
use hal::sio::Sio;

use tessera_core::ble::Nrf8001;
use tessera_core::cube::CubeSlot;
use tessera_core::vram::VBF_NEED_PAINT;
use tessera_hal::{Ticks, TimeSource, WaitHooks};

use bt::PipeHandler;
use queue::{BtConsumer, BtProducer, BtQueue};
use transport::Rp2350AciBus;

/// Boot ROM image definition for Cortex-M33 secure mode.
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: hal::block::ImageDef = hal::block::ImageDef::secure_exe();

/// External crystal frequency (Pico 2 standard).
const XTAL_FREQ_HZ: u32 = 12_000_000;

/// Frames between paint heartbeat log lines.
const PAINT_LOG_INTERVAL: u32 = 240;

struct BleStack {
    drv: Nrf8001<Rp2350AciBus>,
    handler: PipeHandler,
}

/// BLE driver singleton, shared with the RDYN edge interrupt.
static BLE: Mutex<RefCell<Option<BleStack>>> = Mutex::new(RefCell::new(None));

/// The demo cube attached at boot.
static DEMO_CUBE: CubeSlot = CubeSlot::new();

/// Statically allocated BLE payload queues.
/// Safety: each is split exactly once at startup; each end is then
/// owned by a single context (ISR or task). heapless SPSC uses atomic
/// head/tail pointers for the shared indices.
static mut BT_RX_QUEUE: BtQueue = BtQueue::new();
static mut BT_TX_QUEUE: BtQueue = BtQueue::new();

/// Task-side runtime: clock plus the wait-loop hooks.
struct TaskRuntime {
    timer: hal::Timer<hal::timer::CopyableTimer0>,
    rx: BtConsumer<'static>,
    tx: BtProducer<'static>,
}

impl TimeSource for TaskRuntime {
    fn ticks(&self) -> Ticks {
        (self.timer.get_counter().ticks() / 1_000) as Ticks
    }
}

impl WaitHooks for TaskRuntime {
    fn work(&mut self) {
        // Drain the BLE receive queue; loop every payload straight
        // back out (the host-side protocol is an echo for now).
        while let Some(frame) = self.rx.dequeue() {
            defmt::trace!("bt rx {=u8} bytes", frame.len);
            if self.tx.enqueue(frame).is_ok() {
                ble_request_transaction();
            }
        }
    }

    fn halt_radio(&mut self) {
        cortex_m::asm::wfi();
    }
}

/// Pump the BLE driver from task context.
fn ble_request_transaction() {
    critical_section::with(|cs| {
        if let Some(stack) = BLE.borrow_ref_mut(cs).as_mut() {
            stack.drv.request_transaction();
        }
    });
}

#[hal::entry]
fn main() -> ! {
    defmt::info!("tessera-rp2350: starting");

    let mut pac = hal::pac::Peripherals::take().unwrap();
    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);

    // Initialize clocks from the 12 MHz crystal.
    let clocks = hal::clocks::init_clocks_and_plls(
        XTAL_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .unwrap();

    let sio = Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let mut timer = hal::Timer::new_timer0(pac.TIMER0, &mut pac.RESETS, &clocks);

    // --- SPI1 for the BLE co-processor (3 MHz ceiling per datasheet) ---
    let spi_sclk = pins.gpio10.into_function::<hal::gpio::FunctionSpi>();
    let spi_mosi = pins.gpio11.into_function::<hal::gpio::FunctionSpi>();
    let spi_miso = pins.gpio12.into_function::<hal::gpio::FunctionSpi>();

    let spi_bus = hal::spi::Spi::<_, _, _, 8>::new(pac.SPI1, (spi_mosi, spi_miso, spi_sclk));
    let spi_bus = spi_bus.init(
        &mut pac.RESETS,
        clocks.peripheral_clock.freq(),
        3.MHz(),
        MODE_0,
    );

    // Request line: output, released (high) until the driver asks.
    let mut reqn = pins.gpio13.into_push_pull_output();
    reqn.set_high().unwrap();

    // Ready line: floating input with a falling-edge interrupt.
    let rdyn = pins.gpio14.into_floating_input();
    rdyn.set_interrupt_enabled(hal::gpio::Interrupt::EdgeLow, true);

    // RDYN is not valid until 62 ms after the co-processor resets.
    timer.delay_ms(80);

    // --- Split the payload queues ---
    // Safety: called exactly once, before the IRQ that uses the other
    // ends is unmasked.
    let (rx_prod, rx_cons) = unsafe { BT_RX_QUEUE.split() };
    let (tx_prod, tx_cons) = unsafe { BT_TX_QUEUE.split() };

    let bus = Rp2350AciBus::new(spi_bus, reqn, rdyn);
    let stack = BleStack {
        drv: Nrf8001::new(bus),
        handler: PipeHandler::new(rx_prod, tx_cons),
    };

    critical_section::with(|cs| {
        BLE.borrow_ref_mut(cs).replace(stack);
    });

    // Unmask the ready-edge vector, then start the driver. init() pends
    // the vector by hand to cover a peer that went ready before the
    // edge interrupt was armed.
    unsafe { cortex_m::peripheral::NVIC::unmask(hal::pac::Interrupt::IO_IRQ_BANK0) };
    critical_section::with(|cs| {
        if let Some(stack) = BLE.borrow_ref_mut(cs).as_mut() {
            stack.drv.init();
        }
    });

    defmt::info!("BLE co-processor setup started, entering paint loop");

    let mut rt = TaskRuntime {
        timer,
        rx: rx_cons,
        tx: tx_prod,
    };

    let mut frames: u32 = 0;

    // --- Task main loop ---
    loop {
        DEMO_CUBE.wait_for_paint(&mut rt);

        let now = rt.ticks();
        DEMO_CUBE.vbuf().flags_set(VBF_NEED_PAINT);
        DEMO_CUBE.trigger_paint(now);

        // TODO: drive vram_flushed from the radio codec's flush-complete
        // path once cube streaming lands. Until then the flush is
        // looped back inline so the pipeline keeps its cadence.
        if DEMO_CUBE.vbuf().cm16.swap(0, Ordering::Relaxed) != 0 {
            DEMO_CUBE.vram_flushed(rt.ticks());
        }

        frames += 1;
        if frames % PAINT_LOG_INTERVAL == 0 {
            defmt::info!(
                "paint: frame={=u32} pending={=i32}",
                frames,
                DEMO_CUBE.paint().pending_frames()
            );
        }
    }
}

/// RDYN falling edge: run one ACI transaction. The exchange itself is
/// a blocking SPI transfer, so the completion path runs right here; a
/// DMA port would move it to the DMA interrupt.
#[interrupt]
fn IO_IRQ_BANK0() {
    critical_section::with(|cs| {
        let mut ble = BLE.borrow_ref_mut(cs);
        if let Some(stack) = ble.as_mut() {
            match stack.drv.on_ready_irq(&mut stack.handler) {
                Ok(true) => stack.drv.on_transfer_complete(&mut stack.handler),
                Ok(false) => {}
                Err(e) => defmt::warn!("ACI transfer failed: {}", e),
            }
        }
    });
}

/// Program metadata for `picotool info`.
#[link_section = ".bi_entries"]
#[used]
pub static PICOTOOL_ENTRIES: [hal::binary_info::EntryAddr; 4] = [
    hal::binary_info::rp_cargo_bin_name!(),
    hal::binary_info::rp_cargo_version!(),
    hal::binary_info::rp_program_description!(c"Tessera master firmware"),
    hal::binary_info::rp_program_build_attribute!(),
];
