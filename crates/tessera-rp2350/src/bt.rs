//! Upper-layer glue between the BLE driver and the task loop.
//!
//! Runs entirely in interrupt context; the task loop talks to it only
//! through the two SPSC queues.

use tessera_hal::BtHandler;

use crate::queue::{BtConsumer, BtFrame, BtProducer};

/// Dumb byte-pipe protocol handler.
pub struct PipeHandler {
    rx: BtProducer<'static>,
    tx: BtConsumer<'static>,
    dropped: u32,
}

impl PipeHandler {
    pub fn new(rx: BtProducer<'static>, tx: BtConsumer<'static>) -> Self {
        Self {
            rx,
            tx,
            dropped: 0,
        }
    }
}

impl BtHandler for PipeHandler {
    fn on_produce_data(&mut self, buf: &mut [u8]) -> usize {
        match self.tx.dequeue() {
            Some(frame) => {
                let payload = frame.as_slice();
                buf[..payload.len()].copy_from_slice(payload);
                payload.len()
            }
            None => 0,
        }
    }

    fn on_receive_data(&mut self, data: &[u8]) {
        if self.rx.enqueue(BtFrame::from_slice(data)).is_err() {
            // Task side is behind; drop the frame and keep count.
            self.dropped = self.dropped.wrapping_add(1);
            defmt::warn!("bt rx queue full, {=u32} dropped", self.dropped);
        }
    }

    fn on_connect(&mut self) {
        defmt::info!("bt central connected");
    }

    fn on_disconnect(&mut self) {
        defmt::info!("bt central disconnected");
    }

    fn on_phase_complete(&mut self, status: u8, report: u16) {
        defmt::info!("bt factory test: status={=u8} report={=u16:04x}", status, report);
    }
}
