//! ISR/task SPSC queues for BLE data payloads.

use tessera_hal::BT_DATA_MAX;

/// Queue depth, in frames.
///
/// The radio link tops out near forty frames per second at the best
/// connection interval; eight frames of buffering lets the task loop
/// be a full paint period late without dropping anything.
pub const QUEUE_CAPACITY: usize = 8;

/// One BLE data payload crossing the ISR/task boundary.
#[derive(Clone, Copy)]
pub struct BtFrame {
    pub len: u8,
    pub data: [u8; BT_DATA_MAX],
}

impl BtFrame {
    /// Copy a payload into a frame, truncating past [`BT_DATA_MAX`].
    pub fn from_slice(payload: &[u8]) -> Self {
        let len = payload.len().min(BT_DATA_MAX);
        let mut data = [0u8; BT_DATA_MAX];
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            len: len as u8,
            data,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

/// The inbound (ISR to task) and outbound (task to ISR) queue type.
pub type BtQueue = heapless::spsc::Queue<BtFrame, QUEUE_CAPACITY>;
/// Producer end of a queue.
pub type BtProducer<'a> = heapless::spsc::Producer<'a, BtFrame>;
/// Consumer end of a queue.
pub type BtConsumer<'a> = heapless::spsc::Consumer<'a, BtFrame>;
