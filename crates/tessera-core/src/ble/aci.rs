//! ACI wire framing and the co-processor's datasheet-defined values.
//!
//! One transaction moves a full 32-byte frame in each direction.
//! Outbound: `[length, opcode, payload…]`. Inbound: the bus prepends a
//! bookkeeping byte, so `[debug, length, opcode, payload…]`; the frame
//! is still 32 bytes in each direction.

// --- Outbound frame layout ---

/// Payload byte count + 1 for the opcode; 0 means "nothing to say".
pub const TX_LENGTH: usize = 0;
pub const TX_OPCODE: usize = 1;
pub const TX_PARAM: usize = 2;

// --- Inbound frame layout ---

/// Bus bookkeeping byte reflecting the peer's shift-register behavior.
pub const RX_DEBUG: usize = 0;
pub const RX_LENGTH: usize = 1;
pub const RX_EVENT: usize = 2;
pub const RX_PARAM: usize = 3;

/// Command opcodes.
pub mod op {
    pub const TEST: u8 = 0x01;
    pub const ECHO: u8 = 0x02;
    pub const DTM_COMMAND: u8 = 0x03;
    pub const SLEEP: u8 = 0x04;
    pub const WAKEUP: u8 = 0x05;
    pub const SETUP: u8 = 0x06;
    pub const READ_DYNAMIC_DATA: u8 = 0x07;
    pub const WRITE_DYNAMIC_DATA: u8 = 0x08;
    pub const GET_DEVICE_VERSION: u8 = 0x09;
    pub const GET_DEVICE_ADDRESS: u8 = 0x0A;
    pub const GET_BATTERY_LEVEL: u8 = 0x0B;
    pub const GET_TEMPERATURE: u8 = 0x0C;
    pub const SET_LOCAL_DATA: u8 = 0x0D;
    pub const RADIO_RESET: u8 = 0x0E;
    pub const CONNECT: u8 = 0x0F;
    pub const BOND: u8 = 0x10;
    pub const DISCONNECT: u8 = 0x11;
    pub const SET_TX_POWER: u8 = 0x12;
    pub const CHANGE_TIMING_REQUEST: u8 = 0x13;
    pub const OPEN_REMOTE_PIPE: u8 = 0x14;
    pub const SEND_DATA: u8 = 0x15;
}

/// Event opcodes.
pub mod evt {
    pub const DEVICE_STARTED: u8 = 0x81;
    pub const ECHO: u8 = 0x82;
    pub const HARDWARE_ERROR: u8 = 0x83;
    pub const COMMAND_RESPONSE: u8 = 0x84;
    pub const CONNECTED: u8 = 0x85;
    pub const DISCONNECTED: u8 = 0x86;
    pub const BOND_STATUS: u8 = 0x87;
    pub const PIPE_STATUS: u8 = 0x88;
    pub const TIMING: u8 = 0x89;
    pub const DATA_CREDIT: u8 = 0x8A;
    pub const DATA_ACK: u8 = 0x8B;
    pub const DATA_RECEIVED: u8 = 0x8C;
    pub const PIPE_ERROR: u8 = 0x8D;
}

/// Command response status codes. Anything above
/// `TRANSACTION_COMPLETE` is an error.
pub mod status {
    pub const SUCCESS: u8 = 0x00;
    pub const TRANSACTION_CONTINUE: u8 = 0x01;
    pub const TRANSACTION_COMPLETE: u8 = 0x02;
}

/// Operating modes reported by a DeviceStarted event.
pub mod mode {
    pub const TEST: u8 = 0x01;
    pub const SETUP: u8 = 0x02;
    pub const STANDBY: u8 = 0x03;
}

/// Service pipe numbers from the generated service map. We use the
/// co-processor as a dumb serial pipe, so only these three matter.
pub mod pipe {
    /// Outbound data (our transmit).
    pub const DATA_TX: u8 = 1;
    /// Inbound data, auto-acknowledged over the air.
    pub const DATA_RX_ACK_AUTO: u8 = 2;
    /// Local-data slot holding the firmware version word.
    pub const SYSTEM_VERSION_SET: u8 = 3;
}
