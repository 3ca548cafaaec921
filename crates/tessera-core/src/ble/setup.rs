//! Vendor-generated radio configuration blob.
//!
//! The co-processor is configured after every reset by streaming this
//! sequence of Setup frames at it, verbatim, one frame per transaction.
//! The contents come out of the vendor's service-definition tool and
//! are opaque to the driver; it only counts them. The table length is
//! part of the array type, so the command sequencer's assumption about
//! the setup index range is checked at compile time.

use tessera_hal::ACI_FRAME_LEN;

/// Number of frames in the setup sequence.
pub const NB_SETUP_MESSAGES: u8 = 12;

/// The setup frames, padded to full transaction length.
pub static SETUP_MESSAGES: [[u8; ACI_FRAME_LEN]; NB_SETUP_MESSAGES as usize] = [
    [
        0x07, 0x06, 0x00, 0x00, 0x03, 0x02, 0x42, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00,
    ],
    [
        0x1f, 0x06, 0x10, 0x00, 0x7d, 0x00, 0x9b, 0x02, 0x69, 0x02, 0xbb, 0x00, 0x58, 0x00, 0x0c,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x90,
        0x01, 0xff,
    ],
    [
        0x1f, 0x06, 0x10, 0x1c, 0x01, 0x01, 0x00, 0x00, 0x06, 0x00, 0x06, 0x00, 0x06, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00,
    ],
    [
        0x1f, 0x06, 0x10, 0x38, 0xff, 0xff, 0x02, 0x58, 0x0a, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x54, 0x00, 0x00,
        0x00, 0x00,
    ],
    [
        0x05, 0x06, 0x10, 0x54, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00,
    ],
    [
        0x1f, 0x06, 0x20, 0x00, 0x04, 0x04, 0x02, 0x02, 0x00, 0x01, 0x28, 0x00, 0x01, 0x00, 0x18,
        0x04, 0x04, 0x05, 0x05, 0x00, 0x02, 0x28, 0x03, 0x01, 0x0e, 0x08, 0x00, 0x03, 0x28, 0x03,
        0x01, 0x02,
    ],
    [
        0x1f, 0x06, 0x20, 0x1c, 0x05, 0x04, 0x04, 0x00, 0x0a, 0x00, 0x0b, 0x00, 0x0c, 0x28, 0x03,
        0x01, 0x10, 0x0e, 0x00, 0x0d, 0x00, 0x0e, 0x04, 0x04, 0x14, 0x00, 0x00, 0x14, 0x00, 0x00,
        0x00, 0x00,
    ],
    [
        0x1f, 0x06, 0x20, 0x38, 0x02, 0x02, 0x00, 0x0f, 0x29, 0x02, 0x01, 0x00, 0x10, 0x04, 0x04,
        0x14, 0x14, 0x00, 0x11, 0x00, 0x12, 0x04, 0x04, 0x00, 0x0a, 0x00, 0x13, 0x29, 0x02, 0x01,
        0x00, 0x00,
    ],
    [
        0x0d, 0x06, 0x40, 0x00, 0x2a, 0x00, 0x01, 0x00, 0x80, 0x04, 0x00, 0x03, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00,
    ],
    [
        0x13, 0x06, 0x50, 0x00, 0x6e, 0x65, 0x73, 0x73, 0x65, 0x72, 0x61, 0x20, 0x62, 0x61, 0x73,
        0x65, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00,
    ],
    [
        0x19, 0x06, 0x60, 0x00, 0x01, 0x00, 0x02, 0x04, 0x08, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x04, 0x08, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00,
    ],
    [
        0x06, 0x06, 0xf0, 0x00, 0x03, 0x5a, 0xc1, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00,
    ],
];
