#![no_std]
//! Platform-agnostic core of the Tessera master firmware: the paint
//! pipeline that paces frames to a radio-attached display cube, and the
//! driver for the external BLE co-processor.
//!
//! Everything here is generic over the trait seams in `tessera-hal`;
//! the host test suite drives both subsystems with mock transports.

pub mod ble;
pub mod cube;
pub mod paint;
pub mod vram;

/// Firmware version word, reported to a connected central through the
/// co-processor's local-data slot. Bytes are major.minor.patch.build.
pub const SYSTEM_VERSION: u32 = 0x0001_0200;
