//! Per-cube video buffer state shared between task and interrupt
//! context.
//!
//! Two flag domains live here. The 32-bit system flag word is the
//! authoritative local state, touched only with atomic bit operations.
//! The 8-bit device flag byte sits inside VRAM and propagates to the
//! cube asynchronously; after a codec flush the two are known to agree
//! and `VBF_FLAG_SYNC` records that.

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

// --- System flag word (local, atomic) ---

/// App requests a frame. Public ABI bit; the low half-word is reserved
/// for public bits, the high half-word for the paint pipeline.
pub const VBF_NEED_PAINT: u32 = 1 << 0;
/// A render is still outstanding on the cube.
pub const VBF_DIRTY_RENDER: u32 = 1 << 16;
/// Our ack bits are known-synchronized with the cube's toggle.
pub const VBF_SYNC_ACK: u32 = 1 << 17;
/// Fire a one-shot render at the next codec flush.
pub const VBF_TRIGGER_ON_FLUSH: u32 = 1 << 18;
/// The cube's copy of the device flag byte matches ours.
pub const VBF_FLAG_SYNC: u32 = 1 << 19;

// --- Device flag byte (inside VRAM, visible to the cube) ---

/// One-shot render trigger, edge-sensitive on the cube.
pub const VF_TOGGLE: u8 = 0x02;
/// Device-side free-running render mode.
pub const VF_CONTINUOUS: u8 = 0x08;

/// Change-map bit covering the VRAM chunk that holds the flag byte.
/// The flag byte lives in the last chunk of the buffer.
pub const CM16_FLAGS: u32 = 1 << 15;

/// One cube's video buffer, as far as the paint pipeline sees it.
///
/// The codec owns the pixel data; the paint pipeline reads `lock` and
/// `cm16` only to decide whether a flush is already on its way.
pub struct VideoBuffer {
    /// System flag word (`VBF_*` bits).
    pub flags: AtomicU32,
    /// Codec lock word: chunks held back from transmission.
    pub lock: AtomicU32,
    /// 16-chunk change map consumed by the radio codec.
    pub cm16: AtomicU32,
    vf: AtomicU8,
}

impl VideoBuffer {
    pub const fn new() -> Self {
        Self {
            flags: AtomicU32::new(0),
            lock: AtomicU32::new(0),
            cm16: AtomicU32::new(0),
            vf: AtomicU8::new(0),
        }
    }

    /// Read the device flag byte.
    pub fn peek_flags(&self) -> u8 {
        self.vf.load(Ordering::Relaxed)
    }

    /// Write the device flag byte and mark its chunk for transmission.
    pub fn poke_flags(&self, vf: u8) {
        self.vf.store(vf, Ordering::Relaxed);
        self.cm16.fetch_or(CM16_FLAGS, Ordering::Relaxed);
    }

    /// Hold the flag chunk back from the codec until [`unlock`].
    ///
    /// Also marks the chunk dirty, so an unlock with no further pokes
    /// still provokes a flush.
    ///
    /// [`unlock`]: VideoBuffer::unlock
    pub fn lock_flags(&self) {
        self.lock.fetch_or(CM16_FLAGS, Ordering::Relaxed);
        self.cm16.fetch_or(CM16_FLAGS, Ordering::Relaxed);
    }

    /// Release every held chunk into the change map.
    pub fn unlock(&self) {
        let held = self.lock.swap(0, Ordering::AcqRel);
        if held != 0 {
            self.cm16.fetch_or(held, Ordering::Relaxed);
        }
    }

    /// True while any `mask` bit is set in the system flag word.
    pub fn flags_test(&self, mask: u32) -> bool {
        self.flags.load(Ordering::Relaxed) & mask != 0
    }

    /// Atomically set `mask` bits in the system flag word.
    pub fn flags_set(&self, mask: u32) {
        self.flags.fetch_or(mask, Ordering::Relaxed);
    }

    /// Atomically clear `mask` bits in the system flag word.
    pub fn flags_clear(&self, mask: u32) {
        self.flags.fetch_and(!mask, Ordering::Relaxed);
    }
}

impl Default for VideoBuffer {
    fn default() -> Self {
        Self::new()
    }
}
