//! Per-cube aggregation: one attached cube's video buffer, paint
//! pipeline, and frame-ack bookkeeping.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tessera_hal::{Ticks, TimeSource, WaitHooks};

use crate::paint::{CubeFeedback, PaintControl};
use crate::vram::VideoBuffer;

/// State for one attached cube. Created at attach, dropped at detach.
///
/// Task context drives the paint entry points; the radio interrupt
/// delivers [`ack_frames`] and [`vram_flushed`].
///
/// [`ack_frames`]: CubeSlot::ack_frames
/// [`vram_flushed`]: CubeSlot::vram_flushed
pub struct CubeSlot {
    paint: PaintControl,
    vbuf: VideoBuffer,
    last_frame_ack: AtomicU8,
    ack_valid: AtomicBool,
    asset_loading: AtomicBool,
}

impl CubeSlot {
    pub const fn new() -> Self {
        Self {
            paint: PaintControl::new(),
            vbuf: VideoBuffer::new(),
            last_frame_ack: AtomicU8::new(0),
            ack_valid: AtomicBool::new(false),
            asset_loading: AtomicBool::new(false),
        }
    }

    pub fn vbuf(&self) -> &VideoBuffer {
        &self.vbuf
    }

    pub fn paint(&self) -> &PaintControl {
        &self.paint
    }

    /// Block until the app may request another frame.
    pub fn wait_for_paint<R: TimeSource + WaitHooks>(&self, rt: &mut R) {
        self.paint.wait_for_paint(rt, &self.vbuf);
    }

    /// Request a frame; call after [`wait_for_paint`].
    ///
    /// [`wait_for_paint`]: CubeSlot::wait_for_paint
    pub fn trigger_paint(&self, now: Ticks) {
        self.paint.trigger_paint(&self.vbuf, self, now);
    }

    /// Drain outstanding rendering and radio work.
    pub fn wait_for_finish<R: TimeSource + WaitHooks>(&self, rt: &mut R) {
        self.paint.wait_for_finish(rt, &self.vbuf, self);
    }

    /// Radio interrupt: the cube acknowledged `count` frames, with
    /// `ack_byte` as its running frame counter.
    pub fn ack_frames(&self, count: i32, ack_byte: u8, now: Ticks) {
        self.last_frame_ack.store(ack_byte, Ordering::Relaxed);
        self.ack_valid.store(true, Ordering::Relaxed);
        self.paint.ack_frames(&self.vbuf, count, now);
    }

    /// Codec callback: the cube's VRAM now matches our local copy.
    pub fn vram_flushed(&self, now: Ticks) {
        self.paint.vram_flushed(&self.vbuf, self, now);
    }

    /// Gate continuous rendering off while assets stream to this cube.
    pub fn set_asset_loading(&self, loading: bool) {
        self.asset_loading.store(loading, Ordering::Relaxed);
    }
}

impl CubeFeedback for CubeSlot {
    fn last_frame_ack(&self) -> u8 {
        self.last_frame_ack.load(Ordering::Relaxed)
    }

    fn has_valid_frame_ack(&self) -> bool {
        self.ack_valid.load(Ordering::Relaxed)
    }

    fn is_asset_loading(&self) -> bool {
        self.asset_loading.load(Ordering::Relaxed)
    }
}

impl Default for CubeSlot {
    fn default() -> Self {
        Self::new()
    }
}
