//! Frame-pacing coordinator between the app and one display cube.
//!
//! Rendering is usually asynchronous: the app stamps `VBF_NEED_PAINT`,
//! `trigger_paint` arms a one-shot toggle for the next codec flush, and
//! the cube's frame acks close the loop. When the app outruns the ack
//! stream the pipeline capitulates into continuous mode and lets the
//! cube render on its own clock; ample hysteresis (`FP_MIN`) keeps it
//! from oscillating back too eagerly.

use core::sync::atomic::{fence, AtomicI32, AtomicU32, Ordering};

use tessera_hal::{hz_ticks, ticks_since, Ticks, TimeSource, WaitHooks};

use crate::vram::{
    VideoBuffer, VBF_DIRTY_RENDER, VBF_FLAG_SYNC, VBF_NEED_PAINT, VBF_SYNC_ACK,
    VBF_TRIGGER_ON_FLUSH, VF_CONTINUOUS, VF_TOGGLE,
};

/// Watchdog rate: give up waiting for a frame after this long, so a
/// dead cube cannot wedge the app.
const FPS_LOW: Ticks = hz_ticks(4);
/// Global frame-rate ceiling; paint always blocks until at least this
/// long since the previous frame.
const FPS_HIGH: Ticks = hz_ticks(60);
/// Most pending frames tracked before paint blocks (or goes
/// continuous).
const FP_MAX: i32 = 5;
/// Fewest pending frames tracked; below this, acks are ignored and
/// continuous mode ends.
const FP_MIN: i32 = -8;

/// Cube-side state the paint pipeline consults.
pub trait CubeFeedback {
    /// Frame-count byte from the cube's most recent acknowledgment.
    fn last_frame_ack(&self) -> u8;

    /// True once a coherent ack has been seen since attach.
    fn has_valid_frame_ack(&self) -> bool;

    /// True while an asset install is streaming to this cube.
    fn is_asset_loading(&self) -> bool;
}

/// Paint pipeline state for one cube.
///
/// Task context calls [`wait_for_paint`], [`trigger_paint`] and
/// [`wait_for_finish`]; the radio interrupt calls [`ack_frames`] and
/// [`vram_flushed`]. All fields are single atomic words, so no method
/// needs more than `&self`.
///
/// [`wait_for_paint`]: PaintControl::wait_for_paint
/// [`trigger_paint`]: PaintControl::trigger_paint
/// [`wait_for_finish`]: PaintControl::wait_for_finish
/// [`ack_frames`]: PaintControl::ack_frames
/// [`vram_flushed`]: PaintControl::vram_flushed
pub struct PaintControl {
    /// Time of the most recent paint request.
    paint_timestamp: AtomicU32,
    /// Time of the most recent asynchronous trigger.
    async_timestamp: AtomicU32,
    /// How far the app has run ahead of the cube's acks.
    pending_frames: AtomicI32,
}

impl PaintControl {
    pub const fn new() -> Self {
        Self {
            paint_timestamp: AtomicU32::new(0),
            async_timestamp: AtomicU32::new(0),
            pending_frames: AtomicI32::new(0),
        }
    }

    /// Current pending-frame count. Transiently below `FP_MIN` between
    /// an ack burst and the next trigger's lazy clamp.
    pub fn pending_frames(&self) -> i32 {
        self.pending_frames.load(Ordering::Relaxed)
    }

    /// Block until the app may request another frame.
    ///
    /// Not nearly as strict as [`wait_for_finish`]: it enforces the
    /// frame-rate ceiling and backpressure from pending renders, with
    /// the `FPS_LOW` watchdog as an escape hatch.
    ///
    /// [`wait_for_finish`]: PaintControl::wait_for_finish
    pub fn wait_for_paint<R>(&self, rt: &mut R, vbuf: &VideoBuffer)
    where
        R: TimeSource + WaitHooks,
    {
        let mut now;
        loop {
            fence(Ordering::SeqCst);
            now = rt.ticks();
            let since_paint = ticks_since(now, self.paint_timestamp.load(Ordering::Relaxed));

            // Watchdog expired? Give up waiting.
            if since_paint > FPS_LOW {
                break;
            }

            // Wait for the frame-rate ceiling AND for pending renders.
            if since_paint > FPS_HIGH && self.pending_frames.load(Ordering::Relaxed) <= FP_MAX {
                break;
            }

            rt.work();
            rt.halt_radio();
        }

        // Enough idle time may have passed to regain synchronicity here.
        if self.can_make_synchronous(vbuf, now) {
            self.make_synchronous(vbuf);
        }
    }

    /// Request a frame; call after [`wait_for_paint`].
    ///
    /// `paint_timestamp` is updated even when this is a no-op, so an
    /// idle app tight-looping paint still iterates at `FPS_HIGH`.
    ///
    /// [`wait_for_paint`]: PaintControl::wait_for_paint
    pub fn trigger_paint<C: CubeFeedback>(&self, vbuf: &VideoBuffer, cube: &C, now: Ticks) {
        self.paint_timestamp.store(now, Ordering::Relaxed);

        let pending = self.pending_frames.load(Ordering::Relaxed);
        let mut new_pending = pending;

        let need_paint =
            vbuf.flags.fetch_and(!VBF_NEED_PAINT, Ordering::Relaxed) & VBF_NEED_PAINT != 0;

        // The interrupt side decrements without clamping; restore the
        // floor lazily here rather than from the ISR.
        if pending < FP_MIN {
            new_pending = FP_MIN;
        }

        if need_paint {
            new_pending += 1;

            // The usual way into continuous mode is a TRIGGER_ON_FLUSH
            // that finds us out of sync. But if the app pumps VRAM
            // faster than the radio can drain it, flushes become rare,
            // so also enter when frames stack up here.
            if new_pending >= FP_MAX && self.allow_continuous(cube) {
                let mut vf = vbuf.peek_flags();
                if vf & VF_CONTINUOUS == 0 {
                    self.enter_continuous(vbuf, cube, &mut vf);
                    vbuf.poke_flags(vf);
                }
                new_pending = FP_MAX;
            }

            if !is_continuous(vbuf) {
                // Trigger on the next flush.
                self.async_timestamp.store(now, Ordering::Relaxed);
                vbuf.flags_set(VBF_TRIGGER_ON_FLUSH);

                // Provoke a flush, in case one wasn't coming anyway.
                if vbuf.lock.load(Ordering::Relaxed) == 0 {
                    vbuf.lock_flags();
                }
            }

            // Unleash the radio codec.
            vbuf.unlock();
        }

        self.pending_frames
            .fetch_add(new_pending - pending, Ordering::Relaxed);
    }

    /// Drain all outstanding work: disable continuous rendering, then
    /// wait until nothing is left to trigger or render. Does not
    /// enforce any minimum frame rate; returns immediately when idle.
    pub fn wait_for_finish<R, C>(&self, rt: &mut R, vbuf: &VideoBuffer, cube: &C)
    where
        R: TimeSource + WaitHooks,
        C: CubeFeedback,
    {
        let mut vf = vbuf.peek_flags();
        self.exit_continuous(&mut vf, rt.ticks());
        vbuf.poke_flags(vf);

        const MASK: u32 = VBF_TRIGGER_ON_FLUSH | VBF_DIRTY_RENDER;

        loop {
            let flags = vbuf.flags.load(Ordering::Relaxed);
            let now = rt.ticks();

            // Already done, without any arm-twisting?
            if flags & MASK == 0 {
                break;
            }

            // Has it been a while since the last trigger?
            if self.can_make_synchronous(vbuf, now) {
                self.make_synchronous(vbuf);

                if flags & VBF_DIRTY_RENDER != 0 {
                    // Still need a render; re-trigger now.
                    vbuf.flags_set(VBF_NEED_PAINT);
                    self.trigger_paint(vbuf, cube, now);
                } else {
                    // The trigger expired and nothing needs rendering.
                    vbuf.flags_clear(VBF_TRIGGER_ON_FLUSH);
                    break;
                }
            }

            rt.work();
            rt.halt_radio();
        }
    }

    /// One or more frames finished rendering on the cube.
    ///
    /// Interrupt context. The decrement is not clamped here; the next
    /// trigger restores the floor.
    pub fn ack_frames(&self, vbuf: &VideoBuffer, count: i32, now: Ticks) {
        self.pending_frames.fetch_sub(count, Ordering::Relaxed);

        // Outside continuous mode, a sync'ed ack means the frame we
        // triggered has finished rendering.
        if vbuf.peek_flags() & VF_CONTINUOUS == 0 && vbuf.flags_test(VBF_SYNC_ACK) {
            vbuf.flags_clear(VBF_DIRTY_RENDER);
        }

        // Too few pending frames? Disable continuous mode.
        if self.pending_frames.load(Ordering::Relaxed) < FP_MIN {
            let mut vf = vbuf.peek_flags();
            self.exit_continuous(&mut vf, now);
            vbuf.poke_flags(vf);
        }
    }

    /// The codec finished flushing VRAM; the cube's copy now matches
    /// ours. Honors a pending `VBF_TRIGGER_ON_FLUSH`: a one-shot toggle
    /// when sync'ed, continuous mode when not (speed over
    /// synchronization).
    pub fn vram_flushed<C: CubeFeedback>(&self, vbuf: &VideoBuffer, cube: &C, now: Ticks) {
        let mut vf = vbuf.peek_flags();

        // Flags are sync'ed from now on.
        vbuf.flags_set(VBF_FLAG_SYNC);

        if vbuf.flags_test(VBF_TRIGGER_ON_FLUSH) {
            if cube.has_valid_frame_ack() && vbuf.flags_test(VBF_SYNC_ACK) {
                // Sync'ed up; trigger a one-shot render.
                debug_assert!(vf & VF_CONTINUOUS == 0);
                self.set_toggle(cube, &mut vf, now);
            } else if vf & VF_CONTINUOUS == 0 {
                // We'd like to trigger but we're no longer in sync.
                // Enter continuous mode and keep our speed up.
                self.enter_continuous(vbuf, cube, &mut vf);
            }
            vbuf.poke_flags(vf);

            vbuf.flags_set(VBF_DIRTY_RENDER);
            vbuf.flags_clear(VBF_TRIGGER_ON_FLUSH);
        }
    }

    fn allow_continuous<C: CubeFeedback>(&self, cube: &C) -> bool {
        // Conserve cube CPU time during asset loading.
        !cube.is_asset_loading()
    }

    fn enter_continuous<C: CubeFeedback>(&self, vbuf: &VideoBuffer, cube: &C, vf: &mut u8) {
        // All synchronization goes out the window.
        vbuf.flags_clear(VBF_SYNC_ACK);
        vbuf.flags_set(VBF_DIRTY_RENDER);

        if self.allow_continuous(cube) {
            *vf |= VF_CONTINUOUS;
        } else {
            // Can't render synchronously, can't go continuous either.
            // Flip the toggle and hope the cube catches the edge.
            *vf &= !VF_CONTINUOUS;
            *vf ^= VF_TOGGLE;
        }
    }

    fn exit_continuous(&self, vf: &mut u8, timestamp: Ticks) {
        // Leaving continuous mode counts as the last trigger point.
        if *vf & VF_CONTINUOUS != 0 {
            *vf &= !VF_CONTINUOUS;
            self.async_timestamp.store(timestamp, Ordering::Relaxed);
        }
    }

    fn set_toggle<C: CubeFeedback>(&self, cube: &C, vf: &mut u8, timestamp: Ticks) {
        self.async_timestamp.store(timestamp, Ordering::Relaxed);
        if cube.last_frame_ack() & 1 != 0 {
            *vf &= !VF_TOGGLE;
        } else {
            *vf |= VF_TOGGLE;
        }
    }

    fn make_synchronous(&self, vbuf: &VideoBuffer) {
        self.pending_frames.store(0, Ordering::Relaxed);

        // SYNC_ACK is only safe once the cube's flag byte is known to
        // match ours, which any flush establishes.
        if vbuf.flags_test(VBF_FLAG_SYNC) {
            vbuf.flags_set(VBF_SYNC_ACK);
        }
    }

    fn can_make_synchronous(&self, vbuf: &VideoBuffer, now: Ticks) -> bool {
        !is_continuous(vbuf)
            && ticks_since(now, self.async_timestamp.load(Ordering::Relaxed)) > FPS_LOW
    }
}

impl Default for PaintControl {
    fn default() -> Self {
        Self::new()
    }
}

fn is_continuous(vbuf: &VideoBuffer) -> bool {
    vbuf.peek_flags() & VF_CONTINUOUS != 0
}
