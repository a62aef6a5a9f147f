// SoftGL
// copyright softgl contributors 2023~2025

//! Software raster engine.
//!
//! A [`RasterContext`] is one independent drawing session bound to a pixel
//! allocation. Init either adopts a caller-supplied allocation (the direct
//! path, rendering straight into a surface's memory) or allocates its own
//! pixel memory for a back buffer. The backing memory is fixed for the
//! context's lifetime.
//!
//! Drawing entry points take the context explicitly. The current-context
//! slot exists for callers that drive the engine through the classic
//! make-current convention; it is thread-local, so each thread has its own
//! slot and two threads never race over one global.
//!
//! Only the 32-bit ARGB channel layout is accepted; the masks are part of
//! the init contract rather than negotiated.

use crate::error::Error;
use crate::surface::PixelBuf;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Channel bit-masks of a pixel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMasks {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
    pub alpha: u32,
}

impl ChannelMasks {
    /// The one layout the engine renders in.
    pub const ARGB8888: ChannelMasks = ChannelMasks {
        red: 0x00FF_0000,
        green: 0x0000_FF00,
        blue: 0x0000_00FF,
        alpha: 0xFF00_0000,
    };
}

thread_local! {
    static CURRENT: Cell<Option<u64>> = Cell::new(None);
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Clear this thread's current-context slot.
pub fn clear_current() {
    CURRENT.with(|c| c.set(None));
}

/// Id of this thread's current context, if any.
pub fn current() -> Option<u64> {
    CURRENT.with(|c| c.get())
}

/// One software drawing session bound to a pixel allocation.
pub struct RasterContext {
    id: u64,
    memory: PixelBuf,
    width: u32,
    height: u32,
    masks: ChannelMasks,
}

impl RasterContext {
    /// Bind a context to `memory`, or to a fresh allocation when `memory`
    /// is `None`. Rejects empty geometry, any depth but 32, any mask
    /// layout but [`ChannelMasks::ARGB8888`], and allocations smaller
    /// than the geometry.
    pub fn init(
        memory: Option<PixelBuf>,
        width: u32,
        height: u32,
        depth: u32,
        masks: ChannelMasks,
    ) -> Result<Self, Error> {
        if width == 0 || height == 0 {
            return Err(Error::InitFailed("zero framebuffer geometry"));
        }
        if depth != 32 {
            return Err(Error::InitFailed("only 32 bits per pixel is supported"));
        }
        if masks != ChannelMasks::ARGB8888 {
            return Err(Error::InitFailed("unsupported channel mask layout"));
        }
        let need = width as usize * height as usize;
        let memory = match memory {
            Some(buf) => {
                if buf.len() < need {
                    return Err(Error::InitFailed("pixel buffer smaller than geometry"));
                }
                buf
            }
            None => PixelBuf::new(need),
        };
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        debug!("raster context {} init {}x{}", id, width, height);
        Ok(Self {
            id,
            memory,
            width,
            height,
            masks,
        })
    }

    /// Handle to the backing allocation; cloning shares, never copies.
    pub fn memory(&self) -> PixelBuf {
        self.memory.clone()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn masks(&self) -> ChannelMasks {
        self.masks
    }

    /// Make this context the thread's current one.
    pub fn make_current(&self) {
        CURRENT.with(|c| c.set(Some(self.id)));
    }

    pub fn is_current(&self) -> bool {
        current() == Some(self.id)
    }

    /// Fill the whole framebuffer with one packed ARGB value.
    pub fn clear(&self, argb: u32) {
        let len = self.width as usize * self.height as usize;
        self.memory.with_mut(|px| px[..len].fill(argb));
    }

    /// Write one pixel; coordinates outside the framebuffer are clipped.
    pub fn put_pixel(&self, x: u32, y: u32, argb: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        self.memory.set((y * self.width + x) as usize, argb);
    }
}

impl Drop for RasterContext {
    fn drop(&mut self) {
        if self.is_current() {
            clear_current();
        }
        debug!("raster context {} freed", self.id);
    }
}
