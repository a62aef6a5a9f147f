// SoftGL
// copyright softgl contributors 2023~2025

//! Windowing-layer seam consumed by the GL adapter.
//!
//! A [`Surface`] is a pixel buffer managed by the windowing layer. It can be
//! locked for direct memory access, blitted onto, flipped (presented), and
//! viewed through sub-surfaces that share the parent allocation. Surfaces
//! may expose an internal extension point that lets a plugin override the
//! default flip behavior with a [`FlipHook`]; implementations without that
//! extension point reject hook installation and therefore cannot host a
//! double-buffered GL adapter.
//!
//! [`WindowSystem`] is the root handle surfaces are created from, including
//! creation over preallocated pixel memory (no copy).
//!
//! Pixel storage is one `u32` slot per pixel regardless of format; a
//! format's channel masks describe which bits of the slot are significant.

use crate::engine::ChannelMasks;
use crate::error::SurfaceError;
use crate::util::Rect;
use bitflags::bitflags;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// in-memory windowing backend
pub mod mem;

lazy_static! {
    /// Channel bit-masks per pixel format. The ARGB8888 entry is the layout
    /// the raster engine renders in; the others exist so the windowing
    /// layer can convert during blits.
    static ref FORMAT_MASKS: HashMap<PixelFormat, ChannelMasks> = HashMap::from([
        (PixelFormat::Argb8888, ChannelMasks::ARGB8888),
        (
            PixelFormat::Rgb888,
            ChannelMasks {
                red: 0x00FF_0000,
                green: 0x0000_FF00,
                blue: 0x0000_00FF,
                alpha: 0,
            },
        ),
        (
            PixelFormat::Rgb565,
            ChannelMasks {
                red: 0xF800,
                green: 0x07E0,
                blue: 0x001F,
                alpha: 0,
            },
        ),
    ]);
}

/// Pixel layouts the windowing layer can describe a surface with.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 32 bpp, the layout the raster engine requires
    Argb8888,
    /// 24 significant bits, no alpha
    Rgb888,
    /// 16 significant bits, no alpha
    Rgb565,
}

impl PixelFormat {
    pub fn bits_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Argb8888 => 32,
            PixelFormat::Rgb888 => 24,
            PixelFormat::Rgb565 => 16,
        }
    }

    pub fn masks(self) -> ChannelMasks {
        FORMAT_MASKS[&self]
    }

    /// Split a stored pixel into 8-bit (a, r, g, b) channels.
    pub fn unpack(self, px: u32) -> (u8, u8, u8, u8) {
        let m = self.masks();
        (
            extract(px, m.alpha),
            extract(px, m.red),
            extract(px, m.green),
            extract(px, m.blue),
        )
    }

    /// Pack 8-bit (a, r, g, b) channels into a stored pixel.
    pub fn pack(self, argb: (u8, u8, u8, u8)) -> u32 {
        let m = self.masks();
        insert(argb.0, m.alpha) | insert(argb.1, m.red) | insert(argb.2, m.green) | insert(argb.3, m.blue)
    }
}

// a masked-out channel reads fully set, so formats without alpha stay opaque
fn extract(px: u32, mask: u32) -> u8 {
    if mask == 0 {
        return 0xFF;
    }
    let shift = mask.trailing_zeros();
    let bits = (mask >> shift).count_ones();
    let v = (px & mask) >> shift;
    (v * 255 / ((1u32 << bits) - 1)) as u8
}

fn insert(v: u8, mask: u32) -> u32 {
    if mask == 0 {
        return 0;
    }
    let shift = mask.trailing_zeros();
    let bits = (mask >> shift).count_ones();
    let top = (1u32 << bits) - 1;
    ((v as u32 * top + 127) / 255) << shift
}

/// Shared handle to one pixel allocation. Cloning shares the memory and
/// never copies pixels; the allocation lives as long as any handle does.
#[derive(Debug, Clone)]
pub struct PixelBuf {
    data: Rc<RefCell<Vec<u32>>>,
}

impl PixelBuf {
    pub fn new(len: usize) -> Self {
        Self {
            data: Rc::new(RefCell::new(vec![0; len])),
        }
    }

    pub fn from_pixels(pixels: Vec<u32>) -> Self {
        Self {
            data: Rc::new(RefCell::new(pixels)),
        }
    }

    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, idx: usize) -> u32 {
        self.data.borrow()[idx]
    }

    pub fn set(&self, idx: usize, px: u32) {
        self.data.borrow_mut()[idx] = px;
    }

    pub fn fill(&self, px: u32) {
        self.data.borrow_mut().fill(px);
    }

    pub fn snapshot(&self) -> Vec<u32> {
        self.data.borrow().clone()
    }

    /// Scoped read access to the raw slots.
    pub fn with<R>(&self, f: impl FnOnce(&[u32]) -> R) -> R {
        f(&self.data.borrow())
    }

    /// Scoped write access to the raw slots.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut [u32]) -> R) -> R {
        f(&mut self.data.borrow_mut())
    }

    /// Whether two handles refer to the same allocation.
    pub fn same_alloc(a: &PixelBuf, b: &PixelBuf) -> bool {
        Rc::ptr_eq(&a.data, &b.data)
    }
}

bitflags! {
    /// Access requested when locking a surface for direct memory access.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct LockFlags: u32 {
        const READ  = 0b0000_0001;
        const WRITE = 0b0000_0010;
    }
}

bitflags! {
    /// Presentation behavior of a flip.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct FlipFlags: u32 {
        const WAIT   = 0b0000_0001;
        const ONSYNC = 0b0000_0010;
        /// wait for the vertical retrace, then swap during it
        const WAIT_FOR_SYNC = Self::WAIT.bits() | Self::ONSYNC.bits();
    }
}

/// Description a surface is created from.
#[derive(Clone)]
pub struct SurfaceDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// When set, the surface is built over this allocation instead of
    /// allocating its own storage. The allocation must hold at least
    /// `width * height` slots.
    pub preallocated: Option<PixelBuf>,
}

/// Override installed through a surface's flip extension point. Invoked in
/// place of the surface's default flip; failures propagate to the flip
/// caller.
pub type FlipHook = Box<dyn Fn() -> Result<(), SurfaceError>>;

/// A pixel buffer managed by the windowing layer.
pub trait Surface {
    /// width and height in pixels
    fn size(&self) -> (u32, u32);

    fn pixel_format(&self) -> PixelFormat;

    /// Direct access to the backing pixel memory.
    fn lock(&self, flags: LockFlags) -> Result<PixelBuf, SurfaceError>;

    /// Copy `region` of `src` (its whole view when `None`) to `(dx, dy)`,
    /// converting between pixel formats and clipping to both surfaces.
    fn blit_from(
        &self,
        src: &dyn Surface,
        region: Option<Rect>,
        dx: i32,
        dy: i32,
    ) -> Result<(), SurfaceError>;

    /// Present the surface (`region` or all of it). Routed through the
    /// installed flip hook when one is present.
    fn flip(&self, region: Option<Rect>, flags: FlipFlags) -> Result<(), SurfaceError>;

    /// A view sharing this surface's allocation; the whole surface when
    /// `region` is `None`. Sub-surfaces never inherit the flip hook.
    fn sub_surface(&self, region: Option<Rect>) -> Result<Rc<dyn Surface>, SurfaceError>;

    /// Install a flip override through the surface's internal extension
    /// point. Implementations without the extension point refuse.
    fn install_flip_hook(&self, hook: FlipHook) -> Result<(), SurfaceError> {
        let _ = hook;
        Err(SurfaceError::NoExtensionPoint)
    }

    fn remove_flip_hook(&self) {}

    fn has_flip_hook(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}

/// Root handle of a windowing layer, used to create surfaces.
pub trait WindowSystem {
    fn create_surface(&self, desc: &SurfaceDesc) -> Result<Rc<dyn Surface>, SurfaceError>;
}
