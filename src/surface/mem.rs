// SoftGL
// copyright softgl contributors 2023~2025

//! In-memory windowing backend.
//!
//! [`MemSurface`] keeps one `u32` slot per pixel in a shared allocation.
//! Sub-surfaces are offset views over the parent allocation and keep the
//! parent alive. Presentation is modeled observably: a flip copies the
//! flipped region into a "presented" snapshot shared by all views of the
//! allocation and counts sync-waiting flips, so tests and embedders can
//! check exactly what reached the display and how.
//!
//! A surface with an installed flip hook routes `flip` through the hook
//! instead of presenting itself; sub-surfaces never inherit the hook. The
//! hook must not re-enter its own surface's flip.

use crate::error::SurfaceError;
use crate::surface::{
    FlipFlags, FlipHook, LockFlags, PixelBuf, PixelFormat, Surface, SurfaceDesc, WindowSystem,
};
use crate::util::Rect;
use log::{debug, info};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Root handle of the in-memory windowing layer.
#[derive(Debug, Default)]
pub struct MemWindowSystem;

impl MemWindowSystem {
    pub fn new() -> Self {
        Self
    }
}

impl WindowSystem for MemWindowSystem {
    fn create_surface(&self, desc: &SurfaceDesc) -> Result<Rc<dyn Surface>, SurfaceError> {
        Ok(MemSurface::create(desc)?)
    }
}

// presented snapshot and flip counters, shared by all views of one allocation
struct Presented {
    pixels: RefCell<Vec<u32>>,
    flips: Cell<u32>,
    sync_waits: Cell<u32>,
}

pub struct MemSurface {
    me: Weak<MemSurface>,
    // sub-surfaces hold a reference on their parent
    _parent: Option<Rc<dyn Surface>>,
    // view origin within the allocation
    ox: u32,
    oy: u32,
    w: u32,
    h: u32,
    // allocation row length in pixels
    pitch: u32,
    format: PixelFormat,
    pixels: PixelBuf,
    shared: Rc<Presented>,
    hook: RefCell<Option<FlipHook>>,
}

impl std::fmt::Debug for MemSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemSurface")
            .field("ox", &self.ox)
            .field("oy", &self.oy)
            .field("w", &self.w)
            .field("h", &self.h)
            .field("pitch", &self.pitch)
            .field("format", &self.format)
            .finish()
    }
}

impl MemSurface {
    pub fn create(desc: &SurfaceDesc) -> Result<Rc<Self>, SurfaceError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(SurfaceError::OutOfBounds);
        }
        let need = desc.width as usize * desc.height as usize;
        let pixels = match &desc.preallocated {
            Some(buf) => {
                if buf.len() < need {
                    return Err(SurfaceError::SizeMismatch {
                        need,
                        got: buf.len(),
                    });
                }
                buf.clone()
            }
            None => PixelBuf::new(need),
        };
        let plen = pixels.len();
        debug!(
            "mem surface {}x{} {:?} prealloc={}",
            desc.width,
            desc.height,
            desc.format,
            desc.preallocated.is_some()
        );
        Ok(Rc::new_cyclic(|me| Self {
            me: me.clone(),
            _parent: None,
            ox: 0,
            oy: 0,
            w: desc.width,
            h: desc.height,
            pitch: desc.width,
            format: desc.format,
            pixels,
            shared: Rc::new(Presented {
                pixels: RefCell::new(vec![0; plen]),
                flips: Cell::new(0),
                sync_waits: Cell::new(0),
            }),
            hook: RefCell::new(None),
        }))
    }

    /// Snapshot of what reached the display, allocation-sized.
    pub fn presented(&self) -> Vec<u32> {
        self.shared.pixels.borrow().clone()
    }

    /// Flips performed on this allocation (through any view).
    pub fn flips(&self) -> u32 {
        self.shared.flips.get()
    }

    /// Flips that waited for vertical sync.
    pub fn sync_waits(&self) -> u32 {
        self.shared.sync_waits.get()
    }

    /// View origin within the allocation.
    pub fn origin(&self) -> (u32, u32) {
        (self.ox, self.oy)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        ((self.oy + y) * self.pitch + self.ox + x) as usize
    }

    fn view_rect(&self) -> Rect {
        Rect::new(0, 0, self.w, self.h)
    }
}

impl Surface for MemSurface {
    fn size(&self) -> (u32, u32) {
        (self.w, self.h)
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn lock(&self, _flags: LockFlags) -> Result<PixelBuf, SurfaceError> {
        Ok(self.pixels.clone())
    }

    fn blit_from(
        &self,
        src: &dyn Surface,
        region: Option<Rect>,
        dx: i32,
        dy: i32,
    ) -> Result<(), SurfaceError> {
        let src = src
            .as_any()
            .downcast_ref::<MemSurface>()
            .ok_or(SurfaceError::Incompatible)?;
        let sr = region
            .unwrap_or(src.view_rect())
            .intersection(src.view_rect());
        if sr.is_empty() {
            info!("mem blit: source region outside {:?}", src.view_rect());
            return Err(SurfaceError::OutOfBounds);
        }
        let dr = Rect::new(dx, dy, sr.w, sr.h).intersection(self.view_rect());
        if dr.is_empty() {
            info!("mem blit: dest region outside {:?}", self.view_rect());
            return Err(SurfaceError::OutOfBounds);
        }
        // source start shifted by however much the dest clip moved
        let sx = (sr.x + dr.x - dx) as u32;
        let sy = (sr.y + dr.y - dy) as u32;
        let convert = src.format != self.format;
        for j in 0..dr.h {
            for i in 0..dr.w {
                let spx = src.pixels.get(src.index(sx + i, sy + j));
                let px = if convert {
                    self.format.pack(src.format.unpack(spx))
                } else {
                    spx
                };
                self.pixels.set(self.index(dr.x as u32 + i, dr.y as u32 + j), px);
            }
        }
        Ok(())
    }

    fn flip(&self, region: Option<Rect>, flags: FlipFlags) -> Result<(), SurfaceError> {
        let hook = self.hook.borrow();
        if let Some(f) = hook.as_ref() {
            return f();
        }
        drop(hook);

        let r = region
            .map_or(self.view_rect(), |r| r.intersection(self.view_rect()));
        if r.is_empty() {
            return Err(SurfaceError::OutOfBounds);
        }
        {
            let mut shown = self.shared.pixels.borrow_mut();
            self.pixels.with(|px| {
                for j in 0..r.h {
                    for i in 0..r.w {
                        let idx = self.index(r.x as u32 + i, r.y as u32 + j);
                        shown[idx] = px[idx];
                    }
                }
            });
        }
        self.shared.flips.set(self.shared.flips.get() + 1);
        if flags.intersects(FlipFlags::WAIT_FOR_SYNC) {
            self.shared.sync_waits.set(self.shared.sync_waits.get() + 1);
        }
        Ok(())
    }

    fn sub_surface(&self, region: Option<Rect>) -> Result<Rc<dyn Surface>, SurfaceError> {
        let r = region
            .map_or(self.view_rect(), |r| r.intersection(self.view_rect()));
        if r.is_empty() {
            return Err(SurfaceError::OutOfBounds);
        }
        let parent: Rc<dyn Surface> = self.me.upgrade().ok_or(SurfaceError::Destroyed)?;
        Ok(Rc::new_cyclic(|me| MemSurface {
            me: me.clone(),
            _parent: Some(parent),
            ox: self.ox + r.x as u32,
            oy: self.oy + r.y as u32,
            w: r.w,
            h: r.h,
            pitch: self.pitch,
            format: self.format,
            pixels: self.pixels.clone(),
            shared: self.shared.clone(),
            hook: RefCell::new(None),
        }))
    }

    fn install_flip_hook(&self, hook: FlipHook) -> Result<(), SurfaceError> {
        *self.hook.borrow_mut() = Some(hook);
        Ok(())
    }

    fn remove_flip_hook(&self) {
        *self.hook.borrow_mut() = None;
    }

    fn has_flip_hook(&self) -> bool {
        self.hook.borrow().is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(w: u32, h: u32, format: PixelFormat) -> SurfaceDesc {
        SurfaceDesc {
            width: w,
            height: h,
            format,
            preallocated: None,
        }
    }

    #[test]
    fn lock_exposes_the_backing_allocation() {
        let s = MemSurface::create(&desc(4, 4, PixelFormat::Argb8888)).unwrap();
        let a = s.lock(LockFlags::WRITE).unwrap();
        let b = s.lock(LockFlags::READ).unwrap();
        assert!(PixelBuf::same_alloc(&a, &b));
        a.set(0, 0x11223344);
        assert_eq!(b.get(0), 0x11223344);
    }

    #[test]
    fn preallocated_surface_wraps_without_copying() {
        let buf = PixelBuf::new(16);
        buf.set(5, 0xCAFE);
        let s = MemSurface::create(&SurfaceDesc {
            width: 4,
            height: 4,
            format: PixelFormat::Argb8888,
            preallocated: Some(buf.clone()),
        })
        .unwrap();
        let locked = s.lock(LockFlags::READ).unwrap();
        assert!(PixelBuf::same_alloc(&buf, &locked));
        assert_eq!(locked.get(5), 0xCAFE);
    }

    #[test]
    fn short_preallocation_is_rejected() {
        let err = MemSurface::create(&SurfaceDesc {
            width: 4,
            height: 4,
            format: PixelFormat::Argb8888,
            preallocated: Some(PixelBuf::new(8)),
        })
        .unwrap_err();
        assert_eq!(err, SurfaceError::SizeMismatch { need: 16, got: 8 });
    }

    #[test]
    fn sub_surface_is_an_offset_view_sharing_memory() {
        let s = MemSurface::create(&desc(4, 4, PixelFormat::Argb8888)).unwrap();
        let px = s.lock(LockFlags::WRITE).unwrap();
        px.set((1 * 4 + 1) as usize, 0xAA);
        let sub = s.sub_surface(Some(Rect::new(1, 1, 2, 2))).unwrap();
        assert_eq!(sub.size(), (2, 2));
        assert!(PixelBuf::same_alloc(&px, &sub.lock(LockFlags::READ).unwrap()));

        let dst = MemSurface::create(&desc(2, 2, PixelFormat::Argb8888)).unwrap();
        dst.blit_from(&*sub, None, 0, 0).unwrap();
        assert_eq!(dst.lock(LockFlags::READ).unwrap().get(0), 0xAA);
    }

    #[test]
    fn sub_surface_keeps_parent_alive() {
        let s = MemSurface::create(&desc(2, 2, PixelFormat::Argb8888)).unwrap();
        let sub = s.sub_surface(None).unwrap();
        let weak = Rc::downgrade(&s);
        drop(s);
        assert!(weak.upgrade().is_some());
        drop(sub);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn blit_converts_between_formats() {
        let narrow = MemSurface::create(&desc(1, 1, PixelFormat::Rgb565)).unwrap();
        narrow.lock(LockFlags::WRITE).unwrap().set(0, 0xF800);
        let wide = MemSurface::create(&desc(1, 1, PixelFormat::Argb8888)).unwrap();
        wide.blit_from(&*narrow, None, 0, 0).unwrap();
        assert_eq!(wide.lock(LockFlags::READ).unwrap().get(0), 0xFFFF0000);
    }

    #[test]
    fn blit_clips_and_rejects_disjoint_regions() {
        let src = MemSurface::create(&desc(4, 4, PixelFormat::Argb8888)).unwrap();
        src.lock(LockFlags::WRITE).unwrap().fill(0x7F);
        let dst = MemSurface::create(&desc(4, 4, PixelFormat::Argb8888)).unwrap();
        // partial overlap at a negative offset copies the clipped part
        dst.blit_from(&*src, None, -2, -2).unwrap();
        let px = dst.lock(LockFlags::READ).unwrap();
        assert_eq!(px.get(0), 0x7F);
        assert_eq!(px.get((2 * 4 + 2) as usize), 0);
        // fully outside
        let err = dst.blit_from(&*src, None, 10, 10).unwrap_err();
        assert_eq!(err, SurfaceError::OutOfBounds);
    }

    #[test]
    fn flip_publishes_pixels_and_counts_sync_waits() {
        let s = MemSurface::create(&desc(2, 2, PixelFormat::Argb8888)).unwrap();
        s.lock(LockFlags::WRITE).unwrap().fill(0xBEEF);
        assert_eq!(s.presented(), vec![0; 4]);
        s.flip(None, FlipFlags::empty()).unwrap();
        assert_eq!(s.presented(), vec![0xBEEF; 4]);
        assert_eq!(s.flips(), 1);
        assert_eq!(s.sync_waits(), 0);
        s.flip(None, FlipFlags::WAIT_FOR_SYNC).unwrap();
        assert_eq!(s.flips(), 2);
        assert_eq!(s.sync_waits(), 1);
    }

    #[test]
    fn installed_hook_replaces_flip_and_propagates_failures() {
        let s = MemSurface::create(&desc(2, 2, PixelFormat::Argb8888)).unwrap();
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        s.install_flip_hook(Box::new(move || {
            f.set(f.get() + 1);
            Err(SurfaceError::Destroyed)
        }))
        .unwrap();
        assert!(s.has_flip_hook());
        let err = s.flip(None, FlipFlags::empty()).unwrap_err();
        assert_eq!(err, SurfaceError::Destroyed);
        assert_eq!(fired.get(), 1);
        // the hook ran instead of the default presentation
        assert_eq!(s.flips(), 0);
        // sub-surfaces do not inherit the hook
        let sub = s.sub_surface(None).unwrap();
        assert!(!sub.has_flip_hook());
        sub.flip(None, FlipFlags::empty()).unwrap();
        assert_eq!(fired.get(), 1);
        assert_eq!(s.flips(), 1);
    }
}
