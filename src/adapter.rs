// SoftGL
// copyright softgl contributors 2023~2025

//! Capability interface of the GL-context adapter, plus the probe and
//! construct pair the windowing layer's plugin loader drives.
//!
//! The interface is a fixed set of six operations behind one trait; the
//! only implementing type is [`soft::SoftGlAdapter`]. Probing accepts
//! unconditionally: the software engine can back any surface the
//! windowing layer hands over.

use crate::error::Error;
use crate::surface::{Surface, WindowSystem};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// software raster implementation of the capability interface
pub mod soft;

/// Fixed-function framebuffer attribute record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GlAttributes {
    pub buffer_size: u32,
    pub depth_size: u32,
    pub stencil_size: u32,
    pub aux_buffers: u32,
    pub red_size: u32,
    pub green_size: u32,
    pub blue_size: u32,
    pub alpha_size: u32,
    pub accum_red_size: u32,
    pub accum_green_size: u32,
    pub accum_blue_size: u32,
    pub accum_alpha_size: u32,
    pub double_buffer: bool,
    pub stereo: bool,
}

/// Address of a dynamically resolved extension function. The software
/// adapter never produces one.
#[derive(Debug, Clone, Copy)]
pub struct ProcAddress(pub usize);

/// The six operations a GL-context plugin exposes to callers.
pub trait GlAdapter {
    /// Take an extra reference on the instance.
    fn add_ref(&self) -> Result<(), Error>;

    /// Drop one reference; the reference that hits zero tears the
    /// instance down (owned surfaces released, raster context freed).
    fn release(&self) -> Result<(), Error>;

    /// Make this instance's raster context current for the calling thread.
    fn lock(&self) -> Result<(), Error>;

    /// Clear the calling thread's current context.
    fn unlock(&self) -> Result<(), Error>;

    /// Fill `out` with the adapter's fixed attribute profile; fails with
    /// an invalid-argument error when `out` is absent.
    fn get_attributes(&self, out: Option<&mut GlAttributes>) -> Result<(), Error>;

    /// Extension function lookup. Permanently unsupported.
    fn get_proc_address(&self, name: Option<&str>) -> Result<ProcAddress, Error>;
}

/// Plugin probe: does this implementation apply to `surface`?
pub fn probe(_surface: &Rc<dyn Surface>) -> bool {
    true
}

/// Plugin constructor: build an adapter bound to `surface`, creating any
/// auxiliary surfaces through `root`.
pub fn construct(
    surface: &Rc<dyn Surface>,
    root: &Rc<dyn WindowSystem>,
) -> Result<Rc<dyn GlAdapter>, Error> {
    Ok(soft::SoftGlAdapter::construct(surface, root)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::mem::{MemSurface, MemWindowSystem};
    use crate::surface::{PixelFormat, SurfaceDesc};

    fn surface(format: PixelFormat) -> Rc<dyn Surface> {
        MemSurface::create(&SurfaceDesc {
            width: 3,
            height: 3,
            format,
            preallocated: None,
        })
        .unwrap()
    }

    #[test]
    fn probe_accepts_any_surface() {
        assert!(probe(&surface(PixelFormat::Argb8888)));
        assert!(probe(&surface(PixelFormat::Rgb565)));
    }

    #[test]
    fn construct_yields_the_capability_interface() {
        let root: Rc<dyn WindowSystem> = Rc::new(MemWindowSystem::new());
        let s = surface(PixelFormat::Rgb888);
        let ad = construct(&s, &root).unwrap();
        let mut attrs = GlAttributes::default();
        ad.get_attributes(Some(&mut attrs)).unwrap();
        assert_eq!(attrs.buffer_size, 32);
        ad.lock().unwrap();
        ad.unlock().unwrap();
        ad.release().unwrap();
        assert!(ad.lock().is_err());
    }
}
