// SoftGL
// copyright softgl contributors 2023~2025

//! The software GL adapter.
//!
//! One instance bridges a windowing-layer surface to a raster context.
//! A 32-bit ARGB target is rendered into directly through its own locked
//! memory. Any other format gets a hidden ARGB back surface preallocated
//! over the context's memory plus a front sub-surface viewing the whole
//! target; the presentation hook installed on the target then blits
//! back to front and performs the real synchronized swap.
//!
//! Instances are reference counted: construction hands out the first
//! reference, the release that reaches zero removes the hook, drops the
//! owned surfaces and frees the raster context. Operations on an
//! instance that already tore down fail with an invalid-argument error.

use crate::adapter::{GlAdapter, GlAttributes, ProcAddress};
use crate::engine::{self, ChannelMasks, RasterContext};
use crate::error::{Error, SurfaceError};
use crate::surface::{
    FlipFlags, FlipHook, LockFlags, PixelFormat, Surface, SurfaceDesc, WindowSystem,
};
use log::{debug, error};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

struct State {
    context: RasterContext,
    target: Weak<dyn Surface>,
    back: Option<Rc<dyn Surface>>,
    front: Option<Rc<dyn Surface>>,
}

pub struct SoftGlAdapter {
    refs: Cell<u32>,
    state: RefCell<Option<State>>,
}

impl std::fmt::Debug for SoftGlAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftGlAdapter")
            .field("refs", &self.refs.get())
            .field("live", &self.state.borrow().is_some())
            .finish()
    }
}

// The hook holds only weak surface references: the target owns the hook,
// so strong ones would cycle through the front view back to the target.
fn present_hook(back: &Rc<dyn Surface>, front: &Rc<dyn Surface>) -> FlipHook {
    let back = Rc::downgrade(back);
    let front = Rc::downgrade(front);
    Box::new(move || {
        let back = back.upgrade().ok_or(SurfaceError::Destroyed)?;
        let front = front.upgrade().ok_or(SurfaceError::Destroyed)?;
        front.blit_from(&*back, None, 0, 0)?;
        front.flip(None, FlipFlags::WAIT_FOR_SYNC)
    })
}

impl SoftGlAdapter {
    /// Build an adapter bound to `surface`. Partially acquired resources
    /// are released on every failure path; no half-built instance escapes.
    pub fn construct(
        surface: &Rc<dyn Surface>,
        root: &Rc<dyn WindowSystem>,
    ) -> Result<Rc<Self>, Error> {
        let (width, height) = surface.size();
        let format = surface.pixel_format();
        debug!("softgl construct {}x{} {:?}", width, height, format);

        let direct = format == PixelFormat::Argb8888;
        let memory = if direct {
            Some(surface.lock(LockFlags::WRITE)?)
        } else {
            None
        };

        let context = RasterContext::init(memory, width, height, 32, ChannelMasks::ARGB8888)
            .map_err(|e| {
                error!("softgl: failed to initialize raster context: {}", e);
                e
            })?;

        let (back, front) = if direct {
            (None, None)
        } else {
            let desc = SurfaceDesc {
                width,
                height,
                format: PixelFormat::Argb8888,
                preallocated: Some(context.memory()),
            };
            let back = root.create_surface(&desc).map_err(|e| {
                error!("softgl: failed to create back surface: {}", e);
                e
            })?;
            let front = surface.sub_surface(None).map_err(|e| {
                error!("softgl: failed to create front surface: {}", e);
                e
            })?;
            surface
                .install_flip_hook(present_hook(&back, &front))
                .map_err(|e| {
                    error!("softgl: failed to install flip hook: {}", e);
                    e
                })?;
            (Some(back), Some(front))
        };

        Ok(Rc::new(Self {
            refs: Cell::new(1),
            state: RefCell::new(Some(State {
                context,
                target: Rc::downgrade(surface),
                back,
                front,
            })),
        }))
    }

    fn with_state<R>(&self, f: impl FnOnce(&State) -> R) -> Result<R, Error> {
        match self.state.borrow().as_ref() {
            Some(state) => Ok(f(state)),
            None => Err(Error::InvalidArg("instance already destroyed")),
        }
    }

    fn destruct(&self) {
        if let Some(state) = self.state.borrow_mut().take() {
            if state.front.is_some() {
                if let Some(target) = state.target.upgrade() {
                    target.remove_flip_hook();
                }
            }
            debug!("softgl destruct");
            // back, front and the raster context drop here
        }
    }
}

// a handle dropped without its final release still tears down cleanly
impl Drop for SoftGlAdapter {
    fn drop(&mut self) {
        self.destruct();
    }
}

impl GlAdapter for SoftGlAdapter {
    fn add_ref(&self) -> Result<(), Error> {
        self.with_state(|_| self.refs.set(self.refs.get() + 1))
    }

    fn release(&self) -> Result<(), Error> {
        if self.state.borrow().is_none() {
            return Err(Error::InvalidArg("instance already destroyed"));
        }
        let refs = self.refs.get() - 1;
        self.refs.set(refs);
        if refs == 0 {
            self.destruct();
        }
        Ok(())
    }

    fn lock(&self) -> Result<(), Error> {
        debug!("softgl lock");
        self.with_state(|state| state.context.make_current())
    }

    fn unlock(&self) -> Result<(), Error> {
        debug!("softgl unlock");
        self.with_state(|_| engine::clear_current())
    }

    fn get_attributes(&self, out: Option<&mut GlAttributes>) -> Result<(), Error> {
        let out = out.ok_or(Error::InvalidArg("attribute record is required"))?;
        *out = GlAttributes::default();
        out.buffer_size = 32;
        out.depth_size = 1;
        out.red_size = 8;
        out.green_size = 8;
        out.blue_size = 8;
        out.alpha_size = 8;
        out.double_buffer = true;
        Ok(())
    }

    fn get_proc_address(&self, name: Option<&str>) -> Result<ProcAddress, Error> {
        let _ = name;
        Err(Error::Unsupported("extension function lookup"))
    }
}
