// SoftGL
// copyright softgl contributors 2023~2025

//! SoftGL is a plugin adapter that lets a display-server abstraction layer
//! expose an OpenGL-style rendering context backed by a software rasterizer.
//! The adapter binds a raster context to a pixel buffer owned by the
//! windowing layer, makes the context current or not-current on demand,
//! reports the fixed framebuffer attribute profile, and routes frame
//! presentation (back-buffer blit + flip) through the windowing layer's
//! buffer-swap mechanism.
//!
//! A target surface that is already 32-bit ARGB is rendered into directly,
//! using its own memory. Any other format gets a hidden 32-bit back surface
//! preallocated over the raster context's pixel memory, plus a front
//! sub-surface viewing the whole target; a presentation hook installed on
//! the target then blits back to front and performs the real synchronized
//! swap whenever the application flips.
//!
//! The windowing layer is consumed through the [`surface`] traits; one
//! in-memory backend ships with the crate for embedding and testing.

/// capability interface, plugin probe/construct and the adapter itself
pub mod adapter;

/// software raster engine: context init, current-context slot, drawing
pub mod engine;

/// error taxonomy for the adapter and the windowing seam
pub mod error;

/// log
pub mod log;

/// windowing-layer seam: pixel formats, shared pixel memory, the Surface
/// and WindowSystem traits, and the in-memory reference backend
pub mod surface;

/// common tools and data structures: rectangles and region clipping
pub mod util;
