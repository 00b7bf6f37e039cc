pub mod blender;
pub mod config;
pub mod framebuffer;
pub mod gbi;
pub mod graphics;
pub mod hires;
pub mod primitives;
pub mod rcp;
pub mod rdp;
pub mod render_state;
pub mod rsp;
pub mod texrect_hooks;
pub mod utils;
pub mod video;
