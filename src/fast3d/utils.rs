pub mod color;
pub mod color_combiner;
pub mod fingerprint;
pub mod memory;
pub mod texture;
pub mod texture_cache;
pub mod texture_loader;
pub mod tile_descriptor;
