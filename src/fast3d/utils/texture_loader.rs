use log::{debug, trace};

use super::{
    memory::Tmem,
    texture::{decode_tile, TextureDimensions, TextureError, TextureLUT},
    texture_cache::CachedTexture,
    tile_descriptor::TileDescriptor,
};
use crate::fast3d::{graphics::GraphicsDevice, hires::TextureFilterHandler};

/// Fills cache entries with pixels, either decoded from TMEM or from a texture pack.
#[derive(Default)]
pub struct TextureLoader {
    pub filter: TextureFilterHandler,
}

impl TextureLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads the pixels of `tile` into the GPU texture currently selected for
    /// `texture`. The cache key stays the N64 fingerprint even for replacements.
    pub fn load(
        &mut self,
        tile: &TileDescriptor,
        tlut: TextureLUT,
        tmem: &Tmem,
        dims: &TextureDimensions,
        texture: &mut CachedTexture,
        device: &mut dyn GraphicsDevice,
    ) -> Result<(), TextureError> {
        if let Some(image) = self.filter.lookup(
            texture.fingerprint,
            dims.width,
            dims.height,
            tile.format,
            tile.size,
        ) {
            if image.data.len() == (image.width * image.height * 4) as usize {
                debug!(
                    "Replacing texture {:#018x} with {}x{} pack image",
                    texture.fingerprint, image.width, image.height
                );
                device.upload_texture(&image.data, image.width, image.height);
                texture.byte_size = image.data.len();
                texture.hires = true;
                return Ok(());
            }
        }

        let data = decode_tile(tmem, tile, tlut, dims)?;
        trace!(
            "Uploading {}x{} texture {:#018x}",
            dims.real_width,
            dims.real_height,
            texture.fingerprint
        );
        device.upload_texture(&data, dims.real_width, dims.real_height);
        texture.byte_size = data.len();
        texture.hires = false;
        Ok(())
    }
}
