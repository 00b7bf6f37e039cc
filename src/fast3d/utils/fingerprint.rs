//! Content fingerprints used as texture cache keys.

use super::{
    texture::{ImageFormat, ImageSize, TextureDimensions, TextureLUT},
    tile_descriptor::{LoadType, TileDescriptor},
};

/// Tile parameters that change how the same TMEM bytes decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureParams {
    pub format: ImageFormat,
    pub size: ImageSize,
    pub width: u32,
    pub height: u32,
    pub line: u32,
    pub palette: u8,
    pub mask_s: u8,
    pub mask_t: u8,
    pub cm_s: u8,
    pub cm_t: u8,
    pub load_type: LoadType,
    pub tlut: TextureLUT,
}

impl TextureParams {
    pub fn new(tile: &TileDescriptor, dims: &TextureDimensions, tlut: TextureLUT) -> Self {
        Self {
            format: tile.format,
            size: tile.size,
            width: dims.width,
            height: dims.height,
            line: dims.line_bytes,
            palette: tile.palette,
            mask_s: dims.mask_s,
            mask_t: dims.mask_t,
            cm_s: tile.cm_s,
            cm_t: tile.cm_t,
            load_type: tile.load_type,
            tlut,
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(22);
        bytes.push(self.format as u8);
        bytes.push(self.size as u8);
        bytes.extend_from_slice(&self.width.to_le_bytes());
        bytes.extend_from_slice(&self.height.to_le_bytes());
        bytes.extend_from_slice(&self.line.to_le_bytes());
        bytes.extend_from_slice(&[
            self.palette,
            self.mask_s,
            self.mask_t,
            self.cm_s,
            self.cm_t,
            self.load_type as u8,
            self.tlut as u8,
        ]);
        bytes
    }
}

/// CRC64 over the texel bytes, the palette bytes (if any) and the parameters.
/// `texels` may be split in several runs, e.g. when the tile wraps around TMEM.
pub fn texture_fingerprint(
    texels: &[&[u8]],
    palette: Option<&[u8]>,
    params: &TextureParams,
) -> u64 {
    let mut crc = texels.iter().fold(0, |crc, run| crc64::crc64(crc, run));
    if let Some(palette) = palette {
        crc = crc64::crc64(crc, palette);
    }
    crc64::crc64(crc, &params.to_bytes())
}
