use log::trace;
use thiserror::Error;

use super::{
    color::{Color, R5G5B5A1},
    memory::{Tmem, TLUT_OFFSET},
    tile_descriptor::TileDescriptor,
};

/// Largest mask honored when sizing a texture (1024 texels).
const MAX_MASK: u8 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TextureError {
    #[error("unsupported texture format {format:?} {size:?}")]
    UnsupportedFormat {
        format: ImageFormat,
        size: ImageSize,
    },
    #[error("tile has empty dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

#[allow(non_camel_case_types)]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ImageFormat {
    G_IM_FMT_RGBA = 0x00,
    G_IM_FMT_YUV = 0x01,
    G_IM_FMT_CI = 0x02,
    G_IM_FMT_IA = 0x03,
    G_IM_FMT_I = 0x04,
}

impl ImageFormat {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ImageFormat::G_IM_FMT_RGBA),
            1 => Some(ImageFormat::G_IM_FMT_YUV),
            2 => Some(ImageFormat::G_IM_FMT_CI),
            3 => Some(ImageFormat::G_IM_FMT_IA),
            4 => Some(ImageFormat::G_IM_FMT_I),
            _ => None,
        }
    }
}

#[allow(non_camel_case_types)]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ImageSize {
    G_IM_SIZ_4b = 0x00,
    G_IM_SIZ_8b = 0x01,
    G_IM_SIZ_16b = 0x02,
    G_IM_SIZ_32b = 0x03,
}

impl ImageSize {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ImageSize::G_IM_SIZ_4b),
            1 => Some(ImageSize::G_IM_SIZ_8b),
            2 => Some(ImageSize::G_IM_SIZ_16b),
            3 => Some(ImageSize::G_IM_SIZ_32b),
            _ => None,
        }
    }

    pub fn bits_per_texel(&self) -> u32 {
        4 << *self as u32
    }

    /// Bytes covered by `texels` texels, rounded up.
    pub fn bytes_for(&self, texels: u32) -> u32 {
        (texels * self.bits_per_texel() + 7) / 8
    }
}

#[allow(non_camel_case_types)]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum TextureLUT {
    G_TT_NONE = 0x00,
    G_TT_RGBA16 = 0x02,
    G_TT_IA16 = 0x03,
}

impl TextureLUT {
    /// The reserved value 1 reads as no palette.
    pub fn from_u32(value: u32) -> Self {
        match value & 0x3 {
            2 => TextureLUT::G_TT_RGBA16,
            3 => TextureLUT::G_TT_IA16,
            _ => TextureLUT::G_TT_NONE,
        }
    }
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFilt {
    G_TF_POINT = 0x00,
    G_TF_AVERAGE = 0x03,
    G_TF_BILERP = 0x02,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureState {
    pub on: bool,
    /// Index of parameter-setting tile descriptor (3bit precision, 0 - 7)
    pub tile: u8,
    pub level: u8,
    pub scale_s: f32,
    pub scale_t: f32,
}

impl TextureState {
    pub const EMPTY: Self = Self {
        on: false,
        tile: 0,
        level: 0,
        scale_s: 0.0,
        scale_t: 0.0,
    };

    pub fn new(on: bool, tile: u8, level: u8, scale_s: f32, scale_t: f32) -> Self {
        Self {
            on,
            tile,
            level,
            scale_s,
            scale_t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureImageState {
    pub format: u8,
    pub size: u8,
    pub width: u16,
    pub address: u32,
}

impl TextureImageState {
    pub const EMPTY: Self = Self {
        format: 0,
        size: 0,
        width: 0,
        address: 0,
    };

    pub fn new(format: u8, size: u8, width: u16, address: u32) -> Self {
        Self {
            format,
            size,
            width,
            address,
        }
    }
}

/// Smallest power of two that is >= `dim`.
pub fn pow2(dim: u32) -> u32 {
    dim.max(1).next_power_of_two()
}

/// Base-2 exponent of `pow2(dim)`.
pub fn powof(dim: u32) -> u32 {
    pow2(dim).trailing_zeros()
}

// MARK: - Tile layout

/// N64-space geometry of a tile, derived from its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDimensions {
    pub width: u32,
    pub height: u32,
    pub clamp_width: u32,
    pub clamp_height: u32,
    pub real_width: u32,
    pub real_height: u32,
    pub mask_s: u8,
    pub mask_t: u8,
    /// Bytes between rows in TMEM
    pub line_bytes: u32,
}

impl TextureDimensions {
    pub fn from_tile(tile: &TileDescriptor) -> Result<Self, TextureError> {
        let tile_width = tile.get_width() as u32;
        let tile_height = tile.get_height() as u32;
        if tile_width == 0 || tile_height == 0 {
            return Err(TextureError::InvalidDimensions {
                width: tile_width,
                height: tile_height,
            });
        }

        let mask_s = tile.mask_s.min(MAX_MASK);
        let mask_t = tile.mask_t.min(MAX_MASK);

        let width = masked_dimension(tile_width, mask_s, tile.clamp_s());
        let height = masked_dimension(tile_height, mask_t, tile.clamp_t());

        let clamp_width = if tile.clamp_s() { tile_width } else { width };
        let clamp_height = if tile.clamp_t() { tile_height } else { height };

        let line_bytes = if tile.line != 0 {
            tile.line as u32 * 8
        } else {
            // round a packed row up to whole 64-bit TMEM words
            (tile.size.bytes_for(width) + 7) & !7
        };

        Ok(Self {
            width,
            height,
            clamp_width,
            clamp_height,
            real_width: pow2(clamp_width.max(width)),
            real_height: pow2(clamp_height.max(height)),
            mask_s,
            mask_t,
            line_bytes,
        })
    }

    /// Number of TMEM bytes the tile reads.
    pub fn tmem_bytes(&self) -> usize {
        (self.line_bytes * self.clamp_height.max(self.height)) as usize
    }
}

fn masked_dimension(tile_dim: u32, mask: u8, clamp: bool) -> u32 {
    if mask == 0 {
        return tile_dim;
    }

    let mask_dim = 1u32 << mask;
    if mask_dim <= tile_dim || !clamp {
        mask_dim
    } else {
        tile_dim
    }
}

#[inline]
fn wrap_coord(coord: u32, clamp: u32, mask: u8) -> u32 {
    let coord = coord.min(clamp.saturating_sub(1));
    if mask != 0 {
        coord & ((1 << mask) - 1)
    } else {
        coord
    }
}

// MARK: - Decoding

/// Palette location for indexed formats.
#[derive(Clone, Copy)]
struct TexelContext {
    palette_base: usize,
    tlut: TextureLUT,
}

type TexelFetch = fn(&Tmem, usize, u32, &TexelContext) -> Color;

fn texel_fetch(
    format: ImageFormat,
    size: ImageSize,
    tlut: TextureLUT,
) -> Result<TexelFetch, TextureError> {
    use ImageFormat::*;
    use ImageSize::*;

    let indexed = tlut != TextureLUT::G_TT_NONE;
    let fetch: TexelFetch = match (format, size) {
        (G_IM_FMT_RGBA, G_IM_SIZ_16b) | (G_IM_FMT_CI, G_IM_SIZ_16b) => texel_rgba16,
        (G_IM_FMT_RGBA, G_IM_SIZ_32b) => texel_rgba32,
        (G_IM_FMT_YUV, G_IM_SIZ_16b) => texel_yuv16,
        (G_IM_FMT_CI | G_IM_FMT_RGBA, G_IM_SIZ_4b) if indexed => texel_ci4,
        (G_IM_FMT_CI | G_IM_FMT_RGBA, G_IM_SIZ_8b) if indexed => texel_ci8,
        (G_IM_FMT_CI | G_IM_FMT_RGBA | G_IM_FMT_I, G_IM_SIZ_4b) => texel_i4,
        (G_IM_FMT_CI | G_IM_FMT_RGBA | G_IM_FMT_I, G_IM_SIZ_8b) => texel_i8,
        (G_IM_FMT_IA, G_IM_SIZ_4b) => texel_ia4,
        (G_IM_FMT_IA, G_IM_SIZ_8b) => texel_ia8,
        (G_IM_FMT_IA | G_IM_FMT_I, G_IM_SIZ_16b) => texel_ia16,
        _ => return Err(TextureError::UnsupportedFormat { format, size }),
    };

    Ok(fetch)
}

/// TMEM offset of the palette used by `tile`.
pub fn palette_offset(tile: &TileDescriptor) -> usize {
    match tile.size {
        ImageSize::G_IM_SIZ_4b => TLUT_OFFSET + ((tile.palette as usize) << 4) * 8,
        _ => TLUT_OFFSET,
    }
}

/// Byte length of the palette used by `tile`, or zero for direct color formats.
pub fn palette_len(tile: &TileDescriptor, tlut: TextureLUT) -> usize {
    if tlut == TextureLUT::G_TT_NONE {
        return 0;
    }

    match (tile.format, tile.size) {
        (ImageFormat::G_IM_FMT_CI | ImageFormat::G_IM_FMT_RGBA, ImageSize::G_IM_SIZ_4b) => 16 * 8,
        (ImageFormat::G_IM_FMT_CI | ImageFormat::G_IM_FMT_RGBA, ImageSize::G_IM_SIZ_8b) => 256 * 8,
        _ => 0,
    }
}

/// Decodes the tile into a `real_width * real_height` RGBA8 buffer.
pub fn decode_tile(
    tmem: &Tmem,
    tile: &TileDescriptor,
    tlut: TextureLUT,
    dims: &TextureDimensions,
) -> Result<Vec<u8>, TextureError> {
    let fetch = texel_fetch(tile.format, tile.size, tlut)?;
    let context = TexelContext {
        palette_base: palette_offset(tile),
        tlut,
    };

    trace!(
        "Decoding {:?} {:?} tile {}x{} (real {}x{})",
        tile.format,
        tile.size,
        dims.width,
        dims.height,
        dims.real_width,
        dims.real_height
    );

    let base = tile.tmem as usize * 8;
    let mut decoded = Vec::with_capacity((dims.real_width * dims.real_height * 4) as usize);
    for y in 0..dims.real_height {
        let ty = wrap_coord(y, dims.clamp_height, dims.mask_t);
        let row = base + (ty * dims.line_bytes) as usize;
        for x in 0..dims.real_width {
            let tx = wrap_coord(x, dims.clamp_width, dims.mask_s);
            decoded.extend_from_slice(&fetch(tmem, row, tx, &context).to_bytes());
        }
    }

    Ok(decoded)
}

fn palette_color(tmem: &Tmem, context: &TexelContext, index: usize) -> Color {
    // entries are replicated four times, one 64-bit word each
    let entry = tmem.read_u16(context.palette_base + index * 8);
    match context.tlut {
        TextureLUT::G_TT_IA16 => {
            let i = (entry >> 8) as u8;
            Color::RGBA(i, i, i, entry as u8)
        }
        _ => R5G5B5A1::to_rgba(entry),
    }
}

#[inline]
fn read_nibble(tmem: &Tmem, row: usize, x: u32) -> u8 {
    let byte = tmem.read_u8(row + (x / 2) as usize);
    if x & 1 == 0 {
        byte >> 4
    } else {
        byte & 0x0F
    }
}

fn texel_rgba16(tmem: &Tmem, row: usize, x: u32, _: &TexelContext) -> Color {
    R5G5B5A1::to_rgba(tmem.read_u16(row + x as usize * 2))
}

fn texel_rgba32(tmem: &Tmem, row: usize, x: u32, _: &TexelContext) -> Color {
    let address = row + x as usize * 4;
    Color::RGBA(
        tmem.read_u8(address),
        tmem.read_u8(address + 1),
        tmem.read_u8(address + 2),
        tmem.read_u8(address + 3),
    )
}

fn texel_yuv16(tmem: &Tmem, row: usize, x: u32, _: &TexelContext) -> Color {
    // texel pairs are stored as U Y0 V Y1
    let address = row + (x & !1) as usize * 2;
    let u = tmem.read_u8(address) as f32 - 128.0;
    let v = tmem.read_u8(address + 2) as f32 - 128.0;
    let y = tmem.read_u8(address + 1 + (x as usize & 1) * 2) as f32;

    let r = y + 1.370705 * v;
    let g = y - 0.337633 * u - 0.698001 * v;
    let b = y + 1.732446 * u;

    Color::RGBA(
        r.clamp(0.0, 255.0) as u8,
        g.clamp(0.0, 255.0) as u8,
        b.clamp(0.0, 255.0) as u8,
        0xFF,
    )
}

fn texel_ci4(tmem: &Tmem, row: usize, x: u32, context: &TexelContext) -> Color {
    palette_color(tmem, context, read_nibble(tmem, row, x) as usize)
}

fn texel_ci8(tmem: &Tmem, row: usize, x: u32, context: &TexelContext) -> Color {
    palette_color(tmem, context, tmem.read_u8(row + x as usize) as usize)
}

fn texel_ia4(tmem: &Tmem, row: usize, x: u32, _: &TexelContext) -> Color {
    let value = read_nibble(tmem, row, x);
    let i = (value >> 1) & 0x7;
    let i = (i << 5) | (i << 2) | (i >> 1);
    Color::RGBA(i, i, i, (value & 1) * 0xFF)
}

fn texel_ia8(tmem: &Tmem, row: usize, x: u32, _: &TexelContext) -> Color {
    let value = tmem.read_u8(row + x as usize);
    let i = (value >> 4) * 0x11;
    Color::RGBA(i, i, i, (value & 0x0F) * 0x11)
}

fn texel_ia16(tmem: &Tmem, row: usize, x: u32, _: &TexelContext) -> Color {
    let value = tmem.read_u16(row + x as usize * 2);
    let i = (value >> 8) as u8;
    Color::RGBA(i, i, i, value as u8)
}

fn texel_i4(tmem: &Tmem, row: usize, x: u32, _: &TexelContext) -> Color {
    let i = read_nibble(tmem, row, x) * 0x11;
    Color::RGBA(i, i, i, i)
}

fn texel_i8(tmem: &Tmem, row: usize, x: u32, _: &TexelContext) -> Color {
    let i = tmem.read_u8(row + x as usize);
    Color::RGBA(i, i, i, i)
}
