use log::warn;

use super::texture::{ImageFormat, ImageSize};
use crate::fast3d::gbi::defines::G_TX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadType {
    Tile,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileDescriptor {
    pub uls: u16,
    pub ult: u16,
    pub lrs: u16,
    pub lrt: u16,
    // Set by G_SETTILE
    pub format: ImageFormat,
    pub size: ImageSize,
    /// Size of 1 line (s-axis) of texture tile (9bit precision, 0 - 511)
    pub line: u16,
    /// Address of texture tile origin (9bit precision, 0 - 511)
    pub tmem: u16,
    /// Position of palette for 4bit color index textures (4bit precision, 0 - 15)
    pub palette: u8,
    /// s-axis mirror, wrap, clamp flags
    pub cm_s: u8,
    /// s-axis mask (4bit precision, 0 - 15)
    pub mask_s: u8,
    /// s-coordinate shift value
    pub shift_s: u8,
    /// t-axis mirror, wrap, clamp flags
    pub cm_t: u8,
    /// t-axis mask (4bit precision, 0 - 15)
    pub mask_t: u8,
    /// t-coordinate shift value
    pub shift_t: u8,

    // Set by the last load into this tile's TMEM
    pub load_type: LoadType,
    /// RDRAM address the tile contents were loaded from
    pub image_address: u32,
    /// Start address of the frame buffer the tile aliases, if any
    pub frame_buffer: Option<u32>,
}

impl TileDescriptor {
    pub const EMPTY: Self = Self {
        uls: 0,
        ult: 0,
        lrs: 0,
        lrt: 0,
        format: ImageFormat::G_IM_FMT_RGBA,
        size: ImageSize::G_IM_SIZ_16b,
        line: 0,
        tmem: 0,
        palette: 0,
        cm_s: 0,
        mask_s: 0,
        shift_s: 0,
        cm_t: 0,
        mask_t: 0,
        shift_t: 0,
        load_type: LoadType::Tile,
        image_address: 0,
        frame_buffer: None,
    };

    pub fn set_format(&mut self, format: u8) {
        match ImageFormat::from_u8(format) {
            Some(format) => self.format = format,
            None => warn!("Ignoring invalid tile format: {}", format),
        }
    }

    pub fn set_size(&mut self, size: u8) {
        match ImageSize::from_u8(size) {
            Some(size) => self.size = size,
            None => warn!("Ignoring invalid tile size: {}", size),
        }
    }

    pub fn get_width(&self) -> u16 {
        (self.lrs.saturating_sub(self.uls) + 4) / 4
    }

    pub fn get_height(&self) -> u16 {
        (self.lrt.saturating_sub(self.ult) + 4) / 4
    }

    /// Upper-left s in texels
    pub fn fuls(&self) -> f32 {
        self.uls as f32 / 4.0
    }

    /// Upper-left t in texels
    pub fn fult(&self) -> f32 {
        self.ult as f32 / 4.0
    }

    pub fn clamp_s(&self) -> bool {
        self.cm_s & G_TX::CLAMP != 0
    }

    pub fn mirror_s(&self) -> bool {
        self.cm_s & G_TX::MIRROR != 0
    }

    pub fn clamp_t(&self) -> bool {
        self.cm_t & G_TX::CLAMP != 0
    }

    pub fn mirror_t(&self) -> bool {
        self.cm_t & G_TX::MIRROR != 0
    }
}
