use log::{trace, warn};
use rustc_hash::FxHashMap;

use super::{
    gbi::{
        defines::G_ZS,
        utils::{
            get_cycle_type_from_other_mode_h, get_textfilter_from_other_mode_h,
            get_texture_lut_from_other_mode_h,
        },
    },
    render_state::DirtyFlags,
    utils::{
        color::Color,
        color_combiner::CombineParams,
        memory::{Rdram, Tmem, TMEM_SIZE},
        texture::{ImageSize, TextFilt, TextureImageState, TextureLUT},
        tile_descriptor::{LoadType, TileDescriptor},
    },
};

pub const NUM_TILE_DESCRIPTORS: usize = 8;

#[allow(non_camel_case_types, clippy::upper_case_acronyms)]
pub enum OtherModeLayoutL {
    // non-render-mode fields
    G_MDSFT_ALPHACOMPARE = 0,
    G_MDSFT_ZSRCSEL = 2,
    // cycle-independent render-mode bits
    AA_EN = 3,
    Z_CMP = 4,
    Z_UPD = 5,
    IM_RD = 6,
    CLR_ON_CVG = 7,
    CVG_DST = 8,
    ZMODE = 10,
    CVG_X_ALPHA = 12,
    ALPHA_CVG_SEL = 13,
    FORCE_BL = 14,
    // bit 15 unused, was "TEX_EDGE"
    // cycle-dependent render-mode bits
    B_2 = 16,
    B_1 = 18,
    M_2 = 20,
    M_1 = 22,
    A_2 = 24,
    A_1 = 26,
    P_2 = 28,
    P_1 = 30,
}

#[allow(non_camel_case_types)]
pub enum OtherModeH_Layout {
    G_MDSFT_BLENDMASK = 0,
    G_MDSFT_ALPHADITHER = 4,
    G_MDSFT_RGBDITHER = 6,
    G_MDSFT_COMBKEY = 8,
    G_MDSFT_TEXTCONV = 9,
    G_MDSFT_TEXTFILT = 12,
    G_MDSFT_TEXTLUT = 14,
    G_MDSFT_TEXTLOD = 16,
    G_MDSFT_TEXTDETAIL = 17,
    G_MDSFT_TEXTPERSP = 19,
    G_MDSFT_CYCLETYPE = 20,
    G_MDSFT_COLORDITHER = 22,
    G_MDSFT_PIPELINE = 23,
}

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum OtherModeHCycleType {
    G_CYC_1CYCLE = 0,
    G_CYC_2CYCLE = 1,
    G_CYC_COPY = 2,
    G_CYC_FILL = 3,
}

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZMode {
    ZMODE_OPA = 0,
    ZMODE_INTER = 1,
    ZMODE_XLU = 2, // translucent
    ZMODE_DEC = 3,
}

/// Blender inputs for one cycle: (m1a * m1b + m2a * m2b) / (m1b + m2b).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlenderMux {
    pub m1a: u32,
    pub m1b: u32,
    pub m2a: u32,
    pub m2b: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OtherMode {
    pub h: u32,
    pub l: u32,
}

impl OtherMode {
    #[inline]
    fn l_field(&self, shift: OtherModeLayoutL, bits: u32) -> u32 {
        (self.l >> shift as u32) & ((1 << bits) - 1)
    }

    pub fn cycle_type(&self) -> OtherModeHCycleType {
        get_cycle_type_from_other_mode_h(self.h)
    }

    pub fn texture_filter(&self) -> TextFilt {
        get_textfilter_from_other_mode_h(self.h)
    }

    pub fn texture_lut(&self) -> TextureLUT {
        get_texture_lut_from_other_mode_h(self.h)
    }

    pub fn depth_source(&self) -> u32 {
        self.l_field(OtherModeLayoutL::G_MDSFT_ZSRCSEL, 1)
    }

    pub fn depth_source_is_prim(&self) -> bool {
        self.depth_source() == G_ZS::PRIM
    }

    pub fn depth_compare(&self) -> bool {
        self.l_field(OtherModeLayoutL::Z_CMP, 1) != 0
    }

    pub fn depth_update(&self) -> bool {
        self.l_field(OtherModeLayoutL::Z_UPD, 1) != 0
    }

    pub fn depth_mode(&self) -> ZMode {
        match self.l_field(OtherModeLayoutL::ZMODE, 2) {
            0 => ZMode::ZMODE_OPA,
            1 => ZMode::ZMODE_INTER,
            2 => ZMode::ZMODE_XLU,
            _ => ZMode::ZMODE_DEC,
        }
    }

    pub fn clear_on_cvg(&self) -> bool {
        self.l_field(OtherModeLayoutL::CLR_ON_CVG, 1) != 0
    }

    pub fn force_blender(&self) -> bool {
        self.l_field(OtherModeLayoutL::FORCE_BL, 1) != 0
    }

    /// Blender selectors of the first (0) or second (1) cycle.
    pub fn blender(&self, cycle: usize) -> BlenderMux {
        if cycle == 0 {
            BlenderMux {
                m1a: self.l_field(OtherModeLayoutL::P_1, 2),
                m1b: self.l_field(OtherModeLayoutL::A_1, 2),
                m2a: self.l_field(OtherModeLayoutL::M_1, 2),
                m2b: self.l_field(OtherModeLayoutL::B_1, 2),
            }
        } else {
            BlenderMux {
                m1a: self.l_field(OtherModeLayoutL::P_2, 2),
                m1b: self.l_field(OtherModeLayoutL::A_2, 2),
                m2a: self.l_field(OtherModeLayoutL::M_2, 2),
                m2b: self.l_field(OtherModeLayoutL::B_2, 2),
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PrimDepth {
    pub z: f32,
    pub delta_z: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColorImage {
    pub format: u8,
    pub size: u8,
    pub width: u32,
    pub height: u32,
    pub address: u32,
}

/// Scissor bounds in N64 screen units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Scissor {
    pub ulx: f32,
    pub uly: f32,
    pub lrx: f32,
    pub lry: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TMEMMapEntry {
    pub address: u32,
    pub load_type: LoadType,
    pub frame_buffer: Option<u32>,
}

impl TMEMMapEntry {
    pub fn new(address: u32, load_type: LoadType, frame_buffer: Option<u32>) -> Self {
        Self {
            address,
            load_type,
            frame_buffer,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct LoadBlock {
    texture_image: TextureImageState,
    tile: usize,
    uls: u32,
    ult: u32,
    lrs: u32,
    frame_buffer: Option<u32>,
}

pub struct RDP {
    pub other_mode: OtherMode,
    pub combine: CombineParams,

    pub texture_image_state: TextureImageState, // coming via GBI (texture to load)
    pub tile_descriptors: [TileDescriptor; NUM_TILE_DESCRIPTORS],
    pub tmem_map: FxHashMap<u16, TMEMMapEntry>, // tmem address -> texture image state address
    last_load_block: Option<LoadBlock>,

    pub color_image: ColorImage,
    pub depth_image: u32,
    pub scissor: Scissor,
    pub prim_depth: PrimDepth,

    pub env_color: Color,
    pub fog_color: Color,
    pub prim_color: Color,
    pub blend_color: Color,
    pub fill_color: Color,

    pub changed: DirtyFlags,
}

impl Default for RDP {
    fn default() -> Self {
        Self::new()
    }
}

impl RDP {
    pub fn new() -> Self {
        RDP {
            other_mode: OtherMode::default(),
            combine: CombineParams::ZERO,

            texture_image_state: TextureImageState::EMPTY,
            tile_descriptors: [TileDescriptor::EMPTY; NUM_TILE_DESCRIPTORS],
            tmem_map: FxHashMap::default(),
            last_load_block: None,

            color_image: ColorImage::default(),
            depth_image: 0,
            scissor: Scissor::default(),
            prim_depth: PrimDepth::default(),

            env_color: Color::TRANSPARENT,
            fog_color: Color::TRANSPARENT,
            prim_color: Color::TRANSPARENT,
            blend_color: Color::TRANSPARENT,
            fill_color: Color::TRANSPARENT,

            changed: DirtyFlags::all(),
        }
    }

    pub fn reset(&mut self) {
        self.other_mode = OtherMode::default();
        self.tmem_map.clear();
        self.last_load_block = None;
        self.changed = DirtyFlags::all();
    }

    // MARK: - Modes

    pub fn set_other_mode(&mut self, h: u32, l: u32) {
        self.set_other_mode_h(h);
        self.set_other_mode_l(l);
    }

    pub fn set_other_mode_h(&mut self, h: u32) {
        let previous = self.other_mode;
        self.other_mode.h = h;

        if previous.cycle_type() != self.other_mode.cycle_type() {
            self.changed |= DirtyFlags::CYCLE_TYPE;
        }
        if previous.texture_lut() != self.other_mode.texture_lut()
            || previous.texture_filter() != self.other_mode.texture_filter()
        {
            self.changed |= DirtyFlags::TILE;
        }
    }

    pub fn set_other_mode_l(&mut self, l: u32) {
        if self.other_mode.l != l {
            self.other_mode.l = l;
            self.changed |= DirtyFlags::RENDER_MODE;
        }
    }

    pub fn set_combine(&mut self, combine: CombineParams) {
        if self.combine != combine {
            self.combine = combine;
            self.changed |= DirtyFlags::COMBINE;
        }
    }

    pub fn uses_tile(&self, tile: usize) -> bool {
        match tile {
            0 => self.combine.uses_texture0(),
            1 => self.uses_texture1(),
            _ => false,
        }
    }

    pub fn uses_texture1(&self) -> bool {
        self.other_mode.cycle_type() == OtherModeHCycleType::G_CYC_2CYCLE
            && self.combine.uses_texture1()
    }

    // MARK: - Colors and images

    pub fn set_prim_color(&mut self, color: Color) {
        self.prim_color = color;
    }

    pub fn set_env_color(&mut self, color: Color) {
        self.env_color = color;
    }

    pub fn set_blend_color(&mut self, color: Color) {
        self.blend_color = color;
    }

    pub fn set_fill_color(&mut self, color: Color) {
        self.fill_color = color;
    }

    /// The fog alpha feeds the blend constant.
    pub fn set_fog_color(&mut self, color: Color) {
        if self.fog_color != color {
            self.fog_color = color;
            self.changed |= DirtyFlags::RENDER_MODE;
        }
    }

    pub fn set_prim_depth(&mut self, z: f32, delta_z: f32) {
        self.prim_depth = PrimDepth { z, delta_z };
        self.changed |= DirtyFlags::RENDER_MODE;
    }

    pub fn set_scissor(&mut self, ulx: f32, uly: f32, lrx: f32, lry: f32) {
        self.scissor = Scissor { ulx, uly, lrx, lry };
        self.changed |= DirtyFlags::SCISSOR;
    }

    pub fn set_color_image(&mut self, format: u8, size: u8, width: u32, height: u32, address: u32) {
        self.color_image = ColorImage {
            format,
            size,
            width,
            height,
            address,
        };
        self.changed |= DirtyFlags::SCISSOR | DirtyFlags::VIEWPORT;
    }

    pub fn set_depth_image(&mut self, address: u32) {
        self.depth_image = address;
    }

    pub fn set_texture_image(&mut self, format: u8, size: u8, width: u16, address: u32) {
        self.texture_image_state = TextureImageState::new(format, size, width, address);
    }

    // MARK: - Tiles

    /// Applies the G_SETTILE fields of `settings` to tile `index`.
    pub fn set_tile(&mut self, index: usize, settings: &TileDescriptor) {
        let Some(tile) = self.tile_descriptors.get_mut(index) else {
            warn!("Tile index {} out of range", index);
            return;
        };

        tile.format = settings.format;
        tile.size = settings.size;
        tile.line = settings.line;
        tile.tmem = settings.tmem;
        tile.palette = settings.palette;
        tile.cm_s = settings.cm_s;
        tile.mask_s = settings.mask_s;
        tile.shift_s = settings.shift_s;
        tile.cm_t = settings.cm_t;
        tile.mask_t = settings.mask_t;
        tile.shift_t = settings.shift_t;

        // a tile set after a load inherits what was loaded at its address
        match self.tmem_map.get(&tile.tmem) {
            Some(entry) => {
                tile.load_type = entry.load_type;
                tile.image_address = entry.address;
                tile.frame_buffer = entry.frame_buffer;
            }
            None => tile.frame_buffer = None,
        }

        self.changed |= DirtyFlags::TILE;
    }

    pub fn set_tile_size(&mut self, index: usize, uls: u16, ult: u16, lrs: u16, lrt: u16) {
        let Some(tile) = self.tile_descriptors.get_mut(index) else {
            warn!("Tile index {} out of range", index);
            return;
        };

        tile.uls = uls;
        tile.ult = ult;
        tile.lrs = lrs;
        tile.lrt = lrt;
        self.changed |= DirtyFlags::TILE;
    }

    fn texture_image_size(image: &TextureImageState) -> ImageSize {
        ImageSize::from_u8(image.size).unwrap_or(ImageSize::G_IM_SIZ_16b)
    }

    fn record_load(
        &mut self,
        tile: usize,
        address: u32,
        load_type: LoadType,
        frame_buffer: Option<u32>,
    ) {
        let tmem = self.tile_descriptors[tile].tmem;
        self.tmem_map
            .insert(tmem, TMEMMapEntry::new(address, load_type, frame_buffer));

        for descriptor in self.tile_descriptors.iter_mut() {
            if descriptor.tmem == tmem {
                descriptor.load_type = load_type;
                descriptor.image_address = address;
                descriptor.frame_buffer = frame_buffer;
            }
        }

        self.changed |= DirtyFlags::TMEM;
    }

    // MARK: - TMEM loads

    /// Copies `lrs - uls + 1` texels from the texture image into TMEM in one run.
    pub fn load_block(
        &mut self,
        tile: usize,
        uls: u32,
        ult: u32,
        lrs: u32,
        frame_buffer: Option<u32>,
        rdram: &Rdram,
        tmem: &mut Tmem,
    ) {
        let request = LoadBlock {
            texture_image: self.texture_image_state,
            tile: tile & 7,
            uls,
            ult,
            lrs,
            frame_buffer,
        };
        self.last_load_block = Some(request);
        self.run_load_block(&request, rdram, tmem);
    }

    /// Replays the most recent block load with the texture image it used.
    pub fn repeat_last_load_block(&mut self, rdram: &Rdram, tmem: &mut Tmem) -> bool {
        match self.last_load_block {
            Some(request) => {
                self.run_load_block(&request, rdram, tmem);
                true
            }
            None => false,
        }
    }

    fn run_load_block(&mut self, request: &LoadBlock, rdram: &Rdram, tmem: &mut Tmem) {
        let image = request.texture_image;
        let size = Self::texture_image_size(&image);
        let texels = request.lrs.saturating_sub(request.uls) + 1;
        let bytes = ((size.bytes_for(texels) + 7) & !7).min(TMEM_SIZE as u32) as usize;
        let offset = size.bytes_for(request.ult * image.width as u32 + request.uls);
        let source = image.address.wrapping_add(offset);

        let dst = self.tile_descriptors[request.tile].tmem as usize * 8;
        match rdram.read(source, bytes) {
            Some(data) => tmem.write_bytes(dst, data),
            None => {
                warn!(
                    "Load block of {} bytes from {:#x} is outside RDRAM",
                    bytes, source
                );
                return;
            }
        }

        trace!("Loaded block of {} bytes from {:#x}", bytes, source);
        self.record_load(
            request.tile,
            image.address,
            LoadType::Block,
            request.frame_buffer,
        );
    }

    /// Copies a rectangle of the texture image into TMEM, one tile line per row.
    /// Coordinates are 10.2 fixed point.
    pub fn load_tile(
        &mut self,
        tile: usize,
        uls: u16,
        ult: u16,
        lrs: u16,
        lrt: u16,
        frame_buffer: Option<u32>,
        rdram: &Rdram,
        tmem: &mut Tmem,
    ) {
        let tile = tile & 7;
        self.set_tile_size(tile, uls, ult, lrs, lrt);

        let image = self.texture_image_state;
        let size = Self::texture_image_size(&image);
        let descriptor = self.tile_descriptors[tile];
        let (s0, t0) = ((uls >> 2) as u32, (ult >> 2) as u32);
        let (s1, t1) = ((lrs >> 2) as u32, (lrt >> 2) as u32);
        let row_bytes = size.bytes_for(s1.saturating_sub(s0) + 1) as usize;
        let line = descriptor.line as usize * 8;
        let base = descriptor.tmem as usize * 8;

        for t in t0..=t1.max(t0) {
            let source = image
                .address
                .wrapping_add(size.bytes_for(t * image.width as u32 + s0));
            let Some(data) = rdram.read(source, row_bytes) else {
                warn!("Load tile row at {:#x} is outside RDRAM", source);
                return;
            };
            tmem.write_bytes(base + (t - t0) as usize * line, data);
        }

        self.record_load(tile, image.address, LoadType::Tile, frame_buffer);
    }

    /// Loads palette entries, replicating each 16-bit entry four times.
    pub fn load_tlut(&mut self, tile: usize, uls: u16, lrs: u16, rdram: &Rdram, tmem: &mut Tmem) {
        let tile = tile & 7;
        let image = self.texture_image_state;
        let count = (lrs.saturating_sub(uls) >> 2) as usize + 1;
        let source = image.address.wrapping_add((uls >> 2) as u32 * 2);
        let base = self.tile_descriptors[tile].tmem as usize * 8;

        for i in 0..count {
            let Some(entry) = rdram.read_u16(source + i as u32 * 2) else {
                warn!("TLUT entry {} at {:#x} is outside RDRAM", i, source);
                break;
            };
            for copy in 0..4 {
                tmem.write_u16(base + i * 8 + copy * 2, entry);
            }
        }

        self.record_load(tile, image.address, LoadType::Tile, None);
    }

    pub fn last_load_was_block(&self) -> bool {
        self.last_load_block.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fast3d::utils::memory::TLUT_OFFSET;

    #[test]
    fn test_blender_selectors() {
        let mut mode = OtherMode::default();
        mode.l = (1 << 30) | (2 << 26) | (3 << 22) | (1 << 18) | (3 << 28) | (2 << 16);

        assert_eq!(
            mode.blender(0),
            BlenderMux {
                m1a: 1,
                m1b: 2,
                m2a: 3,
                m2b: 1
            }
        );
        assert_eq!(mode.blender(1).m1a, 3);
        assert_eq!(mode.blender(1).m2b, 2);
    }

    #[test]
    fn test_depth_fields() {
        let mut mode = OtherMode::default();
        mode.l = (1 << 2) | (1 << 4) | (3 << 10);

        assert!(mode.depth_source_is_prim());
        assert!(mode.depth_compare());
        assert!(!mode.depth_update());
        assert_eq!(mode.depth_mode(), ZMode::ZMODE_DEC);
    }

    #[test]
    fn test_other_mode_flags_only_on_change() {
        let mut rdp = RDP::new();
        rdp.changed = DirtyFlags::empty();

        rdp.set_other_mode_l(0);
        assert!(rdp.changed.is_empty());

        rdp.set_other_mode_h(1 << 20);
        assert_eq!(rdp.changed, DirtyFlags::CYCLE_TYPE);
    }

    #[test]
    fn test_load_block_fills_tmem_and_tags_tiles() {
        let mut rdram = Rdram::new(0x1000);
        let data: Vec<u8> = (0..16).collect();
        rdram.write(0x100, &data);
        let mut tmem = Tmem::new();

        let mut rdp = RDP::new();
        rdp.set_texture_image(0, 2, 8, 0x100);
        rdp.load_block(7, 0, 0, 7, None, &rdram, &mut tmem);

        assert_eq!(tmem.slice(0, 16), &data[..]);
        assert!(rdp.changed.contains(DirtyFlags::TMEM));

        // render tile set up afterwards at the same address
        let mut settings = TileDescriptor::EMPTY;
        settings.tmem = 0;
        rdp.set_tile(0, &settings);
        assert_eq!(rdp.tile_descriptors[0].load_type, LoadType::Block);
        assert_eq!(rdp.tile_descriptors[0].image_address, 0x100);
    }

    #[test]
    fn test_repeat_last_load_block_uses_original_image() {
        let mut rdram = Rdram::new(0x1000);
        rdram.write(0x200, &[7; 8]);
        let mut tmem = Tmem::new();

        let mut rdp = RDP::new();
        assert!(!rdp.repeat_last_load_block(&rdram, &mut tmem));

        rdp.set_texture_image(0, 2, 4, 0x200);
        rdp.load_block(7, 0, 0, 3, None, &rdram, &mut tmem);
        tmem.clear();
        rdp.set_texture_image(0, 2, 4, 0x800);

        assert!(rdp.repeat_last_load_block(&rdram, &mut tmem));
        assert_eq!(tmem.slice(0, 8), &[7; 8]);
    }

    #[test]
    fn test_load_tile_rows_follow_line_stride() {
        let mut rdram = Rdram::new(0x1000);
        // 4x2 image of 16-bit texels, row 1 is all 0xFF
        rdram.write(0x10, &[0xFF; 8]);
        let mut tmem = Tmem::new();

        let mut rdp = RDP::new();
        let mut settings = TileDescriptor::EMPTY;
        settings.line = 2;
        rdp.set_tile(7, &settings);
        rdp.set_texture_image(0, 2, 4, 0x8);
        rdp.load_tile(7, 0, 0, 3 << 2, 1 << 2, None, &rdram, &mut tmem);

        assert_eq!(tmem.slice(0, 8), &[0; 8]);
        assert_eq!(tmem.slice(16, 8), &[0xFF; 8]);
        assert_eq!(rdp.tile_descriptors[7].get_width(), 4);
    }

    #[test]
    fn test_load_tlut_replicates_entries() {
        let mut rdram = Rdram::new(0x100);
        rdram.write_u16(0x20, 0xF801);
        rdram.write_u16(0x22, 0x07C1);
        let mut tmem = Tmem::new();

        let mut rdp = RDP::new();
        let mut settings = TileDescriptor::EMPTY;
        settings.tmem = 256;
        rdp.set_tile(7, &settings);
        rdp.set_texture_image(0, 2, 1, 0x20);
        rdp.load_tlut(7, 0, 1 << 2, &rdram, &mut tmem);

        for copy in 0..4 {
            assert_eq!(tmem.read_u16(TLUT_OFFSET + copy * 2), 0xF801);
            assert_eq!(tmem.read_u16(TLUT_OFFSET + 8 + copy * 2), 0x07C1);
        }
    }
}
