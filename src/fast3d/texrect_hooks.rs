use log::{debug, trace};

use super::{
    graphics::GraphicsDevice,
    primitives::TexturedRectParams,
    rcp::RCP,
    rsp::MicrocodeKind,
    utils::{
        color::R5G5B5A1,
        memory::TLUT_OFFSET,
        texture::ImageSize,
        tile_descriptor::LoadType,
    },
};

const PALETTE_MOD_IMAGE: u32 = 0x400;
const PALETTE_MOD_SOURCE: u32 = 0x14d500;
const PALETTE_MOD_BYTES: usize = 4096;

/// Per-title side effects of texture rectangles, chosen once from the ROM name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpecialTexrect {
    #[default]
    None,
    ShadowMap,
    DepthBufferCopy,
    CopyToItself,
    BackgroundCopy,
    PaletteMod,
    MonochromeBackground,
}

const ROM_HOOKS: [(&str, SpecialTexrect); 12] = [
    ("Beetle", SpecialTexrect::ShadowMap),
    ("BEETLE", SpecialTexrect::ShadowMap),
    ("HSV", SpecialTexrect::ShadowMap),
    ("DUCK DODGERS", SpecialTexrect::ShadowMap),
    ("DAFFY DUCK", SpecialTexrect::ShadowMap),
    ("Perfect Dark", SpecialTexrect::DepthBufferCopy),
    ("PERFECT DARK", SpecialTexrect::DepthBufferCopy),
    ("CONKER BFD", SpecialTexrect::CopyToItself),
    ("YOSHI STORY", SpecialTexrect::BackgroundCopy),
    ("PAPER MARIO", SpecialTexrect::PaletteMod),
    ("MARIO STORY", SpecialTexrect::PaletteMod),
    ("ZELDA", SpecialTexrect::MonochromeBackground),
];

impl SpecialTexrect {
    pub fn from_rom_name(rom_name: &str) -> Self {
        ROM_HOOKS
            .iter()
            .find(|(name, _)| rom_name.contains(name))
            .map_or(SpecialTexrect::None, |(_, hook)| *hook)
    }

    /// Runs the hook for a texrect command. Returns true when the rectangle must not be drawn.
    pub fn apply(
        self,
        rcp: &mut RCP,
        params: &TexturedRectParams,
        device: &mut dyn GraphicsDevice,
    ) -> bool {
        match self {
            SpecialTexrect::None => false,
            SpecialTexrect::ShadowMap => shadow_map(rcp, device),
            SpecialTexrect::DepthBufferCopy => depth_buffer_copy(rcp, params, device),
            SpecialTexrect::CopyToItself => copy_to_itself(rcp, params, device),
            SpecialTexrect::BackgroundCopy => background_copy(rcp, params, device),
            SpecialTexrect::PaletteMod => palette_mod(rcp, params, device),
            SpecialTexrect::MonochromeBackground => monochrome_background(rcp, device),
        }
    }
}

/// The texture image is a 16-bit view into the depth image.
fn texture_image_in_depth_image(rcp: &RCP) -> bool {
    let image = &rcp.rdp.texture_image_state;
    let depth = rcp.rdp.depth_image;
    let ci_width = rcp.rdp.color_image.width;
    let depth_end = depth.saturating_add(ci_width * ci_width * 6 / 4);

    image.size == ImageSize::G_IM_SIZ_16b as u8 && image.address >= depth && image.address < depth_end
}

fn shadow_map(rcp: &mut RCP, device: &mut dyn GraphicsDevice) -> bool {
    if !texture_image_in_depth_image(rcp) {
        return false;
    }
    let Some(buffer) = rcp.frame_buffers.current() else {
        return false;
    };

    if !device.supports_image_textures() {
        return true;
    }

    trace!("Sampling depth buffer of {:#x} as shadow map", buffer.start_address);
    rcp.texture_cache
        .activate_depth_buffer_texture(0, buffer, device);
    false
}

fn depth_buffer_copy(
    rcp: &mut RCP,
    params: &TexturedRectParams,
    device: &mut dyn GraphicsDevice,
) -> bool {
    let tile = rcp.rdp.tile_descriptors[rcp.rsp.texture_tiles[0] & 7];
    if tile.load_type != LoadType::Block || !texture_image_in_depth_image(rcp) {
        return false;
    }

    if !rcp.config.frame_buffer_emulation.copy_depth_to_rdram {
        return true;
    }

    let Some(buffer) = rcp.frame_buffers.current_mut() else {
        return true;
    };
    buffer.cleared = true;

    let ci_address = rcp.rdp.color_image.address;
    let frame = rcp.video.buffers_swap_count;
    if rcp.depth_copy_frame != Some(frame) {
        rcp.depth_copy_frame = Some(frame);
        if !rcp
            .frame_buffers
            .copy_depth_buffer(device, &mut rcp.rdram, ci_address)
        {
            return true;
        }
        debug!("Copied depth buffer of {:#x} for frame {}", ci_address, frame);
    }

    rcp.rdp.repeat_last_load_block(&rcp.rdram, &mut rcp.tmem);

    let width = (params.lrx - params.ulx).max(0.0) as u32;
    let ulx = params.ulx.max(0.0) as u32;
    let source = (params.uls + 0.5).floor().max(0.0) as usize;
    for x in 0..width {
        let value = rcp.tmem.read_u16((source + x as usize) * 2);
        rcp.rdram.write_u16(ci_address + (ulx + x) * 2, value);
    }

    true
}

fn copy_to_itself(
    rcp: &mut RCP,
    params: &TexturedRectParams,
    device: &mut dyn GraphicsDevice,
) -> bool {
    if let Some(buffer) = rcp.frame_buffers.current() {
        let tile = &rcp.rdp.tile_descriptors[rcp.rsp.texture_tiles[0] & 7];
        if buffer.size == ImageSize::G_IM_SIZ_8b && tile.frame_buffer == Some(buffer.start_address)
        {
            return true;
        }
    }

    depth_buffer_copy(rcp, params, device)
}

fn background_copy(
    rcp: &mut RCP,
    params: &TexturedRectParams,
    device: &mut dyn GraphicsDevice,
) -> bool {
    if rcp.rsp.microcode != MicrocodeKind::S2DEX {
        return false;
    }

    let tile = rcp.rdp.tile_descriptors[rcp.rsp.texture_tiles[0] & 7];
    let lry = params.lry.min(rcp.rdp.scissor.lry).max(0.0) as u32;
    let uly = params.uly.max(0.0) as u32;
    let width = (params.lrx - params.ulx).max(0.0) as usize;
    let tex_width = (tile.line as u32) << 3;

    let image_address = rcp
        .rdp
        .tmem_map
        .get(&tile.tmem)
        .map_or(tile.image_address, |entry| entry.address);
    let source = image_address + tex_width * params.ult.max(0.0) as u32 + params.uls.max(0.0) as u32;
    let color_image = rcp.rdp.color_image;
    let target = color_image.address + params.ulx.max(0.0) as u32;

    for y in uly..lry {
        rcp.rdram.copy_within(
            source + (y - uly) * tex_width,
            target + y * color_image.width,
            width,
        );
    }

    rcp.remove_frame_buffer(color_image.address, device);
    true
}

fn palette_mod(
    rcp: &mut RCP,
    params: &TexturedRectParams,
    device: &mut dyn GraphicsDevice,
) -> bool {
    let color_image = rcp.rdp.color_image;

    if rcp.rdp.texture_image_state.address == PALETTE_MOD_IMAGE {
        if color_image.address == PALETTE_MOD_IMAGE && color_image.width == 64 {
            rcp.rdram
                .copy_within(PALETTE_MOD_SOURCE, PALETTE_MOD_IMAGE, PALETTE_MOD_BYTES);
            return true;
        }

        if rcp.rdp.texture_image_state.width == 64 {
            // sample the freshly loaded TMEM rather than a frame buffer alias
            rcp.rdp.tile_descriptors[0].frame_buffer = None;
            rcp.update_texture(0, 0, device);
        }
        return false;
    }

    let scissor = rcp.rdp.scissor;
    if scissor.lrx != 16.0 || scissor.lry != 1.0 || params.lrx != 16.0 || params.lry != 1.0 {
        return false;
    }

    let env = R5G5B5A1::from_rgb(rcp.rdp.env_color);
    let prim = R5G5B5A1::from_rgb(rcp.rdp.prim_color);
    for i in 0..16 {
        let entry = rcp.tmem.read_u16(TLUT_OFFSET + i * 8);
        let value = if entry & 0x100 != 0 { prim } else { env };
        rcp.rdram.write_u16(color_image.address + i as u32 * 2, value);
    }

    true
}

fn monochrome_background(rcp: &mut RCP, device: &mut dyn GraphicsDevice) -> bool {
    let color_image = rcp.rdp.color_image;
    let address = rcp.rdp.texture_image_state.address;
    let end = color_image.address + color_image.width * color_image.height * 2;
    if address < color_image.address || address > end {
        return false;
    }

    if !device.supports_image_textures() {
        return true;
    }

    let Some(buffer) = rcp.frame_buffers.current() else {
        return true;
    };
    let tile = rcp.rdp.tile_descriptors[rcp.rsp.texture_tiles[0] & 7];
    let linear_filter = rcp.texture_linear_filter();
    !rcp
        .texture_cache
        .add_frame_buffer_texture(0, &tile, buffer, linear_filter, device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fast3d::{
        config::Config,
        framebuffer::{DepthBuffer, FrameBuffer},
        graphics::dummy_device::{DeviceCall, DummyGraphicsDevice},
        utils::color::Color,
    };

    fn setup() -> (RCP, DummyGraphicsDevice) {
        let mut device = DummyGraphicsDevice::new();
        let mut rcp = RCP::new(Config::default());
        rcp.init(&mut device);
        device.calls.clear();
        (rcp, device)
    }

    #[test]
    fn test_hook_from_rom_name() {
        assert_eq!(
            SpecialTexrect::from_rom_name("PERFECT DARK"),
            SpecialTexrect::DepthBufferCopy
        );
        assert_eq!(
            SpecialTexrect::from_rom_name("THE LEGEND OF ZELDA"),
            SpecialTexrect::MonochromeBackground
        );
        assert_eq!(
            SpecialTexrect::from_rom_name("PAPER MARIO"),
            SpecialTexrect::PaletteMod
        );
        assert_eq!(SpecialTexrect::from_rom_name("SUPER MARIO 64"), SpecialTexrect::None);
        assert_eq!(SpecialTexrect::from_rom_name(""), SpecialTexrect::None);
    }

    fn depth_copy_setup() -> (RCP, DummyGraphicsDevice) {
        let (mut rcp, mut device) = setup();
        let mut buffer = FrameBuffer::new(0x20_0000, 320, 1, ImageSize::G_IM_SIZ_16b);
        buffer.depth_buffer = Some(DepthBuffer {
            address: 0x10_0000,
            texture: Some(9),
        });
        rcp.frame_buffers.add_buffer(buffer);
        rcp.rdp.set_color_image(0, 2, 320, 1, 0x20_0000);
        rcp.rdp.set_depth_image(0x10_0000);

        rcp.rdram.write(0x10_0000, &[0xAA, 0xAA, 0xBB, 0xBB, 0xCC, 0xCC, 0xDD, 0xDD]);
        rcp.rdp.set_texture_image(0, 2, 320, 0x10_0000);
        rcp.rdp
            .load_block(0, 0, 0, 3, None, &rcp.rdram, &mut rcp.tmem);
        rcp.tmem.clear();

        device.depth_readback = Some(vec![0x1234; 4]);
        (rcp, device)
    }

    fn line_rect() -> TexturedRectParams {
        TexturedRectParams {
            lrx: 4.0,
            lry: 1.0,
            texrect_cmd: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_depth_copy_once_per_frame() {
        let (mut rcp, mut device) = depth_copy_setup();
        let hook = SpecialTexrect::DepthBufferCopy;

        assert!(hook.apply(&mut rcp, &line_rect(), &mut device));
        assert!(hook.apply(&mut rcp, &line_rect(), &mut device));
        assert_eq!(
            device.count(|call| matches!(call, DeviceCall::ReadDepthBuffer(_))),
            1
        );

        // depth landed in the depth image, was reloaded into TMEM and copied into the line
        assert_eq!(rcp.rdram.read_u16(0x10_0000), Some(0x1234));
        assert_eq!(rcp.rdram.read_u16(0x10_0006), Some(0x1234));
        assert_eq!(rcp.rdram.read_u16(0x20_0000), Some(0x1234));
        assert_eq!(rcp.rdram.read_u16(0x20_0006), Some(0x1234));
        assert_eq!(rcp.rdram.read_u16(0x20_0008), Some(0));
        assert!(rcp.frame_buffers.current().map_or(false, |b| b.cleared));

        rcp.swap_buffers();
        device.depth_readback = Some(vec![0x5678; 4]);
        hook.apply(&mut rcp, &line_rect(), &mut device);
        assert_eq!(rcp.rdram.read_u16(0x20_0002), Some(0x5678));
        assert_eq!(
            device.count(|call| matches!(call, DeviceCall::ReadDepthBuffer(_))),
            2
        );
    }

    #[test]
    fn test_depth_copy_ignores_other_images() {
        let (mut rcp, mut device) = depth_copy_setup();
        rcp.rdp.set_texture_image(0, 2, 320, 0x30_0000);

        assert!(!SpecialTexrect::DepthBufferCopy.apply(&mut rcp, &line_rect(), &mut device));
        assert_eq!(device.count(|call| matches!(call, DeviceCall::ReadDepthBuffer(_))), 0);
    }

    #[test]
    fn test_palette_mod_builds_light_palette() {
        let (mut rcp, mut device) = setup();
        rcp.rdp.set_color_image(0, 2, 16, 1, 0x1000);
        rcp.rdp.set_scissor(0.0, 0.0, 16.0, 1.0);
        rcp.rdp.set_prim_color(Color::RGBA(255, 255, 255, 255));
        rcp.rdp.set_env_color(Color::RGBA(0, 0, 0, 255));
        for i in (0..16).step_by(2) {
            rcp.tmem.write_u16(TLUT_OFFSET + i * 8, 0x100);
        }

        let params = TexturedRectParams {
            lrx: 16.0,
            lry: 1.0,
            texrect_cmd: true,
            ..Default::default()
        };
        assert!(SpecialTexrect::PaletteMod.apply(&mut rcp, &params, &mut device));

        assert_eq!(rcp.rdram.read_u16(0x1000), Some(0xFFFF));
        assert_eq!(rcp.rdram.read_u16(0x1002), Some(0x0001));
        assert_eq!(rcp.rdram.read_u16(0x101E), Some(0x0001));
    }

    #[test]
    fn test_palette_mod_copies_palette_image() {
        let (mut rcp, mut device) = setup();
        rcp.rdram.write(PALETTE_MOD_SOURCE, &[1, 2, 3, 4]);
        rcp.rdp.set_texture_image(0, 2, 64, PALETTE_MOD_IMAGE);
        rcp.rdp.set_color_image(0, 2, 64, 64, PALETTE_MOD_IMAGE);

        assert!(SpecialTexrect::PaletteMod.apply(&mut rcp, &line_rect(), &mut device));
        assert_eq!(rcp.rdram.read(PALETTE_MOD_IMAGE, 4), Some(&[1, 2, 3, 4][..]));
    }

    #[test]
    fn test_background_copy_needs_sprite_microcode() {
        let (mut rcp, mut device) = setup();
        rcp.frame_buffers
            .add_buffer(FrameBuffer::new(0x8000, 8, 2, ImageSize::G_IM_SIZ_8b));
        rcp.rdp.set_color_image(0, 1, 8, 2, 0x8000);
        rcp.rdp.set_scissor(0.0, 0.0, 8.0, 2.0);
        rcp.rdp.tile_descriptors[0].line = 1;
        rcp.rdp.tile_descriptors[0].image_address = 0x4000;
        rcp.rdram.write(0x4000, &[7; 16]);

        let params = TexturedRectParams {
            lrx: 8.0,
            lry: 2.0,
            texrect_cmd: true,
            ..Default::default()
        };
        assert!(!SpecialTexrect::BackgroundCopy.apply(&mut rcp, &params, &mut device));

        rcp.rsp.microcode = MicrocodeKind::S2DEX;
        assert!(SpecialTexrect::BackgroundCopy.apply(&mut rcp, &params, &mut device));
        assert_eq!(rcp.rdram.read(0x8000, 16), Some(&[7; 16][..]));
        assert!(rcp.frame_buffers.get(0x8000).is_none());
    }

    #[test]
    fn test_shadow_map_requires_image_textures() {
        let (mut rcp, mut device) = depth_copy_setup();

        assert!(SpecialTexrect::ShadowMap.apply(&mut rcp, &line_rect(), &mut device));

        device.image_textures = true;
        assert!(!SpecialTexrect::ShadowMap.apply(&mut rcp, &line_rect(), &mut device));
        assert_eq!(
            rcp.texture_cache.current(0).map(|t| t.id),
            Some(9)
        );
    }
}
