use log::{debug, info};

use super::{
    config::{Config, Hacks},
    framebuffer::FrameBufferList,
    graphics::GraphicsDevice,
    hires::HiresTextureProvider,
    primitives::PrimitiveBatch,
    rdp::{OtherModeH_Layout, RDP},
    render_state::DirtyFlags,
    rsp::RSP,
    texrect_hooks::SpecialTexrect,
    utils::{
        memory::{Rdram, Tmem, RDRAM_SIZE},
        texture_cache::TextureCache,
        texture_loader::TextureLoader,
    },
    video::VideoState,
};

/// Render context: N64 state, the memories it reads, and every GPU-side cache.
pub struct RCP {
    pub rdp: RDP,
    pub rsp: RSP,

    pub tmem: Tmem,
    pub rdram: Rdram,

    pub texture_cache: TextureCache,
    pub loader: TextureLoader,
    pub frame_buffers: FrameBufferList,

    pub config: Config,
    pub video: VideoState,

    pub special_texrect: SpecialTexrect,
    pub rom_name: String,

    pub(crate) batch: PrimitiveBatch,
    /// Swap count of the last depth buffer copy to RDRAM
    pub(crate) depth_copy_frame: Option<u64>,
}

impl RCP {
    pub fn new(config: Config) -> Self {
        RCP {
            rdp: RDP::new(),
            rsp: RSP::new(),

            tmem: Tmem::new(),
            rdram: Rdram::new(RDRAM_SIZE),

            texture_cache: TextureCache::new(config.texture.max_bytes),
            loader: TextureLoader::new(),
            frame_buffers: FrameBufferList::new(),

            config,
            video: VideoState::new(),

            special_texrect: SpecialTexrect::None,
            rom_name: String::new(),

            batch: PrimitiveBatch::new(),
            depth_copy_frame: None,
        }
    }

    pub fn init(&mut self, device: &mut dyn GraphicsDevice) {
        self.texture_cache.init(device);
        self.rdp.changed = DirtyFlags::all();
        self.rsp.changed = DirtyFlags::all();
    }

    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        self.texture_cache.destroy(device);
        self.frame_buffers.clear(device);
        self.loader.filter.shutdown();
        self.batch = PrimitiveBatch::new();
    }

    pub fn reset(&mut self) {
        self.rdp.reset();
        self.rsp.reset();
        self.batch.clear();
        self.depth_copy_frame = None;
    }

    pub fn set_rom_name(&mut self, rom_name: &str) {
        self.rom_name = rom_name.trim_end_matches('\0').trim().to_string();
        self.special_texrect = SpecialTexrect::from_rom_name(&self.rom_name);
        info!(
            "Loaded {} with texrect hook {:?}",
            self.rom_name, self.special_texrect
        );
    }

    /// Hands the hi-res texture configuration to `provider`. Returns whether replacement is active.
    pub fn init_texture_filter(&mut self, provider: Box<dyn HiresTextureProvider>) -> bool {
        self.loader
            .filter
            .init(&self.config.texture_filter, &self.rom_name, provider)
    }

    pub fn set_screen_size(&mut self, width: u32, height: u32) {
        self.video
            .set_screen_size(width, height, &self.config.frame_buffer_emulation);
        self.rsp.changed |= DirtyFlags::VIEWPORT;
        self.rdp.changed |= DirtyFlags::SCISSOR;
    }

    /// Ends the frame: render mode and TLUT mode go back to their power-on values.
    pub fn swap_buffers(&mut self) {
        self.rdp.set_other_mode_l(0);
        if !self
            .config
            .generation
            .hacks
            .contains(Hacks::DO_NOT_RESET_TLUT_MODE)
        {
            let tlut_mask = 0b11 << OtherModeH_Layout::G_MDSFT_TEXTLUT as u32;
            self.rdp.set_other_mode_h(self.rdp.other_mode.h & !tlut_mask);
        }
        self.video.buffers_swap_count += 1;
    }

    // MARK: - Memory

    /// CPU-side write into RDRAM. Textures sampled from the written range are dropped.
    pub fn write_rdram(&mut self, address: u32, data: &[u8]) -> bool {
        if !self.rdram.write(address, data) {
            return false;
        }

        let end = address + data.len().saturating_sub(1) as u32;
        if self
            .texture_cache
            .invalidate_frame_buffer_range(address, end)
            > 0
        {
            self.rdp.changed |= DirtyFlags::TMEM;
        }
        true
    }

    /// The current buffer was rendered into, so sampling it needs a fresh texture.
    pub fn frame_buffer_written(&mut self) {
        let Some(buffer) = self.frame_buffers.current() else {
            return;
        };
        if self
            .texture_cache
            .invalidate_frame_buffer_range(buffer.start_address, buffer.end_address)
            > 0
        {
            self.rdp.changed |= DirtyFlags::TMEM;
        }
    }

    pub fn remove_frame_buffer(&mut self, address: u32, device: &mut dyn GraphicsDevice) {
        let Some(buffer) = self.frame_buffers.remove_buffer(address) else {
            return;
        };

        debug!("Removing frame buffer {:#x}", address);
        self.texture_cache.remove_frame_buffer_texture(address);
        if let Some(id) = buffer.texture {
            device.delete_texture(id);
        }
        if let Some(id) = buffer.depth_buffer.and_then(|depth| depth.texture) {
            device.delete_texture(id);
        }
    }

    fn frame_buffer_at_texture_image(&self) -> Option<u32> {
        self.frame_buffers
            .find(self.rdp.texture_image_state.address)
            .map(|buffer| buffer.start_address)
    }

    // MARK: - TMEM loads

    pub fn load_block(&mut self, tile: usize, uls: u32, ult: u32, lrs: u32) {
        let frame_buffer = self.frame_buffer_at_texture_image();
        self.rdp
            .load_block(tile, uls, ult, lrs, frame_buffer, &self.rdram, &mut self.tmem);
    }

    pub fn load_tile(&mut self, tile: usize, uls: u16, ult: u16, lrs: u16, lrt: u16) {
        let frame_buffer = self.frame_buffer_at_texture_image();
        self.rdp.load_tile(
            tile,
            uls,
            ult,
            lrs,
            lrt,
            frame_buffer,
            &self.rdram,
            &mut self.tmem,
        );
    }

    pub fn load_tlut(&mut self, tile: usize, uls: u16, lrs: u16) {
        self.rdp
            .load_tlut(tile, uls, lrs, &self.rdram, &mut self.tmem);
    }
}
