use std::collections::VecDeque;

use log::{debug, trace, warn};
use rustc_hash::FxHashMap;
use wgpu::AddressMode;

use super::{
    fingerprint::{texture_fingerprint, TextureParams},
    memory::Tmem,
    texture::{
        palette_len, palette_offset, ImageFormat, ImageSize, TextureDimensions, TextureLUT,
    },
    texture_loader::TextureLoader,
    tile_descriptor::TileDescriptor,
};
use crate::fast3d::{
    framebuffer::{FrameBuffer, FrameBufferList},
    graphics::{GraphicsDevice, SamplerState, TextureId},
};

pub const NUM_TEXTURE_SLOTS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureSource {
    Regular,
    FrameBuffer,
    DepthBuffer,
    Dummy,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CachedTexture {
    pub id: TextureId,
    pub fingerprint: u64,
    pub source: TextureSource,

    pub tmem: u16,
    pub palette: u8,
    pub format: ImageFormat,
    pub size: ImageSize,
    pub image_address: u32,

    pub width: u32,
    pub height: u32,
    pub clamp_width: u32,
    pub clamp_height: u32,
    pub real_width: u32,
    pub real_height: u32,
    /// Maps N64 texels to normalized coordinates
    pub scale_s: f32,
    pub scale_t: f32,
    pub shift_scale_s: f32,
    pub shift_scale_t: f32,
    /// Origin inside a frame buffer texture, in texels
    pub offset_s: f32,
    pub offset_t: f32,

    pub clamp_s: bool,
    pub clamp_t: bool,
    pub mirror_s: bool,
    pub mirror_t: bool,
    pub mask_s: u8,
    pub mask_t: u8,
    pub max_level: u8,

    pub hires: bool,
    pub byte_size: usize,
    pub last_used_frame: u64,
}

fn shift_scale(shift: u8) -> f32 {
    match shift {
        0 => 1.0,
        // shifts above 10 are left shifts
        11..=15 => (1 << (16 - shift as u32)) as f32,
        _ => 1.0 / (1 << shift.min(15)) as f32,
    }
}

impl CachedTexture {
    pub fn from_tile(
        tile: &TileDescriptor,
        dims: &TextureDimensions,
        fingerprint: u64,
        id: TextureId,
    ) -> Self {
        CachedTexture {
            id,
            fingerprint,
            source: TextureSource::Regular,

            tmem: tile.tmem,
            palette: tile.palette,
            format: tile.format,
            size: tile.size,
            image_address: tile.image_address,

            width: dims.width,
            height: dims.height,
            clamp_width: dims.clamp_width,
            clamp_height: dims.clamp_height,
            real_width: dims.real_width,
            real_height: dims.real_height,
            scale_s: 1.0 / dims.real_width as f32,
            scale_t: 1.0 / dims.real_height as f32,
            shift_scale_s: shift_scale(tile.shift_s),
            shift_scale_t: shift_scale(tile.shift_t),
            offset_s: 0.0,
            offset_t: 0.0,

            clamp_s: tile.clamp_s(),
            clamp_t: tile.clamp_t(),
            mirror_s: tile.mirror_s(),
            mirror_t: tile.mirror_t(),
            mask_s: dims.mask_s,
            mask_t: dims.mask_t,
            max_level: 0,

            hires: false,
            byte_size: 0,
            last_used_frame: 0,
        }
    }

    fn from_frame_buffer(buffer: &FrameBuffer, id: TextureId, source: TextureSource) -> Self {
        let width = buffer.width.max(1);
        let height = buffer.height.max(1);
        CachedTexture {
            id,
            fingerprint: 0,
            source,

            tmem: 0,
            palette: 0,
            format: ImageFormat::G_IM_FMT_RGBA,
            size: buffer.size,
            image_address: buffer.start_address,

            width,
            height,
            clamp_width: width,
            clamp_height: height,
            real_width: width,
            real_height: height,
            scale_s: 1.0 / width as f32,
            scale_t: 1.0 / height as f32,
            shift_scale_s: 1.0,
            shift_scale_t: 1.0,
            offset_s: 0.0,
            offset_t: 0.0,

            clamp_s: true,
            clamp_t: true,
            mirror_s: false,
            mirror_t: false,
            mask_s: 0,
            mask_t: 0,
            max_level: 0,

            hires: false,
            byte_size: 0,
            last_used_frame: 0,
        }
    }

    fn dummy(id: TextureId) -> Self {
        let tile = TileDescriptor::EMPTY;
        let dims = TextureDimensions {
            width: 1,
            height: 1,
            clamp_width: 1,
            clamp_height: 1,
            real_width: 1,
            real_height: 1,
            mask_s: 0,
            mask_t: 0,
            line_bytes: 8,
        };
        CachedTexture {
            source: TextureSource::Dummy,
            byte_size: 4,
            ..Self::from_tile(&tile, &dims, 0, id)
        }
    }

    pub fn sampler(&self, linear_filter: bool) -> SamplerState {
        SamplerState {
            linear_filter,
            address_s: address_mode(self.clamp_s, self.mirror_s),
            address_t: address_mode(self.clamp_t, self.mirror_t),
            max_level: self.max_level,
        }
    }
}

fn address_mode(clamp: bool, mirror: bool) -> AddressMode {
    if clamp {
        AddressMode::ClampToEdge
    } else if mirror {
        AddressMode::MirrorRepeat
    } else {
        AddressMode::Repeat
    }
}

/// What a texture slot is bound to.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Binding {
    Regular(u64),
    FrameBuffer(u32),
    Detached(CachedTexture),
}

struct FrameBufferTexture {
    texture: CachedTexture,
    end_address: u32,
}

/// Everything needed to activate one texture slot.
#[derive(Clone, Copy, Debug)]
pub struct TextureRequest {
    pub tile: TileDescriptor,
    pub tlut: TextureLUT,
    pub linear_filter: bool,
    pub frame: u64,
}

pub struct TextureCache {
    textures: FxHashMap<u64, CachedTexture>,
    frame_buffer_textures: FxHashMap<u32, FrameBufferTexture>,
    lru: VecDeque<u64>,
    current: [Option<Binding>; NUM_TEXTURE_SLOTS],
    dummy: Option<CachedTexture>,

    pub max_bytes: usize,
    cached_bytes: usize,
    hits: u64,
    misses: u64,
}

impl TextureCache {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            textures: FxHashMap::default(),
            frame_buffer_textures: FxHashMap::default(),
            lru: VecDeque::new(),
            current: [None; NUM_TEXTURE_SLOTS],
            dummy: None,

            max_bytes,
            cached_bytes: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn init(&mut self, device: &mut dyn GraphicsDevice) {
        self.destroy(device);

        let id = device.new_texture();
        device.select_texture(0, id);
        device.upload_texture(&[0, 0, 0, 0], 1, 1);
        device.set_sampler_parameters(0, SamplerState::NEAREST_CLAMP);
        self.dummy = Some(CachedTexture::dummy(id));
    }

    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, texture) in self.textures.drain() {
            device.delete_texture(texture.id);
        }
        if let Some(dummy) = self.dummy.take() {
            device.delete_texture(dummy.id);
        }

        // frame buffer textures belong to their buffers
        self.frame_buffer_textures.clear();
        self.lru.clear();
        self.current = [None; NUM_TEXTURE_SLOTS];
        self.cached_bytes = 0;
        self.hits = 0;
        self.misses = 0;
    }

    // MARK: - Activation

    /// Binds the texture described by `request.tile` to `slot`, loading it on a miss.
    /// Anything that cannot be decoded binds the dummy texture instead.
    pub fn update(
        &mut self,
        slot: usize,
        request: &TextureRequest,
        tmem: &Tmem,
        loader: &mut TextureLoader,
        frame_buffers: &FrameBufferList,
        device: &mut dyn GraphicsDevice,
    ) {
        let slot = slot % NUM_TEXTURE_SLOTS;
        let tile = &request.tile;

        if let Some(buffer) = tile.frame_buffer.and_then(|address| frame_buffers.get(address)) {
            if self.add_frame_buffer_texture(slot, tile, buffer, request.linear_filter, device) {
                return;
            }
        }

        let dims = match TextureDimensions::from_tile(tile) {
            Ok(dims) => dims,
            Err(error) => {
                warn!("Tile {:?} not loadable: {}", tile, error);
                self.activate_dummy(slot, device);
                return;
            }
        };

        let params = TextureParams::new(tile, &dims, request.tlut);
        let texels = tmem.wrapping_slices(tile.tmem as usize * 8, dims.tmem_bytes());
        let palette = match palette_len(tile, request.tlut) {
            0 => None,
            len => Some(tmem.slice(palette_offset(tile), len)),
        };
        let fingerprint = texture_fingerprint(&texels, palette, &params);

        if let Some(texture) = self.textures.get_mut(&fingerprint) {
            texture.last_used_frame = request.frame;
            // shifts only affect coordinates, so tiles with other shifts share the entry
            texture.shift_scale_s = shift_scale(tile.shift_s);
            texture.shift_scale_t = shift_scale(tile.shift_t);
            let texture = *texture;
            self.touch(fingerprint);
            self.current[slot] = Some(Binding::Regular(fingerprint));
            self.hits += 1;
            trace!("Texture cache hit {:#018x} on slot {}", fingerprint, slot);
            Self::activate_texture(slot, &texture, request.linear_filter, device);
            return;
        }

        self.misses += 1;
        let id = device.new_texture();
        device.select_texture(slot, id);

        let mut texture = CachedTexture::from_tile(tile, &dims, fingerprint, id);
        texture.last_used_frame = request.frame;
        if let Err(error) =
            loader.load(tile, request.tlut, tmem, &dims, &mut texture, device)
        {
            warn!("Failed to load texture {:#018x}: {}", fingerprint, error);
            device.delete_texture(id);
            self.activate_dummy(slot, device);
            return;
        }

        debug!(
            "Texture cache miss {:#018x}: {:?} {:?} {}x{}",
            fingerprint, tile.format, tile.size, dims.width, dims.height
        );
        self.cached_bytes += texture.byte_size;
        self.textures.insert(fingerprint, texture);
        self.lru.push_back(fingerprint);
        self.current[slot] = Some(Binding::Regular(fingerprint));
        Self::activate_texture(slot, &texture, request.linear_filter, device);

        self.check_cache_size(device);
    }

    fn activate_texture(
        slot: usize,
        texture: &CachedTexture,
        linear_filter: bool,
        device: &mut dyn GraphicsDevice,
    ) {
        device.select_texture(slot, texture.id);
        device.set_sampler_parameters(slot, texture.sampler(linear_filter));
    }

    pub fn activate_dummy(&mut self, slot: usize, device: &mut dyn GraphicsDevice) {
        let slot = slot % NUM_TEXTURE_SLOTS;
        match self.dummy {
            Some(dummy) => {
                self.current[slot] = Some(Binding::Detached(dummy));
                Self::activate_texture(slot, &dummy, false, device);
            }
            None => {
                warn!("Dummy texture requested before the cache was initialized");
                self.current[slot] = None;
            }
        }
    }

    /// Samples the color texture of `buffer` through `tile`. Returns false when the
    /// buffer has no texture to sample.
    pub fn add_frame_buffer_texture(
        &mut self,
        slot: usize,
        tile: &TileDescriptor,
        buffer: &FrameBuffer,
        linear_filter: bool,
        device: &mut dyn GraphicsDevice,
    ) -> bool {
        let Some(id) = buffer.texture else {
            return false;
        };
        let slot = slot % NUM_TEXTURE_SLOTS;

        if self.frame_buffer_textures.contains_key(&buffer.start_address) {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        let entry = self
            .frame_buffer_textures
            .entry(buffer.start_address)
            .or_insert_with(|| FrameBufferTexture {
                texture: CachedTexture::from_frame_buffer(buffer, id, TextureSource::FrameBuffer),
                end_address: buffer.end_address,
            });

        // the same buffer can be sampled from a different origin by every tile
        let texel_shift = match buffer.size {
            ImageSize::G_IM_SIZ_4b | ImageSize::G_IM_SIZ_8b => 0,
            size => size as u32 - 1,
        };
        let shift = tile.image_address.saturating_sub(buffer.start_address) >> texel_shift;
        let texture = &mut entry.texture;
        texture.offset_s = (shift % texture.width) as f32;
        texture.offset_t = texture.height as f32 - (shift / texture.width) as f32;
        texture.shift_scale_s = shift_scale(tile.shift_s);
        texture.shift_scale_t = shift_scale(tile.shift_t);

        let texture = *texture;
        self.current[slot] = Some(Binding::FrameBuffer(buffer.start_address));
        trace!(
            "Sampling frame buffer {:#x} at ({}, {})",
            buffer.start_address,
            texture.offset_s,
            texture.offset_t
        );
        Self::activate_texture(slot, &texture, linear_filter, device);
        true
    }

    pub fn activate_depth_buffer_texture(
        &mut self,
        slot: usize,
        buffer: &FrameBuffer,
        device: &mut dyn GraphicsDevice,
    ) -> bool {
        let Some(id) = buffer.depth_buffer.and_then(|depth| depth.texture) else {
            return false;
        };
        let slot = slot % NUM_TEXTURE_SLOTS;

        let texture = CachedTexture::from_frame_buffer(buffer, id, TextureSource::DepthBuffer);
        self.current[slot] = Some(Binding::Detached(texture));
        Self::activate_texture(slot, &texture, false, device);
        true
    }

    pub fn remove_frame_buffer_texture(&mut self, start_address: u32) -> bool {
        self.frame_buffer_textures.remove(&start_address).is_some()
    }

    /// Drops frame buffer textures whose source overlaps `[start, end]`.
    pub fn invalidate_frame_buffer_range(&mut self, start: u32, end: u32) -> usize {
        let before = self.frame_buffer_textures.len();
        self.frame_buffer_textures.retain(|address, entry| {
            let overlaps = start <= entry.end_address && end >= *address;
            if overlaps {
                debug!("Invalidating frame buffer texture {:#x}", address);
            }
            !overlaps
        });
        before - self.frame_buffer_textures.len()
    }

    // MARK: - Bookkeeping

    fn touch(&mut self, fingerprint: u64) {
        self.lru.retain(|key| *key != fingerprint);
        self.lru.push_back(fingerprint);
    }

    fn is_bound(&self, fingerprint: u64) -> bool {
        self.current
            .iter()
            .any(|binding| *binding == Some(Binding::Regular(fingerprint)))
    }

    /// Evicts least recently used textures until the budget holds. Bound textures stay.
    pub fn check_cache_size(&mut self, device: &mut dyn GraphicsDevice) {
        while self.cached_bytes > self.max_bytes {
            let Some(position) = self.lru.iter().position(|key| !self.is_bound(*key)) else {
                break;
            };
            let Some(fingerprint) = self.lru.remove(position) else {
                break;
            };

            if let Some(texture) = self.textures.remove(&fingerprint) {
                debug!(
                    "Evicting texture {:#018x} ({} bytes)",
                    fingerprint, texture.byte_size
                );
                device.delete_texture(texture.id);
                self.cached_bytes -= texture.byte_size;
            }
        }
    }

    pub fn current(&self, slot: usize) -> Option<&CachedTexture> {
        match self.current.get(slot)?.as_ref()? {
            Binding::Regular(fingerprint) => self.textures.get(fingerprint),
            Binding::FrameBuffer(address) => self
                .frame_buffer_textures
                .get(address)
                .map(|entry| &entry.texture),
            Binding::Detached(texture) => Some(texture),
        }
    }

    pub fn contains(&self, fingerprint: u64) -> bool {
        self.textures.contains_key(&fingerprint)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn cached_bytes(&self) -> usize {
        self.cached_bytes
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
