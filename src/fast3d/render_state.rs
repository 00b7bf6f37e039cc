use bitflags::bitflags;
use log::trace;
use wgpu::CompareFunction;

use super::{
    blender::{translate_blend_mode, BlendInputs, BlendMode},
    gbi::utils::translate_cull_mode,
    graphics::{GraphicsDevice, Rect},
    rcp::RCP,
    rdp::{OtherModeHCycleType, ZMode},
    rsp::RSPGeometry,
    utils::{
        texture::TextFilt,
        texture_cache::{TextureRequest, NUM_TEXTURE_SLOTS},
    },
};

bitflags! {
    /// State groups that changed since the last draw.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DirtyFlags: u32 {
        const GEOMETRY_MODE = 1 << 0;
        const RENDER_MODE = 1 << 1;
        const CYCLE_TYPE = 1 << 2;
        const TEXTURE = 1 << 3;
        const TILE = 1 << 4;
        const TMEM = 1 << 5;
        const SCISSOR = 1 << 6;
        const VIEWPORT = 1 << 7;
        const LIGHT = 1 << 8;
        const COMBINE = 1 << 9;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderKind {
    Triangle,
    Line,
    FilledRect,
    TexturedRect,
}

/// Snapshot of the dirty groups for one draw. Taking it clears the sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateDiff {
    changed: DirtyFlags,
    kind: RenderKind,
}

impl StateDiff {
    pub fn capture(rdp: &mut DirtyFlags, rsp: &mut DirtyFlags, kind: RenderKind) -> Self {
        let changed = *rdp | *rsp;
        *rdp = DirtyFlags::empty();
        *rsp = DirtyFlags::empty();
        Self { changed, kind }
    }

    pub fn any(&self, flags: DirtyFlags) -> bool {
        self.changed.intersects(flags)
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn kind(&self) -> RenderKind {
        self.kind
    }
}

impl RCP {
    /// Brings the device in line with the N64 state before a draw of `kind`.
    pub fn synchronize(&mut self, kind: RenderKind, device: &mut dyn GraphicsDevice) {
        let diff = StateDiff::capture(&mut self.rdp.changed, &mut self.rsp.changed, kind);
        trace!("Synchronizing {:?} with {:?}", kind, diff.changed);

        if diff.any(DirtyFlags::GEOMETRY_MODE) {
            device.set_cull_mode(translate_cull_mode(self.rsp.geometry_mode));
        }

        if diff.any(DirtyFlags::RENDER_MODE | DirtyFlags::CYCLE_TYPE) {
            self.update_depth(device);
        }

        if diff.any(DirtyFlags::SCISSOR) {
            self.update_scissor(device);
        }

        if diff.any(DirtyFlags::VIEWPORT) {
            self.update_viewport(device);
        }

        if diff.any(
            DirtyFlags::TEXTURE | DirtyFlags::TILE | DirtyFlags::TMEM | DirtyFlags::COMBINE,
        ) || kind == RenderKind::TexturedRect
        {
            self.update_textures(device);
        }

        if diff.any(DirtyFlags::RENDER_MODE | DirtyFlags::CYCLE_TYPE) {
            self.update_blend(device);
        }

        if diff.any(DirtyFlags::LIGHT) && self.config.generation.enable_hw_lighting {
            device.set_lights(&self.rsp.lights[..=self.rsp.num_lights]);
        }

        self.update_depth_as_texture(device);
    }

    fn update_depth(&self, device: &mut dyn GraphicsDevice) {
        if self.config.frame_buffer_emulation.n64_depth_compare {
            device.set_depth_test(false);
            device.set_depth_write(false);
            return;
        }

        let mode = &self.rdp.other_mode;
        let depth_enabled = (self.rsp.has_geometry_mode(RSPGeometry::G_ZBUFFER)
            || mode.depth_source_is_prim())
            && mode.cycle_type() <= OtherModeHCycleType::G_CYC_2CYCLE;

        if !depth_enabled {
            device.set_depth_test(false);
            device.set_depth_clamp(true);
            return;
        }

        let (compare, polygon_offset) = if mode.depth_compare() {
            match mode.depth_mode() {
                ZMode::ZMODE_OPA | ZMode::ZMODE_INTER => (CompareFunction::LessEqual, false),
                ZMode::ZMODE_XLU => {
                    if mode.depth_source_is_prim() && self.rdp.prim_depth.z == 1.0 {
                        (CompareFunction::LessEqual, false)
                    } else {
                        (CompareFunction::Less, false)
                    }
                }
                ZMode::ZMODE_DEC => (CompareFunction::LessEqual, true),
            }
        } else {
            (CompareFunction::Always, false)
        };

        device.set_polygon_offset(polygon_offset);
        device.set_depth_compare(compare);
        device.set_depth_write(mode.depth_update());
        device.set_depth_test(true);
        device.set_depth_clamp(false);
    }

    /// Games that render 4:3 into a wider color image get their X squeezed.
    fn needs_adjust(&self) -> bool {
        let ci_width = self.rdp.color_image.width;
        self.video.adjust_screen
            && self.rsp.viewport.width < ci_width as f32
            && ci_width > self.video.vi_width * 98 / 100
    }

    fn update_scissor(&self, device: &mut dyn GraphicsDevice) {
        let (scale_x, scale_y, height_offset, screen_height) = match self.frame_buffers.current() {
            Some(buffer) => {
                let height = if buffer.height == 0 {
                    self.video.vi_height
                } else {
                    buffer.height
                };
                (buffer.scale_x, buffer.scale_y, 0.0, height as f32)
            }
            None => (
                self.video.scale_x,
                self.video.scale_y,
                self.video.height_offset as f32,
                self.video.vi_height as f32,
            ),
        };

        let scissor = &self.rdp.scissor;
        let (mut x0, mut x1) = (scissor.ulx, scissor.lrx);
        if self.needs_adjust() {
            let half = self.rdp.color_image.width as f32 / 2.0;
            let scale = self.video.adjust_scale;
            x0 = (x0 - half) * scale + half;
            x1 = (x1 - half) * scale + half;
        }

        device.set_scissor(Rect::new(
            (x0 * scale_x) as i32,
            ((screen_height - scissor.lry) * scale_y + height_offset) as i32,
            (((x1 - x0) * scale_x) as i32).max(0),
            (((scissor.lry - scissor.uly) * scale_y) as i32).max(0),
        ));
    }

    fn update_viewport(&self, device: &mut dyn GraphicsDevice) {
        let viewport = &self.rsp.viewport;
        let (scale_x, scale_y, height_offset, screen_height) = match self.frame_buffers.current() {
            Some(buffer) => (buffer.scale_x, buffer.scale_y, 0, buffer.height as f32),
            None => (
                self.video.scale_x,
                self.video.scale_y,
                self.video.height_offset as i32,
                self.video.vi_height as f32,
            ),
        };

        let mut x = if viewport.vscale[0] < 0.0 {
            viewport.x + viewport.vscale[0] * 2.0
        } else {
            viewport.x
        };
        if self.needs_adjust() {
            let half_x = self.rdp.color_image.width as f32 / 2.0;
            let half_viewport = viewport.width / 2.0;
            x = (x + half_viewport - half_x) * self.video.adjust_scale + half_x - half_viewport;
        }

        let y = if viewport.vscale[1] < 0.0 {
            (viewport.y + viewport.vscale[1] * 2.0) * scale_y
        } else {
            (screen_height - (viewport.y + viewport.height)) * scale_y
        };

        device.set_viewport(Rect::new(
            (x * scale_x) as i32,
            y as i32 + height_offset,
            ((viewport.width * scale_x) as i32).max(0),
            ((viewport.height * scale_y) as i32).max(0),
        ));
    }

    /// Viewport covering the whole target, for vertices already in screen space.
    pub(crate) fn update_screen_coords_viewport(&mut self, device: &mut dyn GraphicsDevice) {
        let rect = match self.frame_buffers.current() {
            Some(buffer) => Rect::new(
                0,
                0,
                (buffer.width as f32 * buffer.scale_x) as i32,
                (buffer.height as f32 * buffer.scale_y) as i32,
            ),
            None => Rect::new(
                0,
                self.video.height_offset as i32,
                self.video.screen_width as i32,
                self.video.screen_height as i32,
            ),
        };
        device.set_viewport(rect);
        self.rsp.changed |= DirtyFlags::VIEWPORT;
    }

    pub(crate) fn texture_linear_filter(&self) -> bool {
        self.config.texture.bilinear
            && self.rdp.other_mode.texture_filter() != TextFilt::G_TF_POINT
            && self.rdp.other_mode.cycle_type() != OtherModeHCycleType::G_CYC_COPY
    }

    /// Activates tile descriptor `tile` on texture `slot`.
    pub(crate) fn update_texture(
        &mut self,
        slot: usize,
        tile: usize,
        device: &mut dyn GraphicsDevice,
    ) {
        let request = TextureRequest {
            tile: self.rdp.tile_descriptors[tile & 7],
            tlut: self.rdp.other_mode.texture_lut(),
            linear_filter: self.texture_linear_filter(),
            frame: self.video.buffers_swap_count,
        };
        self.texture_cache.update(
            slot,
            &request,
            &self.tmem,
            &mut self.loader,
            &self.frame_buffers,
            device,
        );
    }

    fn update_textures(&mut self, device: &mut dyn GraphicsDevice) {
        for slot in 0..NUM_TEXTURE_SLOTS {
            if self.rdp.uses_tile(slot) {
                self.update_texture(slot, self.rsp.texture_tiles[slot], device);
            } else {
                self.texture_cache.activate_dummy(slot, device);
            }
        }
    }

    fn update_blend(&self, device: &mut dyn GraphicsDevice) {
        let mode = &self.rdp.other_mode;
        let inputs = BlendInputs {
            cycle_type: mode.cycle_type(),
            force_blender: mode.force_blender(),
            clear_on_cvg: mode.clear_on_cvg(),
            mux: [mode.blender(0), mode.blender(1)],
            texture_on: self.rsp.texture_state.on,
            combiner_uses_texture: self.rdp.combine.uses_texture(),
            fog_alpha: self.rdp.fog_color.alpha_f32(),
            hacks: self.config.generation.hacks,
        };

        let blend = translate_blend_mode(&inputs);
        if let BlendMode::Enabled {
            constant: Some(constant),
            ..
        } = blend
        {
            device.set_blend_constant(constant);
        }
        device.set_blend_state(blend.blend_state());
    }

    /// Rendering into the depth image: sample the depth buffer and let every fragment through.
    fn update_depth_as_texture(&mut self, device: &mut dyn GraphicsDevice) {
        if self.rdp.color_image.address != self.rdp.depth_image
            || self.rdp.other_mode.cycle_type() == OtherModeHCycleType::G_CYC_FILL
            || self.config.generation.hacks.contains(super::config::Hacks::ZELDA_MM)
        {
            return;
        }

        let Some(depth_buffer) = self
            .frame_buffers
            .current()
            .and_then(|buffer| buffer.depth_buffer)
        else {
            return;
        };

        if self.rdp.other_mode.depth_compare() && device.supports_image_textures() {
            let Some(texture) = depth_buffer.texture else {
                return;
            };
            device.bind_depth_texture(texture);
        }

        device.set_depth_test(true);
        device.set_depth_compare(CompareFunction::Always);
        device.set_depth_write(true);
        self.rdp.changed |= DirtyFlags::RENDER_MODE;
    }
}
