use glam::Vec4;
use log::{trace, warn};
use wgpu::{AddressMode, PrimitiveTopology};

use super::{
    config::TexrectCorrection,
    graphics::{GraphicsDevice, RectVertex, VertexLayout},
    rcp::RCP,
    rdp::OtherModeHCycleType,
    render_state::{DirtyFlags, RenderKind},
    rsp::{Modify, RSPGeometry, SPVertex},
    utils::{
        color::Color,
        texture_cache::{TextureSource, NUM_TEXTURE_SLOTS},
    },
};

/// A texture rectangle in N64 screen and texel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TexturedRectParams {
    pub ulx: f32,
    pub uly: f32,
    pub lrx: f32,
    pub lry: f32,
    pub uls: f32,
    pub ult: f32,
    pub lrs: f32,
    pub lrt: f32,
    pub dsdx: f32,
    pub dtdy: f32,
    pub flip: bool,
    pub force_adjust_scale: bool,
    /// Issued by a texrect command, as opposed to a sprite or background microcode.
    pub texrect_cmd: bool,
}

#[derive(Default)]
pub struct PrimitiveBatch {
    /// Indices into the RSP vertex table
    pub elements: Vec<u16>,
    pub dma_vertices: Vec<SPVertex>,
    /// Vertex generation and layout of the last table upload
    uploaded: Option<(u64, VertexLayout)>,
    last_texrect: Option<TexturedRectParams>,
}

impl PrimitiveBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.dma_vertices.is_empty()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.dma_vertices.clear();
    }

    fn forget_upload(&mut self) {
        self.uploaded = None;
    }
}

/// Clip-space corners of a screen rectangle: upper left, upper right, lower left, lower right.
fn rect_corners(ulx: f32, uly: f32, lrx: f32, lry: f32, scale: (f32, f32), z: f32) -> [RectVertex; 4] {
    let (x0, y0) = (ulx * 2.0 * scale.0 - 1.0, uly * -2.0 * scale.1 + 1.0);
    let (x1, y1) = (lrx * 2.0 * scale.0 - 1.0, lry * -2.0 * scale.1 + 1.0);
    [
        RectVertex {
            position: Vec4::new(x0, y0, z, 1.0),
            ..Default::default()
        },
        RectVertex {
            position: Vec4::new(x1, y0, z, 1.0),
            ..Default::default()
        },
        RectVertex {
            position: Vec4::new(x0, y1, z, 1.0),
            ..Default::default()
        },
        RectVertex {
            position: Vec4::new(x1, y1, z, 1.0),
            ..Default::default()
        },
    ]
}

impl RCP {
    /// Draws are dropped while frame buffer emulation has no target to render into.
    pub fn can_draw(&self) -> bool {
        !self.config.frame_buffer_emulation.enable || self.frame_buffers.current().is_some()
    }

    // MARK: - Triangles

    /// Queues a triangle of RSP vertices. `flat_vertex` supplies the color when shading is flat.
    pub fn add_triangle(&mut self, v0: usize, v1: usize, v2: usize, flat_vertex: usize) {
        let indices = [v0, v1, v2];
        if indices
            .iter()
            .chain(std::iter::once(&flat_vertex))
            .any(|index| *index >= self.rsp.vertices.len())
        {
            warn!("Triangle ({}, {}, {}) references a missing vertex", v0, v1, v2);
            return;
        }

        let mut modified = false;
        if !self.rsp.has_geometry_mode(RSPGeometry::G_LIGHTING) {
            if !self.rsp.has_geometry_mode(RSPGeometry::G_SHADE) {
                let prim = self.rdp.prim_color.to_f32();
                for index in indices {
                    self.rsp.vertices[index].flat_color = prim;
                }
                modified = true;
            } else if !self.rsp.has_geometry_mode(RSPGeometry::G_SHADING_SMOOTH) {
                let color = self.rsp.vertices[flat_vertex].color;
                for index in indices {
                    let vertex = &mut self.rsp.vertices[index];
                    vertex.color = color;
                    vertex.flat_color = color;
                }
                modified = true;
            }
        }

        if self.rdp.other_mode.depth_source_is_prim() {
            let z = self.rdp.prim_depth.z;
            for index in indices {
                let position = &mut self.rsp.vertices[index].position;
                position.z = z * position.w;
            }
            modified = true;
        }

        if modified {
            self.rsp.vertex_generation += 1;
        }

        self.batch
            .elements
            .extend(indices.iter().map(|index| *index as u16));
    }

    /// Synchronizes state for a triangle draw and returns the vertex layout to draw with.
    fn prepare_draw_triangles(&mut self, first_vertex: usize, device: &mut dyn GraphicsDevice) -> VertexLayout {
        let screen_space = self
            .rsp
            .vertices
            .get(first_vertex)
            .map_or(false, |vertex| vertex.modify.contains(Modify::XY));

        if screen_space {
            self.rsp.changed.remove(DirtyFlags::VIEWPORT);
        }

        self.synchronize(RenderKind::Triangle, device);

        if screen_space {
            self.update_screen_coords_viewport(device);
        }

        VertexLayout::Triangles {
            flat_colors: self.flat_colors(),
            textured: self.rdp.combine.uses_texture(),
        }
    }

    fn flat_colors(&self) -> bool {
        !self.rsp.is_lle
            && !self.rsp.has_geometry_mode(RSPGeometry::G_LIGHTING)
            && (!self.rsp.has_geometry_mode(RSPGeometry::G_SHADE)
                || !self.rsp.has_geometry_mode(RSPGeometry::G_SHADING_SMOOTH))
    }

    /// Uploads the RSP vertex table unless the device already holds it in `layout`.
    fn upload_vertex_table(&mut self, layout: VertexLayout, device: &mut dyn GraphicsDevice) {
        let key = (self.rsp.vertex_generation, layout);
        if self.batch.uploaded == Some(key) {
            return;
        }

        device.set_vertex_layout(layout);
        device.upload_vertices(&self.rsp.vertices);
        self.batch.uploaded = Some(key);
    }

    pub fn draw_triangles(&mut self, device: &mut dyn GraphicsDevice) {
        if self.batch.elements.is_empty() || !self.can_draw() {
            self.batch.elements.clear();
            return;
        }

        let first = self.batch.elements[0] as usize;
        let layout = self.prepare_draw_triangles(first, device);
        self.upload_vertex_table(layout, device);

        trace!("Drawing {} triangles", self.batch.elements.len() / 3);
        device.draw_elements(PrimitiveTopology::TriangleList, &self.batch.elements);
        self.batch.elements.clear();
        self.frame_buffer_written();
    }

    /// Draws the queued DMA vertex list as plain triangles.
    pub fn draw_dma_triangles(&mut self, device: &mut dyn GraphicsDevice) {
        if self.batch.dma_vertices.is_empty() || !self.can_draw() {
            self.batch.dma_vertices.clear();
            return;
        }

        let screen_space = self.batch.dma_vertices[0].modify.contains(Modify::XY);
        if screen_space {
            self.rsp.changed.remove(DirtyFlags::VIEWPORT);
        }
        self.synchronize(RenderKind::Triangle, device);
        if screen_space {
            self.update_screen_coords_viewport(device);
        }

        let layout = VertexLayout::Triangles {
            flat_colors: self.flat_colors(),
            textured: self.rdp.combine.uses_texture(),
        };
        device.set_vertex_layout(layout);
        device.upload_vertices(&self.batch.dma_vertices);
        device.draw_arrays(PrimitiveTopology::TriangleList, self.batch.dma_vertices.len());

        self.batch.dma_vertices.clear();
        self.batch.forget_upload();
        self.frame_buffer_written();
    }

    /// Draws the first `count` RSP vertices, already in screen space, as a strip.
    pub fn draw_lle_triangle(&mut self, count: usize, device: &mut dyn GraphicsDevice) {
        let count = count.min(self.rsp.vertices.len());
        if count < 3 || !self.can_draw() {
            return;
        }

        for vertex in &mut self.rsp.vertices[..count] {
            vertex.modify = Modify::ALL;
        }
        self.rsp.vertex_generation += 1;

        self.rsp.changed.remove(DirtyFlags::GEOMETRY_MODE);
        let layout = self.prepare_draw_triangles(0, device);
        device.set_cull_mode(None);

        self.upload_vertex_table(layout, device);
        device.draw_arrays(PrimitiveTopology::TriangleStrip, count);

        self.batch.elements.clear();
        self.frame_buffer_written();
        self.rsp.changed |= DirtyFlags::GEOMETRY_MODE;
    }

    // MARK: - Lines

    pub fn draw_line(&mut self, v0: usize, v1: usize, width: f32, device: &mut dyn GraphicsDevice) {
        if v0.max(v1) >= self.rsp.vertices.len() || !self.can_draw() {
            return;
        }

        self.synchronize(RenderKind::Line, device);

        let factor = self.config.frame_buffer_emulation.native_res_factor;
        let scale = if factor == 0 {
            self.video.scale_x
        } else {
            factor as f32
        };
        device.set_line_width(width * scale);

        self.upload_vertex_table(VertexLayout::Line, device);
        device.draw_elements(PrimitiveTopology::LineList, &[v0 as u16, v1 as u16]);
        self.frame_buffer_written();
    }

    // MARK: - Rectangles

    fn rect_scale(&self) -> (f32, f32) {
        match self.frame_buffers.current() {
            Some(buffer) => (
                1.0 / buffer.width.max(1) as f32,
                1.0 / buffer.height.max(1) as f32,
            ),
            None => (
                1.0 / self.video.vi_width.max(1) as f32,
                1.0 / self.video.vi_height.max(1) as f32,
            ),
        }
    }

    fn rect_depth(&self) -> f32 {
        if self.rdp.other_mode.depth_source_is_prim() {
            self.rdp.prim_depth.z
        } else {
            self.rsp.viewport.nearz
        }
    }

    /// Rectangles narrower than the VI inside a wide color image are squeezed by the adjust scale.
    fn rect_needs_adjust(&self, ulx: f32, lrx: f32, force: bool) -> bool {
        let vi_width = self.video.vi_width;
        self.video.adjust_screen
            && (force
                || (self.rdp.color_image.width > vi_width * 98 / 100
                    && lrx - ulx < (vi_width * 9 / 10) as f32))
    }

    fn adjust_rect(&self, corners: &mut [RectVertex; 4]) {
        for corner in corners.iter_mut() {
            corner.position.x *= self.video.adjust_scale;
        }
    }

    /// Fills a screen rectangle with the fill color in fill mode, or with the combiner output.
    pub fn draw_rect(&mut self, ulx: f32, uly: f32, lrx: f32, lry: f32, device: &mut dyn GraphicsDevice) {
        if !self.can_draw() {
            return;
        }

        self.rsp.changed.remove(DirtyFlags::GEOMETRY_MODE);
        self.synchronize(RenderKind::FilledRect, device);

        self.update_screen_coords_viewport(device);
        device.set_cull_mode(None);

        let mut corners = rect_corners(ulx, uly, lrx, lry, self.rect_scale(), self.rect_depth());
        if self.rect_needs_adjust(ulx, lrx, false) {
            self.adjust_rect(&mut corners);
        }

        let color = if self.rdp.other_mode.cycle_type() == OtherModeHCycleType::G_CYC_FILL {
            self.rdp.fill_color.to_f32()
        } else {
            [0.0; 4]
        };
        device.set_constant_color(color);
        device.set_vertex_layout(VertexLayout::Rect);
        device.draw_rect(&corners);

        self.batch.forget_upload();
        self.frame_buffer_written();
        self.rsp.changed |= DirtyFlags::GEOMETRY_MODE | DirtyFlags::VIEWPORT;
    }

    /// Nudges rectangle edges so consecutive rects tile without seams.
    pub fn correct_textured_rect_params(&mut self, params: &mut TexturedRectParams) {
        match self.config.generation.correct_texrect_coords {
            TexrectCorrection::None => {}
            TexrectCorrection::Smart => {
                if let Some(previous) = self.batch.last_texrect {
                    if params.ulx == previous.ulx && params.lrx == previous.lrx {
                        if (params.uly - previous.lry).abs() < 0.51 {
                            params.uly = previous.lry;
                        } else if (params.lry - previous.uly).abs() < 0.51 {
                            params.lry = previous.uly;
                        }
                    } else if params.uly == previous.uly && params.lry == previous.lry {
                        if (params.ulx - previous.lrx).abs() < 0.51 {
                            params.ulx = previous.lrx;
                        } else if (params.lrx - previous.ulx).abs() < 0.51 {
                            params.lrx = previous.ulx;
                        }
                    }
                }
                self.batch.last_texrect = Some(*params);
            }
            TexrectCorrection::Force => {
                params.lrx += 0.25;
                params.lry += 0.25;
            }
        }
    }

    pub fn draw_textured_rect(&mut self, params: &TexturedRectParams, device: &mut dyn GraphicsDevice) {
        let mut params = *params;
        self.correct_textured_rect_params(&mut params);

        self.rsp.changed.remove(DirtyFlags::GEOMETRY_MODE);
        self.synchronize(RenderKind::TexturedRect, device);

        if params.texrect_cmd {
            let hook = self.special_texrect;
            if hook.apply(self, &params, device) {
                self.rsp.changed |= DirtyFlags::GEOMETRY_MODE;
                return;
            }
        }

        if !self.can_draw() {
            self.rsp.changed |= DirtyFlags::GEOMETRY_MODE;
            return;
        }

        self.update_screen_coords_viewport(device);
        device.set_cull_mode(None);

        let mut corners = rect_corners(
            params.ulx,
            params.uly,
            params.lrx,
            params.lry,
            self.rect_scale(),
            self.rect_depth(),
        );

        let linear_filter = self.texture_linear_filter();
        let copy_mode = self.rdp.other_mode.cycle_type() == OtherModeHCycleType::G_CYC_COPY;

        for slot in 0..NUM_TEXTURE_SLOTS {
            if !self.rdp.uses_tile(slot) {
                continue;
            }
            let Some(texture) = self.texture_cache.current(slot).copied() else {
                continue;
            };
            let tile = self.rdp.tile_descriptors[self.rsp.texture_tiles[slot] & 7];

            let (shift_s, shift_t) = (texture.shift_scale_s, texture.shift_scale_t);
            let (fuls, fult) = (tile.fuls(), tile.fult());

            let (mut s0, mut s1) = if params.uls > params.lrs {
                (
                    (params.uls + params.dsdx) * shift_s - fuls,
                    params.lrs * shift_s - fuls,
                )
            } else {
                (
                    params.uls * shift_s - fuls,
                    (params.lrs + params.dsdx) * shift_s - fuls,
                )
            };
            let (mut t0, mut t1) = if params.ult > params.lrt {
                (
                    (params.ult + params.dtdy) * shift_t - fult,
                    params.lrt * shift_t - fult,
                )
            } else {
                (
                    params.ult * shift_t - fult,
                    (params.lrt + params.dtdy) * shift_t - fult,
                )
            };

            if texture.source == TextureSource::FrameBuffer {
                s0 += texture.offset_s;
                s1 += texture.offset_s;
                t0 = texture.offset_t - t0;
                t1 = texture.offset_t - t1;
            }

            let (width, height) = (texture.width as f32, texture.height as f32);
            let clamp_s = (!texture.mirror_s
                && texture.mask_s == 0
                && s0.min(s1) >= 0.0
                && s0.max(s1) <= width)
                || (texture.mask_s == 0 && (s0 < -1024.0 || s1 > 1023.99));
            let clamp_t = !texture.mirror_t && t0.min(t1) >= 0.0 && t0.max(t1) <= height;

            let nearest = copy_mode && slot == 0;
            if clamp_s || clamp_t || nearest {
                let mut sampler = texture.sampler(linear_filter && !nearest);
                if clamp_s {
                    sampler.address_s = AddressMode::ClampToEdge;
                }
                if clamp_t {
                    sampler.address_t = AddressMode::ClampToEdge;
                }
                device.set_sampler_parameters(slot, sampler);
            }

            let (s0, s1) = (s0 * texture.scale_s, s1 * texture.scale_s);
            let (t0, t1) = (t0 * texture.scale_t, t1 * texture.scale_t);

            let coords = if params.flip {
                [[s0, t0], [s0, t1], [s1, t0], [s1, t1]]
            } else {
                [[s0, t0], [s1, t0], [s0, t1], [s1, t1]]
            };
            for (corner, coord) in corners.iter_mut().zip(coords) {
                if slot == 0 {
                    corner.tex0 = coord;
                } else {
                    corner.tex1 = coord;
                }
            }
        }

        if self.rect_needs_adjust(params.ulx, params.lrx, params.force_adjust_scale) {
            self.adjust_rect(&mut corners);
        }

        device.set_vertex_layout(VertexLayout::TexturedRect);
        device.draw_rect(&corners);

        self.batch.forget_upload();
        self.frame_buffer_written();
        self.rsp.changed |= DirtyFlags::GEOMETRY_MODE | DirtyFlags::VIEWPORT;
    }

    // MARK: - Clears

    pub fn clear_depth_buffer(&mut self, device: &mut dyn GraphicsDevice) {
        if !self.can_draw() {
            return;
        }

        device.set_scissor_test(false);
        device.set_depth_write(true);
        device.clear_depth();
        device.set_depth_write(self.rdp.other_mode.depth_update());
        device.set_scissor_test(true);
    }

    pub fn clear_color_buffer(&mut self, color: Option<Color>, device: &mut dyn GraphicsDevice) {
        device.set_scissor_test(false);
        device.clear_color(color.map_or([0.0; 4], Color::to_f32));
        device.set_scissor_test(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fast3d::{
        config::Config,
        framebuffer::{FrameBuffer, FrameBufferList},
        graphics::dummy_device::{DeviceCall, DummyGraphicsDevice},
        graphics::SamplerState,
        rdp::OtherModeLayoutL,
        utils::{color_combiner::CombineParams, texture::ImageSize, tile_descriptor::TileDescriptor},
    };

    // (TEXEL0 - 0) * SHADE + 0 in both cycles
    const MODULATE_W0: usize = (1 << 20) | (4 << 15) | (1 << 12) | (4 << 9) | (1 << 5) | 4;
    const MODULATE_W1: usize = (15 << 28)
        | (15 << 24)
        | (1 << 21)
        | (4 << 18)
        | (7 << 15)
        | (7 << 12)
        | (7 << 9)
        | (7 << 6)
        | (7 << 3)
        | 7;

    fn setup_with(config: Config) -> (RCP, DummyGraphicsDevice) {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut device = DummyGraphicsDevice::new();
        let mut rcp = RCP::new(config);
        rcp.init(&mut device);
        rcp.frame_buffers
            .add_buffer(FrameBuffer::new(0x10_0000, 320, 240, ImageSize::G_IM_SIZ_16b));
        device.calls.clear();
        (rcp, device)
    }

    fn setup() -> (RCP, DummyGraphicsDevice) {
        setup_with(Config::default())
    }

    fn vertex(color: [f32; 4]) -> SPVertex {
        SPVertex {
            position: Vec4::new(0.0, 0.0, 0.5, 2.0),
            color,
            ..SPVertex::ZERO
        }
    }

    fn drawn_rect(device: &DummyGraphicsDevice) -> Option<[RectVertex; 4]> {
        device.calls.iter().find_map(|call| match call {
            DeviceCall::DrawRect(corners) => Some(*corners),
            _ => None,
        })
    }

    fn smart_config() -> Config {
        let mut config = Config::default();
        config.generation.correct_texrect_coords = TexrectCorrection::Smart;
        config
    }

    fn rect(ulx: f32, uly: f32, lrx: f32, lry: f32) -> TexturedRectParams {
        TexturedRectParams {
            ulx,
            uly,
            lrx,
            lry,
            ..Default::default()
        }
    }

    #[test]
    fn test_smart_correction_snaps_vertical_neighbor() {
        let (mut rcp, _) = setup_with(smart_config());

        let mut first = rect(0.0, 0.0, 10.0, 9.6);
        rcp.correct_textured_rect_params(&mut first);
        assert_eq!(first, rect(0.0, 0.0, 10.0, 9.6));

        let mut second = rect(0.0, 10.0, 10.0, 20.0);
        rcp.correct_textured_rect_params(&mut second);
        assert_eq!(second.uly, 9.6);
        assert_eq!(second.lry, 20.0);
    }

    #[test]
    fn test_smart_correction_snaps_horizontal_neighbor() {
        let (mut rcp, _) = setup_with(smart_config());

        let mut first = rect(20.0, 0.0, 30.0, 8.0);
        rcp.correct_textured_rect_params(&mut first);
        let mut second = rect(10.0, 0.0, 19.7, 8.0);
        rcp.correct_textured_rect_params(&mut second);

        assert_eq!(second.lrx, 20.0);
        assert_eq!(second.ulx, 10.0);
    }

    #[test]
    fn test_smart_correction_leaves_distant_rects() {
        let (mut rcp, _) = setup_with(smart_config());

        let mut first = rect(0.0, 0.0, 10.0, 10.0);
        rcp.correct_textured_rect_params(&mut first);
        let mut second = rect(50.0, 50.0, 60.0, 60.0);
        rcp.correct_textured_rect_params(&mut second);

        assert_eq!(second, rect(50.0, 50.0, 60.0, 60.0));
    }

    #[test]
    fn test_force_correction_extends_corner() {
        let mut config = Config::default();
        config.generation.correct_texrect_coords = TexrectCorrection::Force;
        let (mut rcp, _) = setup_with(config);

        let mut params = rect(0.0, 0.0, 10.0, 10.0);
        rcp.correct_textured_rect_params(&mut params);
        assert_eq!(params, rect(0.0, 0.0, 10.25, 10.25));
    }

    #[test]
    fn test_flat_shading_copies_flat_vertex_color() {
        let (mut rcp, _) = setup();
        rcp.rsp.set_geometry_mode(0, RSPGeometry::G_SHADE as u32);
        rcp.rsp.set_vertex(0, vertex([1.0, 0.0, 0.0, 1.0]));
        rcp.rsp.set_vertex(1, vertex([0.0, 1.0, 0.0, 1.0]));
        rcp.rsp.set_vertex(2, vertex([0.0, 0.0, 1.0, 1.0]));

        rcp.add_triangle(0, 1, 2, 2);

        for index in 0..3 {
            assert_eq!(rcp.rsp.vertices[index].color, [0.0, 0.0, 1.0, 1.0]);
            assert_eq!(rcp.rsp.vertices[index].flat_color, [0.0, 0.0, 1.0, 1.0]);
        }
        assert_eq!(rcp.batch.elements, vec![0, 1, 2]);
    }

    #[test]
    fn test_unshaded_triangle_uses_prim_color() {
        let (mut rcp, _) = setup();
        rcp.rdp.set_prim_color(Color::RGBA(255, 0, 0, 255));
        rcp.add_triangle(3, 4, 5, 3);

        assert_eq!(rcp.rsp.vertices[4].flat_color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_smooth_lit_triangle_is_untouched() {
        let (mut rcp, _) = setup();
        rcp.rsp.set_geometry_mode(
            0,
            RSPGeometry::G_SHADE as u32 | RSPGeometry::G_SHADING_SMOOTH as u32,
        );
        rcp.rsp.set_vertex(0, vertex([1.0, 0.0, 0.0, 1.0]));
        let generation = rcp.rsp.vertex_generation;

        rcp.add_triangle(0, 1, 2, 2);
        assert_eq!(rcp.rsp.vertices[0].color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(rcp.rsp.vertex_generation, generation);
    }

    #[test]
    fn test_prim_depth_source_overrides_z() {
        let (mut rcp, _) = setup();
        rcp.rdp
            .set_other_mode_l(1 << OtherModeLayoutL::G_MDSFT_ZSRCSEL as u32);
        rcp.rdp.set_prim_depth(0.25, 0.0);
        rcp.rsp.set_vertex(0, vertex([1.0; 4]));

        rcp.add_triangle(0, 1, 2, 0);
        assert_eq!(rcp.rsp.vertices[0].position.z, 0.5);
    }

    #[test]
    fn test_out_of_range_triangle_is_ignored() {
        let (mut rcp, _) = setup();
        rcp.add_triangle(0, 1, 4096, 0);
        assert!(rcp.batch.is_empty());
    }

    #[test]
    fn test_draw_commits_and_clears_batch() {
        let (mut rcp, mut device) = setup();
        rcp.add_triangle(0, 1, 2, 0);
        rcp.add_triangle(2, 1, 3, 0);
        rcp.draw_triangles(&mut device);

        assert!(rcp.batch.is_empty());
        assert!(device.calls.contains(&DeviceCall::DrawElements(
            PrimitiveTopology::TriangleList,
            vec![0, 1, 2, 2, 1, 3]
        )));
    }

    #[test]
    fn test_unchanged_vertices_upload_once() {
        let (mut rcp, mut device) = setup();
        rcp.rsp.set_geometry_mode(
            0,
            RSPGeometry::G_SHADE as u32 | RSPGeometry::G_SHADING_SMOOTH as u32,
        );

        rcp.add_triangle(0, 1, 2, 0);
        rcp.draw_triangles(&mut device);
        rcp.add_triangle(0, 1, 2, 0);
        rcp.draw_triangles(&mut device);

        assert_eq!(
            device.count(|call| matches!(call, DeviceCall::UploadVertices(_))),
            1
        );
        assert_eq!(device.draw_count(), 2);

        rcp.rsp.set_vertex(5, vertex([1.0; 4]));
        rcp.add_triangle(0, 1, 2, 0);
        rcp.draw_triangles(&mut device);
        assert_eq!(
            device.count(|call| matches!(call, DeviceCall::UploadVertices(_))),
            2
        );
    }

    #[test]
    fn test_no_target_drops_batch() {
        let mut device = DummyGraphicsDevice::new();
        let mut rcp = RCP::new(Config::default());
        rcp.init(&mut device);

        rcp.add_triangle(0, 1, 2, 0);
        rcp.draw_triangles(&mut device);

        assert!(rcp.batch.is_empty());
        assert_eq!(device.draw_count(), 0);
    }

    #[test]
    fn test_dma_triangles_draw_arrays() {
        let (mut rcp, mut device) = setup();
        rcp.batch
            .dma_vertices
            .extend([vertex([1.0; 4]); 6]);
        rcp.draw_dma_triangles(&mut device);

        assert!(device
            .calls
            .contains(&DeviceCall::DrawArrays(PrimitiveTopology::TriangleList, 6)));
        assert!(rcp.batch.is_empty());
    }

    #[test]
    fn test_lle_triangle_strip_without_culling() {
        let (mut rcp, mut device) = setup();
        rcp.rsp
            .set_geometry_mode(0, RSPGeometry::G_CULL_BACK as u32);
        rcp.draw_lle_triangle(4, &mut device);

        assert!(rcp.rsp.vertices[..4]
            .iter()
            .all(|vertex| vertex.modify == Modify::ALL));
        assert_eq!(
            device.calls.last(),
            Some(&DeviceCall::DrawArrays(PrimitiveTopology::TriangleStrip, 4))
        );
        assert!(!device
            .calls
            .contains(&DeviceCall::SetCullMode(Some(wgpu::Face::Back))));
        assert!(rcp.rsp.changed.contains(DirtyFlags::GEOMETRY_MODE));
    }

    #[test]
    fn test_line_width_follows_native_factor() {
        let mut config = Config::default();
        config.frame_buffer_emulation.native_res_factor = 3;
        let (mut rcp, mut device) = setup_with(config);

        rcp.draw_line(0, 1, 1.5, &mut device);
        assert!(device.calls.contains(&DeviceCall::SetLineWidth(4.5)));
        assert!(device
            .calls
            .contains(&DeviceCall::DrawElements(PrimitiveTopology::LineList, vec![0, 1])));
    }

    #[test]
    fn test_fill_rect_uses_fill_color() {
        let (mut rcp, mut device) = setup();
        rcp.rdp.set_other_mode_h(3 << 20);
        rcp.rdp.set_fill_color(Color::RGBA(0, 255, 0, 255));

        rcp.draw_rect(0.0, 0.0, 160.0, 120.0, &mut device);

        assert!(device
            .calls
            .contains(&DeviceCall::SetConstantColor([0.0, 1.0, 0.0, 1.0])));
        let corners = drawn_rect(&device).unwrap();
        assert_eq!(corners[0].position, Vec4::new(-1.0, 1.0, 0.0, 1.0));
        assert_eq!(corners[3].position, Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert!(rcp
            .rsp
            .changed
            .contains(DirtyFlags::GEOMETRY_MODE | DirtyFlags::VIEWPORT));
    }

    #[test]
    fn test_fill_rect_adjusts_narrow_rects() {
        let (mut rcp, mut device) = setup();
        rcp.video.adjust_screen = true;
        rcp.video.adjust_scale = 0.5;
        rcp.rdp.set_color_image(0, 2, 320, 240, 0x10_0000);

        rcp.draw_rect(0.0, 0.0, 160.0, 120.0, &mut device);
        let corners = drawn_rect(&device).unwrap();
        assert_eq!(corners[0].position.x, -0.5);
    }

    fn textured_setup() -> (RCP, DummyGraphicsDevice) {
        let (mut rcp, device) = setup();
        rcp.rdp
            .set_combine(CombineParams::decode(MODULATE_W0, MODULATE_W1));

        let mut settings = TileDescriptor::EMPTY;
        settings.line = 2;
        rcp.rdp.set_tile(0, &settings);
        rcp.rdp.set_tile_size(0, 0, 0, 7 << 2, 7 << 2);
        (rcp, device)
    }

    fn texrect_8x8(flip: bool) -> TexturedRectParams {
        TexturedRectParams {
            lrx: 8.0,
            lry: 8.0,
            lrs: 7.0,
            lrt: 7.0,
            dsdx: 1.0,
            dtdy: 1.0,
            flip,
            texrect_cmd: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_textured_rect_covers_whole_texture() {
        let (mut rcp, mut device) = textured_setup();
        rcp.draw_textured_rect(&texrect_8x8(false), &mut device);

        let corners = drawn_rect(&device).unwrap();
        assert_eq!(corners[0].tex0, [0.0, 0.0]);
        assert_eq!(corners[1].tex0, [1.0, 0.0]);
        assert_eq!(corners[2].tex0, [0.0, 1.0]);
        assert_eq!(corners[3].tex0, [1.0, 1.0]);

        // the span fits the texture, so both axes clamp
        assert!(device.calls.contains(&DeviceCall::SetSamplerParameters(
            0,
            SamplerState {
                linear_filter: false,
                ..SamplerState::NEAREST_CLAMP
            }
        )));
    }

    #[test]
    fn test_flipped_textured_rect_swaps_corners() {
        let (mut rcp, mut device) = textured_setup();
        rcp.draw_textured_rect(&texrect_8x8(true), &mut device);

        let corners = drawn_rect(&device).unwrap();
        assert_eq!(corners[1].tex0, [0.0, 1.0]);
        assert_eq!(corners[2].tex0, [1.0, 0.0]);
    }

    #[test]
    fn test_clears_ignore_scissor_and_restore_depth_write() {
        let (mut rcp, mut device) = setup();
        rcp.clear_depth_buffer(&mut device);
        assert_eq!(
            device.calls,
            vec![
                DeviceCall::SetScissorTest(false),
                DeviceCall::SetDepthWrite(true),
                DeviceCall::ClearDepth,
                DeviceCall::SetDepthWrite(false),
                DeviceCall::SetScissorTest(true),
            ]
        );

        device.calls.clear();
        rcp.rdp
            .set_other_mode_l(1 << OtherModeLayoutL::Z_UPD as u32);
        rcp.clear_depth_buffer(&mut device);
        assert_eq!(device.calls[3], DeviceCall::SetDepthWrite(true));

        device.calls.clear();
        rcp.clear_color_buffer(None, &mut device);
        assert_eq!(
            device.calls,
            vec![
                DeviceCall::SetScissorTest(false),
                DeviceCall::ClearColor([0.0; 4]),
                DeviceCall::SetScissorTest(true),
            ]
        );
    }

    #[test]
    fn test_nothing_drawn_without_target() {
        let (mut rcp, mut device) = setup();
        rcp.config.frame_buffer_emulation.enable = true;
        rcp.frame_buffers = FrameBufferList::new();

        rcp.draw_lle_triangle(4, &mut device);
        rcp.draw_rect(0.0, 0.0, 10.0, 10.0, &mut device);

        assert!(device.calls.is_empty());
        assert_eq!(rcp.batch.elements.len(), 0);
    }

    #[test]
    fn test_dma_triangles_follow_flat_shading() {
        let (mut rcp, mut device) = setup();
        rcp.rsp.set_geometry_mode(0, RSPGeometry::G_SHADE as u32);
        rcp.batch.dma_vertices = vec![vertex([1.0; 4]); 3];

        rcp.draw_dma_triangles(&mut device);
        assert!(device.calls.iter().any(|call| matches!(
            call,
            DeviceCall::SetVertexLayout(VertexLayout::Triangles {
                flat_colors: true,
                ..
            })
        )));

        device.calls.clear();
        rcp.rsp.set_geometry_mode(
            0,
            RSPGeometry::G_SHADE as u32 | RSPGeometry::G_SHADING_SMOOTH as u32,
        );
        rcp.batch.dma_vertices = vec![vertex([1.0; 4]); 3];
        rcp.draw_dma_triangles(&mut device);
        assert!(device.calls.iter().any(|call| matches!(
            call,
            DeviceCall::SetVertexLayout(VertexLayout::Triangles {
                flat_colors: false,
                ..
            })
        )));
    }
}
