use std::any::Any;

use glam::Vec4;
use wgpu::{AddressMode, BlendState, CompareFunction, Face, PrimitiveTopology};

use super::{gbi::defines::Light, rsp::SPVertex};

pub mod dummy_device;

pub type TextureId = u32;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const ZERO: Self = Self {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerState {
    pub linear_filter: bool,
    pub address_s: AddressMode,
    pub address_t: AddressMode,
    pub max_level: u8,
}

impl SamplerState {
    pub const NEAREST_CLAMP: Self = Self {
        linear_filter: false,
        address_s: AddressMode::ClampToEdge,
        address_t: AddressMode::ClampToEdge,
        max_level: 0,
    };
}

/// Which vertex attributes feed the current draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexLayout {
    Triangles { flat_colors: bool, textured: bool },
    Line,
    Rect,
    TexturedRect,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RectVertex {
    pub position: Vec4,
    pub tex0: [f32; 2],
    pub tex1: [f32; 2],
}

/// The GPU surface the renderer drives.
pub trait GraphicsDevice {
    fn as_any_ref(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Whether image load/store (and its texture barrier) is available.
    fn supports_image_textures(&self) -> bool;

    fn new_texture(&mut self) -> TextureId;
    fn delete_texture(&mut self, id: TextureId);
    fn select_texture(&mut self, unit: usize, id: TextureId);
    fn upload_texture(&mut self, data: &[u8], width: u32, height: u32);
    fn set_sampler_parameters(&mut self, unit: usize, sampler: SamplerState);
    fn bind_depth_texture(&mut self, id: TextureId);

    fn set_depth_test(&mut self, enable: bool);
    fn set_depth_compare(&mut self, compare: CompareFunction);
    fn set_depth_write(&mut self, enable: bool);
    fn set_depth_clamp(&mut self, enable: bool);
    fn set_polygon_offset(&mut self, enable: bool);
    fn set_viewport(&mut self, rect: Rect);
    fn set_scissor(&mut self, rect: Rect);
    fn set_scissor_test(&mut self, enable: bool);
    fn set_blend_state(&mut self, blend_state: Option<BlendState>);
    fn set_blend_constant(&mut self, color: [f32; 4]);
    fn set_cull_mode(&mut self, cull_mode: Option<Face>);
    fn set_lights(&mut self, lights: &[Light]);

    fn set_vertex_layout(&mut self, layout: VertexLayout);
    /// Value for the color attribute when it is not sourced from vertices.
    fn set_constant_color(&mut self, color: [f32; 4]);
    fn set_line_width(&mut self, width: f32);
    fn upload_vertices(&mut self, vertices: &[SPVertex]);
    fn draw_elements(&mut self, topology: PrimitiveTopology, indices: &[u16]);
    fn draw_arrays(&mut self, topology: PrimitiveTopology, count: usize);
    fn draw_rect(&mut self, vertices: &[RectVertex; 4]);

    fn clear_depth(&mut self);
    fn clear_color(&mut self, color: [f32; 4]);
    /// Reads the depth attachment of a render target back in N64 16-bit depth format.
    fn read_depth_buffer(&mut self, texture: TextureId, width: u32, height: u32)
        -> Option<Vec<u16>>;
}
