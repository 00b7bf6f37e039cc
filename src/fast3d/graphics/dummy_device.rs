use std::any::Any;

use wgpu::{BlendState, CompareFunction, Face, PrimitiveTopology};

use crate::fast3d::{
    gbi::defines::Light,
    graphics::{GraphicsDevice, Rect, RectVertex, SamplerState, TextureId, VertexLayout},
    rsp::SPVertex,
};

#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCall {
    NewTexture(TextureId),
    DeleteTexture(TextureId),
    SelectTexture(usize, TextureId),
    UploadTexture { width: u32, height: u32 },
    SetSamplerParameters(usize, SamplerState),
    BindDepthTexture(TextureId),
    SetDepthTest(bool),
    SetDepthCompare(CompareFunction),
    SetDepthWrite(bool),
    SetDepthClamp(bool),
    SetPolygonOffset(bool),
    SetViewport(Rect),
    SetScissor(Rect),
    SetScissorTest(bool),
    SetBlendState(Option<BlendState>),
    SetBlendConstant([f32; 4]),
    SetCullMode(Option<Face>),
    SetLights(usize),
    SetVertexLayout(VertexLayout),
    SetConstantColor([f32; 4]),
    SetLineWidth(f32),
    UploadVertices(usize),
    DrawElements(PrimitiveTopology, Vec<u16>),
    DrawArrays(PrimitiveTopology, usize),
    DrawRect([RectVertex; 4]),
    ClearDepth,
    ClearColor([f32; 4]),
    ReadDepthBuffer(TextureId),
}

impl DeviceCall {
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            DeviceCall::DrawElements(..) | DeviceCall::DrawArrays(..) | DeviceCall::DrawRect(..)
        )
    }
}

/// Headless device that records every call it receives.
#[derive(Default)]
pub struct DummyGraphicsDevice {
    pub calls: Vec<DeviceCall>,
    pub image_textures: bool,
    /// Returned from `read_depth_buffer`.
    pub depth_readback: Option<Vec<u16>>,
    next_texture: TextureId,
}

impl DummyGraphicsDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_calls(&mut self) -> Vec<DeviceCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn draw_count(&self) -> usize {
        self.calls.iter().filter(|call| call.is_draw()).count()
    }

    pub fn count(&self, predicate: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }
}

impl GraphicsDevice for DummyGraphicsDevice {
    fn as_any_ref(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn supports_image_textures(&self) -> bool {
        self.image_textures
    }

    fn new_texture(&mut self) -> TextureId {
        self.next_texture += 1;
        self.calls.push(DeviceCall::NewTexture(self.next_texture));
        self.next_texture
    }

    fn delete_texture(&mut self, id: TextureId) {
        self.calls.push(DeviceCall::DeleteTexture(id));
    }

    fn select_texture(&mut self, unit: usize, id: TextureId) {
        self.calls.push(DeviceCall::SelectTexture(unit, id));
    }

    fn upload_texture(&mut self, _data: &[u8], width: u32, height: u32) {
        self.calls.push(DeviceCall::UploadTexture { width, height });
    }

    fn set_sampler_parameters(&mut self, unit: usize, sampler: SamplerState) {
        self.calls
            .push(DeviceCall::SetSamplerParameters(unit, sampler));
    }

    fn bind_depth_texture(&mut self, id: TextureId) {
        self.calls.push(DeviceCall::BindDepthTexture(id));
    }

    fn set_depth_test(&mut self, enable: bool) {
        self.calls.push(DeviceCall::SetDepthTest(enable));
    }

    fn set_depth_compare(&mut self, compare: CompareFunction) {
        self.calls.push(DeviceCall::SetDepthCompare(compare));
    }

    fn set_depth_write(&mut self, enable: bool) {
        self.calls.push(DeviceCall::SetDepthWrite(enable));
    }

    fn set_depth_clamp(&mut self, enable: bool) {
        self.calls.push(DeviceCall::SetDepthClamp(enable));
    }

    fn set_polygon_offset(&mut self, enable: bool) {
        self.calls.push(DeviceCall::SetPolygonOffset(enable));
    }

    fn set_viewport(&mut self, rect: Rect) {
        self.calls.push(DeviceCall::SetViewport(rect));
    }

    fn set_scissor(&mut self, rect: Rect) {
        self.calls.push(DeviceCall::SetScissor(rect));
    }

    fn set_scissor_test(&mut self, enable: bool) {
        self.calls.push(DeviceCall::SetScissorTest(enable));
    }

    fn set_blend_state(&mut self, blend_state: Option<BlendState>) {
        self.calls.push(DeviceCall::SetBlendState(blend_state));
    }

    fn set_blend_constant(&mut self, color: [f32; 4]) {
        self.calls.push(DeviceCall::SetBlendConstant(color));
    }

    fn set_cull_mode(&mut self, cull_mode: Option<Face>) {
        self.calls.push(DeviceCall::SetCullMode(cull_mode));
    }

    fn set_lights(&mut self, lights: &[Light]) {
        self.calls.push(DeviceCall::SetLights(lights.len()));
    }

    fn set_vertex_layout(&mut self, layout: VertexLayout) {
        self.calls.push(DeviceCall::SetVertexLayout(layout));
    }

    fn set_constant_color(&mut self, color: [f32; 4]) {
        self.calls.push(DeviceCall::SetConstantColor(color));
    }

    fn set_line_width(&mut self, width: f32) {
        self.calls.push(DeviceCall::SetLineWidth(width));
    }

    fn upload_vertices(&mut self, vertices: &[SPVertex]) {
        self.calls.push(DeviceCall::UploadVertices(vertices.len()));
    }

    fn draw_elements(&mut self, topology: PrimitiveTopology, indices: &[u16]) {
        self.calls
            .push(DeviceCall::DrawElements(topology, indices.to_vec()));
    }

    fn draw_arrays(&mut self, topology: PrimitiveTopology, count: usize) {
        self.calls.push(DeviceCall::DrawArrays(topology, count));
    }

    fn draw_rect(&mut self, vertices: &[RectVertex; 4]) {
        self.calls.push(DeviceCall::DrawRect(*vertices));
    }

    fn clear_depth(&mut self) {
        self.calls.push(DeviceCall::ClearDepth);
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        self.calls.push(DeviceCall::ClearColor(color));
    }

    fn read_depth_buffer(
        &mut self,
        texture: TextureId,
        _width: u32,
        _height: u32,
    ) -> Option<Vec<u16>> {
        self.calls.push(DeviceCall::ReadDepthBuffer(texture));
        self.depth_readback.clone()
    }
}
