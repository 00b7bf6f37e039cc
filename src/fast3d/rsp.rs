use bitflags::bitflags;
use glam::Vec4;

use super::{
    gbi::defines::{Light, Viewport},
    render_state::DirtyFlags,
    utils::texture::TextureState,
};

pub const MAX_VERTICES: usize = 256;

// excluding ambient light
pub const MAX_LIGHTS: usize = 7;

bitflags! {
    /// Components a microcode already moved into screen space.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modify: u8 {
        const XY = 1 << 0;
        const Z = 1 << 1;
        const ST = 1 << 2;
        const ALL = Self::XY.bits() | Self::Z.bits() | Self::ST.bits();
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SPVertex {
    pub position: Vec4,
    pub color: [f32; 4],
    pub flat_color: [f32; 4],
    pub uv: [f32; 2],
    pub modify: Modify,
}

impl SPVertex {
    pub const ZERO: Self = Self {
        position: Vec4::ZERO,
        color: [0.0; 4],
        flat_color: [0.0; 4],
        uv: [0.0; 2],
        modify: Modify::empty(),
    };
}

#[cfg(feature = "f3dex2")]
#[allow(non_camel_case_types)]
pub enum RSPGeometry {
    G_ZBUFFER = 1 << 0,
    G_SHADE = 1 << 2,
    G_CULL_FRONT = 1 << 9,
    G_CULL_BACK = 1 << 10,
    G_CULL_BOTH = (1 << 9) | (1 << 10),
    G_FOG = 1 << 16,
    G_LIGHTING = 1 << 17,
    G_TEXTURE_GEN = 1 << 18,
    G_TEXTURE_GEN_LINEAR = 1 << 19,
    G_LOD = 1 << 20, /* NOT IMPLEMENTED */
    G_SHADING_SMOOTH = 1 << 21,
    G_CLIPPING = 1 << 23,
}

#[cfg(not(feature = "f3dex2"))]
#[allow(non_camel_case_types)]
pub enum RSPGeometry {
    G_ZBUFFER = 1 << 0,
    G_SHADE = 1 << 2,
    G_SHADING_SMOOTH = 1 << 9,
    G_CULL_FRONT = 1 << 12,
    G_CULL_BACK = 1 << 13,
    G_CULL_BOTH = (1 << 12) | (1 << 13),
    G_FOG = 1 << 16,
    G_LIGHTING = 1 << 17,
    G_TEXTURE_GEN = 1 << 18,
    G_TEXTURE_GEN_LINEAR = 1 << 19,
    G_LOD = 1 << 20, /* NOT IMPLEMENTED */
    G_CLIPPING = 1 << 23,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MicrocodeKind {
    F3D,
    F3DEX,
    F3DEX2,
    S2DEX,
    Other,
}

/// Viewport in N64 screen units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportState {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub vscale: [f32; 4],
    pub vtrans: [f32; 4],
    pub nearz: f32,
    pub farz: f32,
}

impl ViewportState {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
        vscale: [0.0; 4],
        vtrans: [0.0; 4],
        nearz: 0.0,
        farz: 0.0,
    };
}

pub struct RSP {
    pub geometry_mode: u32,
    pub viewport: ViewportState,

    pub texture_state: TextureState,
    /// Tile descriptors sampled as texture 0 and 1
    pub texture_tiles: [usize; 2],

    pub vertices: Vec<SPVertex>,
    /// Bumped on every vertex write so uploads can be skipped when nothing changed.
    pub vertex_generation: u64,

    pub num_lights: usize,
    pub lights: [Light; MAX_LIGHTS + 1],

    pub microcode: MicrocodeKind,
    /// Triangles come straight from RDP commands rather than through the vertex pipeline.
    pub is_lle: bool,

    pub changed: DirtyFlags,
}

impl Default for RSP {
    fn default() -> Self {
        Self::new()
    }
}

impl RSP {
    pub fn new() -> Self {
        RSP {
            geometry_mode: 0,
            viewport: ViewportState::ZERO,

            texture_state: TextureState::EMPTY,
            texture_tiles: [0, 1],

            vertices: vec![SPVertex::ZERO; MAX_VERTICES],
            vertex_generation: 0,

            num_lights: 0,
            lights: [Light::ZERO; MAX_LIGHTS + 1],

            microcode: if cfg!(feature = "f3dex2") {
                MicrocodeKind::F3DEX2
            } else {
                MicrocodeKind::F3D
            },
            is_lle: false,

            changed: DirtyFlags::all(),
        }
    }

    pub fn reset(&mut self) {
        self.geometry_mode = 0;
        self.set_num_lights(2);
        self.changed = DirtyFlags::all();
    }

    pub fn has_geometry_mode(&self, mode: RSPGeometry) -> bool {
        self.geometry_mode & mode as u32 != 0
    }

    pub fn set_geometry_mode(&mut self, clear: u32, set: u32) {
        let previous = self.geometry_mode;
        self.geometry_mode = (self.geometry_mode & !clear) | set;
        self.changed |= DirtyFlags::GEOMETRY_MODE;

        // depth state reads the z-buffer bit
        if (previous ^ self.geometry_mode) & RSPGeometry::G_ZBUFFER as u32 != 0 {
            self.changed |= DirtyFlags::RENDER_MODE;
        }
    }

    pub fn set_viewport(&mut self, viewport: &Viewport) {
        let state = &mut self.viewport;
        for i in 0..2 {
            state.vscale[i] = viewport.vscale[i] as f32 / 4.0;
            state.vtrans[i] = viewport.vtrans[i] as f32 / 4.0;
        }
        state.vscale[2] = viewport.vscale[2] as f32 / 1024.0;
        state.vtrans[2] = viewport.vtrans[2] as f32 / 1024.0;
        state.vscale[3] = viewport.vscale[3] as f32;
        state.vtrans[3] = viewport.vtrans[3] as f32;

        state.x = state.vtrans[0] - state.vscale[0];
        state.y = state.vtrans[1] - state.vscale[1];
        state.width = state.vscale[0].abs() * 2.0;
        state.height = state.vscale[1].abs() * 2.0;
        state.nearz = state.vtrans[2] - state.vscale[2];
        state.farz = state.vtrans[2] + state.vscale[2];

        self.changed |= DirtyFlags::VIEWPORT;
    }

    pub fn set_texture(&mut self, state: TextureState) {
        self.texture_tiles = Self::tiles_from(state.tile as usize);
        self.texture_state = state;
        self.changed |= DirtyFlags::TEXTURE;
    }

    /// Rectangles sample from their own tile and the one after it.
    pub fn set_texture_tile(&mut self, tile: usize) {
        let tiles = Self::tiles_from(tile);
        if tiles != self.texture_tiles {
            self.texture_tiles = tiles;
            self.changed |= DirtyFlags::TEXTURE;
        }
    }

    fn tiles_from(tile: usize) -> [usize; 2] {
        [tile & 7, (tile + 1) & 7]
    }

    pub fn set_vertex(&mut self, index: usize, vertex: SPVertex) {
        if let Some(slot) = self.vertices.get_mut(index) {
            *slot = vertex;
            self.vertex_generation += 1;
        } else {
            log::warn!("Vertex index {} out of range", index);
        }
    }

    pub fn set_num_lights(&mut self, num_lights: usize) {
        self.num_lights = num_lights.min(MAX_LIGHTS);
        self.changed |= DirtyFlags::LIGHT;
    }

    pub fn set_light(&mut self, index: usize, light: Light) {
        if let Some(slot) = self.lights.get_mut(index) {
            *slot = light;
            self.changed |= DirtyFlags::LIGHT;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_from_fixed_point() {
        let mut rsp = RSP::new();
        rsp.changed = DirtyFlags::empty();
        rsp.set_viewport(&Viewport::new([640, 480, 511, 0], [640, 480, 511, 0]));

        assert_eq!(rsp.viewport.x, 0.0);
        assert_eq!(rsp.viewport.y, 0.0);
        assert_eq!(rsp.viewport.width, 320.0);
        assert_eq!(rsp.viewport.height, 240.0);
        assert_eq!(rsp.viewport.nearz, 0.0);
        assert!(rsp.changed.contains(DirtyFlags::VIEWPORT));
    }

    #[test]
    fn test_zbuffer_toggle_dirties_render_mode() {
        let mut rsp = RSP::new();
        rsp.changed = DirtyFlags::empty();
        rsp.set_geometry_mode(0, RSPGeometry::G_SHADE as u32);
        assert_eq!(rsp.changed, DirtyFlags::GEOMETRY_MODE);

        rsp.set_geometry_mode(0, RSPGeometry::G_ZBUFFER as u32);
        assert!(rsp.changed.contains(DirtyFlags::RENDER_MODE));
    }

    #[test]
    fn test_texture_tiles_wrap() {
        let mut rsp = RSP::new();
        rsp.set_texture(TextureState::new(true, 7, 0, 1.0, 1.0));
        assert_eq!(rsp.texture_tiles, [7, 0]);
    }

    #[test]
    fn test_vertex_writes_bump_generation() {
        let mut rsp = RSP::new();
        rsp.set_vertex(3, SPVertex::ZERO);
        rsp.set_vertex(MAX_VERTICES, SPVertex::ZERO);
        assert_eq!(rsp.vertex_generation, 1);
    }
}
