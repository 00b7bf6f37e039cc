#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub vscale: [i16; 4], // scale, 2 bits fraction
    pub vtrans: [i16; 4], // translate, 2 bits fraction
}

impl Viewport {
    pub const fn new(vscale: [i16; 4], vtrans: [i16; 4]) -> Self {
        Self { vscale, vtrans }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Light {
    pub color: [f32; 3],
    pub direction: [f32; 3],
}

impl Light {
    pub const ZERO: Self = Self {
        color: [0.0; 3],
        direction: [0.0; 3],
    };
}

#[allow(non_camel_case_types)]
pub struct G_TX;
impl G_TX {
    pub const WRAP: u8 = 0;
    pub const MIRROR: u8 = 1;
    pub const CLAMP: u8 = 2;
}

/// Depth source select
#[allow(non_camel_case_types)]
pub struct G_ZS;
impl G_ZS {
    pub const PIXEL: u32 = 0;
    pub const PRIM: u32 = 1;
}
