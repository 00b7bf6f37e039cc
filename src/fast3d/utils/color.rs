pub struct R5G5B5A1 {}

impl R5G5B5A1 {
    #[inline]
    pub fn to_rgba(pixel: u16) -> Color {
        let r = ((pixel & 0xF800) >> 11) as u8;
        let g = ((pixel & 0x07C0) >> 6) as u8;
        let b = ((pixel & 0x003E) >> 1) as u8;
        let a = (pixel & 0x01) as u8;

        Color::RGBA(
            (r << 3) | (r >> 2),
            (g << 3) | (g >> 2),
            (b << 3) | (b >> 2),
            a * 255,
        )
    }

    /// Packs the color with the coverage bit always set.
    #[inline]
    pub fn from_rgb(color: Color) -> u16 {
        let r = (color.r as u16 * 31) / 255;
        let g = (color.g as u16 * 31) / 255;
        let b = (color.b as u16 * 31) / 255;

        (r << 11) | (g << 6) | (b << 1) | 1
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    #[inline]
    #[allow(non_snake_case)]
    pub const fn RGBA(r: u8, g: u8, b: u8, a: u8) -> Color {
        Color { r, g, b, a }
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[inline]
    pub fn to_f32(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }

    #[inline]
    pub fn alpha_f32(self) -> f32 {
        self.a as f32 / 255.0
    }
}
