use crate::fast3d::gbi::utils::get_cmd;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColorCombinePass {
    pub a: CCMUX,
    pub b: CCMUX,
    pub c: CCMUX,
    pub d: CCMUX,
}

impl ColorCombinePass {
    pub fn inputs(&self) -> [CCMUX; 4] {
        [self.a, self.b, self.c, self.d]
    }

    pub fn uses_texture0(&self) -> bool {
        self.inputs()
            .iter()
            .any(|input| matches!(input, CCMUX::TEXEL0 | CCMUX::TEXEL0_ALPHA))
    }

    pub fn uses_texture1(&self) -> bool {
        self.inputs()
            .iter()
            .any(|input| matches!(input, CCMUX::TEXEL1 | CCMUX::TEXEL1_ALPHA))
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AlphaCombinePass {
    pub a: ACMUX,
    pub b: ACMUX,
    pub c: ACMUX,
    pub d: ACMUX,
}

impl AlphaCombinePass {
    pub fn inputs(&self) -> [ACMUX; 4] {
        [self.a, self.b, self.c, self.d]
    }

    pub fn uses_texture0(&self) -> bool {
        self.inputs().contains(&ACMUX::TEXEL0)
    }

    pub fn uses_texture1(&self) -> bool {
        self.inputs().contains(&ACMUX::TEXEL1)
    }
}

/// Both cycles of the color combiner as set by G_SETCOMBINE.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CombineParams {
    pub c0: ColorCombinePass,
    pub a0: AlphaCombinePass,
    pub c1: ColorCombinePass,
    pub a1: AlphaCombinePass,
}

impl CombineParams {
    pub const ZERO: Self = Self {
        c0: ColorCombinePass {
            a: CCMUX::COMBINED,
            b: CCMUX::TEXEL0,
            c: CCMUX::PRIMITIVE,
            d: CCMUX::COMBINED,
        },
        a0: AlphaCombinePass {
            a: ACMUX::COMBINED__LOD_FRAC,
            b: ACMUX::TEXEL0,
            c: ACMUX::PRIMITIVE,
            d: ACMUX::COMBINED__LOD_FRAC,
        },
        c1: ColorCombinePass {
            a: CCMUX::COMBINED,
            b: CCMUX::TEXEL0,
            c: CCMUX::PRIMITIVE,
            d: CCMUX::COMBINED,
        },
        a1: AlphaCombinePass {
            a: ACMUX::COMBINED__LOD_FRAC,
            b: ACMUX::TEXEL0,
            c: ACMUX::PRIMITIVE,
            d: ACMUX::COMBINED__LOD_FRAC,
        },
    };

    pub fn decode(w0: usize, w1: usize) -> Self {
        let a0 = (get_cmd(w0, 20, 4) & 0xF) as u8;
        let b0 = (get_cmd(w1, 28, 4) & 0xF) as u8;
        let c0 = (get_cmd(w0, 15, 5) & 0x1F) as u8;
        let d0 = (get_cmd(w1, 15, 3) & 0x7) as u8;

        let aa0 = (get_cmd(w0, 12, 3) & 0x7) as u8;
        let ab0 = (get_cmd(w1, 12, 3) & 0x7) as u8;
        let ac0 = (get_cmd(w0, 9, 3) & 0x7) as u8;
        let ad0 = (get_cmd(w1, 9, 3) & 0x7) as u8;

        let a1 = (get_cmd(w0, 5, 4) & 0xF) as u8;
        let b1 = (get_cmd(w1, 24, 4) & 0xF) as u8;
        let c1 = (get_cmd(w0, 0, 5) & 0x1F) as u8;
        let d1 = (get_cmd(w1, 6, 3) & 0x7) as u8;

        let aa1 = (get_cmd(w1, 21, 3) & 0x7) as u8;
        let ab1 = (get_cmd(w1, 3, 3) & 0x7) as u8;
        let ac1 = (get_cmd(w1, 18, 3) & 0x7) as u8;
        let ad1 = (get_cmd(w1, 0, 3) & 0x7) as u8;

        Self {
            c0: ColorCombinePass {
                a: CCMUX::from(a0),
                b: CCMUX::from(b0),
                c: CCMUX::from(c0),
                d: CCMUX::from(d0),
            },
            a0: AlphaCombinePass {
                a: ACMUX::from(aa0),
                b: ACMUX::from(ab0),
                c: ACMUX::from(ac0),
                d: ACMUX::from(ad0),
            },
            c1: ColorCombinePass {
                a: CCMUX::from(a1),
                b: CCMUX::from(b1),
                c: CCMUX::from(c1),
                d: CCMUX::from(d1),
            },
            a1: AlphaCombinePass {
                a: ACMUX::from(aa1),
                b: ACMUX::from(ab1),
                c: ACMUX::from(ac1),
                d: ACMUX::from(ad1),
            },
        }
    }

    pub fn uses_texture0(&self) -> bool {
        self.c0.uses_texture0()
            || self.c1.uses_texture0()
            || self.a0.uses_texture0()
            || self.a1.uses_texture0()
    }

    pub fn uses_texture1(&self) -> bool {
        self.c0.uses_texture1()
            || self.c1.uses_texture1()
            || self.a0.uses_texture1()
            || self.a1.uses_texture1()
    }

    pub fn uses_texture(&self) -> bool {
        self.uses_texture0() || self.uses_texture1()
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Hash)]
pub enum CCMUX {
    COMBINED = 0,
    TEXEL0 = 1,
    TEXEL1 = 2,
    PRIMITIVE = 3,
    SHADE = 4,
    ENVIRONMENT = 5,
    CENTER__SCALE__ONE = 6,
    // param C only
    COMBINED_ALPHA__NOISE__K4 = 7, // COMBINE_A only for C (ADD_ZERO?)
    TEXEL0_ALPHA = 8,
    TEXEL1_ALPHA = 9,
    PRIMITIVE_ALPHA = 10,
    SHADE_ALPHA = 11,
    ENV_ALPHA = 12,
    LOD_FRACTION = 13,
    PRIM_LOD_FRACTION = 14,
    K5 = 15, // MUL_ZERO?
    ZERO = 31,
}

impl CCMUX {
    pub fn from(val: u8) -> Self {
        match val {
            0 => CCMUX::COMBINED,
            1 => CCMUX::TEXEL0,
            2 => CCMUX::TEXEL1,
            3 => CCMUX::PRIMITIVE,
            4 => CCMUX::SHADE,
            5 => CCMUX::ENVIRONMENT,
            6 => CCMUX::CENTER__SCALE__ONE,
            7 => CCMUX::COMBINED_ALPHA__NOISE__K4,
            8 => CCMUX::TEXEL0_ALPHA,
            9 => CCMUX::TEXEL1_ALPHA,
            10 => CCMUX::PRIMITIVE_ALPHA,
            11 => CCMUX::SHADE_ALPHA,
            12 => CCMUX::ENV_ALPHA,
            13 => CCMUX::LOD_FRACTION,
            14 => CCMUX::PRIM_LOD_FRACTION,
            15 => CCMUX::K5,
            // the unused C selectors read as zero on hardware
            _ => CCMUX::ZERO,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Hash)]
pub enum ACMUX {
    COMBINED__LOD_FRAC = 0, // ADD?
    TEXEL0 = 1,
    TEXEL1 = 2,
    PRIMITIVE = 3,
    SHADE = 4,
    ENVIRONMENT = 5,
    PRIM_LOD_FRAC__ONE = 6,
    ZERO = 7,
}

impl ACMUX {
    pub fn from(val: u8) -> Self {
        match val {
            0 => ACMUX::COMBINED__LOD_FRAC,
            1 => ACMUX::TEXEL0,
            2 => ACMUX::TEXEL1,
            3 => ACMUX::PRIMITIVE,
            4 => ACMUX::SHADE,
            5 => ACMUX::ENVIRONMENT,
            6 => ACMUX::PRIM_LOD_FRAC__ONE,
            _ => ACMUX::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // (TEXEL0 - 0) * SHADE + 0 for color and alpha, both cycles
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

    #[test]
    fn test_decode_modulate() {
        let combine = CombineParams::decode(MODULATE_W0, MODULATE_W1);

        assert_eq!(combine.c0.a, CCMUX::TEXEL0);
        assert_eq!(combine.c0.c, CCMUX::SHADE);
        assert_eq!(combine.a0.a, ACMUX::TEXEL0);
        assert_eq!(combine.a0.d, ACMUX::ZERO);
        assert_eq!(combine.c1, combine.c0);
        assert!(combine.uses_texture0());
        assert!(!combine.uses_texture1());
    }

    #[test]
    fn test_out_of_range_selectors_read_as_zero() {
        assert_eq!(CCMUX::from(20), CCMUX::ZERO);
        assert_eq!(ACMUX::from(9), ACMUX::ZERO);
    }

    #[test]
    fn test_texel1_alpha_counts_as_texture1() {
        let mut combine = CombineParams::decode(MODULATE_W0, MODULATE_W1);
        combine.c1.c = CCMUX::TEXEL1_ALPHA;
        assert!(combine.uses_texture1());
    }
}
