use wgpu::{BlendComponent, BlendFactor, BlendOperation, BlendState};

use super::{
    config::Hacks,
    rdp::{BlenderMux, OtherModeHCycleType},
};

/// The slice of RDP state the fixed-function blend is derived from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendInputs {
    pub cycle_type: OtherModeHCycleType,
    pub force_blender: bool,
    pub clear_on_cvg: bool,
    /// Blender selectors of the first and second cycle
    pub mux: [BlenderMux; 2],
    pub texture_on: bool,
    pub combiner_uses_texture: bool,
    pub fog_alpha: f32,
    pub hacks: Hacks,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BlendMode {
    Disabled,
    Enabled {
        state: BlendState,
        /// Blend constant the factors refer to, if any.
        constant: Option<[f32; 4]>,
    },
}

impl BlendMode {
    fn factors(src_factor: BlendFactor, dst_factor: BlendFactor) -> Self {
        let component = BlendComponent {
            src_factor,
            dst_factor,
            operation: BlendOperation::Add,
        };
        BlendMode::Enabled {
            state: BlendState {
                color: component,
                alpha: component,
            },
            constant: None,
        }
    }

    /// Keeps the framebuffer contents untouched.
    fn keep_destination() -> Self {
        Self::factors(BlendFactor::Zero, BlendFactor::One)
    }

    pub fn blend_state(&self) -> Option<BlendState> {
        match self {
            BlendMode::Disabled => None,
            BlendMode::Enabled { state, .. } => Some(*state),
        }
    }
}

// 1 - factor, for the first blender input
fn one_minus(m1b: u32) -> BlendFactor {
    match m1b {
        0 => BlendFactor::OneMinusSrcAlpha,
        1 => BlendFactor::OneMinusConstant,
        2 => {
            debug_assert!(false, "shade alpha as blender input");
            BlendFactor::OneMinusSrcAlpha
        }
        _ => BlendFactor::One,
    }
}

pub fn translate_blend_mode(inputs: &BlendInputs) -> BlendMode {
    let below_copy = inputs.cycle_type < OtherModeHCycleType::G_CYC_COPY;

    if inputs.force_blender && below_copy {
        let mux = if inputs.cycle_type == OtherModeHCycleType::G_CYC_2CYCLE {
            inputs.mux[1]
        } else {
            inputs.mux[0]
        };

        if mux.m1a == 1 && mux.m2a == 1 {
            return BlendMode::keep_destination();
        }

        let mut src_factor = BlendFactor::One;
        if mux.m2a == 0 && mux.m2b == 1 {
            // color times memory alpha
            src_factor = BlendFactor::DstAlpha;
        }

        let dst_factor = if mux.m1a == 1 {
            match mux.m1b {
                0 => BlendFactor::SrcAlpha,
                1 => BlendFactor::Constant,
                2 => {
                    debug_assert!(false, "shade alpha as blender input");
                    BlendFactor::SrcAlpha
                }
                _ => BlendFactor::Zero,
            }
        } else if mux.m2a == 1 {
            match mux.m2b {
                0 => one_minus(mux.m1b),
                1 => BlendFactor::DstAlpha,
                2 => BlendFactor::One,
                _ => BlendFactor::Zero,
            }
        } else {
            BlendFactor::Zero
        };

        let uses_constant = matches!(
            dst_factor,
            BlendFactor::Constant | BlendFactor::OneMinusConstant
        );
        return match BlendMode::factors(src_factor, dst_factor) {
            BlendMode::Enabled { state, .. } if uses_constant => BlendMode::Enabled {
                state,
                constant: Some([inputs.fog_alpha; 4]),
            },
            mode => mode,
        };
    }

    if inputs.hacks.contains(Hacks::PILOT_WINGS) && inputs.clear_on_cvg {
        // coverage-only writes without a forced blender
        return BlendMode::keep_destination();
    }

    if inputs.hacks.contains(Hacks::BLAST_CORPS)
        && below_copy
        && !inputs.texture_on
        && inputs.combiner_uses_texture
    {
        return BlendMode::keep_destination();
    }

    if !inputs.force_blender && below_copy && inputs.mux[0].m1a == 1 && inputs.mux[0].m2a == 1 {
        return BlendMode::keep_destination();
    }

    BlendMode::Disabled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mux(m1a: u32, m1b: u32, m2a: u32, m2b: u32) -> BlenderMux {
        BlenderMux { m1a, m1b, m2a, m2b }
    }

    fn forced(cycle_mux: BlenderMux) -> BlendInputs {
        BlendInputs {
            cycle_type: OtherModeHCycleType::G_CYC_1CYCLE,
            force_blender: true,
            clear_on_cvg: false,
            mux: [cycle_mux, BlenderMux::default()],
            texture_on: true,
            combiner_uses_texture: true,
            fog_alpha: 0.5,
            hacks: Hacks::empty(),
        }
    }

    fn factors(mode: BlendMode) -> (BlendFactor, BlendFactor) {
        let state = mode.blend_state().unwrap();
        (state.color.src_factor, state.color.dst_factor)
    }

    #[test]
    fn test_memory_on_both_sides_keeps_destination() {
        let mode = translate_blend_mode(&forced(mux(1, 0, 1, 0)));
        assert_eq!(factors(mode), (BlendFactor::Zero, BlendFactor::One));
    }

    #[test]
    fn test_standard_alpha_blend() {
        // pixel * pixel alpha + memory * (1 - pixel alpha)
        let mode = translate_blend_mode(&forced(mux(0, 0, 1, 0)));
        assert_eq!(
            factors(mode),
            (BlendFactor::One, BlendFactor::OneMinusSrcAlpha)
        );
    }

    #[test]
    fn test_fog_alpha_uses_blend_constant() {
        let mode = translate_blend_mode(&forced(mux(0, 1, 1, 0)));
        assert_eq!(
            mode,
            BlendMode::Enabled {
                state: BlendMode::factors(BlendFactor::One, BlendFactor::OneMinusConstant)
                    .blend_state()
                    .unwrap(),
                constant: Some([0.5; 4]),
            }
        );
    }

    #[test]
    fn test_memory_alpha_source_factor() {
        let mode = translate_blend_mode(&forced(mux(1, 3, 0, 1)));
        assert_eq!(factors(mode), (BlendFactor::DstAlpha, BlendFactor::Zero));
    }

    #[test]
    fn test_two_cycle_reads_second_cycle() {
        let mut inputs = forced(mux(0, 0, 0, 0));
        inputs.cycle_type = OtherModeHCycleType::G_CYC_2CYCLE;
        inputs.mux[1] = mux(0, 0, 1, 2);
        assert_eq!(
            factors(translate_blend_mode(&inputs)),
            (BlendFactor::One, BlendFactor::One)
        );
    }

    #[test]
    fn test_copy_mode_disables_blending() {
        let mut inputs = forced(mux(0, 0, 1, 0));
        inputs.cycle_type = OtherModeHCycleType::G_CYC_COPY;
        assert_eq!(translate_blend_mode(&inputs), BlendMode::Disabled);
    }

    #[test]
    fn test_hacks_without_forced_blender() {
        let mut inputs = forced(mux(0, 0, 0, 0));
        inputs.force_blender = false;
        assert_eq!(translate_blend_mode(&inputs), BlendMode::Disabled);

        inputs.clear_on_cvg = true;
        inputs.hacks = Hacks::PILOT_WINGS;
        assert_eq!(
            factors(translate_blend_mode(&inputs)),
            (BlendFactor::Zero, BlendFactor::One)
        );

        inputs.clear_on_cvg = false;
        inputs.hacks = Hacks::BLAST_CORPS;
        inputs.texture_on = false;
        assert_eq!(
            factors(translate_blend_mode(&inputs)),
            (BlendFactor::Zero, BlendFactor::One)
        );

        inputs.hacks = Hacks::empty();
        inputs.mux[0] = mux(1, 0, 1, 0);
        assert_eq!(
            factors(translate_blend_mode(&inputs)),
            (BlendFactor::Zero, BlendFactor::One)
        );
    }
}
