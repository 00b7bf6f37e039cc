use bitflags::bitflags;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    Stretch,
    Ratio4_3,
    Ratio16_9,
    Adjust,
}

impl AspectRatio {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => AspectRatio::Stretch,
            1 => AspectRatio::Ratio4_3,
            2 => AspectRatio::Ratio16_9,
            3 => AspectRatio::Adjust,
            _ => {
                debug_assert!(false, "unknown aspect ratio {}", value);
                AspectRatio::Stretch
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TexrectCorrection {
    #[default]
    None,
    /// Snap edges that land just short of the previous rectangle.
    Smart,
    /// Always extend the lower-right corner by a quarter pixel.
    Force,
}

bitflags! {
    /// Per-title workarounds, chosen by the frontend.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Hacks: u32 {
        const PILOT_WINGS = 1 << 0;
        const BLAST_CORPS = 1 << 1;
        const ZELDA_MM = 1 << 2;
        const DO_NOT_RESET_TLUT_MODE = 1 << 3;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameBufferEmulationConfig {
    pub enable: bool,
    pub aspect: AspectRatio,
    /// Emulate depth compare in the shader instead of the fixed-function test.
    pub n64_depth_compare: bool,
    pub copy_depth_to_rdram: bool,
    /// 0 scales with the window, otherwise a fixed multiple of native resolution.
    pub native_res_factor: u32,
}

impl Default for FrameBufferEmulationConfig {
    fn default() -> Self {
        Self {
            enable: true,
            aspect: AspectRatio::Ratio4_3,
            n64_depth_compare: false,
            copy_depth_to_rdram: true,
            native_res_factor: 0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralEmulationConfig {
    pub correct_texrect_coords: TexrectCorrection,
    pub hacks: Hacks,
    pub enable_hw_lighting: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureConfig {
    /// Byte budget of the regular texture cache.
    pub max_bytes: usize,
    pub bilinear: bool,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024 * 1024,
            bilinear: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureFilterConfig {
    pub hires_enable: bool,
    pub filter: u32,
    pub enhancement: u32,
    pub compress: bool,
    pub dump: bool,
    pub force_16bpp: bool,
    pub full_alpha_channel: bool,
    /// Hi-res cache budget in megabytes.
    pub cache_size: u32,
    pub path: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub frame_buffer_emulation: FrameBufferEmulationConfig,
    pub generation: GeneralEmulationConfig,
    pub texture: TextureConfig,
    pub texture_filter: TextureFilterConfig,
}
