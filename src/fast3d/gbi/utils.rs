use wgpu::Face;

use crate::fast3d::{
    rdp::{OtherModeHCycleType, OtherModeH_Layout},
    rsp::RSPGeometry,
    utils::texture::{TextFilt, TextureLUT},
};

pub fn get_cmd(val: usize, start_bit: u32, num_bits: u32) -> usize {
    (val >> start_bit) & ((1 << num_bits) - 1)
}

pub fn get_cycle_type_from_other_mode_h(mode_h: u32) -> OtherModeHCycleType {
    match (mode_h >> OtherModeH_Layout::G_MDSFT_CYCLETYPE as u32) & 0x03 {
        0 => OtherModeHCycleType::G_CYC_1CYCLE,
        1 => OtherModeHCycleType::G_CYC_2CYCLE,
        2 => OtherModeHCycleType::G_CYC_COPY,
        _ => OtherModeHCycleType::G_CYC_FILL,
    }
}

pub fn get_textfilter_from_other_mode_h(mode_h: u32) -> TextFilt {
    match (mode_h >> OtherModeH_Layout::G_MDSFT_TEXTFILT as u32) & 0x3 {
        2 => TextFilt::G_TF_BILERP,
        3 => TextFilt::G_TF_AVERAGE,
        _ => TextFilt::G_TF_POINT,
    }
}

pub fn get_texture_lut_from_other_mode_h(mode_h: u32) -> TextureLUT {
    TextureLUT::from_u32((mode_h >> OtherModeH_Layout::G_MDSFT_TEXTLUT as u32) & 0x3)
}

/// Culling is on when either cull bit is set; back face wins when both are.
pub fn translate_cull_mode(geometry_mode: u32) -> Option<Face> {
    if geometry_mode & RSPGeometry::G_CULL_BOTH as u32 == 0 {
        return None;
    }

    if geometry_mode & RSPGeometry::G_CULL_BACK as u32 != 0 {
        Some(Face::Back)
    } else {
        Some(Face::Front)
    }
}
