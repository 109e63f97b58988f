//! # 元素数据
//!
//! 常见氧化态表，按常见程度排序（第一个为最常见）。用于氧化态猜测和缺陷电荷态生成。
//!
//! ## 依赖关系
//! - 被 `generation/charges.rs` 使用

/// 元素的常见氧化态；未收录的元素返回空切片
pub fn common_oxidation_states(symbol: &str) -> &'static [i32] {
    match symbol {
        "H" => &[1, -1],
        "Li" | "Na" | "K" | "Rb" | "Cs" | "Ag" => &[1],
        "Be" | "Mg" | "Ca" | "Sr" | "Ba" | "Zn" | "Cd" => &[2],
        "B" => &[3],
        "Al" | "Ga" | "Sc" | "Y" | "La" | "Gd" | "Lu" => &[3],
        "In" => &[3, 1],
        "Tl" => &[1, 3],
        "C" => &[4, -4, 2],
        "Si" => &[4, -4],
        "Ge" => &[4, 2, -4],
        "Sn" => &[4, 2, -4],
        "Pb" => &[2, 4],
        "N" => &[-3, 3, 5],
        "P" => &[-3, 3, 5],
        "As" => &[-3, 3, 5],
        "Sb" => &[-3, 3, 5],
        "Bi" => &[3],
        "O" => &[-2],
        "S" | "Se" => &[-2, 2, 4, 6],
        "Te" => &[-2, 2, 4, 6],
        "F" => &[-1],
        "Cl" | "Br" | "I" => &[-1, 1, 3, 5, 7],
        "Ti" => &[4],
        "Zr" | "Hf" => &[4],
        "V" => &[5, 3, 4],
        "Nb" | "Ta" => &[5],
        "Cr" => &[3, 6],
        "Mo" | "W" => &[6, 4],
        "Mn" => &[2, 4, 7],
        "Fe" => &[3, 2],
        "Co" => &[2, 3],
        "Ni" => &[2],
        "Cu" => &[2, 1],
        "Au" => &[3, 1],
        "Hg" => &[2, 1],
        "Pd" | "Pt" => &[2, 4],
        "Ce" => &[3, 4],
        _ => &[],
    }
}

/// 最常见氧化态，未收录的元素视为 0
pub fn most_common_oxidation_state(symbol: &str) -> i32 {
    common_oxidation_states(symbol).first().copied().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_states() {
        assert_eq!(most_common_oxidation_state("Cd"), 2);
        assert_eq!(most_common_oxidation_state("Te"), -2);
        assert_eq!(most_common_oxidation_state("Unobtainium"), 0);
        assert!(common_oxidation_states("Cu").contains(&1));
    }
}
