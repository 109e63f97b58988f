//! # 缺陷生成器
//!
//! 构造时运行完整流程：原胞约化 → 氧化态猜测 → 空位 / 反位 / 替位 / 间隙枚举
//! → 共享超胞矩阵 → 各电荷态的缺陷条目与命名 → 汇总表。
//!
//! 生成后以有序映射（名称 -> 条目）的形式提供类型化的容器操作；
//! 手动插入的条目需与原胞和共享超胞一致。
//!
//! ## 依赖关系
//! - 被 `commands/generate.rs` 使用
//! - 使用 `generation/` 下全部子模块、`symmetry/`、`parsers/`、`utils/`

use crate::error::{DefectError, Result};
use crate::generation::assembler::{assemble_entry, defect_entry_from_defect, defect_supercell_structure};
use crate::generation::charges::{decorate, guess_oxidation_states};
use crate::generation::config::GeneratorConfig;
use crate::generation::enumerators;
use crate::generation::naming::{apply_rename, NameRegistry, Registration};
use crate::generation::summary::render_summary;
use crate::generation::supercell::{find_supercell_matrix, make_supercell, SupercellMatrix};
use crate::generation::voronoi::{InterstitialFinder, VoronoiInterstitialFinder};
use crate::models::defect::name_with_charge;
use crate::models::{Defect, DefectCategory, DefectEntry, Structure};
use crate::parsers::{poscar, read_json, write_json};
use crate::symmetry::{SpaceGroupAnalyzer, SymmetryAnalyzer};
use crate::utils::{output, progress};

use indexmap::IndexMap;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::ops::Index;
use std::path::Path;

/// 持久化记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorRecord {
    pub defects: IndexMap<DefectCategory, Vec<Defect>>,
    pub defect_entries: IndexMap<String, DefectEntry>,
    pub primitive_structure: Structure,
    pub supercell_matrix: SupercellMatrix,
    /// 对称性判断使用的位置容差 (Å)
    #[serde(default = "default_symprec")]
    pub symprec: f64,
}

fn default_symprec() -> f64 {
    SpaceGroupAnalyzer::default().symprec
}

/// 缺陷生成器
#[derive(Debug, Clone)]
pub struct DefectsGenerator {
    defects: IndexMap<DefectCategory, Vec<Defect>>,
    defect_entries: IndexMap<String, DefectEntry>,
    primitive_structure: Structure,
    supercell_matrix: SupercellMatrix,
    symprec: f64,
    n_operations: usize,
}

impl DefectsGenerator {
    /// 使用内置对称性分析与 Voronoi 间隙搜索
    pub fn new(structure: &Structure, config: GeneratorConfig) -> Result<Self> {
        let analyzer = SpaceGroupAnalyzer::new(config.symprec);
        let finder = VoronoiInterstitialFinder::new(config.voronoi);
        Self::with_components(structure, config, &analyzer, &finder)
    }

    /// 使用外部提供的对称性分析器与间隙搜索器
    pub fn with_components(
        structure: &Structure,
        config: GeneratorConfig,
        analyzer: &dyn SymmetryAnalyzer,
        finder: &dyn InterstitialFinder,
    ) -> Result<Self> {
        let pb = if config.show_progress {
            progress::create_progress_bar(100, "Getting primitive structure")
        } else {
            ProgressBar::hidden()
        };

        let prim = analyzer.primitive_standard_structure(structure)?;
        let ops = analyzer.operations(&prim)?;
        let orbits = analyzer.equivalent_sites(&prim)?;
        pb.inc(5);

        pb.set_message("Guessing oxidation states");
        let host_states = guess_oxidation_states(&prim);
        let mut decorated = prim.clone();
        decorate(&mut decorated, &host_states);
        pb.inc(10);

        pb.set_message("Generating vacancies");
        let vacancies = enumerators::vacancies(&decorated, &orbits, &host_states);
        pb.inc(10);

        pb.set_message("Generating substitutions");
        let host_elements = prim.elements();
        let mut substitutions = enumerators::antisites(&decorated, &orbits, &host_states);
        substitutions.extend(enumerators::substitutions(
            &decorated,
            &orbits,
            &host_states,
            &config.extrinsic.substitutions(&host_elements),
        ));
        pb.inc(10);

        pb.set_message("Generating interstitials");
        let sites = if config.interstitial_coords.is_empty() {
            finder.find_sites(&prim, &ops)?
        } else {
            enumerators::sites_from_coords(&prim, &ops, &config.interstitial_coords, &config.voronoi)
        };
        let mut insert_elements = host_elements.clone();
        for el in config.extrinsic.extrinsic_elements() {
            if !insert_elements.contains(&el) {
                insert_elements.push(el);
            }
        }
        let interstitials = enumerators::interstitials(&prim, &sites, &insert_elements, &host_states);
        pb.inc(30);

        pb.set_message("Determining supercell");
        let supercell_matrix = find_supercell_matrix(&prim, &config.supercell)?;
        pb.inc(15);

        pb.set_message("Generating DefectEntry objects");
        let mut defects = IndexMap::new();
        for (category, list) in [
            (DefectCategory::Vacancies, vacancies),
            (DefectCategory::Substitutions, substitutions),
            (DefectCategory::Interstitials, interstitials),
        ] {
            if !list.is_empty() {
                defects.insert(category, list);
            }
        }
        let defect_entries = build_entries(&defects, &supercell_matrix)?;
        pb.inc(20);
        pb.finish_and_clear();

        let generator = DefectsGenerator {
            defects,
            defect_entries,
            primitive_structure: prim,
            supercell_matrix,
            symprec: analyzer.symprec(),
            n_operations: ops.len(),
        };

        if config.print_summary {
            output::print_header(&generator.to_string());
            output::print_table("Defect summary", &generator.info());
        }
        Ok(generator)
    }

    // ─────────────────────────────────────────────────────────────
    // 访问器
    // ─────────────────────────────────────────────────────────────

    pub fn defects(&self) -> &IndexMap<DefectCategory, Vec<Defect>> {
        &self.defects
    }

    pub fn defect_entries(&self) -> &IndexMap<String, DefectEntry> {
        &self.defect_entries
    }

    pub fn primitive_structure(&self) -> &Structure {
        &self.primitive_structure
    }

    pub fn supercell_matrix(&self) -> &SupercellMatrix {
        &self.supercell_matrix
    }

    // ─────────────────────────────────────────────────────────────
    // 容器操作
    // ─────────────────────────────────────────────────────────────

    pub fn get(&self, name: &str) -> Option<&DefectEntry> {
        self.defect_entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DefectEntry> {
        self.defect_entries.get_mut(name)
    }

    /// 插入（或替换）条目：缺陷原胞须与生成器原胞一致，超胞须能由共享矩阵重建
    pub fn insert(&mut self, key: impl Into<String>, mut entry: DefectEntry) -> Result<()> {
        let key = key.into();
        if entry.defect.structure != self.primitive_structure {
            return Err(DefectError::StructureMismatch(format!(
                "the defect structure of '{}' differs from the primitive structure",
                key
            )));
        }

        let expected = assemble_entry(&entry.defect, &self.supercell_matrix, 0)?;
        if expected.sc_entry.structure != entry.sc_entry.structure {
            return Err(DefectError::SupercellMismatch { name: key });
        }

        let list = self.defects.entry(entry.defect.kind.category()).or_default();
        if !list.contains(&entry.defect) {
            list.push(entry.defect.clone());
        }

        entry.name = key.clone();
        self.defect_entries.insert(key, entry);
        Ok(())
    }

    /// 只删除条目，不删除对应的缺陷
    pub fn remove(&mut self, name: &str) -> Option<DefectEntry> {
        self.defect_entries.shift_remove(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.defect_entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.defect_entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defect_entries.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, DefectEntry> {
        self.defect_entries.iter()
    }

    pub fn names(&self) -> indexmap::map::Keys<'_, String, DefectEntry> {
        self.defect_entries.keys()
    }

    pub fn entries(&self) -> indexmap::map::Values<'_, String, DefectEntry> {
        self.defect_entries.values()
    }

    // ─────────────────────────────────────────────────────────────
    // 汇总与输出
    // ─────────────────────────────────────────────────────────────

    /// 各类别的汇总表
    pub fn info(&self) -> String {
        render_summary(&self.defect_entries, &self.primitive_structure.elements())
    }

    /// 完整宿主超胞
    pub fn bulk_supercell(&self) -> Result<Structure> {
        make_supercell(&self.primitive_structure, &self.supercell_matrix)
    }

    /// 写出 `bulk/POSCAR` 与每个条目的 `<name>/POSCAR`；返回写出的文件数
    pub fn write_poscars(&self, dir: &Path) -> Result<usize> {
        let mut written = 0;

        let bulk_dir = dir.join("bulk");
        create_dir(&bulk_dir)?;
        let bulk = self.bulk_supercell()?;
        poscar::write_poscar(&bulk_dir.join("POSCAR"), &bulk, &format!("{} bulk supercell", bulk.formula()))?;
        written += 1;

        for (name, entry) in &self.defect_entries {
            let entry_dir = dir.join(name);
            create_dir(&entry_dir)?;
            poscar::write_poscar(&entry_dir.join("POSCAR"), &entry.sc_entry.structure, name)?;
            written += 1;
        }
        Ok(written)
    }

    // ─────────────────────────────────────────────────────────────
    // 序列化
    // ─────────────────────────────────────────────────────────────

    pub fn to_record(&self) -> GeneratorRecord {
        GeneratorRecord {
            defects: self.defects.clone(),
            defect_entries: self.defect_entries.clone(),
            primitive_structure: self.primitive_structure.clone(),
            supercell_matrix: self.supercell_matrix,
            symprec: self.symprec,
        }
    }

    /// 直接恢复字段，不重新运行生成流程；条目名称以映射键为准
    pub fn from_record(record: GeneratorRecord) -> Result<Self> {
        let n_operations = SpaceGroupAnalyzer::new(record.symprec)
            .operations(&record.primitive_structure)?
            .len();
        let mut defect_entries = record.defect_entries;
        for (name, entry) in defect_entries.iter_mut() {
            entry.name = name.clone();
        }
        Ok(DefectsGenerator {
            defects: record.defects,
            defect_entries,
            primitive_structure: record.primitive_structure,
            supercell_matrix: record.supercell_matrix,
            symprec: record.symprec,
            n_operations,
        })
    }

    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        write_json(path, &self.to_record())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let record: GeneratorRecord = read_json(path)?;
        Self::from_record(record)
    }
}

/// 按类别、发现顺序组装全部条目并命名
fn build_entries(
    defects: &IndexMap<DefectCategory, Vec<Defect>>,
    matrix: &SupercellMatrix,
) -> Result<IndexMap<String, DefectEntry>> {
    let mut entries: IndexMap<String, DefectEntry> = IndexMap::new();

    for list in defects.values() {
        let mut registry = NameRegistry::new();
        for defect in list {
            let registration = registry.register(&defect.base_name());
            if let Registration::Collision {
                rename_from,
                rename_to,
                ..
            } = &registration
            {
                apply_rename(&mut entries, rename_from, rename_to);
            }

            let sc = defect_supercell_structure(defect, matrix)?;
            for q in defect.charge_states() {
                let mut entry = defect_entry_from_defect(defect, &sc, q)?;
                let name = name_with_charge(registration.name(), q);
                entry.name = name.clone();
                entries.insert(name, entry);
            }
        }
    }
    Ok(entries)
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| DefectError::FileWriteError {
        path: dir.display().to_string(),
        source: e,
    })
}

impl fmt::Display for DefectsGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DefectsGenerator for input {} with {} symmetry operations and {} defect entries created.",
            self.primitive_structure.formula(),
            self.n_operations,
            self.defect_entries.len()
        )
    }
}

impl Index<&str> for DefectsGenerator {
    type Output = DefectEntry;

    /// 名称不存在时 panic，与 `IndexMap` 的索引语义一致
    fn index(&self, name: &str) -> &DefectEntry {
        &self.defect_entries[name]
    }
}

impl<'a> IntoIterator for &'a DefectsGenerator {
    type Item = (&'a String, &'a DefectEntry);
    type IntoIter = indexmap::map::Iter<'a, String, DefectEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.defect_entries.iter()
    }
}
