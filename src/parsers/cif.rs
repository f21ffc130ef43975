//! # CIF 格式解析器
//!
//! 只读取 Pawley 精修需要的晶胞和空间群信息，不读取原子坐标。
//!
//! ## 读取的标签
//! ```text
//! data_Si
//! _cell_length_a      5.43094(2)
//! _cell_length_b      5.43094(2)
//! _cell_length_c      5.43094(2)
//! _cell_angle_alpha   90
//! _cell_angle_beta    90
//! _cell_angle_gamma   90
//! _space_group_name_H-M_alt  'F d -3 m'
//! ```
//! 也接受旧式标签 `_symmetry_space_group_name_H-M`。数值后的不确定度
//! `(2)` 会被去掉，引号包裹的值会被去掉引号。
//!
//! ## 依赖关系
//! - 被 `phase.rs` 使用
//! - 使用 `regex` 清理数值

use crate::error::{PawleyError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

const SPACEGROUP_TAGS: [&str; 3] = [
    "_space_group_name_h-m_alt",
    "_symmetry_space_group_name_h-m",
    "_space_group_name_h-m",
];

/// CIF 中的晶胞与空间群
#[derive(Debug, Clone, PartialEq)]
pub struct CifCell {
    pub name: String,
    pub lengths: [f64; 3],
    pub angles: [f64; 3],
    pub spacegroup: String,
}

/// 解析 CIF 文件
pub fn parse_cif_file(path: &Path) -> Result<CifCell> {
    let content = fs::read_to_string(path).map_err(|e| PawleyError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    let default_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");

    parse_cif_content(&content, default_name).map_err(|e| match e {
        PawleyError::ParseError { format, reason, .. } => PawleyError::ParseError {
            format,
            path: path.display().to_string(),
            reason,
        },
        other => other,
    })
}

/// 从字符串内容解析 CIF（只处理第一个 data_ 块）
pub fn parse_cif_content(content: &str, default_name: &str) -> Result<CifCell> {
    let mut name: Option<String> = None;
    let mut tags: HashMap<String, String> = HashMap::new();

    let lines: Vec<&str> = content.lines().collect();
    let mut in_loop_header = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();
        i += 1;

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(block) = line.strip_prefix("data_") {
            if name.is_some() {
                break;
            }
            name = Some(block.trim().to_string());
            continue;
        }

        if line.eq_ignore_ascii_case("loop_") {
            in_loop_header = true;
            continue;
        }

        if !line.starts_with('_') {
            in_loop_header = false;
            continue;
        }

        if in_loop_header {
            continue;
        }

        let (tag, value) = match line.split_once(char::is_whitespace) {
            Some((tag, value)) => (tag, value.trim().to_string()),
            None => {
                // 值在下一行
                let next = lines.get(i).map(|l| l.trim()).unwrap_or("");
                if next.is_empty() || next.starts_with('_') || next.eq_ignore_ascii_case("loop_") {
                    continue;
                }
                i += 1;
                (line, next.to_string())
            }
        };

        tags.insert(tag.to_lowercase(), unquote(&value));
    }

    let missing = |what: &str| PawleyError::ParseError {
        format: "cif".to_string(),
        path: default_name.to_string(),
        reason: format!("Missing or invalid {}", what),
    };

    let number = |tag: &str| -> Result<f64> {
        tags.get(tag)
            .and_then(|v| parse_cif_number(v))
            .ok_or_else(|| missing(tag))
    };

    let lengths = [
        number("_cell_length_a")?,
        number("_cell_length_b")?,
        number("_cell_length_c")?,
    ];
    let angles = [
        number("_cell_angle_alpha")?,
        number("_cell_angle_beta")?,
        number("_cell_angle_gamma")?,
    ];

    let spacegroup = SPACEGROUP_TAGS
        .iter()
        .find_map(|tag| tags.get(*tag))
        .filter(|v| !v.is_empty() && v.as_str() != "?" && v.as_str() != ".")
        .cloned()
        .ok_or_else(|| missing("space group (_space_group_name_H-M_alt)"))?;

    let name = name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| default_name.to_string());

    Ok(CifCell {
        name,
        lengths,
        angles,
        spacegroup,
    })
}

fn unquote(value: &str) -> String {
    let v = value.trim();
    for quote in ['\'', '"'] {
        if v.len() >= 2 && v.starts_with(quote) && v.ends_with(quote) {
            return v[1..v.len() - 1].trim().to_string();
        }
    }
    v.to_string()
}

/// 去掉标准不确定度后解析数值，如 `5.43094(2)`
fn parse_cif_number(value: &str) -> Option<f64> {
    static UNCERTAINTY: OnceLock<Option<Regex>> = OnceLock::new();
    let re = UNCERTAINTY
        .get_or_init(|| Regex::new(r"\(\d+\)$").ok())
        .as_ref()?;
    re.replace(value.trim(), "").parse().ok()
}
