use anyhow::Result;

use crate::db::database::Database;
use crate::services::concept_alias::canonical_concept;

/// 概念 -> 候选成分股代码。
/// 先查结构化映射（精确匹配规范名），没有再按旧版字段模糊匹配；两者上限都是 per_concept * multiplier。
/// 结果小写、去重、保持首次出现顺序。
pub fn codes_by_concept(db: &Database, name: &str, per_concept: usize, multiplier: usize) -> Result<Vec<String>> {
    let name = canonical_concept(db, name)?;
    if name.is_empty() {
        return Ok(vec![]);
    }
    let cap = per_concept.max(1) * multiplier.max(1);
    let mut codes = db.codes_by_concept(&name, cap)?;
    if codes.is_empty() {
        codes = db.codes_by_legacy_like(&name, cap)?;
    }
    Ok(unique_lower(codes))
}

fn unique_lower(codes: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(codes.len());
    for c in codes {
        let c = c.trim().to_lowercase();
        if c.is_empty() || out.contains(&c) {
            continue;
        }
        out.push(c);
    }
    out
}
