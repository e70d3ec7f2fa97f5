use anyhow::Result;
use crate::db::database::Database;

/// 概念名规范化：去空白后查别名表，命中返回规范名，否则返回原名。
/// 未知概念不会被拒绝；空输入返回空串。
pub fn canonical_concept(db: &Database, raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Ok(String::new());
    }
    Ok(db.alias_target(name)?.unwrap_or_else(|| name.to_string()))
}

/// 批量规范化，丢弃空值并去重保序
pub fn canonical_concepts(db: &Database, raw: &[String]) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for r in raw {
        let name = canonical_concept(db, r)?;
        if name.is_empty() || out.contains(&name) {
            continue;
        }
        out.push(name);
    }
    Ok(out)
}

/// 主股票概念与用户选择取交集（两侧都规范化后比较），保留主股票侧原写法
pub fn filter_by_selection(db: &Database, all: &[String], selection: &[String]) -> Result<Vec<String>> {
    let selected = canonical_concepts(db, selection)?;
    let mut out = Vec::new();
    for name in all {
        if selected.contains(&canonical_concept(db, name)?) {
            out.push(name.clone());
        }
    }
    Ok(out)
}
