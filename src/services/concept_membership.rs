use anyhow::Result;
use std::collections::HashMap;

use crate::db::database::Database;
use crate::utils::code::{bare_code, split_concept_text};

/// 概念来源，按合并顺序排列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipStrategy {
    /// 旧版 stock_info.hy_name 逗号分隔字段（基线）
    LegacyField,
    /// 结构化映射，按完整代码
    StructuredFull,
    /// 结构化映射，按裸数字代码（历史上未带前缀导入的数据）
    StructuredBare,
}

impl MembershipStrategy {
    pub const ORDER: [MembershipStrategy; 3] = [
        MembershipStrategy::LegacyField,
        MembershipStrategy::StructuredFull,
        MembershipStrategy::StructuredBare,
    ];

    pub fn is_structured(self) -> bool {
        !matches!(self, MembershipStrategy::LegacyField)
    }

    /// 查询该来源下各代码的概念；没有数据的代码不出现在结果里
    pub fn lookup(self, db: &Database, codes: &[String]) -> Result<HashMap<String, Vec<String>>> {
        let mut out: HashMap<String, Vec<String>> = HashMap::new();
        match self {
            MembershipStrategy::LegacyField => {
                for (code, info) in db.stock_infos_by_codes(codes)? {
                    let names = split_concept_text(&info.hy_name);
                    if !names.is_empty() {
                        out.insert(code, names);
                    }
                }
            }
            MembershipStrategy::StructuredFull => {
                for (code, names) in db.concept_names_grouped(codes)? {
                    out.insert(code, names);
                }
            }
            MembershipStrategy::StructuredBare => {
                let mut bare_to_full: HashMap<String, Vec<String>> = HashMap::new();
                for code in codes {
                    let bare = bare_code(code);
                    if bare != *code && !bare.is_empty() {
                        bare_to_full.entry(bare).or_default().push(code.clone());
                    }
                }
                if bare_to_full.is_empty() {
                    return Ok(out);
                }
                let bares: Vec<String> = bare_to_full.keys().cloned().collect();
                for (bare, names) in db.concept_names_grouped(&bares)? {
                    if let Some(fulls) = bare_to_full.get(&bare) {
                        for full in fulls {
                            out.insert(full.clone(), names.clone());
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}

/// 概念去重键：去空白、统一小写
pub fn concept_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

#[derive(Debug, Clone)]
struct Tagged {
    name: String,
    structured: bool,
}

/// 按首次出现顺序合并概念。重复时结构化来源的写法替换旧版字段的写法（原位置不变）。
#[derive(Debug, Clone, Default)]
pub struct ConceptMerge {
    items: Vec<Tagged>,
}

impl ConceptMerge {
    pub fn push_all(&mut self, names: &[String], structured: bool) {
        for raw in names {
            let name = raw.trim();
            if name.is_empty() {
                continue;
            }
            let key = concept_key(name);
            match self.items.iter_mut().find(|t| concept_key(&t.name) == key) {
                Some(existing) => {
                    if structured && !existing.structured {
                        existing.name = name.to_string();
                        existing.structured = true;
                    }
                }
                None => self.items.push(Tagged {
                    name: name.to_string(),
                    structured,
                }),
            }
        }
    }

    pub fn into_names(self) -> Vec<String> {
        self.items.into_iter().map(|t| t.name).collect()
    }
}

/// 代码 -> 有序去重的概念列表；没有任何概念的代码不出现在结果里
pub fn resolve_concepts(db: &Database, codes: &[String]) -> Result<HashMap<String, Vec<String>>> {
    let mut merged: HashMap<String, ConceptMerge> = HashMap::new();
    for strategy in MembershipStrategy::ORDER {
        let found = strategy.lookup(db, codes)?;
        // 按输入顺序合并，保证结果与 HashMap 迭代顺序无关
        for code in codes {
            if let Some(names) = found.get(code) {
                merged
                    .entry(code.clone())
                    .or_default()
                    .push_all(names, strategy.is_structured());
            }
        }
    }
    Ok(merged
        .into_iter()
        .map(|(code, m)| (code, m.into_names()))
        .filter(|(_, names)| !names.is_empty())
        .collect())
}

/// 单只股票的概念列表
pub fn concepts_for_code(db: &Database, code: &str) -> Result<Vec<String>> {
    let codes = vec![code.to_string()];
    Ok(resolve_concepts(db, &codes)?.remove(code).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stock::StockInfo;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn test_merge_keeps_first_seen_order() {
        let mut m = ConceptMerge::default();
        m.push_all(&s(&["AI", "芯片"]), false);
        m.push_all(&s(&["芯片", "CPO"]), true);
        assert_eq!(m.into_names(), vec!["AI", "芯片", "CPO"]);
    }

    #[test]
    fn test_structured_spelling_replaces_legacy() {
        let mut m = ConceptMerge::default();
        m.push_all(&s(&["ai 应用", "光伏"]), false);
        m.push_all(&s(&["AI应用"]), true);
        m.push_all(&s(&["Ai应用 "]), true);
        assert_eq!(m.into_names(), vec!["AI应用", "光伏"]);
    }

    #[test]
    fn test_each_strategy_independently() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_stock_infos(&[StockInfo { code: "sh600000".into(), name: "浦发银行".into(), hy_name: "银行,上海".into() }]).unwrap();
        db.replace_concepts_for_code("600000", &s(&["破净股"])).unwrap();
        let codes = s(&["sh600000"]);

        let legacy = MembershipStrategy::LegacyField.lookup(&db, &codes).unwrap();
        assert_eq!(legacy["sh600000"], s(&["银行", "上海"]));
        assert!(MembershipStrategy::StructuredFull.lookup(&db, &codes).unwrap().is_empty());
        let bare = MembershipStrategy::StructuredBare.lookup(&db, &codes).unwrap();
        assert_eq!(bare["sh600000"], s(&["破净股"]));

        let resolved = resolve_concepts(&db, &codes).unwrap();
        assert_eq!(resolved["sh600000"], s(&["银行", "上海", "破净股"]));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_stock_infos(&[StockInfo { code: "sz300750".into(), name: "宁德时代".into(), hy_name: "AI,芯片".into() }]).unwrap();
        db.replace_concepts_for_code("sz300750", &s(&["芯片", "CPO"])).unwrap();
        let codes = s(&["sz300750", "sh688000"]);
        let first = resolve_concepts(&db, &codes).unwrap();
        let second = resolve_concepts(&db, &codes).unwrap();
        assert_eq!(first, second);
        assert!(!first.contains_key("sh688000"));
    }
}
