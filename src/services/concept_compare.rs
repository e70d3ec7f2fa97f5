use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::db::database::Database;
use crate::error::{AnalyError, AnalyResult};
use crate::models::analy::{ConceptCount, OverlapResult, OverlapRow};
use crate::services::concept_membership::resolve_concepts;
use crate::utils::code::{looks_like_code, normalize_codes, split_flexible};

/// 两组股票的概念重叠对比：按 A 组概念频次给 B 组每只股票加权打分
pub struct ConceptCompare {
    db: Arc<Database>,
}

impl ConceptCompare {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// 代码或股票名称混合输入；名称查不到时按代码归一化兜底
    fn resolve_inputs(&self, raw: &[String]) -> AnalyResult<Vec<String>> {
        let mut flat = Vec::new();
        for token in raw.iter().flat_map(|s| split_flexible(s)) {
            if looks_like_code(&token) {
                flat.push(token);
                continue;
            }
            match self.db.code_by_name(&token)? {
                Some(code) => flat.push(code),
                None => {
                    log::debug!("未找到股票名称 {}，按代码处理", token);
                    flat.push(token);
                }
            }
        }
        Ok(normalize_codes(&flat))
    }

    pub fn compare(&self, raw_a: &[String], raw_b: &[String], only_overlap: bool) -> AnalyResult<OverlapResult> {
        let codes_a = self.resolve_inputs(raw_a)?;
        let codes_b = self.resolve_inputs(raw_b)?;
        if codes_a.is_empty() || codes_b.is_empty() {
            return Err(AnalyError::InvalidInput("A、B 两组代码都不能为空".to_string()));
        }

        let concepts_a = resolve_concepts(&self.db, &codes_a)?;
        let concepts_b = resolve_concepts(&self.db, &codes_b)?;

        // A 组概念频次，每只股票每个概念只计一次
        let mut freq: HashMap<String, usize> = HashMap::new();
        for lst in concepts_a.values() {
            let mut seen = HashSet::new();
            for v in lst {
                let v = v.trim();
                if v.is_empty() || !seen.insert(v) {
                    continue;
                }
                *freq.entry(v.to_string()).or_insert(0) += 1;
            }
        }

        let names = self.db.stock_infos_by_codes(&codes_b)?;
        let mut rows = Vec::new();
        for code in &codes_b {
            let mut details: Vec<ConceptCount> = Vec::new();
            for v in concepts_b.get(code).into_iter().flatten() {
                if let Some(&count) = freq.get(v.trim()) {
                    if !details.iter().any(|d| d.name == v.trim()) {
                        details.push(ConceptCount { name: v.trim().to_string(), count });
                    }
                }
            }
            if details.is_empty() && only_overlap {
                continue;
            }
            sort_counts(&mut details);
            rows.push(OverlapRow {
                code: code.clone(),
                name: names.get(code).map(|i| i.name.clone()).unwrap_or_default(),
                overlap: details.len(),
                weighted: details.iter().map(|d| d.count).sum(),
                concepts: details,
            });
        }
        rows.sort_by(|a, b| {
            b.weighted
                .cmp(&a.weighted)
                .then_with(|| b.overlap.cmp(&a.overlap))
                .then_with(|| a.code.cmp(&b.code))
        });

        let mut concepts_a: Vec<ConceptCount> = freq
            .into_iter()
            .map(|(name, count)| ConceptCount { name, count })
            .collect();
        sort_counts(&mut concepts_a);

        Ok(OverlapResult { rows, concepts_a })
    }
}

fn sort_counts(list: &mut [ConceptCount]) {
    list.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
}
