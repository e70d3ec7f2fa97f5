use std::sync::Arc;

use crate::db::database::Database;
use crate::error::{AnalyError, AnalyResult};
use crate::models::concept::{AliasPayload, ConceptAlias, ConceptMaster, ConceptPayload, IngestSummary};
use crate::models::stock::{DailyBar, StockInfo};
use crate::utils::code::normalize_code;

/// 概念映射、别名、股票信息与日线的写入方
pub struct ConceptIngest {
    db: Arc<Database>,
}

impl ConceptIngest {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// 导入外部概念映射 JSON（两种格式其一），逐代码整体替换
    pub fn apply_mapping_json(&self, raw: &str) -> AnalyResult<IngestSummary> {
        let payload: ConceptPayload = serde_json::from_str(raw)
            .map_err(|e| AnalyError::InvalidInput(format!("不支持的映射格式: {}", e)))?;
        self.apply_mapping(payload)
    }

    pub fn apply_mapping(&self, payload: ConceptPayload) -> AnalyResult<IngestSummary> {
        // 代码 -> 概念，保持首次出现顺序
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        let mut push = |raw_code: &str, raw_name: &str| {
            let code = normalize_code(raw_code);
            let name = raw_name.trim();
            if code.is_empty() {
                return;
            }
            let idx = match grouped.iter().position(|(c, _)| *c == code) {
                Some(i) => i,
                None => {
                    grouped.push((code, Vec::new()));
                    grouped.len() - 1
                }
            };
            let names = &mut grouped[idx].1;
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        };

        match payload {
            ConceptPayload::ByConcept { concepts } => {
                for entry in &concepts {
                    for code in &entry.codes {
                        push(code.as_str(), entry.name.as_str());
                    }
                }
            }
            ConceptPayload::ByCode { codes } => {
                for entry in &codes {
                    for name in &entry.concepts {
                        push(entry.code.as_str(), name.as_str());
                    }
                }
            }
        }

        if grouped.is_empty() {
            return Err(AnalyError::InvalidInput("映射解析后为空".to_string()));
        }

        let mut summary = IngestSummary::default();
        for (code, names) in &grouped {
            self.db.replace_concepts_for_code(code, names)?;
            summary.codes += 1;
            summary.mappings += names.len();
        }
        log::info!("概念映射导入完成: {} 个代码, {} 条映射", summary.codes, summary.mappings);
        Ok(summary)
    }

    pub fn apply_alias_json(&self, raw: &str) -> AnalyResult<usize> {
        let payload: AliasPayload = serde_json::from_str(raw)
            .map_err(|e| AnalyError::InvalidInput(format!("别名格式错误: {}", e)))?;
        let aliases = match payload {
            AliasPayload::Batch { aliases } => aliases,
            AliasPayload::Single(one) => vec![one],
        };
        self.upsert_aliases(&aliases)
    }

    /// 别名 -> 规范名，空项跳过，后写覆盖
    pub fn upsert_aliases(&self, aliases: &[ConceptAlias]) -> AnalyResult<usize> {
        let mut n = 0;
        for a in aliases {
            let (alias, name) = (a.alias.trim(), a.name.trim());
            if alias.is_empty() || name.is_empty() {
                continue;
            }
            self.db.upsert_alias(alias, name)?;
            n += 1;
        }
        Ok(n)
    }

    pub fn upsert_concept_masters(&self, concepts: &[ConceptMaster]) -> AnalyResult<usize> {
        let mut n = 0;
        for c in concepts {
            let name = c.name.trim();
            if name.is_empty() {
                continue;
            }
            self.db.upsert_concept_master(&ConceptMaster {
                name: name.to_string(),
                hy_code: c.hy_code.trim().to_string(),
            })?;
            n += 1;
        }
        Ok(n)
    }

    pub fn upsert_stock_infos(&self, infos: &[StockInfo]) -> AnalyResult<usize> {
        let cleaned: Vec<StockInfo> = infos
            .iter()
            .filter_map(|s| {
                let code = normalize_code(&s.code);
                (!code.is_empty()).then(|| StockInfo {
                    code,
                    name: s.name.trim().to_string(),
                    hy_name: s.hy_name.trim().to_string(),
                })
            })
            .collect();
        self.db.upsert_stock_infos(&cleaned)?;
        Ok(cleaned.len())
    }

    /// 追加日线，已有的 (代码, 日期) 不覆盖；返回实际新增条数
    pub fn append_daily_bars(&self, bars: &[DailyBar]) -> AnalyResult<usize> {
        let cleaned: Vec<DailyBar> = bars
            .iter()
            .filter_map(|b| {
                let code = normalize_code(&b.code);
                let date = b.date.trim();
                if code.is_empty() || chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
                    log::debug!("跳过无效日线: {} {}", b.code, b.date);
                    return None;
                }
                Some(DailyBar {
                    code,
                    date: date.to_string(),
                    ..b.clone()
                })
            })
            .collect();
        Ok(self.db.save_daily_bars(&cleaned)?)
    }

    /// 板块日线收盘价（报告中概念 5/10 日涨幅用）
    pub fn append_concept_daily(&self, hy_code: &str, rows: &[(String, f64)]) -> AnalyResult<()> {
        let hy_code = hy_code.trim();
        if hy_code.is_empty() {
            return Err(AnalyError::InvalidInput("板块代码不能为空".to_string()));
        }
        Ok(self.db.save_concept_daily(hy_code, rows)?)
    }
}
