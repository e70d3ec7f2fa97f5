use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};

use crate::db::database::Database;
use crate::error::{AnalyError, AnalyResult};
use crate::models::report::{ConceptSummary, LimitupReport, ReportItem, ReportRun, StockLimitupMetrics};
use crate::models::settings::AnalySettings;
use crate::models::stock::DailyBar;
use crate::services::concept_alias::canonical_concept;
use crate::services::concept_membership::resolve_concepts;
use crate::services::limit_threshold::{is_limit_up, limit_ratio};
use crate::utils::code::{normalize_codes, round2};

const DEFAULT_POOL_LABEL: &str = "manual";

/// 股票池涨停概念报告：找出目标日与股票池同概念的涨停股，计算连板/动量指标并留档
pub struct LimitupReportService {
    db: Arc<Database>,
    settings: AnalySettings,
}

/// 收盘价 n 日涨幅 %，closes 按日期倒序，closes[0] 为目标日
pub fn pct_change_over(closes_desc: &[f64], n: usize) -> f64 {
    if n == 0 || closes_desc.len() < n {
        return 0.0;
    }
    let (last, base) = (closes_desc[0], closes_desc[n - 1]);
    if last <= 0.0 || base <= 0.0 {
        return 0.0;
    }
    round2((last / base - 1.0) * 100.0)
}

/// 由倒序日线计算连板数、近5/3日涨停次数与5/10日涨幅。
/// 目标日不在日线中时指标保持为 0。
pub fn fill_history_metrics(m: &mut StockLimitupMetrics, rows_desc: &[DailyBar], trade_day: &str, epsilon: f64) {
    let Some(idx) = rows_desc.iter().position(|r| r.date == trade_day) else {
        return;
    };
    let ratio = limit_ratio(&m.code, &m.hy_name);
    let up = |r: &DailyBar| is_limit_up(r.change_pct, ratio, epsilon);

    m.consecutive = rows_desc[idx..].iter().take_while(|r| up(*r)).count() as u32;
    for (i, r) in rows_desc.iter().take(5).enumerate() {
        if up(r) {
            m.limitups_5d += 1;
            if i < 3 {
                m.limitups_3d += 1;
            }
        }
    }
    let closes: Vec<f64> = rows_desc.iter().map(|r| r.close).collect();
    m.pct_change_5d = pct_change_over(&closes, 5);
    m.pct_change_10d = pct_change_over(&closes, 10);
}

impl ConceptSummary {
    /// 汇总成分股指标；板块自身没有涨幅数据时取成分股非零涨幅的均值
    pub fn aggregate_from_stocks(&mut self) {
        let (mut total5, mut count5, mut total10, mut count10) = (0.0, 0, 0.0, 0);
        for s in &self.stocks {
            self.max_consecutive = self.max_consecutive.max(s.consecutive);
            self.max_five_day = self.max_five_day.max(s.limitups_5d);
            self.max_three_day = self.max_three_day.max(s.limitups_3d);
            if !float_eq(s.pct_change_5d, 0.0) {
                total5 += s.pct_change_5d;
                count5 += 1;
            }
            if !float_eq(s.pct_change_10d, 0.0) {
                total10 += s.pct_change_10d;
                count10 += 1;
            }
        }
        if float_eq(self.pct_change_5d, 0.0) && count5 > 0 {
            self.pct_change_5d = round2(total5 / count5 as f64);
        }
        if float_eq(self.pct_change_10d, 0.0) && count10 > 0 {
            self.pct_change_10d = round2(total10 / count10 as f64);
        }
    }
}

fn float_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

/// 概念排序：最高连板、5日涨停、3日涨停、5日涨幅、10日涨幅（均降序），最后按名称
pub fn sort_concepts(concepts: &mut [ConceptSummary]) {
    concepts.sort_by(|a, b| {
        b.max_consecutive
            .cmp(&a.max_consecutive)
            .then_with(|| b.max_five_day.cmp(&a.max_five_day))
            .then_with(|| b.max_three_day.cmp(&a.max_three_day))
            .then_with(|| cmp_desc(a.pct_change_5d, b.pct_change_5d))
            .then_with(|| cmp_desc(a.pct_change_10d, b.pct_change_10d))
            .then_with(|| a.name.cmp(&b.name))
    });
}

fn cmp_desc(a: f64, b: f64) -> std::cmp::Ordering {
    if float_eq(a, b) {
        std::cmp::Ordering::Equal
    } else {
        b.total_cmp(&a)
    }
}

impl LimitupReportService {
    pub fn new(db: Arc<Database>, settings: AnalySettings) -> Self {
        Self { db, settings }
    }

    /// 目标交易日：不晚于 date 的最近一个有日线的交易日；date 为空取最新
    pub fn resolve_trade_day(&self, date: Option<&str>) -> AnalyResult<String> {
        match date.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => {
                let parsed = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| AnalyError::InvalidDate(raw.to_string()))?;
                self.db
                    .latest_trade_day(Some(&parsed.format("%Y-%m-%d").to_string()))?
                    .ok_or_else(|| AnalyError::NoData(format!("{} 及之前没有日线数据", raw)))
            }
            None => self
                .db
                .latest_trade_day(None)?
                .ok_or_else(|| AnalyError::NoData("日线数据为空".to_string())),
        }
    }

    pub fn run(&self, pool_codes: &[String], date: Option<&str>, pool_label: &str) -> AnalyResult<LimitupReport> {
        let codes = normalize_codes(pool_codes);
        if codes.is_empty() {
            return Err(AnalyError::InvalidInput("股票池中没有有效代码".to_string()));
        }
        let trade_day = self.resolve_trade_day(date)?;

        // 股票池概念集合（规范名），保持首次出现顺序
        let pool_concepts = resolve_concepts(&self.db, &codes)?;
        let mut names: Vec<String> = Vec::new();
        for code in &codes {
            for raw in pool_concepts.get(code).into_iter().flatten() {
                let canonical = canonical_concept(&self.db, raw)?;
                if !canonical.is_empty() && !names.contains(&canonical) {
                    names.push(canonical);
                }
            }
        }
        if names.is_empty() {
            return Err(AnalyError::NoData("股票池没有解析到任何概念".to_string()));
        }
        let hy_codes = self.db.hy_codes_by_names(&names)?;

        // 目标日涨停股
        let rows = self.db.day_rows(&trade_day)?;
        if rows.is_empty() {
            return Err(AnalyError::NoData(format!("{} 没有日线数据", trade_day)));
        }
        let eps = self.settings.limit_epsilon;
        let mut metrics: HashMap<String, StockLimitupMetrics> = HashMap::new();
        let mut limitup_codes = Vec::new();
        for row in rows {
            if !is_limit_up(row.change_pct, limit_ratio(&row.code, &row.hy_name), eps) {
                continue;
            }
            limitup_codes.push(row.code.clone());
            metrics.insert(
                row.code.clone(),
                StockLimitupMetrics {
                    code: row.code,
                    name: row.name,
                    hy_name: row.hy_name,
                    percent: round2(row.change_pct),
                    close: row.close,
                    ..Default::default()
                },
            );
        }
        if metrics.is_empty() {
            return Err(AnalyError::NoData(format!("{} 没有涨停股", trade_day)));
        }

        // 历史指标
        let since = NaiveDate::parse_from_str(&trade_day, "%Y-%m-%d")
            .map(|d| (d - Duration::days(self.settings.report_lookback_days)).format("%Y-%m-%d").to_string())
            .map_err(|_| AnalyError::InvalidDate(trade_day.clone()))?;
        let history = self.db.daily_bars_between(&limitup_codes, &since, &trade_day)?;
        for (code, m) in metrics.iter_mut() {
            if let Some(bars) = history.get(code) {
                fill_history_metrics(m, bars, &trade_day, eps);
            }
        }

        // 涨停股挂到股票池概念下
        let limitup_concepts = resolve_concepts(&self.db, &limitup_codes)?;
        let mut buckets: HashMap<String, Vec<StockLimitupMetrics>> = HashMap::new();
        let mut matched_codes = 0usize;
        for code in &limitup_codes {
            let Some(m) = metrics.get(code) else { continue };
            let mut matched = false;
            for raw in limitup_concepts.get(code).into_iter().flatten() {
                let canonical = canonical_concept(&self.db, raw)?;
                if names.contains(&canonical) {
                    let bucket = buckets.entry(canonical).or_default();
                    if !bucket.iter().any(|s| s.code == m.code) {
                        bucket.push(m.clone());
                        matched = true;
                    }
                }
            }
            if matched {
                matched_codes += 1;
            }
        }
        if buckets.is_empty() {
            return Err(AnalyError::NoData("涨停股与股票池概念没有交集".to_string()));
        }

        // 板块层 5/10 日涨幅
        let hy_list: Vec<String> = buckets
            .keys()
            .filter_map(|n| hy_codes.get(n))
            .filter(|h| !h.is_empty())
            .cloned()
            .collect();
        let concept_daily = self.db.concept_daily_between(&hy_list, &since, &trade_day)?;

        let mut concepts: Vec<ConceptSummary> = buckets
            .into_iter()
            .map(|(name, mut stocks)| {
                stocks.sort_by(|a, b| {
                    b.consecutive
                        .cmp(&a.consecutive)
                        .then_with(|| b.percent.total_cmp(&a.percent))
                        .then_with(|| a.code.cmp(&b.code))
                });
                let hy_code = hy_codes.get(&name).cloned().unwrap_or_default();
                let mut summary = ConceptSummary {
                    name,
                    hy_code,
                    stocks,
                    ..Default::default()
                };
                if let Some(series) = concept_daily.get(&summary.hy_code) {
                    if series.first().is_some_and(|(d, _)| *d == trade_day) {
                        let closes: Vec<f64> = series.iter().map(|(_, c)| *c).collect();
                        summary.pct_change_5d = pct_change_over(&closes, 5);
                        summary.pct_change_10d = pct_change_over(&closes, 10);
                    }
                }
                summary.aggregate_from_stocks();
                summary
            })
            .collect();
        sort_concepts(&mut concepts);

        let label = match pool_label.trim() {
            "" => DEFAULT_POOL_LABEL,
            l => l,
        };
        // 留档的股票数为目标日全部涨停股
        let run_id = self.persist(&trade_day, label, &concepts, metrics.len())?;
        log::info!(
            "涨停概念报告 {} ({}): 概念 {} 个, 涨停股 {} 只, 命中概念 {} 只, run_id={}",
            trade_day,
            label,
            concepts.len(),
            metrics.len(),
            matched_codes,
            run_id
        );

        Ok(LimitupReport {
            run_id,
            trade_day,
            concepts,
        })
    }

    /// 报告留档：run 与 items 同一事务写入
    fn persist(&self, trade_day: &str, label: &str, concepts: &[ConceptSummary], stock_count: usize) -> AnalyResult<i64> {
        let run_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let run = ReportRun {
            id: 0,
            run_at: run_at.clone(),
            trade_day: trade_day.to_string(),
            pool_label: label.to_string(),
            concept_count: concepts.len(),
            stock_count,
        };
        let items: Vec<ReportItem> = concepts
            .iter()
            .flat_map(|c| {
                let run_at = run_at.clone();
                c.stocks.iter().map(move |s| ReportItem {
                    id: 0,
                    run_id: 0,
                    concept_name: c.name.clone(),
                    hy_code: c.hy_code.clone(),
                    stock_code: s.code.clone(),
                    stock_name: s.name.clone(),
                    consecutive: s.consecutive,
                    limitups_3d: s.limitups_3d,
                    limitups_5d: s.limitups_5d,
                    pct_change_5d: s.pct_change_5d,
                    pct_change_10d: s.pct_change_10d,
                    concept_pct_5d: c.pct_change_5d,
                    concept_pct_10d: c.pct_change_10d,
                    created_at: run_at.clone(),
                })
            })
            .collect();
        Ok(self.db.persist_report(&run, &items)?)
    }
}
