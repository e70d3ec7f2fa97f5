use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::db::database::Database;
use crate::error::{AnalyError, AnalyResult};
use crate::models::analy::{
    CalendarItem, CalendarRequest, CalendarResult, DayItem, DayRequest, DayResult, DetectMode,
};
use crate::models::settings::AnalySettings;
use crate::models::stock::{pct_by_date, IntradaySeries, StockInfo};
use crate::services::concept_alias::filter_by_selection;
use crate::services::concept_expansion::codes_by_concept;
use crate::services::concept_membership::concepts_for_code;
use crate::services::fan_out::fan_out;
use crate::services::feed::{DailySeriesFeed, QuoteFeed};
use crate::services::limit_threshold::{limit_price, limit_ratio, Predicate};
use crate::utils::code::{normalize_code, round2, split_flexible};

/// 同概念联动分析：涨停日历 + 单日明细
pub struct ComovementEngine {
    db: Arc<Database>,
    quote_feed: Arc<dyn QuoteFeed>,
    daily_feed: Arc<dyn DailySeriesFeed>,
    settings: AnalySettings,
}

/// 主股票概念解析与候选展开的结果
struct Candidates {
    code: String,
    concepts: Vec<String>,
    codes: Vec<String>,
}

/// 单只候选股在窗口内达到口径的日期
#[derive(Debug, Clone)]
pub struct CandidateHits {
    pub code: String,
    pub dates: Vec<String>,
}

/// 日历计数的汇总方，只接受窗口内的日期，每只候选股每天最多计一次
#[derive(Debug, Clone)]
pub struct CalendarTally {
    dates: Vec<String>,
    counts: HashMap<String, usize>,
}

impl CalendarTally {
    pub fn new(window: &[String]) -> Self {
        Self {
            dates: window.to_vec(),
            counts: window.iter().map(|d| (d.clone(), 0)).collect(),
        }
    }

    pub fn record(&mut self, hits: &CandidateHits) {
        let mut seen = HashSet::new();
        for d in &hits.dates {
            if !seen.insert(d.as_str()) {
                continue;
            }
            if let Some(c) = self.counts.get_mut(d) {
                *c += 1;
            }
        }
    }

    /// 按窗口日期升序输出
    pub fn finish<F>(self, base_qualified: F) -> Vec<CalendarItem>
    where
        F: Fn(&str) -> bool,
    {
        let counts = self.counts;
        self.dates
            .into_iter()
            .map(|date| CalendarItem {
                count: counts.get(&date).copied().unwrap_or(0),
                base_qualified: base_qualified(&date),
                date,
            })
            .collect()
    }
}

/// 单日明细排序：有首封时间的在前并按时间升序，其余按涨幅降序，最后按代码
pub fn sort_day_items(items: &mut [DayItem]) {
    items.sort_by(|a, b| {
        let seal = match (&a.first_seal, &b.first_seal) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        seal.then_with(|| b.percent.total_cmp(&a.percent))
            .then_with(|| a.code.cmp(&b.code))
    });
}

/// 分时序列中第一次触及估算涨停价的时间
pub fn first_seal_time(series: &IntradaySeries, ratio: f64) -> Option<String> {
    if series.pre_close <= 0.0 {
        return None;
    }
    let limit = limit_price(series.pre_close, ratio);
    series
        .samples
        .iter()
        .find(|s| s.price >= limit - 1e-6)
        .map(|s| s.time.clone())
}

impl ComovementEngine {
    pub fn new(
        db: Arc<Database>,
        quote_feed: Arc<dyn QuoteFeed>,
        daily_feed: Arc<dyn DailySeriesFeed>,
        settings: AnalySettings,
    ) -> Self {
        Self {
            db,
            quote_feed,
            daily_feed,
            settings,
        }
    }

    /// 解析主股票概念、按选择过滤、展开候选（排序、排除主股票）
    fn collect_candidates(
        &self,
        raw_code: &str,
        selection: Option<&[String]>,
        per_concept: usize,
    ) -> AnalyResult<Candidates> {
        let code = normalize_code(raw_code);
        if code.is_empty() {
            return Err(AnalyError::InvalidInput("股票代码不能为空".to_string()));
        }

        let mut concepts = concepts_for_code(&self.db, &code)?;
        if let Some(selection) = selection {
            let wanted: Vec<String> = selection.iter().flat_map(|s| split_flexible(s)).collect();
            if wanted.is_empty() {
                return Err(AnalyError::InvalidInput("概念筛选中没有有效的概念名".to_string()));
            }
            concepts = filter_by_selection(&self.db, &concepts, &wanted)?;
        }

        let mut set = BTreeSet::new();
        for name in &concepts {
            for co in codes_by_concept(&self.db, name, per_concept, self.settings.expand_multiplier)? {
                if !co.eq_ignore_ascii_case(&code) {
                    set.insert(co);
                }
            }
        }
        log::debug!("{} 概念 {:?} 展开候选 {} 只", code, concepts, set.len());

        Ok(Candidates {
            code,
            concepts,
            codes: set.into_iter().collect(),
        })
    }

    fn concept_texts(&self, codes: &[String]) -> AnalyResult<HashMap<String, StockInfo>> {
        Ok(self.db.stock_infos_by_codes(codes)?)
    }

    /// 主股票最近 N 个交易日（升序）及 日期 -> 涨跌幅。本地日线优先，否则回退外部日K。
    async fn base_history(&self, code: &str, days: usize) -> AnalyResult<(Vec<String>, HashMap<String, f64>)> {
        let window = self.db.recent_trading_days(code, days)?;
        if !window.is_empty() {
            let pct = self
                .db
                .get_daily_history(code, days + 2)?
                .into_iter()
                .map(|b| (b.date.trim().to_string(), b.change_pct))
                .collect();
            return Ok((window, pct));
        }

        match self.daily_feed.daily_series(code).await {
            Ok(points) => {
                let start = points.len().saturating_sub(days);
                let window = points[start..].iter().map(|p| p.date.clone()).collect();
                Ok((window, pct_by_date(&points).into_iter().collect()))
            }
            Err(e) => {
                log::warn!("获取 {} 日K失败: {}", code, e);
                Ok((vec![], HashMap::new()))
            }
        }
    }

    /// 最近 N 个交易日内，同概念成分股每天达到口径的数量
    pub async fn calendar(&self, req: CalendarRequest) -> AnalyResult<CalendarResult> {
        let days = req.days.filter(|d| *d > 0).unwrap_or(self.settings.calendar_days);
        let per_concept = req
            .per_concept
            .filter(|n| *n > 0)
            .unwrap_or(self.settings.calendar_per_concept);
        let predicate = Predicate::new(req.mode, req.threshold, &self.settings);

        let cands = self.collect_candidates(&req.code, req.concepts.as_deref(), per_concept)?;
        if cands.concepts.is_empty() || cands.codes.is_empty() {
            return Ok(CalendarResult {
                code: cands.code,
                concepts: cands.concepts,
                candidates: 0,
                items: vec![],
            });
        }

        let (window, base_pct) = self.base_history(&cands.code, days).await?;
        if window.is_empty() {
            return Ok(CalendarResult {
                code: cands.code,
                concepts: cands.concepts,
                candidates: cands.codes.len(),
                items: vec![],
            });
        }

        let mut lookup = cands.codes.clone();
        lookup.push(cands.code.clone());
        let infos = self.concept_texts(&lookup)?;
        let text_of = |code: &str| infos.get(code).map(|i| i.hy_name.clone()).unwrap_or_default();

        let window_arc = Arc::new(window.clone());
        let jobs: Vec<(String, String)> = cands.codes.iter().map(|c| (c.clone(), text_of(c.as_str()))).collect();
        let db = self.db.clone();
        let feed = self.daily_feed.clone();
        let limit = days + 2;

        let hits = fan_out(jobs, self.settings.concurrency, move |(co, text)| {
            let db = db.clone();
            let feed = feed.clone();
            let window = window_arc.clone();
            async move {
                let pct = candidate_pct_map(&db, feed.as_ref(), &co, limit).await?;
                let dates = window
                    .iter()
                    .filter(|d| pct.get(*d).is_some_and(|p| predicate.qualifies(*p, &co, &text)))
                    .cloned()
                    .collect();
                Some(CandidateHits { code: co, dates })
            }
        })
        .await;

        let mut tally = CalendarTally::new(&window);
        for h in &hits {
            tally.record(h);
        }
        let base_text = text_of(cands.code.as_str());
        let items = tally.finish(|d| {
            base_pct
                .get(d)
                .is_some_and(|p| predicate.qualifies(*p, &cands.code, &base_text))
        });

        log::info!(
            "同概念日历 {}: 概念 {} 个, 候选 {} 只, 有效 {} 只, {} 个交易日",
            cands.code,
            cands.concepts.len(),
            cands.codes.len(),
            hits.len(),
            items.len()
        );

        Ok(CalendarResult {
            code: cands.code,
            concepts: cands.concepts,
            candidates: cands.codes.len(),
            items,
        })
    }

    /// 指定日期同概念达到口径的股票；当天用实时行情并估算首封时间
    pub async fn day_view(&self, req: DayRequest) -> AnalyResult<DayResult> {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        let date = match req.date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| AnalyError::InvalidDate(raw.to_string()))?
                .format("%Y-%m-%d")
                .to_string(),
            None => today.clone(),
        };
        let per_concept = req
            .per_concept
            .filter(|n| *n > 0)
            .unwrap_or(self.settings.day_per_concept);
        let predicate = Predicate::new(req.mode, req.threshold, &self.settings);

        let cands = self.collect_candidates(&req.code, req.concepts.as_deref(), per_concept)?;
        if cands.codes.is_empty() {
            return Ok(DayResult {
                code: cands.code,
                date,
                concepts: cands.concepts,
                items: vec![],
            });
        }

        let infos = Arc::new(self.concept_texts(&cands.codes)?);
        let mut items = if date == today {
            self.today_items(&cands.codes, &infos, predicate).await
        } else {
            self.history_items(&cands.codes, &infos, &date, predicate).await
        };
        sort_day_items(&mut items);

        log::info!("同概念单日 {} {}: 候选 {} 只, 命中 {} 只", cands.code, date, cands.codes.len(), items.len());

        Ok(DayResult {
            code: cands.code,
            date,
            concepts: cands.concepts,
            items,
        })
    }

    async fn today_items(
        &self,
        codes: &[String],
        infos: &Arc<HashMap<String, StockInfo>>,
        predicate: Predicate,
    ) -> Vec<DayItem> {
        let quotes = match self.quote_feed.quotes(codes).await {
            Ok(q) => q,
            Err(e) => {
                log::warn!("获取实时行情失败: {}", e);
                return vec![];
            }
        };
        let wanted: HashSet<&str> = codes.iter().map(|c| c.as_str()).collect();

        let mut items = Vec::new();
        for q in quotes {
            let code = q.code.trim().to_lowercase();
            if !wanted.contains(code.as_str()) || items.iter().any(|i: &DayItem| i.code == code) {
                continue;
            }
            let info = infos.get(&code);
            let text = info.map(|i| i.hy_name.as_str()).unwrap_or("");
            let pct = q.change_percent();
            if !predicate.qualifies(pct, &code, text) {
                continue;
            }
            let name = info
                .map(|i| i.name.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| q.name.clone());
            items.push(DayItem {
                code,
                name,
                percent: round2(pct),
                first_seal: None,
            });
        }

        if predicate.mode != DetectMode::LimitUp || items.is_empty() {
            return items;
        }

        let jobs: Vec<(String, f64)> = items
            .iter()
            .map(|i| {
                let text = infos.get(&i.code).map(|s| s.hy_name.as_str()).unwrap_or("");
                (i.code.clone(), limit_ratio(&i.code, text))
            })
            .collect();
        let feed = self.quote_feed.clone();
        let seals: HashMap<String, String> = fan_out(jobs, self.settings.concurrency, move |(co, ratio)| {
            let feed = feed.clone();
            async move {
                match feed.intraday(&co).await {
                    Ok(series) => first_seal_time(&series, ratio).map(|t| (co, t)),
                    Err(e) => {
                        log::warn!("获取 {} 分时失败: {}", co, e);
                        None
                    }
                }
            }
        })
        .await
        .into_iter()
        .collect();

        for item in &mut items {
            item.first_seal = seals.get(&item.code).cloned();
        }
        items
    }

    async fn history_items(
        &self,
        codes: &[String],
        infos: &Arc<HashMap<String, StockInfo>>,
        date: &str,
        predicate: Predicate,
    ) -> Vec<DayItem> {
        let db = self.db.clone();
        let feed = self.daily_feed.clone();
        let infos = infos.clone();
        let date = Arc::new(date.to_string());

        fan_out(codes.to_vec(), self.settings.concurrency, move |co| {
            let db = db.clone();
            let feed = feed.clone();
            let infos = infos.clone();
            let date = date.clone();
            async move {
                let pct = candidate_pct_on(&db, feed.as_ref(), &co, &date).await?;
                let info = infos.get(&co);
                let text = info.map(|i| i.hy_name.as_str()).unwrap_or("");
                if !predicate.qualifies(pct, &co, text) {
                    return None;
                }
                Some(DayItem {
                    name: info.map(|i| i.name.clone()).unwrap_or_default(),
                    code: co,
                    percent: round2(pct),
                    first_seal: None,
                })
            }
        })
        .await
    }
}

/// 候选股 日期 -> 涨跌幅：本地最近 limit 条日线，没有则回退外部日K
async fn candidate_pct_map(
    db: &Database,
    feed: &dyn DailySeriesFeed,
    code: &str,
    limit: usize,
) -> Option<HashMap<String, f64>> {
    match db.get_daily_history(code, limit) {
        Ok(rows) if !rows.is_empty() => {
            return Some(
                rows.into_iter()
                    .map(|b| (b.date.trim().to_string(), b.change_pct))
                    .filter(|(d, _)| !d.is_empty())
                    .collect(),
            );
        }
        Ok(_) => {}
        Err(e) => {
            log::warn!("读取 {} 本地日线失败: {}", code, e);
            return None;
        }
    }
    match feed.daily_series(code).await {
        Ok(points) if !points.is_empty() => Some(pct_by_date(&points).into_iter().collect()),
        Ok(_) => None,
        Err(e) => {
            log::warn!("获取 {} 日K失败: {}", code, e);
            None
        }
    }
}

/// 候选股某一天的涨跌幅：本地当日日线，没有则回退外部日K
async fn candidate_pct_on(db: &Database, feed: &dyn DailySeriesFeed, code: &str, date: &str) -> Option<f64> {
    match db.daily_bar_on(code, date) {
        Ok(Some(bar)) => return Some(bar.change_pct),
        Ok(None) => {}
        Err(e) => {
            log::warn!("读取 {} {} 本地日线失败: {}", code, date, e);
            return None;
        }
    }
    match feed.daily_series(code).await {
        Ok(points) => pct_by_date(&points)
            .into_iter()
            .find(|(d, _)| d == date)
            .map(|(_, p)| p),
        Err(e) => {
            log::warn!("获取 {} 日K失败: {}", code, e);
            None
        }
    }
}
