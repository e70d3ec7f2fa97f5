use serde::{Deserialize, Serialize};

/// 单只涨停股的报告指标
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockLimitupMetrics {
    pub code: String,
    pub name: String,
    pub hy_name: String,
    pub percent: f64,
    pub close: f64,
    pub consecutive: u32,
    pub limitups_5d: u32,
    pub limitups_3d: u32,
    pub pct_change_5d: f64,
    pub pct_change_10d: f64,
}

/// 概念层汇总
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptSummary {
    pub name: String,
    pub hy_code: String,
    pub stocks: Vec<StockLimitupMetrics>,
    pub max_consecutive: u32,
    pub max_five_day: u32,
    pub max_three_day: u32,
    pub pct_change_5d: f64,
    pub pct_change_10d: f64,
}

/// 一次报告执行的元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRun {
    #[serde(default)]
    pub id: i64,
    pub run_at: String,
    pub trade_day: String,
    pub pool_label: String,
    pub concept_count: usize,
    pub stock_count: usize,
}

/// 报告明细：一个 (概念, 股票) 组合
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportItem {
    #[serde(default)]
    pub id: i64,
    pub run_id: i64,
    pub concept_name: String,
    pub hy_code: String,
    pub stock_code: String,
    pub stock_name: String,
    pub consecutive: u32,
    pub limitups_3d: u32,
    pub limitups_5d: u32,
    pub pct_change_5d: f64,
    pub pct_change_10d: f64,
    pub concept_pct_5d: f64,
    pub concept_pct_10d: f64,
    pub created_at: String,
}

/// 报告执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitupReport {
    pub run_id: i64,
    pub trade_day: String,
    pub concepts: Vec<ConceptSummary>,
}
