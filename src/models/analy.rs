use serde::{Deserialize, Serialize};

/// 统计口径
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetectMode {
    /// 涨停
    #[default]
    LimitUp,
    /// 大涨（按最小涨幅或相对涨停幅度判断）
    BigRise,
}

/// 大涨阈值覆盖：min_rate > 0 时优先（相对各自涨停幅度的比例），否则用 min_pct（单位 %）
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ThresholdOverride {
    #[serde(default)]
    pub min_pct: f64,
    #[serde(default)]
    pub min_rate: f64,
}

/// 同概念涨停日历请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarRequest {
    pub code: String,
    #[serde(default)]
    pub days: Option<usize>,
    #[serde(default)]
    pub per_concept: Option<usize>,
    /// 选中的概念；Some 时取与主股票概念的交集
    #[serde(default)]
    pub concepts: Option<Vec<String>>,
    #[serde(default)]
    pub mode: DetectMode,
    #[serde(default)]
    pub threshold: Option<ThresholdOverride>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarItem {
    pub date: String,
    pub count: usize,
    /// 主股票当日是否也达到口径
    pub base_qualified: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarResult {
    pub code: String,
    pub concepts: Vec<String>,
    pub candidates: usize,
    pub items: Vec<CalendarItem>,
}

/// 指定日期同概念涨停明细请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayRequest {
    pub code: String,
    /// YYYY-MM-DD，缺省为今天
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub per_concept: Option<usize>,
    #[serde(default)]
    pub concepts: Option<Vec<String>>,
    #[serde(default)]
    pub mode: DetectMode,
    #[serde(default)]
    pub threshold: Option<ThresholdOverride>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayItem {
    pub code: String,
    pub name: String,
    pub percent: f64,
    /// 首封时间，仅当天可用
    pub first_seal: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayResult {
    pub code: String,
    pub date: String,
    pub concepts: Vec<String>,
    pub items: Vec<DayItem>,
}

/// 概念重叠对比的一行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapRow {
    pub code: String,
    pub name: String,
    pub overlap: usize,
    pub weighted: usize,
    pub concepts: Vec<ConceptCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlapResult {
    pub rows: Vec<OverlapRow>,
    pub concepts_a: Vec<ConceptCount>,
}
