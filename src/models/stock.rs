use serde::{Deserialize, Serialize};

/// 股票基础信息（shares_info），hy_name 为旧版逗号分隔的概念字段
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockInfo {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub hy_name: String,
}

/// 日K记录，每只股票每个交易日一条，写入后不再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyBar {
    pub code: String,
    pub date: String,          // "YYYY-MM-DD"
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    pub change_pct: f64,       // 涨跌幅 %
}

/// 目标交易日的日线 + 基础信息（报告用）
#[derive(Debug, Clone)]
pub struct DayRow {
    pub code: String,
    pub name: String,
    pub hy_name: String,
    pub change_pct: f64,
    pub close: f64,
}

/// 外部日K序列中的一条（升序）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KlinePoint {
    pub date: String,
    pub open: f64,
    pub close: f64,
}

/// 实时报价
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockQuote {
    pub code: String,
    pub name: String,
    pub price: f64,
    pub pre_close: f64,
    pub change_pct: f64,
}

impl StockQuote {
    pub fn change_percent(&self) -> f64 {
        if self.change_pct != 0.0 || self.pre_close == 0.0 {
            return self.change_pct;
        }
        (self.price - self.pre_close) / self.pre_close * 100.0
    }
}

/// 分时采样点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinuteSample {
    pub time: String,          // "09:31"
    pub price: f64,
    pub volume: f64,
}

/// 当日分时序列
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntradaySeries {
    pub code: String,
    pub pre_close: f64,
    pub samples: Vec<MinuteSample>,
}

/// 由升序收盘价序列计算 日期 -> 涨跌幅%，首日无前收盘不计
pub fn pct_by_date(points: &[KlinePoint]) -> Vec<(String, f64)> {
    let mut out = Vec::with_capacity(points.len());
    for i in 1..points.len() {
        let prev_close = points[i - 1].close;
        if prev_close > 0.0 {
            out.push((
                points[i].date.clone(),
                (points[i].close - prev_close) / prev_close * 100.0,
            ));
        }
    }
    out
}
