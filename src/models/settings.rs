use serde::{Deserialize, Serialize};

/// 分析引擎配置，构造时显式传入，不读全局状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalySettings {
    /// 并发抓取上限
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// 涨停判定容差（百分点），吸收行情四舍五入误差
    #[serde(default = "default_epsilon")]
    pub limit_epsilon: f64,
    #[serde(default = "default_calendar_days")]
    pub calendar_days: usize,
    #[serde(default = "default_calendar_per_concept")]
    pub calendar_per_concept: usize,
    #[serde(default = "default_day_per_concept")]
    pub day_per_concept: usize,
    /// 概念展开时实际查询上限 = per_concept * expand_multiplier，留给下游过滤
    #[serde(default = "default_expand_multiplier")]
    pub expand_multiplier: usize,
    /// 大涨口径默认最小涨幅 %
    #[serde(default = "default_bigrise_min_pct")]
    pub bigrise_min_pct: f64,
    /// 报告回看的自然日数
    #[serde(default = "default_report_lookback_days")]
    pub report_lookback_days: i64,
}

fn default_concurrency() -> usize { 6 }
fn default_epsilon() -> f64 { 0.2 }
fn default_calendar_days() -> usize { 90 }
fn default_calendar_per_concept() -> usize { 60 }
fn default_day_per_concept() -> usize { 80 }
fn default_expand_multiplier() -> usize { 5 }
fn default_bigrise_min_pct() -> f64 { 7.0 }
fn default_report_lookback_days() -> i64 { 30 }

impl Default for AnalySettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            limit_epsilon: default_epsilon(),
            calendar_days: default_calendar_days(),
            calendar_per_concept: default_calendar_per_concept(),
            day_per_concept: default_day_per_concept(),
            expand_multiplier: default_expand_multiplier(),
            bigrise_min_pct: default_bigrise_min_pct(),
            report_lookback_days: default_report_lookback_days(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let s: AnalySettings = serde_json::from_str(r#"{"concurrency":3}"#).unwrap();
        assert_eq!(s.concurrency, 3);
        assert_eq!(s.calendar_days, 90);
        assert_eq!(s.expand_multiplier, 5);
        assert!((s.limit_epsilon - 0.2).abs() < 1e-12);
    }
}
