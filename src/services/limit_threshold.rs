use crate::models::analy::{DetectMode, ThresholdOverride};
use crate::models::settings::AnalySettings;

/// 涨停幅度估算（启发式，非交易所精确口径）：
/// 概念文本或代码含 ST -> 5%；创业板 sz300 / 科创板 sh688 -> 20%；其余 10%。
/// 未在文本中标注 ST 的股票会被按 10% 处理。
pub fn limit_ratio(code: &str, concept_text: &str) -> f64 {
    let code = code.trim().to_lowercase();
    if concept_text.to_uppercase().contains("ST") || code.contains("st") {
        return 0.05;
    }
    if code.starts_with("sz300") || code.starts_with("sh688") {
        return 0.20;
    }
    0.10
}

pub fn is_limit_up(pct: f64, ratio: f64, epsilon: f64) -> bool {
    pct >= ratio * 100.0 - epsilon
}

/// 估算涨停价，首封判断用
pub fn limit_price(pre_close: f64, ratio: f64) -> f64 {
    pre_close * (1.0 + ratio)
}

/// 统计口径判定
#[derive(Debug, Clone, Copy)]
pub struct Predicate {
    pub mode: DetectMode,
    /// 相对涨停幅度的比例，> 0 时优先
    pub min_rate: f64,
    /// 绝对最小涨幅 %
    pub min_pct: f64,
    pub epsilon: f64,
}

impl Predicate {
    pub fn new(mode: DetectMode, threshold: Option<ThresholdOverride>, settings: &AnalySettings) -> Self {
        let t = threshold.unwrap_or_default();
        let min_pct = if t.min_pct > 0.0 { t.min_pct } else { settings.bigrise_min_pct };
        let min_rate = if t.min_rate > 0.0 { t.min_rate.min(1.0) } else { 0.0 };
        Self {
            mode,
            min_rate,
            min_pct,
            epsilon: settings.limit_epsilon,
        }
    }

    pub fn qualifies(&self, pct: f64, code: &str, concept_text: &str) -> bool {
        match self.mode {
            DetectMode::LimitUp => is_limit_up(pct, limit_ratio(code, concept_text), self.epsilon),
            DetectMode::BigRise => {
                if self.min_rate > 0.0 {
                    pct >= limit_ratio(code, concept_text) * 100.0 * self.min_rate - self.epsilon
                } else {
                    pct >= self.min_pct - self.epsilon
                }
            }
        }
    }
}
