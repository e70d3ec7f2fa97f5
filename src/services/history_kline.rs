use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::stock::KlinePoint;
use crate::services::feed::DailySeriesFeed;
use crate::utils::http::build_stock_client;

const QQ_KLINE_URL: &str = "https://web.ifzq.gtimg.cn/appstock/app/fqkline/get";
/// 回退拉取的自然日跨度与条数上限（单次最多约640条）
const FALLBACK_SPAN_DAYS: i64 = 400;
const FALLBACK_COUNT: u32 = 320;

pub struct HistoryKlineService {
    client: reqwest::Client,
}

impl HistoryKlineService {
    pub fn new() -> Result<Self> {
        let client = build_stock_client()?;
        Ok(Self { client })
    }

    /// 从腾讯接口拉取前复权日K线数据
    /// code: sh600519 / sz000001 格式
    /// period: day / week / month
    /// start / end: 2024-01-01
    pub async fn fetch_kline(
        &self,
        code: &str,
        period: &str,
        start: &str,
        end: &str,
        count: u32,
    ) -> Result<Vec<KlinePoint>> {
        let param = format!("{},{},{},{},{},qfq", code, period, start, end, count);
        let url = format!("{}?param={}", QQ_KLINE_URL, param);

        let resp = self.client.get(&url).send().await?;
        let text = resp.text().await?;

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| anyhow!("腾讯K线数据JSON解析失败: {}", e))?;
        parse_fqkline(&json, code, period)
    }
}

#[async_trait]
impl DailySeriesFeed for HistoryKlineService {
    async fn daily_series(&self, code: &str) -> Result<Vec<KlinePoint>> {
        let today = chrono::Local::now().date_naive();
        let start = today - chrono::Duration::days(FALLBACK_SPAN_DAYS);
        self.fetch_kline(
            code,
            "day",
            &start.format("%Y-%m-%d").to_string(),
            &today.format("%Y-%m-%d").to_string(),
            FALLBACK_COUNT,
        )
        .await
    }
}

fn parse_fqkline(json: &serde_json::Value, code: &str, period: &str) -> Result<Vec<KlinePoint>> {
    let code_key = code.to_lowercase();
    let data = json
        .get("data")
        .and_then(|d| d.get(&code_key))
        .ok_or_else(|| anyhow!("腾讯K线数据中未找到 {} 的数据", code))?;

    // 前复权数据在 qfqday/qfqweek/qfqmonth 字段，指数数据在 day/week/month 字段
    let period_key = format!("qfq{}", period);
    let klines = data
        .get(&period_key)
        .or_else(|| data.get(period))
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("腾讯K线数据中未找到 {} 字段", period_key))?;

    let mut items = Vec::with_capacity(klines.len());
    for kline in klines {
        if let Some(arr) = kline.as_array() {
            if arr.len() >= 3 {
                let date = arr[0].as_str().unwrap_or("").trim().to_string();
                if date.is_empty() {
                    continue;
                }
                items.push(KlinePoint {
                    date,
                    open: parse_kline_f64(&arr[1]),
                    close: parse_kline_f64(&arr[2]),
                });
            }
        }
    }
    items.sort_by(|a, b| a.date.cmp(&b.date));
    Ok(items)
}

fn parse_kline_f64(val: &serde_json::Value) -> f64 {
    match val {
        serde_json::Value::String(s) => s.parse::<f64>().unwrap_or(0.0),
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}
