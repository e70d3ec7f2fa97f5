use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::stock::{IntradaySeries, MinuteSample, StockQuote};
use crate::services::feed::QuoteFeed;
use crate::utils::encoding::gb18030_to_utf8;
use crate::utils::http::build_stock_client;

const TX_QUOTE_URL: &str = "http://qt.gtimg.cn/";
const TX_MINUTE_URL: &str = "https://web.ifzq.gtimg.cn/appstock/app/minute/query";
/// 单次请求的代码数上限
const QUOTE_BATCH: usize = 60;

/// 腾讯实时行情 + 分时
pub struct StockDataService {
    client: reqwest::Client,
}

impl StockDataService {
    pub fn new() -> Result<Self> {
        let client = build_stock_client()?;
        Ok(Self { client })
    }

    pub async fn get_realtime_data_tencent(&self, codes: &[String]) -> Result<Vec<StockQuote>> {
        if codes.is_empty() {
            return Ok(vec![]);
        }
        let mut results = Vec::with_capacity(codes.len());
        for chunk in codes.chunks(QUOTE_BATCH) {
            let ts = chrono::Utc::now().timestamp();
            let url = format!("{}?_={}&q={}", TX_QUOTE_URL, ts, chunk.join(","));

            let resp = self.client.get(&url).send().await?;
            let bytes = resp.bytes().await?;
            let text = gb18030_to_utf8(&bytes);

            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Some(q) = parse_tencent_quote_line(line) {
                    results.push(q);
                }
            }
        }
        Ok(results)
    }

    pub async fn get_minute_data(&self, code: &str) -> Result<IntradaySeries> {
        let code = code.trim().to_lowercase();
        let url = format!("{}?code={}", TX_MINUTE_URL, code);
        let resp = self.client.get(&url).send().await?;
        let text = resp.text().await?;
        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| anyhow!("腾讯分时数据JSON解析失败: {}", e))?;
        parse_minute_json(&json, &code)
    }
}

#[async_trait]
impl QuoteFeed for StockDataService {
    async fn quotes(&self, codes: &[String]) -> Result<Vec<StockQuote>> {
        self.get_realtime_data_tencent(codes).await
    }

    async fn intraday(&self, code: &str) -> Result<IntradaySeries> {
        self.get_minute_data(code).await
    }
}

fn parse_float(s: &str) -> f64 {
    s.trim().parse::<f64>().unwrap_or(0.0)
}

fn parse_tencent_quote_line(line: &str) -> Option<StockQuote> {
    // Format: v_sz002241="51~歌尔股份~002241~22.26~22.27~0.00~...";
    let eq_pos = line.find('=')?;
    let prefix = &line[..eq_pos];

    let code = prefix.strip_prefix("v_")?.trim().to_lowercase();
    if !code.starts_with("sh") && !code.starts_with("sz") && !code.starts_with("bj") {
        return None;
    }

    let data_str = line[eq_pos + 1..].trim().trim_end_matches(';').trim_matches('"');
    if data_str.is_empty() {
        return None;
    }

    let parts: Vec<&str> = data_str.split('~').collect();
    if parts.len() < 33 {
        return None;
    }

    Some(StockQuote {
        code,
        name: parts[1].trim().to_string(),
        price: parse_float(parts[3]),
        pre_close: parse_float(parts[4]),
        change_pct: parse_float(parts[32]),
    })
}

/// 分时 JSON：data.{code}.data.data 为 "HHMM 价格 累计量 ..." 字符串数组，
/// data.{code}.qt.{code}[4] 为昨收
fn parse_minute_json(json: &serde_json::Value, code: &str) -> Result<IntradaySeries> {
    let node = json
        .get("data")
        .and_then(|d| d.get(code))
        .ok_or_else(|| anyhow!("腾讯分时数据中未找到 {} 的数据", code))?;

    let pre_close = node
        .get("qt")
        .and_then(|q| q.get(code))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.get(4))
        .and_then(|v| v.as_str())
        .map(parse_float)
        .unwrap_or(0.0);

    let lines = node
        .get("data")
        .and_then(|d| d.get("data"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("腾讯分时数据中未找到分钟序列"))?;

    let mut samples = Vec::with_capacity(lines.len());
    for line in lines {
        let Some(s) = line.as_str() else { continue };
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() < 3 || fields[0].len() != 4 {
            continue;
        }
        samples.push(MinuteSample {
            time: format!("{}:{}", &fields[0][..2], &fields[0][2..]),
            price: parse_float(fields[1]),
            volume: parse_float(fields[2]),
        });
    }

    Ok(IntradaySeries {
        code: code.to_string(),
        pre_close,
        samples,
    })
}
