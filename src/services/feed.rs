use anyhow::Result;
use async_trait::async_trait;

use crate::models::stock::{IntradaySeries, KlinePoint, StockQuote};

/// 实时行情源（当天判断与首封估算）
#[async_trait]
pub trait QuoteFeed: Send + Sync {
    async fn quotes(&self, codes: &[String]) -> Result<Vec<StockQuote>>;

    async fn intraday(&self, code: &str) -> Result<IntradaySeries>;
}

/// 历史日K源，本地日线缺失时回退使用；返回按日期升序
#[async_trait]
pub trait DailySeriesFeed: Send + Sync {
    async fn daily_series(&self, code: &str) -> Result<Vec<KlinePoint>>;
}
