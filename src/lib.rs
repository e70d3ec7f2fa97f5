pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use db::database::Database;
use models::settings::AnalySettings;
use services::comovement::ComovementEngine;
use services::concept_compare::ConceptCompare;
use services::concept_ingest::ConceptIngest;
use services::history_kline::HistoryKlineService;
use services::limitup_report::LimitupReportService;
use services::stock_data::StockDataService;

/// 打开数据目录下的库并加载配置，外部行情使用腾讯接口
pub struct AppState {
    pub db: Arc<Database>,
    pub settings: AnalySettings,
}

impl AppState {
    pub fn open(data_dir: PathBuf) -> Result<Self> {
        let db = Database::new(data_dir)?;
        let settings = db.load_settings().unwrap_or_else(|e| {
            log::warn!("加载配置失败，使用默认配置: {}", e);
            AnalySettings::default()
        });
        log::info!("数据库初始化完成, 并发上限 {}", settings.concurrency);
        Ok(Self {
            db: Arc::new(db),
            settings,
        })
    }

    pub fn comovement(&self) -> Result<ComovementEngine> {
        Ok(ComovementEngine::new(
            self.db.clone(),
            Arc::new(StockDataService::new()?),
            Arc::new(HistoryKlineService::new()?),
            self.settings.clone(),
        ))
    }

    pub fn ingest(&self) -> ConceptIngest {
        ConceptIngest::new(self.db.clone())
    }

    pub fn limitup_report(&self) -> LimitupReportService {
        LimitupReportService::new(self.db.clone(), self.settings.clone())
    }

    pub fn compare(&self) -> ConceptCompare {
        ConceptCompare::new(self.db.clone())
    }
}
