pub mod comovement;
pub mod concept_alias;
pub mod concept_compare;
pub mod concept_expansion;
pub mod concept_ingest;
pub mod concept_membership;
pub mod fan_out;
pub mod feed;
pub mod history_kline;
pub mod limit_threshold;
pub mod limitup_report;
pub mod stock_data;
