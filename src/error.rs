use thiserror::Error;

/// 分析引擎对外错误。
///
/// 单只候选股的数据缺失或外部行情失败不会走到这里，只会体现为计数减少。
#[derive(Debug, Error)]
pub enum AnalyError {
    /// 参数错误（缺少代码、空的概念筛选等）
    #[error("参数错误: {0}")]
    InvalidInput(String),

    /// 日期格式错误，期望 YYYY-MM-DD
    #[error("日期格式错误: {0}，期望 YYYY-MM-DD")]
    InvalidDate(String),

    /// 输入合法但没有可用数据（报告类操作）
    #[error("无可用数据: {0}")]
    NoData(String),

    /// 存储读写失败
    #[error("存储错误: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for AnalyError {
    fn from(e: rusqlite::Error) -> Self {
        AnalyError::Store(e.into())
    }
}

pub type AnalyResult<T> = std::result::Result<T, AnalyError>;
