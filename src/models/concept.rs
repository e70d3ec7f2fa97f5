use serde::{Deserialize, Serialize};

/// 概念别名（alias 唯一，多对一映射到规范名）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptAlias {
    pub alias: String,
    pub name: String,
}

/// 概念主表：规范名 + 可选板块代码（用于关联板块日线）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptMaster {
    pub name: String,
    #[serde(default)]
    pub hy_code: String,
}

/// 外部概念映射载荷，两种格式其一：
/// 1) `{"concepts":[{"name":"人工智能","codes":["sh600000"]}]}`
/// 2) `{"codes":[{"code":"sh600000","concepts":["人工智能","CPO"]}]}`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConceptPayload {
    ByConcept { concepts: Vec<ConceptEntry> },
    ByCode { codes: Vec<CodeEntry> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConceptEntry {
    pub name: String,
    #[serde(default)]
    pub codes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeEntry {
    pub code: String,
    #[serde(default)]
    pub concepts: Vec<String>,
}

/// 别名载荷：批量 `{"aliases":[{"alias":"AI","name":"人工智能"}]}` 或单条 `{"alias":"AI","name":"人工智能"}`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AliasPayload {
    Batch { aliases: Vec<ConceptAlias> },
    Single(ConceptAlias),
}

/// 一次映射导入的结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub codes: usize,
    pub mappings: usize,
}
