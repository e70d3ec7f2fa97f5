//! 概念映射导入、涨停概念报告与概念重叠对比的集成测试（内存库）
//!   cargo test --test test_ingest_report

use std::sync::Arc;

use concept_limitup::db::database::Database;
use concept_limitup::error::AnalyError;
use concept_limitup::models::concept::{ConceptAlias, ConceptMaster, IngestSummary};
use concept_limitup::models::settings::AnalySettings;
use concept_limitup::models::stock::{DailyBar, StockInfo};
use concept_limitup::services::concept_compare::ConceptCompare;
use concept_limitup::services::concept_ingest::ConceptIngest;
use concept_limitup::services::concept_membership::resolve_concepts;
use concept_limitup::services::limitup_report::LimitupReportService;

fn bar(code: &str, date: &str, pct: f64, close: f64) -> DailyBar {
    DailyBar {
        code: code.to_string(),
        date: date.to_string(),
        open: close,
        close,
        high: close,
        low: close,
        volume: 0.0,
        change_pct: pct,
    }
}

fn info(code: &str, name: &str, hy: &str) -> StockInfo {
    StockInfo { code: code.into(), name: name.into(), hy_name: hy.into() }
}

fn codes(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

// ==================== 映射导入 ====================

#[test]
fn test_mapping_ingest_replaces_per_code() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let ingest = ConceptIngest::new(db.clone());
    ingest.upsert_stock_infos(&[info("600000", "浦发银行", "银行")]).unwrap();

    let summary = ingest
        .apply_mapping_json(r#"{"codes":[{"code":"600000","concepts":["AI"," CPO ","AI"]}]}"#)
        .unwrap();
    assert_eq!(summary, IngestSummary { codes: 1, mappings: 2 });
    assert_eq!(db.concept_names_grouped(&codes(&["sh600000"])).unwrap()["sh600000"], codes(&["AI", "CPO"]));

    ingest.apply_mapping_json(r#"{"concepts":[{"name":"芯片","codes":["sh600000"]}]}"#).unwrap();
    let grouped = db.concept_names_grouped(&codes(&["sh600000"])).unwrap();
    assert_eq!(grouped["sh600000"], codes(&["芯片"]), "再次导入应整体替换旧映射");
    let infos = db.stock_infos_by_codes(&codes(&["sh600000"])).unwrap();
    assert_eq!(infos["sh600000"].hy_name, "芯片", "旧版字段同步改写");
}

#[test]
fn test_mapping_ingest_rejects_bad_payloads() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let ingest = ConceptIngest::new(db);
    assert!(matches!(ingest.apply_mapping_json(r#"{"concepts":[]}"#), Err(AnalyError::InvalidInput(_))));
    assert!(matches!(ingest.apply_mapping_json(r#"{"foo":1}"#), Err(AnalyError::InvalidInput(_))));
    assert!(matches!(ingest.apply_mapping_json("not json"), Err(AnalyError::InvalidInput(_))));
}

#[test]
fn test_alias_upsert_last_write_wins() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let ingest = ConceptIngest::new(db.clone());
    assert_eq!(ingest.apply_alias_json(r#"{"alias":"AI","name":"人工智能"}"#).unwrap(), 1);
    assert_eq!(
        ingest
            .apply_alias_json(r#"{"aliases":[{"alias":"AI","name":"AI应用"},{"alias":"","name":"x"}]}"#)
            .unwrap(),
        1
    );
    assert_eq!(db.alias_target("AI").unwrap().as_deref(), Some("AI应用"));
    assert_eq!(
        ingest.upsert_aliases(&[ConceptAlias { alias: " 算力 ".into(), name: "算力租赁".into() }]).unwrap(),
        1
    );
    assert_eq!(db.alias_target("算力").unwrap().as_deref(), Some("算力租赁"));
}

#[test]
fn test_daily_bars_append_only_and_validated() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let ingest = ConceptIngest::new(db.clone());
    let n = ingest
        .append_daily_bars(&[bar("600000", "2024-01-02", 1.0, 10.0), bar("600000", "2024/01/03", 1.0, 10.0)])
        .unwrap();
    assert_eq!(n, 1, "非法日期被跳过");
    assert_eq!(ingest.append_daily_bars(&[bar("sh600000", "2024-01-02", 5.0, 11.0)]).unwrap(), 0);
    let got = db.daily_bar_on("sh600000", "2024-01-02").unwrap().unwrap();
    assert!((got.close - 10.0).abs() < 1e-9, "已有日线不被覆盖");
}

#[test]
fn test_merge_legacy_and_structured_end_to_end() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.upsert_stock_infos(&[info("sz002001", "", "AI,芯片")]).unwrap();
    // replace 会改写旧版字段，这里恢复旧值
    db.replace_concepts_for_code("sz002001", &codes(&["芯片", "CPO"])).unwrap();
    db.upsert_stock_infos(&[info("sz002001", "", "AI,芯片")]).unwrap();
    let got = resolve_concepts(&db, &codes(&["sz002001"])).unwrap();
    assert_eq!(got["sz002001"], codes(&["AI", "芯片", "CPO"]));
}

// ==================== 涨停概念报告 ====================

/// 股票池 sh600000（概念 AI），目标日 2024-01-19：
/// sz000001 两连板、概念 "人工智能AI"（别名到 AI）；sz000002 涨停但概念不相关
fn setup_report_db() -> Arc<Database> {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let ingest = ConceptIngest::new(db.clone());
    ingest
        .upsert_stock_infos(&[
            info("sh600000", "浦发银行", "AI"),
            info("sz000001", "平安银行", "人工智能AI"),
            info("sz000002", "万科A", "白酒"),
        ])
        .unwrap();
    ingest.upsert_aliases(&[ConceptAlias { alias: "人工智能AI".into(), name: "AI".into() }]).unwrap();
    ingest.upsert_concept_masters(&[ConceptMaster { name: "AI".into(), hy_code: "BK001".into() }]).unwrap();

    let mut bars = Vec::new();
    let closes = [10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 11.0, 12.1];
    for (i, close) in closes.iter().enumerate() {
        let pct = if i >= 8 { 10.0 } else { 0.0 };
        bars.push(bar("sz000001", &format!("2024-01-{:02}", 10 + i), pct, *close));
    }
    bars.push(bar("sz000002", "2024-01-19", 10.0, 20.0));
    bars.push(bar("sh600000", "2024-01-19", 1.0, 8.0));
    ingest.append_daily_bars(&bars).unwrap();

    ingest
        .append_concept_daily(
            "BK001",
            &[
                ("2024-01-19".into(), 1100.0),
                ("2024-01-18".into(), 1050.0),
                ("2024-01-17".into(), 1020.0),
                ("2024-01-16".into(), 1010.0),
                ("2024-01-15".into(), 1000.0),
            ],
        )
        .unwrap();
    db
}

#[test]
fn test_limitup_report_metrics_and_persistence() {
    let db = setup_report_db();
    let svc = LimitupReportService::new(db.clone(), AnalySettings::default());

    let report = svc.run(&codes(&["600000"]), Some("2024-01-21"), "pool.txt").unwrap();
    assert_eq!(report.trade_day, "2024-01-19", "目标日取不晚于指定日期的最近交易日");
    assert_eq!(report.concepts.len(), 1);

    let concept = &report.concepts[0];
    assert_eq!(concept.name, "AI");
    assert_eq!(concept.hy_code, "BK001");
    assert_eq!(concept.stocks.len(), 1, "不相关概念的涨停股被排除");
    let s = &concept.stocks[0];
    assert_eq!(s.code, "sz000001");
    assert_eq!(s.consecutive, 2);
    assert_eq!(s.limitups_5d, 2);
    assert_eq!(s.limitups_3d, 2);
    assert!((s.pct_change_5d - 21.0).abs() < 1e-9);
    assert!((s.pct_change_10d - 21.0).abs() < 1e-9);
    assert!((concept.pct_change_5d - 10.0).abs() < 1e-9, "板块 5 日涨幅取板块日线");
    assert!((concept.pct_change_10d - 21.0).abs() < 1e-9, "板块 10 日数据不足时取成分股均值");
    assert_eq!(concept.max_consecutive, 2);

    let runs = db.get_report_runs(10).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, report.run_id);
    assert_eq!(runs[0].pool_label, "pool.txt");
    assert_eq!(runs[0].concept_count, 1);
    assert_eq!(runs[0].stock_count, 2, "留档股票数为目标日全部涨停股");

    let items = db.get_report_items(report.run_id).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].stock_code, "sz000001");
    assert_eq!(items[0].concept_name, "AI");
    assert!((items[0].concept_pct_5d - 10.0).abs() < 1e-9);

    // 每次执行追加新的 run，旧记录不变
    let again = svc.run(&codes(&["sh600000"]), None, "").unwrap();
    assert!(again.run_id > report.run_id);
    let runs = db.get_report_runs(10).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].pool_label, "manual");
    assert_eq!(db.get_report_items(report.run_id).unwrap().len(), 1);
}

#[test]
fn test_limitup_report_errors() {
    let db = setup_report_db();
    let svc = LimitupReportService::new(db.clone(), AnalySettings::default());

    assert!(matches!(svc.run(&codes(&["  "]), None, ""), Err(AnalyError::InvalidInput(_))));
    assert!(matches!(svc.run(&codes(&["sh600000"]), Some("2024-1-xx"), ""), Err(AnalyError::InvalidDate(_))));
    assert!(matches!(svc.run(&codes(&["sh600000"]), Some("2023-12-01"), ""), Err(AnalyError::NoData(_))));
    // 股票池没有任何概念
    assert!(matches!(svc.run(&codes(&["sh601988"]), None, ""), Err(AnalyError::NoData(_))));
    // 概念与涨停股无交集
    db.upsert_stock_infos(&[info("sh601988", "中国银行", "银行")]).unwrap();
    assert!(matches!(svc.run(&codes(&["sh601988"]), None, ""), Err(AnalyError::NoData(_))));
    assert!(db.get_report_runs(10).unwrap().is_empty(), "失败的报告不留档");
}

// ==================== 概念重叠对比 ====================

#[test]
fn test_concept_overlap_ordering() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.upsert_stock_infos(&[
        info("sh600001", "A1", "AI,芯片"),
        info("sh600002", "A2", "AI"),
        info("sz000011", "B1", "芯片"),
        info("sz000012", "B2", "芯片,AI"),
        info("sz000013", "B3", "白酒"),
    ])
    .unwrap();
    let cmp = ConceptCompare::new(db);

    let res = cmp.compare(&codes(&["600001, 600002"]), &codes(&["000011", "000012", "000013"]), true).unwrap();
    let rows: Vec<(&str, usize, usize)> = res.rows.iter().map(|r| (r.code.as_str(), r.overlap, r.weighted)).collect();
    assert_eq!(rows, vec![("sz000012", 2, 3), ("sz000011", 1, 1)]);
    let names: Vec<&str> = res.rows[0].concepts.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["AI", "芯片"], "重叠概念按 A 组频次降序");
    assert_eq!(res.rows[0].name, "B2");
    let freq: Vec<(&str, usize)> = res.concepts_a.iter().map(|c| (c.name.as_str(), c.count)).collect();
    assert_eq!(freq, vec![("AI", 2), ("芯片", 1)]);

    let all = cmp.compare(&codes(&["600001", "600002"]), &codes(&["000013", "000011"]), false).unwrap();
    assert_eq!(all.rows.len(), 2);
    assert_eq!(all.rows[1].code, "sz000013");
    assert_eq!(all.rows[1].weighted, 0);

    assert!(matches!(cmp.compare(&[], &codes(&["000011"]), false), Err(AnalyError::InvalidInput(_))));
}

#[test]
fn test_concept_overlap_accepts_stock_names() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.upsert_stock_infos(&[
        info("sh600000", "浦发银行", "银行,AI"),
        info("sz000001", "平安银行", "银行"),
        info("sz000002", "万科A", "地产"),
    ])
    .unwrap();
    let cmp = ConceptCompare::new(db);

    // B 组混合名称、模糊名称与代码
    let res = cmp.compare(&codes(&["sz000001"]), &codes(&["浦发银行", "万科", "000001"]), false).unwrap();
    let rows: Vec<(&str, usize)> = res.rows.iter().map(|r| (r.code.as_str(), r.weighted)).collect();
    assert_eq!(rows, vec![("sh600000", 1), ("sz000001", 1), ("sz000002", 0)], "名称解析为代码后参与打分");
    assert_eq!(res.rows[0].name, "浦发银行");

    // A 组用名称同样可解析
    let by_name = cmp.compare(&codes(&["平安银行"]), &codes(&["sh600000"]), true).unwrap();
    assert_eq!(by_name.rows.len(), 1);
    assert_eq!(by_name.rows[0].concepts[0].name, "银行");
}
