use anyhow::{anyhow, Result};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::models::concept::ConceptMaster;
use crate::models::report::{ReportItem, ReportRun};
use crate::models::settings::AnalySettings;
use crate::models::stock::{DailyBar, DayRow, StockInfo};

pub struct Database {
    conn: Mutex<Connection>,
}

const DAILY_COLUMNS: &str = "code, date, open_price, close, high, low, volume, change_pct";

impl Database {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)?;
        let db_path = data_dir.join("concept_limitup.db");
        let conn = Connection::open(db_path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// 内存库，测试与一次性分析使用
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("数据库连接锁已损坏"))
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS settings (
                id TEXT PRIMARY KEY DEFAULT 'default',
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS stock_info (
                code TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                hy_name TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS stock_daily_history (
                code TEXT NOT NULL,
                date TEXT NOT NULL,
                open_price REAL NOT NULL DEFAULT 0,
                close REAL NOT NULL,
                high REAL NOT NULL DEFAULT 0,
                low REAL NOT NULL DEFAULT 0,
                volume REAL NOT NULL DEFAULT 0,
                change_pct REAL NOT NULL,
                PRIMARY KEY (code, date)
            );

            CREATE INDEX IF NOT EXISTS idx_daily_date ON stock_daily_history(date);

            CREATE TABLE IF NOT EXISTS concept_map (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT NOT NULL,
                name TEXT NOT NULL,
                hy_code TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (code, name)
            );

            CREATE INDEX IF NOT EXISTS idx_concept_map_name ON concept_map(name);

            CREATE TABLE IF NOT EXISTS concept_alias (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                alias TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS concept_master (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                hy_code TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS concept_daily (
                hy_code TEXT NOT NULL,
                date TEXT NOT NULL,
                close REAL NOT NULL,
                PRIMARY KEY (hy_code, date)
            );
            ",
        )?;
        Ok(())
    }

    pub fn save_settings(&self, settings: &AnalySettings) -> Result<()> {
        let conn = self.conn()?;
        let data = serde_json::to_string(settings)?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (id, data, updated_at) VALUES ('default', ?1, datetime('now'))",
            params![data],
        )?;
        Ok(())
    }

    pub fn load_settings(&self) -> Result<AnalySettings> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row("SELECT data FROM settings WHERE id = 'default'", [], |row| row.get(0))
            .optional()?;
        match data {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => {
                let default = AnalySettings::default();
                drop(conn);
                self.save_settings(&default)?;
                Ok(default)
            }
        }
    }

    // ====== Stock Info ======

    pub fn upsert_stock_infos(&self, infos: &[StockInfo]) -> Result<()> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        for s in infos {
            tx.execute(
                "INSERT INTO stock_info (code, name, hy_name, updated_at) VALUES (?1, ?2, ?3, datetime('now'))
                 ON CONFLICT(code) DO UPDATE SET name = excluded.name, hy_name = excluded.hy_name, updated_at = excluded.updated_at",
                params![s.code, s.name, s.hy_name],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn stock_infos_by_codes(&self, codes: &[String]) -> Result<HashMap<String, StockInfo>> {
        let mut out = HashMap::with_capacity(codes.len());
        if codes.is_empty() {
            return Ok(out);
        }
        let conn = self.conn()?;
        let sql = format!(
            "SELECT code, name, hy_name FROM stock_info WHERE code IN ({})",
            placeholders(codes.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(codes.iter()), |row| {
            Ok(StockInfo {
                code: row.get(0)?,
                name: row.get(1)?,
                hy_name: row.get(2)?,
            })
        })?;
        for row in rows {
            let info = row?;
            out.insert(info.code.clone(), info);
        }
        Ok(out)
    }

    /// 旧版概念字段模糊匹配（结构化映射缺失时的回退）
    pub fn codes_by_legacy_like(&self, name: &str, limit: usize) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT code FROM stock_info WHERE hy_name LIKE ?1 ESCAPE '\\' ORDER BY code LIMIT ?2",
        )?;
        let like = like_contains(name);
        let rows = stmt.query_map(params![like, limit as i64], |row| row.get::<_, String>(0))?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// 按股票名称查代码：先精确匹配名称，再模糊匹配名称或代码
    pub fn code_by_name(&self, name: &str) -> Result<Option<String>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let conn = self.conn()?;
        let exact = conn
            .query_row(
                "SELECT code FROM stock_info WHERE name = ?1 ORDER BY code LIMIT 1",
                params![name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        if exact.is_some() {
            return Ok(exact);
        }
        let fuzzy = conn
            .query_row(
                "SELECT code FROM stock_info WHERE name LIKE ?1 ESCAPE '\\' OR code LIKE ?1 ESCAPE '\\' ORDER BY code LIMIT 1",
                params![like_contains(name)],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(fuzzy)
    }

    // ====== Daily History ======

    /// 追加日K，已存在的 (code, date) 不覆盖
    pub fn save_daily_bars(&self, bars: &[DailyBar]) -> Result<usize> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let mut inserted = 0;
        for b in bars {
            inserted += tx.execute(
                "INSERT OR IGNORE INTO stock_daily_history (code, date, open_price, close, high, low, volume, change_pct) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![b.code, b.date, b.open, b.close, b.high, b.low, b.volume, b.change_pct],
            )?;
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// 最近 N 条日K，按日期倒序
    pub fn get_daily_history(&self, code: &str, days: usize) -> Result<Vec<DailyBar>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM stock_daily_history WHERE code = ?1 ORDER BY date DESC LIMIT ?2",
            DAILY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![code, days as i64], map_daily_bar)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// 最近 N 个交易日，按日期升序
    pub fn recent_trading_days(&self, code: &str, days: usize) -> Result<Vec<String>> {
        let mut dates: Vec<String> = self
            .get_daily_history(code, days)?
            .into_iter()
            .map(|b| b.date.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
        dates.reverse();
        Ok(dates)
    }

    pub fn daily_bar_on(&self, code: &str, date: &str) -> Result<Option<DailyBar>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM stock_daily_history WHERE code = ?1 AND date = ?2",
            DAILY_COLUMNS
        );
        let bar = conn.query_row(&sql, params![code, date], map_daily_bar).optional()?;
        Ok(bar)
    }

    /// 目标日（含）之前最近的一个有日线的交易日；date 为空时取最新
    pub fn latest_trade_day(&self, on_or_before: Option<&str>) -> Result<Option<String>> {
        let conn = self.conn()?;
        let day: Option<String> = match on_or_before {
            Some(date) => conn.query_row(
                "SELECT MAX(date) FROM stock_daily_history WHERE date <= ?1",
                params![date],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT MAX(date) FROM stock_daily_history", [], |row| row.get(0))?,
        };
        Ok(day)
    }

    /// 某交易日全部股票日线，附带名称与旧版概念字段
    pub fn day_rows(&self, date: &str) -> Result<Vec<DayRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT d.code, IFNULL(i.name, ''), IFNULL(i.hy_name, ''), d.change_pct, d.close
             FROM stock_daily_history d
             LEFT JOIN stock_info i ON i.code = d.code
             WHERE d.date = ?1
             ORDER BY d.code",
        )?;
        let rows = stmt.query_map(params![date], |row| {
            Ok(DayRow {
                code: row.get::<_, String>(0)?.trim().to_lowercase(),
                name: row.get::<_, String>(1)?.trim().to_string(),
                hy_name: row.get::<_, String>(2)?.trim().to_string(),
                change_pct: row.get(3)?,
                close: row.get(4)?,
            })
        })?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// 多只股票区间日线，按代码分组、组内日期倒序
    pub fn daily_bars_between(&self, codes: &[String], start: &str, end: &str) -> Result<HashMap<String, Vec<DailyBar>>> {
        let mut grouped: HashMap<String, Vec<DailyBar>> = HashMap::new();
        if codes.is_empty() {
            return Ok(grouped);
        }
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM stock_daily_history WHERE code IN ({}) AND date <= ? AND date >= ? ORDER BY code, date DESC",
            DAILY_COLUMNS,
            placeholders(codes.len())
        );
        let mut args: Vec<String> = codes.to_vec();
        args.push(end.to_string());
        args.push(start.to_string());
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), map_daily_bar)?;
        for row in rows {
            let bar = row?;
            grouped.entry(bar.code.clone()).or_default().push(bar);
        }
        Ok(grouped)
    }

    // ====== Concept Mapping ======

    /// 整体替换某代码的结构化概念映射，并回写旧版 hy_name 字段（仅已有的股票信息）
    pub fn replace_concepts_for_code(&self, code: &str, names: &[String]) -> Result<()> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM concept_map WHERE code = ?1", params![code])?;
        for name in names {
            tx.execute(
                "INSERT OR IGNORE INTO concept_map (code, name, created_at) VALUES (?1, ?2, datetime('now'))",
                params![code, name],
            )?;
        }
        tx.execute(
            "UPDATE stock_info SET hy_name = ?2, updated_at = datetime('now') WHERE code = ?1",
            params![code, names.join(",")],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// 按代码聚合结构化概念，组内按写入顺序
    pub fn concept_names_grouped(&self, codes: &[String]) -> Result<HashMap<String, Vec<String>>> {
        let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
        if codes.is_empty() {
            return Ok(grouped);
        }
        let conn = self.conn()?;
        let sql = format!(
            "SELECT code, name FROM concept_map WHERE code IN ({}) ORDER BY id",
            placeholders(codes.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(codes.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (code, name) = row?;
            grouped.entry(code).or_default().push(name);
        }
        Ok(grouped)
    }

    pub fn codes_by_concept(&self, name: &str, limit: usize) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT code FROM concept_map WHERE name = ?1 ORDER BY id LIMIT ?2")?;
        let rows = stmt.query_map(params![name, limit as i64], |row| row.get::<_, String>(0))?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub fn upsert_alias(&self, alias: &str, name: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO concept_alias (alias, name, created_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(alias) DO UPDATE SET name = excluded.name",
            params![alias, name],
        )?;
        Ok(())
    }

    pub fn alias_target(&self, alias: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let name = conn
            .query_row(
                "SELECT name FROM concept_alias WHERE alias = ?1 LIMIT 1",
                params![alias],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(name)
    }

    pub fn upsert_concept_master(&self, concept: &ConceptMaster) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO concept_master (name, hy_code) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET hy_code = excluded.hy_code",
            params![concept.name, concept.hy_code],
        )?;
        Ok(())
    }

    pub fn hy_codes_by_names(&self, names: &[String]) -> Result<HashMap<String, String>> {
        let mut out = HashMap::new();
        if names.is_empty() {
            return Ok(out);
        }
        let conn = self.conn()?;
        let sql = format!(
            "SELECT name, hy_code FROM concept_master WHERE name IN ({})",
            placeholders(names.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(names.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (name, hy_code) = row?;
            out.insert(name, hy_code.trim().to_string());
        }
        Ok(out)
    }

    pub fn save_concept_daily(&self, hy_code: &str, rows: &[(String, f64)]) -> Result<()> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        for (date, close) in rows {
            tx.execute(
                "INSERT OR IGNORE INTO concept_daily (hy_code, date, close) VALUES (?1, ?2, ?3)",
                params![hy_code, date, close],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// 板块区间收盘价，按板块分组、组内日期倒序
    pub fn concept_daily_between(&self, hy_codes: &[String], start: &str, end: &str) -> Result<HashMap<String, Vec<(String, f64)>>> {
        let mut grouped: HashMap<String, Vec<(String, f64)>> = HashMap::new();
        if hy_codes.is_empty() {
            return Ok(grouped);
        }
        let conn = self.conn()?;
        let sql = format!(
            "SELECT hy_code, date, close FROM concept_daily WHERE hy_code IN ({}) AND date <= ? AND date >= ? ORDER BY hy_code, date DESC",
            placeholders(hy_codes.len())
        );
        let mut args: Vec<String> = hy_codes.to_vec();
        args.push(end.to_string());
        args.push(start.to_string());
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, f64>(2)?))
        })?;
        for row in rows {
            let (hy_code, date, close) = row?;
            grouped.entry(hy_code.trim().to_string()).or_default().push((date, close));
        }
        Ok(grouped)
    }

    // ====== Limit-up Report ======

    fn ensure_report_tables(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS limitup_report_run (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_at TEXT NOT NULL,
                trade_day TEXT NOT NULL,
                pool_label TEXT NOT NULL DEFAULT '',
                concept_count INTEGER NOT NULL DEFAULT 0,
                stock_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_report_trade_day ON limitup_report_run(trade_day);

            CREATE TABLE IF NOT EXISTS limitup_report_item (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id INTEGER NOT NULL REFERENCES limitup_report_run(id),
                concept_name TEXT NOT NULL,
                hy_code TEXT NOT NULL DEFAULT '',
                stock_code TEXT NOT NULL,
                stock_name TEXT NOT NULL DEFAULT '',
                consecutive INTEGER NOT NULL DEFAULT 0,
                limitups_3d INTEGER NOT NULL DEFAULT 0,
                limitups_5d INTEGER NOT NULL DEFAULT 0,
                pct_change_5d REAL NOT NULL DEFAULT 0,
                pct_change_10d REAL NOT NULL DEFAULT 0,
                concept_pct_5d REAL NOT NULL DEFAULT 0,
                concept_pct_10d REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_report_item_run ON limitup_report_item(run_id, concept_name);
            CREATE INDEX IF NOT EXISTS idx_report_item_stock ON limitup_report_item(stock_code);
            ",
        )?;
        Ok(())
    }

    /// 写入一次报告：先写 run 拿到自增 id，再批量写 items，二者同一事务
    pub fn persist_report(&self, run: &ReportRun, items: &[ReportItem]) -> Result<i64> {
        let conn = self.conn()?;
        Self::ensure_report_tables(&conn)?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO limitup_report_run (run_at, trade_day, pool_label, concept_count, stock_count) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run.run_at, run.trade_day, run.pool_label, run.concept_count as i64, run.stock_count as i64],
        )?;
        let run_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO limitup_report_item (run_id, concept_name, hy_code, stock_code, stock_name, consecutive, limitups_3d, limitups_5d, pct_change_5d, pct_change_10d, concept_pct_5d, concept_pct_10d, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for it in items {
                stmt.execute(params![
                    run_id,
                    it.concept_name,
                    it.hy_code,
                    it.stock_code,
                    it.stock_name,
                    it.consecutive,
                    it.limitups_3d,
                    it.limitups_5d,
                    it.pct_change_5d,
                    it.pct_change_10d,
                    it.concept_pct_5d,
                    it.concept_pct_10d,
                    it.created_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(run_id)
    }

    pub fn get_report_runs(&self, limit: usize) -> Result<Vec<ReportRun>> {
        let conn = self.conn()?;
        Self::ensure_report_tables(&conn)?;
        let mut stmt = conn.prepare(
            "SELECT id, run_at, trade_day, pool_label, concept_count, stock_count FROM limitup_report_run ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(ReportRun {
                id: row.get(0)?,
                run_at: row.get(1)?,
                trade_day: row.get(2)?,
                pool_label: row.get(3)?,
                concept_count: row.get::<_, i64>(4)? as usize,
                stock_count: row.get::<_, i64>(5)? as usize,
            })
        })?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub fn get_report_items(&self, run_id: i64) -> Result<Vec<ReportItem>> {
        let conn = self.conn()?;
        Self::ensure_report_tables(&conn)?;
        let mut stmt = conn.prepare(
            "SELECT id, run_id, concept_name, hy_code, stock_code, stock_name, consecutive, limitups_3d, limitups_5d, pct_change_5d, pct_change_10d, concept_pct_5d, concept_pct_10d, created_at
             FROM limitup_report_item WHERE run_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(ReportItem {
                id: row.get(0)?,
                run_id: row.get(1)?,
                concept_name: row.get(2)?,
                hy_code: row.get(3)?,
                stock_code: row.get(4)?,
                stock_name: row.get(5)?,
                consecutive: row.get(6)?,
                limitups_3d: row.get(7)?,
                limitups_5d: row.get(8)?,
                pct_change_5d: row.get(9)?,
                pct_change_10d: row.get(10)?,
                concept_pct_5d: row.get(11)?,
                concept_pct_10d: row.get(12)?,
                created_at: row.get(13)?,
            })
        })?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

/// `%关键字%` 形式的 LIKE 模式，转义 `\`、`%`、`_`
fn like_contains(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('%');
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn map_daily_bar(row: &rusqlite::Row<'_>) -> rusqlite::Result<DailyBar> {
    Ok(DailyBar {
        code: row.get(0)?,
        date: row.get(1)?,
        open: row.get(2)?,
        close: row.get(3)?,
        high: row.get(4)?,
        low: row.get(5)?,
        volume: row.get(6)?,
        change_pct: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(code: &str, date: &str, pct: f64) -> DailyBar {
        DailyBar {
            code: code.to_string(),
            date: date.to_string(),
            open: 10.0,
            close: 10.0,
            high: 10.0,
            low: 10.0,
            volume: 0.0,
            change_pct: pct,
        }
    }

    #[test]
    fn test_daily_bars_are_append_only() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.save_daily_bars(&[bar("sh600000", "2024-01-02", 1.0)]).unwrap(), 1);
        assert_eq!(db.save_daily_bars(&[bar("sh600000", "2024-01-02", 9.9)]).unwrap(), 0);
        let got = db.daily_bar_on("sh600000", "2024-01-02").unwrap().unwrap();
        assert!((got.change_pct - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_recent_trading_days_ascending() {
        let db = Database::open_in_memory().unwrap();
        db.save_daily_bars(&[
            bar("sh600000", "2024-01-02", 0.0),
            bar("sh600000", "2024-01-03", 0.0),
            bar("sh600000", "2024-01-04", 0.0),
        ])
        .unwrap();
        assert_eq!(db.recent_trading_days("sh600000", 2).unwrap(), vec!["2024-01-03", "2024-01-04"]);
        assert!(db.recent_trading_days("sz000001", 2).unwrap().is_empty());
        assert_eq!(db.latest_trade_day(Some("2024-01-03")).unwrap().as_deref(), Some("2024-01-03"));
        assert_eq!(db.latest_trade_day(None).unwrap().as_deref(), Some("2024-01-04"));
        assert_eq!(db.latest_trade_day(Some("2023-12-31")).unwrap(), None);
    }

    #[test]
    fn test_replace_concepts_for_code() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_stock_infos(&[StockInfo { code: "sh600000".into(), name: "浦发银行".into(), hy_name: "银行".into() }]).unwrap();
        db.replace_concepts_for_code("sh600000", &["AI".into(), "CPO".into()]).unwrap();
        db.replace_concepts_for_code("sh600000", &["芯片".into()]).unwrap();
        let grouped = db.concept_names_grouped(&["sh600000".into()]).unwrap();
        assert_eq!(grouped["sh600000"], vec!["芯片"]);
        let info = db.stock_infos_by_codes(&["sh600000".into()]).unwrap();
        assert_eq!(info["sh600000"].hy_name, "芯片");
    }

    #[test]
    fn test_legacy_like_escapes_wildcards() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_stock_infos(&[
            StockInfo { code: "sh600001".into(), name: "甲".into(), hy_name: "AI_芯片".into() },
            StockInfo { code: "sh600002".into(), name: "乙".into(), hy_name: "AIX芯片".into() },
            StockInfo { code: "sh600003".into(), name: "丙".into(), hy_name: "100%军工".into() },
        ])
        .unwrap();
        assert_eq!(db.codes_by_legacy_like("AI_芯片", 10).unwrap(), vec!["sh600001"]);
        assert_eq!(db.codes_by_legacy_like("100%", 10).unwrap(), vec!["sh600003"]);
        assert_eq!(db.codes_by_legacy_like("%", 10).unwrap(), vec!["sh600003"]);
    }

    #[test]
    fn test_code_by_name_exact_then_fuzzy() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_stock_infos(&[
            StockInfo { code: "sh600000".into(), name: "浦发银行".into(), hy_name: String::new() },
            StockInfo { code: "sh601000".into(), name: "浦发银行B".into(), hy_name: String::new() },
            StockInfo { code: "sz000001".into(), name: "平安银行".into(), hy_name: String::new() },
        ])
        .unwrap();
        assert_eq!(db.code_by_name("浦发银行").unwrap().as_deref(), Some("sh600000"));
        assert_eq!(db.code_by_name("平安").unwrap().as_deref(), Some("sz000001"));
        assert_eq!(db.code_by_name("000001").unwrap().as_deref(), Some("sz000001"));
        assert_eq!(db.code_by_name("不存在").unwrap(), None);
        assert_eq!(db.code_by_name("  ").unwrap(), None);
    }

    fn report_run(day: &str) -> ReportRun {
        ReportRun {
            id: 0,
            run_at: "2024-01-19 15:30:00".into(),
            trade_day: day.into(),
            pool_label: "pool.txt".into(),
            concept_count: 1,
            stock_count: 1,
        }
    }

    fn report_item(code: &str) -> ReportItem {
        ReportItem {
            id: 0,
            run_id: 0,
            concept_name: "AI".into(),
            hy_code: String::new(),
            stock_code: code.into(),
            stock_name: String::new(),
            consecutive: 1,
            limitups_3d: 1,
            limitups_5d: 1,
            pct_change_5d: 0.0,
            pct_change_10d: 0.0,
            concept_pct_5d: 0.0,
            concept_pct_10d: 0.0,
            created_at: "2024-01-19 15:30:00".into(),
        }
    }

    #[test]
    fn test_persist_report_links_items_to_run() {
        let db = Database::open_in_memory().unwrap();
        let id = db.persist_report(&report_run("2024-01-19"), &[report_item("sz000001"), report_item("sz000002")]).unwrap();
        let items = db.get_report_items(id).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.run_id == id));
    }

    #[test]
    fn test_persist_report_is_atomic() {
        let db = Database::open_in_memory().unwrap();
        {
            let conn = db.conn().unwrap();
            Database::ensure_report_tables(&conn).unwrap();
            conn.execute_batch(
                "CREATE TRIGGER reject_item BEFORE INSERT ON limitup_report_item
                 WHEN NEW.stock_code = 'bad'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        }
        let res = db.persist_report(&report_run("2024-01-19"), &[report_item("sz000001"), report_item("bad")]);
        assert!(res.is_err());
        assert!(db.get_report_runs(10).unwrap().is_empty(), "明细写入失败时 run 也应回滚");
    }

    #[test]
    fn test_settings_roundtrip_default() {
        let db = Database::open_in_memory().unwrap();
        let s = db.load_settings().unwrap();
        assert_eq!(s.concurrency, 6);
        let mut s2 = s.clone();
        s2.concurrency = 4;
        db.save_settings(&s2).unwrap();
        assert_eq!(db.load_settings().unwrap().concurrency, 4);
    }
}
