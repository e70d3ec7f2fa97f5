/// 已知市场前缀
pub const MARKET_PREFIXES: [&str; 4] = ["sh", "sz", "bj", "hk"];

/// 股票代码归一化为 `{市场前缀}{数字}` 形式。
///
/// 规则（按顺序）：
/// 1. 去空白并转小写；
/// 2. 已带 sh/sz/bj/hk 前缀的原样返回；
/// 3. 长度 >= 2 时按前两位数字推断市场：60/68/90 -> sh，00/20/30 -> sz，83/87/43/92 -> bj；
/// 4. 其余原样返回（小写），由调用方处理。
///
/// 港股裸代码无法推断，属于已知限制。
pub fn normalize_code(raw: &str) -> String {
    let code = raw.trim().to_lowercase();
    if code.is_empty() {
        return code;
    }
    if has_market_prefix(&code) {
        return code;
    }
    if code.len() < 2 || !code.is_char_boundary(2) {
        return code;
    }
    let prefix = match &code[..2] {
        "60" | "68" | "90" => "sh",
        "00" | "20" | "30" => "sz",
        "83" | "87" | "43" | "92" => "bj",
        _ => return code,
    };
    format!("{}{}", prefix, code)
}

pub fn has_market_prefix(code: &str) -> bool {
    MARKET_PREFIXES.iter().any(|p| code.starts_with(p))
}

/// 是否可直接当作代码：带市场前缀，或 5 位以上纯数字；否则按股票名称处理
pub fn looks_like_code(raw: &str) -> bool {
    let s = raw.trim().to_lowercase();
    has_market_prefix(&s) || (s.len() >= 5 && s.chars().all(|c| c.is_ascii_digit()))
}

/// 去掉市场前缀，得到裸数字代码（兼容历史上未带前缀导入的数据）
pub fn bare_code(code: &str) -> String {
    let code = code.trim().to_lowercase();
    if code.len() > 2 && has_market_prefix(&code) {
        code[2..].to_string()
    } else {
        code
    }
}

/// 按空白/逗号/顿号/分号/竖线拆分用户输入的列表，去重保序
pub fn split_flexible(s: &str) -> Vec<String> {
    split_on(s, &[' ', '\t', '\n', '\r', ',', '，', '、', ';', '；', '|'])
}

/// 拆分旧版 hy_name 概念字段，额外支持斜杠分隔
pub fn split_concept_text(s: &str) -> Vec<String> {
    split_on(s, &[' ', '\t', '\n', '\r', ',', '，', '、', ';', '；', '|', '/', '／'])
}

fn split_on(s: &str, seps: &[char]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for field in s.split(|c: char| seps.contains(&c)) {
        let field = field.trim();
        if field.is_empty() || out.iter().any(|v| v == field) {
            continue;
        }
        out.push(field.to_string());
    }
    out
}

/// 归一化并去重一组原始代码，丢弃空值
pub fn normalize_codes(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for r in raw {
        let code = normalize_code(r);
        if code.is_empty() || out.contains(&code) {
            continue;
        }
        out.push(code);
    }
    out
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
