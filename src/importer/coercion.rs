// ==========================================
// 安保业务后台 - 字段类型转换库
// ==========================================
// 职责: 表格单元格 → 类型化字段值（导入方向）
//       存储值 → 展示文本（导出方向）
// 红线: 所有函数为全函数，不 panic；空白输入一律视为缺失
// ==========================================

use crate::domain::types::{
    parse_storage_date, parse_storage_datetime, FieldType, FieldValue,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::collections::HashMap;
use std::fmt;

/// 导出日期格式（意大利习惯）
pub const EXPORT_DATE_FORMAT: &str = "%d/%m/%Y";

/// 导出时间戳格式
pub const EXPORT_DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

// Excel 序列日期的有效范围（1900-01-01 .. 9999-12-31）
const EXCEL_SERIAL_MIN: f64 = 1.0;
const EXCEL_SERIAL_MAX: f64 = 2_958_466.0;

// ==========================================
// CellValue - 原始单元格
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// 从 JSON 值构造（HTTP 行数据）
    pub fn from_json(value: &serde_json::Value) -> CellValue {
        match value {
            serde_json::Value::Null => CellValue::Empty,
            serde_json::Value::Bool(b) => CellValue::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .map(CellValue::Number)
                .unwrap_or(CellValue::Empty),
            serde_json::Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
            CellValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// 原始行: 表头 → 单元格
pub type RawRow = HashMap<String, CellValue>;

/// 带原始行号的行（行号从 1 开始，不含表头；跳过的空白行仍占行号）
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub row_index: usize,
    pub cells: RawRow,
}

impl SourceRow {
    /// 按输入顺序连续编号（JSON 行没有被跳过的行）
    pub fn numbered(rows: Vec<RawRow>) -> Vec<SourceRow> {
        rows.into_iter()
            .enumerate()
            .map(|(idx, cells)| SourceRow {
                row_index: idx + 1,
                cells,
            })
            .collect()
    }
}

// ==========================================
// 解析失败策略
// ==========================================
// 导入: 解析失败 → 空值
// 导出: 解析失败 → 保留原值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Import,
    Export,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailure {
    Null,
    KeepOriginal,
}

impl Direction {
    pub const fn on_parse_failure(self) -> ParseFailure {
        match self {
            Direction::Import => ParseFailure::Null,
            Direction::Export => ParseFailure::KeepOriginal,
        }
    }
}

impl ParseFailure {
    /// 按策略处理无法解析的原始文本
    pub fn apply(self, raw: &str) -> Option<String> {
        match self {
            ParseFailure::Null => None,
            ParseFailure::KeepOriginal => Some(raw.to_string()),
        }
    }
}

// ==========================================
// 导入方向
// ==========================================

/// 文本: 去首尾空白，空串 → None；整数不带小数部分
pub fn to_text(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Empty => None,
        CellValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        CellValue::Number(n) if n.is_finite() => Some(format_number(*n)),
        CellValue::Number(_) => None,
        CellValue::Bool(b) => Some(b.to_string()),
    }
}

/// 数值: 接受数值或数值字符串（支持小数逗号）；不产生 NaN / 无穷
pub fn to_number(cell: &CellValue) -> Option<f64> {
    let parsed = match cell {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => parse_number_text(s),
        CellValue::Empty | CellValue::Bool(_) => None,
    };
    parsed.filter(|n| n.is_finite())
}

/// 布尔: "true" / "1" / "sì" / "si"、数值 1、布尔 true → true；其余一律 false
pub fn to_boolean(cell: &CellValue) -> bool {
    match cell {
        CellValue::Bool(b) => *b,
        CellValue::Number(n) => *n == 1.0,
        CellValue::Text(s) => {
            let lower = s.trim().to_lowercase();
            matches!(lower.as_str(), "true" | "1" | "sì" | "si")
        }
        CellValue::Empty => false,
    }
}

/// 日期: ISO / 意大利格式 / 时间戳日期部分 / Excel 序列号
pub fn to_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Number(n) => excel_serial_to_datetime(*n).map(|dt| dt.date()),
        CellValue::Text(s) => parse_date_text(s),
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

/// 时间戳: RFC3339 / ISO / 意大利格式 / 纯日期（零点）/ Excel 序列号（含小数时间）
///
/// 结果截断到整秒，与存储格式精度一致。
pub fn to_datetime(cell: &CellValue) -> Option<NaiveDateTime> {
    let parsed = match cell {
        CellValue::Number(n) => excel_serial_to_datetime(*n),
        CellValue::Text(s) => parse_datetime_text(s),
        CellValue::Empty | CellValue::Bool(_) => None,
    };
    parsed.and_then(|dt| dt.with_nanosecond(0))
}

/// UUID 列: 空 → None；非空原样透传（合法性由外键校验负责）
pub fn to_uuid_text(cell: &CellValue) -> Option<String> {
    to_text(cell)
}

/// 按字段语义类型转换（导入方向）
///
/// 布尔字段的缺失单元格为 Null（缺失列不等于"否"），其余按 [`to_boolean`]。
pub fn coerce(field_type: FieldType, cell: &CellValue) -> FieldValue {
    let on_failure = Direction::Import.on_parse_failure();
    match field_type {
        FieldType::Text => to_text(cell).map(FieldValue::Text).unwrap_or(FieldValue::Null),
        FieldType::Uuid => to_uuid_text(cell).map(FieldValue::Text).unwrap_or(FieldValue::Null),
        FieldType::Number => to_number(cell).map(FieldValue::Number).unwrap_or(FieldValue::Null),
        FieldType::Boolean => {
            if cell.is_blank() {
                FieldValue::Null
            } else {
                FieldValue::Bool(to_boolean(cell))
            }
        }
        FieldType::Date => match to_date(cell) {
            Some(d) => FieldValue::Date(d),
            None => failure_value(on_failure, cell),
        },
        FieldType::DateTime => match to_datetime(cell) {
            Some(dt) => FieldValue::DateTime(dt),
            None => failure_value(on_failure, cell),
        },
    }
}

fn failure_value(policy: ParseFailure, cell: &CellValue) -> FieldValue {
    match to_text(cell).and_then(|raw| policy.apply(&raw)) {
        Some(raw) => FieldValue::Text(raw),
        None => FieldValue::Null,
    }
}

// ==========================================
// 导出方向
// ==========================================

/// 导出日期: DD/MM/YYYY；无法解析时按导出策略保留原值
pub fn export_date(raw: &str) -> String {
    match parse_storage_date(raw).or_else(|| parse_date_text(raw)) {
        Some(d) => d.format(EXPORT_DATE_FORMAT).to_string(),
        None => keep_for_export(raw),
    }
}

/// 导出时间戳: DD/MM/YYYY HH:MM:SS；无法解析时按导出策略保留原值
pub fn export_datetime(raw: &str) -> String {
    match parse_storage_datetime(raw).or_else(|| parse_datetime_text(raw)) {
        Some(dt) => dt.format(EXPORT_DATETIME_FORMAT).to_string(),
        None => keep_for_export(raw),
    }
}

/// 导出布尔: 本地化 是/否
pub fn export_boolean(value: bool) -> String {
    if value {
        crate::i18n::t("export.bool_true")
    } else {
        crate::i18n::t("export.bool_false")
    }
}

fn keep_for_export(raw: &str) -> String {
    Direction::Export
        .on_parse_failure()
        .apply(raw)
        .unwrap_or_default()
}

// ==========================================
// 内部解析辅助
// ==========================================

/// 数值格式化: 整数不带小数部分
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn parse_number_text(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(n) = trimmed.parse::<f64>() {
        return Some(n);
    }
    // 小数逗号（10,5）；带千分位点的写法（1.234,5）同样接受
    if trimmed.contains(',') {
        let normalized = trimmed.replace('.', "").replace(',', ".");
        return normalized.parse::<f64>().ok();
    }
    None
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

fn parse_date_text(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| parse_datetime_only(trimmed).map(|dt| dt.date()))
}

fn parse_datetime_text(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    parse_datetime_only(trimmed).or_else(|| {
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
            .map(|d| d.and_time(NaiveTime::MIN))
    })
}

fn parse_datetime_only(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Excel 序列号 → 时间戳（纪元 1899-12-30，小数部分为当日时间）
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(EXCEL_SERIAL_MIN..EXCEL_SERIAL_MAX).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let days = serial.trunc() as i64;
    let seconds = (serial.fract() * 86_400.0).round() as i64;
    epoch.checked_add_signed(Duration::days(days) + Duration::seconds(seconds))
}
