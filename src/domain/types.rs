// ==========================================
// 安保业务后台 - 领域类型定义
// ==========================================
// 职责: 实体类型标签 / 字段语义类型 / 规范化字段值
// 红线: 导入管道越过字段映射之后不再出现无类型的行数据
// ==========================================

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 存储日期格式（ISO DATE）
pub const STORAGE_DATE_FORMAT: &str = "%Y-%m-%d";

/// 存储时间戳格式（ISO DATETIME，无时区，UTC 口径）
pub const STORAGE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// 记账字段: 创建时间
pub const CREATED_AT: &str = "created_at";

/// 记账字段: 修改时间
pub const UPDATED_AT: &str = "updated_at";

/// 主键字段
pub const ID_FIELD: &str = "id";

// ==========================================
// 实体类型 (Entity Type)
// ==========================================
// 序列化格式: 存储表名（与 HTTP entityType 参数一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityType {
    #[serde(rename = "clienti")]
    Client,
    #[serde(rename = "fornitori")]
    Supplier,
    #[serde(rename = "punti_servizio")]
    ServicePoint,
    #[serde(rename = "personale")]
    Staff,
    #[serde(rename = "operatori_network")]
    NetworkOperator,
    #[serde(rename = "procedure")]
    Procedure,
    #[serde(rename = "tariffe")]
    Tariff,
    #[serde(rename = "rubrica_clienti")]
    ClientAddressBookEntry,
    #[serde(rename = "rubrica_fornitori")]
    SupplierAddressBookEntry,
    #[serde(rename = "rubrica_punti_servizio")]
    ServicePointAddressBookEntry,
    #[serde(rename = "richieste_servizio")]
    ServiceRequest,
    #[serde(rename = "richieste_servizio_orari")]
    ServiceRequestDailySchedule,
    #[serde(rename = "richieste_servizio_ispezioni")]
    ServiceRequestInspection,
}

impl EntityType {
    /// 全部实体类型（顺序 = 建表顺序，被引用方在前）
    pub const ALL: [EntityType; 13] = [
        EntityType::Client,
        EntityType::Supplier,
        EntityType::NetworkOperator,
        EntityType::ServicePoint,
        EntityType::Staff,
        EntityType::Procedure,
        EntityType::Tariff,
        EntityType::ClientAddressBookEntry,
        EntityType::SupplierAddressBookEntry,
        EntityType::ServicePointAddressBookEntry,
        EntityType::ServiceRequest,
        EntityType::ServiceRequestDailySchedule,
        EntityType::ServiceRequestInspection,
    ];

    /// 规范存储表名
    pub const fn storage_name(self) -> &'static str {
        match self {
            EntityType::Client => "clienti",
            EntityType::Supplier => "fornitori",
            EntityType::ServicePoint => "punti_servizio",
            EntityType::Staff => "personale",
            EntityType::NetworkOperator => "operatori_network",
            EntityType::Procedure => "procedure",
            EntityType::Tariff => "tariffe",
            EntityType::ClientAddressBookEntry => "rubrica_clienti",
            EntityType::SupplierAddressBookEntry => "rubrica_fornitori",
            EntityType::ServicePointAddressBookEntry => "rubrica_punti_servizio",
            EntityType::ServiceRequest => "richieste_servizio",
            EntityType::ServiceRequestDailySchedule => "richieste_servizio_orari",
            EntityType::ServiceRequestInspection => "richieste_servizio_ispezioni",
        }
    }

    /// 按存储表名解析（显式白名单，未知名称返回 None）
    pub fn from_storage_name(name: &str) -> Option<EntityType> {
        let name = name.trim();
        EntityType::ALL
            .iter()
            .copied()
            .find(|e| e.storage_name() == name)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_name())
    }
}

/// 未知实体类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEntityType(pub String);

impl fmt::Display for UnknownEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "未知实体类型: {}", self.0)
    }
}

impl std::error::Error for UnknownEntityType {}

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::from_storage_name(s).ok_or_else(|| UnknownEntityType(s.to_string()))
    }
}

// ==========================================
// 字段语义类型 (Field Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Text,     // 文本
    Number,   // 数值
    Boolean,  // 布尔
    Date,     // 日期
    DateTime, // 时间戳
    Uuid,     // UUID（外键列）
}

impl FieldType {
    /// SQLite 列类型
    pub const fn sql_type(self) -> &'static str {
        match self {
            FieldType::Number => "REAL",
            FieldType::Boolean => "INTEGER",
            FieldType::Text | FieldType::Date | FieldType::DateTime | FieldType::Uuid => "TEXT",
        }
    }
}

// ==========================================
// 字段角色 (Field Role)
// ==========================================
// 由规则表推导（外键规则 / 唯一键候选集），不单独维护
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldRole {
    Plain,
    ForeignKey,
    UniqueCandidateMember,
}

// ==========================================
// 规范化字段值 (Field Value)
// ==========================================
// 用途: Canonical Payload 的值类型
// 约束: 空白来源值一律为 Null，不会出现空文本
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// 转换为存储值（JSON 口径，日期统一为 ISO 字符串）
    pub fn to_storage_value(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Number(n) => number_to_value(*n),
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Date(d) => Value::String(d.format(STORAGE_DATE_FORMAT).to_string()),
            FieldValue::DateTime(dt) => {
                Value::String(dt.format(STORAGE_DATETIME_FORMAT).to_string())
            }
        }
    }

    /// 按字段语义类型解码存储值
    ///
    /// 说明:
    /// - 存储侧布尔为 0/1，数值可能是 INTEGER 或 REAL
    /// - 无法按语义类型解析的文本保留为 Text（比较时自然判为不同）
    pub fn from_stored(field_type: FieldType, value: &Value) -> FieldValue {
        match (field_type, value) {
            (_, Value::Null) => FieldValue::Null,

            (FieldType::Number, Value::Number(n)) => {
                n.as_f64().map(FieldValue::Number).unwrap_or(FieldValue::Null)
            }
            (FieldType::Number, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => FieldValue::Number(n),
                _ => text_or_null(s),
            },

            (FieldType::Boolean, Value::Bool(b)) => FieldValue::Bool(*b),
            (FieldType::Boolean, Value::Number(n)) => {
                FieldValue::Bool(n.as_f64().map(|v| v != 0.0).unwrap_or(false))
            }
            (FieldType::Boolean, Value::String(s)) => {
                let lower = s.trim().to_lowercase();
                FieldValue::Bool(matches!(lower.as_str(), "true" | "1"))
            }

            (FieldType::Date, Value::String(s)) => match parse_storage_date(s) {
                Some(d) => FieldValue::Date(d),
                None => text_or_null(s),
            },
            (FieldType::DateTime, Value::String(s)) => match parse_storage_datetime(s) {
                Some(dt) => FieldValue::DateTime(dt),
                None => text_or_null(s),
            },

            (_, Value::String(s)) => text_or_null(s),
            (_, Value::Number(n)) => FieldValue::Text(n.to_string()),
            (_, Value::Bool(b)) => FieldValue::Text(b.to_string()),
            (_, other) => FieldValue::Text(other.to_string()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_storage_value().serialize(serializer)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_storage_value() {
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", other),
        }
    }
}

fn text_or_null(s: &str) -> FieldValue {
    if s.trim().is_empty() {
        FieldValue::Null
    } else {
        FieldValue::Text(s.to_string())
    }
}

/// 整数值写为 JSON 整数，其余写为浮点
fn number_to_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// 解析存储日期（兼容带时间部分的 ISO 字符串）
pub fn parse_storage_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, STORAGE_DATE_FORMAT)
        .ok()
        .or_else(|| parse_storage_datetime(s).map(|dt| dt.date()))
}

/// 解析存储时间戳（ISO / RFC3339 / 空格分隔）
pub fn parse_storage_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

/// 规范化载荷: 字段名 → 类型化值（字段顺序稳定）
pub type CanonicalPayload = BTreeMap<String, FieldValue>;
