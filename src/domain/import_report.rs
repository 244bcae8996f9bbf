// ==========================================
// 安保业务后台 - 导入报告领域模型
// ==========================================
// 职责: 对账结论 / 行级结果 / 批次报告
// 红线: 每个输入行恰好对应一条行级结果，不允许静默丢弃
// ==========================================

use crate::domain::types::EntityType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Verdict - 对账结论
// ==========================================
// 生命周期: 每行计算一次，由编排器立即消费（仅随报告持久化）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// 无匹配记录
    New,
    /// 命中记录且存在差异字段
    Update {
        id: String,
        #[serde(rename = "updatedFields")]
        updated_fields: Vec<String>,
    },
    /// 命中记录且无差异
    Duplicate { id: String },
}

impl Verdict {
    pub fn matched_id(&self) -> Option<&str> {
        match self {
            Verdict::New => None,
            Verdict::Update { id, .. } | Verdict::Duplicate { id } => Some(id.as_str()),
        }
    }
}

// ==========================================
// RowFailure - 行级失败原因
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowFailure {
    /// 字段映射失败（必填缺失 / 编码无法解析）
    MappingError { field: String, reason: String },
    /// 外键引用不存在
    FkError {
        field: String,
        value: String,
        #[serde(rename = "refTable")]
        ref_table: String,
    },
    /// 存储读写失败
    StorageError { message: String },
}

impl std::fmt::Display for RowFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowFailure::MappingError { field, reason } => {
                write!(f, "字段映射失败 (字段 {}): {}", field, reason)
            }
            RowFailure::FkError { field, value, ref_table } => {
                write!(f, "外键约束违反 (字段 {}): {} 在 {} 中不存在", field, value, ref_table)
            }
            RowFailure::StorageError { message } => write!(f, "存储错误: {}", message),
        }
    }
}

// ==========================================
// RowOutcome - 行级处理结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowOutcome {
    /// 成功（写入 / 跳过 / 预览），record_id 为受影响记录
    Success {
        #[serde(rename = "recordId", skip_serializing_if = "Option::is_none")]
        record_id: Option<String>,
    },
    /// 失败（带类型化原因）
    Failed { failure: RowFailure },
    /// 批次被取消，本行未处理
    Cancelled,
}

// ==========================================
// RowStatus - 面向调用方的行状态
// ==========================================
// 预览模式下 Imported/Updated/Duplicate 表示"将会"的结果，未写入任何数据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowStatus {
    Imported,  // 新增
    Updated,   // 更新
    Duplicate, // 重复跳过
    Failed,    // 失败
    Cancelled, // 未处理（批次中止）
}

// ==========================================
// ImportRowResult - 行级结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRowResult {
    pub row_index: usize,             // 原始行号（从 1 开始，不含表头）
    pub entity_type: EntityType,      // 目标实体
    pub verdict: Option<Verdict>,     // 对账结论（映射/外键失败时为空）
    pub outcome: RowOutcome,          // 处理结果
}

impl ImportRowResult {
    pub fn status(&self) -> RowStatus {
        match (&self.outcome, &self.verdict) {
            (RowOutcome::Cancelled, _) => RowStatus::Cancelled,
            (RowOutcome::Failed { .. }, _) => RowStatus::Failed,
            (RowOutcome::Success { .. }, Some(Verdict::Update { .. })) => RowStatus::Updated,
            (RowOutcome::Success { .. }, Some(Verdict::Duplicate { .. })) => RowStatus::Duplicate,
            (RowOutcome::Success { .. }, _) => RowStatus::Imported,
        }
    }

    pub fn failure(&self) -> Option<&RowFailure> {
        match &self.outcome {
            RowOutcome::Failed { failure } => Some(failure),
            _ => None,
        }
    }
}

// ==========================================
// ImportMode - 导入模式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportMode {
    Apply,   // 写入存储
    Preview, // 仅计算结论，不写入
}

impl std::fmt::Display for ImportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportMode::Apply => write!(f, "APPLY"),
            ImportMode::Preview => write!(f, "PREVIEW"),
        }
    }
}

// ==========================================
// ImportSummary - 汇总统计
// ==========================================
// 按行状态计数；预览批次中 inserted/updated 为预计数量（见 ImportReport.mode）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub total_rows: usize,
    pub inserted: usize,
    pub updated: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub cancelled: usize,
}

// ==========================================
// ImportReport - 批次报告
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub batch_id: String,
    pub entity_type: EntityType,
    pub mode: ImportMode,
    pub aborted: bool,                  // 是否被调用方取消
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rows: Vec<ImportRowResult>,
}

impl ImportReport {
    pub fn summary(&self) -> ImportSummary {
        let mut summary = ImportSummary {
            total_rows: self.rows.len(),
            ..Default::default()
        };
        for row in &self.rows {
            match row.status() {
                RowStatus::Imported => summary.inserted += 1,
                RowStatus::Updated => summary.updated += 1,
                RowStatus::Duplicate => summary.duplicates += 1,
                RowStatus::Failed => summary.failed += 1,
                RowStatus::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

// ==========================================
// ImportBatch - 导入批次日志
// ==========================================
// 对齐: import_batch 表
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatch {
    pub batch_id: String,
    pub entity_type: String,
    pub mode: String,
    pub source: Option<String>,         // 来源（文件名 / http）
    pub summary: ImportSummary,
    pub aborted: bool,
    pub started_at: String,
    pub elapsed_ms: i64,
}
