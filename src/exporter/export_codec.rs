// ==========================================
// 安保业务后台 - 导出编解码器
// ==========================================
// 职责: 读取整张表 → 按字段语义类型格式化 → .xlsx 字节
// 列顺序: id, 模式字段（声明顺序）, created_at, updated_at
// 格式: 布尔 → 本地化 是/否；日期 → DD/MM/YYYY；时间戳 → DD/MM/YYYY HH:MM:SS
//       数值写为数值单元格；无法解析的日期保留原值
// ==========================================

use crate::domain::schema::schema_for;
use crate::domain::types::{EntityType, FieldType, FieldValue, CREATED_AT, ID_FIELD, UPDATED_AT};
use crate::exporter::error::ExportResult;
use crate::importer::coercion::{export_boolean, export_date, export_datetime};
use crate::importer::file_parser::{SheetCell, SheetData, XlsxWriter};
use crate::repository::storage::{Filter, TableStorage};
use serde_json::Value;
use tracing::info;

/// 导出结果
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    /// 表中无数据（非错误）
    Empty,
    /// 已生成工作簿
    Workbook { filename: String, bytes: Vec<u8> },
}

/// 导出一张实体表
pub async fn export_table(entity: EntityType, storage: &dyn TableStorage) -> ExportResult<ExportOutcome> {
    let sheet = match build_sheet(entity, storage).await? {
        Some(sheet) => sheet,
        None => {
            info!(entity = %entity, "无数据可导出");
            return Ok(ExportOutcome::Empty);
        }
    };

    let bytes = XlsxWriter.serialize(&sheet)?;
    info!(entity = %entity, rows = sheet.rows.len(), bytes = bytes.len(), "导出完成");
    Ok(ExportOutcome::Workbook {
        filename: format!("{}_export.xlsx", entity.storage_name()),
        bytes,
    })
}

/// 构建导出工作表；表为空时返回 None
pub async fn build_sheet(entity: EntityType, storage: &dyn TableStorage) -> ExportResult<Option<SheetData>> {
    let schema = schema_for(entity);
    let rows = storage
        .select(schema.table(), &Filter::all().order_by(CREATED_AT))
        .await?;
    if rows.is_empty() {
        return Ok(None);
    }

    let mut headers = Vec::with_capacity(schema.fields.len() + 3);
    headers.push(ID_FIELD.to_string());
    headers.extend(schema.fields.iter().map(|f| f.name.to_string()));
    headers.push(CREATED_AT.to_string());
    headers.push(UPDATED_AT.to_string());

    let rows = rows
        .iter()
        .map(|row| {
            let mut cells = Vec::with_capacity(headers.len());
            cells.push(format_cell(FieldType::Text, row.get(ID_FIELD)));
            for spec in schema.fields {
                cells.push(format_cell(spec.field_type, row.get(spec.name)));
            }
            cells.push(format_cell(FieldType::DateTime, row.get(CREATED_AT)));
            cells.push(format_cell(FieldType::DateTime, row.get(UPDATED_AT)));
            cells
        })
        .collect();

    Ok(Some(SheetData {
        name: schema.table().to_string(),
        headers,
        rows,
    }))
}

/// 存储值 → 导出单元格
pub fn format_cell(field_type: FieldType, value: Option<&Value>) -> SheetCell {
    let value = match value {
        None | Some(Value::Null) => return SheetCell::Empty,
        Some(value) => value,
    };

    match field_type {
        FieldType::Boolean => match FieldValue::from_stored(field_type, value) {
            FieldValue::Bool(b) => SheetCell::Text(export_boolean(b)),
            _ => SheetCell::Empty,
        },
        FieldType::Number => match FieldValue::from_stored(field_type, value) {
            FieldValue::Number(n) => SheetCell::Number(n),
            FieldValue::Null => SheetCell::Empty,
            other => SheetCell::Text(other.to_string()),
        },
        FieldType::Date => SheetCell::Text(export_date(&raw_text(value))),
        FieldType::DateTime => SheetCell::Text(export_datetime(&raw_text(value))),
        FieldType::Text | FieldType::Uuid => SheetCell::Text(raw_text(value)),
    }
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
