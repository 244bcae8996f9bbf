// ==========================================
// 安保业务后台 - 表格编解码器
// ==========================================
// 职责: 表格文件字节 ↔ 原始行
// 支持: Excel (.xlsx/.xls) / CSV (.csv) 读取；.xlsx 写出
// 约束: 只认第一个工作表，第一行为表头，空白行跳过但保留原始行号
// ==========================================

use crate::importer::coercion::{CellValue, RawRow, SourceRow};
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::ReaderBuilder;
use rust_xlsxwriter::{Format, Workbook};
use std::io::Cursor;
use std::path::Path;

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// 解析 CSV 字节（所有单元格为文本）
    pub fn parse(&self, bytes: &[u8]) -> ImportResult<Vec<SourceRow>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(bytes);

        // 读取表头（去掉 UTF-8 BOM）
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut records = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            let mut row_map = RawRow::new();

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    if header.is_empty() {
                        continue;
                    }
                    row_map.insert(header.clone(), CellValue::Text(value.to_string()));
                }
            }

            // 跳过完全空白的行
            if row_map.values().all(CellValue::is_blank) {
                continue;
            }
            records.push(SourceRow {
                row_index: idx + 1,
                cells: row_map,
            });
        }

        Ok(records)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct XlsxParser;

impl XlsxParser {
    /// 解析 Excel 字节（.xlsx / .xls 自动识别）
    ///
    /// 日期单元格转换为 Excel 序列号，由字段类型转换统一处理。
    pub fn parse(&self, bytes: &[u8]) -> ImportResult<Vec<SourceRow>> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        // 提取表头（第一行）
        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            return Ok(Vec::new());
        };
        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        let mut records = Vec::new();
        for (idx, data_row) in rows.enumerate() {
            let mut row_map = RawRow::new();
            for (col_idx, cell) in data_row.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    if header.is_empty() {
                        continue;
                    }
                    row_map.insert(header.clone(), to_cell_value(cell));
                }
            }

            // 跳过完全空白的行
            if row_map.values().all(CellValue::is_blank) {
                continue;
            }
            records.push(SourceRow {
                row_index: idx + 1,
                cells: row_map,
            });
        }

        Ok(records)
    }
}

fn to_cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Empty,
    }
}

// ==========================================
// 通用文件解析器（根据扩展名 / 格式名选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    /// 按格式名解析字节（xlsx / xls / csv）
    pub fn parse_bytes(&self, format: &str, bytes: &[u8]) -> ImportResult<Vec<SourceRow>> {
        match format.trim().trim_start_matches('.').to_lowercase().as_str() {
            "csv" => CsvParser.parse(bytes),
            "xlsx" | "xls" => XlsxParser.parse(bytes),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }

    /// 按扩展名解析文件
    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<Vec<SourceRow>> {
        let path = file_path.as_ref();
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if !matches!(ext.as_str(), "csv" | "xlsx" | "xls") {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let bytes = std::fs::read(path)?;
        self.parse_bytes(&ext, &bytes)
    }
}

// ==========================================
// Excel 写出
// ==========================================

/// 写出单元格
#[derive(Debug, Clone, PartialEq)]
pub enum SheetCell {
    Empty,
    Text(String),
    Number(f64),
}

/// 单工作表数据
#[derive(Debug, Clone, Default)]
pub struct SheetData {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<SheetCell>>,
}

pub struct XlsxWriter;

impl XlsxWriter {
    /// 生成 .xlsx 字节（表头加粗）
    pub fn serialize(&self, sheet: &SheetData) -> ImportResult<Vec<u8>> {
        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for (col, header) in sheet.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, header, &header_format)?;
        }

        for (row_idx, cells) in sheet.rows.iter().enumerate() {
            let row = (row_idx + 1) as u32;
            for (col, cell) in cells.iter().enumerate() {
                match cell {
                    SheetCell::Empty => {}
                    SheetCell::Text(s) => {
                        worksheet.write_string(row, col as u16, s)?;
                    }
                    SheetCell::Number(n) => {
                        worksheet.write_number(row, col as u16, *n)?;
                    }
                }
            }
        }

        Ok(workbook.save_to_buffer()?)
    }
}
