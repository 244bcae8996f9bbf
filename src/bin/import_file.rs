// ==========================================
// 命令行导入工具
// ==========================================
// 用法: import_file <实体类型> <文件路径> [--preview] [--db <数据库路径>]
// ==========================================

use std::sync::{Arc, Mutex};

use anyhow::{bail, Context};
use backoffice_sync::api::ImportApi;
use backoffice_sync::config::get_default_db_path;
use backoffice_sync::db::{init_schema, open_sqlite_connection};
use backoffice_sync::domain::import_report::{ImportMode, RowStatus};
use backoffice_sync::domain::types::EntityType;
use backoffice_sync::importer::UniversalFileParser;
use backoffice_sync::repository::{ImportBatchRepositoryImpl, SqliteStorage};
use backoffice_sync::{i18n, logging};

struct Args {
    entity: EntityType,
    file_path: String,
    preview: bool,
    db_path: String,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut positional = Vec::new();
    let mut preview = false;
    let mut db_path = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--preview" => preview = true,
            "--db" => db_path = Some(args.next().context("--db 需要数据库路径")?),
            _ => positional.push(arg),
        }
    }

    if positional.len() != 2 {
        bail!("用法: import_file <实体类型> <文件路径> [--preview] [--db <数据库路径>]");
    }
    let entity: EntityType = positional[0].parse()?;

    Ok(Args {
        entity,
        file_path: positional[1].clone(),
        preview,
        db_path: db_path.unwrap_or_else(get_default_db_path),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    if let Ok(locale) = std::env::var("BACKOFFICE_SYNC_LOCALE") {
        i18n::set_locale(locale.trim());
    } else {
        i18n::set_locale(i18n::DEFAULT_LOCALE);
    }

    let args = parse_args()?;

    let conn = open_sqlite_connection(&args.db_path)
        .with_context(|| format!("无法打开数据库: {}", args.db_path))?;
    init_schema(&conn)?;
    let conn = Arc::new(Mutex::new(conn));

    let api = ImportApi::new(
        Arc::new(SqliteStorage::from_connection(conn.clone())),
        Arc::new(ImportBatchRepositoryImpl::from_connection(conn)),
        None,
    );

    let rows = UniversalFileParser.parse(&args.file_path)?;
    let mode = if args.preview {
        ImportMode::Preview
    } else {
        ImportMode::Apply
    };
    let response = api
        .run_batch(args.entity, rows, mode, Some(&args.file_path))
        .await?;

    println!("{}", response.message);
    for row in &response.report.rows {
        if row.status() == RowStatus::Failed {
            if let Some(failure) = row.failure() {
                println!("  行 {}: {}", row.row_index, failure);
            }
        }
    }
    Ok(())
}
