// ==========================================
// 安保业务后台 - 实体字段模式注册表
// ==========================================
// 职责: 每个实体的字段模式 / 唯一键候选集 / 外键规则 / 编码快捷规则
// 红线: 规则表只在此处维护（映射、校验、对账、导出、建表共用）
// ==========================================

use crate::domain::types::{EntityType, FieldRole, FieldType};

/// 字段模式版本（字段表变更时递增）
pub const SCHEMA_VERSION: u32 = 1;

// ==========================================
// FieldSpec - 字段定义
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,              // 规范字段名（= 存储列名）
    pub field_type: FieldType,           // 语义类型
    pub nullable: bool,                  // 是否可空（false = 必填）
    pub aliases: &'static [&'static str], // 历史列名（规范名之后按顺序尝试）
}

impl FieldSpec {
    /// 表头候选列名: 规范名优先，其后为别名
    pub fn header_candidates(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }

    pub fn is_required(&self) -> bool {
        !self.nullable
    }
}

const fn opt(name: &'static str, field_type: FieldType, aliases: &'static [&'static str]) -> FieldSpec {
    FieldSpec { name, field_type, nullable: true, aliases }
}

const fn req(name: &'static str, field_type: FieldType, aliases: &'static [&'static str]) -> FieldSpec {
    FieldSpec { name, field_type, nullable: false, aliases }
}

// ==========================================
// ForeignKeyRule - 外键规则
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct ForeignKeyRule {
    pub field: &'static str,
    pub references: EntityType,
}

// ==========================================
// ShortcutRule - 编码快捷规则
// ==========================================
// 用途: 表格中人工填写的编码（如客户编码）在映射阶段解析为目标 UUID
#[derive(Debug, Clone, Copy)]
pub struct ShortcutRule {
    pub field: &'static str,                   // 目标外键字段
    pub code_headers: &'static [&'static str], // 编码列名（按顺序尝试）
    pub lookup: EntityType,                    // 查找实体
    pub lookup_field: &'static str,            // 查找实体中的编码字段
}

// ==========================================
// EntitySchema - 实体模式
// ==========================================
#[derive(Debug)]
pub struct EntitySchema {
    pub entity: EntityType,
    pub fields: &'static [FieldSpec],
    pub unique_keys: &'static [&'static [&'static str]], // 候选键集（有序，首个可用者生效）
    pub foreign_keys: &'static [ForeignKeyRule],         // 外键规则（有序，首个失败即返回）
    pub shortcuts: &'static [ShortcutRule],
}

impl EntitySchema {
    pub fn table(&self) -> &'static str {
        self.entity.storage_name()
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn shortcut_for(&self, field: &str) -> Option<&'static ShortcutRule> {
        self.shortcuts.iter().find(|s| s.field == field)
    }

    pub fn foreign_key_for(&self, field: &str) -> Option<&'static ForeignKeyRule> {
        self.foreign_keys.iter().find(|fk| fk.field == field)
    }

    /// 字段角色（外键优先于唯一键成员）
    pub fn field_role(&self, field: &str) -> FieldRole {
        if self.foreign_key_for(field).is_some() {
            FieldRole::ForeignKey
        } else if self
            .unique_keys
            .iter()
            .any(|set| set.iter().any(|member| *member == field))
        {
            FieldRole::UniqueCandidateMember
        } else {
            FieldRole::Plain
        }
    }
}

/// 获取实体模式
pub fn schema_for(entity: EntityType) -> &'static EntitySchema {
    match entity {
        EntityType::Client => &CLIENT,
        EntityType::Supplier => &SUPPLIER,
        EntityType::ServicePoint => &SERVICE_POINT,
        EntityType::Staff => &STAFF,
        EntityType::NetworkOperator => &NETWORK_OPERATOR,
        EntityType::Procedure => &PROCEDURE,
        EntityType::Tariff => &TARIFF,
        EntityType::ClientAddressBookEntry => &CLIENT_ADDRESS_BOOK,
        EntityType::SupplierAddressBookEntry => &SUPPLIER_ADDRESS_BOOK,
        EntityType::ServicePointAddressBookEntry => &SERVICE_POINT_ADDRESS_BOOK,
        EntityType::ServiceRequest => &SERVICE_REQUEST,
        EntityType::ServiceRequestDailySchedule => &SERVICE_REQUEST_DAILY_SCHEDULE,
        EntityType::ServiceRequestInspection => &SERVICE_REQUEST_INSPECTION,
    }
}

// ===== 通用编码快捷规则 =====

const BY_CLIENT_CODE: ShortcutRule = ShortcutRule {
    field: "id_cliente",
    code_headers: &["codice_cliente", "Codice Cliente"],
    lookup: EntityType::Client,
    lookup_field: "codice_cliente",
};

const BY_SUPPLIER_CODE: ShortcutRule = ShortcutRule {
    field: "id_fornitore",
    code_headers: &["codice_fornitore", "Codice Fornitore"],
    lookup: EntityType::Supplier,
    lookup_field: "codice_fornitore",
};

const BY_OPERATOR_CODE: ShortcutRule = ShortcutRule {
    field: "id_operatore_network",
    code_headers: &["codice_operatore", "Codice Operatore"],
    lookup: EntityType::NetworkOperator,
    lookup_field: "codice_operatore",
};

const BY_SERVICE_POINT_CODE: ShortcutRule = ShortcutRule {
    field: "id_punto_servizio",
    code_headers: &["codice_punto", "Codice Punto", "Codice Punto Servizio"],
    lookup: EntityType::ServicePoint,
    lookup_field: "codice_punto",
};

const BY_REQUEST_CODE: ShortcutRule = ShortcutRule {
    field: "id_richiesta_servizio",
    code_headers: &["codice_richiesta", "Codice Richiesta"],
    lookup: EntityType::ServiceRequest,
    lookup_field: "codice_richiesta",
};

const BY_STAFF_NUMBER: ShortcutRule = ShortcutRule {
    field: "id_personale",
    code_headers: &["matricola", "Matricola"],
    lookup: EntityType::Staff,
    lookup_field: "matricola",
};

const FK_CLIENT: ForeignKeyRule = ForeignKeyRule { field: "id_cliente", references: EntityType::Client };
const FK_SUPPLIER: ForeignKeyRule = ForeignKeyRule { field: "id_fornitore", references: EntityType::Supplier };
const FK_OPERATOR: ForeignKeyRule = ForeignKeyRule { field: "id_operatore_network", references: EntityType::NetworkOperator };
const FK_SERVICE_POINT: ForeignKeyRule = ForeignKeyRule { field: "id_punto_servizio", references: EntityType::ServicePoint };
const FK_REQUEST: ForeignKeyRule = ForeignKeyRule { field: "id_richiesta_servizio", references: EntityType::ServiceRequest };
const FK_STAFF: ForeignKeyRule = ForeignKeyRule { field: "id_personale", references: EntityType::Staff };

use FieldType::{Boolean, Date, DateTime, Number, Text, Uuid};

// ==========================================
// 客户 (clienti)
// ==========================================
static CLIENT: EntitySchema = EntitySchema {
    entity: EntityType::Client,
    fields: &[
        opt("codice_cliente", Text, &["Codice Cliente", "codice"]),
        req("ragione_sociale", Text, &["Ragione Sociale", "nome_cliente"]),
        opt("partita_iva", Text, &["Partita IVA", "P.IVA", "piva"]),
        opt("codice_fiscale", Text, &["Codice Fiscale", "cf"]),
        opt("indirizzo", Text, &["Indirizzo"]),
        opt("citta", Text, &["Città", "Citta", "comune"]),
        opt("cap", Text, &["CAP"]),
        opt("provincia", Text, &["Provincia", "prov"]),
        opt("telefono", Text, &["Telefono"]),
        opt("email", Text, &["Email", "E-mail"]),
        opt("pec", Text, &["PEC"]),
        opt("referente", Text, &["Referente"]),
        opt("attivo", Boolean, &["Attivo"]),
        opt("data_inizio_contratto", Date, &["Data Inizio Contratto"]),
        opt("note", Text, &["Note"]),
    ],
    unique_keys: &[&["codice_cliente"], &["partita_iva"], &["ragione_sociale"]],
    foreign_keys: &[],
    shortcuts: &[],
};

// ==========================================
// 供应商 (fornitori)
// ==========================================
static SUPPLIER: EntitySchema = EntitySchema {
    entity: EntityType::Supplier,
    fields: &[
        opt("codice_fornitore", Text, &["Codice Fornitore", "codice"]),
        req("ragione_sociale", Text, &["Ragione Sociale", "nome_fornitore"]),
        opt("partita_iva", Text, &["Partita IVA", "P.IVA", "piva"]),
        opt("codice_fiscale", Text, &["Codice Fiscale", "cf"]),
        opt("indirizzo", Text, &["Indirizzo"]),
        opt("citta", Text, &["Città", "Citta", "comune"]),
        opt("cap", Text, &["CAP"]),
        opt("provincia", Text, &["Provincia", "prov"]),
        opt("telefono", Text, &["Telefono"]),
        opt("email", Text, &["Email", "E-mail"]),
        opt("pec", Text, &["PEC"]),
        opt("categoria_servizio", Text, &["Categoria Servizio", "categoria"]),
        opt("attivo", Boolean, &["Attivo"]),
        opt("note", Text, &["Note"]),
    ],
    unique_keys: &[&["codice_fornitore"], &["partita_iva"], &["ragione_sociale"]],
    foreign_keys: &[],
    shortcuts: &[],
};

// ==========================================
// 网络运营商 (operatori_network)
// ==========================================
static NETWORK_OPERATOR: EntitySchema = EntitySchema {
    entity: EntityType::NetworkOperator,
    fields: &[
        opt("codice_operatore", Text, &["Codice Operatore", "codice"]),
        req("ragione_sociale", Text, &["Ragione Sociale", "nome_operatore"]),
        opt("partita_iva", Text, &["Partita IVA", "P.IVA", "piva"]),
        opt("referente", Text, &["Referente"]),
        opt("telefono", Text, &["Telefono"]),
        opt("email", Text, &["Email", "E-mail"]),
        opt("centrale_operativa", Text, &["Centrale Operativa"]),
        opt("attivo", Boolean, &["Attivo"]),
        opt("note", Text, &["Note"]),
    ],
    unique_keys: &[&["codice_operatore"], &["partita_iva"], &["ragione_sociale"]],
    foreign_keys: &[],
    shortcuts: &[],
};

// ==========================================
// 服务点 (punti_servizio)
// ==========================================
static SERVICE_POINT: EntitySchema = EntitySchema {
    entity: EntityType::ServicePoint,
    fields: &[
        opt("codice_punto", Text, &["Codice Punto", "Codice Punto Servizio"]),
        req("id_cliente", Uuid, &["ID Cliente"]),
        req("nome_punto_servizio", Text, &["Nome Punto Servizio", "denominazione"]),
        opt("indirizzo", Text, &["Indirizzo"]),
        opt("citta", Text, &["Città", "Citta", "comune"]),
        opt("cap", Text, &["CAP"]),
        opt("provincia", Text, &["Provincia", "prov"]),
        opt("latitudine", Number, &["Latitudine", "lat"]),
        opt("longitudine", Number, &["Longitudine", "lng", "lon"]),
        opt("id_fornitore", Uuid, &["ID Fornitore"]),
        opt("id_operatore_network", Uuid, &["ID Operatore Network"]),
        opt("codice_sicurezza", Text, &["Codice Sicurezza", "parola_chiave"]),
        opt("attivo", Boolean, &["Attivo"]),
        opt("note", Text, &["Note"]),
    ],
    unique_keys: &[&["codice_punto"], &["id_cliente", "nome_punto_servizio"]],
    foreign_keys: &[FK_CLIENT, FK_SUPPLIER, FK_OPERATOR],
    shortcuts: &[BY_CLIENT_CODE, BY_SUPPLIER_CODE, BY_OPERATOR_CODE],
};

// ==========================================
// 人员 (personale)
// ==========================================
static STAFF: EntitySchema = EntitySchema {
    entity: EntityType::Staff,
    fields: &[
        opt("matricola", Text, &["Matricola"]),
        req("nome", Text, &["Nome"]),
        req("cognome", Text, &["Cognome"]),
        opt("codice_fiscale", Text, &["Codice Fiscale", "cf"]),
        opt("data_nascita", Date, &["Data Nascita", "Data di Nascita"]),
        opt("ruolo", Text, &["Ruolo", "mansione"]),
        opt("telefono", Text, &["Telefono"]),
        opt("email", Text, &["Email", "E-mail"]),
        opt("data_assunzione", Date, &["Data Assunzione"]),
        opt("numero_decreto", Text, &["Numero Decreto", "decreto_gpg"]),
        opt("scadenza_decreto", Date, &["Scadenza Decreto"]),
        opt("id_fornitore", Uuid, &["ID Fornitore"]),
        opt("attivo", Boolean, &["Attivo"]),
        opt("note", Text, &["Note"]),
    ],
    unique_keys: &[&["matricola"], &["codice_fiscale"], &["cognome", "nome", "data_nascita"]],
    foreign_keys: &[FK_SUPPLIER],
    shortcuts: &[BY_SUPPLIER_CODE],
};

// ==========================================
// 操作规程 (procedure)
// ==========================================
static PROCEDURE: EntitySchema = EntitySchema {
    entity: EntityType::Procedure,
    fields: &[
        opt("codice_procedura", Text, &["Codice Procedura", "codice"]),
        req("nome_procedura", Text, &["Nome Procedura", "titolo"]),
        opt("descrizione", Text, &["Descrizione"]),
        opt("versione", Text, &["Versione"]),
        opt("data_revisione", Date, &["Data Revisione"]),
        opt("id_cliente", Uuid, &["ID Cliente"]),
        opt("id_punto_servizio", Uuid, &["ID Punto Servizio"]),
        opt("attiva", Boolean, &["Attiva"]),
        opt("note", Text, &["Note"]),
    ],
    unique_keys: &[&["codice_procedura"], &["nome_procedura", "id_punto_servizio"]],
    foreign_keys: &[FK_CLIENT, FK_SERVICE_POINT],
    shortcuts: &[BY_CLIENT_CODE, BY_SERVICE_POINT_CODE],
};

// ==========================================
// 价目 (tariffe)
// ==========================================
static TARIFF: EntitySchema = EntitySchema {
    entity: EntityType::Tariff,
    fields: &[
        opt("codice_tariffa", Text, &["Codice Tariffa", "codice"]),
        req("id_cliente", Uuid, &["ID Cliente"]),
        opt("id_punto_servizio", Uuid, &["ID Punto Servizio"]),
        req("tipo_servizio", Text, &["Tipo Servizio"]),
        req("importo", Number, &["Importo", "prezzo"]),
        opt("unita_misura", Text, &["Unità di Misura", "Unita Misura", "um"]),
        opt("valida_dal", Date, &["Valida Dal", "data_inizio"]),
        opt("valida_al", Date, &["Valida Al", "data_fine"]),
        opt("note", Text, &["Note"]),
    ],
    unique_keys: &[
        &["codice_tariffa"],
        &["id_cliente", "id_punto_servizio", "tipo_servizio", "valida_dal"],
    ],
    foreign_keys: &[FK_CLIENT, FK_SERVICE_POINT],
    shortcuts: &[BY_CLIENT_CODE, BY_SERVICE_POINT_CODE],
};

// ==========================================
// 通讯录 (rubrica_*)
// ==========================================
static CLIENT_ADDRESS_BOOK: EntitySchema = EntitySchema {
    entity: EntityType::ClientAddressBookEntry,
    fields: &[
        req("id_cliente", Uuid, &["ID Cliente"]),
        req("nome_contatto", Text, &["Nome Contatto", "contatto"]),
        opt("ruolo", Text, &["Ruolo"]),
        opt("telefono", Text, &["Telefono"]),
        opt("cellulare", Text, &["Cellulare"]),
        opt("email", Text, &["Email", "E-mail"]),
        opt("reperibile", Boolean, &["Reperibile"]),
        opt("priorita", Number, &["Priorità", "Priorita"]),
        opt("note", Text, &["Note"]),
    ],
    unique_keys: &[&["id_cliente", "nome_contatto"]],
    foreign_keys: &[FK_CLIENT],
    shortcuts: &[BY_CLIENT_CODE],
};

static SUPPLIER_ADDRESS_BOOK: EntitySchema = EntitySchema {
    entity: EntityType::SupplierAddressBookEntry,
    fields: &[
        req("id_fornitore", Uuid, &["ID Fornitore"]),
        req("nome_contatto", Text, &["Nome Contatto", "contatto"]),
        opt("ruolo", Text, &["Ruolo"]),
        opt("telefono", Text, &["Telefono"]),
        opt("cellulare", Text, &["Cellulare"]),
        opt("email", Text, &["Email", "E-mail"]),
        opt("reperibile", Boolean, &["Reperibile"]),
        opt("priorita", Number, &["Priorità", "Priorita"]),
        opt("note", Text, &["Note"]),
    ],
    unique_keys: &[&["id_fornitore", "nome_contatto"]],
    foreign_keys: &[FK_SUPPLIER],
    shortcuts: &[BY_SUPPLIER_CODE],
};

static SERVICE_POINT_ADDRESS_BOOK: EntitySchema = EntitySchema {
    entity: EntityType::ServicePointAddressBookEntry,
    fields: &[
        req("id_punto_servizio", Uuid, &["ID Punto Servizio"]),
        req("nome_contatto", Text, &["Nome Contatto", "contatto"]),
        opt("ruolo", Text, &["Ruolo"]),
        opt("telefono", Text, &["Telefono"]),
        opt("cellulare", Text, &["Cellulare"]),
        opt("email", Text, &["Email", "E-mail"]),
        opt("reperibile", Boolean, &["Reperibile"]),
        opt("priorita", Number, &["Priorità", "Priorita"]),
        opt("note", Text, &["Note"]),
    ],
    unique_keys: &[&["id_punto_servizio", "nome_contatto"]],
    foreign_keys: &[FK_SERVICE_POINT],
    shortcuts: &[BY_SERVICE_POINT_CODE],
};

// ==========================================
// 服务请求 (richieste_servizio*)
// ==========================================
static SERVICE_REQUEST: EntitySchema = EntitySchema {
    entity: EntityType::ServiceRequest,
    fields: &[
        opt("codice_richiesta", Text, &["Codice Richiesta", "codice"]),
        req("id_cliente", Uuid, &["ID Cliente"]),
        opt("id_punto_servizio", Uuid, &["ID Punto Servizio"]),
        opt("id_fornitore", Uuid, &["ID Fornitore"]),
        req("tipo_servizio", Text, &["Tipo Servizio"]),
        opt("stato", Text, &["Stato"]),
        req("data_inizio", Date, &["Data Inizio"]),
        opt("data_fine", Date, &["Data Fine"]),
        opt("numero_agenti", Number, &["Numero Agenti", "agenti"]),
        opt("richiesta_il", DateTime, &["Richiesta Il", "data_richiesta"]),
        opt("note", Text, &["Note"]),
    ],
    unique_keys: &[
        &["codice_richiesta"],
        &["id_punto_servizio", "tipo_servizio", "data_inizio"],
    ],
    foreign_keys: &[FK_CLIENT, FK_SERVICE_POINT, FK_SUPPLIER],
    shortcuts: &[BY_CLIENT_CODE, BY_SERVICE_POINT_CODE, BY_SUPPLIER_CODE],
};

static SERVICE_REQUEST_DAILY_SCHEDULE: EntitySchema = EntitySchema {
    entity: EntityType::ServiceRequestDailySchedule,
    fields: &[
        req("id_richiesta_servizio", Uuid, &["ID Richiesta Servizio"]),
        req("giorno_settimana", Text, &["Giorno Settimana", "giorno"]),
        opt("ora_inizio", Text, &["Ora Inizio"]),
        opt("ora_fine", Text, &["Ora Fine"]),
        opt("h24", Boolean, &["H24", "24h"]),
        opt("festivo", Boolean, &["Festivo"]),
        opt("note", Text, &["Note"]),
    ],
    unique_keys: &[&["id_richiesta_servizio", "giorno_settimana"]],
    foreign_keys: &[FK_REQUEST],
    shortcuts: &[BY_REQUEST_CODE],
};

static SERVICE_REQUEST_INSPECTION: EntitySchema = EntitySchema {
    entity: EntityType::ServiceRequestInspection,
    fields: &[
        req("id_richiesta_servizio", Uuid, &["ID Richiesta Servizio"]),
        req("data_ispezione", Date, &["Data Ispezione"]),
        opt("ora_inizio", Text, &["Ora Inizio"]),
        opt("ora_fine", Text, &["Ora Fine"]),
        opt("numero_passaggi", Number, &["Numero Passaggi", "passaggi"]),
        opt("esito", Text, &["Esito"]),
        opt("eseguita_il", DateTime, &["Eseguita Il"]),
        opt("id_personale", Uuid, &["ID Personale"]),
        opt("note", Text, &["Note"]),
    ],
    unique_keys: &[&["id_richiesta_servizio", "data_ispezione", "ora_inizio"]],
    foreign_keys: &[FK_REQUEST, FK_STAFF],
    shortcuts: &[BY_REQUEST_CODE, BY_STAFF_NUMBER],
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_entity_has_schema_for_itself() {
        for entity in EntityType::ALL {
            assert_eq!(schema_for(entity).entity, entity);
            assert_eq!(schema_for(entity).table(), entity.storage_name());
        }
    }

    #[test]
    fn test_rule_fields_exist_in_schema() {
        for entity in EntityType::ALL {
            let schema = schema_for(entity);
            for set in schema.unique_keys {
                assert!(!set.is_empty(), "{}: 空候选键集", entity);
                for f in set.iter() {
                    assert!(schema.has_field(f), "{}: 唯一键字段 {} 不存在", entity, f);
                }
            }
            for fk in schema.foreign_keys {
                let spec = schema.field(fk.field).expect("外键字段不存在");
                assert_eq!(spec.field_type, FieldType::Uuid);
            }
            for sc in schema.shortcuts {
                assert!(schema.foreign_key_for(sc.field).is_some(), "{}: 快捷规则无外键", entity);
                assert!(schema_for(sc.lookup).has_field(sc.lookup_field));
            }
        }
    }

    #[test]
    fn test_field_names_unique_and_not_reserved() {
        for entity in EntityType::ALL {
            let mut seen = HashSet::new();
            for f in schema_for(entity).fields {
                assert!(seen.insert(f.name), "{}: 重复字段 {}", entity, f.name);
                assert!(!["id", "created_at", "updated_at"].contains(&f.name));
            }
        }
    }

    #[test]
    fn test_field_role_derivation() {
        let sp = schema_for(EntityType::ServicePoint);
        assert_eq!(sp.field_role("id_cliente"), FieldRole::ForeignKey);
        assert_eq!(sp.field_role("codice_punto"), FieldRole::UniqueCandidateMember);
        assert_eq!(sp.field_role("note"), FieldRole::Plain);
    }

    #[test]
    fn test_header_candidates_canonical_first() {
        let spec = schema_for(EntityType::Client).field("citta").unwrap();
        let headers: Vec<_> = spec.header_candidates().collect();
        assert_eq!(headers, vec!["citta", "Città", "Citta", "comune"]);
    }
}
