use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use tracing::debug;

use leadbook_core::{
    field_value::FieldValue,
    history::{HistoryEntry, HistoryKind},
    hlc::Hlc,
    ids::*,
    lead::{
        Bhk, City, Lead, LeadField, PropertyType, Purpose, Source, Status, Timeline,
        ValidatedLead,
    },
    query::{LeadFilter, LeadSort, SortDirection, SortField},
};

use crate::error::StorageError;
use crate::traits::{HistoryStore, LeadStore};

const LEAD_COLUMNS: &str = "id, full_name, email, phone, city, property_type, bhk, purpose, \
     budget_min, budget_max, timeline, source, status, notes, tags, owner_id, created_at, updated_at";

const HISTORY_COLUMNS: &str = "id, lead_id, changed_by, changed_at, kind, diff";

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

fn parse_enum<T>(raw: &str, parse: fn(&str) -> Option<T>, label: &str) -> Result<T, StorageError> {
    parse(raw).ok_or_else(|| StorageError::Serialization(format!("unknown {label}: {raw}")))
}

fn encode_tags(tags: &[String]) -> Result<Vec<u8>, StorageError> {
    rmp_serde::to_vec(tags).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode_tags(bytes: &[u8]) -> Result<Vec<String>, StorageError> {
    rmp_serde::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn column(field: LeadField) -> &'static str {
    match field {
        LeadField::FullName => "full_name",
        LeadField::Email => "email",
        LeadField::Phone => "phone",
        LeadField::City => "city",
        LeadField::PropertyType => "property_type",
        LeadField::Bhk => "bhk",
        LeadField::Purpose => "purpose",
        LeadField::BudgetMin => "budget_min",
        LeadField::BudgetMax => "budget_max",
        LeadField::Timeline => "timeline",
        LeadField::Source => "source",
        LeadField::Status => "status",
        LeadField::Notes => "notes",
        LeadField::Tags => "tags",
    }
}

fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::FullName => "full_name",
        SortField::Phone => "phone",
        SortField::City => "city",
        SortField::PropertyType => "property_type",
        SortField::BudgetMin => "budget_min",
        SortField::BudgetMax => "budget_max",
        SortField::Timeline => "timeline",
        SortField::Status => "status",
        SortField::CreatedAt => "created_at",
        SortField::UpdatedAt => "updated_at",
    }
}

fn sql_value(field: LeadField, value: &FieldValue) -> Result<Value, StorageError> {
    Ok(match (field, value) {
        (LeadField::Tags, FieldValue::Tags(tags)) => Value::Blob(encode_tags(tags)?),
        (LeadField::Tags, FieldValue::Null) => Value::Blob(encode_tags(&[])?),
        (LeadField::Tags, other) => {
            return Err(StorageError::Serialization(format!(
                "tags must be a list, got {other:?}"
            )));
        }
        (_, FieldValue::Null) => Value::Null,
        (_, FieldValue::Integer(n)) => Value::Integer(*n),
        (_, FieldValue::Text(s)) => Value::Text(s.clone()),
        (field, FieldValue::Tags(_)) => {
            return Err(StorageError::Serialization(format!(
                "{field} cannot hold a tag list"
            )));
        }
    })
}

/// `%needle%` with LIKE wildcards in the needle escaped.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn where_clause(filter: &LeadFilter) -> (String, Vec<Value>) {
    let mut conditions: Vec<&str> = Vec::new();
    let mut params = Vec::new();

    if let Some(search) = &filter.search {
        conditions.push(
            "(full_name LIKE ? ESCAPE '\\' OR phone LIKE ? ESCAPE '\\' OR email LIKE ? ESCAPE '\\')",
        );
        let pattern = like_pattern(search);
        params.extend(std::iter::repeat_n(Value::Text(pattern), 3));
    }
    if let Some(city) = filter.city {
        conditions.push("city = ?");
        params.push(Value::Text(city.as_str().into()));
    }
    if let Some(property_type) = filter.property_type {
        conditions.push("property_type = ?");
        params.push(Value::Text(property_type.as_str().into()));
    }
    if let Some(status) = filter.status {
        conditions.push("status = ?");
        params.push(Value::Text(status.as_str().into()));
    }
    if let Some(timeline) = filter.timeline {
        conditions.push("timeline = ?");
        params.push(Value::Text(timeline.as_str().into()));
    }

    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }
}

fn order_clause(sort: &LeadSort) -> String {
    let direction = match sort.direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    format!(
        " ORDER BY {} {direction}, id {direction}",
        sort_column(sort.field)
    )
}

/// A `leads` row as SQLite hands it back, before decoding.
struct LeadRow {
    id: Vec<u8>,
    full_name: String,
    email: Option<String>,
    phone: String,
    city: String,
    property_type: String,
    bhk: Option<String>,
    purpose: String,
    budget_min: Option<i64>,
    budget_max: Option<i64>,
    timeline: String,
    source: String,
    status: String,
    notes: Option<String>,
    tags: Vec<u8>,
    owner_id: Vec<u8>,
    created_at: Vec<u8>,
    updated_at: Vec<u8>,
}

impl LeadRow {
    fn read(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            full_name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            city: row.get(4)?,
            property_type: row.get(5)?,
            bhk: row.get(6)?,
            purpose: row.get(7)?,
            budget_min: row.get(8)?,
            budget_max: row.get(9)?,
            timeline: row.get(10)?,
            source: row.get(11)?,
            status: row.get(12)?,
            notes: row.get(13)?,
            tags: row.get(14)?,
            owner_id: row.get(15)?,
            created_at: row.get(16)?,
            updated_at: row.get(17)?,
        })
    }

    fn into_lead(self) -> Result<Lead, StorageError> {
        let bhk = match self.bhk.as_deref() {
            Some(raw) => Some(parse_enum(raw, Bhk::parse, "bhk")?),
            None => None,
        };
        Ok(Lead {
            id: LeadId::from_bytes(to_array::<16>(self.id, "lead id")?),
            data: ValidatedLead {
                city: parse_enum(&self.city, City::parse, "city")?,
                property_type: parse_enum(
                    &self.property_type,
                    PropertyType::parse,
                    "property type",
                )?,
                bhk,
                purpose: parse_enum(&self.purpose, Purpose::parse, "purpose")?,
                timeline: parse_enum(&self.timeline, Timeline::parse, "timeline")?,
                source: parse_enum(&self.source, Source::parse, "source")?,
                status: parse_enum(&self.status, Status::parse, "status")?,
                tags: decode_tags(&self.tags)?,
                full_name: self.full_name,
                email: self.email,
                phone: self.phone,
                budget_min: self.budget_min,
                budget_max: self.budget_max,
                notes: self.notes,
            },
            owner_id: UserId::from_bytes(to_array::<16>(self.owner_id, "owner id")?),
            created_at: Hlc::from_bytes(&to_array::<12>(self.created_at, "created_at")?),
            updated_at: Hlc::from_bytes(&to_array::<12>(self.updated_at, "updated_at")?),
        })
    }
}

struct HistoryRow {
    id: Vec<u8>,
    lead_id: Vec<u8>,
    changed_by: Vec<u8>,
    changed_at: Vec<u8>,
    kind: String,
    diff: Vec<u8>,
}

impl HistoryRow {
    fn read(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            lead_id: row.get(1)?,
            changed_by: row.get(2)?,
            changed_at: row.get(3)?,
            kind: row.get(4)?,
            diff: row.get(5)?,
        })
    }

    fn into_entry(self) -> Result<HistoryEntry, StorageError> {
        Ok(HistoryEntry {
            id: HistoryId::from_bytes(to_array::<16>(self.id, "history id")?),
            lead_id: LeadId::from_bytes(to_array::<16>(self.lead_id, "lead id")?),
            changed_by: UserId::from_bytes(to_array::<16>(self.changed_by, "changed_by")?),
            changed_at: Hlc::from_bytes(&to_array::<12>(self.changed_at, "changed_at")?),
            kind: parse_enum(&self.kind, HistoryKind::parse, "history kind")?,
            diff: HistoryEntry::diff_from_msgpack(&self.diff)
                .map_err(|e| StorageError::Serialization(e.to_string()))?,
        })
    }
}

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        debug!(path, "opened lead store");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn insert_lead_row(conn: &Connection, lead: &Lead) -> Result<(), StorageError> {
    let data = &lead.data;
    let result = conn.execute(
        &format!(
            "INSERT INTO leads ({LEAD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
        ),
        rusqlite::params![
            lead.id.as_bytes().as_slice(),
            data.full_name,
            data.email,
            data.phone,
            data.city.as_str(),
            data.property_type.as_str(),
            data.bhk.map(|b| b.as_str()),
            data.purpose.as_str(),
            data.budget_min,
            data.budget_max,
            data.timeline.as_str(),
            data.source.as_str(),
            data.status.as_str(),
            data.notes,
            encode_tags(&data.tags)?,
            lead.owner_id.as_bytes().as_slice(),
            &lead.created_at.to_bytes()[..],
            &lead.updated_at.to_bytes()[..],
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(e) if is_constraint_violation(&e) => Err(StorageError::LeadCollision {
            lead_id: lead.id.to_string(),
        }),
        Err(e) => Err(StorageError::Sqlite(e)),
    }
}

/// Returns the number of rows touched: 0 when the compare-and-swap lost.
fn update_lead_row(
    conn: &Connection,
    lead_id: LeadId,
    expected: Hlc,
    changes: &[(LeadField, FieldValue)],
    updated_at: Hlc,
) -> Result<usize, StorageError> {
    let mut assignments = Vec::with_capacity(changes.len() + 1);
    let mut params = Vec::with_capacity(changes.len() + 3);
    for (field, value) in changes {
        assignments.push(format!("{} = ?", column(*field)));
        params.push(sql_value(*field, value)?);
    }
    assignments.push("updated_at = ?".to_string());
    params.push(Value::Blob(updated_at.to_bytes().to_vec()));
    params.push(Value::Blob(lead_id.as_bytes().to_vec()));
    params.push(Value::Blob(expected.to_bytes().to_vec()));

    let sql = format!(
        "UPDATE leads SET {} WHERE id = ? AND updated_at = ?",
        assignments.join(", ")
    );
    match conn.execute(&sql, params_from_iter(params)) {
        Ok(n) => Ok(n),
        Err(e) if is_constraint_violation(&e) => {
            Err(StorageError::ConstraintViolation(e.to_string()))
        }
        Err(e) => Err(StorageError::Sqlite(e)),
    }
}

fn insert_history_row(conn: &Connection, entry: &HistoryEntry) -> Result<(), StorageError> {
    let diff = entry
        .diff_to_msgpack()
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    let result = conn.execute(
        &format!("INSERT INTO lead_history ({HISTORY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        rusqlite::params![
            entry.id.as_bytes().as_slice(),
            entry.lead_id.as_bytes().as_slice(),
            entry.changed_by.as_bytes().as_slice(),
            &entry.changed_at.to_bytes()[..],
            entry.kind.as_str(),
            diff,
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(e) if is_constraint_violation(&e) => {
            Err(StorageError::ConstraintViolation(e.to_string()))
        }
        Err(e) => Err(StorageError::Sqlite(e)),
    }
}

impl LeadStore for SqliteStorage {
    fn get_lead(&self, lead_id: LeadId) -> Result<Option<Lead>, StorageError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"),
                rusqlite::params![lead_id.as_bytes().as_slice()],
                LeadRow::read,
            )
            .optional()?;
        row.map(LeadRow::into_lead).transpose()
    }

    fn insert_lead(&mut self, lead: &Lead, entry: &HistoryEntry) -> Result<Lead, StorageError> {
        let tx = self.conn.transaction()?;
        insert_lead_row(&tx, lead)?;
        insert_history_row(&tx, entry)?;
        tx.commit()?;

        self.get_lead(lead.id)?
            .ok_or_else(|| StorageError::NotFound(lead.id.to_string()))
    }

    fn update_lead(
        &mut self,
        lead_id: LeadId,
        expected: Hlc,
        changes: &[(LeadField, FieldValue)],
        updated_at: Hlc,
        entry: Option<&HistoryEntry>,
    ) -> Result<Option<Lead>, StorageError> {
        let tx = self.conn.transaction()?;
        if update_lead_row(&tx, lead_id, expected, changes, updated_at)? == 0 {
            debug!(%lead_id, %expected, "update lost compare-and-swap");
            return Ok(None);
        }
        if let Some(entry) = entry {
            insert_history_row(&tx, entry)?;
        }
        tx.commit()?;
        self.get_lead(lead_id)
    }

    fn delete_lead(&mut self, lead_id: LeadId) -> Result<bool, StorageError> {
        let tx = self.conn.transaction()?;
        let history_removed = tx.execute(
            "DELETE FROM lead_history WHERE lead_id = ?1",
            rusqlite::params![lead_id.as_bytes().as_slice()],
        )?;
        let removed = tx.execute(
            "DELETE FROM leads WHERE id = ?1",
            rusqlite::params![lead_id.as_bytes().as_slice()],
        )?;
        tx.commit()?;
        debug!(%lead_id, removed, history_removed, "deleted lead");
        Ok(removed > 0)
    }

    fn list_leads(
        &self,
        filter: &LeadFilter,
        sort: &LeadSort,
        limit: Option<u32>,
        offset: u64,
    ) -> Result<Vec<Lead>, StorageError> {
        let (where_sql, mut params) = where_clause(filter);
        let sql = format!(
            "SELECT {LEAD_COLUMNS} FROM leads{where_sql}{} LIMIT ? OFFSET ?",
            order_clause(sort)
        );
        params.push(Value::Integer(limit.map(i64::from).unwrap_or(-1)));
        params.push(Value::Integer(offset as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), LeadRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(LeadRow::into_lead).collect()
    }

    fn count_leads(&self, filter: &LeadFilter) -> Result<u64, StorageError> {
        let (where_sql, params) = where_clause(filter);
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM leads{where_sql}"),
            params_from_iter(params),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn latest_stamp(&self) -> Result<Option<Hlc>, StorageError> {
        let latest: Option<Vec<u8>> = self.conn.query_row(
            "SELECT MAX(stamp) FROM (
                SELECT MAX(updated_at) AS stamp FROM leads
                UNION ALL
                SELECT MAX(changed_at) FROM lead_history
            )",
            [],
            |row| row.get(0),
        )?;
        latest
            .map(|bytes| to_array::<12>(bytes, "stamp").map(|b| Hlc::from_bytes(&b)))
            .transpose()
    }
}

impl HistoryStore for SqliteStorage {
    fn list_history(
        &self,
        lead_id: LeadId,
        limit: Option<u32>,
    ) -> Result<Vec<HistoryEntry>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HISTORY_COLUMNS} FROM lead_history WHERE lead_id = ?1 ORDER BY changed_at DESC, id DESC LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(
                rusqlite::params![
                    lead_id.as_bytes().as_slice(),
                    limit.map(i64::from).unwrap_or(-1)
                ],
                HistoryRow::read,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(HistoryRow::into_entry).collect()
    }
}
