use crate::aggregator::FilingSnapshot;
use crate::entities::{Address, Company, RecipientProfile};
use crate::generator::{FilingOutput, FilingRequest, FormKind};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

// ============================================================================
// SOURCE TRANSACTIONS
// ============================================================================

/// What kind of money movement a source row records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Contractor compensation payment
    Compensation,
    /// Dividend disbursement to an investor
    Dividend,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Compensation => "compensation",
            TransactionKind::Dividend => "dividend",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "compensation" => Some(TransactionKind::Compensation),
            "dividend" => Some(TransactionKind::Dividend),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Paid,
    Pending,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Paid => "paid",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "paid" => Some(TransactionStatus::Paid),
            "pending" => Some(TransactionStatus::Pending),
            "failed" => Some(TransactionStatus::Failed),
            "cancelled" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }
}

/// A paid (or not yet paid) financial event, owned by the payments side.
/// Read-only here. Amounts are integer cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTransaction {
    pub id: i64,
    pub company_id: i64,
    /// Profile that was current when the payment was recorded
    pub recipient_profile_id: i64,
    pub kind: TransactionKind,
    pub status: TransactionStatus,

    pub gross_amount_cents: i64,
    pub net_amount_cents: i64,
    pub withheld_amount_cents: i64,
    pub withholding_percentage: f64,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// None until the money actually moved
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl SourceTransaction {
    pub fn is_paid(&self) -> bool {
        self.status == TransactionStatus::Paid && self.paid_at.is_some()
    }
}

/// What a generated file contained, stored alongside each audit entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingSummary {
    /// SHA-256 of the file bytes
    pub digest: String,
    pub record_count: usize,
    /// Profiles the file reports, ascending
    pub payee_ids: Vec<i64>,
}

impl FilingSummary {
    pub fn of(output: &FilingOutput) -> Self {
        FilingSummary {
            digest: output.digest(),
            record_count: output.records().len(),
            payee_ids: output.payee_ids().to_vec(),
        }
    }
}

/// Audit entry: one generated file for a (company, year, form)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingEvent {
    pub event_id: String,
    pub recorded_at: DateTime<Utc>,
    pub request: FilingRequest,
    pub summary: FilingSummary,
}

impl FilingEvent {
    pub fn new(request: FilingRequest, summary: FilingSummary) -> Self {
        FilingEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            recorded_at: Utc::now(),
            request,
            summary,
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode so readers get a stable snapshot while payments commit
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS companies (
            id INTEGER PRIMARY KEY,
            legal_name TEXT NOT NULL,
            tax_id TEXT NOT NULL,
            street TEXT NOT NULL,
            city TEXT NOT NULL,
            state TEXT NOT NULL,
            postal_code TEXT NOT NULL,
            country_code TEXT NOT NULL,
            phone TEXT NOT NULL,
            email TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS recipient_profiles (
            id INTEGER PRIMARY KEY,
            recipient_id TEXT NOT NULL,
            legal_name TEXT NOT NULL,
            business_name TEXT,
            is_business INTEGER NOT NULL,
            tax_id TEXT,
            tax_info_confirmed INTEGER NOT NULL,
            street TEXT NOT NULL,
            city TEXT NOT NULL,
            state TEXT NOT NULL,
            postal_code TEXT NOT NULL,
            country_code TEXT NOT NULL,
            date_of_birth TEXT,
            residency_country_code TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS source_transactions (
            id INTEGER PRIMARY KEY,
            company_id INTEGER NOT NULL REFERENCES companies(id),
            recipient_profile_id INTEGER NOT NULL REFERENCES recipient_profiles(id),
            kind TEXT NOT NULL,
            status TEXT NOT NULL,
            gross_amount_cents INTEGER NOT NULL,
            net_amount_cents INTEGER NOT NULL,
            withheld_amount_cents INTEGER NOT NULL,
            withholding_percentage REAL NOT NULL,
            currency TEXT NOT NULL,
            paid_at TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // Filing audit trail, one row per generated file
    conn.execute(
        "CREATE TABLE IF NOT EXISTS filing_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            recorded_at TEXT NOT NULL,
            company_id INTEGER NOT NULL,
            tax_year INTEGER NOT NULL,
            form_kind TEXT NOT NULL,
            is_test INTEGER NOT NULL,
            digest TEXT NOT NULL,
            summary TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_source_company_kind
         ON source_transactions(company_id, kind)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_filing_events_key
         ON filing_events(company_id, tax_year, form_kind)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// WRITES
// ============================================================================

pub fn insert_company(conn: &Connection, company: &Company) -> Result<()> {
    conn.execute(
        "INSERT INTO companies (
            id, legal_name, tax_id, street, city, state, postal_code, country_code, phone, email
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            company.id,
            company.legal_name,
            company.tax_id,
            company.address.street,
            company.address.city,
            company.address.state,
            company.address.postal_code,
            company.address.country_code,
            company.phone,
            company.email,
        ],
    )
    .with_context(|| format!("Failed to insert company {}", company.id))?;

    Ok(())
}

pub fn insert_profile(conn: &Connection, profile: &RecipientProfile) -> Result<()> {
    conn.execute(
        "INSERT INTO recipient_profiles (
            id, recipient_id, legal_name, business_name, is_business, tax_id,
            tax_info_confirmed, street, city, state, postal_code, country_code,
            date_of_birth, residency_country_code
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            profile.id,
            profile.recipient_id,
            profile.legal_name,
            profile.business_name,
            profile.is_business,
            profile.tax_id,
            profile.tax_info_confirmed,
            profile.address.street,
            profile.address.city,
            profile.address.state,
            profile.address.postal_code,
            profile.address.country_code,
            profile.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
            profile.residency_country_code,
        ],
    )
    .with_context(|| format!("Failed to insert recipient profile {}", profile.id))?;

    Ok(())
}

pub fn insert_transaction(conn: &Connection, tx: &SourceTransaction) -> Result<()> {
    conn.execute(
        "INSERT INTO source_transactions (
            id, company_id, recipient_profile_id, kind, status,
            gross_amount_cents, net_amount_cents, withheld_amount_cents,
            withholding_percentage, currency, paid_at, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            tx.id,
            tx.company_id,
            tx.recipient_profile_id,
            tx.kind.as_str(),
            tx.status.as_str(),
            tx.gross_amount_cents,
            tx.net_amount_cents,
            tx.withheld_amount_cents,
            tx.withholding_percentage,
            tx.currency,
            tx.paid_at.map(|dt| dt.to_rfc3339()),
            tx.created_at.to_rfc3339(),
        ],
    )
    .with_context(|| format!("Failed to insert source transaction {}", tx.id))?;

    Ok(())
}

/// Insert every row inside one write transaction; all or nothing.
pub fn insert_all<T>(
    conn: &Connection,
    rows: &[T],
    insert: fn(&Connection, &T) -> Result<()>,
) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    for row in rows {
        insert(&tx, row)?;
    }
    tx.commit()?;

    Ok(rows.len())
}

// ============================================================================
// CSV IMPORT
// ============================================================================

#[derive(Debug, Deserialize)]
struct CompanyCsvRow {
    id: i64,
    legal_name: String,
    tax_id: String,
    street: String,
    city: String,
    state: String,
    postal_code: String,
    country_code: String,
    phone: String,
    email: String,
}

impl From<CompanyCsvRow> for Company {
    fn from(row: CompanyCsvRow) -> Self {
        Company {
            id: row.id,
            legal_name: row.legal_name,
            tax_id: row.tax_id,
            address: Address {
                street: row.street,
                city: row.city,
                state: row.state,
                postal_code: row.postal_code,
                country_code: row.country_code,
            },
            phone: row.phone,
            email: row.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProfileCsvRow {
    id: i64,
    recipient_id: String,
    legal_name: String,
    business_name: Option<String>,
    is_business: bool,
    tax_id: Option<String>,
    tax_info_confirmed: bool,
    street: String,
    city: String,
    state: String,
    postal_code: String,
    country_code: String,
    date_of_birth: Option<NaiveDate>,
    residency_country_code: String,
}

impl From<ProfileCsvRow> for RecipientProfile {
    fn from(row: ProfileCsvRow) -> Self {
        RecipientProfile {
            id: row.id,
            recipient_id: row.recipient_id,
            legal_name: row.legal_name,
            business_name: row.business_name.filter(|s| !s.is_empty()),
            is_business: row.is_business,
            tax_id: row.tax_id.filter(|s| !s.is_empty()),
            tax_info_confirmed: row.tax_info_confirmed,
            address: Address {
                street: row.street,
                city: row.city,
                state: row.state,
                postal_code: row.postal_code,
                country_code: row.country_code,
            },
            date_of_birth: row.date_of_birth,
            residency_country_code: row.residency_country_code,
        }
    }
}

pub fn load_companies_csv(csv_path: &Path) -> Result<Vec<Company>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open companies CSV")?;

    let mut companies = Vec::new();
    for result in rdr.deserialize() {
        let row: CompanyCsvRow = result.context("Failed to deserialize company")?;
        companies.push(row.into());
    }

    Ok(companies)
}

pub fn load_profiles_csv(csv_path: &Path) -> Result<Vec<RecipientProfile>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open profiles CSV")?;

    let mut profiles = Vec::new();
    for result in rdr.deserialize() {
        let row: ProfileCsvRow = result.context("Failed to deserialize recipient profile")?;
        profiles.push(row.into());
    }

    Ok(profiles)
}

pub fn load_transactions_csv(csv_path: &Path) -> Result<Vec<SourceTransaction>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open transactions CSV")?;

    let mut transactions = Vec::new();
    for result in rdr.deserialize() {
        let tx: SourceTransaction = result.context("Failed to deserialize source transaction")?;
        transactions.push(tx);
    }

    Ok(transactions)
}

// ============================================================================
// SNAPSHOT READ
// ============================================================================

/// Read everything one filing needs inside a single read transaction, so a
/// payment flipping to "paid" mid-read cannot leak into half the totals.
pub fn load_snapshot(
    conn: &Connection,
    company_id: i64,
    kind: TransactionKind,
) -> Result<FilingSnapshot> {
    let tx = conn.unchecked_transaction()?;

    let company = tx
        .query_row(
            "SELECT id, legal_name, tax_id, street, city, state, postal_code, country_code,
                    phone, email
             FROM companies
             WHERE id = ?1",
            params![company_id],
            company_from_row,
        )
        .with_context(|| format!("Company {} not found", company_id))?;

    let transactions = {
        let mut stmt = tx.prepare(
            "SELECT id, company_id, recipient_profile_id, kind, status,
                    gross_amount_cents, net_amount_cents, withheld_amount_cents,
                    withholding_percentage, currency, paid_at, created_at
             FROM source_transactions
             WHERE company_id = ?1 AND kind = ?2
             ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![company_id, kind.as_str()], transaction_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let profiles = {
        let mut stmt = tx.prepare(
            "SELECT id, recipient_id, legal_name, business_name, is_business, tax_id,
                    tax_info_confirmed, street, city, state, postal_code, country_code,
                    date_of_birth, residency_country_code
             FROM recipient_profiles
             WHERE id IN (
                SELECT DISTINCT recipient_profile_id
                FROM source_transactions
                WHERE company_id = ?1 AND kind = ?2
             )
             ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![company_id, kind.as_str()], profile_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    tx.commit()?;

    Ok(FilingSnapshot::new(company, profiles, transactions))
}

fn company_from_row(row: &Row<'_>) -> rusqlite::Result<Company> {
    Ok(Company {
        id: row.get(0)?,
        legal_name: row.get(1)?,
        tax_id: row.get(2)?,
        address: Address {
            street: row.get(3)?,
            city: row.get(4)?,
            state: row.get(5)?,
            postal_code: row.get(6)?,
            country_code: row.get(7)?,
        },
        phone: row.get(8)?,
        email: row.get(9)?,
    })
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<RecipientProfile> {
    let date_of_birth: Option<String> = row.get(12)?;
    let date_of_birth = match date_of_birth {
        Some(s) => Some(
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(12, Type::Text, Box::new(e)))?,
        ),
        None => None,
    };

    Ok(RecipientProfile {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        legal_name: row.get(2)?,
        business_name: row.get(3)?,
        is_business: row.get(4)?,
        tax_id: row.get(5)?,
        tax_info_confirmed: row.get(6)?,
        address: Address {
            street: row.get(7)?,
            city: row.get(8)?,
            state: row.get(9)?,
            postal_code: row.get(10)?,
            country_code: row.get(11)?,
        },
        date_of_birth,
        residency_country_code: row.get(13)?,
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<SourceTransaction> {
    let kind: String = row.get(3)?;
    let status: String = row.get(4)?;
    let paid_at: Option<String> = row.get(10)?;
    let created_at: String = row.get(11)?;

    Ok(SourceTransaction {
        id: row.get(0)?,
        company_id: row.get(1)?,
        recipient_profile_id: row.get(2)?,
        kind: TransactionKind::parse(&kind).ok_or_else(|| unknown_value(3, "kind", &kind))?,
        status: TransactionStatus::parse(&status)
            .ok_or_else(|| unknown_value(4, "status", &status))?,
        gross_amount_cents: row.get(5)?,
        net_amount_cents: row.get(6)?,
        withheld_amount_cents: row.get(7)?,
        withholding_percentage: row.get(8)?,
        currency: row.get(9)?,
        paid_at: paid_at.map(|s| parse_timestamp(10, &s)).transpose()?,
        created_at: parse_timestamp(11, &created_at)?,
    })
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn unknown_value(column: usize, name: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Text,
        format!("unknown {} {:?}", name, value).into(),
    )
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

pub fn insert_filing_event(conn: &Connection, event: &FilingEvent) -> Result<()> {
    let summary_json = serde_json::to_string(&event.summary)?;

    conn.execute(
        "INSERT INTO filing_events (
            event_id, recorded_at, company_id, tax_year, form_kind, is_test, digest, summary
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            event.event_id,
            event.recorded_at.to_rfc3339(),
            event.request.company_id,
            event.request.tax_year,
            event.request.form_kind.code(),
            event.request.is_test,
            event.summary.digest,
            summary_json,
        ],
    )
    .with_context(|| format!("Failed to insert filing event {}", event.event_id))?;

    Ok(())
}

/// Files generated for one (company, year, form), oldest first
pub fn filing_history(
    conn: &Connection,
    company_id: i64,
    tax_year: i32,
    form_kind: FormKind,
) -> Result<Vec<FilingEvent>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, recorded_at, is_test, summary
         FROM filing_events
         WHERE company_id = ?1 AND tax_year = ?2 AND form_kind = ?3
         ORDER BY id",
    )?;

    let events = stmt
        .query_map(params![company_id, tax_year, form_kind.code()], |row| {
            let recorded_at: String = row.get(1)?;
            let is_test: bool = row.get(2)?;
            let summary_json: String = row.get(3)?;

            Ok(FilingEvent {
                event_id: row.get(0)?,
                recorded_at: parse_timestamp(1, &recorded_at)?,
                request: FilingRequest::new(company_id, tax_year, form_kind).test_file(is_test),
                summary: serde_json::from_str(&summary_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e))
                })?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

/// Profiles already reported in a live (non-test) file for this filing key
pub fn reported_payee_ids(
    conn: &Connection,
    company_id: i64,
    tax_year: i32,
    form_kind: FormKind,
) -> Result<BTreeSet<i64>> {
    Ok(filing_history(conn, company_id, tax_year, form_kind)?
        .into_iter()
        .filter(|event| !event.request.is_test)
        .flat_map(|event| event.summary.payee_ids)
        .collect())
}

/// Record that a file was produced. Called once the file is written,
/// never from generation itself.
pub fn record_filing_event(
    conn: &Connection,
    request: &FilingRequest,
    output: &FilingOutput,
) -> Result<FilingEvent> {
    let event = FilingEvent::new(*request, FilingSummary::of(output));

    insert_filing_event(conn, &event).context("Failed to record filing event")?;

    tracing::info!(
        company_id = request.company_id,
        tax_year = request.tax_year,
        form = request.form_kind.code(),
        event_id = %event.event_id,
        "filing event recorded"
    );

    Ok(event)
}

// ============================================================================
// TESTS
// ============================================================================
