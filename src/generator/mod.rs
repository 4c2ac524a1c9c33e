// 🗂️ Form Generators - Payees → fixed-width filing file
//
// One trait, one implementation per form family. The orchestration
// (aggregate → transmitter → issuer → payees → control → end) lives in
// `generate_filing` so every form sequences and totals the same way.
//
// Adding a form family = implement FormGenerator + supply its schema tables.

pub mod nec;
pub mod withholding;

pub use nec::NecGenerator;
pub use withholding::WithholdingGenerator;

use crate::aggregator::{
    ControlTotals, EligibilityCriteria, FilingSnapshot, PayeeAggregate, PayeeAggregator,
};
use crate::config::FilerConfig;
use crate::db::{self, TransactionKind};
use crate::error::{FilingError, FilingResult};
use crate::record::{BoundValues, RecordComposer, RecordSchema, RenderedRecord};
use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::Path;

/// Marker rendered in the transmitter record of a test file
pub const TEST_FILE_MARKER: &str = "TEST";

/// Records in a file are separated by CR LF
pub const RECORD_TERMINATOR: &str = "\r\n";

// ============================================================================
// REQUEST
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormKind {
    /// Non-employee compensation paid to domestic contractors
    Nec,
    /// Withholding on dividends paid to foreign investors
    Withholding,
}

impl FormKind {
    pub fn code(&self) -> &'static str {
        match self {
            FormKind::Nec => "NEC",
            FormKind::Withholding => "WITHHOLDING",
        }
    }

    pub fn transaction_kind(&self) -> TransactionKind {
        match self {
            FormKind::Nec => TransactionKind::Compensation,
            FormKind::Withholding => TransactionKind::Dividend,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "nec" => Some(FormKind::Nec),
            "withholding" => Some(FormKind::Withholding),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRequest {
    pub company_id: i64,
    pub tax_year: i32,
    pub is_test: bool,
    pub form_kind: FormKind,
}

impl FilingRequest {
    pub fn new(company_id: i64, tax_year: i32, form_kind: FormKind) -> Self {
        FilingRequest {
            company_id,
            tax_year,
            is_test: false,
            form_kind,
        }
    }

    pub fn test_file(mut self, is_test: bool) -> Self {
        self.is_test = is_test;
        self
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

/// Ordered records of one filing file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingOutput {
    pub form_kind: FormKind,
    records: Vec<RenderedRecord>,
    payee_ids: Vec<i64>,
}

impl FilingOutput {
    pub fn records(&self) -> &[RenderedRecord] {
        &self.records
    }

    /// Profiles reported in this file, ascending
    pub fn payee_ids(&self) -> &[i64] {
        &self.payee_ids
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for record in &self.records {
            out.extend_from_slice(record.as_str().as_bytes());
            out.extend_from_slice(RECORD_TERMINATOR.as_bytes());
        }
        out
    }

    /// SHA-256 of the file bytes (hex)
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_bytes())
    }
}

// ============================================================================
// FORM GENERATOR TRAIT
// ============================================================================

/// Record layouts for one form family
#[derive(Debug, Clone, Copy)]
pub struct FormSchemas {
    pub transmitter: RecordSchema,
    pub issuer: RecordSchema,
    pub payee: RecordSchema,
    pub control: RecordSchema,
    pub end: RecordSchema,
}

impl FormSchemas {
    pub fn all(&self) -> [&RecordSchema; 5] {
        [
            &self.transmitter,
            &self.issuer,
            &self.payee,
            &self.control,
            &self.end,
        ]
    }
}

pub trait FormGenerator: Send + Sync {
    fn request(&self) -> &FilingRequest;

    fn config(&self) -> &FilerConfig;

    fn snapshot(&self) -> &FilingSnapshot;

    fn schemas(&self) -> &'static FormSchemas;

    /// Who may appear on this form
    fn criteria(&self) -> EligibilityCriteria;

    /// Cents → the unit this form's amount slots carry
    fn amount_units(&self) -> fn(i64) -> i64;

    /// Form-family code rendered into the file
    fn type_of_return(&self) -> &'static str;

    /// Which monetary boxes are populated, padded to the mandated width
    fn amount_codes(&self) -> String;

    fn transmitter_values(&self, totals: &ControlTotals) -> FilingResult<BoundValues>;

    fn issuer_values(&self, totals: &ControlTotals) -> FilingResult<BoundValues>;

    fn payee_values(&self, payee: &PayeeAggregate) -> FilingResult<BoundValues>;

    /// Render the whole file, or None when no payee qualifies
    fn process(&self) -> FilingResult<Option<FilingOutput>> {
        generate_filing(self)
    }

    /// Profiles the file would report, without rendering anything
    fn payee_ids(&self) -> FilingResult<BTreeSet<i64>> {
        Ok(eligible_payees(self)?
            .iter()
            .map(PayeeAggregate::profile_id)
            .collect())
    }
}

// ============================================================================
// SHARED ORCHESTRATION
// ============================================================================

/// Payees for the request, refusing a snapshot loaded for another company
pub fn eligible_payees<G: FormGenerator + ?Sized>(generator: &G) -> FilingResult<Vec<PayeeAggregate>> {
    let request = generator.request();
    let snapshot = generator.snapshot();

    if request.company_id != snapshot.company.id {
        return Err(FilingError::CompanyMismatch {
            requested: request.company_id,
            loaded: snapshot.company.id,
        });
    }

    PayeeAggregator::new(snapshot).aggregate(&generator.criteria(), request.tax_year)
}

/// Aggregate, then render T / issuer / payee* / control / end in order.
///
/// All or nothing: any encoding failure discards the whole file.
pub fn generate_filing<G: FormGenerator + ?Sized>(
    generator: &G,
) -> FilingResult<Option<FilingOutput>> {
    let request = generator.request();
    let payees = eligible_payees(generator)?;

    if payees.is_empty() {
        tracing::warn!(
            company_id = request.company_id,
            tax_year = request.tax_year,
            form = request.form_kind.code(),
            "no eligible payees, nothing to file"
        );
        return Ok(None);
    }

    let schemas = generator.schemas();
    let totals = ControlTotals::from_payees(&payees, generator.amount_units());
    let mut composer = RecordComposer::new();
    let mut records = Vec::with_capacity(payees.len() + 4);

    let mut transmitter = generator.transmitter_values(&totals)?;
    if request.is_test {
        transmitter = transmitter.text("test_file_indicator", TEST_FILE_MARKER);
    }
    records.push(composer.render(&schemas.transmitter, &transmitter)?);

    records.push(composer.render(&schemas.issuer, &generator.issuer_values(&totals)?)?);

    for payee in &payees {
        records.push(composer.render(&schemas.payee, &generator.payee_values(payee)?)?);
    }

    records.push(composer.render(&schemas.control, &control_values(&totals))?);
    records.push(composer.render(&schemas.end, &end_values(&totals))?);

    let output = FilingOutput {
        form_kind: request.form_kind,
        records,
        payee_ids: payees.iter().map(PayeeAggregate::profile_id).collect(),
    };

    tracing::info!(
        company_id = request.company_id,
        tax_year = request.tax_year,
        form = request.form_kind.code(),
        payees = totals.payee_count,
        records = output.records().len(),
        is_test = request.is_test,
        "filing generated"
    );

    Ok(Some(output))
}

fn control_values(totals: &ControlTotals) -> BoundValues {
    BoundValues::new()
        .number("payee_count", totals.payee_count as i64)
        .number("gross_total", totals.gross_total)
        .number("withheld_total", totals.withheld_total)
}

fn end_values(totals: &ControlTotals) -> BoundValues {
    BoundValues::new()
        .number("issuer_count", 1)
        .number("payee_count", totals.payee_count as i64)
}

/// Values every transmitter record binds from config
pub(crate) fn transmitter_base<G: FormGenerator + ?Sized>(generator: &G) -> BoundValues {
    let request = generator.request();
    let t = &generator.config().transmitter;
    BoundValues::new()
        .number("tax_year", request.tax_year as i64)
        .text("transmitter_tin", digits(&t.tin))
        .text("transmitter_control_code", t.control_code.clone())
        .text("transmitter_name", t.name.clone())
        .text("transmitter_street", t.address.street.clone())
        .text("transmitter_city", t.address.city.clone())
        .text("transmitter_state", t.address.state.clone())
        .text("transmitter_postal_code", t.address.postal_digits())
        .text("contact_name", t.contact_name.clone())
        .text("contact_phone", digits(&t.contact_phone))
        .text("contact_email", t.contact_email.clone())
}

pub(crate) fn digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Left-justify a code string to its slot width
pub(crate) fn pad_code(code: &str, width: usize) -> String {
    format!("{:<width$}", code, width = width)
}

// ============================================================================
// FACTORY
// ============================================================================

pub fn generator_for(
    config: FilerConfig,
    request: FilingRequest,
    snapshot: FilingSnapshot,
) -> Box<dyn FormGenerator> {
    match request.form_kind {
        FormKind::Nec => Box::new(NecGenerator::new(config, request, snapshot)),
        FormKind::Withholding => Box::new(WithholdingGenerator::new(config, request, snapshot)),
    }
}

/// Read a consistent snapshot for the request and build its generator
pub fn load_generator(
    conn: &Connection,
    config: FilerConfig,
    request: FilingRequest,
) -> Result<Box<dyn FormGenerator>> {
    let snapshot = db::load_snapshot(
        conn,
        request.company_id,
        request.form_kind.transaction_kind(),
    )?;
    Ok(generator_for(config, request, snapshot))
}

// ============================================================================
// TESTS
// ============================================================================
