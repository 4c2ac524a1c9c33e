// 🌍 Foreign Withholding Generator
//
// Dividends paid to non-resident investors. 1020-byte records; every
// amount slot carries whole dollars, so control totals are summed after
// rounding each recipient.

use super::{digits, pad_code, transmitter_base, FilingRequest, FormGenerator, FormSchemas};
use crate::aggregator::{ControlTotals, EligibilityCriteria, FilingSnapshot, PayeeAggregate, Residency};
use crate::codec;
use crate::config::FilerConfig;
use crate::db::TransactionKind;
use crate::error::FilingResult;
use crate::record::{BoundValues, FieldSpec, RecordSchema, RecordType};

pub const RECORD_WIDTH: usize = 1020;
/// Income code for dividends paid by domestic corporations
pub const INCOME_CODE: &str = "06";
pub const AMOUNT_CODES: &str = "12";
pub const AMOUNT_CODES_WIDTH: usize = 16;

const TRANSMITTER_FIELDS: &[FieldSpec] = &[
    FieldSpec::literal("record_type", "T", 1),
    FieldSpec::numeric("tax_year", 4),
    FieldSpec::text("transmitter_tin", 9),
    FieldSpec::text("transmitter_name", 40),
    FieldSpec::text("transmitter_street", 40),
    FieldSpec::text("transmitter_city", 40),
    FieldSpec::text("transmitter_state", 2),
    FieldSpec::text("transmitter_country", 2),
    FieldSpec::text("transmitter_postal_code", 9),
    FieldSpec::text("contact_name", 40),
    FieldSpec::text("contact_phone", 20),
    FieldSpec::verbatim("contact_email", 35),
    FieldSpec::text("transmitter_control_code", 5),
    FieldSpec::optional_text("test_file_indicator", 4),
    FieldSpec::numeric("payee_count", 8),
    FieldSpec::blank("reserved", 753),
];

const AGENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::literal("record_type", "W", 1),
    FieldSpec::literal("return_type_indicator", "0", 1),
    FieldSpec::blank("pro_rata_indicator", 1),
    FieldSpec::text("agent_tin", 9),
    FieldSpec::numeric("agent_tin_type", 1),
    FieldSpec::text("agent_name", 40),
    FieldSpec::blank("agent_name_2", 40),
    FieldSpec::text("agent_street", 40),
    FieldSpec::text("agent_city", 40),
    FieldSpec::text("agent_state", 2),
    FieldSpec::text("agent_country", 2),
    FieldSpec::text("agent_postal_code", 9),
    FieldSpec::text("agent_phone", 20),
    FieldSpec::literal("chapter_indicator", "3", 1),
    FieldSpec::text("amount_codes", 16),
    FieldSpec::blank("reserved", 789),
];

const RECIPIENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::literal("record_type", "Q", 1),
    FieldSpec::literal("return_type_indicator", "0", 1),
    FieldSpec::blank("pro_rata_indicator", 1),
    FieldSpec::text("income_code", 2),
    FieldSpec::whole_units("gross_income", 12),
    FieldSpec::zeros("withholding_allowance", 12),
    FieldSpec::whole_units("net_income", 12),
    FieldSpec::numeric("tax_rate", 4),
    FieldSpec::blank("exemption_code", 2),
    FieldSpec::whole_units("federal_tax_withheld", 12),
    FieldSpec::blank("reserved_1", 12),
    FieldSpec::text("recipient_name", 40),
    FieldSpec::optional_text("recipient_name_2", 40),
    FieldSpec::text("recipient_street", 40),
    FieldSpec::text("recipient_city", 40),
    FieldSpec::optional_text("recipient_province", 2),
    FieldSpec::text("recipient_country", 2),
    FieldSpec::optional_text("recipient_postal_code", 9),
    FieldSpec::optional_text("recipient_tin", 20),
    FieldSpec::optional_text("date_of_birth", 8),
    FieldSpec::text("account_number", 20),
    FieldSpec::blank("chapter_3_status", 2),
    FieldSpec::blank("reserved_2", 718),
];

const CONTROL_FIELDS: &[FieldSpec] = &[
    FieldSpec::literal("record_type", "C", 1),
    FieldSpec::numeric("payee_count", 8),
    FieldSpec::blank("reserved_1", 3),
    FieldSpec::numeric("gross_total", 15),
    FieldSpec::numeric("withheld_total", 15),
    FieldSpec::blank("reserved_2", 970),
];

const END_FIELDS: &[FieldSpec] = &[
    FieldSpec::literal("record_type", "F", 1),
    FieldSpec::numeric("issuer_count", 3),
    FieldSpec::numeric("payee_count", 8),
    FieldSpec::blank("reserved", 1000),
];

pub static WITHHOLDING_SCHEMAS: FormSchemas = FormSchemas {
    transmitter: RecordSchema {
        record_type: RecordType::Transmitter,
        width: RECORD_WIDTH,
        fields: TRANSMITTER_FIELDS,
    },
    issuer: RecordSchema {
        record_type: RecordType::Issuer,
        width: RECORD_WIDTH,
        fields: AGENT_FIELDS,
    },
    payee: RecordSchema {
        record_type: RecordType::Payee,
        width: RECORD_WIDTH,
        fields: RECIPIENT_FIELDS,
    },
    control: RecordSchema {
        record_type: RecordType::ControlTotals,
        width: RECORD_WIDTH,
        fields: CONTROL_FIELDS,
    },
    end: RecordSchema {
        record_type: RecordType::EndOfTransmission,
        width: RECORD_WIDTH,
        fields: END_FIELDS,
    },
};

pub struct WithholdingGenerator {
    config: FilerConfig,
    request: FilingRequest,
    snapshot: FilingSnapshot,
}

impl WithholdingGenerator {
    pub fn new(config: FilerConfig, request: FilingRequest, snapshot: FilingSnapshot) -> Self {
        WithholdingGenerator {
            config,
            request,
            snapshot,
        }
    }
}

impl FormGenerator for WithholdingGenerator {
    fn request(&self) -> &FilingRequest {
        &self.request
    }

    fn config(&self) -> &FilerConfig {
        &self.config
    }

    fn snapshot(&self) -> &FilingSnapshot {
        &self.snapshot
    }

    fn schemas(&self) -> &'static FormSchemas {
        &WITHHOLDING_SCHEMAS
    }

    fn criteria(&self) -> EligibilityCriteria {
        EligibilityCriteria {
            kind: TransactionKind::Dividend,
            residency: Residency::Foreign(self.config().filing_country_code.clone()),
            minimum_gross_cents: self.config().thresholds.withholding_minimum_cents,
        }
    }

    fn amount_units(&self) -> fn(i64) -> i64 {
        codec::money_to_whole_units
    }

    fn type_of_return(&self) -> &'static str {
        INCOME_CODE
    }

    fn amount_codes(&self) -> String {
        pad_code(AMOUNT_CODES, AMOUNT_CODES_WIDTH)
    }

    fn transmitter_values(&self, totals: &ControlTotals) -> FilingResult<BoundValues> {
        Ok(transmitter_base(self)
            .text("transmitter_country", self.config().transmitter.address.country_code.clone())
            .number("payee_count", totals.payee_count as i64))
    }

    fn issuer_values(&self, _totals: &ControlTotals) -> FilingResult<BoundValues> {
        let company = &self.snapshot.company;

        Ok(BoundValues::new()
            .text("agent_tin", company.tax_id_digits())
            .number("agent_tin_type", 1)
            .text("agent_name", company.legal_name.clone())
            .text("agent_street", company.address.street.clone())
            .text("agent_city", company.address.city.clone())
            .text("agent_state", company.address.state.clone())
            .text("agent_country", company.address.country_code.clone())
            .text("agent_postal_code", company.address.postal_digits())
            .text("agent_phone", digits(&company.phone))
            .text("amount_codes", self.amount_codes()))
    }

    fn payee_values(&self, payee: &PayeeAggregate) -> FilingResult<BoundValues> {
        let profile = &payee.profile;
        let address = &profile.address;
        let non_empty = |value: &str| Some(value.to_string()).filter(|v| !v.trim().is_empty());

        Ok(BoundValues::new()
            .text("income_code", self.type_of_return())
            .money("gross_income", payee.gross_total_cents)
            .money("net_income", payee.net_total_cents)
            .number(
                "tax_rate",
                codec::percentage_to_hundredths(payee.max_withholding_percentage),
            )
            .money("federal_tax_withheld", payee.withheld_total_cents)
            .text("recipient_name", profile.display_name())
            .maybe_text(
                "recipient_name_2",
                Some(profile.legal_name.clone()).filter(|_| profile.is_business),
            )
            .text("recipient_street", address.street.clone())
            .text("recipient_city", address.city.clone())
            .maybe_text("recipient_province", non_empty(&address.state))
            .text("recipient_country", profile.residency_country_code.to_ascii_uppercase())
            .maybe_text("recipient_postal_code", non_empty(&address.postal_code))
            .maybe_text("recipient_tin", profile.tax_id_digits())
            .maybe_text(
                "date_of_birth",
                profile.date_of_birth.map(|dob| dob.format("%Y%m%d").to_string()),
            )
            .text("account_number", profile.id.to_string()))
    }
}
