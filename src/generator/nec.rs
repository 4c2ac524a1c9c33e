// 💼 Non-Employee Compensation Generator
//
// Domestic contractors with confirmed tax details and at least the statutory
// minimum paid during the year. 750-byte records, amounts in cents.

use super::{pad_code, transmitter_base, FormGenerator, FormSchemas};
use crate::aggregator::{ControlTotals, EligibilityCriteria, FilingSnapshot, PayeeAggregate, Residency};
use crate::config::FilerConfig;
use crate::db::TransactionKind;
use crate::error::FilingResult;
use crate::generator::{digits, FilingRequest};
use crate::record::{BoundValues, FieldSpec, RecordSchema, RecordType};

pub const RECORD_WIDTH: usize = 750;
pub const TYPE_OF_RETURN: &str = "NE";
/// Box 1 (nonemployee compensation) and box 4 (federal tax withheld)
pub const AMOUNT_CODES: &str = "14";
pub const AMOUNT_CODES_WIDTH: usize = 18;

// ============================================================================
// RECORD LAYOUTS
// ============================================================================

const TRANSMITTER_FIELDS: &[FieldSpec] = &[
    FieldSpec::literal("record_type", "T", 1),
    FieldSpec::numeric("tax_year", 4),
    FieldSpec::blank("prior_year_indicator", 1),
    FieldSpec::text("transmitter_tin", 9),
    FieldSpec::text("transmitter_control_code", 5),
    FieldSpec::blank("reserved_1", 7),
    FieldSpec::optional_text("test_file_indicator", 4),
    FieldSpec::blank("foreign_entity_indicator", 1),
    FieldSpec::text("transmitter_name", 80),
    FieldSpec::text("company_name", 80),
    FieldSpec::text("transmitter_street", 40),
    FieldSpec::text("transmitter_city", 40),
    FieldSpec::text("transmitter_state", 2),
    FieldSpec::text("transmitter_postal_code", 9),
    FieldSpec::blank("reserved_2", 15),
    FieldSpec::numeric("payee_count", 8),
    FieldSpec::text("contact_name", 40),
    FieldSpec::text("contact_phone", 15),
    FieldSpec::verbatim("contact_email", 50),
    FieldSpec::blank("reserved_3", 91),
    FieldSpec::literal("vendor_indicator", "I", 1),
    FieldSpec::blank("reserved_4", 239),
];

const ISSUER_FIELDS: &[FieldSpec] = &[
    FieldSpec::literal("record_type", "A", 1),
    FieldSpec::numeric("tax_year", 4),
    FieldSpec::blank("combined_federal_state", 1),
    FieldSpec::blank("reserved_1", 5),
    FieldSpec::text("payer_tin", 9),
    FieldSpec::text("payer_name_control", 4),
    FieldSpec::blank("last_filing_indicator", 1),
    FieldSpec::text("type_of_return", 2),
    FieldSpec::text("amount_codes", 18),
    FieldSpec::blank("reserved_2", 6),
    FieldSpec::blank("foreign_entity_indicator", 1),
    FieldSpec::text("payer_name", 80),
    FieldSpec::literal("transfer_agent_indicator", "0", 1),
    FieldSpec::text("payer_street", 40),
    FieldSpec::text("payer_city", 40),
    FieldSpec::text("payer_state", 2),
    FieldSpec::text("payer_postal_code", 9),
    FieldSpec::text("payer_phone", 15),
    FieldSpec::blank("reserved_3", 503),
];

const PAYEE_FIELDS: &[FieldSpec] = &[
    FieldSpec::literal("record_type", "B", 1),
    FieldSpec::numeric("tax_year", 4),
    FieldSpec::blank("corrected_return_indicator", 1),
    FieldSpec::text("name_control", 4),
    FieldSpec::numeric("tin_type", 1),
    FieldSpec::text("payee_tin", 9),
    FieldSpec::text("account_number", 20),
    FieldSpec::blank("office_code", 4),
    FieldSpec::blank("reserved_1", 10),
    FieldSpec::cents("nonemployee_compensation", 12),
    FieldSpec::zeros("payment_amounts_2_3", 24),
    FieldSpec::cents("federal_tax_withheld", 12),
    FieldSpec::zeros("payment_amounts_5_h", 168),
    FieldSpec::blank("foreign_country_indicator", 1),
    FieldSpec::text("payee_name", 40),
    FieldSpec::optional_text("payee_name_2", 40),
    FieldSpec::blank("reserved_2", 40),
    FieldSpec::text("payee_street", 40),
    FieldSpec::blank("reserved_3", 40),
    FieldSpec::text("payee_city", 40),
    FieldSpec::text("payee_state", 2),
    FieldSpec::text("payee_postal_code", 9),
    FieldSpec::blank("reserved_4", 220),
];

const CONTROL_FIELDS: &[FieldSpec] = &[
    FieldSpec::literal("record_type", "C", 1),
    FieldSpec::numeric("payee_count", 8),
    FieldSpec::blank("reserved_1", 6),
    FieldSpec::numeric("gross_total", 18),
    FieldSpec::zeros("control_totals_2_3", 36),
    FieldSpec::numeric("withheld_total", 18),
    FieldSpec::zeros("control_totals_5_h", 252),
    FieldSpec::blank("reserved_2", 403),
];

const END_FIELDS: &[FieldSpec] = &[
    FieldSpec::literal("record_type", "F", 1),
    FieldSpec::numeric("issuer_count", 8),
    FieldSpec::zeros("reserved_zeros", 21),
    FieldSpec::blank("reserved_1", 19),
    FieldSpec::numeric("payee_count", 8),
    FieldSpec::blank("reserved_2", 685),
];

pub static NEC_SCHEMAS: FormSchemas = FormSchemas {
    transmitter: RecordSchema {
        record_type: RecordType::Transmitter,
        width: RECORD_WIDTH,
        fields: TRANSMITTER_FIELDS,
    },
    issuer: RecordSchema {
        record_type: RecordType::Issuer,
        width: RECORD_WIDTH,
        fields: ISSUER_FIELDS,
    },
    payee: RecordSchema {
        record_type: RecordType::Payee,
        width: RECORD_WIDTH,
        fields: PAYEE_FIELDS,
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

// ============================================================================
// GENERATOR
// ============================================================================

pub struct NecGenerator {
    config: FilerConfig,
    request: FilingRequest,
    snapshot: FilingSnapshot,
}

impl NecGenerator {
    pub fn new(config: FilerConfig, request: FilingRequest, snapshot: FilingSnapshot) -> Self {
        NecGenerator {
            config,
            request,
            snapshot,
        }
    }
}

/// Amounts stay in cents
fn cents(value: i64) -> i64 {
    value
}

impl FormGenerator for NecGenerator {
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
        &NEC_SCHEMAS
    }

    fn criteria(&self) -> EligibilityCriteria {
        EligibilityCriteria {
            kind: TransactionKind::Compensation,
            residency: Residency::Domestic(self.config().filing_country_code.clone()),
            minimum_gross_cents: self.config().thresholds.nec_minimum_cents,
        }
    }

    fn amount_units(&self) -> fn(i64) -> i64 {
        cents
    }

    fn type_of_return(&self) -> &'static str {
        TYPE_OF_RETURN
    }

    fn amount_codes(&self) -> String {
        pad_code(AMOUNT_CODES, AMOUNT_CODES_WIDTH)
    }

    fn transmitter_values(&self, totals: &ControlTotals) -> FilingResult<BoundValues> {
        Ok(transmitter_base(self)
            .text("company_name", self.config().transmitter.name.clone())
            .number("payee_count", totals.payee_count as i64))
    }

    fn issuer_values(&self, _totals: &ControlTotals) -> FilingResult<BoundValues> {
        let company = &self.snapshot.company;

        Ok(BoundValues::new()
            .number("tax_year", self.request.tax_year as i64)
            .text("payer_tin", company.tax_id_digits())
            .text("payer_name_control", company.name_control())
            .text("type_of_return", self.type_of_return())
            .text("amount_codes", self.amount_codes())
            .text("payer_name", company.legal_name.clone())
            .text("payer_street", company.address.street.clone())
            .text("payer_city", company.address.city.clone())
            .text("payer_state", company.address.state.clone())
            .text("payer_postal_code", company.address.postal_digits())
            .text("payer_phone", digits(&company.phone)))
    }

    fn payee_values(&self, payee: &PayeeAggregate) -> FilingResult<BoundValues> {
        let profile = &payee.profile;
        // Business filers print the legal owner on the second name line
        let second_name = if profile.is_business && profile.display_name() != profile.legal_name {
            Some(profile.legal_name.clone())
        } else {
            None
        };

        Ok(BoundValues::new()
            .number("tax_year", self.request.tax_year as i64)
            .text("name_control", profile.name_control())
            .number("tin_type", profile.tin_type())
            .maybe_text("payee_tin", profile.tax_id_digits())
            .text("account_number", profile.id.to_string())
            .money("nonemployee_compensation", payee.gross_total_cents)
            .money("federal_tax_withheld", payee.withheld_total_cents)
            .text("payee_name", profile.display_name())
            .maybe_text("payee_name_2", second_name)
            .text("payee_street", profile.address.street.clone())
            .text("payee_city", profile.address.city.clone())
            .text("payee_state", profile.address.state.clone())
            .text("payee_postal_code", profile.address.postal_digits()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilingError;
    use crate::generator::tests::{assert_contiguous_sequence, company, config, payment, profile};
    use crate::generator::{FilingOutput, FormKind};
    use crate::record::RenderedRecord;
    use chrono::{TimeZone, Utc};

    const COMP: TransactionKind = TransactionKind::Compensation;

    fn generator(profiles: Vec<crate::entities::RecipientProfile>, txs: Vec<crate::db::SourceTransaction>) -> NecGenerator {
        NecGenerator::new(
            config(),
            FilingRequest::new(7, 2024, FormKind::Nec),
            FilingSnapshot::new(company(), profiles, txs),
        )
    }

    fn payee_records(output: &FilingOutput) -> Vec<&RenderedRecord> {
        output
            .records()
            .iter()
            .filter(|r| r.record_type == RecordType::Payee)
            .collect()
    }

    fn field_number(record: &RenderedRecord, key: &str) -> i64 {
        record.field(key).unwrap().parse().unwrap()
    }

    fn two_contractors() -> NecGenerator {
        generator(
            vec![profile(1, "u1", "US"), profile(2, "u2", "US")],
            vec![
                payment(1, 1, COMP, 40_000, 0, (2024, 2, 1)),
                payment(2, 1, COMP, 35_050, 1_000, (2024, 9, 1)),
                payment(3, 2, COMP, 120_000, 24_000, (2024, 5, 5)),
            ],
        )
    }

    #[test]
    fn test_schemas_match_record_width() {
        for schema in NEC_SCHEMAS.all() {
            assert!(schema.is_consistent(), "{:?} is {} wide", schema.record_type, schema.field_width_sum());
        }
    }

    #[test]
    fn test_record_layout_and_widths() {
        let output = two_contractors().process().unwrap().unwrap();

        let kinds: Vec<RecordType> = output.records().iter().map(|r| r.record_type).collect();
        assert_eq!(
            kinds,
            vec![
                RecordType::Transmitter,
                RecordType::Issuer,
                RecordType::Payee,
                RecordType::Payee,
                RecordType::ControlTotals,
                RecordType::EndOfTransmission,
            ]
        );

        for record in output.records() {
            assert_eq!(record.len(), RECORD_WIDTH);
        }
        assert_contiguous_sequence(&output);
    }

    #[test]
    fn test_payee_record_fields() {
        let output = two_contractors().process().unwrap().unwrap();
        let payees = payee_records(&output);

        assert_eq!(payees[0].field("payee_name").unwrap().trim_end(), "JOSE ALVAREZ");
        assert_eq!(payees[0].field("name_control"), Some("ALVA"));
        assert_eq!(payees[0].field("payee_tin"), Some("123456789"));
        assert_eq!(payees[0].field("nonemployee_compensation"), Some("000000075050"));
        assert_eq!(payees[0].field("federal_tax_withheld"), Some("000000001000"));
        assert_eq!(payees[0].field("payee_postal_code"), Some("62701    "));
    }

    #[test]
    fn test_issuer_record_carries_form_codes() {
        let output = two_contractors().process().unwrap().unwrap();
        let issuer = &output.records()[1];

        assert_eq!(issuer.field("type_of_return"), Some("NE"));
        assert_eq!(issuer.field("amount_codes").unwrap().trim_end(), "14");
        assert_eq!(issuer.field("payer_tin"), Some("123456789"));
        assert_eq!(issuer.field("payer_name_control"), Some("ACME"));
        assert!(issuer.as_str().starts_with("A2024"));
    }

    #[test]
    fn test_control_totals_reconcile() {
        let output = two_contractors().process().unwrap().unwrap();
        let payees = payee_records(&output);
        let control = output
            .records()
            .iter()
            .find(|r| r.record_type == RecordType::ControlTotals)
            .unwrap();

        let gross: i64 = payees.iter().map(|r| field_number(r, "nonemployee_compensation")).sum();
        let withheld: i64 = payees.iter().map(|r| field_number(r, "federal_tax_withheld")).sum();

        assert_eq!(field_number(control, "payee_count"), payees.len() as i64);
        assert_eq!(field_number(control, "gross_total"), gross);
        assert_eq!(field_number(control, "withheld_total"), withheld);
        assert_eq!(gross, 195_050);
    }

    #[test]
    fn test_threshold_boundary() {
        let g = generator(
            vec![profile(1, "u1", "US"), profile(2, "u2", "US")],
            vec![
                payment(1, 1, COMP, 59_999, 0, (2024, 3, 1)),
                payment(2, 2, COMP, 60_000, 0, (2024, 3, 1)),
            ],
        );

        assert_eq!(g.payee_ids().unwrap().into_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_year_partitioning() {
        let mut invoiced_in_year = payment(3, 1, COMP, 500_000, 0, (2025, 1, 2));
        invoiced_in_year.created_at = Utc.with_ymd_and_hms(2024, 12, 15, 0, 0, 0).unwrap();

        let g = generator(
            vec![profile(1, "u1", "US")],
            vec![
                payment(1, 1, COMP, 500_000, 0, (2023, 12, 31)),
                payment(2, 1, COMP, 70_000, 0, (2024, 6, 1)),
                invoiced_in_year,
            ],
        );

        let output = g.process().unwrap().unwrap();
        let payees = payee_records(&output);
        assert_eq!(payees.len(), 1);
        assert_eq!(field_number(payees[0], "nonemployee_compensation"), 70_000);
    }

    #[test]
    fn test_foreign_and_unconfirmed_excluded() {
        let mut unconfirmed = profile(2, "u2", "US");
        unconfirmed.tax_info_confirmed = false;

        let g = generator(
            vec![profile(1, "u1", "CA"), unconfirmed, profile(3, "u3", "US")],
            vec![
                payment(1, 1, COMP, 900_000, 0, (2024, 3, 1)),
                payment(2, 2, COMP, 900_000, 0, (2024, 3, 1)),
                payment(3, 3, COMP, 900_000, 0, (2024, 3, 1)),
            ],
        );

        assert_eq!(g.payee_ids().unwrap().into_iter().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_profile_change_yields_two_payees() {
        // Same person, new address profile mid-year
        let mut moved = profile(2, "u1", "US");
        moved.address.city = "Chicago".to_string();

        let g = generator(
            vec![profile(1, "u1", "US"), moved],
            vec![
                payment(1, 1, COMP, 70_000, 0, (2024, 2, 1)),
                payment(2, 2, COMP, 90_000, 0, (2024, 8, 1)),
            ],
        );

        let output = g.process().unwrap().unwrap();
        let payees = payee_records(&output);

        assert_eq!(payees.len(), 2);
        assert_eq!(field_number(payees[0], "nonemployee_compensation"), 70_000);
        assert_eq!(field_number(payees[1], "nonemployee_compensation"), 90_000);
        assert_eq!(payees[1].field("payee_city").unwrap().trim_end(), "CHICAGO");

        let control = &output.records()[4];
        assert_eq!(field_number(control, "gross_total"), 160_000);
    }

    #[test]
    fn test_process_is_deterministic() {
        let g = two_contractors();
        let first = g.process().unwrap().unwrap();
        let second = g.process().unwrap().unwrap();

        assert_eq!(first.to_bytes(), second.to_bytes());
        assert_eq!(first.digest(), second.digest());
    }

    #[test]
    fn test_test_flag_only_touches_transmitter_indicator() {
        let live = two_contractors().process().unwrap().unwrap();

        let mut test_gen = two_contractors();
        test_gen.request = test_gen.request.test_file(true);
        let test = test_gen.process().unwrap().unwrap();

        assert_eq!(live.records().len(), test.records().len());
        assert_eq!(live.records()[0].field("test_file_indicator"), Some("    "));
        assert_eq!(test.records()[0].field("test_file_indicator"), Some("TEST"));

        // Outside the 4-byte indicator slot every byte matches
        let live_bytes = live.to_bytes();
        let test_bytes = test.to_bytes();
        let diffs: Vec<usize> = live_bytes
            .iter()
            .zip(test_bytes.iter())
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(i, _)| i)
            .collect();
        assert!(!diffs.is_empty());
        assert!(diffs.iter().all(|i| (27..31).contains(i)));
    }

    #[test]
    fn test_confirmed_payee_without_tin_is_fatal() {
        let mut no_tin = profile(1, "u1", "US");
        no_tin.tax_id = None;

        let g = generator(vec![no_tin], vec![payment(1, 1, COMP, 90_000, 0, (2024, 3, 1))]);

        assert_eq!(
            g.process().unwrap_err(),
            FilingError::missing("payee", "payee_tin")
        );
    }

    #[test]
    fn test_oversized_total_is_encoding_error() {
        let g = generator(
            vec![profile(1, "u1", "US")],
            vec![payment(1, 1, COMP, 1_000_000_000_000, 0, (2024, 3, 1))],
        );

        assert!(matches!(g.process(), Err(FilingError::Encoding { .. })));
    }

    #[test]
    fn test_business_payee_names() {
        let mut llc = profile(1, "u1", "US");
        llc.is_business = true;
        llc.business_name = Some("Álvarez Consulting LLC".to_string());

        let output = generator(vec![llc], vec![payment(1, 1, COMP, 90_000, 0, (2024, 3, 1))])
            .process()
            .unwrap()
            .unwrap();
        let payee = payee_records(&output)[0];

        assert_eq!(payee.field("payee_name").unwrap().trim_end(), "ALVAREZ CONSULTING LLC");
        assert_eq!(payee.field("payee_name_2").unwrap().trim_end(), "JOSE ALVAREZ");
        assert_eq!(payee.field("tin_type"), Some("1"));
    }
}
