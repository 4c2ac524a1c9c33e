// 📐 Record Schemas & Composer
//
// A schema is data: an ordered table of (key, width, rule).
// The composer walks the table, renders each slot through the codec,
// stamps the sequence number, and refuses any record whose length
// differs from the declared width.

use crate::codec;
use crate::error::{FilingError, FilingResult};
use crate::sequence::SequenceTracker;
use std::collections::HashMap;

// ============================================================================
// RECORD TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    Transmitter,
    Issuer,
    Payee,
    ControlTotals,
    EndOfTransmission,
}

impl RecordType {
    pub fn name(&self) -> &'static str {
        match self {
            RecordType::Transmitter => "transmitter",
            RecordType::Issuer => "issuer",
            RecordType::Payee => "payee",
            RecordType::ControlTotals => "control_totals",
            RecordType::EndOfTransmission => "end_of_transmission",
        }
    }
}

// ============================================================================
// FIELD DESCRIPTORS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecRule {
    /// Fixed text baked into the schema (record markers, constant indicators)
    Literal(&'static str),
    /// Required normalized text
    Text,
    /// Normalized text, blank when unbound
    OptionalText,
    /// Printable ASCII kept as-is (emails)
    Verbatim,
    /// Required non-negative integer, zero-filled
    Numeric,
    /// Money rendered in minor units
    Cents,
    /// Money rendered in whole major units
    WholeUnits,
    Blank,
    Zeros,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub width: usize,
    pub rule: CodecRule,
}

impl FieldSpec {
    pub const fn literal(key: &'static str, value: &'static str, width: usize) -> Self {
        FieldSpec { key, width, rule: CodecRule::Literal(value) }
    }

    pub const fn text(key: &'static str, width: usize) -> Self {
        FieldSpec { key, width, rule: CodecRule::Text }
    }

    pub const fn optional_text(key: &'static str, width: usize) -> Self {
        FieldSpec { key, width, rule: CodecRule::OptionalText }
    }

    pub const fn verbatim(key: &'static str, width: usize) -> Self {
        FieldSpec { key, width, rule: CodecRule::Verbatim }
    }

    pub const fn numeric(key: &'static str, width: usize) -> Self {
        FieldSpec { key, width, rule: CodecRule::Numeric }
    }

    pub const fn cents(key: &'static str, width: usize) -> Self {
        FieldSpec { key, width, rule: CodecRule::Cents }
    }

    pub const fn whole_units(key: &'static str, width: usize) -> Self {
        FieldSpec { key, width, rule: CodecRule::WholeUnits }
    }

    pub const fn blank(key: &'static str, width: usize) -> Self {
        FieldSpec { key, width, rule: CodecRule::Blank }
    }

    pub const fn zeros(key: &'static str, width: usize) -> Self {
        FieldSpec { key, width, rule: CodecRule::Zeros }
    }
}

/// Static description of one record layout.
///
/// `width` is the full record width, sequence slot included.
#[derive(Debug, Clone, Copy)]
pub struct RecordSchema {
    pub record_type: RecordType,
    pub width: usize,
    pub fields: &'static [FieldSpec],
}

impl RecordSchema {
    pub fn declared_total_width(&self) -> usize {
        self.width
    }

    /// Sum of field widths, excluding the sequence slot
    pub fn field_width_sum(&self) -> usize {
        self.fields.iter().map(|f| f.width).sum()
    }

    pub fn is_consistent(&self) -> bool {
        self.field_width_sum() + codec::SEQUENCE_WIDTH == self.width
    }
}

// ============================================================================
// BOUND VALUES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(i64),
    /// Amount in cents
    Money(i64),
}

/// Values a generator binds for one record, looked up by schema key
#[derive(Debug, Clone, Default)]
pub struct BoundValues {
    values: HashMap<&'static str, FieldValue>,
}

impl BoundValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(key, FieldValue::Text(value.into()));
        self
    }

    /// Binds only when present; absent values stay unbound
    pub fn maybe_text(self, key: &'static str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.text(key, v),
            None => self,
        }
    }

    pub fn number(mut self, key: &'static str, value: i64) -> Self {
        self.values.insert(key, FieldValue::Number(value));
        self
    }

    pub fn money(mut self, key: &'static str, cents: i64) -> Self {
        self.values.insert(key, FieldValue::Money(cents));
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }
}

// ============================================================================
// RENDERED RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRecord {
    pub record_type: RecordType,
    pub sequence_number: u64,
    fields: Vec<(&'static str, String)>,
    content: String,
}

impl RenderedRecord {
    pub fn as_str(&self) -> &str {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Rendered text of the first field with this key
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

// ============================================================================
// COMPOSER
// ============================================================================

pub struct RecordComposer {
    tracker: SequenceTracker,
}

impl RecordComposer {
    pub fn new() -> Self {
        RecordComposer {
            tracker: SequenceTracker::new(),
        }
    }

    pub fn tracker(&self) -> &SequenceTracker {
        &self.tracker
    }

    /// Render one record and advance the sequence.
    pub fn render(
        &mut self,
        schema: &RecordSchema,
        values: &BoundValues,
    ) -> FilingResult<RenderedRecord> {
        let mut fields = Vec::with_capacity(schema.fields.len() + 1);
        let mut content = String::with_capacity(schema.width);

        for spec in schema.fields {
            let rendered = render_field(schema.record_type, spec, values)?;
            content.push_str(&rendered);
            fields.push((spec.key, rendered));
        }

        let sequence_number = self.tracker.current();
        let seq = codec::sequence(&self.tracker, codec::SEQUENCE_WIDTH)?;
        content.push_str(&seq);
        fields.push(("sequence_number", seq));

        if content.len() != schema.declared_total_width() {
            return Err(FilingError::encoding(
                schema.record_type.name(),
                format!(
                    "record is {} bytes, schema declares {}",
                    content.len(),
                    schema.declared_total_width()
                ),
            ));
        }

        self.tracker.advance();

        Ok(RenderedRecord {
            record_type: schema.record_type,
            sequence_number,
            fields,
            content,
        })
    }
}

impl Default for RecordComposer {
    fn default() -> Self {
        Self::new()
    }
}

fn render_field(
    record_type: RecordType,
    spec: &FieldSpec,
    values: &BoundValues,
) -> FilingResult<String> {
    let required = || {
        values
            .get(spec.key)
            .ok_or_else(|| FilingError::missing(record_type.name(), spec.key))
    };

    match spec.rule {
        CodecRule::Literal(value) => Ok(codec::normalize_text(value, spec.width)),
        CodecRule::Blank => Ok(codec::left_justify_blank(spec.width)),
        CodecRule::Zeros => Ok(codec::zero_block(spec.width)),
        CodecRule::Text => Ok(codec::normalize_text(&as_text(spec, required()?)?, spec.width)),
        CodecRule::OptionalText => match values.get(spec.key) {
            Some(value) => Ok(codec::normalize_text(&as_text(spec, value)?, spec.width)),
            None => Ok(codec::left_justify_blank(spec.width)),
        },
        CodecRule::Verbatim => Ok(codec::verbatim_text(&as_text(spec, required()?)?, spec.width)),
        CodecRule::Numeric => match required()? {
            FieldValue::Number(n) => codec::right_justify_numeric(spec.key, *n, spec.width),
            other => Err(mismatch(spec, "number", other)),
        },
        CodecRule::Cents => match required()? {
            FieldValue::Money(cents) => codec::right_justify_numeric(spec.key, *cents, spec.width),
            other => Err(mismatch(spec, "money", other)),
        },
        CodecRule::WholeUnits => match required()? {
            FieldValue::Money(cents) => codec::right_justify_numeric(
                spec.key,
                codec::money_to_whole_units(*cents),
                spec.width,
            ),
            other => Err(mismatch(spec, "money", other)),
        },
    }
}

fn as_text(spec: &FieldSpec, value: &FieldValue) -> FilingResult<String> {
    match value {
        FieldValue::Text(s) => Ok(s.clone()),
        FieldValue::Number(n) => Ok(n.to_string()),
        FieldValue::Money(_) => Err(mismatch(spec, "text", value)),
    }
}

fn mismatch(spec: &FieldSpec, expected: &str, got: &FieldValue) -> FilingError {
    FilingError::encoding(spec.key, format!("expected {} value, got {:?}", expected, got))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FIELDS: &[FieldSpec] = &[
        FieldSpec::literal("record_type", "X", 1),
        FieldSpec::text("name", 10),
        FieldSpec::optional_text("name_2", 5),
        FieldSpec::numeric("count", 4),
        FieldSpec::cents("amount", 8),
        FieldSpec::whole_units("amount_dollars", 6),
        FieldSpec::zeros("unused_amounts", 3),
        FieldSpec::blank("reserved", 3),
    ];

    const SAMPLE: RecordSchema = RecordSchema {
        record_type: RecordType::Payee,
        width: 48,
        fields: SAMPLE_FIELDS,
    };

    fn sample_values() -> BoundValues {
        BoundValues::new()
            .text("name", "Jane Doe")
            .number("count", 7)
            .money("amount", 123_456)
            .money("amount_dollars", 123_456)
    }

    #[test]
    fn test_sample_schema_is_consistent() {
        assert!(SAMPLE.is_consistent());
    }

    #[test]
    fn test_render_concatenates_in_schema_order() {
        let mut composer = RecordComposer::new();
        let record = composer.render(&SAMPLE, &sample_values()).unwrap();

        assert_eq!(
            record.as_str(),
            "XJANE DOE       000700123456001235000   00000001"
        );
        assert_eq!(record.len(), SAMPLE.declared_total_width());
        assert_eq!(record.sequence_number, 1);
        assert_eq!(record.field("amount_dollars"), Some("001235"));
    }

    #[test]
    fn test_sequence_advances_per_record() {
        let mut composer = RecordComposer::new();
        let first = composer.render(&SAMPLE, &sample_values()).unwrap();
        let second = composer.render(&SAMPLE, &sample_values()).unwrap();

        assert_eq!(first.sequence_number, 1);
        assert_eq!(second.sequence_number, 2);
        assert_eq!(second.field("sequence_number"), Some("00000002"));
        assert_eq!(composer.tracker().issued(), 2);
    }

    #[test]
    fn test_missing_required_field() {
        let mut composer = RecordComposer::new();
        let values = BoundValues::new()
            .number("count", 1)
            .money("amount", 1)
            .money("amount_dollars", 1);

        let err = composer.render(&SAMPLE, &values).unwrap_err();
        assert_eq!(err, FilingError::missing("payee", "name"));
        // Failed renders do not consume a sequence number
        assert_eq!(composer.tracker().current(), 1);
    }

    #[test]
    fn test_numeric_overflow_is_encoding_error() {
        let mut composer = RecordComposer::new();
        let values = sample_values().money("amount", 1_000_000_000);

        let err = composer.render(&SAMPLE, &values).unwrap_err();
        assert!(matches!(err, FilingError::Encoding { ref field, .. } if field == "amount"));
    }

    #[test]
    fn test_inconsistent_schema_fails_width_check() {
        const BROKEN: RecordSchema = RecordSchema {
            record_type: RecordType::Issuer,
            width: 20,
            fields: &[FieldSpec::blank("reserved", 5)],
        };

        let mut composer = RecordComposer::new();
        let err = composer.render(&BROKEN, &BoundValues::new()).unwrap_err();
        assert!(matches!(err, FilingError::Encoding { .. }));
    }

    #[test]
    fn test_type_mismatch_is_encoding_error() {
        let mut composer = RecordComposer::new();
        let values = sample_values().text("count", "seven");

        assert!(composer.render(&SAMPLE, &values).is_err());
    }
}
