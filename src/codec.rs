// 🔤 Field Codec - Typed value → fixed-width slot
//
// Stateless rendering primitives shared by every record schema.
//
// Two failure modes:
//   - Text too long      → truncate
//   - Number too large   → EncodingError (a misstated total is never acceptable)

use crate::error::{FilingError, FilingResult};
use crate::sequence::SequenceTracker;

/// Width of the record sequence number slot
pub const SEQUENCE_WIDTH: usize = 8;

// ============================================================================
// TEXT
// ============================================================================

/// Transliterate, upper-case, keep only `A-Z`, `0-9` and space, then
/// left-justify to `width` (truncating when longer).
///
/// Example:
/// ```
/// use tax_filing::codec::normalize_text;
///
/// assert_eq!(normalize_text("Zoë O'Brien-Núñez", 12), "ZOE OBRIENNU");
/// assert_eq!(normalize_text("ACME", 6), "ACME  ");
/// ```
pub fn normalize_text(value: &str, width: usize) -> String {
    let normalized: String = transliterate(value)
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == ' ')
        .collect();

    left_justify(&normalized, width)
}

/// Like `normalize_text` but keeps printable ASCII punctuation (emails, phone
/// extensions). Case is preserved.
pub fn verbatim_text(value: &str, width: usize) -> String {
    let cleaned: String = transliterate(value)
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .collect();

    left_justify(&cleaned, width)
}

/// First four significant characters of a name, used by the authority to
/// match a TIN against its records. Spaces are not significant.
pub fn name_control(name: &str) -> String {
    let compact: String = normalize_text(name, name.len() * 2)
        .chars()
        .filter(|c| *c != ' ')
        .take(4)
        .collect();
    left_justify(&compact, 4)
}

/// Blank filler for ranges the format reserves but we never populate
pub fn left_justify_blank(width: usize) -> String {
    " ".repeat(width)
}

/// Zero filler for unused numeric ranges
pub fn zero_block(width: usize) -> String {
    "0".repeat(width)
}

/// Callers only pass ASCII here, so char count == byte count.
fn left_justify(value: &str, width: usize) -> String {
    let mut out: String = value.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat(' ').take(width - len));
    out
}

// ============================================================================
// NUMBERS
// ============================================================================

/// Right-justify a non-negative integer, zero-filled.
///
/// Negative or too-wide values are an upstream aggregation bug and fail.
pub fn right_justify_numeric(field: &str, value: i64, width: usize) -> FilingResult<String> {
    if value < 0 {
        return Err(FilingError::encoding(
            field,
            format!("negative value {} cannot be encoded", value),
        ));
    }

    let digits = value.to_string();
    if digits.len() > width {
        return Err(FilingError::encoding(
            field,
            format!("value {} needs {} digits, slot holds {}", value, digits.len(), width),
        ));
    }

    Ok(format!("{:0>width$}", digits, width = width))
}

/// Minor units (cents) → whole major units, rounding half away from zero.
///
/// Each call stands alone: remainders are never carried between fields.
pub fn money_to_whole_units(cents: i64) -> i64 {
    if cents >= 0 {
        (cents + 50) / 100
    } else {
        (cents - 50) / 100
    }
}

/// Percentage → hundredths of a percent (30.0 → 3000)
pub fn percentage_to_hundredths(percentage: f64) -> i64 {
    (percentage * 100.0).round() as i64
}

/// Render the tracker's current value into the sequence slot.
pub fn sequence(tracker: &SequenceTracker, width: usize) -> FilingResult<String> {
    right_justify_numeric("sequence_number", tracker.current() as i64, width)
}

// ============================================================================
// TRANSLITERATION
// ============================================================================

/// Lossy Latin → ASCII approximation. Unmapped characters become `?`, which
/// `normalize_text` then strips. The mapping is kept stable on purpose:
/// previously accepted filings were rendered with it.
pub fn transliterate(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            out.push_str(approximate(c));
        }
    }
    out
}

fn approximate(c: char) -> &'static str {
    match c {
        // Latin-1 Supplement
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "A",
        'Æ' => "AE",
        'Ç' => "C",
        'È' | 'É' | 'Ê' | 'Ë' => "E",
        'Ì' | 'Í' | 'Î' | 'Ï' => "I",
        'Ð' => "D",
        'Ñ' => "N",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => "O",
        '×' => "x",
        'Ù' | 'Ú' | 'Û' | 'Ü' => "U",
        'Ý' => "Y",
        'Þ' => "Th",
        'ß' => "ss",
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'æ' => "ae",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ð' => "d",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        'þ' => "th",

        // Latin Extended-A
        'Ā' | 'Ă' | 'Ą' => "A",
        'ā' | 'ă' | 'ą' => "a",
        'Ć' | 'Ĉ' | 'Ċ' | 'Č' => "C",
        'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'Ď' | 'Đ' => "D",
        'ď' | 'đ' => "d",
        'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => "E",
        'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'Ĝ' | 'Ğ' | 'Ġ' | 'Ģ' => "G",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'Ĥ' | 'Ħ' => "H",
        'ĥ' | 'ħ' => "h",
        'Ĩ' | 'Ī' | 'Ĭ' | 'Į' | 'İ' => "I",
        'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'Ĳ' => "IJ",
        'ĳ' => "ij",
        'Ĵ' => "J",
        'ĵ' => "j",
        'Ķ' => "K",
        'ķ' => "k",
        'ĸ' => "q",
        'Ĺ' | 'Ļ' | 'Ľ' | 'Ŀ' | 'Ł' => "L",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => "l",
        'Ń' | 'Ņ' | 'Ň' => "N",
        'ń' | 'ņ' | 'ň' => "n",
        'ŉ' => "'n",
        'Ŋ' => "NG",
        'ŋ' => "ng",
        'Ō' | 'Ŏ' | 'Ő' => "O",
        'ō' | 'ŏ' | 'ő' => "o",
        'Œ' => "OE",
        'œ' => "oe",
        'Ŕ' | 'Ŗ' | 'Ř' => "R",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'Ś' | 'Ŝ' | 'Ş' | 'Š' => "S",
        'ś' | 'ŝ' | 'ş' | 'š' => "s",
        'Ţ' | 'Ť' | 'Ŧ' => "T",
        'ţ' | 'ť' | 'ŧ' => "t",
        'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => "U",
        'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'Ŵ' => "W",
        'ŵ' => "w",
        'Ŷ' | 'Ÿ' => "Y",
        'ŷ' => "y",
        'Ź' | 'Ż' | 'Ž' => "Z",
        'ź' | 'ż' | 'ž' => "z",

        _ => "?",
    }
}

// ============================================================================
// TESTS
// ============================================================================
