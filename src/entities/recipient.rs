// 👤 Recipient Profile - Identity snapshot valid at a point in time
//
// A person (recipient_id) can have several profiles over time: moving
// country, changing legal name, re-confirming tax details. Each payment
// points at the profile that was current when it was recorded, and
// filings group by PROFILE, never by person.

use crate::codec;
use crate::entities::Address;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientProfile {
    /// Profile identity (what filings group by)
    pub id: i64,

    /// Underlying person/entity, shared across profiles
    pub recipient_id: String,

    pub legal_name: String,
    pub business_name: Option<String>,
    pub is_business: bool,

    pub tax_id: Option<String>,
    /// Tax form signed and TIN verified
    pub tax_info_confirmed: bool,

    pub address: Address,
    pub date_of_birth: Option<NaiveDate>,
    pub residency_country_code: String,
}

impl RecipientProfile {
    /// Name printed on the return
    pub fn display_name(&self) -> &str {
        match (&self.business_name, self.is_business) {
            (Some(name), true) if !name.trim().is_empty() => name,
            _ => &self.legal_name,
        }
    }

    /// Surname for individuals, business name for businesses
    pub fn name_control(&self) -> String {
        if self.is_business {
            codec::name_control(self.display_name())
        } else {
            let surname = self.legal_name.split_whitespace().last().unwrap_or("");
            codec::name_control(surname)
        }
    }

    /// 1 = EIN (business), 2 = SSN/ITIN (individual)
    pub fn tin_type(&self) -> i64 {
        if self.is_business {
            1
        } else {
            2
        }
    }

    pub fn tax_id_digits(&self) -> Option<String> {
        self.tax_id
            .as_ref()
            .map(|tin| tin.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>())
            .filter(|tin| !tin.is_empty())
    }

    pub fn is_resident_of(&self, country_code: &str) -> bool {
        self.residency_country_code.eq_ignore_ascii_case(country_code)
    }
}
