// 🏢 Company - The filer (payer / withholding agent)
//
// Identity snapshot of the company issuing the information returns.

use crate::codec;
use crate::entities::Address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub legal_name: String,
    /// Employer identification number
    pub tax_id: String,
    pub address: Address,
    pub phone: String,
    pub email: String,
}

impl Company {
    pub fn name_control(&self) -> String {
        codec::name_control(&self.legal_name)
    }

    /// TIN without separators ("12-3456789" → "123456789")
    pub fn tax_id_digits(&self) -> String {
        self.tax_id.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}
