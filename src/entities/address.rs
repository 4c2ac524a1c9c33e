// 📮 Address - Mailing address snapshot

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    /// State or province code
    pub state: String,
    pub postal_code: String,
    /// Country code (ISO 3166-1 alpha-2)
    pub country_code: String,
}

impl Address {
    /// Postal code digits only ("94107-1234" → "941071234")
    pub fn postal_digits(&self) -> String {
        self.postal_code.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
    }
}
