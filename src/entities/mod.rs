// Entity Models - Who files, who gets reported
//
// Identity snapshots read from storage. A recipient can own several
// profiles over time; filings always group by profile.

pub mod address;
pub mod company;
pub mod recipient;

pub use address::Address;
pub use company::Company;
pub use recipient::RecipientProfile;
