pub mod issuance;
pub mod relay;

pub use issuance::TokenIssuance;
pub use relay::RelayAudit;
