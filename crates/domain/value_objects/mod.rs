pub mod bundles;
pub mod checkout;
pub mod coupons;
pub mod enums;
pub mod reconciliation;
pub mod transactions;
