pub mod coupons;
pub mod credits;
pub mod transactions;
pub mod webhook_events;
