pub mod transactions;
pub mod webhook_events;
