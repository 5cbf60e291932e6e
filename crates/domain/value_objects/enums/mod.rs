pub mod checkout_payment_statuses;
pub mod transaction_statuses;
