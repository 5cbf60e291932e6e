pub mod checkout;
pub mod reconciliation;
pub mod session_verifier;
pub mod stripe_gateway;
pub mod stripe_webhook;

#[cfg(test)]
pub(crate) mod test_support;
