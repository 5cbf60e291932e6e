use serde::Serialize;

/// A purchasable credit bundle.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Bundle {
    pub id: String,
    pub name: String,
    pub price_minor: i32,
    pub credits: i32,
    pub currency: String,
    /// Pre-registered Stripe price. When absent, checkout builds the line item from `price_minor`.
    #[serde(skip_serializing)]
    pub stripe_price_id: Option<String>,
}

impl Bundle {
    pub fn new(id: &str, name: &str, price_minor: i32, credits: i32, currency: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            price_minor,
            credits,
            currency: currency.to_string(),
            stripe_price_id: None,
        }
    }

    pub fn with_stripe_price_id(mut self, price_id: Option<String>) -> Self {
        self.stripe_price_id = price_id.filter(|value| !value.trim().is_empty());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct BundleCatalog {
    bundles: Vec<Bundle>,
}

impl BundleCatalog {
    pub fn new(bundles: Vec<Bundle>) -> Self {
        Self { bundles }
    }

    /// The catalog sold by the product, without any Stripe price ids attached.
    pub fn standard() -> Self {
        Self::new(vec![
            Bundle::new("starter", "Starter Pack", 499, 4, "usd"),
            Bundle::new("professional", "Professional Pack", 999, 10, "usd"),
            Bundle::new("premium", "Premium Pack", 1999, 25, "usd"),
        ])
    }

    pub fn find(&self, bundle_id: &str) -> Option<&Bundle> {
        self.bundles.iter().find(|bundle| bundle.id == bundle_id)
    }

    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }

    pub fn bundles_mut(&mut self) -> impl Iterator<Item = &mut Bundle> {
        self.bundles.iter_mut()
    }
}
