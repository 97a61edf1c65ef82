//! Products and cart lines as they are stored
use crate::error::ValidationError;
use crate::types::Currency;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Product {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub supplier_id: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub retail_price: u64,
    #[n(4)]
    pub wholesale_price: Option<u64>,
    #[n(5)]
    pub currency: Currency,
    #[n(6)]
    pub stock: u32,
}

impl Product {
    /// Edit-time price checks. Settlement trusts whatever passed here.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.retail_price == 0 {
            return Err(ValidationError::ZeroRetailPrice);
        }
        if let Some(wholesale) = self.wholesale_price {
            if wholesale >= self.retail_price {
                return Err(ValidationError::WholesaleNotBelowRetail {
                    retail: self.retail_price,
                    wholesale,
                });
            }
        }
        Ok(())
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    #[n(0)]
    pub product_id: String,
    #[n(1)]
    pub quantity: u32,
}

impl CartLine {
    pub fn new(product_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A buyer's whole cart, stored under a single key so settlement can read and
/// clear it inside one transaction.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    #[n(0)]
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn add(&mut self, product_id: &str, quantity: u32) {
        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => self.lines.push(CartLine::new(product_id, quantity)),
        }
    }

    pub fn remove(&mut self, product_id: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        before != self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(retail: u64, wholesale: Option<u64>) -> Product {
        Product {
            id: "product_1".into(),
            supplier_id: "supplier_1".into(),
            name: "Kente cloth".into(),
            retail_price: retail,
            wholesale_price: wholesale,
            currency: Currency::USD,
            stock: 3,
        }
    }

    #[test]
    fn wholesale_must_undercut_retail() {
        assert!(product(1_000, Some(900)).validate().is_ok());
        assert!(product(1_000, None).validate().is_ok());
        assert_eq!(
            product(1_000, Some(1_000)).validate(),
            Err(ValidationError::WholesaleNotBelowRetail {
                retail: 1_000,
                wholesale: 1_000
            })
        );
        assert_eq!(product(0, None).validate(), Err(ValidationError::ZeroRetailPrice));
    }

    #[test]
    fn adding_the_same_product_merges_lines() {
        let mut cart = Cart::default();
        cart.add("product_1", 2);
        cart.add("product_2", 1);
        cart.add("product_1", 3);

        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.lines[0], CartLine::new("product_1", 5));
        assert!(cart.remove("product_2"));
        assert!(!cart.remove("product_2"));
    }
}
