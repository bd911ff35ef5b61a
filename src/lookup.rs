//! Nutrient lookup
//!
//! The product catalog lives outside the engine. It is consumed through the
//! [`NutrientLookup`] trait; [`ProductIndex`] is an in-memory implementation
//! keyed by id and by lowercased name.

use std::collections::HashMap;

use crate::error::WaveError;
use crate::types::{MealItem, Product};

/// Trait for resolving catalog products
pub trait NutrientLookup {
    /// Resolve a product by id or name
    fn resolve(&self, key: &str) -> Option<&Product>;

    /// Resolve a meal item: id first, then name
    fn resolve_item(&self, item: &MealItem) -> Option<&Product> {
        item.product_id
            .as_deref()
            .and_then(|id| self.resolve(id))
            .or_else(|| item.name.as_deref().and_then(|name| self.resolve(name)))
    }
}

/// In-memory product index
#[derive(Debug, Clone, Default)]
pub struct ProductIndex {
    products: Vec<Product>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl ProductIndex {
    pub fn new(products: Vec<Product>) -> Self {
        let mut index = Self {
            products,
            by_id: HashMap::new(),
            by_name: HashMap::new(),
        };
        index.reindex();
        index
    }

    /// Load an index from a JSON array of products
    pub fn from_json(json: &str) -> Result<Self, WaveError> {
        let products: Vec<Product> = serde_json::from_str(json)?;
        Ok(Self::new(products))
    }

    pub fn insert(&mut self, product: Product) {
        self.products.push(product);
        self.reindex();
    }

    /// Consume the index, returning the products in insertion order
    pub fn into_products(self) -> Vec<Product> {
        self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    fn reindex(&mut self) {
        self.by_id.clear();
        self.by_name.clear();
        for (i, product) in self.products.iter().enumerate() {
            if !product.id.is_empty() {
                self.by_id.insert(product.id.clone(), i);
            }
            let key = normalize_name(&product.name);
            if !key.is_empty() {
                self.by_name.entry(key).or_insert(i);
            }
        }
    }
}

impl NutrientLookup for ProductIndex {
    fn resolve(&self, key: &str) -> Option<&Product> {
        self.by_id
            .get(key)
            .or_else(|| self.by_name.get(&normalize_name(key)))
            .and_then(|&i| self.products.get(i))
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_index() -> ProductIndex {
        ProductIndex::new(vec![
            Product {
                id: "p1".to_string(),
                name: "Rice".to_string(),
                carbs100: 28.0,
                gi: Some(70.0),
                ..Default::default()
            },
            Product {
                id: "p2".to_string(),
                name: "Chicken breast".to_string(),
                protein100: 23.0,
                ..Default::default()
            },
        ])
    }

    #[test]
    fn test_resolve_by_id_and_name() {
        let index = make_index();
        assert_eq!(index.resolve("p1").unwrap().name, "Rice");
        assert_eq!(index.resolve("  CHICKEN breast ").unwrap().id, "p2");
        assert!(index.resolve("unknown").is_none());
    }

    #[test]
    fn test_resolve_item_prefers_id() {
        let index = make_index();
        let item = MealItem {
            product_id: Some("p2".to_string()),
            name: Some("Rice".to_string()),
            ..Default::default()
        };
        assert_eq!(index.resolve_item(&item).unwrap().id, "p2");

        let by_name = MealItem {
            product_id: Some("missing".to_string()),
            name: Some("rice".to_string()),
            ..Default::default()
        };
        assert_eq!(index.resolve_item(&by_name).unwrap().id, "p1");
    }

    #[test]
    fn test_from_json() {
        let index = ProductIndex::from_json(r#"[{"id":"a","name":"Apple","carbs100":11,"gi":36}]"#)
            .unwrap();
        assert_eq!(index.len(), 1);
        assert!((index.resolve("apple").unwrap().gi.unwrap() - 36.0).abs() < 0.001);
    }
}
