//! Product catalog.

use common::{Money, Product, ProductId};
use store::Store;

use crate::error::DomainError;

/// CRUD over catalog products.
///
/// The only rule is that prices are never negative. Orders read the current
/// price through this catalog when they add items.
#[derive(Clone)]
pub struct ProductService<S: Store> {
    store: S,
}

impl<S: Store> ProductService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create(&self, name: String, price: Money) -> Result<Product, DomainError> {
        validate_price(price)?;

        let product = self.store.insert_product(Product::new(name, price)).await?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: ProductId) -> Result<Product, DomainError> {
        self.store
            .find_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_name(&self, name: &str) -> Result<Product, DomainError> {
        self.store
            .find_product_by_name(name)
            .await?
            .ok_or_else(|| DomainError::not_found("product", name))
    }

    pub async fn list(&self) -> Result<Vec<Product>, DomainError> {
        Ok(self.store.list_products().await?)
    }

    /// Renames and reprices a product. Existing order items keep the price
    /// they were added at.
    #[tracing::instrument(skip(self))]
    pub async fn update(
        &self,
        id: ProductId,
        name: String,
        price: Money,
    ) -> Result<Product, DomainError> {
        validate_price(price)?;

        let mut product = self.get(id).await?;
        product.name = name;
        product.price = price;
        let product = self.store.update_product(product).await?;
        tracing::info!(product_id = %id, price = %product.price, "product updated");
        Ok(product)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<(), DomainError> {
        self.store.delete_product(id).await?;
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }
}

fn validate_price(price: Money) -> Result<(), DomainError> {
    if price.is_negative() {
        return Err(DomainError::InvalidPrice {
            price: price.amount(),
        });
    }
    Ok(())
}
