//! Catalog/cart HTTP API client.
//!
//! The service is an external collaborator; this client covers product
//! search/lookup, cart create/update, and the distinct-facet context the
//! agent prompt needs. Error bodies are `{ "error": "..." }`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Client for the store's products/carts API.
#[derive(Clone)]
pub struct CatalogClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("catalog api error: {0}")]
    Api(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// One product row as the API returns it (Spanish field names are the wire
/// format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub talla: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub disponible: bool,
    #[serde(default)]
    pub categoria: Option<String>,
}

/// One cart line item. `qty = 0` on update removes the product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: i64,
    pub qty: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: i64,
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
}

/// Distinct facet values over the catalog, injected into the agent prompt.
#[derive(Debug, Clone, Default)]
pub struct ProductContext {
    pub names: Vec<String>,
    pub categories: Vec<String>,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
}

impl CatalogClient {
    /// Build a client. `timeout` bounds every request.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { base_url, client }
    }

    /// GET /products?q= — list products, optionally filtered.
    pub async fn search_products(&self, query: &str) -> Result<Vec<Product>, CatalogError> {
        let url = format!("{}/products", self.base_url);
        let res = self.client.get(&url).query(&[("q", query)]).send().await?;
        if !res.status().is_success() {
            return Err(api_error(res).await);
        }
        Ok(res.json().await?)
    }

    /// GET /products/{id} — one product, or NotFound.
    pub async fn get_product(&self, id: i64) -> Result<Product, CatalogError> {
        let url = format!("{}/products/{}", self.base_url, id);
        let res = self.client.get(&url).send().await?;
        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(format!("product {}", id)));
        }
        if !res.status().is_success() {
            return Err(api_error(res).await);
        }
        Ok(res.json().await?)
    }

    /// POST /carts — create a cart with the given items.
    pub async fn create_cart(&self, items: &[CartItem]) -> Result<Cart, CatalogError> {
        let url = format!("{}/carts", self.base_url);
        let body = serde_json::json!({ "items": items });
        let res = self.client.post(&url).json(&body).send().await?;
        if !res.status().is_success() {
            return Err(api_error(res).await);
        }
        Ok(res.json().await?)
    }

    /// PATCH /carts/{id} — update quantities; qty 0 removes the product.
    pub async fn update_cart(&self, cart_id: i64, items: &[CartItem]) -> Result<Cart, CatalogError> {
        let url = format!("{}/carts/{}", self.base_url, cart_id);
        let body = serde_json::json!({ "items": items });
        let res = self.client.patch(&url).json(&body).send().await?;
        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(format!("cart {}", cart_id)));
        }
        if !res.status().is_success() {
            return Err(api_error(res).await);
        }
        Ok(res.json().await?)
    }

    /// Distinct names/categories/colors/sizes across the catalog, for the
    /// prompt's inventory context.
    pub async fn product_context(&self) -> Result<ProductContext, CatalogError> {
        let products = self.search_products("").await?;
        Ok(build_context(&products))
    }
}

async fn api_error(res: reqwest::Response) -> CatalogError {
    let status = res.status();
    let detail = res
        .json::<ApiErrorBody>()
        .await
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| status.to_string());
    CatalogError::Api(format!("{} {}", status, detail))
}

fn build_context(products: &[Product]) -> ProductContext {
    fn distinct<'a>(it: impl Iterator<Item = Option<&'a str>>) -> Vec<String> {
        it.flatten()
            .filter(|s| !s.trim().is_empty())
            .map(String::from)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    ProductContext {
        names: distinct(products.iter().map(|p| Some(p.name.as_str()))),
        categories: distinct(products.iter().map(|p| p.categoria.as_deref())),
        colors: distinct(products.iter().map(|p| p.color.as_deref())),
        sizes: distinct(products.iter().map(|p| p.talla.as_deref())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, categoria: Option<&str>, color: Option<&str>, talla: Option<&str>) -> Product {
        Product {
            id: 1,
            name: name.to_string(),
            description: None,
            talla: talla.map(String::from),
            color: color.map(String::from),
            price: 0.0,
            stock: 0,
            disponible: true,
            categoria: categoria.map(String::from),
        }
    }

    #[test]
    fn context_deduplicates_and_skips_blanks() {
        let products = vec![
            product("Camiseta", Some("remeras"), Some("rojo"), Some("M")),
            product("Camiseta", Some("remeras"), Some("azul"), Some("L")),
            product("Chaqueta", None, Some(" "), Some("M")),
        ];
        let ctx = build_context(&products);
        assert_eq!(ctx.names, vec!["Camiseta", "Chaqueta"]);
        assert_eq!(ctx.categories, vec!["remeras"]);
        assert_eq!(ctx.colors, vec!["azul", "rojo"]);
        assert_eq!(ctx.sizes, vec!["L", "M"]);
    }
}
