//! Catalog/cart tools: getProducts, getProductById, createCart, updateCart.
//!
//! Arguments are deserialized into typed structs; a schema mismatch is a hard
//! failure surfaced as a sentinel, not retried. Cart items are validated
//! before any request leaves the process.

use super::{sentinel, ToolHandler, ToolRegistry};
use crate::catalog::{CartItem, CatalogClient, Product};
use crate::llm::{ToolDefinition, ToolFunctionDefinition};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Registry with the four store tools bound to `catalog`.
pub fn default_registry(catalog: Arc<CatalogClient>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(
        get_products_definition(),
        Arc::new(GetProducts {
            catalog: catalog.clone(),
        }),
    );
    registry.register(
        get_product_by_id_definition(),
        Arc::new(GetProductById {
            catalog: catalog.clone(),
        }),
    );
    registry.register(
        create_cart_definition(),
        Arc::new(CreateCart {
            catalog: catalog.clone(),
        }),
    );
    registry.register(update_cart_definition(), Arc::new(UpdateCart { catalog }));
    registry
}

fn function_definition(
    name: &str,
    description: &str,
    parameters: serde_json::Value,
) -> ToolDefinition {
    ToolDefinition {
        typ: "function".to_string(),
        function: ToolFunctionDefinition {
            name: name.to_string(),
            description: Some(description.to_string()),
            parameters,
        },
    }
}

fn cart_items_schema(qty_description: &str) -> serde_json::Value {
    json!({
        "type": "array",
        "description": "Un array de objetos, cada uno con 'product_id' (ID numérico del producto) y 'qty' (cantidad entera).",
        "items": {
            "type": "object",
            "properties": {
                "product_id": {
                    "type": "integer",
                    "description": "El ID numérico del producto.",
                },
                "qty": {
                    "type": "integer",
                    "description": qty_description,
                },
            },
            "required": ["product_id", "qty"],
        },
    })
}

fn get_products_definition() -> ToolDefinition {
    function_definition(
        "getProducts",
        "Obtiene una lista de productos de la tienda, opcionalmente filtrados por una consulta de texto. Útil cuando el usuario pregunta por productos, busca algo específico o quiere ver el catálogo.",
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "La consulta de texto para filtrar productos por nombre, tipo de prenda, talla, color, categoría o descripción (ej: 'camiseta roja'). Vacío para obtener todos los productos.",
                },
            },
            "required": [],
        }),
    )
}

fn get_product_by_id_definition() -> ToolDefinition {
    function_definition(
        "getProductById",
        "Obtiene los detalles de un producto específico utilizando su ID numérico.",
        json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "integer",
                    "description": "El ID numérico del producto a buscar.",
                },
            },
            "required": ["id"],
        }),
    )
}

fn create_cart_definition() -> ToolDefinition {
    function_definition(
        "createCart",
        "Crea un nuevo carrito de compras con los productos y cantidades especificadas. Útil cuando el usuario ha decidido qué productos quiere comprar y en qué cantidad.",
        json!({
            "type": "object",
            "properties": {
                "items": cart_items_schema("La cantidad del producto a añadir."),
            },
            "required": ["items"],
        }),
    )
}

fn update_cart_definition() -> ToolDefinition {
    function_definition(
        "updateCart",
        "Actualiza un carrito de compras existente. Permite cambiar la cantidad de un producto o eliminarlo (estableciendo la cantidad en 0).",
        json!({
            "type": "object",
            "properties": {
                "cart_id": {
                    "type": "integer",
                    "description": "El ID numérico del carrito que se va a modificar.",
                },
                "items": cart_items_schema("La nueva cantidad. Si es 0, el producto se elimina del carrito."),
            },
            "required": ["cart_id", "items"],
        }),
    )
}

/// `product_id` must be positive, `qty` non-negative; empty item lists are
/// rejected before any request is made.
fn validate_items(items: &[CartItem]) -> Result<(), String> {
    if items.is_empty() {
        return Err("el campo 'items' debe ser un array con al menos un producto".to_string());
    }
    for item in items {
        if item.product_id <= 0 {
            return Err(format!("product_id inválido: {}", item.product_id));
        }
        if item.qty < 0 {
            return Err(format!(
                "qty inválida para el producto {}: {}",
                item.product_id, item.qty
            ));
        }
    }
    Ok(())
}

fn parse_args<'a, T: Deserialize<'a>>(args: &'a serde_json::Value) -> Result<T, String> {
    T::deserialize(args).map_err(|e| format!("argumentos inválidos: {}", e))
}

/// Subset of product fields shown to the model after a search.
fn summarize(p: &Product) -> serde_json::Value {
    json!({
        "id": p.id,
        "name": p.name,
        "talla": p.talla,
        "color": p.color,
        "price": p.price,
        "stock": p.stock,
        "disponible": if p.disponible { "Sí" } else { "No" },
        "categoria": p.categoria,
    })
}

struct GetProducts {
    catalog: Arc<CatalogClient>,
}

#[derive(Deserialize)]
struct GetProductsArgs {
    #[serde(default)]
    query: String,
}

#[async_trait]
impl ToolHandler for GetProducts {
    async fn call(&self, args: &serde_json::Value) -> String {
        let args: GetProductsArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return sentinel(e),
        };
        match self.catalog.search_products(&args.query).await {
            Ok(products) if products.is_empty() => {
                "No se encontraron productos con esa descripción.".to_string()
            }
            Ok(products) => {
                let summaries: Vec<_> = products.iter().map(summarize).collect();
                serde_json::to_string(&summaries).unwrap_or_else(|e| sentinel(e))
            }
            Err(e) => {
                log::warn!("tool getProducts failed: {}", e);
                sentinel(e)
            }
        }
    }
}

struct GetProductById {
    catalog: Arc<CatalogClient>,
}

#[derive(Deserialize)]
struct GetProductByIdArgs {
    id: i64,
}

#[async_trait]
impl ToolHandler for GetProductById {
    async fn call(&self, args: &serde_json::Value) -> String {
        let args: GetProductByIdArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return sentinel(e),
        };
        if args.id <= 0 {
            return sentinel(format!("id de producto inválido: {}", args.id));
        }
        match self.catalog.get_product(args.id).await {
            Ok(product) => serde_json::to_string(&product).unwrap_or_else(|e| sentinel(e)),
            Err(e) => {
                log::warn!("tool getProductById failed: {}", e);
                sentinel(e)
            }
        }
    }
}

struct CreateCart {
    catalog: Arc<CatalogClient>,
}

#[derive(Deserialize)]
struct CreateCartArgs {
    items: Vec<CartItem>,
}

#[async_trait]
impl ToolHandler for CreateCart {
    async fn call(&self, args: &serde_json::Value) -> String {
        let args: CreateCartArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return sentinel(e),
        };
        if let Err(e) = validate_items(&args.items) {
            return sentinel(e);
        }
        match self.catalog.create_cart(&args.items).await {
            Ok(cart) => serde_json::to_string(&cart).unwrap_or_else(|e| sentinel(e)),
            Err(e) => {
                log::warn!("tool createCart failed: {}", e);
                sentinel(e)
            }
        }
    }
}

struct UpdateCart {
    catalog: Arc<CatalogClient>,
}

#[derive(Deserialize)]
struct UpdateCartArgs {
    cart_id: i64,
    items: Vec<CartItem>,
}

#[async_trait]
impl ToolHandler for UpdateCart {
    async fn call(&self, args: &serde_json::Value) -> String {
        let args: UpdateCartArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return sentinel(e),
        };
        if args.cart_id <= 0 {
            return sentinel(format!("cart_id inválido: {}", args.cart_id));
        }
        if let Err(e) = validate_items(&args.items) {
            return sentinel(e);
        }
        match self.catalog.update_cart(args.cart_id, &args.items).await {
            Ok(cart) => serde_json::to_string(&cart).unwrap_or_else(|e| sentinel(e)),
            Err(e) => {
                log::warn!("tool updateCart failed: {}", e);
                sentinel(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::is_error_sentinel;
    use std::time::Duration;

    fn registry() -> ToolRegistry {
        let catalog = Arc::new(CatalogClient::new(
            "http://localhost:3001",
            Duration::from_secs(1),
        ));
        default_registry(catalog)
    }

    #[test]
    fn registry_has_all_four_tools() {
        let r = registry();
        for name in ["getProducts", "getProductById", "createCart", "updateCart"] {
            assert!(r.has_tool(name), "missing {}", name);
        }
        assert_eq!(r.definitions().len(), 4);
    }

    #[test]
    fn validate_items_rules() {
        assert!(validate_items(&[]).is_err());
        assert!(validate_items(&[CartItem { product_id: 0, qty: 1 }]).is_err());
        assert!(validate_items(&[CartItem { product_id: 3, qty: -1 }]).is_err());
        // qty 0 is allowed (removal on update).
        assert!(validate_items(&[CartItem { product_id: 3, qty: 0 }]).is_ok());
    }

    #[tokio::test]
    async fn schema_mismatch_yields_sentinel_without_any_request() {
        let r = registry();
        let handler = r.handler("createCart").unwrap();
        // "items" missing entirely: serde failure, no HTTP attempted.
        let out = handler.call(&serde_json::json!({ "ítems": [] })).await;
        assert!(is_error_sentinel(&out), "got: {}", out);
    }

    #[tokio::test]
    async fn invalid_cart_id_yields_sentinel() {
        let r = registry();
        let handler = r.handler("updateCart").unwrap();
        let out = handler
            .call(&serde_json::json!({
                "cart_id": -4,
                "items": [{"product_id": 1, "qty": 1}],
            }))
            .await;
        assert!(is_error_sentinel(&out));
    }
}
