//! System prompt for the sales agent and the dynamic inventory-context block.

use crate::catalog::ProductContext;

/// Static instructions for the sales agent. The dynamic inventory context is
/// prepended per turn by [`build_system_prompt`].
pub const SYSTEM_PROMPT: &str = "\
Eres un asistente de ventas amigable y servicial para la tienda. Tu objetivo \
principal es ayudar a los usuarios a encontrar productos y gestionar sus \
carritos de compra.

**Instrucciones Generales:**
- Responde de manera concisa y útil.
- Siempre que el usuario pregunte por productos, usa tus herramientas para buscarlos.
- Si el usuario quiere comprar o crear un carrito, usa la herramienta adecuada.
- Sé proactivo en sugerir opciones o preguntar si necesitan algo más.

**Reglas para el uso de Herramientas (MUY IMPORTANTE):**
1. **Para \"getProducts\"**: cuando muestres una lista de productos, SIEMPRE \
incluye el \"id\" de cada producto de forma visible en tu respuesta.
2. **Para \"getProductById\"**: necesita un \"id\" de producto. Si el usuario \
no te lo da, pídeselo explícitamente.
3. **Para \"createCart\"**: necesita una lista de ítems con \"product_id\" y \
\"qty\". Si te falta alguno de esos datos, pregúntaselo al usuario antes de \
llamar a la herramienta.
4. **Para \"updateCart\"**: necesita el \"cart_id\" además de los productos a \
modificar. Si no hay un \"cart_id\" en la conversación, informa al usuario que \
primero necesita crear un carrito.

**Manejo de Errores (MUY IMPORTANTE):**
- Si una herramienta devuelve un mensaje que comienza con 'Error:', no la reintentes.
- Informa al usuario de manera amigable que hubo un problema técnico y sugiere \
intentar de nuevo más tarde. No expongas el detalle técnico.";

/// Inventory context block: distinct facet values for the model's knowledge,
/// never shown to the user.
pub fn inventory_context(ctx: &ProductContext) -> String {
    format!(
        "**Contexto de Inventario (solo para tu conocimiento, no lo muestres al usuario):**\n\
         - Tipos de producto: {}.\n\
         - Categorías: {}.\n\
         - Colores: {}.\n\
         - Talles: {}.",
        ctx.names.join(", "),
        ctx.categories.join(", "),
        ctx.colors.join(", "),
        ctx.sizes.join(", "),
    )
}

/// Full system prompt for one turn: dynamic context first, then the static
/// instructions, matching the order the model was tuned against.
pub fn build_system_prompt(ctx: &ProductContext) -> String {
    format!("{}\n\n{}", inventory_context(ctx), SYSTEM_PROMPT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_precedes_instructions() {
        let ctx = ProductContext {
            names: vec!["Camiseta".into()],
            categories: vec!["remeras".into()],
            colors: vec!["rojo".into()],
            sizes: vec!["M".into()],
        };
        let prompt = build_system_prompt(&ctx);
        let ctx_pos = prompt.find("Contexto de Inventario").unwrap();
        let rules_pos = prompt.find("Instrucciones Generales").unwrap();
        assert!(ctx_pos < rules_pos);
        assert!(prompt.contains("- Colores: rojo."));
    }
}
