//! Per-turn routing: pause/active state machine, admin commands, and the
//! hand-off to the agent.
//!
//! Commands are turns whose trimmed text starts with `#`. Every
//! state-dependent decision re-fetches the durable bot state; the in-memory
//! mirror is only a fallback when the fetch fails. Pause/resume are
//! acknowledged only after the durable write succeeds.

use crate::agent::AgentOrchestrator;
use crate::channels::InboundMessage;
use crate::debounce::{is_greeting, MessageDebouncer};
use crate::llm::ChatBackend;
use crate::state::{BotState, ConfigStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// One combined inbound unit, as flushed by the debouncer (or a single
/// immediate-dispatch message).
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub sender_id: String,
    pub combined_text: String,
    pub messages: Vec<InboundMessage>,
}

/// What the router decided for a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Send this text back to the sender.
    Reply(String),
    /// No outbound reply (paused, or nothing to say).
    Dropped,
}

const WELCOME_REPLY: &str = "¡Hola! 👋 Bienvenido a la tienda virtual.\n\nEscribe lo que estás \
buscando y te ayudaré a encontrarlo. Por ejemplo: *\"busco una camiseta\"* o *\"qué chaquetas \
tienes?\"*.";

const PAUSED_REPLY: &str = "🔴 *Bot pausado*\n\nEl bot ha sido pausado temporalmente. Para \
reactivarlo usa: #resume";

const RESUMED_REPLY: &str = "🟢 *Bot activado*\n\nEl bot está funcionando normalmente.";

const PERSIST_FAILED_REPLY: &str = "⚠️ No se pudo guardar el nuevo estado del bot. El estado no \
cambió; intenta de nuevo.";

const DENIED_REPLY: &str = "⛔ No estás autorizado para usar comandos de administración.";

const RESET_REPLY: &str = "🔄 *Estadísticas reiniciadas*\n\nLos contadores de la sesión vuelven a \
cero.";

const PROMO_REPLY: &str = "🎉 *¡PROMOCIÓN ESPECIAL!* 🎉\n\n🛍️ *Descuento del 20% en todos \
nuestros productos*\n⏰ *Válido hasta fin de mes*\n🚚 *Envío gratis en compras mayores a $50*\n\n\
¡No te pierdas esta oportunidad única!\nEscribe \"productos\" para ver nuestro catálogo.";

const HELP_REPLY: &str = "🤖 *Comandos de Administración*\n\n*Control del Bot:*\n• #pause — \
pausar el bot\n• #resume — activar el bot\n• #reset-session-stats — reiniciar contadores\n\n\
*Información:*\n• #stats — ver estadísticas\n• #help — mostrar esta ayuda\n\n*Acciones:*\n\
• #promo-broadcast — enviar mensaje promocional\n• #clear-buffers — limpiar buffers de mensajes";

const UNRECOGNIZED_REPLY: &str = "❌ *Comando no reconocido*\n\nUsa #help para ver los comandos \
disponibles.";

/// Session counters surfaced by `#stats`, reset by `#reset-session-stats`.
#[derive(Default)]
struct SessionStats {
    total_messages: AtomicU64,
    command_count: AtomicU64,
}

/// Keep only alphanumerics, so "+54 911 2345-6789" and "549112345 6789"
/// compare equal.
pub fn normalize_sender(sender_id: &str) -> String {
    sender_id.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Command token of a turn: trimmed text starting with `#`, lowercased rest.
pub fn parse_command(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let token = trimmed.strip_prefix('#')?;
    Some(token.trim().to_lowercase())
}

/// Decides, per turn, whether to drop, run an admin command, or forward to
/// the agent.
pub struct ConversationRouter<B: ChatBackend> {
    store: Arc<dyn ConfigStore>,
    environment: String,
    /// Fallback mirror of the durable state, refreshed on every fetch.
    cached: RwLock<BotState>,
    allow_list: Vec<String>,
    agent: AgentOrchestrator<B>,
    debouncer: MessageDebouncer,
    stats: SessionStats,
}

impl<B: ChatBackend> ConversationRouter<B> {
    /// Build the router, loading the initial state from the store (Active
    /// when no record exists or the fetch fails).
    pub async fn load(
        store: Arc<dyn ConfigStore>,
        environment: impl Into<String>,
        authorized_numbers: &[String],
        agent: AgentOrchestrator<B>,
        debouncer: MessageDebouncer,
    ) -> Self {
        let environment = environment.into();
        let initial = match store.get_config(&environment).await {
            Ok(Some(record)) => record.state(),
            Ok(None) => BotState::default(),
            Err(e) => {
                log::warn!("router: initial state fetch failed, assuming active: {}", e);
                BotState::default()
            }
        };
        log::info!(
            "router: loaded state for {}: paused={}",
            environment,
            initial.is_paused
        );
        Self {
            store,
            environment,
            cached: RwLock::new(initial),
            allow_list: authorized_numbers.iter().map(|n| normalize_sender(n)).collect(),
            agent,
            debouncer,
            stats: SessionStats::default(),
        }
    }

    /// Count one inbound message (before debouncing), for `#stats`.
    pub fn record_message(&self) {
        self.stats.total_messages.fetch_add(1, Ordering::Relaxed);
    }

    fn is_authorized(&self, sender_id: &str) -> bool {
        let normalized = normalize_sender(sender_id);
        self.allow_list.iter().any(|n| n == &normalized)
    }

    /// Read-through state: durable fetch first, cache only on failure.
    async fn current_state(&self) -> BotState {
        match self.store.get_config(&self.environment).await {
            Ok(record) => {
                let state = record.map(|r| r.state()).unwrap_or_default();
                *self.cached.write().await = state.clone();
                state
            }
            Err(e) => {
                log::warn!("router: state fetch failed, using cached: {}", e);
                self.cached.read().await.clone()
            }
        }
    }

    /// Route one turn.
    pub async fn route(&self, turn: &ConversationTurn) -> RouteOutcome {
        if let Some(token) = parse_command(&turn.combined_text) {
            return self.handle_command(&turn.sender_id, &token).await;
        }

        let state = self.current_state().await;
        if state.is_paused {
            log::info!("router: paused, dropping turn from {}", turn.sender_id);
            return RouteOutcome::Dropped;
        }

        if is_greeting(&turn.combined_text) {
            return RouteOutcome::Reply(WELCOME_REPLY.to_string());
        }

        RouteOutcome::Reply(self.agent.reply(&turn.sender_id, &turn.combined_text).await)
    }

    async fn handle_command(&self, sender_id: &str, token: &str) -> RouteOutcome {
        self.stats.command_count.fetch_add(1, Ordering::Relaxed);

        if !self.is_authorized(sender_id) {
            log::warn!("router: unauthorized command '{}' from {}", token, sender_id);
            return RouteOutcome::Reply(DENIED_REPLY.to_string());
        }

        match token {
            "pause" | "pausar" => self.set_paused(true, sender_id).await,
            "resume" | "activar" => self.set_paused(false, sender_id).await,
            "stats" | "estadisticas" => RouteOutcome::Reply(self.stats_reply().await),
            "reset-session-stats" | "reiniciar" => {
                self.stats.total_messages.store(0, Ordering::Relaxed);
                self.stats.command_count.store(0, Ordering::Relaxed);
                RouteOutcome::Reply(RESET_REPLY.to_string())
            }
            "help" | "ayuda" => RouteOutcome::Reply(HELP_REPLY.to_string()),
            "promo-broadcast" | "promo" => RouteOutcome::Reply(PROMO_REPLY.to_string()),
            "clear-buffers" | "limpiar" => {
                let cleared = self.debouncer.clear_all().await;
                RouteOutcome::Reply(format!(
                    "🧹 *Buffers limpiados*\n\nSe limpiaron {} buffers activos.",
                    cleared
                ))
            }
            other => {
                log::debug!("router: unrecognized command '{}' from {}", other, sender_id);
                RouteOutcome::Reply(UNRECOGNIZED_REPLY.to_string())
            }
        }
    }

    /// Persist then acknowledge; a failed write is reported, never masked.
    async fn set_paused(&self, is_paused: bool, sender_id: &str) -> RouteOutcome {
        let paused_by = normalize_sender(sender_id);
        let paused_by = is_paused.then_some(paused_by.as_str());
        match self
            .store
            .set_state(&self.environment, is_paused, paused_by)
            .await
        {
            Ok(()) => {
                let state = self.current_state().await;
                log::info!(
                    "router: state persisted by {}: paused={}",
                    sender_id,
                    state.is_paused
                );
                RouteOutcome::Reply(if is_paused { PAUSED_REPLY } else { RESUMED_REPLY }.to_string())
            }
            Err(e) => {
                log::error!("router: state persist failed: {}", e);
                RouteOutcome::Reply(PERSIST_FAILED_REPLY.to_string())
            }
        }
    }

    async fn stats_reply(&self) -> String {
        let state = self.current_state().await;
        let buffer_stats = self.debouncer.stats().await;
        let status = if state.is_paused {
            match (&state.paused_by, &state.paused_at) {
                (Some(by), Some(at)) => format!("🔴 Pausado por {} desde {}", by, at.to_rfc3339()),
                _ => "🔴 Pausado".to_string(),
            }
        } else {
            "🟢 Activo".to_string()
        };
        format!(
            "📊 *Estadísticas del Bot*\n\n*Estado:* {}\n\n*Mensajes:*\n• Total procesados: {}\n\
             • Comandos admin: {}\n\n*Buffer de Mensajes:*\n• Buffers activos: {}\n\
             • Mensajes en espera: {}",
            status,
            self.stats.total_messages.load(Ordering::Relaxed),
            self.stats.command_count.load(Ordering::Relaxed),
            buffer_stats.active_buffers,
            buffer_stats.total_messages,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_everything_but_alphanumerics() {
        assert_eq!(normalize_sender("+54 9 351 857-6432"), "5493518576432");
        assert_eq!(normalize_sender("5493518576432"), "5493518576432");
        assert_eq!(normalize_sender("user_42!"), "user42");
    }

    #[test]
    fn command_parsing() {
        assert_eq!(parse_command("#pause"), Some("pause".to_string()));
        assert_eq!(parse_command("  #STATS "), Some("stats".to_string()));
        assert_eq!(parse_command("# help"), Some("help".to_string()));
        assert_eq!(parse_command("pause"), None);
        assert_eq!(parse_command("busco #camisetas"), None);
    }
}
