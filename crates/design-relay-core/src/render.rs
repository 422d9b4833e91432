//! Text rendering of agent messages for display.
//!
//! Rendering is lenient: a message the client cannot decode renders as
//! nothing instead of failing the whole conversation view.

use crate::{AgentMessage, CatalogLabel, ChatRole, DesignStatus, IncomingMessage};

/// Render one message into display lines.
#[must_use]
pub fn render(message: &IncomingMessage) -> Vec<String> {
    match message {
        IncomingMessage::Known(msg) => render_known(msg),
        IncomingMessage::Unknown(_) => Vec::new(),
    }
}

/// Render a whole history, in order.
#[must_use]
pub fn render_all<'a, I>(messages: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a IncomingMessage>,
{
    messages.into_iter().flat_map(render).collect()
}

fn render_known(message: &AgentMessage) -> Vec<String> {
    match message {
        AgentMessage::Chat { role, content } => {
            let who = match role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            vec![format!("{who}: {content}")]
        }
        AgentMessage::Design {
            image_url,
            message,
            status,
            ..
        } => {
            let status = match status {
                DesignStatus::Refining => "refining",
                DesignStatus::Approved => "approved",
            };
            vec![message.clone(), format!("[design {status}] {image_url}")]
        }
        AgentMessage::Catalog {
            message,
            blueprints,
            print_providers,
            variants,
        } => {
            let mut lines = vec![message.clone()];
            for list in [blueprints, print_providers, variants].into_iter().flatten() {
                lines.extend(list.iter().map(bullet));
            }
            lines
        }
    }
}

fn bullet(label: &CatalogLabel) -> String {
    format!("  - {label}")
}
