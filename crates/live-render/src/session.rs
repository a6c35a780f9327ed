//! Session state and the operations exposed to the transport layer.
//!
//! A [`RenderSession`] owns one connection's render tree, component
//! registry, event buffer, and optional shell. Everything is plain owned
//! state — no globals — so an embedder (including a load-testing harness
//! simulating many users) can hold any number of independent sessions.
//! All operations are synchronous; the caller must feed exactly one
//! message to completion before the next, since diff application is not
//! commutative. On reconnect, discard the session and rebuild it from a
//! fresh initial payload.

use serde_json::Value;
use tracing::{debug, warn};

use crate::merge::merge;
use crate::node::Node;
use crate::registry::ComponentRegistry;
use crate::render::render;
use crate::shell::ShellDoc;
use crate::templates;
use crate::wire::{DiffMessage, Event};

#[derive(Debug, Default)]
pub struct RenderSession {
    tree: Node,
    registry: ComponentRegistry,
    shell: Option<ShellDoc>,
    /// Title tracked without a shell; with a shell the [`ShellDoc`] owns it.
    title: Option<String>,
    events: Vec<Event>,
    reply: Option<Value>,
}

impl RenderSession {
    /// A session that publishes bare rendered content.
    pub fn new() -> RenderSession {
        RenderSession::default()
    }

    /// A session that splices rendered content into `shell_html` at the
    /// element carrying `mount_attr="mount_id"`. A shell whose mount
    /// cannot be located degrades to bare content rather than failing.
    pub fn with_shell(shell_html: String, mount_attr: &str, mount_id: &str) -> RenderSession {
        let shell = match ShellDoc::new(shell_html, mount_attr, mount_id) {
            Ok(doc) => Some(doc),
            Err(error) => {
                warn!(%error, mount_attr, mount_id, "shell unusable; publishing bare content");
                None
            }
        };
        RenderSession {
            shell,
            ..RenderSession::default()
        }
    }

    /// Applies the initial payload, resetting tree and registry first, and
    /// returns the published document.
    pub fn apply_initial(&mut self, payload: &Value) -> String {
        self.tree = Node::empty();
        self.registry = ComponentRegistry::new();
        self.apply_message(payload)
    }

    /// Applies one diff message and returns the published document.
    pub fn apply_diff(&mut self, diff: &Value) -> String {
        self.apply_message(diff)
    }

    fn apply_message(&mut self, value: &Value) -> String {
        let DiffMessage {
            mut root,
            components,
            title,
            events,
            reply,
        } = DiffMessage::decode(value);
        templates::substitute(&mut root, None);
        self.registry.upsert_all(components);
        let tree = std::mem::take(&mut self.tree);
        self.tree = merge(tree, root);
        if !events.is_empty() {
            let timestamp = now_millis();
            self.events.extend(events.into_iter().map(|(action, payload)| Event {
                action,
                payload,
                timestamp,
            }));
        }
        if let Some(reply) = reply {
            self.reply = Some(reply);
        }
        if let Some(title) = title {
            self.set_title(&title);
        }
        debug!(components = self.registry.len(), "message applied");
        self.current_html()
    }

    fn set_title(&mut self, title: &str) {
        match &mut self.shell {
            Some(shell) => shell.set_title(title),
            None => self.title = Some(title.to_owned()),
        }
    }

    /// Re-renders the current state without mutating it.
    pub fn current_html(&self) -> String {
        let content = render(&self.tree, &self.registry);
        match &self.shell {
            Some(shell) => shell.publish(&content),
            None => content,
        }
    }

    /// Events accumulated since the last [`clear_events`](Self::clear_events).
    pub fn current_events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// The most recent opaque reply payload, pass-through only.
    pub fn reply(&self) -> Option<&Value> {
        self.reply.as_ref()
    }

    /// Current title after suffix normalization, however it is tracked.
    pub fn title(&self) -> Option<&str> {
        match &self.shell {
            Some(shell) => shell.title(),
            None => self.title.as_deref(),
        }
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn initial_then_diff() {
        let mut session = RenderSession::new();
        let html = session.apply_initial(
            &json!({"0": "Hello", "1": "World", "s": ["<p>", " ", "</p>"]}),
        );
        assert_eq!(html, "<p>Hello World</p>");
        let html = session.apply_diff(&json!({"0": "Goodbye"}));
        assert_eq!(html, "<p>Goodbye World</p>");
        assert_eq!(session.current_html(), "<p>Goodbye World</p>");
    }

    #[test]
    fn apply_initial_resets_state() {
        let mut session = RenderSession::new();
        session.apply_initial(&json!({"0": 1, "s": ["", ""], "c": {"1": {"s": ["old"]}}}));
        let html = session.apply_initial(&json!({"0": "fresh", "s": ["", ""]}));
        assert_eq!(html, "fresh");
        assert!(session.registry.is_empty());
    }

    #[test]
    fn events_accumulate_until_cleared() {
        let mut session = RenderSession::new();
        session.apply_initial(&json!({"0": "x", "s": ["", ""], "e": [["a", 1]]}));
        session.apply_diff(&json!({"e": [["b", {"n": 2}]]}));
        let events = session.current_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, "a");
        assert_eq!(events[1].payload, json!({"n": 2}));
        session.clear_events();
        assert!(session.current_events().is_empty());
    }

    #[test]
    fn reply_is_passed_through() {
        let mut session = RenderSession::new();
        session.apply_initial(&json!({"0": "x", "s": ["", ""], "r": {"ref": 12}}));
        assert_eq!(session.reply(), Some(&json!({"ref": 12})));
        session.apply_diff(&json!({}));
        assert_eq!(session.reply(), Some(&json!({"ref": 12})), "reply sticks");
    }

    #[test]
    fn title_without_shell_is_tracked_verbatim() {
        let mut session = RenderSession::new();
        session.apply_initial(&json!({"0": "x", "s": ["", ""], "t": "Groceries"}));
        assert_eq!(session.title(), Some("Groceries"));
    }

    #[test]
    fn unusable_shell_degrades_to_bare_content() {
        let mut session =
            RenderSession::with_shell("<body>no mount here</body>".into(), "data-main", "m");
        let html = session.apply_initial(&json!({"0": "x", "s": ["<p>", "</p>"]}));
        assert_eq!(html, "<p>x</p>");
    }
}
