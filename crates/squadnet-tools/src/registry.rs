//! Registry aggregating tools across all connected servers

use dashmap::DashMap;
use std::sync::Mutex;

use crate::descriptor::ToolDescriptor;

/// Tool registry keyed by tool name
///
/// Thread-safe; `list_all` preserves registration order. Name
/// collisions across servers resolve to the first registration.
#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, ToolDescriptor>,
    order: Mutex<Vec<String>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; returns false and keeps the first entry on a
    /// name collision
    pub fn register(&self, descriptor: ToolDescriptor) -> bool {
        if let Some(existing) = self.tools.get(&descriptor.name) {
            tracing::warn!(
                tool = %descriptor.name,
                first_server = %existing.server,
                duplicate_server = %descriptor.server,
                "tool name collision, keeping first registration"
            );
            return false;
        }

        self.order
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(descriptor.name.clone());
        tracing::debug!(tool = %descriptor.name, server = %descriptor.server, "registered tool");
        self.tools.insert(descriptor.name.clone(), descriptor);
        true
    }

    /// Resolve a tool by name
    pub fn lookup(&self, name: &str) -> Option<ToolDescriptor> {
        self.tools.get(name).map(|entry| entry.value().clone())
    }

    /// All registered tools, in registration order
    pub fn list_all(&self) -> Vec<ToolDescriptor> {
        let order = self.order.lock().unwrap_or_else(|e| e.into_inner());
        order
            .iter()
            .filter_map(|name| self.tools.get(name).map(|entry| entry.value().clone()))
            .collect()
    }

    /// Remove every tool registered by a server; returns how many were
    /// dropped
    pub fn remove_server(&self, server: &str) -> usize {
        let removed: Vec<String> = self
            .tools
            .iter()
            .filter(|entry| entry.value().server == server)
            .map(|entry| entry.key().clone())
            .collect();

        for name in &removed {
            self.tools.remove(name);
        }
        self.order
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|name| !removed.contains(name));

        removed.len()
    }

    pub fn count(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Drop every registered tool
    pub fn clear(&self) {
        self.tools.clear();
        self.order.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, server: &str) -> ToolDescriptor {
        ToolDescriptor::new(name, server, "test tool", serde_json::json!({"type": "object"}))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ToolRegistry::new();
        assert!(registry.register(descriptor("search_airports", "aero")));

        let found = registry.lookup("search_airports").unwrap();
        assert_eq!(found.server, "aero");
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn test_collision_keeps_first() {
        let registry = ToolRegistry::new();
        assert!(registry.register(descriptor("get_weather", "weather-a")));
        assert!(!registry.register(descriptor("get_weather", "weather-b")));

        assert_eq!(registry.count(), 1);
        assert_eq!(registry.lookup("get_weather").unwrap().server, "weather-a");
    }

    #[test]
    fn test_list_all_preserves_order() {
        let registry = ToolRegistry::new();
        registry.register(descriptor("c_tool", "s1"));
        registry.register(descriptor("a_tool", "s1"));
        registry.register(descriptor("b_tool", "s2"));

        let all = registry.list_all();
        let names: Vec<&str> = all.iter().map(|d| d.name.as_str()).collect();
        // registration order, not alphabetical
        assert_eq!(names, vec!["c_tool", "a_tool", "b_tool"]);
    }

    #[test]
    fn test_remove_server() {
        let registry = ToolRegistry::new();
        registry.register(descriptor("one", "s1"));
        registry.register(descriptor("two", "s2"));
        registry.register(descriptor("three", "s1"));

        assert_eq!(registry.remove_server("s1"), 2);
        assert_eq!(registry.count(), 1);
        assert!(registry.lookup("two").is_some());

        let all = registry.list_all();
        let names: Vec<&str> = all.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["two"]);
    }

    #[test]
    fn test_clear() {
        let registry = ToolRegistry::new();
        registry.register(descriptor("one", "s1"));
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.list_all().is_empty());
    }
}
