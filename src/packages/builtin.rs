//! Packages compiled into the host

use serde_json::json;

use super::registry::{
    component_loader, module_loader, Component, ComponentModule, ComponentRegistry, PackageModule, PackageRegistry,
};

/// Packages whose bundles are installed but export no page registry yet
const PENDING_PACKAGES: &[&str] = &["mi", "rmf", "pmbook", "veripicks"];

fn registry_of(slug: &str, entries: &[(&str, &str)]) -> ComponentRegistry {
    entries
        .iter()
        .map(|(route, title)| {
            let component = Component {
                id: format!("{}/{}", slug, route),
                title: title.to_string(),
                props: json!({ "package": slug }),
            };
            (route.to_string(), component_loader(ComponentModule::Default(component)))
        })
        .collect()
}

fn core_module() -> PackageModule {
    PackageModule {
        pages: Some(registry_of(
            "core",
            &[("home", "Home"), ("profile", "Profile"), ("organizations", "Organizations")],
        )),
        components: Some(registry_of(
            "core",
            &[("app-menu", "Application menu"), ("application-launcher", "Application launcher")],
        )),
    }
}

fn chat_module() -> PackageModule {
    PackageModule {
        pages: Some(registry_of("chat", &[("home", "Chat")])),
        components: Some(registry_of(
            "chat",
            &[("chat-content", "Conversation"), ("context-panel", "Context panel")],
        )),
    }
}

fn admin_module() -> PackageModule {
    PackageModule {
        pages: Some(registry_of(
            "admin",
            &[
                ("home", "Administration"),
                ("users", "Users"),
                ("applications", "Applications"),
                ("organizations", "Organizations"),
                ("settings", "Settings"),
            ],
        )),
        components: None,
    }
}

/// The static slug table: `core`, `chat`, `admin` and the pending packages
pub fn builtin_registry() -> PackageRegistry {
    let mut registry = PackageRegistry::new()
        .with_loader("core", module_loader(Some(core_module())))
        .with_loader("chat", module_loader(Some(chat_module())))
        .with_loader("admin", module_loader(Some(admin_module())));

    for slug in PENDING_PACKAGES {
        registry.register(*slug, module_loader(Some(PackageModule::default())));
    }
    registry
}
