//! Property registry and the identity/session collaborator.
//!
//! Properties are stored as `property:{id}` hashes with membership in the
//! `properties` set; each property carries a `property:{id}:managers` set.
//! A session resolves the caller's accessible properties from manager
//! membership and can expand them into the task-level access set the bulk
//! engine intersects against. The engines trust this input; there is no
//! further authorization logic below this point.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::store::{Hash, Kv, property_tasks_key};

pub const PROPERTIES_SET: &str = "properties";

pub fn property_key(id: &str) -> String {
    format!("property:{}", id)
}

pub fn property_managers_key(id: &str) -> String {
    format!("property:{}:managers", id)
}

/// A registered property.
#[derive(Debug, Clone)]
pub struct Property {
    pub id: String,
    pub name: String,
}

/// Convert a display name to a safe property id.
/// Lowercases and collapses runs of non-alphanumerics to single hyphens.
pub fn sanitize_property_id(display_name: &str) -> String {
    display_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Register a new property. Errors if the name sanitizes to nothing or the
/// id is already taken.
pub fn register_property<K: Kv>(kv: &mut K, name: &str) -> Result<Property> {
    let id = sanitize_property_id(name);
    if id.is_empty() {
        return Err(Error::Validation("property name cannot be empty".into()));
    }
    if kv.get(&property_key(&id)).is_some() {
        return Err(Error::Validation(format!(
            "property '{}' already exists",
            id
        )));
    }
    let mut hash = Hash::new();
    hash.insert("id".into(), id.clone());
    hash.insert("name".into(), name.to_string());
    kv.set(&property_key(&id), hash);
    kv.add_member(PROPERTIES_SET, &id);
    Ok(Property {
        id,
        name: name.to_string(),
    })
}

/// All registered properties, id order.
pub fn list_properties<K: Kv>(kv: &K) -> Vec<Property> {
    kv.members(PROPERTIES_SET)
        .into_iter()
        .filter_map(|id| {
            let hash = kv.get(&property_key(&id))?;
            let name = hash.get("name").cloned().unwrap_or_else(|| id.clone());
            Some(Property { id, name })
        })
        .collect()
}

/// Grant a user manager access to a property.
pub fn add_manager<K: Kv>(kv: &mut K, property_id: &str, user: &str) -> Result<()> {
    if kv.get(&property_key(property_id)).is_none() {
        return Err(Error::NotFound(format!("property {}", property_id)));
    }
    kv.add_member(&property_managers_key(property_id), user);
    Ok(())
}

/// The caller's identity plus the property ids they manage.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: String,
    pub properties: Vec<String>,
}

impl Session {
    /// Resolve a session from manager membership across all properties.
    pub fn resolve<K: Kv>(kv: &K, user: &str) -> Self {
        let properties = kv
            .members(PROPERTIES_SET)
            .into_iter()
            .filter(|id| kv.members(&property_managers_key(id)).contains(user))
            .collect();
        Session {
            user: user.to_string(),
            properties,
        }
    }

}

/// Task id to owning property id, over every property the session can
/// reach. This is the access set the bulk engine intersects requested ids
/// against.
pub type AccessSet = BTreeMap<String, String>;

pub fn access_set<K: Kv>(kv: &K, session: &Session) -> AccessSet {
    let mut set = AccessSet::new();
    for property_id in &session.properties {
        for task_id in kv.members(&property_tasks_key(property_id)) {
            set.insert(task_id, property_id.clone());
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn sanitizes_property_ids() {
        assert_eq!(sanitize_property_id("Casa Verde"), "casa-verde");
        assert_eq!(sanitize_property_id("12 Oak St."), "12-oak-st");
        assert_eq!(sanitize_property_id("  !!  "), "");
    }

    #[test]
    fn register_rejects_duplicates_and_empty() {
        let mut kv = MemoryStore::default();
        register_property(&mut kv, "Casa Verde").unwrap();
        assert!(register_property(&mut kv, "casa verde").is_err());
        assert!(register_property(&mut kv, "!!").is_err());
        assert_eq!(list_properties(&kv).len(), 1);
    }

    #[test]
    fn session_sees_only_managed_properties() {
        let mut kv = MemoryStore::default();
        register_property(&mut kv, "casa verde").unwrap();
        register_property(&mut kv, "oak house").unwrap();
        add_manager(&mut kv, "casa-verde", "ana").unwrap();

        let session = Session::resolve(&kv, "ana");
        assert_eq!(session.properties, vec!["casa-verde".to_string()]);

        let stranger = Session::resolve(&kv, "nobody");
        assert!(stranger.properties.is_empty());
    }

    #[test]
    fn add_manager_requires_existing_property() {
        let mut kv = MemoryStore::default();
        assert!(matches!(
            add_manager(&mut kv, "ghost", "ana"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn access_set_spans_managed_properties() {
        let mut kv = MemoryStore::default();
        register_property(&mut kv, "casa verde").unwrap();
        register_property(&mut kv, "oak house").unwrap();
        add_manager(&mut kv, "casa-verde", "ana").unwrap();
        kv.add_member(&property_tasks_key("casa-verde"), "t1");
        kv.add_member(&property_tasks_key("oak-house"), "t2");

        let session = Session::resolve(&kv, "ana");
        let access = access_set(&kv, &session);
        assert_eq!(access.get("t1"), Some(&"casa-verde".to_string()));
        assert_eq!(access.get("t2"), None);
    }
}
