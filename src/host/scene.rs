//! In-memory stand-in for the host application.
//!
//! [`SceneHost`] keeps an object table, named text resources and one
//! active collection, and exposes them through a JSON context graph for
//! dotted property lookups. Scripts are handed to a [`ScriptRunner`]; the
//! host is headless, so it never offers a viewport context.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use super::{HostCapability, HostError, ScriptContext, ScriptRunner, StatusSnapshot};

/// One entry of the object table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneObject {
    /// Object kind, e.g. `MESH`.
    pub kind: String,
    /// Collection the object is linked into.
    pub collection: String,
    /// Whether the object is part of the current selection.
    pub selected: bool,
}

/// Headless in-memory host.
#[derive(Debug)]
pub struct SceneHost {
    version: String,
    scene: String,
    collection: String,
    objects: BTreeMap<String, SceneObject>,
    meshes: usize,
    active: Option<String>,
    texts: BTreeMap<String, String>,
    runner: ScriptRunner,
    viewport: bool,
}

impl SceneHost {
    /// Creates an empty scene named `Scene` with one `Collection`.
    #[must_use]
    pub fn new(runner: ScriptRunner) -> Self {
        Self {
            version: format!("scene-host {}", env!("CARGO_PKG_VERSION")),
            scene: "Scene".to_string(),
            collection: "Collection".to_string(),
            objects: BTreeMap::new(),
            meshes: 0,
            active: None,
            texts: BTreeMap::new(),
            runner,
            viewport: false,
        }
    }

    /// Renames the active scene.
    #[must_use]
    pub fn with_scene_name(mut self, name: impl Into<String>) -> Self {
        self.scene = name.into();
        self
    }

    /// Returns the text resource stored under `name`.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.texts.get(name).map(String::as_str)
    }

    /// Returns the object stored under `name`.
    #[must_use]
    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.get(name)
    }

    /// Returns the active object's name.
    #[must_use]
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Picks a free object name, suffixing `.001`, `.002`, ... on clash.
    fn unique_name(&self, base: &str) -> String {
        if !self.objects.contains_key(base) {
            return base.to_string();
        }
        (1_u32..)
            .map(|n| format!("{base}.{n:03}"))
            .find(|candidate| !self.objects.contains_key(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Builds the context graph property paths resolve against.
    fn context_graph(&self) -> Value {
        let active = self.active.as_ref().and_then(|name| {
            self.objects.get(name).map(|obj| {
                json!({
                    "name": name,
                    "type": obj.kind,
                    "select": obj.selected,
                    "users_collection": obj.collection,
                })
            })
        });
        let selected: Vec<&String> = self
            .objects
            .iter()
            .filter(|(_, obj)| obj.selected)
            .map(|(name, _)| name)
            .collect();

        json!({
            "scene": {
                "name": self.scene,
                "frame_current": 1,
                "object_count": self.objects.len(),
            },
            "collection": { "name": self.collection },
            "active_object": active,
            "view_layer": {
                "name": "ViewLayer",
                "objects": { "active": self.active },
            },
            "selected_objects": selected,
            "app": { "version_string": self.version },
        })
    }
}

impl Default for SceneHost {
    fn default() -> Self {
        Self::new(ScriptRunner::default())
    }
}

impl HostCapability for SceneHost {
    fn run_script(&mut self, code: &str, context: ScriptContext) -> Result<String, HostError> {
        if context == ScriptContext::Viewport && !self.viewport {
            return Err(HostError::ContextUnavailable);
        }
        self.runner.run(code)
    }

    fn write_text(&mut self, name: &str, code: &str) -> Result<(), HostError> {
        self.texts.insert(name.to_string(), code.to_string());
        Ok(())
    }

    fn resolve_property(&self, path: &str) -> Result<Option<String>, HostError> {
        let graph = self.context_graph();
        let resolved = path
            .split('.')
            .try_fold(&graph, |node, segment| node.as_object()?.get(segment));
        Ok(resolved.map(|value| match value {
            Value::String(s) => s.clone(),
            Value::Null => "None".to_string(),
            other => other.to_string(),
        }))
    }

    fn status(&self) -> Result<StatusSnapshot, HostError> {
        Ok(StatusSnapshot {
            version: self.version.clone(),
            scene: self.scene.clone(),
            active_object: self.active.clone().unwrap_or_else(|| "None".to_string()),
            object_count: self.objects.len(),
            mesh_count: self.meshes,
        })
    }

    fn select_object(&mut self, name: &str) -> Result<bool, HostError> {
        let Some(object) = self.objects.get_mut(name) else {
            return Ok(false);
        };
        object.selected = true;
        self.active = Some(name.to_string());
        Ok(true)
    }

    fn create_mesh(&mut self, name: &str) -> Result<String, HostError> {
        let assigned = self.unique_name(name);
        self.objects.insert(
            assigned.clone(),
            SceneObject {
                kind: "MESH".to_string(),
                collection: self.collection.clone(),
                selected: false,
            },
        );
        self.meshes = self.meshes.saturating_add(1);
        Ok(assigned)
    }
}
