//! Scripted host used by unit tests.

#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};

use super::{HostCapability, HostError, ScriptContext, StatusSnapshot};

/// Host whose script behavior is driven by the code text itself:
///
/// - `panic` panics inside the host,
/// - `fail` returns an execution error with a trace,
/// - anything else echoes `ran: <code>`.
///
/// Every script call is appended to a shared log so tests can inspect the
/// requested contexts after the host has moved into a worker.
#[derive(Debug, Default)]
pub(crate) struct FakeHost {
    pub viewport: bool,
    pub objects: Vec<String>,
    pub active: Option<String>,
    pub texts: Vec<(String, String)>,
    pub calls: Arc<Mutex<Vec<(String, ScriptContext)>>>,
}

impl FakeHost {
    pub fn with_objects(names: &[&str]) -> Self {
        Self {
            objects: names.iter().map(|n| (*n).to_string()).collect(),
            ..Self::default()
        }
    }
}

impl HostCapability for FakeHost {
    #[allow(clippy::panic)]
    fn run_script(&mut self, code: &str, context: ScriptContext) -> Result<String, HostError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((code.to_string(), context));
        }
        if context == ScriptContext::Viewport && !self.viewport {
            return Err(HostError::ContextUnavailable);
        }
        match code {
            "panic" => panic!("host blew up"),
            "fail" => Err(HostError::Execution {
                message: "NameError: boom".to_string(),
                trace: Some("Traceback: line 1".to_string()),
            }),
            "silent" => Ok(String::new()),
            other => Ok(format!("ran: {other}")),
        }
    }

    fn write_text(&mut self, name: &str, code: &str) -> Result<(), HostError> {
        self.texts.retain(|(n, _)| n != name);
        self.texts.push((name.to_string(), code.to_string()));
        Ok(())
    }

    fn resolve_property(&self, path: &str) -> Result<Option<String>, HostError> {
        Ok(match path {
            "scene.name" => Some("Scene".to_string()),
            _ => None,
        })
    }

    fn status(&self) -> Result<StatusSnapshot, HostError> {
        Ok(StatusSnapshot {
            version: "4.5.0".to_string(),
            scene: "Scene".to_string(),
            active_object: self.active.clone().unwrap_or_else(|| "None".to_string()),
            object_count: self.objects.len(),
            mesh_count: self.objects.len(),
        })
    }

    fn select_object(&mut self, name: &str) -> Result<bool, HostError> {
        if self.objects.iter().any(|o| o == name) {
            self.active = Some(name.to_string());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn create_mesh(&mut self, name: &str) -> Result<String, HostError> {
        self.objects.push(name.to_string());
        Ok(name.to_string())
    }
}
