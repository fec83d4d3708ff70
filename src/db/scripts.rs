//! Setup script sources.
//!
//! A `ScriptSource` resolves a script name to its raw SQL text. The reset and
//! init scripts are executed verbatim, with no templating or parameters.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

/// Resolves setup script names to their SQL text.
pub trait ScriptSource: Send + Sync {
    /// Load the full text of the named script.
    fn load(&self, name: &str) -> impl Future<Output = io::Result<String>> + Send;
}

/// Scripts stored as files under a root directory.
#[derive(Debug, Clone)]
pub struct ScriptDir {
    root: PathBuf,
}

impl ScriptDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path the named script is read from.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl ScriptSource for ScriptDir {
    fn load(&self, name: &str) -> impl Future<Output = io::Result<String>> + Send {
        let path = self.path_of(name);
        async move { tokio::fs::read_to_string(path).await }
    }
}

/// Scripts held in memory, e.g. embedded with `include_str!`.
#[derive(Debug, Clone, Default)]
pub struct MemoryScripts {
    scripts: HashMap<String, String>,
}

impl MemoryScripts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a script, replacing any script of the same name.
    pub fn with(mut self, name: impl Into<String>, sql: impl Into<String>) -> Self {
        self.insert(name, sql);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, sql: impl Into<String>) {
        self.scripts.insert(name.into(), sql.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.scripts.get(name).map(String::as_str)
    }
}

impl ScriptSource for MemoryScripts {
    fn load(&self, name: &str) -> impl Future<Output = io::Result<String>> + Send {
        let script = self.scripts.get(name).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("script '{name}' not found"),
            )
        });
        async move { script }
    }
}
