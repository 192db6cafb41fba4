//! Environment sources for `!Env`

use rustc_hash::FxHashMap;

/// Read access to environment variables
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed environment (tests, sandboxed resolution)
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: FxHashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn map_env_reads_configured_vars() {
        let env = MapEnv::new().with_var("HOST", "example.com");
        assert_eq!(env.var("HOST").as_deref(), Some("example.com"));
        assert_eq!(env.var("PORT"), None);
    }

    #[test]
    #[serial]
    fn process_env_reads_real_environment() {
        std::env::set_var("BLUEPRINT_TEST_PROCESS_ENV", "1");
        assert_eq!(ProcessEnv.var("BLUEPRINT_TEST_PROCESS_ENV").as_deref(), Some("1"));
        std::env::remove_var("BLUEPRINT_TEST_PROCESS_ENV");
        assert_eq!(ProcessEnv.var("BLUEPRINT_TEST_PROCESS_ENV"), None);
    }
}
