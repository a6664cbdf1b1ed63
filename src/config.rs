use crate::error::{Error, Result};
use crate::executor::PanicStrategy;

const MIN_STACK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: Option<usize>,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,

    /// Admitted tasks whose `run` has not finished, allowed before `submit`
    /// rejects.
    pub max_pending: usize,
    pub panic_strategy: PanicStrategy,

    /// Name of the thread spawned by `Executor::with_dispatcher_thread`.
    pub dispatcher_thread_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: None,
            thread_name_prefix: "handoff-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
            max_pending: 10_000,
            panic_strategy: PanicStrategy::default(),
            dispatcher_thread_name: "handoff-main".to_string(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > 1024 {
                return Err(Error::config("num_threads too large (max 1024)"));
            }
        }

        if let Some(size) = self.stack_size {
            if size < MIN_STACK_SIZE {
                return Err(Error::config(format!(
                    "stack_size must be at least {} bytes",
                    MIN_STACK_SIZE
                )));
            }
        }

        if self.max_pending == 0 {
            return Err(Error::config("max_pending must be > 0"));
        }

        if self.dispatcher_thread_name.is_empty() {
            return Err(Error::config("dispatcher_thread_name must not be empty"));
        }

        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn max_pending(mut self, max: usize) -> Self {
        self.config.max_pending = max;
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn dispatcher_thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.dispatcher_thread_name = name.into();
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.worker_threads() >= 1);
    }

    #[test]
    fn test_builder() {
        let config = Config::builder()
            .num_threads(3)
            .thread_name_prefix("fetch")
            .max_pending(8)
            .panic_strategy(PanicStrategy::Isolate)
            .build()
            .unwrap();

        assert_eq!(config.worker_threads(), 3);
        assert_eq!(config.thread_name_prefix, "fetch");
        assert_eq!(config.max_pending, 8);
        assert_eq!(config.panic_strategy, PanicStrategy::Isolate);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::builder().num_threads(0).build().is_err());
        assert!(Config::builder().num_threads(4096).build().is_err());
        assert!(Config::builder().max_pending(0).build().is_err());
        assert!(Config::builder().stack_size(1024).build().is_err());
        assert!(Config::builder().dispatcher_thread_name("").build().is_err());
    }
}
