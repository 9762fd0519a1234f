use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, OnceLock},
};

use shipyard_model::{PluginOptions, PluginSpec};
use tracing::debug;

use crate::{Builder, PluginError, Registry};

pub type BuilderFactory =
    Arc<dyn Fn(&PluginOptions) -> Result<Box<dyn Builder>, PluginError> + Send + Sync>;
pub type RegistryFactory =
    Arc<dyn Fn(&PluginOptions) -> Result<Box<dyn Registry>, PluginError> + Send + Sync>;

/// Name → factory table for builders and registries.
///
/// Filled at startup, then frozen with [`install`]. Lookups construct a fresh plugin per call
/// from the options a task carries.
#[derive(Default)]
pub struct PluginTable {
    builders: BTreeMap<String, BuilderFactory>,
    registries: BTreeMap<String, RegistryFactory>,
}

impl PluginTable {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_builder<F>(&mut self, name: &str, factory: F) -> Result<(), PluginError>
    where
        F: Fn(&PluginOptions) -> Result<Box<dyn Builder>, PluginError> + Send + Sync + 'static,
    {
        if self.builders.contains_key(name) {
            return Err(PluginError::Duplicate(name.to_string()));
        }
        debug!(target: "shipyard.plugin", builder = name, "builder registered");
        self.builders.insert(name.to_string(), Arc::new(factory));
        Ok(())
    }

    pub fn register_registry<F>(&mut self, name: &str, factory: F) -> Result<(), PluginError>
    where
        F: Fn(&PluginOptions) -> Result<Box<dyn Registry>, PluginError> + Send + Sync + 'static,
    {
        if self.registries.contains_key(name) {
            return Err(PluginError::Duplicate(name.to_string()));
        }
        debug!(target: "shipyard.plugin", registry = name, "registry registered");
        self.registries.insert(name.to_string(), Arc::new(factory));
        Ok(())
    }

    /// Configure the builder named by `spec`.
    pub fn builder(&self, spec: &PluginSpec) -> Result<Box<dyn Builder>, PluginError> {
        let factory = self
            .builders
            .get(&spec.name)
            .ok_or_else(|| PluginError::UnknownBuilder(spec.name.clone()))?;
        factory(&spec.options)
    }

    /// Configure the registry named by `spec`.
    pub fn registry(&self, spec: &PluginSpec) -> Result<Box<dyn Registry>, PluginError> {
        let factory = self
            .registries
            .get(&spec.name)
            .ok_or_else(|| PluginError::UnknownRegistry(spec.name.clone()))?;
        factory(&spec.options)
    }

    pub fn builder_names(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    pub fn registry_names(&self) -> impl Iterator<Item = &str> {
        self.registries.keys().map(String::as_str)
    }
}

impl fmt::Debug for PluginTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginTable")
            .field("builders", &self.builders.keys().collect::<Vec<_>>())
            .field("registries", &self.registries.keys().collect::<Vec<_>>())
            .finish()
    }
}

static INSTALLED: OnceLock<Arc<PluginTable>> = OnceLock::new();

/// Freeze `table` as the process-wide plugin table. Only the first call succeeds.
pub fn install(table: PluginTable) -> Result<Arc<PluginTable>, PluginError> {
    let table = Arc::new(table);
    INSTALLED
        .set(Arc::clone(&table))
        .map_err(|_| PluginError::AlreadyInstalled)?;
    Ok(table)
}

/// The table installed at startup, if any.
pub fn installed() -> Option<Arc<PluginTable>> {
    INSTALLED.get().cloned()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde::Deserialize;
    use shipyard_model::{Artifact, Fingerprint, Reference};

    use super::*;
    use crate::ExecutionContext;

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct FixedOptions {
        image: String,
    }

    struct Fixed(String);

    #[async_trait]
    impl Builder for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn build(&self, ctx: &ExecutionContext) -> Result<Artifact, PluginError> {
            ctx.ensure_active()?;
            Ok(Artifact::image(&self.0, Fingerprint::sha256("00")))
        }
    }

    struct Echo;

    #[async_trait]
    impl Registry for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn push(
            &self,
            _ctx: &ExecutionContext,
            artifact: Artifact,
        ) -> Result<Reference, PluginError> {
            Ok(Reference::new(artifact.location, artifact.fingerprint))
        }
    }

    fn table() -> PluginTable {
        let mut t = PluginTable::new();
        t.register_builder("fixed", |opts| {
            let o: FixedOptions = opts.decode().map_err(|e| PluginError::config("fixed", e))?;
            Ok(Box::new(Fixed(o.image)) as Box<dyn Builder>)
        })
        .unwrap();
        t.register_registry("echo", |_| Ok(Box::new(Echo) as Box<dyn Registry>))
            .unwrap();
        t
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut t = table();
        let err = t
            .register_registry("echo", |_| Ok(Box::new(Echo) as Box<dyn Registry>))
            .unwrap_err();
        assert!(matches!(err, PluginError::Duplicate(n) if n == "echo"));
    }

    #[test]
    fn unknown_names_fail_clearly() {
        let t = table();
        let err = t.builder(&PluginSpec::new("nixpacks")).err().unwrap();
        assert_eq!(err.to_string(), "unknown builder: nixpacks");
        let err = t.registry(&PluginSpec::new("ghcr")).err().unwrap();
        assert_eq!(err.to_string(), "unknown registry: ghcr");
    }

    #[test]
    fn options_are_decoded_per_plugin() {
        let t = table();
        let spec = PluginSpec::new("fixed")
            .with_options(PluginOptions::new().with("image", "nginx:1.27"));
        assert_eq!(t.builder(&spec).unwrap().name(), "fixed");

        let bad = PluginSpec::new("fixed").with_options(
            PluginOptions::new()
                .with("image", "nginx")
                .with("colour", "blue"),
        );
        assert!(matches!(
            t.builder(&bad).err().unwrap(),
            PluginError::Config { .. }
        ));
    }

    #[test]
    fn names_are_listed_sorted() {
        let t = table();
        assert_eq!(t.builder_names().collect::<Vec<_>>(), ["fixed"]);
        assert_eq!(t.registry_names().collect::<Vec<_>>(), ["echo"]);
    }

    #[tokio::test]
    async fn installed_table_is_write_once() {
        let first = install(table()).unwrap();
        assert!(matches!(install(PluginTable::new()), Err(PluginError::AlreadyInstalled)));

        let seen = installed().unwrap();
        assert!(Arc::ptr_eq(&first, &seen));

        let spec = PluginSpec::new("fixed")
            .with_options(PluginOptions::new().with("image", "redis:7"));
        let ctx = ExecutionContext::new(std::time::Duration::from_secs(5));
        let artifact = seen.builder(&spec).unwrap().build(&ctx).await.unwrap();
        assert_eq!(artifact.location, "redis:7");
    }
}
