//! Registry of collector builders.
//!
//! See [`Builders`] for details.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::collector::{BuildContext, Collector, CollectorBuilder};
use crate::collectors;
use crate::error::{Error, Result};

/// Maps collector names to the functions constructing them.
///
/// The process-wide instance returned by [`Builders::global`] is populated
/// once with the built-in collectors and read-only afterwards. Embedders with
/// their own collectors assemble a [`Builders`] themselves, usually starting
/// from [`Builders::with_builtins`].
///
/// ```
/// # use stream_exporter::builder::Builders;
/// let names = Builders::global().available();
/// assert!(names.contains(&"net"));
/// ```
#[derive(Debug, Default)]
pub struct Builders {
    builders: BTreeMap<&'static str, CollectorBuilder>,
}

impl Builders {
    /// The process-wide registry of built-in collectors.
    pub fn global() -> &'static Builders {
        static GLOBAL: OnceLock<Builders> = OnceLock::new();
        GLOBAL.get_or_init(Builders::with_builtins)
    }

    /// A registry holding every collector shipped with this crate.
    pub fn with_builtins() -> Self {
        let mut builders = Builders::default();
        collectors::register_builtins(&mut builders);
        builders
    }

    /// Associates `name` with `builder`.
    ///
    /// # Panics
    ///
    /// Registering the same name twice is a programming error and panics.
    pub fn register(&mut self, name: &'static str, builder: CollectorBuilder) {
        if let Err(e) = self.try_register(name, builder) {
            panic!("{e}");
        }
    }

    /// Like [`Builders::register`] but returns an error on duplicates.
    pub fn try_register(&mut self, name: &'static str, builder: CollectorBuilder) -> Result<()> {
        if self.builders.contains_key(name) {
            return Err(Error::DuplicateCollector(name.to_owned()));
        }
        self.builders.insert(name, builder);
        Ok(())
    }

    /// All registered collector names, sorted.
    pub fn available(&self) -> Vec<&'static str> {
        self.builders.keys().copied().collect()
    }

    /// Constructs the collector registered as `ctx.name`.
    ///
    /// Errors of the builder itself are passed through unchanged.
    pub fn build(&self, ctx: &BuildContext<'_>) -> Result<Box<dyn Collector>> {
        let builder = self
            .builders
            .get(ctx.name)
            .ok_or_else(|| Error::CollectorNotFound(ctx.name.to_owned()))?;
        builder(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StandaloneHost;
    use crate::metrics::sample::Sample;
    use crate::registry::Descriptor;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Empty;

    impl Collector for Empty {
        fn describe(&self) -> Vec<Arc<Descriptor>> {
            vec![]
        }

        fn collect(&self) -> Vec<Sample> {
            vec![]
        }
    }

    fn empty(_: &BuildContext<'_>) -> Result<Box<dyn Collector>> {
        Ok(Box::new(Empty))
    }

    fn failing(ctx: &BuildContext<'_>) -> Result<Box<dyn Collector>> {
        Err(Error::InvalidName(ctx.name.to_owned()))
    }

    fn context(name: &str) -> BuildContext<'_> {
        BuildContext {
            name,
            config: None,
            namespace: "test",
            host: Arc::new(StandaloneHost::default()),
        }
    }

    #[test]
    fn builtins_are_available() {
        assert_eq!(
            vec!["base", "cpu", "disk", "media", "memory", "net"],
            Builders::global().available()
        );
    }

    #[test]
    fn unknown_name_is_not_found() {
        let builders = Builders::default();
        assert!(matches!(
            builders.build(&context("gpu")),
            Err(Error::CollectorNotFound(name)) if name == "gpu"
        ));
    }

    #[test]
    fn builder_errors_are_propagated() {
        let mut builders = Builders::default();
        builders.register("broken", failing);
        assert!(matches!(
            builders.build(&context("broken")),
            Err(Error::InvalidName(name)) if name == "broken"
        ));
    }

    #[test]
    fn registered_builder_is_invoked() {
        let mut builders = Builders::default();
        builders.register("empty", empty);
        assert!(builders.build(&context("empty")).is_ok());
    }

    #[test]
    fn try_register_rejects_duplicates() {
        let mut builders = Builders::default();
        builders.try_register("empty", empty).unwrap();
        assert!(matches!(
            builders.try_register("empty", empty),
            Err(Error::DuplicateCollector(_))
        ));
        assert_eq!(vec!["empty"], builders.available());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_registration_panics() {
        let mut builders = Builders::default();
        builders.register("empty", empty);
        builders.register("empty", empty);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_builtin_panics() {
        let mut builders = Builders::with_builtins();
        builders.register("net", empty);
    }
}
