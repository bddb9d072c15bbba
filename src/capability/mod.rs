//! Named operations installable onto a [`Target`], the dynamic counterpart
//! of the typed helpers.
//!
//! A [`Capability`] has a static form, called with an argument list, and a
//! method form, called with a receiver promise in front of its arguments.
//! Declaring only the static form yields a method that forwards to it with the
//! receiver as first argument. Capabilities reach their siblings through the
//! target they were installed on, so installing one installs its
//! dependencies first.

mod args;
mod builtin;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::trace;

pub use args::Args;

use crate::{Error, Promise, Value};

/// `Fn(target, args)`. An `Err` reports misuse synchronously; failures of the
/// work itself reject the returned promise.
pub type StaticForm = Arc<dyn Fn(&Target, Args) -> Result<Promise, Error> + Send + Sync>;
/// `Fn(target, receiver, args)`.
pub type MethodForm = Arc<dyn Fn(&Target, Promise, Args) -> Result<Promise, Error> + Send + Sync>;

#[derive(Clone)]
enum Method {
    Explicit(MethodForm),
    Forward,
}

#[derive(Clone)]
pub struct Capability {
    name: String,
    static_form: Option<StaticForm>,
    method: Method,
    dependencies: Vec<String>,
}

impl Capability {
    /// Starts a capability from its static form. Unless a method form is
    /// added, the method forwards to the static form.
    pub fn with_static<F>(name: impl Into<String>, form: F) -> CapabilityBuilder
    where
        F: Fn(&Target, Args) -> Result<Promise, Error> + Send + Sync + 'static,
    {
        CapabilityBuilder {
            name: name.into(),
            static_form: Some(Arc::new(form)),
            method_form: None,
            dependencies: Vec::new(),
        }
    }

    /// Starts a capability that only has a method form.
    pub fn with_method<F>(name: impl Into<String>, form: F) -> CapabilityBuilder
    where
        F: Fn(&Target, Promise, Args) -> Result<Promise, Error> + Send + Sync + 'static,
    {
        CapabilityBuilder {
            name: name.into(),
            static_form: None,
            method_form: Some(Arc::new(form)),
            dependencies: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn has_static(&self) -> bool {
        self.static_form.is_some()
    }

    /// `true` when the method form forwards to the static form.
    pub fn is_forwarding(&self) -> bool {
        matches!(self.method, Method::Forward)
    }

    fn method_form(&self) -> MethodForm {
        match &self.method {
            Method::Explicit(form) => form.clone(),
            Method::Forward => {
                let name = self.name.clone();
                Arc::new(move |target: &Target, receiver: Promise, args: Args| {
                    target.call(&name, args.prepend(receiver))
                })
            }
        }
    }

    /// An explicit method and the static form are set when absent or
    /// `force`d. A forwarding method is only added where no method exists.
    fn install_onto(&self, target: &Target, force: bool) {
        let explicit = !self.is_forwarding();
        if !target.has_method(&self.name) || (force && explicit) {
            target.define_method(&self.name, self.method_form());
            trace!(capability = %self.name, target = %target.name(), explicit, "method installed");
        } else {
            trace!(capability = %self.name, target = %target.name(), "method kept");
        }
        if let Some(form) = &self.static_form {
            if !target.has_static(&self.name) || force {
                target.define_static(&self.name, form.clone());
                trace!(capability = %self.name, target = %target.name(), "static installed");
            } else {
                trace!(capability = %self.name, target = %target.name(), "static kept");
            }
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("static", &self.has_static())
            .field("forwarding", &self.is_forwarding())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

pub struct CapabilityBuilder {
    name: String,
    static_form: Option<StaticForm>,
    method_form: Option<MethodForm>,
    dependencies: Vec<String>,
}

impl CapabilityBuilder {
    /// Replaces the forwarding method with an explicit one.
    pub fn method<F>(mut self, form: F) -> Self
    where
        F: Fn(&Target, Promise, Args) -> Result<Promise, Error> + Send + Sync + 'static,
    {
        self.method_form = Some(Arc::new(form));
        self
    }

    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.dependencies.contains(&name) {
                self.dependencies.push(name);
            }
        }
        self
    }

    pub fn build(self) -> Capability {
        Capability {
            name: self.name,
            static_form: self.static_form,
            method: self.method_form.map_or(Method::Forward, Method::Explicit),
            dependencies: self.dependencies,
        }
    }
}

#[derive(Default)]
struct Members {
    statics: BTreeMap<String, StaticForm>,
    methods: BTreeMap<String, MethodForm>,
}

/// A promise "constructor": a named table of static and method members.
/// Cloning shares the table.
#[derive(Clone)]
pub struct Target {
    name: Arc<str>,
    members: Arc<RwLock<Members>>,
}

impl Target {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self { name: Arc::from(name.as_ref()), members: Arc::default() }
    }

    /// The process-wide target `install_ambient` augments.
    pub fn ambient() -> &'static Target {
        static AMBIENT: OnceLock<Target> = OnceLock::new();
        AMBIENT.get_or_init(|| Target::new("Promise"))
    }

    /// A new target starting with a copy of this one's members. Later
    /// installs on either side do not affect the other.
    pub fn subclass(&self, name: impl AsRef<str>) -> Self {
        let members = self.members.read();
        let target = Target::new(name);
        {
            let mut copy = target.members.write();
            copy.statics = members.statics.clone();
            copy.methods = members.methods.clone();
        }
        target
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_static(&self, name: &str) -> bool {
        self.members.read().statics.contains_key(name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.members.read().methods.contains_key(name)
    }

    pub fn static_names(&self) -> Vec<String> {
        self.members.read().statics.keys().cloned().collect()
    }

    pub fn method_names(&self) -> Vec<String> {
        self.members.read().methods.keys().cloned().collect()
    }

    /// Sets a static member unconditionally.
    pub fn define_static(&self, name: impl Into<String>, form: StaticForm) {
        self.members.write().statics.insert(name.into(), form);
    }

    /// Sets a method member unconditionally.
    pub fn define_method(&self, name: impl Into<String>, form: MethodForm) {
        self.members.write().methods.insert(name.into(), form);
    }

    /// Calls the static member `name`.
    ///
    /// # Errors
    /// [`Error::Capability`] when no such member is installed, otherwise
    /// whatever the member reports synchronously.
    pub fn call(&self, name: &str, args: impl Into<Args>) -> Result<Promise, Error> {
        let form = self.members.read().statics.get(name).cloned();
        match form {
            Some(form) => form(self, args.into()),
            None => Err(Error::capability(name, format!("no static member on {}", self.name))),
        }
    }

    /// Calls the method member `name` on `receiver`.
    pub fn call_method(
        &self,
        receiver: impl Into<Value>,
        name: &str,
        args: impl Into<Args>,
    ) -> Result<Promise, Error> {
        let form = self.members.read().methods.get(name).cloned();
        match form {
            Some(form) => form(self, Promise::resolve(receiver), args.into()),
            None => Err(Error::capability(name, format!("no method member on {}", self.name))),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members = self.members.read();
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("statics", &members.statics.keys().collect::<Vec<_>>())
            .field("methods", &members.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Name to capability table. Capabilities are never removed; registering a
/// name again replaces its declaration for future installs.
#[derive(Default)]
pub struct Registry {
    capabilities: RwLock<BTreeMap<String, Capability>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every builtin capability.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for capability in builtin::capabilities() {
            registry.register(capability);
        }
        registry
    }

    /// The process-wide registry, populated with the builtins on first use.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::with_builtins)
    }

    /// Returns the declaration it replaced, if any.
    pub fn register(&self, capability: Capability) -> Option<Capability> {
        trace!(capability = %capability.name, "capability registered");
        self.capabilities.write().insert(capability.name.clone(), capability)
    }

    pub fn get(&self, name: &str) -> Option<Capability> {
        self.capabilities.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.capabilities.read().keys().cloned().collect()
    }

    pub fn installer(&self, name: impl Into<String>) -> Installer<'_> {
        Installer { registry: self, name: name.into() }
    }

    pub fn installers(&self) -> Vec<Installer<'_>> {
        self.names().into_iter().map(|name| self.installer(name)).collect()
    }

    /// Installs `name` onto `target` after its transitive dependencies, which
    /// are never forced.
    ///
    /// # Errors
    /// [`Error::Capability`] for an unknown name or a dependency cycle.
    pub fn install(&self, name: &str, target: &Target, force: bool) -> Result<(), Error> {
        self.install_with(name, target, force, &mut Vec::new())
    }

    /// Installs every registered capability.
    pub fn install_all(&self, target: &Target, force: bool) -> Result<(), Error> {
        for name in self.names() {
            self.install(&name, target, force)?;
        }
        Ok(())
    }

    fn install_with(
        &self,
        name: &str,
        target: &Target,
        force: bool,
        path: &mut Vec<String>,
    ) -> Result<(), Error> {
        if path.iter().any(|seen| seen == name) {
            path.push(name.to_string());
            return Err(Error::capability(name, format!("dependency cycle: {}", path.join(" -> "))));
        }
        let capability = self
            .get(name)
            .ok_or_else(|| Error::capability(name, "not registered"))?;
        path.push(name.to_string());
        for dependency in &capability.dependencies {
            self.install_with(dependency, target, false, path)?;
        }
        path.pop();
        capability.install_onto(target, force);
        Ok(())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("capabilities", &self.names()).finish()
    }
}

/// Installs one registered capability, looked up when run.
#[derive(Clone)]
pub struct Installer<'r> {
    registry: &'r Registry,
    name: String,
}

impl Installer<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn install(&self, target: &Target, force: bool) -> Result<(), Error> {
        self.registry.install(&self.name, target, force)
    }
}

impl fmt::Debug for Installer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Installer").field(&self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: i32) -> impl Fn(&Target, Args) -> Result<Promise, Error> + Send + Sync {
        move |_, _| Ok(Promise::resolve(value))
    }

    #[test]
    fn static_only_capability_forwards_its_method() {
        let capability = Capability::with_static("answer", constant(42)).build();
        assert!(capability.is_forwarding());
        let both = Capability::with_static("answer", constant(42))
            .method(|_, receiver, _| Ok(receiver))
            .build();
        assert!(!both.is_forwarding());
        let method_only = Capability::with_method("answer", |_, receiver, _| Ok(receiver)).build();
        assert!(!method_only.has_static());
    }

    #[test]
    fn dependencies_are_deduplicated_in_order() {
        let capability = Capability::with_static("x", constant(0)).depends_on(["b", "a", "b"]).build();
        assert_eq!(capability.dependencies(), ["b", "a"]);
    }

    #[test]
    fn cycles_and_unknown_names_are_reported() {
        let registry = Registry::new();
        registry.register(Capability::with_static("a", constant(1)).depends_on(["b"]).build());
        registry.register(Capability::with_static("b", constant(2)).depends_on(["a"]).build());
        registry.register(Capability::with_static("c", constant(3)).depends_on(["nope"]).build());
        let target = Target::new("T");

        let cycle = registry.install("a", &target, false).unwrap_err();
        assert!(matches!(cycle, Error::Capability { ref reason, .. } if reason.contains("a -> b -> a")));
        let unknown = registry.install("c", &target, false).unwrap_err();
        assert!(matches!(unknown, Error::Capability { ref name, .. } if name == "nope"));
        assert!(!target.has_static("a"));
    }

    #[test]
    fn subclass_copies_members_without_sharing_them() {
        let registry = Registry::new();
        registry.register(Capability::with_static("one", constant(1)).build());
        let base = Target::new("Base");
        registry.install("one", &base, false).unwrap();

        let derived = base.subclass("Derived");
        derived.define_static("two", Arc::new(constant(2)));
        assert!(derived.has_static("one"));
        assert!(derived.has_method("one"));
        assert!(!base.has_static("two"));
    }

    #[test]
    fn missing_member_is_a_capability_error() {
        let err = Target::new("T").call("nothing", Vec::<Value>::new()).unwrap_err();
        assert_eq!(err.code(), "CAPABILITY");
    }
}
