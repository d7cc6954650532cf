//! Program unit registration
//!
//! With no runtime reflection, program structure is declared through a
//! small registration DSL: a [`UnitSpec`] describes a command group, its
//! [`CallableSpec`]s describe the member callables, and [`ParamSpec`]s
//! describe their parameters. Annotation records carry the declared names,
//! descriptions, binding hints and converter/handler keys the model builder
//! consumes.

use std::sync::Arc;

use crate::handlers::Failure;
use crate::services::ServiceKey;
use crate::value::{TypeKey, Value};

/// Static callable: receives the bound parameter values in parameter order.
pub type StaticFn = Arc<dyn Fn(&[Value]) -> Result<Value, Failure> + Send + Sync>;

/// Instance callable: receives the resolved target instance and the bound
/// parameter values.
pub type MethodFn = Arc<dyn Fn(&Value, &[Value]) -> Result<Value, Failure> + Send + Sync>;

/// The invocation target of a callable.
#[derive(Clone)]
pub enum Invoke {
    Static(StaticFn),
    Instance { ty: TypeKey, method: MethodFn },
}

impl Invoke {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Failure> + Send + Sync + 'static,
    {
        Invoke::Static(Arc::new(f))
    }

    pub fn method<F>(ty: TypeKey, f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, Failure> + Send + Sync + 'static,
    {
        Invoke::Instance {
            ty,
            method: Arc::new(f),
        }
    }
}

/// Command annotation on a unit or callable.
#[derive(Debug, Clone)]
pub struct CommandAttr {
    pub name: Option<String>,
    pub description: Option<String>,
    pub extended_help_text: Option<String>,
    pub allow_argument_separator: bool,
    pub show_in_help: bool,
}

impl Default for CommandAttr {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            extended_help_text: None,
            allow_argument_separator: false,
            show_in_help: true,
        }
    }
}

impl CommandAttr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn extended_help_text(mut self, text: impl Into<String>) -> Self {
        self.extended_help_text = Some(text.into());
        self
    }

    pub fn allow_argument_separator(mut self) -> Self {
        self.allow_argument_separator = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.show_in_help = false;
        self
    }
}

/// Argument annotation on a parameter.
#[derive(Debug, Clone)]
pub struct ArgumentAttr {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Forced multiplicity; `None` defers to type-directed inference.
    pub multiple_values: Option<bool>,
    pub show_in_help: bool,
}

impl Default for ArgumentAttr {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            multiple_values: None,
            show_in_help: true,
        }
    }
}

impl ArgumentAttr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn multiple_values(mut self, multiple: bool) -> Self {
        self.multiple_values = Some(multiple);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.show_in_help = false;
        self
    }
}

/// Arity classification of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Boolean presence flag, takes no value.
    NoValue,
    SingleValue,
    MultipleValue,
}

/// Option annotation on a parameter.
#[derive(Debug, Clone)]
pub struct OptionAttr {
    pub template: Option<String>,
    pub description: Option<String>,
    /// Forced kind; `None` defers to type-directed inference.
    pub kind: Option<OptionKind>,
    pub show_in_help: bool,
}

impl Default for OptionAttr {
    fn default() -> Self {
        Self {
            template: None,
            description: None,
            kind: None,
            show_in_help: true,
        }
    }
}

impl OptionAttr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn kind(mut self, kind: OptionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.show_in_help = false;
        self
    }
}

/// Declared help option state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HelpDecl {
    /// Nothing declared; precedence falls through to the group, then to the
    /// process-wide default template.
    #[default]
    Unspecified,
    Declared(String),
    Suppressed,
}

/// Declared version option. Unlike help there is no default: absent unless
/// declared.
#[derive(Debug, Clone)]
pub struct VersionAttr {
    pub template: String,
    pub short_form: Option<String>,
    pub long_form: Option<String>,
}

impl VersionAttr {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            short_form: None,
            long_form: None,
        }
    }

    pub fn short_form(mut self, version: impl Into<String>) -> Self {
        self.short_form = Some(version.into());
        self
    }

    pub fn long_form(mut self, version: impl Into<String>) -> Self {
        self.long_form = Some(version.into());
        self
    }
}

/// One declared parameter of a callable.
#[derive(Clone)]
pub struct ParamSpec {
    pub ident: String,
    pub ty: TypeKey,
    pub optional: bool,
    pub default: Option<Value>,
    pub argument: Option<ArgumentAttr>,
    pub option: Option<OptionAttr>,
    pub converters: Vec<ServiceKey>,
}

impl ParamSpec {
    pub fn new(ident: impl Into<String>, ty: TypeKey) -> Self {
        Self {
            ident: ident.into(),
            ty,
            optional: false,
            default: None,
            argument: None,
            option: None,
            converters: Vec::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn argument(mut self, attr: ArgumentAttr) -> Self {
        self.argument = Some(attr);
        self
    }

    pub fn option(mut self, attr: OptionAttr) -> Self {
        self.option = Some(attr);
        self
    }

    pub fn converter(mut self, key: ServiceKey) -> Self {
        self.converters.push(key);
        self
    }
}

/// One declared callable of a unit (or a standalone callable).
#[derive(Clone)]
pub struct CallableSpec {
    pub ident: String,
    pub public: bool,
    pub is_abstract: bool,
    pub is_generic: bool,
    /// Lifecycle/equality/disposal special member, never a command.
    pub special: bool,
    pub command: Option<CommandAttr>,
    pub non_command: bool,
    pub converters: Vec<ServiceKey>,
    pub result_handlers: Vec<ServiceKey>,
    pub help: HelpDecl,
    pub version: Option<VersionAttr>,
    pub params: Vec<ParamSpec>,
    pub invoke: Invoke,
}

impl CallableSpec {
    pub fn new(ident: impl Into<String>, invoke: Invoke) -> Self {
        Self {
            ident: ident.into(),
            public: true,
            is_abstract: false,
            is_generic: false,
            special: false,
            command: None,
            non_command: false,
            converters: Vec::new(),
            result_handlers: Vec::new(),
            help: HelpDecl::Unspecified,
            version: None,
            params: Vec::new(),
            invoke,
        }
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn command(mut self, attr: CommandAttr) -> Self {
        self.command = Some(attr);
        self
    }

    /// Explicitly exclude this callable from command building.
    pub fn non_command(mut self) -> Self {
        self.non_command = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }

    pub fn abstract_member(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn generic(mut self) -> Self {
        self.is_generic = true;
        self
    }

    pub fn special(mut self) -> Self {
        self.special = true;
        self
    }

    pub fn converter(mut self, key: ServiceKey) -> Self {
        self.converters.push(key);
        self
    }

    /// Declare a handler for the callable's return value.
    pub fn result_handler(mut self, key: ServiceKey) -> Self {
        self.result_handlers.push(key);
        self
    }

    pub fn help_option(mut self, template: impl Into<String>) -> Self {
        self.help = HelpDecl::Declared(template.into());
        self
    }

    pub fn no_help_option(mut self) -> Self {
        self.help = HelpDecl::Suppressed;
        self
    }

    pub fn version_option(mut self, attr: VersionAttr) -> Self {
        self.version = Some(attr);
        self
    }
}

/// One declared command group.
#[derive(Clone)]
pub struct UnitSpec {
    pub ident: String,
    pub public: bool,
    pub is_abstract: bool,
    pub is_sealed: bool,
    pub has_generic_params: bool,
    pub command: Option<CommandAttr>,
    pub non_command: bool,
    pub converters: Vec<ServiceKey>,
    pub result_handlers: Vec<ServiceKey>,
    pub exception_handlers: Vec<ServiceKey>,
    pub help: HelpDecl,
    pub version: Option<VersionAttr>,
    pub callables: Vec<CallableSpec>,
}

impl UnitSpec {
    pub fn new(ident: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            public: true,
            is_abstract: false,
            is_sealed: false,
            has_generic_params: false,
            command: None,
            non_command: false,
            converters: Vec::new(),
            result_handlers: Vec::new(),
            exception_handlers: Vec::new(),
            help: HelpDecl::Unspecified,
            version: None,
            callables: Vec::new(),
        }
    }

    pub fn callable(mut self, callable: CallableSpec) -> Self {
        self.callables.push(callable);
        self
    }

    pub fn command(mut self, attr: CommandAttr) -> Self {
        self.command = Some(attr);
        self
    }

    /// Explicitly exclude this unit from command building.
    pub fn non_command(mut self) -> Self {
        self.non_command = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }

    pub fn abstract_unit(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn sealed(mut self) -> Self {
        self.is_sealed = true;
        self
    }

    pub fn generic(mut self) -> Self {
        self.has_generic_params = true;
        self
    }

    pub fn converter(mut self, key: ServiceKey) -> Self {
        self.converters.push(key);
        self
    }

    pub fn result_handler(mut self, key: ServiceKey) -> Self {
        self.result_handlers.push(key);
        self
    }

    pub fn exception_handler(mut self, key: ServiceKey) -> Self {
        self.exception_handlers.push(key);
        self
    }

    pub fn help_option(mut self, template: impl Into<String>) -> Self {
        self.help = HelpDecl::Declared(template.into());
        self
    }

    pub fn no_help_option(mut self) -> Self {
        self.help = HelpDecl::Suppressed;
        self
    }

    pub fn version_option(mut self, attr: VersionAttr) -> Self {
        self.version = Some(attr);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_spec_builder() {
        let p = ParamSpec::new("base", TypeKey::float())
            .default_value(Value::Float(std::f64::consts::E))
            .option(OptionAttr::new().template("-b|--base <base>"));
        assert_eq!(p.ident, "base");
        assert!(p.default.is_some());
        assert!(p.option.is_some());
        assert!(p.argument.is_none());
    }

    #[test]
    fn test_help_decl_default_is_unspecified() {
        assert_eq!(HelpDecl::default(), HelpDecl::Unspecified);
    }

    #[test]
    fn test_unit_collects_callables_in_order() {
        let unit = UnitSpec::new("MathCommands")
            .callable(CallableSpec::new("Add", Invoke::function(|_| Ok(Value::Null))))
            .callable(CallableSpec::new("Log", Invoke::function(|_| Ok(Value::Null))));
        let idents: Vec<_> = unit.callables.iter().map(|c| c.ident.as_str()).collect();
        assert_eq!(idents, ["Add", "Log"]);
    }
}
