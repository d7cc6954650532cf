//! Command model builder
//!
//! Turns registered program units into command descriptor trees: applies
//! the inclusion rules, derives default names with the case transforms,
//! classifies parameters as arguments or options, and resolves help and
//! version option precedence.

use tracing::debug;

use crate::casing::{kebab_case, snake_case};
use crate::introspect::{
    CallableSpec, CommandAttr, HelpDecl, OptionKind, ParamSpec, UnitSpec, VersionAttr,
};
use crate::model::{
    ArgumentDescriptor, CommandDescriptor, CommandId, CommandTree, HelpOptionDescriptor,
    ModelError, OptionDescriptor, VersionOptionDescriptor,
};
use crate::type_registry::TypeRegistry;
use crate::value::TypeKey;

/// Help option template installed when nothing is declared anywhere.
pub const DEFAULT_HELP_TEMPLATE: &str = "-?|-h|--help";

enum ParamBinding {
    Argument(ArgumentDescriptor),
    Option(OptionDescriptor),
}

/// Builds [`CommandTree`]s from unit and callable registrations.
pub struct CommandModelBuilder {
    help_template: String,
}

impl Default for CommandModelBuilder {
    fn default() -> Self {
        Self {
            help_template: DEFAULT_HELP_TEMPLATE.to_string(),
        }
    }
}

impl CommandModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the process-wide default help template.
    pub fn help_template(mut self, template: impl Into<String>) -> Self {
        self.help_template = template.into();
        self
    }

    /// Build the command tree for a unit. `Ok(None)` means the unit does
    /// not qualify as a command.
    pub fn build_unit(
        &self,
        types: &TypeRegistry,
        unit: &UnitSpec,
    ) -> Result<Option<CommandTree>, ModelError> {
        if !Self::is_unit_command(unit) {
            debug!("unit {} does not qualify as a command", unit.ident);
            return Ok(None);
        }
        let mut tree = CommandTree::new();
        let root = tree.insert_command(self.command_from_unit(unit));
        tree.set_root(root);
        for callable in &unit.callables {
            if let Some(child) = self.build_callable_in(&mut tree, types, callable, Some(unit))? {
                tree.attach_child(root, child)?;
            }
        }
        Ok(Some(tree))
    }

    /// Build the command tree for a standalone callable. `Ok(None)` means
    /// the callable does not qualify or has an unbindable parameter.
    pub fn build_callable(
        &self,
        types: &TypeRegistry,
        callable: &CallableSpec,
    ) -> Result<Option<CommandTree>, ModelError> {
        let mut tree = CommandTree::new();
        match self.build_callable_in(&mut tree, types, callable, None)? {
            Some(root) => {
                tree.set_root(root);
                Ok(Some(tree))
            }
            None => Ok(None),
        }
    }

    fn build_callable_in(
        &self,
        tree: &mut CommandTree,
        types: &TypeRegistry,
        callable: &CallableSpec,
        unit: Option<&UnitSpec>,
    ) -> Result<Option<CommandId>, ModelError> {
        if !Self::is_callable_command(callable) {
            debug!("callable {} does not qualify as a command", callable.ident);
            return Ok(None);
        }
        // Classify every parameter before touching the tree so an
        // unbindable parameter leaves no partial command behind.
        let mut bindings = Vec::with_capacity(callable.params.len());
        for param in &callable.params {
            if Self::is_argument(param) {
                bindings.push(ParamBinding::Argument(Self::create_argument(param)));
            } else if Self::is_option(param) {
                bindings.push(ParamBinding::Option(Self::create_option(types, param)));
            } else {
                debug!(
                    "parameter {} of {} is neither argument nor option; dropping the command",
                    param.ident, callable.ident
                );
                return Ok(None);
            }
        }
        let id = tree.insert_command(self.command_from_callable(callable, unit));
        for binding in bindings {
            match binding {
                ParamBinding::Argument(descriptor) => {
                    let arg = tree.insert_argument(descriptor);
                    tree.attach_argument(id, arg);
                }
                ParamBinding::Option(descriptor) => {
                    let opt = tree.insert_option(descriptor);
                    tree.attach_option(id, opt);
                }
            }
        }
        Ok(Some(id))
    }

    // A unit qualifies unless explicitly excluded, abstract-and-not-sealed,
    // non-public, or generic.
    fn is_unit_command(unit: &UnitSpec) -> bool {
        !unit.non_command
            && !(unit.is_abstract && !unit.is_sealed)
            && unit.public
            && !unit.has_generic_params
    }

    // A callable qualifies unless explicitly excluded, special, abstract,
    // generic, or non-public.
    fn is_callable_command(callable: &CallableSpec) -> bool {
        !callable.special
            && !callable.non_command
            && !callable.is_abstract
            && !callable.is_generic
            && callable.public
    }

    fn is_argument(param: &ParamSpec) -> bool {
        if param.argument.is_some() {
            return true;
        }
        if param.option.is_some() {
            return false;
        }
        if param.ty == TypeKey::bool() {
            return false;
        }
        if param.default.is_some() || param.optional {
            return false;
        }
        true
    }

    fn is_option(param: &ParamSpec) -> bool {
        param.argument.is_none()
    }

    fn create_argument(param: &ParamSpec) -> ArgumentDescriptor {
        let attr = param.argument.clone().unwrap_or_default();
        let name = attr
            .name
            .unwrap_or_else(|| snake_case(&param.ident));
        let mut descriptor = ArgumentDescriptor::new(name, param.clone());
        descriptor.description = Some(
            attr.description
                .unwrap_or_else(|| Self::param_display(param)),
        );
        descriptor.multiple_values = attr.multiple_values;
        descriptor.show_in_help = attr.show_in_help;
        descriptor
    }

    fn create_option(types: &TypeRegistry, param: &ParamSpec) -> OptionDescriptor {
        let attr = param.option.clone().unwrap_or_default();
        // Kind before template: the value placeholder tracks the kind.
        let kind = attr.kind.or_else(|| {
            types
                .is_assignable(&param.ty, &TypeKey::bool())
                .then_some(OptionKind::NoValue)
        });
        let template = attr.template.unwrap_or_else(|| {
            Self::option_template(&param.ident, kind != Some(OptionKind::NoValue))
        });
        let mut descriptor = OptionDescriptor::new(template, param.clone());
        descriptor.description = Some(
            attr.description
                .unwrap_or_else(|| Self::param_display(param)),
        );
        descriptor.kind = kind;
        descriptor.show_in_help = attr.show_in_help;
        descriptor
    }

    fn command_from_unit(&self, unit: &UnitSpec) -> CommandDescriptor {
        let attr = unit.command.clone().unwrap_or_default();
        let name = attr
            .name
            .unwrap_or_else(|| Self::command_name(&unit.ident));
        let mut descriptor = CommandDescriptor::new(name);
        descriptor.description = Some(attr.description.unwrap_or_else(|| unit.ident.clone()));
        descriptor.extended_help_text = attr.extended_help_text;
        descriptor.show_in_help = attr.show_in_help;
        descriptor.allow_argument_separator = attr.allow_argument_separator;
        descriptor.converters = unit.converters.clone();
        descriptor.result_handlers = unit.result_handlers.clone();
        descriptor.exception_handlers = unit.exception_handlers.clone();
        descriptor.help_option = self.resolve_help(&unit.help, None);
        descriptor.version_option = unit.version.as_ref().map(Self::version_descriptor);
        descriptor
    }

    fn command_from_callable(
        &self,
        callable: &CallableSpec,
        unit: Option<&UnitSpec>,
    ) -> CommandDescriptor {
        let attr = callable.command.clone().unwrap_or_else(CommandAttr::new);
        let name = attr
            .name
            .unwrap_or_else(|| Self::command_name(&callable.ident));
        let mut descriptor = CommandDescriptor::new(name);
        descriptor.description = Some(
            attr.description
                .unwrap_or_else(|| Self::callable_display(callable)),
        );
        descriptor.extended_help_text = attr.extended_help_text;
        descriptor.show_in_help = attr.show_in_help;
        descriptor.allow_argument_separator = attr.allow_argument_separator;
        descriptor.invoke = Some(callable.invoke.clone());
        descriptor.param_idents = callable.params.iter().map(|p| p.ident.clone()).collect();
        descriptor.converters = callable.converters.clone();
        // Group-level result and exception handlers are not collected into
        // a member command; they reach it through ancestor traversal.
        descriptor.result_handlers = callable.result_handlers.clone();
        descriptor.help_option = self.resolve_help(&callable.help, unit.map(|u| &u.help));
        descriptor.version_option = callable
            .version
            .as_ref()
            .or_else(|| unit.and_then(|u| u.version.as_ref()))
            .map(Self::version_descriptor);
        descriptor
    }

    fn resolve_help(
        &self,
        own: &HelpDecl,
        group: Option<&HelpDecl>,
    ) -> Option<HelpOptionDescriptor> {
        let template = match own {
            HelpDecl::Declared(template) => Some(template.clone()),
            HelpDecl::Suppressed => None,
            HelpDecl::Unspecified => match group {
                Some(HelpDecl::Declared(template)) => Some(template.clone()),
                Some(HelpDecl::Suppressed) => None,
                _ => Some(self.help_template.clone()),
            },
        };
        template.map(|template| HelpOptionDescriptor { template })
    }

    fn version_descriptor(attr: &VersionAttr) -> VersionOptionDescriptor {
        VersionOptionDescriptor {
            template: attr.template.clone(),
            short_form: attr.short_form.clone(),
            long_form: attr.long_form.clone(),
        }
    }

    /// Default command name: kebab-cased identifier with a trailing
    /// "command"/"commands" suffix stripped.
    fn command_name(ident: &str) -> String {
        let name = kebab_case(ident);
        let stripped = name
            .strip_suffix("command")
            .filter(|rest| !rest.is_empty())
            .or_else(|| {
                name.strip_suffix("commands")
                    .filter(|rest| !rest.is_empty())
            })
            .unwrap_or(&name);
        stripped.trim_matches('-').to_string()
    }

    /// Default option template: `-x` for single-letter names, `--long-name`
    /// otherwise, with a snake-cased value placeholder when the option takes
    /// a value.
    fn option_template(ident: &str, takes_value: bool) -> String {
        let name = kebab_case(ident);
        let flag = if name.chars().count() == 1 {
            format!("-{name}")
        } else {
            format!("--{name}")
        };
        if takes_value {
            format!("{flag} <{}>", snake_case(ident))
        } else {
            flag
        }
    }

    fn param_display(param: &ParamSpec) -> String {
        format!("{} {}", param.ty, param.ident)
    }

    fn callable_display(callable: &CallableSpec) -> String {
        let params: Vec<&str> = callable.params.iter().map(|p| p.ident.as_str()).collect();
        format!("{}({})", callable.ident, params.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::{ArgumentAttr, Invoke};
    use crate::value::Value;

    fn noop() -> Invoke {
        Invoke::function(|_| Ok(Value::Null))
    }

    fn builder() -> CommandModelBuilder {
        CommandModelBuilder::new()
    }

    fn types() -> TypeRegistry {
        TypeRegistry::with_defaults()
    }

    #[test]
    fn test_unit_name_strips_commands_suffix() {
        assert_eq!(CommandModelBuilder::command_name("MathCommands"), "math");
        assert_eq!(CommandModelBuilder::command_name("LogCommand"), "log");
        assert_eq!(CommandModelBuilder::command_name("Command"), "command");
        assert_eq!(CommandModelBuilder::command_name("Equal"), "equal");
    }

    #[test]
    fn test_option_template_derivation() {
        assert_eq!(
            CommandModelBuilder::option_template("base", true),
            "--base <base>"
        );
        assert_eq!(CommandModelBuilder::option_template("b", true), "-b <b>");
        assert_eq!(
            CommandModelBuilder::option_template("ignoreCase", false),
            "--ignore-case"
        );
        assert_eq!(
            CommandModelBuilder::option_template("ignoreCase", true),
            "--ignore-case <ignore_case>"
        );
    }

    #[test]
    fn test_bool_parameter_becomes_no_value_option() {
        let tree = builder()
            .build_callable(
                &types(),
                &CallableSpec::new("Equal", noop())
                    .param(ParamSpec::new("left", TypeKey::string()))
                    .param(ParamSpec::new("ignoreCase", TypeKey::bool())),
            )
            .unwrap()
            .unwrap();
        let root = tree.root().unwrap();
        assert_eq!(tree.command(root).arguments().len(), 1);
        let options = tree.command(root).options();
        assert_eq!(options.len(), 1);
        let opt = tree.option(options[0]);
        assert_eq!(opt.kind, Some(OptionKind::NoValue));
        assert_eq!(opt.template, "--ignore-case");
    }

    #[test]
    fn test_defaulted_parameter_becomes_option() {
        let tree = builder()
            .build_callable(
                &types(),
                &CallableSpec::new("Log", noop())
                    .param(ParamSpec::new("value", TypeKey::float()))
                    .param(
                        ParamSpec::new("base", TypeKey::float())
                            .default_value(Value::Float(std::f64::consts::E)),
                    ),
            )
            .unwrap()
            .unwrap();
        let root = tree.root().unwrap();
        assert_eq!(tree.command(root).arguments().len(), 1);
        let opt = tree.option(tree.command(root).options()[0]);
        assert_eq!(opt.template, "--base <base>");
        assert_eq!(opt.kind, None);
    }

    #[test]
    fn test_explicit_argument_annotation_overrides_default_rule() {
        let tree = builder()
            .build_callable(
                &types(),
                &CallableSpec::new("Run", noop()).param(
                    ParamSpec::new("force", TypeKey::bool()).argument(ArgumentAttr::new()),
                ),
            )
            .unwrap()
            .unwrap();
        let root = tree.root().unwrap();
        assert_eq!(tree.command(root).arguments().len(), 1);
        assert!(tree.command(root).options().is_empty());
    }

    #[test]
    fn test_excluded_unit_builds_nothing() {
        let unit = UnitSpec::new("MathCommands").non_command();
        assert!(builder().build_unit(&types(), &unit).unwrap().is_none());

        let private = UnitSpec::new("MathCommands").private();
        assert!(builder().build_unit(&types(), &private).unwrap().is_none());

        let abstract_open = UnitSpec::new("MathCommands").abstract_unit();
        assert!(builder()
            .build_unit(&types(), &abstract_open)
            .unwrap()
            .is_none());

        let abstract_sealed = UnitSpec::new("MathCommands").abstract_unit().sealed();
        assert!(builder()
            .build_unit(&types(), &abstract_sealed)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_excluded_callables_are_skipped() {
        let unit = UnitSpec::new("MathCommands")
            .callable(CallableSpec::new("Add", noop()))
            .callable(CallableSpec::new("Equals", noop()).special())
            .callable(CallableSpec::new("Helper", noop()).private());
        let tree = builder().build_unit(&types(), &unit).unwrap().unwrap();
        let root = tree.root().unwrap();
        assert_eq!(tree.command(root).children().len(), 1);
        assert_eq!(tree.command(tree.command(root).children()[0]).name, "add");
    }

    #[test]
    fn test_help_precedence() {
        let b = builder();
        let own = b.resolve_help(&HelpDecl::Declared("--assist".into()), None);
        assert_eq!(own.unwrap().template, "--assist");

        let suppressed = b.resolve_help(&HelpDecl::Suppressed, None);
        assert!(suppressed.is_none());

        let from_group = b.resolve_help(
            &HelpDecl::Unspecified,
            Some(&HelpDecl::Declared("--assist".into())),
        );
        assert_eq!(from_group.unwrap().template, "--assist");

        let group_suppressed =
            b.resolve_help(&HelpDecl::Unspecified, Some(&HelpDecl::Suppressed));
        assert!(group_suppressed.is_none());

        let fallback = b.resolve_help(&HelpDecl::Unspecified, None);
        assert_eq!(fallback.unwrap().template, DEFAULT_HELP_TEMPLATE);
    }

    #[test]
    fn test_version_has_no_default() {
        let tree = builder()
            .build_callable(&types(), &CallableSpec::new("Add", noop()))
            .unwrap()
            .unwrap();
        let root = tree.root().unwrap();
        assert!(tree.command(root).version_option.is_none());
        assert!(tree.command(root).help_option.is_some());
    }

    #[test]
    fn test_group_handlers_stay_on_group() {
        let unit = UnitSpec::new("MathCommands")
            .result_handler("console_result".into())
            .exception_handler("console_error".into())
            .callable(CallableSpec::new("Add", noop()));
        let tree = builder().build_unit(&types(), &unit).unwrap().unwrap();
        let root = tree.root().unwrap();
        let child = tree.command(root).children()[0];
        assert_eq!(tree.command(root).result_handlers.len(), 1);
        assert_eq!(tree.command(root).exception_handlers.len(), 1);
        assert!(tree.command(child).result_handlers.is_empty());
        assert!(tree.command(child).exception_handlers.is_empty());
    }

    #[test]
    fn test_duplicate_child_names_fail_the_build() {
        let unit = UnitSpec::new("MathCommands")
            .callable(CallableSpec::new("Add", noop()))
            .callable(CallableSpec::new("add", noop()));
        assert!(builder().build_unit(&types(), &unit).is_err());
    }

    #[test]
    fn test_name_derivation_is_stable() {
        let b = builder();
        let t = types();
        let spec = CallableSpec::new("ParseHTTPResponse", noop());
        let first = b.build_callable(&t, &spec).unwrap().unwrap();
        let second = b.build_callable(&t, &spec).unwrap().unwrap();
        let name = |tree: &CommandTree| tree.command(tree.root().unwrap()).name.clone();
        assert_eq!(name(&first), name(&second));
        assert_eq!(name(&first), "parse-http-response");
    }
}
