//! Command binder
//!
//! Realizes a [`CommandTree`] against clap: configures one `clap::Command`
//! per descriptor, registers positional and flagged arguments, and selects
//! a binding strategy per parameter in strict priority order. A successful
//! bind yields value suppliers that pull from the parsed `ArgMatches` at
//! execution time, plus one [`CommandExecutor`] per executable command
//! wiring the result and exception handler chains around the callable.

use std::sync::Arc;

use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::{debug, error, warn};

use crate::convert::{Conversion, ConversionResolver};
use crate::handlers::{ExceptionChain, Failure, ResultChain};
use crate::introspect::{Invoke, OptionKind};
use crate::model::{ArgumentDescriptor, CommandDescriptor, CommandId, CommandTree, OptionDescriptor};
use crate::services::{ServiceKey, Services};
use crate::type_registry::TypeRegistry;
use crate::value::{TypeKey, Value};

#[derive(Debug, Clone, thiserror::Error)]
pub enum BindError {
    #[error("command {command} has no parameter named {param}")]
    UnknownParameter { command: String, param: String },

    #[error("parameter {param} of {command} is bound more than once")]
    DuplicateParameter { command: String, param: String },

    #[error("parameter {param} of {command} has no argument or option binding")]
    UnboundParameter { command: String, param: String },

    #[error("no converter from {from} to {target} for parameter {param}")]
    NoConverter {
        from: &'static str,
        target: TypeKey,
        param: String,
    },
}

/// Pulls one parameter value out of the parsed matches.
pub type ValueSupplier = Box<dyn Fn(&ArgMatches) -> Result<Value, Failure> + Send + Sync>;

/// A fully bound command tree: the configured clap command plus the
/// executors for its executable nodes, keyed by subcommand path.
pub struct BoundCommand {
    pub command: Command,
    pub executors: Vec<(Vec<String>, CommandExecutor)>,
}

impl std::fmt::Debug for BoundCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundCommand")
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

/// Runs one executable command: gathers parameter values, invokes the
/// callable and routes the outcome through the handler chains.
pub struct CommandExecutor {
    name: String,
    invoke: Invoke,
    suppliers: Vec<ValueSupplier>,
    result_chain: ResultChain,
    exception_chain: ExceptionChain,
    types: Arc<TypeRegistry>,
    services: Arc<Services>,
}

impl CommandExecutor {
    /// Executes against the matched command's parse state and returns the
    /// exit status. Failures never propagate past this call.
    pub fn execute(&self, matches: &ArgMatches) -> i32 {
        debug!("executing command {}", self.name);
        match self.invoke_callable(matches) {
            Ok(value) => self.result_chain.run(&value),
            Err(failure) => {
                error!("command {} failed: {failure}", self.name);
                self.exception_chain.run(&failure)
            }
        }
    }

    fn invoke_callable(&self, matches: &ArgMatches) -> Result<Value, Failure> {
        let mut args = Vec::with_capacity(self.suppliers.len());
        for supplier in &self.suppliers {
            args.push(supplier(matches)?);
        }
        match &self.invoke {
            Invoke::Static(f) => f(&args),
            Invoke::Instance { ty, method } => {
                let instance = self
                    .services
                    .resolve_instance(ty, &self.types)
                    .ok_or_else(|| {
                        Failure::new(format!(
                            "no instance of {ty} available for command {}",
                            self.name
                        ))
                    })?;
                method(&instance, &args)
            }
        }
    }
}

// Short/long spellings and the value placeholder parsed from an option
// template such as "-b|--base <base>".
struct OptionSpelling {
    shorts: Vec<char>,
    longs: Vec<String>,
    value_name: Option<String>,
}

impl OptionSpelling {
    fn parse(template: &str) -> Self {
        let mut spelling = Self {
            shorts: Vec::new(),
            longs: Vec::new(),
            value_name: None,
        };
        for token in template.split_whitespace() {
            if let Some(name) = token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
                spelling.value_name = Some(name.to_string());
                continue;
            }
            for flag in token.split('|') {
                if let Some(long) = flag.strip_prefix("--") {
                    if !long.is_empty() {
                        spelling.longs.push(long.to_string());
                    }
                } else if let Some(short) = flag.strip_prefix('-') {
                    let mut chars = short.chars();
                    if let (Some(c), None) = (chars.next(), chars.next()) {
                        spelling.shorts.push(c);
                    }
                }
            }
        }
        spelling
    }

    fn name(&self) -> String {
        self.longs
            .first()
            .cloned()
            .or_else(|| self.shorts.first().map(|c| c.to_string()))
            .unwrap_or_else(|| "option".to_string())
    }

    // Positionals use the argument name as their clap id, so option ids
    // live in their own namespace to keep a same-named pair parseable.
    fn id(&self) -> String {
        format!("opt.{}", self.name())
    }

    fn apply(&self, mut arg: Arg) -> Arg {
        let mut shorts = self.shorts.iter().copied();
        if let Some(c) = shorts.next() {
            arg = arg.short(c);
        }
        for c in shorts {
            arg = arg.short_alias(c);
        }
        let mut longs = self.longs.iter().cloned();
        if let Some(long) = longs.next() {
            arg = arg.long(long);
        }
        for long in longs {
            arg = arg.alias(long);
        }
        arg
    }
}

/// Binds descriptor trees onto clap and builds executors.
pub struct CommandBinder {
    types: Arc<TypeRegistry>,
    services: Arc<Services>,
    global_converters: Vec<ServiceKey>,
    global_result_handlers: Vec<ServiceKey>,
    global_exception_handlers: Vec<ServiceKey>,
}

impl CommandBinder {
    pub fn new(types: Arc<TypeRegistry>, services: Arc<Services>) -> Self {
        Self {
            types,
            services,
            global_converters: Vec::new(),
            global_result_handlers: Vec::new(),
            global_exception_handlers: Vec::new(),
        }
    }

    /// Process-wide converter keys, appended after every command-level
    /// declaration.
    pub fn global_converters(mut self, keys: Vec<ServiceKey>) -> Self {
        self.global_converters = keys;
        self
    }

    pub fn global_result_handlers(mut self, keys: Vec<ServiceKey>) -> Self {
        self.global_result_handlers = keys;
        self
    }

    pub fn global_exception_handlers(mut self, keys: Vec<ServiceKey>) -> Self {
        self.global_exception_handlers = keys;
        self
    }

    /// Bind the tree rooted at `root`.
    pub fn bind(&self, tree: &CommandTree, root: CommandId) -> Result<BoundCommand, BindError> {
        let mut executors = Vec::new();
        let command = self.bind_node(tree, root, Vec::new(), &mut executors)?;
        Ok(BoundCommand { command, executors })
    }

    fn bind_node(
        &self,
        tree: &CommandTree,
        id: CommandId,
        parent_path: Vec<String>,
        executors: &mut Vec<(Vec<String>, CommandExecutor)>,
    ) -> Result<Command, BindError> {
        let descriptor = tree.command(id);
        let mut path = parent_path;
        path.push(descriptor.name.clone());

        let mut command = Command::new(descriptor.name.clone())
            .disable_help_flag(true)
            .disable_version_flag(true);
        if let Some(description) = &descriptor.description {
            command = command.about(description.clone());
        }
        if let Some(text) = &descriptor.extended_help_text {
            command = command.after_help(text.clone());
        }
        if !descriptor.show_in_help {
            command = command.hide(true);
        }
        if let Some(help) = &descriptor.help_option {
            let spelling = OptionSpelling::parse(&help.template);
            let arg = spelling.apply(
                Arg::new("help")
                    .action(ArgAction::Help)
                    .help("Show help information"),
            );
            command = command.arg(arg);
        }
        if let Some(version) = &descriptor.version_option {
            command = command.version(version.short_form.clone().unwrap_or_default());
            if let Some(long) = &version.long_form {
                command = command.long_version(long.clone());
            }
            let spelling = OptionSpelling::parse(&version.template);
            let arg = spelling.apply(
                Arg::new("version")
                    .action(ArgAction::Version)
                    .help("Show version information"),
            );
            command = command.arg(arg);
        }

        if let Some(invoke) = &descriptor.invoke {
            let mut suppliers: Vec<Option<ValueSupplier>> = Vec::new();
            suppliers.resize_with(descriptor.param_idents.len(), || None);

            for &argument in descriptor.arguments() {
                let argument = tree.argument(argument);
                let index = self.parameter_index(descriptor, &argument.param.ident)?;
                if suppliers[index].is_some() {
                    return Err(BindError::DuplicateParameter {
                        command: descriptor.name.clone(),
                        param: argument.param.ident.clone(),
                    });
                }
                let (next, supplier) = self.bind_argument(command, tree, id, argument)?;
                command = next;
                suppliers[index] = Some(supplier);
            }
            for &option in descriptor.options() {
                let option = tree.option(option);
                let index = self.parameter_index(descriptor, &option.param.ident)?;
                if suppliers[index].is_some() {
                    return Err(BindError::DuplicateParameter {
                        command: descriptor.name.clone(),
                        param: option.param.ident.clone(),
                    });
                }
                let (next, supplier) = self.bind_option(command, tree, id, option)?;
                command = next;
                suppliers[index] = Some(supplier);
            }

            let mut bound = Vec::with_capacity(suppliers.len());
            for (index, supplier) in suppliers.into_iter().enumerate() {
                match supplier {
                    Some(supplier) => bound.push(supplier),
                    None => {
                        return Err(BindError::UnboundParameter {
                            command: descriptor.name.clone(),
                            param: descriptor.param_idents[index].clone(),
                        })
                    }
                }
            }

            executors.push((
                path.clone(),
                CommandExecutor {
                    name: descriptor.name.clone(),
                    invoke: invoke.clone(),
                    suppliers: bound,
                    result_chain: self.result_chain(tree, id),
                    exception_chain: self.exception_chain(tree, id),
                    types: Arc::clone(&self.types),
                    services: Arc::clone(&self.services),
                },
            ));
        }

        for &child in descriptor.children() {
            let subcommand = self.bind_node(tree, child, path.clone(), executors)?;
            command = command.subcommand(subcommand);
        }
        Ok(command)
    }

    fn parameter_index(
        &self,
        descriptor: &CommandDescriptor,
        ident: &str,
    ) -> Result<usize, BindError> {
        descriptor
            .param_idents
            .iter()
            .position(|p| p == ident)
            .ok_or_else(|| BindError::UnknownParameter {
                command: descriptor.name.clone(),
                param: ident.to_string(),
            })
    }

    // Converter search order: parameter, owning command, ancestors, then
    // the process-wide list. Duplicates keep their first position.
    fn converter_keys(
        &self,
        tree: &CommandTree,
        id: CommandId,
        declared: &[ServiceKey],
    ) -> Vec<ServiceKey> {
        let mut keys = declared.to_vec();
        for ancestor in tree.ancestry(id) {
            keys.extend(tree.command(ancestor).converters.iter().cloned());
        }
        keys.extend(self.global_converters.iter().cloned());
        keys
    }

    fn handler_keys<'a>(
        &self,
        tree: &'a CommandTree,
        id: CommandId,
        select: impl Fn(&'a CommandDescriptor) -> &'a [ServiceKey],
        globals: &[ServiceKey],
    ) -> Vec<ServiceKey> {
        let mut keys = Vec::new();
        for ancestor in tree.ancestry(id) {
            keys.extend(select(tree.command(ancestor)).iter().cloned());
        }
        keys.extend(globals.iter().cloned());
        let mut unique: Vec<ServiceKey> = Vec::with_capacity(keys.len());
        for key in keys {
            if !unique.contains(&key) {
                unique.push(key);
            }
        }
        unique
    }

    fn result_chain(&self, tree: &CommandTree, id: CommandId) -> ResultChain {
        let keys = self.handler_keys(
            tree,
            id,
            |c| &c.result_handlers,
            &self.global_result_handlers,
        );
        let mut handlers = Vec::with_capacity(keys.len());
        for key in &keys {
            match self.services.resolve_result_handler(key) {
                Some(handler) => handlers.push(handler),
                None => warn!("result handler {key} is not registered"),
            }
        }
        ResultChain::new(handlers)
    }

    fn exception_chain(&self, tree: &CommandTree, id: CommandId) -> ExceptionChain {
        let keys = self.handler_keys(
            tree,
            id,
            |c| &c.exception_handlers,
            &self.global_exception_handlers,
        );
        let mut handlers = Vec::with_capacity(keys.len());
        for key in &keys {
            match self.services.resolve_exception_handler(key) {
                Some(handler) => handlers.push(handler),
                None => warn!("exception handler {key} is not registered"),
            }
        }
        ExceptionChain::new(handlers)
    }

    fn bind_argument(
        &self,
        command: Command,
        tree: &CommandTree,
        id: CommandId,
        argument: &ArgumentDescriptor,
    ) -> Result<(Command, ValueSupplier), BindError> {
        let keys = self.converter_keys(tree, id, &argument.converters);
        let resolver = ConversionResolver::new(&self.services, &self.types);
        let param = &argument.param;
        let target = param.ty.clone();
        let name = argument.name.clone();
        let multiple = argument.multiple_values;

        if multiple != Some(true) {
            if let Some(conversion) = resolver.resolve(&keys, &TypeKey::string(), &target) {
                let command = command.arg(Self::positional(argument, false));
                let supplier = self.converted_single(name, conversion, param.default.clone());
                return Ok((command, supplier));
            }
        }
        if multiple != Some(false) {
            for source in [TypeKey::string_list(), TypeKey::string_array()] {
                if let Some(conversion) = resolver.resolve(&keys, &source, &target) {
                    let command = command.arg(Self::positional(argument, true));
                    let supplier = self.converted_multi(name, conversion, param.default.clone());
                    return Ok((command, supplier));
                }
            }
        }
        if multiple != Some(true) && self.types.is_assignable(&target, &TypeKey::string()) {
            let command = command.arg(Self::positional(argument, false));
            let supplier = Self::raw_single(name, param.default.clone());
            return Ok((command, supplier));
        }
        if multiple != Some(false) {
            for source in [TypeKey::string_list(), TypeKey::string_array()] {
                if self.types.is_assignable(&target, &source) {
                    let command = command.arg(Self::positional(argument, true));
                    let supplier = Self::raw_multi(name, param.default.clone());
                    return Ok((command, supplier));
                }
            }
        }
        Err(BindError::NoConverter {
            from: if multiple == Some(true) {
                "string sequence"
            } else {
                "string"
            },
            target,
            param: param.ident.clone(),
        })
    }

    fn bind_option(
        &self,
        command: Command,
        tree: &CommandTree,
        id: CommandId,
        option: &OptionDescriptor,
    ) -> Result<(Command, ValueSupplier), BindError> {
        let keys = self.converter_keys(tree, id, &option.converters);
        let resolver = ConversionResolver::new(&self.services, &self.types);
        let param = &option.param;
        let target = param.ty.clone();
        let spelling = OptionSpelling::parse(&option.template);
        let arg_id = spelling.id();
        let kind = option.kind;

        let not_single = kind != Some(OptionKind::SingleValue);
        let not_multi = kind != Some(OptionKind::MultipleValue);
        let not_flag = kind != Some(OptionKind::NoValue);

        // Presence flag for boolean-like targets.
        if not_single && not_multi && self.types.is_assignable(&target, &TypeKey::bool()) {
            let command =
                command.arg(Self::flagged(option, &spelling, &arg_id, ArgAction::SetTrue));
            let id = arg_id;
            let supplier: ValueSupplier = Box::new(move |matches| {
                Ok(Value::Bool(matches.get_flag(&id)))
            });
            return Ok((command, supplier));
        }
        if not_multi && not_flag {
            if let Some(conversion) = resolver.resolve(&keys, &TypeKey::string(), &target) {
                let command =
                    command.arg(Self::flagged(option, &spelling, &arg_id, ArgAction::Set));
                let supplier = self.converted_single(arg_id, conversion, param.default.clone());
                return Ok((command, supplier));
            }
        }
        if not_single && not_flag {
            for source in [TypeKey::string_list(), TypeKey::string_array()] {
                if let Some(conversion) = resolver.resolve(&keys, &source, &target) {
                    let command =
                        command.arg(Self::flagged(option, &spelling, &arg_id, ArgAction::Append));
                    let supplier = self.converted_multi(arg_id, conversion, param.default.clone());
                    return Ok((command, supplier));
                }
            }
        }
        if not_multi && not_flag && self.types.is_assignable(&target, &TypeKey::string()) {
            let command = command.arg(Self::flagged(option, &spelling, &arg_id, ArgAction::Set));
            let supplier = Self::raw_single(arg_id, param.default.clone());
            return Ok((command, supplier));
        }
        if not_single && not_flag {
            for source in [TypeKey::string_list(), TypeKey::string_array()] {
                if self.types.is_assignable(&target, &source) {
                    let command =
                        command.arg(Self::flagged(option, &spelling, &arg_id, ArgAction::Append));
                    let supplier = Self::raw_multi(arg_id, param.default.clone());
                    return Ok((command, supplier));
                }
            }
        }
        // Last resort: a declared boolean converter fed by presence.
        if not_single && not_multi {
            if let Some(conversion) = resolver.resolve(&keys, &TypeKey::bool(), &target) {
                let command =
                    command.arg(Self::flagged(option, &spelling, &arg_id, ArgAction::SetTrue));
                let id = arg_id;
                let types = Arc::clone(&self.types);
                let supplier: ValueSupplier = Box::new(move |matches| {
                    conversion
                        .apply(Value::Bool(matches.get_flag(&id)), &types)
                        .map_err(Failure::from)
                });
                return Ok((command, supplier));
            }
        }
        Err(BindError::NoConverter {
            from: match kind {
                Some(OptionKind::MultipleValue) => "string sequence",
                Some(OptionKind::NoValue) => "bool",
                _ => "string",
            },
            target,
            param: param.ident.clone(),
        })
    }

    fn positional(argument: &ArgumentDescriptor, multiple: bool) -> Arg {
        let mut arg = Arg::new(argument.name.clone()).hide(!argument.show_in_help);
        if let Some(description) = &argument.description {
            arg = arg.help(description.clone());
        }
        if multiple {
            arg = arg.num_args(1..);
        }
        arg
    }

    fn flagged(
        option: &OptionDescriptor,
        spelling: &OptionSpelling,
        arg_id: &str,
        action: ArgAction,
    ) -> Arg {
        let takes_value = !matches!(action, ArgAction::SetTrue);
        let mut arg = Arg::new(arg_id.to_string())
            .action(action)
            .hide(!option.show_in_help);
        if let Some(description) = &option.description {
            arg = arg.help(description.clone());
        }
        arg = spelling.apply(arg);
        if takes_value {
            let value_name = spelling
                .value_name
                .clone()
                .unwrap_or_else(|| spelling.name());
            arg = arg.value_name(value_name);
        }
        arg
    }

    fn converted_single(
        &self,
        id: String,
        conversion: Conversion,
        default: Option<Value>,
    ) -> ValueSupplier {
        let types = Arc::clone(&self.types);
        Box::new(move |matches| match matches.get_one::<String>(&id) {
            Some(raw) => conversion
                .apply(Value::Str(raw.clone()), &types)
                .map_err(Failure::from),
            None => match &default {
                Some(value) => Ok(value.clone()),
                None => conversion.apply(Value::Null, &types).map_err(Failure::from),
            },
        })
    }

    fn converted_multi(
        &self,
        id: String,
        conversion: Conversion,
        default: Option<Value>,
    ) -> ValueSupplier {
        let types = Arc::clone(&self.types);
        Box::new(move |matches| {
            let raw: Vec<Value> = matches
                .get_many::<String>(&id)
                .map(|values| values.map(|v| Value::Str(v.clone())).collect())
                .unwrap_or_default();
            if raw.is_empty() {
                if let Some(value) = &default {
                    return Ok(value.clone());
                }
            }
            conversion
                .apply(Value::List(raw), &types)
                .map_err(Failure::from)
        })
    }

    fn raw_single(id: String, default: Option<Value>) -> ValueSupplier {
        Box::new(move |matches| match matches.get_one::<String>(&id) {
            Some(raw) => Ok(Value::Str(raw.clone())),
            None => Ok(default.clone().unwrap_or(Value::Null)),
        })
    }

    fn raw_multi(id: String, default: Option<Value>) -> ValueSupplier {
        Box::new(move |matches| {
            let raw: Vec<Value> = matches
                .get_many::<String>(&id)
                .map(|values| values.map(|v| Value::Str(v.clone())).collect())
                .unwrap_or_default();
            if raw.is_empty() {
                if let Some(value) = &default {
                    return Ok(value.clone());
                }
            }
            Ok(Value::List(raw))
        })
    }
}
