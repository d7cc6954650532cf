//! Application surface
//!
//! [`CommandLineApp`] is the handle the hosting entry point uses: it owns
//! the type and service registries, the process-wide converter and handler
//! key lists, the clap root command and the executor table. Program units
//! are registered with [`CommandLineApp::command_unit`] /
//! [`CommandLineApp::command_callable`]; [`CommandLineApp::run_from`]
//! parses an argv sequence, descends to the deepest matched subcommand and
//! runs its executor.

use std::collections::HashMap;
use std::ffi::OsString;
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::Command;
use tracing::debug;

use crate::binder::{BindError, CommandBinder, CommandExecutor};
use crate::introspect::{CallableSpec, UnitSpec};
use crate::model::{CommandId, CommandTree, ModelError};
use crate::model_builder::CommandModelBuilder;
use crate::services::{
    default_converter_keys, default_exception_handler_keys, default_result_handler_keys,
    ServiceKey, Services,
};
use crate::type_registry::TypeRegistry;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("unit {0} is not supported as a command")]
    UnsupportedUnit(String),

    #[error("callable {0} is not supported as a command")]
    UnsupportedCallable(String),

    #[error("a command named {0} is already registered")]
    DuplicateCommand(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Bind(#[from] BindError),
}

/// The command-line application handle.
pub struct CommandLineApp {
    root: Command,
    types: Arc<TypeRegistry>,
    services: Arc<Services>,
    builder: CommandModelBuilder,
    global_converters: Vec<ServiceKey>,
    global_result_handlers: Vec<ServiceKey>,
    global_exception_handlers: Vec<ServiceKey>,
    executors: HashMap<Vec<String>, CommandExecutor>,
}

impl CommandLineApp {
    /// An application with the default type registry, services and
    /// converter/handler sets.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_registries(name, TypeRegistry::with_defaults(), Services::with_defaults())
    }

    /// An application over caller-provided registries. The default
    /// converter and handler key lists are still installed; replace them
    /// with the `add_*` methods as needed.
    pub fn with_registries(
        name: impl Into<String>,
        types: TypeRegistry,
        services: Services,
    ) -> Self {
        Self {
            root: Command::new(name.into()),
            types: Arc::new(types),
            services: Arc::new(services),
            builder: CommandModelBuilder::new(),
            global_converters: default_converter_keys(),
            global_result_handlers: default_result_handler_keys(),
            global_exception_handlers: default_exception_handler_keys(),
            executors: HashMap::new(),
        }
    }

    pub fn about(mut self, text: impl Into<String>) -> Self {
        self.root = self.root.about(text.into());
        self
    }

    /// Replace the default help template used when no command declares one.
    pub fn help_template(mut self, template: impl Into<String>) -> Self {
        self.builder = self.builder.help_template(template);
        self
    }

    /// Append a process-wide converter key, consulted after all
    /// command-level declarations.
    pub fn add_converter(&mut self, key: ServiceKey) -> &mut Self {
        self.global_converters.push(key);
        self
    }

    pub fn add_result_handler(&mut self, key: ServiceKey) -> &mut Self {
        self.global_result_handlers.push(key);
        self
    }

    pub fn add_exception_handler(&mut self, key: ServiceKey) -> &mut Self {
        self.global_exception_handlers.push(key);
        self
    }

    /// Build, bind and register the command tree of a program unit.
    pub fn command_unit(&mut self, unit: &UnitSpec) -> Result<&mut Self, AppError> {
        let tree = self
            .builder
            .build_unit(&self.types, unit)?
            .ok_or_else(|| AppError::UnsupportedUnit(unit.ident.clone()))?;
        let root = tree
            .root()
            .ok_or_else(|| AppError::UnsupportedUnit(unit.ident.clone()))?;
        self.install(&tree, root)?;
        Ok(self)
    }

    /// Build, bind and register a standalone callable as a command.
    pub fn command_callable(&mut self, callable: &CallableSpec) -> Result<&mut Self, AppError> {
        let tree = self
            .builder
            .build_callable(&self.types, callable)?
            .ok_or_else(|| AppError::UnsupportedCallable(callable.ident.clone()))?;
        let root = tree
            .root()
            .ok_or_else(|| AppError::UnsupportedCallable(callable.ident.clone()))?;
        self.install(&tree, root)?;
        Ok(self)
    }

    fn install(&mut self, tree: &CommandTree, root: CommandId) -> Result<(), AppError> {
        let binder = CommandBinder::new(Arc::clone(&self.types), Arc::clone(&self.services))
            .global_converters(self.global_converters.clone())
            .global_result_handlers(self.global_result_handlers.clone())
            .global_exception_handlers(self.global_exception_handlers.clone());
        let bound = binder.bind(tree, root)?;
        let name = bound.command.get_name().to_string();
        if self.root.find_subcommand(&name).is_some() {
            return Err(AppError::DuplicateCommand(name));
        }
        debug!("registered command {name}");
        self.root = self.root.clone().subcommand(bound.command);
        for (path, executor) in bound.executors {
            self.executors.insert(path, executor);
        }
        Ok(())
    }

    /// Parse `argv` (including the binary name) and run the matched
    /// command, returning the exit status.
    pub fn run_from<I, T>(&self, argv: I) -> i32
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = match self.root.clone().try_get_matches_from(argv) {
            Ok(matches) => matches,
            Err(err) => {
                let status = match err.kind() {
                    ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                    _ => 2,
                };
                let _ = err.print();
                return status;
            }
        };
        let mut path = Vec::new();
        let mut node = &matches;
        while let Some((name, sub)) = node.subcommand() {
            path.push(name.to_string());
            node = sub;
        }
        match self.executors.get(&path) {
            Some(executor) => executor.execute(node),
            None => {
                // A group (or the bare application) was matched: render
                // its help.
                let mut command = self.root.clone();
                for name in &path {
                    match command.find_subcommand(name) {
                        Some(sub) => command = sub.clone(),
                        None => break,
                    }
                }
                let _ = command.print_help();
                0
            }
        }
    }

    /// Parse the process arguments and run the matched command.
    pub fn run(&self) -> i32 {
        self.run_from(std::env::args_os())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::Invoke;
    use crate::value::{TypeKey, Value};

    fn add_callable() -> CallableSpec {
        CallableSpec::new(
            "Add",
            Invoke::function(|args| match (args[0].as_int(), args[1].as_int()) {
                (Some(a), Some(b)) => Ok(Value::Int(a + b)),
                _ => Err(crate::handlers::Failure::new("expected two integers")),
            }),
        )
        .param(crate::introspect::ParamSpec::new("a", TypeKey::int()))
        .param(crate::introspect::ParamSpec::new("b", TypeKey::int()))
    }

    #[test]
    fn test_add_scenario() {
        let mut app = CommandLineApp::new("calc");
        app.command_callable(&add_callable()).unwrap();
        assert_eq!(app.run_from(["calc", "add", "3", "4"]), 0);
    }

    #[test]
    fn test_duplicate_command_is_rejected() {
        let mut app = CommandLineApp::new("calc");
        app.command_callable(&add_callable()).unwrap();
        let err = app.command_callable(&add_callable()).map(|_| ()).unwrap_err();
        assert!(matches!(err, AppError::DuplicateCommand(name) if name == "add"));
    }

    #[test]
    fn test_unsupported_unit_is_an_error() {
        let mut app = CommandLineApp::new("calc");
        let unit = UnitSpec::new("Hidden").private();
        assert!(matches!(
            app.command_unit(&unit),
            Err(AppError::UnsupportedUnit(_))
        ));
    }

    #[test]
    fn test_group_match_renders_help() {
        let mut app = CommandLineApp::new("calc");
        let unit = UnitSpec::new("MathCommands").callable(add_callable());
        app.command_unit(&unit).unwrap();
        assert_eq!(app.run_from(["calc", "math"]), 0);
    }

    #[test]
    fn test_parse_error_status() {
        let mut app = CommandLineApp::new("calc");
        app.command_callable(&add_callable()).unwrap();
        assert_eq!(app.run_from(["calc", "frobnicate"]), 2);
    }
}
