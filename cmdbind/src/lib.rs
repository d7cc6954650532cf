//! Declarative command binding.
//!
//! `cmdbind` turns registered program units into a runnable command-line
//! application: a [`CommandModelBuilder`] derives a descriptor tree from
//! unit and callable registrations, a [`CommandBinder`] realizes the tree
//! against clap and resolves how each parameter receives its value, and
//! execution routes results and failures through pluggable handler chains.
//!
//! ```no_run
//! use cmdbind::{CallableSpec, CommandLineApp, Invoke, ParamSpec, TypeKey, Value};
//!
//! let add = CallableSpec::new(
//!     "Add",
//!     Invoke::function(|args| {
//!         let a = args[0].as_int().unwrap_or(0);
//!         let b = args[1].as_int().unwrap_or(0);
//!         Ok(Value::Int(a + b))
//!     }),
//! )
//! .param(ParamSpec::new("a", TypeKey::int()))
//! .param(ParamSpec::new("b", TypeKey::int()));
//!
//! let mut app = CommandLineApp::new("calc");
//! app.command_callable(&add).expect("add is a valid command");
//! std::process::exit(app.run());
//! ```

pub mod app;
pub mod binder;
pub mod casing;
pub mod convert;
pub mod handlers;
pub mod introspect;
pub mod model;
pub mod model_builder;
pub mod services;
pub mod type_registry;
pub mod value;

pub use app::{AppError, CommandLineApp};
pub use binder::{BindError, BoundCommand, CommandBinder, CommandExecutor};
pub use convert::{Conversion, ConversionResolver, ConvertError, Converter};
pub use handlers::{
    ConsoleExceptionHandler, ConsoleResultHandler, ExceptionHandler, Failure, FileResultHandler,
    ResultHandler,
};
pub use introspect::{
    ArgumentAttr, CallableSpec, CommandAttr, HelpDecl, Invoke, OptionAttr, OptionKind, ParamSpec,
    UnitSpec, VersionAttr,
};
pub use model::{CommandDescriptor, CommandId, CommandTree, ModelError};
pub use model_builder::{CommandModelBuilder, DEFAULT_HELP_TEMPLATE};
pub use services::{ServiceKey, Services};
pub use type_registry::{ScalarKind, TypeKind, TypeRegistry, TypeSpec};
pub use value::{TypeKey, Value};
