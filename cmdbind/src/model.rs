//! Command descriptor model
//!
//! Descriptors for one command tree live in a [`CommandTree`] arena and
//! refer to each other by index. Parent/child and ownership relations are
//! changed only through the explicit `attach_*`/`detach_*` operations,
//! which keep both sides consistent and enforce sibling name uniqueness.

use crate::introspect::{Invoke, OptionKind, ParamSpec};
use crate::services::ServiceKey;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("command {parent} already has a child named {name}")]
    DuplicateSiblingName { parent: String, name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgumentId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OptionId(usize);

/// Help option of one command; template only, the engine renders the text.
#[derive(Debug, Clone)]
pub struct HelpOptionDescriptor {
    pub template: String,
}

/// Version option of one command.
#[derive(Debug, Clone)]
pub struct VersionOptionDescriptor {
    pub template: String,
    pub short_form: Option<String>,
    pub long_form: Option<String>,
}

/// One command: a group of subcommands, an executable leaf, or both.
pub struct CommandDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub extended_help_text: Option<String>,
    pub show_in_help: bool,
    pub allow_argument_separator: bool,
    /// The bound callable; groups without one render help when matched.
    pub invoke: Option<Invoke>,
    /// Identifiers of the callable's parameters in declaration order.
    pub param_idents: Vec<String>,
    pub help_option: Option<HelpOptionDescriptor>,
    pub version_option: Option<VersionOptionDescriptor>,
    pub converters: Vec<ServiceKey>,
    pub result_handlers: Vec<ServiceKey>,
    pub exception_handlers: Vec<ServiceKey>,
    parent: Option<CommandId>,
    children: Vec<CommandId>,
    arguments: Vec<ArgumentId>,
    options: Vec<OptionId>,
}

impl CommandDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            extended_help_text: None,
            show_in_help: true,
            allow_argument_separator: false,
            invoke: None,
            param_idents: Vec::new(),
            help_option: None,
            version_option: None,
            converters: Vec::new(),
            result_handlers: Vec::new(),
            exception_handlers: Vec::new(),
            parent: None,
            children: Vec::new(),
            arguments: Vec::new(),
            options: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<CommandId> {
        self.parent
    }

    pub fn children(&self) -> &[CommandId] {
        &self.children
    }

    pub fn arguments(&self) -> &[ArgumentId] {
        &self.arguments
    }

    pub fn options(&self) -> &[OptionId] {
        &self.options
    }
}

/// One positional parameter binding.
pub struct ArgumentDescriptor {
    pub name: String,
    pub description: Option<String>,
    /// Forced multiplicity; `None` lets the binder infer from the type.
    pub multiple_values: Option<bool>,
    pub show_in_help: bool,
    pub param: ParamSpec,
    pub converters: Vec<ServiceKey>,
    command: Option<CommandId>,
}

impl ArgumentDescriptor {
    pub fn new(name: impl Into<String>, param: ParamSpec) -> Self {
        let converters = param.converters.clone();
        Self {
            name: name.into(),
            description: None,
            multiple_values: None,
            show_in_help: true,
            param,
            converters,
            command: None,
        }
    }

    pub fn command(&self) -> Option<CommandId> {
        self.command
    }
}

/// One named flag/value parameter binding.
pub struct OptionDescriptor {
    /// Flag spelling, e.g. `-b|--base <base>`.
    pub template: String,
    pub description: Option<String>,
    /// Forced kind; `None` lets the binder infer from the type.
    pub kind: Option<OptionKind>,
    pub show_in_help: bool,
    pub param: ParamSpec,
    pub converters: Vec<ServiceKey>,
    command: Option<CommandId>,
}

impl OptionDescriptor {
    pub fn new(template: impl Into<String>, param: ParamSpec) -> Self {
        let converters = param.converters.clone();
        Self {
            template: template.into(),
            description: None,
            kind: None,
            show_in_help: true,
            param,
            converters,
            command: None,
        }
    }

    pub fn command(&self) -> Option<CommandId> {
        self.command
    }
}

/// Arena holding every descriptor of one command tree.
#[derive(Default)]
pub struct CommandTree {
    commands: Vec<CommandDescriptor>,
    arguments: Vec<ArgumentDescriptor>,
    options: Vec<OptionDescriptor>,
    root: Option<CommandId>,
}

impl CommandTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_command(&mut self, descriptor: CommandDescriptor) -> CommandId {
        let id = CommandId(self.commands.len());
        self.commands.push(descriptor);
        id
    }

    pub fn insert_argument(&mut self, descriptor: ArgumentDescriptor) -> ArgumentId {
        let id = ArgumentId(self.arguments.len());
        self.arguments.push(descriptor);
        id
    }

    pub fn insert_option(&mut self, descriptor: OptionDescriptor) -> OptionId {
        let id = OptionId(self.options.len());
        self.options.push(descriptor);
        id
    }

    pub fn set_root(&mut self, id: CommandId) {
        self.root = Some(id);
    }

    pub fn root(&self) -> Option<CommandId> {
        self.root
    }

    pub fn command(&self, id: CommandId) -> &CommandDescriptor {
        &self.commands[id.0]
    }

    pub fn command_mut(&mut self, id: CommandId) -> &mut CommandDescriptor {
        &mut self.commands[id.0]
    }

    pub fn argument(&self, id: ArgumentId) -> &ArgumentDescriptor {
        &self.arguments[id.0]
    }

    pub fn option(&self, id: OptionId) -> &OptionDescriptor {
        &self.options[id.0]
    }

    /// Attach `child` under `parent`, detaching it from any previous parent.
    /// Sibling names must stay unique.
    pub fn attach_child(&mut self, parent: CommandId, child: CommandId) -> Result<(), ModelError> {
        let name = self.commands[child.0].name.clone();
        let clash = self.commands[parent.0]
            .children
            .iter()
            .any(|&c| c != child && self.commands[c.0].name == name);
        if clash {
            return Err(ModelError::DuplicateSiblingName {
                parent: self.commands[parent.0].name.clone(),
                name,
            });
        }
        self.detach_child(child);
        self.commands[child.0].parent = Some(parent);
        self.commands[parent.0].children.push(child);
        Ok(())
    }

    /// Detach `child` from its parent, if any.
    pub fn detach_child(&mut self, child: CommandId) {
        if let Some(old) = self.commands[child.0].parent.take() {
            self.commands[old.0].children.retain(|&c| c != child);
        }
    }

    /// Attach an argument to `command`, detaching it from any previous
    /// owner. Attachment order is positional binding order.
    pub fn attach_argument(&mut self, command: CommandId, argument: ArgumentId) {
        if let Some(old) = self.arguments[argument.0].command.take() {
            self.commands[old.0].arguments.retain(|&a| a != argument);
        }
        self.arguments[argument.0].command = Some(command);
        self.commands[command.0].arguments.push(argument);
    }

    /// Attach an option to `command`, detaching it from any previous owner.
    pub fn attach_option(&mut self, command: CommandId, option: OptionId) {
        if let Some(old) = self.options[option.0].command.take() {
            self.commands[old.0].options.retain(|&o| o != option);
        }
        self.options[option.0].command = Some(command);
        self.commands[command.0].options.push(option);
    }

    /// The command and its ancestors, nearest first.
    pub fn ancestry(&self, id: CommandId) -> Vec<CommandId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.commands[current.0].parent {
            chain.push(parent);
            current = parent;
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypeKey;

    fn param(ident: &str) -> ParamSpec {
        ParamSpec::new(ident, TypeKey::string())
    }

    #[test]
    fn test_attach_child_sets_both_sides() {
        let mut tree = CommandTree::new();
        let root = tree.insert_command(CommandDescriptor::new("math"));
        let add = tree.insert_command(CommandDescriptor::new("add"));
        tree.attach_child(root, add).unwrap();
        assert_eq!(tree.command(add).parent(), Some(root));
        assert_eq!(tree.command(root).children(), &[add]);
    }

    #[test]
    fn test_reattach_detaches_from_old_parent() {
        let mut tree = CommandTree::new();
        let a = tree.insert_command(CommandDescriptor::new("a"));
        let b = tree.insert_command(CommandDescriptor::new("b"));
        let child = tree.insert_command(CommandDescriptor::new("child"));
        tree.attach_child(a, child).unwrap();
        tree.attach_child(b, child).unwrap();
        assert!(tree.command(a).children().is_empty());
        assert_eq!(tree.command(b).children(), &[child]);
        assert_eq!(tree.command(child).parent(), Some(b));
    }

    #[test]
    fn test_duplicate_sibling_name_is_rejected() {
        let mut tree = CommandTree::new();
        let root = tree.insert_command(CommandDescriptor::new("math"));
        let first = tree.insert_command(CommandDescriptor::new("add"));
        let second = tree.insert_command(CommandDescriptor::new("add"));
        tree.attach_child(root, first).unwrap();
        assert!(matches!(
            tree.attach_child(root, second),
            Err(ModelError::DuplicateSiblingName { .. })
        ));
    }

    #[test]
    fn test_argument_belongs_to_one_command() {
        let mut tree = CommandTree::new();
        let a = tree.insert_command(CommandDescriptor::new("a"));
        let b = tree.insert_command(CommandDescriptor::new("b"));
        let arg = tree.insert_argument(ArgumentDescriptor::new("value", param("value")));
        tree.attach_argument(a, arg);
        tree.attach_argument(b, arg);
        assert!(tree.command(a).arguments().is_empty());
        assert_eq!(tree.command(b).arguments(), &[arg]);
        assert_eq!(tree.argument(arg).command(), Some(b));
    }

    #[test]
    fn test_ancestry_is_nearest_first() {
        let mut tree = CommandTree::new();
        let root = tree.insert_command(CommandDescriptor::new("root"));
        let mid = tree.insert_command(CommandDescriptor::new("mid"));
        let leaf = tree.insert_command(CommandDescriptor::new("leaf"));
        tree.attach_child(root, mid).unwrap();
        tree.attach_child(mid, leaf).unwrap();
        assert_eq!(tree.ancestry(leaf), vec![leaf, mid, root]);
    }
}
