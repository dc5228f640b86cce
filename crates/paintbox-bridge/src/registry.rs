//! Name → command tables, built once at startup.

use std::collections::HashMap;

use paintbox_canvas::DrawKind;

/// Commands that act on the canvas as a whole rather than drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCommand {
    GetCanvasSize,
    ClearCanvas,
    PaintCanvas,
}

impl MetaCommand {
    pub const ALL: [MetaCommand; 3] = [Self::GetCanvasSize, Self::ClearCanvas, Self::PaintCanvas];

    pub fn name(self) -> &'static str {
        match self {
            Self::GetCanvasSize => "getCanvasSize",
            Self::ClearCanvas => "clearCanvas",
            Self::PaintCanvas => "paintCanvas",
        }
    }
}

/// Anything invocable by name from the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Meta(MetaCommand),
    Draw(DrawKind),
}

/// Result of a name lookup. Not finding a name is an ordinary outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

pub struct CommandRegistry {
    commands: HashMap<&'static str, Command>,
    primitives: HashMap<&'static str, DrawKind>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        let primitives: HashMap<_, _> = DrawKind::ALL.iter().map(|&k| (k.name(), k)).collect();

        let mut commands: HashMap<_, _> = primitives
            .iter()
            .map(|(&name, &kind)| (name, Command::Draw(kind)))
            .collect();
        // Meta commands shadow a primitive of the same name.
        for meta in MetaCommand::ALL {
            commands.insert(meta.name(), Command::Meta(meta));
        }

        Self {
            commands,
            primitives,
        }
    }

    /// Resolve a top-level invocation name.
    pub fn lookup(&self, name: &str) -> Lookup<Command> {
        match self.commands.get(name) {
            Some(&command) => Lookup::Found(command),
            None => Lookup::NotFound,
        }
    }

    /// Resolve a batch sub-command. Only drawing primitives are eligible.
    pub fn lookup_primitive(&self, name: &str) -> Lookup<DrawKind> {
        match self.primitives.get(name) {
            Some(&kind) => Lookup::Found(kind),
            None => Lookup::NotFound,
        }
    }

    /// Every top-level name, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
