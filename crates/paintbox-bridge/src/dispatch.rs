//! Single-call dispatch: one `command.invoke` in, one `command.result` out.

use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use paintbox_canvas::{DrawKind, DrawOp, DrawingSurface, ParamsError, SurfaceError};
use paintbox_core::protocol::{InvocationRequest, InvocationResult};

use crate::batch::execute_batch;
use crate::registry::{Command, CommandRegistry, Lookup, MetaCommand};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("not found")]
    NotFound,

    #[error("invalid arguments: {0}")]
    Arguments(#[from] serde_json::Error),

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// `{success: false, error}`.
pub fn failure(error: impl std::fmt::Display) -> Value {
    json!({"success": false, "error": error.to_string()})
}

/// Owns the registry and the drawing surface. Calls are handled one at a
/// time; surface state carries over between them.
pub struct Dispatcher {
    registry: CommandRegistry,
    surface: Box<dyn DrawingSurface>,
    report_steps: bool,
}

impl Dispatcher {
    pub fn new(surface: Box<dyn DrawingSurface>) -> Self {
        Self {
            registry: CommandRegistry::new(),
            surface,
            report_steps: false,
        }
    }

    /// Include per-step outputs in `paintCanvas` results.
    pub fn with_batch_steps(mut self, enabled: bool) -> Self {
        self.report_steps = enabled;
        self
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn surface(&self) -> &dyn DrawingSurface {
        self.surface.as_ref()
    }

    pub async fn dispatch(&mut self, request: &InvocationRequest) -> InvocationResult {
        let output = match self.execute(request).await {
            Ok(output) => {
                debug!(name = %request.name, "Command succeeded");
                output
            }
            Err(e) => {
                warn!(name = %request.name, error = %e, "Command failed");
                failure(&e)
            }
        };
        InvocationResult::answer(request, &output)
    }

    async fn execute(&mut self, request: &InvocationRequest) -> Result<Value, CommandError> {
        let command = match self.registry.lookup(&request.name) {
            Lookup::Found(command) => command,
            Lookup::NotFound => return Err(CommandError::NotFound),
        };
        let args = request.arguments()?;

        match command {
            Command::Meta(MetaCommand::GetCanvasSize) => {
                let (width, height) = self.surface.size();
                Ok(json!({"success": true, "width": width, "height": height}))
            }
            Command::Meta(MetaCommand::ClearCanvas) => {
                let (width, height) = self.surface.size();
                let op = DrawKind::ClearRect.decode(json!({
                    "x": 0,
                    "y": 0,
                    "width": width,
                    "height": height,
                }))?;
                self.surface.apply(&op).await?;
                Ok(json!({"success": true}))
            }
            Command::Meta(MetaCommand::PaintCanvas) => {
                execute_batch(self.surface.as_mut(), &self.registry, args, self.report_steps).await
            }
            Command::Draw(kind) => run_primitive(self.surface.as_mut(), kind, args).await,
        }
    }
}

/// Decode, apply and echo one drawing primitive.
pub(crate) async fn run_primitive(
    surface: &mut dyn DrawingSurface,
    kind: DrawKind,
    params: Value,
) -> Result<Value, CommandError> {
    let op: DrawOp = kind.decode(params)?;
    surface.apply(&op).await?;
    Ok(op.echo(surface.state()))
}
