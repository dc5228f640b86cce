//! `paintCanvas`: a list of drawing primitives run as one call.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use paintbox_canvas::DrawingSurface;

use crate::dispatch::{CommandError, failure, run_primitive};
use crate::registry::{CommandRegistry, Lookup};

/// Steps are kept raw so one malformed entry cannot reject the others.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub commands: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchCommand {
    pub command: String,
    pub params: Value,
}

impl BatchCommand {
    /// `None` unless `step` is an object whose `command` is a string.
    pub fn from_step(step: &Value) -> Option<Self> {
        let step = step.as_object()?;
        let command = step.get("command")?.as_str()?;
        Some(Self {
            command: command.to_string(),
            params: step.get("params").cloned().unwrap_or(Value::Null),
        })
    }
}

/// Run every sub-command in order, each to completion before the next.
///
/// A step that is malformed, unknown, or fails is logged and skipped over;
/// the batch as a whole still succeeds. Only a request without a `commands`
/// list fails.
pub async fn execute_batch(
    surface: &mut dyn DrawingSurface,
    registry: &CommandRegistry,
    args: Value,
    report_steps: bool,
) -> Result<Value, CommandError> {
    let request = BatchRequest::deserialize(&args)?;
    debug!(steps = request.commands.len(), "Running batch");

    let mut steps = Vec::with_capacity(request.commands.len());
    for (index, raw) in request.commands.iter().enumerate() {
        let lookup = BatchCommand::from_step(raw)
            .map(|step| (registry.lookup_primitive(&step.command), step));
        let output = match lookup {
            None => {
                warn!(index, step = %raw, "command not found");
                failure("command not found")
            }
            Some((Lookup::NotFound, step)) => {
                warn!(index, command = %step.command, "command not found");
                failure("command not found")
            }
            Some((Lookup::Found(kind), step)) => {
                match run_primitive(surface, kind, step.params).await {
                    Ok(output) => output,
                    Err(e) => {
                        warn!(index, command = %step.command, error = %e, "Batch step failed");
                        failure(&e)
                    }
                }
            }
        };
        if report_steps {
            let command = raw.get("command").cloned().unwrap_or(Value::Null);
            steps.push(json!({"command": command, "output": output}));
        }
    }

    let mut result = json!({"success": true, "commands": args});
    if report_steps {
        result["steps"] = Value::Array(steps);
    }
    Ok(result)
}
