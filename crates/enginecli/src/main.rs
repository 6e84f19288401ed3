use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use enginecore::{EventBus, ExecutionEvent, ExecutionState, FlowVersion, StepOutputStatus};
use engineruntime::{
    Engine, EngineConfig, ExecuteFlowOperation, ExecutionOutput, PieceRegistry,
    TriggerHookOperation, TriggerHookType,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "engine")]
#[command(about = "Flow execution engine CLI", long_about = None)]
struct Cli {
    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a flow version file from its trigger
    Run {
        /// Path to flow version JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Trigger payload as JSON string
        #[arg(short, long)]
        payload: Option<String>,

        /// Engine configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the execution output JSON here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Resume a paused run from a saved execution output
    Resume {
        /// Path to flow version JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Execution output (or bare execution state) written by an earlier pass
        #[arg(short, long)]
        state: PathBuf,

        /// Resume payload as JSON string
        #[arg(short, long)]
        payload: Option<String>,

        /// Run ID of the paused run
        #[arg(long)]
        run_id: Option<uuid::Uuid>,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a hook of the flow's trigger and print the items
    Trigger {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(long, value_enum, default_value = "run")]
        hook: Hook,

        #[arg(short, long)]
        payload: Option<String>,
    },

    /// Validate a flow version file
    Validate {
        /// Path to flow version JSON file
        file: PathBuf,
    },

    /// List available pieces
    Pieces,

    /// Create a new example flow version
    Init {
        /// Output file path
        #[arg(short, long, default_value = "flow.json")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Hook {
    OnEnable,
    OnDisable,
    Run,
    Test,
}

impl From<Hook> for TriggerHookType {
    fn from(hook: Hook) -> Self {
        match hook {
            Hook::OnEnable => TriggerHookType::OnEnable,
            Hook::OnDisable => TriggerHookType::OnDisable,
            Hook::Run => TriggerHookType::Run,
            Hook::Test => TriggerHookType::Test,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine readable
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            file,
            payload,
            config,
            output,
        } => {
            let flow = load_flow(&file)?;
            let operation = ExecuteFlowOperation::begin(flow, parse_json_arg(payload)?);
            execute(operation, config, output).await?;
        }

        Commands::Resume {
            file,
            state,
            payload,
            run_id,
            config,
            output,
        } => {
            let flow = load_flow(&file)?;
            let execution_state = load_state(&state)?;
            let operation = ExecuteFlowOperation::resume(
                flow,
                run_id.unwrap_or_else(uuid::Uuid::new_v4),
                execution_state,
                parse_json_arg(payload)?,
            );
            execute(operation, config, output).await?;
        }

        Commands::Trigger {
            file,
            hook,
            payload,
        } => {
            let flow_version = load_flow(&file)?;
            let payload = payload.map(|p| serde_json::from_str(&p)).transpose()?;
            let engine = Engine::new().with_registry(standard_registry());
            let result = engine
                .execute_trigger_hook(TriggerHookOperation {
                    flow_version,
                    hook_type: hook.into(),
                    payload,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&result.items)?);
        }

        Commands::Validate { file } => {
            validate_flow(&file)?;
        }

        Commands::Pieces => {
            list_pieces();
        }

        Commands::Init { output } => {
            create_example_flow(&output)?;
        }
    }

    Ok(())
}

fn standard_registry() -> Arc<PieceRegistry> {
    let mut registry = PieceRegistry::new();
    enginepieces::register_all(&mut registry);
    Arc::new(registry)
}

fn parse_json_arg(arg: Option<String>) -> Result<Value> {
    match arg {
        Some(text) => serde_json::from_str(&text).context("payload is not valid JSON"),
        None => Ok(Value::Null),
    }
}

fn load_flow(file: &Path) -> Result<FlowVersion> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let flow: FlowVersion = serde_json::from_str(&text)
        .with_context(|| format!("parsing flow version {}", file.display()))?;
    Ok(flow)
}

fn load_config(file: Option<PathBuf>) -> Result<EngineConfig> {
    match file {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(serde_json::from_str(&text)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

/// Accepts a whole execution output or just its `executionState`.
fn load_state(file: &Path) -> Result<ExecutionState> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let mut value: Value = serde_json::from_str(&text)?;
    let state = match value.get_mut("executionState") {
        Some(state) => state.take(),
        None => value,
    };
    Ok(serde_json::from_value(state)?)
}

async fn execute(
    operation: ExecuteFlowOperation,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config)?;
    println!("🚀 Flow: {}", operation.flow_version.display_name);
    println!("   Run ID: {}", operation.flow_run_id);
    println!();

    let bus = Arc::new(EventBus::new(config.event_buffer_size));
    let mut events = bus.subscribe();
    let engine = Engine::with_config(config)
        .with_registry(standard_registry())
        .with_hooks(bus.clone());

    // Ends once the engine and the bus are dropped
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::FlowStarted { .. } => println!("▶️  Flow started"),
                ExecutionEvent::StepStarted { step, step_type, .. } => {
                    println!("  ⚡ Starting step: {} ({:?})", step, step_type);
                }
                ExecutionEvent::StepFinished {
                    step,
                    status,
                    duration_ms,
                    error_message,
                    ..
                } => match status {
                    StepOutputStatus::Failed => println!(
                        "  ❌ Step {} failed: {}",
                        step,
                        error_message.unwrap_or_default()
                    ),
                    _ => println!("  ✅ Step {} {:?} in {}ms", step, status, duration_ms),
                },
                ExecutionEvent::FlowFinished {
                    status,
                    duration_ms,
                    ..
                } => println!("✨ Flow finished as {:?} in {}ms", status, duration_ms),
            }
        }
    });

    let result = engine.execute_flow(operation).await;
    drop(engine);
    drop(bus);
    let _ = event_task.await;
    let result = result?;

    print_summary(&result);
    if let Some(path) = output {
        std::fs::write(&path, serde_json::to_string_pretty(&result)?)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("💾 Output written to {}", path.display());
    }
    Ok(())
}

fn print_summary(output: &ExecutionOutput) {
    println!();
    println!("📊 Execution Summary:");
    println!("   Status: {:?}", output.status);
    println!("   Steps: {}", output.tasks);
    println!("   Duration: {}ms", output.duration);
    if let Some(step) = &output.failed_step {
        println!("   Failed step: {}", step);
    }
    if let Some(message) = &output.error_message {
        println!("   Error: {}", message);
    }
    if let Some(pause) = &output.pause_metadata {
        println!("   Paused: {}", json!(pause));
    }
    if let Some(stop) = &output.stop_response {
        println!("   Stopped with {}: {}", stop.status, stop.body);
    }
}

fn validate_flow(file: &Path) -> Result<()> {
    println!("🔍 Validating flow version: {}", file.display());

    let flow = load_flow(file)?;
    flow.validate()?;

    let registry = standard_registry();
    let mut unknown = Vec::new();
    for name in flow.step_names() {
        if let Some(enginecore::Action::Piece(spec)) = flow.find_action(&name) {
            let settings = &spec.settings;
            let action = settings.action_name.as_deref().unwrap_or_default();
            if registry.get_action(&settings.piece_name, action).is_err() {
                unknown.push(format!("{} ({}/{})", name, settings.piece_name, action));
            }
        }
    }
    if !unknown.is_empty() {
        bail!("unknown piece actions: {}", unknown.join(", "));
    }

    println!("✅ Flow version is valid:");
    println!("   Name: {}", flow.display_name);
    println!("   Trigger: {} ({:?})", flow.trigger.name(), flow.trigger.trigger_type());
    println!("   Steps: {}", flow.step_names().len() - 1);
    Ok(())
}

fn list_pieces() {
    println!("📦 Available Pieces:");
    println!();

    let registry = standard_registry();
    for name in registry.list_pieces() {
        if let Some(metadata) = registry.get_metadata(&name) {
            println!("  • {} ({})", name, metadata.category);
            println!("    {}", metadata.description);
        } else {
            println!("  • {}", name);
        }
    }
}

fn create_example_flow(output: &Path) -> Result<()> {
    let flow = json!({
        "displayName": "Example approval flow",
        "trigger": {
            "type": "WEBHOOK",
            "name": "trigger",
            "displayName": "Catch Webhook",
            "settings": {},
            "nextAction": {
                "type": "LOOP_ON_ITEMS",
                "name": "each_order",
                "displayName": "For each order",
                "settings": { "items": "{{trigger.orders}}" },
                "firstLoopAction": {
                    "type": "PIECE",
                    "name": "log_order",
                    "displayName": "Log order",
                    "settings": {
                        "pieceName": "debug",
                        "pieceVersion": "0.0.1",
                        "actionName": "log",
                        "input": { "message": "order {{each_order.index}}: {{each_order.item.id}}" }
                    }
                },
                "nextAction": {
                    "type": "PIECE",
                    "name": "approval",
                    "displayName": "Wait for approval",
                    "settings": {
                        "pieceName": "flow_control",
                        "pieceVersion": "0.0.1",
                        "actionName": "wait_for_approval",
                        "input": {}
                    }
                }
            }
        }
    });
    // Make sure the example stays loadable
    let _: FlowVersion = serde_json::from_value(flow.clone())?;

    std::fs::write(output, serde_json::to_string_pretty(&flow)?)?;

    println!("✨ Created example flow version: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  engine run --file {} --payload '{{\"orders\": [{{\"id\": 1}}]}}' --output out.json",
        output.display()
    );
    Ok(())
}
