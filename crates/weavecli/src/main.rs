use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use weavecore::{
    ConnectionDefinition, EngineEvent, NodeDefinition, RunContext, Workflow, WorkflowDefinition,
};
use weaveruntime::{RuntimeConfig, StepRegistry, WeaveRuntime};
use weavesteps::FileNotebook;

#[derive(Parser)]
#[command(name = "weave")]
#[command(about = "Weave workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Notebook directory with materialized pipeline state
        #[arg(short, long)]
        notebook: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Parse and build a workflow file without running it
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available step types
    Steps,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            notebook,
            verbose,
        } => {
            let level = if verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            };
            tracing_subscriber::fmt().with_max_level(level).init();

            run_workflow(file, notebook).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(file)?;
        }

        Commands::Steps => {
            list_steps();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

async fn run_workflow(file: PathBuf, notebook: Option<PathBuf>) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow_json = std::fs::read_to_string(&file)?;
    let definition = WorkflowDefinition::from_str(&workflow_json)?;

    println!("📋 Workflow: {}", definition.name);
    println!("   Nodes: {}", definition.nodes.len());
    println!("   Connections: {}", definition.connections.len());
    println!();

    let context = match notebook {
        Some(dir) => {
            let notebook_id = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "notebook".to_string());
            RunContext::with_store(Arc::new(FileNotebook::open(dir)?), notebook_id)
        }
        None => RunContext::new(),
    };

    let mut registry = StepRegistry::new();
    weavesteps::register_all(&mut registry);
    let runtime = WeaveRuntime::with_registry(Arc::new(registry), RuntimeConfig::default());

    // Live event printer
    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                EngineEvent::WorkflowStarted { run_id, .. } => {
                    println!("▶️  Workflow started ({run_id})");
                }
                EngineEvent::NodeStarted {
                    node_id, node_type, ..
                } => {
                    println!("  ⚡ Starting node: {node_id} ({node_type})");
                }
                EngineEvent::NodeFinished {
                    node_id,
                    elapsed_s,
                    summary,
                    pinned,
                    ..
                } => {
                    if pinned {
                        println!("  📌 Node {node_id} used pinned data: {summary}");
                    } else {
                        println!("  ✅ Node {node_id} finished in {elapsed_s}s: {summary}");
                    }
                }
                EngineEvent::NodeError { node_id, error, .. } => {
                    println!("  ❌ Node {node_id} failed: {error}");
                }
                EngineEvent::NodeSkipped {
                    node_id, reason, ..
                } => {
                    println!("  ⏭️  Node {node_id} skipped: {reason}");
                }
                EngineEvent::WorkflowFinished { elapsed_s, .. } => {
                    println!("✨ Workflow finished in {elapsed_s}s");
                }
            }
        }
    });

    let report = runtime.execute_definition(definition, &context).await;

    // Let the printer drain before tearing it down
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    println!();
    println!("📊 Run report:");
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow_json = std::fs::read_to_string(&file)?;
    let definition = WorkflowDefinition::from_str(&workflow_json)?;
    let node_count = definition.nodes.len();
    let connection_count = definition.connections.len();

    let workflow = Workflow::build(definition);
    let dropped = connection_count.saturating_sub(built_connection_count(&workflow));

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Nodes: {node_count}");
    println!("   Connections: {connection_count}");
    if dropped > 0 {
        println!("   ⚠️  Dropped {dropped} connection(s) with missing endpoints");
    }
    println!("   Start nodes: {:?}", workflow.start_nodes());

    let mut registry = StepRegistry::new();
    weavesteps::register_all(&mut registry);
    for id in workflow.node_order() {
        if let Some(node) = workflow.nodes.get(id) {
            if registry.get(&node.node_type).is_none() {
                println!(
                    "   ⚠️  Node {id} has unregistered type '{}' (will be skipped)",
                    node.node_type
                );
            }
        }
    }

    Ok(())
}

fn built_connection_count(workflow: &Workflow) -> usize {
    use weavecore::Channel;
    workflow
        .node_order()
        .iter()
        .map(|id| {
            [Channel::Main, Channel::Error, Channel::AiTool]
                .iter()
                .map(|c| workflow.downstream(id, *c).len())
                .sum::<usize>()
        })
        .sum()
}

fn list_steps() {
    println!("📦 Available step types:");
    println!();

    let mut registry = StepRegistry::new();
    weavesteps::register_all(&mut registry);

    for step_type in registry.list_step_types() {
        println!("  • {step_type}");
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let mut definition = WorkflowDefinition::new("Skill extraction pipeline");

    let steps = [
        ("load", "document_loader", "Load document"),
        ("chunk", "chunker", "Chunk markdown"),
        ("filter", "semantic_filter", "Filter chunks"),
        ("schema", "schema_gen", "Generate schema"),
        ("extract", "extractor", "Extract skills"),
        ("validate", "validator", "Validate skills"),
        ("reduce", "reducer", "Deduplicate"),
        ("classify", "classifier", "Classify SKUs"),
        ("package", "packager", "Package output"),
    ];

    for (i, (id, step_type, label)) in steps.iter().enumerate() {
        definition.add_node(
            NodeDefinition::new(*id, *step_type)
                .with_label(*label)
                .with_position(100.0 + 160.0 * i as f64, 100.0),
        );
    }
    for pair in steps.windows(2) {
        definition.connect(pair[0].0, pair[1].0);
    }
    // Failed extractions feed the validator's error lane. Both endpoints
    // sit on the error channel so the edge stays out of the main join.
    definition.connections.push(
        ConnectionDefinition::new("extract", "validate")
            .on_channel(weavecore::Channel::Error)
            .into_channel(weavecore::Channel::Error),
    );

    if let Some(node) = definition.nodes.iter_mut().find(|n| n.id == "schema") {
        node.parameters.insert(
            "system_prompt".to_string(),
            json!("Derive a concise skill schema from the document."),
        );
    }

    let json = serde_json::to_string_pretty(&definition)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  weave run --file {} --notebook notebooks/demo",
        output.display()
    );

    Ok(())
}
