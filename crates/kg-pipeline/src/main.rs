use anyhow::{anyhow, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use kg_pipeline::{
    logging, next_step, InspectionReport, MutationEngine, PipelineConfig, PipelineState, Stage,
};
use std::path::PathBuf;

fn checkpoint_arg() -> Arg {
    Arg::new("checkpoint")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Checkpoint JSON file")
}

fn cli() -> Command {
    Command::new("kgraph")
        .version(kg_pipeline::VERSION)
        .about("Inspect and mutate knowledge-graph pipeline checkpoints")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Pipeline configuration (TOML)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .help("Log filter when RUST_LOG is unset"),
        )
        .subcommand(
            Command::new("next")
                .about("Print the next agent and stage")
                .arg(checkpoint_arg()),
        )
        .subcommand(
            Command::new("batch")
                .about("Print node ids eligible for a stage")
                .arg(checkpoint_arg())
                .arg(
                    Arg::new("stage")
                        .long("stage")
                        .required(true)
                        .help("researching, writing or editing"),
                )
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_parser(value_parser!(usize))
                        .help("Maximum ids to print"),
                ),
        )
        .subcommand(
            Command::new("apply")
                .about("Apply an inspection report's structural suggestions")
                .arg(checkpoint_arg())
                .arg(
                    Arg::new("report")
                        .long("report")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Inspection report JSON"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the updated checkpoint here instead of in place"),
                ),
        )
        .subcommand(
            Command::new("summary")
                .about("Summarize a checkpoint")
                .arg(checkpoint_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

fn checkpoint_path(args: &ArgMatches) -> Result<&PathBuf> {
    args.get_one::<PathBuf>("checkpoint")
        .ok_or_else(|| anyhow!("missing checkpoint path"))
}

fn load_checkpoint(args: &ArgMatches) -> Result<(PathBuf, PipelineState)> {
    let path = checkpoint_path(args)?.clone();
    let state = PipelineState::load_state(&path)
        .with_context(|| format!("loading checkpoint {}", path.display()))?;
    Ok((path, state))
}

fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let level = matches
        .get_one::<String>("log-level")
        .map_or(config.log_level.as_str(), String::as_str);
    logging::init(level);

    match matches.subcommand() {
        Some(("next", args)) => {
            let (_, state) = load_checkpoint(args)?;
            let step = next_step(state.current_stage());
            match step.agent {
                Some(agent) => println!("agent: {agent}\nstage: {}", step.stage),
                None => println!("done (stage: {})", step.stage),
            }
        }
        Some(("batch", args)) => {
            let (_, state) = load_checkpoint(args)?;
            let stage: Stage = args
                .get_one::<String>("stage")
                .ok_or_else(|| anyhow!("missing --stage"))?
                .parse()?;
            let limit = args.get_one::<usize>("limit").copied().or(config.batch_limit);
            for id in state.next_nodes_to_process(stage, limit) {
                println!("{id}");
            }
        }
        Some(("apply", args)) => {
            let (path, mut state) = load_checkpoint(args)?;
            let report_path = args
                .get_one::<PathBuf>("report")
                .ok_or_else(|| anyhow!("missing --report"))?;
            let text = std::fs::read_to_string(report_path)
                .with_context(|| format!("reading report {}", report_path.display()))?;
            let report = InspectionReport::from_json(&text)?;

            let engine = MutationEngine::new(config.mutation);
            let changes = state.record_inspection(report, &engine);
            println!("{}", serde_json::to_string_pretty(&changes)?);

            let out = args.get_one::<PathBuf>("out").unwrap_or(&path);
            state
                .save_state(out)
                .with_context(|| format!("saving checkpoint {}", out.display()))?;
        }
        Some(("summary", args)) => {
            let (_, state) = load_checkpoint(args)?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&state.summary())?);
            } else {
                let graph = &state.graph;
                println!("Topic: {}", state.topic);
                println!("  Stage: {}", state.current_stage());
                println!("  Nodes: {}", graph.node_count());
                println!("  Edges: {}", graph.edge_count());
                println!("  Inspection rounds: {}", state.inspection_report.len());
                println!("  Complete: {}", state.is_complete());
                println!("  Roots: {}", graph.root_nodes().join(", "));
                println!("  Leaves: {}", graph.leaf_nodes().join(", "));
                println!("  Central: {}", graph.central_nodes(5).join(", "));
            }
        }
        _ => unreachable!("subcommand_required"),
    }
    Ok(())
}
