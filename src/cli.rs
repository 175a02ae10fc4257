use crate::config::load_config;
use crate::editor::Editor;
use crate::gateway::{FileGateway, ProjectGateway, flush_save};
use crate::layout::{LayoutAlgorithm, TreeDirection};
use crate::layout_dump::write_layout_dump;
use crate::model::Project;
use crate::render::{render_editor_svg, write_output_svg};
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "pncv",
    version,
    about = "Lay out, render and export node-link diagram projects"
)]
pub struct Args {
    /// Project JSON file, or '-' for stdin
    #[arg(short = 'i', long = "input", conflicts_with = "project")]
    pub input: Option<PathBuf>,

    /// Directory holding one <id>.json per project
    #[arg(long = "store")]
    pub store: Option<PathBuf>,

    /// Project id to open from --store
    #[arg(long = "project", requires = "store")]
    pub project: Option<String>,

    /// List the projects in --store and exit
    #[arg(long = "list", requires = "store")]
    pub list: bool,

    /// Output file. Defaults to stdout for SVG and JSON.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config file (JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Layout to run after loading
    #[arg(short = 'l', long = "layout", value_enum, default_value = "none")]
    pub layout: LayoutChoice,

    /// Tree direction
    #[arg(long = "direction", value_enum)]
    pub direction: Option<DirectionChoice>,

    /// Drill into this node before laying out and rendering
    #[arg(long = "focus")]
    pub focus: Option<String>,

    /// Expand every node with children inline
    #[arg(long = "expand-all")]
    pub expand_all: bool,

    /// Write the computed layout as JSON to this path
    #[arg(long = "dump-layout")]
    pub dump_layout: Option<PathBuf>,

    /// Write the laid-out graph back to --store
    #[arg(long = "save", requires = "project")]
    pub save: bool,

    /// Width used when the project is empty
    #[arg(short = 'w', long = "width")]
    pub width: Option<f32>,

    /// Height used when the project is empty
    #[arg(short = 'H', long = "height")]
    pub height: Option<f32>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutChoice {
    None,
    Tree,
    Force,
    Grid,
    Circular,
}

impl LayoutChoice {
    fn algorithm(self) -> Option<LayoutAlgorithm> {
        match self {
            LayoutChoice::None => None,
            LayoutChoice::Tree => Some(LayoutAlgorithm::Tree),
            LayoutChoice::Force => Some(LayoutAlgorithm::Force),
            LayoutChoice::Grid => Some(LayoutAlgorithm::Grid),
            LayoutChoice::Circular => Some(LayoutAlgorithm::Circular),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionChoice {
    Horizontal,
    Vertical,
}

impl From<DirectionChoice> for TreeDirection {
    fn from(value: DirectionChoice) -> Self {
        match value {
            DirectionChoice::Horizontal => TreeDirection::Horizontal,
            DirectionChoice::Vertical => TreeDirection::Vertical,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PNCV_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(width) = args.width {
        config.render.width = width;
    }
    if let Some(height) = args.height {
        config.render.height = height;
    }
    if let Some(direction) = args.direction {
        config.layout.direction = direction.into();
    }
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("starting runtime")?;
    let gateway = args.store.as_ref().map(FileGateway::new);

    if args.list {
        let Some(gateway) = &gateway else {
            bail!("--list needs --store");
        };
        for summary in runtime.block_on(gateway.list_projects())? {
            println!(
                "{}\t{}\t{} nodes\t{}",
                summary.id,
                summary.name,
                summary.node_count,
                summary.updated_at.to_rfc3339()
            );
        }
        return Ok(());
    }

    let project = match (&gateway, &args.project) {
        (Some(gateway), Some(id)) => runtime
            .block_on(gateway.load_project(id))
            .with_context(|| format!("loading project {id}"))?,
        _ => read_project(args.input.as_deref())?,
    };

    let mut editor = Editor::new(config);
    let report = editor.load(project);
    if !report.is_clean() {
        info!(?report, "repaired project on load");
    }

    if let Some(focus) = &args.focus {
        focus_on(&mut editor, focus)?;
    }
    if args.expand_all {
        editor.expand_all();
    }

    let result = args.layout.algorithm().map(|algorithm| editor.apply_layout(algorithm));
    if let Some(path) = &args.dump_layout {
        let Some(result) = &result else {
            bail!("--dump-layout needs --layout");
        };
        write_layout_dump(path, &editor, result)?;
    }

    if args.save {
        let Some(gateway) = &gateway else {
            bail!("--save needs --store");
        };
        let request = editor.begin_save()?;
        let outcome = runtime.block_on(flush_save(gateway, request));
        if let Err(message) = &outcome.result {
            bail!("saving project failed: {message}");
        }
        editor.finish_save(outcome);
    }

    write_output(&editor, &args)
}

/// Drills from the roots down to `focus`, which must have children.
fn focus_on(editor: &mut Editor, focus: &str) -> Result<()> {
    let path = editor.graph().path_to(focus);
    if path.is_empty() {
        bail!("unknown node `{focus}`");
    }
    if !editor.graph().has_children(focus) {
        bail!("`{focus}` has no children to focus on");
    }
    for id in &path {
        editor.drill_down(id);
    }
    debug!(focus = editor.focus().unwrap_or_default(), "focused");
    Ok(())
}

fn write_output(editor: &Editor, args: &Args) -> Result<()> {
    match args.output_format {
        OutputFormat::Svg => write_output_svg(&render_editor_svg(editor), args.output.as_deref()),
        OutputFormat::Json => {
            let title = editor.project_name().unwrap_or("Untitled");
            let json = editor.export_json(title)?;
            match &args.output {
                Some(path) => std::fs::write(path, json)?,
                None => println!("{json}"),
            }
            Ok(())
        }
        OutputFormat::Png => write_png(editor, args.output.as_deref()),
    }
}

#[cfg(feature = "png")]
fn write_png(editor: &Editor, output: Option<&Path>) -> Result<()> {
    let output = output.context("Output path required for png output")?;
    crate::render::write_output_png(&render_editor_svg(editor), output, &editor.config().render)
}

#[cfg(not(feature = "png"))]
fn write_png(_editor: &Editor, _output: Option<&Path>) -> Result<()> {
    bail!("png output needs the `png` feature")
}

fn read_input(path: Option<&Path>) -> Result<(String, Option<String>)> {
    if let Some(path) = path {
        if path != Path::new("-") {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let stem = path.file_stem().and_then(|s| s.to_str()).map(str::to_string);
            return Ok((content, stem));
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok((buf, None))
}

fn read_project(path: Option<&Path>) -> Result<Project> {
    let (input, stem) = read_input(path)?;
    Project::from_json(&input, stem.as_deref().unwrap_or("Untitled")).context("invalid project JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Node;

    #[test]
    fn args_parse_layout_and_format() {
        let args = Args::try_parse_from(["pncv", "-i", "board.json", "-l", "force", "-e", "json"]).unwrap();
        assert_eq!(args.layout, LayoutChoice::Force);
        assert_eq!(args.output_format, OutputFormat::Json);
        assert!(Args::try_parse_from(["pncv", "--save"]).is_err());
    }

    #[test]
    fn focus_rejects_leaves_and_unknown_nodes() {
        let mut project = Project::new("cli");
        let mut mid = Node::new("mid", 0.0, 0.0, 100.0, 50.0);
        mid.parent_id = Some("top".into());
        let mut leaf = Node::new("leaf", 0.0, 0.0, 100.0, 50.0);
        leaf.parent_id = Some("mid".into());
        project.nodes = vec![Node::new("top", 0.0, 0.0, 100.0, 50.0), mid, leaf];
        let mut editor = Editor::default();
        editor.load(project);

        let err = focus_on(&mut editor, "leaf").unwrap_err();
        assert!(err.to_string().contains("no children"));
        assert!(focus_on(&mut editor, "ghost").is_err());
        assert_eq!(editor.focus(), None);

        focus_on(&mut editor, "mid").unwrap();
        assert_eq!(editor.focus(), Some("mid"));
    }
}
