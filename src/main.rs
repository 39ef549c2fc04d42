use std::cell::RefCell;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::info;

use kaiwa_runtime::{
    AdvanceAction, ContentStore, DialogueEngine, EngineError, FileProgress, GameSettings,
    LanguageMode, LocalizedText, MemoryProgress, ProgressStore, SpeakerResolver, StoryArchive,
};

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let archive = Arc::new(
        StoryArchive::open(&options.path)
            .with_context(|| format!("failed to open story {}", options.path))?,
    );

    println!(
        "Loaded story with {} scene(s) ({} node(s), {} voice line(s))",
        archive.scene_count(),
        archive.node_count(),
        archive.voice_line_count()
    );
    for scene_id in archive.scene_ids() {
        if let Some(graph) = archive.scene(scene_id) {
            println!(
                " - {scene_id}: {} node(s), starts at \"{}\"",
                graph.nodes.len(),
                graph.start_at
            );
        }
    }

    if options.summary_only {
        return Ok(());
    }

    run_play(archive, &options)
}

/// Headless play loop standing in for the game's presentation layer:
/// renders the engine state as text and feeds stdin commands back in.
fn run_play(archive: Arc<StoryArchive>, options: &CliOptions) -> Result<()> {
    let progress: Arc<dyn ProgressStore> = match &options.save_file {
        Some(path) => Arc::new(FileProgress::open(path)?),
        None => Arc::new(MemoryProgress::new()),
    };
    let settings = GameSettings::load(progress.as_ref());
    let speakers = SpeakerResolver::new(archive.speakers().clone(), settings.player_name.clone());

    let content: Arc<dyn ContentStore> = archive.clone();
    let mut engine = DialogueEngine::new(content, Arc::clone(&progress), speakers);

    let pending: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
    let requests = Rc::clone(&pending);
    engine.set_scene_listener(move |scene_id| {
        *requests.borrow_mut() = Some(scene_id.to_string());
    });

    if let Some(scene_id) = &options.scene {
        engine.load_scene(scene_id)?;
    } else {
        match engine.resume() {
            Ok(()) => info!("resumed saved position"),
            Err(EngineError::InvalidAction { .. }) => {
                let first = archive
                    .scene_ids()
                    .first()
                    .map(|id| id.to_string())
                    .ok_or_else(|| anyhow!("story has no scenes"))?;
                engine.load_scene(&first)?;
            }
            Err(err) => return Err(err.into()),
        }
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        render(&engine, &settings);
        if engine.is_terminal() {
            println!("Scenario complete.");
            break;
        }

        print!("> ");
        io::stdout().flush().context("failed to flush prompt")?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("failed to read command")?;
        match parse_command(&line) {
            Some(Command::Quit) => break,
            Some(Command::Advance(action)) => {
                if let Err(err) = engine.advance(action) {
                    println!("!! {err}");
                    continue;
                }
                if let Some(scene_id) = pending.borrow_mut().take() {
                    println!("Moving to scene \"{scene_id}\"...");
                    engine.load_scene(&scene_id)?;
                }
            }
            None => {
                println!("Commands: next | choice <n> | quit");
            }
        }
    }

    println!(
        "Final position: scene \"{}\", node \"{}\"",
        engine.scene_id().unwrap_or("-"),
        engine.current_node_id().unwrap_or("-")
    );
    Ok(())
}

fn render(engine: &DialogueEngine, settings: &GameSettings) {
    let scene = engine.scene_id().unwrap_or("-");
    let node = engine.current_node_id().unwrap_or("-");
    let name = engine.speaker_name();
    if name.is_empty() {
        println!("[{scene}/{node}]");
    } else {
        println!("[{scene}/{node}] {name}:");
    }

    let text = LocalizedText::new(engine.primary_text(), engine.secondary_text());
    for line in displayed_lines(&text, settings.language) {
        println!("  {line}");
    }

    for (index, choice) in engine.choices().iter().enumerate() {
        println!("  {index}) {}", choice_label(&choice.label, settings.language));
    }
}

fn displayed_lines(text: &LocalizedText, language: LanguageMode) -> Vec<&str> {
    let mut lines = Vec::new();
    if language != LanguageMode::Secondary && !text.primary.is_empty() {
        lines.push(text.primary.as_str());
    }
    if language != LanguageMode::Primary && !text.secondary.is_empty() {
        lines.push(text.secondary.as_str());
    }
    lines
}

fn choice_label(label: &LocalizedText, language: LanguageMode) -> String {
    displayed_lines(label, language).join(" / ")
}

enum Command {
    Advance(AdvanceAction),
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let head = parts.next()?;
    match head {
        "quit" | "q" | "exit" => Some(Command::Quit),
        name => {
            let value = parts.next().and_then(|arg| arg.parse::<usize>().ok());
            AdvanceAction::from_name(name, value).map(Command::Advance)
        }
    }
}

struct CliOptions {
    path: String,
    scene: Option<String>,
    save_file: Option<PathBuf>,
    summary_only: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let Some(path) = args.next() else {
            return Err(anyhow!(
                "Usage: kaiwa-runtime <story.json> [--scene <id>] [--save-file <path>] [--summary-only]"
            ));
        };
        let mut scene = None;
        let mut save_file = None;
        let mut summary_only = false;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--scene" => {
                    scene = Some(args.next().ok_or_else(|| anyhow!("--scene expects a scene id"))?);
                }
                "--save-file" => {
                    save_file = Some(PathBuf::from(
                        args.next()
                            .ok_or_else(|| anyhow!("--save-file expects a path"))?,
                    ));
                }
                "--summary-only" => summary_only = true,
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected --scene, --save-file or --summary-only"
                    ));
                }
            }
        }
        Ok(Self {
            path,
            scene,
            save_file,
            summary_only,
        })
    }
}
