use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use banana_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use banana_contracts::events::EventWriter;
use banana_contracts::images::{AspectRatio, GeneratedImage};
use banana_engine::config::StudioConfig;
use banana_engine::{GenerateRejected, GenerationOutcome, Studio};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "banana-rs", version, about = "Prompt-to-image studio")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat(ChatArgs),
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct StudioArgs {
    /// Directory that downloads (and the default event log) go to.
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    studio: StudioArgs,
    #[arg(long, default_value = "1:1", value_parser = parse_aspect_ratio)]
    aspect_ratio: AspectRatio,
}

#[derive(Debug, Parser)]
struct RunArgs {
    #[arg(long)]
    prompt: String,
    #[command(flatten)]
    studio: StudioArgs,
    #[arg(long, default_value = "1:1", value_parser = parse_aspect_ratio)]
    aspect_ratio: AspectRatio,
}

fn parse_aspect_ratio(raw: &str) -> Result<AspectRatio, String> {
    AspectRatio::from_label_or_ratio(raw).map_err(|err| err.to_string())
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("banana-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Run(args) => run_once(args),
    }
}

fn open_studio(args: &StudioArgs) -> Result<Studio> {
    let config = StudioConfig::from_env()
        .with_provider(args.provider.clone())
        .with_model(args.model.clone());
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let events = EventWriter::new(events_path, uuid::Uuid::new_v4().to_string());
    Studio::from_config(&config, events)
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let studio = open_studio(&args.studio)?;
    let mut aspect_ratio = args.aspect_ratio;
    let stdin = io::stdin();
    let mut line = String::new();

    println!(
        "Studio ready ({} / {}). Type a prompt, or /help for commands.",
        studio.provider_name(),
        studio.model()
    );
    if let Some(path) = studio.event_writer().path() {
        println!("Logging session events to {}", path.display());
    }

    loop {
        print!("[{}] > ", aspect_ratio);
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_intent(input);
        match intent.action.as_str() {
            "noop" => continue,
            "quit" => break,
            "help" => println!("Commands: {}", CHAT_HELP_COMMANDS.join(" ")),
            "generate" => {
                let prompt = intent.prompt.as_deref().unwrap_or(input);
                println!("Generating ({aspect_ratio})...");
                match studio.generate(prompt, aspect_ratio) {
                    Ok(_) => render(&studio),
                    Err(GenerateRejected::EmptyPrompt) => continue,
                    Err(err) => println!("{err}"),
                }
            }
            "set_aspect_ratio" => match intent.arg("aspect_ratio") {
                Some(raw) => match AspectRatio::from_label_or_ratio(raw) {
                    Ok(ratio) => {
                        aspect_ratio = ratio;
                        println!("Aspect ratio set to {} ({})", ratio, ratio.label());
                    }
                    Err(err) => println!("{err}"),
                },
                None => println!("/ratio requires one of: {}", ratio_choices()),
            },
            "list_aspect_ratios" => {
                for ratio in AspectRatio::ALL {
                    let marker = if ratio == aspect_ratio { "*" } else { " " };
                    println!("{marker} {:<5} {}", ratio.as_str(), ratio.label());
                }
            }
            "list_history" => print_history(&studio),
            "select_history" => {
                let Some(target) = intent.arg("target") else {
                    println!("/select requires a history number or image id");
                    continue;
                };
                match resolve_target(&studio, target) {
                    Some(image) => match studio.select_from_history(&image.id) {
                        Ok(_) => render(&studio),
                        Err(err) => println!("{err}"),
                    },
                    None => println!("No history entry matches '{target}'"),
                }
            }
            "show_current" => render(&studio),
            "download" => download(&studio, &intent, &args.studio.out),
            "dismiss_error" => {
                studio.dismiss_error();
                println!("Error dismissed.");
            }
            "status" => println!("{}", serde_json::to_string_pretty(&studio.snapshot())?),
            _ => {
                let command = intent.arg("command").unwrap_or_default();
                println!("Unknown command /{command}. Type /help for commands.");
            }
        }
    }

    studio.finish()?;
    Ok(())
}

fn run_once(args: RunArgs) -> Result<i32> {
    let studio = open_studio(&args.studio)?;
    let outcome = match studio.generate(&args.prompt, args.aspect_ratio) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("banana-rs: {err}");
            studio.finish()?;
            return Ok(2);
        }
    };
    let code = match outcome {
        GenerationOutcome::Generated(image) => {
            let path = studio.download(&image.id, &args.studio.out)?;
            println!("{}", describe_image(&image));
            println!("Saved {}", path.display());
            0
        }
        GenerationOutcome::Failed(error) => {
            eprintln!("Error: {error}");
            1
        }
    };
    studio.finish()?;
    Ok(code)
}

fn download(studio: &Studio, intent: &Intent, default_dir: &Path) {
    let image = match intent.arg("target") {
        Some(target) => resolve_target(studio, target),
        None => studio.current_image(),
    };
    let Some(image) = image else {
        println!("Nothing to download. Generate an image or pick one from /history.");
        return;
    };
    let dir = intent
        .arg("dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| default_dir.to_path_buf());
    match studio.download(&image.id, &dir) {
        Ok(path) => println!("Saved {}", path.display()),
        Err(err) => println!("Download failed: {err:#}"),
    }
}

/// Exact image id first, then a 1-based position as listed by `/history`.
fn resolve_target(studio: &Studio, target: &str) -> Option<GeneratedImage> {
    let target = target.trim();
    if let Some(image) = studio.image(target) {
        return Some(image);
    }
    let position = target.parse::<usize>().ok().filter(|value| *value > 0)?;
    studio.history_entry(position - 1)
}

fn render(studio: &Studio) {
    let snapshot = studio.snapshot();
    if let Some(error) = snapshot.error.as_deref() {
        println!("Error: {error}");
    }
    match studio.current_image() {
        Some(image) => println!("{}", describe_image(&image)),
        None => println!("Ready to generate. Enter a prompt above!"),
    }
}

fn print_history(studio: &Studio) {
    let history = studio.history();
    if history.is_empty() {
        println!("History is empty.");
        return;
    }
    let current_id = studio.current_image().map(|image| image.id);
    for (idx, image) in history.iter().enumerate() {
        let marker = if current_id.as_deref() == Some(image.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {:>2}. {} [{}] {}",
            idx + 1,
            image.id,
            image.aspect_ratio,
            truncate_prompt(&image.prompt, 60)
        );
    }
}

fn describe_image(image: &GeneratedImage) -> String {
    format!(
        "Image {} [{} {}] {} bytes, {} UTC\n  {}",
        image.id,
        image.aspect_ratio,
        image.aspect_ratio.label(),
        image.image_data.len(),
        image.created_at.format("%H:%M:%S"),
        image.prompt.trim()
    )
}

fn truncate_prompt(prompt: &str, max_chars: usize) -> String {
    let flat = prompt.split_whitespace().collect::<Vec<&str>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    flat.chars().take(max_chars).collect::<String>() + "…"
}

fn ratio_choices() -> String {
    AspectRatio::ALL
        .iter()
        .map(|ratio| ratio.as_str())
        .collect::<Vec<&str>>()
        .join(", ")
}
