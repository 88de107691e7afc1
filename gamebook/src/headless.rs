//! Line-oriented play loop.
//!
//! Prints the current page as plain text and reads one line per turn:
//! a reaction number, the exact text of a reaction, or a `#` command.

use gamebook_core::{HeadlessConfig, HeadlessError, HeadlessGame, PageView, PersistError};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Environment variable naming the story file.
pub const STORY_ENV: &str = "GAMEBOOK_STORY";
/// Environment variable naming the autosave directory.
pub const SAVE_DIR_ENV: &str = "GAMEBOOK_SAVE_DIR";
/// Environment variable naming the session to resume.
pub const SESSION_ENV: &str = "GAMEBOOK_SESSION";

/// Run the game until the player quits or input ends.
pub async fn run_headless(config: HeadlessConfig) -> Result<(), HeadlessError> {
    let mut game = match HeadlessGame::new(config.clone()).await {
        Err(HeadlessError::Persist(e @ PersistError::UnknownUnitId { .. })) => {
            // The story changed under this save; tell the player instead of
            // quietly putting them back at the start.
            println!("[WARNING] Saved progress no longer fits the story ({e}). Starting over.");
            HeadlessGame::new(config.with_fresh_start(true)).await?
        }
        other => other?,
    };

    println!("=== Gamebook ===");
    if game.autosaves() {
        println!(
            "Session: {}{}",
            game.session_id(),
            if game.resumed() { " (resumed)" } else { "" }
        );
    }
    println!("Type #help for commands.");
    println!();
    print_page(&game.view());

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // Handle commands
        if let Some(command) = line.strip_prefix('#') {
            let parts: Vec<&str> = command.split_whitespace().collect();
            match parts.first().copied() {
                Some("quit") | Some("exit") => {
                    println!("Goodbye!");
                    break;
                }
                Some("undo") | Some("back") => show(game.undo().await),
                Some("restart") => show(game.restart().await),
                Some("save") => {
                    if let Some(path) = parts.get(1) {
                        match game.save_to(path).await {
                            Ok(()) => println!("[SAVED] Progress saved to {path}"),
                            Err(e) => println!("[ERROR] Save failed: {e}"),
                        }
                    } else {
                        println!("[ERROR] Usage: #save <path>");
                    }
                }
                Some("load") => {
                    if let Some(path) = parts.get(1) {
                        match game.load_from(path).await {
                            Ok(view) => {
                                println!("[LOADED] Progress loaded from {path}");
                                print_page(&view);
                            }
                            Err(e) => println!("[ERROR] Load failed: {e}"),
                        }
                    } else {
                        println!("[ERROR] Usage: #load <path>");
                    }
                }
                Some("status") => {
                    println!("[STATUS]");
                    println!("  Unit: {}", game.session().current_id());
                    println!("  Moves to undo: {}", game.depth());
                    println!("  Autosave: {}", if game.autosaves() { "on" } else { "off" });
                    println!("  Session: {}", game.session_id());
                }
                Some("html") => println!("{}", game.view().to_html()),
                Some("help") => print_help_commands(),
                _ => println!("[ERROR] Unknown command. Type #help for help."),
            }
            stdout.flush().ok();
            continue;
        }

        show(pick(&mut game, line).await);
        stdout.flush().ok();
    }

    Ok(())
}

/// Follow a reaction given by number or by exact text.
///
/// A number that is not a valid choice is tried as reaction text, so labels
/// like `1984` can still be picked.
async fn pick(game: &mut HeadlessGame, line: &str) -> Result<PageView, HeadlessError> {
    let Ok(choice) = line.parse::<usize>() else {
        return game.react(line).await;
    };
    match game.choose(choice).await {
        Err(e @ HeadlessError::NoSuchChoice { .. }) => game.react(line).await.map_err(|_| e),
        other => other,
    }
}

fn show(result: Result<PageView, HeadlessError>) {
    match result {
        Ok(view) => print_page(&view),
        Err(e) => println!("[ERROR] {e}"),
    }
}

fn print_page(view: &PageView) {
    for paragraph in &view.paragraphs {
        println!("{}", paragraph.to_plain_text());
        println!();
    }

    if view.reactions.is_empty() {
        println!("[THE END]");
    }
    for (i, reaction) in view.reactions.iter().enumerate() {
        println!("  {}. {}", i + 1, reaction.to_plain_text());
    }
    if view.can_undo {
        println!("  (#undo to go back)");
    }
    println!();
}

fn print_help_commands() {
    println!("[HELP]");
    println!("  <number>      - Pick a reaction by number");
    println!("  <text>        - Pick a reaction by its exact text");
    println!("  #undo         - Go back one move");
    println!("  #restart      - Start the story over");
    println!("  #save <path>  - Save progress to a file");
    println!("  #load <path>  - Load progress from a file");
    println!("  #status       - Show the current position");
    println!("  #html         - Print the current page as HTML");
    println!("  #quit         - Exit");
}

/// Build the game configuration from the environment and the command line.
///
/// Flags override environment variables. Returns `None` when no story was
/// given.
pub fn parse_config_from_args(args: &[String]) -> Option<HeadlessConfig> {
    let mut story = std::env::var(STORY_ENV).ok().map(PathBuf::from);
    let mut save_dir = std::env::var(SAVE_DIR_ENV).ok().map(PathBuf::from);
    let mut session = std::env::var(SESSION_ENV).ok();
    let mut fresh = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--story" => {
                if let Some(path) = args.get(i + 1) {
                    story = Some(PathBuf::from(path));
                    i += 1;
                }
            }
            "--save-dir" => {
                if let Some(dir) = args.get(i + 1) {
                    save_dir = Some(PathBuf::from(dir));
                    i += 1;
                }
            }
            "--session" => {
                if let Some(id) = args.get(i + 1) {
                    session = Some(id.clone());
                    i += 1;
                }
            }
            "--fresh" => fresh = true,
            _ => {}
        }
        i += 1;
    }

    let mut config = HeadlessConfig::new(story?).with_fresh_start(fresh);
    if let Some(dir) = save_dir {
        config = config.with_save_dir(dir);
    }
    if let Some(id) = session {
        config = config.with_session_id(id);
    }
    Some(config)
}
