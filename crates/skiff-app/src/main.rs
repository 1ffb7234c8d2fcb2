use std::env;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context as _, Result};

use skiff_config::AppManifest;
use skiff_core::{
    command::{self, CommandContext, CommandOutput, CommandRegistry},
    document::MemoryDocument,
    loader::{FsTemplates, TemplateLayout},
    logging::{self, LogBuffer},
    store::Store,
    App,
};

const DEFAULT_MANIFEST: &str = "skiff.toml";
const PROMPT: &str = "skiff> ";

/// Manifest location: first CLI argument, then `SKIFF_CONFIG`, then
/// `./skiff.toml`.
fn manifest_path() -> PathBuf {
    env::args()
        .nth(1)
        .or_else(|| env::var("SKIFF_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST))
}

/// Relative template and storage paths are resolved against the manifest's
/// directory.
fn base_dir(manifest_path: &Path) -> PathBuf {
    match manifest_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn build_app(manifest: &AppManifest, base: &Path) -> Result<App> {
    let store_path = manifest.storage.path.as_ref().map(|p| base.join(p));
    let store = Store::open(store_path.as_deref(), manifest.storage.cookie_expiry_days);
    if !store.is_native() {
        tracing::info!("using cookie storage");
    }

    let mut app = App::builder()
        .document(Rc::new(MemoryDocument::new()))
        .templates(Rc::new(FsTemplates::new(base)))
        .loader(Rc::new(skiff_mod_demo::dependency_loader()))
        .store(store)
        .template_layout(TemplateLayout {
            dir: manifest.templates.dir.clone(),
            suffix: manifest.templates.suffix.clone(),
        })
        .build();

    for key in &manifest.modules {
        let module = skiff_mod_demo::build(key)
            .with_context(|| format!("no module is available for key {key:?}"))?;
        app.register(key, module)?;
    }
    Ok(app)
}

/// Execute one console line and print its output. Returns true on quit.
fn dispatch(commands: &CommandRegistry, app: &mut App, logs: &LogBuffer, input: &str) -> bool {
    let mut ctx = CommandContext { app: &mut *app, logs };
    let quit = match commands.execute(input.trim(), &mut ctx) {
        CommandOutput::Lines(lines) => {
            for line in lines {
                println!("{line}");
            }
            false
        }
        CommandOutput::Quit => true,
    };
    app.run_until_idle();
    quit
}

fn run(app: &mut App, logs: &LogBuffer) -> Result<()> {
    let commands = command::builtin_registry();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!("Type 'help' for available commands.");
    loop {
        print!("{PROMPT}");
        stdout.flush().context("failed to flush stdout")?;

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .context("failed to read from stdin")?;
        if read == 0 {
            println!();
            return Ok(());
        }
        if dispatch(&commands, app, logs, &line) {
            return Ok(());
        }
    }
}

fn main() -> Result<()> {
    let logs = logging::init();

    let path = manifest_path();
    let manifest = AppManifest::load_or_default(&path)?;
    tracing::info!(
        manifest = %path.display(),
        modules = manifest.modules.len(),
        "skiff starting up"
    );

    let mut app = build_app(&manifest, &base_dir(&path))?;
    app.start(manifest.start_fragment())?;
    app.run_until_idle();

    run(&mut app, &logs)?;
    tracing::info!("skiff shutting down");
    Ok(())
}
