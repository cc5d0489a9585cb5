//! Point d'entrée de SuriKiosk.
//!
//! Usage :
//!   surikiosk [URL] [--developer-mode]
//!
//! Exemples :
//!   cargo run                              → charge `general.app_url` de config.toml
//!   cargo run -- https://exam.example.edu  → remplace la page de départ
//!   cargo run -- exam.example.edu          → ajoute https:// automatiquement
//!   cargo run -- --developer-mode          → F12 / Ctrl+Shift+I autorisés

use std::env;
use std::error::Error;

use surikiosk::config::Config;
use surikiosk::events::SecurityEvent;
use surikiosk::kiosk::App;
use surikiosk::logging;
use surikiosk::rules::RuleStore;
use tracing::{info, warn};
use url::Url;
use winit::event_loop::EventLoop;

fn main() -> Result<(), Box<dyn Error>> {
    // ── 0. Arguments ───────────────────────────────────────────────────
    let args: Vec<String> = env::args().skip(1).collect();
    let developer_mode = args.iter().any(|a| a == "--developer-mode");

    // ── 1. Configuration ───────────────────────────────────────────────
    // Chargée avant le logging : on ne connaît le filtre qu'après. Les
    // problèmes sont journalisés à l'étape 2.
    let loaded = Config::load();
    let mut config = loaded.config.clone();
    if let Some(url) = url_from_args(&args) {
        config.general.app_url = url.to_string();
    }
    if developer_mode {
        config.keyboard.developer_mode = true;
    }

    // ── 2. Logging / Tracing ───────────────────────────────────────────
    let _log_guard = logging::init_logging(&config.logging);
    loaded.report();

    if developer_mode {
        warn!("DEVELOPER MODE ENABLED: debug tool shortcuts are not blocked");
    }

    // ── 3. Règles ──────────────────────────────────────────────────────
    let rules = RuleStore::new(config.rule_set());
    {
        let snapshot = rules.snapshot();
        info!(
            allowed_domains = snapshot.allowed_domains.len(),
            blocked_domains = snapshot.blocked_domains.len(),
            exit_patterns = snapshot.exit_patterns.len(),
            strict = snapshot.strict_mode,
            "Rule set loaded"
        );
    }

    // ── 4. Boucle d'événements Winit ───────────────────────────────────
    let event_loop = EventLoop::<SecurityEvent>::with_user_event().build()?;
    let mut app = App::new(&event_loop, config, rules);

    Ok(event_loop.run_app(&mut app)?)
}

/// Premier argument qui n'est pas un flag, interprété comme URL.
/// Si l'argument ne contient pas de schéma (http/https), on ajoute "https://".
fn url_from_args(args: &[String]) -> Option<Url> {
    let input = args.iter().find(|arg| !arg.starts_with("--"))?;

    // Essaie de parser directement (fonctionne si l'utilisateur a mis le schéma)
    if let Ok(url) = Url::parse(input)
        && url.has_host()
    {
        return Some(url);
    }

    // Sinon, ajoute https:// et réessaie
    match Url::parse(&format!("https://{input}")) {
        Ok(url) => Some(url),
        Err(e) => {
            eprintln!("URL invalide '{input}': {e}, page de départ de la configuration conservée");
            None
        }
    }
}
