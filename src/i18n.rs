// i18n.rs
//
// Lightweight runtime i18n for the viewer UI.
// - Strings ship embedded (assets/i18n.json, single file keyed by language:
//   { "<lang>": { "key": "value" } }); a file with the same name next to the
//   executable or in the working directory overrides the embedded table.
// - Load order: selected lang -> fallback pt-BR
// - Lookup: tr("key") / tr_with("key", [("name", "...")]) with {name} placeholders
//
// Language selection:
// - CLI: --lang <code> (e.g. pt-BR, en, es)
// - Env: TOUR_LANG
// - Default: pt-BR

use once_cell::sync::OnceCell;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

const FALLBACK_LANG: &str = "pt-BR";
static EMBEDDED: &str = include_str!("../assets/i18n.json");

#[derive(Debug, Clone)]
struct I18n {
    map: HashMap<String, String>,
    fallback_map: HashMap<String, String>,
}

static I18N: OnceCell<RwLock<I18n>> = OnceCell::new();

type LangTables = HashMap<String, HashMap<String, String>>;

fn parse_tables(text: &str) -> Option<LangTables> {
    serde_json::from_str(text).ok()
}

fn load_tables_from(path: &Path) -> Option<LangTables> {
    let text = std::fs::read_to_string(path).ok()?;
    parse_tables(&text)
}

/// Find an on-disk override next to the executable or in the working dir.
fn find_override_file() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let p = dir.join("assets").join("i18n.json");
            if p.exists() {
                return Some(p);
            }
        }
    }

    let p = PathBuf::from("assets").join("i18n.json");
    if p.exists() {
        return Some(p);
    }

    None
}

fn load_lang(tables: &LangTables, lang: &str) -> HashMap<String, String> {
    tables.get(lang).cloned().unwrap_or_default()
}

/// Initialize global i18n. Safe to call multiple times; later calls overwrite
/// the active language maps.
pub fn init(lang: impl Into<String>) {
    let lang = lang.into();

    let tables = find_override_file()
        .and_then(|p| load_tables_from(&p))
        .or_else(|| parse_tables(EMBEDDED))
        .unwrap_or_default();

    let map = load_lang(&tables, &lang);
    let fallback_map = if lang == FALLBACK_LANG {
        map.clone()
    } else {
        load_lang(&tables, FALLBACK_LANG)
    };

    let i = I18n { map, fallback_map };

    if let Some(lock) = I18N.get() {
        if let Ok(mut w) = lock.write() {
            *w = i;
        }
    } else {
        let _ = I18N.set(RwLock::new(i));
    }
}

fn get_locked() -> Option<std::sync::RwLockReadGuard<'static, I18n>> {
    I18N.get().and_then(|l| l.read().ok())
}

/// Get localized text by key. If the key is missing everywhere, returns the
/// key itself so untranslated UI stays legible.
pub fn tr(key: &str) -> String {
    let Some(i) = get_locked() else {
        return key.to_string();
    };

    if let Some(v) = i.map.get(key) {
        return v.clone();
    }
    if let Some(v) = i.fallback_map.get(key) {
        return v.clone();
    }
    key.to_string()
}

/// Get localized text and substitute `{name}` placeholders.
/// Any placeholder not provided is kept as-is.
pub fn tr_with(key: &str, args: &[(&str, String)]) -> String {
    let mut s = tr(key);
    for (k, v) in args {
        let placeholder = format!("{{{}}}", k);
        s = s.replace(&placeholder, v);
    }
    s
}

/// Choose language from CLI/env.
pub fn resolve_lang_from_args() -> String {
    // CLI: --lang <code>
    let mut it = std::env::args();
    while let Some(a) = it.next() {
        if a == "--lang" {
            if let Some(v) = it.next() {
                return v;
            }
        }
    }

    // Env: TOUR_LANG
    if let Ok(v) = std::env::var("TOUR_LANG") {
        if !v.trim().is_empty() {
            return v;
        }
    }

    FALLBACK_LANG.to_string()
}
