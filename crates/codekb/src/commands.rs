//! Command implementations.
//!
//! Each command writes its user-facing output to `out` so it can be
//! exercised without a terminal. Diagnostics go through `tracing`.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use codekb_index::{
    CategoryStore, Extractor, KnowledgeBase, Namespace, QueryEngine, SearchRequest,
    build_embedder, load_snippets, save_snippets,
};

use crate::config::Settings;
use crate::session::{Identity, IdentityStore};

/// Shared state for one invocation.
pub struct App {
    pub data_dir: PathBuf,
    pub settings: Settings,
}

impl App {
    /// Load and validate settings for the data directory.
    pub fn load(data_dir: PathBuf) -> Result<Self> {
        let settings = Settings::load(&data_dir)?;
        let errors = settings.validate();
        if !errors.is_empty() {
            let details: Vec<String> = errors.iter().map(|e| format!("  {}", e)).collect();
            bail!(
                "Invalid settings in {}:\n{}",
                Settings::settings_path(&data_dir).display(),
                details.join("\n")
            );
        }
        Ok(Self { data_dir, settings })
    }

    fn identities(&self) -> IdentityStore {
        IdentityStore::new(&self.data_dir)
    }

    /// Namespace of the logged-in user.
    fn namespace(&self) -> Result<Namespace> {
        let identity = self.identities().require()?;
        identity.namespace(&self.data_dir)
    }
}

/// Split a comma-separated category list, dropping empty entries.
pub fn parse_categories(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

pub fn login(app: &App, username: &str, token: &str, out: &mut dyn Write) -> Result<()> {
    let identity = Identity::new(username, token)?;
    app.identities().save(&identity)?;
    identity.namespace(&app.data_dir)?.ensure()?;
    tracing::info!("Logged in as {}", identity.username);
    writeln!(out, "Logged in as {}", identity.username)?;
    Ok(())
}

pub fn logout(app: &App, out: &mut dyn Write) -> Result<()> {
    let identities = app.identities();
    if identities.clear()? {
        tracing::debug!("Removed {}", identities.path().display());
        writeln!(out, "Logged out")?;
    } else {
        writeln!(out, "Not logged in")?;
    }
    Ok(())
}

pub fn status(app: &App, out: &mut dyn Write) -> Result<()> {
    match app.identities().load()? {
        Some(identity) => {
            write!(out, "Logged in as {}", identity.username)?;
            if let Some(at) = identity.logged_in_at {
                write!(out, " (since {})", at.format("%Y-%m-%d %H:%M:%S UTC"))?;
            }
            writeln!(out)?;
            let ns = identity.namespace(&app.data_dir)?;
            writeln!(out, "Namespace: {}", ns.root().display())?;
            writeln!(
                out,
                "Snippets: {}, knowledge base: {}",
                if ns.has_snippets() { "yes" } else { "no" },
                if ns.has_knowledge_base() { "yes" } else { "no" }
            )?;
        }
        None => writeln!(out, "Not logged in")?,
    }
    Ok(())
}

pub fn scan(app: &App, path: &Path, categories: &[String], out: &mut dyn Write) -> Result<()> {
    let ns = app.namespace()?;
    if !path.is_dir() {
        bail!("Not a directory: {}", path.display());
    }

    let mut extractor = Extractor::new(app.settings.scan_config());
    let output = extractor
        .scan(path, categories)
        .with_context(|| format!("Failed to scan {}", path.display()))?;

    ns.ensure()?;
    save_snippets(&ns.snippets_path(), &output.snippets)?;
    writeln!(
        out,
        "Extracted {} snippets from {} files ({} skipped) into {}",
        output.stats.snippets,
        output.stats.files_scanned,
        output.stats.files_skipped,
        ns.snippets_path().display()
    )?;
    Ok(())
}

pub fn vectorize(app: &App, out: &mut dyn Write) -> Result<()> {
    let ns = app.namespace()?;
    if !ns.has_snippets() {
        bail!("No snippets found. Run `codekb scan` first.");
    }
    let snippets = load_snippets(&ns.snippets_path())?;
    if snippets.is_empty() {
        bail!("The last scan found no snippets; nothing to index.");
    }

    let mut embedder = build_embedder(&app.settings.embedder_config(&app.data_dir)?)?;
    let (kb, stats) = KnowledgeBase::build(snippets, embedder.as_mut())?;
    kb.save(&ns)?;

    writeln!(
        out,
        "Indexed {} snippets ({} dimensions) in {}ms",
        stats.vectors, stats.dimension, stats.embed_time_ms
    )?;
    Ok(())
}

pub fn search(
    app: &App,
    query: &str,
    category: Option<String>,
    top_k: Option<usize>,
    out: &mut dyn Write,
) -> Result<()> {
    let ns = app.namespace()?;
    if !ns.has_knowledge_base() {
        bail!("No knowledge base found. Run `codekb vectorize` first.");
    }
    let kb = KnowledgeBase::load(&ns)?;

    let mut embedder = build_embedder(&app.settings.embedder_config(&app.data_dir)?)?;
    let mut engine = QueryEngine::new(&kb, embedder.as_mut());
    let request = SearchRequest::new(query)
        .with_top_k(top_k.unwrap_or(app.settings.search.top_k))
        .with_category(category);
    let results = engine.search(&request)?;

    if results.is_empty() {
        writeln!(out, "No results")?;
        return Ok(());
    }
    for (rank, result) in results.iter().enumerate() {
        let snippet = &result.snippet;
        writeln!(
            out,
            "{}. [{}] {} ({}) distance {:.4}",
            rank + 1,
            snippet.kind,
            snippet.name,
            snippet.location(),
            result.distance
        )?;
        if !snippet.category.is_empty() {
            writeln!(out, "   categories: {}", snippet.category.join(", "))?;
        }
        writeln!(out, "{}", snippet.code)?;
        writeln!(out)?;
    }
    Ok(())
}

pub fn categories_list(app: &App, out: &mut dyn Write) -> Result<()> {
    let labels = CategoryStore::new(&app.namespace()?).list()?;
    if labels.is_empty() {
        writeln!(out, "No categories")?;
    }
    for label in labels {
        writeln!(out, "{}", label)?;
    }
    Ok(())
}

pub fn categories_add(app: &App, name: &str, out: &mut dyn Write) -> Result<()> {
    if CategoryStore::new(&app.namespace()?).add(name)? {
        writeln!(out, "Added category {}", name)?;
    } else {
        writeln!(out, "Category {} already exists", name)?;
    }
    Ok(())
}

pub fn categories_remove(app: &App, name: &str, out: &mut dyn Write) -> Result<()> {
    if CategoryStore::new(&app.namespace()?).remove(name)? {
        writeln!(out, "Removed category {}", name)?;
    } else {
        writeln!(out, "Category {} not found", name)?;
    }
    Ok(())
}

pub fn init(data_dir: &Path, force: bool, out: &mut dyn Write) -> Result<()> {
    let path = Settings::settings_path(data_dir);
    if Settings::write_default(data_dir, force)? {
        writeln!(out, "Wrote {}", path.display())?;
    } else {
        writeln!(out, "{} already exists (use --force to overwrite)", path.display())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    fn hash_app(dir: &TempDir) -> App {
        std::fs::write(
            dir.path().join(crate::config::SETTINGS_FILE),
            "[embedding]\nbackend = \"hash\"\ndimension = 64\n",
        )
        .unwrap();
        App::load(dir.path().to_path_buf()).unwrap()
    }

    fn run(f: impl FnOnce(&mut dyn Write) -> Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_parse_categories() {
        assert_eq!(parse_categories(Some(" web, ,cli ,")), vec!["web", "cli"]);
        assert!(parse_categories(Some("")).is_empty());
        assert!(parse_categories(None).is_empty());
    }

    #[test]
    fn test_commands_require_login() {
        let dir = tempdir().unwrap();
        let app = hash_app(&dir);
        let mut sink = Vec::new();

        assert!(vectorize(&app, &mut sink).is_err());
        assert!(categories_list(&app, &mut sink).is_err());
        assert!(scan(&app, dir.path(), &[], &mut sink).is_err());
        assert!(!dir.path().join("config.json").exists());
    }

    #[test]
    fn test_login_status_logout() {
        let dir = tempdir().unwrap();
        let app = hash_app(&dir);

        run(|out| login(&app, "alice", "", out));
        let text = run(|out| status(&app, out));
        assert!(text.starts_with("Logged in as alice"));
        assert!(dir.path().join("alice").is_dir());

        assert_eq!(run(|out| logout(&app, out)), "Logged out\n");
        assert_eq!(run(|out| logout(&app, out)), "Not logged in\n");
    }

    #[test]
    fn test_vectorize_before_scan_fails() {
        let dir = tempdir().unwrap();
        let app = hash_app(&dir);
        run(|out| login(&app, "bob", "", out));

        let err = vectorize(&app, &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("codekb scan"));
        assert!(!dir.path().join("bob").join("faiss.index").exists());
    }

    #[test]
    fn test_search_before_vectorize_fails() {
        let dir = tempdir().unwrap();
        let app = hash_app(&dir);
        run(|out| login(&app, "bob", "", out));

        let err = search(&app, "x", None, None, &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("codekb vectorize"));
    }

    #[test]
    fn test_scan_vectorize_search() {
        let dir = tempdir().unwrap();
        let src = tempdir().unwrap();
        std::fs::write(
            src.path().join("tools.py"),
            "def slugify(text):\n    return text.lower().replace(' ', '-')\n\nclass Cache:\n    pass\n",
        )
        .unwrap();
        let app = hash_app(&dir);
        run(|out| login(&app, "carol", "", out));

        let scanned = run(|out| scan(&app, src.path(), &["util".to_string()], out));
        assert!(scanned.starts_with("Extracted 2 snippets"));

        let indexed = run(|out| vectorize(&app, out));
        assert!(indexed.starts_with("Indexed 2 snippets (64 dimensions)"));

        let found = run(|out| search(&app, "slugify text lower", None, Some(1), out));
        assert!(found.starts_with("1. [function] slugify"));
        assert!(found.contains("categories: util"));

        let filtered = run(|out| search(&app, "slugify", Some("other".to_string()), None, out));
        assert_eq!(filtered, "No results\n");
    }

    #[test]
    fn test_categories_commands() {
        let dir = tempdir().unwrap();
        let app = hash_app(&dir);
        run(|out| login(&app, "dave", "", out));

        assert_eq!(run(|out| categories_list(&app, out)), "No categories\n");
        assert_eq!(run(|out| categories_add(&app, "web", out)), "Added category web\n");
        assert_eq!(
            run(|out| categories_add(&app, "web", out)),
            "Category web already exists\n"
        );
        assert_eq!(run(|out| categories_list(&app, out)), "web\n");
        assert_eq!(run(|out| categories_remove(&app, "web", out)), "Removed category web\n");
        assert_eq!(
            run(|out| categories_remove(&app, "web", out)),
            "Category web not found\n"
        );
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(crate::config::SETTINGS_FILE),
            "[search]\ntop_k = 0\n",
        )
        .unwrap();
        let err = App::load(dir.path().to_path_buf()).err().unwrap();
        assert!(err.to_string().contains("search.top_k"));
    }

    #[test]
    fn test_init_writes_settings() {
        let dir = tempdir().unwrap();
        let first = run(|out| init(dir.path(), false, out));
        assert!(first.starts_with("Wrote"));
        let second = run(|out| init(dir.path(), false, out));
        assert!(second.contains("already exists"));
    }
}
