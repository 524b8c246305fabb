use anyhow::{Context, Result, bail};
use std::{env, path::Path, path::PathBuf, process};
use trellis_config::Config;
use trellis_engine::{Editor, History, MarkdownOptions, markup};

mod script;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Markdown,
    Html,
    Tree,
    Json,
}

impl Format {
    fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "markdown" | "md" => Format::Markdown,
            "html" => Format::Html,
            "tree" => Format::Tree,
            "json" => Format::Json,
            other => bail!("Unknown output format '{other}'"),
        })
    }
}

#[derive(Debug)]
struct Args {
    document: PathBuf,
    script: Option<PathBuf>,
    format: Format,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {program} <document.md> [--script <edits.txt>] [--format markdown|html|tree|json]"
    )
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut document = None;
    let mut script = None;
    let mut format = Format::Markdown;
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--script" => {
                script = Some(PathBuf::from(rest.next().context("--script needs a path")?))
            }
            "--format" => format = Format::parse(rest.next().context("--format needs a value")?)?,
            flag if flag.starts_with("--") => bail!("Unknown option '{flag}'"),
            path if document.is_none() => document = Some(PathBuf::from(path)),
            extra => bail!("Unexpected argument '{extra}'"),
        }
    }
    Ok(Args {
        document: document.context("No document given")?,
        script,
        format,
    })
}

/// Relative document paths that don't exist here are looked up in the
/// configured documents folder.
fn resolve_document(path: &Path, config: Option<&Config>) -> PathBuf {
    match config {
        Some(config) if path.is_relative() && !path.exists() => config.documents_path.join(path),
        _ => path.to_path_buf(),
    }
}

fn run(args: Args, config: Option<Config>) -> Result<String> {
    let document = resolve_document(&args.document, config.as_ref());
    log::info!("Opening {}", document.display());
    let source = std::fs::read_to_string(&document)
        .with_context(|| format!("Failed to read {}", document.display()))?;

    let mut editor = Editor::from_markdown(&source)?;
    let mut options = MarkdownOptions::default();
    if let Some(config) = &config {
        editor = editor.with_history(History::new(config.history.depth));
        options.bullet = config.markdown.bullet;
    }

    if let Some(script_path) = &args.script {
        let text = std::fs::read_to_string(script_path)
            .with_context(|| format!("Failed to read script {}", script_path.display()))?;
        let actions = script::parse_script(&text)?;
        script::run(&mut editor, &actions)?;
        log::info!("Applied {} actions, document version {}", actions.len(), editor.version());
    }

    Ok(match args.format {
        Format::Markdown => editor.to_markdown(&options),
        Format::Html => editor.to_html() + "\n",
        Format::Tree => format!("{}\n", editor.doc()),
        Format::Json => markup::to_json(editor.doc())? + "\n",
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("trellis-cli");
    let parsed = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("{}", usage(program));
            process::exit(1);
        }
    };

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            eprintln!("Fix or remove {}", Config::config_path().display());
            process::exit(1);
        }
    };
    if config.is_none() {
        log::debug!("No config file at {}, using defaults", Config::config_path().display());
    }

    print!("{}", run(parsed, config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(words: &[&str]) -> Vec<String> {
        std::iter::once("trellis-cli").chain(words.iter().copied()).map(String::from).collect()
    }

    #[test]
    fn test_parse_args() {
        let words = ["doc.md", "--format", "html", "--script", "edits.txt"];
        let parsed = parse_args(&args(&words)).unwrap();
        assert_eq!(parsed.document, PathBuf::from("doc.md"));
        assert_eq!(parsed.script, Some(PathBuf::from("edits.txt")));
        assert_eq!(parsed.format, Format::Html);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["a.md", "b.md"])).is_err());
        assert!(parse_args(&args(&["a.md", "--format", "pdf"])).is_err());
        assert!(parse_args(&args(&["a.md", "--verbose"])).is_err());
    }

    #[test]
    fn test_resolve_document_uses_documents_path() {
        let config = Config::new("/docs");
        assert_eq!(
            resolve_document(Path::new("missing-note.md"), Some(&config)),
            PathBuf::from("/docs/missing-note.md")
        );
        assert_eq!(resolve_document(Path::new("/abs.md"), Some(&config)), PathBuf::from("/abs.md"));
        assert_eq!(resolve_document(Path::new("note.md"), None), PathBuf::from("note.md"));
    }

    #[test]
    fn test_run_applies_script_with_config() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("note.md"), "- ab\n").unwrap();
        let script = dir.path().join("edits.txt");
        std::fs::write(&script, "select 4\nenter\n").unwrap();

        let mut config = Config::new(dir.path());
        config.markdown.bullet = '*';
        let parsed = Args {
            document: dir.path().join("note.md"),
            script: Some(script),
            format: Format::Markdown,
        };
        assert_eq!(run(parsed, Some(config)).unwrap(), "* a\n* b\n");
    }
}
