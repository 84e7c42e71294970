use colored::Colorize;
use converge_transfer::{
    Direction, FileSystem, GroupId, LinkOption, LocalFileSystem, ResourcesSpecification,
    TeraTemplating, TransferBehavior, TransferEngine,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct StageArgs {
    pub base_dir: PathBuf,
    pub pattern: String,
    pub destination: PathBuf,
    pub max_par: usize,
    pub template: bool,
    pub vars: Vec<(String, String)>,
    pub link_option: LinkOption,
    pub behavior: TransferBehavior,
    pub mode: Option<u32>,
    pub dir_mode: Option<u32>,
    pub group: Option<GroupId>,
}

/// `KEY=VALUE`
pub fn parse_var(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

/// Octal permission bits, with or without a leading `0o`
pub fn parse_mode(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0o");
    match u32::from_str_radix(digits, 8) {
        Ok(mode) if mode <= 0o7777 => Ok(mode),
        _ => Err(format!("'{}' is not an octal mode", s)),
    }
}

/// Variable values that parse as JSON keep their type (`8080`, `true`),
/// anything else is a string.
fn variable_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

pub async fn handle(args: StageArgs) -> anyhow::Result<()> {
    let mut spec = ResourcesSpecification::new(&args.base_dir, &args.pattern, &args.destination);
    spec.file_mode = args.mode;
    spec.dir_mode = args.dir_mode;
    spec.group = args.group;
    spec.template = args.template;
    spec.link_option = args.link_option;
    spec.transfer_behavior = args.behavior;

    let units = spec.resolve()?;
    if units.is_empty() {
        println!(
            "{} Nothing matches '{}' in {}",
            "⚠".yellow(),
            args.pattern,
            args.base_dir.display()
        );
        return Ok(());
    }

    println!(
        "{} {} entr{} to {}",
        "Staging".cyan().bold(),
        units.len(),
        if units.len() == 1 { "y" } else { "ies" },
        args.destination.display()
    );

    let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem);
    let mut engine = TransferEngine::new(fs.clone(), fs, Direction::Upload, args.max_par);
    if args.template {
        let mut templating = TeraTemplating::new()?;
        templating.add_env_variables();
        for (key, value) in &args.vars {
            templating.add_variable(key.clone(), variable_value(value));
        }
        engine = engine.with_templating(Arc::new(templating));
    }

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, waiting for in-flight transfers");
                cancel.cancel();
            }
        })
    };
    let result = engine.run(units, &cancel).await;
    interrupt.abort();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if let Some(partial) = e.report().filter(|r| !r.is_empty()) {
                println!("{} {}", "⚠".yellow(), partial);
            }
            return Err(e.into());
        }
    };
    println!("{} {}", "✓".green(), report);
    Ok(())
}
