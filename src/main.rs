//! ucb CLI
//!
//! Entry point for the `ucb` command-line tool.

use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use ucb_tool::artifact::{ArtifactRetriever, BuildSelector, DownloadRequest};
use ucb_tool::config::{CloudBuildContext, ConfigError, ContextOverrides};
use ucb_tool::host::{BuildFilter, CloudBuildClient, HttpArtifactSource, HttpTransport};
use ucb_tool::monitor::{CompletionMonitor, SilentObserver, WatchSelector};
use ucb_tool::output::{self, HumanObserver};
use ucb_tool::revision::{self, MatchScope, RevisionMatcher};
use ucb_tool::{telemetry, BuildStatus, Error, ErrorKind, ValidationError};

/// Exit code when builds do not match the checked revision
const EXIT_REVISION_MISMATCH: i32 = 10;

#[derive(Parser)]
#[command(name = "ucb")]
#[command(about = "Cloud Build command-line client", version)]
struct Cli {
    /// API key
    #[arg(long, env = "UNITY_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Organization id (default: from ProjectSettings.asset)
    #[arg(long, env = "UNITY_ORG_ID", global = true)]
    org_id: Option<String>,

    /// Project id (default: from ProjectSettings.asset)
    #[arg(long, env = "UNITY_PROJECT_ID", global = true)]
    project_id: Option<String>,

    /// Host config file (default: ~/.config/ucb/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build commands
    Builds {
        #[command(subcommand)]
        action: BuildsCommands,
    },

    /// Build target commands
    Targets {
        #[command(subcommand)]
        action: TargetsCommands,
    },

    /// Compare builds with the local git checkout
    Git {
        #[command(subcommand)]
        action: GitCommands,
    },

    /// Inspect the resolved configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum BuildsCommands {
    /// List builds, newest first
    List {
        /// Build target id, or _all
        #[arg(long, short = 't', default_value = "_all")]
        target_id: String,

        /// Only builds with this status (e.g. success, failure, started)
        #[arg(long)]
        filter_status: Option<String>,

        /// Only builds for this platform (canonical name or osx, win, win64, linux)
        #[arg(long)]
        filter_platform: Option<String>,

        /// Maximum number of builds to show (0 shows all)
        #[arg(long, short = 'l', default_value_t = 0)]
        limit: usize,
    },

    /// Show one build
    Status {
        #[arg(long, short = 't')]
        target_id: String,

        #[arg(long, short = 'b')]
        build: u64,
    },

    /// Latest build of every target
    Latest {
        /// Only successful builds
        #[arg(long)]
        success: bool,

        /// Skip disabled targets
        #[arg(long)]
        only_enabled: bool,
    },

    /// Cancel one build, or every build
    Cancel {
        #[arg(long, short = 't')]
        target_id: Option<String>,

        #[arg(long, short = 'b')]
        build: Option<u64>,

        /// Cancel all builds (of --target-id when given)
        #[arg(long)]
        all: bool,
    },

    /// Start a new build
    Start {
        #[arg(long, short = 't')]
        target_id: Option<String>,

        /// Start builds on every target
        #[arg(long)]
        all: bool,

        /// Force a clean build
        #[arg(long)]
        clean: bool,
    },

    /// Download the primary artifact of a successful build
    Download {
        #[arg(long, short = 't')]
        target_id: String,

        #[arg(long, short = 'b', conflicts_with = "latest")]
        build: Option<u64>,

        /// Latest successful build of the target
        #[arg(long)]
        latest: bool,

        /// Output directory
        #[arg(long, short = 'o', default_value = ".")]
        output: PathBuf,

        /// Unpack the archive into the output directory (zip or tar builds only)
        #[arg(long)]
        unzip: bool,
    },

    /// Wait until builds finish; fails if any did not succeed
    WaitForComplete {
        #[arg(long, short = 't')]
        target_id: Option<String>,

        #[arg(long, short = 'b')]
        build: Option<u64>,

        /// Every active latest build of enabled targets
        #[arg(long)]
        all: bool,

        /// Stop at the first failed build
        #[arg(long)]
        abort_on_fail: bool,
    },
}

#[derive(Subcommand)]
enum TargetsCommands {
    /// List build targets
    List,
}

#[derive(Subcommand)]
enum GitCommands {
    /// Show revision and message of HEAD
    Head {
        /// Repository to inspect (default: current directory)
        #[arg(long, short = 'p')]
        repo_path: Option<PathBuf>,
    },

    /// Check whether builds were made from HEAD
    BuildMatchesHead {
        #[arg(long, short = 't')]
        target_id: Option<String>,

        #[arg(long, short = 'b')]
        build: Option<u64>,

        /// Latest successful build of every enabled target
        #[arg(long)]
        all: bool,

        #[arg(long, short = 'p')]
        repo_path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print effective configuration with sources (API key redacted)
    Show,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(#[from] Error),

    #[error("cannot write output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => ErrorKind::Validation as i32,
            CliError::Core(e) => e.exit_code(),
            CliError::Output(_) => ErrorKind::Io as i32,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            CliError::Config(_) => "config",
            CliError::Core(e) => e.kind().as_str(),
            CliError::Output(_) => ErrorKind::Io.as_str(),
        }
    }
}

impl From<ValidationError> for CliError {
    fn from(err: ValidationError) -> Self {
        CliError::Core(err.into())
    }
}

impl From<ucb_tool::host::TransportError> for CliError {
    fn from(err: ucb_tool::host::TransportError) -> Self {
        CliError::Core(err.into())
    }
}

impl From<revision::GitError> for CliError {
    fn from(err: revision::GitError) -> Self {
        CliError::Core(err.into())
    }
}

type CliResult = Result<i32, CliError>;

struct Session {
    json: bool,
    overrides: ContextOverrides,
}

impl Session {
    fn context(&self) -> Result<CloudBuildContext, CliError> {
        Ok(CloudBuildContext::resolve(self.overrides.clone())?)
    }

    fn connect(&self) -> Result<(CloudBuildContext, CloudBuildClient), CliError> {
        let context = self.context()?;
        let transport = HttpTransport::new(context.transport_config())?;
        Ok((context, CloudBuildClient::new(Arc::new(transport))))
    }

    /// Print `value` as JSON, or `human` otherwise
    fn emit<T: Serialize + ?Sized>(&self, value: &T, human: impl FnOnce() -> String) -> Result<(), CliError> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            print!("{}", human());
        }
        Ok(())
    }
}

fn main() {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.json, telemetry::level_for(cli.verbose));

    let session = Session {
        json: cli.json,
        overrides: ContextOverrides {
            api_key: cli.api_key,
            org_id: cli.org_id,
            project_id: cli.project_id,
            config_path: cli.config,
            ..Default::default()
        },
    };

    let result = match cli.command {
        Commands::Builds { action } => run_builds(&session, action),
        Commands::Targets {
            action: TargetsCommands::List,
        } => run_targets_list(&session),
        Commands::Git { action } => match action {
            GitCommands::Head { repo_path } => run_git_head(&session, repo_path),
            GitCommands::BuildMatchesHead {
                target_id,
                build,
                all,
                repo_path,
            } => run_build_matches_head(&session, target_id, build, all, repo_path),
        },
        Commands::Config {
            action: ConfigCommands::Show,
        } => run_config_show(&session),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            if session.json {
                let body = serde_json::json!({
                    "error": e.to_string(),
                    "kind": e.kind(),
                    "exit_code": e.exit_code(),
                });
                eprintln!("{}", body);
            } else {
                eprintln!("Error: {}", e);
            }
            process::exit(e.exit_code());
        }
    }
}

fn run_builds(session: &Session, action: BuildsCommands) -> CliResult {
    match action {
        BuildsCommands::List {
            target_id,
            filter_status,
            filter_platform,
            limit,
        } => {
            let (_, client) = session.connect()?;
            let filter = BuildFilter {
                status: filter_status.as_deref().map(BuildStatus::from),
                platform: filter_platform,
                limit,
            };
            let builds = client.list_builds(&target_id, &filter)?;
            session.emit(&builds, || {
                builds.iter().map(output::render_build).collect::<Vec<_>>().join("\n")
            })?;
            Ok(0)
        }

        BuildsCommands::Status { target_id, build } => {
            let (_, client) = session.connect()?;
            let build = client.build_status(&target_id, build)?;
            session.emit(&build, || output::render_build(&build))?;
            Ok(0)
        }

        BuildsCommands::Latest { success, only_enabled } => {
            let (_, client) = session.connect()?;
            let latest = client.latest_builds(success, only_enabled)?;
            session.emit(&latest, || output::render_latest(&latest))?;
            Ok(0)
        }

        BuildsCommands::Cancel { target_id, build, all } => run_cancel(session, target_id, build, all),

        BuildsCommands::Start { target_id, all, clean } => {
            let (_, client) = session.connect()?;
            if all {
                let attempts = client.start_all_builds(clean)?;
                session.emit(&attempts, || {
                    attempts.iter().map(output::render_attempt).collect::<Vec<_>>().join("\n")
                })?;
                let rejected = attempts.iter().any(|a| a.is_error());
                return Ok(if rejected { ErrorKind::Server as i32 } else { 0 });
            }

            let target_id = target_id.ok_or(ValidationError::MissingArgument("target-id"))?;
            let attempt = client.start_build(&target_id, clean)?;
            session.emit(&attempt, || output::render_attempt(&attempt))?;
            Ok(0)
        }

        BuildsCommands::Download {
            target_id,
            build,
            latest,
            output: destination,
            unzip,
        } => {
            let selector = match (latest, build) {
                (true, _) => BuildSelector::LatestSuccessful(target_id),
                (false, Some(number)) => BuildSelector::Explicit { target_id, number },
                (false, None) => return Err(ValidationError::MissingArgument("build or --latest").into()),
            };

            let (context, client) = session.connect()?;
            let source = HttpArtifactSource::new(context.connect_timeout)?;
            let retriever = ArtifactRetriever::new(client, Arc::new(source));

            let outcome = retriever.download(&DownloadRequest {
                selector,
                destination,
                unpack: unzip,
            })?;
            session.emit(&outcome, || {
                let mut text = format!(
                    "Downloaded build {} to: {} ({} bytes)\n",
                    outcome.build.key(),
                    outcome.path.display(),
                    outcome.bytes
                );
                if unzip {
                    text.push_str(&format!("Unpacked {} entries\n", outcome.extracted.len()));
                }
                text
            })?;
            Ok(0)
        }

        BuildsCommands::WaitForComplete {
            target_id,
            build,
            all,
            abort_on_fail,
        } => {
            let selector = match (all, target_id, build) {
                (true, _, _) => WatchSelector::AllActive,
                (false, Some(target_id), Some(number)) => WatchSelector::Build { target_id, number },
                (false, Some(target_id), None) => WatchSelector::LatestForTarget(target_id),
                (false, None, _) => return Err(ValidationError::MissingArgument("target-id").into()),
            };

            let (context, client) = session.connect()?;
            let monitor = CompletionMonitor::new(client, context.monitor_config(abort_on_fail));

            if session.json {
                let report = monitor.run(&selector, &mut SilentObserver)?;
                session.emit(&report, String::new)?;
            } else {
                let mut observer = HumanObserver::new(io::stdout());
                monitor.run(&selector, &mut observer)?;
                println!("Build(s) complete.");
            }
            Ok(0)
        }
    }
}

fn run_cancel(session: &Session, target_id: Option<String>, build: Option<u64>, all: bool) -> CliResult {
    let (_, client) = session.connect()?;

    if all {
        let cancelled = client.cancel_all_builds(target_id.as_deref())?;
        session.emit(&cancelled, || {
            cancelled
                .iter()
                .map(|t| format!("Cancelled builds for target: {}\n", t))
                .collect()
        })?;
        return Ok(0);
    }

    let target_id = target_id.ok_or(ValidationError::MissingArgument("target-id"))?;
    let number = build.ok_or(ValidationError::MissingArgument("build"))?;

    match client.cancel_build(&target_id, number) {
        Ok(()) => {
            session.emit(&serde_json::json!({"target_id": target_id, "build": number, "cancelled": true}), || {
                format!("Cancelled build {} #{}\n", target_id, number)
            })?;
            Ok(0)
        }
        Err(Error::NotFound { .. }) if !session.json => {
            eprintln!("Cannot find {} build #{}", target_id, number);
            Ok(ErrorKind::NotFound as i32)
        }
        Err(e) => Err(e.into()),
    }
}

fn run_targets_list(session: &Session) -> CliResult {
    let (_, client) = session.connect()?;
    let targets = client.list_targets()?;
    session.emit(&targets, || {
        targets.iter().map(output::render_target).collect::<Vec<_>>().join("\n")
    })?;
    Ok(0)
}

fn run_git_head(session: &Session, repo_path: Option<PathBuf>) -> CliResult {
    let repo_path = repo_path.unwrap_or_else(|| PathBuf::from("."));
    let head = revision::head(&repo_path)?;
    session.emit(&head, || output::render_head(&head))?;
    Ok(0)
}

fn run_build_matches_head(
    session: &Session,
    target_id: Option<String>,
    build: Option<u64>,
    all: bool,
    repo_path: Option<PathBuf>,
) -> CliResult {
    let scope = match (all, target_id, build) {
        (true, _, _) => MatchScope::All,
        (false, Some(target_id), Some(number)) => MatchScope::Build { target_id, number },
        (false, Some(target_id), None) => MatchScope::LatestForTarget(target_id),
        (false, None, _) => return Err(ValidationError::MissingArgument("target-id").into()),
    };

    let repo_path = repo_path.unwrap_or_else(|| PathBuf::from("."));
    let head = revision::head(&repo_path)?;

    let (_, client) = session.connect()?;
    let report = RevisionMatcher::new(client).check(&head.revision, &scope)?;

    let all_match = report.all_match();
    session.emit(&report, || {
        let mut text = output::render_match_report(&report);
        if !all_match {
            text.push_str("Build(s) do not match.\n");
        }
        text
    })?;

    Ok(if all_match { 0 } else { EXIT_REVISION_MISMATCH })
}

fn run_config_show(session: &Session) -> CliResult {
    let context = session.context()?;
    let value = context.to_redacted_value();
    session.emit(&value, || {
        let mut text = String::new();
        if let Some(map) = value.as_object() {
            for (key, v) in map.iter().filter(|(k, _)| k.as_str() != "sources") {
                text.push_str(&format!("{}: {}\n", key, v));
            }
        }
        text.push_str("sources:\n");
        for source in &context.sources {
            text.push_str(&format!(
                "  {:?} {} {}\n",
                source.origin,
                source.path.as_deref().unwrap_or("-"),
                source.digest.as_deref().unwrap_or("")
            ));
        }
        text
    })?;
    Ok(0)
}
