use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use shoal::areas::config::DEFAULT_REMOTE;
use shoal::areas::repository::Repository;
use shoal::artifacts::branch::branch_name::BranchName;
use shoal::artifacts::objects::commit::Author;
use shoal::artifacts::transfer::negotiator::PushOptions;
use shoal::commands::porcelain::commit::CommitMetadata;
use shoal::commands::porcelain::log::LogOptions;
use shoal::commands::porcelain::push::Refspec;
use shoal::errors::ShoalError;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "shoal",
    version = "0.1.0",
    author = "Sami Barbut-Dica",
    about = "A content-addressed commit store with shallow history",
    long_about = "shoal keeps git-style loose objects and refs, clones and fetches \
    to a chosen depth, and pushes from shallow clones without ever looking past \
    the shallow boundary.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
"
)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins when set
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "init",
        about = "Initialize a new repository",
        long_about = "This command initializes a new repository in the current directory or at the specified path."
    )]
    Init {
        #[arg(index = 1, help = "The path to the repository")]
        path: Option<PathBuf>,
    },
    #[command(
        name = "clone",
        about = "Clone a single branch of a repository",
        long_about = "This command clones one branch of the repository at <url> into <path>. \
        With --depth only the newest commits are copied and the oldest copied commits become shallow roots."
    )]
    Clone {
        #[arg(long, help = "Copy only this many commits (0 copies everything)")]
        depth: Option<u32>,
        #[arg(short, long, help = "The branch to clone instead of the remote's HEAD")]
        branch: Option<String>,
        #[arg(index = 1)]
        url: String,
        #[arg(index = 2, help = "Defaults to the last component of <url>")]
        path: Option<PathBuf>,
    },
    #[command(
        name = "commit",
        about = "Commit files on the current branch",
        long_about = "This command stores the listed files on top of the current branch's tree \
        and advances the branch to the new commit."
    )]
    Commit {
        #[arg(short, long, help = "The commit message")]
        message: String,
        #[arg(long, env = "GIT_AUTHOR_NAME", hide_env_values = true)]
        author_name: String,
        #[arg(long, env = "GIT_AUTHOR_EMAIL", hide_env_values = true)]
        author_email: String,
        #[arg(long, env = "GIT_AUTHOR_DATE", help = "RFC 2822 or %Y-%m-%d %H:%M:%S %z")]
        author_date: Option<String>,
        #[arg(index = 1, num_args = 0..)]
        files: Vec<PathBuf>,
    },
    #[command(
        name = "push",
        about = "Publish a local branch to a remote",
        long_about = "This command sends the commits the remote is missing and moves the remote branch. \
        It is refused when the remote moved since the last fetch or when the histories diverged, unless forced."
    )]
    Push {
        #[arg(short, long, help = "Overwrite the remote branch even if history diverged")]
        force: bool,
        #[arg(long, default_value = DEFAULT_REMOTE)]
        remote: String,
        #[arg(index = 1, help = "<src>:<dst>, defaults to the current branch")]
        refspec: Option<String>,
    },
    #[command(
        name = "fetch",
        about = "Update a remote-tracking branch",
        long_about = "This command brings refs/remotes/<remote>/<branch> up to date. \
        --depth deepens (or completes, with 0) a shallow history."
    )]
    Fetch {
        #[arg(long, help = "Keep this many commits (0 fetches the complete history)")]
        depth: Option<u32>,
        #[arg(long, default_value = DEFAULT_REMOTE)]
        remote: String,
        #[arg(index = 1, help = "Defaults to the current branch")]
        branch: Option<String>,
    },
    #[command(name = "log", about = "Show commit history")]
    Log {
        #[arg(long, help = "One line per commit")]
        oneline: bool,
        #[arg(short = 'n', long = "max-count")]
        max_count: Option<usize>,
        #[arg(index = 1, help = "Revision to start from, defaults to HEAD")]
        revision: Option<String>,
    },
    #[command(name = "merge-base", about = "Print the best common ancestor of two commits")]
    MergeBase {
        #[arg(index = 1)]
        a: String,
        #[arg(index = 2)]
        b: String,
    },
    #[command(
        name = "cat-file",
        about = "Print the content of an object",
        long_about = "This command prints the content of an object in the repository. \
        It requires the SHA of the object to be specified."
    )]
    CatFile {
        #[arg(short = 'p', long, help = "The object SHA to print")]
        sha: String,
    },
    #[command(
        name = "hash-object",
        about = "Hash an object and optionally write it to the object database",
        long_about = "This command hashes an object file and can write it to the object database. \
        It requires the path to the file to be specified."
    )]
    HashObject {
        #[arg(short, long, required = false, help = "Write the object to the object database")]
        write: bool,
        #[arg(index = 1)]
        file: PathBuf,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_current() -> anyhow::Result<Repository> {
    let pwd = std::env::current_dir()?;
    Ok(Repository::open(&pwd, Box::new(std::io::stdout()))?)
}

fn clone_target(url: &str, path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = path {
        return Ok(path);
    }

    let stripped = url.strip_prefix("file://").unwrap_or(url);
    Path::new(stripped.trim_end_matches('/'))
        .file_name()
        .map(PathBuf::from)
        .with_context(|| format!("cannot derive a directory name from {url}, pass <path>"))
}

/// Local paths are recorded absolute so the remote resolves from any directory
fn absolute_url(url: String) -> String {
    if url.contains("://") {
        return url;
    }

    match Path::new(&url).canonicalize() {
        Ok(path) => path.display().to_string(),
        Err(_) => url,
    }
}

/// Run a blocking transfer on the blocking pool, cancelling it on Ctrl-C
async fn run_cancellable<T, F>(task: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(CancellationToken) -> Result<T, ShoalError> + Send + 'static,
{
    let cancellation = CancellationToken::new();
    let watcher = {
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling");
                cancellation.cancel();
            }
        })
    };

    let result = tokio::task::spawn_blocking(move || task(cancellation)).await;
    watcher.abort();

    match result.context("transfer task panicked")? {
        Ok(value) => Ok(value),
        Err(error) => {
            if error.needs_more_history() {
                eprintln!("hint: deepen the history with `shoal fetch --depth <n>` and retry");
            } else if error.is_retryable() {
                eprintln!("hint: the remote moved, run `shoal fetch` and retry");
            }
            Err(error.into())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init { path } => {
            let path = match path {
                Some(path) => path,
                None => std::env::current_dir()?,
            };
            let mut repository = Repository::new(&path, Box::new(std::io::stdout()))?;

            repository.init()?
        }
        Commands::Clone {
            depth,
            branch,
            url,
            path,
        } => {
            let path = clone_target(&url, path)?;
            let url = absolute_url(url);
            if path.join(shoal::areas::repository::GIT_DIR).exists() {
                anyhow::bail!("destination {} is already a repository", path.display());
            }
            let branch = branch.map(BranchName::try_parse).transpose()?;

            let mut repository = Repository::new(&path, Box::new(std::io::stdout()))?;
            repository.clone_repository(&url, branch.as_ref(), depth)?;
        }
        Commands::Commit {
            message,
            author_name,
            author_email,
            author_date,
            files,
        } => {
            let mut repository = open_current()?;
            let author = Author::with_date(author_name, author_email, author_date.as_deref());

            repository.commit_files(&files, CommitMetadata::new(author, message))?;
        }
        Commands::Push {
            force,
            remote,
            refspec,
        } => {
            let mut repository = open_current()?;
            let refspec = match refspec {
                Some(refspec) => Refspec::try_parse(&refspec)?,
                None => Refspec::current(&repository)?,
            };
            let options = PushOptions {
                force,
                ..PushOptions::default()
            };

            run_cancellable(move |cancellation| {
                repository.push(&remote, &refspec, options, cancellation)
            })
            .await?;
        }
        Commands::Fetch {
            depth,
            remote,
            branch,
        } => {
            let mut repository = open_current()?;
            let branch = match branch {
                Some(branch) => BranchName::try_parse(branch)?,
                None => repository
                    .refs()
                    .current_ref()?
                    .branch_name()
                    .context("HEAD is not on a branch, name the branch to fetch")?,
            };

            run_cancellable(move |_| repository.fetch(&remote, &branch, depth)).await?;
        }
        Commands::Log {
            oneline,
            max_count,
            revision,
        } => {
            let repository = open_current()?;
            repository.log(&LogOptions {
                oneline,
                max_count,
                start: revision,
            })?
        }
        Commands::MergeBase { a, b } => {
            let repository = open_current()?;
            if repository.merge_base(&a, &b)?.is_none() {
                std::process::exit(1);
            }
        }
        Commands::CatFile { sha } => {
            let repository = open_current()?;
            repository.cat_file(&sha)?
        }
        Commands::HashObject { write, file } => {
            let pwd = std::env::current_dir()?;
            let repository = Repository::new(&pwd, Box::new(std::io::stdout()))?;

            repository.hash_object(&file, write)?
        }
    }

    Ok(())
}
