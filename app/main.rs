use std::{env::current_dir, path::PathBuf, process::exit};

use clap::{Parser, Subcommand};
use lib::{ObjectId, Repository};

/// Name of the repository metadata directory, decided here and
/// threaded through every operation.
const REPO_DIR: &str = ".revlet";

#[derive(Parser, Debug)]
#[command(name = "revlet", about = "a minimal content-addressed version control tool")]
struct Arguments {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[clap(about = "initialize a repository in the current directory")]
    Init,
    #[clap(about = "stage a file for the next commit")]
    Add { path: PathBuf },
    #[clap(about = "snapshot the staged changes as a new commit")]
    Commit {
        #[arg(short, long, help = "message to record with this commit")]
        message: String,
    },
    #[clap(about = "hard-reset the working directory to a commit")]
    Checkout { hash: String },
    #[clap(about = "show the commit history, most recent first")]
    Log,
    #[clap(about = "show the current head and the staged entries")]
    PrintInfo,
}

fn main() {
    env_logger::init();
    let args = Arguments::parse();
    if let Err(err) = run(args.cmd) {
        eprintln!("error: {err}");
        exit(1);
    }
}

fn run(cmd: Command) -> Result<(), Box<dyn std::error::Error>> {
    let worktree = current_dir()?;
    match cmd {
        Command::Init => {
            let (_, created) = Repository::init(worktree, REPO_DIR)?;
            if created {
                println!("initialized empty repository in {REPO_DIR}");
            } else {
                println!("repository {REPO_DIR} is already initialized");
            }
        }
        Command::Add { path } => {
            let repo = Repository::open(worktree, REPO_DIR)?;
            let id = repo.add(&path)?;
            println!("added {} ({})", path.display(), id);
        }
        Command::Commit { message } => {
            let repo = Repository::open(worktree, REPO_DIR)?;
            match repo.commit(&message)? {
                Some(id) => println!("[{id}] {message}"),
                None => println!("nothing to commit"),
            }
        }
        Command::Checkout { hash } => {
            let repo = Repository::open(worktree, REPO_DIR)?;
            let id = ObjectId::from_hex(&hash).ok_or(lib::Error::BadObjectId(hash))?;
            repo.checkout(id)?;
            println!("head is now {id}");
        }
        Command::Log => {
            let repo = Repository::open(worktree, REPO_DIR)?;
            let (entries, skipped) = repo.history()?;
            for entry in entries {
                println!("commit {}", entry.commit);
                println!("date   {}", entry.date.to_rfc3339());
                println!();
                println!("    {}", entry.message);
                println!();
            }
            if skipped > 0 {
                eprintln!("warning: skipped {skipped} malformed log line(s)");
            }
        }
        Command::PrintInfo => {
            let repo = Repository::open(worktree, REPO_DIR)?;
            match repo.head()? {
                Some(id) => println!("head: {id}"),
                None => println!("head: (none)"),
            }
            let staged = repo.staged()?;
            if staged.is_empty() {
                println!("nothing staged");
            } else {
                for (path, id) in staged {
                    println!("staged: {path} {id}");
                }
            }
        }
    }
    Ok(())
}
