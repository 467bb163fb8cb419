//! `git-remote-ark`: invoked by git as `ark://...` for the stdin/stdout
//! helper protocol (spec.md §6), or directly by an operator for key
//! management. The two modes are disambiguated the same way the original
//! tool does it: a leading `-`-prefixed argument selects maintenance mode,
//! anything else is `<remote-name> <url>` from git itself.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;

use ark_core::{fetch, sync, RemoteUrl, Reporter};
use ark_lock::LeaseStore;
use ark_store::BlobStore;
use ark_vcs::GitRepo;

struct CliReporter;

impl Reporter for CliReporter {
    fn info(&mut self, msg: &str) {
        eprintln!("[info] {msg}");
    }

    fn warn(&mut self, msg: &str) {
        eprintln!("[warn] {msg}");
    }

    fn error(&mut self, msg: &str) {
        eprintln!("[error] {msg}");
    }
}

/// `git-remote-ark --keygen <publickey-file> <secretkey-file>`.
#[derive(Parser, Debug)]
#[command(name = "git-remote-ark --keygen")]
struct KeygenArgs {
    publickey_file: PathBuf,
    secretkey_file: PathBuf,
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let result = match args.get(1).map(String::as_str) {
        Some("--keygen" | "-k") => run_keygen(&args[2..]),
        Some("--encrypt" | "-e") => run_encrypt(),
        Some("--decrypt" | "-d") => run_decrypt(),
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => run_git_helper(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[error] {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    eprintln!("usage:");
    eprintln!("  git-remote-ark <remote-name> <url>   (invoked by git)");
    eprintln!("  git-remote-ark --keygen <publickey-file> <secretkey-file>");
    eprintln!("  git-remote-ark --encrypt | -e          (stdin -> stdout)");
    eprintln!("  git-remote-ark --decrypt | -d          (stdin -> stdout)");
}

fn home_dir() -> Result<PathBuf> {
    std::env::var("HOME").map(PathBuf::from).context("HOME is not set")
}

fn run_keygen(rest: &[String]) -> Result<()> {
    let parsed = KeygenArgs::try_parse_from(
        std::iter::once("git-remote-ark --keygen".to_string()).chain(rest.iter().cloned()),
    )?;

    if parsed.publickey_file.exists() {
        bail!("refusing to overwrite existing file {}", parsed.publickey_file.display());
    }
    if parsed.secretkey_file.exists() {
        bail!("refusing to overwrite existing file {}", parsed.secretkey_file.display());
    }

    let (recipient, secret) = ark_crypto::keygen();
    std::fs::write(&parsed.publickey_file, recipient.to_string())
        .with_context(|| format!("writing {}", parsed.publickey_file.display()))?;
    write_private(&parsed.secretkey_file, secret.to_string().as_bytes())
        .with_context(|| format!("writing {}", parsed.secretkey_file.display()))?;

    println!("wrote {}", parsed.publickey_file.display());
    println!("wrote {}", parsed.secretkey_file.display());
    Ok(())
}

#[cfg(unix)]
fn write_private(path: &std::path::Path, data: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, data)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn write_private(path: &std::path::Path, data: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, data)
}

fn run_encrypt() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let recipients = ark_config::load_publickeys(&cwd).context("loading .publickeys")?;
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    ark_crypto::encrypt_to_recipients(&recipients, stdin.lock(), stdout.lock())
        .context("encrypting stdin")?;
    Ok(())
}

fn run_decrypt() -> Result<()> {
    let home = home_dir()?;
    let secret = ark_config::resolve_secret_key(&home).context("resolving secret key")?;
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    ark_crypto::decrypt_with_secret(&secret, stdin.lock(), stdout.lock())
        .context("decrypting stdin")?;
    Ok(())
}

/// The directory local (non-cloud) backends use when no `s3`/`dynamodb`
/// feature is compiled in — useful for `file://`-style local testing.
fn local_backend_root() -> Result<PathBuf> {
    Ok(home_dir()?.join(".ark").join("local-backend"))
}

#[cfg(feature = "s3")]
fn open_store(url: &RemoteUrl, ensure: bool) -> Result<Box<dyn BlobStore>> {
    Ok(Box::new(ark_store::s3::S3BlobStore::new(url.bucket.as_str(), ensure)?))
}

#[cfg(not(feature = "s3"))]
fn open_store(url: &RemoteUrl, ensure: bool) -> Result<Box<dyn BlobStore>> {
    let dir = local_backend_root()?.join("store").join(&url.bucket);
    if !dir.exists() {
        if !ensure {
            bail!("bucket `{}` does not exist (set ensure=y to create it)", url.bucket);
        }
        std::fs::create_dir_all(&dir)?;
    }
    Ok(Box::new(ark_store::FileBlobStore::new(dir)))
}

#[cfg(feature = "dynamodb")]
fn open_lock(url: &RemoteUrl, ensure: bool) -> Result<Box<dyn LeaseStore>> {
    Ok(Box::new(ark_lock::dynamodb::DynamoLeaseStore::new(url.table.as_str(), ensure)?))
}

#[cfg(not(feature = "dynamodb"))]
fn open_lock(url: &RemoteUrl, ensure: bool) -> Result<Box<dyn LeaseStore>> {
    let dir = local_backend_root()?.join("lock").join(&url.table);
    if !dir.exists() {
        if !ensure {
            bail!("table `{}` does not exist (set ensure=y to create it)", url.table);
        }
        std::fs::create_dir_all(&dir)?;
    }
    Ok(Box::new(ark_lock::FileLeaseStore::new(dir)))
}

fn run_git_helper(args: &[String]) -> Result<()> {
    let remote_url_raw = args.get(2).context("usage: git-remote-ark <remote-name> <url>")?;

    let git_dir = ark_config::git_dir().context("bootstrapping from GIT_DIR")?;
    let worktree_root =
        git_dir.parent().context("GIT_DIR has no parent directory")?.to_path_buf();
    std::env::set_current_dir(&worktree_root)
        .with_context(|| format!("chdir to {}", worktree_root.display()))?;

    let url = RemoteUrl::parse(remote_url_raw).context("parsing remote url")?;
    let ensure = ark_config::wants_ensure();

    let blob_store = open_store(&url, ensure)?;
    let lease_store = open_lock(&url, ensure)?;
    let repo = GitRepo::open(worktree_root.as_path());
    let home = home_dir()?;

    let mut reporter = CliReporter;
    let stdout = std::io::stdout();
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();

    loop {
        line.clear();
        let read = input.read_line(&mut line).context("reading helper command")?;
        if read == 0 {
            // Git ends a helper conversation with a blank line, never by
            // closing stdin outright — an EOF here means the parent
            // process went away mid-conversation, which the original
            // treats as fatal rather than a clean shutdown.
            bail!("unexpected EOF reading helper command");
        }
        let cmd = line.trim_end_matches(['\n', '\r']);

        if cmd.is_empty() {
            break;
        } else if cmd == "capabilities" {
            let mut out = stdout.lock();
            writeln!(out, "push")?;
            writeln!(out, "fetch")?;
            writeln!(out)?;
            out.flush()?;
        } else if cmd == "list" || cmd == "list for-push" {
            let lines = fetch::list(&repo, lease_store.as_ref(), blob_store.as_ref(), &url, "master")?;
            let mut out = stdout.lock();
            for l in &lines {
                writeln!(out, "{l}")?;
            }
            writeln!(out)?;
            out.flush()?;
        } else if let Some(refs) = cmd.strip_prefix("push ") {
            let (src, dst) = refs.split_once(':').context("malformed push command")?;
            let recipients =
                ark_config::load_publickeys(&worktree_root).context("loading .publickeys")?;
            sync::push(&repo, lease_store.as_ref(), blob_store.as_ref(), &url, &recipients, src, dst, &mut reporter)?;
            let mut out = stdout.lock();
            writeln!(out, "ok {src}")?;
            writeln!(out)?;
            out.flush()?;
        } else if let Some(rest) = cmd.strip_prefix("fetch ") {
            let reference = rest.split_whitespace().nth(1).unwrap_or(rest);
            let branch = reference.rsplit('/').next().unwrap_or(reference);
            let secret = ark_config::resolve_secret_key(&home).context("resolving secret key")?;
            fetch::fetch(&repo, lease_store.as_ref(), blob_store.as_ref(), &secret, &url, branch, &mut reporter)?;
            let mut out = stdout.lock();
            writeln!(out)?;
            out.flush()?;
        } else {
            bail!("unrecognized helper command: {cmd}");
        }
    }

    Ok(())
}
