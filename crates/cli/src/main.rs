use attic_core::{extensions_from_env_value, hash_password, store_limits_from_env_values};
use attic_files::{FileStore, StoreLimits, TypeValidator};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufRead;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "attic")]
#[command(about = "Attic personal file locker CLI")]
struct Cli {
    /// Per-file size cap in bytes (default: 2 GiB)
    #[arg(long, global = true, env = "ATTIC_MAX_FILE_BYTES")]
    max_file_bytes: Option<String>,
    /// Total store size cap in bytes (default: none)
    #[arg(long, global = true, env = "ATTIC_MAX_STORE_BYTES")]
    max_store_bytes: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an Argon2 hash for ATTIC_PASSWORD_HASH
    HashPassword {
        /// Password to hash (read from stdin when omitted)
        password: Option<String>,
    },
    /// List stored files
    List {
        /// Store directory
        #[arg(long, env = "ATTIC_STORE_DIR", default_value = "uploads")]
        store: PathBuf,
    },
    /// Check whether a local file would pass the type gates
    Check {
        /// File to inspect
        file: PathBuf,
    },
    /// Store a local file, exactly as an upload would be
    Add {
        /// File to store
        file: PathBuf,
        /// Store directory
        #[arg(long, env = "ATTIC_STORE_DIR", default_value = "uploads")]
        store: PathBuf,
    },
    /// Remove a stored file (succeeds if it is already gone)
    Remove {
        /// Storage name as shown by `list`
        name: String,
        /// Store directory
        #[arg(long, env = "ATTIC_STORE_DIR", default_value = "uploads")]
        store: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    run(Cli::parse())
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let limits = store_limits_from_env_values(cli.max_file_bytes, cli.max_store_bytes)?;

    match cli.command {
        Commands::HashPassword { password } => {
            let password = match password {
                Some(password) => password,
                None => read_password_line()?,
            };
            if password.is_empty() {
                return Err("password cannot be empty".into());
            }
            println!("{}", hash_password(&password)?);
        }
        Commands::List { store } => {
            let store = open_store(&store, limits)?;
            let files = store.list()?;
            if files.is_empty() {
                println!("No files stored.");
            } else {
                for file in files {
                    println!(
                        "{}  {} bytes  {}",
                        file.name,
                        file.size_bytes,
                        file.modified_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                }
            }
        }
        Commands::Check { file } => {
            let name = file_name(&file)?;
            let mut content = File::open(&file)?;
            let verdict = type_validator().inspect(&name, &mut content)?;

            println!("Extension: {}", verdict.extension.as_deref().unwrap_or("-"));
            println!("Detected:  {}", verdict.media_type);
            println!("Rule:      {}", verdict.rule.unwrap_or("-"));
            println!(
                "Verdict:   {}",
                if verdict.accepted { "accepted" } else { "rejected" }
            );
        }
        Commands::Add { file, store } => {
            let store = open_store(&store, limits)?;
            let name = file_name(&file)?;
            let mut content = File::open(&file)?;

            let mut candidate = store.begin_upload(&name)?;
            candidate.copy_from(&mut content)?;
            let saved = store.save(candidate)?;

            println!(
                "Stored {} as {} ({} bytes, {}, sha256 {})",
                saved.declared_name,
                saved.stored.name,
                saved.stored.size_bytes,
                saved.media_type,
                saved.sha256
            );
        }
        Commands::Remove { name, store } => {
            let store = open_store(&store, limits)?;
            if store.delete(&name)? {
                println!("Removed {}", name);
            } else {
                println!("Nothing to remove for {}", name);
            }
        }
    }

    Ok(())
}

fn type_validator() -> TypeValidator {
    let extensions = extensions_from_env_value(std::env::var("ATTIC_ALLOWED_EXTENSIONS").ok());
    if extensions.is_empty() {
        TypeValidator::default()
    } else {
        TypeValidator::default().restricted_to(&extensions)
    }
}

fn open_store(root: &Path, limits: StoreLimits) -> Result<FileStore, Box<dyn std::error::Error>> {
    Ok(FileStore::new(root, type_validator(), limits)?)
}

fn file_name(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .ok_or_else(|| format!("{} has no usable file name", path.display()).into())
}

fn read_password_line() -> Result<String, Box<dyn std::error::Error>> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn add(file: &Path, store: &Path, extra: &[&str]) -> Result<(), Box<dyn std::error::Error>> {
        let mut args = vec![
            "attic".to_string(),
            "add".to_string(),
            file.display().to_string(),
            "--store".to_string(),
            store.display().to_string(),
        ];
        args.extend(extra.iter().map(|a| a.to_string()));
        run(Cli::try_parse_from(args)?)
    }

    fn stored(store: &Path) -> Vec<String> {
        std::fs::read_dir(store)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_add_honours_file_size_cap() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("notes.txt");
        std::fs::write(&file, b"more than eight bytes\n").unwrap();
        let store = temp.path().join("uploads");

        assert!(add(&file, &store, &["--max-file-bytes", "8"]).is_err());
        assert!(stored(&store).is_empty());

        add(&file, &store, &["--max-file-bytes", "1024"]).unwrap();
        assert_eq!(stored(&store), vec!["notes.txt"]);
    }

    #[test]
    fn test_add_honours_store_size_cap() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("notes.txt");
        std::fs::write(&file, b"twelve bytes").unwrap();
        let store = temp.path().join("uploads");

        add(&file, &store, &["--max-store-bytes", "20"]).unwrap();
        assert!(add(&file, &store, &["--max-store-bytes", "20"]).is_err());
        assert_eq!(stored(&store).len(), 1);
    }

    #[test]
    fn test_invalid_limit_is_an_error() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("notes.txt");
        std::fs::write(&file, b"hi\n").unwrap();

        assert!(add(&file, &temp.path().join("uploads"), &["--max-file-bytes", "2GB"]).is_err());
    }
}
