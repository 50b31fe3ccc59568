//! PersistBridge CLI
//!
//! Inspect and edit a bridge data directory from the shell. Keys and values
//! are given as JSON text, exactly as scripts see them after `json.decode`.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use persistbridge::codec;
use persistbridge::tree::FileTree;
use persistbridge::{Config, DiskTree, OpenMode, Result, StoreRegistry, VirtualFile};
use tracing_subscriber::{fmt, EnvFilter};

/// PersistBridge CLI
#[derive(Parser, Debug)]
#[command(name = "persistbridge-cli")]
#[command(about = "Inspect stores and virtual files of a persistbridge data directory")]
#[command(version)]
struct Args {
    /// Host directory backing the virtual tree
    #[arg(short, long, default_value = "./bridge_data")]
    root: String,

    /// Namespace root inside the virtual tree
    #[arg(short, long, default_value = "/Data")]
    namespace: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a value under a key
    Put {
        /// Store path, relative to the namespace root
        store: String,

        /// Key as JSON
        key: String,

        /// Value as JSON
        value: String,
    },

    /// Print the value stored under a key
    Get { store: String, key: String },

    /// Delete a key
    Del { store: String, key: String },

    /// Report whether a key is present
    Has { store: String, key: String },

    /// Print every entry in key order, optionally within [start, end)
    Scan {
        store: String,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,
    },

    /// Print a virtual file
    Cat { path: String },

    /// Write text to a virtual file, replacing it unless --append is given
    Write {
        path: String,

        text: String,

        #[arg(short, long)]
        append: bool,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,persistbridge=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!("PersistBridge CLI v{}", persistbridge::VERSION);

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let tree: Arc<dyn FileTree> = Arc::new(DiskTree::open(&args.root)?);
    let config = Config::builder().namespace_root(&args.namespace).build();
    tree.ensure_dir(&config.namespace_root)?;

    match args.command {
        Commands::Cat { path } => {
            let mut file = VirtualFile::open(tree, &config.namespace_root, &path, OpenMode::Read)?;
            let contents = file.read_all()?;
            file.close()?;
            print!("{}", String::from_utf8_lossy(&contents));
            Ok(())
        }
        Commands::Write { path, text, append } => {
            let mode = if append { OpenMode::Append } else { OpenMode::Write };
            let mut file = VirtualFile::open(tree, &config.namespace_root, &path, mode)?;
            file.write(text.as_bytes())?;
            file.close()?;
            Ok(())
        }
        command => store_command(StoreRegistry::new(tree, config), command),
    }
}

fn store_command(mut stores: StoreRegistry, command: Commands) -> Result<()> {
    match command {
        Commands::Put { store, key, value } => {
            let store = stores.open(&store)?;
            store.put(&codec::decode_str(&key)?, &codec::decode_str(&value)?)?;
        }
        Commands::Get { store, key } => {
            let store = stores.open(&store)?;
            let value = store.get(&codec::decode_str(&key)?)?;
            println!("{}", codec::encode_to_string(&value)?);
        }
        Commands::Del { store, key } => {
            let store = stores.open(&store)?;
            store.delete(&codec::decode_str(&key)?)?;
        }
        Commands::Has { store, key } => {
            let store = stores.open(&store)?;
            println!("{}", store.has(&codec::decode_str(&key)?)?);
        }
        Commands::Scan { store, start, end } => {
            let store = stores.open(&store)?;
            let start = start.as_deref().map(codec::decode_str).transpose()?;
            let end = end.as_deref().map(codec::decode_str).transpose()?;
            let mut iterator = store.new_iterator(start.as_ref(), end.as_ref())?;
            let mut more = iterator.first();
            while more {
                let key = codec::encode_to_string(&iterator.key()?)?;
                let value = codec::encode_to_string(&iterator.value()?)?;
                println!("{}\t{}", key, value);
                more = iterator.next();
            }
            iterator.release();
        }
        Commands::Cat { .. } | Commands::Write { .. } => {}
    }
    stores.close_all();
    Ok(())
}
