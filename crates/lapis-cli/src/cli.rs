use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lapis_model::CollectionKind;

#[derive(Parser)]
#[command(
    name = "lapis",
    about = "Lapis: typed digital objects and collections on a PID registry",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Directory holding the record store
    #[arg(long, global = true, default_value = ".lapis")]
    pub root: PathBuf,

    /// TOML configuration file (defaults to <root>/lapis.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Prefix for generated identifiers, overriding the configuration
    #[arg(long, global = true)]
    pub prefix: Option<String>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum KindArg {
    Plain,
    Set,
    Array,
    List,
}

impl From<KindArg> for CollectionKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Plain => CollectionKind::Plain,
            KindArg::Set => CollectionKind::Set,
            KindArg::Array => CollectionKind::Array,
            KindArg::List => CollectionKind::LinkedList,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an object or collection
    Create(CreateArgs),
    /// List every identifier in the store
    Ls,
    /// Show an object's record
    Show(ShowArgs),
    /// Delete an object's record
    Delete(DeleteArgs),
    /// Create an alias for an existing object
    Alias(AliasArgs),
    /// Delete an alias
    Unalias(UnaliasArgs),
    /// Manage named references
    Ref(RefArgs),
    /// Manage set members
    Set(SetArgs),
    /// Manage array elements
    Array(ArrayArgs),
    /// Manage linked list elements
    List(ListArgs),
    /// Show the collections an object belongs to
    Parents(ParentsArgs),
}

#[derive(Args)]
pub struct CreateArgs {
    /// Identifier to create; generated under the prefix when omitted
    pub id: Option<String>,
    #[arg(short, long, value_enum, default_value = "plain")]
    pub kind: KindArg,
    #[arg(long)]
    pub location: Option<String>,
    /// Resource type of a plain object
    #[arg(long = "type", conflicts_with = "kind")]
    pub resource_type: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    pub id: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub id: String,
}

#[derive(Args)]
pub struct AliasArgs {
    pub target: String,
    pub alias: String,
}

#[derive(Args)]
pub struct UnaliasArgs {
    pub alias: String,
}

#[derive(Args)]
pub struct RefArgs {
    #[command(subcommand)]
    pub action: RefAction,
}

#[derive(Subcommand)]
pub enum RefAction {
    Add { id: String, semantics: String, target: String },
    /// Remove one target, or every target of the key when none is given
    Remove { id: String, semantics: String, target: Option<String> },
    /// List targets of one key, or every key
    List { id: String, semantics: Option<String> },
}

#[derive(Args)]
pub struct SetArgs {
    #[command(subcommand)]
    pub action: SetAction,
}

#[derive(Subcommand)]
pub enum SetAction {
    Add { set: String, member: String },
    Remove { set: String, member: String },
    List { set: String },
}

#[derive(Args)]
pub struct ArrayArgs {
    #[command(subcommand)]
    pub action: ArrayAction,
}

#[derive(Subcommand)]
pub enum ArrayAction {
    Append { array: String, element: String },
    Insert { array: String, element: String, position: u32 },
    /// Remove by element, or by position with --at
    Remove {
        array: String,
        #[arg(required_unless_present = "at")]
        element: Option<String>,
        #[arg(long, conflicts_with = "element")]
        at: Option<u32>,
    },
    List { array: String },
}

#[derive(Args)]
pub struct ListArgs {
    #[command(subcommand)]
    pub action: ListAction,
}

#[derive(Subcommand)]
pub enum ListAction {
    Append { list: String, element: String },
    Insert { list: String, element: String, position: u32 },
    /// Remove by element, or by position with --at
    Remove {
        list: String,
        #[arg(required_unless_present = "at")]
        element: Option<String>,
        #[arg(long, conflicts_with = "element")]
        at: Option<u32>,
    },
    Show { list: String },
}

#[derive(Args)]
pub struct ParentsArgs {
    pub id: String,
}
