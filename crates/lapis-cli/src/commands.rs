use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use lapis_model::segment::Segment;
use lapis_model::{
    DigitalObject, DigitalObjectArray, DigitalObjectLinkedList, DigitalObjectSet, Entity,
    InfraConfig, Infrastructure,
};
use lapis_store::FileRecordStore;
use lapis_types::Pid;
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let (store, infra) = open(&cli)?;
    let json = matches!(cli.format, OutputFormat::Json);
    match cli.command {
        Command::Create(args) => cmd_create(&infra, args),
        Command::Ls => cmd_ls(&store, &infra),
        Command::Show(args) => cmd_show(&infra, args, json),
        Command::Delete(args) => cmd_delete(&infra, args),
        Command::Alias(args) => cmd_alias(&infra, args),
        Command::Unalias(args) => cmd_unalias(&infra, args),
        Command::Ref(args) => cmd_ref(&infra, args.action),
        Command::Set(args) => cmd_set(&infra, args.action),
        Command::Array(args) => cmd_array(&infra, args.action),
        Command::List(args) => cmd_list(&infra, args.action),
        Command::Parents(args) => cmd_parents(&infra, args),
    }
}

fn open(cli: &Cli) -> anyhow::Result<(Arc<FileRecordStore>, Infrastructure)> {
    let mut config = match &cli.config {
        Some(path) => InfraConfig::load(path)?,
        None => {
            let path = cli.root.join("lapis.toml");
            if path.exists() { InfraConfig::load(&path)? } else { InfraConfig::default() }
        }
    };
    if let Some(prefix) = &cli.prefix {
        config.prefix = Some(prefix.clone());
    }
    let store = Arc::new(
        FileRecordStore::open(&cli.root)
            .with_context(|| format!("opening record store at {}", cli.root.display()))?,
    );
    debug!(root = %cli.root.display(), ?config, "opened infrastructure");
    let infra = Infrastructure::new(store.clone(), config)?;
    Ok((store, infra))
}

// ---------------------------------------------------------------------------
// Lookup helpers
// ---------------------------------------------------------------------------

fn require(infra: &Infrastructure, id: &str) -> anyhow::Result<Entity> {
    infra.lookup(id)?.ok_or_else(|| anyhow!("{id} does not exist"))
}

fn require_object(infra: &Infrastructure, id: &str) -> anyhow::Result<DigitalObject> {
    Ok(require(infra, id)?.into_object())
}

fn require_set(infra: &Infrastructure, id: &str) -> anyhow::Result<DigitalObjectSet> {
    match require(infra, id)? {
        Entity::Set(set) => Ok(set),
        other => bail!("{} is not a set ({})", other.pid(), other.kind()),
    }
}

fn require_array(infra: &Infrastructure, id: &str) -> anyhow::Result<DigitalObjectArray> {
    match require(infra, id)? {
        Entity::Array(array) => Ok(array),
        other => bail!("{} is not an array ({})", other.pid(), other.kind()),
    }
}

fn require_list(infra: &Infrastructure, id: &str) -> anyhow::Result<DigitalObjectLinkedList> {
    match require(infra, id)? {
        Entity::LinkedList(list) => Ok(list),
        other => bail!("{} is not a linked list ({})", other.pid(), other.kind()),
    }
}

fn print_identifiers(ids: &[Pid]) {
    if ids.is_empty() {
        println!("  {}", "(empty)".dimmed());
    }
    for (i, pid) in ids.iter().enumerate() {
        println!("  {} {}", format!("[{i}]").dimmed(), pid.to_string().cyan());
    }
}

// ---------------------------------------------------------------------------
// Objects and aliases
// ---------------------------------------------------------------------------

fn cmd_create(infra: &Infrastructure, args: CreateArgs) -> anyhow::Result<()> {
    let entity = infra.create(args.id.as_deref(), args.kind.into())?;
    let object = entity.object();
    if let Some(location) = &args.location {
        object.set_resource_location(location)?;
    }
    if let Some(resource_type) = &args.resource_type {
        object.set_resource_type(resource_type)?;
    }
    println!("{} Created {} {}", "✓".green().bold(), entity.kind(), object.pid().to_string().cyan().bold());
    Ok(())
}

fn cmd_ls(store: &FileRecordStore, infra: &Infrastructure) -> anyhow::Result<()> {
    let ids = store.all_ids()?;
    if ids.is_empty() {
        println!("{}", "(empty)".dimmed());
    }
    for pid in ids {
        if infra.is_alias(pid.as_str())? {
            println!("{} {}", pid.to_string().cyan(), "(alias)".dimmed());
        } else {
            println!("{}", pid.to_string().cyan());
        }
    }
    Ok(())
}

fn cmd_show(infra: &Infrastructure, args: ShowArgs, json: bool) -> anyhow::Result<()> {
    let entity = require(infra, &args.id)?;
    let object = entity.object();
    let record = object.record()?;
    if json {
        let doc = serde_json::json!({
            "pid": object.pid(),
            "kind": entity.kind().to_string(),
            "aliases": object.alias_identifiers(),
            "record": record,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("{} ({})", object.pid().to_string().cyan().bold(), entity.kind());
    for alias in object.alias_identifiers() {
        println!("  via alias: {}", alias.to_string().yellow());
    }
    if let Some(location) = object.resource_location()? {
        println!("  Location: {}", location.blue());
    }
    if let Some(resource_type) = object.resource_type()? {
        println!("  Type: {resource_type}");
    }
    println!("  {} entries", record.len().to_string().bold());
    for (index, value) in &record {
        println!("  {:>10}  {:<16} {}", index, value.tag.dimmed(), value.data);
    }
    Ok(())
}

fn cmd_delete(infra: &Infrastructure, args: DeleteArgs) -> anyhow::Result<()> {
    infra.delete(&args.id)?;
    println!("Deleted {}", args.id.yellow());
    Ok(())
}

fn cmd_alias(infra: &Infrastructure, args: AliasArgs) -> anyhow::Result<()> {
    let alias = infra.create_alias(&args.target, &args.alias)?;
    println!("{} {} → {}", "✓".green().bold(), alias.to_string().bold(), args.target.cyan());
    Ok(())
}

fn cmd_unalias(infra: &Infrastructure, args: UnaliasArgs) -> anyhow::Result<()> {
    if !infra.delete_alias(&args.alias)? {
        bail!("{} is not an alias", args.alias);
    }
    println!("Deleted alias {}", args.alias.yellow());
    Ok(())
}

fn cmd_ref(infra: &Infrastructure, action: RefAction) -> anyhow::Result<()> {
    match action {
        RefAction::Add { id, semantics, target } => {
            let object = require_object(infra, &id)?;
            object.add_reference(&semantics, &infra.prepare_identifier(&target)?)?;
            println!("{} {} {} {}", "✓".green(), object.pid(), semantics.bold(), target.cyan());
        }
        RefAction::Remove { id, semantics, target: Some(target) } => {
            let object = require_object(infra, &id)?;
            if object.remove_reference(&semantics, &infra.prepare_identifier(&target)?)? {
                println!("Removed {} {}", semantics.bold(), target.yellow());
            } else {
                println!("No {} reference to {}", semantics.bold(), target);
            }
        }
        RefAction::Remove { id, semantics, target: None } => {
            let object = require_object(infra, &id)?;
            if object.remove_references(&semantics)? {
                println!("Removed all {} references", semantics.bold());
            } else {
                println!("No {} references", semantics.bold());
            }
        }
        RefAction::List { id, semantics } => {
            let object = require_object(infra, &id)?;
            let keys = match semantics {
                Some(key) => vec![key],
                None => object.reference_keys()?,
            };
            for key in keys {
                println!("{}:", key.bold());
                print_identifiers(&object.reference_identifiers(&key)?);
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

fn cmd_set(infra: &Infrastructure, action: SetAction) -> anyhow::Result<()> {
    match action {
        SetAction::Add { set, member } => {
            let set = require_set(infra, &set)?;
            let member = require_object(infra, &member)?;
            if set.add(&member)? {
                println!("{} Added {}", "✓".green(), member.pid().to_string().cyan());
            } else {
                println!("{} is already a member", member.pid());
            }
        }
        SetAction::Remove { set, member } => {
            let set = require_set(infra, &set)?;
            let member = infra.prepare_identifier(&member)?;
            if set.remove(&member)? {
                println!("Removed {}", member.to_string().yellow());
            } else {
                println!("{member} is not a member");
            }
        }
        SetAction::List { set } => {
            let set = require_set(infra, &set)?;
            println!("{} ({} members)", set.pid().to_string().bold(), set.len()?);
            print_identifiers(&set.member_identifiers()?);
        }
    }
    Ok(())
}

fn cmd_array(infra: &Infrastructure, action: ArrayAction) -> anyhow::Result<()> {
    match action {
        ArrayAction::Append { array, element } => {
            let array = require_array(infra, &array)?;
            let element = require_object(infra, &element)?;
            let position = array.append(&element)?;
            println!("{} {} at [{position}]", "✓".green(), element.pid().to_string().cyan());
        }
        ArrayAction::Insert { array, element, position } => {
            let array = require_array(infra, &array)?;
            let element = require_object(infra, &element)?;
            array.insert(&element, position)?;
            println!("{} {} at [{position}]", "✓".green(), element.pid().to_string().cyan());
        }
        ArrayAction::Remove { array, element, at } => {
            let array = require_array(infra, &array)?;
            match (element, at) {
                (_, Some(position)) => {
                    let removed = array.remove_at(position)?;
                    println!("Removed {} from [{position}]", removed.to_string().yellow());
                }
                (Some(element), None) => {
                    let element = infra.prepare_identifier(&element)?;
                    if array.remove(&element)? {
                        println!("Removed {}", element.to_string().yellow());
                    } else {
                        println!("{element} is not an element");
                    }
                }
                (None, None) => bail!("an element or --at position is required"),
            }
        }
        ArrayAction::List { array } => {
            let array = require_array(infra, &array)?;
            println!("{} ({} elements)", array.pid().to_string().bold(), array.len()?);
            print_identifiers(&array.identifiers()?);
        }
    }
    Ok(())
}

fn cmd_list(infra: &Infrastructure, action: ListAction) -> anyhow::Result<()> {
    match action {
        ListAction::Append { list, element } => {
            let list = require_list(infra, &list)?;
            let element = require_object(infra, &element)?;
            let pointer = list.append(&element)?;
            println!("{} {}", "✓".green(), pointer.to_string().cyan());
        }
        ListAction::Insert { list, element, position } => {
            let list = require_list(infra, &list)?;
            let element = require_object(infra, &element)?;
            let pointer = list.insert_at(&element, position)?;
            println!("{} {} at [{position}]", "✓".green(), pointer.to_string().cyan());
        }
        ListAction::Remove { list, element, at } => {
            let list = require_list(infra, &list)?;
            match (element, at) {
                (_, Some(position)) => {
                    let removed = list.remove_at(position)?;
                    println!("Removed {} from [{position}]", removed.to_string().yellow());
                }
                (Some(element), None) => {
                    let element = infra.prepare_identifier(&element)?;
                    if list.remove_object(&element)? {
                        println!("Removed {}", element.to_string().yellow());
                    } else {
                        println!("{element} is not an element");
                    }
                }
                (None, None) => bail!("an element or --at position is required"),
            }
        }
        ListAction::Show { list } => {
            let list = require_list(infra, &list)?;
            println!("{} ({} elements)", list.pid().to_string().bold(), list.len()?);
            for (i, pointer) in list.pointers()?.iter().enumerate() {
                println!("  {} {}", format!("[{i}]").dimmed(), pointer.to_string().cyan());
            }
        }
    }
    Ok(())
}

fn cmd_parents(infra: &Infrastructure, args: ParentsArgs) -> anyhow::Result<()> {
    let object = require_object(infra, &args.id)?;
    for (label, segment) in [
        ("arrays", Segment::ARRAY),
        ("sets", Segment::HASHMAP),
        ("lists", Segment::LINKED_LIST),
    ] {
        let parents: Vec<Pid> = object.parent_identifiers(segment)?.into_iter().collect();
        println!("{}:", label.bold());
        print_identifiers(&parents);
    }
    Ok(())
}
