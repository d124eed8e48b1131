use std::sync::Arc;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;

use profile_wizard::config::WizardConfig;
use profile_wizard::draft::{self, DraftStore, FileStore};
use profile_wizard::error::{ReconcileError, WizardError};
use profile_wizard::model::{CategoryRef, CollectionItem, CustomerType};
use profile_wizard::reconcile::Reconciler;
use profile_wizard::remote::HttpProfileApi;
use profile_wizard::wizard::{Transition, WizardController};

const HELP: &str = "\
Commands:
  type <domestic|business>        start a new draft
  set <path> <value>              write a field (JSON or plain text)
  category <id> [name]            select the profile category
  next | back                     move between steps
  show                            print the current draft
  address|account list            show synced items
  address|account load            reload items from the server
  address|account add k=v ...     create an item
  address|account edit <i> k=v    update item i
  address|account delete <i>      delete item i
  resume <profileId>              continue an existing profile
  cancel                          discard the draft
  quit";

/// Log to stderr, or to a daily file when `WIZARD_LOG_DIR` is set.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match std::env::var("WIZARD_LOG_DIR").ok().filter(|d| !d.is_empty()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "wizard.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();

    let config = WizardConfig::from_env().context("loading configuration")?;
    let store = FileStore::open(&config.draft_dir)
        .with_context(|| format!("opening draft directory {}", config.draft_dir.display()))?;
    let draft = draft::shared(DraftStore::open(Arc::new(store), config.session_key.clone()));
    let api = Arc::new(HttpProfileApi::new(&config)?);
    let controller = WizardController::new(draft, api.clone(), api.clone(), api);

    eprintln!("Profile wizard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Service: {}", config.api_base_url);
    eprintln!("   Session: {}", config.session_key);
    eprintln!("   Type 'help' for commands.\n");
    print_position(&controller).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprint!("> ");
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            eprint!("> ");
            continue;
        }
        if matches!(line, "quit" | "exit") {
            break;
        }
        if let Err(e) = run_command(&controller, line).await {
            eprintln!("error: {}", describe(&e));
        }
        eprint!("> ");
    }
    Ok(())
}

async fn run_command(controller: &WizardController, line: &str) -> anyhow::Result<()> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["help"] => println!("{HELP}"),
        ["type", kind] => {
            let customer_type: CustomerType = kind.parse().map_err(anyhow::Error::msg)?;
            controller.select_customer_type(customer_type).await?;
            print_position(controller).await;
        }
        ["set", path, ..] => {
            let raw = remainder_after(line, 2).context("usage: set <path> <value>")?;
            controller.write(path, parse_value(raw)).await?;
        }
        ["category", id, name @ ..] => {
            let category = if name.is_empty() {
                CategoryRef::Unresolved { id: id.to_string() }
            } else {
                CategoryRef::Resolved {
                    id: id.to_string(),
                    name: name.join(" "),
                }
            };
            controller.select_category(category).await?;
        }
        ["next"] => match controller.next().await? {
            Transition::Invalid(errors) => {
                for (field, message) in errors {
                    println!("  {field}: {message}");
                }
            }
            Transition::Advanced(_) => print_position(controller).await,
            Transition::Completed => println!("Profile complete. Draft cleared."),
            Transition::Discarded => println!("Step changed while saving; nothing advanced."),
        },
        ["back"] => {
            controller.back().await?;
            print_position(controller).await;
        }
        ["show"] => {
            let state = controller.state().await;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        ["resume", profile_id] => {
            controller.resume(profile_id).await?;
            print_position(controller).await;
        }
        ["cancel"] => {
            controller.cancel().await?;
            println!("Draft discarded.");
        }
        ["address", rest @ ..] => list_command(controller.addresses(), rest).await?,
        ["account", rest @ ..] => list_command(controller.linked_accounts(), rest).await?,
        _ => anyhow::bail!("unknown command, try 'help'"),
    }
    Ok(())
}

async fn list_command<T>(reconciler: &Reconciler<T>, args: &[&str]) -> anyhow::Result<()>
where
    T: CollectionItem,
    T::Fields: DeserializeOwned,
{
    match args {
        [] | ["list"] => {
            for (index, item) in reconciler.items().await.iter().enumerate() {
                println!("  [{index}] {}", serde_json::to_string(item)?);
            }
        }
        ["load"] => {
            let count = reconciler.load().await?;
            println!("Loaded {count} item(s).");
        }
        ["add", pairs @ ..] => {
            let fields = merge_pairs(Value::Object(Map::new()), pairs)?;
            let item = reconciler.add(fields).await?;
            println!("Added {}", item.server_id().unwrap_or("?"));
        }
        ["edit", index, pairs @ ..] => {
            let mut session = reconciler.begin_edit(index.parse()?).await?;
            session.fields = merge_pairs(serde_json::to_value(&session.fields)?, pairs)?;
            let item = reconciler.commit_edit(session).await?;
            println!("Updated {}", item.server_id().unwrap_or("?"));
        }
        ["delete", index] => {
            let item = reconciler.delete(index.parse()?).await?;
            println!("Deleted {}", item.server_id().unwrap_or("?"));
        }
        _ => anyhow::bail!("usage: list | load | add k=v ... | edit <i> k=v ... | delete <i>"),
    }
    Ok(())
}

/// Text after the first `words` whitespace-separated words, inner spacing kept.
fn remainder_after(line: &str, words: usize) -> Option<&str> {
    let mut rest = line.trim_start();
    for _ in 0..words {
        let end = rest.find(char::is_whitespace)?;
        rest = rest[end..].trim_start();
    }
    (!rest.is_empty()).then_some(rest)
}

/// JSON when it parses, otherwise the raw text.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Apply `key=value` pairs onto an object and decode the result.
fn merge_pairs<F: DeserializeOwned>(mut base: Value, pairs: &[&str]) -> anyhow::Result<F> {
    let object = base
        .as_object_mut()
        .context("item fields are not an object")?;
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("expected key=value, got {pair:?}"))?;
        object.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(serde_json::from_value(base)?)
}

async fn print_position(controller: &WizardController) {
    match controller.current_step().await {
        Some((index, step)) => println!("Step {}: {}", index + 1, step.title()),
        None => println!("Choose a customer type: type <domestic|business>"),
    }
}

fn describe(err: &anyhow::Error) -> String {
    if let Some(e) = err.downcast_ref::<WizardError>() {
        return e.user_message();
    }
    if let Some(ReconcileError::Remote(e)) = err.downcast_ref::<ReconcileError>() {
        return e.user_message();
    }
    format!("{err:#}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_value_survives_extra_spacing() {
        assert_eq!(remainder_after("set  a.b   v", 2), Some("v"));
        assert_eq!(remainder_after("set a.b\tSt James's  Square", 2), Some("St James's  Square"));
        assert_eq!(remainder_after("set a.b", 2), None);
        assert_eq!(remainder_after("set a.b   ", 2), None);
    }

    #[test]
    fn plain_text_and_json_values() {
        assert_eq!(parse_value("42"), Value::from(42));
        assert_eq!(parse_value("rental"), Value::String("rental".into()));
    }
}
