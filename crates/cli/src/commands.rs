use std::env;
use std::fs::{self, File};
use std::io::{self, Read, Write};

use serde::Serialize;
use tracing::info;

use leadbook_core::{
    Caller, FieldValue, Hlc, IdentityProvider, LeadDraft, LeadField, LeadId, LeadPatch,
    LeadQuery, StaticIdentity, UserId,
};
use leadbook_engine::{Engine, EngineConfig, default_export_filename};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub fn run(config: EngineConfig, cli: Cli) -> Result<(), CliError> {
    if let Command::NewUser = cli.command {
        println!("{}", UserId::new());
        return Ok(());
    }

    let identity = identity(&cli)?;
    let caller = identity.current_caller();
    let caller = caller.as_ref();

    info!(db = %config.db_path, "opening lead book");
    let mut engine = Engine::open(config)?;

    match cli.command {
        Command::NewUser => Ok(()),
        Command::Create { input } => {
            let draft: LeadDraft = serde_json::from_str(&read_input(&input)?)?;
            let lead = engine.create_lead(caller, &draft)?;
            print_json(&lead)
        }
        Command::Update { id, token, input } => {
            let lead_id: LeadId = id.parse()?;
            let token = token.as_deref().map(str::parse::<Hlc>).transpose()?;
            let patch = parse_patch(&read_input(&input)?)?;
            let lead = engine.update_lead(caller, lead_id, &patch, token)?;
            print_json(&lead)
        }
        Command::Delete { id } => {
            let lead_id: LeadId = id.parse()?;
            engine.delete_lead(caller, lead_id)?;
            println!("deleted {lead_id}");
            Ok(())
        }
        Command::Show { id, history } => {
            let lead_id: LeadId = id.parse()?;
            let lead = engine.get_lead(caller, lead_id)?;
            let history = engine.lead_history(caller, lead_id, history)?;
            print_json(&serde_json::json!({ "lead": lead, "history": history }))
        }
        Command::List(args) => {
            let mut params = args.filter.params();
            if let Some(page) = args.page.as_deref() {
                params.push(("page", page));
            }
            let page = engine.query_leads(caller, &LeadQuery::from_params(params))?;
            print_json(&page)
        }
        Command::Import { file } => {
            let result = if file == "-" {
                engine.import_csv(caller, io::stdin().lock())?
            } else {
                let reader =
                    File::open(&file).map_err(|e| CliError::io(format!("opening {file}"), e))?;
                engine.import_csv(caller, reader)?
            };
            print_json(&result)
        }
        Command::Export { filter, out } => {
            let query = LeadQuery::from_params(filter.params());
            let out = out.unwrap_or_else(default_export_filename);
            let written = if out == "-" {
                engine.export_csv(caller, &query, io::stdout().lock())?
            } else {
                let file =
                    File::create(&out).map_err(|e| CliError::io(format!("creating {out}"), e))?;
                engine.export_csv(caller, &query, file)?
            };
            info!(rows = written, out = %out, "export finished");
            Ok(())
        }
    }
}

/// Signed-in identity from `--user` or `LEADBOOK_USER`; anonymous otherwise,
/// which the engine rejects.
fn identity(cli: &Cli) -> Result<StaticIdentity, CliError> {
    let user = cli
        .user
        .clone()
        .or_else(|| env::var("LEADBOOK_USER").ok())
        .filter(|u| !u.trim().is_empty());
    let Some(user) = user else {
        return Ok(StaticIdentity::anonymous());
    };
    let user_id: UserId = user.parse()?;
    let caller = match &cli.email {
        Some(email) => Caller::with_email(user_id, email),
        None => Caller::new(user_id),
    };
    Ok(StaticIdentity::signed_in(caller))
}

fn read_input(path: &str) -> Result<String, CliError> {
    if path == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| CliError::io("reading stdin", e))?;
        Ok(buf)
    } else {
        fs::read_to_string(path).map_err(|e| CliError::io(format!("reading {path}"), e))
    }
}

/// `{"status": "Qualified", "bhk": null, "tags": ["hot"]}` into a patch.
fn parse_patch(json: &str) -> Result<LeadPatch, CliError> {
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
    let mut patch = LeadPatch::new();
    for (key, value) in object {
        let field = LeadField::parse(&key)
            .ok_or_else(|| CliError::InvalidArgs(format!("unknown field {key:?}")))?;
        let value: FieldValue = serde_json::from_value(value)?;
        patch = patch.set(field, value);
    }
    Ok(patch)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout).map_err(|e| CliError::io("writing stdout", e))
}
