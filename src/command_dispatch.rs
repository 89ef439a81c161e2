//! Purpose: Hold top-level CLI command dispatch for `kvit`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Context edits are persisted to the settings' config path before returning.
//! Invariants: Bucket adds never consult the current context.

use super::*;

pub(super) fn dispatch_command(
    command: Command,
    settings: &Settings,
    mut config: Config,
) -> Result<RunOutcome, Error> {
    match command {
        Command::ListKeys => {
            let keys = match read_target(settings, &config)? {
                ReadTarget::Local(client) => client.list_keys()?,
                ReadTarget::Remote(client) => client.list_keys()?,
            };
            emit_lines(&keys)?;
            Ok(RunOutcome::ok())
        }
        Command::Context { command } => {
            match command {
                ContextCommand::Add { name, address } => config.add_context(&name, &address),
                ContextCommand::Use { name } => config.use_context(&name)?,
                ContextCommand::Unset => config.unset_context(),
            }
            config.save(&settings.config_path)?;
            Ok(RunOutcome::ok())
        }
        Command::Bucket(args) => {
            let Some((bucket, action)) = parse_bucket_args(&args) else {
                return Ok(emit_usage());
            };
            match action {
                BucketAction::Add { subkey, value } => {
                    let client = LocalClient::new().with_db_path(&settings.db_path);
                    let key = client.add(&bucket, &subkey, &value)?;
                    emit_lines(&[add_message(&bucket, &subkey, &key, &value)])?;
                }
                BucketAction::Get { subkey } => {
                    let values = match read_target(settings, &config)? {
                        ReadTarget::Local(client) => client.get(&bucket, &subkey)?,
                        ReadTarget::Remote(client) => client.get(&bucket, &subkey)?,
                    };
                    emit_lines(&values)?;
                }
            }
            Ok(RunOutcome::ok())
        }
    }
}
