//! User command - manage users and their credentials

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use kasse_core::Error;

use super::{get_context, log_command, read_password};
use crate::output;

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a new user
    Add {
        name: String,
        /// Password (prompted for if omitted)
        #[arg(long, env = "KASSE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a user's password
    Passwd { name: String },
    /// List users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a user's password
    Login {
        name: String,
        #[arg(long, env = "KASSE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

pub fn run(command: UserCommands) -> Result<()> {
    let ctx = get_context()?;
    match command {
        UserCommands::Add { name, password, json } => {
            log_command("user add");
            let password = read_password(password, "Password", true)?;
            let user = match ctx.accounts.register(&name, &password) {
                Err(Error::UserExists) => anyhow::bail!("User {} already exists", name),
                other => other?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&user)?);
            } else {
                output::success(&format!("Created user {} (id {})", user.name, user.id));
            }
        }
        UserCommands::Passwd { name } => {
            log_command("user passwd");
            let old = read_password(None, "Current password", false)?;
            let new = read_password(None, "New password", true)?;
            ctx.accounts.change_password(&name, &old, &new)?;
            output::success("Password changed");
        }
        UserCommands::List { json } => {
            log_command("user list");
            let users = ctx.accounts.list_users()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
                return Ok(());
            }
            if users.is_empty() {
                println!("No users yet. Create one with `kasse user add NAME`.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["ID", "Name", "Cards", "Balance"]);
            for user in users {
                let cards = ctx.cards.list_cards(&user)?;
                let balance = ctx.repository.get_balance(user.id)?;
                table.add_row(vec![
                    user.id.to_string(),
                    user.name,
                    cards.len().to_string(),
                    output::amount(balance),
                ]);
            }
            println!("{}", table);
        }
        UserCommands::Login { name, password } => {
            log_command("user login");
            let password = read_password(password, "Password", false)?;
            match ctx.accounts.authenticate(&name, &password) {
                Ok(user) => output::success(&format!("Logged in as {}", user.name.bold())),
                Err(Error::WrongAuth) => anyhow::bail!("Wrong username or password"),
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}
