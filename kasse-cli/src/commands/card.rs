//! Card command - manage the cards bound to a user

use anyhow::Result;
use clap::Subcommand;
use dialoguer::Confirm;
use kasse_core::{CardId, Error};

use super::{get_context, log_command};
use crate::output;

#[derive(Subcommand)]
pub enum CardCommands {
    /// Bind a card id (hex) to a user
    ///
    /// To register a card by swiping it, use `kasse serve --register-user`.
    Add {
        user: String,
        card: String,
        #[arg(long, short)]
        description: Option<String>,
    },
    /// List cards, of one user or of everyone
    List {
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a card's description
    Edit {
        user: String,
        card: String,
        /// New description, omit to clear it
        #[arg(long, short)]
        description: Option<String>,
    },
    /// Unbind a card; its transactions are kept
    Remove {
        user: String,
        card: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

pub fn run(command: CardCommands) -> Result<()> {
    let ctx = get_context()?;
    match command {
        CardCommands::Add { user, card, description } => {
            log_command("card add");
            let user = ctx.accounts.get_user(&user)?;
            let id = CardId::from_hex(&card)?;
            match ctx.cards.add_card(&user, id, description.as_deref()) {
                Ok(card) => output::success(&format!("Card {} added for {}", card.id, user.name)),
                Err(Error::CardExists) => anyhow::bail!("Card {} is already registered", card),
                Err(e) => return Err(e.into()),
            }
        }
        CardCommands::List { user, json } => {
            log_command("card list");
            let users = ctx.accounts.list_users()?;
            let cards = match &user {
                Some(name) => ctx.cards.list_cards(&ctx.accounts.get_user(name)?)?,
                None => ctx.cards.list_all()?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&cards)?);
                return Ok(());
            }
            if cards.is_empty() {
                println!("No cards found.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Card", "User", "Description"]);
            for card in cards {
                let owner = users
                    .iter()
                    .find(|u| u.id == card.user_id)
                    .map(|u| u.name.clone())
                    .unwrap_or_else(|| card.user_id.to_string());
                table.add_row(vec![
                    card.id.to_hex(),
                    owner,
                    card.description.unwrap_or_default(),
                ]);
            }
            println!("{}", table);
        }
        CardCommands::Edit { user, card, description } => {
            log_command("card edit");
            let user = ctx.accounts.get_user(&user)?;
            ctx.cards
                .update_description(&user, &CardId::from_hex(&card)?, description.as_deref())?;
            output::success("Card updated");
        }
        CardCommands::Remove { user, card, force } => {
            log_command("card remove");
            let user = ctx.accounts.get_user(&user)?;
            let id = CardId::from_hex(&card)?;
            if !force
                && !Confirm::new()
                    .with_prompt(format!("Remove card {} of {}?", id, user.name))
                    .default(false)
                    .interact()?
            {
                println!("Cancelled.");
                return Ok(());
            }
            ctx.cards.remove_card(&user, &id)?;
            output::success(&format!("Card {} removed", id));
        }
    }
    Ok(())
}
