use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "chat", author, version, about = "Terminal client for the chat service")]
pub struct Cli {
    /// Print raw JSON instead of formatted text
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an account and sign in
    Signup(SignupArgs),
    /// Sign in with email and password
    Login(LoginArgs),
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Finish a browser sign-in from the callback URL
    OauthCallback {
        /// Full callback URL or its query string (`?token=...&userId=...`)
        url: String,
    },
    /// Trade a Google access token for a session
    OauthExchange {
        access_token: String,
    },
    /// Refresh the stored token
    Refresh,
    /// Browse and manage rooms
    #[command(subcommand)]
    Rooms(RoomsCommand),
    /// Read and manage room history
    #[command(subcommand)]
    Messages(MessagesCommand),
    /// Look up users and edit your profile
    #[command(subcommand)]
    Users(UsersCommand),
    /// Upload an image and print its URL
    Upload {
        file: PathBuf,
    },
    /// Delete an uploaded file
    DeleteFile {
        filename: String,
    },
    /// Open a room interactively: lines are sent, `/more` loads older
    /// messages, `/leave` exits
    Open {
        room_id: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SignupArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long, env = "CHAT_PASSWORD", hide_env_values = true)]
    pub password: String,
    /// Repeat the password
    #[arg(long)]
    pub confirm_password: String,
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long, env = "CHAT_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct PageArgs {
    #[arg(long, default_value_t = 0)]
    pub page: u32,
    #[arg(long)]
    pub size: Option<u32>,
}

impl PageArgs {
    pub fn size_or(&self, default: u32) -> u32 {
        self.size.unwrap_or(default)
    }
}

#[derive(Subcommand, Debug)]
pub enum RoomsCommand {
    /// List public rooms
    Public(PageArgs),
    /// List rooms you are a member of
    Mine,
    Show {
        room_id: String,
    },
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        private: bool,
    },
    Update {
        room_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        private: bool,
    },
    Join {
        room_id: String,
    },
    Leave {
        room_id: String,
    },
    Members {
        room_id: String,
    },
    Search {
        query: String,
        #[command(flatten)]
        page: PageArgs,
    },
    Delete {
        room_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum MessagesCommand {
    /// Show room history, oldest first
    History {
        room_id: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Messages posted since a timestamp
    Recent {
        room_id: String,
        since: String,
    },
    Search {
        room_id: String,
        query: String,
        #[command(flatten)]
        page: PageArgs,
    },
    Delete {
        message_id: String,
    },
    Stats {
        room_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum UsersCommand {
    Show {
        user_id: String,
    },
    Search {
        query: String,
    },
    /// Users in a room
    Room {
        room_id: String,
    },
    /// Update your profile
    Update {
        #[arg(long)]
        name: String,
        #[arg(long)]
        picture: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;
    use crate::api::HISTORY_PAGE_SIZE;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_nested_room_commands() {
        let cli = Cli::try_parse_from([
            "chat", "rooms", "create", "general", "--description", "hi", "--private",
        ])
        .unwrap();
        let Commands::Rooms(RoomsCommand::Create {
            name,
            description,
            private,
        }) = cli.command
        else {
            panic!("expected rooms create");
        };
        assert_eq!(name, "general");
        assert_eq!(description.as_deref(), Some("hi"));
        assert!(private);
    }

    #[test]
    fn page_size_defaults_per_listing() {
        let cli = Cli::try_parse_from(["chat", "--json", "messages", "history", "r1"]).unwrap();
        assert!(cli.json);
        let Commands::Messages(MessagesCommand::History { page, .. }) = cli.command else {
            panic!("expected messages history");
        };
        assert_eq!(page.page, 0);
        assert_eq!(page.size_or(HISTORY_PAGE_SIZE), 50);
    }

    #[test]
    fn open_takes_a_room() {
        let cli = Cli::try_parse_from(["chat", "open", "room-1"]).unwrap();
        assert!(matches!(cli.command, Commands::Open { room_id } if room_id == "room-1"));
    }
}
