use std::sync::Arc;

use anyhow::{Context, Result, bail};
use realtime::RealtimeClient;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    api::{ApiClient, HISTORY_PAGE_SIZE, ROOM_PAGE_SIZE},
    cli::{Commands, MessagesCommand, RoomsCommand, UsersCommand},
    config::AppConfig,
    display,
    forms::{self, SignUpForm},
    models::{CreateRoomForm, UpdateUserForm},
    services::ChatSession,
    session::{OAuthCallback, Session, SessionStore},
};

/// Runs CLI commands against the configured backend.
pub struct App {
    cfg: AppConfig,
    api: ApiClient,
    json: bool,
}

impl App {
    pub fn new(cfg: AppConfig, sessions: Arc<dyn SessionStore>, json: bool) -> Result<Self> {
        let api = ApiClient::new(&cfg.api, sessions)?;
        Ok(Self { cfg, api, json })
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Signup(args) => {
                let strength = forms::strength_label(forms::password_strength(&args.password));
                tracing::debug!(strength = strength.as_str(), "password strength");
                let request = SignUpForm {
                    name: args.name,
                    email: args.email,
                    password: args.password,
                    confirm_password: args.confirm_password,
                }
                .into_request()?;
                let response = self.api.auth().register(&request).await?;
                self.print(&response.user, |user| {
                    format!("signed up as {}", display::auth_user_line(user))
                })
            }
            Commands::Login(args) => {
                let response = self.api.auth().login(&args.email, &args.password).await?;
                self.print(&response.user, |user| {
                    format!("signed in as {}", display::auth_user_line(user))
                })
            }
            Commands::Logout => {
                self.api.auth().logout().await?;
                println!("signed out");
                Ok(())
            }
            Commands::Whoami => self.whoami().await,
            Commands::OauthCallback { url } => {
                let callback = OAuthCallback::parse(&url)?;
                let session = self.api.auth().complete_oauth(&callback).await?;
                self.print(&session.user, |user| match user {
                    Some(user) => format!("signed in as {}", display::auth_user_line(user)),
                    None => "signed in".to_string(),
                })
            }
            Commands::OauthExchange { access_token } => {
                let token = self.api.auth().exchange_oauth(&access_token).await?;
                let user = self.api.auth().validate(&token).await?.user();
                let session = Session::new(token, user);
                self.api.sessions().save(&session).await?;
                self.print(&session.user, |user| match user {
                    Some(user) => format!("signed in as {}", display::auth_user_line(user)),
                    None => "signed in".to_string(),
                })
            }
            Commands::Refresh => {
                self.api.auth().refresh().await?;
                println!("token refreshed");
                Ok(())
            }
            Commands::Rooms(command) => self.rooms(command).await,
            Commands::Messages(command) => self.messages(command).await,
            Commands::Users(command) => self.users(command).await,
            Commands::Upload { file } => {
                let uploaded = self.api.files().upload_image(&file).await?;
                self.print(&uploaded, |uploaded| uploaded.url.clone())
            }
            Commands::DeleteFile { filename } => {
                self.api.files().delete(&filename).await?;
                println!("deleted {filename}");
                Ok(())
            }
            Commands::Open { room_id } => self.open(&room_id).await,
        }
    }

    async fn whoami(&self) -> Result<()> {
        let Some(session) = self.api.sessions().load().await? else {
            bail!("not signed in");
        };
        if let Ok(claims) = session.claims()
            && claims.is_expired()
        {
            tracing::warn!("stored token has expired; sign in again");
        }
        let user = self.api.auth().me().await?;
        self.print(&user, |user| display::auth_user_line(user))
    }

    async fn rooms(&self, command: RoomsCommand) -> Result<()> {
        let rooms = self.api.rooms();
        match command {
            RoomsCommand::Public(page) => {
                let listing = rooms
                    .public(page.page, page.size_or(ROOM_PAGE_SIZE))
                    .await?;
                self.print(&listing, |listing| {
                    lines(listing.content.iter().map(display::room_line))
                })
            }
            RoomsCommand::Mine => {
                let listing = rooms.mine().await?;
                self.print(&listing, |listing| {
                    lines(listing.iter().map(display::room_line))
                })
            }
            RoomsCommand::Show { room_id } => {
                let room = rooms.get(&room_id).await?;
                self.print(&room, display::room_line)
            }
            RoomsCommand::Create {
                name,
                description,
                private,
            } => {
                let room = rooms
                    .create(CreateRoomForm {
                        name,
                        description,
                        is_private: private,
                    })
                    .await?;
                self.print(&room, display::room_line)
            }
            RoomsCommand::Update {
                room_id,
                name,
                description,
                private,
            } => {
                let room = rooms
                    .update(
                        &room_id,
                        CreateRoomForm {
                            name,
                            description,
                            is_private: private,
                        },
                    )
                    .await?;
                self.print(&room, display::room_line)
            }
            RoomsCommand::Join { room_id } => {
                rooms.join(&room_id).await?;
                println!("joined {room_id}");
                Ok(())
            }
            RoomsCommand::Leave { room_id } => {
                rooms.leave(&room_id).await?;
                println!("left {room_id}");
                Ok(())
            }
            RoomsCommand::Members { room_id } => {
                let members = rooms.members(&room_id).await?;
                self.print(&members, |members| {
                    lines(members.iter().map(display::member_line))
                })
            }
            RoomsCommand::Search { query, page } => {
                let listing = rooms
                    .search(&query, page.page, page.size_or(ROOM_PAGE_SIZE))
                    .await?;
                self.print(&listing, |listing| {
                    lines(listing.content.iter().map(display::room_line))
                })
            }
            RoomsCommand::Delete { room_id } => {
                rooms.delete(&room_id).await?;
                println!("deleted {room_id}");
                Ok(())
            }
        }
    }

    async fn messages(&self, command: MessagesCommand) -> Result<()> {
        let messages = self.api.messages();
        match command {
            MessagesCommand::History { room_id, page } => {
                let history = messages
                    .history(&room_id, page.page, page.size_or(HISTORY_PAGE_SIZE))
                    .await?;
                self.print(&history, |history| {
                    lines(history.content.iter().rev().map(display::message_line))
                })
            }
            MessagesCommand::Recent { room_id, since } => {
                let recent = messages.recent(&room_id, &since).await?;
                self.print(&recent, |recent| {
                    lines(recent.iter().map(display::message_line))
                })
            }
            MessagesCommand::Search {
                room_id,
                query,
                page,
            } => {
                let found = messages
                    .search(&room_id, &query, page.page, page.size_or(ROOM_PAGE_SIZE))
                    .await?;
                self.print(&found, |found| {
                    lines(found.content.iter().map(display::message_line))
                })
            }
            MessagesCommand::Delete { message_id } => {
                messages.delete(&message_id).await?;
                println!("deleted {message_id}");
                Ok(())
            }
            MessagesCommand::Stats { room_id } => {
                let stats = messages.stats(&room_id).await?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
                Ok(())
            }
        }
    }

    async fn users(&self, command: UsersCommand) -> Result<()> {
        let users = self.api.users();
        match command {
            UsersCommand::Show { user_id } => {
                let user = users.get(&user_id).await?;
                self.print(&user, display::user_line)
            }
            UsersCommand::Search { query } => {
                let found = users.search(&query).await?;
                self.print(&found, |found| lines(found.iter().map(display::user_line)))
            }
            UsersCommand::Room { room_id } => {
                let found = users.in_room(&room_id).await?;
                self.print(&found, |found| lines(found.iter().map(display::user_line)))
            }
            UsersCommand::Update { name, picture } => {
                let session = self
                    .api
                    .sessions()
                    .load()
                    .await?
                    .context("not signed in")?;
                let user_id = session.user_id().context("stored session has no user id")?;
                let user = users
                    .update(&user_id, &UpdateUserForm { name, picture })
                    .await?;
                self.print(&user, display::user_line)
            }
        }
    }

    /// Interactive room: history first, then live events while stdin lines
    /// are sent as messages.
    async fn open(&self, room_id: &str) -> Result<()> {
        let session = self
            .api
            .sessions()
            .load()
            .await?
            .context("not signed in; run `chat login` first")?;

        let realtime =
            RealtimeClient::with_token(self.cfg.realtime.client_config(), session.token.clone());
        let (chat, mut updates) =
            ChatSession::open(self.api.clone(), realtime.clone(), room_id, session.user_id())
                .await?;

        let snapshot = chat.snapshot();
        if let Some(room) = snapshot.room() {
            println!("== {} ==", room.name);
        }
        for message in snapshot.messages() {
            println!("{}", display::message_line(message));
        }
        println!("(type to send, /more for older messages, /leave to exit)");

        let printer = tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                if let Some(line) = display::update_line(&update) {
                    println!("{line}");
                }
            }
        });

        let result = self.chat_loop(&chat).await;

        let closed = chat.close().await;
        realtime.disconnect().await;
        printer.abort();
        result?;
        closed?;
        Ok(())
    }

    async fn chat_loop(&self, chat: &ChatSession) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("stdin read failed")? {
            let trimmed = line.trim();
            if trimmed.eq_ignore_ascii_case("/leave") {
                break;
            }
            if trimmed.eq_ignore_ascii_case("/more") {
                match chat.load_more().await? {
                    Some(added) => {
                        let snapshot = chat.snapshot();
                        for message in snapshot.messages().iter().take(added) {
                            println!("{}", display::message_line(message));
                        }
                    }
                    None => println!("* no older messages"),
                }
                continue;
            }

            chat.input_changed(&line).await?;
            if let Err(err) = chat.send(&line).await {
                eprintln!("! {err}");
            }
        }
        Ok(())
    }

    fn print<T: Serialize>(&self, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            let text = text(value);
            if !text.is_empty() {
                println!("{text}");
            }
        }
        Ok(())
    }
}

fn lines(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join("\n")
}
