use std::time::Duration;

use realtime::{ClientConfig, RealtimeClient, SendMessageData};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

fn read_arg_or_env(args: &[String], index: usize, env_key: &str, default: &str) -> String {
    args.get(index)
        .cloned()
        .or_else(|| std::env::var(env_key).ok())
        .unwrap_or_else(|| default.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let url = read_arg_or_env(&args, 1, "CHAT_REALTIME__URL", "http://localhost:8081");
    let token = read_arg_or_env(&args, 2, "CHAT_TOKEN", "");
    let room_id = read_arg_or_env(&args, 3, "CHAT_ROOM", "");
    if token.trim().is_empty() || room_id.trim().is_empty() {
        return Err("usage: room_tail <url> <token> <room-id>".into());
    }

    let cfg = ClientConfig::new(url).reconnect(Duration::from_secs(1), 5);
    let client = RealtimeClient::with_token(cfg, token.trim());

    client.on_connected(|user_id| println!("* connected as {user_id}"));
    client.on_joined_room(|room_id| println!("* joined {room_id}"));
    client.on_new_message(|message| {
        println!("[{}] {}: {}", message.timestamp, message.user_name, message.content);
    });
    client.on_user_joined(|user| println!("* {} joined", user.user_name));
    client.on_user_left(|user_id| println!("* {user_id} left"));
    client.on_user_typing(|typing| {
        if typing.typing {
            println!("* {} is typing...", typing.user_name);
        }
    });
    client.on_error(|message| eprintln!("! {message}"));

    client.connect().await?;
    client.join_room(room_id.trim()).await?;
    println!("type messages, `/leave` to exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.eq_ignore_ascii_case("/leave") {
            client.leave_room(room_id.trim()).await?;
            break;
        }
        if line.is_empty() {
            continue;
        }
        client.send_message(SendMessageData::text(line)).await?;
    }

    client.disconnect().await;
    Ok(())
}
