//! Line-oriented Whispr chat client.
//!
//! ```text
//! whispr-client --server 127.0.0.1:5555 --username alice
//! ```
//!
//! After connecting, type `/set_password <password>` to create or log
//! into the account. Then plain lines go to everyone and
//! `/msg <user> <text>` goes to one user.

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use whispr::{ChatClient, ChatReader, ClientCommand, Incoming, MessageType, WhisprError};

#[derive(Parser, Debug)]
#[command(name = "whispr-client", version, about = "Encrypted multi-user chat client")]
struct Args {
    /// Server address
    #[arg(long, env = "WHISPR_SERVER", default_value = "127.0.0.1:5555")]
    server: String,

    /// Name to log in as
    #[arg(long)]
    username: String,
}

#[tokio::main]
async fn main() -> Result<(), WhisprError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut client = ChatClient::connect(&args.server).await?;
    println!("{}", client.greeting().text);

    client.handshake().await?;
    let reply = client.set_username(&args.username).await?;
    println!("{}", reply.text);

    let (reader, mut writer) = client.into_split();
    let printer = tokio::spawn(print_incoming(reader));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match ClientCommand::parse(&line) {
            Ok(command) => writer.send_command(&command).await?,
            Err(usage) => eprintln!("{usage}"),
        }
    }

    printer.abort();
    Ok(())
}

async fn print_incoming(mut reader: ChatReader) {
    loop {
        let response = match reader.recv().await {
            Ok(response) => response,
            Err(e) => {
                eprintln!("disconnected: {e}");
                return;
            }
        };
        if response.message_type == MessageType::Voice {
            println!("[voice message, {} hex chars]", response.text.len());
            continue;
        }
        match Incoming::classify(&response.text) {
            Incoming::Private { sender, text } => println!("(private) {sender}: {text}"),
            Incoming::Server { text } => println!("* {text}"),
            Incoming::Broadcast { sender, text } => println!("{sender}: {text}"),
            Incoming::Malformed(raw) => println!("? {raw}"),
        }
    }
}
