use std::io::Write;

use anyhow::{bail, Context};
use clap::Parser;
use reabed_protocol::{
    decode_control, encode_line, is_notification, trim_line, Command, ControlMessage,
};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Terminal client for the reanimation bed server.
#[derive(Debug, Parser)]
#[command(name = "reabed-client", version, about)]
struct Args {
    /// Server address
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Command port
    #[arg(short, long, default_value_t = 8000)]
    port: u16,

    /// Notification port
    #[arg(short, long, default_value_t = 8001)]
    notify_port: u16,
}

/// Menu entries, numbered from 1.
const MENU: [(&str, &str); 14] = [
    ("get_angles", "Get angles of the bed"),
    ("get_height", "Get height of the bed"),
    ("get_weight", "Get weight of the patient"),
    ("set_angles", "Set angles of the bed"),
    ("set_height", "Set height of the bed"),
    ("set_weight", "Set weight of the patient"),
    ("subscribe_angles", "Subscribe to notifications on angles of the bed"),
    ("subscribe_height", "Subscribe to notifications on height of the bed"),
    ("subscribe_weight", "Subscribe to notifications on weight of the patient"),
    ("unsubscribe_angles", "Unsubscribe from notifications on angles of the bed"),
    ("unsubscribe_height", "Unsubscribe from notifications on height of the bed"),
    ("unsubscribe_weight", "Unsubscribe from notifications on weight of the patient"),
    ("exit", "Exit the client"),
    ("commands", "Show commands"),
];

/// What a line typed by the user asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Command(Command),
    Control(ControlMessage),
    Exit,
    Help,
}

/// Resolve a menu number or a verb name.
fn parse_action(input: &str) -> Option<Action> {
    let input = input.trim();
    let verb = match input.parse::<usize>() {
        Ok(n) => MENU.get(n.checked_sub(1)?)?.0,
        Err(_) => input,
    };

    match verb {
        "exit" => Some(Action::Exit),
        "commands" => Some(Action::Help),
        _ => Command::from_verb(verb)
            .map(Action::Command)
            .or_else(|| decode_control(verb).ok().map(Action::Control)),
    }
}

fn print_menu() {
    println!("Commands:");
    for (i, (verb, help)) in MENU.iter().enumerate() {
        println!("{:>3}. {:<20} {}", i + 1, verb, help);
    }
}

fn prompt(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}

/// Label shown in front of a line received on the notification connection.
fn notification_label(line: &str) -> &'static str {
    if is_notification(line) {
        "[notify]"
    } else {
        "[server]"
    }
}

/// Print every line pushed on the notification connection.
async fn print_notifications(reader: OwnedReadHalf) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => println!("\n{} {}", notification_label(&line), trim_line(&line)),
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Notification connection error: {}", e);
                break;
            }
        }
    }
}

async fn recv_line<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> anyhow::Result<String> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        bail!("connection closed by server");
    }
    Ok(trim_line(&line).to_string())
}

async fn send_line<W: AsyncWrite + Unpin>(writer: &mut W, text: &str) -> anyhow::Result<()> {
    writer.write_all(encode_line(text).as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Run one command exchange, reading a value from stdin for `set_*`.
async fn run_command<R, W, S>(
    command: Command,
    reader: &mut BufReader<R>,
    writer: &mut W,
    stdin: &mut Lines<S>,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    S: tokio::io::AsyncBufRead + Unpin,
{
    send_line(writer, command.verb()).await?;
    if !command.is_set() {
        println!("Received: {}", recv_line(reader).await?);
        return Ok(());
    }

    // Help text, up to the closing rule. The value prompt follows unterminated.
    loop {
        let line = recv_line(reader).await?;
        println!("{line}");
        if line.starts_with("------") && line.chars().all(|c| c == '-') {
            break;
        }
    }
    let value_prompt = format!("Enter {}: ", command.topic());
    prompt(&value_prompt);

    let value = stdin.next_line().await?.unwrap_or_default();
    send_line(writer, &value).await?;

    let result = recv_line(reader).await?;
    let result = result.strip_prefix(&value_prompt).unwrap_or(&result);
    println!("Received: {result}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let command_addr = format!("{}:{}", args.host, args.port);
    let notify_addr = format!("{}:{}", args.host, args.notify_port);
    let command = TcpStream::connect(&command_addr)
        .await
        .with_context(|| format!("failed to connect to {command_addr}"))?;
    let notify = TcpStream::connect(&notify_addr)
        .await
        .with_context(|| format!("failed to connect to {notify_addr}"))?;
    println!("Connected to {command_addr} (notifications on {notify_addr})");

    let (command_reader, mut command_writer) = command.into_split();
    let mut command_reader = BufReader::new(command_reader);
    let (notify_reader, mut notify_writer) = notify.into_split();
    let mut printer = tokio::spawn(print_notifications(notify_reader));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    print_menu();

    loop {
        prompt("Enter command: ");
        let input = tokio::select! {
            line = stdin.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
            _ = &mut printer => {
                println!("Notification connection lost");
                return Ok(());
            }
        };

        match parse_action(&input) {
            Some(Action::Command(command)) => {
                run_command(command, &mut command_reader, &mut command_writer, &mut stdin)
                    .await
                    .context("command connection lost")?;
            }
            Some(Action::Control(msg)) => {
                // The acknowledgement arrives through the notification printer.
                send_line(&mut notify_writer, &msg.to_string())
                    .await
                    .context("notification connection lost")?;
            }
            Some(Action::Exit) => {
                println!("Exiting...");
                break;
            }
            Some(Action::Help) => print_menu(),
            None => println!("Wrong command"),
        }
    }

    printer.abort();
    Ok(())
}
