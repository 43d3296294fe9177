use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;

use chatfree::client::api::HttpChatApi;
use chatfree::client::session::{ActiveChat, ChatSession, Confirm};
use chatfree::client::store::{SessionStore, StoredSession};
use chatfree::database::models::CreateUserRequest;

#[derive(Parser)]
#[command(name = "chatfree-client", about = "Terminal client for a ChatFree server")]
struct Args {
    /// Server base URL
    #[arg(long, default_value = "http://localhost:5000")]
    server: String,

    /// Session file; defaults to the app data directory
    #[arg(long)]
    session_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    chatfree::init_tracing();

    let args = Args::parse();
    if let Err(err) = run(args).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let store = SessionStore::new(
        args.session_file
            .clone()
            .unwrap_or_else(SessionStore::default_path),
    );

    let stored = match store.load()? {
        Some(stored) => stored,
        None => sign_in(&args.server, &store).await?,
    };
    println!(
        "Signed in as {} <{}>",
        stored.user.username, stored.user.email
    );

    let api = HttpChatApi::new(&args.server, &stored.token);
    let mut session = ChatSession::new(api);
    session.load().await?;

    print_chats(&session);
    println!("Commands: /list /new /open N /delete N /logout /quit; anything else is sent.");

    loop {
        let Some(line) = read_line("> ")? else {
            break;
        };
        let line = line.trim();

        match line.split_once(' ').map_or((line, ""), |(c, rest)| (c, rest)) {
            ("", _) => {}
            ("/quit", _) => break,
            ("/list", _) => print_chats(&session),
            ("/new", _) => {
                session.start_new_chat();
                println!("New conversation. Type a message to start it.");
            }
            ("/open", rest) => match chat_at(&session, rest) {
                Some(id) => {
                    session.select_chat(ActiveChat::Existing(id)).await?;
                    for entry in session.transcript() {
                        println!("[{}] {}", entry.sender, entry.text);
                    }
                }
                None => println!("Usage: /open N"),
            },
            ("/delete", rest) => match chat_at(&session, rest) {
                Some(id) => {
                    if session.delete_chat(id, &StdinConfirm).await? {
                        println!("Deleted.");
                        print_chats(&session);
                    }
                }
                None => println!("Usage: /delete N"),
            },
            ("/logout", _) => {
                if session.logout(&StdinConfirm).await {
                    store.clear()?;
                    println!("Logged out.");
                    break;
                }
            }
            _ => {
                session.send(line).await;
                if let Some(entry) = session.transcript().last() {
                    println!("[{}] {}", entry.sender, entry.text);
                }
            }
        }
    }

    Ok(())
}

async fn sign_in(
    server: &str,
    store: &SessionStore,
) -> Result<StoredSession, Box<dyn std::error::Error>> {
    loop {
        match read_line("[l]ogin or [r]egister? ")?.as_deref().map(str::trim) {
            Some("r") | Some("register") => {
                let request = CreateUserRequest {
                    username: required("Username: ")?,
                    email: required("Email: ")?,
                    password: required("Password: ")?,
                    password2: required("Repeat password: ")?,
                };
                match HttpChatApi::register(server, &request).await {
                    Ok(user) => println!("Registered {}. Now log in.", user.username),
                    Err(err) => println!("Registration failed: {err}"),
                }
            }
            Some("l") | Some("login") => {
                let ident = required("Username or email: ")?;
                let password = required("Password: ")?;
                match HttpChatApi::login(server, &ident, &password).await {
                    Ok(login) => {
                        let stored = StoredSession {
                            token: login.token,
                            user: login.user,
                        };
                        store.save(&stored)?;
                        return Ok(stored);
                    }
                    Err(err) => println!("Login failed: {err}"),
                }
            }
            None => return Err("stdin closed".into()),
            _ => {}
        }
    }
}

fn print_chats(session: &ChatSession<HttpChatApi>) {
    if session.chats().is_empty() {
        println!("No chats yet. Type a message to start one.");
        return;
    }
    for (i, chat) in session.chats().iter().enumerate() {
        let marker = if session.active() == Some(ActiveChat::Existing(chat.id)) {
            "*"
        } else {
            " "
        };
        println!("{marker} [{i}] {}", chat.title);
    }
}

fn chat_at(session: &ChatSession<HttpChatApi>, index: &str) -> Option<uuid::Uuid> {
    index
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|i| session.chats().get(i))
        .map(|chat| chat.id)
}

struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, title: &str, message: &str) -> bool {
        println!("{title} {message}");
        matches!(
            read_line("Confirm [y/N]: ").ok().flatten().as_deref(),
            Some("y") | Some("Y") | Some("yes")
        )
    }
}

/// `None` on end of input.
fn read_line(label: &str) -> io::Result<Option<String>> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end().to_string()))
}

fn required(label: &str) -> Result<String, Box<dyn std::error::Error>> {
    loop {
        match read_line(label)? {
            Some(value) if !value.trim().is_empty() => return Ok(value.trim().to_string()),
            Some(_) => {}
            None => return Err("stdin closed".into()),
        }
    }
}
