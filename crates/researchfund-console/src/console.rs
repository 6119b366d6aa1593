//! Line-oriented console over the session core.
//!
//! The prompt shows the current route. Every `go` runs through the
//! navigation guard, and forced-logout events from the session manager move
//! the console to the login route as soon as they arrive.

use std::io::{self, Write};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tracing::{debug, error};

use researchfund_core::models::RegisterRequest;
use researchfund_core::routes::{normalize_path, RedirectReason, LANDING_PATH, LOGIN_PATH};
use researchfund_core::{ApiClient, Navigation, NavigationGuard, SessionEvent};

const HELP: &str = "\
Commands:
  login [username] [--remember]   Log in (password is prompted)
  logout                          Log out and return to the login page
  register                        Create an account
  go <path>                       Navigate, e.g. `go /project/list`
  whoami                          Show the current session
  routes                          List pages available to you
  help                            Show this help
  quit                            Exit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Login { username: Option<String>, remember: bool },
    Logout,
    Register,
    Go(String),
    WhoAmI,
    Routes,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Command::Empty;
    };

    match verb.to_ascii_lowercase().as_str() {
        "login" => {
            let mut username = None;
            let mut remember = false;
            for word in words {
                if word == "--remember" || word == "-r" {
                    remember = true;
                } else if username.is_none() {
                    username = Some(word.to_string());
                }
            }
            Command::Login { username, remember }
        }
        "logout" => Command::Logout,
        "register" => Command::Register,
        "go" | "cd" => Command::Go(words.next().unwrap_or("/").to_string()),
        "whoami" => Command::WhoAmI,
        "routes" | "menu" => Command::Routes,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

fn describe(reason: RedirectReason) -> &'static str {
    match reason {
        RedirectReason::AlreadyAuthenticated => "already logged in",
        RedirectReason::LoginRequired => "please log in",
        RedirectReason::SessionInvalid => "session could not be restored, please log in again",
        RedirectReason::MissingRole => "you do not have access to that page",
    }
}

enum Input {
    Event(SessionEvent),
    Line(Option<String>),
}

pub struct Console {
    guard: NavigationGuard<ApiClient>,
    events: mpsc::Receiver<SessionEvent>,
    lines: Lines<BufReader<Stdin>>,
    current: String,
}

impl Console {
    pub fn new(guard: NavigationGuard<ApiClient>, events: mpsc::Receiver<SessionEvent>) -> Self {
        Self {
            guard,
            events,
            lines: BufReader::new(tokio::io::stdin()).lines(),
            current: LOGIN_PATH.to_string(),
        }
    }

    pub async fn run(mut self) -> Result<()> {
        println!("Research Fund Management System - type `help` for commands");
        self.go("/").await;

        loop {
            self.prompt()?;
            let input = tokio::select! {
                Some(event) = self.events.recv() => Input::Event(event),
                line = self.lines.next_line() => Input::Line(line.context("Failed to read input")?),
            };

            match input {
                Input::Event(event) => {
                    println!();
                    self.handle_event(event).await;
                }
                Input::Line(None) => return Ok(()),
                Input::Line(Some(line)) => {
                    if !self.handle(parse_command(&line)).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn prompt(&self) -> Result<()> {
        print!("researchfund {}> ", self.current);
        io::stdout().flush()?;
        Ok(())
    }

    async fn read_line(&mut self, label: &str) -> Result<Option<String>> {
        print!("{}", label);
        io::stdout().flush()?;
        let line = self.lines.next_line().await.context("Failed to read input")?;
        Ok(line.map(|l| l.trim().to_string()))
    }

    async fn read_password(label: &'static str) -> Result<String> {
        tokio::task::spawn_blocking(move || rpassword::prompt_password(label))
            .await
            .context("Password prompt panicked")?
            .context("Failed to read password")
    }

    async fn go(&mut self, target: &str) {
        let outcome = self.guard.navigate(target).await;
        match outcome {
            Navigation::Proceed { ref title, .. } => println!("[{}]", title),
            Navigation::Redirect { ref to, reason } => {
                println!("Redirected to {} ({})", to, describe(reason));
            }
        }
        self.current = outcome.target().to_string();
        debug!(current = %self.current, "Route changed");
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Expired { notice, redirect } => {
                println!("! {}", notice);
                self.follow(&redirect).await;
            }
            SessionEvent::Unauthorized { message, redirect } => {
                println!("! Your session is no longer valid: {}", message);
                self.follow(&redirect).await;
            }
        }
    }

    /// Forced navigation from a session event. The guard may already have
    /// put us there.
    async fn follow(&mut self, redirect: &str) {
        if needs_redirect(&self.current, redirect) {
            self.go(redirect).await;
        }
    }

    /// Run one command. Returns false when the console should exit.
    async fn handle(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::Empty => {}
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(false),
            Command::Unknown(verb) => println!("Unknown command `{}`; type `help`", verb),
            Command::Go(path) => self.go(&path).await,
            Command::Login { username, remember } => self.login(username, remember).await?,
            Command::Logout => {
                self.guard.session().logout().await;
                println!("Logged out");
                self.go(LOGIN_PATH).await;
            }
            Command::Register => self.register().await?,
            Command::WhoAmI => self.whoami(),
            Command::Routes => self.routes(),
        }
        Ok(true)
    }

    async fn login(&mut self, username: Option<String>, remember: bool) -> Result<()> {
        let session = self.guard.session().clone();
        if session.has_token() {
            println!("Already logged in; `logout` first");
            return Ok(());
        }

        let username = match username {
            Some(username) => username,
            None => {
                let remembered = session.remembered_username();
                let label = match remembered {
                    Some(ref name) => format!("Username [{}]: ", name),
                    None => "Username: ".to_string(),
                };
                match self.read_line(&label).await? {
                    Some(line) if !line.is_empty() => line,
                    Some(_) | None => match remembered {
                        Some(name) => name,
                        None => {
                            println!("Username and password required");
                            return Ok(());
                        }
                    },
                }
            }
        };

        let password = Self::read_password("Password: ").await?;
        if password.is_empty() {
            println!("Username and password required");
            return Ok(());
        }

        println!("Authenticating...");
        match session.login(&username, &password, remember).await {
            Ok(()) => {
                let info = session.session_info();
                println!("Welcome, {}", info.display_name);
                self.go("/").await;
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                let message = if e.is_no_response() {
                    format!("Login failed: could not reach the server ({})", e)
                } else {
                    format!("Login failed: {}", e)
                };
                println!("{}", message);
            }
        }
        Ok(())
    }

    async fn register(&mut self) -> Result<()> {
        let Some(username) = self.read_line("Username: ").await? else {
            return Ok(());
        };
        let Some(real_name) = self.read_line("Real name: ").await? else {
            return Ok(());
        };
        let email = self.read_line("Email (optional): ").await?.filter(|s| !s.is_empty());
        let password = Self::read_password("Password: ").await?;

        if username.is_empty() || real_name.is_empty() || password.is_empty() {
            println!("Username, real name and password are required");
            return Ok(());
        }

        let request = RegisterRequest {
            username,
            password,
            real_name,
            email,
            ..Default::default()
        };
        match self.guard.session().register(&request).await {
            Ok(()) => {
                println!("Account created; you can log in now");
                self.go(LOGIN_PATH).await;
            }
            Err(e) => println!("Registration failed: {}", e),
        }
        Ok(())
    }

    fn whoami(&self) {
        let session = self.guard.session();
        if !session.has_token() {
            println!("Not logged in");
            return;
        }

        let info = session.session_info();
        let name = if info.display_name.is_empty() {
            "(not loaded)"
        } else {
            info.display_name.as_str()
        };
        println!("User:        {}", name);
        if let Some(id) = info.user_id {
            println!("User ID:     {}", id);
        }
        println!("Phase:       {:?}", session.phase());
        println!("Roles:       {}", join_or_dash(&info.roles));
        println!("Permissions: {}", join_or_dash(&info.permissions));
        println!("Department:  {}", info.department.name_display());
        println!("Admin:       {}", if info.is_admin() { "yes" } else { "no" });
        if let Some(at) = session.authenticated_at() {
            println!("Since:       {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        if let Some(left) = session.expires_in() {
            let secs = left.as_secs();
            println!("Expires in:  {}m {:02}s", secs / 60, secs % 60);
        }
    }

    fn routes(&self) {
        let session = self.guard.session();
        if !session.has_token() {
            println!("Log in to see available pages");
            return;
        }
        let info = session.session_info();
        for route in self.guard.routes().menu(&info) {
            let marker = if route.path == LANDING_PATH { "*" } else { " " };
            println!(
                "{} {:<28} {}",
                marker,
                route.path,
                route.title.as_deref().unwrap_or("")
            );
        }
    }
}

fn needs_redirect(current: &str, target: &str) -> bool {
    normalize_path(current) != normalize_path(target)
}

fn join_or_dash<'a, I: IntoIterator<Item = &'a String>>(values: I) -> String {
    let joined: Vec<&str> = values.into_iter().map(String::as_str).collect();
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined.join(", ")
    }
}
