//! `lf login`, `lf whoami`, `lf logout`: the stored session.

use crate::app::App;
use crate::output::{CliError, OutputMode, fail, pretty_kv, render, render_error};
use clap::Args;
use lostfound_core::SyncError;
use lostfound_core::model::User;
use lostfound_core::session::{Session, SessionRecord};
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct LoginArgs {
    #[arg(long)]
    pub id: String,

    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub phone: Option<String>,

    /// Role claim from the identity provider; repaired before it is stored.
    #[arg(long)]
    pub role: Option<String>,

    /// Bearer token for the item service.
    #[arg(long)]
    pub token: Option<String>,
}

impl LoginArgs {
    fn into_record(self) -> SessionRecord {
        SessionRecord {
            user: User {
                id: Some(self.id),
                name: self.name,
                email: self.email,
                phone: self.phone,
                role: None,
            },
            role: self.role,
            token: self.token,
        }
    }
}

fn write_session(session: &Session, w: &mut dyn Write) -> io::Result<()> {
    pretty_kv(w, "User", &session.user.name)?;
    pretty_kv(w, "Email", &session.user.email)?;
    if let Some(id) = &session.user.id {
        pretty_kv(w, "ID", id)?;
    }
    pretty_kv(w, "Role", session.role.as_str())
}

/// Execute `lf login`.
///
/// # Errors
///
/// Returns an error when the session cannot be written.
pub fn run_login(args: LoginArgs, output: OutputMode, app: &App) -> anyhow::Result<()> {
    let session = app
        .sessions
        .establish(args.into_record(), &app.config.roles)
        .map_err(|err| fail(output, &err))?;
    render(output, &session, write_session)
}

/// Execute `lf whoami`.
///
/// # Errors
///
/// Returns an error when nobody is signed in.
pub fn run_whoami(output: OutputMode, app: &App) -> anyhow::Result<()> {
    let Some(session) = &app.session else {
        render_error(
            output,
            &CliError::with_details(
                "not signed in",
                "run `lf login --id <id> --name <name> --email <email>`",
                "session_missing",
            ),
        )?;
        anyhow::bail!("not signed in");
    };
    render(output, session, write_session)
}

/// Execute `lf logout`.
///
/// # Errors
///
/// Returns an error when the session slot cannot be removed.
pub fn run_logout(output: OutputMode, app: &App) -> anyhow::Result<()> {
    app.sessions
        .clear()
        .map_err(|err| fail(output, &SyncError::from(err)))?;
    render(output, &serde_json::json!({ "signedIn": false }), |_, w| {
        writeln!(w, "Signed out.")
    })
}
