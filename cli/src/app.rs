use anyhow::{bail, Context, Result};
use colored::*;
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};
use lms_admin_core::{
    generate_strong_password, get_default_config_file, AdminApi, AdminConfig, ApiEnvelope,
    Credentials, NewUser, ProfileChanges, ProfileUpdate, RoleInput, UserQuery, APP_NAME,
};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::cli::{
    Command, ConfigCommand, PermissionCommand, ProfileCommand, RoleCommand, RoleFields,
    UserCommand,
};
use crate::logging::log_warn;
use crate::output::*;
use crate::session_manager::SessionManager;
use crate::utils::{read_picture, PictureFile};

/// Run `future` behind a spinner
async fn with_spinner<F: Future>(message: &str, future: F) -> F::Output {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));

    let output = future.await;
    spinner.finish_and_clear();
    output
}

/// Pass a successful envelope through; report a failed one and turn it into an error.
///
/// A rejected token clears the stored session first.
async fn settle<T>(sessions: &SessionManager, envelope: ApiEnvelope<T>) -> Result<ApiEnvelope<T>> {
    if !envelope.success {
        print_api_failure(&envelope);
        if sessions.invalidate_if_rejected(&envelope).await? {
            log_warn("Your session is no longer valid and has been cleared. Run `lms-admin login` again.");
        }
    }
    Ok(envelope.ensure_success()?)
}

async fn settle_data<T>(sessions: &SessionManager, envelope: ApiEnvelope<T>) -> Result<T> {
    settle(sessions, envelope)
        .await?
        .data
        .context("The backend returned no data")
}

/// Execute one parsed command
pub async fn run(command: Command, config: &AdminConfig, config_path: Option<&Path>) -> Result<()> {
    let sessions = SessionManager::new(config)?;

    match command {
        Command::Login { email, password } => login(&sessions, email, password).await,
        Command::Logout => {
            if sessions.logout().await? {
                print_success("Signed out");
            } else {
                println!("No stored session.");
            }
            Ok(())
        }
        Command::Whoami => {
            match sessions.current().await? {
                Some(session) => print_session(&session),
                None => println!("Not signed in."),
            }
            Ok(())
        }
        Command::Stats => {
            let admin = sessions.admin()?;
            let stats = with_spinner("Loading dashboard...", admin.dashboard_stats()).await?;
            print_stats(&stats);
            Ok(())
        }
        Command::Users(command) => run_users(&sessions, command).await,
        Command::Roles(command) => run_roles(&sessions, command).await,
        Command::Permissions(command) => run_permissions(&sessions, command).await,
        Command::Profile(command) => run_profile(&sessions, command).await,
        Command::Config(command) => run_config(config, config_path, command),
    }
}

async fn login(sessions: &SessionManager, email: String, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => Password::new()
            .with_prompt(format!("Password for {}", email))
            .interact()
            .context("Failed to read password")?,
    };

    let credentials = Credentials::new(email, password);
    let session = with_spinner("Signing in...", sessions.login(&credentials)).await?;
    info!(user_id = %session.user_id, "Signed in");
    print_success(&format!("Signed in as {}", session.display_name.bold()));
    Ok(())
}

async fn run_users(sessions: &SessionManager, command: UserCommand) -> Result<()> {
    let admin = sessions.admin()?;

    match command {
        UserCommand::List {
            page,
            limit,
            search,
            role,
            status,
        } => {
            let query = UserQuery {
                page,
                limit,
                search,
                role,
                status,
            };
            let envelope = settle(
                sessions,
                with_spinner("Loading users...", admin.list_users(&query)).await?,
            )
            .await?;
            print_users(envelope.data.as_deref().unwrap_or_default(), envelope.meta_data.as_ref());
        }
        UserCommand::Show { id } => {
            let user = settle_data(sessions, admin.get_user(id).await?).await?;
            print_user_details(&user);
        }
        UserCommand::Create {
            first_name,
            last_name,
            email,
            password,
            generate_password,
        } => {
            let (password, generated) = match (password, generate_password) {
                (Some(password), _) => (password, false),
                (None, true) => (generate_strong_password(), true),
                (None, false) => (
                    Password::new()
                        .with_prompt(format!("Password for {}", email))
                        .with_confirmation("Repeat password", "Passwords do not match")
                        .interact()
                        .context("Failed to read password")?,
                    false,
                ),
            };
            let user = NewUser {
                first_name,
                last_name,
                email,
                password,
            };

            debug!(email = %user.email, "Creating account");
            settle(sessions, admin.create_user(&user).await?).await?;
            print_success(&format!("Created account for {}", user.email));
            if generated {
                println!("  {} {}", "Password:".cyan(), user.password.bold());
            }
        }
        UserCommand::Verify { id, revoke } => {
            settle(sessions, admin.update_verification(id, !revoke).await?).await?;
            print_success(if revoke {
                "Email marked as unverified"
            } else {
                "Email marked as verified"
            });
        }
        UserCommand::ApproveTeacher { teacher_id, revoke } => {
            settle(sessions, admin.approve_teacher(teacher_id, !revoke).await?).await?;
            print_success(if revoke {
                "Teacher approval withdrawn"
            } else {
                "Teacher approved"
            });
        }
        UserCommand::Roles { id } => {
            let roles = settle_data(sessions, admin.get_user_roles(id).await?).await?;
            print_user_roles(&roles);
        }
        UserCommand::AssignRole { user_id, role_id } => {
            settle(sessions, admin.assign_role(user_id, role_id).await?).await?;
            print_success(&format!("Assigned role {} to user {}", role_id, user_id));
        }
        UserCommand::RemoveRole { user_id, role_id } => {
            settle(sessions, admin.remove_role(user_id, role_id).await?).await?;
            print_success(&format!("Removed role {} from user {}", role_id, user_id));
        }
    }
    Ok(())
}

fn role_input(fields: RoleFields) -> RoleInput {
    RoleInput {
        name: fields.name,
        description: fields.description,
        is_default: fields.default,
    }
}

async fn run_roles(sessions: &SessionManager, command: RoleCommand) -> Result<()> {
    let admin = sessions.admin()?;

    match command {
        RoleCommand::List => {
            let roles = settle_data(sessions, admin.list_roles().await?).await?;
            print_roles(&roles);
        }
        RoleCommand::Create { fields } => {
            let input = role_input(fields);
            settle(sessions, admin.create_role(&input).await?).await?;
            print_success(&format!("Created role {}", input.name));
        }
        RoleCommand::Update { id, fields } => {
            let input = role_input(fields);
            settle(sessions, admin.update_role(id, &input).await?).await?;
            print_success(&format!("Updated role {}", id));
        }
        RoleCommand::Permissions { id } => {
            let permissions = settle_data(sessions, admin.role_permissions(id).await?).await?;
            print_role_permissions(&permissions);
        }
        RoleCommand::Grant {
            role_id,
            permission_id,
        } => {
            settle(sessions, admin.assign_permission(role_id, permission_id).await?).await?;
            print_success(&format!(
                "Granted permission {} to role {}",
                permission_id, role_id
            ));
        }
        RoleCommand::Revoke {
            role_id,
            permission_id,
        } => {
            settle(sessions, admin.remove_permission(role_id, permission_id).await?).await?;
            print_success(&format!(
                "Revoked permission {} from role {}",
                permission_id, role_id
            ));
        }
    }
    Ok(())
}

async fn run_permissions(sessions: &SessionManager, command: PermissionCommand) -> Result<()> {
    let admin = sessions.admin()?;

    match command {
        PermissionCommand::List => {
            let permissions = settle_data(sessions, admin.list_permissions().await?).await?;
            print_permissions(&permissions);
        }
        PermissionCommand::Matrix => {
            let matrix =
                with_spinner("Loading permissions...", admin.permission_matrix()).await?;
            print_permission_matrix(&matrix);
        }
    }
    Ok(())
}

async fn run_profile(sessions: &SessionManager, command: ProfileCommand) -> Result<()> {
    let admin = sessions.admin()?;

    match command {
        ProfileCommand::Update {
            display_name,
            first_name,
            last_name,
            email,
        } => {
            let update = ProfileUpdate {
                display_name,
                first_name,
                last_name,
                email,
            };
            if update.is_empty() {
                bail!("Nothing to update. Pass at least one of --display-name, --first-name, --last-name or --email");
            }

            let updated = settle_data(sessions, admin.update_profile(&update).await?).await?;
            sessions
                .apply_profile(ProfileChanges {
                    display_name: Some(updated.display_name),
                    first_name: Some(updated.first_name),
                    last_name: Some(updated.last_name),
                    email: Some(updated.email),
                    profile_picture: None,
                })
                .await?;
            print_success("Profile updated");
        }
        ProfileCommand::Picture { file } => {
            let picture = read_picture(&file).await?;
            set_picture(sessions, &admin, picture).await?;
            print_success("Profile picture updated");
        }
    }
    Ok(())
}

async fn set_picture(
    sessions: &SessionManager,
    admin: &AdminApi,
    picture: PictureFile,
) -> Result<()> {
    let asset = with_spinner(
        "Uploading...",
        admin.upload_file(
            &picture.file_name,
            picture.bytes,
            Some(picture.mime_type),
            None,
        ),
    )
    .await?;
    let asset = settle_data(sessions, asset).await?;

    settle(sessions, admin.set_profile_picture(asset.id).await?).await?;
    sessions
        .apply_profile(ProfileChanges {
            profile_picture: Some(asset.url),
            ..Default::default()
        })
        .await
}

fn run_config(config: &AdminConfig, config_path: Option<&Path>, command: ConfigCommand) -> Result<()> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => get_default_config_file(APP_NAME)?,
    };

    match command {
        ConfigCommand::Show => {
            println!("{} {}", "Config file:".cyan(), path.display());
            println!("{}", render_config(config)?);
        }
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "{} already exists. Use --force to overwrite it",
                    path.display()
                );
            }
            config.save_to_file(&path)?;
            print_success(&format!("Wrote {}", path.display()));
        }
    }
    Ok(())
}

fn render_config(config: &AdminConfig) -> Result<String> {
    serde_json::to_string_pretty(config).context("Failed to render configuration")
}
