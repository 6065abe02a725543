use clap::{Args as ClapArgs, Parser, Subcommand};
use lms_admin_core::DEFAULT_PAGE_SIZE;
use std::path::PathBuf;

/// Command line administration for the LMS backend
#[derive(Parser, Debug)]
#[command(name = "lms-admin", author, version, about, long_about = None)]
pub struct Args {
    /// Path to the configuration file
    #[arg(long, global = true, env = "LMS_ADMIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Backend base URL, overriding the configuration
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: String,

        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in administrator
    Whoami,

    /// Dashboard counters
    Stats,

    /// Manage user accounts
    #[command(subcommand)]
    Users(UserCommand),

    /// Manage roles and their permissions
    #[command(subcommand)]
    Roles(RoleCommand),

    /// Inspect permissions
    #[command(subcommand)]
    Permissions(PermissionCommand),

    /// Edit your own profile
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Show or create the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// List users page by page
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: u32,

        #[arg(long)]
        search: Option<String>,

        /// Role name, or "all"
        #[arg(long)]
        role: Option<String>,

        /// Account status, or "all"
        #[arg(long)]
        status: Option<String>,
    },

    /// Show one user in detail
    Show { id: u64 },

    /// Register a new account
    Create {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(long)]
        email: String,

        #[arg(long, conflicts_with = "generate_password")]
        password: Option<String>,

        /// Generate a strong password and print it
        #[arg(long, default_value_t = false)]
        generate_password: bool,
    },

    /// Mark a user's email as verified
    Verify {
        id: u64,

        /// Mark as unverified instead
        #[arg(long, default_value_t = false)]
        revoke: bool,
    },

    /// Approve a teacher application
    ApproveTeacher {
        teacher_id: u64,

        /// Withdraw the approval instead
        #[arg(long, default_value_t = false)]
        revoke: bool,
    },

    /// Show the roles held by a user
    Roles { id: u64 },

    AssignRole { user_id: u64, role_id: u64 },

    RemoveRole { user_id: u64, role_id: u64 },
}

#[derive(ClapArgs, Debug)]
pub struct RoleFields {
    #[arg(long)]
    pub name: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Assign this role to new accounts
    #[arg(long, default_value_t = false)]
    pub default: bool,
}

#[derive(Subcommand, Debug)]
pub enum RoleCommand {
    List,

    Create {
        #[command(flatten)]
        fields: RoleFields,
    },

    Update {
        id: u64,

        #[command(flatten)]
        fields: RoleFields,
    },

    /// Show the permissions granted to a role
    Permissions { id: u64 },

    /// Grant a permission to a role
    Grant { role_id: u64, permission_id: u64 },

    /// Revoke a permission from a role
    Revoke { role_id: u64, permission_id: u64 },
}

#[derive(Subcommand, Debug)]
pub enum PermissionCommand {
    List,

    /// Roles against permissions
    Matrix,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    Update {
        #[arg(long)]
        display_name: Option<String>,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },

    /// Upload an image and make it your profile picture
    Picture { file: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    Show,

    /// Write the current configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_nested_commands() {
        let args = Args::parse_from([
            "lms-admin",
            "--backend-url",
            "http://localhost:4000",
            "users",
            "list",
            "--role",
            "teacher",
        ]);
        assert_eq!(args.backend_url.as_deref(), Some("http://localhost:4000"));
        match args.command {
            Command::Users(UserCommand::List { page, limit, role, .. }) => {
                assert_eq!(page, 1);
                assert_eq!(limit, DEFAULT_PAGE_SIZE);
                assert_eq!(role.as_deref(), Some("teacher"));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let args = Args::parse_from(["lms-admin", "roles", "grant", "2", "7", "-v"]);
        assert!(args.verbose);
        assert!(matches!(
            args.command,
            Command::Roles(RoleCommand::Grant {
                role_id: 2,
                permission_id: 7
            })
        ));
    }

    #[test]
    fn test_password_options_conflict() {
        let result = Args::try_parse_from([
            "lms-admin",
            "users",
            "create",
            "--first-name",
            "A",
            "--last-name",
            "B",
            "--email",
            "a@example.com",
            "--password",
            "Secret#123",
            "--generate-password",
        ]);
        assert!(result.is_err());
    }
}
