use colored::*;
use lms_admin_core::{
    ApiEnvelope, Permission, PermissionMatrix, ResponseMetadata, Role, RolePermissions, Session,
    StatsData, User, UserDetails, UserRoles,
};

/// Lay out rows under a bold header with a dimmed rule, padding every column to its widest cell
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut col_widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < col_widths.len() {
                col_widths[i] = col_widths[i].max(cell.chars().count());
            }
        }
    }

    let mut output = String::new();
    for (j, header) in headers.iter().enumerate() {
        let padding = col_widths[j].saturating_sub(header.chars().count());
        output.push_str(&format!("{}{} ", header.bold(), " ".repeat(padding)));
    }
    output.push('\n');

    for (j, width) in col_widths.iter().enumerate() {
        output.push_str(&"─".repeat(*width).dimmed().to_string());
        if j < col_widths.len() - 1 {
            output.push(' ');
        }
    }
    output.push('\n');

    for row in rows {
        for (j, cell) in row.iter().enumerate() {
            if j < col_widths.len() {
                let padding = col_widths[j].saturating_sub(cell.chars().count());
                output.push_str(&format!("{}{} ", cell, " ".repeat(padding)));
            }
        }
        output.push('\n');
    }
    output
}

fn yes_no(value: bool) -> ColoredString {
    if value {
        "yes".green()
    } else {
        "no".red()
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a failed envelope's message and any per-field errors
pub fn print_api_failure<T>(envelope: &ApiEnvelope<T>) {
    let message = if envelope.message.is_empty() {
        "Request failed"
    } else {
        envelope.message.as_str()
    };
    eprintln!(
        "{} {} {}",
        "✗".red().bold(),
        message.red(),
        format!("(status {})", envelope.status_code).dimmed()
    );
    for detail in envelope.errors.iter().flatten() {
        match &detail.reason {
            Some(reason) => eprintln!("  - {}: {}", detail.message, reason),
            None => eprintln!("  - {}", detail.message),
        }
    }
}

pub fn print_session(session: &Session) {
    println!("{}", session.display_name.bold());
    println!("  {:<10} {}", "Email:".cyan(), session.email);
    println!("  {:<10} {}", "User id:".cyan(), session.user_id);
    println!(
        "  {:<10} {}",
        "Roles:".cyan(),
        session.roles.iter().cloned().collect::<Vec<_>>().join(", ")
    );
    println!("  {:<10} {}", "Verified:".cyan(), yes_no(session.is_email_verified));
    if let Some(picture) = &session.profile_picture {
        println!("  {:<10} {}", "Picture:".cyan(), picture);
    }
    match session.access_token_expiry() {
        Some(expiry) if session.is_access_token_expired() => println!(
            "  {:<10} {}",
            "Token:".cyan(),
            format!("expired at {}", expiry.to_rfc3339()).red()
        ),
        Some(expiry) => println!("  {:<10} valid until {}", "Token:".cyan(), expiry.to_rfc3339()),
        None => {}
    }
}

pub fn print_stats(stats: &StatsData) {
    println!("{}", "Dashboard".yellow().bold());
    println!("  {:<12} {}", "Users:".cyan(), stats.total_users);
    println!("  {:<12} {}", "Roles:".cyan(), stats.total_roles);
    println!("  {:<12} {}", "Permissions:".cyan(), stats.total_permissions);
}

pub fn print_users(users: &[User], meta: Option<&ResponseMetadata>) {
    if users.is_empty() {
        println!("No users found.");
        return;
    }

    let rows: Vec<Vec<String>> = users
        .iter()
        .map(|user| {
            vec![
                user.id.to_string(),
                user.full_name(),
                user.email.clone(),
                user.roles.join(", "),
                yes_no(user.is_email_verified).to_string(),
            ]
        })
        .collect();
    print!(
        "{}",
        render_table(&["ID", "Name", "Email", "Roles", "Verified"], &rows)
    );

    if let Some(meta) = meta {
        println!(
            "{}",
            format!(
                "Page {} of {} ({} users)",
                meta.page, meta.total_pages, meta.count
            )
            .dimmed()
        );
    }
}

pub fn print_user_details(user: &UserDetails) {
    println!("{} {}", format!("{} {}", user.first_name, user.last_name).bold(), format!("#{}", user.id).dimmed());
    println!("  {:<14} {}", "Display name:".cyan(), user.display_name);
    println!("  {:<14} {}", "Email:".cyan(), user.email);
    println!("  {:<14} {}", "Verified:".cyan(), yes_no(user.is_email_verified));
    println!("  {:<14} {}", "Roles:".cyan(), user.roles.join(", "));
    println!("  {:<14} {}", "Joined:".cyan(), user.created_at);

    if let Some(teacher) = &user.teacher_info {
        println!("{}", "Teacher application".yellow());
        println!("  {:<14} {}", "Teacher id:".cyan(), teacher.id);
        println!("  {:<14} {}", "Approved:".cyan(), yes_no(teacher.is_approved));
        println!("  {:<14} {}", "Education:".cyan(), teacher.education_level);
        if let Some(specialty) = &teacher.teaching_specialty {
            println!("  {:<14} {}", "Specialty:".cyan(), specialty.name);
        }
        if let Some(years) = teacher.teaching_experience {
            println!("  {:<14} {} years", "Experience:".cyan(), years);
        }
    }

    if let Some(categories) = user.student_categories.as_ref().filter(|c| !c.is_empty()) {
        let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
        println!("  {:<14} {}", "Interests:".cyan(), names.join(", "));
    }
}

pub fn print_roles(roles: &[Role]) {
    let rows: Vec<Vec<String>> = roles
        .iter()
        .map(|role| vec![role.id.to_string(), role.name.clone(), role.description.clone()])
        .collect();
    print!("{}", render_table(&["ID", "Name", "Description"], &rows));
}

pub fn print_user_roles(user_roles: &UserRoles) {
    println!("Roles of user {}:", user_roles.user_id);
    print_roles(&user_roles.roles);
}

pub fn print_permissions(permissions: &[Permission]) {
    let rows: Vec<Vec<String>> = permissions
        .iter()
        .map(|p| {
            vec![
                p.id.to_string(),
                p.group.clone(),
                p.name.clone(),
                p.action.clone(),
                p.description.clone(),
            ]
        })
        .collect();
    print!(
        "{}",
        render_table(&["ID", "Group", "Name", "Action", "Description"], &rows)
    );
}

pub fn print_role_permissions(role_permissions: &RolePermissions) {
    println!("Permissions of role {}:", role_permissions.role_id);
    print_permissions(&role_permissions.permissions);
}

/// One row per permission, one column per role
pub fn print_permission_matrix(matrix: &PermissionMatrix) {
    let mut headers = vec!["Permission"];
    headers.extend(matrix.roles.iter().map(|role| role.name.as_str()));

    let rows: Vec<Vec<String>> = matrix
        .permissions
        .iter()
        .map(|permission| {
            let mut row = vec![permission.name.clone()];
            row.extend(matrix.roles.iter().map(|role| {
                if matrix.role_has(role.id, permission.id) {
                    "●".to_string()
                } else {
                    "·".to_string()
                }
            }));
            row
        })
        .collect();
    print!("{}", render_table(&headers, &rows));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_table_pads_columns() {
        colored::control::set_override(false);
        let table = render_table(
            &["ID", "Name"],
            &[
                vec!["1".to_string(), "admin".to_string()],
                vec!["12".to_string(), "teacher".to_string()],
            ],
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "ID Name    ");
        assert_eq!(lines[1], "── ───────");
        assert_eq!(lines[2], "1  admin   ");
        assert_eq!(lines[3], "12 teacher ");
    }
}
