use std::path::Path;

use optislip_core::models::{SubUser, User};
use serde::Serialize;

use crate::commands::common::{format_timestamp, normalize_required, open_database};
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub user: User,
    pub sub_users: Vec<SubUser>,
}

pub async fn create_owner(
    email: &str,
    name: &str,
    phone: Option<&str>,
    id: Option<&str>,
    db_path: &Path,
) -> Result<User, CliError> {
    let now = chrono::Utc::now().timestamp_millis();
    let user = User {
        id: new_or_given_id(id)?,
        email: normalize_required(email, "--email")?,
        name: normalize_required(name, "--name")?,
        phone: phone
            .map(str::trim)
            .filter(|phone| !phone.is_empty())
            .map(str::to_string),
        is_admin: false,
        created_at: now,
        updated_at: now,
    };

    let db = open_database(db_path).await?;
    db.create_user(&user).await?;
    Ok(user)
}

pub async fn create_sub_user(
    owner: &str,
    username: &str,
    email: &str,
    id: Option<&str>,
    db_path: &Path,
) -> Result<SubUser, CliError> {
    let owner_id = normalize_required(owner, "--owner")?;
    let db = open_database(db_path).await?;
    if db.get_user(&owner_id).await?.is_none() {
        return Err(CliError::OwnerNotFound(owner_id));
    }

    let sub_user = SubUser {
        id: new_or_given_id(id)?,
        owner_id,
        username: normalize_required(username, "--username")?,
        email: normalize_required(email, "--email")?,
        created_at: chrono::Utc::now().timestamp_millis(),
    };
    db.create_sub_user(&sub_user).await?;
    Ok(sub_user)
}

pub async fn load_account(id: &str, db_path: &Path) -> Result<AccountView, CliError> {
    let owner_id = normalize_required(id, "id")?;
    let db = open_database(db_path).await?;
    let user = db
        .get_user(&owner_id)
        .await?
        .ok_or_else(|| CliError::OwnerNotFound(owner_id.clone()))?;
    let sub_users = db.list_sub_users(&owner_id).await?;
    Ok(AccountView { user, sub_users })
}

pub async fn run_account_create_owner(
    email: &str,
    name: &str,
    phone: Option<&str>,
    id: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let user = create_owner(email, name, phone, id, db_path).await?;
    println!("{}", user.id);
    Ok(())
}

pub async fn run_account_create_sub_user(
    owner: &str,
    username: &str,
    email: &str,
    id: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let sub_user = create_sub_user(owner, username, email, id, db_path).await?;
    println!("{}", sub_user.id);
    Ok(())
}

pub async fn run_account_show(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let account = load_account(id, db_path).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&account)?);
        return Ok(());
    }

    let user = &account.user;
    println!("{}  {} <{}>", user.id, user.name, user.email);
    if let Some(phone) = user.phone.as_deref() {
        println!("phone: {phone}");
    }
    println!("created {}", format_timestamp(user.created_at));
    if account.sub_users.is_empty() {
        println!("No sub-users.");
    }
    for sub_user in &account.sub_users {
        println!(
            "  sub-user {}  {} <{}>",
            sub_user.id, sub_user.username, sub_user.email
        );
    }
    Ok(())
}

fn new_or_given_id(id: Option<&str>) -> Result<String, CliError> {
    match id {
        Some(id) => normalize_required(id, "--id"),
        None => Ok(uuid::Uuid::now_v7().to_string()),
    }
}
