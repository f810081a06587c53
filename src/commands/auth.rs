use anyhow::Result;
use log::debug;

use super::config::Config;
use crate::services::auth;
use crate::types::{CreateUserRequest, LoginRequest, User};

#[tracing::instrument(skip(config, password))]
pub async fn signup(
    config: &Config,
    first_name: &str,
    last_name: &str,
    email: &str,
    password: &str,
) -> Result<()> {
    let request = CreateUserRequest {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: email.to_string(),
        password: password.to_string(),
    };

    let response = auth::register(&config.api, &request).await?;
    if !response.success {
        anyhow::bail!("{}", response.msg);
    }

    println!("Account created for {}.", response.data.email);
    println!("Run `evreg login --email {}` to sign in.", response.data.email);
    Ok(())
}

#[tracing::instrument(skip(config, password))]
pub async fn login(config: &Config, email: &str, password: &str) -> Result<()> {
    let credentials = LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    };

    let response = auth::login(&config.api, &credentials).await?;
    if !response.success || !auth::check_auth_status(&config.api) {
        anyhow::bail!("{}", login_failure_message(&response.msg));
    }

    match response.data {
        Some(user) => println!("Signed in as {}", describe_user(&user)),
        None => println!("Signed in as {}", email),
    }
    Ok(())
}

pub fn logout(config: &Config) -> Result<()> {
    auth::logout(&config.api);
    println!("Signed out.");
    Ok(())
}

pub fn status(config: &Config) -> Result<()> {
    debug!("Checking stored session in {}", config.state_dir.display());
    let state = if auth::check_auth_status(&config.api) {
        "Signed in"
    } else {
        "Not signed in"
    };
    println!("{}", state);
    println!(
        "{} [{}] at {}",
        config.app.app_name, config.app.app_env, config.app.api_base_url
    );
    Ok(())
}

pub async fn whoami(config: &Config) -> Result<()> {
    if !auth::check_auth_status(&config.api) {
        anyhow::bail!("Not signed in. Run `evreg login` first.");
    }

    let response = auth::current_user(&config.api).await?;
    let user = response.data;
    println!("{}", describe_user(&user));
    if let Some(role) = &user.role {
        println!("Role: {}", role);
    }
    println!("Id: {}", user.id);
    Ok(())
}

fn describe_user(user: &User) -> String {
    let name = user.full_name();
    if name.is_empty() {
        user.email.clone()
    } else {
        format!("{} <{}>", name, user.email)
    }
}

fn login_failure_message(msg: &str) -> String {
    if msg.is_empty() {
        "Login failed".to_string()
    } else {
        msg.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_user() {
        let mut user = User {
            id: "u1".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(describe_user(&user), "Ada Lovelace <ada@example.com>");

        user.first_name.clear();
        user.last_name.clear();
        assert_eq!(describe_user(&user), "ada@example.com");
    }

    #[test]
    fn test_login_failure_message() {
        assert_eq!(login_failure_message(""), "Login failed");
        assert_eq!(login_failure_message("Wrong password"), "Wrong password");
    }
}
