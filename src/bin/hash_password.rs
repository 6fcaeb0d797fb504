use std::env;

use anyhow::Context;

use jobboard::auth::password::hash_password;

/// Prints an argon2 hash suitable for seeding `hr_accounts.password`.
fn main() -> anyhow::Result<()> {
    let password = env::args()
        .nth(1)
        .context("usage: hash_password <password>")?;
    println!("{}", hash_password(&password)?);
    Ok(())
}
