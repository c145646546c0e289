//! Snowflake connection settings

use crate::{Result, WarehouseError};
use std::fmt;

const SF_USER: &str = "SF_USER";
const SF_PASSWORD: &str = "SF_PASSWORD";
const SF_ACCOUNT: &str = "SF_ACCOUNT";
const SF_WAREHOUSE: &str = "SF_WAREHOUSE";
const SF_DATABASE: &str = "SF_DATABASE";
const SF_SCHEMA: &str = "SF_SCHEMA";
const SF_HOST: &str = "SF_HOST";

/// Snowflake settings, captured once at startup.
///
/// Nothing is validated here; missing credentials only become an error when a
/// connection is requested, see [`SnowflakeSettings::credentials`].
#[derive(Clone, Default)]
pub struct SnowflakeSettings {
    pub user: Option<String>,
    pub password: Option<String>,
    pub account: Option<String>,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    /// Full base URL overriding `https://{account}.snowflakecomputing.com`
    pub host: Option<String>,
}

/// Mandatory credentials, borrowed from validated settings
#[derive(Clone, Copy)]
pub struct Credentials<'a> {
    pub user: &'a str,
    pub password: &'a str,
    pub account: &'a str,
}

impl SnowflakeSettings {
    /// Read settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup. Blank values count as unset;
    /// anything else is kept verbatim.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            user: get(SF_USER),
            password: get(SF_PASSWORD),
            account: get(SF_ACCOUNT),
            warehouse: get(SF_WAREHOUSE),
            database: get(SF_DATABASE),
            schema: get(SF_SCHEMA),
            host: get(SF_HOST),
        }
    }

    /// Mandatory credentials, or an error naming every missing variable
    pub fn credentials(&self) -> Result<Credentials<'_>> {
        match (&self.user, &self.password, &self.account) {
            (Some(user), Some(password), Some(account)) => Ok(Credentials {
                user,
                password,
                account,
            }),
            _ => {
                let missing = [
                    (SF_USER, self.user.is_none()),
                    (SF_PASSWORD, self.password.is_none()),
                    (SF_ACCOUNT, self.account.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(WarehouseError::MissingCredentials(missing))
            }
        }
    }

    /// Base URL of the account's REST endpoint
    pub fn base_url(&self, account: &str) -> String {
        match &self.host {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => format!("https://{}.snowflakecomputing.com", account),
        }
    }
}

impl fmt::Debug for SnowflakeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeSettings")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("account", &self.account)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("host", &self.host)
            .finish()
    }
}
